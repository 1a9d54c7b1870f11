//! Domain layer: pure models, ports, and error taxonomy.

pub mod errors;
pub mod models;
pub mod ports;
