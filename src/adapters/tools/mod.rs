//! Agent-invocable tool adapters.

pub mod csv;
pub mod sql_query;

pub use csv::{CsvExportTool, CsvLoadTool};
pub use sql_query::SqlQueryTool;
