//! Tool port - capability interface for agent-invocable tools.
//!
//! Tools are stateless callables with a declared input schema. A tool never
//! raises past its own boundary: failures come back as
//! [`ToolOutcome::Error`], a normal value the agent loop feeds back into the
//! conversation to reason about.

use async_trait::async_trait;
use serde_json::Value;

/// Result of a tool invocation. Errors are data, not faults.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// Expected payload.
    Success(Value),
    /// Structured error value `{error: message}` equivalent.
    Error(String),
}

impl ToolOutcome {
    /// Render the outcome as JSON for re-injection into agent context.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Success(value) => value.clone(),
            Self::Error(message) => serde_json::json!({ "error": message }),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Declared shape of a tool's arguments.
///
/// Each parameter has a name, a JSON type name ("string", "number", ...)
/// and a required flag. Validation happens in the agent loop before
/// invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct InputSchema {
    pub parameters: Vec<Parameter>,
}

/// One declared tool parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub type_name: String,
    pub required: bool,
}

impl InputSchema {
    pub fn new(parameters: Vec<Parameter>) -> Self {
        Self { parameters }
    }

    /// Schema with a single required string parameter.
    pub fn single_string(name: &str) -> Self {
        Self::new(vec![Parameter {
            name: name.to_string(),
            type_name: "string".to_string(),
            required: true,
        }])
    }

    /// Check a JSON argument object against this schema.
    ///
    /// Unknown keys are rejected: a misspelled argument is a call error the
    /// agent should see, not something to ignore silently.
    pub fn validate(&self, args: &Value) -> Result<(), String> {
        let Some(map) = args.as_object() else {
            return Err("tool arguments must be a JSON object".to_string());
        };

        for param in &self.parameters {
            match map.get(&param.name) {
                None if param.required => {
                    return Err(format!("missing required argument '{}'", param.name));
                }
                None => {}
                Some(value) => {
                    let ok = match param.type_name.as_str() {
                        "string" => value.is_string(),
                        "number" => value.is_number(),
                        "boolean" => value.is_boolean(),
                        "array" => value.is_array(),
                        "object" => value.is_object(),
                        _ => true,
                    };
                    if !ok {
                        return Err(format!(
                            "argument '{}' must be of type {}",
                            param.name, param.type_name
                        ));
                    }
                }
            }
        }

        for key in map.keys() {
            if !self.parameters.iter().any(|p| &p.name == key) {
                return Err(format!("unknown argument '{key}'"));
            }
        }

        Ok(())
    }
}

/// Capability handle for an agent-invocable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name as exposed to the completion model.
    fn name(&self) -> &str;

    /// One-line description for the model's tool listing.
    fn description(&self) -> &str;

    /// Declared argument shape.
    fn input_schema(&self) -> InputSchema;

    /// Invoke the tool. Must not panic or error across this boundary;
    /// failures are returned as [`ToolOutcome::Error`].
    async fn invoke(&self, args: Value) -> ToolOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> InputSchema {
        InputSchema::new(vec![
            Parameter { name: "query".into(), type_name: "string".into(), required: true },
            Parameter { name: "limit".into(), type_name: "number".into(), required: false },
        ])
    }

    #[test]
    fn validates_required_and_types() {
        let s = schema();
        assert!(s.validate(&json!({"query": "select 1"})).is_ok());
        assert!(s.validate(&json!({"query": "q", "limit": 5})).is_ok());
        assert!(s.validate(&json!({})).is_err());
        assert!(s.validate(&json!({"query": 42})).is_err());
        assert!(s.validate(&json!({"query": "q", "limit": "five"})).is_err());
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = schema().validate(&json!({"query": "q", "querry": "oops"})).unwrap_err();
        assert!(err.contains("unknown argument"));
    }

    #[test]
    fn error_outcome_serializes_as_error_object() {
        let outcome = ToolOutcome::Error("no such table".to_string());
        assert_eq!(outcome.to_json(), json!({"error": "no such table"}));
        assert!(outcome.is_error());
    }
}
