//! Bulk CSV load and export tools.
//!
//! Both tools speak a small RFC-4180 subset: comma separators, double
//! quotes with `""` escaping, and either line ending. The first record
//! is always treated as a header row. Parsing lives here because no
//! other part of the engine touches CSV.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::domain::ports::{InputSchema, Parameter, Tool, ToolOutcome};

/// Parse CSV text into records of fields.
fn parse_csv(text: &str) -> Result<Vec<Vec<String>>, String> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
        } else {
            match c {
                '"' if field.is_empty() => in_quotes = true,
                '"' => return Err("unexpected quote inside unquoted field".to_string()),
                ',' => fields.push(std::mem::take(&mut field)),
                '\r' if chars.peek() == Some(&'\n') => {}
                '\n' => {
                    fields.push(std::mem::take(&mut field));
                    records.push(std::mem::take(&mut fields));
                }
                _ => field.push(c),
            }
        }
    }
    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        records.push(fields);
    }
    Ok(records)
}

/// Quote a field if it needs it, doubling embedded quotes.
fn write_field(out: &mut String, field: &str) {
    if field.contains(['"', ',', '\n', '\r']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

fn render_csv(records: &[Vec<String>]) -> String {
    let mut out = String::new();
    for record in records {
        for (i, field) in record.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            write_field(&mut out, field);
        }
        out.push('\n');
    }
    out
}

/// Tool that reads a CSV file into header-keyed JSON rows.
pub struct CsvLoadTool {
    base_dir: PathBuf,
}

impl CsvLoadTool {
    /// Paths in tool arguments resolve relative to `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.base_dir.join(candidate)
        }
    }
}

#[async_trait]
impl Tool for CsvLoadTool {
    fn name(&self) -> &str {
        "csv_load"
    }

    fn description(&self) -> &str {
        "Load a CSV file and return its rows as JSON objects keyed by the header row"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::single_string("path")
    }

    async fn invoke(&self, args: Value) -> ToolOutcome {
        let Some(path) = args.get("path").and_then(Value::as_str) else {
            return ToolOutcome::Error("missing required argument 'path'".to_string());
        };
        let resolved = self.resolve(path);

        let text = match tokio::fs::read_to_string(&resolved).await {
            Ok(text) => text,
            Err(e) => return ToolOutcome::Error(format!("cannot read {}: {e}", resolved.display())),
        };
        let mut records = match parse_csv(&text) {
            Ok(records) => records,
            Err(e) => return ToolOutcome::Error(format!("invalid CSV in {path}: {e}")),
        };
        if records.is_empty() {
            return ToolOutcome::Success(serde_json::json!({"rows": [], "row_count": 0}));
        }

        let header = records.remove(0);
        let rows: Vec<Value> = records
            .iter()
            .map(|record| {
                let object: serde_json::Map<String, Value> = header
                    .iter()
                    .zip(record.iter().chain(std::iter::repeat(&String::new())))
                    .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                    .collect();
                Value::Object(object)
            })
            .collect();

        ToolOutcome::Success(serde_json::json!({
            "rows": rows,
            "row_count": rows.len(),
        }))
    }
}

/// Tool that writes JSON rows out as a CSV file.
pub struct CsvExportTool {
    base_dir: PathBuf,
}

impl CsvExportTool {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.base_dir.join(candidate)
        }
    }
}

#[async_trait]
impl Tool for CsvExportTool {
    fn name(&self) -> &str {
        "csv_export"
    }

    fn description(&self) -> &str {
        "Write an array of JSON objects to a CSV file, deriving the header from the first row"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![
            Parameter { name: "path".to_string(), type_name: "string".to_string(), required: true },
            Parameter { name: "rows".to_string(), type_name: "array".to_string(), required: true },
        ])
    }

    async fn invoke(&self, args: Value) -> ToolOutcome {
        let Some(path) = args.get("path").and_then(Value::as_str) else {
            return ToolOutcome::Error("missing required argument 'path'".to_string());
        };
        let Some(rows) = args.get("rows").and_then(Value::as_array) else {
            return ToolOutcome::Error("missing required argument 'rows'".to_string());
        };

        let mut records: Vec<Vec<String>> = Vec::with_capacity(rows.len() + 1);
        let mut header: Vec<String> = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            let Some(object) = row.as_object() else {
                return ToolOutcome::Error(format!("row {i} is not a JSON object"));
            };
            if header.is_empty() {
                header = object.keys().cloned().collect();
                records.push(header.clone());
            }
            records.push(
                header
                    .iter()
                    .map(|key| match object.get(key) {
                        Some(Value::String(s)) => s.clone(),
                        Some(Value::Null) | None => String::new(),
                        Some(other) => other.to_string(),
                    })
                    .collect(),
            );
        }

        let resolved = self.resolve(path);
        if let Some(parent) = resolved.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return ToolOutcome::Error(format!("cannot create {}: {e}", parent.display()));
            }
        }
        match tokio::fs::write(&resolved, render_csv(&records)).await {
            Ok(()) => ToolOutcome::Success(serde_json::json!({
                "path": resolved.display().to_string(),
                "row_count": rows.len(),
            })),
            Err(e) => ToolOutcome::Error(format!("cannot write {}: {e}", resolved.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_quoted_fields_and_crlf() {
        let records = parse_csv("name,note\r\n\"Doe, Jane\",\"says \"\"hi\"\"\"\nplain,row\n").unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1], vec!["Doe, Jane", "says \"hi\""]);
        assert_eq!(records[2], vec!["plain", "row"]);
    }

    #[test]
    fn rejects_unterminated_quotes() {
        assert!(parse_csv("a,\"broken\n").is_err());
    }

    #[test]
    fn render_round_trips_special_characters() {
        let records = vec![
            vec!["name".to_string(), "note".to_string()],
            vec!["Doe, Jane".to_string(), "line\nbreak".to_string()],
        ];
        let text = render_csv(&records);
        assert_eq!(parse_csv(&text).unwrap(), records);
    }

    #[tokio::test]
    async fn load_returns_header_keyed_rows() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("fruit.csv"), "name,qty\napple,3\npear,7\n")
            .await
            .unwrap();

        let tool = CsvLoadTool::new(dir.path());
        let outcome = tool.invoke(json!({"path": "fruit.csv"})).await;
        let ToolOutcome::Success(payload) = outcome else {
            panic!("expected success");
        };
        assert_eq!(payload["row_count"], 2);
        assert_eq!(payload["rows"][0]["name"], "apple");
        assert_eq!(payload["rows"][1]["qty"], "7");
    }

    #[tokio::test]
    async fn load_missing_file_is_an_error_value() {
        let dir = tempfile::tempdir().unwrap();
        let tool = CsvLoadTool::new(dir.path());
        assert!(tool.invoke(json!({"path": "ghost.csv"})).await.is_error());
    }

    #[tokio::test]
    async fn export_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let export = CsvExportTool::new(dir.path());
        let load = CsvLoadTool::new(dir.path());

        let rows = json!([
            {"name": "apple", "qty": "3"},
            {"name": "Doe, Jane", "qty": "1"},
        ]);
        let outcome = export.invoke(json!({"path": "out.csv", "rows": rows})).await;
        assert!(!outcome.is_error());

        let ToolOutcome::Success(payload) = load.invoke(json!({"path": "out.csv"})).await else {
            panic!("expected success");
        };
        assert_eq!(payload["row_count"], 2);
        assert_eq!(payload["rows"][1]["name"], "Doe, Jane");
    }
}
