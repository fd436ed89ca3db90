//! Output formatting for CLI commands.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cli::args::{OutputFormat, SundialArgs};
use crate::error::Result;

/// A metadata definition shown together with its name.
#[derive(Debug, Serialize)]
pub struct Named<'a, T: Serialize> {
    pub name: &'a str,
    #[serde(flatten)]
    pub definition: &'a T,
}

/// Result of a delete command.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeletionResult {
    pub name: String,
    pub deleted: bool,
}

/// Summary of one stored object.
#[derive(Debug, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub bucket: String,
    pub path: String,
    pub size: u64,
    pub modified: Option<String>,
}

/// Result of a segment build.
#[derive(Debug, Serialize, Deserialize)]
pub struct SegmentBuildResult {
    pub index: String,
    pub segment_id: String,
    pub documents: u32,
    pub skipped_lines: usize,
    pub bytes: u64,
    pub duration_ms: u64,
}

/// One term yielded by a segment scan.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScannedTerm {
    pub term: String,
    pub doc_freq: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_ids: Option<Vec<u32>>,
}

/// Result of a segment scan.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScanResult {
    pub field: String,
    pub field_type: String,
    pub terms: Vec<ScannedTerm>,
}

/// Output a result in the requested format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &SundialArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

fn output_human<T: Serialize>(message: &str, result: &T, args: &SundialArgs) -> Result<()> {
    if args.verbosity() > 0 && !message.is_empty() {
        println!("{message}");
    }

    let value = serde_json::to_value(result)?;
    match &value {
        Value::Array(items) if items.is_empty() => println!("(none)"),
        Value::Array(items) => {
            for item in items {
                output_generic_human(item, 0);
                if item.is_object() {
                    println!();
                }
            }
        }
        _ => output_generic_human(&value, 0),
    }
    Ok(())
}

fn output_generic_human(value: &Value, depth: usize) {
    let indent = "  ".repeat(depth);
    match value {
        Value::Object(obj) => {
            for (key, val) in obj {
                if val.is_object() || val.as_array().is_some_and(|a| a.iter().any(Value::is_object))
                {
                    println!("{indent}{key}:");
                    match val {
                        Value::Array(items) => {
                            for item in items {
                                output_generic_human(item, depth + 1);
                            }
                        }
                        _ => output_generic_human(val, depth + 1),
                    }
                } else {
                    println!("{indent}{key}: {}", format_value(val));
                }
            }
        }
        _ => println!("{indent}{}", format_value(value)),
    }
}

fn output_json<T: Serialize>(result: &T, args: &SundialArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}

/// Format a JSON value for human display.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) => arr.iter().map(format_value).collect::<Vec<_>>().join(", "),
        Value::Object(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&json!("cat")), "cat");
        assert_eq!(format_value(&json!(3)), "3");
        assert_eq!(format_value(&json!(null)), "-");
        assert_eq!(format_value(&json!(["a", 1])), "a, 1");
    }

    #[test]
    fn test_scan_result_serialization() {
        let result = ScanResult {
            field: "desc".to_string(),
            field_type: "text".to_string(),
            terms: vec![ScannedTerm {
                term: "rice".to_string(),
                doc_freq: 1,
                doc_ids: None,
            }],
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"field": "desc", "field_type": "text", "terms": [{"term": "rice", "doc_freq": 1}]})
        );
    }
}
