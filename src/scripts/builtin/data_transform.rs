//! Conversion between JSON, CSV and XML text.
//!
//! CSV is split naively on newlines and commas (no quoting). XML input is
//! not parsed; it is carried as `{"xmlData": "<raw>"}`.

use std::fs;
use std::path::PathBuf;

use log::{debug, info};
use serde_json::{json, Map, Value};

use super::{optional, required};
use crate::scripts::module::{ScriptError, ScriptOutcome, ScriptParams, ScriptResult};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Format {
    Json,
    Csv,
    Xml,
}

impl Format {
    fn parse(s: &str, direction: &str) -> Result<Self, ScriptError> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "csv" => Ok(Format::Csv),
            "xml" => Ok(Format::Xml),
            _ => Err(format!("Unsupported {} format: {}", direction, s).into()),
        }
    }
}

pub(super) fn run(params: &ScriptParams) -> ScriptOutcome {
    let input_format = Format::parse(required(params, "inputFormat")?, "input")?;
    let output_format = Format::parse(required(params, "outputFormat")?, "output")?;

    let data = match (optional(params, "inputFile"), optional(params, "inputData")) {
        (Some(file), _) => {
            let path = PathBuf::from(file);
            if !path.exists() {
                return Err(format!("Input file not found: {}", path.display()).into());
            }
            fs::read_to_string(&path)?
        }
        (None, Some(data)) => data.to_string(),
        (None, None) => {
            return Err("Either inputData or inputFile parameter is required".into());
        }
    };

    info!("Transforming data from {:?} to {:?}", input_format, output_format);

    let parsed = parse_input(&data, input_format)?;
    let output_data = render_output(&parsed, output_format)?;
    debug!("Transformed data: {}", output_data);

    let output_file = match optional(params, "outputFile") {
        Some(file) => {
            fs::write(file, &output_data)?;
            info!("Output written to {}", file);
            Value::String(file.to_string())
        }
        None => Value::Null,
    };

    Ok(ScriptResult::with_output(json!({
        "outputData": output_data,
        "outputFile": output_file,
    })))
}

fn parse_input(data: &str, format: Format) -> Result<Value, ScriptError> {
    match format {
        Format::Json => Ok(serde_json::from_str(data)?),
        Format::Csv => Ok(Value::Array(
            data.lines()
                .filter(|line| !line.is_empty())
                .map(|line| Value::Array(line.split(',').map(|c| json!(c)).collect()))
                .collect(),
        )),
        Format::Xml => Ok(json!({ "xmlData": data })),
    }
}

fn render_output(value: &Value, format: Format) -> Result<String, ScriptError> {
    match format {
        Format::Json => Ok(serde_json::to_string_pretty(value)?),
        Format::Csv => Ok(to_csv(value)),
        Format::Xml => {
            let mut out = String::new();
            write_xml(&mut out, "data", value);
            Ok(out)
        }
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn to_csv(value: &Value) -> String {
    match value {
        Value::Array(rows) => {
            // Arrays of objects get a header row from the first object's keys.
            if let Some(Value::Object(first)) = rows.first() {
                let headers: Vec<&String> = first.keys().collect();
                let mut lines = vec![headers
                    .iter()
                    .map(|h| h.as_str())
                    .collect::<Vec<_>>()
                    .join(",")];
                for row in rows {
                    let line = headers
                        .iter()
                        .map(|h| row.get(h.as_str()).map(cell).unwrap_or_default())
                        .collect::<Vec<_>>()
                        .join(",");
                    lines.push(line);
                }
                return lines.join("\n");
            }
            rows.iter()
                .map(|row| match row {
                    Value::Array(cells) => cells.iter().map(cell).collect::<Vec<_>>().join(","),
                    other => cell(other),
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
        Value::Object(map) => object_to_csv(map),
        other => cell(other),
    }
}

fn object_to_csv(map: &Map<String, Value>) -> String {
    let headers = map.keys().cloned().collect::<Vec<_>>().join(",");
    let values = map.values().map(cell).collect::<Vec<_>>().join(",");
    format!("{}\n{}", headers, values)
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn write_xml(out: &mut String, tag: &str, value: &Value) {
    match value {
        Value::Object(map) => {
            out.push_str(&format!("<{}>", tag));
            for (key, child) in map {
                write_xml(out, key, child);
            }
            out.push_str(&format!("</{}>", tag));
        }
        Value::Array(items) => {
            out.push_str(&format!("<{}>", tag));
            for item in items {
                write_xml(out, "item", item);
            }
            out.push_str(&format!("</{}>", tag));
        }
        Value::Null => out.push_str(&format!("<{}/>", tag)),
        other => out.push_str(&format!("<{0}>{1}</{0}>", tag, escape_xml(&cell(other)))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn params(pairs: &[(&str, &str)]) -> ScriptParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn output_data(pairs: &[(&str, &str)]) -> String {
        let result = run(&params(pairs)).unwrap();
        result.output.unwrap()["outputData"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_csv_to_json() {
        let out = output_data(&[
            ("inputFormat", "csv"),
            ("outputFormat", "json"),
            ("inputData", "a,b\n1,2"),
        ]);
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value, json!([["a", "b"], ["1", "2"]]));
    }

    #[test]
    fn test_json_object_to_csv() {
        let out = output_data(&[
            ("inputFormat", "JSON"),
            ("outputFormat", "csv"),
            ("inputData", r#"{"name":"x","count":3}"#),
        ]);
        assert_eq!(out, "count,name\n3,x");
    }

    #[test]
    fn test_json_records_to_csv() {
        let out = output_data(&[
            ("inputFormat", "json"),
            ("outputFormat", "csv"),
            ("inputData", r#"[{"a":1,"b":"x"},{"a":2}]"#),
        ]);
        assert_eq!(out, "a,b\n1,x\n2,");
    }

    #[test]
    fn test_json_to_xml() {
        let out = output_data(&[
            ("inputFormat", "json"),
            ("outputFormat", "xml"),
            ("inputData", r#"{"name":"a<b","tags":[1,2]}"#),
        ]);
        assert_eq!(
            out,
            "<data><name>a&lt;b</name><tags><item>1</item><item>2</item></tags></data>"
        );
    }

    #[test]
    fn test_file_input_and_output() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.csv");
        let output = dir.path().join("out.json");
        fs::write(&input, "x,y\n").unwrap();

        let result = run(&params(&[
            ("inputFormat", "csv"),
            ("outputFormat", "json"),
            ("inputFile", input.to_str().unwrap()),
            ("outputFile", output.to_str().unwrap()),
        ]))
        .unwrap();

        let written = fs::read_to_string(&output).unwrap();
        assert!(written.contains("\"x\""));
        assert_eq!(
            result.output.unwrap()["outputFile"],
            output.to_str().unwrap()
        );
    }

    #[test]
    fn test_errors() {
        let missing = run(&params(&[("inputFormat", "json"), ("outputFormat", "csv")]));
        assert_eq!(
            missing.unwrap_err().message,
            "Either inputData or inputFile parameter is required"
        );

        let unsupported = run(&params(&[
            ("inputFormat", "yaml"),
            ("outputFormat", "csv"),
            ("inputData", "a"),
        ]));
        assert_eq!(
            unsupported.unwrap_err().message,
            "Unsupported input format: yaml"
        );

        let bad_json = run(&params(&[
            ("inputFormat", "json"),
            ("outputFormat", "csv"),
            ("inputData", "{"),
        ]));
        assert!(bad_json.is_err());
    }
}
