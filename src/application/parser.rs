//! Turns client input into a time series.
//!
//! Two sources are accepted: an uploaded delimited-text file and a JSON list
//! (optionally nested one level). Uploads are read leniently: a row whose
//! fields are not all numeric is retried without its first field (a date or
//! label column), and rows that still fail are skipped.

use crate::domain::errors::ParseError;
use crate::domain::series::TimeSeries;
use csv::{ByteRecord, ReaderBuilder, Trim};
use serde_json::Value;
use tracing::debug;

/// Raw input as received from a client
#[derive(Debug, Clone, PartialEq)]
pub enum InputSource {
    Upload(Vec<u8>),
    Inline(Value),
}

impl InputSource {
    pub fn parse(&self) -> Result<TimeSeries, ParseError> {
        match self {
            InputSource::Upload(bytes) => parse_delimited(bytes),
            InputSource::Inline(value) => parse_nested(value),
        }
    }
}

/// Parse an optional source; no source at all is a client error.
pub fn parse_input(source: Option<&InputSource>) -> Result<TimeSeries, ParseError> {
    source.ok_or(ParseError::NoInput)?.parse()
}

/// Parse delimited text. Multi-column rows contribute their last column.
pub fn parse_delimited(bytes: &[u8]) -> Result<TimeSeries, ParseError> {
    if bytes.is_empty() {
        return Err(ParseError::EmptyUpload);
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(bytes);

    let mut values = Vec::new();
    let mut skipped = 0usize;
    let mut record = ByteRecord::new();
    loop {
        match reader.read_byte_record(&mut record) {
            Ok(true) => match row_observation(&record) {
                Some(v) => values.push(v),
                None => skipped += 1,
            },
            Ok(false) => break,
            Err(e) => {
                debug!("Skipping unreadable row: {}", e);
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        debug!("Skipped {} non-numeric rows in upload", skipped);
    }
    if values.is_empty() {
        return Err(ParseError::NoNumericData);
    }
    Ok(TimeSeries::new(values))
}

fn row_observation(record: &ByteRecord) -> Option<f64> {
    let fields: Vec<&[u8]> = record.iter().collect();
    if fields.iter().all(|f| f.is_empty()) {
        return None;
    }

    let row = parse_fields(&fields).or_else(|| match fields.split_first() {
        Some((_, rest)) if !rest.is_empty() => parse_fields(rest),
        _ => None,
    })?;
    row.last().copied()
}

fn parse_fields(fields: &[&[u8]]) -> Option<Vec<f64>> {
    fields
        .iter()
        .map(|field| std::str::from_utf8(field).ok()?.trim().parse::<f64>().ok())
        .collect()
}

/// Flatten a JSON list of scalars or lists of scalars into a series.
pub fn parse_nested(value: &Value) -> Result<TimeSeries, ParseError> {
    let items = match value {
        Value::Null => return Err(ParseError::NoInput),
        Value::Array(items) => items,
        other => {
            return Err(ParseError::InvalidData {
                reason: format!("expected a list, got {}", json_kind(other)),
            });
        }
    };

    let mut values = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Array(inner) => {
                for scalar in inner {
                    values.push(scalar_value(scalar)?);
                }
            }
            scalar => values.push(scalar_value(scalar)?),
        }
    }

    if values.is_empty() {
        return Err(ParseError::NoNumericData);
    }
    Ok(TimeSeries::new(values))
}

fn scalar_value(value: &Value) -> Result<f64, ParseError> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| ParseError::InvalidData {
            reason: format!("{} is not representable as a float", n),
        }),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| ParseError::InvalidData {
            reason: format!("could not convert string to float: '{}'", s),
        }),
        other => Err(ParseError::InvalidData {
            reason: format!("unsupported element of type {}", json_kind(other)),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(bytes: &str) -> Vec<f64> {
        parse_delimited(bytes.as_bytes()).unwrap().values().to_vec()
    }

    #[test]
    fn test_last_column_is_the_observation() {
        assert_eq!(values("1,2\n3,4\n5,6"), vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_single_column_rows() {
        assert_eq!(values("10\n20\n30"), vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_leading_label_column_is_dropped() {
        assert_eq!(values("2020-01-01,5.0"), vec![5.0]);
        assert_eq!(
            values("2020-01-01,1.5,7.0\n2020-01-02,1.6,8.0"),
            vec![7.0, 8.0]
        );
    }

    #[test]
    fn test_header_and_blank_lines_are_skipped() {
        let input = "date,value\n\n2021-03-01, 4.5 \n   \n2021-03-02,5.5\n";
        assert_eq!(values(input), vec![4.5, 5.5]);
    }

    #[test]
    fn test_rows_failing_after_retry_are_skipped() {
        assert_eq!(values("a,b,c\n1,2\nx,y\n3"), vec![2.0, 3.0]);
    }

    #[test]
    fn test_lone_non_numeric_field_is_skipped() {
        assert_eq!(values("header\n42"), vec![42.0]);
    }

    #[test]
    fn test_windows_line_endings() {
        assert_eq!(values("1,2\r\n3,4\r\n"), vec![2.0, 4.0]);
    }

    #[test]
    fn test_empty_upload() {
        assert_eq!(parse_delimited(b""), Err(ParseError::EmptyUpload));
    }

    #[test]
    fn test_upload_without_numbers() {
        assert_eq!(
            parse_delimited(b"name,city\nalice,paris\n"),
            Err(ParseError::NoNumericData)
        );
    }

    #[test]
    fn test_invalid_utf8_field_is_non_numeric() {
        let mut bytes = b"\xff\xfe,3.5\n".to_vec();
        bytes.extend_from_slice(b"4.5\n");
        assert_eq!(
            parse_delimited(&bytes).unwrap().values(),
            &[3.5, 4.5]
        );
    }

    #[test]
    fn test_nested_list_is_flattened_one_level() {
        let series = parse_nested(&json!([[1.0], [2.5], 3, "4.25"])).unwrap();
        assert_eq!(series.values(), &[1.0, 2.5, 3.0, 4.25]);
    }

    #[test]
    fn test_flat_list() {
        let series = parse_nested(&json!([0.1, 0.2, 0.3])).unwrap();
        assert_eq!(series.len(), 3);
    }

    #[test]
    fn test_nested_errors() {
        assert_eq!(parse_nested(&Value::Null), Err(ParseError::NoInput));
        assert_eq!(parse_nested(&json!([])), Err(ParseError::NoNumericData));
        assert_eq!(parse_nested(&json!([[]])), Err(ParseError::NoNumericData));
        assert!(matches!(
            parse_nested(&json!([[[1.0]]])),
            Err(ParseError::InvalidData { .. })
        ));
        assert!(matches!(
            parse_nested(&json!(["abc"])),
            Err(ParseError::InvalidData { .. })
        ));
        assert!(matches!(
            parse_nested(&json!({"data": [1]})),
            Err(ParseError::InvalidData { .. })
        ));
    }

    #[test]
    fn test_missing_source() {
        assert_eq!(parse_input(None), Err(ParseError::NoInput));
        let source = InputSource::Inline(json!([1, 2]));
        assert_eq!(parse_input(Some(&source)).unwrap().len(), 2);
    }
}
