//! Decoding helpers shared by the adapters: CSV bodies, zip archives and
//! JSON documents into [`Table`]s.

use std::io::{Cursor, Read};

use chrono::DateTime;
use chrono_tz::Tz;
use grid_schema::{
    SchemaError, Table, Value,
    tz::{parse_instant, parse_utc_naive},
};
use serde_json::Value as Json;
use tracing::debug;

use crate::{errors::UpstreamError, http::Payload};

/// Parse a CSV document with a header row. Every cell is read as text;
/// blanks become nulls.
pub fn read_csv(report: &str, bytes: &[u8]) -> Result<Table, SchemaError> {
    read_csv_lines(report, bytes, &[], 0)
}

/// Parse a CSV document after dropping the lines at `skip_rows` (zero-based,
/// counted before the header) and the last `skip_footer` records.
pub fn read_csv_lines(
    report: &str,
    bytes: &[u8],
    skip_rows: &[usize],
    skip_footer: usize,
) -> Result<Table, SchemaError> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_start_matches('\u{feff}');
    let kept: String = if skip_rows.is_empty() {
        text.to_string()
    } else {
        text.lines()
            .enumerate()
            .filter(|(i, _)| !skip_rows.contains(i))
            .map(|(_, line)| format!("{line}\n"))
            .collect()
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(kept.as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| SchemaError::parse(report, e))?
        .iter()
        .map(str::to_string)
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| SchemaError::parse(report, e))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        if record.len() > headers.len() {
            return Err(SchemaError::parse(
                report,
                format!("row has {} fields, header has {}", record.len(), headers.len()),
            ));
        }
        let mut row: Vec<Value> = record.iter().map(Value::text).collect();
        row.resize(headers.len(), Value::Null);
        rows.push(row);
    }
    rows.truncate(rows.len().saturating_sub(skip_footer));
    let table = Table::from_rows(headers, rows)?;
    debug!(report, rows = table.len(), "parsed csv");
    Ok(table)
}

/// Every file in a zip archive, in archive order.
pub fn unzip(payload: &Payload) -> Result<Vec<(String, Vec<u8>)>, UpstreamError> {
    let decode = |e: zip::result::ZipError| UpstreamError::Decode {
        url: payload.url.clone(),
        message: e.to_string(),
    };
    let mut archive = zip::ZipArchive::new(Cursor::new(&payload.body)).map_err(decode)?;
    let mut files = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(decode)?;
        if file.is_dir() {
            continue;
        }
        let mut buf = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut buf).map_err(|e| UpstreamError::Decode {
            url: payload.url.clone(),
            message: e.to_string(),
        })?;
        files.push((file.name().to_string(), buf));
    }
    Ok(files)
}

/// Parse the named columns as numbers.
pub fn numbers(table: &mut Table, columns: &[&str]) -> Result<(), SchemaError> {
    for c in columns {
        table.map_column(c, to_number)?;
    }
    Ok(())
}

/// Parse every column except `except` as numbers.
pub fn numbers_except(table: &mut Table, except: &[&str]) -> Result<(), SchemaError> {
    let names: Vec<String> = table
        .columns()
        .iter()
        .filter(|c| !except.contains(&c.as_str()))
        .cloned()
        .collect();
    for c in &names {
        table.map_column(c, to_number)?;
    }
    Ok(())
}

fn to_number(v: &Value) -> Value {
    match v {
        Value::Text(s) => Value::number(s),
        other => other.clone(),
    }
}

/// Parse a text column of timestamps that carry their own offset and
/// convert them to `tz`.
pub fn instants(table: &mut Table, column: &str, tz: Tz) -> Result<(), SchemaError> {
    convert_times(table, column, |s| parse_instant(s, tz))
}

/// Parse a text column of UTC wall times and convert them to `tz`.
pub fn utc_times(
    table: &mut Table,
    column: &str,
    formats: &[&str],
    tz: Tz,
) -> Result<(), SchemaError> {
    convert_times(table, column, |s| parse_utc_naive(s, formats, tz))
}

fn convert_times(
    table: &mut Table,
    column: &str,
    parse: impl Fn(&str) -> Option<DateTime<Tz>>,
) -> Result<(), SchemaError> {
    let i = table.require(column)?;
    let values = table
        .rows()
        .iter()
        .enumerate()
        .map(|(row, r)| match &r[i] {
            Value::Timestamp(t) => Ok(Value::Timestamp(*t)),
            other => {
                let raw = other.to_string();
                parse(&raw)
                    .map(Value::Timestamp)
                    .ok_or_else(|| SchemaError::InvalidValue {
                        column: column.to_string(),
                        row,
                        message: format!("unrecognized time `{raw}`"),
                    })
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    table.set_column(column, values)
}

/// Walk `path` through nested JSON objects.
pub fn json_path<'a>(report: &str, root: &'a Json, path: &[&str]) -> Result<&'a Json, SchemaError> {
    path.iter().try_fold(root, |node, key| {
        node.get(key)
            .ok_or_else(|| SchemaError::parse(report, format!("missing key `{}`", path.join("."))))
    })
}

/// A JSON array at `path`.
pub fn json_array<'a>(
    report: &str,
    root: &'a Json,
    path: &[&str],
) -> Result<&'a Vec<Json>, SchemaError> {
    json_path(report, root, path)?
        .as_array()
        .ok_or_else(|| SchemaError::parse(report, format!("`{}` is not an array", path.join("."))))
}

/// A JSON scalar as a table cell.
pub fn json_value(v: &Json) -> Value {
    match v {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .or_else(|| n.as_f64().map(Value::Float))
            .unwrap_or(Value::Null),
        Json::String(s) => Value::text(s),
        other => Value::Text(other.to_string()),
    }
}

/// Build a table from JSON records, taking `columns` from each object.
/// Absent keys become nulls.
pub fn json_records(records: &[Json], columns: &[&str]) -> Result<Table, SchemaError> {
    let rows = records
        .iter()
        .map(|r| {
            columns
                .iter()
                .map(|c| r.get(c).map_or(Value::Null, json_value))
                .collect()
        })
        .collect();
    Table::from_rows(columns.iter().copied(), rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn csv_skips_metadata_and_footer() {
        let body = b"\"C\",\"report\"\n\"C\",\"x\"\n\"C\",\"y\"\n\"C\",\"z\"\n\"H\",\"Date\",\"Gen Mw\"\n\"H\",\"\",\"MW\"\n\"D\",\"01/02/2024\",\"12.5\"\n\"T\",\"1\"\n";
        let t = read_csv_lines("genfuelmix", body, &[0, 1, 2, 3, 5], 1).unwrap();
        assert_eq!(t.columns(), ["H", "Date", "Gen Mw"]);
        assert_eq!(t.len(), 1);
        assert_eq!(t.rows()[0][2], Value::Text("12.5".into()));
    }

    #[test]
    fn csv_pads_short_rows_and_rejects_long_ones() {
        let t = read_csv("r", b"a,b\n1\n").unwrap();
        assert_eq!(t.rows()[0], vec![Value::Text("1".into()), Value::Null]);
        assert!(matches!(read_csv("r", b"a\n1,2\n"), Err(SchemaError::Parse { .. })));
    }

    #[test]
    fn numbers_parse_in_place() {
        let mut t = read_csv("r", b"Name,LBMP\nWEST,21.5\nN.Y.C.,\n").unwrap();
        numbers_except(&mut t, &["Name"]).unwrap();
        assert_eq!(t.rows()[0][1], Value::Float(21.5));
        assert_eq!(t.rows()[1][1], Value::Null);
    }

    #[test]
    fn unzips_members() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut w = zip::ZipWriter::new(&mut buf);
            let opts = zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated);
            w.start_file("20240101damlbmp_zone.csv", opts).unwrap();
            w.write_all(b"a,b\n1,2\n").unwrap();
            w.finish().unwrap();
        }
        let payload = Payload {
            url: "mem".into(),
            content_type: None,
            body: buf.into_inner(),
        };
        let files = unzip(&payload).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].0, "20240101damlbmp_zone.csv");
        assert_eq!(read_csv(&files[0].0, &files[0].1).unwrap().len(), 1);
    }

    #[test]
    fn offset_and_utc_columns_land_in_local_time() {
        let tz = chrono_tz::America::Chicago;
        let mut t = read_csv("r", b"GMT,UTC\n2024-07-01T05:00:00Z,07/01/2024 05:00\n").unwrap();
        instants(&mut t, "GMT", tz).unwrap();
        utc_times(&mut t, "UTC", &["%m/%d/%Y %H:%M"], tz).unwrap();
        let a = t.rows()[0][0].as_timestamp().unwrap();
        let b = t.rows()[0][1].as_timestamp().unwrap();
        assert_eq!(a, b);
        assert_eq!(grid_schema::tz::to_rfc3339(&a), "2024-07-01T00:00:00-05:00");

        let mut bad = read_csv("r", b"GMT\nyesterday\n").unwrap();
        assert!(matches!(
            instants(&mut bad, "GMT", tz),
            Err(SchemaError::InvalidValue { row: 0, .. })
        ));
    }

    #[test]
    fn json_helpers() {
        let doc: Json = serde_json::json!({"a": {"b": [{"x": 1, "y": "s"}, {"x": 2.5}]}});
        let arr = json_array("doc", &doc, &["a", "b"]).unwrap();
        let t = json_records(arr, &["x", "y"]).unwrap();
        assert_eq!(t.rows()[0], vec![Value::Int(1), Value::Text("s".into())]);
        assert_eq!(t.rows()[1], vec![Value::Float(2.5), Value::Null]);
        assert!(json_path("doc", &doc, &["a", "c"]).is_err());
    }
}
