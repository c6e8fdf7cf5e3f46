//! Newline-delimited JSON helpers for the cleaned intermediate file

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, VitalsError};

/// Fail with a validation error unless `path` is an existing regular file.
pub fn require_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(VitalsError::Validation(format!(
            "Please provide a valid file path for the input data. Given: {}",
            path.display()
        )))
    }
}

/// Read every non-blank line of `path` as a `T`.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    require_file(path)?;
    let reader = BufReader::new(File::open(path)?);

    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| {
            VitalsError::Parse(format!("{}:{}: {}", path.display(), idx + 1, e))
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Write one JSON document per line, replacing any existing file.
pub fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Reading;

    fn reading(sensor: &str, ts: i64) -> Reading {
        Reading {
            event_timestamp: ts,
            sensor_id: sensor.into(),
            heart_rate: 80.0,
            body_temperature: 37.0,
            spo2: 97,
            battery_level: 55,
            heart_rate_imputed: false,
        }
    }

    #[test]
    fn test_write_then_read_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let rows = vec![reading("a", 1), reading("b", 2)];

        write_records(&path, &rows).unwrap();
        let back: Vec<Reading> = read_records(&path).unwrap();
        assert_eq!(back, rows);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_missing_file_is_validation_error() {
        let err = read_records::<Reading>(Path::new("/definitely/not/here.jsonl")).unwrap_err();
        assert!(matches!(err, VitalsError::Validation(_)));
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "\n{\"nope\": 1}\n").unwrap();

        let err = read_records::<Reading>(&path).unwrap_err();
        assert!(err.to_string().contains(":2:"));
    }
}
