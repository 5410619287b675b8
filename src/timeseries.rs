//! Location-tagged time series tables stored as `<name>.csv` plus a
//! `<name>.json` metadata sidecar.
//!
//! The first CSV column holds the timestamp (its header is arbitrary), the
//! second the location, and every further column a named value.

use crate::error::{ModelError, ModelResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const SECONDS_PER_DAY: f64 = 86400.0;

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
const OUTPUT_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub timestamp: NaiveDateTime,
    pub location: String,
    pub values: Vec<String>, // Raw cells, one per value column
}

#[derive(Clone, Debug, Default)]
pub struct TimeSeries {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub metadata: Map<String, Value>,
}

impl TimeSeries {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        TimeSeries {
            name: name.into(),
            columns,
            rows: Vec::new(),
            metadata: Map::new(),
        }
    }

    pub fn csv_path(data_dir: &Path, name: &str) -> PathBuf {
        data_dir.join(format!("{name}.csv"))
    }

    pub fn metadata_path(data_dir: &Path, name: &str) -> PathBuf {
        data_dir.join(format!("{name}.json"))
    }

    /// Read `<data_dir>/<name>.csv` and its metadata sidecar.
    ///
    /// Rows whose timestamp cannot be parsed are skipped. A missing sidecar
    /// gives empty metadata.
    pub fn read(data_dir: &Path, name: &str) -> ModelResult<Self> {
        let path = Self::csv_path(data_dir, name);
        let csv_err = |source| ModelError::Csv {
            path: path.clone(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(csv_err)?;

        let headers = reader.headers().map_err(csv_err)?.clone();
        let columns: Vec<String> = headers.iter().skip(2).map(str::to_string).collect();

        let mut rows = Vec::new();
        let mut skipped = 0usize;
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            let Some(timestamp) = record.get(0).and_then(parse_timestamp) else {
                skipped += 1;
                continue;
            };
            let location = record.get(1).unwrap_or_default().to_string();
            let values = (0..columns.len())
                .map(|i| record.get(i + 2).unwrap_or_default().to_string())
                .collect();
            rows.push(Row {
                timestamp,
                location,
                values,
            });
        }
        if skipped > 0 {
            debug!(file = %path.display(), skipped, "Skipped rows with unparseable timestamps");
        }

        Ok(TimeSeries {
            name: name.to_string(),
            columns,
            rows,
            metadata: read_metadata(&Self::metadata_path(data_dir, name))?,
        })
    }

    /// Write the table and its metadata into `data_dir`, creating it if needed.
    pub fn write(&self, data_dir: &Path) -> ModelResult<PathBuf> {
        fs::create_dir_all(data_dir).map_err(|source| ModelError::Io {
            path: data_dir.to_path_buf(),
            source,
        })?;

        let path = Self::csv_path(data_dir, &self.name);
        let csv_err = |source| ModelError::Csv {
            path: path.clone(),
            source,
        };
        let mut writer = csv::Writer::from_path(&path).map_err(csv_err)?;
        let mut header = vec!["timestamp".to_string(), "location".to_string()];
        header.extend(self.columns.iter().cloned());
        writer.write_record(&header).map_err(csv_err)?;
        for row in &self.rows {
            let mut record = Vec::with_capacity(row.values.len() + 2);
            record.push(row.timestamp.format(OUTPUT_TIMESTAMP_FORMAT).to_string());
            record.push(row.location.clone());
            record.extend(row.values.iter().cloned());
            writer.write_record(&record).map_err(csv_err)?;
        }
        writer.flush().map_err(|source| ModelError::Io {
            path: path.clone(),
            source,
        })?;

        let meta_path = Self::metadata_path(data_dir, &self.name);
        let file = File::create(&meta_path).map_err(|source| ModelError::Io {
            path: meta_path.clone(),
            source,
        })?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.metadata).map_err(|source| {
            ModelError::Json {
                path: meta_path.clone(),
                source,
            }
        })?;
        Ok(path)
    }

    pub fn push(&mut self, timestamp: NaiveDateTime, location: &str, values: &[f64]) {
        self.rows.push(Row {
            timestamp,
            location: location.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        });
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Parse every cell of a value column. `role` names the column's purpose
    /// in error messages.
    pub fn numeric_column(&self, column: &str, role: &str, path: &Path) -> ModelResult<Vec<f64>> {
        let index = self
            .column_index(column)
            .ok_or_else(|| ModelError::MissingColumn {
                role: role.to_string(),
                column: column.to_string(),
                path: path.to_path_buf(),
            })?;
        self.rows
            .iter()
            .enumerate()
            .map(|(row, r)| {
                let cell = &r.values[index];
                match cell.parse::<f64>() {
                    Ok(value) if value.is_finite() => Ok(value),
                    _ => Err(ModelError::InvalidValue {
                        column: column.to_string(),
                        row,
                        value: cell.clone(),
                    }),
                }
            })
            .collect()
    }

    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.rows.iter().map(|r| r.timestamp).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn read_metadata(path: &Path) -> ModelResult<Map<String, Value>> {
    if !path.exists() {
        warn!(file = %path.display(), "No metadata sidecar; using empty metadata");
        return Ok(Map::new());
    }
    let text = fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&text).map_err(|source| ModelError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => {
            warn!(file = %path.display(), "Metadata is not a JSON object; ignoring it");
            Ok(Map::new())
        }
    }
}

/// Parse an ISO-8601 style timestamp, with or without time and offset.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, format) {
            return Some(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.naive_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// The `timestep_seconds` entry, accepting numbers and numeric strings.
pub fn timestep_seconds(metadata: &Map<String, Value>) -> Option<f64> {
    match metadata.get("timestep_seconds")? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Temporal scaling factor: time step length in days, 1.0 when unknown.
pub fn temporal_scaling_factor(metadata: &Map<String, Value>) -> f64 {
    match timestep_seconds(metadata) {
        Some(seconds) if seconds > 0.0 && seconds.is_finite() => seconds / SECONDS_PER_DAY,
        Some(seconds) => {
            warn!(seconds, "Unusable timestep_seconds; assuming daily steps");
            1.0
        }
        None => {
            if metadata.contains_key("timestep_seconds") {
                warn!("timestep_seconds is not numeric; assuming daily steps");
            } else {
                debug!("No timestep_seconds in metadata; assuming daily steps");
            }
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn tsf_is_monotonic_and_exact_for_daily() {
        let hourly = temporal_scaling_factor(&meta(json!({"timestep_seconds": 3600})));
        let daily = temporal_scaling_factor(&meta(json!({"timestep_seconds": 86400})));
        let two_days = temporal_scaling_factor(&meta(json!({"timestep_seconds": 172800})));
        assert!(hourly < daily && daily < two_days);
        assert_eq!(daily, 1.0);
    }

    #[test]
    fn tsf_defaults_to_one() {
        assert_eq!(temporal_scaling_factor(&Map::new()), 1.0);
        assert_eq!(
            temporal_scaling_factor(&meta(json!({"timestep_seconds": "hourly"}))),
            1.0
        );
        assert_eq!(
            temporal_scaling_factor(&meta(json!({"timestep_seconds": 0}))),
            1.0
        );
    }

    #[test]
    fn tsf_accepts_numeric_strings() {
        let tsf = temporal_scaling_factor(&meta(json!({"timestep_seconds": "43200"})));
        assert_eq!(tsf, 0.5);
    }

    #[test]
    fn parses_common_timestamp_forms() {
        let expected = NaiveDate::from_ymd_opt(2023, 1, 2)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2023-01-02T06:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2023-01-02 06:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2023-01-02T06:00:00Z"), Some(expected));
        assert_eq!(
            parse_timestamp("2023-01-02"),
            NaiveDate::from_ymd_opt(2023, 1, 2).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_timestamp("not a date"), None);
    }

    #[test]
    fn round_trips_through_files() {
        let dir = std::env::temp_dir().join(format!("bucket_routing_ts_{}", std::process::id()));
        let ts0 = parse_timestamp("2023-01-01").unwrap();
        let mut series = TimeSeries::new("level", vec!["waterLevel".to_string()]);
        series.push(ts0, "H1_Forest_Soil", &[19.0]);
        series
            .metadata
            .insert("timestep_seconds".to_string(), json!(86400));
        series.write(&dir).unwrap();

        let back = TimeSeries::read(&dir, "level").unwrap();
        assert_eq!(back.columns, vec!["waterLevel"]);
        assert_eq!(back.rows[0].location, "H1_Forest_Soil");
        let values = back
            .numeric_column("waterLevel", "water level", Path::new("level.csv"))
            .unwrap();
        assert_eq!(values, vec![19.0]);
        assert_eq!(temporal_scaling_factor(&back.metadata), 1.0);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn skips_rows_with_bad_timestamps() {
        let dir = std::env::temp_dir().join(format!("bucket_routing_bad_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("pet.csv"),
            "id,location,pet_mm_day\n2023-01-01T00:00:00,H1,1.5\ngarbage,H1,9.0\n2023-01-02T00:00:00,H1,2.5\n",
        )
        .unwrap();
        let series = TimeSeries::read(&dir, "pet").unwrap();
        assert_eq!(series.len(), 2);
        assert!(series.metadata.is_empty());
        let err = series
            .numeric_column("pet", "PET", Path::new("pet.csv"))
            .unwrap_err();
        assert!(matches!(err, ModelError::MissingColumn { .. }));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn rejects_non_finite_cells() {
        let ts0 = parse_timestamp("2023-01-01").unwrap();
        for cell in ["NaN", "inf", "-infinity", "wet"] {
            let mut series = TimeSeries::new("rain", vec!["rain_depth".to_string()]);
            series.rows.push(Row {
                timestamp: ts0,
                location: "H1".to_string(),
                values: vec!["1.0".to_string()],
            });
            series.rows.push(Row {
                timestamp: ts0,
                location: "H1".to_string(),
                values: vec![cell.to_string()],
            });
            let err = series
                .numeric_column("rain_depth", "rain depth", Path::new("rain.csv"))
                .unwrap_err();
            match err {
                ModelError::InvalidValue { row, value, .. } => {
                    assert_eq!(row, 1);
                    assert_eq!(value, cell);
                }
                other => panic!("unexpected error {other}"),
            }
        }
    }
}
