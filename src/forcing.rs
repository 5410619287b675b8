use crate::error::{ModelError, ModelResult};
use crate::timeseries::{SECONDS_PER_DAY, TimeSeries, temporal_scaling_factor, timestep_seconds};
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

/// Names of the input columns that carry each forcing variable.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ColumnSchema {
    pub rain_depth: String,     // Rain reaching the ground [mm]
    pub snowmelt_depth: String, // Snowmelt released [mm]
    pub pet: String,            // Potential evapotranspiration [mm]
}

impl Default for ColumnSchema {
    fn default() -> Self {
        ColumnSchema {
            rain_depth: "rain_depth".to_string(),
            snowmelt_depth: "snowmelt_depth".to_string(),
            pet: "pet_mm_day".to_string(),
        }
    }
}

/// Inputs for a single time step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepForcing {
    pub rain_depth: f64,
    pub snowmelt_depth: f64,
    pub pet: f64,
}

impl StepForcing {
    pub fn precipitation(&self) -> f64 {
        self.rain_depth + self.snowmelt_depth
    }
}

/// Aligned forcing for one land-cover unit.
#[derive(Clone, Debug)]
pub struct ForcingSeries {
    pub timestamps: Vec<NaiveDateTime>,
    pub rain_depth: Vec<f64>,
    pub snowmelt_depth: Vec<f64>,
    pub pet: Vec<f64>,
    pub tsf: f64,              // Temporal scaling factor [-]
    pub timestep_seconds: f64, // Step length carried to outputs [s]
}

impl ForcingSeries {
    /// Build from plain vectors, truncating to the shortest one.
    pub fn from_values(
        timestamps: Vec<NaiveDateTime>,
        rain_depth: Vec<f64>,
        snowmelt_depth: Vec<f64>,
        pet: Vec<f64>,
        tsf: f64,
    ) -> Self {
        let n = timestamps
            .len()
            .min(rain_depth.len())
            .min(snowmelt_depth.len())
            .min(pet.len());
        let mut series = ForcingSeries {
            timestamps,
            rain_depth,
            snowmelt_depth,
            pet,
            tsf,
            timestep_seconds: tsf * SECONDS_PER_DAY,
        };
        series.truncate(n);
        series
    }

    /// Resolve the configured columns in the precipitation and PET tables and
    /// align them by row position.
    ///
    /// Timestamps come from the PET table. The scaling factor is taken from
    /// the PET metadata, falling back to the precipitation metadata.
    pub fn from_series(
        precipitation: &TimeSeries,
        precipitation_path: &Path,
        pet: &TimeSeries,
        pet_path: &Path,
        schema: &ColumnSchema,
    ) -> ModelResult<Self> {
        let rain =
            precipitation.numeric_column(&schema.rain_depth, "rain depth", precipitation_path)?;
        let snowmelt = precipitation.numeric_column(
            &schema.snowmelt_depth,
            "snowmelt depth",
            precipitation_path,
        )?;
        let pet_values = pet.numeric_column(&schema.pet, "PET", pet_path)?;

        if precipitation.len() != pet.len() {
            warn!(
                precipitation = precipitation.len(),
                pet = pet.len(),
                "Input series differ in length; using the shorter"
            );
        }
        let n = precipitation.len().min(pet.len());
        if n == 0 {
            return Err(ModelError::EmptySeries {
                path: pet_path.to_path_buf(),
            });
        }

        let mismatched = precipitation
            .rows
            .iter()
            .zip(&pet.rows)
            .filter(|(p, e)| p.timestamp != e.timestamp)
            .count();
        if mismatched > 0 {
            warn!(
                rows = mismatched,
                "Input series timestamps disagree; rows are aligned by position"
            );
        }

        let metadata = if timestep_seconds(&pet.metadata).is_some() {
            &pet.metadata
        } else {
            &precipitation.metadata
        };
        let tsf = temporal_scaling_factor(metadata);
        debug!(tsf, steps = n, "Forcing aligned");

        let mut series =
            ForcingSeries::from_values(pet.timestamps(), rain, snowmelt, pet_values, tsf);
        series.truncate(n);
        series.timestep_seconds = timestep_seconds(metadata)
            .filter(|s| *s > 0.0 && s.is_finite())
            .unwrap_or(SECONDS_PER_DAY);
        Ok(series)
    }

    fn truncate(&mut self, n: usize) {
        self.timestamps.truncate(n);
        self.rain_depth.truncate(n);
        self.snowmelt_depth.truncate(n);
        self.pet.truncate(n);
    }

    pub fn step(&self, t: usize) -> StepForcing {
        StepForcing {
            rain_depth: self.rain_depth[t],
            snowmelt_depth: self.snowmelt_depth[t],
            pet: self.pet[t],
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeseries::parse_timestamp;
    use serde_json::json;

    fn table(name: &str, columns: &[&str], rows: &[(&str, &[f64])]) -> TimeSeries {
        let mut ts = TimeSeries::new(name, columns.iter().map(|c| c.to_string()).collect());
        for (stamp, values) in rows {
            ts.push(parse_timestamp(stamp).unwrap(), "H1_Forest", values);
        }
        ts
    }

    #[test]
    fn aligns_by_position_to_shorter_series() {
        let precip = table(
            "rain",
            &["snowfall_depth", "rain_depth", "snowmelt_depth"],
            &[
                ("2023-01-01", &[0.0, 5.0, 1.0]),
                ("2023-01-02", &[0.0, 2.0, 0.0]),
                ("2023-01-03", &[0.0, 7.0, 0.0]),
            ],
        );
        let mut pet = table(
            "pet",
            &["pet_mm_day"],
            &[("2023-01-01", &[2.0]), ("2023-01-02", &[3.0])],
        );
        pet.metadata.insert("timestep_seconds".to_string(), json!(3600));

        let forcing = ForcingSeries::from_series(
            &precip,
            Path::new("rain.csv"),
            &pet,
            Path::new("pet.csv"),
            &ColumnSchema::default(),
        )
        .unwrap();
        assert_eq!(forcing.len(), 2);
        assert_eq!(forcing.step(0).precipitation(), 6.0);
        assert_eq!(forcing.step(1).pet, 3.0);
        assert_eq!(forcing.tsf, 3600.0 / 86400.0);
        assert_eq!(forcing.timestep_seconds, 3600.0);
    }

    #[test]
    fn missing_column_is_a_typed_error() {
        let precip = table("rain", &["precipitation"], &[("2023-01-01", &[5.0])]);
        let pet = table("pet", &["pet_mm_day"], &[("2023-01-01", &[2.0])]);
        let err = ForcingSeries::from_series(
            &precip,
            Path::new("rain.csv"),
            &pet,
            Path::new("pet.csv"),
            &ColumnSchema::default(),
        )
        .unwrap_err();
        match err {
            ModelError::MissingColumn { role, column, .. } => {
                assert_eq!(role, "rain depth");
                assert_eq!(column, "rain_depth");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn falls_back_to_precipitation_metadata() {
        let mut precip = table(
            "rain",
            &["rain_depth", "snowmelt_depth"],
            &[("2023-01-01", &[1.0, 0.0])],
        );
        precip
            .metadata
            .insert("timestep_seconds".to_string(), json!(172800));
        let pet = table("pet", &["pet_mm_day"], &[("2023-01-01", &[2.0])]);
        let forcing = ForcingSeries::from_series(
            &precip,
            Path::new("rain.csv"),
            &pet,
            Path::new("pet.csv"),
            &ColumnSchema::default(),
        )
        .unwrap();
        assert_eq!(forcing.tsf, 2.0);
    }

    #[test]
    fn custom_schema_from_toml() {
        let schema: ColumnSchema = toml::from_str(r#"pet = "pet""#).unwrap();
        assert_eq!(schema.pet, "pet");
        assert_eq!(schema.rain_depth, "rain_depth");
    }
}
