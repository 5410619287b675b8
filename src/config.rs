//! Catchment structure, output file mapping and run settings.
//!
//! `generated_catchment.json` describes HRUs, their land-cover types and the
//! buckets in each. `ModelTimeSeries.json` maps every land-cover type and
//! bucket to the input and output file names. `model_settings.toml` is
//! optional and holds the input column names and the routing mode.

use crate::bucket::BucketParams;
use crate::error::{ModelError, ModelResult};
use crate::forcing::ColumnSchema;
use crate::land_cover::normalize_precipitation_flags;
use crate::routing::RoutingMode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use tracing::warn;

pub const CATCHMENT_FILE: &str = "generated_catchment.json";
pub const TIMESERIES_FILE: &str = "ModelTimeSeries.json";
pub const SETTINGS_FILE: &str = "model_settings.toml";

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Catchment {
    pub name: String,
    pub abbreviation: String,
    #[serde(rename = "HRUs")]
    pub hrus: Vec<Hru>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Hru {
    pub name: String,
    pub abbreviation: String,
    pub subcatchment: Subcatchment,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Subcatchment {
    pub land_cover_types: Vec<LandCoverConfig>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LandCoverConfig {
    pub name: String,
    pub abbreviation: String,
    pub percent_cover: f64,
    pub buckets: Vec<BucketParams>,
}

/// A change made by the normalization pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Normalization {
    pub hru: String,
    pub land_cover: String,
    pub bucket: String,
}

impl Catchment {
    pub fn load(path: &Path) -> ModelResult<Self> {
        read_json(path)
    }

    pub fn find_land_cover(&self, hru: &str, land_cover: &str) -> Option<&LandCoverConfig> {
        self.hrus
            .iter()
            .find(|h| h.name == hru)?
            .subcatchment
            .land_cover_types
            .iter()
            .find(|lc| lc.name == land_cover)
    }

    /// Make sure every land-cover type has a bucket receiving precipitation,
    /// flagging the first bucket where none is. Every change is logged and
    /// returned.
    pub fn normalize(&mut self) -> Vec<Normalization> {
        let mut changes = Vec::new();
        for hru in &mut self.hrus {
            for lc in &mut hru.subcatchment.land_cover_types {
                if let Some(bucket) = normalize_precipitation_flags(&mut lc.buckets) {
                    warn!(
                        hru = %hru.name,
                        land_cover = %lc.name,
                        bucket = %bucket,
                        "No bucket receives precipitation; flagging the first one"
                    );
                    changes.push(Normalization {
                        hru: hru.name.clone(),
                        land_cover: lc.name.clone(),
                        bucket,
                    });
                }
            }
        }
        changes
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct FileRef {
    #[serde(rename = "fileName")]
    pub file_name: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BucketFiles {
    pub actual_evapotranspiration: Option<FileRef>,
    pub water_level: Option<FileRef>,
    pub water_inputs: Option<FileRef>,
    pub water_outputs: Option<FileRef>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct BucketMapping {
    pub name: String,
    #[serde(rename = "timeSeries")]
    pub files: BucketFiles,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LandCoverFiles {
    pub potential_evapotranspiration: Option<FileRef>,
    pub rain_and_snow: Option<FileRef>,
    pub buckets: Vec<BucketMapping>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct LandCoverMapping {
    pub name: String,
    #[serde(rename = "timeSeries")]
    pub files: LandCoverFiles,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubcatchmentMapping {
    pub land_cover_types: Vec<LandCoverMapping>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct HruFiles {
    pub subcatchment: SubcatchmentMapping,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct HruMapping {
    pub name: String,
    #[serde(rename = "timeSeries")]
    pub files: HruFiles,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct HruList {
    #[serde(rename = "HRUs", default)]
    hrus: Vec<HruMapping>,
}

// Either `{"catchment": {"HRUs": [...]}}` or `{"HRUs": [...]}`
#[derive(Deserialize)]
#[serde(untagged)]
enum MappingLayout {
    Nested { catchment: HruList },
    Flat(HruList),
}

/// The mapping from land-cover units and buckets to time series file names.
#[derive(Clone, Debug, Default)]
pub struct ModelTimeSeries {
    pub hrus: Vec<HruMapping>,
}

/// Input files of one land-cover unit, with its bucket output mapping.
#[derive(Clone, Debug)]
pub struct UnitFiles<'a> {
    pub hru: &'a str,
    pub land_cover: &'a str,
    pub pet: &'a str,
    pub rain_and_snow: &'a str,
    pub buckets: &'a [BucketMapping],
}

impl ModelTimeSeries {
    pub fn load(path: &Path) -> ModelResult<Self> {
        let layout: MappingLayout = read_json(path)?;
        let hrus = match layout {
            MappingLayout::Nested { catchment } => catchment.hrus,
            MappingLayout::Flat(list) => list.hrus,
        };
        Ok(ModelTimeSeries { hrus })
    }

    /// Land-cover units that name both input files, in declaration order.
    pub fn units(&self) -> Vec<UnitFiles<'_>> {
        let mut units = Vec::new();
        for hru in &self.hrus {
            for lc in &hru.files.subcatchment.land_cover_types {
                let files = &lc.files;
                match (&files.potential_evapotranspiration, &files.rain_and_snow) {
                    (Some(pet), Some(rain))
                        if !pet.file_name.is_empty() && !rain.file_name.is_empty() =>
                    {
                        units.push(UnitFiles {
                            hru: &hru.name,
                            land_cover: &lc.name,
                            pet: &pet.file_name,
                            rain_and_snow: &rain.file_name,
                            buckets: &files.buckets,
                        })
                    }
                    _ => warn!(
                        hru = %hru.name,
                        land_cover = %lc.name,
                        "No input files configured; land cover not simulated"
                    ),
                }
            }
        }
        units
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RoutingSettings {
    pub mode: RoutingMode,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub aggregate: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        OutputSettings { aggregate: true }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub columns: ColumnSchema,
    pub routing: RoutingSettings,
    pub output: OutputSettings,
}

impl Settings {
    /// Load settings, using defaults when the file does not exist.
    pub fn load(path: &Path) -> ModelResult<Self> {
        if !path.exists() {
            return Ok(Settings::default());
        }
        let text = read_text(path)?;
        toml::from_str(&text).map_err(|source| ModelError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn read_text(path: &Path) -> ModelResult<String> {
    fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> ModelResult<T> {
    let text = read_text(path)?;
    serde_json::from_str(&text).map_err(|source| ModelError::Json {
        path: path.to_path_buf(),
        source,
    })
}
