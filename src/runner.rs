use crate::aggregate::{RUNOFF_TO_REACH, WaterOutputs};
use crate::config::{
    BucketMapping, CATCHMENT_FILE, Catchment, FileRef, ModelTimeSeries, Normalization,
    SETTINGS_FILE, Settings, TIMESERIES_FILE, UnitFiles,
};
use crate::error::{ModelError, ModelResult};
use crate::forcing::ForcingSeries;
use crate::land_cover::LandCoverUnit;
use crate::model::{BucketSeries, LandCoverModel, SimulationOutput};
use crate::observer::RunDiagnostics;
use crate::timeseries::TimeSeries;
use chrono::NaiveDateTime;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const AGGREGATED_DIR: &str = "aggregated";

// Share of steps above which a clamping bucket is reported
const CLAMP_WARNING_SHARE: f64 = 0.05;

/// Outcome of a catchment run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub units_run: usize,
    pub units_skipped: usize,
    pub files_written: Vec<PathBuf>,
}

struct UnitRun {
    hru: String,
    percent_cover: f64,
    timestep_seconds: f64,
    outputs: WaterOutputs,
}

/// Drives every configured land-cover unit of a data folder.
pub struct CatchmentRunner {
    data_dir: PathBuf,
    catchment: Catchment,
    mapping: ModelTimeSeries,
    settings: Settings,
    normalizations: Vec<Normalization>,
}

impl CatchmentRunner {
    /// Load the catchment, file mapping and settings from `data_dir`.
    pub fn load(data_dir: impl Into<PathBuf>) -> ModelResult<Self> {
        let data_dir = data_dir.into();
        let mut catchment = Catchment::load(&data_dir.join(CATCHMENT_FILE))?;
        let normalizations = catchment.normalize();
        let mapping = ModelTimeSeries::load(&data_dir.join(TIMESERIES_FILE))?;
        let settings = Settings::load(&data_dir.join(SETTINGS_FILE))?;
        info!(
            catchment = %catchment.name,
            hrus = catchment.hrus.len(),
            mode = ?settings.routing.mode,
            "Configuration loaded"
        );
        Ok(CatchmentRunner {
            data_dir,
            catchment,
            mapping,
            settings,
            normalizations,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Precipitation flags changed while loading.
    pub fn normalizations(&self) -> &[Normalization] {
        &self.normalizations
    }

    /// Simulate every unit, skipping those whose inputs cannot be used.
    pub fn run(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut by_hru: Vec<(String, Vec<(f64, WaterOutputs)>, f64)> = Vec::new();

        for files in self.mapping.units() {
            let key = format!("{}_{}", files.hru, files.land_cover);
            match self.run_unit(&files, &mut summary.files_written) {
                Ok(unit) => {
                    summary.units_run += 1;
                    if !self.settings.output.aggregate {
                        continue;
                    }
                    if let Some(path) = self.write_aggregate(
                        &unit.outputs,
                        &format!("{key}_waterOutputs"),
                        &key,
                        "bucket_to_landcover",
                        unit.timestep_seconds,
                    ) {
                        summary.files_written.push(path);
                    }
                    match by_hru.iter_mut().find(|(hru, _, _)| *hru == unit.hru) {
                        Some((_, land_covers, _)) => {
                            land_covers.push((unit.percent_cover, unit.outputs))
                        }
                        None => by_hru.push((
                            unit.hru,
                            vec![(unit.percent_cover, unit.outputs)],
                            unit.timestep_seconds,
                        )),
                    }
                }
                Err(err) => {
                    summary.units_skipped += 1;
                    warn!(unit = %key, error = %err, "Skipping land cover");
                }
            }
        }

        for (hru, land_covers, timestep_seconds) in &by_hru {
            let weighted: Vec<(f64, &WaterOutputs)> =
                land_covers.iter().map(|(p, w)| (*p, w)).collect();
            let Some(combined) = WaterOutputs::from_subcatchment(&weighted) else {
                continue;
            };
            let location = format!("{hru}_subcatchment");
            if let Some(path) = self.write_aggregate(
                &combined,
                &format!("{location}_waterOutputs"),
                &location,
                "landcover_to_subcatchment",
                *timestep_seconds,
            ) {
                summary.files_written.push(path);
            }
        }

        info!(
            units_run = summary.units_run,
            units_skipped = summary.units_skipped,
            files = summary.files_written.len(),
            "Run finished"
        );
        summary
    }

    fn run_unit(
        &self,
        files: &UnitFiles<'_>,
        written: &mut Vec<PathBuf>,
    ) -> ModelResult<UnitRun> {
        let config = self
            .catchment
            .find_land_cover(files.hru, files.land_cover)
            .ok_or_else(|| ModelError::InvalidBucket {
                bucket: format!("{}_{}", files.hru, files.land_cover),
                reason: format!("land cover not found in {CATCHMENT_FILE}"),
            })?;
        let unit = LandCoverUnit::new(
            files.hru,
            files.land_cover,
            config.percent_cover,
            config.buckets.clone(),
        )?;

        let precipitation = TimeSeries::read(&self.data_dir, files.rain_and_snow)?;
        let pet = TimeSeries::read(&self.data_dir, files.pet)?;
        let forcing = ForcingSeries::from_series(
            &precipitation,
            &TimeSeries::csv_path(&self.data_dir, files.rain_and_snow),
            &pet,
            &TimeSeries::csv_path(&self.data_dir, files.pet),
            &self.settings.columns,
        )?;

        let key = unit.key();
        let percent_cover = unit.percent_cover;
        let mut diagnostics = RunDiagnostics::new(unit.len());
        let mut model = LandCoverModel::new(unit, forcing.tsf, self.settings.routing.mode);
        let output = model.run(&forcing, &mut diagnostics);
        debug!(unit = %key, steps = output.len(), "Land cover simulated");

        for (bucket, share) in diagnostics.frequent_clampers(CLAMP_WARNING_SHARE) {
            warn!(
                unit = %key,
                bucket = %output.buckets[bucket].name,
                share,
                "Bucket depth clamped at zero in many steps"
            );
        }

        for (i, series) in output.buckets.iter().enumerate() {
            let Some(mapping) = bucket_mapping(files.buckets, &series.name, i) else {
                warn!(
                    unit = %key,
                    bucket = %series.name,
                    "No output files configured for bucket"
                );
                continue;
            };
            let location = format!("{key}_{}", series.name);
            let step = forcing.timestep_seconds;
            let tables = bucket_outputs(&output, series, mapping, &location, step);
            for ts in tables {
                written.push(ts.write(&self.data_dir)?);
            }
        }

        Ok(UnitRun {
            hru: files.hru.to_string(),
            percent_cover,
            timestep_seconds: forcing.timestep_seconds,
            outputs: WaterOutputs::from_land_cover(&output),
        })
    }

    fn write_aggregate(
        &self,
        outputs: &WaterOutputs,
        name: &str,
        location: &str,
        level: &str,
        timestep_seconds: f64,
    ) -> Option<PathBuf> {
        let ts = outputs.to_timeseries(name, location, level, timestep_seconds);
        match ts.write(&self.data_dir.join(AGGREGATED_DIR)) {
            Ok(path) => Some(path),
            Err(err) => {
                warn!(location, error = %err, "Could not write aggregated outputs");
                None
            }
        }
    }
}

// Entries follow bucket order; the name is only cross-checked.
fn bucket_mapping<'a>(
    mappings: &'a [BucketMapping],
    name: &str,
    index: usize,
) -> Option<&'a BucketMapping> {
    let mapping = mappings.get(index)?;
    if !mapping.name.is_empty() && mapping.name != name {
        warn!(
            bucket = %name,
            mapping = %mapping.name,
            index,
            "Output mapping name differs from bucket name; matching by position"
        );
    }
    Some(mapping)
}

fn bucket_outputs(
    output: &SimulationOutput,
    series: &BucketSeries,
    mapping: &BucketMapping,
    location: &str,
    timestep_seconds: f64,
) -> Vec<TimeSeries> {
    let files = &mapping.files;
    let wanted: [(&Option<FileRef>, &str, Vec<(&str, &[f64])>); 4] = [
        (
            &files.actual_evapotranspiration,
            "actualEvapotranspiration",
            vec![("actualEvapotranspiration", series.actual_evapotranspiration.as_slice())],
        ),
        (
            &files.water_level,
            "waterLevel",
            vec![("waterLevel", series.water_level.as_slice())],
        ),
        (
            &files.water_inputs,
            "waterInputs",
            vec![("waterInputs", series.water_inputs.as_slice())],
        ),
        (
            &files.water_outputs,
            "waterOutputs",
            vec![
                ("waterOutputs", series.water_outputs.as_slice()),
                (RUNOFF_TO_REACH, series.runoff_to_reach.as_slice()),
            ],
        ),
    ];

    wanted
        .into_iter()
        .filter_map(|(file, value_type, columns)| {
            let file = file.as_ref().filter(|f| !f.file_name.is_empty())?;
            Some(bucket_timeseries(
                &file.file_name,
                value_type,
                location,
                &output.timestamps,
                &columns,
                timestep_seconds,
            ))
        })
        .collect()
}

fn bucket_timeseries(
    name: &str,
    value_type: &str,
    location: &str,
    timestamps: &[NaiveDateTime],
    columns: &[(&str, &[f64])],
    timestep_seconds: f64,
) -> TimeSeries {
    let mut ts = TimeSeries::new(name, columns.iter().map(|(c, _)| c.to_string()).collect());
    ts.metadata
        .insert("calculation_type".to_string(), json!("water_routing"));
    ts.metadata.insert("value_type".to_string(), json!(value_type));
    ts.metadata.insert("location".to_string(), json!(location));
    ts.metadata
        .insert("timestep_seconds".to_string(), json!(timestep_seconds));
    ts.metadata.insert("units".to_string(), json!("mm"));

    let mut values = vec![0.0; columns.len()];
    for (t, timestamp) in timestamps.iter().enumerate() {
        for (v, (_, column)) in values.iter_mut().zip(columns) {
            *v = column[t];
        }
        ts.push(*timestamp, location, &values);
    }
    ts
}

/// Run the data folder at `path`, returning the summary.
pub fn run_catchment(path: &Path) -> ModelResult<RunSummary> {
    Ok(CatchmentRunner::load(path)?.run())
}
