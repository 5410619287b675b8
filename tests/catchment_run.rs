use approx::assert_relative_eq;
use bucket_routing::{CatchmentRunner, ModelError, TimeSeries};
use std::fs;
use std::path::{Path, PathBuf};

fn data_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("bucket_routing_{tag}_{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn catchment(receives_precipitation: bool) -> String {
    format!(
        r#"{{
        "name": "Test Catchment",
        "abbreviation": "TC",
        "HRUs": [{{
            "name": "H1",
            "subcatchment": {{"landCoverTypes": [
                {{
                    "name": "Forest",
                    "percentCover": 60.0,
                    "buckets": [{{
                        "name": "Soil",
                        "receivesPrecipitation": {receives_precipitation},
                        "relativeAreaIndex": 1.0,
                        "characteristicTimeConstant": 5.0,
                        "evaporation": {{"relativeAmountIndex": 1.0, "droughtAdjustment": 1.0}},
                        "waterDepth": {{"current": 15.0, "tightlyBound": 10.0, "plantAvailable": 20.0}},
                        "connections": [1.0]
                    }}]
                }},
                {{
                    "name": "Grass",
                    "percentCover": 40.0,
                    "buckets": [{{"name": "Surface", "receivesPrecipitation": true}}]
                }}
            ]}}
        }}]
    }}"#
    )
}

const MAPPING: &str = r#"{
    "catchment": {"HRUs": [{
        "name": "H1",
        "timeSeries": {"subcatchment": {"landCoverTypes": [
            {
                "name": "Forest",
                "timeSeries": {
                    "potentialEvapotranspiration": {"fileName": "H1_Forest_pet"},
                    "rainAndSnow": {"fileName": "H1_Forest_rainSnow"},
                    "buckets": [{
                        "name": "Soil",
                        "timeSeries": {
                            "actualEvapotranspiration": {"fileName": "H1_Forest_Soil_aet"},
                            "waterLevel": {"fileName": "H1_Forest_Soil_level"},
                            "waterInputs": {"fileName": "H1_Forest_Soil_inputs"},
                            "waterOutputs": {"fileName": "H1_Forest_Soil_outputs"}
                        }
                    }]
                }
            },
            {
                "name": "Grass",
                "timeSeries": {
                    "potentialEvapotranspiration": {"fileName": "H1_Grass_pet"},
                    "rainAndSnow": {"fileName": "H1_Grass_rainSnow"},
                    "buckets": []
                }
            }
        ]}}
    }]}
}"#;

fn write_folder(dir: &Path, receives_precipitation: bool) {
    fs::write(dir.join("generated_catchment.json"), catchment(receives_precipitation)).unwrap();
    fs::write(dir.join("ModelTimeSeries.json"), MAPPING).unwrap();
    fs::write(
        dir.join("H1_Forest_rainSnow.csv"),
        "0b7c1f2e,location,snowfall_depth,rain_depth,snowmelt_depth\n\
         2023-01-01T00:00:00,H1,0.0,5.0,0.0\n\
         2023-01-02T00:00:00,H1,0.0,0.0,0.0\n",
    )
    .unwrap();
    fs::write(
        dir.join("H1_Forest_pet.csv"),
        "0b7c1f2e,location,pet_mm_day\n\
         2023-01-01T00:00:00,H1,2.0\n\
         2023-01-02T00:00:00,H1,2.0\n",
    )
    .unwrap();
    fs::write(dir.join("H1_Forest_pet.json"), r#"{"timestep_seconds": 86400}"#).unwrap();
}

fn column(dir: &Path, name: &str, column: &str) -> Vec<f64> {
    let ts = TimeSeries::read(dir, name).unwrap();
    ts.numeric_column(column, column, &TimeSeries::csv_path(dir, name))
        .unwrap()
}

#[test]
fn runs_catchment_and_writes_outputs() {
    let dir = data_dir("run");
    write_folder(&dir, true);

    let runner = CatchmentRunner::load(&dir).unwrap();
    assert!(runner.normalizations().is_empty());
    let summary = runner.run();
    assert_eq!(summary.units_run, 1);
    assert_eq!(summary.units_skipped, 1);
    // Four bucket files, one land-cover and one subcatchment aggregate
    assert_eq!(summary.files_written.len(), 6);

    let level = column(&dir, "H1_Forest_Soil_level", "waterLevel");
    assert_relative_eq!(level[0], 19.0);
    assert_relative_eq!(level[1], 18.1, epsilon = 1e-12);

    let aet = column(&dir, "H1_Forest_Soil_aet", "actualEvapotranspiration");
    assert_relative_eq!(aet[0], 1.0);
    assert_relative_eq!(aet[1], 0.9, epsilon = 1e-12);

    let inputs = column(&dir, "H1_Forest_Soil_inputs", "waterInputs");
    assert_eq!(inputs, vec![5.0, 0.0]);
    let runoff = column(&dir, "H1_Forest_Soil_outputs", "runoffToReach");
    assert_eq!(runoff, vec![0.0, 0.0]);

    let meta = TimeSeries::read(&dir, "H1_Forest_Soil_level").unwrap().metadata;
    assert_eq!(meta["calculation_type"], "water_routing");
    assert_eq!(meta["location"], "H1_Forest_Soil");
    assert_eq!(meta["timestep_seconds"], 86400.0);

    let aggregated = dir.join("aggregated");
    let sub = column(
        &aggregated,
        "H1_subcatchment_waterOutputs",
        "actualEvapotranspiration",
    );
    assert_relative_eq!(sub[0], 0.6, epsilon = 1e-12);
    assert!(TimeSeries::csv_path(&aggregated, "H1_Forest_waterOutputs").exists());

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn unflagged_catchment_is_normalized_before_running() {
    let dir = data_dir("normalize");
    write_folder(&dir, false);

    let runner = CatchmentRunner::load(&dir).unwrap();
    assert_eq!(runner.normalizations().len(), 1);
    assert_eq!(runner.normalizations()[0].bucket, "Soil");
    runner.run();

    let inputs = column(&dir, "H1_Forest_Soil_inputs", "waterInputs");
    assert_eq!(inputs[0], 5.0);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn next_step_setting_and_disabled_aggregation() {
    let dir = data_dir("settings");
    write_folder(&dir, true);
    fs::write(
        dir.join("model_settings.toml"),
        "[routing]\nmode = \"next_step\"\n\n[output]\naggregate = false\n",
    )
    .unwrap();

    let summary = CatchmentRunner::load(&dir).unwrap().run();
    assert_eq!(summary.files_written.len(), 4);
    assert!(!dir.join("aggregated").exists());
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn missing_configuration_fails_to_load() {
    let dir = data_dir("missing");
    let err = CatchmentRunner::load(&dir).err().unwrap();
    assert!(matches!(err, ModelError::Io { .. }));
    fs::remove_dir_all(&dir).ok();
}

const TWO_SOILS: &str = r#"{
    "name": "Test Catchment",
    "HRUs": [{
        "name": "H1",
        "subcatchment": {"landCoverTypes": [{
            "name": "Forest",
            "percentCover": 100.0,
            "buckets": [
                {
                    "name": "Soil",
                    "receivesPrecipitation": true,
                    "characteristicTimeConstant": 5.0,
                    "evaporation": {"relativeAmountIndex": 1.0, "droughtAdjustment": 1.0},
                    "waterDepth": {"current": 15.0, "tightlyBound": 10.0, "plantAvailable": 20.0},
                    "connections": [1.0, 0.0]
                },
                {
                    "name": "Soil",
                    "waterDepth": {"current": 3.0, "tightlyBound": 10.0, "plantAvailable": 20.0},
                    "connections": [0.0, 1.0]
                }
            ]
        }]}
    }]
}"#;

const TWO_SOILS_MAPPING: &str = r#"{
    "HRUs": [{
        "name": "H1",
        "timeSeries": {"subcatchment": {"landCoverTypes": [{
            "name": "Forest",
            "timeSeries": {
                "potentialEvapotranspiration": {"fileName": "H1_Forest_pet"},
                "rainAndSnow": {"fileName": "H1_Forest_rainSnow"},
                "buckets": [
                    {"name": "Soil", "timeSeries": {"waterLevel": {"fileName": "first_level"}}},
                    {"name": "Soil", "timeSeries": {"waterLevel": {"fileName": "second_level"}}}
                ]
            }
        }]}}
    }]
}"#;

#[test]
fn same_named_buckets_write_their_own_files() {
    let dir = data_dir("duplicates");
    write_folder(&dir, true);
    fs::write(dir.join("generated_catchment.json"), TWO_SOILS).unwrap();
    fs::write(dir.join("ModelTimeSeries.json"), TWO_SOILS_MAPPING).unwrap();

    let runner = CatchmentRunner::load(&dir).unwrap();
    assert!(runner.settings().output.aggregate);
    let summary = runner.run();
    assert_eq!(summary.units_run, 1);
    assert!(summary.files_written.contains(&TimeSeries::csv_path(&dir, "first_level")));
    assert!(summary.files_written.contains(&TimeSeries::csv_path(&dir, "second_level")));

    let first = column(&dir, "first_level", "waterLevel");
    let second = column(&dir, "second_level", "waterLevel");
    assert_relative_eq!(first[0], 19.0);
    assert_eq!(second, vec![3.0, 3.0]);
    fs::remove_dir_all(&dir).ok();
}
