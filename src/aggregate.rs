//! Roll bucket outputs up to land-cover and subcatchment level.

use crate::model::SimulationOutput;
use crate::timeseries::TimeSeries;
use chrono::NaiveDateTime;
use serde_json::json;

pub const RUNOFF_TO_REACH: &str = "runoffToReach";
pub const ACTUAL_EVAPOTRANSPIRATION: &str = "actualEvapotranspiration";

/// Stream runoff and AET per step for an aggregated area.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WaterOutputs {
    pub timestamps: Vec<NaiveDateTime>,
    pub runoff_to_reach: Vec<f64>,
    pub actual_evapotranspiration: Vec<f64>,
}

impl WaterOutputs {
    /// Sum over all buckets of a land-cover unit.
    pub fn from_land_cover(output: &SimulationOutput) -> Self {
        let n = output.len();
        let mut runoff_to_reach = vec![0.0; n];
        let mut actual_evapotranspiration = vec![0.0; n];
        for bucket in &output.buckets {
            for t in 0..n {
                runoff_to_reach[t] += bucket.runoff_to_reach[t];
                actual_evapotranspiration[t] += bucket.actual_evapotranspiration[t];
            }
        }
        WaterOutputs {
            timestamps: output.timestamps.clone(),
            runoff_to_reach,
            actual_evapotranspiration,
        }
    }

    /// Combine land-cover outputs weighted by percent cover, step by step over
    /// the shortest series. Returns `None` when there is nothing to combine.
    pub fn from_subcatchment(land_covers: &[(f64, &WaterOutputs)]) -> Option<Self> {
        let n = land_covers.iter().map(|(_, w)| w.len()).min()?;
        let mut combined = WaterOutputs {
            timestamps: land_covers[0].1.timestamps[..n].to_vec(),
            runoff_to_reach: vec![0.0; n],
            actual_evapotranspiration: vec![0.0; n],
        };
        for (percent_cover, outputs) in land_covers {
            let weight = percent_cover / 100.0;
            for t in 0..n {
                combined.runoff_to_reach[t] += outputs.runoff_to_reach[t] * weight;
                combined.actual_evapotranspiration[t] +=
                    outputs.actual_evapotranspiration[t] * weight;
            }
        }
        Some(combined)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn to_timeseries(
        &self,
        name: &str,
        location: &str,
        level: &str,
        timestep_seconds: f64,
    ) -> TimeSeries {
        let mut ts = TimeSeries::new(
            name,
            vec![RUNOFF_TO_REACH.to_string(), ACTUAL_EVAPOTRANSPIRATION.to_string()],
        );
        ts.metadata.insert("name".to_string(), json!(name));
        ts.metadata.insert("location".to_string(), json!(location));
        ts.metadata.insert(
            "description".to_string(),
            json!(format!("Aggregated waterOutputs for {location}")),
        );
        ts.metadata.insert(
            "variables".to_string(),
            json!([RUNOFF_TO_REACH, ACTUAL_EVAPOTRANSPIRATION]),
        );
        ts.metadata.insert("aggregation_level".to_string(), json!(level));
        ts.metadata
            .insert("timestep_seconds".to_string(), json!(timestep_seconds));
        for t in 0..self.len() {
            ts.push(
                self.timestamps[t],
                location,
                &[self.runoff_to_reach[t], self.actual_evapotranspiration[t]],
            );
        }
        ts
    }
}
