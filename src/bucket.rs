use crate::error::{ModelError, ModelResult};
use serde::Deserialize;

// Evaporation parameters of a bucket
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaporationParams {
    pub relative_amount_index: f64, // Fraction of PET the bucket can satisfy [-], 0 disables AET
    pub drought_adjustment: f64,    // Exponent of the stress response [-]
}

impl Default for EvaporationParams {
    fn default() -> Self {
        EvaporationParams {
            relative_amount_index: 0.0,
            drought_adjustment: 1.0,
        }
    }
}

// Water depth thresholds and initial depth of a bucket
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WaterDepth {
    pub current: f64,         // Initial water depth [mm]
    pub tightly_bound: f64,   // Dead storage, nothing extractable below [mm]
    pub plant_available: f64, // Band above dead storage available to AET [mm]
}

impl Default for WaterDepth {
    fn default() -> Self {
        WaterDepth {
            current: 1.0,
            tightly_bound: 100.0,
            plant_available: 200.0,
        }
    }
}

impl WaterDepth {
    /// Depth above which the bucket is saturated and drains.
    pub fn drainage_threshold(&self) -> f64 {
        self.tightly_bound + self.plant_available
    }
}

/// Static parameters of one bucket, as declared in the catchment file.
///
/// `connections[j]` is the fraction of this bucket's runoff routed to
/// bucket `j` of the same land-cover unit; the entry at the bucket's own
/// index goes to the stream.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BucketParams {
    pub name: String,
    pub abbreviation: String,
    pub receives_precipitation: bool,
    pub relative_area_index: f64,          // Area weight used when routing [-]
    pub characteristic_time_constant: f64, // Drainage time constant [day]
    pub evaporation: EvaporationParams,
    pub water_depth: WaterDepth,
    pub connections: Vec<f64>,
}

impl Default for BucketParams {
    fn default() -> Self {
        BucketParams {
            name: String::new(),
            abbreviation: String::new(),
            receives_precipitation: false,
            relative_area_index: 1.0,
            characteristic_time_constant: 10.0,
            evaporation: EvaporationParams::default(),
            water_depth: WaterDepth::default(),
            connections: Vec::new(),
        }
    }
}

impl BucketParams {
    pub fn tightly_bound(&self) -> f64 {
        self.water_depth.tightly_bound
    }

    pub fn plant_available(&self) -> f64 {
        self.water_depth.plant_available
    }

    pub fn drainage_threshold(&self) -> f64 {
        self.water_depth.drainage_threshold()
    }

    /// Check the scalar invariants. Connections are checked by the owning unit,
    /// which knows how many buckets there are.
    pub fn validate(&self) -> ModelResult<()> {
        let fail = |reason: String| {
            Err(ModelError::InvalidBucket {
                bucket: self.name.clone(),
                reason,
            })
        };
        let depth = &self.water_depth;
        if depth.tightly_bound.is_nan() || depth.tightly_bound < 0.0 {
            return fail(format!("tightlyBound must be >= 0, got {}", depth.tightly_bound));
        }
        if depth.plant_available.is_nan() || depth.plant_available < 0.0 {
            return fail(format!(
                "plantAvailable must be >= 0, got {}",
                depth.plant_available
            ));
        }
        if depth.current.is_nan() || depth.current < 0.0 {
            return fail(format!("initial depth must be >= 0, got {}", depth.current));
        }
        if !(self.relative_area_index.is_finite() && self.relative_area_index > 0.0) {
            return fail(format!(
                "relativeAreaIndex must be positive, got {}",
                self.relative_area_index
            ));
        }
        let tau = self.characteristic_time_constant;
        if !(tau.is_finite() && tau > 0.0) {
            return fail(format!("characteristicTimeConstant must be positive, got {tau}"));
        }
        if self.evaporation.relative_amount_index.is_nan()
            || self.evaporation.relative_amount_index < 0.0
        {
            return fail(format!(
                "relativeAmountIndex must be >= 0, got {}",
                self.evaporation.relative_amount_index
            ));
        }
        if !self.evaporation.drought_adjustment.is_finite() {
            return fail("droughtAdjustment must be finite".to_string());
        }
        Ok(())
    }
}
