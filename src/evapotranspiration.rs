use crate::bucket::BucketParams;

/// Water regime of a bucket, split at `tightly_bound` and
/// `tightly_bound + plant_available`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Regime {
    Dry,       // depth <= tightly bound, nothing extractable
    Stressed,  // inside the plant-available band, AET only
    Saturated, // above the band, AET and runoff
}

impl Regime {
    pub fn classify(depth: f64, params: &BucketParams) -> Self {
        if depth <= params.tightly_bound() {
            Regime::Dry
        } else if depth <= params.drainage_threshold() {
            Regime::Stressed
        } else {
            Regime::Saturated
        }
    }
}

/// Actual evapotranspiration [mm] for a bucket holding `depth` after this
/// step's inputs, under a potential demand of `demand` [mm].
///
/// In the saturated regime free water above the band covers the demand
/// first; any remaining demand draws on the plant-available band. This keeps
/// AET continuous across both regime boundaries and never above
/// `relative_amount_index * demand`.
pub fn actual_evapotranspiration(depth: f64, params: &BucketParams, demand: f64) -> f64 {
    let r = params.evaporation.relative_amount_index;
    let a = params.evaporation.drought_adjustment;
    let demand = demand.max(0.0);
    if r <= 0.0 {
        return 0.0;
    }

    let tightly_bound = params.tightly_bound();
    let plant_available = params.plant_available();
    match Regime::classify(depth, params) {
        Regime::Dry => 0.0,
        Regime::Stressed => {
            let available = depth - tightly_bound;
            let stress = (available / plant_available).powf(a);
            (r * demand * stress).min(available)
        }
        Regime::Saturated => {
            let excess = depth - params.drainage_threshold();
            if excess >= demand {
                return r * demand;
            }
            // Band is full here, so the ratio is capped at 1
            let saturation = if plant_available > 0.0 {
                ((depth - tightly_bound) / plant_available).min(1.0)
            } else {
                1.0
            };
            let stress_part = (r * (demand - excess) * saturation.powf(a)).min(plant_available);
            r * excess + stress_part
        }
    }
}
