/**
Module for calculating bucket drainage.

A bucket drains only while it holds water above its plant-available band.
The drainage rate is linear in that excess and inversely proportional to
the bucket's characteristic time constant, scaled by the temporal scaling
factor so the same parameters work for hourly and daily series.
Units are in millimetres.
*/
use crate::bucket::BucketParams;

/**
Calculates the runoff leaving a bucket in one time step.

# Arguments
* `depth` - Water depth in mm, after this step's AET has been removed.
* `params` - Bucket parameters.
* `tsf` - Temporal scaling factor (time step length in days).

# Returns
The runoff depth in mm, never negative.
*/
pub fn bucket_runoff(depth: f64, params: &BucketParams, tsf: f64) -> f64 {
    let threshold = params.drainage_threshold();
    if depth <= threshold {
        return 0.0;
    }
    let rate = 1.0 / (tsf * params.characteristic_time_constant);
    (rate * (depth - threshold)).max(0.0)
}
