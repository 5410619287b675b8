use crate::bucket::BucketParams;
use crate::error::{ModelError, ModelResult};
use approx::relative_eq;
use nalgebra::{DMatrix, DVector};
use tracing::warn;

/// An ordered set of buckets belonging to one land-cover type of one HRU.
///
/// Bucket order is part of the contract: runoff routed from bucket `i` to a
/// bucket `j > i` arrives in the same time step, routing to `j <= i` arrives
/// in the next one. Declare buckets upstream to downstream (surface first).
#[derive(Clone, Debug)]
pub struct LandCoverUnit {
    pub hru: String,
    pub name: String,
    pub percent_cover: f64, // Share of the subcatchment covered [%]
    buckets: Vec<BucketParams>,
}

impl LandCoverUnit {
    /// Build a unit and validate its buckets and connections.
    ///
    /// Buckets without a name get `Bucket_<index>`. An empty connection list
    /// sends all runoff to the stream.
    pub fn new(
        hru: impl Into<String>,
        name: impl Into<String>,
        percent_cover: f64,
        mut buckets: Vec<BucketParams>,
    ) -> ModelResult<Self> {
        let hru = hru.into();
        let name = name.into();
        if buckets.is_empty() {
            return Err(ModelError::InvalidBucket {
                bucket: format!("{hru}_{name}"),
                reason: "land-cover unit has no buckets".to_string(),
            });
        }

        let n = buckets.len();
        for (i, bucket) in buckets.iter_mut().enumerate() {
            if bucket.name.is_empty() {
                bucket.name = default_bucket_name(i);
            }
            bucket.validate()?;
            if bucket.connections.is_empty() {
                bucket.connections = stream_only(i, n);
            }
            check_connections(bucket, n)?;
        }

        Ok(LandCoverUnit {
            hru,
            name,
            percent_cover,
            buckets,
        })
    }

    /// `<hru>_<land cover>`, the location prefix used in output files.
    pub fn key(&self) -> String {
        format!("{}_{}", self.hru, self.name)
    }

    pub fn buckets(&self) -> &[BucketParams] {
        &self.buckets
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Row `i` holds the fractions routed from bucket `i` to every bucket.
    pub fn routing_matrix(&self) -> DMatrix<f64> {
        let n = self.buckets.len();
        DMatrix::from_fn(n, n, |i, j| self.buckets[i].connections[j])
    }

    pub fn relative_area_indices(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.buckets.len(),
            self.buckets.iter().map(|b| b.relative_area_index),
        )
    }

    pub fn initial_depths(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.buckets.len(),
            self.buckets.iter().map(|b| b.water_depth.current),
        )
    }
}

pub(crate) fn default_bucket_name(index: usize) -> String {
    format!("Bucket_{index}")
}

fn stream_only(index: usize, n: usize) -> Vec<f64> {
    let mut connections = vec![0.0; n];
    connections[index] = 1.0;
    connections
}

fn check_connections(bucket: &BucketParams, n: usize) -> ModelResult<()> {
    let fail = |reason: String| {
        Err(ModelError::InvalidConnections {
            bucket: bucket.name.clone(),
            reason,
        })
    };
    if bucket.connections.len() != n {
        return fail(format!(
            "expected {n} entries, got {}",
            bucket.connections.len()
        ));
    }
    if let Some(f) = bucket
        .connections
        .iter()
        .find(|f| !(f.is_finite() && **f >= 0.0))
    {
        return fail(format!("fraction {f} is not a finite non-negative number"));
    }
    let total: f64 = bucket.connections.iter().sum();
    if relative_eq!(total, 1.0, epsilon = 1e-9) {
        return Ok(());
    }
    if total > 1.0 {
        return fail(format!("fractions sum to {total}, more than 1"));
    }
    warn!(
        bucket = %bucket.name,
        total,
        "Connection fractions sum to less than 1; the remainder of the runoff is discarded"
    );
    Ok(())
}

/// Flag the first bucket as receiving precipitation when none is flagged.
///
/// Returns the name of the bucket that was changed, as the unit will name it.
pub fn normalize_precipitation_flags(buckets: &mut [BucketParams]) -> Option<String> {
    if buckets.iter().any(|b| b.receives_precipitation) {
        return None;
    }
    let first = buckets.first_mut()?;
    first.receives_precipitation = true;
    if first.name.is_empty() {
        return Some(default_bucket_name(0));
    }
    Some(first.name.clone())
}
