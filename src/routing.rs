use nalgebra::{DMatrix, DVector};
use serde::Deserialize;

/// When water routed between buckets becomes available to the receiver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    /// Routing to a bucket later in the list arrives in the same step,
    /// routing to an earlier bucket arrives in the next step.
    #[default]
    SameStep,
    /// Every routed contribution arrives in the next step.
    NextStep,
}

/// Pending water inputs for the step being processed, plus the contributions
/// already owed to the next step.
#[derive(Clone, Debug)]
pub struct InflowBuffer {
    current: DVector<f64>,
    next: DVector<f64>,
}

impl InflowBuffer {
    pub fn new(n: usize) -> Self {
        InflowBuffer {
            current: DVector::zeros(n),
            next: DVector::zeros(n),
        }
    }

    /// Start a step: inputs owed from the previous step become pending.
    pub fn begin_step(&mut self) {
        std::mem::swap(&mut self.current, &mut self.next);
        self.next.fill(0.0);
    }

    pub fn add(&mut self, bucket: usize, amount: f64) {
        self.current[bucket] += amount;
    }

    pub fn add_next(&mut self, bucket: usize, amount: f64) {
        self.next[bucket] += amount;
    }

    pub fn pending(&self, bucket: usize) -> f64 {
        self.current[bucket]
    }

    pub fn carried(&self) -> &DVector<f64> {
        &self.next
    }
}

/// Distribute the runoff of bucket `source` along its row of the routing matrix.
///
/// The runoff is area-weighted by the source and re-scaled by each receiver's
/// area index. The share on the diagonal leaves to the stream and is
/// returned.
pub fn partition_runoff(
    source: usize,
    runoff: f64,
    connections: &DMatrix<f64>,
    area_index: &DVector<f64>,
    mode: RoutingMode,
    inflow: &mut InflowBuffer,
) -> f64 {
    let actual = runoff * area_index[source];
    let mut to_stream = 0.0;
    for (target, &fraction) in connections.row(source).iter().enumerate() {
        if fraction <= 0.0 {
            continue;
        }
        if target == source {
            to_stream += actual * fraction;
            continue;
        }
        let delivered = actual * fraction / area_index[target];
        if mode == RoutingMode::SameStep && target > source {
            inflow.add(target, delivered);
        } else {
            inflow.add_next(target, delivered);
        }
    }
    to_stream
}
