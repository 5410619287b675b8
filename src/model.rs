use crate::evapotranspiration::actual_evapotranspiration;
use crate::forcing::{ForcingSeries, StepForcing};
use crate::land_cover::LandCoverUnit;
use crate::observer::{ClampEvent, ClampStage, SimulationObserver};
use crate::routing::{InflowBuffer, RoutingMode, partition_runoff};
use crate::runoff::bucket_runoff;
use chrono::NaiveDateTime;
use nalgebra::{DMatrix, DVector};

/// Per-bucket results of one time step.
#[derive(Clone, Debug, PartialEq)]
pub struct StepOutput {
    pub water_level: DVector<f64>,     // Depth after the step [mm]
    pub aet: DVector<f64>,             // Actual evapotranspiration [mm]
    pub water_input: DVector<f64>,     // Water added at the start of the bucket's update [mm]
    pub water_output: DVector<f64>,    // Runoff leaving the bucket [mm]
    pub runoff_to_reach: DVector<f64>, // Area-weighted share sent to the stream [mm]
}

impl StepOutput {
    fn zeros(n: usize) -> Self {
        StepOutput {
            water_level: DVector::zeros(n),
            aet: DVector::zeros(n),
            water_input: DVector::zeros(n),
            water_output: DVector::zeros(n),
            runoff_to_reach: DVector::zeros(n),
        }
    }
}

/// Output sequences of one bucket over a run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BucketSeries {
    pub name: String,
    pub actual_evapotranspiration: Vec<f64>,
    pub water_level: Vec<f64>,
    pub water_inputs: Vec<f64>,
    pub water_outputs: Vec<f64>,
    pub runoff_to_reach: Vec<f64>,
}

#[derive(Clone, Debug, Default)]
pub struct SimulationOutput {
    pub timestamps: Vec<NaiveDateTime>,
    pub buckets: Vec<BucketSeries>,
}

impl SimulationOutput {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Bucket network of one land-cover unit, with its evolving depths.
pub struct LandCoverModel {
    unit: LandCoverUnit,
    connections: DMatrix<f64>, // Routing fractions, row = source bucket
    area_index: DVector<f64>,  // Relative area index per bucket
    depth: DVector<f64>,       // Current water depth per bucket [mm]
    inflow: InflowBuffer,
    tsf: f64,
    mode: RoutingMode,
    steps_taken: usize,
}

impl LandCoverModel {
    pub fn new(unit: LandCoverUnit, tsf: f64, mode: RoutingMode) -> Self {
        let n = unit.len();
        LandCoverModel {
            connections: unit.routing_matrix(),
            area_index: unit.relative_area_indices(),
            depth: unit.initial_depths(),
            inflow: InflowBuffer::new(n),
            unit,
            tsf,
            mode,
            steps_taken: 0,
        }
    }

    pub fn unit(&self) -> &LandCoverUnit {
        &self.unit
    }

    pub fn depths(&self) -> &DVector<f64> {
        &self.depth
    }

    /// Water already routed to buckets but not yet applied.
    pub fn carried_inflow(&self) -> &DVector<f64> {
        self.inflow.carried()
    }

    /// Advance every bucket by one time step, in list order.
    pub fn step(
        &mut self,
        forcing: &StepForcing,
        observer: &mut dyn SimulationObserver,
    ) -> StepOutput {
        let step = self.steps_taken;
        let n = self.unit.len();
        let mut out = StepOutput::zeros(n);

        self.inflow.begin_step();
        let precipitation = forcing.precipitation();
        for (i, bucket) in self.unit.buckets().iter().enumerate() {
            if bucket.receives_precipitation {
                self.inflow.add(i, precipitation);
            }
        }

        for i in 0..n {
            let bucket = &self.unit.buckets()[i];

            // Routed water from buckets above i has already landed in the buffer
            let input = self.inflow.pending(i);
            self.depth[i] += input;

            let aet = actual_evapotranspiration(self.depth[i], bucket, forcing.pet);
            self.depth[i] = clamped_subtract(self.depth[i], aet, |deficit| {
                observer.on_clamp(ClampEvent {
                    step,
                    bucket: i,
                    stage: ClampStage::Evapotranspiration,
                    deficit,
                })
            });

            let runoff = bucket_runoff(self.depth[i], bucket, self.tsf);
            self.depth[i] = clamped_subtract(self.depth[i], runoff, |deficit| {
                observer.on_clamp(ClampEvent {
                    step,
                    bucket: i,
                    stage: ClampStage::Runoff,
                    deficit,
                })
            });

            let to_stream = partition_runoff(
                i,
                runoff,
                &self.connections,
                &self.area_index,
                self.mode,
                &mut self.inflow,
            );

            out.water_input[i] = input;
            out.aet[i] = aet;
            out.water_output[i] = runoff;
            out.runoff_to_reach[i] = to_stream;
        }
        out.water_level.copy_from(&self.depth);

        self.steps_taken += 1;
        observer.on_step(step, &out);
        out
    }

    /// Run the whole forcing series, keeping state between steps.
    pub fn run(
        &mut self,
        forcing: &ForcingSeries,
        observer: &mut dyn SimulationObserver,
    ) -> SimulationOutput {
        let steps = forcing.len();
        let mut buckets: Vec<BucketSeries> = self
            .unit
            .buckets()
            .iter()
            .map(|b| BucketSeries {
                name: b.name.clone(),
                actual_evapotranspiration: Vec::with_capacity(steps),
                water_level: Vec::with_capacity(steps),
                water_inputs: Vec::with_capacity(steps),
                water_outputs: Vec::with_capacity(steps),
                runoff_to_reach: Vec::with_capacity(steps),
            })
            .collect();

        for t in 0..steps {
            let out = self.step(&forcing.step(t), observer);
            for (i, series) in buckets.iter_mut().enumerate() {
                series.actual_evapotranspiration.push(out.aet[i]);
                series.water_level.push(out.water_level[i]);
                series.water_inputs.push(out.water_input[i]);
                series.water_outputs.push(out.water_output[i]);
                series.runoff_to_reach.push(out.runoff_to_reach[i]);
            }
        }

        SimulationOutput {
            timestamps: forcing.timestamps.clone(),
            buckets,
        }
    }
}

// Subtract and clamp at zero, reporting any shortfall.
fn clamped_subtract(depth: f64, amount: f64, mut on_clamp: impl FnMut(f64)) -> f64 {
    let remaining = depth - amount;
    if remaining < 0.0 {
        on_clamp(-remaining);
        0.0
    } else {
        remaining
    }
}
