use crate::model::StepOutput;

/// Which subtraction pushed a bucket below zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClampStage {
    Evapotranspiration,
    Runoff,
}

/// A bucket depth was clamped to zero after a subtraction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClampEvent {
    pub step: usize,
    pub bucket: usize,
    pub stage: ClampStage,
    pub deficit: f64, // Water removed beyond what the bucket held [mm]
}

/// Hooks called by the model while it runs. All methods default to no-ops.
pub trait SimulationObserver {
    fn on_clamp(&mut self, _event: ClampEvent) {}

    fn on_step(&mut self, _step: usize, _output: &StepOutput) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default)]
pub struct NullObserver;

impl SimulationObserver for NullObserver {}

/// Per-run counters, one run per land-cover unit.
#[derive(Debug, Clone, Default)]
pub struct RunDiagnostics {
    pub steps: usize,
    pub clamps: Vec<usize>, // Clamp count per bucket
    pub first_clamp: Option<ClampEvent>,
}

impl RunDiagnostics {
    pub fn new(buckets: usize) -> Self {
        RunDiagnostics {
            steps: 0,
            clamps: vec![0; buckets],
            first_clamp: None,
        }
    }

    /// Buckets that clamped in more than `limit` (a fraction) of the steps.
    pub fn frequent_clampers(&self, limit: f64) -> Vec<(usize, f64)> {
        if self.steps == 0 {
            return Vec::new();
        }
        self.clamps
            .iter()
            .enumerate()
            .map(|(i, &count)| (i, count as f64 / self.steps as f64))
            .filter(|&(_, share)| share > limit)
            .collect()
    }
}

impl SimulationObserver for RunDiagnostics {
    fn on_clamp(&mut self, event: ClampEvent) {
        if event.bucket >= self.clamps.len() {
            self.clamps.resize(event.bucket + 1, 0);
        }
        self.clamps[event.bucket] += 1;
        self.first_clamp.get_or_insert(event);
    }

    fn on_step(&mut self, _step: usize, _output: &StepOutput) {
        self.steps += 1;
    }
}
