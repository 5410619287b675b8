//! Conceptual bucket water routing for land-cover units of a catchment.
//!
//! Each land-cover unit is an ordered network of buckets. Every time step
//! the buckets receive precipitation and routed water, lose water to
//! evapotranspiration and drain runoff towards other buckets or the stream.

pub mod aggregate;
pub mod bucket;
pub mod config;
pub mod error;
pub mod evapotranspiration;
pub mod forcing;
pub mod land_cover;
pub mod model;
pub mod observer;
pub mod routing;
pub mod runner;
pub mod runoff;
pub mod timeseries;

pub use bucket::{BucketParams, EvaporationParams, WaterDepth};
pub use error::{ModelError, ModelResult};
pub use forcing::{ColumnSchema, ForcingSeries, StepForcing};
pub use land_cover::LandCoverUnit;
pub use model::{LandCoverModel, SimulationOutput, StepOutput};
pub use observer::{NullObserver, RunDiagnostics, SimulationObserver};
pub use routing::RoutingMode;
pub use runner::{CatchmentRunner, RunSummary, run_catchment};
pub use timeseries::TimeSeries;
