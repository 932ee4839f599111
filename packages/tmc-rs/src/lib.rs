pub mod cascade;
pub mod drift;
pub mod error;
pub mod ingest;
pub mod interp;
pub mod noise;
pub mod pipeline;
pub mod profiling;
pub mod smoothing;
pub mod types;

pub use cascade::{CascadeInputs, CompensationCascade, CorrectionStage};
pub use drift::{DriftEstimator, OffsetTrack};
pub use error::{Result, TmcError};
pub use ingest::{classify_log, parse_timestamp, read_channel_log, LogManifest, ReadoutAddress};
pub use interp::Interpolator;
pub use noise::{NoiseMetric, NoiseReport};
pub use pipeline::CorrectionRunner;
pub use smoothing::{WindowAverager, WindowKind};
pub use types::*;
