//! model-import: acquire a traced transformer model and register it with a
//! search cluster's trained-model registry.
//!
//! The binary wires command-line settings to `run_import`; library users can
//! call `run_import` directly with any `ModelSource` and `ModelRegistry`.

pub mod pipeline;
pub mod settings;

pub use pipeline::{
    CleanupPolicy, ImportError, ImportOutcome, ImportRequest, ImportStage, run_import,
};
pub use settings::{Acquisition, Cli, ImportSettings, SettingsError, TracerSettings};
