//! MacroLab Runner: dataset build orchestration on top of `macrolab-core`.
//!
//! - TOML pipeline configuration
//! - Market bar loading with cache/download/synthetic fallback
//! - End-to-end dataset build for both forecast variants
//! - CSV and manifest export

pub mod config;
pub mod data_loader;
pub mod export;
pub mod pipeline;

pub use config::{ConfigError, PipelineConfig};
pub use data_loader::{load_bars, LoadError, LoadOptions, LoadedBars};
pub use export::{export_run, import_manifest, Manifest};
pub use pipeline::{
    build_datasets, run_pipeline, BuildOutput, RunError, RunOptions, RunOutput, VariantDataset,
    SCHEMA_VERSION,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn outputs_are_send_sync() {
        assert_send::<RunOutput>();
        assert_sync::<RunOutput>();
        assert_send::<Manifest>();
        assert_sync::<Manifest>();
        assert_send::<PipelineConfig>();
        assert_sync::<PipelineConfig>();
    }
}
