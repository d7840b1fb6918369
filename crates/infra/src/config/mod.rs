//! Configuration loading
//!
//! Builds a [`FlowConfig`](fabricflow_domain::FlowConfig) from config files
//! and `FABRICFLOW_*` environment variables.

pub mod loader;

// Re-export commonly used items
pub use loader::{
    apply_env_overrides, load, load_from_env, load_from_file, probe_config_paths, CONFIG_PATH_VAR,
};
