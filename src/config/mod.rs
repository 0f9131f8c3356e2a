//! Configuration module for semlayer.
//!
//! Handles the settings file and environment variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, CompilerSettings, SchemaSettings, Settings, SettingsError, CONFIG_ENV,
};
