//! Configuration loading.

pub mod file_config;
pub mod loader;

pub use file_config::{EngineSection, FileConfig, LoggingSection, SigningSection};
pub use loader::ConfigLoader;
