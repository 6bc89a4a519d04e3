// Core modules for configuration and error modeling.
pub mod config;
pub mod error;
