// Engine library root
// Indicator preprocessing, model training, batched inference and the forecast report.

pub mod config;
pub mod data;
pub mod error;
pub mod indicators;
pub mod inference;
pub mod model;
pub mod report;
pub mod scaler;
pub mod services;
pub mod store;
pub mod training;

pub use error::{EngineError, Result};
