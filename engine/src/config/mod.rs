pub mod settings;

pub use settings::{
    IndicatorSettings, InferenceSettings, PathSettings, PipelineSettings, ReportSettings, TrainingSettings,
};
