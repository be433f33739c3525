//! Student academic risk scoring.
//!
//! A fixed weighted model turns four bounded features (attendance, average
//! marks, assignment completion, behavior) into a composite score, a risk
//! level, a display probability and a short list of recommendations. The
//! [`data`] module turns delimited text into records the model can score.

pub mod analytics;
pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod model;

pub use config::{ImportOptions, InputPolicy, ModelConfig, ParseFailurePolicy, ServerConfig, Thresholds, Weights};
pub use data::{auto_map_fields, parse_delimited_text, CanonicalField, FieldMapping, ImportTable, StudentRecord};
pub use error::{Result, RiskError};
pub use model::{
    generate_recommendations, model_info, predict_risk, predict_risk_batch, FeatureContributions, ModelInfo,
    PredictionResult, RiskLevel, RiskModel, ScoredStudent, StudentFeatures,
};
