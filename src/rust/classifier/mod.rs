use serde::Serialize;

mod error;
mod embedding;
mod store;
mod dataset;
mod engine;
mod model;
mod readiness;
mod session;
mod utils;
pub mod preprocess;

pub use error::ClassifierError;
pub use embedding::{FeatureExtractor, FeatureVector, ImageSource, OnnxFeatureExtractor};
pub use store::{ClassLabel, ExampleStore};
pub use dataset::{Batch, TrainingDataset};
pub use engine::{ClassifierEngine, EpochReport, HeadSpec, LossKind, TrainedHead, TrainingPlan};
pub use model::{BurnEngine, BurnHead, HeadModel};
pub use readiness::Readiness;
pub use session::{
    Prediction, TrainingJob, TrainingOutcome, TrainingSession, TrainingState, UploadFailure, UploadReport,
};
pub use utils::sanitize_class_name;

/// Snapshot of a training session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    /// Class labels in class-index order
    pub class_labels: Vec<String>,
    /// Number of examples per class, aligned with `class_labels`
    pub example_counts: Vec<usize>,
    /// Size of the stored feature vectors, once any example exists
    pub feature_size: Option<usize>,
    pub state: TrainingState,
    pub is_trained: bool,
}
