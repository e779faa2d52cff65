//! Teach an image classifier by example.
//!
//! A frozen ONNX embedding model turns images into feature vectors; a small
//! dense head is trained on those vectors for user-defined classes and then
//! used to classify new images.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use teachable::{BurnEngine, ModelManager, TeachableConfig, TrainingSession, RuntimeConfig};
//! use std::path::PathBuf;
//!
//! let config = TeachableConfig::default();
//! let extractor = ModelManager::new_default()
//!     .load_extractor(&config.model, &RuntimeConfig::from(&config.runtime))?;
//!
//! let mut session = TrainingSession::from_settings(&config.training);
//! session.add_class("cat")?;
//! session.add_class("dog")?;
//! session.add_example("cat", PathBuf::from("cat.jpg"), &extractor)?;
//! session.add_example("dog", PathBuf::from("dog.jpg"), &extractor)?;
//!
//! session.train(&BurnEngine::new(), &mut |epoch| {
//!     println!("Epoch {}: loss {:.4}", epoch.epoch, epoch.loss);
//! })?;
//!
//! let prediction = session.predict(Some(PathBuf::from("mystery.jpg").into()), &extractor)?;
//! println!("{} ({:.1}%)", prediction.label, prediction.confidence * 100.0);
//! # Ok(())
//! # }
//! ```
//!
//! # Background Training
//!
//! Training can run away from the session. [`TrainingSession::begin_training`]
//! snapshots the data into a [`TrainingJob`] that is `Send`; its outcome is
//! handed back with [`TrainingSession::finish_training`]. A result trained on
//! data that has since changed is discarded.
//!
//! ```rust,no_run
//! # fn demo(mut session: teachable::TrainingSession) -> Result<(), Box<dyn std::error::Error>> {
//! use teachable::BurnEngine;
//!
//! let job = session.begin_training()?;
//! let outcome = std::thread::spawn(move || job.run(&BurnEngine::new(), &mut |_| {}))
//!     .join()
//!     .expect("training thread panicked");
//! session.finish_training(outcome)?;
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod config;
mod runtime;
pub mod model_manager;

pub use classifier::{
    sanitize_class_name, BurnEngine, ClassLabel, ClassifierEngine, ClassifierError, EpochReport, ExampleStore,
    FeatureExtractor, FeatureVector, HeadSpec, ImageSource, LossKind, OnnxFeatureExtractor, Prediction, Readiness,
    SessionInfo, TrainedHead, TrainingDataset, TrainingJob, TrainingOutcome, TrainingPlan, TrainingSession,
    TrainingState, UploadFailure, UploadReport,
};
pub use config::{ModelSettings, RuntimeSettings, TeachableConfig, TrainingSettings};
pub use runtime::{create_session_builder, RuntimeConfig};
pub use model_manager::{ModelError, ModelManager};

pub fn init_logger() {
    env_logger::init();
}
