use serde::{Deserialize, Serialize};

use super::dataset::TrainingDataset;
use super::embedding::FeatureVector;
use super::error::ClassifierError;
use crate::config::TrainingSettings;

/// Loss used to fit the head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LossKind {
    BinaryCrossEntropy,
    CategoricalCrossEntropy,
}

impl LossKind {
    /// Binary cross-entropy for exactly two classes, categorical otherwise.
    pub fn for_classes(num_classes: usize) -> Self {
        if num_classes == 2 {
            Self::BinaryCrossEntropy
        } else {
            Self::CategoricalCrossEntropy
        }
    }
}

/// Shape of a freshly initialised classifier head:
/// `input_size -> hidden_units (ReLU) -> num_classes (softmax)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadSpec {
    pub input_size: usize,
    pub hidden_units: usize,
    pub num_classes: usize,
    pub loss: LossKind,
}

impl HeadSpec {
    pub const DEFAULT_HIDDEN_UNITS: usize = 128;

    pub fn new(input_size: usize, num_classes: usize) -> Self {
        Self {
            input_size,
            hidden_units: Self::DEFAULT_HIDDEN_UNITS,
            num_classes,
            loss: LossKind::for_classes(num_classes),
        }
    }

    pub fn with_hidden_units(mut self, hidden_units: usize) -> Self {
        self.hidden_units = hidden_units;
        self
    }
}

/// How the dataset is fed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingPlan {
    pub epochs: usize,
    pub batch_size: usize,
    pub shuffle_buffer: usize,
    pub learning_rate: f64,
    /// Fixed seed for the shuffle order; random when `None`.
    /// Weight initialisation always uses the backend's own RNG.
    pub seed: Option<u64>,
}

impl Default for TrainingPlan {
    fn default() -> Self {
        Self {
            epochs: 10,
            batch_size: 32,
            shuffle_buffer: 100,
            learning_rate: 1e-3,
            seed: None,
        }
    }
}

impl From<&TrainingSettings> for TrainingPlan {
    fn from(settings: &TrainingSettings) -> Self {
        Self {
            epochs: settings.epochs,
            batch_size: settings.batch_size,
            shuffle_buffer: settings.shuffle_buffer,
            learning_rate: settings.learning_rate,
            seed: settings.seed,
        }
    }
}

/// Metrics reported at the end of every epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochReport {
    /// 1-based epoch number
    pub epoch: usize,
    pub total_epochs: usize,
    /// Mean training loss over the epoch's batches
    pub loss: f64,
    /// Fraction of correctly classified training examples, in `[0, 1]`
    pub accuracy: f64,
}

/// A trained classifier head.
pub trait TrainedHead: Send {
    /// Probability distribution over the classes, in class-index order.
    fn predict(&self, features: &FeatureVector) -> Result<Vec<f32>, ClassifierError>;

    fn num_classes(&self) -> usize;
}

/// Builds and fits a classifier head. Every call starts from freshly
/// initialised weights.
pub trait ClassifierEngine: Send + Sync {
    fn fit(
        &self,
        spec: &HeadSpec,
        dataset: &TrainingDataset,
        plan: &TrainingPlan,
        on_epoch: &mut dyn FnMut(EpochReport),
    ) -> Result<Box<dyn TrainedHead>, ClassifierError>;
}
