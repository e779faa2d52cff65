use ort::Error as OrtError;
use thiserror::Error;

/// Represents the different types of errors that can occur while collecting
/// examples, training the classifier head or predicting.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// The class name was empty after trimming
    #[error("Class name cannot be empty")]
    EmptyName,
    /// A class with the same sanitized label already exists
    #[error("Class \"{0}\" already exists")]
    DuplicateClass(String),
    /// The referenced class label is not registered
    #[error("Unknown class \"{0}\"")]
    UnknownClass(String),
    /// The image could not be decoded or the embedding model failed
    #[error("Extraction error: {0}")]
    ExtractionError(String),
    /// An example index outside the class's example set
    #[error("Index {index} out of range for class \"{label}\" ({len} examples)")]
    IndexOutOfRange {
        label: String,
        index: usize,
        len: usize,
    },
    /// Training needs at least two classes
    #[error("At least two classes are required for training, found {0}")]
    InsufficientClasses(usize),
    /// Every class is empty
    #[error("No training data available. Add images to the classes first")]
    NoTrainingData,
    /// The training engine failed
    #[error("Training error: {0}")]
    TrainingError(String),
    /// A training run is already active for this session
    #[error("Training is already in progress")]
    TrainingInProgress,
    /// Prediction requested before a successful training run
    #[error("The classifier has not been trained")]
    NotTrained,
    /// Prediction requested without an image
    #[error("No image supplied for prediction")]
    NoInput,
    /// Error occurred while loading or running the ONNX model
    #[error("Model error: {0}")]
    ModelError(String),
    /// The trained head produced an unusable output
    #[error("Prediction error: {0}")]
    PredictionError(String),
    /// Error occurred due to invalid input parameters
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<OrtError> for ClassifierError {
    fn from(err: OrtError) -> Self {
        ClassifierError::ModelError(err.to_string())
    }
}

impl From<image::ImageError> for ClassifierError {
    fn from(err: image::ImageError) -> Self {
        ClassifierError::ExtractionError(err.to_string())
    }
}
