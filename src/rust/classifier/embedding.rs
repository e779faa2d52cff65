use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use log::{debug, error, info};
use ndarray::{Array1, Array4};
use ort::session::Session;
use ort::value::Tensor;

use super::error::ClassifierError;
use super::preprocess::{prepare_input, MAX_IMAGE_DIMENSION, MODEL_INPUT_SIZE};
use crate::config::ModelSettings;
use crate::runtime::{create_session_builder, RuntimeConfig};

/// Fixed-length embedding of one image. Computed once per upload and never
/// modified afterwards.
pub type FeatureVector = Array1<f32>;

/// An image handed to the extractor, either still encoded or already decoded.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
    Decoded(DynamicImage),
}

impl ImageSource {
    /// Decodes the image. Decode failures are reported as `ExtractionError`.
    pub fn decode(self) -> Result<DynamicImage, ClassifierError> {
        match self {
            Self::Path(path) => image::open(&path).map_err(|e| {
                ClassifierError::ExtractionError(format!("Failed to decode {}: {}", path.display(), e))
            }),
            Self::Bytes(bytes) => Ok(image::load_from_memory(&bytes)?),
            Self::Decoded(image) => Ok(image),
        }
    }

    /// Short human-readable description used in logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
            Self::Decoded(image) => format!("<{}x{} image>", image.width(), image.height()),
        }
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<DynamicImage> for ImageSource {
    fn from(image: DynamicImage) -> Self {
        Self::Decoded(image)
    }
}

/// Converts images into feature vectors using a frozen embedding model.
///
/// Implementations must not modify the underlying model, and every vector
/// they return must have exactly `feature_size()` elements.
pub trait FeatureExtractor: Send + Sync {
    /// Dimensionality of the produced feature vectors
    fn feature_size(&self) -> usize;

    /// Runs preprocessing and the embedding model on a decoded image.
    fn extract_features(&self, image: &DynamicImage) -> Result<FeatureVector, ClassifierError>;

    /// Decodes `source` and extracts its features.
    fn extract_from_source(&self, source: ImageSource) -> Result<FeatureVector, ClassifierError> {
        let image = source.decode()?;
        self.extract_features(&image)
    }
}

/// Feature extractor backed by an ONNX export of the embedding model.
///
/// The model is expected to:
/// - Accept one float input of shape `[1, input_size, input_size, 3]` with values in `[0, 1]`
/// - Return a single output whose elements form the feature vector
#[derive(Debug)]
pub struct OnnxFeatureExtractor {
    model_path: String,
    session: Session,
    input_name: String,
    feature_size: usize,
    input_size: u32,
    max_dimension: u32,
}

impl OnnxFeatureExtractor {
    /// Loads the embedding model from `model_path` with the default image geometry.
    pub fn load<P: AsRef<Path>>(model_path: P, runtime: &RuntimeConfig) -> Result<Self, ClassifierError> {
        Self::load_with_geometry(model_path, runtime, MODEL_INPUT_SIZE, MAX_IMAGE_DIMENSION)
    }

    /// Loads the embedding model using the geometry from `settings`.
    pub fn load_with_settings<P: AsRef<Path>>(
        model_path: P,
        settings: &ModelSettings,
        runtime: &RuntimeConfig,
    ) -> Result<Self, ClassifierError> {
        Self::load_with_geometry(model_path, runtime, settings.input_size, settings.max_dimension)
    }

    fn load_with_geometry<P: AsRef<Path>>(
        model_path: P,
        runtime: &RuntimeConfig,
        input_size: u32,
        max_dimension: u32,
    ) -> Result<Self, ClassifierError> {
        let model_path = model_path.as_ref();
        if input_size == 0 || max_dimension == 0 {
            return Err(ClassifierError::ValidationError(
                "Model input size and maximum dimension must be positive".into(),
            ));
        }
        if !model_path.exists() {
            return Err(ClassifierError::ModelError(format!(
                "Model file not found: {}",
                model_path.display()
            )));
        }

        let session = create_session_builder(runtime)?
            .commit_from_file(model_path)
            .map_err(|e| {
                error!("Failed to load embedding model: {}", e);
                ClassifierError::ModelError(format!("Failed to load embedding model: {}", e))
            })?;

        Self::validate_model(&session)?;
        info!("Embedding model structure validated successfully");

        let input_name = session.inputs[0].name.clone();
        let mut extractor = Self {
            model_path: model_path.to_string_lossy().to_string(),
            session,
            input_name,
            feature_size: 0,
            input_size,
            max_dimension,
        };

        // Warm-up pass on a black image to infer the feature size
        let side = input_size as usize;
        let warm_up = extractor.run(Array4::zeros((1, side, side, 3)))?;
        if warm_up.is_empty() {
            return Err(ClassifierError::ModelError("Embedding model produced an empty output".into()));
        }
        extractor.feature_size = warm_up.len();
        info!("Inferred feature size from model: {}", extractor.feature_size);

        Ok(extractor)
    }

    pub fn model_path(&self) -> &str {
        &self.model_path
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    /// Validates that the model has at least one input and one output
    fn validate_model(session: &Session) -> Result<(), ClassifierError> {
        if session.inputs.is_empty() {
            return Err(ClassifierError::ModelError(
                "Model must have at least 1 input for images".to_string(),
            ));
        }
        if session.outputs.is_empty() {
            return Err(ClassifierError::ModelError(
                "Model must have at least 1 output for features".to_string(),
            ));
        }
        Ok(())
    }

    fn run(&self, input: Array4<f32>) -> Result<FeatureVector, ClassifierError> {
        debug!("Embedding input tensor shape: {:?}", input.shape());
        let input_dyn = input.into_dyn();
        let pixels = input_dyn.as_standard_layout();

        let mut input_tensors = HashMap::new();
        input_tensors.insert(
            self.input_name.as_str(),
            Tensor::from_array(&pixels)
                .map_err(|e| ClassifierError::ModelError(format!("Failed to create input tensor: {}", e)))?,
        );

        let outputs = self.session.run(input_tensors)
            .map_err(|e| ClassifierError::ExtractionError(format!("Failed to run embedding model: {}", e)))?;
        let output_tensor = outputs[0].try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::ExtractionError(format!("Failed to extract output tensor: {}", e)))?;
        debug!("Embedding output shape: {:?}", output_tensor.shape());

        Ok(Array1::from_iter(output_tensor.iter().copied()))
    }
}

impl FeatureExtractor for OnnxFeatureExtractor {
    fn feature_size(&self) -> usize {
        self.feature_size
    }

    fn extract_features(&self, image: &DynamicImage) -> Result<FeatureVector, ClassifierError> {
        debug!("Original image size: {}x{}", image.width(), image.height());
        let input = prepare_input(image, self.max_dimension, self.input_size);
        let features = self.run(input)?;

        if features.len() != self.feature_size {
            return Err(ClassifierError::ExtractionError(format!(
                "Embedding model returned {} features, expected {}",
                features.len(),
                self.feature_size
            )));
        }
        Ok(features)
    }
}
