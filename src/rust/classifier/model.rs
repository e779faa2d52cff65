//! Default classifier engine: a two-layer head trained with `burn` on the CPU.

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use burn::module::{AutodiffModule, Module};
use burn::nn::{Linear, LinearConfig, Relu};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::activation::softmax;
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::dataset::{Batch, TrainingDataset};
use super::embedding::FeatureVector;
use super::engine::{ClassifierEngine, EpochReport, HeadSpec, LossKind, TrainedHead, TrainingPlan};
use super::error::ClassifierError;
use super::utils::argmax;

type TrainBackend = Autodiff<NdArray>;
type InferBackend = NdArray;

/// Clipping applied to probabilities before taking logarithms
const PROBABILITY_EPSILON: f32 = 1e-7;

/// Classifier head: Linear -> ReLU -> Linear -> softmax.
#[derive(Module, Debug)]
pub struct HeadModel<B: Backend> {
    hidden: Linear<B>,
    output: Linear<B>,
    activation: Relu,
}

impl<B: Backend> HeadModel<B> {
    /// Freshly initialised weights for `spec`
    pub fn init(spec: &HeadSpec, device: &B::Device) -> Self {
        Self {
            hidden: LinearConfig::new(spec.input_size, spec.hidden_units).init(device),
            output: LinearConfig::new(spec.hidden_units, spec.num_classes).init(device),
            activation: Relu::new(),
        }
    }

    /// Class probabilities `[batch_size, num_classes]` for features `[batch_size, input_size]`
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.hidden.forward(features);
        let x = self.activation.forward(x);
        let x = self.output.forward(x);
        softmax(x, 1)
    }
}

/// Loss of softmax outputs against one-hot targets.
fn loss<B: Backend>(kind: LossKind, probabilities: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    let p = probabilities.clamp(PROBABILITY_EPSILON, 1.0 - PROBABILITY_EPSILON);
    match kind {
        LossKind::BinaryCrossEntropy => {
            let positive = targets.clone().mul(p.clone().log());
            let negative = targets.neg().add_scalar(1.0).mul(p.neg().add_scalar(1.0).log());
            positive.add(negative).neg().mean()
        }
        LossKind::CategoricalCrossEntropy => targets.mul(p.log()).sum_dim(1).neg().mean(),
    }
}

fn batch_tensors<B: Backend>(batch: &Batch, device: &B::Device) -> (Tensor<B, 2>, Tensor<B, 2>) {
    let features = Tensor::<B, 1>::from_floats(batch.features.as_slice(), device)
        .reshape([batch.len(), batch.feature_size]);
    let targets = Tensor::<B, 1>::from_floats(batch.targets.as_slice(), device)
        .reshape([batch.len(), batch.num_classes]);
    (features, targets)
}

/// Counts rows whose arg-max probability matches the label.
fn count_correct(probabilities: &[f32], labels: &[usize], num_classes: usize) -> usize {
    probabilities
        .chunks(num_classes)
        .zip(labels)
        .filter(|(row, label)| argmax(row).map(|(i, _)| i) == Some(**label))
        .count()
}

/// Trains [`HeadModel`] with Adam on the `NdArray` backend.
#[derive(Debug, Clone, Default)]
pub struct BurnEngine {
    device: NdArrayDevice,
}

impl BurnEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClassifierEngine for BurnEngine {
    fn fit(
        &self,
        spec: &HeadSpec,
        dataset: &TrainingDataset,
        plan: &TrainingPlan,
        on_epoch: &mut dyn FnMut(EpochReport),
    ) -> Result<Box<dyn TrainedHead>, ClassifierError> {
        if dataset.is_empty() {
            return Err(ClassifierError::NoTrainingData);
        }
        if dataset.feature_size() != spec.input_size || dataset.num_classes() != spec.num_classes {
            return Err(ClassifierError::TrainingError(format!(
                "Dataset shape {}x{} does not match head {}x{}",
                dataset.feature_size(), dataset.num_classes(), spec.input_size, spec.num_classes
            )));
        }

        info!(
            "Fitting head {} -> {} -> {} ({:?}) on {} examples",
            spec.input_size, spec.hidden_units, spec.num_classes, spec.loss, dataset.len()
        );

        let mut rng = match plan.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut model = HeadModel::<TrainBackend>::init(spec, &self.device);
        let mut optim = AdamConfig::new().init();

        for epoch in 1..=plan.epochs {
            let batches = dataset.epoch_batches(plan.batch_size, plan.shuffle_buffer, &mut rng);
            let mut loss_sum = 0.0f64;
            let mut correct = 0usize;
            let mut seen = 0usize;

            for batch in &batches {
                let (features, targets) = batch_tensors::<TrainBackend>(batch, &self.device);
                let probabilities = model.forward(features);
                let batch_loss = loss(spec.loss, probabilities.clone(), targets);

                let loss_value = batch_loss.clone().into_scalar().elem::<f64>();
                if !loss_value.is_finite() {
                    return Err(ClassifierError::TrainingError(format!(
                        "Loss diverged in epoch {}",
                        epoch
                    )));
                }

                let probabilities = probabilities
                    .into_data()
                    .to_vec::<f32>()
                    .map_err(|e| ClassifierError::TrainingError(format!("Failed to read outputs: {:?}", e)))?;
                correct += count_correct(&probabilities, &batch.labels, spec.num_classes);
                seen += batch.len();
                loss_sum += loss_value;

                let grads = batch_loss.backward();
                let grads = GradientsParams::from_grads(grads, &model);
                model = optim.step(plan.learning_rate, model, grads);
            }

            let report = EpochReport {
                epoch,
                total_epochs: plan.epochs,
                loss: loss_sum / batches.len().max(1) as f64,
                accuracy: correct as f64 / seen.max(1) as f64,
            };
            debug!(
                "Epoch {} of {} completed. Loss: {:.5}, Accuracy: {:.2}%",
                report.epoch, report.total_epochs, report.loss, report.accuracy * 100.0
            );
            on_epoch(report);
        }

        Ok(Box::new(BurnHead {
            model: model.valid(),
            device: self.device.clone(),
            num_classes: spec.num_classes,
            input_size: spec.input_size,
        }))
    }
}

/// Inference-only copy of a trained [`HeadModel`].
#[derive(Debug)]
pub struct BurnHead {
    model: HeadModel<InferBackend>,
    device: NdArrayDevice,
    num_classes: usize,
    input_size: usize,
}

impl TrainedHead for BurnHead {
    fn predict(&self, features: &FeatureVector) -> Result<Vec<f32>, ClassifierError> {
        if features.len() != self.input_size {
            return Err(ClassifierError::PredictionError(format!(
                "Expected {} features, got {}",
                self.input_size,
                features.len()
            )));
        }
        let input: Vec<f32> = features.iter().copied().collect();
        let input = Tensor::<InferBackend, 1>::from_floats(input.as_slice(), &self.device)
            .reshape([1, self.input_size]);

        self.model
            .forward(input)
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| ClassifierError::PredictionError(format!("Failed to read outputs: {:?}", e)))
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }
}
