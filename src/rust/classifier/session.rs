use std::collections::HashMap;
use std::fmt;

use log::{debug, error, info, warn};
use serde::Serialize;

use super::dataset::TrainingDataset;
use super::embedding::{FeatureExtractor, FeatureVector, ImageSource};
use super::engine::{ClassifierEngine, EpochReport, HeadSpec, TrainedHead, TrainingPlan};
use super::error::ClassifierError;
use super::readiness::Readiness;
use super::store::{ClassLabel, ExampleStore};
use super::utils::argmax;
use super::SessionInfo;
use crate::config::TrainingSettings;

/// Upload progress is logged every this many images
const PROGRESS_INTERVAL: usize = 5;

/// Lifecycle of the classifier head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrainingState {
    /// No usable head
    Idle,
    /// A training job is running
    Training,
    /// A head trained on the current data is installed
    Trained,
    /// The last run failed; behaves like `Idle`
    Failed,
}

/// A per-item upload failure.
#[derive(Debug)]
pub struct UploadFailure {
    /// Position of the item in the uploaded batch
    pub position: usize,
    pub source: String,
    pub error: ClassifierError,
}

/// Result of a batch upload to one class.
#[derive(Debug)]
pub struct UploadReport {
    pub label: ClassLabel,
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: Vec<UploadFailure>,
}

/// A classified image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: ClassLabel,
    /// Probability of `label`, in `[0, 1]`
    pub confidence: f32,
    /// Probability of every class
    pub scores: HashMap<String, f32>,
}

/// A snapshot of the session's data, ready to be fitted away from the session.
///
/// Obtained from [`TrainingSession::begin_training`]; its [`TrainingOutcome`]
/// must be handed back through [`TrainingSession::finish_training`].
#[derive(Debug)]
pub struct TrainingJob {
    ticket: u64,
    generation: u64,
    spec: HeadSpec,
    plan: TrainingPlan,
    dataset: TrainingDataset,
}

impl TrainingJob {
    pub fn spec(&self) -> &HeadSpec {
        &self.spec
    }

    pub fn plan(&self) -> &TrainingPlan {
        &self.plan
    }

    pub fn num_examples(&self) -> usize {
        self.dataset.len()
    }

    /// Fits a fresh head. Blocks until every epoch has run or the engine fails.
    pub fn run(self, engine: &dyn ClassifierEngine, on_epoch: &mut dyn FnMut(EpochReport)) -> TrainingOutcome {
        info!(
            "Training on {} examples for {} epochs (batch size {}, shuffle buffer {})",
            self.dataset.len(), self.plan.epochs, self.plan.batch_size, self.plan.shuffle_buffer
        );
        let result = engine.fit(&self.spec, &self.dataset, &self.plan, on_epoch);
        TrainingOutcome {
            ticket: self.ticket,
            generation: self.generation,
            result,
        }
    }
}

/// What a [`TrainingJob`] produced.
pub struct TrainingOutcome {
    ticket: u64,
    generation: u64,
    result: Result<Box<dyn TrainedHead>, ClassifierError>,
}

impl TrainingOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

impl fmt::Debug for TrainingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainingOutcome")
            .field("ticket", &self.ticket)
            .field("generation", &self.generation)
            .field("ok", &self.result.is_ok())
            .finish()
    }
}

/// All state of one teaching session: classes, their examples and the
/// trained head.
///
/// Every change to the classes or examples discards the trained head in the
/// same call, so a session never reports itself trained on data it has not
/// seen.
pub struct TrainingSession {
    store: ExampleStore,
    head: Option<Box<dyn TrainedHead>>,
    state: TrainingState,
    /// Bumped on every data mutation
    generation: u64,
    active_ticket: Option<u64>,
    next_ticket: u64,
    hidden_units: usize,
    plan: TrainingPlan,
}

impl Default for TrainingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TrainingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainingSession")
            .field("store", &self.store)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("active_ticket", &self.active_ticket)
            .field("plan", &self.plan)
            .finish_non_exhaustive()
    }
}

impl TrainingSession {
    pub fn new() -> Self {
        Self {
            store: ExampleStore::new(),
            head: None,
            state: TrainingState::Idle,
            generation: 0,
            active_ticket: None,
            next_ticket: 0,
            hidden_units: HeadSpec::DEFAULT_HIDDEN_UNITS,
            plan: TrainingPlan::default(),
        }
    }

    pub fn from_settings(settings: &TrainingSettings) -> Self {
        Self::new()
            .with_plan(TrainingPlan::from(settings))
            .with_hidden_units(settings.hidden_units)
    }

    pub fn with_plan(mut self, plan: TrainingPlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn with_hidden_units(mut self, hidden_units: usize) -> Self {
        self.hidden_units = hidden_units;
        self
    }

    pub fn store(&self) -> &ExampleStore {
        &self.store
    }

    pub fn class_labels(&self) -> &[ClassLabel] {
        self.store.labels()
    }

    pub fn state(&self) -> TrainingState {
        self.state
    }

    pub fn is_training(&self) -> bool {
        self.active_ticket.is_some()
    }

    pub fn is_trained(&self) -> bool {
        self.head.is_some()
    }

    pub fn readiness(&self, extractor_available: bool) -> Readiness {
        Readiness::evaluate(self.is_training(), self.is_trained(), self.store.len(), extractor_available)
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            class_labels: self.store.labels().iter().map(|l| l.to_string()).collect(),
            example_counts: self.store.iter().map(|(_, set)| set.len()).collect(),
            feature_size: self.feature_size(),
            state: self.state,
            is_trained: self.is_trained(),
        }
    }

    /// Size of the stored feature vectors, taken from the first example.
    pub fn feature_size(&self) -> Option<usize> {
        self.store.iter().find_map(|(_, set)| set.first().map(|v| v.len()))
    }

    fn invalidate(&mut self) {
        self.generation += 1;
        if self.head.take().is_some() {
            info!("Trained head discarded after data change");
        }
        if self.state != TrainingState::Training {
            self.state = TrainingState::Idle;
        }
    }

    /// Registers a new class from user text and returns its sanitized label.
    pub fn add_class(&mut self, raw_name: &str) -> Result<ClassLabel, ClassifierError> {
        let label = self.store.add_class(raw_name)?;
        self.invalidate();
        Ok(label)
    }

    /// Removes a class and its examples. Removing the last class resets the
    /// session. Returns `false` if the label was not registered.
    pub fn remove_class(&mut self, label: &str) -> bool {
        if !self.store.remove_class(label) {
            debug!("Ignoring removal of unknown class \"{}\"", label);
            return false;
        }
        self.invalidate();
        if self.store.is_empty() {
            self.reset();
        }
        true
    }

    /// Extracts features from one image and appends them to `label`'s
    /// examples. Returns the new example's index.
    pub fn add_example(
        &mut self,
        label: &str,
        image: impl Into<ImageSource>,
        extractor: &dyn FeatureExtractor,
    ) -> Result<usize, ClassifierError> {
        if !self.store.contains(label) {
            return Err(ClassifierError::UnknownClass(label.to_string()));
        }
        let features = extractor.extract_from_source(image.into())?;
        let index = self.store.push_example(label, features)?;
        self.invalidate();
        Ok(index)
    }

    /// Uploads several images to one class, one at a time and in order.
    ///
    /// A failing image is logged, recorded in the report and skipped; it never
    /// stops the rest of the batch.
    pub fn add_examples<I>(
        &mut self,
        label: &str,
        images: I,
        extractor: &dyn FeatureExtractor,
    ) -> Result<UploadReport, ClassifierError>
    where
        I: IntoIterator,
        I::Item: Into<ImageSource>,
    {
        let position = self
            .store
            .position(label)
            .ok_or_else(|| ClassifierError::UnknownClass(label.to_string()))?;
        let class = self.store.labels()[position].clone();

        let images: Vec<ImageSource> = images.into_iter().map(Into::into).collect();
        let total = images.len();
        info!("Processing {} images for class {}...", total, class);

        let mut report = UploadReport {
            label: class,
            attempted: total,
            succeeded: 0,
            failures: Vec::new(),
        };

        for (i, image) in images.into_iter().enumerate() {
            let source = image.describe();
            match extractor
                .extract_from_source(image)
                .and_then(|features| self.store.push_example(label, features))
            {
                Ok(_) => {
                    self.invalidate();
                    report.succeeded += 1;
                }
                Err(e) => {
                    warn!("Error processing image {} ({}): {}", i + 1, source, e);
                    report.failures.push(UploadFailure { position: i, source, error: e });
                }
            }

            if i % PROGRESS_INTERVAL == 0 || i + 1 == total {
                debug!("Processed {} of {} images for class {}...", i + 1, total, report.label);
            }
        }

        info!(
            "Added {} out of {} images to class {}",
            report.succeeded, report.attempted, report.label
        );
        Ok(report)
    }

    /// Removes one example; later examples of the class shift down by one.
    pub fn remove_example(&mut self, label: &str, index: usize) -> Result<(), ClassifierError> {
        self.store.remove_example(label, index)?;
        self.invalidate();
        info!("Removed image {} from class \"{}\"", index, label);
        Ok(())
    }

    /// Clears every class, example and trained head.
    ///
    /// A job started before the reset keeps blocking new training runs until
    /// its outcome is handed to [`TrainingSession::finish_training`], which
    /// then discards it.
    pub fn reset(&mut self) {
        self.store.clear();
        self.invalidate();
        info!("Model and data reset");
    }

    /// Validates the session and snapshots its data into a [`TrainingJob`].
    ///
    /// # Errors
    /// - `TrainingInProgress` if a job is already active
    /// - `InsufficientClasses` with fewer than two classes
    /// - `NoTrainingData` if every class is empty
    pub fn begin_training(&mut self) -> Result<TrainingJob, ClassifierError> {
        if self.is_training() {
            return Err(ClassifierError::TrainingInProgress);
        }
        let num_classes = self.store.len();
        if num_classes < 2 {
            return Err(ClassifierError::InsufficientClasses(num_classes));
        }
        if self.plan.epochs == 0 || self.plan.batch_size == 0 {
            return Err(ClassifierError::ValidationError(format!(
                "Training needs at least one epoch and a positive batch size (epochs {}, batch size {})",
                self.plan.epochs, self.plan.batch_size
            )));
        }
        let feature_size = self.feature_size().ok_or(ClassifierError::NoTrainingData)?;
        let dataset = TrainingDataset::from_store(&self.store, feature_size)?;

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.active_ticket = Some(ticket);
        self.state = TrainingState::Training;

        Ok(TrainingJob {
            ticket,
            generation: self.generation,
            spec: HeadSpec::new(feature_size, num_classes).with_hidden_units(self.hidden_units),
            plan: self.plan.clone(),
            dataset,
        })
    }

    /// Installs the head produced by a job.
    ///
    /// The head is discarded when the classes or examples changed after the
    /// job was started. On engine failure a previously trained head stays
    /// installed.
    pub fn finish_training(&mut self, outcome: TrainingOutcome) -> Result<(), ClassifierError> {
        if self.active_ticket != Some(outcome.ticket) {
            warn!("Discarding result of unknown training job {}", outcome.ticket);
            return Err(ClassifierError::TrainingError("Outcome does not belong to the active training job".into()));
        }
        self.active_ticket = None;

        match outcome.result {
            Ok(head) if outcome.generation == self.generation => {
                self.head = Some(head);
                self.state = TrainingState::Trained;
                info!("Model trained successfully");
                Ok(())
            }
            Ok(_) => {
                self.state = TrainingState::Idle;
                warn!("Training data changed during training, discarding the result");
                Err(ClassifierError::TrainingError(
                    "Training data changed during training; train again".into(),
                ))
            }
            Err(e) => {
                error!("Training error: {}", e);
                self.state = if self.head.is_some() {
                    TrainingState::Trained
                } else {
                    TrainingState::Failed
                };
                Err(match e {
                    ClassifierError::TrainingError(_) => e,
                    other => ClassifierError::TrainingError(other.to_string()),
                })
            }
        }
    }

    /// Trains a fresh head on the current data, reporting each epoch to
    /// `on_epoch`.
    pub fn train(
        &mut self,
        engine: &dyn ClassifierEngine,
        on_epoch: &mut dyn FnMut(EpochReport),
    ) -> Result<(), ClassifierError> {
        let job = self.begin_training()?;
        let outcome = job.run(engine, on_epoch);
        self.finish_training(outcome)
    }

    /// Classifies an image with the trained head.
    ///
    /// # Errors
    /// - `NotTrained` before a successful training run
    /// - `NoInput` if `image` is `None`
    /// - `ExtractionError` from decoding or the embedding model
    pub fn predict(
        &self,
        image: Option<ImageSource>,
        extractor: &dyn FeatureExtractor,
    ) -> Result<Prediction, ClassifierError> {
        if self.head.is_none() {
            return Err(ClassifierError::NotTrained);
        }
        let image = image.ok_or(ClassifierError::NoInput)?;
        let features = extractor.extract_from_source(image)?;
        self.predict_features(&features)
    }

    /// Classifies an already extracted feature vector.
    pub fn predict_features(&self, features: &FeatureVector) -> Result<Prediction, ClassifierError> {
        let head = self.head.as_ref().ok_or(ClassifierError::NotTrained)?;
        let labels = self.store.labels();

        let probabilities = head.predict(features)?;
        if probabilities.len() != labels.len() {
            return Err(ClassifierError::PredictionError(format!(
                "Head returned {} probabilities for {} classes",
                probabilities.len(),
                labels.len()
            )));
        }
        debug!("Final prediction: {:?}", probabilities);

        let (index, confidence) = argmax(&probabilities)
            .ok_or_else(|| ClassifierError::PredictionError("Head returned no finite probability".into()))?;
        let scores = labels
            .iter()
            .zip(&probabilities)
            .map(|(label, &p)| (label.to_string(), p))
            .collect();

        Ok(Prediction {
            label: labels[index].clone(),
            confidence: confidence.clamp(0.0, 1.0),
            scores,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::dataset::TrainingDataset;
    use image::{DynamicImage, Rgb, RgbImage};
    use ndarray::Array1;

    /// Features are the mean of each color channel.
    struct MeanColor;

    impl FeatureExtractor for MeanColor {
        fn feature_size(&self) -> usize {
            3
        }

        fn extract_features(&self, image: &DynamicImage) -> Result<FeatureVector, ClassifierError> {
            let rgb = image.to_rgb8();
            let n = (rgb.width() * rgb.height()).max(1) as f32;
            let mut sums = [0u32; 3];
            for pixel in rgb.pixels() {
                for c in 0..3 {
                    sums[c] += u32::from(pixel[c]);
                }
            }
            Ok(Array1::from_iter(sums.iter().map(|&s| s as f32 / n / 255.0)))
        }
    }

    #[derive(Debug)]
    struct FixedHead(Vec<f32>);

    impl TrainedHead for FixedHead {
        fn predict(&self, _: &FeatureVector) -> Result<Vec<f32>, ClassifierError> {
            Ok(self.0.clone())
        }

        fn num_classes(&self) -> usize {
            self.0.len()
        }
    }

    /// Returns a head that always favours the last class.
    struct FixedEngine;

    impl ClassifierEngine for FixedEngine {
        fn fit(
            &self,
            spec: &HeadSpec,
            _: &TrainingDataset,
            plan: &TrainingPlan,
            on_epoch: &mut dyn FnMut(EpochReport),
        ) -> Result<Box<dyn TrainedHead>, ClassifierError> {
            for epoch in 1..=plan.epochs {
                on_epoch(EpochReport { epoch, total_epochs: plan.epochs, loss: 1.0 / epoch as f64, accuracy: 0.5 });
            }
            let mut probs = vec![0.1 / (spec.num_classes - 1) as f32; spec.num_classes];
            probs[spec.num_classes - 1] = 0.9;
            Ok(Box::new(FixedHead(probs)))
        }
    }

    struct FailingEngine;

    impl ClassifierEngine for FailingEngine {
        fn fit(
            &self,
            _: &HeadSpec,
            _: &TrainingDataset,
            _: &TrainingPlan,
            _: &mut dyn FnMut(EpochReport),
        ) -> Result<Box<dyn TrainedHead>, ClassifierError> {
            Err(ClassifierError::TrainingError("NaN loss".into()))
        }
    }

    fn solid(r: u8, g: u8, b: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([r, g, b])))
    }

    fn trained_session() -> TrainingSession {
        let mut session = TrainingSession::new();
        session.add_class("cat").unwrap();
        session.add_class("dog").unwrap();
        session.add_example("cat", solid(255, 0, 0), &MeanColor).unwrap();
        session.add_example("dog", solid(0, 0, 255), &MeanColor).unwrap();
        session.train(&FixedEngine, &mut |_| {}).unwrap();
        assert!(session.is_trained());
        session
    }

    #[test]
    fn test_every_mutation_invalidates() {
        let mutations: Vec<Box<dyn Fn(&mut TrainingSession)>> = vec![
            Box::new(|s: &mut TrainingSession| { s.add_class("bird").unwrap(); }),
            Box::new(|s: &mut TrainingSession| { assert!(s.remove_class("dog")); }),
            Box::new(|s: &mut TrainingSession| { s.add_example("cat", solid(1, 2, 3), &MeanColor).unwrap(); }),
            Box::new(|s: &mut TrainingSession| { s.remove_example("cat", 0).unwrap(); }),
            Box::new(|s: &mut TrainingSession| {
                s.add_examples("dog", vec![solid(0, 0, 200)], &MeanColor).unwrap();
            }),
            Box::new(|s: &mut TrainingSession| s.reset()),
        ];

        for mutate in mutations {
            let mut session = trained_session();
            mutate(&mut session);
            assert!(!session.is_trained());
            assert_ne!(session.state(), TrainingState::Trained);
            assert!(matches!(
                session.predict(Some(solid(0, 0, 0).into()), &MeanColor),
                Err(ClassifierError::NotTrained)
            ));
        }
    }

    #[test]
    fn test_failed_operations_keep_training() {
        let mut session = trained_session();
        assert!(session.add_class("cat").is_err());
        assert!(session.add_class("  ").is_err());
        assert!(session.remove_example("cat", 5).is_err());
        assert!(!session.remove_class("ghost"));
        assert!(session.add_example("ghost", solid(0, 0, 0), &MeanColor).is_err());
        assert!(session
            .add_example("cat", ImageSource::Bytes(b"junk".to_vec()), &MeanColor)
            .is_err());
        assert!(session.is_trained());
    }

    #[test]
    fn test_insufficient_classes() {
        let mut session = TrainingSession::new();
        assert!(matches!(
            session.train(&FixedEngine, &mut |_| {}),
            Err(ClassifierError::InsufficientClasses(0))
        ));
        session.add_class("only").unwrap();
        session.add_example("only", solid(9, 9, 9), &MeanColor).unwrap();
        assert!(matches!(
            session.train(&FixedEngine, &mut |_| {}),
            Err(ClassifierError::InsufficientClasses(1))
        ));
        assert!(!session.is_trained());
        assert!(!session.is_training());
    }

    #[test]
    fn test_no_training_data() {
        let mut session = TrainingSession::new();
        session.add_class("a").unwrap();
        session.add_class("b").unwrap();
        assert!(matches!(
            session.train(&FixedEngine, &mut |_| {}),
            Err(ClassifierError::NoTrainingData)
        ));
        assert_eq!(session.state(), TrainingState::Idle);
    }

    #[test]
    fn test_second_begin_is_rejected() {
        let mut session = trained_session();
        session.add_example("cat", solid(200, 0, 0), &MeanColor).unwrap();
        let job = session.begin_training().unwrap();
        assert!(session.is_training());
        assert_eq!(session.state(), TrainingState::Training);
        assert!(matches!(session.begin_training(), Err(ClassifierError::TrainingInProgress)));
        assert!(!session.readiness(true).can_train);

        let outcome = job.run(&FixedEngine, &mut |_| {});
        session.finish_training(outcome).unwrap();
        assert!(session.is_trained());
        assert!(!session.is_training());
    }

    #[test]
    fn test_mutation_during_training_discards_result() {
        let mut session = trained_session();
        session.add_example("dog", solid(0, 0, 100), &MeanColor).unwrap();
        let job = session.begin_training().unwrap();
        session.add_example("cat", solid(100, 0, 0), &MeanColor).unwrap();

        let outcome = job.run(&FixedEngine, &mut |_| {});
        assert!(matches!(
            session.finish_training(outcome),
            Err(ClassifierError::TrainingError(_))
        ));
        assert!(!session.is_trained());
        assert_eq!(session.state(), TrainingState::Idle);
        session.train(&FixedEngine, &mut |_| {}).unwrap();
        assert!(session.is_trained());
    }

    #[test]
    fn test_reset_during_training_supersedes_job() {
        let mut session = trained_session();
        session.add_example("dog", solid(0, 0, 100), &MeanColor).unwrap();
        let job = session.begin_training().unwrap();
        session.reset();
        assert!(session.is_training());
        assert!(session.class_labels().is_empty());

        // The running job still guards against a second start
        session.add_class("cat").unwrap();
        session.add_class("dog").unwrap();
        session.add_example("cat", solid(255, 0, 0), &MeanColor).unwrap();
        assert!(matches!(session.begin_training(), Err(ClassifierError::TrainingInProgress)));

        let outcome = job.run(&FixedEngine, &mut |_| {});
        assert!(session.finish_training(outcome).is_err());
        assert!(!session.is_trained());
        assert!(!session.is_training());
        assert_eq!(session.state(), TrainingState::Idle);

        session.train(&FixedEngine, &mut |_| {}).unwrap();
        assert!(session.is_trained());
    }

    #[test]
    fn test_removing_last_class_during_training_keeps_guard() {
        let mut session = trained_session();
        let job = session.begin_training().unwrap();
        assert!(session.remove_class("cat"));
        assert!(session.remove_class("dog"));
        assert!(session.is_training());
        assert!(matches!(session.begin_training(), Err(ClassifierError::TrainingInProgress)));

        let outcome = job.run(&FixedEngine, &mut |_| {});
        assert!(session.finish_training(outcome).is_err());
        assert!(!session.is_training());
    }

    #[test]
    fn test_zero_epochs_rejected() {
        let mut session = trained_session().with_plan(TrainingPlan { epochs: 0, ..TrainingPlan::default() });
        session.add_example("cat", solid(200, 0, 0), &MeanColor).unwrap();
        assert!(matches!(
            session.train(&FixedEngine, &mut |_| {}),
            Err(ClassifierError::ValidationError(_))
        ));
        assert!(!session.is_trained());
        assert!(!session.is_training());
        assert_eq!(session.state(), TrainingState::Idle);
    }

    #[test]
    fn test_failed_training_then_retry() {
        let mut session = TrainingSession::new();
        session.add_class("a").unwrap();
        session.add_class("b").unwrap();
        session.add_example("a", solid(1, 1, 1), &MeanColor).unwrap();

        assert!(matches!(
            session.train(&FailingEngine, &mut |_| {}),
            Err(ClassifierError::TrainingError(_))
        ));
        assert_eq!(session.state(), TrainingState::Failed);
        assert!(!session.is_training());
        assert!(session.readiness(true).can_train);

        session.train(&FixedEngine, &mut |_| {}).unwrap();
        assert_eq!(session.state(), TrainingState::Trained);
    }

    #[test]
    fn test_failed_retrain_keeps_previous_head() {
        let mut session = trained_session();
        assert!(session.train(&FailingEngine, &mut |_| {}).is_err());
        assert!(session.is_trained());
        assert_eq!(session.state(), TrainingState::Trained);
    }

    #[test]
    fn test_epoch_reports_forwarded() {
        let mut session = TrainingSession::new().with_plan(TrainingPlan { epochs: 4, ..TrainingPlan::default() });
        session.add_class("a").unwrap();
        session.add_class("b").unwrap();
        session.add_example("b", solid(1, 1, 1), &MeanColor).unwrap();

        let mut epochs = Vec::new();
        session.train(&FixedEngine, &mut |r| epochs.push(r.epoch)).unwrap();
        assert_eq!(epochs, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_predict_checks_order() {
        let session = TrainingSession::new();
        assert!(matches!(session.predict(None, &MeanColor), Err(ClassifierError::NotTrained)));

        let session = trained_session();
        assert!(matches!(session.predict(None, &MeanColor), Err(ClassifierError::NoInput)));
        assert!(matches!(
            session.predict(Some(ImageSource::Bytes(vec![0, 1, 2])), &MeanColor),
            Err(ClassifierError::ExtractionError(_))
        ));

        let prediction = session.predict(Some(solid(0, 0, 0).into()), &MeanColor).unwrap();
        assert_eq!(prediction.label, "dog");
        assert!((prediction.confidence - 0.9).abs() < 1e-6);
        assert_eq!(prediction.scores.len(), 2);
    }

    #[test]
    fn test_batch_upload_skips_failures() {
        let mut session = TrainingSession::new();
        session.add_class("cat").unwrap();
        let images: Vec<ImageSource> = vec![
            solid(10, 0, 0).into(),
            ImageSource::Bytes(b"broken".to_vec()),
            solid(20, 0, 0).into(),
            ImageSource::Path("/nonexistent/cat.png".into()),
            solid(30, 0, 0).into(),
        ];

        let report = session.add_examples("cat", images, &MeanColor).unwrap();
        assert_eq!((report.attempted, report.succeeded), (5, 3));
        let failed: Vec<usize> = report.failures.iter().map(|f| f.position).collect();
        assert_eq!(failed, vec![1, 3]);

        // Upload order is preserved
        let reds: Vec<f32> = session.store().examples("cat").unwrap().iter().map(|v| v[0]).collect();
        assert_eq!(reds.len(), 3);
        for (red, expected) in reds.iter().zip([10.0f32, 20.0, 30.0]) {
            assert!((red - expected / 255.0).abs() < 1e-5, "{} vs {}", red, expected / 255.0);
        }
    }

    #[test]
    fn test_batch_upload_to_unknown_class() {
        let mut session = TrainingSession::new();
        assert!(matches!(
            session.add_examples("ghost", vec![solid(0, 0, 0)], &MeanColor),
            Err(ClassifierError::UnknownClass(_))
        ));
    }

    #[test]
    fn test_removing_last_class_resets() {
        let mut session = TrainingSession::new();
        session.add_class("solo").unwrap();
        session.add_example("solo", solid(0, 0, 0), &MeanColor).unwrap();
        assert!(session.remove_class("solo"));
        assert!(session.class_labels().is_empty());
        assert_eq!(session.store().total_examples(), 0);
        assert_eq!(session.feature_size(), None);
    }

    #[test]
    fn test_info() {
        let session = trained_session();
        let info = session.info();
        assert_eq!(info.class_labels, vec!["cat", "dog"]);
        assert_eq!(info.example_counts, vec![1, 1]);
        assert_eq!(info.feature_size, Some(3));
        assert!(info.is_trained);
        assert_eq!(info.state, TrainingState::Trained);
    }
}
