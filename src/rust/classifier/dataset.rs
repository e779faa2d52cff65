use rand::Rng;

use super::embedding::FeatureVector;
use super::error::ClassifierError;
use super::store::ExampleStore;

/// One training batch, materialised row-major for the engine.
#[derive(Debug, Clone)]
pub struct Batch {
    /// `[len, feature_size]` features
    pub features: Vec<f32>,
    /// `[len, num_classes]` one-hot targets
    pub targets: Vec<f32>,
    /// Class index of every row
    pub labels: Vec<usize>,
    pub feature_size: usize,
    pub num_classes: usize,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Flattened `(features, class_index)` pairs for one training run.
///
/// The dataset is a snapshot: it owns copies of the feature vectors so a
/// training job never borrows the session.
#[derive(Debug, Clone)]
pub struct TrainingDataset {
    features: Vec<FeatureVector>,
    labels: Vec<usize>,
    feature_size: usize,
    num_classes: usize,
}

impl TrainingDataset {
    /// Assembles the dataset from every class of `store`, in class-index order.
    pub fn from_store(store: &ExampleStore, feature_size: usize) -> Result<Self, ClassifierError> {
        let mut features = Vec::with_capacity(store.total_examples());
        let mut labels = Vec::with_capacity(store.total_examples());

        for (class_index, (label, set)) in store.iter().enumerate() {
            for (i, vector) in set.iter().enumerate() {
                if vector.len() != feature_size {
                    return Err(ClassifierError::ValidationError(format!(
                        "Example {} of class \"{}\" has {} features, expected {}",
                        i, label, vector.len(), feature_size
                    )));
                }
                features.push(vector.clone());
                labels.push(class_index);
            }
        }

        Ok(Self {
            features,
            labels,
            feature_size,
            num_classes: store.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn feature_size(&self) -> usize {
        self.feature_size
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Visit order for one epoch through a bounded shuffle buffer.
    ///
    /// The buffer is filled with the first `buffer_size` items; each step
    /// emits a random buffered item and refills its slot from the stream.
    /// A buffer of 1 keeps the original order, a buffer at least as large as
    /// the dataset is a full shuffle.
    pub fn shuffled_order<R: Rng + ?Sized>(&self, buffer_size: usize, rng: &mut R) -> Vec<usize> {
        let buffer_size = buffer_size.max(1);
        let mut stream = 0..self.len();
        let mut buffer: Vec<usize> = stream.by_ref().take(buffer_size).collect();
        let mut order = Vec::with_capacity(self.len());

        while !buffer.is_empty() {
            let slot = rng.gen_range(0..buffer.len());
            match stream.next() {
                Some(next) => order.push(std::mem::replace(&mut buffer[slot], next)),
                None => order.push(buffer.swap_remove(slot)),
            }
        }
        order
    }

    /// Splits one epoch into batches of at most `batch_size` rows.
    pub fn epoch_batches<R: Rng + ?Sized>(
        &self,
        batch_size: usize,
        buffer_size: usize,
        rng: &mut R,
    ) -> Vec<Batch> {
        let order = self.shuffled_order(buffer_size, rng);
        order
            .chunks(batch_size.max(1))
            .map(|chunk| self.materialise(chunk))
            .collect()
    }

    fn materialise(&self, indices: &[usize]) -> Batch {
        let mut features = Vec::with_capacity(indices.len() * self.feature_size);
        let mut targets = vec![0.0f32; indices.len() * self.num_classes];
        let mut labels = Vec::with_capacity(indices.len());

        for (row, &index) in indices.iter().enumerate() {
            features.extend(self.features[index].iter().copied());
            let class_index = self.labels[index];
            targets[row * self.num_classes + class_index] = 1.0;
            labels.push(class_index);
        }

        Batch {
            features,
            targets,
            labels,
            feature_size: self.feature_size,
            num_classes: self.num_classes,
        }
    }
}
