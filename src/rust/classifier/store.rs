use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;

use log::info;
use serde::Serialize;

use super::embedding::FeatureVector;
use super::error::ClassifierError;
use super::utils::sanitize_class_name;

/// A sanitized class identifier: starts with an ASCII letter, followed by
/// ASCII letters, digits or underscores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ClassLabel(String);

impl ClassLabel {
    /// Builds a label from arbitrary user text.
    pub fn sanitize(raw: &str) -> Self {
        Self(sanitize_class_name(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ClassLabel {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ClassLabel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ClassLabel {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ClassLabel {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Labels in insertion order plus the feature vectors collected for each.
///
/// The position of a label in `labels()` is its class index for training.
/// Example order within a class is upload order, and indices stay contiguous
/// after removals.
#[derive(Debug, Default, Clone)]
pub struct ExampleStore {
    labels: Vec<ClassLabel>,
    examples: HashMap<ClassLabel, Vec<FeatureVector>>,
}

impl ExampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new, empty class and returns its sanitized label.
    ///
    /// # Errors
    /// - `EmptyName` if `raw_name` is blank
    /// - `DuplicateClass` if the sanitized label is already registered
    pub fn add_class(&mut self, raw_name: &str) -> Result<ClassLabel, ClassifierError> {
        let trimmed = raw_name.trim();
        if trimmed.is_empty() {
            return Err(ClassifierError::EmptyName);
        }

        let label = ClassLabel::sanitize(trimmed);
        if self.contains(label.as_str()) {
            return Err(ClassifierError::DuplicateClass(trimmed.to_string()));
        }

        if label.as_str() != trimmed {
            info!("Class \"{}\" added as \"{}\"", trimmed, label);
        } else {
            info!("Class \"{}\" added", label);
        }

        self.labels.push(label.clone());
        self.examples.insert(label.clone(), Vec::new());
        Ok(label)
    }

    /// Removes a class and its examples. Returns `false` if it was not registered.
    pub fn remove_class(&mut self, label: &str) -> bool {
        let Some(position) = self.position(label) else {
            return false;
        };
        self.labels.remove(position);
        self.examples.remove(label);
        info!("Class \"{}\" removed", label);
        true
    }

    /// Appends a feature vector to the end of a class's example set and
    /// returns its index.
    pub fn push_example(&mut self, label: &str, features: FeatureVector) -> Result<usize, ClassifierError> {
        let set = self.examples.get_mut(label)
            .ok_or_else(|| ClassifierError::UnknownClass(label.to_string()))?;
        set.push(features);
        Ok(set.len() - 1)
    }

    /// Removes one example; later examples shift down by one.
    pub fn remove_example(&mut self, label: &str, index: usize) -> Result<FeatureVector, ClassifierError> {
        let set = self.examples.get_mut(label)
            .ok_or_else(|| ClassifierError::UnknownClass(label.to_string()))?;
        if index >= set.len() {
            return Err(ClassifierError::IndexOutOfRange {
                label: label.to_string(),
                index,
                len: set.len(),
            });
        }
        Ok(set.remove(index))
    }

    pub fn clear(&mut self) {
        self.labels.clear();
        self.examples.clear();
    }

    pub fn labels(&self) -> &[ClassLabel] {
        &self.labels
    }

    pub fn contains(&self, label: &str) -> bool {
        self.examples.contains_key(label)
    }

    /// Class index of `label` in insertion order.
    pub fn position(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l.as_str() == label)
    }

    pub fn examples(&self, label: &str) -> Option<&[FeatureVector]> {
        self.examples.get(label).map(Vec::as_slice)
    }

    pub fn example_count(&self, label: &str) -> Option<usize> {
        self.examples.get(label).map(Vec::len)
    }

    pub fn total_examples(&self) -> usize {
        self.examples.values().map(Vec::len).sum()
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Iterates classes in class-index order with their example sets.
    pub fn iter(&self) -> impl Iterator<Item = (&ClassLabel, &[FeatureVector])> {
        self.labels.iter().map(move |label| {
            let set = self.examples.get(label.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            (label, set)
        })
    }
}
