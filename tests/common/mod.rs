#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use env_logger::{Builder, Env};
use image::{DynamicImage, Rgb, RgbImage};
use ndarray::Array1;
use teachable::{
    ClassifierEngine, ClassifierError, EpochReport, FeatureExtractor, FeatureVector, HeadSpec, TrainedHead,
    TrainingDataset, TrainingPlan,
};

// Initialize test logger
pub fn init() {
    let _ = Builder::from_env(Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}

/// Extracts the mean of each color channel plus their complements.
#[derive(Default)]
pub struct ColorExtractor {
    pub calls: AtomicUsize,
}

impl ColorExtractor {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FeatureExtractor for ColorExtractor {
    fn feature_size(&self) -> usize {
        6
    }

    fn extract_features(&self, image: &DynamicImage) -> Result<FeatureVector, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rgb = image.to_rgb8();
        let n = (rgb.width() * rgb.height()).max(1) as f32;
        let mut sums = [0u32; 3];
        for pixel in rgb.pixels() {
            for (c, sum) in sums.iter_mut().enumerate() {
                *sum += u32::from(pixel[c]);
            }
        }
        let means = sums.map(|s| s as f32 / n / 255.0);
        Ok(Array1::from_iter(
            means.iter().copied().chain(means.iter().map(|m| 1.0 - m)),
        ))
    }
}

/// Produces a head that assigns all probability to one class.
pub struct ConstantEngine {
    pub winner: usize,
}

#[derive(Debug)]
pub struct ConstantHead {
    probabilities: Vec<f32>,
}

impl TrainedHead for ConstantHead {
    fn predict(&self, _: &FeatureVector) -> Result<Vec<f32>, ClassifierError> {
        Ok(self.probabilities.clone())
    }

    fn num_classes(&self) -> usize {
        self.probabilities.len()
    }
}

impl ClassifierEngine for ConstantEngine {
    fn fit(
        &self,
        spec: &HeadSpec,
        dataset: &TrainingDataset,
        plan: &TrainingPlan,
        on_epoch: &mut dyn FnMut(EpochReport),
    ) -> Result<Box<dyn TrainedHead>, ClassifierError> {
        assert_eq!(dataset.num_classes(), spec.num_classes);
        for epoch in 1..=plan.epochs {
            on_epoch(EpochReport { epoch, total_epochs: plan.epochs, loss: 0.0, accuracy: 1.0 });
        }
        let mut probabilities = vec![0.0; spec.num_classes];
        probabilities[self.winner.min(spec.num_classes - 1)] = 1.0;
        Ok(Box::new(ConstantHead { probabilities }))
    }
}

/// Always fails, like a run whose loss diverged.
pub struct BrokenEngine;

impl ClassifierEngine for BrokenEngine {
    fn fit(
        &self,
        _: &HeadSpec,
        _: &TrainingDataset,
        _: &TrainingPlan,
        _: &mut dyn FnMut(EpochReport),
    ) -> Result<Box<dyn TrainedHead>, ClassifierError> {
        Err(ClassifierError::TrainingError("Loss diverged in epoch 1".into()))
    }
}

pub fn solid(r: u8, g: u8, b: u8) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([r, g, b])))
}

/// A slightly varied shade around `(r, g, b)`.
pub fn shade(r: u8, g: u8, b: u8, i: u8) -> DynamicImage {
    solid(r.saturating_sub(i * 3), g.saturating_add(i * 2), b.saturating_sub(i))
}

pub fn png_bytes(image: &DynamicImage) -> Vec<u8> {
    let mut bytes = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .expect("encode png");
    bytes.into_inner()
}
