use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;

/// Largest side accepted before an upload is downscaled.
pub const MAX_IMAGE_DIMENSION: u32 = 2048;
/// Square input resolution of the embedding model.
pub const MODEL_INPUT_SIZE: u32 = 128;

/// Scales `(width, height)` so that neither side exceeds `max`, keeping the
/// aspect ratio. The larger side becomes exactly `max`; the other side is
/// rounded to the nearest integer.
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width, height);
    }
    if width > height {
        let scaled = (f64::from(height) * f64::from(max) / f64::from(width)).round() as u32;
        (max, scaled.max(1))
    } else {
        let scaled = (f64::from(width) * f64::from(max) / f64::from(height)).round() as u32;
        (scaled.max(1), max)
    }
}

/// Applies the two-step resize policy: bound the image to `max_dimension`,
/// then stretch it to `input_size` x `input_size` without cropping.
pub fn resize_for_model(image: &DynamicImage, max_dimension: u32, input_size: u32) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    let (bounded_w, bounded_h) = fit_within(width, height, max_dimension);

    let bounded;
    let source = if (bounded_w, bounded_h) != (width, height) {
        log::debug!(
            "Image {}x{} exceeds maximum dimension, resizing to {}x{}",
            width, height, bounded_w, bounded_h
        );
        bounded = image.resize_exact(bounded_w, bounded_h, FilterType::Triangle);
        &bounded
    } else {
        image
    };

    source.resize_exact(input_size, input_size, FilterType::Triangle)
}

/// Converts an RGB image into a `[1, height, width, 3]` tensor with values in `[0, 1]`.
pub fn to_input_tensor(image: &DynamicImage) -> Array4<f32> {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    Array4::from_shape_fn((1, height as usize, width as usize, 3), |(_, y, x, c)| {
        f32::from(rgb.get_pixel(x as u32, y as u32)[c]) / 255.0
    })
}

/// Full preprocessing pipeline for one image.
pub fn prepare_input(image: &DynamicImage, max_dimension: u32, input_size: u32) -> Array4<f32> {
    let resized = resize_for_model(image, max_dimension, input_size);
    to_input_tensor(&resized)
}
