//! Synthetic training-image variants
//!
//! The remote service requires a minimum image count per tag before it
//! will train. A single source photo is expanded into one variant per
//! configured angle: rotate about center, then apply a bounded random
//! perspective warp. Determinism is not required (training-set diversity
//! is the goal), but every jittered corner must stay within frame bounds.

use crate::error::{Result, TrainError};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{rotate_about_center, warp, Interpolation, Projection};
use rand::Rng;

/// Standard rotation angle set, in degrees
pub const DEFAULT_ANGLES: [f32; 5] = [-10.0, -5.0, 0.0, 5.0, 10.0];

/// Maximum inward corner displacement as a fraction of each dimension
pub const JITTER_MARGIN: f32 = 0.05;

/// Expand one source image into PNG-encoded variants, one per angle.
pub fn generate_variants(source: &[u8], angles: &[f32]) -> Result<Vec<Vec<u8>>> {
    let image = image::load_from_memory(source)
        .map_err(|e| TrainError::Image(format!("decode failed: {}", e)))?
        .to_rgba8();

    let mut rng = rand::thread_rng();
    angles
        .iter()
        .map(|&angle| {
            let rotated = rotate_about_center(
                &image,
                angle.to_radians(),
                Interpolation::Bilinear,
                Rgba([0, 0, 0, 0]),
            );
            let warped = jitter_perspective(&rotated, JITTER_MARGIN, &mut rng)?;
            encode_png(&warped)
        })
        .collect()
}

/// Warp the frame so each corner moves inward by a random bounded amount.
///
/// Corners only ever move toward the image center, so the warped quad is
/// always contained in the original frame.
fn jitter_perspective(image: &RgbaImage, margin: f32, rng: &mut impl Rng) -> Result<RgbaImage> {
    let (width, height) = image.dimensions();
    let (w, h) = (width as f32, height as f32);

    let from = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
    let to = jittered_corners(w, h, margin, rng);

    let projection = Projection::from_control_points(from, to)
        .ok_or_else(|| TrainError::Image("degenerate perspective control points".to_string()))?;

    Ok(warp(
        image,
        &projection,
        Interpolation::Bilinear,
        Rgba([0, 0, 0, 0]),
    ))
}

/// Jittered corner control points, each displaced inward by at most
/// `margin` of the respective dimension.
fn jittered_corners(w: f32, h: f32, margin: f32, rng: &mut impl Rng) -> [(f32, f32); 4] {
    let dx = margin * w;
    let dy = margin * h;
    let mut sample = [0.0f32; 8];
    for value in sample.iter_mut() {
        *value = rng.gen_range(0.0..=1.0);
    }
    [
        (sample[0] * dx, sample[1] * dy),
        (w - sample[2] * dx, sample[3] * dy),
        (w - sample[4] * dx, h - sample[5] * dy),
        (sample[6] * dx, h - sample[7] * dy),
    ]
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    DynamicImage::ImageRgba8(image.clone())
        .write_to(
            &mut std::io::Cursor::new(&mut buffer),
            image::ImageOutputFormat::Png,
        )
        .map_err(|e| TrainError::Image(format!("encode failed: {}", e)))?;
    Ok(buffer)
}
