//! Multi-scale sliding-window face detection over a Haar cascade.

use image::imageops::{self, FilterType};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cascade::{HaarCascade, HaarFeature, Stage};
use super::grouping::{group_rectangles, GROUPING_EPS};
use super::policy::DetectionParams;

/// Face bounding box in source-image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedFace {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl DetectedFace {
    /// Restricts the box to a `width` x `height` image; `None` when nothing
    /// of it remains.
    pub fn clamped(self, width: u32, height: u32) -> Option<Self> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let face = Self {
            x: self.x,
            y: self.y,
            width: self.width.min(width - self.x),
            height: self.height.min(height - self.y),
        };
        (face.width > 0 && face.height > 0).then_some(face)
    }
}

pub trait FaceDetector: Send + Sync {
    fn detect(&self, image: &GrayImage, params: &DetectionParams) -> Vec<DetectedFace>;
}

/// Cascade-backed detector using the image-pyramid search.
#[derive(Debug, Clone)]
pub struct HaarFaceDetector {
    cascade: HaarCascade,
}

impl HaarFaceDetector {
    pub fn new(cascade: HaarCascade) -> Self {
        Self { cascade }
    }

    pub fn cascade(&self) -> &HaarCascade {
        &self.cascade
    }

    fn candidates(&self, image: &GrayImage, params: &DetectionParams) -> Vec<DetectedFace> {
        let (base_w, base_h) = self.cascade.window();
        let (image_w, image_h) = image.dimensions();
        let (min_w, min_h) = params.min_size;
        let mut candidates = Vec::new();

        let mut factor = 1.0_f64;
        loop {
            let window_w = (f64::from(base_w) * factor).round() as u32;
            let window_h = (f64::from(base_h) * factor).round() as u32;
            let scaled_w = (f64::from(image_w) / factor).round() as u32;
            let scaled_h = (f64::from(image_h) / factor).round() as u32;

            if scaled_w <= base_w || scaled_h <= base_h {
                break;
            }
            if window_w > image_w || window_h > image_h {
                break;
            }
            if window_w < min_w || window_h < min_h {
                factor *= params.scale_factor;
                continue;
            }

            let integral = if scaled_w == image_w && scaled_h == image_h {
                IntegralImage::new(image)
            } else {
                IntegralImage::new(&imageops::resize(
                    image,
                    scaled_w,
                    scaled_h,
                    FilterType::Triangle,
                ))
            };

            let step = if factor > 2.0 { 1 } else { 2 };
            let before = candidates.len();
            for y in (0..scaled_h - base_h).step_by(step) {
                for x in (0..scaled_w - base_w).step_by(step) {
                    if self.accepts(&integral, x, y) {
                        candidates.push(DetectedFace {
                            x: (f64::from(x) * factor).round() as u32,
                            y: (f64::from(y) * factor).round() as u32,
                            width: window_w,
                            height: window_h,
                        });
                    }
                }
            }
            debug!(factor, hits = candidates.len() - before, "scanned pyramid level");

            factor *= params.scale_factor;
        }

        candidates
    }

    fn accepts(&self, integral: &IntegralImage, x: u32, y: u32) -> bool {
        let (base_w, base_h) = self.cascade.window();
        let area = f64::from((base_w - 2) * (base_h - 2));
        let sum = integral.sum(x + 1, y + 1, base_w - 2, base_h - 2) as f64;
        let sq_sum = integral.sq_sum(x + 1, y + 1, base_w - 2, base_h - 2) as f64;
        let variance = area * sq_sum - sum * sum;
        let norm = if variance > 0.0 { variance.sqrt() } else { 1.0 };

        let features = self.cascade.features();
        self.cascade
            .stages()
            .iter()
            .all(|stage| stage_passes(stage, features, integral, x, y, norm))
    }
}

fn stage_passes(
    stage: &Stage,
    features: &[HaarFeature],
    integral: &IntegralImage,
    x: u32,
    y: u32,
    norm: f64,
) -> bool {
    let mut total = 0.0;
    for classifier in &stage.classifiers {
        let mut index = 0usize;
        loop {
            let node = classifier.nodes[index];
            let value = feature_value(&features[node.feature], integral, x, y) / norm;
            let next = if value < node.threshold {
                node.left
            } else {
                node.right
            };
            if next <= 0 {
                total += classifier.leaves[next.unsigned_abs() as usize];
                break;
            }
            index = next as usize;
        }
    }
    total >= stage.threshold
}

fn feature_value(feature: &HaarFeature, integral: &IntegralImage, x: u32, y: u32) -> f64 {
    feature
        .rects
        .iter()
        .map(|rect| {
            rect.weight * integral.sum(x + rect.x, y + rect.y, rect.width, rect.height) as f64
        })
        .sum()
}

impl FaceDetector for HaarFaceDetector {
    fn detect(&self, image: &GrayImage, params: &DetectionParams) -> Vec<DetectedFace> {
        let candidates = self.candidates(image, params);
        let (image_w, image_h) = image.dimensions();
        let faces: Vec<DetectedFace> =
            group_rectangles(&candidates, params.min_neighbors, GROUPING_EPS)
                .into_iter()
                .filter_map(|face| face.clamped(image_w, image_h))
                .collect();
        debug!(
            candidates = candidates.len(),
            faces = faces.len(),
            "face detection finished"
        );
        faces
    }
}

/// Summed-area tables of pixel values and squared pixel values.
struct IntegralImage {
    stride: usize,
    sum: Vec<u64>,
    sq_sum: Vec<u64>,
}

impl IntegralImage {
    fn new(image: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        let stride = width as usize + 1;
        let mut sum = vec![0u64; stride * (height as usize + 1)];
        let mut sq_sum = vec![0u64; stride * (height as usize + 1)];

        for y in 0..height as usize {
            let mut row = 0u64;
            let mut sq_row = 0u64;
            for x in 0..width as usize {
                let value = u64::from(image.get_pixel(x as u32, y as u32)[0]);
                row += value;
                sq_row += value * value;
                let at = (y + 1) * stride + x + 1;
                sum[at] = sum[at - stride] + row;
                sq_sum[at] = sq_sum[at - stride] + sq_row;
            }
        }

        Self {
            stride,
            sum,
            sq_sum,
        }
    }

    fn sum(&self, x: u32, y: u32, width: u32, height: u32) -> u64 {
        Self::area(&self.sum, self.stride, x, y, width, height)
    }

    fn sq_sum(&self, x: u32, y: u32, width: u32, height: u32) -> u64 {
        Self::area(&self.sq_sum, self.stride, x, y, width, height)
    }

    fn area(table: &[u64], stride: usize, x: u32, y: u32, width: u32, height: u32) -> u64 {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + width as usize, y0 + height as usize);
        table[y1 * stride + x1] + table[y0 * stride + x0]
            - table[y0 * stride + x1]
            - table[y1 * stride + x0]
    }
}
