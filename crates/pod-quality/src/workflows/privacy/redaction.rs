use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::{imageops, ColorType, GrayImage, ImageError, Luma, RgbImage};
use tracing::{debug, info};

use super::cascade::{DetectorError, HaarCascade};
use super::detector::{DetectedFace, FaceDetector, HaarFaceDetector};
use super::policy::{DetectionParams, PrivacyPolicy};

/// Extra pixels blurred around each detected face.
pub const FACE_PADDING: u32 = 10;
pub const MAX_KERNEL_SIZE: u32 = 299;
pub const JPEG_QUALITY: u8 = 95;

#[derive(Debug, Clone, PartialEq)]
pub struct RedactionOutcome {
    pub bytes: Vec<u8>,
    pub faces: Vec<DetectedFace>,
}

impl RedactionOutcome {
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RedactionError {
    #[error("image could not be decoded: {0}")]
    Decode(#[source] ImageError),
    #[error("redacted image could not be encoded: {0}")]
    Encode(#[source] ImageError),
}

/// Detector plus policy, shared across redaction requests.
#[derive(Clone)]
pub struct FaceRedactor {
    detector: Arc<dyn FaceDetector>,
    policy: PrivacyPolicy,
}

impl FaceRedactor {
    pub fn new(detector: Arc<dyn FaceDetector>, policy: PrivacyPolicy) -> Self {
        Self { detector, policy }
    }

    /// Loads the Haar cascade at `path`.
    pub fn from_cascade_path(
        path: impl AsRef<Path>,
        policy: PrivacyPolicy,
    ) -> Result<Self, DetectorError> {
        let cascade = HaarCascade::from_path(path)?;
        Ok(Self::new(Arc::new(HaarFaceDetector::new(cascade)), policy))
    }

    /// Loads the cascade only when the policy has blurring switched on.
    pub fn for_policy(
        cascade_path: impl AsRef<Path>,
        policy: PrivacyPolicy,
    ) -> Result<Self, DetectorError> {
        if policy.enable_face_blurring() {
            Self::from_cascade_path(cascade_path, policy)
        } else {
            Ok(Self::new(Arc::new(NoDetection), policy))
        }
    }

    pub fn policy(&self) -> &PrivacyPolicy {
        &self.policy
    }

    pub fn redact(&self, image_bytes: &[u8]) -> Result<RedactionOutcome, RedactionError> {
        redact(image_bytes, &self.policy, self.detector.as_ref())
    }
}

struct NoDetection;

impl FaceDetector for NoDetection {
    fn detect(&self, _image: &GrayImage, _params: &DetectionParams) -> Vec<DetectedFace> {
        Vec::new()
    }
}

/// Blurs every detected face and re-encodes the image as JPEG.
///
/// With face blurring disabled the input bytes are returned untouched and no
/// detection runs.
pub fn redact(
    image_bytes: &[u8],
    policy: &PrivacyPolicy,
    detector: &dyn FaceDetector,
) -> Result<RedactionOutcome, RedactionError> {
    if !policy.enable_face_blurring() {
        debug!("face blurring disabled; passing image through");
        return Ok(RedactionOutcome {
            bytes: image_bytes.to_vec(),
            faces: Vec::new(),
        });
    }

    let decoded = image::load_from_memory(image_bytes).map_err(RedactionError::Decode)?;
    let mut rgb = decoded.to_rgb8();
    let gray = bt601_luma(&rgb);

    let faces = detector.detect(&gray, &policy.detection_params());
    for face in &faces {
        blur_region(&mut rgb, face, policy.blur_intensity());
    }

    let bytes = encode_jpeg(&rgb)?;
    info!(faces = faces.len(), size = bytes.len(), "face redaction complete");
    Ok(RedactionOutcome { bytes, faces })
}

/// Grey conversion with the BT.601 weights the frontal-face cascades were
/// trained on, in 14-bit fixed point.
pub fn bt601_luma(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        let weighted = u32::from(r) * 4_899 + u32::from(g) * 9_617 + u32::from(b) * 1_868;
        Luma([((weighted + (1 << 13)) >> 14) as u8])
    })
}

/// Kernel side for a face: 40% of its longer side, at least `blur_intensity`,
/// odd and capped at [`MAX_KERNEL_SIZE`].
pub fn adaptive_kernel_size(width: u32, height: u32, blur_intensity: u32) -> u32 {
    let coverage = (f64::from(width.max(height)) * 0.4).round() as u32;
    let mut kernel = coverage.max(blur_intensity);
    if kernel % 2 == 0 {
        kernel += 1;
    }
    kernel.min(MAX_KERNEL_SIZE)
}

/// Gaussian sigma matching a kernel side when no explicit sigma is given.
pub fn kernel_sigma(kernel: u32) -> f32 {
    (0.3 * ((f64::from(kernel) - 1.0) * 0.5 - 1.0) + 0.8) as f32
}

fn blur_region(image: &mut RgbImage, face: &DetectedFace, blur_intensity: u32) {
    let (image_w, image_h) = image.dimensions();
    let x1 = face.x.saturating_sub(FACE_PADDING);
    let y1 = face.y.saturating_sub(FACE_PADDING);
    let x2 = face.x.saturating_add(face.width).saturating_add(FACE_PADDING).min(image_w);
    let y2 = face.y.saturating_add(face.height).saturating_add(FACE_PADDING).min(image_h);
    if x1 >= x2 || y1 >= y2 {
        return;
    }

    let kernel = adaptive_kernel_size(face.width, face.height, blur_intensity);
    let region = imageops::crop_imm(image, x1, y1, x2 - x1, y2 - y1).to_image();
    let blurred = imageops::blur(&region, kernel_sigma(kernel));
    imageops::replace(image, &blurred, i64::from(x1), i64::from(y1));
}

fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, RedactionError> {
    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY)
        .encode(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)
        .map_err(RedactionError::Encode)?;
    Ok(buffer.into_inner())
}
