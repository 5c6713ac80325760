use serde::{Deserialize, Serialize};

pub const DEFAULT_BLUR_INTENSITY: u32 = 51;
pub const DEFAULT_SCALE_FACTOR: f64 = 1.05;
pub const DEFAULT_MIN_NEIGHBORS: u32 = 3;
pub const DEFAULT_MIN_FACE_SIZE: (u32, u32) = (20, 20);

const STRICT_MAX_SCALE_FACTOR: f64 = 1.05;
const STRICT_MAX_NEIGHBORS: u32 = 3;
const STRICT_MAX_FACE_SIDE: u32 = 20;

/// Validated face-redaction settings. Build through [`PrivacyPolicy::builder`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrivacyPolicy {
    blur_intensity: u32,
    scale_factor: f64,
    min_neighbors: u32,
    min_face_size: (u32, u32),
    strict_mode: bool,
    enable_face_blurring: bool,
}

impl Default for PrivacyPolicy {
    fn default() -> Self {
        Self {
            blur_intensity: DEFAULT_BLUR_INTENSITY,
            scale_factor: DEFAULT_SCALE_FACTOR,
            min_neighbors: DEFAULT_MIN_NEIGHBORS,
            min_face_size: DEFAULT_MIN_FACE_SIZE,
            strict_mode: true,
            enable_face_blurring: true,
        }
    }
}

impl PrivacyPolicy {
    pub fn builder() -> PrivacyPolicyBuilder {
        PrivacyPolicyBuilder::default()
    }

    pub fn blur_intensity(&self) -> u32 {
        self.blur_intensity
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub fn min_neighbors(&self) -> u32 {
        self.min_neighbors
    }

    pub fn min_face_size(&self) -> (u32, u32) {
        self.min_face_size
    }

    pub fn strict_mode(&self) -> bool {
        self.strict_mode
    }

    pub fn enable_face_blurring(&self) -> bool {
        self.enable_face_blurring
    }

    pub fn detection_params(&self) -> DetectionParams {
        DetectionParams {
            scale_factor: self.scale_factor,
            min_neighbors: self.min_neighbors,
            min_size: self.min_face_size,
        }
    }
}

/// Parameters handed to a face detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionParams {
    pub scale_factor: f64,
    pub min_neighbors: u32,
    pub min_size: (u32, u32),
}

impl Default for DetectionParams {
    fn default() -> Self {
        PrivacyPolicy::default().detection_params()
    }
}

/// Raw policy inputs. Range checks and strict clamping run in [`build`].
///
/// [`build`]: PrivacyPolicyBuilder::build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivacyPolicyBuilder {
    blur_intensity: u32,
    scale_factor: f64,
    min_neighbors: u32,
    min_face_size: (u32, u32),
    strict_mode: bool,
    enable_face_blurring: bool,
}

impl Default for PrivacyPolicyBuilder {
    fn default() -> Self {
        let defaults = PrivacyPolicy::default();
        Self {
            blur_intensity: defaults.blur_intensity,
            scale_factor: defaults.scale_factor,
            min_neighbors: defaults.min_neighbors,
            min_face_size: defaults.min_face_size,
            strict_mode: defaults.strict_mode,
            enable_face_blurring: defaults.enable_face_blurring,
        }
    }
}

impl PrivacyPolicyBuilder {
    pub fn blur_intensity(mut self, value: u32) -> Self {
        self.blur_intensity = value;
        self
    }

    pub fn scale_factor(mut self, value: f64) -> Self {
        self.scale_factor = value;
        self
    }

    pub fn min_neighbors(mut self, value: u32) -> Self {
        self.min_neighbors = value;
        self
    }

    pub fn min_face_size(mut self, width: u32, height: u32) -> Self {
        self.min_face_size = (width, height);
        self
    }

    pub fn strict_mode(mut self, value: bool) -> Self {
        self.strict_mode = value;
        self
    }

    pub fn enable_face_blurring(mut self, value: bool) -> Self {
        self.enable_face_blurring = value;
        self
    }

    pub fn build(self) -> Result<PrivacyPolicy, PolicyError> {
        if !(15..=99).contains(&self.blur_intensity) || self.blur_intensity % 2 == 0 {
            return Err(PolicyError::BlurIntensity(self.blur_intensity));
        }
        if !self.scale_factor.is_finite() || !(1.01..=2.0).contains(&self.scale_factor) {
            return Err(PolicyError::ScaleFactor(self.scale_factor));
        }
        if !(1..=10).contains(&self.min_neighbors) {
            return Err(PolicyError::MinNeighbors(self.min_neighbors));
        }
        let (width, height) = self.min_face_size;
        if width == 0 || height == 0 {
            return Err(PolicyError::MinFaceSize { width, height });
        }

        let mut policy = PrivacyPolicy {
            blur_intensity: self.blur_intensity,
            scale_factor: self.scale_factor,
            min_neighbors: self.min_neighbors,
            min_face_size: self.min_face_size,
            strict_mode: self.strict_mode,
            enable_face_blurring: self.enable_face_blurring,
        };

        if policy.strict_mode {
            policy.scale_factor = policy.scale_factor.min(STRICT_MAX_SCALE_FACTOR);
            policy.min_neighbors = policy.min_neighbors.min(STRICT_MAX_NEIGHBORS);
            policy.min_face_size = (
                width.min(STRICT_MAX_FACE_SIDE),
                height.min(STRICT_MAX_FACE_SIDE),
            );
        }

        Ok(policy)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolicyError {
    #[error("blur intensity must be an odd number between 15 and 99 (got {0})")]
    BlurIntensity(u32),
    #[error("scale factor must be between 1.01 and 2.0 (got {0})")]
    ScaleFactor(f64),
    #[error("min neighbors must be between 1 and 10 (got {0})")]
    MinNeighbors(u32),
    #[error("minimum face size must be positive (got {width}x{height})")]
    MinFaceSize { width: u32, height: u32 },
}
