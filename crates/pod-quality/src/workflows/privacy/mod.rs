//! Face redaction for delivery photos.
//!
//! Faces are located with an OpenCV-format Haar cascade and each one is
//! covered by a Gaussian blur sized to the face before the photo is
//! re-encoded as JPEG.

pub mod cascade;
pub mod detector;
pub mod grouping;
pub mod policy;
pub mod redaction;
pub mod router;
pub mod service;

pub use cascade::{DetectorError, HaarCascade};
pub use detector::{DetectedFace, FaceDetector, HaarFaceDetector};
pub use policy::{DetectionParams, PolicyError, PrivacyPolicy, PrivacyPolicyBuilder};
pub use redaction::{adaptive_kernel_size, redact, FaceRedactor, RedactionError, RedactionOutcome};
pub use router::privacy_router;
pub use service::{
    RedactionRequest, RedactionService, RedactionServiceError, RedactionSummary, RedactionTarget,
    STATUS_REDACTED, STATUS_SKIPPED,
};
