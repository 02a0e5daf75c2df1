//! # Classifier Module
//!
//! The classification engine seam and its ONNX implementation.
//!
//! ## How It Works
//! 1. Decode the image payload (zune-jpeg fast path for JPEG)
//! 2. Resize to 256x256, centre-crop 224x224
//! 3. Convert to mean-subtracted BGR in NCHW layout
//! 4. Run the network and report the positive-class probability
//!
//! Any failure along the way is reported to the worker, which substitutes
//! [`FAILURE_SCORE`].
//!
//! ## Example
//! ```rust,ignore
//! use warc_image_classifier::core::classifier::{Classifier, OnnxClassifier};
//!
//! let mut classifier = OnnxClassifier::load(Path::new("nsfw_model/open_nsfw.onnx"))?;
//! let score = classifier.classify_or_sentinel(&jpeg_bytes);
//! ```

pub mod decode;
mod onnx;
mod traits;

pub use onnx::OnnxClassifier;
pub use traits::{is_failure, Classifier, ClassifierFactory, FAILURE_SCORE};
