//! Trait definitions for classification engines.

use crate::error::ClassifyError;

/// Score emitted when the engine fails on an image
pub const FAILURE_SCORE: f32 = -99.0;

/// An image classification engine.
///
/// Each worker owns one instance, built once and reused for every image
/// it processes. Instances are never shared between threads, so
/// implementations may keep mutable scratch state.
pub trait Classifier: Send {
    /// Score raw (still encoded) image bytes.
    ///
    /// Higher scores mean the image is more likely to have the property
    /// the model detects.
    fn classify(&mut self, image: &[u8]) -> Result<f32, ClassifyError>;

    /// Score an image, converting any failure into [`FAILURE_SCORE`]
    fn classify_or_sentinel(&mut self, image: &[u8]) -> f32 {
        match self.classify(image) {
            Ok(score) => score,
            Err(e) => {
                tracing::trace!("Classification failed: {}", e);
                FAILURE_SCORE
            }
        }
    }
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn classify(&mut self, image: &[u8]) -> Result<f32, ClassifyError> {
        (**self).classify(image)
    }
}

/// Builds one classifier per worker
pub type ClassifierFactory =
    dyn Fn() -> Result<Box<dyn Classifier>, ClassifyError> + Send + Sync;

/// True if `score` is the failure sentinel rather than a real score
pub fn is_failure(score: f32) -> bool {
    score == FAILURE_SCORE
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<f32, ()>);

    impl Classifier for Fixed {
        fn classify(&mut self, _image: &[u8]) -> Result<f32, ClassifyError> {
            self.0
                .map_err(|_| ClassifyError::Decode {
                    reason: "not an image".to_string(),
                })
        }
    }

    #[test]
    fn success_passes_score_through() {
        assert_eq!(Fixed(Ok(0.42)).classify_or_sentinel(b"x"), 0.42);
    }

    #[test]
    fn failure_becomes_sentinel() {
        let score = Fixed(Err(())).classify_or_sentinel(b"x");
        assert_eq!(score, FAILURE_SCORE);
        assert!(is_failure(score));
    }

    #[test]
    fn boxed_classifier_delegates() {
        let mut boxed: Box<dyn Classifier> = Box::new(Fixed(Ok(0.1)));
        assert_eq!(boxed.classify(b"x").unwrap(), 0.1);
    }
}
