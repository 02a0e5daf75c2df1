//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};

/// All events emitted by the classification pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Archive reader events
    Reader(ReaderEvent),
    /// Classification worker events
    Worker(WorkerEvent),
    /// Pipeline-level events
    Pipeline(PipelineEvent),
}

/// Events from the archive readers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReaderEvent {
    /// A reader picked up a source
    SourceStarted { source: String },
    /// A source was read to the end
    SourceCompleted {
        source: String,
        images_queued: usize,
        duplicates_skipped: usize,
    },
    /// A source was abandoned after an error; the reader continues
    SourceFailed { source: String, message: String },
    /// An image passed the filter and was queued for classification
    ImageQueued { digest: String },
}

/// Events from the classification workers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorkerEvent {
    /// An image was scored
    Classified { digest: String, score: f32 },
    /// The classifier failed and the sentinel score was emitted
    ClassificationFailed { digest: String },
}

/// Pipeline-level events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// Pipeline has started
    Started { sources: usize, readers: usize, workers: usize },
    /// Moving to a new drain phase
    PhaseChanged { phase: PipelinePhase },
    /// Pipeline completed successfully
    Completed { summary: PipelineSummary },
    /// Pipeline encountered a fatal error
    Error { message: String },
}

/// Drain phases of the pipeline, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelinePhase {
    Reading,
    Classifying,
    Printing,
}

/// Summary of pipeline results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Sources handed to the readers
    pub sources: usize,
    /// Sources abandoned after an error
    pub sources_failed: usize,
    /// Images pushed onto the image queue
    pub images_queued: usize,
    /// Images skipped because the dedup service had seen them
    pub duplicates_skipped: usize,
    /// Images scored successfully
    pub classified: usize,
    /// Images that received the sentinel score
    pub classification_failures: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelinePhase::Reading => write!(f, "Reading archives"),
            PipelinePhase::Classifying => write!(f, "Classifying"),
            PipelinePhase::Printing => write!(f, "Printing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_serializable() {
        let event = Event::Reader(ReaderEvent::SourceCompleted {
            source: "crawl.warc.gz".to_string(),
            images_queued: 12,
            duplicates_skipped: 3,
        });

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: Event = serde_json::from_str(&json).unwrap();

        match deserialized {
            Event::Reader(ReaderEvent::SourceCompleted { images_queued, .. }) => {
                assert_eq!(images_queued, 12);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn pipeline_summary_is_serializable() {
        let summary = PipelineSummary {
            sources: 3,
            images_queued: 4200,
            ..Default::default()
        };

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("4200"));
    }

    #[test]
    fn phase_display() {
        assert_eq!(PipelinePhase::Classifying.to_string(), "Classifying");
    }
}
