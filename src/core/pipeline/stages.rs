//! Service loops run by the reader, worker and printer threads.
//!
//! Every loop ends when its input queue is closed. Every item taken is
//! acknowledged with `task_done`, whatever happened to it, so the
//! orchestrator's drain always completes.

use crate::core::classifier::{is_failure, Classifier, FAILURE_SCORE};
use crate::core::output::{ClassificationResult, ResultPrinter};
use crate::core::queue::WorkQueue;
use crate::core::reader::{ArchiveReader, WorkItem};
use crate::core::source::Source;
use crate::events::{Event, EventSender, ReaderEvent, WorkerEvent};
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Running totals shared by all stages
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub sources_failed: AtomicUsize,
    pub images_queued: AtomicUsize,
    pub duplicates_skipped: AtomicUsize,
    pub classified: AtomicUsize,
    pub classification_failures: AtomicUsize,
}

impl Counters {
    fn bump(counter: &AtomicUsize, by: usize) {
        counter.fetch_add(by, Ordering::SeqCst);
    }

    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Read sources until the source queue closes
pub(crate) fn run_reader(
    mut reader: ArchiveReader,
    sources: WorkQueue<Source>,
    images: WorkQueue<WorkItem>,
    counters: Arc<Counters>,
    events: EventSender,
) {
    while let Ok(source) = sources.take() {
        let name = source.to_string();
        events.send(Event::Reader(ReaderEvent::SourceStarted {
            source: name.clone(),
        }));

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            read_source(&mut reader, &source, &images, &counters, &events)
        }))
        .unwrap_or_else(|_| Err("reader panicked while parsing".to_string()));

        match outcome {
            Ok((images_queued, duplicates_skipped)) => {
                tracing::debug!(
                    "Finished {}: {} queued, {} duplicates",
                    name,
                    images_queued,
                    duplicates_skipped
                );
                events.send(Event::Reader(ReaderEvent::SourceCompleted {
                    source: name,
                    images_queued,
                    duplicates_skipped,
                }));
            }
            Err(message) => {
                tracing::warn!("Abandoning {}: {}", name, message);
                Counters::bump(&counters.sources_failed, 1);
                events.send(Event::Reader(ReaderEvent::SourceFailed {
                    source: name,
                    message,
                }));
            }
        }

        let _ = sources.task_done();
    }
}

/// Push every accepted image of one source, returning (queued, duplicates)
fn read_source(
    reader: &mut ArchiveReader,
    source: &Source,
    images: &WorkQueue<WorkItem>,
    counters: &Counters,
    events: &EventSender,
) -> Result<(usize, usize), String> {
    let mut accepted = reader.read(source).map_err(|e| e.to_string())?;
    let mut queued = 0;

    let outcome = loop {
        match accepted.next() {
            Some(Ok(item)) => {
                let digest = item.digest.to_string();
                if let Err(e) = images.put(item) {
                    break Err(e.to_string());
                }
                queued += 1;
                Counters::bump(&counters.images_queued, 1);
                events.send(Event::Reader(ReaderEvent::ImageQueued { digest }));
            }
            Some(Err(e)) => break Err(e.to_string()),
            None => break Ok(()),
        }
    };

    let duplicates = accepted.duplicates_skipped();
    Counters::bump(&counters.duplicates_skipped, duplicates);
    outcome.map(|_| (queued, duplicates))
}

/// Classify images until the image queue closes
pub(crate) fn run_worker(
    mut classifier: Box<dyn Classifier>,
    images: WorkQueue<WorkItem>,
    outputs: WorkQueue<ClassificationResult>,
    counters: Arc<Counters>,
    events: EventSender,
) {
    while let Ok(item) = images.take() {
        let score = panic::catch_unwind(AssertUnwindSafe(|| {
            classifier.classify_or_sentinel(&item.image)
        }))
        .unwrap_or(FAILURE_SCORE);

        let digest = item.digest.to_string();
        if is_failure(score) {
            Counters::bump(&counters.classification_failures, 1);
            events.send(Event::Worker(WorkerEvent::ClassificationFailed { digest }));
        } else {
            Counters::bump(&counters.classified, 1);
            events.send(Event::Worker(WorkerEvent::Classified { digest, score }));
        }

        let result = ClassificationResult {
            digest: item.digest,
            score,
            url: item.url,
        };
        let pushed = outputs.put(result);
        let _ = images.task_done();
        if pushed.is_err() {
            break;
        }
    }
}

/// Write results until the output queue closes, returning the lines written
pub(crate) fn run_printer<W: Write>(
    mut printer: ResultPrinter<W>,
    outputs: WorkQueue<ClassificationResult>,
) -> usize {
    while let Ok(result) = outputs.take() {
        if let Err(e) = printer.print(&result) {
            tracing::error!("Failed to write result for {}: {}", result.digest, e);
        }
        let _ = outputs.task_done();
    }

    if let Err(e) = printer.flush() {
        tracing::error!("Failed to flush results: {}", e);
    }
    printer.written()
}
