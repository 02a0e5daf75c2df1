//! Pipeline execution implementation.

use super::stages::{self, Counters};
use crate::core::classifier::{Classifier, ClassifierFactory};
use crate::core::dedup::DedupClient;
use crate::core::filter::RecordFilter;
use crate::core::output::{ClassificationResult, OutputFormat, ResultPrinter};
use crate::core::queue::WorkQueue;
use crate::core::reader::{ArchiveReader, WorkItem};
use crate::core::source::Source;
use crate::error::{PipelineError, WarcClassifierError};
use crate::events::{null_sender, Event, EventSender, PipelineEvent, PipelinePhase, PipelineSummary};
use std::io::{self, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Capacity of the queue between workers and the printer
pub const OUTPUT_QUEUE_CAPACITY: usize = 1000;

/// Result of pipeline execution
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    /// Totals for the run
    pub summary: PipelineSummary,
    /// Lines the printer wrote to the sink
    pub lines_written: usize,
}

/// Configuration for the pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of archive reader threads
    pub readers: usize,
    /// Number of classification worker threads (also the image queue depth)
    pub workers: usize,
    /// Depth of the output queue
    pub output_capacity: usize,
    /// Record acceptance rules
    pub filter: RecordFilter,
    /// `host:port` of the dedup lookup service
    pub dedup_server: Option<String>,
    /// Timeout for dedup service I/O (None = wait forever)
    pub dedup_timeout: Option<Duration>,
    /// Output line format
    pub output_format: OutputFormat,
    /// Append the source URL to each line
    pub print_url: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let cpus = default_parallelism();
        Self {
            readers: cpus,
            workers: cpus,
            output_capacity: OUTPUT_QUEUE_CAPACITY,
            filter: RecordFilter::default(),
            dedup_server: None,
            dedup_timeout: None,
            output_format: OutputFormat::Plain,
            print_url: false,
        }
    }
}

/// Number of CPUs, used as the default reader and worker count
pub fn default_parallelism() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Builder for pipeline configuration
pub struct PipelineBuilder {
    config: PipelineConfig,
    classifier: Arc<ClassifierFactory>,
    sink: Option<Box<dyn Write + Send>>,
}

impl PipelineBuilder {
    /// Create a new pipeline builder using `classifier` to build each worker's engine
    pub fn new(classifier: Arc<ClassifierFactory>) -> Self {
        Self {
            config: PipelineConfig::default(),
            classifier,
            sink: None,
        }
    }

    /// Set the number of reader threads
    pub fn readers(mut self, readers: usize) -> Self {
        self.config.readers = readers;
        self
    }

    /// Set the number of worker threads
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// Set the record filter
    pub fn filter(mut self, filter: RecordFilter) -> Self {
        self.config.filter = filter;
        self
    }

    /// Consult the dedup service at `host:port` before classifying
    pub fn dedup_server(mut self, addr: Option<String>) -> Self {
        self.config.dedup_server = addr;
        self
    }

    /// Set the dedup service I/O timeout
    pub fn dedup_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.dedup_timeout = timeout;
        self
    }

    /// Set the output format
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    /// Include source URLs in the output
    pub fn print_url(mut self, print_url: bool) -> Self {
        self.config.print_url = print_url;
        self
    }

    /// Set the output queue depth
    pub fn output_capacity(mut self, capacity: usize) -> Self {
        self.config.output_capacity = capacity;
        self
    }

    /// Write results somewhere other than stdout
    pub fn sink(mut self, sink: Box<dyn Write + Send>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Pipeline {
        Pipeline {
            config: self.config,
            classifier: self.classifier,
            sink: self.sink.unwrap_or_else(|| Box::new(io::stdout())),
        }
    }
}

/// The archive classification pipeline
pub struct Pipeline {
    config: PipelineConfig,
    classifier: Arc<ClassifierFactory>,
    sink: Box<dyn Write + Send>,
}

/// The three queues of a run; dropping them closes every queue so no
/// stage thread outlives an aborted run
struct Queues {
    sources: WorkQueue<Source>,
    images: WorkQueue<WorkItem>,
    outputs: WorkQueue<ClassificationResult>,
}

impl Drop for Queues {
    fn drop(&mut self) {
        self.sources.close();
        self.images.close();
        self.outputs.close();
    }
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder(classifier: Arc<ClassifierFactory>) -> PipelineBuilder {
        PipelineBuilder::new(classifier)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline without events
    pub fn run(self, sources: Vec<Source>) -> Result<PipelineResult, WarcClassifierError> {
        self.run_with_events(sources, &null_sender())
    }

    /// Run the pipeline with event reporting.
    ///
    /// Returns once every source has been read, every image classified
    /// and every result written, with all stage threads joined.
    pub fn run_with_events(
        self,
        sources: Vec<Source>,
        events: &EventSender,
    ) -> Result<PipelineResult, WarcClassifierError> {
        self.execute(sources, events).map_err(|e| {
            tracing::error!("Pipeline failed: {}", e);
            events.send(Event::Pipeline(PipelineEvent::Error {
                message: e.to_string(),
            }));
            e
        })
    }

    fn execute(
        self,
        sources: Vec<Source>,
        events: &EventSender,
    ) -> Result<PipelineResult, WarcClassifierError> {
        let start_time = Instant::now();
        let Pipeline {
            config,
            classifier,
            sink,
        } = self;

        if config.readers == 0 {
            return Err(PipelineError::NoThreads {
                role: "reader".to_string(),
            }
            .into());
        }
        if config.workers == 0 {
            return Err(PipelineError::NoThreads {
                role: "worker".to_string(),
            }
            .into());
        }

        let total_sources = sources.len();
        events.send(Event::Pipeline(PipelineEvent::Started {
            sources: total_sources,
            readers: config.readers,
            workers: config.workers,
        }));

        // A model that fails to load stops the run before any archive is touched
        let classifiers = (0..config.workers)
            .map(|_| classifier())
            .collect::<Result<Vec<Box<dyn Classifier>>, _>>()?;

        let dedup_clients = (0..config.readers)
            .map(|_| {
                config
                    .dedup_server
                    .as_ref()
                    .map(|addr| {
                        DedupClient::new(addr.clone()).map(|c| c.with_timeout(config.dedup_timeout))
                    })
                    .transpose()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let queues = Queues {
            sources: WorkQueue::unbounded(),
            images: WorkQueue::bounded(config.workers),
            outputs: WorkQueue::bounded(config.output_capacity),
        };
        let counters = Arc::new(Counters::default());

        let mut readers = Vec::with_capacity(config.readers);
        for (i, dedup) in dedup_clients.into_iter().enumerate() {
            let reader = ArchiveReader::new(config.filter.clone(), dedup);
            let sources = queues.sources.clone();
            let images = queues.images.clone();
            let counters = Arc::clone(&counters);
            let events = events.clone();
            readers.push(spawn_stage(format!("reader-{}", i), move || {
                stages::run_reader(reader, sources, images, counters, events)
            })?);
        }

        let mut workers = Vec::with_capacity(config.workers);
        for (i, classifier) in classifiers.into_iter().enumerate() {
            let images = queues.images.clone();
            let outputs = queues.outputs.clone();
            let counters = Arc::clone(&counters);
            let events = events.clone();
            workers.push(spawn_stage(format!("worker-{}", i), move || {
                stages::run_worker(classifier, images, outputs, counters, events)
            })?);
        }

        let printer = {
            let printer = ResultPrinter::new(sink, config.output_format, config.print_url);
            let outputs = queues.outputs.clone();
            spawn_stage("printer".to_string(), move || stages::run_printer(printer, outputs))?
        };

        for source in sources {
            queues.sources.put(source)?;
        }

        tracing::info!(
            "Processing {} sources with {} readers and {} workers",
            total_sources,
            config.readers,
            config.workers
        );

        // Ordered drain: each stage is closed only once everything upstream
        // of it has been fully processed
        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Reading,
        }));
        queues.sources.join();
        queues.sources.close();
        join_all(readers)?;

        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Classifying,
        }));
        queues.images.join();
        queues.images.close();
        join_all(workers)?;

        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Printing,
        }));
        queues.outputs.join();
        queues.outputs.close();
        let lines_written = join_stage(printer)?;

        let summary = PipelineSummary {
            sources: total_sources,
            sources_failed: Counters::get(&counters.sources_failed),
            images_queued: Counters::get(&counters.images_queued),
            duplicates_skipped: Counters::get(&counters.duplicates_skipped),
            classified: Counters::get(&counters.classified),
            classification_failures: Counters::get(&counters.classification_failures),
            duration_ms: start_time.elapsed().as_millis() as u64,
        };

        tracing::info!(
            "Classified {} images ({} failed, {} duplicates) from {} sources in {} ms",
            summary.classified,
            summary.classification_failures,
            summary.duplicates_skipped,
            summary.sources,
            summary.duration_ms
        );

        events.send(Event::Pipeline(PipelineEvent::Completed {
            summary: summary.clone(),
        }));

        Ok(PipelineResult {
            summary,
            lines_written,
        })
    }
}

fn spawn_stage<F, T>(name: String, body: F) -> Result<JoinHandle<T>, PipelineError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn(body)
        .map_err(|source| PipelineError::Spawn { role: name, source })
}

fn join_stage<T>(handle: JoinHandle<T>) -> Result<T, PipelineError> {
    let role = handle.thread().name().unwrap_or("stage").to_string();
    handle.join().map_err(|_| PipelineError::Panicked { role })
}

fn join_all(handles: Vec<JoinHandle<()>>) -> Result<(), PipelineError> {
    for handle in handles {
        join_stage(handle)?;
    }
    Ok(())
}
