//! Integration tests for the pipeline module.
//!
//! These tests verify end-to-end pipeline behavior including:
//! - Record filtering across a whole archive
//! - Deduplication through a shared lookup service
//! - Unreadable sources and failing classifiers
//! - Gzip-compressed archives

use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashSet;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use tempfile::NamedTempFile;
use warc_image_classifier::core::classifier::{Classifier, ClassifierFactory};
use warc_image_classifier::core::digest::ContentId;
use warc_image_classifier::core::output::OutputFormat;
use warc_image_classifier::core::pipeline::Pipeline;
use warc_image_classifier::core::source::Source;
use warc_image_classifier::error::ClassifyError;
use warc_image_classifier::events::{Event, EventChannel, PipelineEvent};

/// Scores every image 0.5, or fails on images filled with `0xEE`
struct FixedClassifier;

impl Classifier for FixedClassifier {
    fn classify(&mut self, image: &[u8]) -> Result<f32, ClassifyError> {
        if image.first() == Some(&0xEE) {
            return Err(ClassifyError::Decode {
                reason: "unsupported image".to_string(),
            });
        }
        Ok(0.5)
    }
}

fn fixed_factory() -> Arc<ClassifierFactory> {
    Arc::new(|| Ok::<_, ClassifyError>(Box::new(FixedClassifier) as Box<dyn Classifier>))
}

/// Cloneable sink so tests can read what the printer wrote
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SharedBuffer {
    fn sorted_lines(&self) -> Vec<String> {
        let text = String::from_utf8(self.0.lock().unwrap().clone()).unwrap();
        let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
        lines.sort();
        lines
    }
}

fn response(uri: &str, status: &str, content_type: &str, body: &[u8]) -> Vec<u8> {
    let mut block =
        format!("HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\n\r\n").into_bytes();
    block.extend_from_slice(body);

    let mut record = format!(
        "WARC/1.0\r\nWARC-Type: response\r\nWARC-Target-URI: {uri}\r\n\
         Content-Type: application/http; msgtype=response\r\nContent-Length: {}\r\n\r\n",
        block.len()
    )
    .into_bytes();
    record.extend_from_slice(&block);
    record.extend_from_slice(b"\r\n\r\n");
    record
}

/// ARC v1 version block naming the file
fn arc_filedesc() -> Vec<u8> {
    let desc = b"1 0 InternetArchive\nURL IP-address Archive-date Content-type Archive-length\n";
    let mut record = format!(
        "filedesc://crawl.arc 0.0.0.0 20200101000000 text/plain {}\n",
        desc.len()
    )
    .into_bytes();
    record.extend_from_slice(desc);
    record.push(b'\n');
    record
}

fn arc_response(uri: &str, status: &str, content_type: &str, body: &[u8]) -> Vec<u8> {
    let mut block =
        format!("HTTP/1.0 {status}\r\nContent-Type: {content_type}\r\n\r\n").into_bytes();
    block.extend_from_slice(body);

    let mut record = format!(
        "{uri} 192.0.2.1 20200101000000 {content_type} {}\n",
        block.len()
    )
    .into_bytes();
    record.extend_from_slice(&block);
    record.push(b'\n');
    record
}

fn write_archive(records: &[Vec<u8>]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for record in records {
        file.write_all(record).unwrap();
    }
    file.flush().unwrap();
    file
}

/// One gzip member per record, as crawlers write `.warc.gz`
fn write_gzip_archive(records: &[Vec<u8>]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for record in records {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(record).unwrap();
        file.write_all(&encoder.finish().unwrap()).unwrap();
    }
    file.flush().unwrap();
    file
}

fn local(file: &NamedTempFile) -> Source {
    Source::Local(file.path().to_path_buf())
}

/// Dedup service answering `N` for identifiers it has already recorded
fn spawn_dedup_service() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let seen = Arc::new(Mutex::new(HashSet::new()));

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            let seen = Arc::clone(&seen);
            thread::spawn(move || {
                let mut request = [0u8; 18];
                while stream.read_exact(&mut request).is_ok() {
                    let fresh = seen.lock().unwrap().insert(request[1..17].to_vec());
                    let reply = if fresh { b'Y' } else { b'N' };
                    if stream.write_all(&[reply]).is_err() {
                        break;
                    }
                }
            });
        }
    });

    addr
}

#[test]
fn pipeline_prints_one_line_per_accepted_image() {
    let jpeg = vec![0xAB; 5000];
    let archive = write_archive(&[
        response("http://a/cat.jpg", "200 OK", "image/jpeg", &jpeg),
        response("http://a/index.html", "200 OK", "text/html", &[b'x'; 5000]),
        response("http://a/gone.png", "404 Not Found", "image/png", &[0u8; 5000]),
    ]);
    let sink = SharedBuffer::default();

    let result = Pipeline::builder(fixed_factory())
        .readers(2)
        .workers(2)
        .sink(Box::new(sink.clone()))
        .build()
        .run(vec![local(&archive)])
        .unwrap();

    assert_eq!(
        sink.sorted_lines(),
        vec![format!("{} 0.5", ContentId::of_bytes(&jpeg))]
    );
    assert_eq!(result.lines_written, 1);
    assert_eq!(result.summary.images_queued, 1);
    assert_eq!(result.summary.classified, 1);
}

#[test]
fn pipeline_classifies_shared_images_once_with_dedup_service() {
    let shared = vec![0x11; 3000];
    let first = write_archive(&[
        response("http://a/shared.jpg", "200 OK", "image/jpeg", &shared),
        response("http://a/only-a.png", "200 OK", "image/png", &[0x22; 3000]),
    ]);
    let second = write_archive(&[
        response("http://b/shared.jpg", "200 OK", "image/jpeg", &shared),
    ]);
    let sink = SharedBuffer::default();

    let result = Pipeline::builder(fixed_factory())
        .readers(2)
        .workers(1)
        .dedup_server(Some(spawn_dedup_service()))
        .sink(Box::new(sink.clone()))
        .build()
        .run(vec![local(&first), local(&second)])
        .unwrap();

    assert_eq!(sink.sorted_lines().len(), 2);
    assert_eq!(result.summary.duplicates_skipped, 1);
    assert_eq!(result.summary.images_queued, 2);
}

#[test]
fn pipeline_continues_past_missing_source() {
    let archive = write_archive(&[response(
        "http://a/cat.gif",
        "200 OK",
        "image/gif",
        &[0x33; 4000],
    )]);
    let sink = SharedBuffer::default();

    let result = Pipeline::builder(fixed_factory())
        .readers(1)
        .workers(1)
        .sink(Box::new(sink.clone()))
        .build()
        .run(vec![Source::parse("/nonexistent/gone.warc.gz"), local(&archive)])
        .unwrap();

    assert_eq!(result.summary.sources, 2);
    assert_eq!(result.summary.sources_failed, 1);
    assert_eq!(sink.sorted_lines().len(), 1);
}

#[test]
fn pipeline_prints_sentinel_for_failed_classification() {
    let broken = vec![0xEE; 2500];
    let archive = write_archive(&[
        response("http://a/broken.bmp", "200 OK", "image/bmp", &broken),
        response("http://a/fine.jpg", "200 OK", "image/jpeg", &[0x44; 2500]),
    ]);
    let sink = SharedBuffer::default();

    let result = Pipeline::builder(fixed_factory())
        .readers(1)
        .workers(2)
        .sink(Box::new(sink.clone()))
        .build()
        .run(vec![local(&archive)])
        .unwrap();

    let lines = sink.sorted_lines();
    assert!(lines.contains(&format!("{} -99.0", ContentId::of_bytes(&broken))));
    assert_eq!(lines.len(), 2);
    assert_eq!(result.summary.classification_failures, 1);
    assert_eq!(result.summary.classified, 1);
}

#[test]
fn pipeline_reads_gzip_archives_and_prints_urls_as_json() {
    let archive = write_gzip_archive(&[
        response("http://a/one.jpg", "200 OK", "image/jpeg", &[0x55; 2100]),
        response("http://a/two.png", "200 OK", "image/png; charset=binary", &[0x66; 2100]),
    ]);
    let sink = SharedBuffer::default();

    Pipeline::builder(fixed_factory())
        .readers(1)
        .workers(1)
        .output_format(OutputFormat::Json)
        .print_url(true)
        .sink(Box::new(sink.clone()))
        .build()
        .run(vec![local(&archive)])
        .unwrap();

    let urls: Vec<String> = sink
        .sorted_lines()
        .iter()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["score"], 0.5);
            value["url"].as_str().unwrap().to_string()
        })
        .collect();
    let urls: HashSet<String> = urls.into_iter().collect();
    assert!(urls.contains("http://a/one.jpg"));
    assert!(urls.contains("http://a/two.png"));
}

#[test]
fn pipeline_reports_progress_events() {
    let archive = write_archive(&[response(
        "http://a/cat.jpg",
        "200 OK",
        "image/jpeg",
        &[0x77; 2000],
    )]);
    let (sender, receiver) = EventChannel::new();

    let result = Pipeline::builder(fixed_factory())
        .readers(1)
        .workers(1)
        .sink(Box::new(std::io::sink()))
        .build()
        .run_with_events(vec![local(&archive)], &sender)
        .unwrap();
    drop(sender);

    let events: Vec<Event> = receiver.iter().collect();
    assert!(matches!(
        events.first(),
        Some(Event::Pipeline(PipelineEvent::Started { sources: 1, .. }))
    ));
    match events.last() {
        Some(Event::Pipeline(PipelineEvent::Completed { summary })) => {
            assert_eq!(summary, &result.summary);
        }
        other => panic!("unexpected last event: {:?}", other),
    }
}

#[test]
fn pipeline_reads_arc_archives() {
    let jpeg = vec![0x88; 4000];
    let archive = write_archive(&[
        arc_filedesc(),
        arc_response("http://a/cat.jpg", "200 OK", "image/jpeg", &jpeg),
        arc_response("http://a/index.html", "200 OK", "text/html", &[b'x'; 4000]),
        arc_response("http://a/gone.png", "404 Not Found", "image/png", &[0u8; 4000]),
    ]);
    let sink = SharedBuffer::default();

    let result = Pipeline::builder(fixed_factory())
        .readers(1)
        .workers(1)
        .print_url(true)
        .sink(Box::new(sink.clone()))
        .build()
        .run(vec![local(&archive)])
        .unwrap();

    assert_eq!(
        sink.sorted_lines(),
        vec![format!("{} 0.5 http://a/cat.jpg", ContentId::of_bytes(&jpeg))]
    );
    assert_eq!(result.summary.sources_failed, 0);
}

#[test]
fn pipeline_reads_gzip_arc_archives() {
    let archive = write_gzip_archive(&[
        arc_filedesc(),
        arc_response("http://a/one.gif", "200 OK", "image/gif", &[0x99; 2500]),
        arc_response("http://a/two.bmp", "200 OK", "image/bmp", &[0xAA; 2500]),
    ]);
    let sink = SharedBuffer::default();

    let result = Pipeline::builder(fixed_factory())
        .readers(1)
        .workers(2)
        .sink(Box::new(sink.clone()))
        .build()
        .run(vec![local(&archive)])
        .unwrap();

    assert_eq!(sink.sorted_lines().len(), 2);
    assert_eq!(result.summary.classified, 2);
    assert_eq!(result.summary.sources_failed, 0);
}
