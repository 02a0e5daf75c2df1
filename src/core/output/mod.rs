//! # Output Module
//!
//! Formats classification results for the line-oriented sink.
//!
//! ## Formats
//! - **Plain** - `<identifier> <score>`, optionally followed by the URL
//! - **Json** - one JSON object per line

use crate::core::classifier::is_failure;
use crate::core::digest::ContentId;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// Score for one image, produced by a worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub digest: ContentId,
    /// Model score, or the failure sentinel
    pub score: f32,
    /// Source URL, printed only when requested
    pub url: String,
}

impl ClassificationResult {
    pub fn is_failure(&self) -> bool {
        is_failure(self.score)
    }
}

/// How results are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Space separated text, one result per line
    #[default]
    Plain,
    /// JSON lines
    Json,
}

/// Writes results to a sink, one line each
pub struct ResultPrinter<W: Write> {
    sink: W,
    format: OutputFormat,
    print_url: bool,
    written: usize,
}

impl<W: Write> ResultPrinter<W> {
    pub fn new(sink: W, format: OutputFormat, print_url: bool) -> Self {
        Self {
            sink,
            format,
            print_url,
            written: 0,
        }
    }

    /// Write one result line
    pub fn print(&mut self, result: &ClassificationResult) -> io::Result<()> {
        match self.format {
            OutputFormat::Plain => {
                // Debug formatting keeps the decimal point: `-99.0`, not `-99`
                if self.print_url {
                    writeln!(self.sink, "{} {:?} {}", result.digest, result.score, result.url)?;
                } else {
                    writeln!(self.sink, "{} {:?}", result.digest, result.score)?;
                }
            }
            OutputFormat::Json => {
                let line = if self.print_url {
                    serde_json::json!({
                        "digest": result.digest,
                        "score": result.score,
                        "url": result.url,
                    })
                } else {
                    serde_json::json!({
                        "digest": result.digest,
                        "score": result.score,
                    })
                };
                writeln!(self.sink, "{}", line)?;
            }
        }
        self.written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }

    /// Lines written so far
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classifier::FAILURE_SCORE;

    fn result(score: f32) -> ClassificationResult {
        ClassificationResult {
            digest: ContentId::of_bytes(b"abc"),
            score,
            url: "http://example.org/a.jpg".to_string(),
        }
    }

    fn render(format: OutputFormat, print_url: bool, result: &ClassificationResult) -> String {
        let mut printer = ResultPrinter::new(Vec::new(), format, print_url);
        printer.print(result).unwrap();
        String::from_utf8(printer.into_inner()).unwrap()
    }

    #[test]
    fn plain_line_is_digest_and_score() {
        assert_eq!(
            render(OutputFormat::Plain, false, &result(0.42)),
            "A9993E364706816A 0.42\n"
        );
    }

    #[test]
    fn sentinel_keeps_decimal_point() {
        assert_eq!(
            render(OutputFormat::Plain, false, &result(FAILURE_SCORE)),
            "A9993E364706816A -99.0\n"
        );
        assert!(result(FAILURE_SCORE).is_failure());
    }

    #[test]
    fn url_is_appended_when_requested() {
        assert_eq!(
            render(OutputFormat::Plain, true, &result(0.5)),
            "A9993E364706816A 0.5 http://example.org/a.jpg\n"
        );
    }

    #[test]
    fn json_lines_are_parseable() {
        let line = render(OutputFormat::Json, true, &result(0.25));
        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["digest"], "A9993E364706816A");
        assert_eq!(value["score"], 0.25);
        assert_eq!(value["url"], "http://example.org/a.jpg");
    }

    #[test]
    fn json_omits_url_by_default() {
        let line = render(OutputFormat::Json, false, &result(0.25));
        assert!(!line.contains("url"));
    }

    #[test]
    fn counts_written_lines() {
        let mut printer = ResultPrinter::new(Vec::new(), OutputFormat::Plain, false);
        printer.print(&result(0.1)).unwrap();
        printer.print(&result(0.2)).unwrap();
        assert_eq!(printer.written(), 2);
    }
}
