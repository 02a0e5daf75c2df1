//! # warc-classify CLI
//!
//! Command-line interface for the WARC image classifier.
//!
//! ## Usage
//! ```bash
//! warc-classify classify --model nsfw.onnx crawl-00001.warc.gz
//! warc-classify classify --model nsfw.onnx --server dedup:5000 --print-url \
//!     https://example.org/crawl-00002.warc.gz
//! ```

mod cli;

use warc_image_classifier::Result;

fn main() -> Result<()> {
    cli::run()
}
