//! # Events Module
//!
//! Progress reporting for the classification pipeline.
//!
//! ## Design
//! Readers, workers and the orchestrator emit events through a channel,
//! allowing any front end to subscribe and display progress. Scores
//! themselves never travel over this channel; they go through the
//! output queue to the printer.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         match event {
//!             Event::Reader(ReaderEvent::SourceFailed { source, message }) => {
//!                 eprintln!("{source}: {message}")
//!             }
//!             _ => {}
//!         }
//!     }
//! });
//!
//! pipeline.run_with_events(sources, &sender)?;
//! ```

mod channel;
mod types;

pub use channel::{EventChannel, EventReceiver, EventSender, null_sender};
pub use types::*;
