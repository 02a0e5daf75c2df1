//! # Pipeline Module
//!
//! Orchestrates archive reading, classification and printing.
//!
//! ## Pipeline Stages
//! 1. **Read** - R reader threads parse archives and queue accepted images
//! 2. **Classify** - W worker threads score images
//! 3. **Print** - one printer thread writes a line per result
//!
//! ## Backpressure
//! The image queue holds at most W items and the output queue at most
//! 1000, so memory stays bounded however large the archives are.
//!
//! ## Shutdown
//! The orchestrator drains the queues in order (sources, images, outputs)
//! and closes each one after its drain, which ends the stage reading it.

mod executor;
mod stages;

pub use executor::{
    default_parallelism, Pipeline, PipelineBuilder, PipelineConfig, PipelineResult,
    OUTPUT_QUEUE_CAPACITY,
};
