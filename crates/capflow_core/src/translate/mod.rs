//! Batched translation with retry/backoff.
//!
//! - [`RetryController`]: per-request state machine with linear backoff
//! - [`BatchTranslator`]: partitions texts, drives batches concurrently,
//!   merges results in batch order
//! - [`InFlightLimiter`]: quota shared by every run
//! - [`GeminiTranslator`]: HTTP collaborator

mod batch;
mod gemini;
mod limiter;
pub mod response;
mod retry;

pub use batch::{
    partition_batches, BatchOptions, BatchResult, BatchRun, BatchTranslator, MergedTranslation,
    Translator,
};
pub use gemini::GeminiTranslator;
pub use limiter::{InFlightLimiter, InFlightPermit};
pub use retry::{RequestState, RetryController, RetryPolicy, TransitionError};
