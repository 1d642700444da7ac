//! Background store worker.
//!
//! The worker runs on a dedicated OS thread and is the only owner of the
//! store connection. It receives [`ActionRequest`](notes_types::ActionRequest)s
//! over a channel, executes them strictly in arrival order, and answers each
//! with an [`ActionResult`](notes_types::ActionResult) that echoes the
//! request's correlation token. Failures, including panics, never cross the
//! channel as anything but an `ok: false` result.

pub mod error;
pub mod worker;

pub use error::{open_error_info, operation_error_info, WorkerError, WorkerResult};
pub use worker::{StoreWorker, WorkerHandle, WORKER_THREAD_NAME};
