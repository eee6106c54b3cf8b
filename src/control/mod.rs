//! Control-plane FIFOs: the dispatcher wake byte, the delete-request FIFO,
//! and the newline-terminated log FIFOs (§6 "FIFOs").
//!
//! All three are modeled as thin wrappers over a `std::fs::File` opened on a
//! named pipe (or, in tests, a plain file standing in for one). None of them
//! is a second source of truth: the SSP tables remain authoritative, FIFOs
//! only carry notifications and append-only log records.

pub mod delete_fifo;
pub mod log_fifo;
pub mod wake_fifo;

pub use delete_fifo::{DeleteFifoError, DeleteFifoWriter, DeleteRequest};
pub use log_fifo::{LogFifoError, LogFifoSink};
pub use wake_fifo::WakeFifo;
