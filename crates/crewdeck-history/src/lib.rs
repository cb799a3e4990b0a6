//! Execution history for crewdeck.
//!
//! Producers push [`ExecutionLog`] entries into a bounded [`LogQueue`]; a
//! [`LogWriter`] drains the queue in the background into an
//! [`ExecutionLogSink`]. Execution outputs are persisted through an
//! [`OutputStore`].
//!
//! # Main types
//!
//! - [`LogQueue`] / [`LogReceiver`]: bounded, non-blocking log channel.
//! - [`LogWriter`]: background task batching entries into a sink.
//! - [`JsonlLogSink`] / [`MemoryLogSink`]: log persistence.
//! - [`JsonFileStorage`] / [`FileSystemStorage`]: output persistence.

/// Execution log entries.
pub mod log;
/// Bounded log queue.
pub mod queue;
/// Log sinks.
pub mod sink;
/// Output storage backends.
pub mod storage;
/// Background log writer.
pub mod writer;

pub use log::ExecutionLog;
pub use queue::{LogQueue, LogReceiver};
pub use sink::{ExecutionLogSink, JsonlLogSink, MemoryLogSink};
pub use storage::{sanitize_file_component, FileSystemStorage, JsonFileStorage, OutputStore};
pub use writer::LogWriter;
