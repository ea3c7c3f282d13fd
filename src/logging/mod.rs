// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Facility-based logging for the multicast subsystem.
//!
//! Loggers are lightweight clonable handles writing structured entries to a
//! shared sink. Severity filtering happens at the call site, globally and
//! per facility, so suppressed messages cost one atomic load.

mod facility;
mod logger;
#[macro_use]
mod macros;
mod severity;

pub use facility::Facility;
pub use logger::{LogSink, Logger, MemorySink, StderrJsonSink};
pub use severity::Severity;
