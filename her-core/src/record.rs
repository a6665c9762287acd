//! Types and traits for recording training metrics.
//!
//! Agents return a [`Record`] from every learning call and the trainer stores
//! per-cycle and per-epoch summaries in an [`AggregateRecorder`].
//!
//! ```rust
//! use her_core::record::{Record, RecordValue};
//!
//! let mut record = Record::from_scalar("cycle_return", -42.0);
//! record.insert("cycle_success_rate", RecordValue::Scalar(0.25));
//! assert_eq!(record.get_scalar("cycle_return").unwrap(), -42.0);
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::{AggregateRecorder, Recorder};
