//! Cross-context event signaling.
//!
//! The interrupt handler ([`TimerIrq`]) is the only writer of the
//! [`ExpiryCounter`]; the [`EventConsumer`] only reads it and keeps its own
//! last-observed copy. Shutdown is the consumer's job, never the handler's.

pub mod consumer;
pub mod counter;
pub mod handler;

pub use consumer::{EventConsumer, Idle, SequenceReport, SpinIdle, WaitPolicy};
pub use counter::ExpiryCounter;
pub use handler::TimerIrq;
