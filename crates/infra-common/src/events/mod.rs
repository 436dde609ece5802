//! Cross-thread hand-off primitives

pub mod latch;
pub mod queue;

pub use latch::ReadyLatch;
pub use queue::{EventQueue, QueueClosed, Recv};
