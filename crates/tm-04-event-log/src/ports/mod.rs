pub mod outbound;

pub use outbound::{EventStore, FixedTimeSource, SystemTimeSource, TimeSource};
