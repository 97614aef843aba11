//! Shared data models spanning the engine layers.

pub mod instrument;
pub mod interval;
pub mod rule;
pub mod snapshot;
pub mod subscriber;

pub use instrument::{Instrument, InstrumentError};
pub use interval::{Interval, IntervalError};
pub use rule::{CompareOp, CrossDirection, Operand, Predicate, RuleSet};
pub use snapshot::IndicatorSnapshot;
pub use subscriber::SubscriberId;
