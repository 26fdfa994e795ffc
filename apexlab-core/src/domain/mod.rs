//! Domain types — the immutable event model and portfolio state.

pub mod bar;
pub mod event;
pub mod position;

pub use bar::{Bar, BarError, Timeframe};
pub use event::{Event, Fill, Order, OrderError, OrderKind, Side, Signal, SignalKind};
pub use position::Position;
