//! Domain types: bars, instance keys, signals, and persisted trade state.

pub mod bar;
pub mod key;
pub mod signal;
pub mod state;

pub use bar::{Bar, BarError, BarWindow, Quote};
pub use key::{SecurityType, StrategyInstanceKey, NON_FUTURE_LOT_SIZE};
pub use signal::{OrderKind, Side, Signal};
pub use state::{ActionState, LastAction, OrderRecord, PriceExtremes, ResetState};
