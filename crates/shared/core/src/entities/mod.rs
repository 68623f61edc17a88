mod alpha;
mod event;
mod signal;

pub use alpha::AlphaKind;
pub use event::{MarketEvent, TradePrint};
pub use signal::{SignalDetail, SignalOutput, SignalReading, SignalStatus};
