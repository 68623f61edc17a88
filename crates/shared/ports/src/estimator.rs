use helios_core::{AlphaKind, Binning, MarketEvent, SignalReading};

use crate::error::{EngineError, EngineResult};

/// Market event field an estimator reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventField {
    BidPrice,
    BidSize,
    AskPrice,
    AskSize,
    TradePrice,
    TradeSize,
}

impl EventField {
    /// Field only present on trade events
    pub fn is_trade_field(&self) -> bool {
        matches!(self, EventField::TradePrice | EventField::TradeSize)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventField::BidPrice => "bid_price",
            EventField::BidSize => "bid_size",
            EventField::AskPrice => "ask_price",
            EventField::AskSize => "ask_size",
            EventField::TradePrice => "trade_price",
            EventField::TradeSize => "trade_size",
        }
    }
}

/// Port for a stateful streaming estimator (one per alpha and instrument)
///
/// Implementations are single-writer: the registry serializes every `&mut`
/// call for one instance. A failed `update` must leave the state exactly as
/// it was before the call.
pub trait Estimator: Send {
    /// Estimator family, for logging and schema checks
    fn kind(&self) -> AlphaKind;

    /// Fields this estimator reads from every accepted event. Estimators
    /// that read a trade field only receive trade events.
    fn required_fields(&self) -> &'static [EventField];

    /// Fold one event into the state
    fn update(&mut self, event: &MarketEvent) -> EngineResult<SignalReading>;

    /// Drop all accumulated state, keeping the configuration
    fn reset(&mut self);

    /// Replace the frozen reference with the current recent window
    fn rebase(&mut self) -> EngineResult<()> {
        Err(EngineError::invalid_input(format!(
            "{} estimator has no reference window to rebase",
            self.kind()
        )))
    }

    /// Binning used for the reference histogram, if the estimator has one
    fn reference_binning(&self) -> Option<Binning> {
        None
    }

    /// Install a reference histogram built elsewhere (bin counts under `reference_binning`)
    fn install_reference(&mut self, counts: Vec<u64>) -> EngineResult<()> {
        let _ = counts;
        Err(EngineError::invalid_input(format!(
            "{} estimator does not accept a reference histogram",
            self.kind()
        )))
    }
}
