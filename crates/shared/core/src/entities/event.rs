//! Market Events - the only input the signal engine consumes
//!
//! A `MarketEvent` is a top-of-book snapshot, optionally carrying the last
//! trade print when the event was triggered by a trade. Events are immutable
//! once built: fields are private and only readable through accessors.

use crate::values::{InstrumentId, Timestamp};
use serde::{Deserialize, Serialize};

/// Last trade attached to a trade event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradePrint {
    pub price: f64,
    pub size: f64,
}

/// Quote or trade event for one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEvent {
    timestamp: Timestamp,
    instrument_id: InstrumentId,
    bid_price: f64,
    bid_size: f64,
    ask_price: f64,
    ask_size: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    trade: Option<TradePrint>,
}

impl MarketEvent {
    /// Create a quote event from the best bid/ask
    pub fn quote(
        timestamp: impl Into<Timestamp>,
        instrument_id: impl Into<InstrumentId>,
        bid_price: f64,
        bid_size: f64,
        ask_price: f64,
        ask_size: f64,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            instrument_id: instrument_id.into(),
            bid_price,
            bid_size,
            ask_price,
            ask_size,
            trade: None,
        }
    }

    /// Turn this event into a trade event
    pub fn with_trade(mut self, price: f64, size: f64) -> Self {
        self.trade = Some(TradePrint { price, size });
        self
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn instrument_id(&self) -> &InstrumentId {
        &self.instrument_id
    }

    pub fn bid_price(&self) -> f64 {
        self.bid_price
    }

    pub fn bid_size(&self) -> f64 {
        self.bid_size
    }

    pub fn ask_price(&self) -> f64 {
        self.ask_price
    }

    pub fn ask_size(&self) -> f64 {
        self.ask_size
    }

    pub fn trade(&self) -> Option<TradePrint> {
        self.trade
    }

    pub fn is_trade(&self) -> bool {
        self.trade.is_some()
    }

    /// Mid price, if both sides carry a positive finite price
    pub fn mid_price(&self) -> Option<f64> {
        let valid = |p: f64| p.is_finite() && p > 0.0;
        if valid(self.bid_price) && valid(self.ask_price) {
            Some((self.bid_price + self.ask_price) / 2.0)
        } else {
            None
        }
    }
}
