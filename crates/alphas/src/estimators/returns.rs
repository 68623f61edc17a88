//! Price-to-return conversion shared by the GARCH and KL estimators
//!
//! The convention (price source and return kind) is part of an alpha's
//! configuration and never changes for the lifetime of an estimator.

use helios_core::MarketEvent;
use helios_ports::{EngineError, EngineResult, EventField};
use serde::{Deserialize, Serialize};

/// Which price stream returns are computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    /// (best bid + best ask) / 2, from every event
    #[default]
    Mid,
    /// Last trade price, from trade events only
    LastTrade,
}

/// Return definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnKind {
    /// ln(p_t / p_{t-1})
    #[default]
    Log,
    /// (p_t - p_{t-1}) / p_{t-1}
    Simple,
}

/// Return convention of an alpha
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReturnInput {
    #[serde(default)]
    pub source: PriceSource,
    #[serde(default)]
    pub kind: ReturnKind,
}

impl ReturnInput {
    pub fn required_fields(&self) -> &'static [EventField] {
        match self.source {
            PriceSource::Mid => &[EventField::BidPrice, EventField::AskPrice],
            PriceSource::LastTrade => &[EventField::TradePrice],
        }
    }

    /// Positive finite price this convention reads from the event
    pub fn price_of(&self, event: &MarketEvent) -> EngineResult<f64> {
        let price = match self.source {
            PriceSource::Mid => event.mid_price().ok_or_else(|| {
                EngineError::invalid_input(format!(
                    "no valid mid price: bid={}, ask={}",
                    event.bid_price(),
                    event.ask_price()
                ))
            })?,
            PriceSource::LastTrade => {
                event
                    .trade()
                    .ok_or_else(|| EngineError::invalid_input("event carries no trade print"))?
                    .price
            }
        };

        if price.is_finite() && price > 0.0 {
            Ok(price)
        } else {
            Err(EngineError::invalid_input(format!(
                "price must be finite and > 0, got {price}"
            )))
        }
    }

    #[inline]
    pub fn compute(&self, prev: f64, cur: f64) -> f64 {
        match self.kind {
            ReturnKind::Log => (cur / prev).ln(),
            ReturnKind::Simple => (cur - prev) / prev,
        }
    }
}

/// Last seen price for one estimator
#[derive(Debug, Clone)]
pub(crate) struct ReturnTracker {
    input: ReturnInput,
    last_price: Option<f64>,
}

/// Price observed on an event and the return it implies, not yet committed
#[derive(Debug, Clone, Copy)]
pub(crate) struct PendingReturn {
    pub price: f64,
    pub ret: Option<f64>,
}

impl ReturnTracker {
    pub fn new(input: ReturnInput) -> Self {
        Self {
            input,
            last_price: None,
        }
    }

    /// Read the event without touching state
    pub fn peek(&self, event: &MarketEvent) -> EngineResult<PendingReturn> {
        let price = self.input.price_of(event)?;
        let ret = self.last_price.map(|prev| self.input.compute(prev, price));
        Ok(PendingReturn { price, ret })
    }

    pub fn commit(&mut self, pending: PendingReturn) {
        self.last_price = Some(pending.price);
    }

    pub fn clear(&mut self) {
        self.last_price = None;
    }
}
