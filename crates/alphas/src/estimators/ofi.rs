//! Market-cap normalized order flow imbalance
//!
//! Signal = cumulative OFI / market cap. The first book observation after
//! construction or reset only seeds the previous top of book.

use crate::config::{OfiConfig, OfiResetPolicy};
use crate::kernels::{BookTop, CompensatedSum, ofi_step};
use helios_core::{AlphaKind, MarketEvent, SignalDetail, SignalReading};
use helios_ports::{EngineError, EngineResult, Estimator, EventField};

const REQUIRED_FIELDS: &[EventField] = &[
    EventField::BidPrice,
    EventField::BidSize,
    EventField::AskPrice,
    EventField::AskSize,
];

#[derive(Debug, Clone)]
pub struct OfiEstimator {
    market_cap: f64,
    reset_policy: OfiResetPolicy,
    last: Option<BookTop>,
    cum_ofi: CompensatedSum,
    last_step: f64,
    steps_since_reset: u64,
    cum_volume: f64,
}

impl OfiEstimator {
    pub fn new(config: &OfiConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            market_cap: config.market_cap,
            reset_policy: config.reset_policy,
            last: None,
            cum_ofi: CompensatedSum::default(),
            last_step: 0.0,
            steps_since_reset: 0,
            cum_volume: 0.0,
        })
    }

    /// Size-only update: price levels are taken as unchanged, so
    /// `OFI_t = (bid_size - last_bid_size) - (ask_size - last_ask_size)`.
    pub fn update_sizes(&mut self, bid_size: f64, ask_size: f64) -> EngineResult<f64> {
        let (bid_price, ask_price) = self
            .last
            .map(|top| (top.bid_price, top.ask_price))
            .unwrap_or((0.0, 0.0));
        let reading = self.update_book(BookTop {
            bid_price,
            bid_size,
            ask_price,
            ask_size,
        })?;
        Ok(reading.value)
    }

    /// Full top-of-book update with the price-level rule
    pub fn update_book(&mut self, top: BookTop) -> EngineResult<SignalReading> {
        top.validate()?;
        self.apply(top, 0.0)
    }

    pub fn signal(&self) -> f64 {
        self.cum_ofi.value() / self.market_cap
    }

    pub fn cum_ofi(&self) -> f64 {
        self.cum_ofi.value()
    }

    pub fn cum_volume(&self) -> f64 {
        self.cum_volume
    }

    pub fn market_cap(&self) -> f64 {
        self.market_cap
    }

    pub fn volume_normalized(&self) -> f64 {
        if self.cum_volume > 0.0 {
            self.cum_ofi.value() / self.cum_volume
        } else {
            self.cum_ofi.value()
        }
    }

    /// Fold a validated book top in. Nothing is mutated unless the step and
    /// the running sums stay finite.
    fn apply(&mut self, top: BookTop, traded: f64) -> EngineResult<SignalReading> {
        let cum_volume = self.cum_volume + traded;
        if !cum_volume.is_finite() {
            return Err(EngineError::invalid_input(format!(
                "traded volume overflowed adding {traded}"
            )));
        }

        let Some(prev) = self.last else {
            self.last = Some(top);
            self.cum_volume = cum_volume;
            self.last_step = 0.0;
            return Ok(SignalReading::insufficient(self.signal(), 1, 2, self.detail()));
        };

        let step = ofi_step(&prev, &top);
        if !step.is_finite() {
            return Err(EngineError::invalid_input(format!(
                "OFI step overflowed (bid {} -> {}, ask {} -> {})",
                prev.bid_size, top.bid_size, prev.ask_size, top.ask_size
            )));
        }

        let mut cum_ofi = self.cum_ofi;
        let mut steps_since_reset = self.steps_since_reset;
        match self.reset_policy {
            OfiResetPolicy::Manual => {}
            OfiResetPolicy::Decay { factor } => cum_ofi.scale(factor),
            OfiResetPolicy::Periodic { every_events } => {
                if steps_since_reset >= every_events {
                    cum_ofi.clear();
                    steps_since_reset = 0;
                }
            }
        }
        cum_ofi.add(step);
        if !cum_ofi.value().is_finite() {
            return Err(EngineError::invalid_input(format!(
                "cumulative OFI overflowed adding step {step}"
            )));
        }

        self.last = Some(top);
        self.cum_ofi = cum_ofi;
        self.steps_since_reset = steps_since_reset + 1;
        self.cum_volume = cum_volume;
        self.last_step = step;

        Ok(SignalReading::ready(self.signal(), self.detail()))
    }

    fn detail(&self) -> SignalDetail {
        SignalDetail::Ofi {
            ofi_step: self.last_step,
            cum_ofi: self.cum_ofi.value(),
            volume_normalized: self.volume_normalized(),
        }
    }
}

impl Estimator for OfiEstimator {
    fn kind(&self) -> AlphaKind {
        AlphaKind::Ofi
    }

    fn required_fields(&self) -> &'static [EventField] {
        REQUIRED_FIELDS
    }

    fn update(&mut self, event: &MarketEvent) -> EngineResult<SignalReading> {
        let top = BookTop::from_event(event);
        top.validate()?;
        let traded = match event.trade() {
            Some(trade) if trade.size.is_finite() && trade.size >= 0.0 => trade.size,
            Some(trade) => {
                return Err(EngineError::invalid_input(format!(
                    "trade size must be finite and >= 0, got {}",
                    trade.size
                )));
            }
            None => 0.0,
        };

        self.apply(top, traded)
    }

    fn reset(&mut self) {
        self.last = None;
        self.cum_ofi.clear();
        self.last_step = 0.0;
        self.steps_since_reset = 0;
        self.cum_volume = 0.0;
    }
}
