//! Order flow imbalance (Cont-Kukanov-Stoikov)
//!
//! BidFlow_t:
//!   bid price up        → +bid_size_t
//!   bid price unchanged → bid_size_t - bid_size_{t-1}
//!   bid price down      → -bid_size_{t-1}
//!
//! AskFlow_t:
//!   ask price down      → +ask_size_t
//!   ask price unchanged → ask_size_t - ask_size_{t-1}
//!   ask price up        → -ask_size_{t-1}
//!
//! OFI_t = BidFlow_t - AskFlow_t (positive = buying pressure)

use helios_core::MarketEvent;
use helios_ports::{EngineError, EngineResult};

/// Best bid/ask snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookTop {
    pub bid_price: f64,
    pub bid_size: f64,
    pub ask_price: f64,
    pub ask_size: f64,
}

impl BookTop {
    pub fn from_event(event: &MarketEvent) -> Self {
        Self {
            bid_price: event.bid_price(),
            bid_size: event.bid_size(),
            ask_price: event.ask_price(),
            ask_size: event.ask_size(),
        }
    }

    /// Prices finite, sizes finite and non-negative
    pub fn validate(&self) -> EngineResult<()> {
        if !(self.bid_price.is_finite() && self.ask_price.is_finite()) {
            return Err(EngineError::invalid_input(format!(
                "non-finite quote price: bid={}, ask={}",
                self.bid_price, self.ask_price
            )));
        }
        for (side, size) in [("bid", self.bid_size), ("ask", self.ask_size)] {
            if !size.is_finite() || size < 0.0 {
                return Err(EngineError::invalid_input(format!(
                    "{side} size must be finite and >= 0, got {size}"
                )));
            }
        }
        Ok(())
    }
}

/// OFI contribution of the move from `prev` to `cur`
#[inline]
pub fn ofi_step(prev: &BookTop, cur: &BookTop) -> f64 {
    let bid_flow = if cur.bid_price > prev.bid_price {
        cur.bid_size
    } else if cur.bid_price < prev.bid_price {
        -prev.bid_size
    } else {
        cur.bid_size - prev.bid_size
    };

    let ask_flow = if cur.ask_price < prev.ask_price {
        cur.ask_size
    } else if cur.ask_price > prev.ask_price {
        -prev.ask_size
    } else {
        cur.ask_size - prev.ask_size
    };

    bid_flow - ask_flow
}

/// Neumaier-compensated running sum.
///
/// Keeps a long-lived cumulative OFI from drifting as tiny steps are added to
/// a large accumulated value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompensatedSum {
    sum: f64,
    compensation: f64,
}

impl CompensatedSum {
    #[inline]
    pub fn add(&mut self, x: f64) {
        let t = self.sum + x;
        if self.sum.abs() >= x.abs() {
            self.compensation += (self.sum - t) + x;
        } else {
            self.compensation += (x - t) + self.sum;
        }
        self.sum = t;
    }

    pub fn value(&self) -> f64 {
        self.sum + self.compensation
    }

    pub fn scale(&mut self, factor: f64) {
        self.sum *= factor;
        self.compensation *= factor;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn top(bid_price: f64, bid_size: f64, ask_price: f64, ask_size: f64) -> BookTop {
        BookTop {
            bid_price,
            bid_size,
            ask_price,
            ask_size,
        }
    }

    #[test]
    fn test_unchanged_levels_use_size_deltas() {
        let prev = top(100.0, 10.0, 101.0, 8.0);
        let cur = top(100.0, 15.0, 101.0, 8.0);
        assert_eq!(ofi_step(&prev, &cur), 5.0);
    }

    #[test]
    fn test_bid_improvement_counts_full_new_size() {
        let prev = top(100.0, 10.0, 101.0, 8.0);
        let cur = top(100.5, 3.0, 101.0, 8.0);
        assert_eq!(ofi_step(&prev, &cur), 3.0);
    }

    #[test]
    fn test_bid_drop_removes_old_size() {
        let prev = top(100.0, 10.0, 101.0, 8.0);
        let cur = top(99.5, 4.0, 101.0, 8.0);
        assert_eq!(ofi_step(&prev, &cur), -10.0);
    }

    #[test]
    fn test_ask_moves() {
        let prev = top(100.0, 10.0, 101.0, 8.0);
        // Ask drops: new ask liquidity is selling pressure
        assert_eq!(ofi_step(&prev, &top(100.0, 10.0, 100.5, 6.0)), -6.0);
        // Ask lifts: old ask liquidity consumed
        assert_eq!(ofi_step(&prev, &top(100.0, 10.0, 101.5, 2.0)), 8.0);
    }

    #[test]
    fn test_validate() {
        assert!(top(100.0, 1.0, 101.0, 1.0).validate().is_ok());
        assert!(top(100.0, -1.0, 101.0, 1.0).validate().is_err());
        assert!(top(100.0, 1.0, f64::NAN, 1.0).validate().is_err());
        assert!(top(100.0, 1.0, 101.0, f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_compensated_sum_recovers_small_terms() {
        let mut sum = CompensatedSum::default();
        sum.add(1e16);
        for _ in 0..10 {
            sum.add(1.0);
        }
        sum.add(-1e16);
        assert_eq!(sum.value(), 10.0);
    }
}
