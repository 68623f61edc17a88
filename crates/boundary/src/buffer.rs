//! Columnar batch buffers
//!
//! `BatchView` borrows host memory and is visited in place, one row at a
//! time. `OwnedBatch` holds the same columns behind `Arc` so it can be moved
//! onto a worker.
//!
//! When trade columns are present, a row whose trade price and trade size
//! are both NaN carries no trade print.

use std::sync::Arc;

use helios_core::{InstrumentId, MarketEvent};
use helios_ports::EventField;
use helios_registry::SlotInfo;

use crate::error::{BoundaryError, BoundaryResult};

/// Borrowed, read-only columns for one instrument
#[derive(Debug, Clone, Copy)]
pub struct BatchView<'a> {
    instrument_id: &'a InstrumentId,
    timestamps: &'a [u64],
    bid_price: &'a [f64],
    bid_size: &'a [f64],
    ask_price: &'a [f64],
    ask_size: &'a [f64],
    trade_price: Option<&'a [f64]>,
    trade_size: Option<&'a [f64]>,
}

impl<'a> BatchView<'a> {
    pub fn new(
        instrument_id: &'a InstrumentId,
        timestamps: &'a [u64],
        bid_price: &'a [f64],
        bid_size: &'a [f64],
        ask_price: &'a [f64],
        ask_size: &'a [f64],
    ) -> Self {
        Self {
            instrument_id,
            timestamps,
            bid_price,
            bid_size,
            ask_price,
            ask_size,
            trade_price: None,
            trade_size: None,
        }
    }

    pub fn with_trades(mut self, trade_price: &'a [f64], trade_size: &'a [f64]) -> Self {
        self.trade_price = Some(trade_price);
        self.trade_size = Some(trade_size);
        self
    }

    /// Attach trade columns individually; a lone column fails validation
    pub fn with_trade_columns(
        mut self,
        trade_price: Option<&'a [f64]>,
        trade_size: Option<&'a [f64]>,
    ) -> Self {
        self.trade_price = trade_price;
        self.trade_size = trade_size;
        self
    }

    pub fn instrument_id(&self) -> &InstrumentId {
        self.instrument_id
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn has_field(&self, field: EventField) -> bool {
        match field {
            EventField::TradePrice => self.trade_price.is_some(),
            EventField::TradeSize => self.trade_size.is_some(),
            _ => true,
        }
    }

    /// Column lengths, trade column pairing and timestamp order
    pub fn validate_shape(&self) -> BoundaryResult<()> {
        let len = self.len();
        let columns = [
            ("bid_price", Some(self.bid_price)),
            ("bid_size", Some(self.bid_size)),
            ("ask_price", Some(self.ask_price)),
            ("ask_size", Some(self.ask_size)),
            ("trade_price", self.trade_price),
            ("trade_size", self.trade_size),
        ];
        for (name, column) in columns {
            if let Some(column) = column {
                if column.len() != len {
                    return Err(BoundaryError::invalid_input(format!(
                        "column {name} has {} rows, timestamps has {len}",
                        column.len()
                    )));
                }
            }
        }

        if self.trade_price.is_some() != self.trade_size.is_some() {
            return Err(BoundaryError::invalid_input(
                "trade_price and trade_size must be provided together",
            ));
        }

        if let Some(row) = self.timestamps.windows(2).position(|w| w[1] < w[0]) {
            return Err(BoundaryError::invalid_input(format!(
                "timestamps go backwards at row {}",
                row + 1
            )));
        }
        Ok(())
    }

    /// Every estimator registered on the instrument finds its columns
    pub fn validate_schema(&self, estimators: &[SlotInfo]) -> BoundaryResult<()> {
        self.validate_shape()?;
        for info in estimators {
            if let Some(missing) = info.required_fields.iter().find(|f| !self.has_field(**f)) {
                return Err(BoundaryError::invalid_input(format!(
                    "alpha {} ({}) needs column {} which the batch does not carry",
                    info.alpha_id,
                    info.kind,
                    missing.as_str()
                )));
            }
        }
        Ok(())
    }

    /// Event for one row. Only valid after `validate_shape`.
    pub(crate) fn event(&self, row: usize) -> MarketEvent {
        let event = MarketEvent::quote(
            self.timestamps[row],
            self.instrument_id.clone(),
            self.bid_price[row],
            self.bid_size[row],
            self.ask_price[row],
            self.ask_size[row],
        );
        match (self.trade_price, self.trade_size) {
            (Some(price), Some(size)) if !(price[row].is_nan() && size[row].is_nan()) => {
                event.with_trade(price[row], size[row])
            }
            _ => event,
        }
    }
}

/// Owned columns that can be sent to a worker
#[derive(Debug, Clone)]
pub struct OwnedBatch {
    instrument_id: InstrumentId,
    timestamps: Arc<[u64]>,
    bid_price: Arc<[f64]>,
    bid_size: Arc<[f64]>,
    ask_price: Arc<[f64]>,
    ask_size: Arc<[f64]>,
    trade_price: Option<Arc<[f64]>>,
    trade_size: Option<Arc<[f64]>>,
}

impl OwnedBatch {
    pub fn new(
        instrument_id: impl Into<InstrumentId>,
        timestamps: impl Into<Arc<[u64]>>,
        bid_price: impl Into<Arc<[f64]>>,
        bid_size: impl Into<Arc<[f64]>>,
        ask_price: impl Into<Arc<[f64]>>,
        ask_size: impl Into<Arc<[f64]>>,
    ) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            timestamps: timestamps.into(),
            bid_price: bid_price.into(),
            bid_size: bid_size.into(),
            ask_price: ask_price.into(),
            ask_size: ask_size.into(),
            trade_price: None,
            trade_size: None,
        }
    }

    pub fn with_trades(
        mut self,
        trade_price: impl Into<Arc<[f64]>>,
        trade_size: impl Into<Arc<[f64]>>,
    ) -> Self {
        self.trade_price = Some(trade_price.into());
        self.trade_size = Some(trade_size.into());
        self
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn view(&self) -> BatchView<'_> {
        BatchView::new(
            &self.instrument_id,
            &self.timestamps,
            &self.bid_price,
            &self.bid_size,
            &self.ask_price,
            &self.ask_size,
        )
        .with_trade_columns(self.trade_price.as_deref(), self.trade_size.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helios_core::AlphaKind;
    use helios_registry::SignalRegistry;

    fn instrument() -> InstrumentId {
        InstrumentId::new("BTC-USD")
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let inst = instrument();
        let ts = [1, 2, 3];
        let px = [100.0, 100.0, 100.0];
        let short = [1.0, 1.0];
        let view = BatchView::new(&inst, &ts, &px, &short, &px, &px);
        let err = view.validate_shape().unwrap_err();
        assert!(err.message.contains("bid_size"));
    }

    #[test]
    fn test_lone_trade_column_rejected() {
        let inst = instrument();
        let ts = [1, 2];
        let px = [100.0, 100.0];
        let view = BatchView::new(&inst, &ts, &px, &px, &px, &px).with_trade_columns(Some(&px[..]), None);
        assert!(view.validate_shape().is_err());
    }

    #[test]
    fn test_backwards_timestamps_rejected() {
        let inst = instrument();
        let ts = [1, 3, 2];
        let px = [100.0; 3];
        let view = BatchView::new(&inst, &ts, &px, &px, &px, &px);
        assert!(view.validate_shape().unwrap_err().message.contains("row 2"));
    }

    #[test]
    fn test_nan_trade_row_is_quote() {
        let inst = instrument();
        let ts = [1, 2];
        let px = [100.0, 100.0];
        let trade_px = [f64::NAN, 100.2];
        let trade_sz = [f64::NAN, 3.0];
        let view = BatchView::new(&inst, &ts, &px, &px, &px, &px).with_trades(&trade_px, &trade_sz);
        view.validate_shape().unwrap();
        assert!(!view.event(0).is_trade());
        assert_eq!(view.event(1).trade().unwrap().size, 3.0);
    }

    #[test]
    fn test_schema_requires_trade_columns_for_trade_alphas() {
        let registry = SignalRegistry::new();
        let config = serde_json::from_str(
            r#"{"kind":"garch","omega":1e-6,"alpha":0.1,"beta":0.8,"sigma2_init":1e-4,
                "input":{"source":"last_trade"}}"#,
        )
        .unwrap();
        registry.register("trade-vol", "BTC-USD", &config).unwrap();
        let estimators = registry.describe_instrument(&instrument());
        assert_eq!(estimators[0].kind, AlphaKind::Garch);

        let inst = instrument();
        let ts = [1];
        let px = [100.0];
        let view = BatchView::new(&inst, &ts, &px, &px, &px, &px);
        let err = view.validate_schema(&estimators).unwrap_err();
        assert!(err.message.contains("trade_price"));
        assert!(view.with_trades(&px, &px).validate_schema(&estimators).is_ok());
    }

    #[test]
    fn test_owned_view_borrows_arcs() {
        let batch = OwnedBatch::new(
            "BTC-USD",
            vec![1u64, 2],
            vec![100.0, 100.0],
            vec![1.0, 2.0],
            vec![101.0, 101.0],
            vec![1.0, 1.0],
        );
        let view = batch.view();
        assert_eq!(view.len(), 2);
        assert!(!view.has_field(EventField::TradePrice));
        assert_eq!(view.event(1).bid_size(), 2.0);
    }
}
