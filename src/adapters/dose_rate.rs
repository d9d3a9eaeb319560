//! Dose-rate adapters.
//!
//! No probe driver exists yet, so the tracker reports a configured constant.
//! Tests use the same adapter to pin the value.

use crate::app::ports::DoseRateSource;
use crate::error::DoseRateError;

/// Display value shown to crews when no probe is attached (µSv/h).
pub const DEFAULT_DOSE_RATE_USV_H: f64 = 0.12;

/// Reports the same reading every time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedDoseRate {
    usv_h: f64,
}

impl Default for FixedDoseRate {
    fn default() -> Self {
        Self::new(DEFAULT_DOSE_RATE_USV_H)
    }
}

impl FixedDoseRate {
    pub fn new(usv_h: f64) -> Self {
        Self { usv_h }
    }

    pub fn value(&self) -> f64 {
        self.usv_h
    }
}

impl DoseRateSource for FixedDoseRate {
    fn dose_rate_usv_h(&mut self) -> Result<f64, DoseRateError> {
        Ok(self.usv_h)
    }
}
