// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::BcpError;
use chrono::NaiveDate;

/// Chronologically ordered (date, log-return) observations.
///
/// The series arrives already cleaned: the constructor enforces the contract
/// (equal lengths, at least one observation, finite values) rather than
/// repairing violations.
#[derive(Clone, Debug, PartialEq)]
pub struct ObservationSeries {
    dates: Vec<NaiveDate>,
    log_returns: Vec<f64>,
}

impl ObservationSeries {
    /// Constructs a validated `ObservationSeries`.
    pub fn new(dates: Vec<NaiveDate>, log_returns: Vec<f64>) -> Result<Self, BcpError> {
        if dates.is_empty() {
            return Err(BcpError::invalid_input(
                "observation series must contain at least one observation",
            ));
        }
        if dates.len() != log_returns.len() {
            return Err(BcpError::invalid_input(format!(
                "date/return length mismatch: {} dates, {} log-returns",
                dates.len(),
                log_returns.len()
            )));
        }
        if let Some((idx, value)) = log_returns
            .iter()
            .copied()
            .enumerate()
            .find(|(_, v)| !v.is_finite())
        {
            return Err(BcpError::invalid_input(format!(
                "log-return at index {idx} must be finite; got {value}"
            )));
        }

        Ok(Self { dates, log_returns })
    }

    /// Convenience constructor from (date, log-return) pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (NaiveDate, f64)>) -> Result<Self, BcpError> {
        let (dates, log_returns) = pairs.into_iter().unzip();
        Self::new(dates, log_returns)
    }

    /// Number of observations (always >= 1).
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Always false: an empty series never constructs.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn log_returns(&self) -> &[f64] {
        &self.log_returns
    }
}
