use std::fmt;

use serde::{Deserialize, Serialize};

/// Call or put, as reported by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionType::Call => "call",
            OptionType::Put => "put",
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One option instrument from `get_instruments`.
///
/// Only the five persisted fields are decoded; everything else in the
/// exchange payload (tick sizes, contract size, creation time, ...) is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentRecord {
    /// Exchange identifier, e.g. `BTC-27JUN25-100000-C`.
    pub instrument_name: String,
    pub strike: f64,
    /// Expiry in exchange units (milliseconds). Compared for equality only.
    pub expiration_timestamp: i64,
    pub option_type: OptionType,
    pub min_trade_amount: f64,
}
