use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

/// Failure to turn one raw price candidate into a decimal. Local to a single
/// selector candidate: extraction recovers by trying the next one.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PriceParseError {
    #[error("no digits in price text: {0:?}")]
    Empty(String),

    #[error("not a valid decimal: {0:?}")]
    InvalidNumber(String),

    #[error("non-positive price: {0}")]
    NonPositive(Decimal),
}

/// Turns raw price-bearing text ("₹1,299.00", "$29.99", "1,299") into a
/// `Decimal`. Deterministic and side-effect free; called many times per
/// document while probing selector candidates.
pub struct PriceParser {
    strip_re: Regex,
}

impl PriceParser {
    pub fn new() -> Self {
        PriceParser {
            // Everything that isn't a digit or decimal point goes: currency
            // glyphs, thousands separators, whitespace, trailing punctuation.
            strip_re: Regex::new(r"[^0-9.]+").unwrap(),
        }
    }

    pub fn parse(&self, raw: &str) -> Result<Decimal, PriceParseError> {
        let mut cleaned = self.strip_re.replace_all(raw, "").into_owned();

        // Handle shapes like "1299." and ".99"
        if cleaned.ends_with('.') {
            cleaned.pop();
        }
        if cleaned.starts_with('.') {
            cleaned.insert(0, '0');
        }

        if cleaned.is_empty() {
            return Err(PriceParseError::Empty(raw.to_string()));
        }

        let price = Decimal::from_str(&cleaned)
            .map_err(|_| PriceParseError::InvalidNumber(raw.to_string()))?;

        if price <= Decimal::ZERO {
            return Err(PriceParseError::NonPositive(price));
        }

        Ok(price)
    }
}

impl Default for PriceParser {
    fn default() -> Self {
        Self::new()
    }
}
