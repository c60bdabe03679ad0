//! Decimal amounts (prices, rates, fees).
//!
//! They are persisted as TEXT and are always handed out as plain numbers.
//! [`encode_decimal`] and [`decode_decimal`] are the only conversions between the two.

use std::fmt::{Display, Formatter};
use anyhow::anyhow;
use crate::impl_sqlx_text_type_encode_decode;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(PartialEq, PartialOrd, Default, Debug, Clone, Copy)]
pub struct Decimal(pub f64);

pub fn encode_decimal(value: f64) -> String {
    // shortest representation that parses back to the same f64
    format!("{value}")
}
pub fn decode_decimal(text: &str) -> anyhow::Result<f64> {
    let value = text.trim().parse::<f64>()
        .map_err(|e| anyhow!("Invalid decimal '{text}': {e}"))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(anyhow!("Invalid decimal '{text}': not a finite number"))
    }
}

impl Decimal {
    pub fn value(self) -> f64 {
        self.0
    }
}
impl From<f64> for Decimal {
    fn from(value: f64) -> Self {
        Self(value)
    }
}
impl Display for Decimal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&encode_decimal(self.0))
    }
}
impl std::str::FromStr for Decimal {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_decimal(s).map(Decimal)
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0)
    }
}
impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // clients send both 12.5 and "12.50"
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(f64),
            Text(String),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Number(n) if n.is_finite() => Ok(Decimal(n)),
            Repr::Number(n) => Err(serde::de::Error::custom(format!("Invalid decimal {n}"))),
            Repr::Text(s) => decode_decimal(&s).map(Decimal).map_err(serde::de::Error::custom),
        }
    }
}

impl_sqlx_text_type_encode_decode!(Decimal);
