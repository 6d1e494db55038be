use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::ops::Deref;

use crate::util;

/// Number of decimal places used when encoding a [`FixedFloat`].
pub const FIXED_DIGITS: usize = 2;

/// An `f64` which is encoded as a fixed-point string with two decimal places, for
/// example `"30.00"`.
///
/// Decodes from either a string or a number, so previously written summaries can be
/// read back.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct FixedFloat(pub f64);

impl Deref for FixedFloat {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<f64> for FixedFloat {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl Display for FixedFloat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.pad(&util::to_fixed(self.0, FIXED_DIGITS))
    }
}

impl Serialize for FixedFloat {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&util::to_fixed(self.0, FIXED_DIGITS))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(f64),
}

impl<'de> Deserialize<'de> for FixedFloat {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match StringOrNumber::deserialize(deserializer)? {
            StringOrNumber::Number(value) => Ok(Self(value)),
            StringOrNumber::String(value) => value
                .trim()
                .parse::<f64>()
                .map(Self)
                .map_err(serde::de::Error::custom),
        }
    }
}
