//! Serde adapters for byte fields that travel as hex strings.
//!
//! Use with `#[serde(with = "crate::encoding::hex_bytes")]` on `Vec<u8>` or
//! fixed-size arrays, and `hex_bytes_opt` on their `Option` counterparts.

use serde::{Deserialize, Deserializer, Serializer};

fn decode<T, E>(s: &str) -> Result<T, E>
where
    T: TryFrom<Vec<u8>>,
    E: serde::de::Error,
{
    let bytes = hex::decode(s).map_err(E::custom)?;
    let len = bytes.len();
    T::try_from(bytes).map_err(|_| E::custom(format!("unexpected byte length {len}")))
}

pub mod hex_bytes {
    use super::*;

    pub fn serialize<T, S>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: AsRef<[u8]>,
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: TryFrom<Vec<u8>>,
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        decode(&s)
    }
}

pub mod hex_bytes_opt {
    use super::*;

    pub fn serialize<T, S>(bytes: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: AsRef<[u8]>,
        S: Serializer,
    {
        match bytes {
            Some(b) => serializer.serialize_some(&hex::encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: TryFrom<Vec<u8>>,
        D: Deserializer<'de>,
    {
        let s: Option<String> = Option::deserialize(deserializer)?;
        s.map(|s| decode(&s)).transpose()
    }
}
