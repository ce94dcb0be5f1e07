//! Newtype identifiers for remote records.
//!
//! The hosted tables hand out identifiers that are sometimes numbers and
//! sometimes strings, depending on the column type and on who wrote the row.
//! `define_id!` wrappers accept both on decode and compare as strings, so
//! `ProductId` built from the number `1` equals a lookup for `"1"`.

use serde::{Deserialize, Deserializer, Serializer};

/// Macro to define a type-safe record identifier.
///
/// Creates a newtype wrapper around `String` with:
/// - lenient `Deserialize` (JSON number or string)
/// - `Serialize` that writes integers back as JSON numbers
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `Display`
/// - `From<i64>`, `From<&str>` and `From<String>`
///
/// # Example
///
/// ```rust
/// # use elvora_core::define_id;
/// define_id!(ShelfId);
///
/// let from_number = ShelfId::from(7);
/// assert!(from_number.matches("7"));
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            /// Create an identifier from its textual form.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Compare against an identifier received as text.
            #[must_use]
            pub fn matches(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id.to_string())
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                $crate::types::id::serialize_key(&self.0, serializer)
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D: ::serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                $crate::types::id::deserialize_key(deserializer).map(Self)
            }
        }
    };
}

define_id!(ProductId);
define_id!(OrderId);

/// Decode an identifier from a JSON number or string.
///
/// # Errors
///
/// Returns an error if the value is neither a number nor a string.
#[doc(hidden)]
pub fn deserialize_key<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawKey {
        Signed(i64),
        Unsigned(u64),
        Text(String),
    }

    Ok(match RawKey::deserialize(deserializer)? {
        RawKey::Signed(n) => n.to_string(),
        RawKey::Unsigned(n) => n.to_string(),
        RawKey::Text(s) => s,
    })
}

/// Encode an identifier, writing canonical integers as JSON numbers.
///
/// # Errors
///
/// Propagates serializer errors.
#[doc(hidden)]
pub fn serialize_key<S: Serializer>(key: &str, serializer: S) -> Result<S::Ok, S::Error> {
    match key.parse::<i64>() {
        Ok(n) if n.to_string() == key => serializer.serialize_i64(n),
        _ => serializer.serialize_str(key),
    }
}

/// Extract the `id` column of a raw record as text.
#[must_use]
pub fn record_key(record: &serde_json::Value) -> Option<String> {
    match record.get("id")? {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Human-facing order number, distinct from the record identifier.
///
/// Numbers are assigned client-side as "highest existing + 1", starting at
/// [`OrderNumber::BASE`] for an empty store.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    ::serde::Serialize,
    ::serde::Deserialize,
)]
#[serde(transparent)]
pub struct OrderNumber(i64);

impl OrderNumber {
    /// The number given to the first order ever placed.
    pub const BASE: Self = Self(100);

    /// Create an order number.
    #[must_use]
    pub const fn new(n: i64) -> Self {
        Self(n)
    }

    /// Get the underlying value.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// The number following the current highest one, or [`Self::BASE`].
    #[must_use]
    pub const fn next_after(highest: Option<Self>) -> Self {
        match highest {
            Some(Self(n)) => Self(n + 1),
            None => Self::BASE,
        }
    }
}

impl core::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_and_text_ids_compare_as_strings() {
        let numeric: ProductId = serde_json::from_str("1").unwrap();
        let text: ProductId = serde_json::from_str("\"1\"").unwrap();
        assert_eq!(numeric, text);
        assert!(numeric.matches("1"));
    }

    #[test]
    fn test_integer_ids_serialize_as_numbers() {
        assert_eq!(serde_json::to_string(&ProductId::from(42)).unwrap(), "42");
        assert_eq!(
            serde_json::to_string(&OrderId::from("a1b2")).unwrap(),
            "\"a1b2\""
        );
        // Leading zeros are not canonical integers and stay textual
        assert_eq!(serde_json::to_string(&OrderId::from("007")).unwrap(), "\"007\"");
    }

    #[test]
    fn test_record_key() {
        assert_eq!(
            record_key(&serde_json::json!({"id": 5})),
            Some("5".to_string())
        );
        assert_eq!(
            record_key(&serde_json::json!({"id": "uuid-1"})),
            Some("uuid-1".to_string())
        );
        assert_eq!(record_key(&serde_json::json!({"name": "x"})), None);
    }

    #[test]
    fn test_order_number_next() {
        assert_eq!(OrderNumber::next_after(None), OrderNumber::BASE);
        assert_eq!(
            OrderNumber::next_after(Some(OrderNumber::new(141))),
            OrderNumber::new(142)
        );
    }
}
