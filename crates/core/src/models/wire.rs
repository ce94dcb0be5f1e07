//! Serde helpers for loosely-typed remote columns.

use serde::{Deserialize, Deserializer};

/// Treat an explicit `null` like a missing field.
///
/// # Errors
///
/// Propagates errors for values of the wrong type.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode optional text, mapping `null` and blank strings to `None`.
///
/// The admin flow historically stored `""` for "no video" and "no type".
///
/// # Errors
///
/// Propagates errors for non-string values.
pub fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Row {
        #[serde(default, deserialize_with = "null_as_default")]
        tags: Vec<String>,
        #[serde(default, deserialize_with = "blank_as_none")]
        video: Option<String>,
    }

    #[test]
    fn test_null_and_blank_columns() {
        let row: Row = serde_json::from_str(r#"{"tags": null, "video": "  "}"#).unwrap();
        assert!(row.tags.is_empty());
        assert!(row.video.is_none());

        let row: Row = serde_json::from_str("{}").unwrap();
        assert!(row.tags.is_empty());
        assert!(row.video.is_none());

        let row: Row = serde_json::from_str(r#"{"tags": ["a"], "video": "v.mp4"}"#).unwrap();
        assert_eq!(row.tags, vec!["a"]);
        assert_eq!(row.video.as_deref(), Some("v.mp4"));
    }
}
