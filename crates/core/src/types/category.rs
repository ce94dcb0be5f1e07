//! Product categories.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sentinel used by browsing views to mean "every category".
pub const ALL_CATEGORIES: &str = "All";

/// Unknown category name.
#[derive(Debug, Clone, Error)]
#[error("unknown category: {0}")]
pub struct CategoryError(pub String);

/// Department a product is shelved under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Men,
    Women,
    Kids,
}

impl Category {
    /// Every category, in display order.
    pub const ALL: [Self; 3] = [Self::Men, Self::Women, Self::Kids];

    /// Stored name of the category.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Men => "Men",
            Self::Women => "Women",
            Self::Kids => "Kids",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = CategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CategoryError(s.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("women".parse::<Category>().unwrap(), Category::Women);
        assert_eq!("Kids".parse::<Category>().unwrap(), Category::Kids);
        assert!("Unisex".parse::<Category>().is_err());
    }
}
