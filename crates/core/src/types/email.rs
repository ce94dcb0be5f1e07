//! Customer email address.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Reasons an email address is rejected at checkout.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("email cannot be empty")]
    Empty,
    #[error("email must be at most {max} characters")]
    TooLong { max: usize },
    #[error("email must contain exactly one @ symbol")]
    AtSymbol,
    #[error("email needs text on both sides of the @")]
    MissingPart,
    #[error("email cannot contain whitespace")]
    Whitespace,
}

/// A structurally valid email address.
///
/// Checks are intentionally shallow: one `@`, non-empty local part and
/// domain, no whitespace, at most 254 characters. Surrounding whitespace is
/// trimmed before validation.
///
/// ```
/// use elvora_core::Email;
///
/// assert!(Email::parse("client@elvora.ma").is_ok());
/// assert!(Email::parse(" client@elvora.ma ").is_ok());
/// assert!(Email::parse("client@").is_err());
/// assert!(Email::parse("a@b@c").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Maximum length of an email address (RFC 5321).
    pub const MAX_LENGTH: usize = 254;

    /// Parse an `Email` from user input.
    ///
    /// # Errors
    ///
    /// Returns an [`EmailError`] describing the first violated rule.
    pub fn parse(input: &str) -> Result<Self, EmailError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(EmailError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if s.chars().any(char::is_whitespace) {
            return Err(EmailError::Whitespace);
        }

        let (local, domain) = s.split_once('@').ok_or(EmailError::AtSymbol)?;
        if domain.contains('@') {
            return Err(EmailError::AtSymbol);
        }
        if local.is_empty() || domain.is_empty() {
            return Err(EmailError::MissingPart);
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections() {
        assert_eq!(Email::parse("   "), Err(EmailError::Empty));
        assert_eq!(Email::parse("no-at"), Err(EmailError::AtSymbol));
        assert_eq!(Email::parse("@elvora.ma"), Err(EmailError::MissingPart));
        assert_eq!(Email::parse("a b@elvora.ma"), Err(EmailError::Whitespace));
        let long = format!("{}@x.ma", "a".repeat(260));
        assert!(matches!(Email::parse(&long), Err(EmailError::TooLong { .. })));
    }

    #[test]
    fn test_trims_input() {
        let email = Email::parse("  hello@elvora.ma\n").ok();
        assert_eq!(email.as_ref().map(Email::as_str), Some("hello@elvora.ma"));
    }
}
