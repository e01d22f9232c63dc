//! Public form code.
//!
//! A form code is the short decimal string merchants paste into the theme
//! block. It is the only identifier the storefront ever sees.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`FormCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FormCodeError {
    /// The input string is empty (after trimming).
    #[error("form code cannot be empty")]
    Empty,
    /// The input contains something other than ASCII digits.
    #[error("form code must contain only digits")]
    NonDigit,
    /// The input is shorter or longer than a generated code can be.
    #[error("form code must be {min}-{max} digits long")]
    Length {
        /// Minimum number of digits.
        min: usize,
        /// Maximum number of digits.
        max: usize,
    },
}

/// A form's public code, e.g. `48213`.
///
/// Generated codes are 5 digits, widening to 6 once the 5-digit space is
/// crowded, so anything outside 5-6 ASCII digits cannot name a form.
///
/// ```
/// use shopiform_core::FormCode;
///
/// let code = FormCode::parse(" 48213 ").unwrap();
/// assert_eq!(code.as_str(), "48213");
///
/// assert!(FormCode::parse("123").is_err());
/// assert!(FormCode::parse("12a45").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FormCode(String);

impl FormCode {
    /// Fewest digits a code can have.
    pub const MIN_LEN: usize = 5;
    /// Most digits a code can have.
    pub const MAX_LEN: usize = 6;

    /// Parse a `FormCode` from user input.
    ///
    /// # Errors
    ///
    /// Returns a [`FormCodeError`] if the trimmed input is empty, contains a
    /// non-digit, or has the wrong length.
    pub fn parse(s: &str) -> Result<Self, FormCodeError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(FormCodeError::Empty);
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FormCodeError::NonDigit);
        }
        if !(Self::MIN_LEN..=Self::MAX_LEN).contains(&s.len()) {
            return Err(FormCodeError::Length {
                min: Self::MIN_LEN,
                max: Self::MAX_LEN,
            });
        }
        Ok(Self(s.to_owned()))
    }

    /// Build a code from a generated number.
    ///
    /// # Errors
    ///
    /// Returns [`FormCodeError::Length`] if the number does not have 5 or 6 digits.
    pub fn from_number(n: u32) -> Result<Self, FormCodeError> {
        Self::parse(&n.to_string())
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the code and returns the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for FormCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for FormCode {
    type Err = FormCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FormCode {
    type Error = FormCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FormCode> for String {
    fn from(code: FormCode) -> Self {
        code.0
    }
}

impl AsRef<str> for FormCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for FormCode {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for FormCode {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::parse(&s)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for FormCode {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_five_and_six_digits() {
        assert_eq!(FormCode::parse("10000").unwrap().as_str(), "10000");
        assert_eq!(FormCode::parse("999999").unwrap().as_str(), "999999");
    }

    #[test]
    fn test_parse_trims() {
        assert_eq!(FormCode::parse(" 48213\n").unwrap().as_str(), "48213");
    }

    #[test]
    fn test_parse_rejects() {
        assert_eq!(FormCode::parse(""), Err(FormCodeError::Empty));
        assert_eq!(FormCode::parse("  "), Err(FormCodeError::Empty));
        assert_eq!(FormCode::parse("12a45"), Err(FormCodeError::NonDigit));
        assert_eq!(FormCode::parse("-1234"), Err(FormCodeError::NonDigit));
        assert!(matches!(
            FormCode::parse("1234"),
            Err(FormCodeError::Length { .. })
        ));
        assert!(matches!(
            FormCode::parse("1234567"),
            Err(FormCodeError::Length { .. })
        ));
    }

    #[test]
    fn test_from_number() {
        assert_eq!(FormCode::from_number(54321).unwrap().as_str(), "54321");
        assert!(FormCode::from_number(9999).is_err());
        assert!(FormCode::from_number(1_000_000).is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let code = FormCode::parse("48213").unwrap();
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"48213\"");

        let back: FormCode = serde_json::from_str("\"48213\"").unwrap();
        assert_eq!(back, code);
        assert!(serde_json::from_str::<FormCode>("\"abc\"").is_err());
    }
}
