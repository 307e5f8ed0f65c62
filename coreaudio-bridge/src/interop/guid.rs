//! 128-bit interface and class identifiers.
//!
//! [`GUID`] itself comes from `windows-core`. This module adds the
//! non-panicking registry-format parser and the braced rendering used in
//! logs and diagnostics.

use std::fmt;
use thiserror::Error;
pub use windows_core::GUID;

/// Error returned when a string is not a registry-format GUID.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid GUID string: {input:?}")]
pub struct GuidParseError {
    pub input: String,
}

/// Parse `XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX`, optionally wrapped in braces.
///
/// `GUID::from(&str)` panics on malformed input; this reports it instead.
pub fn parse_guid(s: &str) -> Result<GUID, GuidParseError> {
    let err = || GuidParseError {
        input: s.to_string(),
    };

    let body = match s.strip_prefix('{') {
        Some(rest) => rest.strip_suffix('}').ok_or_else(err)?,
        None => s,
    };

    let groups: Vec<&str> = body.split('-').collect();
    let lengths = [8, 4, 4, 4, 12];
    if groups.len() != lengths.len()
        || groups
            .iter()
            .zip(lengths)
            .any(|(g, len)| g.len() != len || !g.bytes().all(|b| b.is_ascii_hexdigit()))
    {
        return Err(err());
    }

    let value = u128::from_str_radix(&groups.concat(), 16).map_err(|_| err())?;
    Ok(GUID::from_u128(value))
}

/// Displays a GUID in registry format, `{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}`.
#[derive(Clone, Copy)]
pub struct Braced<'a>(pub &'a GUID);

impl fmt::Display for Braced<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{:?}}}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const VOLUME_IID: GUID = GUID::from_u128(0x5CDF2C82_841E_4546_9722_0CF74078229A);

    #[test]
    fn test_braced_and_parse() {
        let text = Braced(&VOLUME_IID).to_string();
        assert_eq!(text, "{5CDF2C82-841E-4546-9722-0CF74078229A}");
        assert_eq!(parse_guid(&text).unwrap(), VOLUME_IID);
        assert_eq!(parse_guid("5cdf2c82-841e-4546-9722-0cf74078229a").unwrap(), VOLUME_IID);
    }

    #[test]
    fn test_parse_agrees_with_windows_core() {
        let text = "870AF99C-171D-4F9E-AF0D-E63DF40C2BC9";
        assert_eq!(parse_guid(text).unwrap(), GUID::from(text));
    }

    #[rstest]
    #[case("")]
    #[case("{5CDF2C82-841E-4546-9722-0CF74078229A")]
    #[case("5CDF2C82841E454697220CF74078229A")]
    #[case("5CDF2C82-841E-4546-9722-0CF74078229G")]
    #[case("+CDF2C82-841E-4546-9722-0CF74078229A")]
    fn test_parse_rejects_malformed(#[case] input: &str) {
        assert_eq!(
            parse_guid(input),
            Err(GuidParseError {
                input: input.to_string()
            })
        );
    }
}
