//! Input validation shared by entities and queries
//!
//! The store accepts the following in metric names, tag keys and tag values:
//!
//! - ASCII letters `a-z`, `A-Z` and digits `0-9`
//! - the punctuation `-`, `_`, `.` and `/`
//! - Unicode letters of general category `Lu` or `Ll`
//!
//! Strings are case sensitive and spaces are never allowed.
//!
//! ```
//! use opentsdb_client::validation::is_valid_identifier_string;
//!
//! assert!(is_valid_identifier_string("sys.cpu.user"));
//! assert!(is_valid_identifier_string("température/Zürich"));
//! assert!(!is_valid_identifier_string("sys cpu"));
//! assert!(!is_valid_identifier_string("sys.cpu.*"));
//! ```

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Relative time: `<amount><unit>-ago`, e.g. `1h-ago`, `30m-ago`
    static ref RELATIVE_TIME: Regex =
        Regex::new(r"^[0-9]+(ms|s|m|h|d|w|n|y)-ago$").expect("relative time pattern is valid");

    /// Absolute date: `yyyy/MM/dd`, optionally followed by `-HH:mm` or
    /// ` HH:mm` and `:ss`
    static ref ABSOLUTE_DATE: Regex =
        Regex::new(r"^[0-9]{4}/[0-9]{2}/[0-9]{2}([- ][0-9]{2}:[0-9]{2}(:[0-9]{2})?)?$")
            .expect("absolute date pattern is valid");

    /// Seconds or milliseconds since the epoch, as text
    static ref EPOCH_TIME: Regex =
        Regex::new(r"^[0-9]{1,13}$").expect("epoch time pattern is valid");

    /// Non-ASCII characters allowed in names: general categories Lu and Ll
    static ref CASED_LETTER: Regex =
        Regex::new(r"^[\p{Lu}\p{Ll}]$").expect("cased letter pattern is valid");
}

/// Check a metric name, tag key or tag value against the store's character set
///
/// Returns `false` if any character is outside `[A-Za-z0-9-_./]` and is not
/// a Unicode letter of general category `Lu` or `Ll`. The empty string passes; callers
/// that need a non-empty name check that separately.
pub fn is_valid_identifier_string(s: &str) -> bool {
    s.chars().all(is_allowed_char)
}

fn is_allowed_char(c: char) -> bool {
    if c.is_ascii() {
        return c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/');
    }
    let mut buf = [0u8; 4];
    CASED_LETTER.is_match(c.encode_utf8(&mut buf))
}

/// Non-empty and valid per [`is_valid_identifier_string`]
pub fn is_valid_name(s: &str) -> bool {
    !s.is_empty() && is_valid_identifier_string(s)
}

/// Check that a string is a hexadecimal identifier (UID or TSUID)
pub fn is_hex_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Check that a string is a plain alphanumeric token
///
/// Expression-query ids become variable names in the expression grammar,
/// so punctuation and spaces are rejected.
pub fn is_plain_token(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Check a time string
///
/// Accepts relative (`1h-ago`), absolute (`2013/01/01-12:00` or
/// `2013/01/01 12:00`) and epoch (`1356998400`) forms.
pub fn is_time_string(s: &str) -> bool {
    RELATIVE_TIME.is_match(s) || ABSOLUTE_DATE.is_match(s) || EPOCH_TIME.is_match(s)
}

/// Number of decimal digits a timestamp may have on the wire
pub const MAX_TIMESTAMP_DIGITS: usize = 13;

/// Check a data point timestamp
///
/// Timestamps are seconds or milliseconds since the epoch, must be
/// non-negative and at most 13 decimal digits long.
pub fn is_valid_timestamp(timestamp: i64) -> bool {
    timestamp >= 0 && timestamp.to_string().len() <= MAX_TIMESTAMP_DIGITS
}
