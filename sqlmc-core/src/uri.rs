//! Connection URI parsing.
//!
//! Accepts plain paths (`data.db`, `:memory:`) and `SQLite` file URIs
//! (`file:data.db`, `file:///abs/data.db`, `file://localhost/abs/data.db`).
//! Either form may carry a `?key=value&...` query whose keys and values are
//! percent-decoded. A `file:` URI also drops its `#fragment` and has its path
//! percent-decoded. A plain path is taken literally, so `100%25.db` and
//! `a#b.db` name exactly those files.

use crate::error::{Error, Result};

/// Path of the private in-memory database.
pub const MEMORY_PATH: &str = ":memory:";

/// A parsed connection URI (without any driver scheme prefix).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionUri {
    /// Decoded database path.
    pub path: String,
    /// Decoded query parameters, in the order they appear.
    pub params: Vec<(String, String)>,
}

impl ConnectionUri {
    /// Parses `uri`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUri`] for an authority other than empty or
    /// `localhost`, or an empty path.
    pub fn parse(uri: &str) -> Result<Self> {
        let (path, query) = match uri.strip_prefix("file:") {
            Some(rest) => {
                let (rest, _) = rest.split_once('#').unwrap_or((rest, ""));
                let (target, query) = rest.split_once('?').unwrap_or((rest, ""));
                (Self::file_path(target)?, query)
            }
            None => {
                let (target, query) = uri.split_once('?').unwrap_or((uri, ""));
                (target.to_owned(), query)
            }
        };
        if path.is_empty() {
            return Err(Error::InvalidUri("missing database path".to_owned()));
        }

        let params = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode_percent(key), decode_percent(value))
            })
            .collect();

        Ok(Self { path, params })
    }

    fn file_path(rest: &str) -> Result<String> {
        let Some(after_slashes) = rest.strip_prefix("//") else {
            return Ok(decode_percent(rest));
        };
        let (authority, path) = after_slashes
            .split_once('/')
            .unwrap_or((after_slashes, ""));
        if !(authority.is_empty() || authority == "localhost") {
            return Err(Error::InvalidUri(format!(
                "authority {authority:?} is not allowed, only empty or localhost"
            )));
        }
        if path.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("/{}", decode_percent(path)))
    }

    /// Whether the URI names the private in-memory database.
    #[must_use]
    pub fn is_memory(&self) -> bool {
        self.path == MEMORY_PATH
    }

    /// Value of the last occurrence of `key`, if any.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Decodes `%XX` escapes. Malformed escapes are kept literally.
#[must_use]
pub fn decode_percent(input: &str) -> String {
    if !input.contains('%') {
        return input.to_owned();
    }
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).copied().and_then(hex_digit),
                bytes.get(i + 2).copied().and_then(hex_digit),
            ) {
                decoded.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

const fn hex_digit(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("data.db", "data.db")]
    #[test_case(":memory:", ":memory:")]
    #[test_case("file:data.db", "data.db")]
    #[test_case("file:///tmp/my%20db.sqlite", "/tmp/my db.sqlite")]
    #[test_case("file://localhost/tmp/x.db", "/tmp/x.db")]
    #[test_case("file:x.db#frag", "x.db")]
    #[test_case("/tmp/100%25.db", "/tmp/100%25.db")]
    #[test_case("a#b.db", "a#b.db")]
    #[test_case("my%20db.sqlite?cache=shared", "my%20db.sqlite")]
    fn test_paths(uri: &str, expected: &str) {
        assert_eq!(ConnectionUri::parse(uri).expect("parse").path, expected);
    }

    #[test]
    fn test_query_params_decoded_in_order() {
        let uri = ConnectionUri::parse("file:x.db?busy_timeout=1800000&cache=shared&note=a%26b")
            .expect("parse");
        assert_eq!(
            uri.params,
            [
                ("busy_timeout".to_owned(), "1800000".to_owned()),
                ("cache".to_owned(), "shared".to_owned()),
                ("note".to_owned(), "a&b".to_owned()),
            ]
        );
    }

    #[test]
    fn test_plain_path_with_query() {
        let uri = ConnectionUri::parse("x.db?journal_mode=wal&journal_mode=off").expect("parse");
        assert_eq!(uri.path, "x.db");
        assert_eq!(uri.param("journal_mode"), Some("off"));
    }

    #[test]
    fn test_bad_authority() {
        assert!(matches!(
            ConnectionUri::parse("file://example.com/x.db"),
            Err(Error::InvalidUri(_))
        ));
        assert!(ConnectionUri::parse("file:?cache=shared").is_err());
    }

    #[test]
    fn test_decode_percent_keeps_malformed_escapes() {
        assert_eq!(decode_percent("uies%63"), "uiesc");
        assert_eq!(decode_percent("100%"), "100%");
        assert_eq!(decode_percent("%zz%4"), "%zz%4");
    }
}
