//! Multi-valued metadata store
//!
//! `MetadataStore` maps string keys to ordered lists of string values. Keys are
//! unique and keep their insertion order so that encoding is deterministic.
//!
//! ## Text Format
//!
//! ```text
//! Content-Type=text/html
//! X-Tag=red
//! X-Tag=blue
//! X-Empty
//! ```
//!
//! - One line per `(key, value)` pair, each terminated by `\n`
//! - Multi-valued keys are written as repeated, contiguous key lines
//! - A key holding an empty value list is written alone, without `=`
//! - Escapes: `\\`, `\n`, `\r`, `\t`, `\0`, `\=` and `\u{HEX}` for any other
//!   control character. `=` is always escaped in keys, never in values.
//!
//! Decoding is strict: any malformed line fails with a [`MetadataError`].

use crate::error::{MetadataError, MetadataResult};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::io::{self, Read, Write};
use std::str::Chars;

/// Ordered mapping from key to an ordered list of values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawMetadataStore")]
pub struct MetadataStore {
    entries: Vec<(String, Vec<String>)>,
}

/// Serialized shape of a store; repeated keys are merged on conversion
#[derive(Deserialize)]
struct RawMetadataStore {
    entries: Vec<(String, Vec<String>)>,
}

impl From<RawMetadataStore> for MetadataStore {
    fn from(raw: RawMetadataStore) -> Self {
        let mut store = Self::new();
        for (key, values) in raw.entries {
            store.add_all(key, values);
        }
        store
    }
}

impl MetadataStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of values across all keys
    pub fn value_count(&self) -> usize {
        self.entries.iter().map(|(_, values)| values.len()).sum()
    }

    /// Whether `key` is present (possibly with no values)
    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// All values stored under `key`
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.position(key)
            .map(|idx| self.entries[idx].1.as_slice())
    }

    /// First value stored under `key`
    pub fn get_first(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Append a value to `key`, creating the key if needed
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values_mut(key.into()).push(value.into());
    }

    /// Append several values to `key`, creating the key even if `values` is empty
    pub fn add_all<I, V>(&mut self, key: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.values_mut(key.into())
            .extend(values.into_iter().map(Into::into));
    }

    /// Replace the values of `key`, returning the previous ones
    ///
    /// An existing key keeps its position.
    pub fn set<I, V>(&mut self, key: impl Into<String>, values: I) -> Option<Vec<String>>
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let key = key.into();
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        match self.position(&key) {
            Some(idx) => Some(std::mem::replace(&mut self.entries[idx].1, values)),
            None => {
                self.entries.push((key, values));
                None
            }
        }
    }

    /// Remove `key` and return its values
    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        let idx = self.position(key)?;
        Some(self.entries.remove(idx).1)
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// `(key, values)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }

    /// Encode the store to its text form
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (key, values) in &self.entries {
            if values.is_empty() {
                escape_into(&mut out, key, true);
                out.push('\n');
            }
            for value in values {
                escape_into(&mut out, key, true);
                out.push('=');
                escape_into(&mut out, value, false);
                out.push('\n');
            }
        }
        out
    }

    /// Write the text form to `writer`
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(self.to_text().as_bytes())
    }

    /// Decode a store from its text form
    pub fn from_text(text: &str) -> MetadataResult<Self> {
        let mut store = Self::new();
        if text.is_empty() {
            return Ok(store);
        }

        let body = text
            .strip_suffix('\n')
            .ok_or_else(|| MetadataError::UnterminatedLine {
                line: text.split('\n').count(),
            })?;

        for (idx, line) in body.split('\n').enumerate() {
            let (key, value) = parse_line(line, idx + 1)?;
            let values = store.values_mut(key);
            if let Some(value) = value {
                values.push(value);
            }
        }

        Ok(store)
    }

    /// Read and decode the text form from `reader`
    pub fn read_from<R: Read>(mut reader: R) -> MetadataResult<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let text = String::from_utf8(bytes)?;
        Self::from_text(&text)
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    fn values_mut(&mut self, key: String) -> &mut Vec<String> {
        let idx = match self.position(&key) {
            Some(idx) => idx,
            None => {
                self.entries.push((key, Vec::new()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx].1
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MetadataStore {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut store = Self::new();
        store.extend(iter);
        store
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for MetadataStore {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.add(key, value);
        }
    }
}

fn escape_into(out: &mut String, s: &str, is_key: bool) {
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            '=' if is_key => out.push_str("\\="),
            c if c.is_control() => {
                let _ = write!(out, "\\u{{{:x}}}", c as u32);
            }
            c => out.push(c),
        }
    }
}

/// Split one line into its key and optional value, resolving escapes
fn parse_line(line: &str, line_no: usize) -> MetadataResult<(String, Option<String>)> {
    let mut key = String::new();
    let mut value: Option<String> = None;
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        let decoded = match ch {
            '\\' => unescape(&mut chars, line_no)?,
            '=' if value.is_none() => {
                value = Some(String::new());
                continue;
            }
            c if c.is_control() => {
                return Err(MetadataError::ControlCharacter {
                    line: line_no,
                    code: c as u32,
                })
            }
            c => c,
        };
        match value.as_mut() {
            Some(value) => value.push(decoded),
            None => key.push(decoded),
        }
    }

    Ok((key, value))
}

fn unescape(chars: &mut Chars<'_>, line_no: usize) -> MetadataResult<char> {
    match chars.next() {
        None => Err(MetadataError::DanglingEscape { line: line_no }),
        Some('\\') => Ok('\\'),
        Some('n') => Ok('\n'),
        Some('r') => Ok('\r'),
        Some('t') => Ok('\t'),
        Some('0') => Ok('\0'),
        Some('=') => Ok('='),
        Some('u') => {
            if chars.next() != Some('{') {
                return Err(MetadataError::invalid_escape(line_no, "\\u"));
            }
            let mut hex = String::new();
            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(c) if c.is_ascii_hexdigit() && hex.len() < 6 => hex.push(c),
                    Some(c) => {
                        return Err(MetadataError::invalid_escape(
                            line_no,
                            format!("\\u{{{}{}", hex, c),
                        ))
                    }
                    None => {
                        return Err(MetadataError::invalid_escape(
                            line_no,
                            format!("\\u{{{}", hex),
                        ))
                    }
                }
            }
            u32::from_str_radix(&hex, 16)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| MetadataError::invalid_escape(line_no, format!("\\u{{{}}}", hex)))
        }
        Some(other) => Err(MetadataError::invalid_escape(
            line_no,
            format!("\\{}", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_store() -> MetadataStore {
        let mut store = MetadataStore::new();
        store.add("Content-Type", "text/html");
        store.add_all("X-Tag", ["red", "blue"]);
        store
    }

    #[test]
    fn test_multi_valued_keys() {
        let store = sample_store();
        assert_eq!(store.len(), 2);
        assert_eq!(store.value_count(), 3);
        assert_eq!(store.get("X-Tag").unwrap(), ["red", "blue"]);
        assert_eq!(store.get_first("Content-Type"), Some("text/html"));
        assert_eq!(store.get("missing"), None);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut store = MetadataStore::new();
        store.add("zeta", "1");
        store.add("alpha", "2");
        store.add("zeta", "3");
        let keys: Vec<&str> = store.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_set_keeps_position() {
        let mut store = sample_store();
        let previous = store.set("Content-Type", ["application/pdf"]);
        assert_eq!(previous, Some(vec!["text/html".to_string()]));
        assert_eq!(store.keys().next(), Some("Content-Type"));
        assert_eq!(store.set("new", Vec::<String>::new()), None);
        assert!(store.contains_key("new"));
    }

    #[test]
    fn test_remove() {
        let mut store = sample_store();
        assert_eq!(
            store.remove("X-Tag"),
            Some(vec!["red".to_string(), "blue".to_string()])
        );
        assert!(!store.contains_key("X-Tag"));
        assert_eq!(store.remove("X-Tag"), None);
    }

    #[test]
    fn test_text_is_deterministic() {
        let store = sample_store();
        assert_eq!(
            store.to_text(),
            "Content-Type=text/html\nX-Tag=red\nX-Tag=blue\n"
        );
        assert_eq!(store.to_text(), store.clone().to_text());
    }

    #[test]
    fn test_empty_store_encodes_to_empty_text() {
        let store = MetadataStore::new();
        assert_eq!(store.to_text(), "");
        assert_eq!(MetadataStore::from_text("").unwrap(), store);
    }

    #[test]
    fn test_escapes() {
        let mut store = MetadataStore::new();
        store.add("a=b", "x=y");
        store.add("line", "one\ntwo\r\tthree\0");
        store.add("slash", "c:\\dir");
        store.add("bell", "\u{7}");

        let text = store.to_text();
        assert_eq!(
            text,
            "a\\=b=x=y\nline=one\\ntwo\\r\\tthree\\0\nslash=c:\\\\dir\nbell=\\u{7}\n"
        );
        assert_eq!(MetadataStore::from_text(&text).unwrap(), store);
    }

    #[test]
    fn test_unicode_round_trip() {
        let mut store = MetadataStore::new();
        store.add("título", "café ☕");
        store.add("日本語", "値");
        store.add("emoji", "🦀\u{200b}");
        let decoded = MetadataStore::from_text(&store.to_text()).unwrap();
        assert_eq!(decoded, store);
    }

    #[test]
    fn test_empty_value_list_and_empty_value() {
        let mut store = MetadataStore::new();
        store.add_all("no-values", Vec::<String>::new());
        store.add("empty-value", "");
        store.add_all("", Vec::<String>::new());

        let text = store.to_text();
        assert_eq!(text, "no-values\nempty-value=\n\n");

        let decoded = MetadataStore::from_text(&text).unwrap();
        assert_eq!(decoded, store);
        assert_eq!(decoded.get("no-values").unwrap().len(), 0);
        assert_eq!(decoded.get_first("empty-value"), Some(""));
    }

    #[test]
    fn test_rejects_unterminated_line() {
        let err = MetadataStore::from_text("a=1\nb=2").unwrap_err();
        assert!(matches!(err, MetadataError::UnterminatedLine { line: 2 }));
    }

    #[test]
    fn test_rejects_raw_control_character() {
        let err = MetadataStore::from_text("a=1\r\n").unwrap_err();
        assert!(matches!(
            err,
            MetadataError::ControlCharacter { line: 1, code: 0x0D }
        ));
    }

    #[test]
    fn test_rejects_bad_escapes() {
        assert!(matches!(
            MetadataStore::from_text("a=\\q\n").unwrap_err(),
            MetadataError::InvalidEscape { line: 1, .. }
        ));
        assert!(matches!(
            MetadataStore::from_text("ok=1\na=b\\\n").unwrap_err(),
            MetadataError::DanglingEscape { line: 2 }
        ));
        assert!(matches!(
            MetadataStore::from_text("a=\\u{110000}\n").unwrap_err(),
            MetadataError::InvalidEscape { .. }
        ));
        assert!(matches!(
            MetadataStore::from_text("a=\\u{}\n").unwrap_err(),
            MetadataError::InvalidEscape { .. }
        ));
        assert!(matches!(
            MetadataStore::from_text("a=\\u41\n").unwrap_err(),
            MetadataError::InvalidEscape { .. }
        ));
    }

    #[test]
    fn test_read_from_rejects_invalid_utf8() {
        let err = MetadataStore::read_from(&[b'a', b'=', 0xFF, b'\n'][..]).unwrap_err();
        assert!(matches!(err, MetadataError::InvalidUtf8(_)));
    }

    #[test]
    fn test_write_to_and_read_from() {
        let store = sample_store();
        let mut buf = Vec::new();
        store.write_to(&mut buf).unwrap();
        let decoded = MetadataStore::read_from(&buf[..]).unwrap();
        assert_eq!(decoded, store);
    }

    #[test]
    fn test_from_iterator_groups_values() {
        let store: MetadataStore = vec![("k", "1"), ("j", "2"), ("k", "3")]
            .into_iter()
            .collect();
        assert_eq!(store.get("k").unwrap(), ["1", "3"]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_serde_json() {
        let store = sample_store();
        let json = serde_json::to_string(&store).unwrap();
        let parsed: MetadataStore = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, store);
    }

    #[test]
    fn test_deserialize_merges_repeated_keys() {
        let store: MetadataStore =
            serde_json::from_str(r#"{"entries":[["a",[]],["b",["y"]],["a",["x"]]]}"#).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("a").unwrap(), ["x"]);
        assert_eq!(store.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(MetadataStore::from_text(&store.to_text()).unwrap(), store);
    }

    proptest! {
        #[test]
        fn prop_text_round_trip(
            pairs in proptest::collection::vec(
                (any::<String>(), proptest::collection::vec(any::<String>(), 0..4)),
                0..8,
            )
        ) {
            let mut store = MetadataStore::new();
            for (key, values) in pairs {
                store.add_all(key, values);
            }
            let decoded = MetadataStore::from_text(&store.to_text()).unwrap();
            prop_assert_eq!(decoded, store);
        }
    }
}
