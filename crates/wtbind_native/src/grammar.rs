//! Configuration string grammar.
//!
//! The engine is configured with flat strings of comma separated pairs:
//!
//! ```text
//! create,cache_size=100MB,log=(enabled,compressor=snappy),error_prefix="a \"b\""
//! ```
//!
//! - a bare key means `key=true`
//! - values are bare tokens, integers with an optional size suffix, double
//!   quoted strings with backslash escapes, or parenthesised nested lists
//! - a quoted value may itself hold a nested list and is re-parsed on demand

use crate::error::{GrammarError, GrammarResult};

/// A single configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigItem {
    /// `true`/`false`, or a bare key without a value.
    Bool(bool),
    /// An integer, with any size suffix already applied.
    Int(i64),
    /// A bare, unquoted token.
    Token(String),
    /// A double-quoted string, unescaped.
    Str(String),
    /// A parenthesised nested list.
    Nested(ParsedConfig),
}

/// A parsed configuration string: ordered `key -> value` pairs.
///
/// When a key repeats, the last occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedConfig {
    entries: Vec<(String, ConfigItem)>,
}

impl ParsedConfig {
    /// Parses a configuration string. `None` and the empty string both
    /// parse to an empty configuration.
    pub fn parse(input: Option<&str>) -> GrammarResult<Self> {
        match input {
            None => Ok(Self::default()),
            Some(s) => Parser::new(s).parse_top(),
        }
    }

    /// Returns the number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the pairs in input order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigItem)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates over the keys in input order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Looks up the value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ConfigItem> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Rejects any key not listed in `allowed`.
    pub fn check_allowed(&self, allowed: &[&str]) -> GrammarResult<()> {
        match self.keys().find(|k| !allowed.contains(k)) {
            Some(key) => Err(GrammarError::UnknownKey(key.to_string())),
            None => Ok(()),
        }
    }

    /// Reads a boolean. Integers `0` and `1` are accepted.
    pub fn get_bool(&self, key: &str) -> GrammarResult<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(ConfigItem::Bool(b)) => Ok(Some(*b)),
            Some(ConfigItem::Int(0)) => Ok(Some(false)),
            Some(ConfigItem::Int(1)) => Ok(Some(true)),
            Some(_) => Err(GrammarError::invalid_value(key, "expected a boolean")),
        }
    }

    /// Reads an integer.
    pub fn get_int(&self, key: &str) -> GrammarResult<Option<i64>> {
        match self.get(key) {
            None => Ok(None),
            Some(ConfigItem::Int(n)) => Ok(Some(*n)),
            Some(_) => Err(GrammarError::invalid_value(key, "expected an integer")),
        }
    }

    /// Reads a string, quoted or bare.
    pub fn get_str(&self, key: &str) -> GrammarResult<Option<&str>> {
        match self.get(key) {
            None => Ok(None),
            Some(ConfigItem::Str(s) | ConfigItem::Token(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(GrammarError::invalid_value(key, "expected a string")),
        }
    }

    /// Reads a nested list. A quoted string is parsed as one, with or
    /// without its own parentheses, and a lone boolean is read as a list
    /// holding just `enabled`.
    pub fn get_nested(&self, key: &str) -> GrammarResult<Option<ParsedConfig>> {
        match self.get(key) {
            None => Ok(None),
            Some(ConfigItem::Nested(c)) => Ok(Some(c.clone())),
            Some(ConfigItem::Str(s) | ConfigItem::Token(s)) => {
                Parser::new(s).parse_embedded().map(Some)
            }
            Some(ConfigItem::Bool(b)) => Ok(Some(ParsedConfig {
                entries: vec![("enabled".to_string(), ConfigItem::Bool(*b))],
            })),
            Some(ConfigItem::Int(_)) => {
                Err(GrammarError::invalid_value(key, "expected a nested list"))
            }
        }
    }
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
        }
    }

    fn parse_top(mut self) -> GrammarResult<ParsedConfig> {
        let config = self.parse_list(None)?;
        self.skip_ws();
        if let Some(&c) = self.src.get(self.pos) {
            return Err(GrammarError::Unexpected {
                found: c as char,
                offset: self.pos,
            });
        }
        Ok(config)
    }

    /// Parses the text of a quoted nested value: either `a,b=1` or
    /// `(a,b=1)`.
    fn parse_embedded(mut self) -> GrammarResult<ParsedConfig> {
        self.skip_ws();
        if self.peek() != Some(b'(') {
            return self.parse_top();
        }
        let ConfigItem::Nested(config) = self.parse_value()? else {
            return Err(GrammarError::UnexpectedEnd);
        };
        self.skip_ws();
        match self.peek() {
            None => Ok(config),
            Some(c) => Err(GrammarError::Unexpected {
                found: c as char,
                offset: self.pos,
            }),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn parse_list(&mut self, close: Option<u8>) -> GrammarResult<ParsedConfig> {
        let mut entries = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None => break,
                Some(c) if Some(c) == close => break,
                Some(b',') => {
                    self.pos += 1;
                    continue;
                }
                _ => {}
            }

            let key = match self.peek() {
                Some(b'"') => self.parse_quoted()?,
                _ => self.parse_bare()?,
            };
            self.skip_ws();
            let value = if self.peek() == Some(b'=') {
                self.pos += 1;
                self.skip_ws();
                self.parse_value()?
            } else {
                ConfigItem::Bool(true)
            };
            entries.push((key, value));

            self.skip_ws();
            match self.peek() {
                None => break,
                Some(b',') => self.pos += 1,
                Some(c) if Some(c) == close => break,
                Some(c) => {
                    return Err(GrammarError::Unexpected {
                        found: c as char,
                        offset: self.pos,
                    })
                }
            }
        }
        Ok(ParsedConfig { entries })
    }

    fn parse_value(&mut self) -> GrammarResult<ConfigItem> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let nested = self.parse_list(Some(b')'))?;
                if self.peek() != Some(b')') {
                    return Err(GrammarError::Unterminated {
                        what: "nested list",
                        offset: self.pos,
                    });
                }
                self.pos += 1;
                Ok(ConfigItem::Nested(nested))
            }
            Some(b'"') => Ok(ConfigItem::Str(self.parse_quoted()?)),
            _ => {
                let token = self.parse_bare()?;
                Ok(classify(token))
            }
        }
    }

    fn parse_bare(&mut self) -> GrammarResult<String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, b',' | b'=' | b'(' | b')' | b'"') || c.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(match self.peek() {
                Some(c) => GrammarError::Unexpected {
                    found: c as char,
                    offset: self.pos,
                },
                None => GrammarError::UnexpectedEnd,
            });
        }
        Ok(String::from_utf8_lossy(&self.src[start..self.pos]).into_owned())
    }

    fn parse_quoted(&mut self) -> GrammarResult<String> {
        let start = self.pos;
        self.pos += 1;
        let mut out = Vec::new();
        loop {
            match self.peek() {
                None => {
                    return Err(GrammarError::Unterminated {
                        what: "quoted string",
                        offset: start,
                    })
                }
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(c) => {
                            out.push(c);
                            self.pos += 1;
                        }
                        None => {
                            return Err(GrammarError::Unterminated {
                                what: "escape sequence",
                                offset: self.pos,
                            })
                        }
                    }
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

fn classify(token: String) -> ConfigItem {
    match token.as_str() {
        "true" => return ConfigItem::Bool(true),
        "false" => return ConfigItem::Bool(false),
        _ => {}
    }
    match parse_int(&token) {
        Some(n) => ConfigItem::Int(n),
        None => ConfigItem::Token(token),
    }
}

fn parse_int(token: &str) -> Option<i64> {
    let digits_end = token
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && c == '-')))
        .map_or(token.len(), |(i, _)| i);
    let (number, suffix) = token.split_at(digits_end);
    if number.is_empty() || number == "-" {
        return None;
    }
    let value: i64 = number.parse().ok()?;
    let shift = match suffix.to_ascii_lowercase().as_str() {
        "" | "b" => 0,
        "k" | "kb" => 10,
        "m" | "mb" => 20,
        "g" | "gb" => 30,
        "t" | "tb" => 40,
        _ => return None,
    };
    value.checked_mul(1i64 << shift)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_and_none() {
        assert!(ParsedConfig::parse(None).unwrap().is_empty());
        assert!(ParsedConfig::parse(Some("")).unwrap().is_empty());
    }

    #[test]
    fn bare_keys_are_true() {
        let c = ParsedConfig::parse(Some("create,raw")).unwrap();
        assert_eq!(c.get_bool("create").unwrap(), Some(true));
        assert_eq!(c.get_bool("raw").unwrap(), Some(true));
        assert_eq!(c.get_bool("missing").unwrap(), None);
    }

    #[test]
    fn integers_and_suffixes() {
        let c = ParsedConfig::parse(Some("a=0,b=1,cache_size=100MB,p=-5,k=4KB")).unwrap();
        assert_eq!(c.get_bool("a").unwrap(), Some(false));
        assert_eq!(c.get_bool("b").unwrap(), Some(true));
        assert_eq!(c.get_int("cache_size").unwrap(), Some(100 << 20));
        assert_eq!(c.get_int("p").unwrap(), Some(-5));
        assert_eq!(c.get_int("k").unwrap(), Some(4096));
    }

    #[test]
    fn quoted_strings_unescape() {
        let c = ParsedConfig::parse(Some(r#"name="say \"hi\" \\ bye""#)).unwrap();
        assert_eq!(c.get_str("name").unwrap(), Some(r#"say "hi" \ bye"#));
    }

    #[test]
    fn nested_lists() {
        let c = ParsedConfig::parse(Some("statistics=(all,clear),log=(enabled,compressor=snappy)"))
            .unwrap();
        let stats = c.get_nested("statistics").unwrap().unwrap();
        assert_eq!(stats.keys().collect::<Vec<_>>(), vec!["all", "clear"]);
        let log = c.get_nested("log").unwrap().unwrap();
        assert_eq!(log.get_bool("enabled").unwrap(), Some(true));
        assert_eq!(log.get_str("compressor").unwrap(), Some("snappy"));
    }

    #[test]
    fn quoted_value_reparses_as_nested() {
        let c = ParsedConfig::parse(Some(r#"log="enabled,compressor=snappy""#)).unwrap();
        let log = c.get_nested("log").unwrap().unwrap();
        assert_eq!(log.get_bool("enabled").unwrap(), Some(true));
        assert_eq!(log.get_str("compressor").unwrap(), Some("snappy"));
    }

    #[test]
    fn quoted_value_keeps_its_parentheses() {
        let c = ParsedConfig::parse(Some(r#"log="(enabled,compressor=zstd)",s=" ( all ) ""#))
            .unwrap();
        let log = c.get_nested("log").unwrap().unwrap();
        assert_eq!(log.get_bool("enabled").unwrap(), Some(true));
        assert_eq!(log.get_str("compressor").unwrap(), Some("zstd"));
        let stats = c.get_nested("s").unwrap().unwrap();
        assert_eq!(stats.keys().collect::<Vec<_>>(), vec!["all"]);

        let c = ParsedConfig::parse(Some(r#"log="(enabled),x""#)).unwrap();
        assert!(c.get_nested("log").is_err());
        let c = ParsedConfig::parse(Some(r#"log="(enabled""#)).unwrap();
        assert!(c.get_nested("log").is_err());
    }

    #[test]
    fn last_occurrence_wins() {
        let c = ParsedConfig::parse(Some("raw=0,raw=1")).unwrap();
        assert_eq!(c.get_bool("raw").unwrap(), Some(true));
    }

    #[test]
    fn unknown_keys_rejected() {
        let c = ParsedConfig::parse(Some("create,bogus=1")).unwrap();
        assert!(c.check_allowed(&["create"]).is_err());
        assert!(c.check_allowed(&["create", "bogus"]).is_ok());
    }

    #[test]
    fn malformed_input() {
        assert!(ParsedConfig::parse(Some(r#"name="open"#)).is_err());
        assert!(ParsedConfig::parse(Some("log=(enabled")).is_err());
        assert!(ParsedConfig::parse(Some("a=1)")).is_err());
    }

    #[test]
    fn type_mismatches() {
        let c = ParsedConfig::parse(Some("a=abc,b=(x)")).unwrap();
        assert!(c.get_int("a").is_err());
        assert!(c.get_bool("a").is_err());
        assert!(c.get_str("b").is_err());
    }

    proptest! {
        #[test]
        fn escaped_strings_parse_back(value in ".{0,40}") {
            let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
            let c = ParsedConfig::parse(Some(&format!("name=\"{escaped}\""))).unwrap();
            prop_assert_eq!(c.get_str("name").unwrap(), Some(value.as_str()));
        }

        #[test]
        fn integers_parse_back(n in any::<i32>()) {
            let c = ParsedConfig::parse(Some(&format!("n={n}"))).unwrap();
            prop_assert_eq!(c.get_int("n").unwrap(), Some(i64::from(n)));
        }
    }
}
