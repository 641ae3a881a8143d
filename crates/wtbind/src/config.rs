//! Configuration encoding.
//!
//! Option structs are translated into the engine's flat configuration
//! string, `key=value` pairs joined by commas:
//!
//! - only options that differ from their default are written, so the engine
//!   keeps its own defaults for everything else
//! - booleans are tri-state ([`Tri`]): unset options are omitted, `False`
//!   and `True` are written as `0` and `1`
//! - strings are double-quoted with `"` and `\` escaped
//! - token lists are written as `(a,b,c)`
//!
//! A `None` configuration, or one where every option is at its default,
//! encodes to `None`.
//!
//! ## Example
//!
//! ```rust
//! use wtbind::config::{encode, ConnectionConfig, Statistics, Tri};
//!
//! let config = ConnectionConfig {
//!     create: Tri::True,
//!     cache_size: 64 << 20,
//!     statistics: vec![Statistics::Fast, Statistics::Clear],
//!     ..ConnectionConfig::default()
//! };
//! assert_eq!(
//!     encode(Some(&config)).as_deref(),
//!     Some("cache_size=67108864,create=1,statistics=(fast,clear)")
//! );
//! assert_eq!(encode(Some(&ConnectionConfig::default())), None);
//! assert_eq!(encode::<ConnectionConfig>(None), None);
//! ```

use std::fmt::Write;

/// A boolean option that can also be left to the engine's default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Tri {
    /// Not written; the engine default applies.
    #[default]
    Unset,
    /// Written as `0`.
    False,
    /// Written as `1`.
    True,
}

impl Tri {
    /// Returns the explicit value, if any.
    pub const fn as_bool(self) -> Option<bool> {
        match self {
            Self::Unset => None,
            Self::False => Some(false),
            Self::True => Some(true),
        }
    }
}

impl From<bool> for Tri {
    fn from(value: bool) -> Self {
        if value {
            Self::True
        } else {
            Self::False
        }
    }
}

impl From<Option<bool>> for Tri {
    fn from(value: Option<bool>) -> Self {
        value.map_or(Self::Unset, Self::from)
    }
}

/// A value that can appear in an option struct.
pub trait ConfigValue {
    /// Returns true if the value is at its default and must be omitted.
    fn is_unset(&self) -> bool;

    /// Appends the encoded value.
    fn write_value(&self, out: &mut String);
}

/// A bare token, such as an enumerated option value.
pub trait ConfigToken {
    /// The token as the engine spells it.
    fn token(&self) -> &'static str;
}

impl ConfigValue for Tri {
    fn is_unset(&self) -> bool {
        *self == Self::Unset
    }

    fn write_value(&self, out: &mut String) {
        out.push(if *self == Self::True { '1' } else { '0' });
    }
}

macro_rules! int_config_value {
    ($($ty:ty),*) => {
        $(
            impl ConfigValue for $ty {
                fn is_unset(&self) -> bool {
                    *self == 0
                }

                fn write_value(&self, out: &mut String) {
                    let _ = write!(out, "{self}");
                }
            }
        )*
    };
}

int_config_value!(i32, i64, u32, u64, usize);

impl ConfigValue for str {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }

    fn write_value(&self, out: &mut String) {
        out.reserve(self.len() + 2);
        out.push('"');
        for c in self.chars() {
            if matches!(c, '"' | '\\') {
                out.push('\\');
            }
            out.push(c);
        }
        out.push('"');
    }
}

impl ConfigValue for String {
    fn is_unset(&self) -> bool {
        self.as_str().is_unset()
    }

    fn write_value(&self, out: &mut String) {
        self.as_str().write_value(out);
    }
}

/// `None` is omitted. `Some` is always written, even when it holds a value
/// that would otherwise count as a default, so an explicit zero can be
/// passed through.
impl<T: ConfigValue> ConfigValue for Option<T> {
    fn is_unset(&self) -> bool {
        self.is_none()
    }

    fn write_value(&self, out: &mut String) {
        if let Some(value) = self {
            value.write_value(out);
        }
    }
}

impl<T: ConfigToken> ConfigValue for Vec<T> {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }

    fn write_value(&self, out: &mut String) {
        out.push('(');
        for (i, item) in self.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(item.token());
        }
        out.push(')');
    }
}

/// Accumulates `key=value` pairs.
#[derive(Debug, Default)]
pub struct ConfigWriter {
    buf: String,
}

impl ConfigWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `key=value` unless the value is unset.
    pub fn field<V: ConfigValue + ?Sized>(&mut self, key: &str, value: &V) {
        if value.is_unset() {
            return;
        }
        if !self.buf.is_empty() {
            self.buf.push(',');
        }
        self.buf.push_str(key);
        self.buf.push('=');
        value.write_value(&mut self.buf);
    }

    /// Returns the configuration string, or `None` if nothing was written.
    pub fn finish(self) -> Option<String> {
        (!self.buf.is_empty()).then_some(self.buf)
    }
}

/// An option struct that encodes itself field by field.
pub trait EncodeConfig {
    /// Writes every non-default field.
    fn encode_into(&self, out: &mut ConfigWriter);

    /// Encodes into a fresh string.
    fn to_config_string(&self) -> Option<String> {
        let mut out = ConfigWriter::new();
        self.encode_into(&mut out);
        out.finish()
    }
}

/// Encodes an optional option struct for an engine call.
pub fn encode<T: EncodeConfig>(config: Option<&T>) -> Option<String> {
    let encoded = config.and_then(EncodeConfig::to_config_string);
    tracing::debug!(
        options = std::any::type_name::<T>(),
        config = encoded.as_deref().unwrap_or(""),
        "encoded configuration"
    );
    encoded
}

config_tokens! {
    /// Statistics the engine maintains.
    pub enum Statistics {
        /// Every statistic, including expensive ones.
        All => "all",
        /// Statistics that walk the cache.
        CacheWalk => "cache_walk",
        /// Reset statistics after each read.
        Clear => "clear",
        /// Only statistics that are cheap to gather.
        Fast => "fast",
        /// No statistics.
        None => "none",
        /// Statistics that walk each tree.
        TreeWalk => "tree_walk",
    }
}

config_tokens! {
    /// Transaction isolation levels.
    pub enum Isolation {
        /// Reads see the rows committed when the transaction began.
        Snapshot => "snapshot",
        /// Each read sees the rows committed when it runs.
        ReadCommitted => "read-committed",
        /// Reads may see uncommitted rows.
        ReadUncommitted => "read-uncommitted",
    }
}

config_tokens! {
    /// Durability of a log flush.
    pub enum SyncMode {
        /// Write the log without waiting for durable storage.
        Off => "off",
        /// Wait until the log is durable.
        On => "on",
        /// Start a durable write and return immediately.
        Background => "background",
    }
}

config_options! {
    /// Options for [`Connection::open`](crate::Connection::open).
    pub struct ConnectionConfig {
        /// Cache size in bytes.
        pub cache_size: u64,
        /// Create the database if it does not exist yet.
        pub create: Tri,
        /// Keep everything in memory; nothing is written to the home.
        pub in_memory: Tri,
        /// Log settings as a nested list, such as `(enabled,compressor=snappy)`.
        pub log: String,
        /// Recover a corrupted home by discarding what cannot be read.
        pub salvage: Tri,
        /// Maximum number of concurrently open sessions.
        pub session_max: u32,
        /// Statistics to maintain.
        pub statistics: Vec<Statistics>,
        /// Periodic statistics logging, as a nested list.
        pub statistics_log: String,
        /// Default commit durability, as a nested list.
        pub transaction_sync: String,
    }
}

config_options! {
    /// Options for [`Connection::close`](crate::Connection::close).
    pub struct CloseConfig {
        /// Skip freeing engine memory on close.
        pub leak_memory: Tri,
    }
}

config_options! {
    /// Options for [`Connection::open_session`](crate::Connection::open_session).
    pub struct SessionConfig {
        /// Default isolation of the session's transactions.
        pub isolation: Option<Isolation>,
    }
}

config_options! {
    /// Options for [`Session::create`](crate::Session::create).
    pub struct CreateConfig {
        /// Block compressor, such as `snappy` or `zstd`.
        pub block_compressor: String,
        /// Fail if the data source already exists. The engine defaults to
        /// `true`.
        pub exclusive: Tri,
        /// Key format; the binding reads and writes raw bytes either way.
        pub key_format: String,
        /// Value format.
        pub value_format: String,
    }
}

config_options! {
    /// Options for [`Session::drop_source`](crate::Session::drop_source).
    pub struct DropConfig {
        /// Succeed even if the data source does not exist.
        pub force: Tri,
        /// Remove the underlying files.
        pub remove_files: Tri,
    }
}

config_options! {
    /// Options for opening a cursor.
    ///
    /// Fields are set through the `with_*` builders: raw mode is reserved for
    /// the binding, which forces it on for mutators and scanners.
    pub struct CursorConfig {
        overwrite: Tri,
        bulk: Tri,
        readonly: Tri,
        pub(crate) raw: Tri,
    }
}

impl CursorConfig {
    /// Creates a configuration with every option at its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether inserts replace existing keys and updates create
    /// missing ones. The engine defaults to `true`.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite.into();
        self
    }

    /// Opens a bulk-load cursor on an empty data source.
    pub fn with_bulk(mut self, bulk: bool) -> Self {
        self.bulk = bulk.into();
        self
    }

    /// Rejects every mutation through the cursor.
    pub fn with_readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly.into();
        self
    }

    pub(crate) fn forced(mut self, raw: bool, readonly: Option<bool>) -> Self {
        self.raw = raw.into();
        self.readonly = readonly.into();
        self
    }
}

config_options! {
    /// Options for [`Session::begin_transaction`](crate::Session::begin_transaction).
    pub struct TxBeginConfig {
        /// Isolation for this transaction only.
        pub isolation: Option<Isolation>,
        /// Name shown in diagnostics.
        pub name: String,
        /// Priority in conflict resolution, from -100 to 100.
        pub priority: i32,
        /// Make the commit durable.
        pub sync: Tri,
    }
}

config_options! {
    /// Options for [`Session::commit_transaction`](crate::Session::commit_transaction).
    pub struct TxCommitConfig {
        /// Make this commit durable.
        pub sync: Tri,
    }
}

config_options! {
    /// Options for [`Session::log_flush`](crate::Session::log_flush).
    pub(crate) struct LogFlushConfig {
        pub(crate) sync: Option<SyncMode>,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use wtbind_native::{ConfigItem, ParsedConfig};

    fn parsed(config: &impl EncodeConfig) -> ParsedConfig {
        ParsedConfig::parse(config.to_config_string().as_deref()).unwrap()
    }

    #[test]
    fn defaults_encode_to_none() {
        assert_eq!(ConnectionConfig::default().to_config_string(), None);
        assert_eq!(CursorConfig::new().to_config_string(), None);
        assert_eq!(TxBeginConfig::default().to_config_string(), None);
        assert_eq!(encode::<DropConfig>(None), None);
    }

    #[test]
    fn tri_state_offsets() {
        let config = DropConfig {
            force: Tri::False,
            remove_files: Tri::True,
        };
        assert_eq!(config.to_config_string().as_deref(), Some("force=0,remove_files=1"));

        let config = DropConfig {
            force: Tri::Unset,
            remove_files: false.into(),
        };
        assert_eq!(config.to_config_string().as_deref(), Some("remove_files=0"));
    }

    #[test]
    fn strings_are_quoted() {
        let config = CreateConfig {
            block_compressor: "snappy".into(),
            key_format: "u".into(),
            ..CreateConfig::default()
        };
        assert_eq!(
            config.to_config_string().as_deref(),
            Some(r#"block_compressor="snappy",key_format="u""#)
        );
    }

    #[test]
    fn quotes_and_backslashes_are_escaped() {
        let config = TxBeginConfig {
            name: r#"say "hi" \o/"#.into(),
            ..TxBeginConfig::default()
        };
        assert_eq!(
            config.to_config_string().as_deref(),
            Some(r#"name="say \"hi\" \\o/""#)
        );
    }

    #[test]
    fn tokens_are_bare() {
        let config = SessionConfig {
            isolation: Some(Isolation::ReadCommitted),
        };
        assert_eq!(config.to_config_string().as_deref(), Some("isolation=read-committed"));

        let flush = LogFlushConfig {
            sync: Some(SyncMode::Background),
        };
        assert_eq!(flush.to_config_string().as_deref(), Some("sync=background"));
    }

    #[test]
    fn explicit_zero_through_option() {
        let mut out = ConfigWriter::new();
        out.field("priority", &Some(0i32));
        out.field("skipped", &0i32);
        assert_eq!(out.finish().as_deref(), Some("priority=0"));
    }

    #[test]
    fn cursor_builders() {
        let config = CursorConfig::new()
            .with_overwrite(false)
            .with_bulk(true)
            .forced(true, None);
        assert_eq!(config.to_config_string().as_deref(), Some("overwrite=0,bulk=1,raw=1"));

        let scan = CursorConfig::new().with_readonly(false).forced(true, Some(true));
        assert_eq!(scan.to_config_string().as_deref(), Some("readonly=1,raw=1"));
    }

    #[test]
    fn engine_parses_what_we_encode() {
        let config = ConnectionConfig {
            cache_size: 1 << 30,
            create: Tri::True,
            log: "(enabled,compressor=snappy)".into(),
            statistics: vec![Statistics::All],
            ..ConnectionConfig::default()
        };
        let parsed = parsed(&config);
        assert_eq!(parsed.get_int("cache_size").unwrap(), Some(1 << 30));
        assert_eq!(parsed.get_bool("create").unwrap(), Some(true));
        let log = parsed.get_nested("log").unwrap().unwrap();
        assert_eq!(log.get_bool("enabled").unwrap(), Some(true));
        assert_eq!(log.get_str("compressor").unwrap(), Some("snappy"));
        let stats = parsed.get_nested("statistics").unwrap().unwrap();
        assert_eq!(stats.get("all"), Some(&ConfigItem::Bool(true)));
        assert_eq!(parsed.get("in_memory"), None);
    }

    proptest! {
        #[test]
        fn any_name_survives_the_engine(name in ".{1,40}") {
            let config = TxBeginConfig { name: name.clone(), ..TxBeginConfig::default() };
            let parsed = parsed(&config);
            prop_assert_eq!(parsed.get_str("name").unwrap(), Some(name.as_str()));
        }

        #[test]
        fn non_default_options_round_trip(
            cache_size in 1u64..(1 << 40),
            session_max in 0u32..1000,
            create in any::<Option<bool>>(),
            salvage in any::<Option<bool>>(),
        ) {
            let config = ConnectionConfig {
                cache_size,
                session_max,
                create: create.into(),
                salvage: salvage.into(),
                ..ConnectionConfig::default()
            };
            let parsed = parsed(&config);
            prop_assert_eq!(parsed.get_int("cache_size").unwrap(), Some(cache_size as i64));
            let expected_max = (session_max != 0).then_some(i64::from(session_max));
            prop_assert_eq!(parsed.get_int("session_max").unwrap(), expected_max);
            prop_assert_eq!(parsed.get_bool("create").unwrap(), create);
            prop_assert_eq!(parsed.get_bool("salvage").unwrap(), salvage);
        }
    }
}
