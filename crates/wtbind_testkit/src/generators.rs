//! Property-based test generators using proptest.

use proptest::prelude::*;
use std::collections::BTreeMap;

/// Strategy for table URIs of the form `table:<name>`.
pub fn table_uri_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("table:[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for keys: arbitrary non-empty bytes, NUL included.
pub fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..64)
}

/// Strategy for values: arbitrary bytes, empty included.
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        1 => Just(Vec::new()),
        4 => prop::collection::vec(any::<u8>(), 0..512),
    ]
}

/// Strategy for a set of records with distinct keys, in key order.
pub fn records_strategy(max: usize) -> impl Strategy<Value = BTreeMap<Vec<u8>, Vec<u8>>> {
    prop::collection::btree_map(key_strategy(), value_strategy(), 0..max)
}

/// Strategy for string option values, weighted towards characters the
/// encoder must escape.
pub fn option_string_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::string::string_regex("[a-z\"\\\\,=() ]{1,24}").expect("Invalid regex"),
        ".{1,40}",
    ]
}
