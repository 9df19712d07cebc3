use indexmap::IndexMap;
use serde_json::Value;

/// Key the verbosity counter is stored under.
pub const VERBOSE_KEY: &str = "verbose";

/// Whether a parsed value counts as "given" for the constraint checks.
///
/// Absent, `false`, zero and empty values are not given.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Values of one invocation, keyed by parameter key (or `dest` once
/// remapped), in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedArgs {
    values: IndexMap<String, Value>,
    verbosity: u8,
}

impl ParsedArgs {
    pub fn new(verbosity: u8) -> Self {
        Self {
            values: IndexMap::new(),
            verbosity,
        }
    }

    pub fn verbosity(&self) -> u8 {
        self.verbosity
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// `true` when the value under `key` exists and is truthy.
    pub fn is_given(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(is_truthy)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }
}
