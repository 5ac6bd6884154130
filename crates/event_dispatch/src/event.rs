//! Events passed through the dispatcher.
//!
//! An [`Event`] carries a dot-segmented name, an ordered parameter list and a
//! propagation flag. Listeners receive it by mutable reference and may read or
//! rewrite its parameters, or stop the dispatch chain.

use crate::error::{DispatchError, Result};
use compact_str::CompactString;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Key of an event parameter: either a positional index or a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamKey {
    /// Positional parameter, assigned by [`Event::add_param`] or set explicitly
    Index(u64),
    /// Named parameter
    Name(CompactString),
}

impl ParamKey {
    /// Converts a dynamic JSON value into a parameter key.
    ///
    /// Strings become named keys and non-negative integers become indices.
    /// Any other value (negative or fractional numbers, booleans, null,
    /// arrays, objects) is rejected.
    pub fn try_from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(name) => Ok(ParamKey::Name(CompactString::new(name))),
            Value::Number(number) => number.as_u64().map(ParamKey::Index).ok_or_else(|| {
                DispatchError::invalid(format!(
                    "invalid parameter key {number}: expected string or non-negative integer"
                ))
            }),
            other => Err(DispatchError::invalid(format!(
                "invalid parameter key type {}: expected string or non-negative integer",
                json_type_name(other)
            ))),
        }
    }
}

impl ParamKey {
    /// Converts the key of a JSON object entry.
    ///
    /// Canonical decimal integers (`"0"`, `"42"`, but not `"042"` or `"+1"`)
    /// become indices so that `{"0": ..}` and the first positional parameter
    /// share a slot. Every other string is a named key.
    pub fn from_object_key(key: &str) -> Self {
        let canonical = key == "0"
            || (!key.starts_with('0') && !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()));
        match key.parse::<u64>() {
            Ok(index) if canonical => ParamKey::Index(index),
            _ => ParamKey::from(key),
        }
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKey::Index(index) => write!(f, "{index}"),
            ParamKey::Name(name) => f.write_str(name),
        }
    }
}

impl From<&str> for ParamKey {
    fn from(name: &str) -> Self {
        ParamKey::Name(CompactString::new(name))
    }
}

impl From<String> for ParamKey {
    fn from(name: String) -> Self {
        ParamKey::Name(CompactString::from(name))
    }
}

impl From<CompactString> for ParamKey {
    fn from(name: CompactString) -> Self {
        ParamKey::Name(name)
    }
}

impl From<u64> for ParamKey {
    fn from(index: u64) -> Self {
        ParamKey::Index(index)
    }
}

impl From<u32> for ParamKey {
    fn from(index: u32) -> Self {
        ParamKey::Index(u64::from(index))
    }
}

impl From<usize> for ParamKey {
    fn from(index: usize) -> Self {
        ParamKey::Index(index as u64)
    }
}

/// Shared fire-count table owned by an [`EventManager`](crate::EventManager).
///
/// Events hold a clone of their manager's table once fired, which is how
/// [`Event::fire_count`] reaches back to the manager.
#[derive(Debug, Clone, Default)]
pub struct FireCounts {
    counts: Arc<DashMap<CompactString, u64>>,
}

impl FireCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded fires for `name`, 0 if never fired
    pub fn get(&self, name: &str) -> u64 {
        self.counts.get(name).map(|count| *count).unwrap_or(0)
    }

    /// Records one fire of `name` and returns the new count
    pub(crate) fn increment(&self, name: &str) -> u64 {
        let mut entry = self.counts.entry(CompactString::new(name)).or_insert(0);
        *entry += 1;
        *entry
    }

    /// All recorded counts, sorted by event name
    pub fn snapshot(&self) -> Vec<(String, u64)> {
        let mut counts: Vec<(String, u64)> = self
            .counts
            .iter()
            .map(|entry| (entry.key().to_string(), *entry.value()))
            .collect();
        counts.sort();
        counts
    }

    /// Whether two handles point at the same table
    pub fn same_table(&self, other: &FireCounts) -> bool {
        Arc::ptr_eq(&self.counts, &other.counts)
    }
}

/// A named occurrence passed to every matching listener.
#[derive(Debug, Clone)]
pub struct Event {
    name: CompactString,
    params: Vec<(ParamKey, Value)>,
    /// `None` once `u64::MAX` has been used as a key
    next_index: Option<u64>,
    propagation_stopped: bool,
    fire_counts: Option<FireCounts>,
}

impl Event {
    /// Creates an event with no parameters.
    pub fn new(name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            next_index: Some(0),
            propagation_stopped: false,
            fire_counts: None,
        }
    }

    /// Returns the event name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends a positional parameter and returns the index it was stored under.
    ///
    /// The index is one past the highest integer key ever assigned on this
    /// event (0 for the first one), so removing a parameter never causes an
    /// index to be reused.
    ///
    /// Fails with [`DispatchError::InvalidArgument`] once `u64::MAX` has been
    /// used as a key, since no higher index is left.
    pub fn add_param(&mut self, value: impl Into<Value>) -> Result<ParamKey> {
        let index = self.next_index.ok_or_else(|| {
            DispatchError::invalid(format!(
                "cannot add a positional parameter to {}: index {} is already taken",
                self.name,
                u64::MAX
            ))
        })?;
        let key = ParamKey::Index(index);
        self.set_param(key.clone(), value);
        Ok(key)
    }

    /// Sets a parameter, replacing an existing value in place.
    pub fn set_param(&mut self, key: impl Into<ParamKey>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();

        if let ParamKey::Index(index) = key {
            if self.next_index.is_some_and(|next| index >= next) {
                self.next_index = index.checked_add(1);
            }
        }

        match self.params.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.params.push((key, value)),
        }
    }

    /// Sets a parameter whose key comes from dynamic data.
    ///
    /// Fails with [`DispatchError::InvalidArgument`] when the key is neither a
    /// string nor a non-negative integer.
    pub fn set_param_value(&mut self, key: &Value, value: impl Into<Value>) -> Result<()> {
        let key = ParamKey::try_from_value(key)?;
        self.set_param(key, value);
        Ok(())
    }

    /// Returns a parameter, or `None` when unset.
    pub fn param(&self, key: impl Into<ParamKey>) -> Option<&Value> {
        let key = key.into();
        self.params
            .iter()
            .find(|(existing, _)| *existing == key)
            .map(|(_, value)| value)
    }

    /// Whether a parameter is set to a non-null value.
    pub fn has_param(&self, key: impl Into<ParamKey>) -> bool {
        matches!(self.param(key), Some(value) if !value.is_null())
    }

    /// Removes a parameter, keeping the order of the remaining ones.
    pub fn remove_param(&mut self, key: impl Into<ParamKey>) -> Option<Value> {
        let key = key.into();
        let position = self.params.iter().position(|(existing, _)| *existing == key)?;
        Some(self.params.remove(position).1)
    }

    /// Removes every parameter and restarts positional numbering at 0.
    pub fn remove_all_params(&mut self) {
        self.params.clear();
        self.next_index = Some(0);
    }

    /// All parameters in insertion order
    pub fn all_params(&self) -> &[(ParamKey, Value)] {
        &self.params
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Halts dispatch after the currently running listener returns.
    ///
    /// Once stopped, an event stays stopped.
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }

    /// Number of times the owning manager has fired an event with this name.
    ///
    /// Returns 0 for an event that has not been passed to a manager yet.
    pub fn fire_count(&self) -> u64 {
        self.fire_counts
            .as_ref()
            .map(|counts| counts.get(&self.name))
            .unwrap_or(0)
    }

    /// Whether a manager has attached itself to this event
    pub fn has_manager(&self) -> bool {
        self.fire_counts.is_some()
    }

    pub(crate) fn attach(&mut self, fire_counts: FireCounts) {
        self.fire_counts = Some(fire_counts);
    }
}

impl From<&str> for Event {
    fn from(name: &str) -> Self {
        Event::new(name)
    }
}

impl From<String> for Event {
    fn from(name: String) -> Self {
        Event::new(name)
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_name() {
        let event = Event::new("order.created");
        assert_eq!(event.name(), "order.created");
        assert_eq!(event.param_count(), 0);
        assert!(!event.is_propagation_stopped());
    }

    #[test]
    fn test_add_params_are_positional() {
        let mut event = Event::new("my_event");
        event.add_param("p1").unwrap();
        event.add_param("p2").unwrap();

        assert_eq!(
            event.all_params(),
            &[
                (ParamKey::Index(0), json!("p1")),
                (ParamKey::Index(1), json!("p2")),
            ]
        );

        event.remove_all_params();
        assert!(event.all_params().is_empty());
        assert_eq!(event.add_param("again").unwrap(), ParamKey::Index(0));
    }

    #[test]
    fn test_add_param_after_explicit_index() {
        let mut event = Event::new("my_event");
        event.set_param(5u64, "five");
        assert_eq!(event.add_param("six").unwrap(), ParamKey::Index(6));

        event.remove_param(6u64);
        assert_eq!(event.add_param("seven").unwrap(), ParamKey::Index(7));
    }

    #[test]
    fn test_object_keys() {
        assert_eq!(ParamKey::from_object_key("0"), ParamKey::Index(0));
        assert_eq!(ParamKey::from_object_key("42"), ParamKey::Index(42));
        assert_eq!(ParamKey::from_object_key("042"), ParamKey::from("042"));
        assert_eq!(ParamKey::from_object_key("+1"), ParamKey::from("+1"));
        assert_eq!(ParamKey::from_object_key("-1"), ParamKey::from("-1"));
        assert_eq!(ParamKey::from_object_key(""), ParamKey::from(""));
        assert_eq!(ParamKey::from_object_key("1.5"), ParamKey::from("1.5"));
        assert_eq!(ParamKey::from_object_key("user"), ParamKey::from("user"));
        // too large for an index
        assert_eq!(
            ParamKey::from_object_key("18446744073709551616"),
            ParamKey::from("18446744073709551616")
        );
    }

    #[test]
    fn test_add_param_after_max_index() {
        let mut event = Event::new("my_event");
        event.set_param(3u64, "three");
        event.set_param(u64::MAX, "max");
        event.set_param_value(&json!(u64::MAX), "max again").unwrap();

        let err = event.add_param("next").unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(event.param(0u64), None);
        assert_eq!(event.param(u64::MAX), Some(&json!("max again")));
        assert_eq!(event.param_count(), 2);

        // lower explicit indices are still accepted
        event.set_param(7u64, "seven");
        assert!(event.add_param("next").is_err());

        event.remove_all_params();
        assert_eq!(event.add_param("fresh").unwrap(), ParamKey::Index(0));
    }

    #[test]
    fn test_set_and_get_param() {
        let mut event = Event::new("my_event");
        event.set_param("name", "value");
        event.set_param(3u64, true);

        assert_eq!(event.param("name"), Some(&json!("value")));
        assert_eq!(event.param(3u64), Some(&json!(true)));
        assert_eq!(event.param("undefined"), None);
    }

    #[test]
    fn test_set_param_replaces_in_place() {
        let mut event = Event::new("my_event");
        event.set_param("a", 1);
        event.set_param("b", 2);
        event.set_param("a", 3);

        let keys: Vec<String> = event.all_params().iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(event.param("a"), Some(&json!(3)));
    }

    #[test]
    fn test_set_param_value_rejects_invalid_keys() {
        let mut event = Event::new("my_event");
        assert!(event.set_param_value(&json!("ok"), 1).is_ok());
        assert!(event.set_param_value(&json!(2), 1).is_ok());

        for key in [json!(-1), json!(1.5), json!(true), json!(null), json!([1]), json!({"a": 1})] {
            let err = event.set_param_value(&key, 1).unwrap_err();
            assert!(err.is_invalid_argument(), "{key} should be rejected");
        }
        assert_eq!(event.param_count(), 2);
    }

    #[test]
    fn test_has_and_remove_param() {
        let mut event = Event::new("my_event");
        event.set_param("present", "yes");
        event.set_param("nothing", Value::Null);

        assert!(event.has_param("present"));
        assert!(!event.has_param("nothing"));
        assert!(!event.has_param("missing"));

        assert_eq!(event.remove_param("present"), Some(json!("yes")));
        assert!(!event.has_param("present"));
        assert_eq!(event.remove_param("present"), None);
    }

    #[test]
    fn test_stop_propagation_is_sticky() {
        let mut event = Event::new("my_event");
        event.stop_propagation();
        event.stop_propagation();
        assert!(event.is_propagation_stopped());
    }

    #[test]
    fn test_fire_count_without_manager() {
        let event = Event::new("my_event");
        assert!(!event.has_manager());
        assert_eq!(event.fire_count(), 0);
    }

    #[test]
    fn test_fire_count_through_shared_table() {
        let counts = FireCounts::new();
        let mut event = Event::new("my_event");
        event.attach(counts.clone());

        counts.increment("my_event");
        counts.increment("my_event");
        counts.increment("other");

        assert!(event.has_manager());
        assert_eq!(event.fire_count(), 2);
        assert_eq!(
            counts.snapshot(),
            vec![("my_event".to_string(), 2), ("other".to_string(), 1)]
        );
    }
}
