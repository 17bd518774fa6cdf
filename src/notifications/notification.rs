//! Named notification records.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// An immutable `{name, value}` pair multiplexed over one observable.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Notification<V> {
    name: Cow<'static, str>,
    value: V,
}

impl<V> Notification<V> {
    pub fn new(name: impl Into<Cow<'static, str>>, value: V) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn into_value(self) -> V {
        self.value
    }

    /// Whether this notification is named `name`.
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        let a = Notification::new("next", 1);
        let b = Notification::new(String::from("next"), 1);
        assert_eq!(a, b);
        assert_ne!(a, Notification::new("next", 2));
        assert!(a.is("next"));
        assert_eq!(a.into_value(), 1);
    }

    #[test]
    fn test_serializes_as_record() {
        let json = serde_json::to_value(Notification::new("progress", 0.5)).unwrap();
        assert_eq!(json, serde_json::json!({"name": "progress", "value": 0.5}));
    }
}
