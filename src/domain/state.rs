//! Versioned shared state snapshot.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::app::Props;

/// A consistent view of the shared key/value state.
///
/// The version counter advances by one on every merge, so subscribers can
/// order the snapshots they observe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    version: u64,
    values: Props,
}

impl StateSnapshot {
    pub fn new(values: Props) -> Self {
        Self { version: 0, values }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn values(&self) -> &Props {
        &self.values
    }

    /// Produce the successor snapshot with `partial` merged in.
    #[must_use]
    pub fn merged(&self, partial: &Props) -> StateSnapshot {
        let mut values = self.values.clone();
        for (key, value) in partial {
            values.insert(key.clone(), value.clone());
        }
        StateSnapshot {
            version: self.version + 1,
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(pairs: &[(&str, Value)]) -> Props {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn merge_overwrites_and_keeps_unrelated_keys() {
        let base = StateSnapshot::new(props(&[("theme", json!("light")), ("user", json!(null))]));
        let next = base.merged(&props(&[("theme", json!("dark"))]));

        assert_eq!(next.get("theme"), Some(&json!("dark")));
        assert_eq!(next.get("user"), Some(&json!(null)));
        assert_eq!(base.get("theme"), Some(&json!("light")));
    }

    #[test]
    fn version_advances_monotonically() {
        let s0 = StateSnapshot::default();
        let s1 = s0.merged(&props(&[("a", json!(1))]));
        let s2 = s1.merged(&props(&[("a", json!(2))]));
        assert_eq!(s0.version(), 0);
        assert_eq!(s1.version(), 1);
        assert_eq!(s2.version(), 2);
    }
}
