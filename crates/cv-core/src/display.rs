use serde_json::{Map, Number, Value};

use crate::store::VariableStore;

/// Largest integer an f64 holds exactly (2^53).
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

fn to_json_number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() <= MAX_EXACT_INT {
        return Value::from(value as i64);
    }
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// The mapping as a JSON object, keys in name order.
pub fn to_json(store: &VariableStore) -> Value {
    let map: Map<String, Value> = store
        .iter()
        .map(|(name, value)| (name.to_string(), to_json_number(value)))
        .collect();
    Value::Object(map)
}

/// Human-readable projection of the mapping: indented JSON, or
/// `placeholder` when nothing has been set.
pub fn render(store: &VariableStore, placeholder: &str) -> String {
    if store.is_empty() {
        return placeholder.to_string();
    }
    serde_json::to_string_pretty(&to_json(store)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::EMPTY_PLACEHOLDER;

    #[test]
    fn test_empty_uses_placeholder() {
        let store = VariableStore::new();
        assert_eq!(render(&store, EMPTY_PLACEHOLDER), EMPTY_PLACEHOLDER);
    }

    #[test]
    fn test_render_sorted_and_indented() {
        let mut store = VariableStore::new();
        store.execute("trust = 3");
        store.execute("affection = 2.5");
        assert_eq!(
            render(&store, EMPTY_PLACEHOLDER),
            "{\n  \"affection\": 2.5,\n  \"trust\": 3\n}"
        );
    }

    #[test]
    fn test_non_finite_rendered_as_null() {
        let mut store = VariableStore::new();
        store.execute("big = 1e308");
        store.execute("big += 1e308");
        assert_eq!(to_json(&store)["big"], Value::Null);
    }
}
