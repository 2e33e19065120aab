use serde::{Deserialize, Serialize};
use serde_json::Value;
use vocanvas_protocol::Fragment;

/// What the canvas currently shows, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayState(Fragment);

impl DisplayState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: Fragment) -> Self {
        Self(fields)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn scene(&self) -> Option<&str> {
        self.get("scene").and_then(Value::as_str)
    }

    /// Shallow-merges `updates` in order over this state. Later fragments win;
    /// fields no fragment mentions keep their current value.
    pub fn apply_updates(&self, updates: &[Fragment]) -> Self {
        let mut next = self.0.clone();
        for fragment in updates {
            for (field, value) in fragment {
                next.insert(field.clone(), value.clone());
            }
        }
        Self(next)
    }
}

pub fn apply_updates(state: &DisplayState, updates: &[Fragment]) -> DisplayState {
    state.apply_updates(updates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frag(v: Value) -> Fragment {
        match v {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn state() -> DisplayState {
        DisplayState::from_fields(frag(json!({"scene": "color", "color": "red"})))
    }

    #[test]
    fn empty_batch_is_identity() {
        let s = state();
        assert_eq!(apply_updates(&s, &[]), s);
        assert_eq!(apply_updates(&s, &[Fragment::new()]), s);
    }

    #[test]
    fn partial_update_keeps_absent_fields() {
        let next = state().apply_updates(&[frag(json!({"color": "blue"}))]);
        assert_eq!(next.scene(), Some("color"));
        assert_eq!(next.get("color"), Some(&json!("blue")));
    }

    #[test]
    fn last_fragment_in_batch_wins() {
        let next = state().apply_updates(&[
            frag(json!({"scene": "number", "number": 1})),
            frag(json!({"number": 2})),
        ]);
        assert_eq!(next.scene(), Some("number"));
        assert_eq!(next.get("number"), Some(&json!(2)));
        assert_eq!(next.get("color"), Some(&json!("red")));
    }

    #[test]
    fn batch_equals_sequential_application() {
        let f1 = frag(json!({"scene": "number", "number": 1}));
        let f2 = frag(json!({"number": 7, "extra": true}));
        let s = state();
        let batched = apply_updates(&s, &[f1.clone(), f2.clone()]);
        let stepped = apply_updates(&apply_updates(&s, &[f1]), &[f2]);
        assert_eq!(batched, stepped);
    }

    #[test]
    fn input_state_is_untouched() {
        let s = state();
        let _ = s.apply_updates(&[frag(json!({"color": "green"}))]);
        assert_eq!(s.get("color"), Some(&json!("red")));
    }

    #[test]
    fn serializes_as_plain_object() {
        assert_eq!(
            serde_json::to_value(state()).unwrap(),
            json!({"scene": "color", "color": "red"})
        );
    }
}
