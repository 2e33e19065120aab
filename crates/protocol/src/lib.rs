use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Partial update to the canvas display state, keyed by scene-specific fields.
pub type Fragment = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Swap {
    /// The batch starts a new scene.
    Replace,
    Merge,
}

impl Default for Swap {
    fn default() -> Self {
        Self::Merge
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
}

/// One inbound conversational turn, after speech recognition and intent matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookRequest {
    #[serde(default = "default_locale")]
    pub locale: String,
    pub action: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Turns in a row spent on `action`, supplied by session tracking.
    #[serde(default)]
    pub consecutive: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionInfo>,
}

impl WebhookRequest {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            locale: default_locale(),
            action: action.into(),
            parameters: Map::new(),
            consecutive: 1,
            session: None,
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanvasPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub swap: Swap,
    pub data: Vec<Fragment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub utterance: String,
    pub ssml: String,
    pub canvas: CanvasPayload,
}

pub mod marks {
    /// Emitted by the speech layer before the first word of an utterance.
    pub const START: &str = "START";
    /// Emitted after the last word of an utterance.
    pub const END: &str = "END";

    pub fn is_sentinel(mark: &str) -> bool {
        mark == START || mark == END
    }
}

/// Locale tag used when no response exists for the requested locale.
pub const DEFAULT_LOCALE: &str = "und";

fn default_locale() -> String {
    DEFAULT_LOCALE.to_string()
}
