//! The per-request environment that builders enrich and templates read from.

use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use vocanvas_protocol::WebhookRequest;

/// Field names the environment provides itself. Builders may not claim these.
pub const CORE_FIELDS: &[&str] = &["locale", "action", "consecutive", "hostname", "sessionStart"];

/// A typed value stored in the environment.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvValue {
    Text(String),
    Integer(i64),
    List(Vec<EnvValue>),
}

impl EnvValue {
    pub fn as_list(&self) -> Option<&[EnvValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::Integer(n) => Value::from(*n),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }
}

impl fmt::Display for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{n}"),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for EnvValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for EnvValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for EnvValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

/// Per-request context. Created from the inbound request, enriched by the builder
/// pipeline, then only read by the resolver.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub locale: String,
    pub action: String,
    pub parameters: Map<String, Value>,
    pub consecutive: u32,
    pub hostname: Option<String>,
    pub session_start: Option<String>,
    derived: BTreeMap<String, EnvValue>,
}

impl Environment {
    pub fn new(locale: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            action: action.into(),
            ..Self::default()
        }
    }

    pub fn from_request(req: &WebhookRequest) -> Self {
        Self {
            locale: req.locale.clone(),
            action: req.action.clone(),
            parameters: req.parameters.clone(),
            consecutive: req.consecutive,
            hostname: None,
            session_start: req.session.as_ref().and_then(|s| s.start_time.clone()),
            derived: BTreeMap::new(),
        }
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn with_consecutive(mut self, consecutive: u32) -> Self {
        self.consecutive = consecutive;
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<EnvValue>) {
        self.derived.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<EnvValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Looks up a core or derived field by name. Unknown names yield `None`.
    pub fn get(&self, name: &str) -> Option<Cow<'_, EnvValue>> {
        let core = match name {
            "locale" => EnvValue::Text(self.locale.clone()),
            "action" => EnvValue::Text(self.action.clone()),
            "consecutive" => EnvValue::Integer(i64::from(self.consecutive)),
            "hostname" => EnvValue::Text(self.hostname.clone()?),
            "sessionStart" => EnvValue::Text(self.session_start.clone()?),
            _ => return self.derived.get(name).map(Cow::Borrowed),
        };
        Some(Cow::Owned(core))
    }

    pub(crate) fn derived_snapshot(&self) -> BTreeMap<String, EnvValue> {
        self.derived.clone()
    }

    /// Reverts every derived field outside `owned` to its value in `before` and
    /// returns the names that changed.
    pub(crate) fn revert_unowned(
        &mut self,
        before: &BTreeMap<String, EnvValue>,
        owned: &[&str],
    ) -> Vec<String> {
        let names: BTreeSet<String> = self.derived.keys().chain(before.keys()).cloned().collect();
        let mut reverted = Vec::new();
        for name in names {
            if owned.contains(&name.as_str()) {
                continue;
            }
            let prev = before.get(&name);
            if self.derived.get(&name) == prev {
                continue;
            }
            match prev {
                Some(value) => self.derived.insert(name.clone(), value.clone()),
                None => self.derived.remove(&name),
            };
            reverted.push(name);
        }
        reverted
    }
}
