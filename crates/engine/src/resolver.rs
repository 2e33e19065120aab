use crate::config::VoiceConfig;
use crate::env::{EnvValue, Environment};
use crate::speech;
use crate::table::{candidate_keys, split_base, ResponseEntry, Slot};
use crate::template::Template;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use vocanvas_protocol::Fragment;

/// What one turn says and shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Speech with cues stripped.
    pub utterance: String,
    pub ssml: String,
    pub fragment: Option<Fragment>,
    /// The fragment came from a base entry and starts a new scene.
    pub scene_change: bool,
}

struct Choice<'a> {
    key: &'a str,
    base: Option<&'a ResponseEntry>,
    entry: &'a ResponseEntry,
}

#[derive(Debug, Clone)]
pub struct Resolver {
    config: Arc<VoiceConfig>,
}

impl Resolver {
    pub fn new(config: Arc<VoiceConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VoiceConfig {
        &self.config
    }

    /// Table keys for the current action, most specific first.
    pub fn candidate_keys(&self, env: &Environment) -> Vec<String> {
        let level = self.config.level(&env.action).map(|t| t.render(env));
        candidate_keys(&env.action, level.as_deref(), env.consecutive)
    }

    pub fn resolve(&self, env: &Environment) -> Resolution {
        self.resolve_with(env, &mut rand::thread_rng())
    }

    /// Like [`Resolver::resolve`] with the candidate choice drawn from `rng`.
    pub fn resolve_with<R: Rng + ?Sized>(&self, env: &Environment, rng: &mut R) -> Resolution {
        let keys = self.candidate_keys(env);
        let body = self.pick(Slot::Response, env, &keys, rng);
        let suffix = self.pick(Slot::Suffix, env, &keys, rng);

        let body_speech = body
            .as_ref()
            .map(|c| c.entry.template.render_with(env, speech::escape))
            .unwrap_or_default();
        let suffix_speech = suffix
            .as_ref()
            .map(|c| c.entry.template.render_with(env, speech::escape))
            .unwrap_or_default();
        let speech = join_halves(&body_speech, &suffix_speech);

        let fragment = body.as_ref().and_then(|c| body_fragment(c, env));
        let scene_change = fragment.is_some()
            && body
                .as_ref()
                .is_some_and(|c| c.base.is_some() || c.entry.base);

        tracing::debug!(
            action = %env.action,
            locale = %env.locale,
            consecutive = env.consecutive,
            body_key = body.as_ref().map(|c| c.key),
            suffix_key = suffix.as_ref().map(|c| c.key),
            has_fragment = fragment.is_some(),
            "resolved response"
        );

        Resolution {
            utterance: speech::plain_text(&speech),
            ssml: speech::to_ssml(&speech),
            fragment,
            scene_change,
        }
    }

    fn pick<'a, R: Rng + ?Sized>(
        &'a self,
        slot: Slot,
        env: &Environment,
        keys: &'a [String],
        rng: &mut R,
    ) -> Option<Choice<'a>> {
        let (key, entries) = self.config.table().lookup_first(slot, &env.locale, keys)?;
        let (base, alternatives) = split_base(entries);
        let entry = *alternatives.choose(rng)?;
        if slot == Slot::Suffix && (entry.fragment.is_some() || base.is_some()) {
            tracing::debug!(key, "ignoring fragment on suffix entry");
        }
        Some(Choice { key, base, entry })
    }
}

/// Body and suffix, each trimmed, joined by one space when both are present.
pub fn join_halves(body: &str, suffix: &str) -> String {
    match (body.trim(), suffix.trim()) {
        ("", s) => s.to_string(),
        (b, "") => b.to_string(),
        (b, s) => format!("{b} {s}"),
    }
}

/// Base fragment overlaid with the chosen entry's fragment, leaves rendered.
fn body_fragment(choice: &Choice<'_>, env: &Environment) -> Option<Fragment> {
    let base = choice.base.and_then(|b| b.fragment.as_ref());
    let own = choice.entry.fragment.as_ref();
    if base.is_none() && own.is_none() {
        return None;
    }

    let mut merged = Fragment::new();
    for fields in base.into_iter().chain(own) {
        for (name, value) in fields {
            merged.insert(name.clone(), render_value(value, env));
        }
    }
    Some(merged)
}

fn render_value(value: &Value, env: &Environment) -> Value {
    match value {
        Value::String(s) => render_leaf(s, env),
        Value::Array(items) => Value::Array(items.iter().map(|v| render_value(v, env)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_value(v, env)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// A leaf that is exactly one `{{field}}` keeps the field's type.
fn render_leaf(src: &str, env: &Environment) -> Value {
    let template = Template::parse(src);
    if let Some(value) = template.single_field().and_then(|f| env.get(f)) {
        if !matches!(*value, EnvValue::Text(_)) {
            return value.to_json();
        }
    }
    Value::String(template.render(env))
}
