//! The environment builder pipeline.
//!
//! Builders run in registration order. Each declares the derived fields it owns;
//! registration rejects overlapping claims, and anything a builder writes outside
//! its claim is reverted after it runs, so templates only ever see declared
//! fields with the values their owners gave them.

use crate::config::VoiceConfig;
use crate::env::{EnvValue, Environment, CORE_FIELDS};
use crate::template::Template;
use serde_json::Value;
use std::collections::BTreeMap;
use vocanvas_protocol::WebhookRequest;

/// Level qualifier the number builder sets when the request exceeds the bound.
pub const OUT_OF_RANGE: &str = "outOfRange";

pub trait Builder: Send + Sync {
    fn name(&self) -> &'static str;

    /// Derived field names this builder writes.
    fn owns(&self) -> &'static [&'static str];

    /// Must be total: malformed input becomes a safe default, never a failure.
    fn build(&self, env: Environment) -> Environment;
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("builder `{builder}` claims core field `{field}`")]
    ReservedField {
        builder: &'static str,
        field: &'static str,
    },

    #[error("builder `{builder}` claims field `{field}` already owned by `{owner}`")]
    FieldConflict {
        builder: &'static str,
        field: &'static str,
        owner: &'static str,
    },
}

#[derive(Default)]
pub struct Pipeline {
    builders: Vec<Box<dyn Builder>>,
    owners: BTreeMap<&'static str, &'static str>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("builders", &self.builders.iter().map(|b| b.name()).collect::<Vec<_>>())
            .field("owners", &self.owners)
            .finish()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The color, number and page builders configured from `config`.
    pub fn standard(config: &VoiceConfig) -> Result<Self, PipelineError> {
        let mut pipeline = Self::new();
        pipeline.register(ColorBuilder)?;
        pipeline.register(NumberBuilder::new(config.max_number()))?;
        pipeline.register(PageBuilder::new(config.page_url().cloned()))?;
        Ok(pipeline)
    }

    pub fn register(&mut self, builder: impl Builder + 'static) -> Result<(), PipelineError> {
        let name = builder.name();
        for &field in builder.owns() {
            if CORE_FIELDS.contains(&field) {
                return Err(PipelineError::ReservedField {
                    builder: name,
                    field,
                });
            }
            if let Some(&owner) = self.owners.get(field) {
                return Err(PipelineError::FieldConflict {
                    builder: name,
                    field,
                    owner,
                });
            }
        }
        for &field in builder.owns() {
            self.owners.insert(field, name);
        }
        self.builders.push(Box::new(builder));
        Ok(())
    }

    pub fn declared_fields(&self) -> impl Iterator<Item = &str> {
        self.owners.keys().copied()
    }

    pub fn run(&self, mut env: Environment) -> Environment {
        for builder in &self.builders {
            let before = env.derived_snapshot();
            env = builder.build(env);
            let reverted = env.revert_unowned(&before, builder.owns());
            if !reverted.is_empty() {
                tracing::warn!(builder = builder.name(), fields = ?reverted, "reverted undeclared writes");
            }
        }
        env
    }

    /// A fresh environment for `req`, enriched by every builder. `hostname` is
    /// where the canvas page is served from, when known.
    pub fn build(&self, req: &WebhookRequest, hostname: Option<&str>) -> Environment {
        let mut env = Environment::from_request(req);
        env.hostname = hostname.map(str::to_string);
        self.run(env)
    }
}

/// Copies the `color` parameter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorBuilder;

impl Builder for ColorBuilder {
    fn name(&self) -> &'static str {
        "color"
    }

    fn owns(&self) -> &'static [&'static str] {
        &["color"]
    }

    fn build(&self, mut env: Environment) -> Environment {
        let color = match env.parameter("color") {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Null) | None => String::new(),
            Some(other) => {
                tracing::warn!(value = %other, "non-string color parameter");
                String::new()
            }
        };
        env.set("color", color);
        env
    }
}

/// Expands the `number` parameter into `numberList = [1, ..., number]`, refusing
/// anything above `max`.
#[derive(Debug, Clone, Copy)]
pub struct NumberBuilder {
    max: u32,
}

impl NumberBuilder {
    pub fn new(max: u32) -> Self {
        Self { max }
    }
}

impl Builder for NumberBuilder {
    fn name(&self) -> &'static str {
        "number"
    }

    fn owns(&self) -> &'static [&'static str] {
        &["number", "numberList", "numberMax", "numberRange"]
    }

    fn build(&self, mut env: Environment) -> Environment {
        let max = i64::from(self.max);
        let requested = env.parameter("number").and_then(parse_count);

        let (number, list, range) = match requested {
            Some(n) if n > max => {
                tracing::debug!(requested = n, max, "number out of range");
                (n, Vec::new(), OUT_OF_RANGE)
            }
            Some(n) => (n, (1..=n).map(EnvValue::Integer).collect(), ""),
            None => {
                if let Some(raw) = env.parameter("number") {
                    tracing::warn!(value = %raw, "malformed number parameter");
                }
                (0, Vec::new(), "")
            }
        };

        env.set("number", number);
        env.set("numberList", EnvValue::List(list));
        env.set("numberMax", max);
        env.set("numberRange", range);
        env
    }
}

/// Non-negative whole numbers, given as JSON numbers or numeric strings.
fn parse_count(value: &Value) -> Option<i64> {
    let n = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < 1e15).map(|f| f as i64))?,
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15)
                    .map(|f| f as i64)
            })?
        }
        _ => return None,
    };
    (n >= 0).then_some(n)
}

/// Renders the configured canvas page URL.
#[derive(Debug, Clone, Default)]
pub struct PageBuilder {
    url: Option<Template>,
}

impl PageBuilder {
    pub fn new(url: Option<Template>) -> Self {
        Self { url }
    }
}

impl Builder for PageBuilder {
    fn name(&self) -> &'static str {
        "page"
    }

    fn owns(&self) -> &'static [&'static str] {
        &["pageUrl"]
    }

    fn build(&self, mut env: Environment) -> Environment {
        if let Some(url) = &self.url {
            let rendered = url.render(&env);
            env.set("pageUrl", rendered);
        }
        env
    }
}
