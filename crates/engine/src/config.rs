//! Response configuration, assembled once at startup from named YAML fragments.
//!
//! Fragments are merged in the order given: a later fragment replaces the entry
//! lists, level templates and settings of an earlier one key by key. The result is
//! immutable and shared by reference for the life of the process.

use crate::table::{LocaleEntries, ResponseTable};
use crate::template::Template;
use anyhow::Context;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Largest count the number builder will expand into a list.
pub const DEFAULT_MAX_NUMBER: u32 = 100;

const BUILTIN: &[(&str, &str)] = &[
    ("index", include_str!("../responses/index.yaml")),
    ("action", include_str!("../responses/action.yaml")),
    ("color", include_str!("../responses/color.yaml")),
    ("number", include_str!("../responses/number.yaml")),
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFragment {
    /// Action -> template producing a key qualifier (see `table::candidate_keys`).
    #[serde(default)]
    pub level: BTreeMap<String, String>,
    #[serde(default)]
    pub locales: BTreeMap<String, LocaleEntries>,
    #[serde(default)]
    pub settings: SettingsFragment,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsFragment {
    #[serde(default)]
    pub page_url: Option<String>,
    #[serde(default)]
    pub max_number: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct VoiceConfig {
    table: ResponseTable,
    levels: BTreeMap<String, Template>,
    page_url: Option<Template>,
    max_number: u32,
    sources: Vec<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            table: ResponseTable::new(),
            levels: BTreeMap::new(),
            page_url: None,
            max_number: DEFAULT_MAX_NUMBER,
            sources: Vec::new(),
        }
    }
}

impl VoiceConfig {
    pub fn assemble<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = (S, ConfigFragment)>,
        S: Into<String>,
    {
        let mut config = Self::default();
        for (name, fragment) in fragments {
            let name = name.into();
            tracing::debug!(
                fragment = %name,
                locales = fragment.locales.len(),
                levels = fragment.level.len(),
                "merging response config fragment"
            );
            config.table.merge(fragment.locales);
            for (action, level) in fragment.level {
                config.levels.insert(action, Template::parse(&level));
            }
            if let Some(url) = fragment.settings.page_url {
                config.page_url = Some(Template::parse(&url));
            }
            if let Some(max) = fragment.settings.max_number {
                config.max_number = max;
            }
            config.sources.push(name);
        }
        config
    }

    /// The configuration compiled into the binary.
    pub fn builtin() -> anyhow::Result<Self> {
        Ok(Self::assemble(builtin_fragments()?))
    }

    /// Built-in fragments, then every `*.yaml` / `*.yml` file in `dir` in file-name order.
    pub fn load(dir: Option<&Path>) -> anyhow::Result<Self> {
        let mut fragments = builtin_fragments()?;
        if let Some(dir) = dir {
            fragments.extend(load_dir(dir)?);
        }
        let config = Self::assemble(fragments);
        tracing::info!(
            sources = ?config.sources,
            max_number = config.max_number,
            "response config assembled"
        );
        Ok(config)
    }

    pub fn with_max_number(mut self, max: u32) -> Self {
        self.max_number = max;
        self
    }

    pub fn table(&self) -> &ResponseTable {
        &self.table
    }

    pub fn level(&self, action: &str) -> Option<&Template> {
        self.levels.get(action)
    }

    pub fn page_url(&self) -> Option<&Template> {
        self.page_url.as_ref()
    }

    pub fn max_number(&self) -> u32 {
        self.max_number
    }

    /// Fragment names in merge order.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }
}

pub fn parse_fragment(name: &str, yaml: &str) -> anyhow::Result<ConfigFragment> {
    serde_yaml::from_str(yaml).with_context(|| format!("parse response config `{name}`"))
}

pub fn builtin_fragments() -> anyhow::Result<Vec<(String, ConfigFragment)>> {
    BUILTIN
        .iter()
        .map(|(name, yaml)| Ok((name.to_string(), parse_fragment(name, yaml)?)))
        .collect()
}

pub fn load_dir(dir: &Path) -> anyhow::Result<Vec<(String, ConfigFragment)>> {
    let mut paths = Vec::new();
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("read config dir: {}", dir.display()))?
    {
        let path = entry?.path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "yaml" || e == "yml");
        if is_yaml && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut fragments = Vec::with_capacity(paths.len());
    for path in paths {
        let yaml = std::fs::read_to_string(&path)
            .with_context(|| format!("read response config: {}", path.display()))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        fragments.push((name.clone(), parse_fragment(&name, &yaml)?));
    }
    Ok(fragments)
}
