//! Locale -> action key -> response candidates, with a parallel suffix table.

use crate::template::Template;
use serde::Deserialize;
use std::collections::BTreeMap;
use vocanvas_protocol::{Fragment, DEFAULT_LOCALE};

/// Last key tried for any action.
pub const DEFAULT_KEY: &str = "Default";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Response,
    Suffix,
}

/// One equally valid alternative for a response slot.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawEntry")]
pub struct ResponseEntry {
    pub fragment: Option<Fragment>,
    /// Shared by every other candidate in the same list instead of being a
    /// candidate itself. Its fragment starts a new scene on the canvas.
    pub base: bool,
    pub template: Template,
}

impl ResponseEntry {
    pub fn text(template: &str) -> Self {
        Self {
            fragment: None,
            base: false,
            template: Template::parse(template),
        }
    }

    pub fn with_fragment(mut self, fragment: Fragment, base: bool) -> Self {
        self.fragment = Some(fragment);
        self.base = base;
        self
    }
}

/// Config shape: either a bare template string or a full entry.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Text(String),
    Full {
        #[serde(default)]
        fragment: Option<Fragment>,
        #[serde(default)]
        base: bool,
        #[serde(default)]
        template: String,
    },
}

impl From<RawEntry> for ResponseEntry {
    fn from(raw: RawEntry) -> Self {
        match raw {
            RawEntry::Text(template) => Self::text(&template),
            RawEntry::Full {
                fragment,
                base,
                template,
            } => Self {
                fragment,
                base,
                template: Template::parse(&template),
            },
        }
    }
}

pub type KeyedEntries = BTreeMap<String, Vec<ResponseEntry>>;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocaleEntries {
    #[serde(default)]
    pub response: KeyedEntries,
    #[serde(default)]
    pub suffix: KeyedEntries,
}

impl LocaleEntries {
    fn slot(&self, slot: Slot) -> &KeyedEntries {
        match slot {
            Slot::Response => &self.response,
            Slot::Suffix => &self.suffix,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResponseTable {
    locales: BTreeMap<String, LocaleEntries>,
}

impl ResponseTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, locale: &str, slot: Slot, key: &str, entries: Vec<ResponseEntry>) {
        let local = self.locales.entry(locale.to_string()).or_default();
        let keyed = match slot {
            Slot::Response => &mut local.response,
            Slot::Suffix => &mut local.suffix,
        };
        keyed.insert(key.to_string(), entries);
    }

    /// Overlays `other` on this table. A key present in both is replaced wholesale.
    pub fn merge(&mut self, other: BTreeMap<String, LocaleEntries>) {
        for (locale, entries) in other {
            let local = self.locales.entry(locale).or_default();
            local.response.extend(entries.response);
            local.suffix.extend(entries.suffix);
        }
    }

    /// Entries for `key`, walking the locale chain down to the default locale.
    pub fn lookup(&self, slot: Slot, locale: &str, key: &str) -> Option<&[ResponseEntry]> {
        locale_chain(locale).into_iter().find_map(|tag| {
            self.locales
                .get(tag)
                .and_then(|l| l.slot(slot).get(key))
                .map(Vec::as_slice)
        })
    }

    /// The first key in `keys` with any entries, together with those entries.
    /// The more specific key wins even when it only exists in a fallback locale.
    pub fn lookup_first<'a>(
        &'a self,
        slot: Slot,
        locale: &str,
        keys: &'a [String],
    ) -> Option<(&'a str, &'a [ResponseEntry])> {
        keys.iter()
            .find_map(|key| self.lookup(slot, locale, key).map(|e| (key.as_str(), e)))
    }

    pub fn is_empty(&self) -> bool {
        self.locales.is_empty()
    }
}

/// Splits a candidate list into its base entry (the first one marked `base`) and
/// the selectable alternatives. A list holding only a base entry selects it.
pub fn split_base(entries: &[ResponseEntry]) -> (Option<&ResponseEntry>, Vec<&ResponseEntry>) {
    let base = entries.iter().find(|e| e.base);
    let alternatives: Vec<&ResponseEntry> = entries.iter().filter(|e| !e.base).collect();
    match (base, alternatives.is_empty()) {
        (Some(base), true) => (None, vec![base]),
        _ => (base, alternatives),
    }
}

/// `en-US` -> `["en-US", "en", "und"]`.
pub fn locale_chain(locale: &str) -> Vec<&str> {
    let mut chain = Vec::with_capacity(3);
    if !locale.is_empty() {
        chain.push(locale);
    }
    if let Some((primary, _)) = locale.split_once(['-', '_']) {
        if !primary.is_empty() {
            chain.push(primary);
        }
    }
    if !chain.contains(&DEFAULT_LOCALE) {
        chain.push(DEFAULT_LOCALE);
    }
    chain
}

/// Keys to try for `action`, most specific first: the level qualifier, the
/// 1-based turn index, the bare action, then [`DEFAULT_KEY`].
pub fn candidate_keys(action: &str, level: Option<&str>, consecutive: u32) -> Vec<String> {
    let mut keys = Vec::with_capacity(4);
    if let Some(level) = level.map(str::trim).filter(|l| !l.is_empty()) {
        keys.push(format!("{action}.{level}"));
    }
    if consecutive > 0 {
        let indexed = format!("{action}.{consecutive}");
        if !keys.contains(&indexed) {
            keys.push(indexed);
        }
    }
    keys.push(action.to_string());
    if action != DEFAULT_KEY {
        keys.push(DEFAULT_KEY.to_string());
    }
    keys
}
