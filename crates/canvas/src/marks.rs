//! Speech mark accumulation for the current utterance.
//!
//! The start sentinel always resets the log, whatever came before it; this is the
//! only way a stale utterance's late marks get discarded.

use vocanvas_protocol::marks;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkPhase {
    /// No utterance has started yet; the log is the raw mark stream so far.
    #[default]
    Idle,
    Accumulating,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkLog {
    phase: MarkPhase,
    entries: Vec<String>,
}

impl MarkLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one mark and returns the next log.
    pub fn on_mark(mut self, mark: &str) -> Self {
        if mark == marks::START {
            self.entries.clear();
            self.entries.push(mark.to_string());
            self.phase = MarkPhase::Accumulating;
            return self;
        }
        if self.phase == MarkPhase::Idle {
            tracing::debug!(mark, "mark received before utterance start");
        }
        self.entries.push(mark.to_string());
        self
    }

    pub fn phase(&self) -> MarkPhase {
        self.phase
    }

    /// Every mark of the current utterance, sentinels included.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn last(&self) -> Option<&str> {
        self.entries.last().map(String::as_str)
    }

    /// Playback reached the end sentinel.
    pub fn finished(&self) -> bool {
        self.last() == Some(marks::END)
    }

    /// Marks to reveal on screen: everything except the sentinels.
    pub fn visible(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .map(String::as_str)
            .filter(|m| !marks::is_sentinel(m))
    }
}
