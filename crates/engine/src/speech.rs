//! Speech cue handling. Response text may carry `[500ms]` pauses and
//! `[mark:'name']` timing marks; these become SSML for the speech layer and are
//! stripped from the plain utterance.
//!
//! Only the response author writes cues. Values substituted into a template go
//! through [`escape`] first, so a request parameter can never open a cue.

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;
use vocanvas_protocol::marks;

fn cue_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\\([\\\[\]'])|\[(?:(\d+(?:ms|s))|mark:'((?:[^'\]\\]|\\[\\\[\]'])*)')\]")
            .expect("speech cue regex")
    })
}

fn unescape_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\([\\\[\]'])").expect("speech unescape regex"))
}

/// Backslash-escapes the characters cue syntax is built from.
pub fn escape(value: &str) -> Cow<'_, str> {
    if !value.contains(['\\', '[', ']', '\'']) {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 4);
    for c in value.chars() {
        if matches!(c, '\\' | '[' | ']' | '\'') {
            out.push('\\');
        }
        out.push(c);
    }
    Cow::Owned(out)
}

#[derive(Debug, Clone, PartialEq)]
enum Piece<'a> {
    Text(&'a str),
    Pause(&'a str),
    Mark(String),
}

fn pieces(speech: &str) -> Vec<Piece<'_>> {
    let mut out = Vec::new();
    let mut last = 0;
    for caps in cue_re().captures_iter(speech) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > last {
            out.push(Piece::Text(&speech[last..whole.start()]));
        }
        last = whole.end();
        if let Some(escaped) = caps.get(1) {
            out.push(Piece::Text(escaped.as_str()));
        } else if let Some(pause) = caps.get(2) {
            out.push(Piece::Pause(pause.as_str()));
        } else if let Some(name) = caps.get(3) {
            out.push(Piece::Mark(unescape_re().replace_all(name.as_str(), "$1").into_owned()));
        }
    }
    if last < speech.len() {
        out.push(Piece::Text(&speech[last..]));
    }
    out
}

/// The utterance with all cues removed. Whitespace is only tidied where a cue
/// left a gap; the author's spacing is otherwise kept.
pub fn plain_text(speech: &str) -> String {
    let mut out = String::new();
    let mut after_cue = false;
    for piece in pieces(speech) {
        match piece {
            Piece::Text(text) if after_cue && (out.is_empty() || out.ends_with(char::is_whitespace)) => {
                out.push_str(text.trim_start());
                after_cue = text.trim().is_empty();
            }
            Piece::Text(text) => {
                out.push_str(text);
                after_cue = false;
            }
            Piece::Pause(_) | Piece::Mark(_) => after_cue = true,
        }
    }
    if after_cue {
        out.truncate(out.trim_end().len());
    }
    out
}

/// Wraps the utterance in `<speak>` with `START` / `END` marks around it.
pub fn to_ssml(speech: &str) -> String {
    let mut out = String::from("<speak>");
    push_mark(&mut out, marks::START);
    for piece in pieces(speech) {
        match piece {
            Piece::Text(text) => out.push_str(&html_escape::encode_text(text)),
            Piece::Pause(time) => out.push_str(&format!("<break time=\"{time}\"/>")),
            Piece::Mark(name) => push_mark(&mut out, &name),
        }
    }
    push_mark(&mut out, marks::END);
    out.push_str("</speak>");
    out
}

fn push_mark(out: &mut String, name: &str) {
    out.push_str("<mark name=\"");
    out.push_str(&html_escape::encode_double_quoted_attribute(name));
    out.push_str("\"/>");
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNTING: &str = "Here we go. [500ms][mark:'number-1']1 [500ms][mark:'number-2']2 ";

    #[test]
    fn plain_text_strips_cues() {
        assert_eq!(plain_text(COUNTING), "Here we go. 1 2 ");
        assert_eq!(plain_text("a [500ms] b"), "a b");
        assert_eq!(plain_text("[mark:'x'] hi [mark:'y']"), "hi");
    }

    #[test]
    fn plain_text_keeps_spacing_away_from_cues() {
        assert_eq!(plain_text("one,  two"), "one,  two");
        assert_eq!(plain_text("  padded "), "  padded ");
    }

    #[test]
    fn ssml_brackets_speech_with_sentinels() {
        let ssml = to_ssml(COUNTING);
        assert!(ssml.starts_with("<speak><mark name=\"START\"/>Here we go. "));
        assert!(ssml.contains("<break time=\"500ms\"/><mark name=\"number-1\"/>1 "));
        assert!(ssml.ends_with("<mark name=\"END\"/></speak>"));
    }

    #[test]
    fn ssml_escapes_text() {
        assert_eq!(
            to_ssml("salt & pepper"),
            "<speak><mark name=\"START\"/>salt &amp; pepper<mark name=\"END\"/></speak>"
        );
    }

    #[test]
    fn escaped_values_are_spoken_not_cued() {
        let value = "red[mark:'START'][9000s]";
        let speech = format!("I like {} a lot.", escape(value));

        let ssml = to_ssml(&speech);
        assert_eq!(ssml.matches("<mark name=\"START\"/>").count(), 1);
        assert!(!ssml.contains("<break"));
        assert!(ssml.contains("red[mark:'START'][9000s]"));
        assert_eq!(plain_text(&speech), "I like red[mark:'START'][9000s] a lot.");
    }

    #[test]
    fn escaped_values_inside_a_mark_name_stay_in_the_name() {
        let speech = format!("[mark:'n-{}']x", escape("a']b"));
        assert_eq!(
            to_ssml(&speech),
            "<speak><mark name=\"START\"/><mark name=\"n-a']b\"/>x<mark name=\"END\"/></speak>"
        );
    }

    #[test]
    fn escape_leaves_plain_values_alone() {
        assert!(matches!(escape("blue"), Cow::Borrowed("blue")));
        assert_eq!(escape(r"a\b"), r"a\\b");
    }
}
