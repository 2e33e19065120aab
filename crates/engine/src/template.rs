//! `{{field}}` and `{{#each list}}...{{/each}}` templates rendered against an
//! [`Environment`]. Parsing is lenient: anything that is not a recognized tag is
//! kept as literal text, and an unclosed block is closed at end of input.

use crate::env::{EnvValue, Environment};
use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

const THIS: &str = "this";

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*(?:#each\s+([A-Za-z_][A-Za-z0-9_]*)|(/each)|([A-Za-z_][A-Za-z0-9_]*))\s*\}\}")
            .expect("template tag regex")
    })
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Field(String),
    Each { list: String, body: Vec<Node> },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    pub fn parse(src: &str) -> Self {
        // Stack of open blocks; the bottom entry is the template root.
        let mut stack: Vec<(Option<String>, Vec<Node>)> = vec![(None, Vec::new())];
        let mut last = 0;

        for caps in tag_re().captures_iter(src) {
            let Some(whole) = caps.get(0) else { continue };
            push_text(current(&mut stack), &src[last..whole.start()]);
            last = whole.end();

            if let Some(list) = caps.get(1) {
                stack.push((Some(list.as_str().to_string()), Vec::new()));
            } else if caps.get(2).is_some() {
                if stack.len() > 1 {
                    close_block(&mut stack);
                } else {
                    // Stray `{{/each}}` stays visible.
                    push_text(current(&mut stack), whole.as_str());
                }
            } else if let Some(field) = caps.get(3) {
                current(&mut stack).push(Node::Field(field.as_str().to_string()));
            }
        }
        push_text(current(&mut stack), &src[last..]);

        while stack.len() > 1 {
            close_block(&mut stack);
        }
        let nodes = stack.pop().map(|(_, nodes)| nodes).unwrap_or_default();
        Self { nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the field name when the template is exactly one `{{field}}` tag.
    pub fn single_field(&self) -> Option<&str> {
        match self.nodes.as_slice() {
            [Node::Field(name)] => Some(name),
            _ => None,
        }
    }

    pub fn render(&self, env: &Environment) -> String {
        self.render_with(env, verbatim)
    }

    /// Renders with every substituted value passed through `escape`. Literal
    /// template text is left alone.
    pub fn render_with(&self, env: &Environment, escape: Escape) -> String {
        let mut out = String::new();
        render_nodes(&self.nodes, env, None, escape, &mut out);
        out
    }
}

/// Applied to each substituted value before it joins the output.
pub type Escape = fn(&str) -> Cow<'_, str>;

fn verbatim(value: &str) -> Cow<'_, str> {
    Cow::Borrowed(value)
}

fn current(stack: &mut [(Option<String>, Vec<Node>)]) -> &mut Vec<Node> {
    let top = stack.len() - 1;
    &mut stack[top].1
}

fn close_block(stack: &mut Vec<(Option<String>, Vec<Node>)>) {
    if let Some((Some(list), body)) = stack.pop() {
        current(stack).push(Node::Each { list, body });
    }
}

fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Text(prev)) = nodes.last_mut() {
        prev.push_str(text);
    } else {
        nodes.push(Node::Text(text.to_string()));
    }
}

fn render_nodes(
    nodes: &[Node],
    env: &Environment,
    this: Option<&EnvValue>,
    escape: Escape,
    out: &mut String,
) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Field(name) if name == THIS => {
                if let Some(value) = this {
                    out.push_str(&escape(&value.to_string()));
                }
            }
            Node::Field(name) => {
                if let Some(value) = env.get(name) {
                    out.push_str(&escape(&value.to_string()));
                }
            }
            Node::Each { list, body } => {
                let items = if list == THIS {
                    this.and_then(EnvValue::as_list).map(<[EnvValue]>::to_vec)
                } else {
                    env.get(list).and_then(|v| v.as_list().map(<[EnvValue]>::to_vec))
                };
                for item in items.unwrap_or_default() {
                    render_nodes(body, env, Some(&item), escape, out);
                }
            }
        }
    }
}
