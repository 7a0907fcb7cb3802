use std::cell::RefCell;
use std::rc::Rc;

use lumen_dom::{Props, VNode, h, text};

/// One top-level block of a stylesheet.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// `a, .b { key: value; }`
    Style {
        selectors: Vec<String>,
        decls: Vec<(String, String)>,
    },
    /// `@media (..) { .. }`, kept verbatim.
    At { prelude: String, body: String },
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Stylesheet {
    pub rules: Vec<Rule>,
}

impl Stylesheet {
    /// Small rule parser: selector lists with declaration blocks, at-rules
    /// kept as raw text, comments dropped. Blocks without a selector or
    /// without declarations are skipped.
    pub fn parse(css: &str) -> Self {
        let css = strip_comments(css);
        let mut rules = Vec::new();
        let mut rest = css.as_str();
        while let Some(open) = rest.find('{') {
            let prelude = rest[..open].trim();
            let Some(close) = matching_brace(rest, open) else {
                tracing::warn!(prelude, "unterminated css block");
                break;
            };
            let body = &rest[open + 1..close];
            rest = &rest[close + 1..];

            if prelude.starts_with('@') {
                rules.push(Rule::At {
                    prelude: prelude.to_string(),
                    body: body.trim().to_string(),
                });
                continue;
            }
            let selectors: Vec<String> = prelude
                .split(',')
                .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
                .filter(|s| !s.is_empty())
                .collect();
            let decls: Vec<(String, String)> = body
                .split(';')
                .filter_map(|decl| decl.split_once(':'))
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .filter(|(k, v)| !k.is_empty() && !v.is_empty())
                .collect();
            if selectors.is_empty() || decls.is_empty() {
                continue;
            }
            rules.push(Rule::Style { selectors, decls });
        }
        Stylesheet { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Normalised serialisation, one rule per line.
    pub fn to_css(&self) -> String {
        let lines: Vec<String> = self
            .rules
            .iter()
            .map(|rule| match rule {
                Rule::Style { selectors, decls } => {
                    let body: Vec<String> = decls.iter().map(|(k, v)| format!("{k}: {v};")).collect();
                    format!("{} {{ {} }}", selectors.join(", "), body.join(" "))
                }
                Rule::At { prelude, body } => format!("{prelude} {{ {body} }}"),
            })
            .collect();
        lines.join("\n")
    }
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => rest = "",
        }
    }
    out.push_str(rest);
    out
}

fn matching_brace(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Where a style node came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleOrigin {
    Component,
    Global,
}

impl StyleOrigin {
    fn as_str(self) -> &'static str {
        match self {
            StyleOrigin::Component => "component",
            StyleOrigin::Global => "global",
        }
    }
}

/// `<style data-lumen="..">css</style>`
pub fn style_node(sheet: &Stylesheet, origin: StyleOrigin) -> VNode {
    h(
        "style",
        Props::new().set("data-lumen", origin.as_str()),
        vec![text(sheet.to_css())],
    )
}

/// Ambient stylesheets shared by every host of an environment. Cloning
/// shares the same collection.
#[derive(Debug, Clone, Default)]
pub struct GlobalStyles(Rc<RefCell<Vec<Stylesheet>>>);

impl GlobalStyles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, sheet: Stylesheet) {
        self.0.borrow_mut().push(sheet);
    }

    pub fn add_css(&self, css: &str) {
        self.add(Stylesheet::parse(css));
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// One style node per sheet, in insertion order.
    pub fn nodes(&self) -> Vec<VNode> {
        self.0
            .borrow()
            .iter()
            .map(|sheet| style_node(sheet, StyleOrigin::Global))
            .collect()
    }
}
