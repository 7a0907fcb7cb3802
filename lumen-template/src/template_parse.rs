use tracing::debug;

use crate::CompileOptions;
use crate::error::CompileError;
use crate::template_ast::{Branch, Node, TemplateAttr};

/// Elements that never have content and therefore never open a frame.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Parse a template into a [`Node::Root`].
///
/// A single left-to-right scan over the bytes with an explicit stack of open
/// frames (root at the bottom). The scan is tolerant: unclosed frames are
/// closed at the end, a close tag pops every frame above its match, a close
/// tag without a match and a dangling `@else` are dropped, and a `}` only
/// closes a frame when a control block is on top. With
/// [`CompileOptions::strict`] the dropped and implicitly closed control
/// constructs become [`CompileError::Structure`].
pub fn parse_template(input: &str, options: &CompileOptions) -> Result<Node, CompileError> {
    Parser {
        src: input,
        bytes: input.as_bytes(),
        i: 0,
        stack: vec![Frame {
            kind: FrameKind::Root,
            children: Vec::new(),
            offset: 0,
        }],
        text: String::new(),
        strict: options.strict,
    }
    .parse()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arm {
    If,
    ElseIf,
    Else,
}

enum FrameKind {
    Root,
    Element { tag: String, attrs: Vec<TemplateAttr> },
    Branch { arm: Arm, condition: Option<String> },
    For { declaration: String },
}

struct Frame {
    kind: FrameKind,
    children: Vec<Node>,
    offset: usize,
}

impl Frame {
    fn is_control(&self) -> bool {
        matches!(self.kind, FrameKind::Branch { .. } | FrameKind::For { .. })
    }

    fn closes_tag(&self, name: &str) -> bool {
        matches!(&self.kind, FrameKind::Element { tag, .. } if tag.eq_ignore_ascii_case(name))
    }
}

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    i: usize,
    stack: Vec<Frame>,
    text: String,
    strict: bool,
}

impl Parser<'_> {
    fn parse(mut self) -> Result<Node, CompileError> {
        while self.i < self.bytes.len() {
            match self.bytes[self.i] {
                b'<' if self.src[self.i..].starts_with("<!--") => self.skip_comment(),
                b'<' if self.peek(1) == Some(b'/') => {
                    self.flush_text();
                    self.close_tag()?;
                }
                b'<' if self.peek(1).is_some_and(|b| b.is_ascii_alphabetic()) => {
                    self.flush_text();
                    self.open_tag();
                }
                b'{' if self.peek(1) == Some(b'{') => self.interpolation(),
                b'}' if self.top().is_control() => {
                    self.flush_text();
                    self.i += 1;
                    self.close_top()?;
                }
                b'@' => {
                    if !self.control_open() {
                        self.literal(1);
                    }
                }
                _ => self.text_run(),
            }
        }
        self.flush_text();

        while self.stack.len() > 1 {
            if self.strict && self.top().is_control() {
                return Err(self.structure(self.top().offset, "unclosed control block"));
            }
            self.close_top()?;
        }
        let root = self.stack.pop().map(|f| f.children).unwrap_or_default();
        Ok(Node::Root(normalize(root)))
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.i + ahead).copied()
    }

    fn top(&self) -> &Frame {
        // the root frame is never popped while scanning
        &self.stack[self.stack.len() - 1]
    }

    fn push_node(&mut self, node: Node) {
        if let Some(frame) = self.stack.last_mut() {
            frame.children.push(node);
        }
    }

    fn structure(&self, offset: usize, message: impl Into<String>) -> CompileError {
        CompileError::Structure {
            offset,
            message: message.into(),
        }
    }

    fn literal(&mut self, len: usize) {
        let end = (self.i + len).min(self.bytes.len());
        self.text.push_str(&self.src[self.i..end]);
        self.i = end;
    }

    fn text_run(&mut self) {
        let start = self.i;
        self.i += 1;
        while self.i < self.bytes.len() && !matches!(self.bytes[self.i], b'<' | b'{' | b'}' | b'@') {
            self.i += 1;
        }
        self.text.push_str(&self.src[start..self.i]);
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            let text = std::mem::take(&mut self.text);
            self.push_node(Node::Text(text));
        }
    }

    fn skip_comment(&mut self) {
        match self.src[self.i + 4..].find("-->") {
            Some(end) => self.i += 4 + end + 3,
            None => self.i = self.bytes.len(),
        }
    }

    fn interpolation(&mut self) {
        match find_interpolation_end(&self.bytes[self.i + 2..]) {
            Some(len) => {
                let expr = self.src[self.i + 2..self.i + 2 + len].trim().to_string();
                self.flush_text();
                self.push_node(Node::Interpolation(expr));
                self.i += 2 + len + 2;
            }
            None => {
                debug!(offset = self.i, "unterminated interpolation kept as text");
                self.literal(2);
            }
        }
    }

    fn open_tag(&mut self) {
        let offset = self.i;
        self.i += 1;
        let tag = read_name(self.bytes, &mut self.i, |c| {
            c.is_ascii_alphanumeric() || matches!(c, b'-' | b'_' | b':' | b'.')
        });
        let mut attrs = Vec::new();
        let mut self_closing = false;

        loop {
            skip_ws(self.bytes, &mut self.i);
            match self.bytes.get(self.i) {
                None => break,
                Some(b'>') => {
                    self.i += 1;
                    break;
                }
                Some(b'/') => {
                    self_closing = true;
                    self.i += 1;
                }
                Some(_) => match read_attribute(self.src, &mut self.i) {
                    Some(attr) => {
                        self_closing = false;
                        attrs.push(attr);
                    }
                    None => self.i += 1,
                },
            }
        }

        let void = VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(&tag));
        if self_closing || void {
            self.push_node(Node::Element {
                tag,
                attrs,
                children: Vec::new(),
                self_closing,
            });
        } else {
            self.stack.push(Frame {
                kind: FrameKind::Element { tag, attrs },
                children: Vec::new(),
                offset,
            });
        }
    }

    fn close_tag(&mut self) -> Result<(), CompileError> {
        let offset = self.i;
        self.i += 2;
        let tag = read_name(self.bytes, &mut self.i, |c| {
            c.is_ascii_alphanumeric() || matches!(c, b'-' | b'_' | b':' | b'.')
        });
        while self.i < self.bytes.len() && self.bytes[self.i] != b'>' {
            self.i += 1;
        }
        self.i = (self.i + 1).min(self.bytes.len());

        let Some(pos) = self.stack.iter().rposition(|f| f.closes_tag(&tag)) else {
            if self.strict {
                return Err(self.structure(offset, format!("unmatched close tag </{tag}>")));
            }
            debug!(offset, tag = %tag, "ignoring unmatched close tag");
            return Ok(());
        };
        while self.stack.len() > pos + 1 {
            if self.strict && self.top().is_control() {
                return Err(self.structure(
                    self.top().offset,
                    format!("control block left open inside <{tag}>"),
                ));
            }
            self.close_top()?;
        }
        self.close_top()
    }

    /// Try to open `@if`, `@else if`, `@else` or `@for` at the cursor.
    /// Returns `false` (and consumes nothing) when the `@` is plain text.
    fn control_open(&mut self) -> bool {
        let offset = self.i;
        let mut j = self.i + 1;
        let (arm, keyword) = if keyword_at(self.bytes, j, "if") {
            j += 2;
            (Some(Arm::If), "if")
        } else if keyword_at(self.bytes, j, "for") {
            j += 3;
            (None, "for")
        } else if keyword_at(self.bytes, j, "else") {
            j += 4;
            let mut k = j;
            skip_ws(self.bytes, &mut k);
            if keyword_at(self.bytes, k, "if") {
                j = k + 2;
                (Some(Arm::ElseIf), "else if")
            } else {
                (Some(Arm::Else), "else")
            }
        } else {
            return false;
        };

        let head = if arm == Some(Arm::Else) {
            None
        } else {
            skip_ws(self.bytes, &mut j);
            match read_parens(self.src, &mut j) {
                Some(head) => Some(head),
                None => {
                    debug!(offset, keyword, "control keyword without `(..)` kept as text");
                    return false;
                }
            }
        };
        skip_ws(self.bytes, &mut j);
        if self.bytes.get(j) != Some(&b'{') {
            debug!(offset, keyword, "control keyword without `{{` kept as text");
            return false;
        }

        self.flush_text();
        self.i = j + 1;
        let kind = match arm {
            Some(arm) => FrameKind::Branch {
                arm,
                condition: head,
            },
            None => FrameKind::For {
                declaration: head.unwrap_or_default(),
            },
        };
        self.stack.push(Frame {
            kind,
            children: Vec::new(),
            offset,
        });
        true
    }

    fn close_top(&mut self) -> Result<(), CompileError> {
        if self.stack.len() < 2 {
            return Ok(());
        }
        let Some(frame) = self.stack.pop() else {
            return Ok(());
        };
        let children = normalize(frame.children);
        match frame.kind {
            FrameKind::Root => {}
            FrameKind::Element { tag, attrs } => self.push_node(Node::Element {
                tag,
                attrs,
                children,
                self_closing: false,
            }),
            FrameKind::For { declaration } => self.push_node(Node::For {
                declaration,
                children,
            }),
            FrameKind::Branch {
                arm: Arm::If,
                condition,
            } => self.push_node(Node::If(vec![Branch {
                condition,
                children,
            }])),
            FrameKind::Branch { arm, condition } => {
                let branch = Branch {
                    condition,
                    children,
                };
                if !self.attach_else(branch) {
                    let label = if arm == Arm::ElseIf { "@else if" } else { "@else" };
                    if self.strict {
                        return Err(self.structure(
                            frame.offset,
                            format!("{label} without a preceding @if"),
                        ));
                    }
                    debug!(offset = frame.offset, "dropping dangling {label}");
                }
            }
        }
        Ok(())
    }

    /// Append an `@else` / `@else if` arm to the `@if` right before it.
    fn attach_else(&mut self, branch: Branch) -> bool {
        let Some(frame) = self.stack.last_mut() else {
            return false;
        };
        let previous = frame.children.iter_mut().rev().find(|n| !n.is_blank_text());
        match previous {
            Some(Node::If(branches))
                if branches.last().is_some_and(|b| b.condition.is_some()) =>
            {
                branches.push(branch);
                true
            }
            _ => false,
        }
    }
}

/// Drop whitespace-only text, except a single space between two inline
/// neighbours (`{{ a }} {{ b }}`).
fn normalize(children: Vec<Node>) -> Vec<Node> {
    let keep: Vec<bool> = (0..children.len())
        .map(|n| {
            !children[n].is_blank_text()
                || (n > 0
                    && children[n - 1].is_inline()
                    && children.get(n + 1).is_some_and(Node::is_inline))
        })
        .collect();
    children
        .into_iter()
        .zip(keep)
        .filter_map(|(node, keep)| match (node, keep) {
            (_, false) => None,
            (node, true) if node.is_blank_text() => Some(Node::Text(" ".to_string())),
            (node, true) => Some(node),
        })
        .collect()
}

fn skip_ws(bytes: &[u8], i: &mut usize) {
    while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
        *i += 1;
    }
}

fn read_name(bytes: &[u8], i: &mut usize, allowed: impl Fn(u8) -> bool) -> String {
    let start = *i;
    while *i < bytes.len() && allowed(bytes[*i]) {
        *i += 1;
    }
    String::from_utf8_lossy(&bytes[start..*i]).into_owned()
}

/// `word` at `at`, followed by whitespace, `(` or `{`.
fn keyword_at(bytes: &[u8], at: usize, word: &str) -> bool {
    bytes.get(at..at + word.len()) == Some(word.as_bytes())
        && bytes
            .get(at + word.len())
            .is_some_and(|b| b.is_ascii_whitespace() || matches!(b, b'(' | b'{'))
}

/// Read a balanced `( .. )` group starting at `i`, returning the trimmed
/// inside. Parentheses inside string literals do not count.
fn read_parens(src: &str, i: &mut usize) -> Option<String> {
    let bytes = src.as_bytes();
    if bytes.get(*i) != Some(&b'(') {
        return None;
    }
    let start = *i + 1;
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut j = *i;
    while j < bytes.len() {
        let b = bytes[j];
        match quote {
            Some(_) if b == b'\\' => j += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'\'' | b'"' | b'`' => quote = Some(b),
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        *i = j + 1;
                        return Some(src[start..j].trim().to_string());
                    }
                }
                _ => {}
            },
        }
        j += 1;
    }
    None
}

/// Offset of the `}}` closing an interpolation. Quoted string literals and
/// balanced object-literal braces are skipped.
fn find_interpolation_end(bytes: &[u8]) -> Option<usize> {
    let mut quote: Option<u8> = None;
    let mut depth = 0usize;
    let mut j = 0;
    while j < bytes.len() {
        let b = bytes[j];
        match quote {
            Some(_) if b == b'\\' => j += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if depth == 0 && bytes[j..].starts_with(b"}}") => return Some(j),
            None => match b {
                b'\'' | b'"' | b'`' => quote = Some(b),
                b'{' => depth += 1,
                b'}' => depth = depth.saturating_sub(1),
                _ => {}
            },
        }
        j += 1;
    }
    None
}

fn read_attribute(src: &str, i: &mut usize) -> Option<TemplateAttr> {
    let bytes = src.as_bytes();
    let name = read_name(bytes, i, |c| {
        !c.is_ascii_whitespace() && !matches!(c, b'=' | b'>' | b'/' | b'"' | b'\'')
    });
    if name.is_empty() {
        return None;
    }

    let mut j = *i;
    skip_ws(bytes, &mut j);
    if bytes.get(j) != Some(&b'=') {
        return Some(TemplateAttr::new(name, None));
    }
    j += 1;
    skip_ws(bytes, &mut j);
    *i = j;

    let value = match bytes.get(*i) {
        Some(&q) if q == b'"' || q == b'\'' => {
            let start = *i + 1;
            let end = bytes[start..]
                .iter()
                .position(|&b| b == q)
                .map_or(bytes.len(), |p| start + p);
            *i = (end + 1).min(bytes.len());
            src[start..end].to_string()
        }
        _ => {
            let start = *i;
            while *i < bytes.len() && !bytes[*i].is_ascii_whitespace() && bytes[*i] != b'>' {
                *i += 1;
            }
            src[start..*i].to_string()
        }
    };
    Some(TemplateAttr::new(name, Some(value)))
}
