use std::rc::Rc;

use tracing::debug;

use crate::error::CompileError;
use crate::expr::{Expr, parse_binding, parse_handler};
use crate::program::{AttrInstr, Handler, Instr, Repeat};
use crate::template_ast::{AttrKind, Branch, Node, TemplateAttr};

/// Lower the AST into render instructions, parsing every expression.
pub(crate) fn generate(root: &Node) -> Result<Vec<Instr>, CompileError> {
    match root {
        Node::Root(children) => gen_nodes(children),
        other => gen_nodes(std::slice::from_ref(other)),
    }
}

fn gen_nodes(nodes: &[Node]) -> Result<Vec<Instr>, CompileError> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        if let Node::Root(children) = node {
            out.extend(gen_nodes(children)?);
        } else if let Some(instr) = gen_node(node)? {
            out.push(instr);
        }
    }
    Ok(out)
}

fn gen_node(node: &Node) -> Result<Option<Instr>, CompileError> {
    Ok(Some(match node {
        Node::Root(_) => return Ok(None),
        Node::Text(t) => Instr::Text(t.clone()),
        Node::Interpolation(src) => Instr::Interpolation(parse_binding(src)?),
        Node::Element {
            tag,
            attrs,
            children,
            ..
        } => Instr::Element {
            tag: tag.clone(),
            attrs: gen_attrs(attrs)?,
            children: gen_nodes(children)?,
        },
        Node::If(branches) => {
            let mut arms = Vec::with_capacity(branches.len());
            for Branch {
                condition,
                children,
            } in branches
            {
                let condition = condition.as_deref().map(parse_binding).transpose()?;
                arms.push((condition, gen_nodes(children)?));
            }
            Instr::If(arms)
        }
        Node::For {
            declaration,
            children,
        } => {
            let Some(decl) = Declaration::parse(declaration)? else {
                debug!(declaration = %declaration, "@for without `x of xs` renders nothing");
                return Ok(None);
            };
            Instr::For(Box::new(Repeat {
                item: decl.item,
                iterable: decl.iterable,
                track: decl.track,
                aliases: decl.aliases,
                body: gen_nodes(children)?,
            }))
        }
    }))
}

fn gen_attrs(attrs: &[TemplateAttr]) -> Result<Vec<AttrInstr>, CompileError> {
    let mut out = Vec::with_capacity(attrs.len());
    for a in attrs {
        let bare = a.bare_name();
        out.push(match a.kind {
            AttrKind::Static if bare == "key" => AttrInstr::StaticKey(a.value.clone().unwrap_or_default()),
            AttrKind::Static => AttrInstr::Static {
                name: a.name.clone(),
                value: a.value.clone().unwrap_or_default(),
            },
            AttrKind::Property => {
                let src = a.value.as_deref().unwrap_or(bare);
                let expr = parse_binding(src)?;
                if bare == "key" {
                    AttrInstr::Key(expr)
                } else {
                    AttrInstr::Property {
                        name: a.name.clone(),
                        expr,
                    }
                }
            }
            AttrKind::Event => AttrInstr::Event {
                name: a.name.clone(),
                handler: Rc::new(Handler {
                    statements: parse_handler(a.value.as_deref().unwrap_or(""))?,
                }),
            },
        });
    }
    Ok(out)
}

/// `let item of items; track item.id; let i = $index, n = $count`
pub(crate) struct Declaration {
    pub item: Rc<str>,
    pub iterable: Expr,
    pub track: Option<Expr>,
    pub aliases: Vec<(Rc<str>, Rc<str>)>,
}

impl Declaration {
    /// `Ok(None)` when there is no `item of iterable` clause.
    pub(crate) fn parse(src: &str) -> Result<Option<Declaration>, CompileError> {
        let clauses = split_clauses(src);
        let Some((item, iterable)) = clauses.first().and_then(|c| split_of(c)) else {
            return Ok(None);
        };
        let mut decl = Declaration {
            item: item.into(),
            iterable: parse_binding(iterable)?,
            track: None,
            aliases: Vec::new(),
        };
        for clause in &clauses[1..] {
            if let Some(expr) = strip_word(clause, "track") {
                decl.track = Some(parse_binding(expr)?);
            } else if let Some(list) = strip_word(clause, "let") {
                for binding in list.split(',') {
                    if let Some((alias, source)) = binding.split_once('=') {
                        decl.aliases.push((alias.trim().into(), source.trim().into()));
                    }
                }
            } else if !clause.is_empty() {
                debug!(clause = %clause, "ignoring unknown @for clause");
            }
        }
        Ok(Some(decl))
    }
}

/// Split on `;` outside string literals, trimming each clause.
fn split_clauses(src: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in src.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == ';' => {
                out.push(src[start..i].trim());
                start = i + 1;
            }
            None => {}
        }
    }
    out.push(src[start..].trim());
    out
}

/// `[let|const|var] item of iterable` → (`item`, `iterable`)
fn split_of(clause: &str) -> Option<(&str, &str)> {
    let clause = ["let", "const", "var"]
        .iter()
        .find_map(|kw| strip_word(clause, kw))
        .unwrap_or(clause);
    let (item, rest) = clause.split_once(char::is_whitespace)?;
    let iterable = strip_word(rest.trim_start(), "of")?;
    let valid = item.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && item.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$');
    (valid && !iterable.is_empty()).then_some((item, iterable))
}

/// `word rest` → `rest`, requiring whitespace after `word`.
fn strip_word<'a>(s: &'a str, word: &str) -> Option<&'a str> {
    let rest = s.strip_prefix(word)?;
    rest.starts_with(char::is_whitespace).then(|| rest.trim())
}

/// Render the AST as readable pseudo-source, one `h(..)` call per element.
/// Used in compile diagnostics and by `lumen check --emit`.
pub fn emit(root: &Node) -> String {
    match root {
        Node::Root(children) => emit_children(children),
        other => emit_node(other),
    }
}

fn emit_node(n: &Node) -> String {
    match n {
        Node::Root(children) => emit_children(children),
        Node::Text(t) => format!("text({})", string_lit(t)),
        Node::Interpolation(expr) => format!("text({})", expr_src(expr)),
        Node::Element {
            tag,
            attrs,
            children,
            ..
        } => {
            let props = emit_props(attrs);
            let kids = emit_children(children);
            format!(r#"h("{tag}", {props}, {kids})"#)
        }
        Node::If(branches) => {
            let mut out = String::from("...(");
            let mut closed = false;
            for branch in branches {
                match &branch.condition {
                    Some(cond) => {
                        out.push_str(&format!("{} ? {} : ", expr_src(cond), emit_children(&branch.children)));
                    }
                    None => {
                        out.push_str(&emit_children(&branch.children));
                        closed = true;
                    }
                }
            }
            if !closed {
                out.push_str("[]");
            }
            out.push(')');
            out
        }
        Node::For {
            declaration,
            children,
        } => {
            let clauses = split_clauses(declaration);
            match clauses.first().and_then(|c| split_of(c)) {
                Some((item, iterable)) => format!(
                    "...({}).map(({item}, $index) => {})",
                    expr_src(iterable),
                    emit_children(children)
                ),
                None => "...[]".to_string(),
            }
        }
    }
}

fn emit_props(attrs: &[TemplateAttr]) -> String {
    if attrs.is_empty() {
        return "{}".to_string();
    }
    let parts: Vec<String> = attrs
        .iter()
        .map(|a| match a.kind {
            AttrKind::Static => {
                let v = a.value.clone().unwrap_or_default();
                format!("{}: {}", string_lit(&a.name), string_lit(&v))
            }
            AttrKind::Property => {
                let src = a.value.as_deref().unwrap_or(a.bare_name());
                format!("{}: {}", string_lit(&a.name), expr_src(src))
            }
            AttrKind::Event => {
                let handler = a.value.as_deref().unwrap_or("");
                let body = match parse_handler(handler) {
                    Ok(stmts) => stmts.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "),
                    Err(_) => handler.trim().to_string(),
                };
                format!("{}: ($event) => {{ {body} }}", string_lit(&a.name))
            }
        })
        .collect();
    format!("{{ {} }}", parts.join(", "))
}

fn emit_children(children: &[Node]) -> String {
    let items: Vec<String> = children.iter().map(emit_node).collect();
    format!("[{}]", items.join(", "))
}

fn expr_src(src: &str) -> String {
    parse_binding(src)
        .map(|e| e.to_string())
        .unwrap_or_else(|_| src.trim().to_string())
}

fn string_lit(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}
