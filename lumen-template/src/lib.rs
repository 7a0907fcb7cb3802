//! Template compiler: parses `@if` / `@for` / `[prop]` / `(event)` /
//! `{{ expr | pipe }}` templates into cached render programs.

pub mod error;
pub mod eval;
pub mod expr;
pub mod pipes;
pub mod program;
pub mod refs;
pub mod template_ast;
pub mod template_codegen;
pub mod template_parse;

pub use error::{CompileError, EvalError};
pub use eval::{EmptyScope, Locals, Scope};
pub use pipes::{JsonPipe, LowercasePipe, Pipe, PipeRegistry, UppercasePipe};
pub use program::Template;
pub use refs::{RefRegistry, RefSnapshot};
pub use template_ast::{AttrKind, Branch, Node, TemplateAttr};
pub use template_parse::parse_template;

/// Compiler switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Reject structural anomalies the default parser tolerates: a control
    /// block left open, a dangling `@else`, an unmatched close tag.
    pub strict: bool,
}

impl CompileOptions {
    pub fn strict() -> Self {
        Self { strict: true }
    }
}

pub fn compile(source: &str) -> Result<Template, CompileError> {
    compile_with(source, &CompileOptions::default())
}

/// Parse and lower `source`. On failure the error is logged together with
/// the generated program text before being returned.
pub fn compile_with(source: &str, options: &CompileOptions) -> Result<Template, CompileError> {
    let ast = parse_template(source, options).inspect_err(|err| {
        tracing::error!(%err, "template compilation failed");
    })?;
    let program = template_codegen::emit(&ast);
    match template_codegen::generate(&ast) {
        Ok(nodes) => {
            tracing::trace!(roots = nodes.len(), "compiled template");
            Ok(Template::new(nodes, program))
        }
        Err(err) => {
            tracing::error!(%err, %program, "template compilation failed");
            Err(err)
        }
    }
}
