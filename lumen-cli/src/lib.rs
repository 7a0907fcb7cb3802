use anyhow::{Context, Result, bail};
use lumen_core::Value;
use lumen_renderer::{Component, Environment, Host, LiveNode};
use lumen_template::CompileOptions;
use std::fs;
use std::path::Path;

fn options(strict: bool) -> CompileOptions {
    CompileOptions { strict }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Compile the template at `input`. Returns the program dump when `emit` is
/// set, a one-line summary otherwise.
pub fn check_cmd(input: &Path, strict: bool, emit: bool) -> Result<String> {
    let src = read(input)?;
    let template = lumen_template::compile_with(&src, &options(strict))
        .with_context(|| format!("{} does not compile", input.display()))?;
    if emit {
        Ok(template.source().to_string())
    } else {
        Ok(format!("{}: ok", input.display()))
    }
}

/// Load a JSON object as component state.
pub fn load_state(path: &Path) -> Result<Vec<(String, Value)>> {
    let raw = read(path)?;
    let json: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    let serde_json::Value::Object(fields) = json else {
        bail!("{} must contain a JSON object", path.display());
    };
    Ok(fields.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
}

/// Mount the template at `input` on a detached document and return the HTML
/// of one synchronous pass.
pub fn render_cmd(
    input: &Path,
    state: Option<&Path>,
    styles: Option<&Path>,
    strict: bool,
) -> Result<String> {
    let mut component = Component::new(read(input)?);
    if let Some(path) = state {
        for (key, value) in load_state(path)? {
            component = component.state(key, value);
        }
    }
    if let Some(path) = styles {
        component = component.styles(&read(path)?);
    }

    let env = Environment::default().with_compile_options(options(strict));
    let host = Host::new(component, env);
    let body = LiveNode::element("body");
    host.mount(&body)
        .with_context(|| format!("failed to render {}", input.display()))?;

    let html = host
        .root()
        .map(|root| root.children().iter().map(LiveNode::to_html).collect::<String>())
        .unwrap_or_default();
    tracing::debug!(stats = ?host.last_stats(), "rendered {}", input.display());
    host.unmount();
    Ok(html)
}
