use std::fmt;
use std::rc::Rc;

use lumen_core::Value;
use rustc_hash::FxHashMap;

use crate::error::EvalError;

/// A value transform applied with `expr | name:arg`.
pub trait Pipe {
    fn transform(&self, value: Value, args: &[Value]) -> Result<Value, EvalError>;

    /// Called once when the owning host is torn down.
    fn on_destroy(&self) {}
}

impl<F> Pipe for F
where
    F: Fn(Value, &[Value]) -> Result<Value, EvalError>,
{
    fn transform(&self, value: Value, args: &[Value]) -> Result<Value, EvalError> {
        self(value, args)
    }
}

pub struct UppercasePipe;

impl Pipe for UppercasePipe {
    fn transform(&self, value: Value, _args: &[Value]) -> Result<Value, EvalError> {
        Ok(Value::from(value.to_string().to_uppercase()))
    }
}

pub struct LowercasePipe;

impl Pipe for LowercasePipe {
    fn transform(&self, value: Value, _args: &[Value]) -> Result<Value, EvalError> {
        Ok(Value::from(value.to_string().to_lowercase()))
    }
}

/// Pretty-printed JSON.
pub struct JsonPipe;

impl Pipe for JsonPipe {
    fn transform(&self, value: Value, _args: &[Value]) -> Result<Value, EvalError> {
        serde_json::to_string_pretty(&value.to_json())
            .map(Value::from)
            .map_err(|e| EvalError::pipe("json", e.to_string()))
    }
}

/// Name → pipe lookup owned by one component.
#[derive(Clone, Default)]
pub struct PipeRegistry {
    pipes: FxHashMap<String, Rc<dyn Pipe>>,
}

impl PipeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `uppercase`, `lowercase` and `json`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("uppercase", UppercasePipe);
        registry.register("lowercase", LowercasePipe);
        registry.register("json", JsonPipe);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, pipe: impl Pipe + 'static) {
        self.pipes.insert(name.into(), Rc::new(pipe));
    }

    pub fn get(&self, name: &str) -> Option<Rc<dyn Pipe>> {
        self.pipes.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pipes.contains_key(name)
    }

    /// Run every pipe's teardown hook.
    pub fn destroy_all(&self) {
        for pipe in self.pipes.values() {
            pipe.on_destroy();
        }
    }
}

impl fmt::Debug for PipeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.pipes.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("PipeRegistry").field("pipes", &names).finish()
    }
}
