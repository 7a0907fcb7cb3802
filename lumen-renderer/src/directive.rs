use std::fmt;
use std::rc::Rc;

use lumen_core::Value;
use rustc_hash::FxHashMap;

use crate::dom::LiveNode;
use crate::host::HostHandle;

/// Behaviour attached to an element through a `[name]` property binding
/// whose name matches a registered directive.
pub trait Directive {
    /// First value, right after the element is bound.
    fn on_init(&mut self, _value: &Value) {}
    /// A later pass bound a value that is not the same as the last one.
    fn on_update(&mut self, _value: &Value) {}
    /// The element left the tree or stopped binding the directive.
    fn on_destroy(&mut self) {}
}

pub type DirectiveFactory = Rc<dyn Fn(&LiveNode, &HostHandle) -> Box<dyn Directive>>;

/// Directive constructors by name. Lookup is case-insensitive.
#[derive(Clone, Default)]
pub struct DirectiveRegistry {
    factories: FxHashMap<String, DirectiveFactory>,
}

impl DirectiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&LiveNode, &HostHandle) -> Box<dyn Directive> + 'static,
    {
        self.factories
            .insert(name.to_ascii_lowercase(), Rc::new(factory));
    }

    pub fn get(&self, name: &str) -> Option<DirectiveFactory> {
        self.factories.get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("DirectiveRegistry").field("names", &names).finish()
    }
}
