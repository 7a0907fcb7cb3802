use std::fmt;
use std::rc::Rc;

pub type Hook<T> = Rc<dyn Fn(&T)>;

/// Lifecycle hooks of one component definition. Hooks run in registration order.
pub struct Lifecycle<T: ?Sized> {
    init: Vec<Hook<T>>,
    update: Vec<Hook<T>>,
    destroy: Vec<Hook<T>>,
}

impl<T: ?Sized> Lifecycle<T> {
    pub fn new() -> Self {
        Self {
            init: Vec::new(),
            update: Vec::new(),
            destroy: Vec::new(),
        }
    }

    /// Register a hook to run once the component is attached
    pub fn on_init(&mut self, f: impl Fn(&T) + 'static) {
        self.init.push(Rc::new(f));
    }

    /// Register a hook to run after every render pass
    pub fn on_update(&mut self, f: impl Fn(&T) + 'static) {
        self.update.push(Rc::new(f));
    }

    /// Register a hook to run when the component is torn down
    pub fn on_destroy(&mut self, f: impl Fn(&T) + 'static) {
        self.destroy.push(Rc::new(f));
    }

    pub fn run_init(&self, target: &T) {
        run(&self.init, target);
    }

    pub fn run_update(&self, target: &T) {
        run(&self.update, target);
    }

    pub fn run_destroy(&self, target: &T) {
        run(&self.destroy, target);
    }

    pub fn has_update_hooks(&self) -> bool {
        !self.update.is_empty()
    }
}

fn run<T: ?Sized>(hooks: &[Hook<T>], target: &T) {
    // Clone the list so a hook can't observe a half-updated registry.
    for hook in hooks.to_vec() {
        hook(target);
    }
}

impl<T: ?Sized> Default for Lifecycle<T> {
    fn default() -> Self {
        Lifecycle::new()
    }
}

impl<T: ?Sized> Clone for Lifecycle<T> {
    fn clone(&self) -> Self {
        Self {
            init: self.init.clone(),
            update: self.update.clone(),
            destroy: self.destroy.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Lifecycle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("init", &self.init.len())
            .field("update", &self.update.len())
            .field("destroy", &self.destroy.len())
            .finish()
    }
}
