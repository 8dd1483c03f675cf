//! Ordered release of Vulkan objects.
//!
//! Every object created during startup registers its destroy call here right
//! after creation succeeds. The stack is unwound in reverse registration
//! order, either explicitly once the device is idle or implicitly on drop, so
//! an early `?` return in the middle of startup still releases everything
//! created up to that point.

/// A single registered destroy action.
struct TeardownAction {
    label: &'static str,
    run: Box<dyn FnOnce()>,
}

/// Stack of destroy actions, executed last-in first-out.
#[derive(Default)]
pub struct TeardownStack {
    actions: Vec<TeardownAction>,
}

impl TeardownStack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a destroy action for an object that was just created.
    ///
    /// The action must only reference handles it captured by value; it runs
    /// after every object registered later has been destroyed.
    pub fn push(&mut self, label: &'static str, action: impl FnOnce() + 'static) {
        self.actions.push(TeardownAction {
            label,
            run: Box::new(action),
        });
    }

    /// Number of pending actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether all actions have run.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run all pending actions, newest first.
    ///
    /// Callers holding GPU work must wait for the device to go idle before
    /// calling this.
    pub fn unwind(&mut self) {
        while let Some(action) = self.actions.pop() {
            tracing::debug!("Destroying {}", action.label);
            (action.run)();
        }
    }
}

impl Drop for TeardownStack {
    fn drop(&mut self) {
        self.unwind();
    }
}
