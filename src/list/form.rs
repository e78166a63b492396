use std::sync::{Arc, RwLock};

/// The draft an editor is composing, shared between the UI and the list.
///
/// Clones share the same cell.
#[derive(Debug, Clone)]
pub struct FormState<D> {
    value: Arc<RwLock<D>>,
    default: Arc<D>,
}

impl<D: Clone> FormState<D> {
    pub fn new(default: D) -> Self {
        Self {
            value: Arc::new(RwLock::new(default.clone())),
            default: Arc::new(default),
        }
    }

    pub fn get(&self) -> D {
        match self.value.read() {
            Ok(value) => value.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set(&self, draft: D) {
        match self.value.write() {
            Ok(mut value) => *value = draft,
            Err(poisoned) => *poisoned.into_inner() = draft,
        }
    }

    /// Back to the configured default draft.
    pub fn reset(&self) {
        self.set((*self.default).clone());
    }

    pub fn default_draft(&self) -> &D {
        &self.default
    }
}
