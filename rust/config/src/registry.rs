use chroma_error::{ChromaError, ErrorCodes};
use parking_lot::Mutex;
use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
    sync::Arc,
};
use thiserror::Error;

pub trait Injectable: Any + Send + Sync + Clone {}

/// A typed service locator handed to `Configurable::try_from_config`.
///
/// Values are cloned on retrieval, so register handles whose clones share
/// state (usually an `Arc` inside).
#[derive(Clone, Default)]
pub struct Registry {
    storage: Arc<Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>>,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Type [{0}] not found in the registry")]
    TypeNotFound(String),
}

impl ChromaError for RegistryError {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::Internal
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value`, replacing any previous value of the same type.
    pub fn register<T: Injectable>(&self, value: T) {
        self.storage
            .lock()
            .insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn get<T: Injectable>(&self) -> Result<T, RegistryError> {
        self.storage
            .lock()
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
            .cloned()
            .ok_or_else(|| RegistryError::TypeNotFound(type_name::<T>().to_string()))
    }

    pub fn contains<T: Injectable>(&self) -> bool {
        self.storage.lock().contains_key(&TypeId::of::<T>())
    }
}
