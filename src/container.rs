//! Type-keyed service container.
//!
//! The router owns one container and hands it to every form request. Form
//! requests resolve their [`ValidationFactory`](crate::validation::ValidationFactory)
//! from it; handlers and `authorize` implementations resolve application
//! services (user stores, policies, clocks) the same way.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, trace};

/// Shared service registry. Cloning shares the same registry.
#[derive(Clone, Default)]
pub struct Container {
    services: Arc<RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `instance`, replacing any earlier instance of the same type.
    pub fn register<T: Send + Sync + 'static>(&self, instance: T) {
        self.services
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(TypeId::of::<T>(), Arc::new(instance));

        debug!(service = type_name::<T>(), "service registered");
    }

    /// Resolves a service by type.
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let resolved = self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|any| any.downcast::<T>().ok());

        trace!(service = type_name::<T>(), found = resolved.is_some(), "service resolved");
        resolved
    }

    pub fn has<T: Send + Sync + 'static>(&self) -> bool {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&TypeId::of::<T>())
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.services.read().map(|s| s.len()).unwrap_or_default();
        f.debug_struct("Container").field("services", &len).finish()
    }
}
