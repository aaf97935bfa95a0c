//! Per-instance resources a session acquires on demand.
//!
//! LLM and catalog connections are leased for one operation at a time
//! and handed back when the lease drops.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;

use crate::service::AiService;
use crate::store::CatalogStore;
use crate::AiError;

/// Instance-level configuration resolved when a session is opened.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceInfo {
    pub instance_id: String,
    /// Project-specific guidance for the LLM. Empty when none is set.
    pub ai_instructions: String,
}

/// A borrowed connection that runs its release hook on drop.
pub struct Lease<T: ?Sized> {
    inner: Arc<T>,
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl<T: ?Sized> Lease<T> {
    pub fn new(inner: Arc<T>, release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            inner,
            release: Some(Box::new(release)),
        }
    }

    /// A lease with nothing to release.
    pub fn shared(inner: Arc<T>) -> Self {
        Self {
            inner,
            release: None,
        }
    }
}

impl<T: ?Sized> Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: ?Sized> Drop for Lease<T> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl<T: ?Sized> fmt::Debug for Lease<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("releasable", &self.release.is_some())
            .finish()
    }
}

#[async_trait]
pub trait RuntimeServices: Send + Sync {
    async fn instance(&self, instance_id: &str) -> Result<InstanceInfo, AiError>;

    async fn ai(&self, instance_id: &str) -> Result<Lease<dyn AiService>, AiError>;

    async fn catalog(&self, instance_id: &str) -> Result<Lease<dyn CatalogStore>, AiError>;
}

/// Fixed services shared by every instance.
#[derive(Clone)]
pub struct StaticServices {
    ai: Option<Arc<dyn AiService>>,
    catalog: Arc<dyn CatalogStore>,
    ai_instructions: String,
}

impl StaticServices {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self {
            ai: None,
            catalog,
            ai_instructions: String::new(),
        }
    }

    pub fn with_ai(mut self, ai: Arc<dyn AiService>) -> Self {
        self.ai = Some(ai);
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.ai_instructions = instructions.into();
        self
    }
}

#[async_trait]
impl RuntimeServices for StaticServices {
    async fn instance(&self, instance_id: &str) -> Result<InstanceInfo, AiError> {
        Ok(InstanceInfo {
            instance_id: instance_id.to_string(),
            ai_instructions: self.ai_instructions.clone(),
        })
    }

    async fn ai(&self, instance_id: &str) -> Result<Lease<dyn AiService>, AiError> {
        match &self.ai {
            Some(ai) => Ok(Lease::shared(ai.clone())),
            None => Err(AiError::Backend(format!(
                "no AI service configured for instance {instance_id}"
            ))),
        }
    }

    async fn catalog(&self, _instance_id: &str) -> Result<Lease<dyn CatalogStore>, AiError> {
        Ok(Lease::shared(self.catalog.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCatalogStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn lease_releases_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let lease = Lease::new(Arc::new(5u32), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(*lease, 5);
        assert_eq!(released.load(Ordering::SeqCst), 0);
        drop(lease);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn static_services_without_ai_report_backend_error() {
        let services = StaticServices::new(Arc::new(MemoryCatalogStore::new()));
        let err = services.ai("inst").await.err().unwrap();
        assert!(matches!(err, AiError::Backend(_)));
        assert!(services.catalog("inst").await.is_ok());
    }

    #[tokio::test]
    async fn static_services_resolve_instructions() {
        let services = StaticServices::new(Arc::new(MemoryCatalogStore::new()))
            .with_instructions("Prefer weekly grain.");
        let info = services.instance("inst").await.unwrap();
        assert_eq!(info.instance_id, "inst");
        assert_eq!(info.ai_instructions, "Prefer weekly grain.");
    }
}
