//! Sources of metric snapshots and the registries that enumerate them.

use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

use crate::source::Metric;

/// Something that can hand out its current metrics on request.
pub trait MetricSource: Send + Sync {
    /// Returns the current snapshot. An empty snapshot is not an error.
    fn read(&self) -> Vec<Metric>;
}

impl<F> MetricSource for F
where
    F: Fn() -> Vec<Metric> + Send + Sync,
{
    fn read(&self) -> Vec<Metric> {
        self()
    }
}

/// Read-only view over the set of registered sources.
pub trait SourceRegistry: Send + Sync {
    /// Snapshot of the sources registered right now.
    fn sources(&self) -> Vec<Arc<dyn MetricSource>>;
}

static GLOBAL_MANAGER: Lazy<Arc<ProducerManager>> =
    Lazy::new(|| Arc::new(ProducerManager::new()));

/// Thread-safe list of sources. Sources may be added and removed while
/// other threads enumerate it.
#[derive(Default)]
pub struct ProducerManager {
    sources: RwLock<Vec<Arc<dyn MetricSource>>>,
}

impl ProducerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide manager.
    pub fn global() -> Arc<ProducerManager> {
        Arc::clone(&GLOBAL_MANAGER)
    }

    /// Registers `source`. Adding the same source twice is a no-op.
    pub fn add(&self, source: Arc<dyn MetricSource>) {
        let mut sources = self.sources.write().unwrap_or_else(|e| e.into_inner());
        if !sources.iter().any(|s| same_source(s, &source)) {
            sources.push(source);
        }
    }

    /// Removes `source`, returning whether it was registered.
    pub fn remove(&self, source: &Arc<dyn MetricSource>) -> bool {
        let mut sources = self.sources.write().unwrap_or_else(|e| e.into_inner());
        let before = sources.len();
        sources.retain(|s| !same_source(s, source));
        sources.len() != before
    }

    pub fn len(&self) -> usize {
        self.sources.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SourceRegistry for ProducerManager {
    fn sources(&self) -> Vec<Arc<dyn MetricSource>> {
        self.sources
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

// Compare data pointers only; vtable pointers for the same type may differ
// between codegen units.
fn same_source(a: &Arc<dyn MetricSource>, b: &Arc<dyn MetricSource>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl std::fmt::Debug for ProducerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerManager")
            .field("sources", &self.len())
            .finish()
    }
}
