use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use nimbus_types::{CollaboratorError, Resource, ResourceKind};
use tracing::debug;

use super::ResourceClient;

/// Memo of collaborator listings for the lifetime of one workflow instance.
///
/// Several fields of one run often read the same listing (image and instance
/// snapshot choices both come from the image list). The cache is created with
/// the workflow and dropped with it, so listings never survive into another
/// run. Failed fetches are not stored.
#[derive(Debug, Default)]
pub struct ChoiceCache {
    entries: Mutex<HashMap<String, Vec<Resource>>>,
}

impl ChoiceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached listing stored under `cache_key`, fetching it on a miss.
    pub fn list_with<F>(&self, cache_key: &str, fetch: F) -> Result<Vec<Resource>, CollaboratorError>
    where
        F: FnOnce() -> Result<Vec<Resource>, CollaboratorError>,
    {
        if let Some(items) = self.lookup(cache_key) {
            debug!(cache_key = %cache_key, item_count = items.len(), "choice cache hit");
            return Ok(items);
        }

        debug!(cache_key = %cache_key, "choice cache miss");
        let items = fetch()?;
        self.store(cache_key, items.clone());
        Ok(items)
    }

    /// Lists `kind` through `client`, cached under the kind's name.
    pub fn list(&self, client: &dyn ResourceClient, kind: ResourceKind) -> Result<Vec<Resource>, CollaboratorError> {
        self.list_with(kind.as_str(), || client.list(kind))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, cache_key: &str) -> Option<Vec<Resource>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(cache_key)
            .cloned()
    }

    fn store(&self, cache_key: &str, items: Vec<Resource>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(cache_key.to_string(), items);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn second_lookup_is_served_from_cache() {
        let cache = ChoiceCache::new();
        let calls = Cell::new(0);
        let fetch = || {
            calls.set(calls.get() + 1);
            Ok(vec![Resource::new("img-1", "cirros")])
        };

        let first = cache.list_with("image", fetch).expect("first fetch");
        let second = cache
            .list_with("image", || Err(CollaboratorError::unavailable("image", "should not be called")))
            .expect("cached fetch");

        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failures_are_not_cached() {
        let cache = ChoiceCache::new();

        let failed = cache.list_with("flavor", || Err(CollaboratorError::unavailable("compute", "timeout")));
        assert!(failed.is_err());
        assert!(cache.is_empty());

        let recovered = cache
            .list_with("flavor", || Ok(vec![Resource::new("1", "m1.tiny")]))
            .expect("retry succeeds");
        assert_eq!(recovered.len(), 1);
    }
}
