use std::collections::HashMap;
use std::sync::RwLock;

use candle_core::Tensor;

use crate::error::{CacheError, Result};

/// Key-addressed retrieval of pre-computed latent encodings.
///
/// Implementations are free to memoize, hit disk, or cross a network; the
/// collation core only requires that identical `(key, backend_id)` pairs
/// resolve to the same tensor and that failures surface as [`CacheError`].
pub trait LatentStore: Send + Sync {
    fn retrieve(&self, key: &str, backend_id: &str) -> Result<Tensor>;
}

/// Reference store backed by nested maps: backend namespace -> key -> latent.
///
/// Exists for tests and local experimentation; a missing namespace is
/// indistinguishable from a missing key and reports `Miss` either way.
#[derive(Default)]
pub struct MemoryLatentStore {
    namespaces: RwLock<HashMap<String, HashMap<String, Tensor>>>,
}

impl MemoryLatentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, backend_id: &str, key: &str, latent: Tensor) {
        let mut namespaces = self.namespaces.write().expect("latent store lock poisoned");
        namespaces
            .entry(backend_id.to_string())
            .or_default()
            .insert(key.to_string(), latent);
    }

    pub fn len(&self, backend_id: &str) -> usize {
        let namespaces = self.namespaces.read().expect("latent store lock poisoned");
        namespaces.get(backend_id).map_or(0, HashMap::len)
    }

    pub fn is_empty(&self, backend_id: &str) -> bool {
        self.len(backend_id) == 0
    }
}

impl LatentStore for MemoryLatentStore {
    fn retrieve(&self, key: &str, backend_id: &str) -> Result<Tensor> {
        let namespaces = self.namespaces.read().expect("latent store lock poisoned");
        namespaces
            .get(backend_id)
            .and_then(|namespace| namespace.get(key))
            .cloned()
            .ok_or_else(|| CacheError::Miss {
                key: key.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use candle_core::Device;

    use super::*;

    #[test]
    fn retrieve_hits_the_right_namespace() {
        let store = MemoryLatentStore::new();
        let a = Tensor::full(1.0f32, (2, 2), &Device::Cpu).unwrap();
        let b = Tensor::full(2.0f32, (2, 2), &Device::Cpu).unwrap();
        store.insert("backend-a", "img.png", a);
        store.insert("backend-b", "img.png", b);

        let fetched = store.retrieve("img.png", "backend-b").unwrap();
        let values = fetched.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert!(values.iter().all(|&v| v == 2.0));
    }

    #[test]
    fn missing_key_reports_miss() {
        let store = MemoryLatentStore::new();
        let err = store.retrieve("absent.png", "backend-a").unwrap_err();
        assert!(matches!(err, CacheError::Miss { key } if key == "absent.png"));
    }
}
