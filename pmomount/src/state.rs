//! État mutable d'un montage : compteur de révision et cache SOAP.
//!
//! Les deux évoluent ensemble sous le verrou du cache : une réponse calculée
//! pour une révision périmée n'est jamais stockée.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug)]
pub struct MountState {
    revision: AtomicU32,
    soap_cache: RwLock<HashMap<String, String>>,
}

impl Default for MountState {
    fn default() -> Self {
        Self {
            revision: AtomicU32::new(1),
            soap_cache: RwLock::new(HashMap::new()),
        }
    }
}

impl MountState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Génération courante du contenu, à partir de 1.
    pub fn revision(&self) -> u32 {
        self.revision.load(Ordering::Acquire)
    }

    pub fn cached(&self, key: &str) -> Option<String> {
        self.soap_cache.read().get(key).cloned()
    }

    /// Stocke `body` si `revision` est toujours la révision courante.
    pub fn store(&self, key: String, revision: u32, body: String) -> bool {
        let mut cache = self.soap_cache.write();
        if self.revision() != revision {
            return false;
        }
        cache.insert(key, body);
        true
    }

    pub fn cached_len(&self) -> usize {
        self.soap_cache.read().len()
    }

    /// Vide entièrement le cache et incrémente la révision.
    ///
    /// Retourne la nouvelle révision.
    pub fn invalidate(&self) -> u32 {
        let mut cache = self.soap_cache.write();
        cache.clear();
        self.revision.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }
}
