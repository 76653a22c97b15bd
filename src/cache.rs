use std::sync::Arc;

use topology::Composition;
use util::HashMap;

use crate::Analysis;

/// Keeps completed analyses keyed by composition content hash, so repeated
/// queries against an unchanged composition reuse the same `Analysis`.
/// Any structural edit changes the hash, which misses here and triggers a
/// fresh build; stale entries linger until invalidated or cleared.
#[derive(Default)]
pub struct AnalysisCache {
    entries: HashMap<u64, Arc<Analysis>>,
}

impl AnalysisCache {
    /// The analysis for the composition as it stands, building it on a
    /// cache miss.
    pub fn analysis_for(&mut self, comp: &Composition) -> Arc<Analysis> {
        let hash = comp.content_hash();
        match self.entries.get(&hash) {
            Some(analysis) => {
                log::trace!("analysis cache hit for {hash:#x}");
                Arc::clone(analysis)
            }
            None => {
                log::trace!("analysis cache miss for {hash:#x}");
                let analysis = Arc::new(Analysis::new(comp));
                self.entries.insert(hash, Arc::clone(&analysis));
                analysis
            }
        }
    }

    /// Drop the entry for one composition snapshot, if present.
    pub fn invalidate(&mut self, hash: u64) {
        self.entries.remove(&hash);
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
