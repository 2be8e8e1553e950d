//! Render-result cache keyed by a deterministic request fingerprint.
//!
//! A [`CacheKey`] folds together everything that determines a frame's pixels
//! under a deterministic engine: shader identity, resolved inputs, time
//! code, and output size. Input ordering cannot influence the key — inputs
//! are fingerprinted in sorted name order — and floats contribute their
//! exact bit patterns, so lookups are exact-match only: no fuzzy matching,
//! no quantization of time codes.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use isfdoc::{Fingerprint, FingerprintWriter};

use crate::frame::Frame;
use crate::value::ResolvedInputs;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(Fingerprint);

impl CacheKey {
    /// Derives the key for a fully resolved render request.
    pub fn derive(
        shader: Fingerprint,
        inputs: &ResolvedInputs,
        time_code: f32,
        width: u32,
        height: u32,
    ) -> Self {
        let mut writer = FingerprintWriter::new();
        writer.write_u64(shader.hi);
        writer.write_u64(shader.lo);
        writer.write_u64(inputs.len() as u64);
        for (name, value) in inputs {
            writer.write_str(name);
            value.write_fingerprint(&mut writer);
        }
        writer.write_f32(time_code);
        writer.write_u32(width);
        writer.write_u32(height);
        Self(writer.finish())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// How a cached frame was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provenance {
    /// Rendered by the native engine.
    Engine,
    /// Produced by the placeholder generator.
    Fallback,
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    frame: Arc<Frame>,
    provenance: Provenance,
    created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn frame(&self) -> Arc<Frame> {
        Arc::clone(&self.frame)
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Bound on cache growth. The default keeps a few hundred frames; passing
/// `max_entries: None` opts into unbounded growth explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLimits {
    pub max_entries: Option<usize>,
}

impl CacheLimits {
    pub const DEFAULT_MAX_ENTRIES: usize = 256;

    pub fn unbounded() -> Self {
        Self { max_entries: None }
    }
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            max_entries: Some(Self::DEFAULT_MAX_ENTRIES),
        }
    }
}

/// In-memory, process-local store of rendered frames. Last write wins on
/// key collisions; eviction removes the oldest-stored entry first.
#[derive(Debug, Default)]
pub struct RenderCache {
    entries: HashMap<CacheKey, CacheEntry>,
    order: VecDeque<CacheKey>,
    limits: CacheLimits,
}

impl RenderCache {
    pub fn new(limits: CacheLimits) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            limits,
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn put(&mut self, key: CacheKey, frame: Arc<Frame>, provenance: Provenance) {
        let entry = CacheEntry {
            frame,
            provenance,
            created_at: Utc::now(),
        };
        if self.entries.insert(key, entry).is_some() {
            self.order.retain(|existing| *existing != key);
        }
        self.order.push_back(key);

        if let Some(max) = self.limits.max_entries {
            while self.entries.len() > max {
                match self.order.pop_front() {
                    Some(oldest) => {
                        tracing::debug!(key = %oldest, "evicting oldest cache entry");
                        self.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::TypedValue;
    use std::collections::BTreeMap;

    fn shader_fp() -> Fingerprint {
        Fingerprint::of_source("void main() {}")
    }

    fn inputs_in_order(pairs: &[(&str, TypedValue)]) -> ResolvedInputs {
        let mut map = BTreeMap::new();
        for (name, value) in pairs {
            map.insert((*name).to_string(), value.clone());
        }
        map
    }

    fn frame() -> Arc<Frame> {
        Arc::new(Frame::from_rgba(1, 1, vec![1, 2, 3, 4]).unwrap())
    }

    #[test]
    fn key_ignores_input_insertion_order() {
        let a = inputs_in_order(&[
            ("speed", TypedValue::Float(1.5)),
            ("tint", TypedValue::Bool(true)),
        ]);
        let b = inputs_in_order(&[
            ("tint", TypedValue::Bool(true)),
            ("speed", TypedValue::Float(1.5)),
        ]);
        assert_eq!(
            CacheKey::derive(shader_fp(), &a, 0.5, 640, 480),
            CacheKey::derive(shader_fp(), &b, 0.5, 640, 480)
        );
    }

    #[test]
    fn key_changes_with_any_request_component() {
        let inputs = inputs_in_order(&[("speed", TypedValue::Float(1.5))]);
        let base = CacheKey::derive(shader_fp(), &inputs, 0.5, 640, 480);
        assert_ne!(
            base,
            CacheKey::derive(shader_fp(), &inputs, 0.25, 640, 480),
            "time code participates"
        );
        assert_ne!(
            base,
            CacheKey::derive(shader_fp(), &inputs, 0.5, 480, 640),
            "size participates"
        );
        let other = Fingerprint::of_source("void main() { }");
        assert_ne!(
            base,
            CacheKey::derive(other, &inputs, 0.5, 640, 480),
            "shader identity participates"
        );
    }

    #[test]
    fn get_after_put_round_trips() {
        let mut cache = RenderCache::new(CacheLimits::default());
        let key = CacheKey::derive(shader_fp(), &BTreeMap::new(), 0.0, 1, 1);
        let stored = frame();
        cache.put(key, Arc::clone(&stored), Provenance::Engine);

        let entry = cache.get(&key).expect("entry present");
        assert_eq!(entry.frame().pixels(), stored.pixels());
        assert_eq!(entry.provenance(), Provenance::Engine);
    }

    #[test]
    fn put_overwrites_existing_keys() {
        let mut cache = RenderCache::new(CacheLimits::default());
        let key = CacheKey::derive(shader_fp(), &BTreeMap::new(), 0.0, 1, 1);
        cache.put(key, frame(), Provenance::Fallback);
        cache.put(key, frame(), Provenance::Engine);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&key).unwrap().provenance(), Provenance::Engine);
    }

    #[test]
    fn eviction_drops_oldest_entries_first() {
        let mut cache = RenderCache::new(CacheLimits {
            max_entries: Some(2),
        });
        let keys: Vec<CacheKey> = (0..3)
            .map(|i| CacheKey::derive(shader_fp(), &BTreeMap::new(), i as f32, 1, 1))
            .collect();
        for key in &keys {
            cache.put(*key, frame(), Provenance::Engine);
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&keys[0]).is_none(), "oldest entry evicted");
        assert!(cache.get(&keys[2]).is_some());
    }
}
