//! # Streaming Cache
//!
//! Keeps the live set of one tier equal to the needed-set around the viewer.
//!
//! ## Update Step
//!
//! 1. Compute the needed-set once from the [`GridIndex`]
//! 2. Hand every needed key that is not live to the lifecycle, nearest first,
//!    and insert whatever it builds
//! 3. Hand every live key outside the needed-set back to the lifecycle for
//!    destruction
//!
//! A key whose build fails stays absent and is retried on the next update.
//! The cache never edits a live entry; [`StreamingCache::regenerate`] destroys
//! and rebuilds everything instead.

use std::collections::{HashMap, HashSet};
use std::fmt;

use super::grid_index::{GridIndex, GridKey};

/// Creates and destroys the payloads a [`StreamingCache`] holds.
pub trait ChunkLifecycle<T> {
    type Error: fmt::Display;

    /// Builds every key in `keys`.
    ///
    /// Keys missing from the returned list count as failed.
    fn create(&mut self, keys: Vec<GridKey>) -> Vec<(GridKey, Result<T, Self::Error>)>;

    /// Releases whatever `item` holds.
    fn destroy(&mut self, key: GridKey, item: T);
}

/// What one update changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateReport {
    pub built: Vec<GridKey>,
    pub evicted: Vec<GridKey>,
    pub failed: Vec<GridKey>,
}

impl UpdateReport {
    /// `true` when nothing was built, evicted or attempted.
    pub fn is_empty(&self) -> bool {
        self.built.is_empty() && self.evicted.is_empty() && self.failed.is_empty()
    }
}

impl fmt::Display for UpdateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "+{} -{} !{}",
            self.built.len(),
            self.evicted.len(),
            self.failed.len()
        )
    }
}

/// The live entries of one tier, keyed by grid cell.
pub struct StreamingCache<T> {
    label: &'static str,
    index: GridIndex,
    live: HashMap<GridKey, T>,
}

impl<T> StreamingCache<T> {
    /// # Arguments
    /// * `label` - Tier name used in logs
    /// * `index` - Needed-set rule of the tier
    pub fn new(label: &'static str, index: GridIndex) -> Self {
        StreamingCache {
            label,
            index,
            live: HashMap::new(),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn index(&self) -> &GridIndex {
        &self.index
    }

    /// Brings the live set in line with the needed-set around `(x, z)`.
    pub fn update<L>(&mut self, x: f64, z: f64, lifecycle: &mut L) -> UpdateReport
    where
        L: ChunkLifecycle<T> + ?Sized,
    {
        let needed = self.index.needed_set(x, z);
        let viewer_cell = self.index.cell_of(x, z);
        let mut report = UpdateReport::default();

        let mut missing: Vec<GridKey> = needed
            .iter()
            .filter(|key| !self.live.contains_key(key))
            .copied()
            .collect();
        missing.sort_by_key(|key| (key.ring_distance(&viewer_cell), *key));

        if !missing.is_empty() {
            let requested: HashSet<GridKey> = missing.iter().copied().collect();
            let mut answered = HashSet::with_capacity(requested.len());

            for (key, result) in lifecycle.create(missing.clone()) {
                if !requested.contains(&key) || !answered.insert(key) {
                    log::error!("{} cache got an unrequested build for {}", self.label, key);
                    if let Ok(item) = result {
                        lifecycle.destroy(key, item);
                    }
                    continue;
                }

                match result {
                    Ok(item) => {
                        self.live.insert(key, item);
                        report.built.push(key);
                    }
                    Err(error) => {
                        log::warn!(
                            "Abandoning {} chunk {} for this tick: {}",
                            self.label,
                            key,
                            error
                        );
                        report.failed.push(key);
                    }
                }
            }

            for key in missing {
                if !answered.contains(&key) {
                    log::warn!("No build result for {} chunk {}", self.label, key);
                    report.failed.push(key);
                }
            }
        }

        let mut stale: Vec<GridKey> = self
            .live
            .keys()
            .filter(|key| !needed.contains(key))
            .copied()
            .collect();
        stale.sort();
        for key in stale {
            if let Some(item) = self.live.remove(&key) {
                lifecycle.destroy(key, item);
                report.evicted.push(key);
            }
        }

        debug_assert!(
            self.live.keys().all(|key| needed.contains(key)),
            "{} cache holds keys outside its needed-set",
            self.label
        );
        debug_assert_eq!(
            self.live.len() + report.failed.len(),
            needed.len(),
            "{} cache lost track of a needed key",
            self.label
        );

        if !report.is_empty() {
            log::debug!(
                "{} cache at cell {}: {} ({} live)",
                self.label,
                viewer_cell,
                report,
                self.live.len()
            );
        }

        report
    }

    /// Destroys every live entry.
    ///
    /// # Returns
    /// The destroyed keys, sorted.
    pub fn clear<L>(&mut self, lifecycle: &mut L) -> Vec<GridKey>
    where
        L: ChunkLifecycle<T> + ?Sized,
    {
        let mut keys: Vec<GridKey> = self.live.keys().copied().collect();
        keys.sort();
        for key in &keys {
            if let Some(item) = self.live.remove(key) {
                lifecycle.destroy(*key, item);
            }
        }
        keys
    }

    /// Destroys every live entry, then rebuilds the needed-set around `(x, z)`.
    ///
    /// `evicted` in the report lists every entry that was destroyed.
    pub fn regenerate<L>(&mut self, x: f64, z: f64, lifecycle: &mut L) -> UpdateReport
    where
        L: ChunkLifecycle<T> + ?Sized,
    {
        let destroyed = self.clear(lifecycle);
        let mut report = self.update(x, z, lifecycle);
        report.evicted = destroyed;
        report
    }

    /// Replaces the needed-set rule. Takes effect on the next update.
    pub fn set_index(&mut self, index: GridIndex) {
        self.index = index;
    }

    pub fn get(&self, key: &GridKey) -> Option<&T> {
        self.live.get(key)
    }

    pub fn contains(&self, key: &GridKey) -> bool {
        self.live.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Live keys, sorted.
    pub fn keys(&self) -> Vec<GridKey> {
        let mut keys: Vec<GridKey> = self.live.keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GridKey, &T)> {
        self.live.iter()
    }
}
