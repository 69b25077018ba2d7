//! File-level "compiles against" graph used to size recompiles.
//!
//! An edge `A -> B` means A's compiled output references a declaration from B. Forward and
//! reverse adjacency are mirrored so both directions are cheap to query. The graph tolerates
//! cycles and edges to files that are no longer compiled.

use std::collections::{HashMap, HashSet, VecDeque};

use grove_core::FileId;

#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// file -> files it depends on
    forward: HashMap<FileId, HashSet<FileId>>,
    /// file -> files that depend on it
    reverse: HashMap<FileId, HashSet<FileId>>,
}

impl DependencyGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all outgoing edges of `file` with `targets`.
    ///
    /// Self edges are ignored. Stale reverse entries from the previous edge set are removed in
    /// the same call, so callers holding `&mut self` never observe a half-updated graph.
    pub fn update(&mut self, file: FileId, targets: impl IntoIterator<Item = FileId>) {
        let targets: HashSet<FileId> = targets.into_iter().filter(|t| *t != file).collect();

        if let Some(previous) = self.forward.remove(&file) {
            for old in previous.difference(&targets) {
                self.unlink_reverse(*old, file);
            }
        }
        for target in &targets {
            self.reverse.entry(*target).or_default().insert(file);
        }
        tracing::trace!(target: "grove.graph", file = %file, edges = targets.len(), "updated edges");
        if !targets.is_empty() {
            self.forward.insert(file, targets);
        }
    }

    /// Removes `file` as a source of edges. Edges pointing *to* `file` are kept: dependents
    /// still reference it and must be found by [`Self::transitive_dependents`] if it returns.
    pub fn remove_file(&mut self, file: FileId) {
        self.update(file, std::iter::empty());
    }

    pub fn dependencies(&self, file: FileId) -> impl Iterator<Item = FileId> + '_ {
        self.forward.get(&file).into_iter().flatten().copied()
    }

    pub fn dependents(&self, file: FileId) -> impl Iterator<Item = FileId> + '_ {
        self.reverse.get(&file).into_iter().flatten().copied()
    }

    /// Every file downstream of any file in `changed`, at unbounded depth.
    ///
    /// Seeds are not part of the result unless reached through a cycle from another seed.
    #[must_use]
    pub fn transitive_dependents(&self, changed: &HashSet<FileId>) -> HashSet<FileId> {
        self.closure(&self.reverse, changed, None)
    }

    /// Files reachable from `seed` along forward edges within `max_depth` hops.
    #[must_use]
    pub fn transitive_dependencies(&self, seed: &HashSet<FileId>, max_depth: u32) -> HashSet<FileId> {
        self.closure(&self.forward, seed, Some(max_depth))
    }

    fn closure(
        &self,
        edges: &HashMap<FileId, HashSet<FileId>>,
        seed: &HashSet<FileId>,
        max_depth: Option<u32>,
    ) -> HashSet<FileId> {
        let mut visited: HashSet<FileId> = HashSet::new();
        let mut queue: VecDeque<(FileId, u32)> = seed.iter().map(|file| (*file, 0)).collect();

        while let Some((current, depth)) = queue.pop_front() {
            if max_depth.is_some_and(|max| depth >= max) {
                continue;
            }
            let Some(next) = edges.get(&current) else {
                continue;
            };
            for &file in next {
                if visited.insert(file) {
                    queue.push_back((file, depth + 1));
                }
            }
        }

        visited.retain(|file| !seed.contains(file));
        visited
    }

    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.forward.values().map(HashSet::len).sum()
    }

    fn unlink_reverse(&mut self, target: FileId, source: FileId) {
        if let Some(sources) = self.reverse.get_mut(&target) {
            sources.remove(&source);
            if sources.is_empty() {
                self.reverse.remove(&target);
            }
        }
    }
}
