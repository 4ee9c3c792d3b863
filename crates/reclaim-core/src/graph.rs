//! Bidirectional reference graph keyed by asset path

use crate::error::IndexError;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

/// Set of paths on one side of a node's edges.
pub type PathSet = BTreeSet<String>;

/// The reference graph: forward links (path → what it uses) mirrored by
/// backward links (path → what uses it).
///
/// `b ∈ forward[a]` holds exactly when `a ∈ backward[b]`; every mutation keeps
/// both maps in step.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct GraphStore {
    forward: BTreeMap<String, PathSet>,
    backward: BTreeMap<String, PathSet>,
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore")
            .field("node_count", &self.node_count())
            .field("edge_count", &self.edge_count())
            .finish()
    }
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from previously exported maps.
    ///
    /// No mirror check is done here; call [`GraphStore::verify_mirror`] before trusting the result.
    pub fn from_parts(forward: BTreeMap<String, PathSet>, backward: BTreeMap<String, PathSet>) -> Self {
        Self { forward, backward }
    }

    /// Replace `path`'s dependency set, returning the previous one.
    ///
    /// Backlinks are added for new dependencies and dropped for ones that
    /// disappeared. A path never counts as its own dependent.
    pub fn add_or_update<I, S>(&mut self, path: &str, dependencies: I) -> PathSet
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let new_deps: PathSet = dependencies
            .into_iter()
            .map(Into::into)
            .filter(|dep: &String| dep != path && !dep.is_empty())
            .collect();

        let old_deps = self
            .forward
            .insert(path.to_string(), new_deps.clone())
            .unwrap_or_default();

        for dropped in old_deps.difference(&new_deps) {
            self.unlink_backward(dropped, path);
        }
        for added in new_deps.difference(&old_deps) {
            self.backward
                .entry(added.clone())
                .or_default()
                .insert(path.to_string());
        }

        old_deps
    }

    /// Drop `path`'s forward entry and the backlinks it contributed.
    ///
    /// Backlinks that other nodes hold *on* `path` are left in place; they go
    /// away when those nodes are next resolved.
    pub fn remove(&mut self, path: &str) -> Option<PathSet> {
        let deps = self.forward.remove(path)?;
        for dep in &deps {
            self.unlink_backward(dep, path);
        }
        Some(deps)
    }

    /// Rename a node in place, carrying every edge that names it.
    ///
    /// Returns false when `old_path` is unknown to both maps. If `new_path`
    /// already exists the two nodes are merged.
    pub fn replace(&mut self, old_path: &str, new_path: &str) -> bool {
        if old_path == new_path {
            return self.forward.contains_key(old_path) || self.backward.contains_key(old_path);
        }

        let forward = self.forward.remove(old_path);
        let backward = self.backward.remove(old_path);
        if forward.is_none() && backward.is_none() {
            return false;
        }

        if let Some(deps) = forward {
            for dep in &deps {
                if let Some(dependents) = self.backward.get_mut(dep) {
                    dependents.remove(old_path);
                    dependents.insert(new_path.to_string());
                }
            }
            self.forward.entry(new_path.to_string()).or_default().extend(deps);
        }

        if let Some(dependents) = backward {
            for dependent in &dependents {
                if let Some(deps) = self.forward.get_mut(dependent) {
                    deps.remove(old_path);
                    deps.insert(new_path.to_string());
                }
            }
            self.backward.entry(new_path.to_string()).or_default().extend(dependents);
        }

        // old -> new turns into a self edge after the rename
        if let Some(deps) = self.forward.get_mut(new_path) {
            if deps.remove(new_path) {
                self.unlink_backward(new_path, new_path);
            }
        }

        true
    }

    /// Dependencies of `path`, if it has a forward entry.
    pub fn dependencies(&self, path: &str) -> Option<&PathSet> {
        self.forward.get(path)
    }

    /// Paths that depend on `path`.
    pub fn dependents(&self, path: &str) -> Option<&PathSet> {
        self.backward.get(path)
    }

    /// True when anything links to `path`.
    pub fn has_dependents(&self, path: &str) -> bool {
        self.backward.get(path).is_some_and(|set| !set.is_empty())
    }

    /// True when `path` has a forward entry (participates in the graph).
    pub fn contains(&self, path: &str) -> bool {
        self.forward.contains_key(path)
    }

    /// Iterate over every node with a forward entry, in path order.
    pub fn paths(&self) -> impl Iterator<Item = &String> {
        self.forward.keys()
    }

    /// Nodes strictly inside `folder` at any depth, in path order.
    pub fn paths_under<'a>(&'a self, folder: &'a str) -> impl Iterator<Item = &'a String> + 'a {
        self.forward
            .range::<str, _>((Bound::Excluded(folder), Bound::Unbounded))
            .map(|(path, _)| path)
            .take_while(move |path| path.starts_with(folder))
            .filter(move |path| path.as_bytes().get(folder.len()) == Some(&b'/'))
    }

    /// Number of nodes with a forward entry.
    pub fn node_count(&self) -> usize {
        self.forward.len()
    }

    /// Number of forward edges.
    pub fn edge_count(&self) -> usize {
        self.forward.values().map(BTreeSet::len).sum()
    }

    pub fn forward_entries(&self) -> &BTreeMap<String, PathSet> {
        &self.forward
    }

    pub fn backward_entries(&self) -> &BTreeMap<String, PathSet> {
        &self.backward
    }

    /// Check that the forward and backward maps mirror each other exactly.
    pub fn verify_mirror(&self) -> Result<(), IndexError> {
        for (dependent, deps) in &self.forward {
            for dependency in deps {
                let mirrored = self
                    .backward
                    .get(dependency)
                    .is_some_and(|set| set.contains(dependent));
                if !mirrored {
                    return Err(IndexError::MissingBacklink {
                        dependent: dependent.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        for (dependency, dependents) in &self.backward {
            for dependent in dependents {
                let mirrored = self
                    .forward
                    .get(dependent)
                    .is_some_and(|set| set.contains(dependency));
                if !mirrored {
                    return Err(IndexError::StaleBacklink {
                        dependent: dependent.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    fn unlink_backward(&mut self, dependency: &str, dependent: &str) {
        if let Some(dependents) = self.backward.get_mut(dependency) {
            dependents.remove(dependent);
            if dependents.is_empty() {
                self.backward.remove(dependency);
            }
        }
    }
}
