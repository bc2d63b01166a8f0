// ironlayer-core/src/graph/mod.rs
// ============================================================================
// Module: Model DAG
// Description: Dependency graph over model names.
// Purpose: Drive downstream propagation and parallel-group layering.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! An edge `A -> B` exists iff `A` appears in `B`'s referenced tables or
//! declared dependencies and `A` is itself a known model. References to
//! unknown tables are tracked as external and produce no graph nodes.
//! Construction fails loudly on cycles.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::VecDeque;

use thiserror::Error;

use crate::core::ModelDefinition;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while building the model DAG.
#[derive(Debug, Error)]
pub enum DagError {
    /// The dependency graph contains a cycle.
    #[error("dependency graph contains a cycle through: {0}")]
    Cycle(String),
}

// ============================================================================
// SECTION: DAG
// ============================================================================

/// Directed acyclic graph over model names.
#[derive(Debug, Clone, Default)]
pub struct ModelDag {
    /// Downstream adjacency: model -> models that read from it.
    downstream: BTreeMap<String, BTreeSet<String>>,
    /// Upstream adjacency: model -> known models it reads from.
    upstream: BTreeMap<String, BTreeSet<String>>,
    /// Referenced tables that are not models, per referencing model.
    external_tables: BTreeMap<String, BTreeSet<String>>,
}

impl ModelDag {
    /// Builds the DAG from a model set.
    ///
    /// # Errors
    ///
    /// Returns [`DagError::Cycle`] when the dependency graph is cyclic.
    pub fn build(models: &BTreeMap<String, ModelDefinition>) -> Result<Self, DagError> {
        let mut dag = Self::default();
        for name in models.keys() {
            dag.downstream.entry(name.clone()).or_default();
            dag.upstream.entry(name.clone()).or_default();
        }

        for (name, model) in models {
            for upstream in model.upstream_names() {
                if upstream == *name {
                    continue;
                }
                if models.contains_key(&upstream) {
                    dag.downstream
                        .entry(upstream.clone())
                        .or_default()
                        .insert(name.clone());
                    dag.upstream
                        .entry(name.clone())
                        .or_default()
                        .insert(upstream);
                } else {
                    dag.external_tables
                        .entry(name.clone())
                        .or_default()
                        .insert(upstream);
                }
            }
        }

        dag.check_acyclic()?;
        Ok(dag)
    }

    /// Returns the known upstream parents of a model.
    #[must_use]
    pub fn upstream_of(&self, name: &str) -> Vec<&str> {
        self.upstream
            .get(name)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns the direct downstream children of a model.
    #[must_use]
    pub fn downstream_of(&self, name: &str) -> Vec<&str> {
        self.downstream
            .get(name)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns external tables referenced by a model.
    #[must_use]
    pub fn external_tables_of(&self, name: &str) -> Vec<&str> {
        self.external_tables
            .get(name)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns every model name in the graph.
    #[must_use]
    pub fn model_names(&self) -> Vec<&str> {
        self.downstream.keys().map(String::as_str).collect()
    }

    /// Walks downstream breadth-first from the seed set, returning the seeds
    /// plus every transitive descendant, sorted.
    #[must_use]
    pub fn downstream_closure(&self, seeds: &BTreeSet<String>) -> BTreeSet<String> {
        let mut visited: BTreeSet<String> = seeds
            .iter()
            .filter(|seed| self.downstream.contains_key(*seed))
            .cloned()
            .collect();
        let mut queue: VecDeque<String> = visited.iter().cloned().collect();

        while let Some(current) = queue.pop_front() {
            if let Some(children) = self.downstream.get(&current) {
                for child in children {
                    if visited.insert(child.clone()) {
                        queue.push_back(child.clone());
                    }
                }
            }
        }
        visited
    }

    /// Assigns topological layers to the given model subset.
    ///
    /// A model's layer is one greater than the maximum layer of its in-set
    /// parents, or zero when it has none. Two models in the same layer never
    /// depend on each other.
    #[must_use]
    pub fn parallel_groups(&self, subset: &BTreeSet<String>) -> BTreeMap<String, u32> {
        let mut groups = BTreeMap::new();
        // Deterministic fixpoint over a sorted set; the graph is acyclic so
        // at most |subset| sweeps settle every layer.
        let mut changed = true;
        while changed {
            changed = false;
            for name in subset {
                let parent_max = self
                    .upstream_of(name)
                    .into_iter()
                    .filter(|parent| subset.contains(*parent))
                    .filter_map(|parent| groups.get(parent).copied())
                    .max();
                let unresolved_parent = self
                    .upstream_of(name)
                    .into_iter()
                    .any(|parent| subset.contains(parent) && !groups.contains_key(parent));
                if unresolved_parent {
                    continue;
                }
                let layer = parent_max.map_or(0, |max: u32| max + 1);
                if groups.get(name) != Some(&layer) {
                    groups.insert(name.clone(), layer);
                    changed = true;
                }
            }
        }
        groups
    }

    /// Verifies the graph is acyclic via Kahn's algorithm.
    fn check_acyclic(&self) -> Result<(), DagError> {
        let mut in_degree: BTreeMap<&str, usize> = self
            .upstream
            .iter()
            .map(|(name, parents)| (name.as_str(), parents.len()))
            .collect();
        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| *name)
            .collect();

        let mut resolved = 0usize;
        while let Some(current) = queue.pop_front() {
            resolved += 1;
            if let Some(children) = self.downstream.get(current) {
                for child in children {
                    if let Some(degree) = in_degree.get_mut(child.as_str()) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(child.as_str());
                        }
                    }
                }
            }
        }

        if resolved == self.upstream.len() {
            Ok(())
        } else {
            let stuck: Vec<&str> = in_degree
                .iter()
                .filter(|(_, degree)| **degree > 0)
                .map(|(name, _)| *name)
                .collect();
            Err(DagError::Cycle(stuck.join(", ")))
        }
    }
}
