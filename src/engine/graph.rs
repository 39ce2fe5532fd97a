//! Stream dependency graph
//!
//! Streams form a DAG through their `parents`. The graph is validated once
//! (no duplicates, no unknown parents, no cycles) and split into levels:
//! level 0 holds top-level streams, and every stream sits one level below
//! its deepest parent.

use crate::catalog::Selection;
use crate::error::{Error, Result};
use crate::stream::StreamDefinition;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Validated, leveled set of stream definitions
#[derive(Debug, Clone)]
pub struct StreamGraph {
    definitions: Vec<Arc<StreamDefinition>>,
    index: HashMap<String, usize>,
    levels: Vec<Vec<String>>,
}

impl StreamGraph {
    /// Validate definitions and compute levels
    pub fn new(definitions: Vec<StreamDefinition>) -> Result<Self> {
        let mut index = HashMap::new();
        for (i, def) in definitions.iter().enumerate() {
            if index.insert(def.name.clone(), i).is_some() {
                return Err(Error::DuplicateStream {
                    stream: def.name.clone(),
                });
            }
        }
        for def in &definitions {
            for parent in &def.parents {
                if !index.contains_key(parent) {
                    return Err(Error::UnknownParent {
                        stream: def.name.clone(),
                        parent: parent.clone(),
                    });
                }
            }
        }

        // Kahn's algorithm, one layer at a time
        let mut remaining: Vec<usize> = definitions
            .iter()
            .map(|d| d.parents.iter().collect::<BTreeSet<_>>().len())
            .collect();
        let mut levels: Vec<Vec<String>> = Vec::new();
        let mut current: Vec<usize> = (0..definitions.len())
            .filter(|&i| remaining[i] == 0)
            .collect();
        let mut placed = 0;

        while !current.is_empty() {
            placed += current.len();
            let mut next = Vec::new();
            for &i in &current {
                let name = &definitions[i].name;
                for (j, child) in definitions.iter().enumerate() {
                    if child.parents.contains(name) {
                        remaining[j] -= 1;
                        if remaining[j] == 0 {
                            next.push(j);
                        }
                    }
                }
            }
            next.sort_unstable();
            levels.push(current.iter().map(|&i| definitions[i].name.clone()).collect());
            current = next;
        }

        if placed < definitions.len() {
            let stream = definitions
                .iter()
                .enumerate()
                .find(|(i, _)| remaining[*i] > 0)
                .map(|(_, d)| d.name.clone())
                .unwrap_or_default();
            return Err(Error::CyclicDependency { stream });
        }

        Ok(Self {
            definitions: definitions.into_iter().map(Arc::new).collect(),
            index,
            levels,
        })
    }

    /// Look up a definition
    pub fn get(&self, name: &str) -> Option<&Arc<StreamDefinition>> {
        self.index.get(name).map(|&i| &self.definitions[i])
    }

    /// Definitions in declaration order
    pub fn definitions(&self) -> impl Iterator<Item = &StreamDefinition> {
        self.definitions.iter().map(AsRef::as_ref)
    }

    /// Stream names by level
    pub fn levels(&self) -> &[Vec<String>] {
        &self.levels
    }

    /// Number of streams
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the graph is empty
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Direct children of a stream
    pub fn children(&self, name: &str) -> Vec<&str> {
        self.definitions
            .iter()
            .filter(|d| d.parents.iter().any(|p| p == name))
            .map(|d| d.name.as_str())
            .collect()
    }

    /// All transitive parents of a stream
    pub fn ancestors(&self, name: &str) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        let mut stack = vec![name.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(def) = self.get(&current) {
                for parent in &def.parents {
                    if out.insert(parent.clone()) {
                        stack.push(parent.clone());
                    }
                }
            }
        }
        out
    }

    /// Streams that must run: the selected ones plus their ancestors
    pub fn plan(&self, selection: &Selection) -> BTreeSet<String> {
        let mut plan = BTreeSet::new();
        for def in &self.definitions {
            if selection.is_selected(&def.name) {
                plan.insert(def.name.clone());
                plan.extend(self.ancestors(&def.name));
            }
        }
        plan
    }
}
