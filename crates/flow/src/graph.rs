// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DAG helpers: phase computation and dependent closures.

use crate::document::BlockDef;
use std::collections::{HashMap, HashSet, VecDeque};

/// Compute each block's phase by topological relaxation.
///
/// Leaves (no dependencies) are phase 1; every other block is
/// `max(phase of deps) + 1`. Callers must have validated the document
/// first — with an acyclic graph this always converges in document order
/// passes.
pub fn phases(blocks: &[BlockDef]) -> HashMap<String, u32> {
    let mut result: HashMap<String, u32> = HashMap::new();
    // Blocks may reference later-declared dependencies; relax until stable.
    let mut changed = true;
    while changed {
        changed = false;
        for block in blocks {
            let phase = if block.depends_on.is_empty() {
                1
            } else {
                block
                    .depends_on
                    .iter()
                    .map(|dep| result.get(dep).copied().unwrap_or(0))
                    .max()
                    .unwrap_or(0)
                    + 1
            };
            if result.get(&block.name) != Some(&phase) {
                result.insert(block.name.clone(), phase);
                changed = true;
            }
        }
    }
    result
}

/// Reverse dependency graph: block name → names of blocks depending on it.
pub fn dependents_map(blocks: &[BlockDef]) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for block in blocks {
        for dep in &block.depends_on {
            map.entry(dep.clone()).or_default().push(block.name.clone());
        }
    }
    map
}

/// BFS from the seed set through dependents. Returns seeds plus every
/// block transitively downstream of one — the invalidation set on resume.
pub fn transitive_dependents(seeds: &HashSet<String>, blocks: &[BlockDef]) -> HashSet<String> {
    let map = dependents_map(blocks);
    let mut result = seeds.clone();
    let mut queue: VecDeque<String> = seeds.iter().cloned().collect();
    while let Some(current) = queue.pop_front() {
        for downstream in map.get(&current).into_iter().flatten() {
            if result.insert(downstream.clone()) {
                queue.push_back(downstream.clone());
            }
        }
    }
    result
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
