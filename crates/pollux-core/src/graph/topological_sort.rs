// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A generic implementation of Kahn's algorithm for topological sorting.

use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;

/// An error indicating that a cycle was detected in the graph.
///
/// Carries the nodes that could not be ordered, in their input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError<T>(pub Vec<T>);

/// Performs a topological sort on a generic directed graph.
///
/// Edges are `(parent, child)` pairs: the parent is emitted before the child.
/// Duplicate edges are ignored and edges naming unknown nodes are skipped.
/// Among nodes that become ready at the same time, input order is preserved,
/// so the result is deterministic for a given input.
///
/// # Errors
///
/// Returns [`CycleError`] listing the unresolved nodes if the graph has a cycle.
pub fn topological_sort<T>(
    nodes: impl IntoIterator<Item = T>,
    edges: impl IntoIterator<Item = (T, T)>,
) -> Result<Vec<T>, CycleError<T>>
where
    T: Copy + Eq + Hash,
{
    let node_list: Vec<T> = nodes.into_iter().collect();
    let mut in_degree: HashMap<T, usize> = node_list.iter().map(|n| (*n, 0)).collect();
    let mut children: HashMap<T, Vec<T>> = HashMap::new();
    let mut seen: HashSet<(T, T)> = HashSet::new();

    for (parent, child) in edges {
        if !in_degree.contains_key(&parent) || !seen.insert((parent, child)) {
            continue;
        }
        if let Some(degree) = in_degree.get_mut(&child) {
            *degree += 1;
            children.entry(parent).or_default().push(child);
        }
    }

    let mut ready: VecDeque<T> = node_list
        .iter()
        .copied()
        .filter(|n| in_degree[n] == 0)
        .collect();
    let mut sorted = Vec::with_capacity(node_list.len());

    while let Some(node) = ready.pop_front() {
        sorted.push(node);
        for child in children.get(&node).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(child) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(*child);
                }
            }
        }
    }

    if sorted.len() == node_list.len() {
        Ok(sorted)
    } else {
        let emitted: HashSet<T> = sorted.into_iter().collect();
        Err(CycleError(
            node_list
                .into_iter()
                .filter(|n| !emitted.contains(n))
                .collect(),
        ))
    }
}
