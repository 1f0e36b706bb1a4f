//! Graph storage: flat vector rows plus per-layer adjacency lists.

use std::collections::VecDeque;

use crate::models::ItemId;
use crate::vector::inner_product;

/// The hierarchical proximity graph and the vectors it is built over.
///
/// Vectors live in one preallocated row-major buffer; node `id` owns row
/// `id`. `links[id][layer]` is the neighbor list of `id` at `layer`, so a
/// node's top layer is `links[id].len() - 1`.
///
/// Layer 0 also carries a spanning tree: every node after the first records
/// a `parent` it is linked to in both directions. Tree edges are never
/// pruned, so every node stays reachable from every other at layer 0 no
/// matter how the heuristic trims the remaining links.
#[derive(Debug, Clone)]
pub struct Graph {
    dims: usize,
    m: usize,
    vectors: Vec<f32>,
    links: Vec<Vec<Vec<ItemId>>>,
    parents: Vec<Option<ItemId>>,
    children: Vec<usize>,
    entry_point: Option<ItemId>,
    max_level: usize,
}

impl Graph {
    pub(crate) fn with_capacity(dims: usize, m: usize, capacity: usize) -> Self {
        Self {
            dims,
            m,
            vectors: Vec::with_capacity(dims * capacity),
            links: Vec::with_capacity(capacity),
            parents: Vec::with_capacity(capacity),
            children: Vec::with_capacity(capacity),
            entry_point: None,
            max_level: 0,
        }
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Vector dimensionality.
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// The node search starts from: the first node to reach the current top layer.
    pub fn entry_point(&self) -> Option<ItemId> {
        self.entry_point
    }

    /// Highest layer any node occupies.
    pub fn max_level(&self) -> usize {
        self.max_level
    }

    /// Top layer of node `id`.
    pub fn level(&self, id: ItemId) -> usize {
        self.links[id as usize].len() - 1
    }

    /// Stored (normalized) vector of node `id`.
    pub fn vector(&self, id: ItemId) -> &[f32] {
        let start = id as usize * self.dims;
        &self.vectors[start..start + self.dims]
    }

    /// Neighbors of `id` at `layer`; empty above the node's top layer.
    pub fn neighbors(&self, id: ItemId, layer: usize) -> &[ItemId] {
        self.links[id as usize]
            .get(layer)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Maximum neighbor count at `layer`: `2M` at layer 0, `M` above.
    pub fn layer_cap(&self, layer: usize) -> usize {
        if layer == 0 {
            self.m * 2
        } else {
            self.m
        }
    }

    /// Inner product between node `id` and an arbitrary query.
    #[inline]
    pub(crate) fn similarity(&self, id: ItemId, query: &[f32]) -> f32 {
        inner_product(self.vector(id), query)
    }

    #[inline]
    pub(crate) fn similarity_between(&self, a: ItemId, b: ItemId) -> f32 {
        inner_product(self.vector(a), self.vector(b))
    }

    /// Append a node with empty neighbor lists on layers `0..=level`.
    pub(crate) fn push_node(&mut self, vector: &[f32], level: usize) -> ItemId {
        let id = self.links.len() as ItemId;
        self.vectors.extend_from_slice(vector);
        self.links.push(vec![Vec::new(); level + 1]);
        self.parents.push(None);
        self.children.push(0);
        id
    }

    /// Number of tree edges touching `id`.
    pub(crate) fn tree_degree(&self, id: ItemId) -> usize {
        self.children[id as usize] + usize::from(self.parents[id as usize].is_some())
    }

    /// True when `a -> b` is a layer-0 tree edge in either direction.
    pub(crate) fn is_tree_edge(&self, a: ItemId, b: ItemId) -> bool {
        self.parents[a as usize] == Some(b) || self.parents[b as usize] == Some(a)
    }

    pub(crate) fn set_parent(&mut self, child: ItemId, parent: ItemId) {
        self.parents[child as usize] = Some(parent);
        self.children[parent as usize] += 1;
    }

    /// Breadth-first walk over layer 0 from `start` for the first node with
    /// fewer than `cap` tree edges.
    ///
    /// Tree edges number `len - 1` while capacity is `cap * len`, so with
    /// `cap >= 2` such a node always exists and the walk finds it as long as
    /// layer 0 is connected.
    pub(crate) fn find_tree_slot(&self, start: ItemId, cap: usize) -> Option<ItemId> {
        let mut seen = vec![false; self.len()];
        let mut queue = VecDeque::from([start]);
        seen[start as usize] = true;

        while let Some(id) = queue.pop_front() {
            if self.tree_degree(id) < cap {
                return Some(id);
            }
            for &n in self.neighbors(id, 0) {
                if !seen[n as usize] {
                    seen[n as usize] = true;
                    queue.push_back(n);
                }
            }
        }
        None
    }

    pub(crate) fn set_neighbors(&mut self, id: ItemId, layer: usize, neighbors: Vec<ItemId>) {
        self.links[id as usize][layer] = neighbors;
    }

    /// Add a directed edge `from -> to`; returns the new degree of `from`.
    pub(crate) fn add_edge(&mut self, from: ItemId, layer: usize, to: ItemId) -> usize {
        let list = &mut self.links[from as usize][layer];
        if !list.contains(&to) {
            list.push(to);
        }
        list.len()
    }

    pub(crate) fn set_entry_point(&mut self, id: ItemId, level: usize) {
        self.entry_point = Some(id);
        self.max_level = level;
    }

    /// Count nodes reachable from the entry point over layer-0 edges.
    pub fn reachable_at_layer0(&self) -> usize {
        let Some(entry) = self.entry_point else {
            return 0;
        };

        let mut seen = vec![false; self.len()];
        let mut queue = VecDeque::from([entry]);
        seen[entry as usize] = true;
        let mut count = 1;

        while let Some(id) = queue.pop_front() {
            for &n in self.neighbors(id, 0) {
                if !seen[n as usize] {
                    seen[n as usize] = true;
                    count += 1;
                    queue.push_back(n);
                }
            }
        }
        count
    }

    /// True when every neighbor list respects its layer cap.
    pub fn degrees_bounded(&self) -> bool {
        self.links.iter().all(|layers| {
            layers
                .iter()
                .enumerate()
                .all(|(layer, list)| list.len() <= self.layer_cap(layer))
        })
    }
}
