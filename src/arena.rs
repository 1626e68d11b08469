//! Node arena with an intrusive free list.
//!
//! Nodes live in one contiguous `Vec` and are addressed by 30-bit indices.
//! Erased slots are not compacted: they are pushed on a free list threaded
//! through their left link word and handed out again before the `Vec` grows.
//!
//! Slot states:
//! - unused: spare `Vec` capacity, never constructed
//! - used: `is_used()` set, value present, linked into exactly one tree
//! - freed: `is_used()` clear, value dropped, on the free list

use crate::link::{Dir, NodeLinks, MAX_NODES, NIL};
use crate::{Result, TrbError};

pub(crate) struct Node<T, S> {
    pub(crate) links: NodeLinks,
    pub(crate) sum: S,
    pub(crate) value: Option<T>,
}

pub struct NodeArena<T, S> {
    nodes: Vec<Node<T, S>>,
    /// Head of the free list, `NIL` when empty.
    free_head: u32,
    free_len: usize,
}

#[cold]
#[inline(never)]
fn dead_slot(idx: u32) -> ! {
    panic!("node {idx} is not a live element")
}

impl<T, S> NodeArena<T, S> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free_head: NIL,
            free_len: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity.min(MAX_NODES)),
            free_head: NIL,
            free_len: 0,
        }
    }

    /// Slots ever constructed (live + freed).
    #[inline]
    pub fn slots(&self) -> usize {
        self.nodes.len()
    }

    /// Live elements.
    #[inline]
    pub fn live(&self) -> usize {
        self.nodes.len() - self.free_len
    }

    #[cfg(test)]
    pub(crate) fn free_len(&self) -> usize {
        self.free_len
    }

    /// Capacity of the backing `Vec`.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.nodes.capacity()
    }

    pub fn memory_usage(&self) -> usize {
        self.nodes.capacity() * std::mem::size_of::<Node<T, S>>()
    }

    /// Make room for `additional` more live elements without reallocating.
    pub fn try_reserve(&mut self, additional: usize) -> Result<()> {
        let need = additional.saturating_sub(self.free_len);
        if self.nodes.len().saturating_add(need) > MAX_NODES {
            return Err(TrbError::CapacityOverflow { max: MAX_NODES });
        }
        let before = self.nodes.capacity();
        self.nodes.try_reserve(need)?;
        if self.nodes.capacity() != before {
            tracing::debug!(
                from = before,
                to = self.nodes.capacity(),
                "node arena reserved"
            );
        }
        Ok(())
    }

    /// Take a slot for `value`. The tree is not touched; on error nothing
    /// changed.
    pub(crate) fn alloc(&mut self, value: T, sum: S) -> Result<u32> {
        if self.free_head != NIL {
            let idx = self.free_head;
            let node = &mut self.nodes[idx as usize];
            debug_assert!(node.links.is_empty() && node.value.is_none());
            self.free_head = node.links.link(Dir::Left);
            self.free_len -= 1;
            node.links = NodeLinks::new();
            node.links.set_used();
            node.sum = sum;
            node.value = Some(value);
            tracing::trace!(idx, "reused free node slot");
            return Ok(idx);
        }

        if self.nodes.len() >= MAX_NODES {
            return Err(TrbError::CapacityOverflow { max: MAX_NODES });
        }
        if self.nodes.len() == self.nodes.capacity() {
            let before = self.nodes.capacity();
            self.nodes.try_reserve(1)?;
            tracing::debug!(
                from = before,
                to = self.nodes.capacity(),
                "node arena grew"
            );
        }
        let idx = self.nodes.len() as u32;
        let mut links = NodeLinks::new();
        links.set_used();
        self.nodes.push(Node {
            links,
            sum,
            value: Some(value),
        });
        Ok(idx)
    }

    /// Drop a slot onto the free list and hand back its value.
    ///
    /// The caller must already have unlinked it from its tree.
    pub(crate) fn free(&mut self, idx: u32) -> T {
        let free_head = self.free_head;
        let node = &mut self.nodes[idx as usize];
        let Some(value) = node.value.take() else {
            dead_slot(idx)
        };
        node.links = NodeLinks::new();
        node.links.set_empty();
        node.links.set_link(Dir::Left, free_head);
        self.free_head = idx;
        self.free_len += 1;
        value
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free_head = NIL;
        self.free_len = 0;
    }

    pub fn shrink_to_fit(&mut self) {
        self.nodes.shrink_to_fit();
    }

    #[inline]
    pub(crate) fn links(&self, idx: u32) -> &NodeLinks {
        &self.nodes[idx as usize].links
    }

    #[inline]
    pub(crate) fn links_mut(&mut self, idx: u32) -> &mut NodeLinks {
        &mut self.nodes[idx as usize].links
    }

    #[inline]
    pub(crate) fn is_live(&self, idx: u32) -> bool {
        (idx as usize) < self.nodes.len() && self.nodes[idx as usize].links.is_used()
    }

    #[inline]
    pub(crate) fn value(&self, idx: u32) -> &T {
        match &self.nodes[idx as usize].value {
            Some(v) => v,
            None => dead_slot(idx),
        }
    }

    #[inline]
    pub(crate) fn value_mut(&mut self, idx: u32) -> &mut T {
        match &mut self.nodes[idx as usize].value {
            Some(v) => v,
            None => dead_slot(idx),
        }
    }

    #[inline]
    pub(crate) fn get(&self, idx: u32) -> Option<&T> {
        self.nodes.get(idx as usize)?.value.as_ref()
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, idx: u32) -> Option<&mut T> {
        self.nodes.get_mut(idx as usize)?.value.as_mut()
    }

    #[inline]
    pub(crate) fn sum(&self, idx: u32) -> &S {
        &self.nodes[idx as usize].sum
    }

    #[inline]
    pub(crate) fn set_sum(&mut self, idx: u32, sum: S) {
        self.nodes[idx as usize].sum = sum;
    }

    #[inline]
    pub(crate) fn sum_mut(&mut self, idx: u32) -> &mut S {
        &mut self.nodes[idx as usize].sum
    }

    /// Indices of all live slots in storage order.
    pub(crate) fn live_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.links.is_used())
            .map(|(i, _)| i as u32)
    }

    /// Walk the free list. Test helper.
    #[cfg(test)]
    pub(crate) fn free_list(&self) -> Vec<u32> {
        let mut out = Vec::new();
        let mut cur = self.free_head;
        while cur != NIL {
            out.push(cur);
            cur = self.nodes[cur as usize].links.link(Dir::Left);
        }
        out
    }
}

impl<T, S> Default for NodeArena<T, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, S: Clone> Clone for NodeArena<T, S> {
    fn clone(&self) -> Self {
        Self {
            nodes: self
                .nodes
                .iter()
                .map(|n| Node {
                    links: n.links,
                    sum: n.sum.clone(),
                    value: n.value.clone(),
                })
                .collect(),
            free_head: self.free_head,
            free_len: self.free_len,
        }
    }
}
