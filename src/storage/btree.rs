//! The on-disk B+ tree mapping primary keys to data-file byte offsets.
//!
//! All records live in leaves; internal nodes carry only separator keys for
//! routing. A node holds at most `M - 1` keys. Inserting into a full leaf
//! splits it and promotes a copy of the right sibling's smallest key;
//! inserting into a full internal node splits it and moves the middle key
//! up. The tree grows only at the root, so every leaf stays at the same
//! depth.
//!
//! Child "pointers" are node IDs handed out by the pager's allocator, not
//! memory addresses; `-1` in `next_leaf` marks the rightmost leaf.
//!
//! Duplicate detection is layered above the tree: callers must `search`
//! and observe a miss before calling `insert`. The row engine enforces
//! that contract; the tree itself does not reject duplicates.

use super::pager::Pager;
use crate::errors::Error;
use bincode::{Decode, Encode};
use std::path::Path;
use tracing::debug;

/// Order of the B+ tree: max children per internal node. A node holds at
/// most `M - 1` keys, so with `M = 3` a third key triggers a split.
pub const M: usize = 3;

/// On-disk size of a node record: `is_leaf` + `num_keys` + keys + offsets
/// + children + `next_leaf`, packed little-endian without padding.
pub const NODE_SIZE: usize = 8 + (M - 1) * 4 + (M - 1) * 8 + M * 4 + 4;

/// Fixed node layout, identical for leaves and internals. `offsets` is
/// meaningful only in leaves, `children` only in internals.
#[derive(Encode, Decode, Debug, Clone)]
pub struct Node {
    /// 1 if leaf, 0 if internal.
    pub is_leaf: i32,
    /// Number of keys currently in the node, in `[0, M - 1]`.
    pub num_keys: i32,
    /// Ascending keys.
    pub keys: [i32; M - 1],
    /// Data-file byte offsets paired with `keys` (leaf only).
    pub offsets: [i64; M - 1],
    /// Child node IDs (internal only).
    pub children: [i32; M],
    /// ID of the next leaf in key order, or -1 for the rightmost leaf.
    pub next_leaf: i32,
}

impl Node {
    pub fn leaf() -> Self {
        Node {
            is_leaf: 1,
            num_keys: 0,
            keys: [0; M - 1],
            offsets: [0; M - 1],
            children: [0; M],
            next_leaf: -1,
        }
    }

    pub fn internal() -> Self {
        Node {
            is_leaf: 0,
            ..Node::leaf()
        }
    }
}

/// Outcome of an insertion one level down: the separator key and the new
/// right sibling to add to the parent.
struct Split {
    separator: i32,
    right_id: i32,
}

/// A per-table primary-key index backed by one open index file.
pub struct BTree {
    pager: Pager,
}

impl BTree {
    pub fn open(path: &Path) -> Result<Self, Error> {
        Ok(BTree {
            pager: Pager::open(path)?,
        })
    }

    /// Look up the data-file offset stored for `key`.
    pub fn search(&mut self, key: i32) -> Result<Option<i64>, Error> {
        let mut node_id = self.pager.root_id();
        loop {
            let node = self.pager.read_node(node_id)?;
            if node.is_leaf == 1 {
                let n = node.num_keys as usize;
                return Ok((0..n)
                    .find(|&i| node.keys[i] == key)
                    .map(|i| node.offsets[i]));
            }
            node_id = node.children[child_index(&node, key)];
        }
    }

    /// Insert a key/offset pair, splitting nodes on the way back up and
    /// growing a new root when the split reaches the top.
    pub fn insert(&mut self, key: i32, offset: i64) -> Result<(), Error> {
        let root_id = self.pager.root_id();
        if let Some(split) = self.insert_into(root_id, key, offset)? {
            let mut root = Node::internal();
            root.num_keys = 1;
            root.keys[0] = split.separator;
            root.children[0] = root_id;
            root.children[1] = split.right_id;

            let new_root_id = self.pager.allocate()?;
            self.pager.write_node(new_root_id, &root)?;
            self.pager.set_root(new_root_id)?;
            debug!(new_root_id, separator = split.separator, "Root split, tree grew");
        }
        Ok(())
    }

    /// Keys of every leaf, left to right, following `next_leaf` links.
    pub fn leaf_keys(&mut self) -> Result<Vec<i32>, Error> {
        let mut node_id = self.pager.root_id();
        loop {
            let node = self.pager.read_node(node_id)?;
            if node.is_leaf == 1 {
                break;
            }
            node_id = node.children[0];
        }

        let mut keys = Vec::new();
        loop {
            let node = self.pager.read_node(node_id)?;
            keys.extend_from_slice(&node.keys[..node.num_keys as usize]);
            if node.next_leaf == -1 {
                break;
            }
            node_id = node.next_leaf;
        }
        Ok(keys)
    }

    fn insert_into(&mut self, node_id: i32, key: i32, offset: i64) -> Result<Option<Split>, Error> {
        let node = self.pager.read_node(node_id)?;
        if node.is_leaf == 1 {
            return self.insert_into_leaf(node_id, node, key, offset);
        }

        let idx = child_index(&node, key);
        let child_id = node.children[idx];
        match self.insert_into(child_id, key, offset)? {
            None => Ok(None),
            Some(split) => self.insert_separator(node_id, node, idx, split),
        }
    }

    fn insert_into_leaf(
        &mut self,
        node_id: i32,
        mut node: Node,
        key: i32,
        offset: i64,
    ) -> Result<Option<Split>, Error> {
        let n = node.num_keys as usize;
        if n < M - 1 {
            // Room left: shift higher pairs right and place the new one.
            let mut i = n;
            while i > 0 && key < node.keys[i - 1] {
                node.keys[i] = node.keys[i - 1];
                node.offsets[i] = node.offsets[i - 1];
                i -= 1;
            }
            node.keys[i] = key;
            node.offsets[i] = offset;
            node.num_keys += 1;
            self.pager.write_node(node_id, &node)?;
            return Ok(None);
        }

        // Leaf is full: merge the existing pairs and the new one in order.
        let mut keys = [0i32; M];
        let mut offsets = [0i64; M];
        let (mut i, mut j) = (0, 0);
        while i < M - 1 && node.keys[i] < key {
            keys[j] = node.keys[i];
            offsets[j] = node.offsets[i];
            i += 1;
            j += 1;
        }
        keys[j] = key;
        offsets[j] = offset;
        j += 1;
        while i < M - 1 {
            keys[j] = node.keys[i];
            offsets[j] = node.offsets[i];
            i += 1;
            j += 1;
        }

        // Left keeps the first M/2 pairs, the new right leaf the rest.
        let split_at = M / 2;
        let right_id = self.pager.allocate()?;

        let mut right = Node::leaf();
        right.num_keys = (M - split_at) as i32;
        for k in 0..M - split_at {
            right.keys[k] = keys[split_at + k];
            right.offsets[k] = offsets[split_at + k];
        }
        right.next_leaf = node.next_leaf;

        node.num_keys = split_at as i32;
        node.keys = [0; M - 1];
        node.offsets = [0; M - 1];
        for k in 0..split_at {
            node.keys[k] = keys[k];
            node.offsets[k] = offsets[k];
        }
        node.next_leaf = right_id;

        self.pager.write_node(right_id, &right)?;
        self.pager.write_node(node_id, &node)?;
        debug!(node_id, right_id, separator = right.keys[0], "Leaf split");

        // The separator is a copy; the right leaf still holds that key.
        Ok(Some(Split {
            separator: right.keys[0],
            right_id,
        }))
    }

    /// Add a promoted separator and right-child pointer to an internal
    /// node, splitting it when full.
    fn insert_separator(
        &mut self,
        node_id: i32,
        mut node: Node,
        idx: usize,
        child: Split,
    ) -> Result<Option<Split>, Error> {
        let n = node.num_keys as usize;
        if n < M - 1 {
            let mut j = n;
            while j > idx {
                node.keys[j] = node.keys[j - 1];
                node.children[j + 1] = node.children[j];
                j -= 1;
            }
            node.keys[idx] = child.separator;
            node.children[idx + 1] = child.right_id;
            node.num_keys += 1;
            self.pager.write_node(node_id, &node)?;
            return Ok(None);
        }

        // Merge the M-1 keys and M children plus the promoted pair.
        let mut keys = [0i32; M];
        let mut children = [0i32; M + 1];
        for j in 0..idx {
            keys[j] = node.keys[j];
            children[j] = node.children[j];
        }
        children[idx] = node.children[idx];
        keys[idx] = child.separator;
        children[idx + 1] = child.right_id;
        for j in idx..M - 1 {
            keys[j + 1] = node.keys[j];
            children[j + 2] = node.children[j + 1];
        }

        // The middle key moves up and disappears from this level.
        let split_at = M / 2;
        let separator = keys[split_at];
        let right_id = self.pager.allocate()?;

        let mut right = Node::internal();
        right.num_keys = (M - 1 - split_at) as i32;
        for j in 0..M - 1 - split_at {
            right.keys[j] = keys[split_at + 1 + j];
            right.children[j] = children[split_at + 1 + j];
        }
        right.children[M - 1 - split_at] = children[M];

        node.num_keys = split_at as i32;
        node.keys = [0; M - 1];
        node.children = [0; M];
        for j in 0..split_at {
            node.keys[j] = keys[j];
            node.children[j] = children[j];
        }
        node.children[split_at] = children[split_at];

        self.pager.write_node(right_id, &right)?;
        self.pager.write_node(node_id, &node)?;
        debug!(node_id, right_id, separator, "Internal split");

        Ok(Some(Split {
            separator,
            right_id,
        }))
    }
}

/// Descent rule: the first child index `i` such that `key < keys[i]`, or
/// the rightmost child when no key is larger.
fn child_index(node: &Node, key: i32) -> usize {
    let n = node.num_keys as usize;
    (0..n).find(|&i| key < node.keys[i]).unwrap_or(n)
}
