//! Compressed byte-wise radix trie with longest-prefix lookup.
//!
//! Edges carry byte strings; a node with no value and a single child is
//! merged into that child on removal so the trie stays compressed.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

#[derive(Debug)]
struct Leaf<V> {
    key: String,
    value: V,
}

#[derive(Debug)]
struct Node<V> {
    /// Edge label leading into this node.
    prefix: Vec<u8>,
    leaf: Option<Leaf<V>>,
    /// Keyed by the first byte of each child's prefix.
    children: BTreeMap<u8, Node<V>>,
}

impl<V> Node<V> {
    fn new(prefix: Vec<u8>) -> Self {
        Self {
            prefix,
            leaf: None,
            children: BTreeMap::new(),
        }
    }

    fn with_leaf(prefix: Vec<u8>, key: &str, value: V) -> Self {
        Self {
            prefix,
            leaf: Some(Leaf {
                key: key.to_string(),
                value,
            }),
            children: BTreeMap::new(),
        }
    }
}

#[derive(Debug)]
pub struct Trie<V> {
    root: Node<V>,
    len: usize,
}

impl<V> Default for Trie<V> {
    fn default() -> Self {
        Self::new()
    }
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

impl<V> Trie<V> {
    pub fn new() -> Self {
        Self {
            root: Node::new(Vec::new()),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert `key`, returning the previous value if it was present.
    pub fn insert(&mut self, key: &str, value: V) -> Option<V> {
        let Trie { root, len } = self;
        let mut node = root;
        let mut search = key.as_bytes();

        loop {
            let Some(&first) = search.first() else {
                let old = node.leaf.replace(Leaf {
                    key: key.to_string(),
                    value,
                });
                if old.is_none() {
                    *len += 1;
                }
                return old.map(|leaf| leaf.value);
            };

            let child = match node.children.entry(first) {
                Entry::Vacant(slot) => {
                    slot.insert(Node::with_leaf(search.to_vec(), key, value));
                    *len += 1;
                    return None;
                }
                Entry::Occupied(slot) => slot.into_mut(),
            };

            let common = common_prefix_len(&child.prefix, search);
            if common == child.prefix.len() {
                search = &search[common..];
                node = child;
                continue;
            }

            // Split the edge at the divergence point
            let mut tail = std::mem::replace(child, Node::new(search[..common].to_vec()));
            tail.prefix.drain(..common);
            child.children.insert(tail.prefix[0], tail);

            search = &search[common..];
            match search.first() {
                None => {
                    child.leaf = Some(Leaf {
                        key: key.to_string(),
                        value,
                    });
                }
                Some(&next) => {
                    child
                        .children
                        .insert(next, Node::with_leaf(search.to_vec(), key, value));
                }
            }
            *len += 1;
            return None;
        }
    }

    /// Exact lookup.
    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&V> {
        let mut node = &self.root;
        let mut search = key.as_bytes();
        while let Some(&first) = search.first() {
            let child = node.children.get(&first)?;
            search = search.strip_prefix(child.prefix.as_slice())?;
            node = child;
        }
        node.leaf.as_ref().map(|leaf| &leaf.value)
    }

    /// Remove `key`, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        let removed = Self::remove_from(&mut self.root, key.as_bytes());
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    fn remove_from(node: &mut Node<V>, search: &[u8]) -> Option<V> {
        let Some(&first) = search.first() else {
            return node.leaf.take().map(|leaf| leaf.value);
        };

        let child = node.children.get_mut(&first)?;
        let rest = search.strip_prefix(child.prefix.as_slice())?;
        let removed = Self::remove_from(child, rest)?;

        if child.leaf.is_none() {
            if child.children.is_empty() {
                node.children.remove(&first);
            } else if child.children.len() == 1 {
                if let Some((_, mut grandchild)) = child.children.pop_first() {
                    let mut prefix = std::mem::take(&mut child.prefix);
                    prefix.extend_from_slice(&grandchild.prefix);
                    grandchild.prefix = prefix;
                    *child = grandchild;
                }
            }
        }

        Some(removed)
    }

    /// Longest stored key that is a prefix of `query`.
    pub fn longest_prefix(&self, query: &[u8]) -> Option<(&str, &V)> {
        let mut node = &self.root;
        let mut search = query;
        let mut best = node.leaf.as_ref();

        while let Some(&first) = search.first() {
            let Some(child) = node.children.get(&first) else {
                break;
            };
            let Some(rest) = search.strip_prefix(child.prefix.as_slice()) else {
                break;
            };
            search = rest;
            node = child;
            if node.leaf.is_some() {
                best = node.leaf.as_ref();
            }
        }

        best.map(|leaf| (leaf.key.as_str(), &leaf.value))
    }
}
