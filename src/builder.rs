//! Prefix set builder
//!
//! Builds a stride-8 radix tree from CIDR prefixes with 16-bit tags and
//! serializes it into the memory-mappable artifact described in
//! [`crate::format`]. One tree holds both families: an IPv4 prefix walks up
//! to 4 byte levels, an IPv6 prefix up to 16.
//!
//! Insertion is coverage-aware: once a node is a leaf, every longer prefix
//! underneath it is absorbed and inserting one is a no-op. Callers that mix
//! prefix lengths with conflicting tags should insert in ascending mask
//! order so that shorter prefixes claim their subtree first; for the exact
//! same prefix the last write wins.

use crate::cidr;
use crate::cidr_list::CidrLines;
use crate::error::{PoptrieError, Result};
use crate::format::{Bitmap256, Header, NodeRecord, HEADER_SIZE, MAGIC, NODE_SIZE};
use log::debug;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use zerocopy::little_endian::U32;
use zerocopy::IntoBytes;

/// One build-time tree node.
///
/// Children are sparse near the root and dense near the leaves; a `BTreeMap`
/// keeps them ordered by byte key, which is the order the serializer needs.
#[derive(Debug, Default)]
struct Node {
    children: BTreeMap<u8, Node>,
    is_leaf: bool,
    value: u16,
}

impl Node {
    fn leaf(value: u16) -> Self {
        Node {
            children: BTreeMap::new(),
            is_leaf: true,
            value,
        }
    }
}

/// Builder for the serialized prefix set.
///
/// # Example
///
/// ```rust,no_run
/// use poptrie::PoptrieBuilder;
///
/// let cn = (b'C' as u16) << 8 | b'N' as u16;
/// let mut builder = PoptrieBuilder::new();
/// builder.add_cidr("1.0.1.0/24", cn)?;
/// builder.add_cidr("240e::/18", cn)?;
/// builder.save("cn.ptv2")?;
/// # Ok::<(), poptrie::PoptrieError>(())
/// ```
#[derive(Debug, Default)]
pub struct PoptrieBuilder {
    root: Node,
    prefix_count: usize,
}

impl PoptrieBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of prefixes accepted so far, including inserts that were
    /// absorbed by an already-present shorter prefix.
    pub fn prefix_count(&self) -> usize {
        self.prefix_count
    }

    /// Whether any prefix has been accepted.
    pub fn is_empty(&self) -> bool {
        self.prefix_count == 0
    }

    /// Parse one CIDR string and insert it with `tag`.
    ///
    /// Unparseable input is skipped silently, matching the permissive
    /// ingest posture of prefix list consumers; callers that want
    /// strictness should pre-validate their input. A `tag` of 0 is a hard
    /// error because the reader reserves 0 for "no match".
    pub fn add_cidr(&mut self, text: &str, tag: u16) -> Result<()> {
        if tag == 0 {
            return Err(PoptrieError::InvalidTag(0));
        }
        match cidr::parse_cidr(text) {
            Some(prefix) => self.add_prefix(prefix.bytes(), prefix.mask_bits(), tag),
            None => Ok(()),
        }
    }

    /// Insert a prefix given as packed address bytes and a mask bit count.
    ///
    /// `bytes` must be 4 (IPv4) or 16 (IPv6) bytes and `mask_bits` at most
    /// `8 * bytes.len()`. A `tag` of 0 is rejected.
    pub fn add_prefix(&mut self, bytes: &[u8], mask_bits: u8, tag: u16) -> Result<()> {
        if tag == 0 {
            return Err(PoptrieError::InvalidTag(0));
        }
        if mask_bits as usize > bytes.len() * 8 {
            return Err(PoptrieError::Validation(format!(
                "mask /{} exceeds the {} address bits",
                mask_bits,
                bytes.len() * 8
            )));
        }
        self.prefix_count += 1;

        let steps = (mask_bits >> 3) as usize;
        let remaining = mask_bits & 7;

        let mut current = &mut self.root;
        for &byte in &bytes[..steps] {
            // a leaf on the path means a shorter prefix already covers this one
            if current.is_leaf {
                return Ok(());
            }
            current = current.children.entry(byte).or_default();
        }

        if remaining == 0 {
            // byte-aligned mask: this node becomes the leaf and absorbs
            // everything underneath it
            current.is_leaf = true;
            current.value = tag;
            current.children.clear();
        } else {
            if current.is_leaf {
                return Ok(());
            }
            // non-aligned mask: the remaining bits select a byte range at
            // the next level, one leaf child per covered byte
            let shift = 8 - remaining;
            let lo = bytes[steps] & (0xFFu8 << shift);
            let hi = lo | (0xFFu8 >> remaining);
            for byte in lo..=hi {
                current.children.insert(byte, Node::leaf(tag));
            }
        }
        Ok(())
    }

    /// Read a CIDR list file (optionally gzipped, `-` for stdin) and insert
    /// every parseable line with `tag`.
    ///
    /// Blank lines and `#` comments are skipped. Returns the number of
    /// lines accepted as prefixes, counting inserts absorbed by an
    /// already-present shorter prefix.
    pub fn add_cidr_list<P: AsRef<Path>>(&mut self, path: P, tag: u16) -> Result<usize> {
        if tag == 0 {
            return Err(PoptrieError::InvalidTag(0));
        }
        let mut inserted = 0usize;
        for line in CidrLines::open(path.as_ref())? {
            let before = self.prefix_count;
            self.add_cidr(&line?, tag)?;
            if self.prefix_count > before {
                inserted += 1;
            }
        }
        debug!(
            "ingested {} prefixes from {}",
            inserted,
            path.as_ref().display()
        );
        Ok(inserted)
    }

    /// Prune and serialize the tree into an artifact buffer.
    ///
    /// Serialization is deterministic: the same sequence of inserts always
    /// produces byte-identical output.
    pub fn to_bytes(&mut self) -> Vec<u8> {
        prune(&mut self.root);

        let mut nodes: Vec<u8> = Vec::new();
        let mut values: Vec<u16> = Vec::new();
        let mut node_count = 0u32;

        // Breadth-first over children-bearing nodes; the root always takes
        // the first slot, so the first layer of successors lands right
        // after it.
        let mut current_layer: Vec<&Node> = vec![&self.root];
        let mut next_layer_offset = HEADER_SIZE + NODE_SIZE;

        while !current_layer.is_empty() {
            let mut next_layer = Vec::new();
            for node in current_layer {
                let mut record = NodeRecord {
                    child_bitmap: Bitmap256::default(),
                    leaf_bitmap: Bitmap256::default(),
                    child_offset: U32::new(0),
                    leaf_base: U32::new(values.len() as u32),
                };
                let mut successors = 0usize;
                for (&byte, child) in &node.children {
                    if child.is_leaf {
                        record.leaf_bitmap.set(byte);
                        values.push(child.value);
                    }
                    if !child.children.is_empty() {
                        record.child_bitmap.set(byte);
                        next_layer.push(child);
                        successors += 1;
                    }
                }
                if successors > 0 {
                    record.child_offset = U32::new(next_layer_offset as u32);
                    next_layer_offset += successors * NODE_SIZE;
                }
                nodes.extend_from_slice(record.as_bytes());
                node_count += 1;
            }
            current_layer = next_layer;
        }

        let header = Header {
            magic: MAGIC,
            node_count: U32::new(node_count),
            value_count: U32::new(values.len() as u32),
            reserved: U32::new(0),
        };

        let mut out = Vec::with_capacity(HEADER_SIZE + nodes.len() + values.len() * 2);
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(&nodes);
        for value in values {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out
    }

    /// Prune, serialize, and write the artifact to `path`.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let bytes = self.to_bytes();
        debug!(
            "writing {} bytes ({} prefixes) to {}",
            bytes.len(),
            self.prefix_count,
            path.as_ref().display()
        );
        fs::write(path, &bytes)?;
        Ok(())
    }
}

/// Collapse fully saturated uniform subtrees bottom-up.
///
/// A node whose 256 children are all leaves carrying one shared value
/// becomes a leaf itself. Partial byte ranges are never merged, so the
/// per-byte descent of the reader stays intact. Returns whether the node
/// is (or became) a leaf.
fn prune(node: &mut Node) -> bool {
    if node.children.is_empty() {
        return node.is_leaf;
    }

    let mut saturated = node.children.len() == 256;
    let mut shared_value: Option<u16> = None;
    for child in node.children.values_mut() {
        if prune(child) {
            match shared_value {
                None => shared_value = Some(child.value),
                Some(value) if value == child.value => {}
                Some(_) => saturated = false,
            }
        } else {
            saturated = false;
        }
    }

    if saturated {
        if let Some(value) = shared_value {
            node.is_leaf = true;
            node.value = value;
            node.children.clear();
            return true;
        }
    }
    node.is_leaf
}
