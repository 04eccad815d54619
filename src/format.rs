//! On-disk artifact layout
//!
//! The serialized prefix set is a flat file with three regions:
//!
//! ```text
//! [header 16 bytes]   magic "PTV2", node count, value count, reserved
//! [node array]        node_count x 72 bytes, breadth-first, root first
//! [value table]       value_count x u16 little-endian tags
//! ```
//!
//! Every node carries two 256-bit presence bitmaps (one for children, one
//! for leaves), the absolute file offset of its first child record, and the
//! index of its first leaf tag in the value table. Byte key `b` occupies bit
//! `255 - b` of the bitmap viewed as a big-endian 256-bit integer, which is
//! bit `7 - (b & 7)` of bitmap byte `b >> 3`.
//!
//! All structures are `#[repr(C)]` with alignment-1 fields so they can be
//! referenced directly inside a memory-mapped file at any offset.

use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Magic bytes identifying a serialized prefix set
pub(crate) const MAGIC: [u8; 4] = *b"PTV2";

/// Size of the file header in bytes
pub(crate) const HEADER_SIZE: usize = 16;

/// Size of one serialized node record in bytes
pub(crate) const NODE_SIZE: usize = 72;

/// File header (16 bytes)
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy)]
#[repr(C)]
pub(crate) struct Header {
    /// Magic bytes: "PTV2"
    pub magic: [u8; 4],
    /// Number of node records in the node array
    pub node_count: U32,
    /// Number of entries in the value table
    pub value_count: U32,
    /// Reserved, written as zero
    pub reserved: U32,
}

/// One serialized tree node (72 bytes)
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy)]
#[repr(C)]
pub(crate) struct NodeRecord {
    /// Presence bitmap for bytes that continue into a deeper node
    pub child_bitmap: Bitmap256,
    /// Presence bitmap for bytes that terminate a prefix here
    pub leaf_bitmap: Bitmap256,
    /// Absolute file offset of the first child record, 0 when childless
    pub child_offset: U32,
    /// Value-table index of this node's first leaf tag
    pub leaf_base: U32,
}

/// 256-bit presence bitmap stored as 32 big-endian bytes
#[derive(
    FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy, PartialEq, Eq,
    Default,
)]
#[repr(transparent)]
pub(crate) struct Bitmap256(pub [u8; 32]);

impl Bitmap256 {
    /// Mark byte key `key` as present.
    #[inline]
    pub fn set(&mut self, key: u8) {
        self.0[(key >> 3) as usize] |= 1u8 << (7 - (key & 7));
    }

    /// Whether byte key `key` is present.
    #[inline]
    pub fn test(&self, key: u8) -> bool {
        self.0[(key >> 3) as usize] & (1u8 << (7 - (key & 7))) != 0
    }

    /// Number of present keys strictly below `key`.
    ///
    /// Children and leaves are serialized in ascending byte-key order, so
    /// this rank maps a byte key to its dense index within the node.
    #[inline]
    pub fn rank(&self, key: u8) -> u32 {
        let limb_index = (key >> 6) as usize;
        let mut count = 0u32;
        for i in 0..limb_index {
            count += self.limb(i).count_ones();
        }
        // keep only the bits more significant than the key's own bit
        let above = !(u64::MAX >> (key & 63));
        count + (self.limb(limb_index) & above).count_ones()
    }

    /// Total number of present keys.
    #[inline]
    pub fn count_ones(&self) -> u32 {
        (0..4).map(|i| self.limb(i).count_ones()).sum()
    }

    #[inline]
    fn limb(&self, index: usize) -> u64 {
        let b = &self.0;
        let o = index * 8;
        u64::from_be_bytes([
            b[o],
            b[o + 1],
            b[o + 2],
            b[o + 3],
            b[o + 4],
            b[o + 5],
            b[o + 6],
            b[o + 7],
        ])
    }
}
