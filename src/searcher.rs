//! Memory-mapped prefix set reader
//!
//! Opens the artifact produced by [`crate::builder::PoptrieBuilder`] and
//! answers longest-prefix-match lookups against it. The lookup walks one
//! key byte per node, using the two 256-bit presence bitmaps and a popcount
//! rank to locate child records and leaf tags, so a lookup visits at most 4
//! nodes for IPv4 and 16 for IPv6.
//!
//! # Validation
//!
//! Every node record is checked once at open time: a child run or leaf run
//! that would escape the node array or value table is rejected there. After
//! that pass lookups are total, allocation-free, and cannot fail on any 4-
//! or 16-byte key.
//!
//! # Thread safety
//!
//! A searcher is immutable after construction and holds only a read-only
//! view of the artifact, so one instance can serve lookups from any number
//! of threads without locking.

use crate::cidr;
use crate::error::{PoptrieError, Result};
use crate::format::{Header, NodeRecord, HEADER_SIZE, MAGIC, NODE_SIZE};
use log::debug;
use memmap2::Mmap;
use rayon::prelude::*;
use std::fmt;
use std::fs::File;
use std::net::IpAddr;
use std::path::Path;
use zerocopy::FromBytes;

/// Bulk calls with at least this many addresses fan out across the rayon
/// pool; smaller calls stay on the calling thread.
const PARALLEL_THRESHOLD: usize = 4096;

/// Artifact bytes, either memory-mapped or owned.
enum Storage {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Storage {
    #[inline]
    fn as_slice(&self) -> &[u8] {
        match self {
            Storage::Mapped(mmap) => &mmap[..],
            Storage::Owned(bytes) => &bytes[..],
        }
    }
}

/// Read-only prefix set with longest-prefix-match lookups.
///
/// # Example
///
/// ```rust,no_run
/// use poptrie::IpSearcher;
///
/// let searcher = IpSearcher::open("cn.ptv2")?;
/// assert!(searcher.contains(&[1, 0, 1, 1]));
/// let codes = searcher.lookup_codes_strings(&["1.0.1.1", "8.8.8.8"]);
/// # Ok::<(), poptrie::PoptrieError>(())
/// ```
pub struct IpSearcher {
    storage: Storage,
    node_count: u32,
    value_count: u32,
}

impl IpSearcher {
    /// Open and memory-map an artifact file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or mapped, the magic
    /// or length does not match the header, or any node record points
    /// outside the mapped region.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mmap =
            unsafe { Mmap::map(&file) }.map_err(|e| PoptrieError::Mmap(e.to_string()))?;
        debug!(
            "mapped {} ({} bytes)",
            path.as_ref().display(),
            mmap.len()
        );
        Self::from_storage(Storage::Mapped(mmap))
    }

    /// Construct a searcher over an owned artifact buffer.
    ///
    /// Runs the same validation as [`IpSearcher::open`].
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_storage(Storage::Owned(data))
    }

    fn from_storage(storage: Storage) -> Result<Self> {
        let (node_count, value_count) = validate_artifact(storage.as_slice())?;
        Ok(IpSearcher {
            storage,
            node_count,
            value_count,
        })
    }

    /// Look up a packed address key and return its tag, 0 on no match.
    ///
    /// The key is 4 bytes for IPv4 or 16 bytes for IPv6. The longest
    /// matching prefix wins; its tag is returned.
    pub fn lookup_code(&self, key: &[u8]) -> u16 {
        let mut node_offset = HEADER_SIZE;
        let mut best = 0u16;
        for &byte in key {
            let record = self.node_at(node_offset);
            if record.leaf_bitmap.test(byte) {
                let rank = record.leaf_bitmap.rank(byte) as usize;
                best = self.value_at(record.leaf_base.get() as usize + rank);
            }
            if record.child_bitmap.test(byte) {
                let rank = record.child_bitmap.rank(byte) as usize;
                node_offset = record.child_offset.get() as usize + rank * NODE_SIZE;
            } else {
                break;
            }
        }
        best
    }

    /// Whether a packed address key matches any prefix.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.lookup_code(key) != 0
    }

    /// Look up a [`std::net::IpAddr`] and return its tag, 0 on no match.
    pub fn lookup_ip(&self, addr: IpAddr) -> u16 {
        match addr {
            IpAddr::V4(v4) => self.lookup_code(&v4.octets()),
            IpAddr::V6(v6) => self.lookup_code(&v6.octets()),
        }
    }

    /// Whether an [`std::net::IpAddr`] matches any prefix.
    pub fn contains_ip(&self, addr: IpAddr) -> bool {
        self.lookup_ip(addr) != 0
    }

    /// Look up a list of address strings, preserving input order.
    ///
    /// Family is chosen per entry by the presence of `:`. Unparseable
    /// entries yield 0.
    pub fn lookup_codes_strings<S: AsRef<str>>(&self, ips: &[S]) -> Vec<u16> {
        ips.iter().map(|ip| self.lookup_str(ip.as_ref())).collect()
    }

    /// Check a list of address strings, preserving input order.
    ///
    /// Unparseable entries yield `false`.
    pub fn contains_strings<S: AsRef<str>>(&self, ips: &[S]) -> Vec<bool> {
        ips.iter()
            .map(|ip| self.lookup_str(ip.as_ref()) != 0)
            .collect()
    }

    /// Look up a packed buffer of addresses, preserving buffer order.
    ///
    /// The buffer holds contiguous fixed-stride addresses: 16 bytes each
    /// when `is_v6`, 4 otherwise. A buffer length that is not a multiple of
    /// the stride is a hard error.
    pub fn lookup_codes_packed(&self, buf: &[u8], is_v6: bool) -> Result<Vec<u16>> {
        let stride = Self::checked_stride(buf, is_v6)?;
        if buf.len() / stride >= PARALLEL_THRESHOLD {
            Ok(buf
                .par_chunks(stride)
                .map(|key| self.lookup_code(key))
                .collect())
        } else {
            Ok(buf.chunks(stride).map(|key| self.lookup_code(key)).collect())
        }
    }

    /// Check a packed buffer of addresses, preserving buffer order.
    pub fn contains_packed(&self, buf: &[u8], is_v6: bool) -> Result<Vec<bool>> {
        let stride = Self::checked_stride(buf, is_v6)?;
        if buf.len() / stride >= PARALLEL_THRESHOLD {
            Ok(buf
                .par_chunks(stride)
                .map(|key| self.lookup_code(key) != 0)
                .collect())
        } else {
            Ok(buf
                .chunks(stride)
                .map(|key| self.lookup_code(key) != 0)
                .collect())
        }
    }

    /// Number of node records in the artifact.
    pub fn node_count(&self) -> u32 {
        self.node_count
    }

    /// Number of entries in the value table.
    pub fn value_count(&self) -> u32 {
        self.value_count
    }

    /// Total artifact size in bytes.
    pub fn size(&self) -> usize {
        self.storage.as_slice().len()
    }

    fn lookup_str(&self, ip: &str) -> u16 {
        match cidr::parse_ip(ip) {
            Some(key) => self.lookup_code(key.as_slice()),
            None => 0,
        }
    }

    fn checked_stride(buf: &[u8], is_v6: bool) -> Result<usize> {
        let stride = if is_v6 { 16 } else { 4 };
        if buf.len() % stride != 0 {
            return Err(PoptrieError::InvalidStride {
                len: buf.len(),
                stride,
            });
        }
        Ok(stride)
    }

    #[inline]
    fn node_at(&self, offset: usize) -> &NodeRecord {
        // SAFETY: every offset reachable from the root was bounds-checked
        // in validate_artifact() and NodeRecord has alignment 1.
        unsafe { &*(self.storage.as_slice().as_ptr().add(offset) as *const NodeRecord) }
    }

    #[inline]
    fn value_at(&self, index: usize) -> u16 {
        let data = self.storage.as_slice();
        let offset = HEADER_SIZE + self.node_count as usize * NODE_SIZE + index * 2;
        u16::from_le_bytes([data[offset], data[offset + 1]])
    }
}

impl fmt::Debug for IpSearcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IpSearcher")
            .field("node_count", &self.node_count)
            .field("value_count", &self.value_count)
            .field("size", &self.size())
            .finish()
    }
}

/// Validate the header and every node record, returning the counts.
fn validate_artifact(data: &[u8]) -> Result<(u32, u32)> {
    if data.len() < HEADER_SIZE {
        return Err(PoptrieError::Format(format!(
            "file too small: {} bytes (need at least {})",
            data.len(),
            HEADER_SIZE
        )));
    }
    let header = Header::ref_from_bytes(&data[..HEADER_SIZE])
        .map_err(|e| PoptrieError::Format(e.to_string()))?;
    if header.magic != MAGIC {
        return Err(PoptrieError::Format(format!(
            "bad magic {:02x?}",
            header.magic
        )));
    }
    let node_count = header.node_count.get();
    let value_count = header.value_count.get();
    if node_count == 0 {
        return Err(PoptrieError::Format("artifact has no root node".to_string()));
    }

    let nodes_end = HEADER_SIZE as u64 + node_count as u64 * NODE_SIZE as u64;
    let needed = nodes_end + value_count as u64 * 2;
    if (data.len() as u64) < needed {
        return Err(PoptrieError::Format(format!(
            "truncated artifact: {} bytes, header wants {}",
            data.len(),
            needed
        )));
    }

    for index in 0..node_count {
        let offset = HEADER_SIZE + index as usize * NODE_SIZE;
        let record = NodeRecord::ref_from_bytes(&data[offset..offset + NODE_SIZE])
            .map_err(|e| PoptrieError::Format(e.to_string()))?;

        let child_run = record.child_bitmap.count_ones() as u64;
        if child_run > 0 {
            let child_offset = record.child_offset.get() as u64;
            if child_offset < HEADER_SIZE as u64
                || (child_offset - HEADER_SIZE as u64) % NODE_SIZE as u64 != 0
                || child_offset + child_run * NODE_SIZE as u64 > nodes_end
            {
                return Err(PoptrieError::Validation(format!(
                    "node {}: child run escapes the node array",
                    index
                )));
            }
        }

        let leaf_run = record.leaf_bitmap.count_ones() as u64;
        if leaf_run > 0 && record.leaf_base.get() as u64 + leaf_run > value_count as u64 {
            return Err(PoptrieError::Validation(format!(
                "node {}: leaf run escapes the value table",
                index
            )));
        }
    }

    Ok((node_count, value_count))
}
