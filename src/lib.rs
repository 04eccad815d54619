//! Poptrie - Compact Memory-Mapped IP Prefix Tagging
//!
//! Poptrie builds a merged IPv4+IPv6 prefix set from CIDR lists, tags every
//! prefix with a 16-bit value (country codes, membership flags), and
//! serializes it into a compact, immutable artifact. The reader memory-maps
//! that artifact and answers longest-prefix-match lookups by walking one
//! address byte per node, using two 256-bit bitmaps and popcount indexing,
//! so a lookup touches at most 4 nodes for IPv4 and 16 for IPv6.
//!
//! # Quick Start
//!
//! ```rust
//! use poptrie::{IpSearcher, PoptrieBuilder};
//!
//! let cn = (b'C' as u16) << 8 | b'N' as u16;
//!
//! let mut builder = PoptrieBuilder::new();
//! builder.add_cidr("1.0.1.0/24", cn)?;
//! builder.add_cidr("240e::/18", cn)?;
//!
//! let searcher = IpSearcher::from_bytes(builder.to_bytes())?;
//! assert_eq!(searcher.lookup_code(&[1, 0, 1, 1]), cn);
//! assert!(!searcher.contains(&[8, 8, 8, 8]));
//!
//! // order-preserving bulk calls
//! let hits = searcher.contains_strings(&["1.0.1.1", "8.8.8.8", "240e::1"]);
//! assert_eq!(hits, vec![true, false, true]);
//! # Ok::<(), poptrie::PoptrieError>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! CIDR text -> parser -> radix tree (stride 8) -> prune -> serialize
//!                                                              |
//!                                        .ptv2 artifact on disk
//!                                                              |
//! tag <- popcount descent <- mmap view <------------------- open
//! ```
//!
//! The builder is offline and throughput-oriented; the reader is read-only,
//! allocation-free per lookup, and safe to share across threads. Tags are
//! opaque positive integers; 0 is reserved to mean "no match".

#![warn(missing_docs)]
#![warn(clippy::all)]

// Module declarations
/// Prefix set builder
pub mod builder;
/// CIDR list ingestion
pub mod cidr_list;
/// Error types for poptrie operations
pub mod error;
/// Memory-mapped prefix set reader
pub mod searcher;

mod cidr;
mod format;

// Re-exports for consumers

/// Builder for the serialized prefix set
pub use crate::builder::PoptrieBuilder;

/// Crate error and result types
pub use crate::error::{PoptrieError, Result};

/// Read-only prefix set with longest-prefix-match lookups
pub use crate::searcher::IpSearcher;

/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
