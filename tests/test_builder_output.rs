// Tests pinning the builder's coverage rules, pruning, and output
// determinism at the artifact level.

use poptrie::{IpSearcher, PoptrieBuilder};
use std::io::Write;
use tempfile::NamedTempFile;

const CN: u16 = (b'C' as u16) << 8 | b'N' as u16;

#[test]
fn test_covered_v4_host_is_noop() {
    let mut reference = PoptrieBuilder::new();
    reference.add_cidr("1.0.1.0/24", CN).unwrap();

    let mut builder = PoptrieBuilder::new();
    builder.add_cidr("1.0.1.0/24", CN).unwrap();
    builder.add_cidr("1.0.1.5/32", CN).unwrap();

    assert_eq!(builder.to_bytes(), reference.to_bytes());
}

#[test]
fn test_covered_v6_host_is_noop() {
    let mut reference = PoptrieBuilder::new();
    reference.add_cidr("240e::/18", CN).unwrap();

    let mut builder = PoptrieBuilder::new();
    builder.add_cidr("240e::/18", CN).unwrap();
    builder.add_cidr("240e:0:0:0:0:0:0:1/128", CN).unwrap();

    assert_eq!(builder.to_bytes(), reference.to_bytes());
}

#[test]
fn test_shorter_prefix_suppresses_longer_tag() {
    // ascending-mask insertion: the /24 claims the subtree first, the /32
    // with a different tag is absorbed
    let mut builder = PoptrieBuilder::new();
    builder.add_cidr("1.0.1.0/24", 7).unwrap();
    builder.add_cidr("1.0.1.5/32", 9).unwrap();

    let searcher = IpSearcher::from_bytes(builder.to_bytes()).unwrap();
    assert_eq!(searcher.lookup_code(&[1, 0, 1, 5]), 7);
}

#[test]
fn test_full_fanout_prunes_to_single_node() {
    let mut builder = PoptrieBuilder::new();
    for byte in 0..=255u8 {
        builder.add_prefix(&[byte, 0, 0, 0], 8, CN).unwrap();
    }

    let bytes = builder.to_bytes();
    // header + exactly one node record, no value table
    assert_eq!(bytes.len(), 16 + 72);
    let searcher = IpSearcher::from_bytes(bytes).unwrap();
    assert_eq!(searcher.node_count(), 1);
    assert_eq!(searcher.value_count(), 0);
}

#[test]
fn test_prune_preserves_lookups_on_saturated_interior() {
    // two /9 halves with one tag saturate the 256-way fanout under 10/8
    let mut builder = PoptrieBuilder::new();
    builder.add_cidr("10.0.0.0/9", CN).unwrap();
    builder.add_cidr("10.128.0.0/9", CN).unwrap();
    builder.add_cidr("11.0.0.0/16", 9).unwrap();

    let searcher = IpSearcher::from_bytes(builder.to_bytes()).unwrap();
    assert_eq!(searcher.lookup_code(&[10, 0, 0, 0]), CN);
    assert_eq!(searcher.lookup_code(&[10, 127, 200, 3]), CN);
    assert_eq!(searcher.lookup_code(&[10, 255, 255, 255]), CN);
    assert_eq!(searcher.lookup_code(&[11, 0, 9, 9]), 9);
    assert_eq!(searcher.lookup_code(&[12, 0, 0, 0]), 0);
}

#[test]
fn test_saturated_fanout_with_mixed_tags_stays_split() {
    let mut builder = PoptrieBuilder::new();
    builder.add_cidr("10.0.0.0/9", 5).unwrap();
    builder.add_cidr("10.128.0.0/9", 6).unwrap();

    let searcher = IpSearcher::from_bytes(builder.to_bytes()).unwrap();
    assert_eq!(searcher.lookup_code(&[10, 0, 0, 0]), 5);
    assert_eq!(searcher.lookup_code(&[10, 127, 0, 0]), 5);
    assert_eq!(searcher.lookup_code(&[10, 128, 0, 0]), 6);
    assert_eq!(searcher.lookup_code(&[10, 255, 0, 0]), 6);
}

#[test]
fn test_same_input_same_bytes() {
    let build = || {
        let mut builder = PoptrieBuilder::new();
        for (cidr, tag) in [
            ("1.0.1.0/24", CN),
            ("110.16.0.0/12", CN),
            ("192.168.1.0/24", CN),
            ("240e::/18", CN),
            ("2001:da8::/32", 9),
        ] {
            builder.add_cidr(cidr, tag).unwrap();
        }
        builder.to_bytes()
    };
    assert_eq!(build(), build());
}

#[test]
fn test_add_cidr_list_skips_comments_and_junk() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "# china prefix list").unwrap();
    writeln!(file).unwrap();
    writeln!(file, "1.0.1.0/24").unwrap();
    writeln!(file, "  110.16.0.0/12  ").unwrap();
    writeln!(file, "garbage line").unwrap();
    writeln!(file, "240e::/18").unwrap();
    file.flush().unwrap();

    let mut builder = PoptrieBuilder::new();
    let inserted = builder.add_cidr_list(file.path(), CN).unwrap();
    assert_eq!(inserted, 3);
    assert_eq!(builder.prefix_count(), 3);

    let searcher = IpSearcher::from_bytes(builder.to_bytes()).unwrap();
    assert!(searcher.contains(&[1, 0, 1, 1]));
    assert!(searcher.contains(&[110, 31, 0, 1]));
}

#[test]
fn test_add_cidr_list_gzip() {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    writeln!(encoder, "1.0.1.0/24").unwrap();
    writeln!(encoder, "240e::/18").unwrap();
    let compressed = encoder.finish().unwrap();

    let mut file = NamedTempFile::with_suffix(".gz").unwrap();
    file.write_all(&compressed).unwrap();
    file.flush().unwrap();

    let mut builder = PoptrieBuilder::new();
    let inserted = builder.add_cidr_list(file.path(), CN).unwrap();
    assert_eq!(inserted, 2);
}

#[test]
fn test_add_cidr_list_rejects_tag_zero() {
    let file = NamedTempFile::new().unwrap();
    let mut builder = PoptrieBuilder::new();
    assert!(builder.add_cidr_list(file.path(), 0).is_err());
}

#[test]
fn test_missing_list_file_is_io_error() {
    let mut builder = PoptrieBuilder::new();
    let result = builder.add_cidr_list("/nonexistent/prefixes.txt", CN);
    assert!(matches!(result, Err(poptrie::PoptrieError::Io(_))));
}
