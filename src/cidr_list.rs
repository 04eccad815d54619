//! CIDR list ingestion
//!
//! Prefix lists are published as plain text, one CIDR per line, with `#`
//! comment lines, and are frequently shipped gzipped. [`CidrLines`] opens
//! either form and yields only the lines that can hold a prefix: trimmed,
//! with blanks and comments already dropped. Whether a surviving line is a
//! valid CIDR is the parser's call, not this module's.

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, stdin, BufRead, BufReader, Lines, Read};
use std::path::Path;

/// Line iterator over a CIDR list, blanks and `#` comments removed.
///
/// # Example
///
/// ```rust,no_run
/// use poptrie::cidr_list::CidrLines;
///
/// for line in CidrLines::open("cn_cidrs.txt.gz")? {
///     println!("{}", line?);
/// }
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct CidrLines {
    lines: Lines<BufReader<Box<dyn Read + Send>>>,
}

impl CidrLines {
    /// Open `path` as a CIDR list.
    ///
    /// Names ending in `.gz` (case-insensitive) are decompressed on the
    /// fly; the path `-` reads stdin.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened. Invalid gzip data
    /// surfaces as a read error from the iterator.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let source: Box<dyn Read + Send> = if path.to_str() == Some("-") {
            Box::new(stdin())
        } else {
            let file = File::open(path)?;
            let gzipped = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
            if gzipped {
                Box::new(GzDecoder::new(file))
            } else {
                Box::new(file)
            }
        };
        Ok(CidrLines {
            lines: BufReader::with_capacity(64 * 1024, source).lines(),
        })
    }
}

impl Iterator for CidrLines {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        for line in self.lines.by_ref() {
            match line {
                Ok(text) => {
                    let text = text.trim();
                    if text.is_empty() || text.starts_with('#') {
                        continue;
                    }
                    return Some(Ok(text.to_string()));
                }
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}
