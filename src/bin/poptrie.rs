use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use poptrie::{IpSearcher, PoptrieBuilder};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "poptrie")]
#[command(
    about = "Build and query memory-mapped IP prefix tag sets",
    long_about = "poptrie - Compact longest-prefix-match sets for tagging IPv4/IPv6 addresses\n\n\
    Build an artifact from CIDR list files (one CIDR per line, # comments and\n\
    gzipped lists supported), then query it with zero-copy memory-mapped lookups.\n\n\
    Tags are 16-bit values. A two-letter code like CN is encoded as\n\
    (first << 8) | second; any other tag is given as a decimal number.\n\n\
    Examples:\n\
      poptrie build -o cn.ptv2 --set CN=cn_cidrs.txt\n\
      poptrie build -o geo.ptv2 --set CN=cn.txt.gz --set US=us.txt.gz\n\
      poptrie query geo.ptv2 1.0.1.1 240e::1\n\
      poptrie inspect geo.ptv2"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an artifact from tagged CIDR list files
    Build {
        /// Output artifact path
        #[arg(short, long)]
        output: PathBuf,

        /// Tagged input list as TAG=FILE; repeat for multiple lists.
        /// TAG is a two-letter code (CN) or a decimal number (1..65535)
        #[arg(long = "set", value_name = "TAG=FILE", required = true)]
        sets: Vec<String>,
    },
    /// Look up addresses in an artifact
    Query {
        /// Artifact path
        database: PathBuf,

        /// IPv4/IPv6 addresses to look up
        #[arg(required = true)]
        ips: Vec<String>,
    },
    /// Print artifact header information
    Inspect {
        /// Artifact path
        database: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Build { output, sets } => cmd_build(&output, &sets),
        Commands::Query { database, ips } => cmd_query(&database, &ips),
        Commands::Inspect { database } => cmd_inspect(&database),
    }
}

fn cmd_build(output: &Path, sets: &[String]) -> Result<()> {
    let mut builder = PoptrieBuilder::new();

    for set in sets {
        let (tag_text, file) = set
            .split_once('=')
            .with_context(|| format!("--set wants TAG=FILE, got {:?}", set))?;
        let tag = parse_tag(tag_text)?;
        let inserted = builder
            .add_cidr_list(file, tag)
            .with_context(|| format!("reading {}", file))?;
        println!("{}: {} prefixes tagged {}", file, inserted, tag_text);
    }
    if builder.is_empty() {
        bail!("no usable CIDR lines in any input");
    }

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    builder
        .save(output)
        .with_context(|| format!("writing {}", output.display()))?;

    // reopen to self-check the artifact and report its final shape
    let searcher = IpSearcher::open(output)?;
    println!(
        "{}: {} nodes, {} values, {} bytes",
        output.display(),
        searcher.node_count(),
        searcher.value_count(),
        searcher.size()
    );
    Ok(())
}

fn cmd_query(database: &Path, ips: &[String]) -> Result<()> {
    let searcher = IpSearcher::open(database)
        .with_context(|| format!("opening {}", database.display()))?;
    let codes = searcher.lookup_codes_strings(ips);
    for (ip, code) in ips.iter().zip(codes) {
        println!("{} -> {}", ip, format_tag(code));
    }
    Ok(())
}

fn cmd_inspect(database: &Path) -> Result<()> {
    let searcher = IpSearcher::open(database)
        .with_context(|| format!("opening {}", database.display()))?;
    println!("magic:       PTV2");
    println!("nodes:       {}", searcher.node_count());
    println!("values:      {}", searcher.value_count());
    println!("total bytes: {}", searcher.size());
    Ok(())
}

/// Parse a tag given either as a two-letter code or a decimal number.
fn parse_tag(text: &str) -> Result<u16> {
    let bytes = text.as_bytes();
    if bytes.len() == 2 && bytes.iter().all(|b| b.is_ascii_uppercase()) {
        return Ok((bytes[0] as u16) << 8 | bytes[1] as u16);
    }
    let tag: u16 = text
        .parse()
        .with_context(|| format!("tag {:?} is neither a two-letter code nor a u16", text))?;
    if tag == 0 {
        bail!("tag 0 is reserved for \"no match\"");
    }
    Ok(tag)
}

/// Render a tag for display: two letters when both bytes are A..=Z, the raw
/// number otherwise, "-" for a miss.
fn format_tag(code: u16) -> String {
    if code == 0 {
        return "-".to_string();
    }
    let hi = (code >> 8) as u8;
    let lo = code as u8;
    if hi.is_ascii_uppercase() && lo.is_ascii_uppercase() {
        format!("{}{}", hi as char, lo as char)
    } else {
        code.to_string()
    }
}
