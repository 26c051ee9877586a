use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

/// Parse `key=value`. Values that look like booleans or integers are matched
/// as such, everything else as a string.
pub fn parse_filter(s: &str) -> Result<(String, Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {s:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in {s:?}"));
    }

    let value = match value {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        v => match v.parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => Value::String(v.to_string()),
        },
    };

    Ok((key.to_string(), value))
}

#[derive(Subcommand, Debug, Clone)]
pub enum VaultArgs {
    /// Index every note of an Obsidian vault
    Index {
        /// Path to the vault
        path: PathBuf,

        /// Vault name used in obsidian:// links (defaults to the directory name)
        #[clap(long)]
        vault_name: Option<String>,

        /// Also index notes in hidden folders
        #[clap(long, default_value = "false")]
        include_hidden: bool,
    },
    /// Search indexed vault notes
    Search {
        query: String,

        #[clap(short, long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP API.
    Serve {},

    /// Index files from a directory
    Index {
        dir: PathBuf,

        /// Source to extract with (text, csv, pdf, obsidian). Repeatable.
        /// Defaults to text, csv and pdf.
        #[clap(short, long = "source")]
        sources: Vec<String>,
    },

    /// Obsidian vault tools
    Vault {
        #[clap(subcommand)]
        action: VaultArgs,
    },

    /// Crawl a website and index its pages
    Crawl {
        url: String,

        #[clap(long, default_value_t = 2)]
        max_depth: usize,

        #[clap(long, default_value_t = 100)]
        max_pages: usize,

        /// Follow links to other domains
        #[clap(long, default_value = "false")]
        any_domain: bool,
    },

    /// Semantic search
    Search {
        query: String,

        #[clap(short, long, default_value_t = 10)]
        limit: usize,

        /// Minimum similarity score
        #[clap(short, long, default_value_t = 0.5)]
        threshold: f32,

        /// Metadata equality filter. Repeatable.
        #[clap(short, long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, Value)>,

        /// Fill up missing results with web search
        #[clap(long, default_value = "false")]
        use_exa: bool,
    },

    /// Show collection statistics
    Stats {},
}
