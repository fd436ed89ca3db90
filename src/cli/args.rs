//! Command line argument parsing for the sundial CLI using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Sundial - index metadata, term dictionaries and segment storage
#[derive(Parser, Debug, Clone)]
#[command(name = "sundial")]
#[command(about = "Index metadata, term dictionaries and segment object storage")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct SundialArgs {
    /// Verbosity level (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (JSON)
    #[arg(short, long, value_name = "FILE", env = "SUNDIAL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human", global = true)]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl SundialArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Manage index definitions
    #[command(subcommand)]
    Index(IndexCommand),

    /// Manage aliases
    #[command(subcommand)]
    Alias(AliasCommand),

    /// Manage index templates
    #[command(subcommand)]
    Template(TemplateCommand),

    /// Manage stored objects
    #[command(subcommand)]
    Object(ObjectCommand),

    /// Build and scan segments
    #[command(subcommand)]
    Segment(SegmentCommand),
}

#[derive(Subcommand, Debug, Clone)]
pub enum IndexCommand {
    /// Create or replace an index
    Create(CreateIndexArgs),

    /// Show an index definition
    Get(NameArgs),

    /// Delete an index
    Delete(NameArgs),

    /// List all indexes
    List,
}

/// Arguments for creating an index
#[derive(Args, Debug, Clone)]
pub struct CreateIndexArgs {
    /// Index name
    pub name: String,

    /// JSON body with `settings` and `mappings`
    #[arg(long, value_name = "FILE")]
    pub body: Option<PathBuf>,

    /// Mapped field as NAME:TYPE (repeatable)
    #[arg(long = "field", value_name = "NAME:TYPE")]
    pub fields: Vec<String>,

    /// Number of shards
    #[arg(long)]
    pub shards: Option<i32>,

    /// Number of replicas
    #[arg(long)]
    pub replicas: Option<i32>,
}

#[derive(Args, Debug, Clone)]
pub struct NameArgs {
    pub name: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum AliasCommand {
    /// Create or replace an alias
    Put(PutAliasArgs),

    /// Add one index to an alias
    Add(AliasMemberArgs),

    /// Remove one index from an alias
    Remove(AliasMemberArgs),

    /// Show an alias
    Get(NameArgs),

    /// Delete an alias
    Delete(NameArgs),

    /// List all aliases
    List,
}

#[derive(Args, Debug, Clone)]
pub struct PutAliasArgs {
    /// Alias name
    pub name: String,

    /// Member indexes
    #[arg(required = true)]
    pub indexes: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct AliasMemberArgs {
    pub alias: String,
    pub index: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TemplateCommand {
    /// Create or replace an index template
    Put(PutTemplateArgs),

    /// Show an index template
    Get(NameArgs),

    /// Delete an index template
    Delete(NameArgs),

    /// List all index templates
    List,
}

#[derive(Args, Debug, Clone)]
pub struct PutTemplateArgs {
    /// Template name
    pub name: String,

    /// JSON body with `index_patterns`, `priority` and `template`
    #[arg(long, value_name = "FILE")]
    pub body: PathBuf,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ObjectCommand {
    /// Upload a file
    Put(PutObjectArgs),

    /// Download an object
    Get(GetObjectArgs),

    /// Delete an object
    Delete(ObjectLocation),

    /// List objects in a bucket
    List(ListObjectsArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ObjectLocation {
    pub bucket: String,
    pub path: String,
}

#[derive(Args, Debug, Clone)]
pub struct PutObjectArgs {
    #[command(flatten)]
    pub location: ObjectLocation,

    /// File to upload
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct GetObjectArgs {
    #[command(flatten)]
    pub location: ObjectLocation,

    /// Write the object here instead of printing a summary
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ListObjectsArgs {
    pub bucket: String,

    #[arg(long, default_value = "")]
    pub prefix: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SegmentCommand {
    /// Index JSONL documents into a segment and store it
    Build(BuildSegmentArgs),

    /// Scan one field's term dictionary
    Scan(ScanSegmentArgs),
}

#[derive(Args, Debug, Clone)]
pub struct BuildSegmentArgs {
    /// Target index or alias (an alias must resolve to exactly one index)
    pub index: String,

    /// Documents, one JSON object per line
    #[arg(value_name = "DOCUMENTS")]
    pub documents: PathBuf,

    #[command(flatten)]
    pub location: ObjectLocation,
}

#[derive(Args, Debug, Clone)]
pub struct ScanSegmentArgs {
    #[command(flatten)]
    pub location: ObjectLocation,

    /// Field to scan
    #[arg(long)]
    pub field: String,

    /// Inclusive lower bound
    #[arg(long, conflicts_with = "prefix")]
    pub start: Option<String>,

    /// Exclusive upper bound
    #[arg(long, conflicts_with = "prefix")]
    pub end: Option<String>,

    /// Only terms with this prefix
    #[arg(long)]
    pub prefix: Option<String>,

    /// Only terms fully matching this regular expression
    #[arg(long, conflicts_with = "fuzzy")]
    pub regex: Option<String>,

    /// Only terms within --max-edits of this term
    #[arg(long)]
    pub fuzzy: Option<String>,

    #[arg(long, default_value = "2")]
    pub max_edits: usize,

    /// Stop after this many terms
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Include document ids of each term
    #[arg(long)]
    pub postings: bool,
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_create_command() {
        let args = SundialArgs::try_parse_from([
            "sundial",
            "index",
            "create",
            "logs",
            "--field",
            "message:text",
            "--field",
            "level:keyword",
            "--shards",
            "2",
        ])
        .unwrap();

        if let Command::Index(IndexCommand::Create(create)) = args.command {
            assert_eq!(create.name, "logs");
            assert_eq!(create.fields, vec!["message:text", "level:keyword"]);
            assert_eq!(create.shards, Some(2));
            assert!(create.body.is_none());
        } else {
            panic!("Expected index create command");
        }
    }

    #[test]
    fn test_segment_scan_command() {
        let args = SundialArgs::try_parse_from([
            "sundial",
            "segment",
            "scan",
            "segments",
            "logs/0001.seg",
            "--field",
            "message",
            "--prefix",
            "cat",
            "--limit",
            "5",
        ])
        .unwrap();

        if let Command::Segment(SegmentCommand::Scan(scan)) = args.command {
            assert_eq!(scan.location.bucket, "segments");
            assert_eq!(scan.location.path, "logs/0001.seg");
            assert_eq!(scan.prefix.as_deref(), Some("cat"));
            assert_eq!(scan.limit, Some(5));
        } else {
            panic!("Expected segment scan command");
        }

        assert!(
            SundialArgs::try_parse_from([
                "sundial", "segment", "scan", "b", "p", "--field", "f", "--prefix", "a",
                "--start", "b",
            ])
            .is_err()
        );
    }

    #[test]
    fn test_verbosity_levels() {
        let args = SundialArgs::try_parse_from(["sundial", "index", "list"]).unwrap();
        assert_eq!(args.verbosity(), 1);

        let args = SundialArgs::try_parse_from(["sundial", "-vv", "index", "list"]).unwrap();
        assert_eq!(args.verbosity(), 2);

        let args = SundialArgs::try_parse_from(["sundial", "index", "list", "--quiet"]).unwrap();
        assert_eq!(args.verbosity(), 0);
    }

    #[test]
    fn test_output_format() {
        let args =
            SundialArgs::try_parse_from(["sundial", "--format", "json", "alias", "list"]).unwrap();
        assert_eq!(args.output_format, OutputFormat::Json);
        assert!(
            SundialArgs::try_parse_from(["sundial", "--format", "yaml", "alias", "list"]).is_err()
        );
    }
}
