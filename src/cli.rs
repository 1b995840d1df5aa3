// Command line surface of the `feishu` binary.

use crate::api::drive::{Direction, DocType, OrderBy, ParentType};
use crate::block::BlockKind;
use crate::error::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "feishu", version)]
#[command(about = "Command line client for the Feishu open platform", long_about = None)]
#[command(after_help = "Examples:
  feishu drive list                      list the root folder
  feishu drive list -p <token> -l 10     list 10 entries of a folder
  feishu drive create-folder \"Reports\"   create a folder
  feishu doc create \"My document\"        create a document
  feishu block create -d <doc> -t heading -l 2 -c \"Title\"
  feishu config set app_id cli_xxx       store a setting")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print raw JSON instead of a summary
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage stored settings
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Documents
    #[command(subcommand)]
    Doc(DocCommand),

    /// Blocks inside a document
    #[command(subcommand)]
    Block(BlockCommand),

    /// Drive files and folders
    #[command(subcommand)]
    Drive(DriveCommand),

    /// Wiki nodes
    #[command(subcommand)]
    Wiki(WikiCommand),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Set a value
    Set { key: String, value: String },
    /// Show a value
    Get { key: String },
    /// Show every value, secrets masked
    List,
}

#[derive(Subcommand, Debug)]
pub enum DocCommand {
    /// Create a document
    Create {
        title: String,
        /// Folder to create it in
        #[arg(short, long)]
        folder_token: Option<String>,
    },
    /// Show document info
    Get { document_id: String },
    /// Print the document as plain text
    Raw {
        document_id: String,
        /// How @mentions render: 0 default name, 1 English name
        #[arg(long, default_value_t = 0)]
        lang: u8,
    },
}

/// Kind names accepted on the command line. `heading` takes `--level`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindArg {
    Text,
    Heading,
    Heading1,
    Heading2,
    Heading3,
    Bullet,
    Ordered,
    Code,
    Quote,
    Todo,
}

impl KindArg {
    pub fn resolve(self, level: u8) -> Result<BlockKind> {
        Ok(match self {
            KindArg::Text => BlockKind::Text,
            KindArg::Heading => BlockKind::heading(level)?,
            KindArg::Heading1 => BlockKind::Heading1,
            KindArg::Heading2 => BlockKind::Heading2,
            KindArg::Heading3 => BlockKind::Heading3,
            KindArg::Bullet => BlockKind::Bullet,
            KindArg::Ordered => BlockKind::Ordered,
            KindArg::Code => BlockKind::Code,
            KindArg::Quote => BlockKind::Quote,
            KindArg::Todo => BlockKind::Todo,
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct ContentArgs {
    /// Block kind
    #[arg(short = 't', long = "type", value_enum, default_value = "text")]
    pub kind: KindArg,

    /// Text content
    #[arg(short, long)]
    pub content: String,

    /// Heading level for `--type heading`
    #[arg(short, long, default_value_t = 1)]
    pub level: u8,

    /// Language tag for code blocks
    #[arg(long, default_value = "python")]
    pub language: String,

    /// Mark a todo as done
    #[arg(long)]
    pub checked: bool,
}

#[derive(Subcommand, Debug)]
pub enum BlockCommand {
    /// List the children of a block
    List {
        #[arg(short, long)]
        document_id: String,
        /// Parent block, defaults to the document root
        #[arg(short, long)]
        block_id: Option<String>,
        #[arg(long, default_value_t = 100)]
        page_size: u32,
        /// Follow page cursors instead of stopping after the first page
        #[arg(long)]
        all: bool,
    },
    /// Show one block
    Get {
        #[arg(short, long)]
        document_id: String,
        #[arg(short, long)]
        block_id: String,
    },
    /// Create a block under a parent
    Create {
        #[arg(short, long)]
        document_id: String,
        /// Parent block, defaults to the document root
        #[arg(short, long)]
        block_id: Option<String>,
        #[command(flatten)]
        content: ContentArgs,
        /// Position among the parent's children, -1 appends
        #[arg(short, long, default_value_t = -1, allow_hyphen_values = true)]
        index: i64,
    },
    /// Replace a block's content
    Update {
        #[arg(short, long)]
        document_id: String,
        #[arg(short, long)]
        block_id: String,
        #[command(flatten)]
        content: ContentArgs,
    },
    /// Delete one or more blocks
    Delete {
        #[arg(short, long)]
        document_id: String,
        #[arg(short, long = "block-id", required = true, num_args = 1..)]
        block_ids: Vec<String>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum DriveCommand {
    /// List files in a folder
    List {
        /// Folder token, defaults to the root folder
        #[arg(short, long)]
        parent_token: Option<String>,
        #[arg(short, long, value_enum, default_value = "EditedTime")]
        order_by: OrderBy,
        #[arg(short, long, value_enum, default_value = "DESC")]
        direction: Direction,
        /// Number of entries to show
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },
    /// Create a folder
    CreateFolder {
        name: String,
        #[arg(short, long)]
        parent_token: Option<String>,
    },
    /// Upload a media file (up to 20 MiB)
    Upload {
        path: PathBuf,
        #[arg(long, value_enum)]
        parent_type: ParentType,
        /// Block id, spreadsheet token or bitable app token
        #[arg(long)]
        parent_node: String,
        #[arg(long)]
        file_name: Option<String>,
        /// Adler-32 checksum
        #[arg(long)]
        checksum: Option<String>,
        #[arg(long)]
        extra: Option<String>,
    },
    /// Show file metadata
    Meta {
        token: String,
        #[arg(short = 't', long = "type", value_enum, default_value = "docx")]
        doc_type: DocType,
    },
    /// Show view and like counts
    Stats {
        token: String,
        #[arg(short = 't', long = "type", value_enum, default_value = "docx")]
        doc_type: DocType,
    },
}

#[derive(Subcommand, Debug)]
pub enum WikiCommand {
    /// Resolve a wiki node token or link to its document
    Node { token: String },
}
