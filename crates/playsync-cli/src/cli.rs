use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "playsync")]
#[command(about = "Sync your Steam library into a Notion database")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Field mapping file [env: MAPPING_FILE, default: mapping.json]
    #[arg(long, global = true, value_name = "PATH")]
    pub mapping: Option<PathBuf>,

    /// Local inventory file [env: JSON_FILE, default: steam_games.json]
    #[arg(long, global = true, value_name = "PATH")]
    pub json_file: Option<PathBuf>,

    /// Increase log detail (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch owned games from Steam and save them to the inventory file
    Fetch {
        #[command(flatten)]
        steam: SteamArgs,
    },
    /// Sync the inventory file into the Notion database
    Sync {
        #[command(flatten)]
        sync: SyncArgs,
    },
    /// Fetch from Steam, save the inventory file, then sync it
    Run {
        #[command(flatten)]
        steam: SteamArgs,
        #[command(flatten)]
        sync: SyncArgs,
    },
    /// Inspect the field mapping
    Mapping {
        #[command(subcommand)]
        command: MappingCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct SteamArgs {
    /// 64-bit Steam ID [env: STEAM_USER_ID]
    #[arg(long, value_name = "ID")]
    pub steam_user_id: Option<String>,
    /// Skip per-game achievement requests
    #[arg(long)]
    pub no_achievements: bool,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncArgs {
    /// Notion database ID [env: NOTION_DATABASE_ID]
    #[arg(long, value_name = "ID")]
    pub database_id: Option<String>,
    /// Delay between records in milliseconds [env: SYNC_PACING_MS, default: 300]
    #[arg(long, value_name = "MS")]
    pub pacing_ms: Option<u64>,
    /// Attempts per remote call [env: SYNC_MAX_ATTEMPTS, default: 3]
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,
    /// What to do when several pages share a title [env: SYNC_DUPLICATE_POLICY]
    #[arg(long, value_name = "POLICY", value_parser = ["first", "error"])]
    pub duplicate_policy: Option<String>,
    /// What to do with empty local dates [env: SYNC_EMPTY_DATE_POLICY]
    #[arg(long, value_name = "POLICY", value_parser = ["preserve", "clear"])]
    pub empty_date_policy: Option<String>,
    /// Local field holding the cover image URL [env: COVER_FIELD, default: Banner]
    #[arg(long, value_name = "FIELD")]
    pub cover_field: Option<String>,
    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum MappingCommands {
    /// Validate the mapping file and print the resolved table
    Check {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
