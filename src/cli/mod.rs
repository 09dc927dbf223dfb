use clap::{Parser, Subcommand};

mod commands;
mod errors;
mod handlers;
mod types;
mod validation;

pub use commands::Context;
pub use handlers::*;
pub use types::*;

use crate::platform::Platform;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Collect games from one or more platforms
    Collect {
        /// Platforms to collect from (e.g. itch, azgames, armorgames)
        #[clap(required = true)]
        platforms: Vec<Platform>,

        /// Max detail pages per platform, 0 for unlimited.
        /// Defaults to the value in config.yaml
        #[clap(short, long)]
        max: Option<usize>,

        #[clap(flatten)]
        fetch_args: FetchArgs,
    },
    /// List collected games
    List {
        #[clap(flatten)]
        filter: FilterArgs,

        /// Case-insensitive keyword on name or source url
        #[clap(short, long)]
        search: Option<String>,

        /// Print the count
        #[clap(short = 'c', long, default_value = "false")]
        count: bool,
    },
    /// Extract the embed url of a single game page
    Extract {
        /// A game page url
        #[clap(allow_hyphen_values = true)]
        url: String,

        #[clap(flatten)]
        fetch_args: FetchArgs,
    },
    /// Show store statistics
    Stats {},
    /// Export collected games
    Export {
        #[clap(flatten)]
        filter: FilterArgs,

        /// Output format
        #[clap(short, long, value_enum, default_value = "prompts")]
        format: ExportFormat,

        /// Prompt template file, placeholders: {name} {url} {embed_url}
        #[clap(short, long)]
        template: Option<String>,

        /// Built-in prompt template
        #[clap(long, value_enum, conflicts_with = "template")]
        preset: Option<PromptPreset>,

        /// Output file, stdout when omitted
        #[clap(short, long)]
        output: Option<String>,
    },
    /// Delete every collected game
    Clear {
        /// Auto confirm
        #[clap(short, long, default_value = "false")]
        yes: bool,
    },
    /// List supported platforms
    Platforms {},
}
