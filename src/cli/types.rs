use clap::{Args as ClapArgs, ValueEnum};

use crate::{export, platform::Platform};

#[derive(ClapArgs, Debug, Clone)]
pub struct FetchArgs {
    /// Don't fall back to a headless browser
    /// when plain requests are blocked
    #[clap(long, default_value = "false")]
    pub no_headless: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct FilterArgs {
    /// Only games of this platform
    #[clap(short, long)]
    pub platform: Option<Platform>,

    /// Only games collected within the last N hours
    #[clap(short, long)]
    pub recent: Option<u64>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptPreset {
    Standard,
    Concise,
    Detailed,
    Professional,
    Minimal,
}

impl PromptPreset {
    pub fn template(self) -> &'static str {
        match self {
            PromptPreset::Standard => export::STANDARD_TEMPLATE,
            PromptPreset::Concise => export::CONCISE_TEMPLATE,
            PromptPreset::Detailed => export::DETAILED_TEMPLATE,
            PromptPreset::Professional => export::PROFESSIONAL_TEMPLATE,
            PromptPreset::Minimal => export::MINIMAL_TEMPLATE,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// One filled-in prompt per game, unique by name
    Prompts,
    Json,
    Csv,
}
