use anyhow::Result;

use super::{
    commands::{
        print_platforms, print_stats, ClearCommand, CollectCommand, Context, ExportCommand,
        ExtractCommand, ListCommand,
    },
    types::{ExportFormat, FetchArgs, FilterArgs, PromptPreset},
};
use crate::platform::Platform;

pub fn handle_collect(
    platforms: Vec<Platform>,
    max: Option<usize>,
    fetch_args: FetchArgs,
    ctx: &Context,
) -> Result<()> {
    let collect_command = CollectCommand::new(platforms, max, fetch_args.no_headless)?;
    collect_command.execute(ctx).map_err(|e| anyhow::anyhow!(e))
}

pub fn handle_list(
    filter: FilterArgs,
    search: Option<String>,
    count: bool,
    ctx: &Context,
) -> Result<()> {
    let list_command = ListCommand::new(filter, search, count)?;
    list_command.execute(ctx).map_err(|e| anyhow::anyhow!(e))
}

pub fn handle_extract(url: String, fetch_args: FetchArgs, ctx: &Context) -> Result<()> {
    let extract_command = ExtractCommand::new(url, fetch_args.no_headless)?;
    extract_command.execute(ctx).map_err(|e| anyhow::anyhow!(e))
}

pub fn handle_export(
    filter: FilterArgs,
    format: ExportFormat,
    template: Option<String>,
    preset: Option<PromptPreset>,
    output: Option<String>,
    ctx: &Context,
) -> Result<()> {
    let export_command = ExportCommand::new(filter, format, template, preset, output)?;
    export_command.execute(ctx).map_err(|e| anyhow::anyhow!(e))
}

pub fn handle_clear(yes: bool, ctx: &Context) -> Result<()> {
    ClearCommand::new(yes)
        .execute(ctx)
        .map_err(|e| anyhow::anyhow!(e))
}

pub fn handle_stats(ctx: &Context) -> Result<()> {
    print_stats(ctx).map_err(|e| anyhow::anyhow!(e))
}

pub fn handle_platforms(ctx: &Context) -> Result<()> {
    print_platforms(ctx).map_err(|e| anyhow::anyhow!(e))
}
