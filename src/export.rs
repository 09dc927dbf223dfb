use std::{collections::HashSet, io::Write, path::Path};

use anyhow::Context;

use crate::games::{normalize_name, GameRecord};

pub const CSV_HEADERS: [&str; 6] = [
    "name",
    "source_url",
    "embed_url",
    "iframe_url",
    "platform",
    "collected_at",
];

pub const STANDARD_TEMPLATE: &str = "Read demo.php and the development guide, then follow them strictly to build the game page below (a single file, no variants, no ads from the source site):
Name: {name}
FAQ and details: {url}
<iframe> url: {embed_url}";

pub const CONCISE_TEMPLATE: &str = "Build a game page following demo.php and the development guide (single file, no ads, research online):
Game: {name}
Reference page: {url}
Game url: {embed_url}";

pub const DETAILED_TEMPLATE: &str = "Study the conventions of demo.php and the development guide, then build the game page below exactly as they require.

Requirements:
- a single PHP file, no variants
- no advertising content from the source site
- research online what players look for in this game
- follow the technical rules of the development guide

Game:
Name: {name}
FAQ and details: {url}
<iframe> url: {embed_url}";

pub const PROFESSIONAL_TEMPLATE: &str = "Based on the demo.php template and the development guide, build the following game page:

Requirements:
* single file output, no variants
* source site ads removed
* player needs researched online
* technical rules followed

Game:
* Name: {name}
* Reference: {url}
* Embed: {embed_url}";

pub const MINIMAL_TEMPLATE: &str = "Build a game page (see demo.php and the development guide):
{name} | {url} | {embed_url}";

pub const DEFAULT_TEMPLATE: &str = STANDARD_TEMPLATE;

/// Drop the `?v=` cache buster and repeated `/index.html` itch.zone urls pick up.
pub fn clean_url_for_display(url: &str) -> String {
    let mut url = url.trim().to_string();

    if !url.contains("itch.zone") {
        return url;
    }

    if let Some(idx) = url.find("?v=") {
        url.truncate(idx);
    }

    while url.contains("/index.html/index.html") {
        url = url.replace("/index.html/index.html", "/index.html");
    }

    url
}

/// Newest record per normalized name. Expects `records` newest first.
pub fn unique_by_name(records: Vec<GameRecord>) -> Vec<GameRecord> {
    let mut seen = HashSet::new();

    records
        .into_iter()
        .filter(|game| {
            let key = normalize_name(&game.name);
            !key.is_empty() && seen.insert(key)
        })
        .collect()
}

/// One filled-in `template` per record that has an effective url.
pub fn render_prompts(records: &[GameRecord], template: &str) -> Vec<String> {
    records
        .iter()
        .filter(|game| !game.effective_url().is_empty())
        .map(|game| {
            template
                .replace("{name}", game.name.trim())
                .replace("{url}", game.source_url.trim())
                .replace("{embed_url}", &clean_url_for_display(game.effective_url()))
        })
        .collect()
}

/// Numbered prompts below a short header.
pub fn write_prompts(mut out: impl Write, prompts: &[String]) -> anyhow::Result<()> {
    writeln!(out, "# gamescout prompts")?;
    writeln!(
        out,
        "# exported at: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(out, "# games: {}", prompts.len())?;
    writeln!(out, "\n{}\n", "=".repeat(50))?;

    for (idx, prompt) in prompts.iter().enumerate() {
        writeln!(out, "{}. {prompt}\n", idx + 1)?;
    }

    out.flush()?;
    Ok(())
}

pub fn write_json(mut out: impl Write, records: &[GameRecord]) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut out, records).context("failed to serialize games")?;
    writeln!(out)?;
    Ok(())
}

pub fn write_csv(out: impl Write, records: &[GameRecord]) -> anyhow::Result<()> {
    let mut csv_wrt = csv::Writer::from_writer(out);
    csv_wrt.write_record(CSV_HEADERS)?;

    for game in records {
        let collected_at = game.collected_at.to_rfc3339();
        csv_wrt.write_record([
            game.name.as_str(),
            game.source_url.as_str(),
            game.embed_url.as_str(),
            game.iframe_url.as_str(),
            game.platform.as_str(),
            collected_at.as_str(),
        ])?;
    }

    csv_wrt.flush()?;
    Ok(())
}

/// Write to `path`, or stdout when there is none.
pub fn with_output(
    path: Option<&Path>,
    write: impl FnOnce(Box<dyn Write>) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            write(Box::new(std::io::BufWriter::new(file)))
        }
        None => write(Box::new(std::io::stdout().lock())),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::platform::Platform;

    fn record(name: &str, embed: &str, iframe: &str, age_hours: i64) -> GameRecord {
        GameRecord {
            name: name.to_string(),
            source_url: format!("https://azgames.io/{}", name.to_lowercase().replace(' ', "-")),
            embed_url: embed.to_string(),
            iframe_url: iframe.to_string(),
            platform: Platform::AzGames,
            collected_at: Utc::now() - Duration::hours(age_hours),
        }
    }

    #[test]
    fn cleans_itch_urls_only() {
        assert_eq!(
            clean_url_for_display("https://html-classic.itch.zone/html/1/index.html/index.html?v=123"),
            "https://html-classic.itch.zone/html/1/index.html"
        );
        assert_eq!(
            clean_url_for_display("https://azgames.io/x.embed?v=2"),
            "https://azgames.io/x.embed?v=2"
        );
    }

    #[test]
    fn unique_keeps_first_seen() {
        let games = vec![
            record("Subway Moto", "https://azgames.io/a.embed", "", 1),
            record("subway moto!!", "https://azgames.io/b.embed", "", 5),
            record("Other", "https://azgames.io/c.embed", "", 6),
        ];
        let unique = unique_by_name(games);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].embed_url, "https://azgames.io/a.embed");
    }

    #[test]
    fn prompts_use_effective_url() {
        let games = vec![
            record("A", "https://azgames.io/a.embed", "https://i.itch.zone/a/index.html", 0),
            record("B", "https://azgames.io/b.embed", "", 0),
            record("C", "", "", 0),
        ];
        let prompts = render_prompts(&games, "{name}|{url}|{embed_url}");
        assert_eq!(
            prompts,
            vec![
                "A|https://azgames.io/a|https://i.itch.zone/a/index.html".to_string(),
                "B|https://azgames.io/b|https://azgames.io/b.embed".to_string(),
            ]
        );
    }

    #[test]
    fn every_preset_fills_all_placeholders() {
        let games = vec![record("Slope", "https://azgames.io/slope.embed", "", 0)];

        for template in [
            STANDARD_TEMPLATE,
            CONCISE_TEMPLATE,
            DETAILED_TEMPLATE,
            PROFESSIONAL_TEMPLATE,
            MINIMAL_TEMPLATE,
        ] {
            let prompt = &render_prompts(&games, template)[0];
            assert!(prompt.contains("Slope"));
            assert!(prompt.contains("https://azgames.io/slope.embed"));
            assert!(!prompt.contains('{'), "{prompt}");
        }
    }

    #[test]
    fn csv_has_header_and_rows() {
        let games = vec![record("A, the game", "https://azgames.io/a.embed", "", 0)];
        let mut buf = vec![];
        write_csv(&mut buf, &games).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("name,source_url,embed_url,iframe_url,platform,collected_at")
        );
        assert!(lines.next().unwrap().starts_with("\"A, the game\","));
    }

    #[test]
    fn prompts_are_numbered() {
        let mut buf = vec![];
        write_prompts(&mut buf, &["one".to_string(), "two".to_string()]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("# games: 2"));
        assert!(text.contains("1. one\n"));
        assert!(text.contains("2. two\n"));
    }
}
