use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use super::{
    element_text, is_denied, list_with, long_enough, name_from_url, on_domain,
    rules::{first_match, Rule},
    SiteExtractor,
};
use crate::{fetch::Probe, games::CandidateEntry, normalize::normalize, platform::Platform};

const HTML_CLASSIC: &str = "html-classic.itch.zone";

/// Link texts that label media next to a game rather than the game.
const INVALID_NAMES: &[&str] = &[
    "gif",
    "video",
    "trailer",
    "preview",
    "demo video",
    "gameplay",
    "screenshot",
    "image",
    "pic",
    "photo",
];

const DENYLIST: &[&str] = &[
    "/jam/",
    "/community/",
    "/blog/",
    "/devlog/",
    "/profile/",
    "/collection/",
    "/bundle/",
];

const SOCIAL: &[&str] = &[
    "youtube",
    "twitter",
    "facebook",
    "instagram",
    "discord",
    "github",
];

static GAME_LINKS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a.title.game_link").expect("Failed to parse itch.io listing selector")
});

static LISTING_FALLBACK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"href="(?P<url>https://[a-z0-9-]+\.itch\.io/[a-z0-9_-]+)"[^>]*class="[^"]*game_link[^"]*"[^>]*>(?P<name>[^<]*)<"#)
        .expect("Failed to compile itch.io listing regex")
});

static PRECISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https://html-classic\.itch\.zone/html/\d+/[^/\s"'&]+/index\.html"#)
        .expect("Failed to compile itch.zone regex")
});
static ANY_ZONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https://[^"'&\s]*\.itch\.zone/[^"'&\s]*"#)
        .expect("Failed to compile itch.zone regex")
});
static QUOTED_ZONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"&quot;(https://[^&]*\.itch\.zone/[^&]*)&quot;"#)
        .expect("Failed to compile itch.zone regex")
});
static JSON_ZONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""(?:play_url|embed_url|game_url)"\s*:\s*"([^"]*itch\.zone[^"]*)""#)
        .expect("Failed to compile itch.zone regex")
});
static SRC_ZONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"src\s*=\s*["']([^"']*itch\.zone[^"']*)["']"#)
        .expect("Failed to compile itch.zone regex")
});
static EMBED_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"embed_url["']?\s*:\s*["']([^"']*)["']"#)
        .expect("Failed to compile itch.zone regex")
});

static CLASSIC_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/html/\d+(?:/[^/]+)*/index\.html$").expect("Failed to compile itch.zone path regex")
});

static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule::Anchor {
            selector: "iframe",
            attrs: &["src", "data-src"],
        },
        Rule::Pattern(&PRECISE),
        Rule::Pattern(&ANY_ZONE),
        Rule::Pattern(&QUOTED_ZONE),
        Rule::Pattern(&JSON_ZONE),
        Rule::Pattern(&SRC_ZONE),
        Rule::Pattern(&EMBED_KEY),
        Rule::DataUrl {
            selector: "div.game_frame",
        },
    ]
});

/// itch.io web games, played from the html-classic.itch.zone CDN.
pub struct ItchIo;

impl ItchIo {
    fn accept_candidate(c: &CandidateEntry) -> bool {
        let name = c.name.trim().to_lowercase();

        long_enough(&name)
            && !INVALID_NAMES.contains(&name.as_str())
            && on_domain(&c.url, "itch.io")
            && !is_denied(&c.url, DENYLIST)
    }

    /// Normalize and repair a player url missing its `index.html`.
    fn finalize(raw: &str) -> Option<String> {
        let url = normalize(raw, Platform::ItchIo.origin())?;
        let mut parsed = url::Url::parse(&url).ok()?;

        if parsed.host_str() != Some(HTML_CLASSIC) || parsed.path().ends_with("/index.html") {
            return Some(url);
        }

        let path = format!("{}/index.html", parsed.path().trim_end_matches('/'));
        parsed.set_path(&path);
        Some(parsed.to_string())
    }
}

impl SiteExtractor for ItchIo {
    fn platform(&self) -> Platform {
        Platform::ItchIo
    }

    fn list(&self, html: &str) -> Vec<CandidateEntry> {
        let origin = Platform::ItchIo.origin();

        list_with(
            Platform::ItchIo,
            html,
            |doc: &Html| {
                doc.select(&GAME_LINKS)
                    .filter_map(|el| {
                        let url = normalize(el.value().attr("href")?, origin)?;
                        Some(CandidateEntry::new(element_text(&el), url))
                    })
                    .collect()
            },
            &LISTING_FALLBACK,
            name_from_url,
            Self::accept_candidate,
        )
    }

    fn detail(&self, html: &str, source_url: &str, probe: &dyn Probe) -> Option<String> {
        first_match(&RULES, html, source_url, probe, |raw| {
            Self::finalize(raw).filter(|url| self.validate(url))
        })
    }

    fn validate(&self, url: &str) -> bool {
        let Ok(parsed) = url::Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };

        let lower = url.to_lowercase();
        if SOCIAL.iter().any(|s| lower.contains(s)) {
            return false;
        }

        if host == HTML_CLASSIC {
            let path = parsed.path();
            // index.html only as the last segment
            let inner = path.strip_suffix("/index.html").unwrap_or(path);
            return CLASSIC_PATH.is_match(path) && !inner.split('/').any(|seg| seg == "index.html");
        }

        // other itch.zone hosts serve uploads too, but never the cover images
        host.ends_with(".itch.zone")
            && !host.starts_with("img.")
            && !host.starts_with("static.")
            && parsed.path().ends_with(".html")
    }
}
