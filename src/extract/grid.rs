use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use super::{
    element_text, is_denied, list_with, long_enough, name_from_url, on_domain,
    rules::{first_match, Rule},
    SiteExtractor, COMMON_DENYLIST,
};
use crate::{
    fetch::Probe,
    games::CandidateEntry,
    normalize::{self, normalize},
    platform::Platform,
};

/// Comment azgames wraps the embed link of a game in.
const EMBED_COMMENT_MARKER: &str = "az-games__embed-link";

/// Top level section pages that share the `/<slug>` shape of a game.
const NAV_PAGES: &[&str] = &[
    "new-games",
    "hot-games",
    "popular-games",
    "trending-games",
    "top-games",
    "best-games",
    "updated-games",
    "all-games",
    "categories",
    "tags",
    "login",
    "register",
];

static GAME_LINKS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".us-grid-game a.us-game-link").expect("Failed to parse grid selector")
});
static THUMB: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img").expect("Failed to parse img selector"));
static TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.text-overflow").expect("Failed to parse title selector"));

static LISTING_FALLBACK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?P<url>https://(?:www\.)?(?:azgames|geoguessr)\.io/[a-z0-9][a-z0-9-]*)["'\s<]"#)
        .expect("Failed to compile grid listing regex")
});

static EMBED_ABSOLUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https://(?:www\.)?(?:azgames|geoguessr)\.io/[^<>\s"']+\.embed"#)
        .expect("Failed to compile embed regex")
});
static EMBED_QUOTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"["']([^"'<>\s]*\.embed)["']"#).expect("Failed to compile embed regex")
});

fn infer_embed(source_url: &str) -> Option<String> {
    let url = url::Url::parse(source_url).ok()?;
    let slug = normalize::slug_of(source_url)?;
    Some(format!("https://{}/{slug}.embed", url.host_str()?))
}

static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule::Comment {
            marker: EMBED_COMMENT_MARKER,
            pattern: &EMBED_ABSOLUTE,
        },
        Rule::Frames { needle: ".embed" },
        Rule::Script(&EMBED_QUOTED),
        Rule::Pattern(&EMBED_ABSOLUTE),
        Rule::Pattern(&EMBED_QUOTED),
        Rule::Infer(infer_embed),
    ]
});

/// Portals built on the "us-grid" template (azgames.io, geoguessr.io).
///
/// Games live at `/<slug>`, their player at `/<slug>.embed`.
pub struct GridPortal {
    platform: Platform,
}

impl GridPortal {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    fn domain(&self) -> &'static str {
        self.platform.as_str()
    }

    fn accept_candidate(&self, c: &CandidateEntry) -> bool {
        long_enough(&c.name)
            && on_domain(&c.url, self.domain())
            && !is_denied(&c.url, COMMON_DENYLIST)
            && matches!(
                normalize::segments_of(&c.url).as_slice(),
                [slug] if !NAV_PAGES.contains(&slug.as_str())
            )
    }

    fn name_of(el: &scraper::ElementRef) -> String {
        if let Some(img) = el.select(&THUMB).next() {
            let from_img = img
                .value()
                .attr("title")
                .or_else(|| img.value().attr("alt"))
                .map(str::trim)
                .unwrap_or_default();
            if !from_img.is_empty() {
                return from_img.to_string();
            }
        }

        if let Some(title) = el.select(&TITLE).next() {
            return element_text(&title);
        }

        el.value().attr("title").unwrap_or_default().trim().to_string()
    }
}

impl SiteExtractor for GridPortal {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn list(&self, html: &str) -> Vec<CandidateEntry> {
        let origin = self.platform.origin();

        list_with(
            self.platform,
            html,
            |doc: &Html| {
                doc.select(&GAME_LINKS)
                    .filter_map(|el| {
                        let url = normalize(el.value().attr("href")?, origin)?;
                        Some(CandidateEntry::new(Self::name_of(&el), url))
                    })
                    .collect()
            },
            &LISTING_FALLBACK,
            name_from_url,
            |c| self.accept_candidate(c),
        )
    }

    fn detail(&self, html: &str, source_url: &str, probe: &dyn Probe) -> Option<String> {
        let origin = self.platform.origin();
        first_match(&RULES, html, source_url, probe, |raw| {
            normalize(raw, origin).filter(|url| self.validate(url))
        })
    }

    fn validate(&self, url: &str) -> bool {
        on_domain(url, self.domain())
            && url::Url::parse(url)
                .map(|u| u.path().ends_with(".embed") && u.path().len() > "/.embed".len())
                .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_requires_own_domain() {
        let az = GridPortal::new(Platform::AzGames);
        assert!(az.validate("https://azgames.io/subway-moto.embed"));
        assert!(!az.validate("https://geoguessr.io/subway-moto.embed"));
        assert!(!az.validate("https://azgames.io/subway-moto"));
        assert!(!az.validate("https://azgames.io/.embed"));

        let geo = GridPortal::new(Platform::GeoGuessr);
        assert!(geo.validate("https://geoguessr.io/world-quiz.embed"));
    }

    #[test]
    fn regex_fallback_skips_section_pages() {
        let html = r#"
            <nav>
                <a href="https://azgames.io/new-games">New</a>
                <a href="https://azgames.io/hot-games">Hot</a>
            </nav>
            <script>var games = ["https://azgames.io/subway-moto", "https://azgames.io/slope"];</script>
        "#;

        let urls: Vec<_> = GridPortal::new(Platform::AzGames)
            .list(html)
            .into_iter()
            .map(|c| c.url)
            .collect();
        assert_eq!(urls, vec!["https://azgames.io/subway-moto", "https://azgames.io/slope"]);
    }

    #[test]
    fn infers_from_slug() {
        assert_eq!(
            infer_embed("https://azgames.io/subway-moto").as_deref(),
            Some("https://azgames.io/subway-moto.embed")
        );
    }
}
