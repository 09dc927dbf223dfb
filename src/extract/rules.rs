use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use crate::fetch::Probe;

static COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--(.*?)-->").expect("Failed to compile comment regex"));
static FRAMES: Lazy<Selector> =
    Lazy::new(|| Selector::parse("iframe, embed, object").expect("Failed to parse frame selector"));
static SCRIPTS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script").expect("Failed to parse script selector"));

const FRAME_ATTRS: &[&str] = &["src", "data-src", "data"];

/// One way of finding an embed url on a detail page.
///
/// Rules yield raw candidates only, normalizing and validating them is up to the caller.
pub enum Rule {
    /// First element matching `selector`, first non-empty attribute out of `attrs`.
    Anchor {
        selector: &'static str,
        attrs: &'static [&'static str],
    },
    /// Data attributes with "url" in their name on elements matching `selector`.
    DataUrl { selector: &'static str },
    /// iframe / embed / object elements whose source contains `needle`.
    Frames { needle: &'static str },
    /// Regex over the raw html, capture group 1 or the whole match.
    Pattern(&'static Lazy<Regex>),
    /// Regex over inline script bodies.
    Script(&'static Lazy<Regex>),
    /// Regex over html comments containing `marker`.
    Comment {
        marker: &'static str,
        pattern: &'static Lazy<Regex>,
    },
    /// Embed url derived from the page url, accepted only if reachable.
    Infer(fn(&str) -> Option<String>),
}

impl Rule {
    pub fn kind(&self) -> &'static str {
        match self {
            Rule::Anchor { .. } => "anchor",
            Rule::DataUrl { .. } => "data-url",
            Rule::Frames { .. } => "frames",
            Rule::Pattern(_) => "pattern",
            Rule::Script(_) => "script",
            Rule::Comment { .. } => "comment",
            Rule::Infer(_) => "infer",
        }
    }

    pub fn needs_probe(&self) -> bool {
        matches!(self, Rule::Infer(_))
    }

    /// Raw candidates in document order.
    pub fn candidates(&self, doc: &Html, html: &str, source_url: &str) -> Vec<String> {
        match self {
            Rule::Anchor { selector, attrs } => {
                let Ok(selector) = Selector::parse(selector) else {
                    log::warn!("invalid selector {selector}");
                    return vec![];
                };

                doc.select(&selector)
                    .next()
                    .and_then(|el| {
                        attrs
                            .iter()
                            .filter_map(|attr| el.value().attr(attr))
                            .map(str::trim)
                            .find(|value| !value.is_empty())
                    })
                    .map(|value| vec![value.to_string()])
                    .unwrap_or_default()
            }

            Rule::DataUrl { selector } => {
                let Ok(selector) = Selector::parse(selector) else {
                    log::warn!("invalid selector {selector}");
                    return vec![];
                };

                doc.select(&selector)
                    .flat_map(|el| {
                        el.value()
                            .attrs()
                            .filter(|(name, _)| name.starts_with("data-") && name.contains("url"))
                            .map(|(_, value)| value.trim().to_string())
                            .collect::<Vec<_>>()
                    })
                    .filter(|value| !value.is_empty())
                    .collect()
            }

            Rule::Frames { needle } => {
                let needle = needle.to_lowercase();
                doc.select(&FRAMES)
                    .flat_map(|el| {
                        FRAME_ATTRS
                            .iter()
                            .filter_map(|attr| el.value().attr(attr))
                            .map(str::trim)
                            .filter(|value| value.to_lowercase().contains(&needle))
                            .map(str::to_string)
                            .collect::<Vec<_>>()
                    })
                    .collect()
            }

            Rule::Pattern(pattern) => captures(pattern, html),

            Rule::Script(pattern) => doc
                .select(&SCRIPTS)
                .flat_map(|el| captures(pattern, &el.text().collect::<String>()))
                .collect(),

            Rule::Comment { marker, pattern } => COMMENT
                .captures_iter(html)
                .filter_map(|c| c.get(1))
                .map(|m| m.as_str())
                .filter(|comment| comment.contains(marker))
                .flat_map(|comment| captures(pattern, comment))
                .collect(),

            Rule::Infer(infer) => infer(source_url).into_iter().collect(),
        }
    }
}

fn captures(pattern: &Regex, text: &str) -> Vec<String> {
    pattern
        .captures_iter(text)
        .filter_map(|c| c.get(1).or_else(|| c.get(0)))
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Run `rules` in order, first candidate `accept` turns into a url wins.
pub fn first_match(
    rules: &[Rule],
    html: &str,
    source_url: &str,
    probe: &dyn Probe,
    accept: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    let doc = Html::parse_document(html);

    for (idx, rule) in rules.iter().enumerate() {
        for raw in rule.candidates(&doc, html, source_url) {
            let Some(url) = accept(&raw) else {
                log::trace!("rule #{idx} ({}): rejected {raw}", rule.kind());
                continue;
            };

            if rule.needs_probe() && !probe.is_reachable(&url) {
                log::debug!("rule #{idx} ({}): {url} is not reachable", rule.kind());
                continue;
            }

            log::debug!("rule #{idx} ({}): {url}", rule.kind());
            return Some(url);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    static DOT_EMBED: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"["']([^"']*\.embed)["']"#).unwrap());

    fn apply(rule: &Rule, html: &str) -> Vec<String> {
        rule.candidates(&Html::parse_document(html), html, "https://azgames.io/foo")
    }

    #[test]
    fn anchor_takes_first_present_attribute() {
        let html = r#"<iframe id="f" src="" data-src="https://a/x"></iframe><iframe id="f" src="https://b"></iframe>"#;
        let rule = Rule::Anchor {
            selector: "iframe#f",
            attrs: &["src", "data-src"],
        };
        assert_eq!(apply(&rule, html), vec!["https://a/x"]);
    }

    #[test]
    fn frames_match_needle_case_insensitively() {
        let html = r#"
            <iframe src="https://ads.example.com/banner"></iframe>
            <embed src="/Foo.EMBED">
            <object data="https://azgames.io/bar.embed"></object>
        "#;
        let rule = Rule::Frames { needle: ".embed" };
        assert_eq!(
            apply(&rule, html),
            vec!["/Foo.EMBED", "https://azgames.io/bar.embed"]
        );
    }

    #[test]
    fn data_url_reads_only_url_attributes() {
        let html = r#"<div class="game_frame" data-width="800" data-iframe-url="https://x/index.html"></div>"#;
        let rule = Rule::DataUrl {
            selector: "div.game_frame",
        };
        assert_eq!(apply(&rule, html), vec!["https://x/index.html"]);
    }

    #[test]
    fn script_rule_ignores_markup_outside_scripts() {
        let html = r#"<a href="/nope.embed">x</a><script>var u = "/yes.embed";</script>"#;
        assert_eq!(apply(&Rule::Script(&DOT_EMBED), html), vec!["/yes.embed"]);
        assert_eq!(
            apply(&Rule::Pattern(&DOT_EMBED), html),
            vec!["/nope.embed", "/yes.embed"]
        );
    }

    #[test]
    fn comment_rule_requires_marker() {
        let html = r#"<!-- "/other.embed" --><!-- az-games__embed-link "/game.embed" -->"#;
        let rule = Rule::Comment {
            marker: "az-games__embed-link",
            pattern: &DOT_EMBED,
        };
        assert_eq!(apply(&rule, html), vec!["/game.embed"]);
    }

    #[test]
    fn first_match_respects_order_and_probe() {
        fn infer(url: &str) -> Option<String> {
            Some(format!("{url}.embed"))
        }

        let rules = [Rule::Pattern(&DOT_EMBED), Rule::Infer(infer)];
        let accept = |raw: &str| raw.starts_with("https://").then(|| raw.to_string());

        // pattern finds a relative url which accept rejects, inference is probed
        let html = r#"<a href="/x.embed"></a>"#;
        let unreachable = |_: &str| false;
        let reachable = |_: &str| true;

        assert_eq!(
            first_match(&rules, html, "https://azgames.io/foo", &unreachable, accept),
            None
        );
        assert_eq!(
            first_match(&rules, html, "https://azgames.io/foo", &reachable, accept).as_deref(),
            Some("https://azgames.io/foo.embed")
        );
    }
}
