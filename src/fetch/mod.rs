#[cfg(feature = "headless")]
pub mod headless;
pub mod plain;

use crate::{config::ScrapeConfig, errors::FetchError, platform::Platform};

/// A fetched document.
#[derive(Clone, Debug)]
pub struct Page {
    pub url: String,
    pub status: u16,
    pub html: String,
    pub rendered: bool,
}

/// Plain HTTP access to a site.
pub trait PageSource: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Page, FetchError>;

    /// `true` if `url` answers with a success status (HEAD, falling back to GET).
    fn probe(&self, url: &str) -> bool;
}

/// Script-capable access to a site.
pub trait Renderer: Send + Sync {
    /// Load `url`, wait for `marker` to show up, return the rendered DOM.
    /// Any browser started for the call is gone when it returns.
    fn render(&self, url: &str, marker: &str) -> Result<Page, FetchError>;
}

/// Reachability check for urls that were guessed rather than found.
pub trait Probe {
    fn is_reachable(&self, url: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Probe for F {
    fn is_reachable(&self, url: &str) -> bool {
        self(url)
    }
}

/// Signals of an anti-bot interstitial instead of the page we asked for.
pub fn looks_like_challenge(html: &str) -> bool {
    html.contains("Sorry, you have been blocked")
        || html.contains("Verify you are human by completing the action below")
        || html.contains("<title>Just a moment...</title>")
        || html.contains("cf-browser-verification")
}

/// Plain requests first, a headless render when they come back denied or empty.
pub struct FetchStrategy {
    platform: Platform,
    plain: Box<dyn PageSource>,
    renderer: Option<Box<dyn Renderer>>,
}

impl FetchStrategy {
    pub fn new(
        platform: Platform,
        plain: Box<dyn PageSource>,
        renderer: Option<Box<dyn Renderer>>,
    ) -> Self {
        Self {
            platform,
            plain,
            renderer,
        }
    }

    pub fn for_platform(
        platform: Platform,
        config: &ScrapeConfig,
        no_headless: bool,
    ) -> Result<Self, FetchError> {
        let plain = plain::PlainFetch::new(platform, config)?;

        let renderer = if config.headless && !no_headless {
            headless_renderer(platform, config)
        } else {
            None
        };

        Ok(Self::new(platform, Box::new(plain), renderer))
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Fetch `url` and run `parse` over it.
    ///
    /// Escalates to the renderer when the plain response was access-denied or
    /// `parse` found nothing in it. Without a renderer the plain outcome is final.
    pub fn fetch_with<T>(
        &self,
        url: &str,
        marker: &str,
        parse: impl Fn(&Page) -> Option<T>,
    ) -> Result<Option<T>, FetchError> {
        let platform = self.platform;

        match self.plain.fetch(url) {
            Ok(page) => {
                log::debug!(
                    "{platform}: {} {} ({} bytes, rendered: {})",
                    page.status,
                    page.url,
                    page.html.len(),
                    page.rendered
                );
                if let Some(found) = parse(&page) {
                    return Ok(Some(found));
                }

                let Some(renderer) = &self.renderer else {
                    return Ok(None);
                };

                log::info!("{platform}: nothing found in {url}, rendering");
                match renderer.render(url, marker) {
                    Ok(page) => Ok(parse(&page)),
                    Err(err) => {
                        log::warn!("{platform}: render of {url} failed: {err}");
                        Ok(None)
                    }
                }
            }
            Err(err) if err.is_access_denied() => {
                let Some(renderer) = &self.renderer else {
                    return Err(err);
                };

                log::info!("{platform}: {url} denied plain access ({err}), rendering");
                match renderer.render(url, marker) {
                    Ok(page) => Ok(parse(&page)),
                    Err(render_err) => {
                        log::warn!("{platform}: render of {url} failed: {render_err}");
                        Err(err)
                    }
                }
            }
            Err(err) => Err(err),
        }
    }
}

impl Probe for FetchStrategy {
    fn is_reachable(&self, url: &str) -> bool {
        self.plain.probe(url)
    }
}

#[cfg(feature = "headless")]
fn headless_renderer(platform: Platform, config: &ScrapeConfig) -> Option<Box<dyn Renderer>> {
    Some(Box::new(headless::RenderedFetch::new(platform, config)))
}

#[cfg(not(feature = "headless"))]
fn headless_renderer(platform: Platform, _config: &ScrapeConfig) -> Option<Box<dyn Renderer>> {
    log::debug!("{platform}: built without headless support");
    None
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Fixed(Result<String, u16>);

    impl PageSource for Fixed {
        fn fetch(&self, url: &str) -> Result<Page, FetchError> {
            match &self.0 {
                Ok(html) => Ok(Page {
                    url: url.to_string(),
                    status: 200,
                    html: html.clone(),
                    rendered: false,
                }),
                Err(status) => Err(FetchError::Status(*status)),
            }
        }

        fn probe(&self, _url: &str) -> bool {
            true
        }
    }

    struct CountingRenderer {
        html: String,
        calls: Mutex<Vec<String>>,
    }

    impl Renderer for CountingRenderer {
        fn render(&self, url: &str, marker: &str) -> Result<Page, FetchError> {
            self.calls.lock().unwrap().push(marker.to_string());
            Ok(Page {
                url: url.to_string(),
                status: 200,
                html: self.html.clone(),
                rendered: true,
            })
        }
    }

    fn has_game(page: &Page) -> Option<bool> {
        page.html.contains("game").then_some(page.rendered)
    }

    fn strategy(plain: Result<&str, u16>, rendered: Option<&str>) -> FetchStrategy {
        FetchStrategy::new(
            Platform::ZapGames,
            Box::new(Fixed(plain.map(str::to_string))),
            rendered.map(|html| {
                Box::new(CountingRenderer {
                    html: html.to_string(),
                    calls: Mutex::new(vec![]),
                }) as Box<dyn Renderer>
            }),
        )
    }

    #[test]
    fn plain_match_skips_renderer() {
        let s = strategy(Ok("<a>game</a>"), Some("<a>game</a>"));
        assert_eq!(s.fetch_with("https://zapgames.io/new", "a", has_game).unwrap(), Some(false));
    }

    #[test]
    fn escalates_on_zero_matches() {
        let s = strategy(Ok("<div></div>"), Some("<a>game</a>"));
        assert_eq!(s.fetch_with("https://zapgames.io/new", "a", has_game).unwrap(), Some(true));
    }

    #[test]
    fn escalates_on_forbidden() {
        let s = strategy(Err(403), Some("<a>game</a>"));
        assert_eq!(s.fetch_with("https://zapgames.io/new", "a", has_game).unwrap(), Some(true));
    }

    #[test]
    fn not_found_is_not_escalated() {
        let s = strategy(Err(404), Some("<a>game</a>"));
        let err = s.fetch_with("https://zapgames.io/new", "a", has_game).unwrap_err();
        assert!(matches!(err, FetchError::Status(404)));
    }

    #[test]
    fn without_renderer_plain_outcome_is_final() {
        let s = strategy(Ok("<div></div>"), None);
        assert_eq!(s.fetch_with("https://zapgames.io/new", "a", has_game).unwrap(), None);

        let s = strategy(Err(403), None);
        assert!(s.fetch_with("https://zapgames.io/new", "a", has_game).is_err());
    }

    #[test]
    fn challenge_markers() {
        assert!(looks_like_challenge("<html><title>Just a moment...</title></html>"));
        assert!(!looks_like_challenge("<html><title>Subway Moto</title></html>"));
    }
}
