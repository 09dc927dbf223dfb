use std::{
    ffi::OsStr,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use headless_chrome::{protocol::cdp::Page as CdpPage, Browser, LaunchOptions, Tab};

use super::{looks_like_challenge, Page, Renderer};
use crate::{config::ScrapeConfig, errors::FetchError, platform::Platform};

fn render_err(err: impl std::fmt::Display) -> FetchError {
    FetchError::Render(err.to_string())
}

/// Cheap signals, no bypassing: detect "Just a moment..." and challenge iframes.
fn looks_like_challenge_tab(tab: &Tab) -> bool {
    let title = tab.get_title().unwrap_or_default();
    if title.to_lowercase().contains("just a moment") {
        return true;
    }

    let res = tab.evaluate(
        r#"
        !!(document.querySelector('iframe[src*="challenge"]')
           || document.querySelector('div[id*="cf-"], div[class*="cf-"]')
           || document.querySelector('iframe[src*="hcaptcha"], iframe[src*="turnstile"]'))
    "#,
        false,
    );
    res.ok()
        .and_then(|v| v.value.and_then(|x| x.as_bool()))
        .unwrap_or(false)
}

fn stealth_tab(tab: &Tab, user_agent: &str) -> Result<(), FetchError> {
    tab.call_method(CdpPage::AddScriptToEvaluateOnNewDocument {
        run_immediately: Some(true),
        source: "Object.defineProperty(navigator, 'webdriver', {get: () => undefined});"
            .to_string(),
        world_name: None,
        include_command_line_api: None,
    })
    .map_err(render_err)?;

    tab.set_user_agent(user_agent, Some("en-US,en"), None)
        .map_err(render_err)?;

    Ok(())
}

/// One browser process and its tab, torn down on drop.
struct BrowserSession {
    iden: String,
    tab: Arc<Tab>,
    // dropped after the tab is closed, which kills the process
    _browser: Browser,
}

impl BrowserSession {
    fn launch(iden: String, options: LaunchOptions) -> Result<Self, FetchError> {
        let browser = Browser::new(options).map_err(|err| {
            log::error!("failed to start chrome: {err}");
            render_err(err)
        })?;
        let tab = browser.new_tab().map_err(render_err)?;

        Ok(Self {
            iden,
            tab,
            _browser: browser,
        })
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Err(err) = self.tab.close(true) {
            log::warn!("{}: failed to close tab: {err}", self.iden);
        }
        log::debug!("{}: browser closed", self.iden);
    }
}

/// Headless Chrome, one fresh process per page load.
pub struct RenderedFetch {
    platform: Platform,
    chrome_path: Option<PathBuf>,
    timeout: Duration,
    wait: Duration,
}

impl RenderedFetch {
    pub fn new(platform: Platform, config: &ScrapeConfig) -> Self {
        let chrome_path = std::env::var("CHROME_PATH")
            .ok()
            .or_else(|| config.chrome_path.clone())
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        Self {
            platform,
            chrome_path,
            timeout: Duration::from_secs(config.timeout_secs),
            wait: Duration::from_secs(config.render_wait_secs),
        }
    }

    fn launch_options(&self) -> Result<LaunchOptions<'static>, FetchError> {
        LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .window_size(Some((1280, 720)))
            .path(self.chrome_path.clone())
            .idle_browser_timeout(self.timeout + self.wait)
            .args(vec![OsStr::new("--disable-blink-features=AutomationControlled")])
            .build()
            .map_err(render_err)
    }
}

impl Renderer for RenderedFetch {
    fn render(&self, url: &str, marker: &str) -> Result<Page, FetchError> {
        let host = reqwest::Url::parse(url)
            .map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?
            .host_str()
            .unwrap_or_default()
            .to_string();

        log::debug!("{host}: launching chrome");
        let session = BrowserSession::launch(host.clone(), self.launch_options()?)?;
        let tab = &session.tab;

        tab.enable_stealth_mode().map_err(render_err)?;
        stealth_tab(tab, self.platform.user_agent())?;
        tab.set_default_timeout(self.timeout);

        tab.navigate_to(url).map_err(render_err)?;
        tab.wait_until_navigated().map_err(render_err)?;

        if let Err(err) = tab.wait_for_element_with_custom_timeout(marker, self.wait) {
            log::debug!("{host}: marker '{marker}' did not show up: {err}");

            if looks_like_challenge_tab(tab) {
                log::info!("{host}: challenge detected");
                return Err(FetchError::Challenge);
            }
        }

        let html = tab.get_content().map_err(render_err)?;

        if looks_like_challenge(&html) {
            return Err(FetchError::Challenge);
        }

        Ok(Page {
            url: url.to_string(),
            status: 200,
            html,
            rendered: true,
        })
    }
}
