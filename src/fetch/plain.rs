use std::{error::Error, thread::sleep, time::Duration};

use reqwest::{
    blocking::Client,
    header::{self, HeaderMap, HeaderValue},
    redirect, StatusCode,
};

use super::{looks_like_challenge, Page, PageSource};
use crate::{config::ScrapeConfig, errors::FetchError, platform::Platform};

/// Innermost cause of a reqwest error, the outer ones are rarely useful.
pub fn get_error(error: &reqwest::Error) -> String {
    match error.source() {
        Some(e) => match e.source() {
            Some(e) => e.to_string(),
            None => e.to_string(),
        },
        None => error.to_string(),
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.5"),
    );
    headers.insert(header::DNT, HeaderValue::from_static("1"));
    headers.insert(
        header::UPGRADE_INSECURE_REQUESTS,
        HeaderValue::from_static("1"),
    );
    headers
}

fn build_client(
    platform: Platform,
    timeout: Duration,
    proxy: Option<&str>,
) -> Result<Client, FetchError> {
    let mut client = Client::builder()
        .user_agent(platform.user_agent())
        .default_headers(browser_headers())
        .redirect(redirect::Policy::limited(10))
        .timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(10));

    if let Some(proxy) = proxy.filter(|p| !p.is_empty()) {
        log::debug!("{platform}: using proxy {proxy}");
        let proxy = reqwest::Proxy::all(proxy)
            .map_err(|e| FetchError::InvalidUrl(format!("proxy {proxy}: {e}")))?;
        client = client.proxy(proxy);
    }

    Ok(client.build()?)
}

/// HTTP GET/HEAD with one fixed identity per platform.
pub struct PlainFetch {
    platform: Platform,
    client: Client,
    probe_client: Client,
    retries: u8,
}

impl PlainFetch {
    pub fn new(platform: Platform, config: &ScrapeConfig) -> Result<Self, FetchError> {
        let proxy = config.proxy.as_deref();

        Ok(Self {
            platform,
            client: build_client(platform, Duration::from_secs(config.timeout_secs), proxy)?,
            probe_client: build_client(
                platform,
                Duration::from_secs(config.probe_timeout_secs),
                proxy,
            )?,
            retries: config.retries,
        })
    }
}

impl PageSource for PlainFetch {
    fn fetch(&self, url: &str) -> Result<Page, FetchError> {
        let url_parsed =
            reqwest::Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;

        let host = url_parsed.host_str().unwrap_or_default();
        let path = url_parsed.path();
        let iden = format!("{host}{path}");

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let can_retry = attempt <= self.retries;

            if attempt > 1 {
                log::debug!("{iden}: retrying");
            }

            log::debug!("{iden}: requesting");

            let resp = match self.client.get(url_parsed.clone()).send() {
                Ok(r) => r,
                Err(err) => {
                    log::warn!("{iden}: {err}: {}", get_error(&err));
                    if !can_retry {
                        return Err(err.into());
                    }
                    sleep(Duration::from_secs(attempt as u64));
                    continue;
                }
            };

            let status = resp.status();

            if status == StatusCode::TOO_MANY_REQUESTS && can_retry {
                log::debug!("{iden}: rate limited");
                sleep(Duration::from_secs(attempt as u64 * 4));
                continue;
            }

            if !status.is_success() {
                log::debug!("{iden}: {status}");
                return Err(FetchError::Status(status.as_u16()));
            }

            let html = match resp.text() {
                Ok(t) => t,
                Err(err) => {
                    log::debug!("{iden}: failed to read body: {}", get_error(&err));
                    if !can_retry {
                        return Err(err.into());
                    }
                    continue;
                }
            };

            if looks_like_challenge(&html) {
                log::info!("{}: challenge page at {iden}", self.platform);
                return Err(FetchError::Challenge);
            }

            return Ok(Page {
                url: url.to_string(),
                status: status.as_u16(),
                html,
                rendered: false,
            });
        }
    }

    fn probe(&self, url: &str) -> bool {
        match self.probe_client.head(url).send() {
            Ok(resp) if resp.status().is_success() => return true,
            Ok(resp) => log::debug!("{url}: HEAD {}", resp.status()),
            Err(err) => log::debug!("{url}: HEAD failed: {}", get_error(&err)),
        }

        match self.probe_client.get(url).send() {
            Ok(resp) => {
                log::debug!("{url}: GET {}", resp.status());
                resp.status().is_success()
            }
            Err(err) => {
                log::debug!("{url}: GET failed: {}", get_error(&err));
                false
            }
        }
    }
}
