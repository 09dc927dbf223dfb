use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

const USER_AGENT_GOOGLEBOT: &str =
    "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";
const USER_AGENT_DESKTOP: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// A game portal we know how to collect from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "itch.io")]
    ItchIo,
    #[serde(rename = "azgames.io")]
    AzGames,
    #[serde(rename = "armorgames.com")]
    ArmorGames,
    #[serde(rename = "geoguessr.io")]
    GeoGuessr,
    #[serde(rename = "gameflare.com")]
    GameFlare,
    #[serde(rename = "zapgames.io")]
    ZapGames,
}

impl Platform {
    pub const ALL: [Platform; 6] = [
        Platform::ItchIo,
        Platform::AzGames,
        Platform::ArmorGames,
        Platform::GeoGuessr,
        Platform::GameFlare,
        Platform::ZapGames,
    ];

    /// Name used in storage and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::ItchIo => "itch.io",
            Platform::AzGames => "azgames.io",
            Platform::ArmorGames => "armorgames.com",
            Platform::GeoGuessr => "geoguessr.io",
            Platform::GameFlare => "gameflare.com",
            Platform::ZapGames => "zapgames.io",
        }
    }

    /// Canonical origin relative links are resolved against.
    pub fn origin(&self) -> &'static str {
        match self {
            Platform::ItchIo => "https://itch.io",
            Platform::AzGames => "https://azgames.io",
            Platform::ArmorGames => "https://armorgames.com",
            Platform::GeoGuessr => "https://geoguessr.io",
            Platform::GameFlare => "https://www.gameflare.com",
            Platform::ZapGames => "https://zapgames.io",
        }
    }

    /// Listing pages enumerating new games. Not user configurable.
    pub fn listing_urls(&self) -> &'static [&'static str] {
        match self {
            Platform::ItchIo => &["https://itch.io/games/new-and-popular/featured/free/platform-web"],
            Platform::AzGames => &["https://azgames.io/new-games"],
            Platform::ArmorGames => &["https://armorgames.com/games/date"],
            Platform::GeoGuessr => &["https://geoguessr.io/new-games"],
            Platform::GameFlare => &["https://www.gameflare.com/new-games/"],
            Platform::ZapGames => &["https://zapgames.io/new"],
        }
    }

    /// Identity presented to the site. Constant for every request of a platform.
    pub fn user_agent(&self) -> &'static str {
        match self {
            Platform::ArmorGames | Platform::GameFlare => USER_AGENT_DESKTOP,
            _ => USER_AGENT_GOOGLEBOT,
        }
    }

    /// Default bounds of the randomized pause between detail pages.
    pub fn default_delay(&self) -> (Duration, Duration) {
        let (min, max) = match self {
            Platform::ItchIo | Platform::ArmorGames | Platform::ZapGames => (1, 3),
            Platform::AzGames | Platform::GeoGuessr => (2, 8),
            Platform::GameFlare => (2, 2),
        };
        (Duration::from_secs(min), Duration::from_secs(max))
    }

    /// Element a rendered listing page must contain before its DOM is read.
    pub fn listing_marker(&self) -> &'static str {
        match self {
            Platform::ItchIo => "a.game_link",
            Platform::AzGames | Platform::GeoGuessr => ".us-grid-game",
            Platform::ArmorGames => "ul.gamelisting",
            Platform::GameFlare => "a[href*='/online-game/']",
            Platform::ZapGames => "a[class*='GameThumb_gameThumbLink']",
        }
    }

    /// Element a rendered detail page must contain before its DOM is read.
    pub fn detail_marker(&self) -> &'static str {
        match self {
            Platform::ItchIo => ".game_frame",
            Platform::ArmorGames => "#html-game-frame",
            Platform::GameFlare => "#iframe-in-game",
            Platform::AzGames | Platform::GeoGuessr | Platform::ZapGames => "iframe",
        }
    }

    /// itch.io keeps its player url in the `iframe_url` column, everyone else in `embed_url`.
    pub fn stores_as_iframe(&self) -> bool {
        matches!(self, Platform::ItchIo)
    }

    /// Guess the platform a page belongs to from its url.
    pub fn detect(url: &str) -> Option<Platform> {
        let host = url::Url::parse(url).ok()?.host_str()?.to_lowercase();
        Platform::ALL.into_iter().find(|p| {
            let domain = p.as_str();
            host == domain || host.ends_with(&format!(".{domain}"))
        })
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_lowercase();
        let platform = match value.as_str() {
            "itch.io" | "itch" | "itchio" => Platform::ItchIo,
            "azgames.io" | "azgames" => Platform::AzGames,
            "armorgames.com" | "armorgames" | "armor" => Platform::ArmorGames,
            "geoguessr.io" | "geoguessr" => Platform::GeoGuessr,
            "gameflare.com" | "gameflare" => Platform::GameFlare,
            "zapgames.io" | "zapgames" => Platform::ZapGames,
            _ => return Err(format!("unknown platform '{s}'")),
        };
        Ok(platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_full_names() {
        assert_eq!("itch".parse::<Platform>().unwrap(), Platform::ItchIo);
        assert_eq!("ArmorGames.com".parse::<Platform>().unwrap(), Platform::ArmorGames);
        assert!("newgrounds".parse::<Platform>().is_err());

        for platform in Platform::ALL {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), platform);
        }
    }

    #[test]
    fn detects_platform_from_url() {
        assert_eq!(
            Platform::detect("https://someone.itch.io/cool-game"),
            Some(Platform::ItchIo)
        );
        assert_eq!(
            Platform::detect("https://www.gameflare.com/online-game/foo/"),
            Some(Platform::GameFlare)
        );
        assert_eq!(Platform::detect("https://example.com/"), None);
        assert_eq!(Platform::detect("not a url"), None);
    }

    #[test]
    fn serde_uses_domain_names() {
        let json = serde_json::to_string(&Platform::ZapGames).unwrap();
        assert_eq!(json, "\"zapgames.io\"");
    }
}
