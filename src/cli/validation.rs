use crate::cli::errors::{CliError, CliResult};
use url::Url;

const MAX_KEYWORD_LEN: usize = 200;

/// Validates a game page url
pub fn validate_url(url: &str) -> CliResult<()> {
    if url.trim().is_empty() {
        return Err(CliError::validation("url", "URL cannot be empty"));
    }

    match Url::parse(url.trim()) {
        Ok(parsed_url) => {
            if !matches!(parsed_url.scheme(), "http" | "https") {
                return Err(CliError::validation("url", "URL must start with http:// or https://"));
            }
            Ok(())
        }
        Err(_) => Err(CliError::validation("url", "Invalid URL format")),
    }
}

/// Validates a search keyword
pub fn validate_keyword(keyword: &str) -> CliResult<()> {
    if keyword.trim().is_empty() {
        return Err(CliError::validation("search", "Keyword cannot be empty"));
    }

    if keyword.len() > MAX_KEYWORD_LEN {
        return Err(CliError::validation(
            "search",
            format!("Keyword cannot exceed {MAX_KEYWORD_LEN} characters"),
        ));
    }

    Ok(())
}

/// Validates the recent window
pub fn validate_recent(recent: Option<u64>) -> CliResult<()> {
    if recent == Some(0) {
        return Err(CliError::validation("recent", "Window must be at least one hour"));
    }
    Ok(())
}

/// Validates a prompt template
pub fn validate_template(template: &str) -> CliResult<()> {
    if template.trim().is_empty() {
        return Err(CliError::validation("template", "Template cannot be empty"));
    }

    if !["{name}", "{url}", "{embed_url}"]
        .iter()
        .any(|placeholder| template.contains(placeholder))
    {
        return Err(CliError::validation(
            "template",
            "Template must use at least one of {name}, {url} or {embed_url}",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://azgames.io/subway-moto").is_ok());
        assert!(validate_url("  ").is_err());
        assert!(validate_url("ftp://azgames.io/x").is_err());
        assert!(validate_url("azgames.io/x").is_err());
    }

    #[test]
    fn test_validate_keyword() {
        assert!(validate_keyword("moto").is_ok());
        assert!(validate_keyword(" ").is_err());
        assert!(validate_keyword(&"x".repeat(MAX_KEYWORD_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_recent() {
        assert!(validate_recent(None).is_ok());
        assert!(validate_recent(Some(24)).is_ok());
        assert!(validate_recent(Some(0)).is_err());
    }

    #[test]
    fn test_validate_template() {
        assert!(validate_template("Game: {name}").is_ok());
        assert!(validate_template("no placeholders").is_err());
        assert!(validate_template("").is_err());
    }
}
