use crate::error::CoreError;
use url::{Host, Url};

const DEFAULT_SCHEME: &str = "https://";

/// Trim the input and prefix `https://` when no http(s) scheme is present.
pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("{}{}", DEFAULT_SCHEME, trimmed)
    }
}

/// Normalize and validate user input as an http(s) URL with a real host.
///
/// Domain hosts need a dot-separated top-level part ("localhost" is rejected);
/// IP literals are accepted.
pub fn parse_image_url(input: &str) -> Result<Url, CoreError> {
    let invalid = || CoreError::InvalidUrl(input.trim().to_string());

    let normalized = normalize_url(input);
    if normalized.is_empty() || normalized.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let url = Url::parse(&normalized).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid());
    }
    match url.host() {
        Some(Host::Domain(domain)) => {
            let labels: Vec<&str> = domain.trim_end_matches('.').split('.').collect();
            let tld_ok = labels.len() >= 2
                && labels.iter().all(|l| !l.is_empty())
                && labels
                    .last()
                    .map(|tld| tld.len() >= 2 && !tld.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false);
            if !tld_ok {
                return Err(invalid());
            }
        }
        Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => {}
        None => return Err(invalid()),
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_adds_https() {
        assert_eq!(normalize_url("  example.com/a.png "), "https://example.com/a.png");
        assert_eq!(normalize_url("http://example.com"), "http://example.com");
        assert_eq!(normalize_url("HTTPS://Example.com"), "HTTPS://Example.com");
        assert_eq!(normalize_url("   "), "");
    }

    #[test]
    fn test_valid_urls() {
        let url = parse_image_url("example.com/cat.jpg").unwrap();
        assert_eq!(url.as_str(), "https://example.com/cat.jpg");
        assert!(parse_image_url("http://images.example.org/a.png?x=1").is_ok());
        assert!(parse_image_url("https://192.168.0.10/a.png").is_ok());
    }

    #[test]
    fn test_invalid_urls() {
        for input in [
            "",
            "   ",
            "not a url",
            "localhost/a.png",
            "ftp://example.com/a.png",
            "https://",
            "https://example./a.png",
        ] {
            assert!(
                matches!(parse_image_url(input), Err(CoreError::InvalidUrl(_))),
                "expected {:?} to be rejected",
                input
            );
        }
    }
}
