use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidTargetUrl {
    #[error("target url is empty")]
    Empty,
    #[error("target url `{input}` could not be parsed: {reason}")]
    Unparsable { input: String, reason: String },
    #[error("target url `{0}` must use http or https")]
    UnsupportedScheme(String),
    #[error("target url `{0}` has no host")]
    MissingHost(String),
}

/// Validates an operator-typed address and normalizes it before it is sent to
/// the backend: scheme and host lowercased, fragment dropped, trailing slash
/// removed from non-root paths. A missing scheme defaults to https.
pub fn normalize_target_url(raw: &str) -> Result<String, InvalidTargetUrl> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(InvalidTargetUrl::Empty);
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let mut parsed = Url::parse(&candidate).map_err(|err| InvalidTargetUrl::Unparsable {
        input: trimmed.to_string(),
        reason: err.to_string(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(InvalidTargetUrl::UnsupportedScheme(trimmed.to_string()));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(InvalidTargetUrl::MissingHost(trimmed.to_string()));
    }

    parsed.set_fragment(None);
    let normalized = parsed.to_string();
    if parsed.query().is_none() {
        return Ok(normalized.trim_end_matches('/').to_string());
    }
    Ok(normalized)
}
