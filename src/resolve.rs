use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("invalid base url \"{base}\": {source}")]
    InvalidBase { base: String, source: url::ParseError },
    #[error("base url \"{0}\" cannot have relative references")]
    CannotBeABase(String),
    #[error("failed to resolve \"{reference}\" against \"{base}\": {source}")]
    InvalidReference {
        base: String,
        reference: String,
        source: url::ParseError,
    },
}

/// Resolves `reference` against `base`.
///
/// Absolute references are returned unchanged, scheme-relative ones
/// (`//host/path`) inherit the scheme of `base`, and anything else is joined
/// onto the directory of `base`.
pub fn resolve(base: &str, reference: &str) -> Result<String, ResolveError> {
    let reference = reference.trim();

    if Url::parse(reference).is_ok() {
        return Ok(reference.to_string());
    }

    let base_url = Url::parse(base).map_err(|source| ResolveError::InvalidBase {
        base: base.to_string(),
        source,
    })?;

    if base_url.cannot_be_a_base() {
        return Err(ResolveError::CannotBeABase(base.to_string()));
    }

    base_url
        .join(reference)
        .map(String::from)
        .map_err(|source| ResolveError::InvalidReference {
            base: base.to_string(),
            reference: reference.to_string(),
            source,
        })
}

/// Whether the last path segment of `url` ends with one of `extensions`
/// (compared case-insensitively, without the leading dot).
pub fn has_extension(url: &str, extensions: &[&str]) -> bool {
    let Ok(url) = Url::parse(url) else {
        return false;
    };

    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|last| last.rsplit_once('.'))
        .map(|(stem, extension)| {
            !stem.is_empty() && extensions.iter().any(|ext| ext.eq_ignore_ascii_case(extension))
        })
        .unwrap_or(false)
}
