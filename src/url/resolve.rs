use url::Url;

/// Extension used when an asset URL has none
const DEFAULT_EXTENSION: &str = "jpg";

/// Resolves an asset reference found on a page into an absolute URL
///
/// Handles absolute, scheme-relative (`//cdn/...`) and path-relative
/// references. Only HTTP(S) results are returned; `data:` URIs and other
/// schemes yield None.
///
/// # Arguments
///
/// * `page_url` - URL of the page the reference was found on
/// * `reference` - Raw attribute value
pub fn resolve_asset_url(page_url: &str, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }

    let resolved = match Url::parse(reference) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(page_url).ok()?.join(reference).ok()?
        }
        Err(_) => return None,
    };

    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

/// Infers a file extension from the last path segment of a URL
///
/// The query string and fragment are ignored. Falls back to `jpg` when the
/// segment has no usable extension.
pub fn file_extension(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url
            .split(&['?', '#'][..])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let segment = path.rsplit('/').next().unwrap_or_default();
    match segment.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= 5
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_ascii_lowercase()
        }
        _ => DEFAULT_EXTENSION.to_string(),
    }
}
