use url::Url;

use crate::error::{AppError, Result};

/// Normalizes a raw URL into its canonical form and extracts the host.
///
/// The canonical form is the identity key for a target: scheme and host are
/// lowercased, the scheme's default port is stripped, an empty path becomes
/// `/`, a non-root path loses all trailing slashes, and any fragment is
/// dropped. The query string is preserved verbatim, so two URLs differing
/// only in query parameter order are distinct targets. The returned host
/// keeps a non-default port (`example.com:8080`).
pub fn canonicalize(raw: &str) -> Result<(String, String)> {
    let mut url = Url::parse(raw).map_err(|e| AppError::InvalidUrl(e.to_string()))?;

    // The parser already lowercases scheme and host and drops default ports.
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(AppError::InvalidUrl(format!("unsupported scheme: {other}")));
        }
    }
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| AppError::InvalidUrl("url must have a host".to_string()))?
        .to_string();

    let path = url.path().to_string();
    if path != "/" && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }
    url.set_fragment(None);

    let host = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    };

    Ok((url.to_string(), host))
}
