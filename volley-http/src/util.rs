pub(super) fn has_header(headers: &[(String, String)], name: &str) -> bool {
    headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
}

/// `Host` header value for `parsed`; `Url::port` already omits the scheme's default port.
pub(super) fn host_header_value(parsed: &url::Url) -> Option<String> {
    let host = parsed.host_str()?;
    match parsed.port() {
        Some(port) => Some(format!("{host}:{port}")),
        None => Some(host.to_string()),
    }
}

pub(super) fn is_supported_scheme(parsed: &url::Url) -> bool {
    matches!(parsed.scheme(), "http" | "https")
}
