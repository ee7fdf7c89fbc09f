/// Appends click-tracking parameters and a fixed suffix to a URL
///
/// `gclid` and `gclsrc` are added when `include_click_params` is set and the
/// corresponding value is non-empty. The suffix (with any leading `?`
/// removed) is added unless the URL already contains it. Parameters are
/// joined with `&` and attached after `?`, or after `&` when the URL already
/// carries a query string.
///
/// # Examples
///
/// ```
/// use tagwalk::url::construct_url;
///
/// let url = construct_url("https://example.com", true, "Test-7", "aw.ds", "?utm=x");
/// assert_eq!(url, "https://example.com?gclid=Test-7&gclsrc=aw.ds&utm=x");
/// ```
pub fn construct_url(
    url: &str,
    include_click_params: bool,
    click_id: &str,
    click_source: &str,
    suffix: &str,
) -> String {
    let mut parameters = Vec::new();

    if include_click_params {
        if !click_id.is_empty() {
            parameters.push(format!("gclid={}", click_id));
        }
        if !click_source.is_empty() {
            parameters.push(format!("gclsrc={}", click_source));
        }
    }

    if !suffix.is_empty() && !url.contains(suffix) {
        parameters.push(suffix.strip_prefix('?').unwrap_or(suffix).to_string());
    }

    if parameters.is_empty() {
        return url.to_string();
    }

    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, separator, parameters.join("&"))
}
