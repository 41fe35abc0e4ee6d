use std::collections::BTreeMap;

use url::Url;

use crate::metadata::errors::MetaError;

fn is_web_url(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty())
}

fn has_credentials(url: &Url) -> bool {
    !url.username().is_empty() || url.password().is_some()
}

/// Turn user input like `example.com` or `www.example.com/page` into an absolute URL.
///
/// Already-absolute http(s) URLs are returned unchanged, so the function is idempotent.
/// Anything else gets an `https://` prefix and must then parse as a web URL with a host.
/// Embedded credentials and non-web schemes are rejected.
pub fn normalize_url(input: &str) -> Result<String, MetaError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(MetaError::InvalidInput("empty url".into()));
    }

    match Url::parse(input) {
        Ok(parsed) if is_web_url(&parsed) => {
            if has_credentials(&parsed) {
                return Err(MetaError::InvalidInput(format!(
                    "{input}: credentials are not allowed"
                )));
            }
            return Ok(input.to_string());
        }
        // `example.com:8080` parses with scheme "example.com", so only an
        // explicit `scheme://` counts as an unsupported scheme here.
        Ok(parsed) if input.contains("://") => {
            return Err(MetaError::InvalidInput(format!(
                "{input}: unsupported scheme '{}'",
                parsed.scheme()
            )));
        }
        // an explicit scheme is never prefixed a second time
        Err(err) if input.contains("://") => {
            return Err(MetaError::InvalidInput(format!("{input}: {err}")));
        }
        _ => {}
    }

    let prefixed = if input.starts_with("//") {
        format!("https:{input}")
    } else {
        format!("https://{input}")
    };

    match Url::parse(&prefixed) {
        Ok(parsed) if is_web_url(&parsed) && !has_credentials(&parsed) => Ok(prefixed),
        Ok(_) => Err(MetaError::InvalidInput(format!("{input}: not a web url"))),
        Err(err) => Err(MetaError::InvalidInput(format!("{input}: {err}"))),
    }
}

/// `scheme://host[:port]` of a URL, `None` for opaque origins.
pub fn origin(url: &Url) -> Option<String> {
    let origin = url.origin();
    if !origin.is_tuple() {
        return None;
    }
    Some(origin.ascii_serialization())
}

fn parse_base(base: &str) -> Option<Url> {
    Url::parse(base)
        .ok()
        .filter(is_web_url)
        .or_else(|| Url::parse(&format!("https://{base}")).ok())
}

/// Resolve a possibly-relative href against `base`.
///
/// Plain relative paths are joined to the origin of `base`, not to its path:
/// `resolve_url("https://a.com/p/", Some("logo.png"))` is `https://a.com/logo.png`.
/// Returns `None` on anything it cannot make sense of.
pub fn resolve_url(base: &str, candidate: Option<&str>) -> Option<String> {
    let candidate = candidate?.trim();
    if candidate.is_empty() {
        return None;
    }

    if let Ok(absolute) = Url::parse(candidate) {
        if has_credentials(&absolute) {
            return None;
        }
        return Some(candidate.to_string());
    }

    let base_url = parse_base(base)?;
    let base_origin = origin(&base_url)?;

    let resolved = if candidate.starts_with("//") {
        let joined = format!("{}:{candidate}", base_url.scheme());
        Url::parse(&joined).ok().map(|u| (u, joined))
    } else if candidate.starts_with('/') {
        let joined = format!("{base_origin}{candidate}");
        Url::parse(&joined).ok().map(|u| (u, joined))
    } else {
        Url::parse(&base_origin)
            .and_then(|o| o.join(candidate))
            .ok()
            .map(|u| {
                let href = u.to_string();
                (u, href)
            })
    };

    match resolved {
        Some((url, href)) if !has_credentials(&url) => Some(href),
        _ => None,
    }
}

/// Lowercased host without a leading `www.`
pub fn bare_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    if host.is_empty() {
        return None;
    }
    Some(host)
}

/// `{origin}/favicon.ico` for a page URL
pub fn favicon_url(page_url: &str) -> Option<String> {
    let parsed = Url::parse(page_url).ok()?;
    origin(&parsed).map(|o| format!("{o}/favicon.ico"))
}

/// Domains to ask the logo service about: the domain itself, then its alias.
pub fn logo_service_domains(domain: &str, aliases: &BTreeMap<String, String>) -> Vec<String> {
    let mut domains = vec![domain.to_string()];
    if let Some(alias) = aliases.get(domain) {
        let alias = alias.trim().to_lowercase();
        if !alias.is_empty() && alias != domain {
            domains.push(alias);
        }
    }
    domains
}
