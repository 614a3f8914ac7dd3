//! Connection origin validation
//!
//! With an explicit allow-list the declared origin must match one entry
//! exactly. Without one, the origin's host and port must equal those of the
//! `Host` header the connection arrived on.

use url::{Host, Url};

/// Decide whether a connection with the given origin may proceed
#[must_use]
pub fn is_allowed(
    declared_origin: Option<&str>,
    host_header: Option<&str>,
    allow_list: &[String],
) -> bool {
    let Some(origin) = declared_origin.map(str::trim).filter(|o| !o.is_empty()) else {
        return false;
    };

    if !allow_list.is_empty() {
        return allow_list.iter().any(|allowed| allowed.trim() == origin);
    }

    let Ok(parsed) = Url::parse(origin) else {
        return false;
    };
    let Some(origin_host) = parsed.host() else {
        return false;
    };
    let Some((host, port)) = host_header
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .and_then(parse_host_header)
    else {
        return false;
    };

    let default_port = default_port(parsed.scheme());
    let origin_port = parsed.port().unwrap_or(default_port);
    let host_port = port.unwrap_or(default_port);

    same_host(&origin_host, &host) && origin_port == host_port
}

fn default_port(scheme: &str) -> u16 {
    match scheme {
        "https" | "wss" => 443,
        _ => 80,
    }
}

fn same_host(origin: &Host<&str>, header: &Host<String>) -> bool {
    match (origin, header) {
        (Host::Domain(a), Host::Domain(b)) => a.eq_ignore_ascii_case(b),
        (Host::Ipv4(a), Host::Ipv4(b)) => a == b,
        (Host::Ipv6(a), Host::Ipv6(b)) => a == b,
        _ => false,
    }
}

/// Split a `Host` header into a parsed host and optional port
///
/// Bracketed IPv6 literals (`[::1]:8080`) are supported. A port must be all
/// ASCII digits; anything else makes the header unusable.
pub(crate) fn parse_host_header(value: &str) -> Option<(Host<String>, Option<u16>)> {
    let (host, port) = if value.starts_with('[') {
        let end = value.find(']')?;
        let (host, tail) = value.split_at(end + 1);
        match tail {
            "" => (host, None),
            tail => (host, Some(tail.strip_prefix(':')?)),
        }
    } else {
        match value.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (value, None),
        }
    };

    let port = match port {
        None | Some("") => None,
        Some(port) if port.bytes().all(|b| b.is_ascii_digit()) => Some(port.parse::<u16>().ok()?),
        Some(_) => return None,
    };

    Some((Host::parse(host).ok()?, port))
}
