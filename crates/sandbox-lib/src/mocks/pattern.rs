//! Compiled URL patterns for the HTTP interceptor
//!
//! A pattern is `[scheme://]host[:port][/path][?query]`. Any one full host
//! label or path segment may be `*`. A host wildcard matches exactly one
//! label; an interior path wildcard matches exactly one segment; a trailing
//! path wildcard matches one or more segments. Empty path segments are
//! ignored, so trailing slashes never matter.

use super::PatternError;
use percent_encoding::percent_decode_str;
use std::fmt;

const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Wildcard,
}

impl Segment {
    fn matches(&self, candidate: &str) -> bool {
        match self {
            Segment::Literal(literal) => literal == candidate,
            Segment::Wildcard => true,
        }
    }
}

/// A URL split into comparable parts
#[derive(Debug, Clone, PartialEq, Eq)]
struct UrlParts {
    scheme: Option<String>,
    host: String,
    port: Option<u16>,
    /// Decoded path as written, trailing slash included
    path: String,
    segments: Vec<String>,
    query: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPattern {
    source: String,
    scheme: Option<String>,
    host: Vec<Segment>,
    port: Option<u16>,
    path: Vec<Segment>,
    query: Option<Vec<(String, String)>>,
}

impl UrlPattern {
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        let source = pattern.trim();
        if source.is_empty() {
            return Err(PatternError::Empty);
        }

        let parts = split_url(source).map_err(|reason| match reason {
            SplitError::MissingHost => PatternError::MissingHost {
                pattern: source.to_string(),
            },
            SplitError::InvalidPort(port) => PatternError::InvalidPort {
                pattern: source.to_string(),
                port,
            },
        })?;

        let compile_segment = |segment: &str| -> Result<Segment, PatternError> {
            if segment == WILDCARD {
                Ok(Segment::Wildcard)
            } else if segment.contains(WILDCARD) {
                Err(PatternError::PartialWildcard {
                    pattern: source.to_string(),
                    segment: segment.to_string(),
                })
            } else {
                Ok(Segment::Literal(segment.to_string()))
            }
        };

        let host = parts
            .host
            .split('.')
            .map(compile_segment)
            .collect::<Result<Vec<_>, _>>()?;
        let path = parts
            .segments
            .iter()
            .map(|s| compile_segment(s))
            .collect::<Result<Vec<_>, _>>()?;

        let wildcards = host
            .iter()
            .chain(path.iter())
            .filter(|s| **s == Segment::Wildcard)
            .count();
        if wildcards > 1 {
            return Err(PatternError::MultipleWildcards {
                pattern: source.to_string(),
            });
        }

        let has_query = source.contains('?');
        Ok(Self {
            source: source.to_string(),
            scheme: parts.scheme,
            host,
            port: parts.port,
            path,
            query: has_query.then_some(parts.query),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn has_wildcard(&self) -> bool {
        self.host
            .iter()
            .chain(self.path.iter())
            .any(|s| *s == Segment::Wildcard)
    }

    /// Whether `url` falls under this pattern. Unparseable URLs never match.
    pub fn matches(&self, url: &str) -> bool {
        let Ok(parts) = split_url(url.trim()) else {
            return false;
        };

        if let Some(scheme) = &self.scheme
            && parts.scheme.as_deref() != Some(scheme.as_str())
        {
            return false;
        }

        if let Some(port) = self.port
            && effective_port(&parts) != Some(port)
        {
            return false;
        }

        let labels: Vec<&str> = parts.host.split('.').collect();
        if labels.len() != self.host.len()
            || !self.host.iter().zip(&labels).all(|(s, l)| s.matches(l))
        {
            return false;
        }

        if !self.path_matches(&parts.segments) {
            return false;
        }

        // Pattern query pairs must all be present; extra request pairs are fine
        match &self.query {
            None => true,
            Some(expected) => expected.iter().all(|pair| parts.query.contains(pair)),
        }
    }

    fn path_matches(&self, segments: &[String]) -> bool {
        match self.path.split_last() {
            Some((Segment::Wildcard, head)) => {
                segments.len() > head.len()
                    && head.iter().zip(segments).all(|(s, c)| s.matches(c))
            }
            _ => {
                segments.len() == self.path.len()
                    && self.path.iter().zip(segments).all(|(s, c)| s.matches(c))
            }
        }
    }
}

/// Canonical form of a concrete URL, used for exact history lookups.
///
/// Scheme and host are lowercased, a default port is dropped, an empty path
/// becomes `/` and the fragment is removed. Path and query are otherwise kept
/// as written, so a trailing slash or an extra query pair makes a different
/// URL. Returns `None` when the URL has no host.
pub fn normalize_url(url: &str) -> Option<String> {
    let parts = split_url(url.trim()).ok()?;
    let mut normalized = String::new();
    if let Some(scheme) = &parts.scheme {
        normalized.push_str(scheme);
        normalized.push_str("://");
    }
    normalized.push_str(&parts.host);
    if let Some(port) = parts.port
        && Some(port) != default_port(parts.scheme.as_deref())
    {
        normalized.push_str(&format!(":{port}"));
    }
    normalized.push_str(if parts.path.is_empty() { "/" } else { &parts.path });
    if !parts.query.is_empty() {
        let query: Vec<String> = parts
            .query
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        normalized.push('?');
        normalized.push_str(&query.join("&"));
    }
    Some(normalized)
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for UrlPattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

enum SplitError {
    MissingHost,
    InvalidPort(String),
}

fn split_url(input: &str) -> Result<UrlParts, SplitError> {
    let rest = input.split_once('#').map_or(input, |(before, _)| before);

    let (scheme, rest) = match rest.split_once("://") {
        Some((scheme, rest)) => (Some(scheme.to_ascii_lowercase()), rest),
        None => (None, rest),
    };

    let (rest, query) = match rest.split_once('?') {
        Some((rest, query)) => (rest, parse_query(query)),
        None => (rest, Vec::new()),
    };

    let (authority, path) = match rest.find('/') {
        Some(index) => (&rest[..index], &rest[index..]),
        None => (rest, ""),
    };

    // Credentials never take part in matching
    let authority = authority.rsplit_once('@').map_or(authority, |(_, a)| a);

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| SplitError::InvalidPort(port.to_string()))?;
            (host, Some(port))
        }
        None => (authority, None),
    };

    if host.is_empty() {
        return Err(SplitError::MissingHost);
    }

    let segments = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(decode)
        .collect();

    Ok(UrlParts {
        scheme,
        host: host.to_ascii_lowercase(),
        port,
        path: percent_decode_str(path).decode_utf8_lossy().into_owned(),
        segments,
        query,
    })
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (decode(key), decode(value)),
            None => (decode(pair), String::new()),
        })
        .collect()
}

fn decode(raw: &str) -> String {
    percent_decode_str(&raw.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

fn default_port(scheme: Option<&str>) -> Option<u16> {
    match scheme {
        Some("http") => Some(80),
        Some("https") => Some(443),
        _ => None,
    }
}

fn effective_port(parts: &UrlParts) -> Option<u16> {
    parts.port.or(default_port(parts.scheme.as_deref()))
}

#[cfg(test)]
mod tests {
    include!("pattern.test.rs");
}
