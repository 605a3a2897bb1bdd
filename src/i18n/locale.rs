//! Accept-Language negotiation against the configured locales.

use std::cmp::Ordering;

/// Returned only when the supported list is empty.
pub const FALLBACK_LOCALE: &str = "en";

#[derive(Debug, Clone, PartialEq)]
pub struct LanguageRange {
    pub tag: String,
    pub quality: f32,
}

impl LanguageRange {
    pub fn new(tag: impl Into<String>, quality: f32) -> Self {
        Self {
            tag: tag.into(),
            quality,
        }
    }

    fn is_wildcard(&self) -> bool {
        self.tag == "*"
    }
}

/// Parses an `Accept-Language` header into ranges ordered by preference:
/// descending quality, concrete tags before `*` at equal quality, and header
/// order otherwise. Entries with an unparseable `q` are dropped.
pub fn parse_accept_language(header: &str) -> Vec<LanguageRange> {
    let mut ranges: Vec<LanguageRange> = header
        .split(',')
        .filter_map(|part| {
            let mut pieces = part.split(';');
            let tag = pieces.next()?.trim();
            if tag.is_empty() {
                return None;
            }
            let mut quality = 1.0;
            for param in pieces {
                let param = param.trim();
                if let Some(q) = param.strip_prefix("q=").or_else(|| param.strip_prefix("Q=")) {
                    quality = q.trim().parse::<f32>().ok()?.clamp(0.0, 1.0);
                }
            }
            Some(LanguageRange::new(tag, quality))
        })
        .collect();

    ranges.sort_by(|a, b| {
        b.quality
            .partial_cmp(&a.quality)
            .unwrap_or(Ordering::Equal)
            .then(a.is_wildcard().cmp(&b.is_wildcard()))
    });
    ranges
}

fn normalize(tag: &str) -> String {
    tag.trim().replace('_', "-").to_ascii_lowercase()
}

fn primary(tag: &str) -> String {
    normalize(tag)
        .split('-')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Picks the supported locale best matching `accepted`, which must already
/// be in preference order. Exact tags are tried first, then the client's
/// primary subtag, then the server's primary subtag. Without any match the
/// first supported locale is returned.
pub fn select_locale<'a>(accepted: &[LanguageRange], supported: &'a [String]) -> &'a str {
    let exact = |client: &LanguageRange, server: &str| normalize(&client.tag) == normalize(server);
    let client_primary = |client: &LanguageRange, server: &str| primary(&client.tag) == normalize(server);
    let server_primary = |client: &LanguageRange, server: &str| normalize(&client.tag) == primary(server);

    best_match(accepted, supported, exact)
        .or_else(|| best_match(accepted, supported, client_primary))
        .or_else(|| best_match(accepted, supported, server_primary))
        .or_else(|| supported.first().map(String::as_str))
        .unwrap_or(FALLBACK_LOCALE)
}

/// Walks the server list; each supported locale is scored by the first
/// client range that accepts it. A later locale replaces the current pick
/// only with a strictly higher quality, or the same quality from a concrete
/// tag where the pick came from `*`. Equal scores keep the earlier locale.
fn best_match<'a, F>(accepted: &[LanguageRange], supported: &'a [String], matches: F) -> Option<&'a str>
where
    F: Fn(&LanguageRange, &str) -> bool,
{
    let mut best: Option<(&'a str, f32, bool)> = None;

    for server in supported {
        let Some(range) = accepted
            .iter()
            .filter(|range| range.quality > 0.0)
            .find(|range| range.is_wildcard() || matches(range, server))
        else {
            continue;
        };
        let concrete = !range.is_wildcard();

        let better = match best {
            None => true,
            Some((_, quality, was_concrete)) => {
                range.quality > quality || (range.quality == quality && concrete && !was_concrete)
            }
        };
        if better {
            best = Some((server.as_str(), range.quality, concrete));
        }
    }

    best.map(|(server, _, _)| server)
}
