//! A permissive `Accept` header parser.
//!
//! Items are whatever runs of characters sit between commas, with an optional `;q=` quality.
//! Nothing is rejected: `q=0.3` on its own becomes an item too. Clients that build sloppy
//! headers get the same answer every time.
//!
//! Membership ignores quality and `*/*` or `type/*` wildcards match in both directions. A
//! missing header accepts nothing.

use once_cell::sync::Lazy;
use regex::Regex;

static ACCEPT_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^\s;,]+)(?:[^,]*?;\s*q=(\d*(?:\.\d+)?))?").expect("accept item pattern is valid"));

/// The parsed items of an `Accept` header, best first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MimeAccept {
    items: Vec<(String, f64)>,
}

impl MimeAccept {
    pub fn parse(header: Option<&str>) -> Self {
        let Some(header) = header.filter(|value| !value.is_empty()) else {
            return Self::default();
        };

        let mut items: Vec<(String, f64)> = ACCEPT_ITEM
            .captures_iter(header)
            .map(|captures| {
                let value = captures[1].to_owned();
                let quality = captures
                    .get(2)
                    .map(|quality| quality.as_str())
                    .filter(|quality| !quality.is_empty())
                    .and_then(|quality| quality.parse::<f64>().ok())
                    .map_or(1.0, |quality| quality.clamp(0.0, 1.0));
                (value, quality)
            })
            .collect();

        // highest quality first, ties broken by the value itself, descending
        items.sort_by(|(a_value, a_quality), (b_value, b_quality)| {
            b_quality.total_cmp(a_quality).then_with(|| b_value.cmp(a_value))
        });

        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The item with the highest quality.
    pub fn best(&self) -> Option<&str> {
        self.items.first().map(|(value, _)| value.as_str())
    }

    /// Whether any item matches `mime`, whatever its quality.
    pub fn contains(&self, mime: &str) -> bool {
        let Some(wanted) = normalize(mime) else {
            return false;
        };
        self.items.iter().filter_map(|(item, _)| normalize(item)).any(|item| matches(&item, &wanted))
    }

    pub fn accept_json(&self) -> bool {
        self.contains(mime::APPLICATION_JSON.essence_str())
    }

    pub fn accept_html(&self) -> bool {
        self.contains(mime::TEXT_HTML.essence_str()) || self.contains("application/xhtml+xml") || self.contains("application/xml")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.items.iter().map(|(value, quality)| (value.as_str(), *quality))
    }
}

/// Splits `type/subtype`, lowercased. Values without a slash and wildcard types with a
/// concrete subtype never match.
fn normalize(value: &str) -> Option<(String, String)> {
    let value = value.to_ascii_lowercase();
    let (ty, subtype) = value.split_once('/')?;
    if ty == "*" && subtype != "*" {
        return None;
    }
    Some((ty.to_owned(), subtype.to_owned()))
}

fn matches(item: &(String, String), wanted: &(String, String)) -> bool {
    let (item_type, item_subtype) = item;
    let (wanted_type, wanted_subtype) = wanted;

    let any = |ty: &str, subtype: &str| ty == "*" && subtype == "*";
    if any(item_type, item_subtype) || any(wanted_type, wanted_subtype) {
        return true;
    }

    item_type == wanted_type && (item_subtype == "*" || wanted_subtype == "*" || item_subtype == wanted_subtype)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_order() {
        let accept = MimeAccept::parse(Some("text/plain;q=0.5, text/html, application/json;q=0.9"));
        let items: Vec<_> = accept.iter().collect();
        assert_eq!(items, vec![("text/html", 1.0), ("application/json", 0.9), ("text/plain", 0.5)]);
        assert_eq!(accept.best(), Some("text/html"));
    }

    #[test]
    fn quality_is_clamped() {
        let accept = MimeAccept::parse(Some("text/xml;q=7, text/csv;q=, text/plain;q=0"));
        let items: Vec<_> = accept.iter().collect();
        assert_eq!(items, vec![("text/xml", 1.0), ("text/csv", 1.0), ("text/plain", 0.0)]);
    }

    #[test]
    fn equal_quality_sorts_by_value_descending() {
        let accept = MimeAccept::parse(Some("text/html, application/json"));
        assert_eq!(accept.best(), Some("text/html"));
    }

    #[test]
    fn sloppy_items_are_kept() {
        let accept = MimeAccept::parse(Some("application/json,q=0.3;text/morse,q=0.5"));
        let mut values: Vec<_> = accept.iter().map(|(value, _)| value).collect();
        values.sort_unstable();
        assert_eq!(values, vec!["application/json", "q=0.3", "q=0.5", "text/morse"]);
        assert!(accept.contains("text/morse"));
        assert!(accept.accept_json());
        assert!(!accept.accept_html());
    }

    #[test]
    fn missing_header_accepts_nothing() {
        for accept in [MimeAccept::parse(None), MimeAccept::parse(Some(""))] {
            assert!(accept.is_empty());
            assert!(!accept.contains("text/morse"));
            assert!(!accept.accept_json());
            assert_eq!(accept.best(), None);
        }
    }

    #[test]
    fn wildcards() {
        let everything = MimeAccept::parse(Some("*/*"));
        assert!(everything.contains("text/csv"));
        assert!(everything.accept_html());

        let text = MimeAccept::parse(Some("text/*"));
        assert!(text.contains("text/morse"));
        assert!(!text.accept_json());
        assert!(text.accept_html());

        let application = MimeAccept::parse(Some("application/*"));
        assert!(application.accept_json());
        assert!(application.accept_html());
        assert!(!application.contains("text/csv"));

        assert!(!MimeAccept::parse(Some("*/json")).accept_json());
        assert!(!MimeAccept::parse(Some("json")).accept_json());
        assert!(!MimeAccept::parse(Some("*")).accept_json());
    }

    #[test]
    fn membership_ignores_quality_and_case() {
        let accept = MimeAccept::parse(Some("Application/JSON;q=0"));
        assert!(accept.accept_json());
    }
}
