//! City descriptions from the lookup service.
//!
//! A cascade of queries is tried from most to least specific. Each fetched
//! extract must pass three heuristic checks before it is accepted:
//!
//! - no disqualifying keyword in the description or the article title
//! - the country is mentioned (name, adjective or code)
//! - the city itself is mentioned (original or lookup name)
//!
//! Accepted descriptions are cached per query string.

use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

use crate::{
    cache::{SharedCache, TtlCache},
    model::Country,
    source::LookupService,
};

pub const MAX_DESCRIPTION_CHARS: usize = 250;
const ELLIPSIS: &str = "...";

/// Substrings marking an article as something other than a city.
pub const NEGATIVE_KEYWORDS: &[&str] = &[
    "(disambiguation)",
    "may refer to",
    "film",
    "album",
    "species",
    "organization",
    "military",
    "medical",
    "political",
    "software",
    "fictional",
    "geological",
    "mountain",
    "volcano",
];

#[derive(Debug)]
pub struct DescriptionResolver {
    lookup: Arc<dyn LookupService>,
    cache: SharedCache<String, String>,
    ttl: Duration,
}

impl DescriptionResolver {
    pub fn new(
        lookup: Arc<dyn LookupService>,
        cache: SharedCache<String, String>,
        ttl: Duration,
    ) -> Self {
        Self { lookup, cache, ttl }
    }

    pub fn description_cache() -> SharedCache<String, String> {
        TtlCache::shared()
    }

    /// Returns the first accepted description for the city, or `None` when
    /// every query in the cascade comes up empty.
    pub async fn resolve(
        &self,
        original_name: &str,
        country: &str,
        lookup_name: &str,
    ) -> Option<String> {
        for query in query_cascade(original_name, country, lookup_name) {
            if let Some(cached) = self.cache.get(&query) {
                debug!(%query, "Description cache hit");
                return Some(cached);
            }

            let Some((description, title)) = self.fetch(&query).await else {
                continue;
            };

            if is_acceptable(&description, &title, original_name, country, lookup_name) {
                debug!(%query, %title, "Accepted description");
                self.cache.insert(query, description.clone(), self.ttl);
                return Some(description);
            }

            debug!(%query, %title, "Rejected description as irrelevant");
        }

        debug!(original_name, country, "No relevant description found");
        None
    }

    async fn fetch(&self, query: &str) -> Option<(String, String)> {
        let title = match self.lookup.search_title(query).await {
            Ok(Some(title)) => title,
            Ok(None) => return None,
            Err(e) => {
                warn!(query, error = %e, "Description search failed");
                return None;
            }
        };

        match self.lookup.fetch_extract(&title).await {
            Ok(Some(page)) => {
                let description = summarize(&page.extract);
                (!description.is_empty()).then_some((description, page.title))
            }
            Ok(None) => None,
            Err(e) => {
                warn!(query, %title, error = %e, "Description extract failed");
                None
            }
        }
    }
}

/// Queries to try, most specific first. Repeats are skipped.
pub fn query_cascade(original_name: &str, country: &str, lookup_name: &str) -> Vec<String> {
    let candidates = [
        format!("{original_name}, {country}"),
        format!("{lookup_name}, {country}"),
        original_name.to_string(),
        lookup_name.to_string(),
    ];

    let mut queries: Vec<String> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !queries.contains(&candidate) {
            queries.push(candidate);
        }
    }
    queries
}

pub fn is_acceptable(
    description: &str,
    title: &str,
    original_name: &str,
    country: &str,
    lookup_name: &str,
) -> bool {
    let lower_description = description.to_lowercase();
    let lower_title = title.to_lowercase();
    let mentions =
        |needle: &str| lower_description.contains(needle) || lower_title.contains(needle);

    let disqualified = NEGATIVE_KEYWORDS.iter().any(|&kw| mentions(kw));
    if disqualified {
        return false;
    }

    let country_terms = Country::try_from(country)
        .map(|c| c.relevance_terms())
        .unwrap_or_default();
    let mentions_country = country_terms.iter().any(|&term| mentions(term))
        || contains_code(description, country)
        || contains_code(title, country);

    let mentions_city =
        mentions(&original_name.to_lowercase()) || mentions(&lookup_name.to_lowercase());

    mentions_country && mentions_city
}

/// Case-sensitive whole-word match, so "ES" never matches inside "States".
fn contains_code(text: &str, code: &str) -> bool {
    let code = code.trim();
    !code.is_empty()
        && text
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| word == code)
}

/// Shortens an article extract to its first sentence (or first line), capped
/// at [`MAX_DESCRIPTION_CHARS`] including the ellipsis.
pub fn summarize(extract: &str) -> String {
    let text = extract.trim();
    let first = first_sentence(text)
        .or_else(|| text.lines().next())
        .unwrap_or_default()
        .trim();

    truncate_at_word(first, MAX_DESCRIPTION_CHARS)
}

fn first_sentence(text: &str) -> Option<&str> {
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let at_boundary = chars.peek().is_none_or(|(_, next)| next.is_whitespace());
            if at_boundary {
                return Some(&text[..idx + c.len_utf8()]);
            }
        }
    }

    None
}

fn truncate_at_word(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let window = max_chars - ELLIPSIS.len();
    let end = text
        .char_indices()
        .nth(window)
        .map_or(text.len(), |(idx, _)| idx);
    let prefix = &text[..end];

    let cut = match prefix.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => &prefix[..pos],
        _ => prefix,
    };

    format!("{}{ELLIPSIS}", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeLookup;

    fn resolver(lookup: Arc<FakeLookup>) -> DescriptionResolver {
        DescriptionResolver::new(
            lookup,
            DescriptionResolver::description_cache(),
            Duration::from_secs(3600),
        )
    }

    #[test]
    fn cascade_is_most_specific_first() {
        assert_eq!(
            query_cascade("wArSAW (Capital)", "PL", "Warsaw"),
            vec![
                "wArSAW (Capital), PL",
                "Warsaw, PL",
                "wArSAW (Capital)",
                "Warsaw",
            ]
        );
    }

    #[test]
    fn cascade_skips_repeated_queries() {
        assert_eq!(
            query_cascade("Warsaw", "PL", "Warsaw"),
            vec!["Warsaw, PL", "Warsaw"]
        );
    }

    #[test]
    fn accepts_city_article_mentioning_country() {
        assert!(is_acceptable(
            "Warsaw is the capital and largest city of Poland.",
            "Warsaw",
            "wArSAW (Capital)",
            "PL",
            "Warsaw",
        ));
    }

    #[test]
    fn country_adjective_is_enough() {
        assert!(is_acceptable(
            "Lyon is the third-largest French city.",
            "Lyon",
            "Lyon",
            "FR",
            "Lyon",
        ));
    }

    #[test]
    fn disambiguation_is_always_rejected() {
        assert!(!is_acceptable(
            "Warsaw is the capital of Poland.",
            "Warsaw (disambiguation)",
            "Warsaw",
            "PL",
            "Warsaw",
        ));
        assert!(!is_acceptable(
            "Warsaw (disambiguation) Warsaw, Poland",
            "Warsaw",
            "Warsaw",
            "PL",
            "Warsaw",
        ));
    }

    #[test]
    fn negative_keyword_in_title_rejects() {
        assert!(!is_acceptable(
            "Berlin is a German drama set in Germany.",
            "Berlin (film)",
            "Berlin",
            "DE",
            "Berlin",
        ));
    }

    #[test]
    fn requires_both_country_and_city_mentions() {
        assert!(!is_acceptable(
            "Springfield is a city in Illinois.",
            "Springfield",
            "Springfield",
            "DE",
            "Springfield",
        ));
        assert!(!is_acceptable(
            "Germany is a country in Central Europe.",
            "Germany",
            "Gdansk",
            "DE",
            "Gdansk",
        ));
    }

    #[test]
    fn country_code_inside_ordinary_words_does_not_count() {
        assert!(!is_acceptable(
            "Springfield is a city in the United States.",
            "Springfield",
            "Springfield",
            "ES",
            "Springfield",
        ));
        assert!(!is_acceptable(
            "Paris is a city in Lamar County, Texas, about 100 miles from Dallas.",
            "Paris, Texas",
            "Paris",
            "FR",
            "Paris",
        ));
        assert!(!is_acceptable(
            "Gdansk is a port city in a place called pl.",
            "Gdansk",
            "Gdansk",
            "PL",
            "Gdansk",
        ));
    }

    #[test]
    fn standalone_country_code_counts() {
        assert!(is_acceptable(
            "Gdansk (PL) is a port city on the Baltic coast.",
            "Gdansk",
            "Gdansk",
            "PL",
            "Gdansk",
        ));
        assert!(is_acceptable(
            "Bilbao is a city.",
            "Bilbao, ES",
            "Bilbao",
            "ES",
            "Bilbao",
        ));
    }

    #[test]
    fn summarize_keeps_first_sentence() {
        assert_eq!(
            summarize("Kraków is a city in Poland. It has a long history."),
            "Kraków is a city in Poland."
        );
        assert_eq!(summarize("Version 2.5 of Bonn\nsecond line"), "Version 2.5 of Bonn");
    }

    #[test]
    fn summarize_truncates_at_word_boundary() {
        let long = format!("{} end.", "word ".repeat(80));
        let summary = summarize(&long);

        assert!(summary.ends_with("..."));
        assert!(summary.chars().count() <= MAX_DESCRIPTION_CHARS);
        assert!(!summary.trim_end_matches("...").ends_with(' '));
        assert!(summary.trim_end_matches("...").ends_with("word"));
    }

    #[tokio::test]
    async fn cascade_stops_at_first_accepted_candidate() {
        let lookup = Arc::new(
            FakeLookup::new()
                .article(
                    "Warsaw, PL",
                    "Warsaw",
                    "Warsaw is the capital of Poland. It lies on the Vistula.",
                )
                .article(
                    "Warsaw",
                    "Warsaw (song)",
                    "Warsaw is a city in Poland, queried too late.",
                ),
        );
        let resolver = resolver(lookup.clone());

        let description = resolver.resolve("Warsaw", "PL", "Warsaw").await;

        assert_eq!(description.as_deref(), Some("Warsaw is the capital of Poland."));
        assert_eq!(lookup.searches(), vec!["Warsaw, PL"]);
    }

    #[tokio::test]
    async fn falls_through_rejected_candidates() {
        let lookup = Arc::new(
            FakeLookup::new()
                .article("Nice, FR", "Nice (disambiguation)", "Nice may refer to several places.")
                .article("Nice", "Nice", "Nice is a city on the French Riviera."),
        );
        let resolver = resolver(lookup.clone());

        let description = resolver.resolve("Nice", "FR", "Nice").await;

        assert_eq!(description.as_deref(), Some("Nice is a city on the French Riviera."));
        assert_eq!(lookup.searches(), vec!["Nice, FR", "Nice"]);
    }

    #[tokio::test]
    async fn cached_description_short_circuits_lookup() {
        let lookup = Arc::new(FakeLookup::new());
        let cache = DescriptionResolver::description_cache();
        cache.insert(
            "Warsaw, PL".to_string(),
            "Cached Warsaw description.".to_string(),
            Duration::from_secs(60),
        );
        let resolver = DescriptionResolver::new(lookup.clone(), cache, Duration::from_secs(3600));

        let description = resolver.resolve("wArSAW (Capital)", "PL", "Warsaw").await;

        assert_eq!(description.as_deref(), Some("Cached Warsaw description."));
        assert_eq!(lookup.searches(), vec!["wArSAW (Capital), PL"]);
    }

    #[tokio::test]
    async fn accepted_description_is_cached_under_query() {
        let lookup = Arc::new(FakeLookup::new().article(
            "Madrid, ES",
            "Madrid",
            "Madrid is the capital of Spain.",
        ));
        let cache = DescriptionResolver::description_cache();
        let resolver =
            DescriptionResolver::new(lookup.clone(), cache.clone(), Duration::from_secs(3600));

        resolver.resolve("Madrid", "ES", "Madrid").await;
        resolver.resolve("Madrid", "ES", "Madrid").await;

        assert_eq!(
            cache.get(&"Madrid, ES".to_string()).as_deref(),
            Some("Madrid is the capital of Spain.")
        );
        assert_eq!(lookup.searches().len(), 1);
    }

    #[tokio::test]
    async fn exhausted_cascade_returns_none() {
        let lookup = Arc::new(FakeLookup::new());
        let resolver = resolver(lookup.clone());

        assert_eq!(resolver.resolve("Atlantis", "ES", "Atlantis").await, None);
        assert_eq!(lookup.searches().len(), 2);
    }
}
