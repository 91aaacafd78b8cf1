//! Fetches pollution readings for one or all known countries and merges them
//! into a single page.

use futures::future::try_join_all;
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

use crate::{
    auth::Authenticator,
    cache::{SharedCache, TtlCache},
    error::UpstreamError,
    model::{Country, PollutionPage, RawCityRecord},
    source::PollutionSource,
};

#[derive(Debug)]
pub struct PollutionAggregator {
    source: Arc<dyn PollutionSource>,
    auth: Arc<Authenticator>,
    cache: SharedCache<String, PollutionPage>,
    ttl: Duration,
}

/// Resolves which countries to query. Unknown codes are skipped, not errors.
pub fn target_countries(requested: Option<&str>) -> Vec<Country> {
    let Some(code) = requested.map(str::trim).filter(|c| !c.is_empty()) else {
        return Country::all().to_vec();
    };

    match Country::try_from(code) {
        Ok(country) => vec![country],
        Err(_) => {
            warn!(country = %code.to_uppercase(), "Skipping unsupported country code");
            Vec::new()
        }
    }
}

fn cache_key(requested: Option<&str>, page: u32, limit: u32) -> String {
    let scope = requested
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| "all".to_string());

    format!("{scope}:{page}:{limit}")
}

impl PollutionAggregator {
    pub fn new(
        source: Arc<dyn PollutionSource>,
        auth: Arc<Authenticator>,
        cache: SharedCache<String, PollutionPage>,
        ttl: Duration,
    ) -> Self {
        Self {
            source,
            auth,
            cache,
            ttl,
        }
    }

    pub fn query_cache() -> SharedCache<String, PollutionPage> {
        TtlCache::shared()
    }

    /// Fetches `page` of every target country concurrently. Any failing
    /// country fails the whole call.
    pub async fn fetch_pollution_data(
        &self,
        country: Option<&str>,
        page: u32,
        limit: u32,
    ) -> Result<PollutionPage, UpstreamError> {
        let key = cache_key(country, page, limit);
        if let Some(cached) = self.cache.get(&key) {
            debug!(%key, "Pollution cache hit");
            return Ok(cached);
        }

        let targets = target_countries(country);
        let per_country =
            try_join_all(targets.iter().map(|c| self.fetch_country(*c, page, limit))).await?;

        let mut cities = Vec::new();
        let mut total: u64 = 0;
        for (records, country_total) in per_country {
            cities.extend(records);
            total = total.saturating_add(country_total);
        }

        let result = PollutionPage {
            cities,
            page,
            limit,
            total,
        };

        debug!(%key, cities = result.cities.len(), total, "Aggregated pollution data");
        self.cache.insert(key, result.clone(), self.ttl);

        Ok(result)
    }

    async fn fetch_country(
        &self,
        country: Country,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<RawCityRecord>, u64), UpstreamError> {
        let token = self.auth.get_token().await?;
        let response = self
            .source
            .fetch_country_page(&token, country, page, limit)
            .await?;

        let total = match response.meta.total_pages {
            Some(pages) => pages.saturating_mul(u64::from(limit)),
            None => response.results.len() as u64,
        };

        let records = response
            .results
            .into_iter()
            .map(|mut record| {
                record.country = Some(country.code().to_string());
                record
            })
            .collect();

        Ok((records, total))
    }
}
