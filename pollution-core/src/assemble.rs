//! End-to-end pipeline: aggregate, normalize, enrich, sort.

use anyhow::Context;
use futures::future::join_all;
use std::{cmp::Ordering, sync::Arc};
use tracing::info;

use crate::{
    aggregator::PollutionAggregator,
    auth::Authenticator,
    cache::SharedCache,
    config::Config,
    describe::DescriptionResolver,
    error::Result,
    model::{AuthToken, CitiesQuery, CitiesResponse, EnrichedCity, NormalizedCity, PollutionPage},
    normalize::normalize,
    source::{Credentials, LookupService, PollutionApiClient, PollutionSource, WikipediaClient},
};

/// Every cache the pipeline owns, kept together so they can be cleared at once.
#[derive(Debug, Clone)]
pub struct Caches {
    pub token: SharedCache<&'static str, AuthToken>,
    pub pollution: SharedCache<String, PollutionPage>,
    pub description: SharedCache<String, String>,
}

impl Caches {
    pub fn new() -> Self {
        Self {
            token: Authenticator::token_cache(),
            pollution: PollutionAggregator::query_cache(),
            description: DescriptionResolver::description_cache(),
        }
    }

    pub fn clear_all(&self) {
        self.token.clear();
        self.pollution.clear();
        self.description.clear();
    }
}

impl Default for Caches {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct CitiesService {
    aggregator: PollutionAggregator,
    resolver: DescriptionResolver,
    caches: Caches,
}

impl CitiesService {
    pub fn new(
        source: Arc<dyn PollutionSource>,
        lookup: Arc<dyn LookupService>,
        config: &Config,
        caches: Caches,
    ) -> Self {
        let credentials = Credentials {
            username: config.upstream.username.clone(),
            password: config.upstream.password.clone(),
        };

        let auth = Arc::new(Authenticator::new(
            source.clone(),
            credentials,
            caches.token.clone(),
            &config.cache,
        ));

        let aggregator = PollutionAggregator::new(
            source,
            auth,
            caches.pollution.clone(),
            config.cache.pollution_ttl(),
        );

        let resolver = DescriptionResolver::new(
            lookup,
            caches.description.clone(),
            config.cache.description_ttl(),
        );

        Self {
            aggregator,
            resolver,
            caches,
        }
    }

    /// Builds the service with the HTTP clients described by `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let source = Arc::new(PollutionApiClient::new(config.upstream.base_url.clone()));
        let lookup = Arc::new(
            WikipediaClient::new(config.lookup.api_url.clone(), &config.lookup.user_agent)
                .context("Failed to create lookup client")?,
        );

        Ok(Self::new(source, lookup, config, Caches::new()))
    }

    pub fn caches(&self) -> &Caches {
        &self.caches
    }

    pub async fn cities(&self, query: &CitiesQuery) -> Result<CitiesResponse> {
        let page = self
            .aggregator
            .fetch_pollution_data(query.country.as_deref(), query.page, query.limit)
            .await?;

        let candidates: Vec<NormalizedCity> = page.cities.iter().filter_map(normalize).collect();
        let fetched = page.cities.len();

        let enriched = join_all(candidates.into_iter().map(|city| self.enrich(city)))
            .await
            .into_iter()
            .flatten()
            .collect();

        let cities = sort_cities(enriched);
        info!(
            country = query.country.as_deref().unwrap_or("all"),
            page = query.page,
            limit = query.limit,
            fetched,
            returned = cities.len(),
            "Assembled cities response"
        );

        Ok(CitiesResponse {
            page: query.page,
            limit: query.limit,
            total: cities.len(),
            cities,
        })
    }

    async fn enrich(&self, city: NormalizedCity) -> Option<EnrichedCity> {
        let description = self
            .resolver
            .resolve(&city.original_name, &city.country, &city.lookup_name)
            .await?;

        Some(EnrichedCity {
            name: city.original_name,
            country: city.country,
            pollution: city.pollution_value,
            description,
        })
    }
}

/// Highest pollution first; equal values ordered by name.
pub fn sort_cities(mut cities: Vec<EnrichedCity>) -> Vec<EnrichedCity> {
    cities.sort_by(|a, b| match b.pollution.total_cmp(&a.pollution) {
        Ordering::Equal => a.name.cmp(&b.name),
        other => other,
    });
    cities
}
