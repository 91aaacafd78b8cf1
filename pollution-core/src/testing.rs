//! In-memory stand-ins for the external services, shared by unit tests.

use async_trait::async_trait;
use std::{
    collections::HashMap,
    fmt,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use crate::{
    error::{AuthError, UpstreamError},
    model::{Country, RawCityRecord},
    source::{
        CountryPage, Credentials, LoginResponse, LookupService, PageExtract, PageMeta,
        PollutionSource,
    },
};

type LoginFn = dyn Fn(usize) -> Result<LoginResponse, AuthError> + Send + Sync;
type PageFn = dyn Fn(Country, u32, u32) -> Result<CountryPage, UpstreamError> + Send + Sync;

pub struct FakePollutionSource {
    login: Box<LoginFn>,
    page: Box<PageFn>,
    login_calls: AtomicUsize,
    fetches: Mutex<Vec<(String, Country)>>,
}

impl fmt::Debug for FakePollutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakePollutionSource")
            .field("login_calls", &self.login_calls)
            .finish_non_exhaustive()
    }
}

impl FakePollutionSource {
    /// Logs in with `token-N` valid for an hour and serves empty pages.
    pub fn new() -> Self {
        Self {
            login: Box::new(|n| {
                Ok(LoginResponse {
                    token: Some(format!("token-{n}")),
                    expires_in: Some(3600),
                })
            }),
            page: Box::new(|_, _, _| Ok(page_of(1, Vec::new()))),
            login_calls: AtomicUsize::new(0),
            fetches: Mutex::new(Vec::new()),
        }
    }

    pub fn with_login<F>(mut self, login: F) -> Self
    where
        F: Fn(usize) -> Result<LoginResponse, AuthError> + Send + Sync + 'static,
    {
        self.login = Box::new(login);
        self
    }

    pub fn with_pages<F>(mut self, page: F) -> Self
    where
        F: Fn(Country, u32, u32) -> Result<CountryPage, UpstreamError> + Send + Sync + 'static,
    {
        self.page = Box::new(page);
        self
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    /// Countries fetched so far, with the bearer token each request carried.
    pub fn fetches(&self) -> Vec<(String, Country)> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl PollutionSource for FakePollutionSource {
    async fn login(&self, _credentials: &Credentials) -> Result<LoginResponse, AuthError> {
        let n = self.login_calls.fetch_add(1, Ordering::SeqCst) + 1;
        (self.login)(n)
    }

    async fn fetch_country_page(
        &self,
        token: &str,
        country: Country,
        page: u32,
        limit: u32,
    ) -> Result<CountryPage, UpstreamError> {
        self.fetches
            .lock()
            .unwrap()
            .push((token.to_string(), country));
        (self.page)(country, page, limit)
    }
}

pub fn page_of(total_pages: u64, results: Vec<RawCityRecord>) -> CountryPage {
    CountryPage {
        meta: PageMeta {
            total_pages: Some(total_pages),
        },
        results,
    }
}

pub fn raw(name: &str, pollution: serde_json::Value) -> RawCityRecord {
    RawCityRecord {
        name: Some(name.to_string()),
        pollution: Some(pollution),
        ..RawCityRecord::default()
    }
}

#[derive(Debug, Default)]
pub struct FakeLookup {
    titles: HashMap<String, String>,
    extracts: HashMap<String, String>,
    searches: Mutex<Vec<String>>,
}

impl FakeLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an article reachable from `query`.
    pub fn article(mut self, query: &str, title: &str, extract: &str) -> Self {
        self.titles.insert(query.to_string(), title.to_string());
        self.extracts.insert(title.to_string(), extract.to_string());
        self
    }

    pub fn searches(&self) -> Vec<String> {
        self.searches.lock().unwrap().clone()
    }
}

#[async_trait]
impl LookupService for FakeLookup {
    async fn search_title(&self, query: &str) -> anyhow::Result<Option<String>> {
        self.searches.lock().unwrap().push(query.to_string());
        Ok(self.titles.get(query).cloned())
    }

    async fn fetch_extract(&self, title: &str) -> anyhow::Result<Option<PageExtract>> {
        Ok(self.extracts.get(title).map(|extract| PageExtract {
            title: title.to_string(),
            extract: extract.clone(),
        }))
    }
}
