use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{convert::TryFrom, fmt};

use crate::error::ValidationError;

/// Countries the pollution API is queried for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Country {
    #[serde(rename = "PL")]
    Poland,
    #[serde(rename = "DE")]
    Germany,
    #[serde(rename = "ES")]
    Spain,
    #[serde(rename = "FR")]
    France,
}

impl Country {
    pub fn code(&self) -> &'static str {
        match self {
            Country::Poland => "PL",
            Country::Germany => "DE",
            Country::Spain => "ES",
            Country::France => "FR",
        }
    }

    /// Lowercase name and adjective forms used when judging whether a text
    /// is about this country.
    pub fn relevance_terms(&self) -> &'static [&'static str] {
        match self {
            Country::Poland => &["poland", "polish"],
            Country::Germany => &["germany", "german"],
            Country::Spain => &["spain", "spanish"],
            Country::France => &["france", "french"],
        }
    }

    pub const fn all() -> &'static [Country] {
        &[
            Country::Poland,
            Country::Germany,
            Country::Spain,
            Country::France,
        ]
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<&str> for Country {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let upper = value.trim().to_uppercase();

        Country::all()
            .iter()
            .copied()
            .find(|c| c.code() == upper)
            .ok_or_else(|| {
                anyhow::anyhow!("Unknown country '{value}'. Supported countries: PL, DE, ES, FR.")
            })
    }
}

/// Bearer credential issued by the pollution API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub value: String,
    pub expires_at_epoch_secs: i64,
}

/// A city reading as delivered by the pollution API. Unknown fields are kept
/// but never inspected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCityRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub pollution: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One page of readings merged across the queried countries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollutionPage {
    pub cities: Vec<RawCityRecord>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedCity {
    pub original_name: String,
    pub lookup_name: String,
    pub country: String,
    pub pollution_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedCity {
    pub name: String,
    pub country: String,
    pub pollution: f64,
    pub description: String,
}

/// Validated request for the cities listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitiesQuery {
    pub country: Option<String>,
    pub page: u32,
    pub limit: u32,
}

impl CitiesQuery {
    pub fn new(country: Option<String>, page: u32, limit: u32) -> Result<Self, ValidationError> {
        if page == 0 {
            return Err(ValidationError::BadPagination(
                "page must be a positive integer".into(),
            ));
        }
        if limit == 0 {
            return Err(ValidationError::BadPagination(
                "limit must be a positive integer".into(),
            ));
        }

        let country = country
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        Ok(Self {
            country,
            page,
            limit,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitiesResponse {
    pub page: u32,
    pub limit: u32,
    pub total: usize,
    pub cities: Vec<EnrichedCity>,
}
