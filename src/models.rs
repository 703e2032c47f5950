use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::classifier::{Classification, TargetingStrategy};
use crate::errors::PipelineError;

// ============ Sources ============

/// Upstream producer a raw record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Google-Maps-shaped place payloads.
    GoogleMaps,
    /// Instagram business profile payloads.
    Instagram,
    /// Free-text web page extraction.
    WebScrape,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [
        SourceKind::GoogleMaps,
        SourceKind::Instagram,
        SourceKind::WebScrape,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::GoogleMaps => "google_maps",
            SourceKind::Instagram => "instagram",
            SourceKind::WebScrape => "web_scrape",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google_maps" | "googlemaps" | "gmaps" | "maps" => Ok(SourceKind::GoogleMaps),
            "instagram" | "ig" => Ok(SourceKind::Instagram),
            "web_scrape" | "web_browser" | "web" | "webscrape" => Ok(SourceKind::WebScrape),
            other => Err(PipelineError::UnknownSource(other.to_string())),
        }
    }
}

// ============ Lead Model ============

/// Canonical lead fields that carry a single resolved value.
///
/// Used as the key of [`Lead::field_origins`] and in validation warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadField {
    OrganizationName,
    ContactName,
    Role,
    Email,
    Phone,
    Website,
    Address,
    Geo,
    Category,
    Rating,
    ReviewCount,
    SocialHandle,
}

impl LeadField {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadField::OrganizationName => "organization_name",
            LeadField::ContactName => "contact_name",
            LeadField::Role => "role",
            LeadField::Email => "email",
            LeadField::Phone => "phone",
            LeadField::Website => "website",
            LeadField::Address => "address",
            LeadField::Geo => "geo",
            LeadField::Category => "category",
            LeadField::Rating => "rating",
            LeadField::ReviewCount => "review_count",
            LeadField::SocialHandle => "social_handle",
        }
    }
}

impl fmt::Display for LeadField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which source supplied a resolved single-value field, and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOrigin {
    pub source: SourceKind,
    pub retrieved_at: DateTime<Utc>,
}

/// Latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// Builds a point, rejecting non-finite or out-of-range coordinates.
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        if lat.is_finite() && lng.is_finite() && lat.abs() <= 90.0 && lng.abs() <= 180.0 {
            Some(Self { lat, lng })
        } else {
            None
        }
    }
}

/// Postal address split into the parts the classifier and stats care about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalAddress {
    /// Street portion (or the whole address when it could not be split).
    pub line: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
}

/// One raw payload that contributed to a lead. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub source: SourceKind,
    pub payload: Value,
    pub retrieved_at: DateTime<Utc>,
}

/// Canonical record for one real-world business contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    /// Assigned at first standardization, preserved through merges.
    pub id: Uuid,
    /// `retrieved_at` of the earliest contributing record.
    pub created_at: DateTime<Utc>,
    pub organization_name: String,
    pub contact_name: Option<String>,
    pub role: Option<String>,
    /// Lower-cased, validated addresses.
    pub emails: BTreeSet<String>,
    /// Digits only, country-code prefixed.
    pub phones: BTreeSet<String>,
    /// `host[/path]` without scheme, `www.` or trailing slash.
    pub website: Option<String>,
    pub address: Option<PostalAddress>,
    pub geo: Option<GeoPoint>,
    pub category: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
    /// Platform name -> handle or profile URL.
    pub social_handles: BTreeMap<String, String>,
    pub source_records: Vec<SourceRecord>,
    pub field_origins: BTreeMap<LeadField, FieldOrigin>,
    pub completeness_score: u8,
    pub dedup_key: String,
}

impl Lead {
    /// Creates a lead holding only its identity and the record it came from.
    ///
    /// Callers fill the remaining fields and must call [`Lead::refresh_derived`]
    /// before handing the lead to anyone else.
    pub fn new(id: Uuid, organization_name: impl Into<String>, record: SourceRecord) -> Self {
        let created_at = record.retrieved_at;
        let origin = FieldOrigin {
            source: record.source,
            retrieved_at: record.retrieved_at,
        };
        let mut field_origins = BTreeMap::new();
        field_origins.insert(LeadField::OrganizationName, origin);

        let mut lead = Self {
            id,
            created_at,
            organization_name: organization_name.into(),
            contact_name: None,
            role: None,
            emails: BTreeSet::new(),
            phones: BTreeSet::new(),
            website: None,
            address: None,
            geo: None,
            category: None,
            rating: None,
            review_count: None,
            social_handles: BTreeMap::new(),
            source_records: vec![record],
            field_origins,
            completeness_score: 0,
            dedup_key: String::new(),
        };
        lead.refresh_derived();
        lead
    }

    /// Recomputes `completeness_score` and `dedup_key` from the current fields.
    pub fn refresh_derived(&mut self) {
        self.completeness_score = crate::scoring::score(self);
        self.dedup_key = crate::normalize::dedup_key(self);
    }

    /// Retrieval time of the earliest source record.
    pub fn first_retrieved_at(&self) -> DateTime<Utc> {
        self.source_records
            .iter()
            .map(|r| r.retrieved_at)
            .min()
            .unwrap_or(self.created_at)
    }

    /// Sources that contributed to this lead, deduplicated.
    pub fn sources(&self) -> Vec<SourceKind> {
        let set: BTreeSet<SourceKind> = self.source_records.iter().map(|r| r.source).collect();
        set.into_iter().collect()
    }

    /// Source URLs seen in raw payloads (`url`, `website`, `external_url`).
    pub fn source_urls(&self) -> Vec<String> {
        let mut urls = Vec::new();
        for record in &self.source_records {
            for key in ["url", "website", "external_url"] {
                if let Some(url) = record.payload.get(key).and_then(|v| v.as_str()) {
                    if !url.trim().is_empty() && !urls.iter().any(|u| u == url) {
                        urls.push(url.to_string());
                    }
                }
            }
        }
        urls
    }
}

// ============ Raw Source Records ============

/// Maps-shaped place payload. Each field is one row of the source's mapping table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapsRawRecord {
    pub title: Option<String>,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub phone: Option<String>,
    pub international_phone_number: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub formatted_address: Option<String>,
    pub category: Option<String>,
    pub category_name: Option<String>,
    pub types: Option<Vec<String>>,
    pub rating: Option<f64>,
    pub total_score: Option<f64>,
    pub reviews_count: Option<u32>,
    pub user_ratings_total: Option<u32>,
    /// Either a count or the review list itself, depending on the producer.
    pub reviews: Option<Value>,
    pub location: Option<MapsLatLng>,
    pub coordinates: Option<MapsCoordinates>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub email: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapsLatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapsCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Instagram business-profile payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstagramRawRecord {
    pub username: Option<String>,
    #[serde(alias = "fullName")]
    pub full_name: Option<String>,
    pub biography: Option<String>,
    pub email: Option<String>,
    pub business_email: Option<String>,
    pub public_email: Option<String>,
    pub phone: Option<String>,
    pub business_phone_number: Option<String>,
    pub contact_phone_number: Option<String>,
    pub website: Option<String>,
    pub external_url: Option<String>,
    pub business_category: Option<String>,
    pub category_name: Option<String>,
    pub category: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
}

/// Web page extraction payload: mostly unstructured text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebScrapeRawRecord {
    pub url: Option<String>,
    pub title: Option<String>,
    pub site_name: Option<String>,
    pub content: Option<String>,
    pub text: Option<String>,
    pub body: Option<String>,
    pub category: Option<String>,
    pub address: Option<String>,
}

/// Source-specific raw payload, typed per producer.
#[derive(Debug, Clone)]
pub enum RawRecord {
    Maps(MapsRawRecord),
    Instagram(InstagramRawRecord),
    WebScrape(WebScrapeRawRecord),
}

impl RawRecord {
    /// Parses an untyped payload according to the named source's mapping table.
    pub fn from_payload(source_name: &str, payload: &Value) -> Result<Self, PipelineError> {
        let source: SourceKind = source_name.parse()?;
        let invalid = |e: serde_json::Error| PipelineError::InvalidPayload {
            source,
            message: e.to_string(),
        };

        match source {
            SourceKind::GoogleMaps => serde_json::from_value(payload.clone())
                .map(RawRecord::Maps)
                .map_err(invalid),
            SourceKind::Instagram => serde_json::from_value(payload.clone())
                .map(RawRecord::Instagram)
                .map_err(invalid),
            SourceKind::WebScrape => serde_json::from_value(payload.clone())
                .map(RawRecord::WebScrape)
                .map_err(invalid),
        }
    }

    pub fn source(&self) -> SourceKind {
        match self {
            RawRecord::Maps(_) => SourceKind::GoogleMaps,
            RawRecord::Instagram(_) => SourceKind::Instagram,
            RawRecord::WebScrape(_) => SourceKind::WebScrape,
        }
    }
}

// ============ Validation / Review Warnings ============

/// A field value dropped during normalization because it failed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub field: LeadField,
    pub value: String,
    pub reason: String,
}

/// A pair of leads whose match confidence fell in the review band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbiguousMatchWarning {
    pub lead_id: Uuid,
    pub candidate_id: Uuid,
    pub lead_name: String,
    pub candidate_name: String,
    pub confidence: f64,
    pub detected_at: DateTime<Utc>,
}

// ============ API Request/Response Models ============

/// One raw record as delivered by an upstream producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRecord {
    /// Source name, e.g. `google_maps`, `instagram`, `web_scrape`.
    pub source: String,
    pub payload: Value,
    /// Defaults to the time the batch is processed.
    #[serde(default)]
    pub retrieved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub records: Vec<IngestRecord>,
}

/// Query parameters for listing leads.
#[derive(Debug, Default, Deserialize)]
pub struct LeadQueryParams {
    pub min_score: Option<u8>,
    pub tier: Option<String>,
    pub limit: Option<usize>,
}

/// Lead plus the outputs the outreach stage consumes.
#[derive(Debug, Clone, Serialize)]
pub struct LeadDetail {
    pub lead: Lead,
    pub classification: Classification,
    pub targeting: TargetingStrategy,
}
