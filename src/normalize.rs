/// Field normalization for raw source records
///
/// Turns one source-specific payload into a canonical [`Lead`]:
/// 1. Resolve the organization name (or fail with `MissingIdentity`)
/// 2. Map the source's fields onto canonical fields
/// 3. Validate phones/emails/websites, dropping bad values with a warning
/// 4. Extract contacts from free text (bios, page bodies, descriptions)
/// 5. Compute derived fields (score, dedup key)
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use phonenumber::Mode;
use regex::Regex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use url::Url;
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::models::{
    FieldOrigin, GeoPoint, InstagramRawRecord, Lead, LeadField, MapsRawRecord, PostalAddress,
    RawRecord, SourceRecord, ValidationWarning, WebScrapeRawRecord,
};

static EMAIL_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email format regex")
});

static EMAIL_IN_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("email search regex")
});

/// Malaysian numbers in running text: `+60`, `0060`, `60` or trunk `0` prefix,
/// then 8-10 digits with optional single space or dash separators.
static PHONE_IN_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+60|\b0060|\b60|\b0)[ \-]?\d(?:[ \-]?\d){7,9}\b")
        .expect("phone search regex")
});

static SOCIAL_IN_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)https?://(?:www\.)?(facebook|instagram|linkedin|twitter|x)\.com/[A-Za-z0-9_.\-/]+",
    )
    .expect("social url regex")
});

static POSTAL_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{5}\b").expect("postal code regex"));

/// Case-insensitive whole-word pattern per state, searched in the original text.
static STATE_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    MALAYSIAN_STATES
        .iter()
        .map(|state| {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(state));
            (*state, Regex::new(&pattern).expect("state regex"))
        })
        .collect()
});

/// Placeholder fragments that show up in scraped or hand-typed emails.
const FAKE_EMAIL_PATTERNS: [&str; 4] = ["999999", "111111", "000000", "123456789"];

/// Legal-form tokens ignored when comparing organization names.
const LEGAL_FORM_TOKENS: [&str; 15] = [
    "sdn",
    "bhd",
    "berhad",
    "plt",
    "pte",
    "ltd",
    "limited",
    "llc",
    "inc",
    "corp",
    "corporation",
    "company",
    "co",
    "enterprise",
    "enterprises",
];

const MALAYSIAN_STATES: [&str; 16] = [
    "Johor",
    "Kedah",
    "Kelantan",
    "Kuala Lumpur",
    "Labuan",
    "Melaka",
    "Negeri Sembilan",
    "Pahang",
    "Penang",
    "Perak",
    "Perlis",
    "Putrajaya",
    "Sabah",
    "Sarawak",
    "Selangor",
    "Terengganu",
];

/// Normalizer settings.
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Calling code assumed for numbers written in national format.
    pub default_country_code: u16,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            default_country_code: 60,
        }
    }
}

/// A freshly standardized lead plus the field values that were dropped.
#[derive(Debug, Clone)]
pub struct NormalizedLead {
    pub lead: Lead,
    pub warnings: Vec<ValidationWarning>,
}

/// Maps raw source payloads onto the canonical lead schema.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Normalizes a payload retrieved just now.
    pub fn normalize(
        &self,
        payload: &Value,
        source_name: &str,
    ) -> Result<NormalizedLead, PipelineError> {
        self.normalize_at(payload, source_name, Utc::now())
    }

    /// Normalizes a payload with an explicit retrieval time.
    pub fn normalize_at(
        &self,
        payload: &Value,
        source_name: &str,
        retrieved_at: DateTime<Utc>,
    ) -> Result<NormalizedLead, PipelineError> {
        let raw = RawRecord::from_payload(source_name, payload)?;
        self.normalize_record(&raw, payload.clone(), retrieved_at)
    }

    /// Normalizes an already-typed record. `payload` is kept verbatim as provenance.
    pub fn normalize_record(
        &self,
        raw: &RawRecord,
        payload: Value,
        retrieved_at: DateTime<Utc>,
    ) -> Result<NormalizedLead, PipelineError> {
        let source = raw.source();
        let name = match raw {
            RawRecord::Maps(r) => first_present(&[&r.title, &r.name]),
            RawRecord::Instagram(r) => first_present(&[&r.full_name, &r.username]),
            RawRecord::WebScrape(r) => web_title_name(r),
        }
        .ok_or(PipelineError::MissingIdentity { source })?;

        let record = SourceRecord {
            source,
            payload,
            retrieved_at,
        };
        let mut lead = Lead::new(Uuid::new_v4(), name, record);
        let mut warnings = Vec::new();

        {
            let mut fields = FieldWriter {
                lead: &mut lead,
                origin: FieldOrigin {
                    source,
                    retrieved_at,
                },
                warnings: &mut warnings,
                country_code: self.config.default_country_code,
            };
            match raw {
                RawRecord::Maps(r) => map_maps(r, &mut fields),
                RawRecord::Instagram(r) => map_instagram(r, &mut fields),
                RawRecord::WebScrape(r) => map_web_scrape(r, &mut fields),
            }
        }

        lead.refresh_derived();

        if !warnings.is_empty() {
            tracing::warn!(
                "Normalized {} record '{}' with {} dropped value(s)",
                source,
                lead.organization_name,
                warnings.len()
            );
        }
        tracing::debug!(
            "Normalized {} record → lead {} (score {})",
            source,
            lead.id,
            lead.completeness_score
        );

        Ok(NormalizedLead { lead, warnings })
    }
}

/// Writes validated values into a lead and records where they came from.
struct FieldWriter<'a> {
    lead: &'a mut Lead,
    origin: FieldOrigin,
    warnings: &'a mut Vec<ValidationWarning>,
    country_code: u16,
}

impl FieldWriter<'_> {
    fn reject(&mut self, field: LeadField, value: &str, reason: impl Into<String>) {
        self.warnings.push(ValidationWarning {
            field,
            value: value.to_string(),
            reason: reason.into(),
        });
    }

    fn mark(&mut self, field: LeadField) {
        self.lead.field_origins.insert(field, self.origin);
    }

    fn add_phone(&mut self, raw: &str) {
        match normalize_phone(raw, self.country_code) {
            Ok(phone) => {
                self.lead.phones.insert(phone);
            }
            Err(reason) => self.reject(LeadField::Phone, raw, reason),
        }
    }

    fn add_email(&mut self, raw: &str) {
        match normalize_email(raw) {
            Ok(email) => {
                self.lead.emails.insert(email);
            }
            Err(reason) => self.reject(LeadField::Email, raw, reason),
        }
    }

    fn set_website(&mut self, raw: &str) {
        match normalize_website(raw) {
            Some(site) => {
                self.lead.website = Some(site);
                self.mark(LeadField::Website);
            }
            None => self.reject(LeadField::Website, raw, "Unparseable website URL"),
        }
    }

    fn set_address(&mut self, address: PostalAddress) {
        self.lead.address = Some(address);
        self.mark(LeadField::Address);
    }

    fn set_category(&mut self, raw: &str) {
        if let Some(category) = primary_category(raw) {
            self.lead.category = Some(category);
            self.mark(LeadField::Category);
        }
    }

    fn set_rating(&mut self, rating: f64) {
        if rating.is_finite() && (0.0..=5.0).contains(&rating) {
            self.lead.rating = Some(rating);
            self.mark(LeadField::Rating);
        } else {
            self.reject(LeadField::Rating, &rating.to_string(), "Rating outside 0-5");
        }
    }

    fn set_review_count(&mut self, count: u32) {
        self.lead.review_count = Some(count);
        self.mark(LeadField::ReviewCount);
    }

    fn set_geo(&mut self, lat: f64, lng: f64) {
        match GeoPoint::new(lat, lng) {
            Some(point) => {
                self.lead.geo = Some(point);
                self.mark(LeadField::Geo);
            }
            None => self.reject(
                LeadField::Geo,
                &format!("{},{}", lat, lng),
                "Coordinates out of range",
            ),
        }
    }

    fn add_social(&mut self, platform: &str, handle: String) {
        self.lead
            .social_handles
            .entry(platform.to_ascii_lowercase())
            .or_insert(handle);
        self.mark(LeadField::SocialHandle);
    }

    /// Pulls emails, phones and social profile links out of unstructured text.
    fn scan_text(&mut self, text: &str, with_phones: bool) {
        for email in extract_emails(text) {
            self.add_email(&email);
        }
        if with_phones {
            for phone in extract_phones(text) {
                self.add_phone(&phone);
            }
        }
        for (platform, url) in extract_social_links(text) {
            self.add_social(&platform, url);
        }
    }
}

fn map_maps(r: &MapsRawRecord, fields: &mut FieldWriter<'_>) {
    for phone in [&r.phone_number, &r.phone, &r.international_phone_number]
        .into_iter()
        .filter_map(|p| clean(p))
    {
        fields.add_phone(&phone);
    }

    if let Some(email) = clean(&r.email) {
        fields.add_email(&email);
    }
    if let Some(description) = clean(&r.description) {
        fields.scan_text(&description, false);
    }

    if let Some(site) = clean(&r.website) {
        fields.set_website(&site);
    }

    if let Some(address) = first_present(&[&r.address, &r.formatted_address]) {
        if let Some(parsed) = parse_address(&address) {
            fields.set_address(parsed);
        }
    }

    if let Some(category) = first_present(&[&r.category, &r.category_name]) {
        fields.set_category(&category);
    } else if let Some(kind) = r.types.as_ref().and_then(|types| {
        types
            .iter()
            .find(|t| !matches!(t.as_str(), "point_of_interest" | "establishment"))
    }) {
        fields.set_category(&kind.replace('_', " "));
    }

    if let Some(rating) = r.rating.or(r.total_score) {
        fields.set_rating(rating);
    }

    let review_count = r.reviews_count.or(r.user_ratings_total).or_else(|| {
        r.reviews.as_ref().and_then(|reviews| match reviews {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::Array(items) => u32::try_from(items.len()).ok(),
            _ => None,
        })
    });
    if let Some(count) = review_count {
        fields.set_review_count(count);
    }

    if let Some(loc) = &r.location {
        fields.set_geo(loc.lat, loc.lng);
    } else if let Some(coords) = &r.coordinates {
        fields.set_geo(coords.latitude, coords.longitude);
    } else if let (Some(lat), Some(lng)) = (r.latitude, r.longitude) {
        fields.set_geo(lat, lng);
    }
}

fn map_instagram(r: &InstagramRawRecord, fields: &mut FieldWriter<'_>) {
    for email in [&r.email, &r.business_email, &r.public_email]
        .into_iter()
        .filter_map(|e| clean(e))
    {
        fields.add_email(&email);
    }
    for phone in [&r.phone, &r.business_phone_number, &r.contact_phone_number]
        .into_iter()
        .filter_map(|p| clean(p))
    {
        fields.add_phone(&phone);
    }
    if let Some(bio) = clean(&r.biography) {
        fields.scan_text(&bio, true);
    }

    if let Some(site) = first_present(&[&r.website, &r.external_url]) {
        fields.set_website(&site);
    }

    if let Some(category) = first_present(&[&r.business_category, &r.category_name, &r.category])
    {
        fields.set_category(&category);
    }

    let city = clean(&r.city);
    let zip = clean(&r.zip_code);
    let address = match clean(&r.address).and_then(|a| parse_address(&a)) {
        Some(mut parsed) => {
            if city.is_some() {
                parsed.city = city;
            }
            if zip.is_some() {
                parsed.postal_code = zip;
            }
            Some(parsed)
        }
        None => city.map(|c| PostalAddress {
            line: c.clone(),
            city: Some(c),
            state: None,
            postal_code: zip,
        }),
    };
    if let Some(address) = address {
        fields.set_address(address);
    }

    if let Some(username) = clean(&r.username) {
        let handle = username.trim_start_matches('@').to_string();
        fields.add_social("instagram", format!("https://www.instagram.com/{}", handle));
    }
}

fn map_web_scrape(r: &WebScrapeRawRecord, fields: &mut FieldWriter<'_>) {
    let text = first_present(&[&r.content, &r.text, &r.body]).or_else(|| clean(&r.title));
    if let Some(text) = text {
        fields.scan_text(&text, true);
    }

    if let Some(url) = clean(&r.url) {
        fields.set_website(&url);
    }
    if let Some(category) = clean(&r.category) {
        fields.set_category(&category);
    }
    if let Some(address) = clean(&r.address).and_then(|a| parse_address(&a)) {
        fields.set_address(address);
    }
}

/// Organization name from a page title ("ABC Sdn Bhd | Home" → "ABC Sdn Bhd").
fn web_title_name(r: &WebScrapeRawRecord) -> Option<String> {
    clean(&r.title)
        .and_then(|title| {
            let head = title
                .split(" | ")
                .next()
                .and_then(|s| s.split(" - ").next())
                .and_then(|s| s.split(" – ").next())
                .unwrap_or("");
            let head = collapse_whitespace(head);
            (!head.is_empty()).then_some(head)
        })
        .or_else(|| clean(&r.site_name))
}

fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(collapse_whitespace)
        .filter(|s| !s.is_empty())
}

fn first_present(values: &[&Option<String>]) -> Option<String> {
    values.iter().find_map(|v| clean(v))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First comma-separated segment of a category string.
fn primary_category(raw: &str) -> Option<String> {
    raw.split(',')
        .map(collapse_whitespace)
        .find(|s| !s.is_empty())
}

// ============ Validation ============

/// Validate email address
///
/// Checks for:
/// - Basic email format (contains @ and .)
/// - Fake/placeholder patterns (repeated digits like 9999, 1111)
/// - Minimum length requirements
/// - Valid domain structure
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }

    for pattern in &FAKE_EMAIL_PATTERNS {
        if email.contains(pattern) {
            tracing::debug!("Rejected email with fake pattern '{}': {}", pattern, email);
            return false;
        }
    }

    EMAIL_FORMAT.is_match(email)
}

/// Lower-cases and validates an email, returning the rejection reason on failure.
pub fn normalize_email(raw: &str) -> Result<String, String> {
    let candidate = raw
        .trim()
        .trim_start_matches("mailto:")
        .trim_end_matches('.')
        .to_lowercase();

    if is_valid_email(&candidate) {
        Ok(candidate)
    } else {
        Err("Invalid email format".to_string())
    }
}

/// Validate and normalize a phone number
///
/// National-format numbers get `default_country_code`; numbers written with
/// `+` or `00` keep their own. The result is parsed with the phonenumber
/// library (port of Google's libphonenumber) and returned as E.164 digits
/// without the leading `+` (e.g. `60312345678`).
pub fn normalize_phone(raw: &str, default_country_code: u16) -> Result<String, String> {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.len() < 8 {
        return Err("Phone too short".to_string());
    }
    if digits.len() > 15 {
        return Err("Phone too long".to_string());
    }

    let code = default_country_code.to_string();
    let international = if trimmed.starts_with('+') {
        format!("+{}", digits)
    } else if let Some(rest) = digits.strip_prefix("00") {
        format!("+{}", rest)
    } else if digits.starts_with(&code) && digits.len() >= code.len() + 8 {
        format!("+{}", digits)
    } else if let Some(rest) = digits.strip_prefix('0') {
        format!("+{}{}", code, rest)
    } else {
        format!("+{}{}", code, digits)
    };

    match phonenumber::parse(None, &international) {
        Ok(number) => {
            let national_len = number.national().value().to_string().len();
            if !(6..=12).contains(&national_len) {
                return Err(format!("Implausible national number length {}", national_len));
            }
            let formatted = number.format().mode(Mode::E164).to_string();
            Ok(formatted.trim_start_matches('+').to_string())
        }
        Err(e) => Err(format!("Parse error: {:?}", e)),
    }
}

/// Normalizes a website to `host[/path]`: lower-cased, no scheme, no `www.`,
/// no trailing slash, query and fragment dropped.
pub fn normalize_website(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };
    let parsed = Url::parse(&with_scheme).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }

    let host = parsed.host_str()?.to_ascii_lowercase();
    if !host.contains('.') {
        return None;
    }
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let path = parsed.path().trim_end_matches('/').to_ascii_lowercase();

    Some(format!("{}{}", host, path))
}

/// Host part of a normalized website.
pub fn website_host(normalized: &str) -> &str {
    normalized.split('/').next().unwrap_or(normalized)
}

// ============ Free-text Extraction ============

/// All email-looking substrings, in order of appearance, duplicates collapsed.
pub fn extract_emails(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in EMAIL_IN_TEXT.find_iter(text) {
        let email = m.as_str().trim_end_matches('.').to_string();
        if !found.iter().any(|e| e.eq_ignore_ascii_case(&email)) {
            found.push(email);
        }
    }
    found
}

/// Phone-looking digit runs, in order of appearance, duplicates collapsed.
pub fn extract_phones(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in PHONE_IN_TEXT.find_iter(text) {
        let phone = m.as_str().trim().to_string();
        if !found.contains(&phone) {
            found.push(phone);
        }
    }
    found
}

/// `(platform, url)` pairs for social profile links in text.
pub fn extract_social_links(text: &str) -> Vec<(String, String)> {
    let mut found: Vec<(String, String)> = Vec::new();
    for caps in SOCIAL_IN_TEXT.captures_iter(text) {
        let platform = match caps[1].to_ascii_lowercase().as_str() {
            "x" => "twitter".to_string(),
            other => other.to_string(),
        };
        let url = caps[0].trim_end_matches(['.', '/']).to_string();
        if !found.iter().any(|(p, _)| *p == platform) {
            found.push((platform, url));
        }
    }
    found
}

// ============ Address Parsing ============

/// Splits a free-text Malaysian address into street line, city, state and postcode.
pub fn parse_address(raw: &str) -> Option<PostalAddress> {
    let address = collapse_whitespace(raw);
    if address.is_empty() {
        return None;
    }

    let postal_code = POSTAL_CODE.find(&address).map(|m| m.as_str().to_string());

    let state = STATE_PATTERNS.iter().find_map(|(state, pattern)| {
        pattern
            .find(&address)
            .map(|m| (state.to_string(), m.start()))
    });

    let strip_postcode = |s: &str| -> String {
        POSTAL_CODE
            .replace_all(s, "")
            .trim()
            .trim_matches(',')
            .trim()
            .to_string()
    };

    let city = match &state {
        Some((_, pos)) => address[..*pos]
            .trim_end_matches([',', ' '])
            .rsplit(',')
            .next()
            .map(strip_postcode)
            .filter(|s| !s.is_empty()),
        None => {
            let parts: Vec<&str> = address.split(',').collect();
            if parts.len() >= 2 {
                Some(strip_postcode(parts[parts.len() - 2])).filter(|s| !s.is_empty())
            } else {
                None
            }
        }
    };

    let line_end = match (&city, &state) {
        (Some(city), _) => address.find(city.as_str()),
        (None, Some((_, pos))) => Some(*pos),
        (None, None) => address.find(','),
    };
    let line = line_end
        .map(|end| strip_postcode(&address[..end]))
        .map(|s| s.trim_end_matches([',', ' ']).to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| address.clone());

    Some(PostalAddress {
        line,
        city,
        state: state.map(|(name, _)| name),
        postal_code,
    })
}

// ============ Identity Keys ============

/// Lower-cased organization name with punctuation and legal-form tokens removed.
pub fn normalize_org_name(name: &str) -> String {
    let lowered: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let tokens: Vec<&str> = lowered.split_whitespace().collect();
    let kept: Vec<&str> = tokens
        .iter()
        .copied()
        .filter(|t| !LEGAL_FORM_TOKENS.contains(t))
        .collect();

    if kept.is_empty() {
        tokens.join(" ")
    } else {
        kept.join(" ")
    }
}

/// Tokens of the normalized organization name used for candidate lookup.
pub fn name_tokens(name: &str) -> Vec<String> {
    normalize_org_name(name)
        .split_whitespace()
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

/// Stable lookup key: SHA-256 of normalized name, first phone and website host.
pub fn dedup_key(lead: &Lead) -> String {
    let name = normalize_org_name(&lead.organization_name);
    let phone = lead.phones.iter().next().map(String::as_str).unwrap_or("");
    let host = lead.website.as_deref().map(website_host).unwrap_or("");

    let mut hasher = Sha256::new();
    hasher.update(format!("{}|{}|{}", name, phone, host).as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_org_name_drops_legal_forms() {
        assert_eq!(normalize_org_name("ABC Engineering Sdn. Bhd."), "abc engineering");
        assert_eq!(normalize_org_name("abc engineering sdn bhd"), "abc engineering");
        assert_eq!(normalize_org_name("Enterprise"), "enterprise");
    }

    #[test]
    fn test_website_normalization() {
        assert_eq!(
            normalize_website("https://www.ABC.com.my/"),
            Some("abc.com.my".to_string())
        );
        assert_eq!(
            normalize_website("abc.com.my/contact?x=1"),
            Some("abc.com.my/contact".to_string())
        );
        assert_eq!(normalize_website("not a url"), None);
        assert_eq!(normalize_website("ftp://abc.com"), None);
        assert_eq!(website_host("abc.com.my/contact"), "abc.com.my");
    }

    #[test]
    fn test_parse_address_with_state() {
        let parsed = parse_address("No 3, Jalan Tun Razak, 40000 Shah Alam, Selangor").unwrap();
        assert_eq!(parsed.postal_code.as_deref(), Some("40000"));
        assert_eq!(parsed.state.as_deref(), Some("Selangor"));
        assert_eq!(parsed.city.as_deref(), Some("Shah Alam"));
        assert_eq!(parsed.line, "No 3, Jalan Tun Razak");
    }

    #[test]
    fn test_parse_address_federal_territory() {
        let parsed =
            parse_address("Level 5, Menara ABC, Jalan Sultan Ismail, 50250 Kuala Lumpur").unwrap();
        assert_eq!(parsed.state.as_deref(), Some("Kuala Lumpur"));
        assert_eq!(parsed.city, None);
        assert_eq!(parsed.line, "Level 5, Menara ABC, Jalan Sultan Ismail");
    }

    #[test]
    fn test_parse_address_non_ascii_before_state() {
        let parsed = parse_address("İİİİİİ Perak").unwrap();
        assert_eq!(parsed.state.as_deref(), Some("Perak"));
        assert_eq!(parsed.city.as_deref(), Some("İİİİİİ"));

        let parsed = parse_address("Jalan İstanbul, 31400 İpoh, PERAK").unwrap();
        assert_eq!(parsed.state.as_deref(), Some("Perak"));
        assert_eq!(parsed.city.as_deref(), Some("İpoh"));
        assert_eq!(parsed.postal_code.as_deref(), Some("31400"));
    }

    #[test]
    fn test_parse_address_plain() {
        let parsed = parse_address("123 Test Street").unwrap();
        assert_eq!(parsed.line, "123 Test Street");
        assert_eq!(parsed.city, None);
        assert!(parse_address("   ").is_none());
    }

    #[test]
    fn test_extract_social_links() {
        let links = extract_social_links(
            "Follow https://www.facebook.com/abceng/ and https://x.com/abceng.",
        );
        assert_eq!(
            links,
            vec![
                (
                    "facebook".to_string(),
                    "https://www.facebook.com/abceng".to_string()
                ),
                ("twitter".to_string(), "https://x.com/abceng".to_string()),
            ]
        );
    }

    #[test]
    fn test_dedup_key_ignores_case_and_legal_form() {
        let n = Normalizer::default();
        let a = n
            .normalize(&json!({"title": "ABC Engineering Sdn Bhd"}), "google_maps")
            .unwrap();
        let b = n
            .normalize(&json!({"title": "abc engineering"}), "google_maps")
            .unwrap();
        assert_eq!(a.lead.dedup_key, b.lead.dedup_key);
        assert_eq!(a.lead.dedup_key.len(), 64);
    }
}
