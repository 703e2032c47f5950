/// Identity matching
///
/// Candidate generation is key-based: leads are indexed by normalized name
/// token, phone, website host and dedup key, and a new lead is only compared
/// against leads sharing at least one key. Each candidate then gets a
/// confidence from weighted signals and a decision from two thresholds.
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use uuid::Uuid;

use crate::models::{GeoPoint, Lead};
use crate::normalize::{name_tokens, normalize_org_name, website_host};

/// Signal weights and decision thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchConfig {
    pub phone_weight: f64,
    pub website_weight: f64,
    pub name_weight: f64,
    /// Name similarity below this contributes nothing.
    pub name_floor: f64,
    pub geo_weight: f64,
    /// Full geo weight within this distance.
    pub geo_full_km: f64,
    /// No geo weight beyond this distance.
    pub geo_zero_km: f64,
    pub category_weight: f64,
    /// At or above: merge automatically.
    pub high_threshold: f64,
    /// At or above (and below `high_threshold`): report for review.
    pub low_threshold: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            phone_weight: 0.60,
            website_weight: 0.45,
            name_weight: 0.35,
            name_floor: 0.8,
            geo_weight: 0.15,
            geo_full_km: 0.5,
            geo_zero_km: 2.0,
            category_weight: 0.05,
            high_threshold: 0.75,
            low_threshold: 0.40,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchDecision {
    AutoMerge,
    PossibleDuplicate,
}

/// Per-signal breakdown of a confidence value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchSignals {
    pub phone: bool,
    pub website: bool,
    pub name_similarity: f64,
    pub distance_km: Option<f64>,
    pub category: bool,
}

#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub lead: &'a Lead,
    pub confidence: f64,
    pub decision: MatchDecision,
    pub signals: MatchSignals,
}

// ============ Scoring ============

/// Confidence that `a` and `b` describe the same organization, capped at 1.0.
pub fn match_confidence(a: &Lead, b: &Lead, config: &MatchConfig) -> (f64, MatchSignals) {
    let phone = a.phones.iter().any(|p| b.phones.contains(p));
    let website = match (a.website.as_deref(), b.website.as_deref()) {
        (Some(x), Some(y)) => website_host(x) == website_host(y),
        _ => false,
    };
    let name_similarity = name_similarity(&a.organization_name, &b.organization_name);
    let distance_km = match (a.geo, b.geo) {
        (Some(x), Some(y)) => Some(haversine_km(x, y)),
        _ => None,
    };
    let category = match (a.category.as_deref(), b.category.as_deref()) {
        (Some(x), Some(y)) => x.trim().eq_ignore_ascii_case(y.trim()),
        _ => false,
    };

    let mut confidence = 0.0;
    if phone {
        confidence += config.phone_weight;
    }
    if website {
        confidence += config.website_weight;
    }
    if name_similarity >= config.name_floor {
        confidence += config.name_weight * name_similarity;
    }
    if let Some(km) = distance_km {
        confidence += config.geo_weight * proximity(km, config);
    }
    if category {
        confidence += config.category_weight;
    }

    let signals = MatchSignals {
        phone,
        website,
        name_similarity,
        distance_km,
        category,
    };
    (confidence.min(1.0), signals)
}

/// Similarity of two organization names in `0..=1`.
///
/// Max of Jaro-Winkler over the normalized strings and token Jaccard, so both
/// typos and reordered words score high.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let na = normalize_org_name(a);
    let nb = normalize_org_name(b);
    if na.is_empty() || nb.is_empty() {
        return 0.0;
    }
    if na == nb {
        return 1.0;
    }

    let jw = strsim::jaro_winkler(&na, &nb);

    let ta: BTreeSet<&str> = na.split_whitespace().collect();
    let tb: BTreeSet<&str> = nb.split_whitespace().collect();
    let shared = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    let jaccard = if union == 0 {
        0.0
    } else {
        shared as f64 / union as f64
    };

    jw.max(jaccard)
}

/// Great-circle distance in kilometres.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (dlng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

fn proximity(km: f64, config: &MatchConfig) -> f64 {
    if km <= config.geo_full_km {
        1.0
    } else if km >= config.geo_zero_km {
        0.0
    } else {
        (config.geo_zero_km - km) / (config.geo_zero_km - config.geo_full_km)
    }
}

fn decide(confidence: f64, config: &MatchConfig) -> Option<MatchDecision> {
    if confidence >= config.high_threshold {
        Some(MatchDecision::AutoMerge)
    } else if confidence >= config.low_threshold {
        Some(MatchDecision::PossibleDuplicate)
    } else {
        None
    }
}

/// Highest confidence first, then earliest retrieval, then lowest id.
fn sort_candidates(candidates: &mut [Candidate<'_>]) {
    candidates.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.lead.first_retrieved_at().cmp(&b.lead.first_retrieved_at()))
            .then_with(|| a.lead.id.cmp(&b.lead.id))
    });
}

fn evaluate<'a>(lead: &Lead, other: &'a Lead, config: &MatchConfig) -> Option<Candidate<'a>> {
    if other.id == lead.id {
        return None;
    }
    let (confidence, signals) = match_confidence(lead, other, config);
    decide(confidence, config).map(|decision| Candidate {
        lead: other,
        confidence,
        decision,
        signals,
    })
}

fn shares_key(a: &Lead, b: &Lead) -> bool {
    if a.dedup_key == b.dedup_key || a.phones.iter().any(|p| b.phones.contains(p)) {
        return true;
    }
    if let (Some(x), Some(y)) = (a.website.as_deref(), b.website.as_deref()) {
        if website_host(x) == website_host(y) {
            return true;
        }
    }
    let tokens: BTreeSet<String> = name_tokens(&a.organization_name).into_iter().collect();
    name_tokens(&b.organization_name)
        .iter()
        .any(|t| tokens.contains(t))
}

/// Candidates for `lead` among `existing`, without a prebuilt index.
pub fn find_candidates<'a>(
    lead: &Lead,
    existing: &'a [Lead],
    config: &MatchConfig,
) -> Vec<Candidate<'a>> {
    let mut candidates: Vec<Candidate<'a>> = existing
        .iter()
        .filter(|other| shares_key(lead, other))
        .filter_map(|other| evaluate(lead, other, config))
        .collect();
    sort_candidates(&mut candidates);
    candidates
}

// ============ Lead Index ============

/// In-memory set of known leads with key lookups for candidate generation.
#[derive(Debug, Clone, Default)]
pub struct LeadIndex {
    config: MatchConfig,
    leads: BTreeMap<Uuid, Lead>,
    by_token: HashMap<String, BTreeSet<Uuid>>,
    by_phone: HashMap<String, BTreeSet<Uuid>>,
    by_host: HashMap<String, BTreeSet<Uuid>>,
    by_dedup_key: HashMap<String, BTreeSet<Uuid>>,
}

fn index_keys(lead: &Lead) -> (Vec<String>, Vec<String>, Option<String>) {
    let tokens = name_tokens(&lead.organization_name);
    let phones = lead.phones.iter().cloned().collect();
    let host = lead
        .website
        .as_deref()
        .map(|w| website_host(w).to_string());
    (tokens, phones, host)
}

fn add_key(map: &mut HashMap<String, BTreeSet<Uuid>>, key: String, id: Uuid) {
    map.entry(key).or_default().insert(id);
}

fn drop_key(map: &mut HashMap<String, BTreeSet<Uuid>>, key: &str, id: &Uuid) {
    if let Some(ids) = map.get_mut(key) {
        ids.remove(id);
        if ids.is_empty() {
            map.remove(key);
        }
    }
}

impl LeadIndex {
    pub fn new(config: MatchConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn with_leads(config: MatchConfig, leads: impl IntoIterator<Item = Lead>) -> Self {
        let mut index = Self::new(config);
        for lead in leads {
            index.insert(lead);
        }
        index
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.leads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leads.is_empty()
    }

    pub fn get(&self, id: &Uuid) -> Option<&Lead> {
        self.leads.get(id)
    }

    /// All leads, ordered by id.
    pub fn leads(&self) -> impl Iterator<Item = &Lead> {
        self.leads.values()
    }

    /// Ids of leads whose dedup key equals `key`.
    pub fn ids_for_dedup_key(&self, key: &str) -> Vec<Uuid> {
        self.by_dedup_key
            .get(key)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Inserts or replaces a lead, returning the previous version.
    pub fn insert(&mut self, lead: Lead) -> Option<Lead> {
        let previous = self.remove(&lead.id);
        let id = lead.id;
        let (tokens, phones, host) = index_keys(&lead);

        for token in tokens {
            add_key(&mut self.by_token, token, id);
        }
        for phone in phones {
            add_key(&mut self.by_phone, phone, id);
        }
        if let Some(host) = host {
            add_key(&mut self.by_host, host, id);
        }
        add_key(&mut self.by_dedup_key, lead.dedup_key.clone(), id);

        self.leads.insert(id, lead);
        previous
    }

    pub fn remove(&mut self, id: &Uuid) -> Option<Lead> {
        let lead = self.leads.remove(id)?;
        let (tokens, phones, host) = index_keys(&lead);

        for token in &tokens {
            drop_key(&mut self.by_token, token, id);
        }
        for phone in &phones {
            drop_key(&mut self.by_phone, phone, id);
        }
        if let Some(host) = &host {
            drop_key(&mut self.by_host, host, id);
        }
        drop_key(&mut self.by_dedup_key, &lead.dedup_key, id);

        Some(lead)
    }

    /// Ordered merge candidates for `lead`, excluding `lead` itself.
    pub fn find_candidates(&self, lead: &Lead) -> Vec<Candidate<'_>> {
        let (tokens, phones, host) = index_keys(lead);

        let mut ids: BTreeSet<Uuid> = BTreeSet::new();
        let lookups = tokens
            .iter()
            .filter_map(|t| self.by_token.get(t))
            .chain(phones.iter().filter_map(|p| self.by_phone.get(p)))
            .chain(host.iter().filter_map(|h| self.by_host.get(h)))
            .chain(self.by_dedup_key.get(&lead.dedup_key));
        for set in lookups {
            ids.extend(set.iter().copied());
        }

        let mut candidates: Vec<Candidate<'_>> = ids
            .iter()
            .filter_map(|id| self.leads.get(id))
            .filter_map(|other| evaluate(lead, other, &self.config))
            .collect();
        sort_candidates(&mut candidates);

        tracing::debug!(
            "Matched '{}' against {} keyed lead(s): {} candidate(s)",
            lead.organization_name,
            ids.len(),
            candidates.len()
        );
        candidates
    }
}
