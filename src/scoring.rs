use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{Lead, SourceKind};

// ============ Completeness Weights ============

pub const NAME_WEIGHT: u8 = 20;
pub const EMAIL_WEIGHT: u8 = 20;
pub const PHONE_WEIGHT: u8 = 20;
pub const WEBSITE_WEIGHT: u8 = 10;
pub const ADDRESS_WEIGHT: u8 = 10;
pub const COORDINATES_WEIGHT: u8 = 5;
pub const CATEGORY_WEIGHT: u8 = 10;
pub const RATING_WEIGHT: u8 = 5;

/// Completeness score in `0..=100`: the weighted sum of populated fields.
///
/// Pure: depends only on which fields are present, never on their values.
pub fn score(lead: &Lead) -> u8 {
    let checklist = [
        (!lead.organization_name.trim().is_empty(), NAME_WEIGHT),
        (!lead.emails.is_empty(), EMAIL_WEIGHT),
        (!lead.phones.is_empty(), PHONE_WEIGHT),
        (lead.website.is_some(), WEBSITE_WEIGHT),
        (lead.address.is_some(), ADDRESS_WEIGHT),
        (lead.geo.is_some(), COORDINATES_WEIGHT),
        (lead.category.is_some(), CATEGORY_WEIGHT),
        (lead.rating.is_some(), RATING_WEIGHT),
    ];

    checklist
        .iter()
        .filter(|(present, _)| *present)
        .map(|(_, weight)| *weight)
        .sum()
}

/// Leads whose completeness score is at least `min_score`, order preserved.
pub fn filter_by_completeness<'a, I>(leads: I, min_score: u8) -> Vec<&'a Lead>
where
    I: IntoIterator<Item = &'a Lead>,
{
    leads
        .into_iter()
        .filter(|lead| lead.completeness_score >= min_score)
        .collect()
}

// ============ Collection Statistics ============

/// How often one canonical field is filled across a lead collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldCoverage {
    pub count: usize,
    pub percentage: f64,
}

/// Summary numbers for a lead collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadStatistics {
    pub total_leads: usize,
    pub by_source: BTreeMap<SourceKind, usize>,
    pub average_score: f64,
    pub field_coverage: BTreeMap<&'static str, FieldCoverage>,
}

impl LeadStatistics {
    pub fn from_leads<'a, I>(leads: I) -> Self
    where
        I: IntoIterator<Item = &'a Lead>,
    {
        let mut total = 0usize;
        let mut score_sum = 0u64;
        let mut by_source: BTreeMap<SourceKind, usize> = BTreeMap::new();
        let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();

        for lead in leads {
            total += 1;
            score_sum += u64::from(lead.completeness_score);

            for source in lead.sources() {
                *by_source.entry(source).or_insert(0) += 1;
            }

            let filled = [
                ("email", !lead.emails.is_empty()),
                ("phone", !lead.phones.is_empty()),
                ("website", lead.website.is_some()),
                ("address", lead.address.is_some()),
                ("coordinates", lead.geo.is_some()),
                ("category", lead.category.is_some()),
                ("rating", lead.rating.is_some()),
                ("social", !lead.social_handles.is_empty()),
            ];
            for (field, present) in filled {
                let entry = counts.entry(field).or_insert(0);
                if present {
                    *entry += 1;
                }
            }
        }

        let field_coverage = counts
            .into_iter()
            .map(|(field, count)| {
                let percentage = if total == 0 {
                    0.0
                } else {
                    (count as f64 / total as f64 * 1000.0).round() / 10.0
                };
                (field, FieldCoverage { count, percentage })
            })
            .collect();

        let average_score = if total == 0 {
            0.0
        } else {
            (score_sum as f64 / total as f64 * 10.0).round() / 10.0
        };

        Self {
            total_leads: total,
            by_source,
            average_score,
            field_coverage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeoPoint, SourceRecord};
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn bare_lead(name: &str) -> Lead {
        let record = SourceRecord {
            source: SourceKind::GoogleMaps,
            payload: json!({ "title": name }),
            retrieved_at: Utc::now(),
        };
        Lead::new(Uuid::new_v4(), name, record)
    }

    #[test]
    fn test_weights_sum_to_100() {
        let total: u32 = [
            NAME_WEIGHT,
            EMAIL_WEIGHT,
            PHONE_WEIGHT,
            WEBSITE_WEIGHT,
            ADDRESS_WEIGHT,
            COORDINATES_WEIGHT,
            CATEGORY_WEIGHT,
            RATING_WEIGHT,
        ]
        .iter()
        .map(|w| u32::from(*w))
        .sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn test_name_only_scores_name_weight() {
        let lead = bare_lead("Kedai Runcit Ali");
        assert_eq!(score(&lead), NAME_WEIGHT);
        assert_eq!(lead.completeness_score, NAME_WEIGHT);
    }

    #[test]
    fn test_full_lead_scores_100() {
        let mut lead = bare_lead("ABC Engineering");
        lead.emails.insert("info@abc.com.my".into());
        lead.phones.insert("60312345678".into());
        lead.website = Some("abc.com.my".into());
        lead.address = crate::normalize::parse_address("1 Jalan Ampang, 50450 Kuala Lumpur");
        lead.geo = GeoPoint::new(3.15, 101.7);
        lead.category = Some("Engineering".into());
        lead.rating = Some(4.5);
        assert_eq!(score(&lead), 100);
    }

    #[test]
    fn test_statistics() {
        let mut rich = bare_lead("ABC Engineering");
        rich.emails.insert("info@abc.com.my".into());
        rich.refresh_derived();
        let plain = bare_lead("XYZ Trading");

        let stats = LeadStatistics::from_leads([&rich, &plain]);
        assert_eq!(stats.total_leads, 2);
        assert_eq!(stats.by_source.get(&SourceKind::GoogleMaps), Some(&2));
        assert_eq!(stats.average_score, 30.0);
        assert_eq!(stats.field_coverage["email"].count, 1);
        assert_eq!(stats.field_coverage["email"].percentage, 50.0);

        let kept = filter_by_completeness([&rich, &plain], 40);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].organization_name, "ABC Engineering");
    }

    #[test]
    fn test_empty_statistics() {
        let stats = LeadStatistics::from_leads(std::iter::empty());
        assert_eq!(stats.total_leads, 0);
        assert_eq!(stats.average_score, 0.0);
    }
}
