/// End-to-end pipeline tests
/// Raw records in, deduplicated, merged and classified leads out
use chrono::{TimeZone, Utc};
use rust_leadgen_api::classifier::{OrganizationType, PriorityTier};
use rust_leadgen_api::matcher::{find_candidates, LeadIndex, MatchConfig, MatchDecision};
use rust_leadgen_api::merger::{merge, MergePolicy};
use rust_leadgen_api::models::{IngestRecord, SourceKind};
use rust_leadgen_api::normalize::Normalizer;
use rust_leadgen_api::pipeline::{LeadPipeline, MergeOutcome};
use rust_leadgen_api::scoring::LeadStatistics;
use serde_json::{json, Value};

fn record(source: &str, payload: Value) -> IngestRecord {
    IngestRecord {
        source: source.to_string(),
        payload,
        retrieved_at: None,
    }
}

fn maps_abc() -> Value {
    json!({
        "title": "ABC Engineering Sdn Bhd",
        "phoneNumber": "+60312345678",
        "categoryName": "engineering consulting"
    })
}

fn web_abc() -> Value {
    json!({
        "url": "https://abceng.com.my",
        "title": "abc engineering sdn bhd | Home",
        "content": "Call us at 03-1234 5678 or write to sales@abceng.com.my"
    })
}

#[cfg(test)]
mod standardization_tests {
    use super::*;

    #[test]
    fn test_maps_record_becomes_classified_lead() {
        let pipeline = LeadPipeline::default();
        let mut index = LeadIndex::new(MatchConfig::default());

        let report = pipeline.process_batch(vec![record("google_maps", maps_abc())], &mut index);
        assert_eq!(report.created, 1);
        assert!(report.errors.is_empty());

        let lead = index.leads().next().unwrap().clone();
        assert_eq!(lead.organization_name, "ABC Engineering Sdn Bhd");
        assert_eq!(lead.phones.iter().collect::<Vec<_>>(), vec!["60312345678"]);

        let detail = pipeline.detail(lead);
        assert_eq!(detail.classification.priority_tier, PriorityTier::High);
        assert_eq!(
            detail.classification.organization_type,
            OrganizationType::Corporate
        );
        assert_eq!(detail.targeting.template, "exec_tone");
        assert_eq!(detail.targeting.follow_up_days, 3);
    }

    #[test]
    fn test_name_only_lead_scores_twenty() {
        let pipeline = LeadPipeline::default();
        let mut index = LeadIndex::new(MatchConfig::default());

        let report = pipeline.process_batch(
            vec![record("google_maps", json!({ "title": "Kedai Ali" }))],
            &mut index,
        );

        assert_eq!(report.leads[0].completeness_score, 20);
        assert_eq!(report.leads[0].outcome, MergeOutcome::Created);
    }

    #[test]
    fn test_record_without_name_is_reported() {
        let pipeline = LeadPipeline::default();
        let mut index = LeadIndex::new(MatchConfig::default());

        let report = pipeline.process_batch(
            vec![
                record(
                    "google_maps",
                    json!({ "address": "1 Jalan Ampang, 50450 Kuala Lumpur" }),
                ),
                record("google_maps", json!({ "title": "Kedai Ali" })),
            ],
            &mut index,
        );

        assert_eq!(report.processed, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].index, 0);
        assert_eq!(report.errors[0].code, "missing_identity");
        assert_eq!(index.len(), 1);
    }
}

#[cfg(test)]
mod dedup_tests {
    use super::*;

    #[test]
    fn test_same_business_across_sources_auto_merges() {
        let normalizer = Normalizer::default();
        let maps = normalizer.normalize(&maps_abc(), "google_maps").unwrap().lead;
        let web = normalizer.normalize(&web_abc(), "web_scrape").unwrap().lead;

        let existing = vec![maps.clone()];
        let candidates = find_candidates(&web, &existing, &MatchConfig::default());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].decision, MatchDecision::AutoMerge);
        assert!(candidates[0].confidence >= 0.95 - 1e-9);
        assert!(candidates[0].signals.phone);

        let merged = merge(&maps, &web, &MergePolicy::default());
        assert_eq!(merged.organization_name, "ABC Engineering Sdn Bhd");
        assert!(merged.emails.contains("sales@abceng.com.my"));
        assert_eq!(merged.website.as_deref(), Some("abceng.com.my"));
        assert_eq!(
            merged.sources(),
            vec![SourceKind::GoogleMaps, SourceKind::WebScrape]
        );
    }

    #[test]
    fn test_maps_name_wins_regardless_of_arrival_order() {
        let pipeline = LeadPipeline::default();
        let mut index = LeadIndex::new(MatchConfig::default());

        let report = pipeline.process_batch(
            vec![record("web_scrape", web_abc()), record("google_maps", maps_abc())],
            &mut index,
        );

        assert_eq!(report.created, 1);
        assert_eq!(report.merged, 1);
        assert!(matches!(
            report.leads[1].outcome,
            MergeOutcome::Merged { .. }
        ));
        assert_eq!(index.len(), 1);
        assert_eq!(
            index.leads().next().unwrap().organization_name,
            "ABC Engineering Sdn Bhd"
        );
    }

    #[test]
    fn test_ambiguous_match_is_flagged_not_merged() {
        let pipeline = LeadPipeline::default();
        let mut index = LeadIndex::new(MatchConfig::default());

        let report = pipeline.process_batch(
            vec![
                record(
                    "google_maps",
                    json!({ "title": "Kedai Ali", "phoneNumber": "+60312345678" }),
                ),
                record(
                    "google_maps",
                    json!({ "title": "Zenith Logistics", "phoneNumber": "03-1234 5678" }),
                ),
            ],
            &mut index,
        );

        assert_eq!(report.created, 2);
        assert_eq!(report.merged, 0);
        assert_eq!(report.possible_duplicates.len(), 1);
        assert_eq!(report.possible_duplicates[0].candidate_name, "Kedai Ali");
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_reprocessing_a_batch_adds_no_leads() {
        let pipeline = LeadPipeline::default();
        let mut index = LeadIndex::new(MatchConfig::default());
        let retrieved_at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let batch = || {
            vec![
                IngestRecord {
                    source: "google_maps".into(),
                    payload: maps_abc(),
                    retrieved_at: Some(retrieved_at),
                },
                IngestRecord {
                    source: "web_scrape".into(),
                    payload: web_abc(),
                    retrieved_at: Some(retrieved_at),
                },
            ]
        };

        pipeline.process_batch(batch(), &mut index);
        let first = index.leads().next().unwrap().clone();
        pipeline.process_batch(batch(), &mut index);
        let second = index.leads().next().unwrap().clone();

        assert_eq!(index.len(), 1);
        assert_eq!(first.source_records, second.source_records);
        assert_eq!(first.emails, second.emails);
    }
}

#[cfg(test)]
mod classification_tests {
    use super::*;

    #[test]
    fn test_university_gets_default_package_without_variant() {
        let pipeline = LeadPipeline::default();
        let lead = Normalizer::default()
            .normalize(
                &json!({ "title": "Student Hub", "categoryName": "university student recruitment" }),
                "google_maps",
            )
            .unwrap()
            .lead;

        let c = pipeline.detail(lead).classification;
        assert_eq!(c.organization_type, OrganizationType::University);
        assert_eq!(c.recommended_package, "meeting");
        assert_eq!(c.recommended_variant.organization_type, None);
        assert_eq!(c.recommended_variant.document, "meeting corp package.pdf");
    }

    #[test]
    fn test_university_camping_variant() {
        let pipeline = LeadPipeline::default();
        let lead = Normalizer::default()
            .normalize(
                &json!({ "title": "Student Hub", "categoryName": "university student camping" }),
                "google_maps",
            )
            .unwrap()
            .lead;

        let c = pipeline.detail(lead).classification;
        assert_eq!(c.recommended_package, "camping");
        assert_eq!(
            c.recommended_variant.organization_type,
            Some(OrganizationType::University)
        );
        assert_eq!(c.recommended_variant.document, "camping package.pdf");
    }

    #[test]
    fn test_location_boost_raises_tier() {
        let pipeline = LeadPipeline::default();
        let lead = Normalizer::default()
            .normalize(
                &json!({
                    "title": "Bright Tutors",
                    "categoryName": "tutoring",
                    "address": "12 Jalan SS2, 47300 Petaling Jaya, Selangor"
                }),
                "google_maps",
            )
            .unwrap()
            .lead;

        let detail = pipeline.detail(lead);
        assert_eq!(detail.classification.priority_tier, PriorityTier::Low);
        assert_eq!(detail.targeting.location_boost, 1.0);
        assert_eq!(detail.targeting.tier, PriorityTier::Medium);
    }
}

#[cfg(test)]
mod statistics_tests {
    use super::*;

    #[test]
    fn test_statistics_over_processed_batch() {
        let pipeline = LeadPipeline::default();
        let mut index = LeadIndex::new(MatchConfig::default());
        pipeline.process_batch(
            vec![
                record("google_maps", maps_abc()),
                record("web_scrape", web_abc()),
                record("instagram", json!({ "username": "kedai_ali" })),
            ],
            &mut index,
        );

        let stats = LeadStatistics::from_leads(index.leads());
        assert_eq!(stats.total_leads, 2);
        assert_eq!(stats.by_source.get(&SourceKind::Instagram), Some(&1));
        assert_eq!(stats.by_source.get(&SourceKind::GoogleMaps), Some(&1));
    }
}
