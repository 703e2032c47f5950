/// Property-based tests using proptest
/// Tests invariants that should hold for all inputs: scoring bounds, merge
/// idempotency, deterministic matching and classification
use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_leadgen_api::classifier::Classifier;
use rust_leadgen_api::matcher::{find_candidates, MatchConfig};
use rust_leadgen_api::merger::{merge, MergePolicy};
use rust_leadgen_api::models::{FieldOrigin, Lead, LeadField, SourceKind, SourceRecord};
use rust_leadgen_api::normalize::{is_valid_email, normalize_phone, Normalizer};
use rust_leadgen_api::scoring::score;
use serde_json::json;
use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use uuid::Uuid;

fn lead_strategy(days: RangeInclusive<i64>) -> impl Strategy<Value = Lead> {
    (
        "[A-Z][a-z]{2,8}( [A-Z][a-z]{2,8}){0,2}",
        prop::sample::select(SourceKind::ALL.to_vec()),
        days,
        prop::collection::btree_set("[a-z]{3,6}@[a-z]{3,6}\\.my", 0..3),
        prop::collection::btree_set("60[1-9][0-9]{8}", 0..3),
        proptest::option::of(0.0f64..=5.0),
        proptest::option::of("[a-z]{3,8}\\.com"),
        proptest::option::of("[A-Z][a-z]{3,10}"),
    )
        .prop_map(
            |(name, source, day, emails, phones, rating, website, category)| {
                let retrieved_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                    + Duration::days(day);
                let origin = FieldOrigin {
                    source,
                    retrieved_at,
                };
                let record = SourceRecord {
                    source,
                    payload: json!({ "title": name }),
                    retrieved_at,
                };

                let mut lead = Lead::new(Uuid::new_v4(), name, record);
                lead.emails = emails;
                lead.phones = phones;
                for (field, present) in [
                    (LeadField::Rating, rating.is_some()),
                    (LeadField::Website, website.is_some()),
                    (LeadField::Category, category.is_some()),
                ] {
                    if present {
                        lead.field_origins.insert(field, origin);
                    }
                }
                lead.rating = rating;
                lead.website = website;
                lead.category = category;
                lead.refresh_derived();
                lead
            },
        )
}

// Property: Validation should never panic
proptest! {
    #[test]
    fn email_validation_never_panics(email in "\\PC*") {
        let _ = is_valid_email(&email);
    }

    #[test]
    fn phone_normalization_never_panics(phone in "\\PC*", code in 1u16..=999) {
        let _ = normalize_phone(&phone, code);
    }

    #[test]
    fn normalized_phones_are_plain_digits(number in "0[1-9][0-9]{7,9}") {
        if let Ok(phone) = normalize_phone(&number, 60) {
            prop_assert!(phone.chars().all(|c| c.is_ascii_digit()));
            prop_assert!(phone.starts_with("60"));
        }
    }
}

// Property: Completeness score is bounded and pure
proptest! {
    #[test]
    fn score_is_bounded_and_pure(lead in lead_strategy(0..=30)) {
        let first = score(&lead);
        prop_assert!(first <= 100);
        prop_assert!(first >= 20);
        prop_assert_eq!(first, score(&lead.clone()));
        prop_assert_eq!(first, lead.completeness_score);
    }

    #[test]
    fn normalized_lead_score_matches_fields(
        name in "[A-Za-z][A-Za-z ]{0,30}",
        phone in "[0-9 +-]{0,16}",
        email in "[a-z@.]{0,20}"
    ) {
        let payload = json!({ "title": name, "phoneNumber": phone, "email": email });
        if let Ok(normalized) = Normalizer::default().normalize(&payload, "google_maps") {
            let lead = normalized.lead;
            prop_assert_eq!(lead.completeness_score, score(&lead));
            prop_assert!(lead.phones.len() + normalized.warnings.len() >= 1 || phone.trim().is_empty());
        }
    }
}

// Property: Merging is idempotent and unions are order independent
proptest! {
    #[test]
    fn merge_is_idempotent(a in lead_strategy(0..=14), b in lead_strategy(15..=30)) {
        let policy = MergePolicy::default();
        let once = merge(&a, &b, &policy);
        let twice = merge(&once, &b, &policy);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn merge_unions_are_commutative(a in lead_strategy(0..=14), b in lead_strategy(15..=30)) {
        let policy = MergePolicy::default();
        let ab = merge(&a, &b, &policy);
        let ba = merge(&b, &a, &policy);

        prop_assert_eq!(ab.id, ba.id);
        prop_assert_eq!(ab.id, a.id);
        prop_assert_eq!(&ab.emails, &ba.emails);
        prop_assert_eq!(&ab.phones, &ba.phones);
        prop_assert_eq!(&ab.source_records, &ba.source_records);
        prop_assert_eq!(ab.source_records.len(), 2);

        let expected: BTreeSet<String> = a.emails.union(&b.emails).cloned().collect();
        prop_assert_eq!(ab.emails, expected);
    }

    #[test]
    fn merged_score_never_drops(a in lead_strategy(0..=14), b in lead_strategy(15..=30)) {
        let merged = merge(&a, &b, &MergePolicy::default());
        prop_assert!(merged.completeness_score >= a.completeness_score);
        prop_assert!(merged.completeness_score >= b.completeness_score);
    }
}

// Property: Matching is deterministic and a shared phone is always a candidate
proptest! {
    #[test]
    fn shared_phone_is_always_a_candidate(
        a in lead_strategy(0..=30),
        b in lead_strategy(0..=30),
        phone in "60[1-9][0-9]{8}"
    ) {
        let mut a = a;
        let mut b = b;
        a.phones.insert(phone.clone());
        b.phones.insert(phone);
        a.refresh_derived();
        b.refresh_derived();

        let config = MatchConfig::default();
        let existing = vec![b];
        let candidates = find_candidates(&a, &existing, &config);
        prop_assert_eq!(candidates.len(), 1);
        prop_assert!(candidates[0].confidence >= config.phone_weight);
        prop_assert!(candidates[0].confidence <= 1.0);
    }

    #[test]
    fn candidate_order_is_deterministic(
        lead in lead_strategy(0..=30),
        others in prop::collection::vec(lead_strategy(0..=30), 0..6)
    ) {
        let config = MatchConfig::default();
        let first: Vec<Uuid> = find_candidates(&lead, &others, &config)
            .iter()
            .map(|c| c.lead.id)
            .collect();
        let second: Vec<Uuid> = find_candidates(&lead, &others, &config)
            .iter()
            .map(|c| c.lead.id)
            .collect();
        prop_assert_eq!(first, second);
    }
}

// Property: Classification is a pure function of the lead
proptest! {
    #[test]
    fn classification_is_deterministic(lead in lead_strategy(0..=30), category in "\\PC{0,40}") {
        let mut lead = lead;
        lead.category = Some(category);
        let classifier = Classifier::default();

        let first = classifier.classify(&lead);
        prop_assert_eq!(&first, &classifier.classify(&lead.clone()));
        prop_assert_eq!(
            classifier.targeting(&lead, &first),
            classifier.targeting(&lead, &first)
        );
    }
}
