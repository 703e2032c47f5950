/// Batch orchestration: normalize → match → merge → score.
///
/// Pure in-process transformation. The caller owns the [`LeadIndex`] and
/// decides how to persist the leads a batch touched.
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::classifier::Classifier;
use crate::config::PipelineSettings;
use crate::matcher::{LeadIndex, MatchDecision};
use crate::merger::{merge, MergePolicy};
use crate::models::{AmbiguousMatchWarning, IngestRecord, Lead, LeadDetail, LeadField};
use crate::normalize::Normalizer;

/// What happened to one successfully normalized record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MergeOutcome {
    Created,
    Merged {
        /// Lead the record was folded into, before the merge.
        matched_id: Uuid,
        confidence: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedRecord {
    /// Position of the record in the submitted batch.
    pub index: usize,
    /// Id of the lead holding this record after processing.
    pub lead_id: Uuid,
    pub organization_name: String,
    pub completeness_score: u8,
    #[serde(flatten)]
    pub outcome: MergeOutcome,
}

/// A field value dropped while normalizing one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordWarning {
    pub index: usize,
    pub field: LeadField,
    pub value: String,
    pub reason: String,
}

/// A record that produced no lead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordError {
    pub index: usize,
    pub source: String,
    pub code: &'static str,
    pub message: String,
}

/// Outcome of one batch. Errors and warnings never abort the batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    pub created: usize,
    pub merged: usize,
    pub leads: Vec<ProcessedRecord>,
    pub possible_duplicates: Vec<AmbiguousMatchWarning>,
    pub warnings: Vec<RecordWarning>,
    pub errors: Vec<RecordError>,
    /// Ids that no longer exist because their lead merged into an older one.
    pub retired_ids: Vec<Uuid>,
}

impl BatchReport {
    /// "N records processed, M warnings, K errors"
    pub fn summary(&self) -> String {
        format!(
            "{} records processed, {} warnings, {} errors",
            self.processed,
            self.warnings.len() + self.possible_duplicates.len(),
            self.errors.len()
        )
    }

    /// Final ids of every lead created or updated by the batch.
    pub fn touched_ids(&self) -> BTreeSet<Uuid> {
        let retired: BTreeSet<Uuid> = self.retired_ids.iter().copied().collect();
        self.leads
            .iter()
            .map(|r| r.lead_id)
            .filter(|id| !retired.contains(id))
            .collect()
    }
}

/// The standardization pipeline with its configured stages.
#[derive(Debug, Clone, Default)]
pub struct LeadPipeline {
    normalizer: Normalizer,
    merge_policy: MergePolicy,
    classifier: Classifier,
}

impl LeadPipeline {
    pub fn new(normalizer: Normalizer, merge_policy: MergePolicy, classifier: Classifier) -> Self {
        Self {
            normalizer,
            merge_policy,
            classifier,
        }
    }

    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self::new(
            Normalizer::new(settings.normalizer.clone()),
            settings.merge.clone(),
            Classifier::new(settings.classifier.clone()),
        )
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn merge_policy(&self) -> &MergePolicy {
        &self.merge_policy
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Lead plus its classification and outreach plan.
    pub fn detail(&self, lead: Lead) -> LeadDetail {
        let classification = self.classifier.classify(&lead);
        let targeting = self.classifier.targeting(&lead, &classification);
        LeadDetail {
            lead,
            classification,
            targeting,
        }
    }

    pub fn process_batch(&self, records: Vec<IngestRecord>, index: &mut LeadIndex) -> BatchReport {
        self.process_batch_at(records, index, Utc::now())
    }

    /// Processes a batch; record `i` without a `retrieved_at` is stamped `now + i ns`.
    pub fn process_batch_at(
        &self,
        records: Vec<IngestRecord>,
        index: &mut LeadIndex,
        now: DateTime<Utc>,
    ) -> BatchReport {
        let mut report = BatchReport::default();

        for (i, record) in records.into_iter().enumerate() {
            report.processed += 1;
            self.process_record(i, record, index, now, &mut report);
        }

        tracing::info!("Batch finished: {}", report.summary());
        report
    }

    fn process_record(
        &self,
        i: usize,
        record: IngestRecord,
        index: &mut LeadIndex,
        now: DateTime<Utc>,
        report: &mut BatchReport,
    ) {
        // Distinct per record so same-source payloads of one batch stay separate.
        let retrieved_at = record
            .retrieved_at
            .unwrap_or_else(|| now + Duration::nanoseconds(i as i64));
        let normalized =
            match self
                .normalizer
                .normalize_at(&record.payload, &record.source, retrieved_at)
            {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!("Record {} ({}) rejected: {}", i, record.source, e);
                    report.errors.push(RecordError {
                        index: i,
                        source: record.source,
                        code: e.code(),
                        message: e.to_string(),
                    });
                    return;
                }
            };

        report
            .warnings
            .extend(normalized.warnings.into_iter().map(|w| RecordWarning {
                index: i,
                field: w.field,
                value: w.value,
                reason: w.reason,
            }));

        let lead = normalized.lead;

        // Owned copies so the index can be mutated afterwards.
        let candidates: Vec<(Uuid, String, f64, MatchDecision)> = index
            .find_candidates(&lead)
            .into_iter()
            .map(|c| {
                (
                    c.lead.id,
                    c.lead.organization_name.clone(),
                    c.confidence,
                    c.decision,
                )
            })
            .collect();

        let best = candidates
            .iter()
            .find(|(_, _, _, decision)| *decision == MatchDecision::AutoMerge)
            .map(|(id, _, confidence, _)| (*id, *confidence));

        let (result, outcome) = match best.and_then(|(id, c)| index.remove(&id).map(|l| (l, c))) {
            Some((existing, confidence)) => {
                let merged = merge(&existing, &lead, &self.merge_policy);
                tracing::info!(
                    "Merged {} record '{}' into lead {} (confidence {:.2})",
                    record.source,
                    lead.organization_name,
                    existing.id,
                    confidence
                );
                if merged.id != existing.id {
                    report.retired_ids.push(existing.id);
                }
                report.merged += 1;
                (
                    merged,
                    MergeOutcome::Merged {
                        matched_id: existing.id,
                        confidence,
                    },
                )
            }
            None => {
                report.created += 1;
                (lead, MergeOutcome::Created)
            }
        };

        let merged_into = best.map(|(id, _)| id);
        for (candidate_id, candidate_name, confidence, _) in candidates
            .iter()
            .filter(|(id, _, _, _)| Some(*id) != merged_into)
        {
            tracing::warn!(
                "Possible duplicate: '{}' vs '{}' (confidence {:.2})",
                result.organization_name,
                candidate_name,
                confidence
            );
            report.possible_duplicates.push(AmbiguousMatchWarning {
                lead_id: result.id,
                candidate_id: *candidate_id,
                lead_name: result.organization_name.clone(),
                candidate_name: candidate_name.clone(),
                confidence: *confidence,
                detected_at: now,
            });
        }

        report.leads.push(ProcessedRecord {
            index: i,
            lead_id: result.id,
            organization_name: result.organization_name.clone(),
            completeness_score: result.completeness_score,
            outcome,
        });
        index.insert(result);
    }
}
