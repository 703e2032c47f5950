use std::collections::BTreeMap;

use crate::models::{FieldOrigin, Lead, LeadField, SourceKind, SourceRecord};

/// Conflict-resolution rules for merging two leads.
#[derive(Debug, Clone, PartialEq)]
pub struct MergePolicy {
    /// Most trusted source first. Unlisted sources rank below all listed ones.
    pub trust_order: Vec<SourceKind>,
    /// Source whose value wins for a field whenever it supplied one.
    pub field_authority: BTreeMap<LeadField, SourceKind>,
}

impl Default for MergePolicy {
    fn default() -> Self {
        let mut field_authority = BTreeMap::new();
        field_authority.insert(LeadField::Rating, SourceKind::GoogleMaps);
        field_authority.insert(LeadField::ReviewCount, SourceKind::GoogleMaps);

        Self {
            trust_order: vec![
                SourceKind::GoogleMaps,
                SourceKind::Instagram,
                SourceKind::WebScrape,
            ],
            field_authority,
        }
    }
}

impl MergePolicy {
    /// Position in the trust order; lower is more trusted.
    pub fn rank(&self, source: SourceKind) -> usize {
        self.trust_order
            .iter()
            .position(|s| *s == source)
            .unwrap_or(self.trust_order.len())
    }

    /// Whether a value from `challenger` beats one from `incumbent`:
    /// higher trust first, then the more recent retrieval. Ties keep the incumbent.
    pub fn outranks(&self, challenger: Option<FieldOrigin>, incumbent: Option<FieldOrigin>) -> bool {
        match (challenger, incumbent) {
            (Some(c), Some(i)) => {
                let (rc, ri) = (self.rank(c.source), self.rank(i.source));
                rc < ri || (rc == ri && c.retrieved_at > i.retrieved_at)
            }
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    fn prefers(
        &self,
        field: LeadField,
        challenger: Option<FieldOrigin>,
        incumbent: Option<FieldOrigin>,
    ) -> bool {
        if let Some(authority) = self.field_authority.get(&field) {
            let from_authority = |o: Option<FieldOrigin>| o.map(|o| o.source == *authority);
            let (c, i) = (
                from_authority(challenger).unwrap_or(false),
                from_authority(incumbent).unwrap_or(false),
            );
            if c != i {
                return c;
            }
        }
        self.outranks(challenger, incumbent)
    }
}

/// Replaces `target` with `incoming` when the target is empty or the incoming
/// value's origin is preferred for `field`.
fn resolve<T: Clone>(
    policy: &MergePolicy,
    field: LeadField,
    target: &mut Option<T>,
    origins: &mut BTreeMap<LeadField, FieldOrigin>,
    incoming: &Option<T>,
    incoming_origin: Option<FieldOrigin>,
) {
    let Some(value) = incoming else {
        return;
    };

    let replace = target.is_none()
        || policy.prefers(field, incoming_origin, origins.get(&field).copied());
    if replace {
        *target = Some(value.clone());
        match incoming_origin {
            Some(origin) => {
                origins.insert(field, origin);
            }
            None => {
                origins.remove(&field);
            }
        }
    }
}

/// Merges two leads describing the same organization.
///
/// The result keeps the id of the earlier-created lead (lowest id on a tie),
/// the union of all set fields and every source record. Single-value
/// conflicts are settled by `policy`, with `primary` winning exact ties.
/// Idempotent: `merge(&merge(a, b), b) == merge(a, b)`.
pub fn merge(primary: &Lead, secondary: &Lead, policy: &MergePolicy) -> Lead {
    let mut merged = primary.clone();

    let (created_at, winner_id) = std::cmp::min(
        (primary.created_at, primary.id),
        (secondary.created_at, secondary.id),
    );
    merged.id = winner_id;
    merged.created_at = created_at;

    merged.emails.extend(secondary.emails.iter().cloned());
    merged.phones.extend(secondary.phones.iter().cloned());

    let origin = |field: LeadField| secondary.field_origins.get(&field).copied();

    let incoming_name = Some(secondary.organization_name.clone());
    let mut name = Some(merged.organization_name.clone());
    resolve(
        policy,
        LeadField::OrganizationName,
        &mut name,
        &mut merged.field_origins,
        &incoming_name,
        origin(LeadField::OrganizationName),
    );
    if let Some(name) = name {
        merged.organization_name = name;
    }

    let origins = &mut merged.field_origins;
    resolve(
        policy,
        LeadField::ContactName,
        &mut merged.contact_name,
        origins,
        &secondary.contact_name,
        origin(LeadField::ContactName),
    );
    resolve(
        policy,
        LeadField::Role,
        &mut merged.role,
        origins,
        &secondary.role,
        origin(LeadField::Role),
    );
    resolve(
        policy,
        LeadField::Website,
        &mut merged.website,
        origins,
        &secondary.website,
        origin(LeadField::Website),
    );
    resolve(
        policy,
        LeadField::Address,
        &mut merged.address,
        origins,
        &secondary.address,
        origin(LeadField::Address),
    );
    resolve(
        policy,
        LeadField::Geo,
        &mut merged.geo,
        origins,
        &secondary.geo,
        origin(LeadField::Geo),
    );
    resolve(
        policy,
        LeadField::Category,
        &mut merged.category,
        origins,
        &secondary.category,
        origin(LeadField::Category),
    );
    resolve(
        policy,
        LeadField::Rating,
        &mut merged.rating,
        origins,
        &secondary.rating,
        origin(LeadField::Rating),
    );
    resolve(
        policy,
        LeadField::ReviewCount,
        &mut merged.review_count,
        origins,
        &secondary.review_count,
        origin(LeadField::ReviewCount),
    );

    let handle_origin = origin(LeadField::SocialHandle);
    let current_handle_origin = merged.field_origins.get(&LeadField::SocialHandle).copied();
    let secondary_wins = policy.outranks(handle_origin, current_handle_origin);
    for (platform, handle) in &secondary.social_handles {
        let take = match merged.social_handles.get(platform) {
            None => true,
            Some(existing) => existing != handle && secondary_wins,
        };
        if take {
            merged.social_handles.insert(platform.clone(), handle.clone());
        }
    }
    if secondary_wins && !secondary.social_handles.is_empty() {
        if let Some(o) = handle_origin {
            merged.field_origins.insert(LeadField::SocialHandle, o);
        }
    }

    // Two records are the same provenance only if source, time and payload all agree.
    let mut records: Vec<SourceRecord> = Vec::new();
    for record in primary
        .source_records
        .iter()
        .chain(secondary.source_records.iter())
    {
        if !records.contains(record) {
            records.push(record.clone());
        }
    }
    records.sort_by(|a, b| {
        a.retrieved_at
            .cmp(&b.retrieved_at)
            .then_with(|| a.source.cmp(&b.source))
            .then_with(|| a.payload.to_string().cmp(&b.payload.to_string()))
    });
    merged.source_records = records;

    merged.refresh_derived();
    merged
}
