//! Super admin protection for admin imports
//!
//! No import, under any configuration, may create a super_admin or touch an
//! existing one:
//! 1. candidates proposing the super_admin role are dropped;
//! 2. when updates are allowed, candidates whose user already holds
//!    super_admin in the store are dropped too.
//!
//! Insert-only imports skip the lookup: an existing admin row makes the
//! insert fail on the `user_id` conflict rather than modify it.

use std::collections::HashSet;

use anyhow::Result;
use tracing::{info, warn};

use crate::services::store::{RecordStore, SUPER_ADMIN_ROLE};
use crate::types::ImportRecord;

/// Drop every candidate proposing the super_admin role
pub fn drop_super_admin_candidates(candidates: Vec<ImportRecord>) -> Vec<ImportRecord> {
    let before = candidates.len();
    let safe: Vec<ImportRecord> = candidates
        .into_iter()
        .filter(|record| !proposes_super_admin(record))
        .collect();

    let dropped = before - safe.len();
    if dropped > 0 {
        warn!("Dropped {} admin rows proposing the {} role", dropped, SUPER_ADMIN_ROLE);
    }
    safe
}

/// Drop every candidate whose user already holds super_admin
pub fn drop_existing_super_admins(
    candidates: Vec<ImportRecord>,
    super_admin_ids: &HashSet<String>,
) -> Vec<ImportRecord> {
    let protected: HashSet<String> = super_admin_ids.iter().map(|id| id.to_lowercase()).collect();

    let before = candidates.len();
    let safe: Vec<ImportRecord> = candidates
        .into_iter()
        .filter(|record| match record.text("user_id") {
            Some(user_id) => !protected.contains(&user_id.to_lowercase()),
            None => true,
        })
        .collect();

    let dropped = before - safe.len();
    if dropped > 0 {
        warn!("Dropped {} admin rows targeting existing super admins", dropped);
    }
    safe
}

/// Apply both guard stages; the store is only consulted when updates are allowed
pub async fn guard_admin_candidates(
    store: &dyn RecordStore,
    candidates: Vec<ImportRecord>,
    allow_update: bool,
) -> Result<Vec<ImportRecord>> {
    let safe = drop_super_admin_candidates(candidates);
    if safe.is_empty() || !allow_update {
        return Ok(safe);
    }

    let super_admin_ids = store.super_admin_user_ids().await?;
    info!("Found {} existing super admins", super_admin_ids.len());

    Ok(drop_existing_super_admins(safe, &super_admin_ids))
}

fn proposes_super_admin(record: &ImportRecord) -> bool {
    record
        .text("role")
        .map(|role| role.trim().eq_ignore_ascii_case(SUPER_ADMIN_ROLE))
        .unwrap_or(false)
}
