//! Field-level merge policy.
//!
//! Every record field is listed in [`MERGE_POLICIES`]. Logs are concatenated,
//! everything else is last-write-wins. The orchestrator applies the table
//! to the typed record; stages never merge by hand.

use thiserror::Error;

use super::record::{AuditRecord, RecordUpdate};

/// How an incoming field value combines with the current one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Concatenate lists, existing entries first
    Append,

    /// Replace the current value
    Overwrite,
}

/// Merge policy for every field of [`AuditRecord`]
pub const MERGE_POLICIES: &[(&str, MergePolicy)] = &[
    ("findings", MergePolicy::Append),
    ("risk_level", MergePolicy::Overwrite),
    ("remediation_plan", MergePolicy::Overwrite),
    ("evidence_package", MergePolicy::Overwrite),
    ("policy_gaps", MergePolicy::Append),
    ("retry_count", MergePolicy::Overwrite),
    ("confidence", MergePolicy::Overwrite),
    ("generated_code", MergePolicy::Overwrite),
    ("forecast", MergePolicy::Overwrite),
    ("image", MergePolicy::Overwrite),
    ("audio", MergePolicy::Overwrite),
    ("red_team_mode", MergePolicy::Overwrite),
    ("federated_mode", MergePolicy::Overwrite),
    ("audit_trail", MergePolicy::Append),
    ("drift_score", MergePolicy::Overwrite),
    ("supply_chain_risks", MergePolicy::Append),
    ("policy_amendment", MergePolicy::Overwrite),
    ("integrity_hash", MergePolicy::Overwrite),
    ("sensitivity", MergePolicy::Overwrite),
    ("log_sample", MergePolicy::Overwrite),
    ("financial_impact", MergePolicy::Overwrite),
    ("simulation_report", MergePolicy::Overwrite),
    ("simulation_passed", MergePolicy::Overwrite),
    ("enforcement", MergePolicy::Overwrite),
];

/// Look up the policy for a field
pub fn policy_for(field: &str) -> Option<MergePolicy> {
    MERGE_POLICIES
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, policy)| *policy)
}

/// Merge failures. These indicate a record/table mismatch, never bad data.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("Field '{field}' has no merge policy")]
    UnknownField { field: &'static str },

    #[error("Append policy on non-list field '{field}'")]
    NotAList { field: &'static str },
}

fn policy(field: &'static str) -> Result<MergePolicy, MergeError> {
    policy_for(field).ok_or(MergeError::UnknownField { field })
}

fn merge_list<T: Clone>(
    field: &'static str,
    current: &mut Vec<T>,
    incoming: &[T],
) -> Result<(), MergeError> {
    if incoming.is_empty() {
        return Ok(());
    }
    match policy(field)? {
        MergePolicy::Append => current.extend_from_slice(incoming),
        MergePolicy::Overwrite => *current = incoming.to_vec(),
    }
    Ok(())
}

fn merge_value<T: Clone>(
    field: &'static str,
    current: &mut T,
    incoming: &Option<T>,
) -> Result<(), MergeError> {
    let Some(value) = incoming else {
        return Ok(());
    };
    match policy(field)? {
        MergePolicy::Overwrite => *current = value.clone(),
        MergePolicy::Append => return Err(MergeError::NotAList { field }),
    }
    Ok(())
}

/// Fields the record stores as `Option` and updates set to `Some`
fn merge_optional<T: Clone>(
    field: &'static str,
    current: &mut Option<T>,
    incoming: &Option<T>,
) -> Result<(), MergeError> {
    if incoming.is_none() {
        return Ok(());
    }
    match policy(field)? {
        MergePolicy::Overwrite => *current = incoming.clone(),
        MergePolicy::Append => return Err(MergeError::NotAList { field }),
    }
    Ok(())
}

macro_rules! merge_fields {
    ($record:ident, $update:ident;
     lists: [$($list:ident),* $(,)?];
     values: [$($value:ident),* $(,)?];
     optionals: [$($optional:ident),* $(,)?] $(;)?) => {
        $( merge_list(stringify!($list), &mut $record.$list, &$update.$list)?; )*
        $( merge_value(stringify!($value), &mut $record.$value, &$update.$value)?; )*
        $( merge_optional(stringify!($optional), &mut $record.$optional, &$update.$optional)?; )*
    };
}

/// Apply `update` to `record` in place.
///
/// Seed-only fields (attachments, modes, log sample) are never written by
/// stages and pass through untouched.
pub fn apply(record: &mut AuditRecord, update: &RecordUpdate) -> Result<(), MergeError> {
    merge_fields!(record, update;
        lists: [findings, policy_gaps, audit_trail, supply_chain_risks];
        values: [
            risk_level,
            remediation_plan,
            evidence_package,
            retry_count,
            confidence,
            generated_code,
            forecast,
            drift_score,
            policy_amendment,
            integrity_hash,
            sensitivity,
            financial_impact,
            simulation_report,
        ];
        optionals: [simulation_passed, enforcement];
    );
    Ok(())
}

/// Apply `update` to a copy of `record`, returning the merged record.
///
/// The input record is left untouched.
pub fn merge(record: &AuditRecord, update: &RecordUpdate) -> Result<AuditRecord, MergeError> {
    let mut merged = record.clone();
    apply(&mut merged, update)?;
    Ok(merged)
}
