//! Duplicate-key escalation.
//!
//! Records sharing a baseline key are re-keyed by appending the configured
//! extra columns one at a time, in configured order. An extra is appended to
//! a still-colliding sub-group only when it splits that sub-group; records
//! that end up alone are resolved and keep the escalated key. Whatever still
//! collides once the extras run out is reported as an unresolved group.
//!
//! Records are grouped on key components rather than on the joined key, and
//! keys are assigned into a fresh vector; the input set is never mutated.

use std::collections::HashMap;
use std::hash::Hash;

use log::debug;

use crate::error::ReconError;
use crate::key::{join_key, sanitize_column, KeyBuilder};
use crate::model::{CollisionGroup, KeyAssignment, KeyedRecord, RecordSet, ResolvedCollision};

struct SubGroup {
    builder: KeyBuilder,
    used_extras: Vec<String>,
    members: Vec<usize>,
}

/// Assign a final key to every record of `set`.
pub fn resolve<S: AsRef<str>>(
    set: &RecordSet,
    unique_columns: &[S],
    extra_columns: &[S],
) -> Result<KeyAssignment, ReconError> {
    let base = KeyBuilder::for_set(set, unique_columns)?;

    let extras: Vec<&str> = extra_columns
        .iter()
        .map(|c| sanitize_column(c.as_ref()))
        .filter(|c| {
            let present = set.has_column(c);
            if !present {
                debug!("{} extra check '{c}' not in schema, skipped", set.kind());
            }
            present
        })
        .collect();

    let mut keys: Vec<Vec<String>> = set.records().iter().map(|r| base.parts(r)).collect();
    let mut resolved = Vec::new();
    let mut unresolved = Vec::new();

    for (baseline, members) in collisions(&keys) {
        let baseline_key = join_key(&baseline);
        let mut pending = vec![SubGroup {
            builder: base.clone(),
            used_extras: Vec::new(),
            members,
        }];

        for extra in &extras {
            if pending.is_empty() {
                break;
            }
            let mut next = Vec::new();
            for sub in pending {
                let candidate = sub.builder.with_column(extra);
                let parts = partition(
                    sub.members.iter().map(|&i| (i, candidate.parts(&set.records()[i]))),
                );
                if parts.len() == 1 {
                    // This extra cannot tell the sub-group apart.
                    next.push(sub);
                    continue;
                }

                let mut used_extras = sub.used_extras.clone();
                used_extras.push(extra.to_string());

                for (key, part) in parts {
                    if part.len() == 1 {
                        let index = part[0];
                        resolved.push(ResolvedCollision {
                            index,
                            baseline_key: baseline_key.clone(),
                            escalated_key: join_key(&key),
                            used_extras: used_extras.clone(),
                        });
                        keys[index] = key;
                    } else {
                        for &i in &part {
                            keys[i] = key.clone();
                        }
                        next.push(SubGroup {
                            builder: candidate.clone(),
                            used_extras: used_extras.clone(),
                            members: part,
                        });
                    }
                }
            }
            pending = next;
        }

        for sub in pending {
            unresolved.push(CollisionGroup {
                key: join_key(&keys[sub.members[0]]),
                columns: sub.builder.columns().to_vec(),
                used_extras: sub.used_extras,
                members: sub.members,
            });
        }
    }

    resolved.sort_by_key(|r| r.index);
    unresolved.sort_by_key(|g| g.members[0]);

    debug!(
        "{} keys over {:?}: {} collisions resolved, {} groups still colliding",
        set.kind(),
        base.columns(),
        resolved.len(),
        unresolved.len()
    );

    Ok(KeyAssignment {
        kind: set.kind(),
        key_columns: base.columns().to_vec(),
        keys: keys
            .into_iter()
            .enumerate()
            .map(|(index, parts)| KeyedRecord { index, key: join_key(&parts) })
            .collect(),
        resolved,
        unresolved,
    })
}

/// Groups of indices sharing key components, with more than one member.
/// Ordered by first member index.
fn collisions(keys: &[Vec<String>]) -> Vec<(Vec<String>, Vec<usize>)> {
    partition(keys.iter().cloned().enumerate())
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .collect()
}

/// Partition `(index, key)` pairs by key, preserving first-appearance order
/// of keys and input order within each part.
fn partition<K>(items: impl Iterator<Item = (usize, K)>) -> Vec<(K, Vec<usize>)>
where
    K: Hash + Eq + Clone,
{
    let mut slots: HashMap<K, usize> = HashMap::new();
    let mut parts: Vec<(K, Vec<usize>)> = Vec::new();
    for (index, key) in items {
        match slots.get(&key) {
            Some(&slot) => parts[slot].1.push(index),
            None => {
                slots.insert(key.clone(), parts.len());
                parts.push((key, vec![index]));
            }
        }
    }
    parts
}
