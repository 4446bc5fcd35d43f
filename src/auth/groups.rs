// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relevant-group policy.
//!
//! Only groups listed in `security.oidc.relevant_groups` are ever reported to
//! clients. A relevant group with a non-empty subject list is reported only
//! for those subjects.

use std::collections::{BTreeMap, BTreeSet};

/// Filter `groups` down to the relevant ones `subject` may hold, sorted and deduplicated.
pub fn filter_relevant_groups<'a, I>(
    groups: I,
    subject: &str,
    relevant: &BTreeMap<String, Vec<String>>,
) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    groups
        .into_iter()
        .filter(|group| match relevant.get(group.as_str()) {
            None => false,
            Some(allowed) if allowed.is_empty() => true,
            Some(allowed) => allowed.iter().any(|s| s == subject),
        })
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Relevant groups claimed locally that `confirmed` does not contain.
pub fn unconfirmed_groups<'a>(
    claimed: &'a BTreeSet<String>,
    confirmed: &[String],
    relevant: &BTreeMap<String, Vec<String>>,
) -> Vec<&'a str> {
    claimed
        .iter()
        .filter(|group| relevant.contains_key(group.as_str()))
        .filter(|group| !confirmed.contains(group))
        .map(String::as_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relevant() -> BTreeMap<String, Vec<String>> {
        BTreeMap::from([
            ("staff".to_string(), vec![]),
            ("admin".to_string(), vec!["1234567890".to_string()]),
        ])
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn irrelevant_groups_are_dropped_and_output_sorted() {
        let groups = strings(&["staff", "users", "admin", "staff"]);
        assert_eq!(
            filter_relevant_groups(&groups, "1234567890", &relevant()),
            vec!["admin", "staff"]
        );
    }

    #[test]
    fn allow_list_restricts_group_to_subjects() {
        let groups = strings(&["admin", "staff"]);
        assert_eq!(filter_relevant_groups(&groups, "101", &relevant()), vec!["staff"]);
    }

    #[test]
    fn unconfirmed_reports_missing_relevant_groups_only() {
        let claimed: BTreeSet<String> = ["admin", "staff", "users"].iter().map(|s| s.to_string()).collect();
        let confirmed = strings(&["staff"]);
        assert_eq!(unconfirmed_groups(&claimed, &confirmed, &relevant()), vec!["admin"]);
    }
}
