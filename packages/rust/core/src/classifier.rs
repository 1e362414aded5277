//! Organization classification rule cascade.
//!
//! Rules, first match wins:
//! 1. empty/null Description → `(blank org)`
//! 2. role `Manager`, or Description contains "stake" (any case) → `Stake`
//! 3. invited by a known FM address, or role `Adminstrator` → `FM`
//! 4. otherwise the leading word of Description
//!
//! Role and address checks are exact; only the "stake" check folds case.

use std::sync::LazyLock;

use inviteboard_shared::{Field, OrgLabel, Record};
use regex::Regex;

/// Inviters whose invitees belong to FM.
pub const FM_INVITERS: [&str; 2] = [
    "jdwheeler@churchofjesuschrist.org",
    "ron.saunders@churchofjesuschrist.org",
];

/// Role that always classifies as Stake.
pub const STAKE_ROLE: &str = "Manager";

/// Role that classifies as FM. The spelling matches the upstream export.
pub const FM_ROLE: &str = "Adminstrator";

static PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+)").expect("valid regex")
});

/// Classify one record. Never fails; missing fields read as empty.
pub fn classify(record: &Record) -> OrgLabel {
    let description = record.field_or_empty(Field::Description);
    if description.is_empty() {
        return OrgLabel::Blank;
    }

    // A description starting with whitespace has no prefix, but the role
    // rules below still apply to it.
    let prefix = PREFIX_RE
        .captures(description)
        .and_then(|c| c.get(1))
        .map(|m| OrgLabel::Prefix(m.as_str().to_string()))
        .unwrap_or(OrgLabel::Blank);

    let role = record.field_or_empty(Field::UserRole);
    if role == STAKE_ROLE || description.to_lowercase().contains("stake") {
        return OrgLabel::Stake;
    }

    let inviter = record.field_or_empty(Field::InvitedByEmail);
    if FM_INVITERS.contains(&inviter) || role == FM_ROLE {
        return OrgLabel::Fm;
    }

    prefix
}

/// Classify every record in place, writing the `Org` field.
pub fn classify_all(records: &mut [Record]) {
    for record in records.iter_mut() {
        let label = classify(record);
        record.set_org(&label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(description: Option<&str>, role: Option<&str>, inviter: Option<&str>) -> Record {
        Record::from_cells([
            ("First name", Some("Test".to_string())),
            ("Description", description.map(String::from)),
            ("User role", role.map(String::from)),
            ("Invited by email", inviter.map(String::from)),
        ])
    }

    #[test]
    fn blank_description_is_blank_org() {
        assert_eq!(classify(&rec(None, None, None)), OrgLabel::Blank);
        assert_eq!(classify(&rec(Some(""), Some("Manager"), None)), OrgLabel::Blank);
        assert_eq!(classify(&Record::new()), OrgLabel::Blank);
    }

    #[test]
    fn manager_is_stake_regardless_of_other_fields() {
        let r = rec(Some("Ward5 clerk"), Some("Manager"), Some(FM_INVITERS[0]));
        assert_eq!(classify(&r), OrgLabel::Stake);
    }

    #[test]
    fn stake_substring_any_case() {
        for desc in ["Stake Relief Society", "North STAKE office", "mistake-prone"] {
            let r = rec(Some(desc), Some("Member"), None);
            assert_eq!(classify(&r), OrgLabel::Stake, "{desc}");
        }
    }

    #[test]
    fn stake_beats_fm() {
        let r = rec(Some("stake clerk"), Some(FM_ROLE), Some(FM_INVITERS[1]));
        assert_eq!(classify(&r), OrgLabel::Stake);
    }

    #[test]
    fn allow_listed_inviter_is_fm() {
        for inviter in FM_INVITERS {
            let r = rec(Some("Ward3 library"), Some("Member"), Some(inviter));
            assert_eq!(classify(&r), OrgLabel::Fm);
        }
    }

    #[test]
    fn misspelled_admin_role_is_fm_but_correct_spelling_is_not() {
        let r = rec(Some("Ward3 office"), Some("Adminstrator"), None);
        assert_eq!(classify(&r), OrgLabel::Fm);

        let r = rec(Some("Ward3 office"), Some("Administrator"), None);
        assert_eq!(classify(&r), OrgLabel::Prefix("Ward3".into()));
    }

    #[test]
    fn exact_matching_for_roles_and_addresses() {
        let r = rec(Some("Ward1 x"), Some("manager"), None);
        assert_eq!(classify(&r), OrgLabel::Prefix("Ward1".into()));

        let r = rec(Some("Ward1 x"), None, Some("JDWheeler@churchofjesuschrist.org"));
        assert_eq!(classify(&r), OrgLabel::Prefix("Ward1".into()));
    }

    #[test]
    fn prefix_is_first_word_verbatim() {
        let r = rec(Some("Ward123 extra text"), Some("Member"), Some("someone@example.org"));
        assert_eq!(classify(&r), OrgLabel::Prefix("Ward123".into()));

        let r = rec(Some("bishopric\tcounselor"), None, None);
        assert_eq!(classify(&r).to_string(), "bishopric");
    }

    #[test]
    fn leading_whitespace_has_no_prefix_but_role_rules_apply() {
        assert_eq!(classify(&rec(Some("  Ward1"), None, None)), OrgLabel::Blank);
        assert_eq!(classify(&rec(Some("  Ward1"), Some(FM_ROLE), None)), OrgLabel::Fm);
    }

    #[test]
    fn reloaded_header_casing_is_understood() {
        let r = Record::from_cells([
            ("Description", Some("Ward2 x".to_string())),
            ("User Role", Some("Manager".to_string())),
        ]);
        assert_eq!(classify(&r), OrgLabel::Stake);
    }

    #[test]
    fn classify_all_writes_org_column() {
        let mut records = vec![
            rec(Some("Stake Relief Society"), None, None),
            rec(Some("Ward7 x"), Some("Adminstrator"), None),
            rec(None, None, None),
        ];
        classify_all(&mut records);
        let orgs: Vec<_> = records.iter().map(|r| r.get("Org").map(String::from)).collect();
        assert_eq!(
            orgs,
            vec![
                Some("Stake".to_string()),
                Some("FM".to_string()),
                Some("(blank org)".to_string())
            ]
        );
    }
}
