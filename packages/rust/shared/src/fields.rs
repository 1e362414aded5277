//! Well-known fields and the two-way field-name casing used between uploaded
//! headers (`"First name"`) and stored columns (`first_name`).
//!
//! Uploaded files and reloaded tables disagree on casing (`"User role"` vs
//! `"User Role"`), so well-known fields are always looked up through
//! [`Field::matches`] rather than by exact header text.

use serde::{Deserialize, Serialize};

/// Fields the classifier and report builder know by meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    FirstName,
    LastName,
    Email,
    Description,
    UserRole,
    InvitedByEmail,
    /// Invitation status column; displayed as `Has Used`.
    AcceptedSiteInvitation,
    /// Derived organization label.
    Org,
}

impl Field {
    /// Stored columns every records table must have, whatever the upload
    /// provides.
    pub const REQUIRED: [Field; 7] = [
        Field::FirstName,
        Field::LastName,
        Field::Email,
        Field::UserRole,
        Field::AcceptedSiteInvitation,
        Field::Description,
        Field::Org,
    ];

    /// Default columns of the table/PDF views, in display order.
    pub const DISPLAY: [Field; 6] = [
        Field::Org,
        Field::FirstName,
        Field::LastName,
        Field::Email,
        Field::Description,
        Field::AcceptedSiteInvitation,
    ];

    /// Normalized name used for matching (see [`normalize_header`]).
    fn canonical(self) -> &'static str {
        match self {
            Field::FirstName => "first name",
            Field::LastName => "last name",
            Field::Email => "email",
            Field::Description => "description",
            Field::UserRole => "user role",
            Field::InvitedByEmail => "invited by email",
            Field::AcceptedSiteInvitation => "accepted site invitation",
            Field::Org => "org",
        }
    }

    /// Human-facing column header.
    pub fn label(self) -> &'static str {
        match self {
            Field::FirstName => "First name",
            Field::LastName => "Last name",
            Field::Email => "Email",
            Field::Description => "Description",
            Field::UserRole => "User role",
            Field::InvitedByEmail => "Invited by email",
            Field::AcceptedSiteInvitation => "Has Used",
            Field::Org => "Org",
        }
    }

    /// Column name in the records table.
    pub fn storage_name(self) -> String {
        self.canonical().replace(' ', "_")
    }

    /// Whether a header/column name refers to this field.
    pub fn matches(self, name: &str) -> bool {
        let normalized = normalize_header(name);
        if normalized == self.canonical() {
            return true;
        }
        self == Field::AcceptedSiteInvitation && normalized == "has used"
    }

    /// Resolve a header to a well-known field, if it is one.
    pub fn from_header(name: &str) -> Option<Field> {
        const ALL: [Field; 8] = [
            Field::FirstName,
            Field::LastName,
            Field::Email,
            Field::Description,
            Field::UserRole,
            Field::InvitedByEmail,
            Field::AcceptedSiteInvitation,
            Field::Org,
        ];
        ALL.into_iter().find(|f| f.matches(name))
    }
}

/// Lower-case, treat `_` as a space, collapse runs of whitespace.
pub fn normalize_header(name: &str) -> String {
    name.replace('_', " ")
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Column name used for a header when writing to storage: lower-cased with
/// spaces joined by underscores. Status-column aliases collapse to the one
/// canonical column.
pub fn storage_field_name(header: &str) -> String {
    if Field::AcceptedSiteInvitation.matches(header) {
        return Field::AcceptedSiteInvitation.storage_name();
    }
    header.trim().to_lowercase().replace(' ', "_")
}

/// Header shown for a stored column: title-cased with underscores turned
/// back into spaces, except the status column which is always `Has Used`.
pub fn display_field_name(stored: &str) -> String {
    if Field::AcceptedSiteInvitation.matches(stored) {
        return Field::AcceptedSiteInvitation.label().to_string();
    }
    title_case(stored).replace('_', " ")
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if prev_alpha {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_alpha = c.is_alphabetic();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_side_casing() {
        assert_eq!(storage_field_name("First name"), "first_name");
        assert_eq!(storage_field_name("  Invited by email "), "invited_by_email");
        assert_eq!(storage_field_name("Org"), "org");
    }

    #[test]
    fn read_side_casing() {
        assert_eq!(display_field_name("first_name"), "First Name");
        assert_eq!(display_field_name("org"), "Org");
        assert_eq!(display_field_name("user_role"), "User Role");
    }

    #[test]
    fn status_column_always_displays_as_has_used() {
        for name in [
            "accepted_site_invitation",
            "Accepted site invitation",
            "ACCEPTED  SITE_INVITATION",
            "Has Used",
        ] {
            assert_eq!(display_field_name(name), "Has Used", "{name}");
            assert_eq!(storage_field_name(name), "accepted_site_invitation", "{name}");
        }
    }

    #[test]
    fn field_lookup_tolerates_casing_drift() {
        assert!(Field::UserRole.matches("User role"));
        assert!(Field::UserRole.matches("User Role"));
        assert!(Field::UserRole.matches("user_role"));
        assert!(!Field::UserRole.matches("Role"));
        assert_eq!(Field::from_header("Invited By Email"), Some(Field::InvitedByEmail));
        assert_eq!(Field::from_header("Phone"), None);
    }

    #[test]
    fn title_case_matches_word_boundaries() {
        assert_eq!(title_case("first_name"), "First_Name");
        assert_eq!(title_case("WARD 3rd"), "Ward 3Rd");
    }
}
