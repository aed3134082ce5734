//! Per-kind column schemas for bulk CSV import
//!
//! Each `ColumnSchema` declares which canonical columns a record kind accepts,
//! which friendly header names alias onto them, and which columns carry a
//! closed set of categorical values. Every column follows a coerce-or-default
//! contract: malformed input degrades to `null` or the declared default,
//! never to a failed row.

use uuid::Uuid;

use crate::types::ImportKind;

/// Columns whose values must be canonical hyphenated UUIDs
pub const UUID_COLUMNS: &[&str] = &[
    "id",
    "user_id",
    "person_id",
    "event_id",
    "organizer_id",
    "requestor_id",
    "assigned_volunteer_id",
    "donor_id",
];

/// Primary key column; an invalid value removes the key instead of nulling it
pub const PRIMARY_ID_COLUMN: &str = "id";

/// Columns holding `;`-separated lists
pub const LIST_COLUMNS: &[&str] = &["skills"];

pub const LIST_SEPARATOR: char = ';';

// =============================================================================
// CATEGORICAL MAPS
// =============================================================================

/// Remap table and allow-list for a column with a fixed value set
#[derive(Debug)]
pub struct CategoricalMap {
    pub column: &'static str,
    /// Synonym -> allowed value, keys lower-case
    pub remap: &'static [(&'static str, &'static str)],
    pub allowed: &'static [&'static str],
    pub default: &'static str,
    /// Values substituted for a boolean cell (true, false)
    pub from_bool: Option<(&'static str, &'static str)>,
}

impl CategoricalMap {
    /// Normalize free text onto the allow-list, falling back to the default
    pub fn normalize(&self, raw: &str) -> &'static str {
        let clean = raw.trim().to_lowercase();

        if let Some((_, mapped)) = self.remap.iter().find(|(from, _)| *from == clean) {
            return *mapped;
        }

        self.allowed
            .iter()
            .find(|allowed| **allowed == clean)
            .copied()
            .unwrap_or(self.default)
    }

    pub fn normalize_bool(&self, value: bool) -> &'static str {
        match (self.from_bool, value) {
            (Some((on, _)), true) => on,
            (Some((_, off)), false) => off,
            (None, _) => self.default,
        }
    }
}

const EVENT_STATUS: CategoricalMap = CategoricalMap {
    column: "status",
    remap: &[
        ("in progress", "active"),
        ("processing", "active"),
        ("done", "completed"),
        ("finished", "completed"),
        ("passed", "completed"),
        ("stopped", "cancelled"),
        ("inactive", "cancelled"),
    ],
    allowed: &["draft", "active", "completed", "cancelled"],
    default: "draft",
    from_bool: Some(("active", "cancelled")),
};

const EVENT_TYPE: CategoricalMap = CategoricalMap {
    column: "type",
    remap: &[
        ("drive", "donation_drive"),
        ("donation", "donation_drive"),
        ("cleaning", "cleanup"),
        ("urgent", "emergency"),
        ("class", "workshop"),
        ("seminar", "workshop"),
    ],
    allowed: &["donation_drive", "cleanup", "emergency", "workshop", "other"],
    default: "other",
    from_bool: None,
};

const ADMIN_ROLE: CategoricalMap = CategoricalMap {
    column: "role",
    remap: &[
        ("super admin", "super_admin"),
        ("super-admin", "super_admin"),
        ("superadmin", "super_admin"),
        ("administrator", "admin"),
        ("volunteers", "volunteer"),
        ("member", "volunteer"),
    ],
    allowed: &["super_admin", "admin", "volunteer"],
    default: "volunteer",
    from_bool: None,
};

// =============================================================================
// COLUMN SCHEMAS
// =============================================================================

/// Accepted columns, header aliases and categorical maps of one record kind
#[derive(Debug)]
pub struct ColumnSchema {
    pub kind: ImportKind,
    pub valid_columns: &'static [&'static str],
    /// Friendly header (lower-case) -> canonical column
    pub aliases: &'static [(&'static str, &'static str)],
    pub categorical: &'static [CategoricalMap],
}

static PEOPLE_SCHEMA: ColumnSchema = ColumnSchema {
    kind: ImportKind::People,
    valid_columns: &[
        "id",
        "user_id",
        "full_name",
        "first_name",
        "middle_name",
        "last_name",
        "email",
        "phone",
        "address_line",
        "locality_area",
        "blood_group",
        "is_blood_donor",
        "last_donation_date",
        "is_volunteer",
        "skills",
        "marital_status",
        "children_count",
    ],
    aliases: &[
        ("name", "full_name"),
        ("full name", "full_name"),
        ("person_id", "id"),
        ("mobile", "phone"),
        ("phone_number", "phone"),
        ("email_address", "email"),
        ("address", "address_line"),
        ("area", "locality_area"),
        ("locality", "locality_area"),
        ("blood_type", "blood_group"),
        ("volunteer", "is_volunteer"),
        ("blood_donor", "is_blood_donor"),
    ],
    categorical: &[],
};

static EVENTS_SCHEMA: ColumnSchema = ColumnSchema {
    kind: ImportKind::Events,
    valid_columns: &[
        "id",
        "title",
        "description",
        "start_time",
        "end_time",
        "type",
        "status",
        "location_name",
        "organizer_id",
    ],
    aliases: &[
        ("event_name", "title"),
        ("name", "title"),
        ("city", "location_name"),
        ("area", "location_name"),
        ("location", "location_name"),
        ("event_date", "start_time"),
        ("date", "start_time"),
        ("event_id", "id"),
        ("event_type", "type"),
        ("is_active", "status"),
    ],
    categorical: &[EVENT_STATUS, EVENT_TYPE],
};

static ATTENDANCE_SCHEMA: ColumnSchema = ColumnSchema {
    kind: ImportKind::Attendance,
    valid_columns: &["event_id", "person_id", "role", "status"],
    aliases: &[
        ("participant_id", "person_id"),
        ("attendee_id", "person_id"),
    ],
    categorical: &[],
};

static ADMINS_SCHEMA: ColumnSchema = ColumnSchema {
    kind: ImportKind::Admins,
    valid_columns: &["id", "user_id", "person_id", "role", "department"],
    aliases: &[
        ("admin_role", "role"),
        ("dept", "department"),
    ],
    categorical: &[ADMIN_ROLE],
};

impl ColumnSchema {
    pub fn for_kind(kind: ImportKind) -> &'static ColumnSchema {
        match kind {
            ImportKind::People => &PEOPLE_SCHEMA,
            ImportKind::Events => &EVENTS_SCHEMA,
            ImportKind::Attendance => &ATTENDANCE_SCHEMA,
            ImportKind::Admins => &ADMINS_SCHEMA,
        }
    }

    /// Resolve a raw header to its canonical column name.
    ///
    /// Lookup is case-insensitive; headers without an alias pass through
    /// trimmed but otherwise unchanged. Aliases are not chained.
    pub fn canonical_header(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        let key = trimmed.to_lowercase();

        self.aliases
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, canonical)| canonical.to_string())
            .unwrap_or_else(|| trimmed.to_string())
    }

    pub fn is_valid_column(&self, column: &str) -> bool {
        self.valid_columns.contains(&column)
    }

    pub fn categorical(&self, column: &str) -> Option<&'static CategoricalMap> {
        self.categorical.iter().find(|map| map.column == column)
    }
}

pub fn is_uuid_column(column: &str) -> bool {
    UUID_COLUMNS.contains(&column)
}

pub fn is_list_column(column: &str) -> bool {
    LIST_COLUMNS.contains(&column)
}

/// True only for the 8-4-4-4-12 hex form, any case
pub fn is_canonical_uuid(value: &str) -> bool {
    // uuid also accepts simple, braced and urn forms; only the 36-char form is hyphenated
    value.len() == 36 && Uuid::try_parse(value).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_lookup_is_case_insensitive() {
        let schema = ColumnSchema::for_kind(ImportKind::Events);
        assert_eq!(schema.canonical_header("Event_Name"), "title");
        assert_eq!(schema.canonical_header("  CITY "), "location_name");
        assert_eq!(schema.canonical_header("description"), "description");
    }

    #[test]
    fn test_unaliased_header_passes_through_unchanged() {
        let schema = ColumnSchema::for_kind(ImportKind::People);
        assert_eq!(schema.canonical_header(" Nickname "), "Nickname");
    }

    #[test]
    fn test_aliasing_is_idempotent_for_every_kind() {
        for kind in ImportKind::ALL {
            let schema = ColumnSchema::for_kind(kind);
            for (alias, _) in schema.aliases {
                let once = schema.canonical_header(alias);
                let twice = schema.canonical_header(&once);
                assert_eq!(once, twice, "alias '{}' chains for {}", alias, kind);
            }
            for column in schema.valid_columns {
                assert_eq!(schema.canonical_header(column), *column);
            }
        }
    }

    #[test]
    fn test_aliases_target_valid_columns() {
        for kind in ImportKind::ALL {
            let schema = ColumnSchema::for_kind(kind);
            for (alias, canonical) in schema.aliases {
                assert!(
                    schema.is_valid_column(canonical),
                    "alias '{}' -> '{}' is not a valid {} column",
                    alias, canonical, kind
                );
            }
        }
    }

    #[test]
    fn test_categorical_targets_are_allowed() {
        for kind in ImportKind::ALL {
            for map in ColumnSchema::for_kind(kind).categorical {
                assert!(map.allowed.contains(&map.default));
                for (_, to) in map.remap {
                    assert!(map.allowed.contains(to), "{} remaps onto disallowed '{}'", map.column, to);
                }
                if let Some((on, off)) = map.from_bool {
                    assert!(map.allowed.contains(&on) && map.allowed.contains(&off));
                }
            }
        }
    }

    #[test]
    fn test_event_status_normalization() {
        let status = ColumnSchema::for_kind(ImportKind::Events).categorical("status").unwrap();
        assert_eq!(status.normalize("In Progress"), "active");
        assert_eq!(status.normalize(" DONE "), "completed");
        assert_eq!(status.normalize("cancelled"), "cancelled");
        assert_eq!(status.normalize("bogus"), "draft");
        assert_eq!(status.normalize_bool(true), "active");
        assert_eq!(status.normalize_bool(false), "cancelled");
    }

    #[test]
    fn test_event_type_normalization() {
        let kind = ColumnSchema::for_kind(ImportKind::Events).categorical("type").unwrap();
        assert_eq!(kind.normalize("Seminar"), "workshop");
        assert_eq!(kind.normalize("cleanup"), "cleanup");
        assert_eq!(kind.normalize("parade"), "other");
        assert_eq!(kind.normalize_bool(true), "other");
    }

    #[test]
    fn test_admin_role_spellings_collapse_to_super_admin() {
        let role = ColumnSchema::for_kind(ImportKind::Admins).categorical("role").unwrap();
        assert_eq!(role.normalize("Super Admin"), "super_admin");
        assert_eq!(role.normalize("SUPERADMIN"), "super_admin");
        assert_eq!(role.normalize("administrator"), "admin");
        assert_eq!(role.normalize("owner"), "volunteer");
    }

    #[test]
    fn test_status_is_only_categorical_for_events() {
        assert!(ColumnSchema::for_kind(ImportKind::Events).categorical("status").is_some());
        assert!(ColumnSchema::for_kind(ImportKind::Attendance).categorical("status").is_none());
    }

    #[test]
    fn test_canonical_uuid_validation() {
        assert!(is_canonical_uuid("123e4567-e89b-12d3-a456-426614174000"));
        assert!(is_canonical_uuid("123E4567-E89B-12D3-A456-426614174000"));
        assert!(!is_canonical_uuid("123e4567e89b12d3a456426614174000"));
        assert!(!is_canonical_uuid("{123e4567-e89b-12d3-a456-426614174000}"));
        assert!(!is_canonical_uuid("urn:uuid:123e4567-e89b-12d3-a456-426614174000"));
        assert!(!is_canonical_uuid("not-a-uuid"));
        assert!(!is_canonical_uuid("uuid-of-event"));
    }
}
