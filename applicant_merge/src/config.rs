// ********* Input data structures ***********

use std::collections::HashMap;
use std::error::Error;
use std::fmt::Display;

use chrono::NaiveDateTime;

/// A single scalar in a table.
///
/// The absence of a value is never represented here: cells are `Option<Value>`
/// and `None` is the only way to say "no value".
#[derive(Eq, PartialEq, Debug, Clone, Hash, PartialOrd, Ord)]
pub enum Value {
    Text(String),
    Timestamp(NaiveDateTime),
}

pub const TIMESTAMP_DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

impl Value {
    pub fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    /// The textual rendition of the value, as it would be written to a sheet.
    pub fn as_text(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Timestamp(ts) => ts.format(TIMESTAMP_DISPLAY_FORMAT).to_string(),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_text())
    }
}

pub type Cell = Option<Value>;

/// A table as read from one source: the labels of the header row and the data rows.
///
/// Every row has exactly as many cells as there are header labels.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct RawTable {
    pub(crate) header: Vec<String>,
    pub(crate) rows: Vec<Vec<Cell>>,
}

impl RawTable {
    /// Builds a table, padding short rows with no-values and cutting long ones.
    pub fn new(header: Vec<String>, rows: Vec<Vec<Cell>>) -> RawTable {
        let width = header.len();
        let rows = rows
            .into_iter()
            .map(|mut r| {
                r.resize(width, None);
                r
            })
            .collect();
        RawTable { header, rows }
    }

    /// Builds a table from plain strings. Empty strings become no-values.
    pub fn from_strings(header: &[&str], rows: &[Vec<&str>]) -> RawTable {
        RawTable::new(
            header.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| {
                    r.iter()
                        .map(|s| {
                            if s.is_empty() {
                                None
                            } else {
                                Some(Value::text(s))
                            }
                        })
                        .collect()
                })
                .collect(),
        )
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

// ********* Schema **********

/// Selects the normalization applied to a canonical field.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum FieldKind {
    /// Left untouched by the mapper.
    Timestamp,
    Phone,
    /// Identity numbers, postal codes, tax numbers: whitespace is removed.
    IdLike,
    /// Names, addresses, bank details: trimmed and title-cased.
    Text,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(name: &str, kind: FieldKind) -> FieldSpec {
        FieldSpec {
            name: name.to_string(),
            kind,
        }
    }
}

/// Maps normalized header tokens to canonical field names (many to one).
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct AliasMap {
    entries: HashMap<String, String>,
}

impl AliasMap {
    pub fn new() -> AliasMap {
        AliasMap::default()
    }

    /// Adds an alias. The token is expected to be already normalized.
    pub fn insert(&mut self, token: &str, canonical: &str) {
        self.entries
            .insert(token.to_string(), canonical.to_string());
    }

    pub fn with(mut self, token: &str, canonical: &str) -> AliasMap {
        self.insert(token, canonical);
        self
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.entries.get(token).map(|s| s.as_str())
    }

    /// Adds all the entries of the other map, overriding existing tokens.
    pub fn extend(&mut self, other: &AliasMap) {
        for (k, v) in other.entries.iter() {
            self.entries.insert(k.clone(), v.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The fixed set of output fields, the aliases that map onto them, and the
/// fields that carry identity.
///
/// A schema is passed explicitly to every operation, so that several
/// versions can be used side by side.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Schema {
    pub fields: Vec<FieldSpec>,
    pub aliases: AliasMap,
    /// The field identifying one applicant across sources.
    pub key: String,
    /// Fields that must be present as columns before persisting.
    pub required: Vec<String>,
}

pub const ID_NUMBER: &str = "id_number";
pub const TIMESTAMP: &str = "timestamp";

const APPLICANT_FIELDS: &[(&str, FieldKind)] = &[
    (TIMESTAMP, FieldKind::Timestamp),
    ("first_names", FieldKind::Text),
    ("surname", FieldKind::Text),
    (ID_NUMBER, FieldKind::IdLike),
    ("contact_number", FieldKind::Phone),
    ("alternate_contact_number", FieldKind::Phone),
    ("email", FieldKind::Text),
    ("street_address", FieldKind::Text),
    ("suburb", FieldKind::Text),
    ("city", FieldKind::Text),
    ("province", FieldKind::Text),
    ("postal_code", FieldKind::IdLike),
    ("sars_number", FieldKind::IdLike),
    ("beneficiary_number", FieldKind::IdLike),
    ("banking_institution", FieldKind::Text),
    ("bank_account_number", FieldKind::Text),
    ("account_type", FieldKind::Text),
];

// The header variants found on the intake forms.
const APPLICANT_ALIASES: &[(&str, &str)] = &[
    ("timestamp", "timestamp"),
    ("last_updated", "timestamp"),
    ("surname", "surname"),
    ("last_name", "surname"),
    ("first_names", "first_names"),
    ("first_name", "first_names"),
    ("id_number", "id_number"),
    ("id", "id_number"),
    ("identity_number", "id_number"),
    ("south_african_id_number", "id_number"),
    ("email", "email"),
    ("email_address", "email"),
    ("street_address", "street_address"),
    ("street", "street_address"),
    ("residential_street_address", "street_address"),
    ("permanent_home_address", "street_address"),
    ("suburb", "suburb"),
    ("suburb_township", "suburb"),
    ("residential_suburb", "suburb"),
    ("citytown", "city"),
    ("city_town", "city"),
    ("residential_citytown", "city"),
    ("code", "postal_code"),
    ("post_code", "postal_code"),
    ("postal_code", "postal_code"),
    ("province", "province"),
    ("contact_number", "contact_number"),
    ("cellphone", "contact_number"),
    ("cellular_numbers", "contact_number"),
    ("whatsapp_number", "alternate_contact_number"),
    ("secondary_contact_number", "alternate_contact_number"),
    ("telephone", "alternate_contact_number"),
    ("sars_tax_number", "sars_number"),
    ("sars_number", "sars_number"),
    ("sars_number_if_you_have_one", "sars_number"),
    ("beneficiary_number", "beneficiary_number"),
    ("banking_institution", "banking_institution"),
    ("bank_account_number", "bank_account_number"),
    ("account_type", "account_type"),
    ("bank_account_type", "account_type"),
];

impl Schema {
    pub fn new(fields: Vec<FieldSpec>, aliases: AliasMap, key: &str, required: &[&str]) -> Schema {
        Schema {
            fields,
            aliases,
            key: key.to_string(),
            required: required.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// The 17-field applicant schema used by the intake forms.
    pub fn applicant() -> Schema {
        let fields = APPLICANT_FIELDS
            .iter()
            .map(|(name, kind)| FieldSpec::new(name, *kind))
            .collect();
        let mut aliases = AliasMap::new();
        for (token, canonical) in APPLICANT_ALIASES.iter() {
            aliases.insert(token, canonical);
        }
        Schema::new(
            fields,
            aliases,
            ID_NUMBER,
            &[ID_NUMBER, "first_names", "surname"],
        )
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn key_position(&self) -> Option<usize> {
        self.position(&self.key)
    }

    pub fn width(&self) -> usize {
        self.fields.len()
    }
}

impl Default for Schema {
    fn default() -> Schema {
        Schema::applicant()
    }
}

// ******** Errors *********

/// Reasons for refusing to persist a merged table.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ValidationError {
    EmptyTable,
    MissingColumns(Vec<String>),
    AllKeysMissing(String),
    AllKeysBlank(String),
}

impl Error for ValidationError {}

impl Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::EmptyTable => write!(f, "the merged table is empty"),
            ValidationError::MissingColumns(cols) => {
                write!(f, "the merged table is missing required columns: {:?}", cols)
            }
            ValidationError::AllKeysMissing(key) => {
                write!(f, "every value of the key column {} is missing", key)
            }
            ValidationError::AllKeysBlank(key) => {
                write!(f, "every value of the key column {} is blank", key)
            }
        }
    }
}

/// Errors raised while preparing the raw table of one source.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum LoadError {
    /// The configured unique key does not name any column of the header.
    MissingUniqueColumn { unique_field: String, header: Vec<String> },
}

impl Error for LoadError {}

impl Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::MissingUniqueColumn {
                unique_field,
                header,
            } => write!(
                f,
                "unique field {:?} not found in header {:?}",
                unique_field, header
            ),
        }
    }
}
