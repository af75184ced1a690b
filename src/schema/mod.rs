// Entity schema descriptors
//
// Every table the API exposes is declared here as static data: its writable
// columns, slug rule, attachment fields, dependent tables and list behavior.
// The repository and query builder are generic over these descriptors; adding
// an entity to the registry is the whole job of adding an endpoint.

pub mod registry;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::slug::SlugPolicy;

/// Storage type of a writable column. Multipart fields arrive as strings and
/// are coerced to this type before binding; JSON bodies may carry the native
/// type directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    BigInt,
    Bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub ty: ColumnType,
    pub required: bool,
}

impl ColumnSpec {
    pub const fn required(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            required: false,
        }
    }

    /// Coerce a request value to this column's storage type. Empty strings on
    /// numeric and boolean columns read as "not selected" and become NULL,
    /// which is what HTML form submissions send for an untouched input.
    pub fn coerce(&self, value: Value) -> Result<Value, String> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match self.ty {
            ColumnType::Text => match value {
                Value::String(s) => Ok(Value::String(s)),
                other => Err(format!(
                    "field '{}' expects a string, got {}",
                    self.name,
                    json_type_name(&other)
                )),
            },
            ColumnType::BigInt => match value {
                Value::Number(ref n) => match n.as_i64() {
                    Some(i) => Ok(Value::from(i)),
                    None => Err(format!("field '{}' expects an integer", self.name)),
                },
                Value::String(s) => {
                    let trimmed = s.trim();
                    if trimmed.is_empty() {
                        return Ok(Value::Null);
                    }
                    trimmed
                        .parse::<i64>()
                        .map(Value::from)
                        .map_err(|_| format!("field '{}' expects an integer", self.name))
                }
                other => Err(format!(
                    "field '{}' expects an integer, got {}",
                    self.name,
                    json_type_name(&other)
                )),
            },
            ColumnType::Bool => match value {
                Value::Bool(b) => Ok(Value::Bool(b)),
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "" => Ok(Value::Null),
                    "true" | "1" | "on" | "yes" => Ok(Value::Bool(true)),
                    "false" | "0" | "off" | "no" => Ok(Value::Bool(false)),
                    other => Err(format!(
                        "field '{}' expects a boolean, got '{}'",
                        self.name, other
                    )),
                },
                other => Err(format!(
                    "field '{}' expects a boolean, got {}",
                    self.name,
                    json_type_name(&other)
                )),
            },
        }
    }
}

/// Lowercase hex SHA-256 digest; used for stored passwords.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Extra per-column write rule applied after type coercion.
#[derive(Debug, Clone, Copy)]
pub enum ColumnRule {
    /// Hash the incoming value with SHA-256 before storing (user passwords).
    Sha256Hex,
    /// Value must be one of the listed tags.
    OneOf(&'static [&'static str]),
    /// Value must parse as an absolute URL.
    Url,
}

impl ColumnRule {
    pub fn apply(&self, column: &str, value: Value) -> Result<Value, String> {
        if value.is_null() {
            return Ok(value);
        }
        match self {
            ColumnRule::Sha256Hex => match value {
                Value::String(s) => Ok(Value::String(sha256_hex(&s))),
                _ => Err(format!("field '{}' expects a string", column)),
            },
            ColumnRule::OneOf(allowed) => match value {
                Value::String(ref s) if allowed.contains(&s.as_str()) => Ok(value),
                _ => Err(format!(
                    "field '{}' must be one of: {}",
                    column,
                    allowed.join(", ")
                )),
            },
            ColumnRule::Url => match value {
                Value::String(ref s) => match url::Url::parse(s) {
                    Ok(_) => Ok(value),
                    Err(_) => Err(format!("field '{}' is not a valid URL", column)),
                },
                _ => Err(format!("field '{}' expects a URL string", column)),
            },
        }
    }
}

/// A column that stores the web path of an uploaded file.
#[derive(Debug, Clone, Copy)]
pub struct AttachmentField {
    pub column: &'static str,
    /// Required prefix of every stored path; release calls refuse anything else.
    pub prefix: &'static str,
}

impl AttachmentField {
    /// Directory under the upload root, derived from the web prefix.
    pub fn folder(&self) -> &'static str {
        self.prefix
            .trim_start_matches(crate::storage::WEB_PREFIX)
            .trim_matches('/')
    }
}

/// LEFT JOIN pulled into list and single reads.
#[derive(Debug, Clone, Copy)]
pub struct JoinSpec {
    pub table: &'static str,
    /// Column on the entity table holding the foreign id.
    pub local: &'static str,
    /// Key column on the joined table.
    pub foreign: &'static str,
    /// Joined columns exposed on the entity: (column, alias).
    pub select: &'static [(&'static str, &'static str)],
}

/// How rows of a dependent table are produced from the write payload.
#[derive(Debug, Clone, Copy)]
pub enum DependentKind {
    /// Many-to-many link rows from an id-array field; replaced on update.
    Link {
        payload_field: &'static str,
        link_column: &'static str,
    },
    /// Child rows from uploaded files, ordered; appended on update.
    Media {
        payload_field: &'static str,
        path_column: &'static str,
        ordinal_column: &'static str,
        prefix: &'static str,
    },
    /// Child rows from an array of objects; replaced on update.
    Items {
        payload_field: &'static str,
        columns: &'static [ColumnSpec],
        ordinal_column: &'static str,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct DependentTable {
    pub table: &'static str,
    pub parent_column: &'static str,
    pub kind: DependentKind,
}

impl DependentTable {
    pub fn payload_field(&self) -> &'static str {
        match self.kind {
            DependentKind::Link { payload_field, .. }
            | DependentKind::Media { payload_field, .. }
            | DependentKind::Items { payload_field, .. } => payload_field,
        }
    }

    /// Dependent kinds whose rows can be deleted one by one.
    pub fn supports_item_delete(&self) -> bool {
        !matches!(self.kind, DependentKind::Link { .. })
    }
}

/// A table referencing this entity, consulted during delete.
#[derive(Debug, Clone, Copy)]
pub struct ReferencingTable {
    pub table: &'static str,
    pub column: &'static str,
    /// Extra equality constraint, e.g. comments.parent_kind = 'articles'.
    pub filter: Option<(&'static str, &'static str)>,
}

#[derive(Debug, Clone, Copy)]
pub struct SlugSpec {
    pub column: &'static str,
    /// Title-like column the slug is derived from.
    pub source: &'static str,
    pub policy: SlugPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    pub fn to_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Everything the repository needs to serve one entity. All strings are
/// static declarations; SQL identifiers are never taken from requests.
#[derive(Debug)]
pub struct EntityDescriptor {
    /// URL segment and registry key, e.g. "articles".
    pub name: &'static str,
    pub table: &'static str,
    pub columns: &'static [ColumnSpec],
    pub rules: &'static [(&'static str, ColumnRule)],
    /// Columns probed for duplicates before insert/update.
    pub unique_columns: &'static [&'static str],
    pub slug: Option<SlugSpec>,
    pub attachments: &'static [AttachmentField],
    pub dependents: &'static [DependentTable],
    /// References that block deletion while rows exist.
    pub restrict_on_delete: &'static [ReferencingTable],
    /// References cleaned up inside the delete transaction.
    pub cleanup_on_delete: &'static [ReferencingTable],
    pub joins: &'static [JoinSpec],
    /// Columns stripped from every response (password digests).
    pub hidden_columns: &'static [&'static str],
    /// Columns matched by the free-text list filter.
    pub search_columns: &'static [&'static str],
    /// Whitelisted sort keys: (request key, column).
    pub sort_keys: &'static [(&'static str, &'static str)],
    pub default_sort: (&'static str, SortOrder),
    /// Columns accepted as equality filters on list reads.
    pub filter_columns: &'static [&'static str],
    /// Counter bumped after successful single reads.
    pub view_count_column: Option<&'static str>,
}

impl EntityDescriptor {
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn rule_for(&self, column: &str) -> Option<&ColumnRule> {
        self.rules
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, rule)| rule)
    }

    pub fn attachment_for(&self, column: &str) -> Option<&AttachmentField> {
        self.attachments.iter().find(|a| a.column == column)
    }

    /// Dependent table fed by uploaded files, if the entity has one.
    pub fn media_dependent(&self) -> Option<&DependentTable> {
        self.dependents
            .iter()
            .find(|d| matches!(d.kind, DependentKind::Media { .. }))
    }

    /// Multipart fields carrying file content for this entity.
    pub fn is_file_field(&self, field: &str) -> bool {
        if self.attachment_for(field).is_some() {
            return true;
        }
        matches!(
            self.media_dependent().map(|d| d.payload_field()),
            Some(name) if name == field
        )
    }

    pub fn sort_column(&self, key: &str) -> Option<&'static str> {
        self.sort_keys
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, col)| *col)
    }

    pub fn has_filter(&self, column: &str) -> bool {
        self.filter_columns.contains(&column)
    }

    pub fn is_hidden(&self, column: &str) -> bool {
        self.hidden_columns.contains(&column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_columns_accept_only_strings() {
        let col = ColumnSpec::required("title", ColumnType::Text);
        assert_eq!(col.coerce(json!("hello")), Ok(json!("hello")));
        assert_eq!(col.coerce(Value::Null), Ok(Value::Null));
        assert!(col.coerce(json!(42)).is_err());
        assert!(col.coerce(json!({"a": 1})).is_err());
    }

    #[test]
    fn bigint_columns_parse_form_strings() {
        let col = ColumnSpec::optional("category_id", ColumnType::BigInt);
        assert_eq!(col.coerce(json!(7)), Ok(json!(7)));
        assert_eq!(col.coerce(json!("12")), Ok(json!(12)));
        assert_eq!(col.coerce(json!("  3 ")), Ok(json!(3)));
        // untouched select box posts an empty string
        assert_eq!(col.coerce(json!("")), Ok(Value::Null));
        assert!(col.coerce(json!("abc")).is_err());
        assert!(col.coerce(json!(1.5)).is_err());
    }

    #[test]
    fn bool_columns_understand_form_values() {
        let col = ColumnSpec::optional("active", ColumnType::Bool);
        assert_eq!(col.coerce(json!(true)), Ok(json!(true)));
        assert_eq!(col.coerce(json!("1")), Ok(json!(true)));
        assert_eq!(col.coerce(json!("off")), Ok(json!(false)));
        assert_eq!(col.coerce(json!("")), Ok(Value::Null));
        assert!(col.coerce(json!("maybe")).is_err());
    }

    #[test]
    fn sha256_rule_hashes_to_lowercase_hex() {
        let hashed = ColumnRule::Sha256Hex
            .apply("password", json!("secret"))
            .unwrap();
        assert_eq!(
            hashed,
            json!("2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b")
        );
    }

    #[test]
    fn one_of_rule_rejects_unknown_tags() {
        let rule = ColumnRule::OneOf(&["draft", "published"]);
        assert_eq!(
            rule.apply("status", json!("draft")),
            Ok(json!("draft"))
        );
        let err = rule.apply("status", json!("archived")).unwrap_err();
        assert!(err.contains("draft, published"));
    }

    #[test]
    fn url_rule_requires_absolute_urls() {
        assert!(ColumnRule::Url
            .apply("url", json!("https://example.com/feed"))
            .is_ok());
        assert!(ColumnRule::Url.apply("url", json!("not a url")).is_err());
        assert!(ColumnRule::Url.apply("url", json!("/relative")).is_err());
    }

    #[test]
    fn attachment_folder_comes_from_the_prefix() {
        let field = AttachmentField {
            column: "gambar",
            prefix: "/uploads/articles/",
        };
        assert_eq!(field.folder(), "articles");
    }

    #[test]
    fn sort_order_parses_case_insensitively() {
        assert_eq!(SortOrder::parse("DESC"), Some(SortOrder::Desc));
        assert_eq!(SortOrder::parse(" asc "), Some(SortOrder::Asc));
        assert_eq!(SortOrder::parse("sideways"), None);
    }
}
