// Site-wide settings
//
// Settings are flat key/value rows tagged with a kind and a display group.
// Values are stored as text and coerced to typed JSON on the way out; the
// update path compares serialized values so untouched keys never hit the
// database.

use serde_json::{Map, Value};
use sqlx::{PgPool, Row};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::repository::command::WriteRequest;
use crate::storage::{FileAttachmentStore, PendingRelease};

/// Web prefix for image-kind setting uploads.
pub const UPLOAD_PREFIX: &str = "/uploads/settings/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    String,
    Text,
    Boolean,
    Number,
    Json,
    Image,
}

impl SettingKind {
    fn parse(input: &str) -> Option<Self> {
        match input {
            "string" => Some(Self::String),
            "text" => Some(Self::Text),
            "boolean" => Some(Self::Boolean),
            "number" => Some(Self::Number),
            "json" => Some(Self::Json),
            "image" => Some(Self::Image),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SettingRow {
    pub key: String,
    pub value: Option<String>,
    pub kind: SettingKind,
    pub grp: String,
}

pub struct SettingsService<'a> {
    pool: &'a PgPool,
    store: &'a FileAttachmentStore,
}

impl<'a> SettingsService<'a> {
    pub fn new(pool: &'a PgPool, store: &'a FileAttachmentStore) -> Self {
        Self { pool, store }
    }

    /// All settings as `{ group: { key: value } }` with kind-typed values.
    pub async fn read_all(&self) -> Result<Value, ApiError> {
        let rows = self.fetch_rows().await?;
        let mut groups: Map<String, Value> = Map::new();
        for row in &rows {
            let entry = groups
                .entry(row.grp.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(map) = entry {
                map.insert(row.key.clone(), coerce_out(row.kind, row.value.as_deref()));
            }
        }
        Ok(Value::Object(groups))
    }

    /// Apply a partial update. Keys absent from the request stay untouched;
    /// keys whose serialized value matches the stored one are skipped.
    pub async fn update(&self, req: WriteRequest) -> Result<Value, ApiError> {
        match self.update_inner(&req).await {
            Ok((settings, releases)) => {
                self.store.release_many(&releases).await;
                Ok(settings)
            }
            Err(err) => {
                self.store.release_accepted(&req.uploads).await;
                Err(err)
            }
        }
    }

    async fn update_inner(
        &self,
        req: &WriteRequest,
    ) -> Result<(Value, Vec<PendingRelease>), ApiError> {
        let rows = self.fetch_rows().await?;
        let (staged, releases) = stage_changes(&rows, req)?;
        if staged.is_empty() {
            return Err(ApiError::NoChange);
        }

        let mut tx = self.pool.begin().await?;
        for (key, value) in &staged {
            let sql = match value {
                Some(_) => {
                    "UPDATE \"settings\" SET \"value\" = $1, \"updated_at\" = now() WHERE \"key\" = $2"
                }
                None => {
                    "UPDATE \"settings\" SET \"value\" = NULL, \"updated_at\" = now() WHERE \"key\" = $1"
                }
            };
            let q = match value {
                Some(text) => sqlx::query(sql).bind(text).bind(key),
                None => sqlx::query(sql).bind(key),
            };
            q.execute(&mut *tx).await?;
        }
        tx.commit().await?;

        info!(keys = staged.len(), "updated settings");
        let settings = self.read_all().await?;
        Ok((settings, releases))
    }

    async fn fetch_rows(&self) -> Result<Vec<SettingRow>, ApiError> {
        let rows = sqlx::query(
            "SELECT \"key\", \"value\", \"kind\", \"grp\" FROM \"settings\" ORDER BY \"grp\", \"key\"",
        )
        .fetch_all(self.pool)
        .await?;

        let mut settings = Vec::with_capacity(rows.len());
        for row in rows {
            let key: String = row.try_get("key")?;
            let kind_raw: String = row.try_get("kind")?;
            let kind = match SettingKind::parse(&kind_raw) {
                Some(kind) => kind,
                None => {
                    warn!(key, kind = %kind_raw, "unknown setting kind, treating as string");
                    SettingKind::String
                }
            };
            settings.push(SettingRow {
                key,
                value: row.try_get("value")?,
                kind,
                grp: row.try_get("grp")?,
            });
        }
        Ok(settings)
    }
}

/// Stored text to response JSON. Unparsable numbers and json fall back to
/// the raw string instead of dropping data.
fn coerce_out(kind: SettingKind, raw: Option<&str>) -> Value {
    let Some(raw) = raw else {
        return Value::Null;
    };
    match kind {
        SettingKind::String | SettingKind::Text | SettingKind::Image => {
            Value::String(raw.to_string())
        }
        SettingKind::Boolean => Value::Bool(matches!(raw, "true" | "1")),
        SettingKind::Number => {
            if let Ok(n) = raw.parse::<i64>() {
                Value::from(n)
            } else if let Ok(n) = raw.parse::<f64>() {
                Value::from(n)
            } else {
                Value::String(raw.to_string())
            }
        }
        SettingKind::Json => {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
        }
    }
}

/// Request JSON to stored text, or a message naming what was wrong.
fn serialize_in(kind: SettingKind, value: &Value) -> Result<Option<String>, String> {
    if value.is_null() {
        return Ok(None);
    }
    match kind {
        SettingKind::String | SettingKind::Text => match value {
            Value::String(s) => Ok(Some(s.clone())),
            _ => Err("expects a string value".to_string()),
        },
        SettingKind::Image => match value {
            Value::String(s) if s.is_empty() => Ok(None),
            Value::String(s) => Ok(Some(s.clone())),
            _ => Err("expects an uploaded file or a path string".to_string()),
        },
        SettingKind::Boolean => match value {
            Value::Bool(b) => Ok(Some(if *b { "true" } else { "false" }.to_string())),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "on" | "yes" => Ok(Some("true".to_string())),
                "false" | "0" | "off" | "no" => Ok(Some("false".to_string())),
                "" => Ok(None),
                _ => Err("expects a boolean value".to_string()),
            },
            _ => Err("expects a boolean value".to_string()),
        },
        SettingKind::Number => match value {
            Value::Number(n) => Ok(Some(n.to_string())),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Ok(None)
                } else if trimmed.parse::<f64>().is_ok() {
                    Ok(Some(trimmed.to_string()))
                } else {
                    Err("expects a numeric value".to_string())
                }
            }
            _ => Err("expects a numeric value".to_string()),
        },
        SettingKind::Json => {
            serde_json::to_string(value).map(Some).map_err(|e| e.to_string())
        }
    }
}

/// Work out which keys actually change. Uploads bind to image-kind keys by
/// field name and win over a scalar for the same key; replaced image paths
/// are queued for release.
fn stage_changes(
    rows: &[SettingRow],
    req: &WriteRequest,
) -> Result<(Vec<(String, Option<String>)>, Vec<PendingRelease>), ApiError> {
    let mut staged: Vec<(String, Option<String>)> = Vec::new();
    let mut releases: Vec<PendingRelease> = Vec::new();

    let mut stage = |row: &SettingRow, next: Option<String>, releases: &mut Vec<PendingRelease>| {
        if row.value == next {
            return;
        }
        if row.kind == SettingKind::Image {
            if let Some(prior) = row.value.as_deref() {
                if !prior.is_empty() {
                    releases.push(PendingRelease {
                        path: prior.to_string(),
                        prefix: UPLOAD_PREFIX,
                    });
                }
            }
        }
        staged.push((row.key.clone(), next));
    };

    for upload in &req.uploads {
        let row = rows.iter().find(|r| r.key == upload.field).ok_or_else(|| {
            ApiError::validation(format!("unknown setting '{}'", upload.field))
        })?;
        if row.kind != SettingKind::Image {
            return Err(ApiError::validation(format!(
                "setting '{}' does not accept file uploads",
                row.key
            )));
        }
        stage(row, Some(upload.path.clone()), &mut releases);
    }

    for (key, value) in &req.fields {
        if req.upload_for(key).is_some() {
            continue;
        }
        let row = rows
            .iter()
            .find(|r| &r.key == key)
            .ok_or_else(|| ApiError::validation(format!("unknown setting '{}'", key)))?;
        let next = serialize_in(row.kind, value)
            .map_err(|msg| ApiError::validation(format!("setting '{}' {}", key, msg)))?;
        stage(row, next, &mut releases);
    }

    Ok((staged, releases))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::AcceptedUpload;
    use serde_json::json;

    fn row(key: &str, value: Option<&str>, kind: SettingKind) -> SettingRow {
        SettingRow {
            key: key.to_string(),
            value: value.map(String::from),
            kind,
            grp: "general".to_string(),
        }
    }

    #[test]
    fn unchanged_keys_are_skipped() {
        let rows = vec![
            row("site_name", Some("Kabar"), SettingKind::String),
            row("tagline", Some("berita"), SettingKind::String),
        ];
        let mut fields = Map::new();
        fields.insert("site_name".to_string(), json!("Kabar"));
        fields.insert("tagline".to_string(), json!("warta"));
        let req = WriteRequest::from_fields(fields);

        let (staged, releases) = stage_changes(&rows, &req).unwrap();
        assert_eq!(staged, vec![("tagline".to_string(), Some("warta".to_string()))]);
        assert!(releases.is_empty());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let rows = vec![row("site_name", None, SettingKind::String)];
        let mut fields = Map::new();
        fields.insert("nope".to_string(), json!("x"));
        let req = WriteRequest::from_fields(fields);

        let err = stage_changes(&rows, &req).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(err.message().contains("nope"));
    }

    #[test]
    fn image_upload_replaces_and_queues_old_file() {
        let rows = vec![row(
            "site_logo",
            Some("/uploads/settings/site_logo-1-aaaa.png"),
            SettingKind::Image,
        )];
        let req = WriteRequest {
            fields: Map::new(),
            uploads: vec![AcceptedUpload {
                field: "site_logo".to_string(),
                path: "/uploads/settings/site_logo-2-bbbb.png".to_string(),
                prefix: UPLOAD_PREFIX,
            }],
        };

        let (staged, releases) = stage_changes(&rows, &req).unwrap();
        assert_eq!(
            staged,
            vec![(
                "site_logo".to_string(),
                Some("/uploads/settings/site_logo-2-bbbb.png".to_string())
            )]
        );
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].path, "/uploads/settings/site_logo-1-aaaa.png");
    }

    #[test]
    fn uploads_only_bind_to_image_kinds() {
        let rows = vec![row("site_name", None, SettingKind::String)];
        let req = WriteRequest {
            fields: Map::new(),
            uploads: vec![AcceptedUpload {
                field: "site_name".to_string(),
                path: "/uploads/settings/site_name-1-cccc.png".to_string(),
                prefix: UPLOAD_PREFIX,
            }],
        };

        let err = stage_changes(&rows, &req).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(err.message().contains("does not accept file uploads"));
    }

    #[test]
    fn boolean_values_serialize_to_canonical_text() {
        assert_eq!(
            serialize_in(SettingKind::Boolean, &json!(true)).unwrap(),
            Some("true".to_string())
        );
        assert_eq!(
            serialize_in(SettingKind::Boolean, &json!("on")).unwrap(),
            Some("true".to_string())
        );
        assert_eq!(
            serialize_in(SettingKind::Boolean, &json!("0")).unwrap(),
            Some("false".to_string())
        );
        assert!(serialize_in(SettingKind::Boolean, &json!("maybe")).is_err());
    }

    #[test]
    fn numbers_and_json_round_through_text() {
        assert_eq!(
            serialize_in(SettingKind::Number, &json!(25)).unwrap(),
            Some("25".to_string())
        );
        assert_eq!(
            serialize_in(SettingKind::Number, &json!(" 2.5 ")).unwrap(),
            Some("2.5".to_string())
        );
        assert!(serialize_in(SettingKind::Number, &json!("abc")).is_err());
        assert_eq!(
            serialize_in(SettingKind::Json, &json!({"a": 1})).unwrap(),
            Some("{\"a\":1}".to_string())
        );

        assert_eq!(coerce_out(SettingKind::Number, Some("25")), json!(25));
        assert_eq!(coerce_out(SettingKind::Number, Some("2.5")), json!(2.5));
        assert_eq!(coerce_out(SettingKind::Boolean, Some("true")), json!(true));
        assert_eq!(coerce_out(SettingKind::Boolean, Some("false")), json!(false));
        assert_eq!(coerce_out(SettingKind::Json, Some("{\"a\":1}")), json!({"a": 1}));
        assert_eq!(coerce_out(SettingKind::String, None), Value::Null);
    }
}
