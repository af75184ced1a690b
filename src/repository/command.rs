// Write intents and field staging
//
// A write request is reduced to per-column patches before any SQL is built.
// Staging is pure: it sees the descriptor, the parsed request and (for
// updates) the prior row, and produces the column list to persist plus the
// attachment paths that become garbage once the write commits.

use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::schema::{AttachmentField, ColumnSpec, EntityDescriptor};
use crate::storage::{AcceptedUpload, PendingRelease};

/// Per-field update intent, resolved from the wire before staging.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldPatch {
    /// Field absent from the request; leave the stored value alone.
    Unset,
    /// Explicitly keep the current value. Never produced by the wire mapping;
    /// programmatic callers use it to skip a column they do not own.
    Keep,
    /// Stage this value.
    SetTo(Value),
    /// Stage NULL; on attachment columns the old file is released too.
    Clear,
}

/// Parsed write request: scalar fields plus files accepted during intake.
#[derive(Debug, Default)]
pub struct WriteRequest {
    pub fields: Map<String, Value>,
    pub uploads: Vec<AcceptedUpload>,
}

impl WriteRequest {
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            uploads: Vec::new(),
        }
    }

    /// Wire mapping: absent is Unset, JSON null is Clear, anything else is
    /// SetTo. Keep never comes off the wire.
    pub fn patch_for(&self, column: &str) -> FieldPatch {
        match self.fields.get(column) {
            None => FieldPatch::Unset,
            Some(Value::Null) => FieldPatch::Clear,
            Some(value) => FieldPatch::SetTo(value.clone()),
        }
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn upload_for(&self, field: &str) -> Option<&AcceptedUpload> {
        self.uploads.iter().find(|u| u.field == field)
    }

    /// All uploads for a field, in intake order (gallery media).
    pub fn uploads_for(&self, field: &str) -> Vec<&AcceptedUpload> {
        self.uploads.iter().filter(|u| u.field == field).collect()
    }
}

/// Ordered column/value list ready for SQL generation. NULLs are staged as
/// JSON null and rendered as literal NULL, never bound.
#[derive(Debug, Default)]
pub struct StagedWrite {
    columns: Vec<(&'static str, Value)>,
}

impl StagedWrite {
    pub fn set(&mut self, column: &'static str, value: Value) {
        if let Some(slot) = self.columns.iter_mut().find(|(name, _)| *name == column) {
            slot.1 = value;
        } else {
            self.columns.push((column, value));
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[(&'static str, Value)] {
        &self.columns
    }
}

fn is_blank(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.trim().is_empty())
}

/// Coerce, normalize blanks to NULL, then run the column's extra rule if it
/// has one. HTML forms submit cleared fields as empty strings; those must
/// behave exactly like JSON null, including on attachment columns.
fn prepare_value(
    desc: &EntityDescriptor,
    column: &ColumnSpec,
    value: Value,
) -> Result<Value, ApiError> {
    let value = column.coerce(value).map_err(ApiError::validation)?;
    let value = if is_blank(&value) { Value::Null } else { value };
    match desc.rule_for(column.name) {
        Some(rule) => rule
            .apply(column.name, value)
            .map_err(ApiError::validation),
        None => Ok(value),
    }
}

/// Stage every writable column for an insert. Required columns must arrive
/// with a usable value; uploads win over scalar values on attachment columns.
pub fn stage_create(desc: &EntityDescriptor, req: &WriteRequest) -> Result<StagedWrite, ApiError> {
    let mut staged = StagedWrite::default();
    let mut missing: Vec<&str> = Vec::new();

    for column in desc.columns {
        if desc.attachment_for(column.name).is_some() {
            if let Some(upload) = req.upload_for(column.name) {
                staged.set(column.name, Value::String(upload.path.clone()));
                continue;
            }
        }
        match req.patch_for(column.name) {
            FieldPatch::Unset | FieldPatch::Keep | FieldPatch::Clear => {
                if column.required {
                    missing.push(column.name);
                }
            }
            FieldPatch::SetTo(value) => {
                let value = prepare_value(desc, column, value)?;
                if column.required && value.is_null() {
                    missing.push(column.name);
                } else {
                    staged.set(column.name, value);
                }
            }
        }
    }

    if !missing.is_empty() {
        return Err(ApiError::validation(format!(
            "missing required fields: {}",
            missing.join(", ")
        )));
    }
    Ok(staged)
}

/// Stage columns for an update. Every field present in the request is staged,
/// equal to the stored value or not; absent fields are untouched. Replaced or
/// cleared attachments schedule the prior file for release after commit.
pub fn stage_update(
    desc: &EntityDescriptor,
    req: &WriteRequest,
    prior: &Map<String, Value>,
) -> Result<(StagedWrite, Vec<PendingRelease>), ApiError> {
    let mut staged = StagedWrite::default();
    let mut releases: Vec<PendingRelease> = Vec::new();

    for column in desc.columns {
        let attachment = desc.attachment_for(column.name);

        if let Some(att) = attachment {
            if let Some(upload) = req.upload_for(column.name) {
                staged.set(column.name, Value::String(upload.path.clone()));
                push_prior_release(&mut releases, prior, att);
                continue;
            }
        }

        match req.patch_for(column.name) {
            FieldPatch::Unset | FieldPatch::Keep => {}
            FieldPatch::Clear => {
                if column.required {
                    return Err(ApiError::validation(format!(
                        "field '{}' cannot be cleared",
                        column.name
                    )));
                }
                staged.set(column.name, Value::Null);
                if let Some(att) = attachment {
                    push_prior_release(&mut releases, prior, att);
                }
            }
            FieldPatch::SetTo(value) => {
                let value = prepare_value(desc, column, value)?;
                if value.is_null() {
                    if column.required {
                        return Err(ApiError::validation(format!(
                            "field '{}' cannot be empty",
                            column.name
                        )));
                    }
                    staged.set(column.name, Value::Null);
                    if let Some(att) = attachment {
                        push_prior_release(&mut releases, prior, att);
                    }
                } else {
                    staged.set(column.name, value);
                }
            }
        }
    }

    Ok((staged, releases))
}

fn push_prior_release(
    releases: &mut Vec<PendingRelease>,
    prior: &Map<String, Value>,
    att: &AttachmentField,
) {
    if let Some(Value::String(old)) = prior.get(att.column) {
        if !old.is_empty() {
            releases.push(PendingRelease {
                path: old.clone(),
                prefix: att.prefix,
            });
        }
    }
}

/// Parse a link-id payload: a JSON array, a single number, or a form string
/// with comma-separated ids. Duplicates collapse, order is kept.
pub fn parse_id_list(field: &str, value: &Value) -> Result<Vec<i64>, ApiError> {
    fn push(out: &mut Vec<i64>, id: i64) {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    fn parse_one(field: &str, value: &Value) -> Result<i64, ApiError> {
        match value {
            Value::Number(n) => n.as_i64().ok_or_else(|| {
                ApiError::validation(format!("field '{}' expects integer ids", field))
            }),
            Value::String(s) => s.trim().parse::<i64>().map_err(|_| {
                ApiError::validation(format!("field '{}' expects integer ids", field))
            }),
            _ => Err(ApiError::validation(format!(
                "field '{}' expects integer ids",
                field
            ))),
        }
    }

    let mut out = Vec::new();
    match value {
        Value::Null => {}
        Value::Array(items) => {
            for item in items {
                push(&mut out, parse_one(field, item)?);
            }
        }
        Value::String(s) => {
            for part in s.split(',') {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                push(&mut out, parse_one(field, &Value::String(part.to_string()))?);
            }
        }
        Value::Number(_) => push(&mut out, parse_one(field, value)?),
        _ => {
            return Err(ApiError::validation(format!(
                "field '{}' expects an array of ids",
                field
            )))
        }
    }
    Ok(out)
}

/// One dependent row parsed from an item-array payload.
#[derive(Debug, PartialEq)]
pub struct ItemRow {
    pub columns: Vec<(&'static str, Value)>,
    pub ordinal: i64,
}

/// Parse an array of child objects (menu items). Each object must satisfy the
/// dependent's column specs; the ordinal comes from the declared ordinal key
/// when present, otherwise from the array position.
pub fn parse_item_rows(
    columns: &'static [ColumnSpec],
    ordinal_column: &'static str,
    field: &str,
    value: &Value,
) -> Result<Vec<ItemRow>, ApiError> {
    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        _ => {
            return Err(ApiError::validation(format!(
                "field '{}' expects an array of objects",
                field
            )))
        }
    };

    let mut rows = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let Value::Object(map) = item else {
            return Err(ApiError::validation(format!(
                "{}[{}] must be an object",
                field, index
            )));
        };

        let mut staged = Vec::with_capacity(columns.len());
        for column in columns {
            let raw = map.get(column.name).cloned().unwrap_or(Value::Null);
            let value = column.coerce(raw).map_err(ApiError::validation)?;
            if column.required && (value.is_null() || is_blank(&value)) {
                return Err(ApiError::validation(format!(
                    "{}[{}].{} is required",
                    field, index, column.name
                )));
            }
            staged.push((column.name, value));
        }

        let ordinal = match map.get(ordinal_column) {
            Some(Value::Number(n)) if n.as_i64().is_some() => n.as_i64().unwrap_or(index as i64),
            Some(Value::String(s)) if s.trim().parse::<i64>().is_ok() => {
                s.trim().parse::<i64>().unwrap_or(index as i64)
            }
            _ => index as i64,
        };

        rows.push(ItemRow {
            columns: staged,
            ordinal,
        });
    }
    Ok(rows)
}
