// Request body intake
//
// Write endpoints accept either a JSON object or multipart/form-data. Both
// funnel into a WriteRequest: scalar fields as a JSON map, file parts stored
// to disk up front. Files accepted here are released again by whoever fails
// the request downstream.

use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::Json;
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::repository::command::WriteRequest;
use crate::schema::EntityDescriptor;
use crate::settings;
use crate::storage::{AcceptedUpload, FileAttachmentStore};

/// Where uploaded parts are allowed to land.
#[derive(Clone, Copy)]
pub enum UploadTarget {
    Entity(&'static EntityDescriptor),
    Settings,
}

impl UploadTarget {
    fn prefix_for(&self, field: &str) -> Result<&'static str, ApiError> {
        match self {
            UploadTarget::Entity(desc) => {
                if let Some(att) = desc.attachment_for(field) {
                    return Ok(att.prefix);
                }
                if let Some(dep) = desc.media_dependent() {
                    if dep.payload_field() == field {
                        if let crate::schema::DependentKind::Media { prefix, .. } = dep.kind {
                            return Ok(prefix);
                        }
                    }
                }
                Err(ApiError::validation(format!(
                    "field '{}' does not accept file uploads",
                    field
                )))
            }
            // settings keys are validated against the stored rows later
            UploadTarget::Settings => Ok(settings::UPLOAD_PREFIX),
        }
    }
}

/// Extract a WriteRequest from a JSON or multipart body.
pub async fn write_request(
    store: &FileAttachmentStore,
    target: UploadTarget,
    request: Request,
) -> Result<WriteRequest, ApiError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|_| ApiError::validation("malformed multipart body"))?;
        from_multipart(store, target, multipart).await
    } else {
        let Json(body) = Json::<Value>::from_request(request, &())
            .await
            .map_err(|_| ApiError::validation("request body must be a JSON object"))?;
        match body {
            Value::Object(fields) => Ok(WriteRequest::from_fields(fields)),
            _ => Err(ApiError::validation("request body must be a JSON object")),
        }
    }
}

async fn from_multipart(
    store: &FileAttachmentStore,
    target: UploadTarget,
    mut multipart: Multipart,
) -> Result<WriteRequest, ApiError> {
    let mut scalars: Vec<(String, String)> = Vec::new();
    let mut uploads: Vec<AcceptedUpload> = Vec::new();

    if let Err(err) = read_parts(store, target, &mut multipart, &mut scalars, &mut uploads).await {
        store.release_accepted(&uploads).await;
        return Err(err);
    }
    Ok(WriteRequest {
        fields: fold_scalars(scalars),
        uploads,
    })
}

async fn read_parts(
    store: &FileAttachmentStore,
    target: UploadTarget,
    multipart: &mut Multipart,
    scalars: &mut Vec<(String, String)>,
    uploads: &mut Vec<AcceptedUpload>,
) -> Result<(), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::validation("malformed multipart body"))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let file_name = field.file_name().map(str::to_string);

        match file_name {
            // browsers send a fileless part with an empty filename
            Some(original) if original.is_empty() => {}
            Some(original) => {
                let prefix = target.prefix_for(&name)?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| ApiError::validation("malformed multipart body"))?;
                uploads.push(store.accept(prefix, &name, &original, &bytes).await?);
            }
            None => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| ApiError::validation("malformed multipart body"))?;
                scalars.push((name, text));
            }
        }
    }
    Ok(())
}

/// Form fields posted once stay strings; repeated names become arrays so
/// checkbox groups and id lists survive the trip.
fn fold_scalars(scalars: Vec<(String, String)>) -> Map<String, Value> {
    let mut fields: Map<String, Value> = Map::new();
    for (name, text) in scalars {
        match fields.get_mut(&name) {
            Some(Value::Array(items)) => items.push(Value::String(text)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(text)]);
            }
            None => {
                fields.insert(name, Value::String(text));
            }
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::registry;
    use serde_json::json;

    #[test]
    fn repeated_form_fields_fold_into_arrays() {
        let fields = fold_scalars(vec![
            ("title".to_string(), "Halo".to_string()),
            ("category_ids".to_string(), "1".to_string()),
            ("category_ids".to_string(), "2".to_string()),
            ("category_ids".to_string(), "3".to_string()),
        ]);
        assert_eq!(fields["title"], json!("Halo"));
        assert_eq!(fields["category_ids"], json!(["1", "2", "3"]));
    }

    #[test]
    fn upload_fields_resolve_to_declared_prefixes() {
        let articles = registry::lookup("articles").unwrap();
        let target = UploadTarget::Entity(articles);
        assert_eq!(target.prefix_for("gambar").unwrap(), "/uploads/articles/");
        assert!(target.prefix_for("judul").is_err());

        let galleries = registry::lookup("galleries").unwrap();
        let target = UploadTarget::Entity(galleries);
        assert_eq!(target.prefix_for("media").unwrap(), "/uploads/galleries/");

        assert_eq!(
            UploadTarget::Settings.prefix_for("site_logo").unwrap(),
            settings::UPLOAD_PREFIX
        );
    }
}
