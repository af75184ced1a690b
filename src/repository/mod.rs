// Descriptor-driven persistence
//
// One repository type serves every registered entity. All SQL identifiers
// come from the static descriptors; request data only ever reaches the
// database as bind parameters. Rows travel as JSON via row_to_json so the
// handlers never need per-entity structs.

pub mod command;

use serde_json::{json, Map, Value};
use sqlx::{PgConnection, PgPool, Row};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::database::bind_value;
use crate::error::ApiError;
use crate::query::{joined_select, ListParams, ListQueryBuilder, Pagination};
use crate::schema::{DependentKind, EntityDescriptor};
use crate::slug;
use crate::storage::{FileAttachmentStore, PendingRelease};

use command::{stage_create, stage_update, parse_id_list, parse_item_rows, StagedWrite, WriteRequest};

#[derive(Clone, Copy)]
enum DependentMode {
    Create,
    Update,
}

pub struct EntityRepository<'a> {
    desc: &'static EntityDescriptor,
    pool: &'a PgPool,
    store: &'a FileAttachmentStore,
}

impl<'a> EntityRepository<'a> {
    pub fn new(
        desc: &'static EntityDescriptor,
        pool: &'a PgPool,
        store: &'a FileAttachmentStore,
    ) -> Self {
        Self { desc, pool, store }
    }

    /// One page of rows plus the pagination envelope for the same filters.
    pub async fn list(&self, params: &ListParams) -> Result<(Vec<Value>, Pagination), ApiError> {
        let q = ListQueryBuilder::new(self.desc, params).build();

        let mut count_query = sqlx::query(&q.count_sql);
        for value in &q.params {
            count_query = bind_value(count_query, value);
        }
        let total: i64 = count_query.fetch_one(self.pool).await?.try_get("count")?;

        let wrapped = format!("SELECT row_to_json(t) AS row FROM ({}) t", q.sql);
        let mut rows_query = sqlx::query(&wrapped);
        for value in &q.params {
            rows_query = bind_value(rows_query, value);
        }
        let rows = rows_query.fetch_all(self.pool).await?;

        let mut data = Vec::with_capacity(rows.len());
        for row in rows {
            let value: Value = row.try_get("row")?;
            data.push(strip_hidden(self.desc, value));
        }
        let pagination = Pagination::new(total, params.page_index.max(1), params.page_size.max(1));
        Ok((data, pagination))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Value, ApiError> {
        let mut conn = self.pool.acquire().await?;
        let entity = self
            .fetch_assembled(&mut conn, "id", &json!(id))
            .await?
            .ok_or_else(|| self.record_not_found(id))?;
        self.bump_view_count(&entity);
        Ok(strip_hidden(self.desc, entity))
    }

    pub async fn get_by_slug(&self, slug_value: &str) -> Result<Value, ApiError> {
        let spec = self.desc.slug.as_ref().ok_or_else(|| {
            ApiError::not_found(format!("{} are not addressable by slug", self.desc.name))
        })?;
        let mut conn = self.pool.acquire().await?;
        let entity = self
            .fetch_assembled(&mut conn, spec.column, &json!(slug_value))
            .await?
            .ok_or_else(|| {
                ApiError::not_found(format!(
                    "slug '{}' not found in {}",
                    slug_value, self.desc.table
                ))
            })?;
        self.bump_view_count(&entity);
        Ok(strip_hidden(self.desc, entity))
    }

    pub async fn create(&self, req: WriteRequest) -> Result<Value, ApiError> {
        match self.create_inner(&req).await {
            Ok(entity) => Ok(entity),
            Err(err) => {
                // files accepted for this request must not outlive its failure
                self.store.release_accepted(&req.uploads).await;
                Err(err)
            }
        }
    }

    async fn create_inner(&self, req: &WriteRequest) -> Result<Value, ApiError> {
        let mut staged = stage_create(self.desc, req)?;

        let mut tx = self.pool.begin().await?;
        self.check_unique(&mut tx, &staged, None).await?;
        self.resolve_slug(&mut tx, &mut staged, None).await?;

        let id = self.insert_primary(&mut tx, &staged).await?;
        self.write_dependents(&mut tx, id, req, DependentMode::Create)
            .await?;

        let entity = self
            .fetch_assembled(&mut tx, "id", &json!(id))
            .await?
            .ok_or_else(|| ApiError::persistence("inserted row vanished", None))?;
        tx.commit().await?;

        info!(table = self.desc.table, id, "created record");
        Ok(strip_hidden(self.desc, entity))
    }

    pub async fn update(&self, id: i64, req: WriteRequest) -> Result<Value, ApiError> {
        match self.update_inner(id, &req).await {
            Ok((entity, releases)) => {
                // replaced files become garbage only once the write is durable
                self.store.release_many(&releases).await;
                Ok(entity)
            }
            Err(err) => {
                self.store.release_accepted(&req.uploads).await;
                Err(err)
            }
        }
    }

    async fn update_inner(
        &self,
        id: i64,
        req: &WriteRequest,
    ) -> Result<(Value, Vec<PendingRelease>), ApiError> {
        let mut tx = self.pool.begin().await?;

        let prior = self
            .fetch_plain(&mut tx, id)
            .await?
            .ok_or_else(|| self.record_not_found(id))?;

        let (mut staged, releases) = stage_update(self.desc, req, &prior)?;
        self.check_unique(&mut tx, &staged, Some(id)).await?;
        self.resolve_slug_for_update(&mut tx, &mut staged, &prior, id)
            .await?;

        let touches_dependents = self.desc.dependents.iter().any(|dep| match dep.kind {
            DependentKind::Media { payload_field, .. } => !req.uploads_for(payload_field).is_empty(),
            _ => req.has_field(dep.payload_field()),
        });
        if staged.is_empty() && !touches_dependents {
            return Err(ApiError::NoChange);
        }

        let affected = self.update_primary(&mut tx, id, &staged).await?;
        if affected == 0 {
            // row vanished between the read and the write
            return Err(self.record_not_found(id));
        }

        self.write_dependents(&mut tx, id, req, DependentMode::Update)
            .await?;

        let entity = self
            .fetch_assembled(&mut tx, "id", &json!(id))
            .await?
            .ok_or_else(|| ApiError::persistence("updated row vanished", None))?;
        tx.commit().await?;

        info!(
            table = self.desc.table,
            id,
            fields = staged.len(),
            "updated record"
        );
        Ok((strip_hidden(self.desc, entity), releases))
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        let releases = self.delete_inner(id).await?;
        self.store.release_many(&releases).await;
        Ok(())
    }

    async fn delete_inner(&self, id: i64) -> Result<Vec<PendingRelease>, ApiError> {
        let mut tx = self.pool.begin().await?;

        let prior = self
            .fetch_plain(&mut tx, id)
            .await?
            .ok_or_else(|| self.record_not_found(id))?;

        for guard in self.desc.restrict_on_delete {
            let sql = match guard.filter {
                Some((filter_column, _)) => format!(
                    "SELECT EXISTS (SELECT 1 FROM \"{}\" WHERE \"{}\" = $1 AND \"{}\" = $2) AS referenced",
                    guard.table, guard.column, filter_column
                ),
                None => format!(
                    "SELECT EXISTS (SELECT 1 FROM \"{}\" WHERE \"{}\" = $1) AS referenced",
                    guard.table, guard.column
                ),
            };
            let mut q = sqlx::query(&sql).bind(id);
            if let Some((_, filter_value)) = guard.filter {
                q = q.bind(filter_value);
            }
            let referenced: bool = q.fetch_one(&mut *tx).await?.try_get("referenced")?;
            if referenced {
                return Err(ApiError::conflict(format!(
                    "cannot delete: still referenced by {}",
                    guard.table
                )));
            }
        }

        let mut releases: Vec<PendingRelease> = Vec::new();
        for att in self.desc.attachments {
            if let Some(Value::String(path)) = prior.get(att.column) {
                if !path.is_empty() {
                    releases.push(PendingRelease {
                        path: path.clone(),
                        prefix: att.prefix,
                    });
                }
            }
        }

        for dep in self.desc.dependents {
            if let DependentKind::Media {
                path_column,
                prefix,
                ..
            } = dep.kind
            {
                let sql = format!(
                    "SELECT \"{}\" AS path FROM \"{}\" WHERE \"{}\" = $1",
                    path_column, dep.table, dep.parent_column
                );
                for row in sqlx::query(&sql).bind(id).fetch_all(&mut *tx).await? {
                    let path: String = row.try_get("path")?;
                    if !path.is_empty() {
                        releases.push(PendingRelease { path, prefix });
                    }
                }
            }
            let sql = format!(
                "DELETE FROM \"{}\" WHERE \"{}\" = $1",
                dep.table, dep.parent_column
            );
            sqlx::query(&sql).bind(id).execute(&mut *tx).await?;
        }

        for cleanup in self.desc.cleanup_on_delete {
            let sql = match cleanup.filter {
                Some((filter_column, _)) => format!(
                    "DELETE FROM \"{}\" WHERE \"{}\" = $1 AND \"{}\" = $2",
                    cleanup.table, cleanup.column, filter_column
                ),
                None => format!(
                    "DELETE FROM \"{}\" WHERE \"{}\" = $1",
                    cleanup.table, cleanup.column
                ),
            };
            let mut q = sqlx::query(&sql).bind(id);
            if let Some((_, filter_value)) = cleanup.filter {
                q = q.bind(filter_value);
            }
            q.execute(&mut *tx).await?;
        }

        let sql = format!("DELETE FROM \"{}\" WHERE \"id\" = $1", self.desc.table);
        let affected = sqlx::query(&sql)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if affected == 0 {
            return Err(self.record_not_found(id));
        }
        tx.commit().await?;

        info!(table = self.desc.table, id, "deleted record");
        Ok(releases)
    }

    /// Remove one row of the entity's item-style dependent (gallery image,
    /// menu item). Link rows are managed wholesale through updates instead.
    pub async fn delete_dependent_item(&self, parent_id: i64, item_id: i64) -> Result<(), ApiError> {
        let dep = self
            .desc
            .dependents
            .iter()
            .find(|d| d.supports_item_delete())
            .ok_or_else(|| {
                ApiError::not_found(format!("{} have no removable items", self.desc.name))
            })?;

        let mut tx = self.pool.begin().await?;

        let release = match dep.kind {
            DependentKind::Media {
                path_column,
                prefix,
                ..
            } => {
                let sql = format!(
                    "SELECT \"{}\" AS path FROM \"{}\" WHERE \"id\" = $1 AND \"{}\" = $2",
                    path_column, dep.table, dep.parent_column
                );
                let row = sqlx::query(&sql)
                    .bind(item_id)
                    .bind(parent_id)
                    .fetch_optional(&mut *tx)
                    .await?;
                match row {
                    Some(row) => {
                        let path: String = row.try_get("path")?;
                        (!path.is_empty()).then_some(PendingRelease { path, prefix })
                    }
                    None => None,
                }
            }
            _ => None,
        };

        let sql = format!(
            "DELETE FROM \"{}\" WHERE \"id\" = $1 AND \"{}\" = $2",
            dep.table, dep.parent_column
        );
        let affected = sqlx::query(&sql)
            .bind(item_id)
            .bind(parent_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if affected == 0 {
            return Err(ApiError::not_found(format!(
                "item {} not found in {}",
                item_id, dep.table
            )));
        }
        tx.commit().await?;

        if let Some(release) = release {
            self.store.release(&release.path, release.prefix).await;
        }
        info!(
            table = dep.table,
            parent_id, item_id, "deleted dependent row"
        );
        Ok(())
    }

    fn record_not_found(&self, id: i64) -> ApiError {
        ApiError::not_found(format!("record {} not found in {}", id, self.desc.table))
    }

    /// Duplicate probe for the descriptor's unique columns, scoped away from
    /// the row being updated.
    async fn check_unique(
        &self,
        conn: &mut PgConnection,
        staged: &StagedWrite,
        exclude_id: Option<i64>,
    ) -> Result<(), ApiError> {
        for &column in self.desc.unique_columns {
            let Some(value) = staged.get(column) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let sql = match exclude_id {
                Some(_) => format!(
                    "SELECT EXISTS (SELECT 1 FROM \"{}\" WHERE \"{}\" = $1 AND \"id\" <> $2) AS taken",
                    self.desc.table, column
                ),
                None => format!(
                    "SELECT EXISTS (SELECT 1 FROM \"{}\" WHERE \"{}\" = $1) AS taken",
                    self.desc.table, column
                ),
            };
            let mut q = bind_value(sqlx::query(&sql), value);
            if let Some(id) = exclude_id {
                q = q.bind(id);
            }
            let taken: bool = q.fetch_one(&mut *conn).await?.try_get("taken")?;
            if taken {
                return Err(ApiError::conflict(format!(
                    "{} '{}' already exists",
                    column,
                    display_value(value)
                )));
            }
        }
        Ok(())
    }

    async fn resolve_slug(
        &self,
        conn: &mut PgConnection,
        staged: &mut StagedWrite,
        exclude_id: Option<i64>,
    ) -> Result<(), ApiError> {
        let Some(spec) = self.desc.slug.as_ref() else {
            return Ok(());
        };

        // an explicit slug wins over derivation from the source field
        let base = match staged.get(spec.column) {
            Some(Value::String(s)) if !slug::derive_slug(s).is_empty() => slug::derive_slug(s),
            _ => match staged.get(spec.source) {
                Some(Value::String(source)) => slug::derive_slug(source),
                _ => return Ok(()),
            },
        };
        if base.is_empty() {
            return Err(ApiError::validation(format!(
                "field '{}' produces an empty slug",
                spec.source
            )));
        }

        let taken = self
            .slug_collisions(conn, spec.column, &base, exclude_id)
            .await?;
        let unique = slug::ensure_unique(&base, spec.policy, |candidate| taken.contains(candidate));
        staged.set(spec.column, Value::String(unique));
        Ok(())
    }

    /// Update-time slug handling: recompute when the source or the slug
    /// column itself was staged, re-deriving from the stored source when the
    /// slug was cleared. Untouched otherwise.
    async fn resolve_slug_for_update(
        &self,
        conn: &mut PgConnection,
        staged: &mut StagedWrite,
        prior: &Map<String, Value>,
        id: i64,
    ) -> Result<(), ApiError> {
        let Some(spec) = self.desc.slug.as_ref() else {
            return Ok(());
        };
        let slug_staged = staged.get(spec.column).is_some();
        let source_staged = staged.get(spec.source).is_some();
        if !slug_staged && !source_staged {
            return Ok(());
        }

        // cleared slug with no new source: fall back to the stored source
        if slug_staged && !source_staged {
            if let Some(Value::Null) = staged.get(spec.column) {
                if let Some(Value::String(source)) = prior.get(spec.source) {
                    staged.set(spec.column, Value::String(source.clone()));
                }
            }
        }
        self.resolve_slug(conn, staged, Some(id)).await
    }

    /// Fetch the candidate and every `candidate-%` sibling in one query.
    async fn slug_collisions(
        &self,
        conn: &mut PgConnection,
        column: &'static str,
        candidate: &str,
        exclude_id: Option<i64>,
    ) -> Result<HashSet<String>, ApiError> {
        let pattern = format!("{}-%", candidate);
        let sql = match exclude_id {
            Some(_) => format!(
                "SELECT \"{}\" AS slug FROM \"{}\" WHERE (\"{}\" = $1 OR \"{}\" LIKE $2) AND \"id\" <> $3",
                column, self.desc.table, column, column
            ),
            None => format!(
                "SELECT \"{}\" AS slug FROM \"{}\" WHERE \"{}\" = $1 OR \"{}\" LIKE $2",
                column, self.desc.table, column, column
            ),
        };
        let mut q = sqlx::query(&sql).bind(candidate).bind(&pattern);
        if let Some(id) = exclude_id {
            q = q.bind(id);
        }
        let rows = q.fetch_all(&mut *conn).await?;
        let mut taken = HashSet::with_capacity(rows.len());
        for row in rows {
            taken.insert(row.try_get::<String, _>("slug")?);
        }
        Ok(taken)
    }

    async fn insert_primary(
        &self,
        conn: &mut PgConnection,
        staged: &StagedWrite,
    ) -> Result<i64, ApiError> {
        let mut columns: Vec<String> = Vec::new();
        let mut placeholders: Vec<String> = Vec::new();
        let mut args: Vec<&Value> = Vec::new();
        for (name, value) in staged.columns() {
            columns.push(format!("\"{}\"", name));
            if value.is_null() {
                // literal NULL sidesteps typed-bind mismatches on non-text columns
                placeholders.push("NULL".to_string());
            } else {
                args.push(value);
                placeholders.push(format!("${}", args.len()));
            }
        }

        let sql = if columns.is_empty() {
            format!(
                "INSERT INTO \"{}\" DEFAULT VALUES RETURNING \"id\"",
                self.desc.table
            )
        } else {
            format!(
                "INSERT INTO \"{}\" ({}) VALUES ({}) RETURNING \"id\"",
                self.desc.table,
                columns.join(", "),
                placeholders.join(", ")
            )
        };
        let mut q = sqlx::query(&sql);
        for value in args {
            q = bind_value(q, value);
        }
        let id: i64 = q.fetch_one(&mut *conn).await?.try_get("id")?;
        Ok(id)
    }

    async fn update_primary(
        &self,
        conn: &mut PgConnection,
        id: i64,
        staged: &StagedWrite,
    ) -> Result<u64, ApiError> {
        let mut sets: Vec<String> = Vec::new();
        let mut args: Vec<&Value> = Vec::new();
        for (name, value) in staged.columns() {
            if value.is_null() {
                sets.push(format!("\"{}\" = NULL", name));
            } else {
                args.push(value);
                sets.push(format!("\"{}\" = ${}", name, args.len()));
            }
        }
        // the bump also covers dependent-only updates
        sets.push("\"updated_at\" = now()".to_string());

        let sql = format!(
            "UPDATE \"{}\" SET {} WHERE \"id\" = ${}",
            self.desc.table,
            sets.join(", "),
            args.len() + 1
        );
        let mut q = sqlx::query(&sql);
        for value in args {
            q = bind_value(q, value);
        }
        let result = q.bind(id).execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }

    async fn write_dependents(
        &self,
        conn: &mut PgConnection,
        parent_id: i64,
        req: &WriteRequest,
        mode: DependentMode,
    ) -> Result<(), ApiError> {
        for dep in self.desc.dependents {
            match dep.kind {
                DependentKind::Link {
                    payload_field,
                    link_column,
                } => {
                    let Some(value) = req.fields.get(payload_field) else {
                        continue;
                    };
                    let ids = parse_id_list(payload_field, value)?;
                    if matches!(mode, DependentMode::Update) {
                        let sql = format!(
                            "DELETE FROM \"{}\" WHERE \"{}\" = $1",
                            dep.table, dep.parent_column
                        );
                        sqlx::query(&sql).bind(parent_id).execute(&mut *conn).await?;
                    }
                    for link_id in ids {
                        let sql = format!(
                            "INSERT INTO \"{}\" (\"{}\", \"{}\") VALUES ($1, $2)",
                            dep.table, dep.parent_column, link_column
                        );
                        sqlx::query(&sql)
                            .bind(parent_id)
                            .bind(link_id)
                            .execute(&mut *conn)
                            .await?;
                    }
                }
                DependentKind::Media {
                    payload_field,
                    path_column,
                    ordinal_column,
                    ..
                } => {
                    let uploads = req.uploads_for(payload_field);
                    if uploads.is_empty() {
                        continue;
                    }
                    // new media appends after the current ordinal ceiling
                    let start: i64 = match mode {
                        DependentMode::Create => 0,
                        DependentMode::Update => {
                            let sql = format!(
                                "SELECT COALESCE(MAX(\"{}\"), -1) + 1 AS next FROM \"{}\" WHERE \"{}\" = $1",
                                ordinal_column, dep.table, dep.parent_column
                            );
                            sqlx::query(&sql)
                                .bind(parent_id)
                                .fetch_one(&mut *conn)
                                .await?
                                .try_get("next")?
                        }
                    };
                    for (offset, upload) in uploads.iter().enumerate() {
                        let sql = format!(
                            "INSERT INTO \"{}\" (\"{}\", \"{}\", \"{}\") VALUES ($1, $2, $3)",
                            dep.table, dep.parent_column, path_column, ordinal_column
                        );
                        sqlx::query(&sql)
                            .bind(parent_id)
                            .bind(&upload.path)
                            .bind(start + offset as i64)
                            .execute(&mut *conn)
                            .await?;
                    }
                }
                DependentKind::Items {
                    payload_field,
                    columns,
                    ordinal_column,
                } => {
                    let Some(value) = req.fields.get(payload_field) else {
                        continue;
                    };
                    let rows = parse_item_rows(columns, ordinal_column, payload_field, value)?;
                    if matches!(mode, DependentMode::Update) {
                        let sql = format!(
                            "DELETE FROM \"{}\" WHERE \"{}\" = $1",
                            dep.table, dep.parent_column
                        );
                        sqlx::query(&sql).bind(parent_id).execute(&mut *conn).await?;
                    }
                    for item in &rows {
                        let mut columns_sql =
                            vec![format!("\"{}\"", dep.parent_column), format!("\"{}\"", ordinal_column)];
                        let mut placeholders = vec!["$1".to_string(), "$2".to_string()];
                        let parent = json!(parent_id);
                        let ordinal = json!(item.ordinal);
                        let mut args: Vec<&Value> = vec![&parent, &ordinal];
                        for (name, value) in &item.columns {
                            columns_sql.push(format!("\"{}\"", name));
                            if value.is_null() {
                                placeholders.push("NULL".to_string());
                            } else {
                                args.push(value);
                                placeholders.push(format!("${}", args.len()));
                            }
                        }
                        let sql = format!(
                            "INSERT INTO \"{}\" ({}) VALUES ({})",
                            dep.table,
                            columns_sql.join(", "),
                            placeholders.join(", ")
                        );
                        let mut q = sqlx::query(&sql);
                        for value in args {
                            q = bind_value(q, value);
                        }
                        q.execute(&mut *conn).await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Base row as a JSON map, without joins or dependents.
    async fn fetch_plain(
        &self,
        conn: &mut PgConnection,
        id: i64,
    ) -> Result<Option<Map<String, Value>>, ApiError> {
        let sql = format!(
            "SELECT row_to_json(t) AS row FROM (SELECT * FROM \"{}\" WHERE \"id\" = $1) t",
            self.desc.table
        );
        match sqlx::query(&sql).bind(id).fetch_optional(&mut *conn).await? {
            Some(row) => {
                let value: Value = row.try_get("row")?;
                match value {
                    Value::Object(map) => Ok(Some(map)),
                    _ => Ok(None),
                }
            }
            None => Ok(None),
        }
    }

    /// Full entity: base row, joined columns, dependent collections.
    async fn fetch_assembled(
        &self,
        conn: &mut PgConnection,
        column: &str,
        key: &Value,
    ) -> Result<Option<Value>, ApiError> {
        let (select, from) = joined_select(self.desc);
        let sql = format!(
            "SELECT row_to_json(t) AS row FROM ({}{} WHERE e.\"{}\" = $1) t",
            select, from, column
        );
        let row = bind_value(sqlx::query(&sql), key)
            .fetch_optional(&mut *conn)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut entity: Value = row.try_get("row")?;
        self.attach_dependents(conn, &mut entity).await?;
        Ok(Some(entity))
    }

    async fn attach_dependents(
        &self,
        conn: &mut PgConnection,
        entity: &mut Value,
    ) -> Result<(), ApiError> {
        if self.desc.dependents.is_empty() {
            return Ok(());
        }
        let Some(id) = entity.get("id").and_then(Value::as_i64) else {
            return Ok(());
        };
        let Value::Object(map) = entity else {
            return Ok(());
        };

        for dep in self.desc.dependents {
            match dep.kind {
                DependentKind::Link {
                    payload_field,
                    link_column,
                } => {
                    let sql = format!(
                        "SELECT \"{}\" AS link_id FROM \"{}\" WHERE \"{}\" = $1 ORDER BY \"{}\"",
                        link_column, dep.table, dep.parent_column, link_column
                    );
                    let rows = sqlx::query(&sql).bind(id).fetch_all(&mut *conn).await?;
                    let mut ids = Vec::with_capacity(rows.len());
                    for row in rows {
                        ids.push(Value::from(row.try_get::<i64, _>("link_id")?));
                    }
                    map.insert(payload_field.to_string(), Value::Array(ids));
                }
                DependentKind::Media {
                    payload_field,
                    ordinal_column,
                    ..
                }
                | DependentKind::Items {
                    payload_field,
                    ordinal_column,
                    ..
                } => {
                    let sql = format!(
                        "SELECT row_to_json(t) AS row FROM (SELECT * FROM \"{}\" WHERE \"{}\" = $1 ORDER BY \"{}\", \"id\") t",
                        dep.table, dep.parent_column, ordinal_column
                    );
                    let rows = sqlx::query(&sql).bind(id).fetch_all(&mut *conn).await?;
                    let mut children = Vec::with_capacity(rows.len());
                    for row in rows {
                        children.push(row.try_get::<Value, _>("row")?);
                    }
                    map.insert(payload_field.to_string(), Value::Array(children));
                }
            }
        }
        Ok(())
    }

    /// Read counters update out of band; a failed bump is logged, never a
    /// request error.
    fn bump_view_count(&self, entity: &Value) {
        let Some(column) = self.desc.view_count_column else {
            return;
        };
        let Some(id) = entity.get("id").and_then(Value::as_i64) else {
            return;
        };
        let sql = format!(
            "UPDATE \"{}\" SET \"{}\" = \"{}\" + 1 WHERE \"id\" = $1",
            self.desc.table, column, column
        );
        let pool = self.pool.clone();
        let table = self.desc.table;
        tokio::spawn(async move {
            if let Err(e) = sqlx::query(&sql).bind(id).execute(&pool).await {
                warn!(table, id, error = %e, "failed to bump view count");
            }
        });
    }
}

fn strip_hidden(desc: &EntityDescriptor, mut value: Value) -> Value {
    if desc.hidden_columns.is_empty() {
        return value;
    }
    if let Value::Object(map) = &mut value {
        for &column in desc.hidden_columns {
            map.remove(column);
        }
    }
    value
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
