// List query builder
//
// Turns validated list parameters into SQL text plus an ordered parameter
// list. Identifiers come exclusively from the static descriptors; request
// values only ever travel as bind parameters.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{EntityDescriptor, SortOrder};

/// Validated list-read parameters. Handlers build this from the query string
/// after clamping the page size against the configured maximum.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    /// Free-text needle matched against the entity's search columns.
    pub query: Option<String>,
    pub page_index: i64,
    pub page_size: i64,
    pub sort_key: Option<String>,
    pub sort_order: Option<SortOrder>,
    /// Equality filters; only columns the descriptor declares are applied.
    pub filters: Vec<(String, Value)>,
}

/// Finished SQL pair: one page of rows and the matching total count.
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub sql: String,
    pub count_sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total_items: i64,
    pub page_index: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(total_items: i64, page_index: i64, page_size: i64) -> Self {
        let page_size = page_size.max(1);
        let total_pages = if total_items <= 0 {
            0
        } else {
            (total_items + page_size - 1) / page_size
        };
        Self {
            total_items,
            page_index: page_index.max(1),
            page_size,
            total_pages,
        }
    }
}

/// SELECT and FROM fragments including the descriptor's joins. The entity
/// table is aliased `e`, joined tables `j0`, `j1`, ... in declaration order.
pub fn joined_select(desc: &EntityDescriptor) -> (String, String) {
    let mut select = String::from("SELECT e.*");
    let mut from = format!(" FROM \"{}\" e", desc.table);
    for (i, join) in desc.joins.iter().enumerate() {
        for &(column, alias) in join.select {
            select.push_str(&format!(", j{}.\"{}\" AS \"{}\"", i, column, alias));
        }
        from.push_str(&format!(
            " LEFT JOIN \"{}\" j{} ON j{}.\"{}\" = e.\"{}\"",
            join.table, i, i, join.foreign, join.local
        ));
    }
    (select, from)
}

pub struct ListQueryBuilder<'a> {
    desc: &'a EntityDescriptor,
    params: &'a ListParams,
}

impl<'a> ListQueryBuilder<'a> {
    pub fn new(desc: &'a EntityDescriptor, params: &'a ListParams) -> Self {
        Self { desc, params }
    }

    pub fn build(&self) -> ListQuery {
        let page_index = self.params.page_index.max(1);
        let page_size = self.params.page_size.max(1);
        let offset = (page_index - 1) * page_size;

        let mut args: Vec<Value> = Vec::new();
        let mut conditions: Vec<String> = Vec::new();

        if let Some(term) = self
            .params
            .query
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            let needle = format!("%{}%", term);
            let mut ors = Vec::new();
            for &column in self.desc.search_columns {
                args.push(Value::String(needle.clone()));
                ors.push(format!("e.\"{}\" ILIKE ${}", column, args.len()));
            }
            if !ors.is_empty() {
                conditions.push(format!("({})", ors.join(" OR ")));
            }
        }

        for (column, value) in &self.params.filters {
            if !self.desc.has_filter(column) {
                continue;
            }
            if value.is_null() {
                continue;
            }
            if matches!(value, Value::String(s) if s.trim().is_empty()) {
                continue;
            }
            args.push(value.clone());
            conditions.push(format!("e.\"{}\" = ${}", column, args.len()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let (sort_column, sort_order) = self.resolve_sort();
        let (select, from) = joined_select(self.desc);

        let sql = format!(
            "{}{}{} ORDER BY e.\"{}\" {} LIMIT {} OFFSET {}",
            select,
            from,
            where_clause,
            sort_column,
            sort_order.to_sql(),
            page_size,
            offset
        );
        let count_sql = format!(
            "SELECT COUNT(*) AS count FROM \"{}\" e{}",
            self.desc.table, where_clause
        );

        ListQuery {
            sql,
            count_sql,
            params: args,
        }
    }

    /// Whitelisted sort key, or the descriptor's default when the key is
    /// absent or unknown.
    fn resolve_sort(&self) -> (&'static str, SortOrder) {
        match self
            .params
            .sort_key
            .as_deref()
            .and_then(|key| self.desc.sort_column(key))
        {
            Some(column) => (column, self.params.sort_order.unwrap_or(SortOrder::Asc)),
            None => self.desc.default_sort,
        }
    }
}
