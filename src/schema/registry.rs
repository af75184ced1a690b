// Static registry of every entity the API serves
//
// The /api/:entity routes resolve their first path segment against this
// table. Comments are declared here too but stay out of the registry; they
// have their own routes and moderation rules.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use super::{
    AttachmentField, ColumnRule, ColumnSpec, ColumnType, DependentKind, DependentTable,
    EntityDescriptor, JoinSpec, ReferencingTable, SlugSpec, SortOrder,
};
use crate::slug::SlugPolicy;

/// Entities that can carry comments.
pub const COMMENTABLE_ENTITIES: &[&str] = &["articles", "posts"];

static ARTICLES: EntityDescriptor = EntityDescriptor {
    name: "articles",
    table: "articles",
    columns: &[
        ColumnSpec::required("judul", ColumnType::Text),
        ColumnSpec::optional("judul_seo", ColumnType::Text),
        ColumnSpec::required("content", ColumnType::Text),
        ColumnSpec::optional("gambar", ColumnType::Text),
        ColumnSpec::optional("category_id", ColumnType::BigInt),
        ColumnSpec::optional("author_id", ColumnType::BigInt),
    ],
    rules: &[],
    unique_columns: &[],
    slug: Some(SlugSpec {
        column: "judul_seo",
        source: "judul",
        policy: SlugPolicy::Sequential,
    }),
    attachments: &[AttachmentField {
        column: "gambar",
        prefix: "/uploads/articles/",
    }],
    dependents: &[],
    restrict_on_delete: &[],
    cleanup_on_delete: &[ReferencingTable {
        table: "comments",
        column: "parent_id",
        filter: Some(("parent_kind", "articles")),
    }],
    joins: &[
        JoinSpec {
            table: "users",
            local: "author_id",
            foreign: "id",
            select: &[("name", "author_name")],
        },
        JoinSpec {
            table: "categories",
            local: "category_id",
            foreign: "id",
            select: &[("name", "category_name")],
        },
    ],
    hidden_columns: &[],
    search_columns: &["judul", "content"],
    sort_keys: &[
        ("judul", "judul"),
        ("created_at", "created_at"),
        ("view_count", "view_count"),
    ],
    default_sort: ("created_at", SortOrder::Desc),
    filter_columns: &["category_id", "author_id"],
    view_count_column: Some("view_count"),
};

static POSTS: EntityDescriptor = EntityDescriptor {
    name: "posts",
    table: "posts",
    columns: &[
        ColumnSpec::required("title", ColumnType::Text),
        ColumnSpec::optional("slug", ColumnType::Text),
        ColumnSpec::required("content", ColumnType::Text),
        ColumnSpec::optional("excerpt", ColumnType::Text),
        ColumnSpec::optional("featured_image", ColumnType::Text),
        ColumnSpec::optional("author_id", ColumnType::BigInt),
        ColumnSpec::optional("status", ColumnType::Text),
    ],
    rules: &[("status", ColumnRule::OneOf(&["draft", "published"]))],
    unique_columns: &[],
    slug: Some(SlugSpec {
        column: "slug",
        source: "title",
        policy: SlugPolicy::Sequential,
    }),
    attachments: &[AttachmentField {
        column: "featured_image",
        prefix: "/uploads/posts/",
    }],
    dependents: &[
        DependentTable {
            table: "post_categories",
            parent_column: "post_id",
            kind: DependentKind::Link {
                payload_field: "category_ids",
                link_column: "category_id",
            },
        },
        DependentTable {
            table: "post_tags",
            parent_column: "post_id",
            kind: DependentKind::Link {
                payload_field: "tag_ids",
                link_column: "tag_id",
            },
        },
    ],
    restrict_on_delete: &[],
    cleanup_on_delete: &[ReferencingTable {
        table: "comments",
        column: "parent_id",
        filter: Some(("parent_kind", "posts")),
    }],
    joins: &[JoinSpec {
        table: "users",
        local: "author_id",
        foreign: "id",
        select: &[("name", "author_name")],
    }],
    hidden_columns: &[],
    search_columns: &["title", "content"],
    sort_keys: &[
        ("title", "title"),
        ("created_at", "created_at"),
        ("status", "status"),
    ],
    default_sort: ("created_at", SortOrder::Desc),
    filter_columns: &["status", "author_id"],
    view_count_column: None,
};

static PAGES: EntityDescriptor = EntityDescriptor {
    name: "pages",
    table: "pages",
    columns: &[
        ColumnSpec::required("title", ColumnType::Text),
        ColumnSpec::optional("slug", ColumnType::Text),
        ColumnSpec::required("content", ColumnType::Text),
    ],
    rules: &[],
    unique_columns: &[],
    slug: Some(SlugSpec {
        column: "slug",
        source: "title",
        policy: SlugPolicy::Sequential,
    }),
    attachments: &[],
    dependents: &[],
    restrict_on_delete: &[],
    cleanup_on_delete: &[],
    joins: &[],
    hidden_columns: &[],
    search_columns: &["title", "content"],
    sort_keys: &[
        ("title", "title"),
        ("created_at", "created_at"),
        ("view_count", "view_count"),
    ],
    default_sort: ("title", SortOrder::Asc),
    filter_columns: &[],
    view_count_column: Some("view_count"),
};

static CATEGORIES: EntityDescriptor = EntityDescriptor {
    name: "categories",
    table: "categories",
    columns: &[
        ColumnSpec::required("name", ColumnType::Text),
        ColumnSpec::optional("slug", ColumnType::Text),
        ColumnSpec::optional("description", ColumnType::Text),
    ],
    rules: &[],
    unique_columns: &["name"],
    slug: Some(SlugSpec {
        column: "slug",
        source: "name",
        policy: SlugPolicy::Sequential,
    }),
    attachments: &[],
    dependents: &[],
    restrict_on_delete: &[
        ReferencingTable {
            table: "articles",
            column: "category_id",
            filter: None,
        },
        ReferencingTable {
            table: "post_categories",
            column: "category_id",
            filter: None,
        },
    ],
    cleanup_on_delete: &[],
    joins: &[],
    hidden_columns: &[],
    search_columns: &["name"],
    sort_keys: &[("name", "name"), ("created_at", "created_at")],
    default_sort: ("name", SortOrder::Asc),
    filter_columns: &[],
    view_count_column: None,
};

static TAGS: EntityDescriptor = EntityDescriptor {
    name: "tags",
    table: "tags",
    columns: &[
        ColumnSpec::required("name", ColumnType::Text),
        ColumnSpec::optional("slug", ColumnType::Text),
    ],
    rules: &[],
    unique_columns: &["name"],
    slug: Some(SlugSpec {
        column: "slug",
        source: "name",
        policy: SlugPolicy::Sequential,
    }),
    attachments: &[],
    dependents: &[],
    restrict_on_delete: &[],
    cleanup_on_delete: &[ReferencingTable {
        table: "post_tags",
        column: "tag_id",
        filter: None,
    }],
    joins: &[],
    hidden_columns: &[],
    search_columns: &["name"],
    sort_keys: &[("name", "name"), ("created_at", "created_at")],
    default_sort: ("name", SortOrder::Asc),
    filter_columns: &[],
    view_count_column: None,
};

static MENUS: EntityDescriptor = EntityDescriptor {
    name: "menus",
    table: "menus",
    columns: &[
        ColumnSpec::required("name", ColumnType::Text),
        ColumnSpec::optional("location", ColumnType::Text),
    ],
    rules: &[],
    unique_columns: &["name"],
    slug: None,
    attachments: &[],
    dependents: &[DependentTable {
        table: "menu_items",
        parent_column: "menu_id",
        kind: DependentKind::Items {
            payload_field: "items",
            columns: &[
                ColumnSpec::required("label", ColumnType::Text),
                ColumnSpec::required("url", ColumnType::Text),
            ],
            ordinal_column: "sort_order",
        },
    }],
    restrict_on_delete: &[],
    cleanup_on_delete: &[],
    joins: &[],
    hidden_columns: &[],
    search_columns: &["name"],
    sort_keys: &[("name", "name"), ("created_at", "created_at")],
    default_sort: ("name", SortOrder::Asc),
    filter_columns: &[],
    view_count_column: None,
};

static BANNERS: EntityDescriptor = EntityDescriptor {
    name: "banners",
    table: "banners",
    columns: &[
        ColumnSpec::required("title", ColumnType::Text),
        ColumnSpec::optional("image", ColumnType::Text),
        ColumnSpec::optional("link_url", ColumnType::Text),
        ColumnSpec::optional("active", ColumnType::Bool),
    ],
    rules: &[("link_url", ColumnRule::Url)],
    unique_columns: &[],
    slug: None,
    attachments: &[AttachmentField {
        column: "image",
        prefix: "/uploads/banners/",
    }],
    dependents: &[],
    restrict_on_delete: &[],
    cleanup_on_delete: &[],
    joins: &[],
    hidden_columns: &[],
    search_columns: &["title"],
    sort_keys: &[("title", "title"), ("created_at", "created_at")],
    default_sort: ("created_at", SortOrder::Desc),
    filter_columns: &["active"],
    view_count_column: None,
};

static LINKS: EntityDescriptor = EntityDescriptor {
    name: "links",
    table: "links",
    columns: &[
        ColumnSpec::required("title", ColumnType::Text),
        ColumnSpec::required("url", ColumnType::Text),
    ],
    rules: &[("url", ColumnRule::Url)],
    unique_columns: &[],
    slug: None,
    attachments: &[],
    dependents: &[],
    restrict_on_delete: &[],
    cleanup_on_delete: &[],
    joins: &[],
    hidden_columns: &[],
    search_columns: &["title"],
    sort_keys: &[("title", "title"), ("created_at", "created_at")],
    default_sort: ("title", SortOrder::Asc),
    filter_columns: &[],
    view_count_column: None,
};

static GALLERIES: EntityDescriptor = EntityDescriptor {
    name: "galleries",
    table: "galleries",
    columns: &[
        ColumnSpec::required("title", ColumnType::Text),
        ColumnSpec::optional("slug", ColumnType::Text),
        ColumnSpec::optional("description", ColumnType::Text),
    ],
    rules: &[],
    unique_columns: &[],
    slug: Some(SlugSpec {
        column: "slug",
        source: "title",
        policy: SlugPolicy::Timestamp,
    }),
    attachments: &[],
    dependents: &[DependentTable {
        table: "gallery_images",
        parent_column: "gallery_id",
        kind: DependentKind::Media {
            payload_field: "media",
            path_column: "path",
            ordinal_column: "position",
            prefix: "/uploads/galleries/",
        },
    }],
    restrict_on_delete: &[],
    cleanup_on_delete: &[],
    joins: &[],
    hidden_columns: &[],
    search_columns: &["title"],
    sort_keys: &[("title", "title"), ("created_at", "created_at")],
    default_sort: ("created_at", SortOrder::Desc),
    filter_columns: &[],
    view_count_column: None,
};

static USERS: EntityDescriptor = EntityDescriptor {
    name: "users",
    table: "users",
    columns: &[
        ColumnSpec::required("name", ColumnType::Text),
        ColumnSpec::required("email", ColumnType::Text),
        ColumnSpec::required("password", ColumnType::Text),
        ColumnSpec::optional("bio", ColumnType::Text),
        ColumnSpec::optional("avatar", ColumnType::Text),
    ],
    rules: &[("password", ColumnRule::Sha256Hex)],
    unique_columns: &["email"],
    slug: None,
    attachments: &[AttachmentField {
        column: "avatar",
        prefix: "/uploads/users/",
    }],
    dependents: &[],
    restrict_on_delete: &[
        ReferencingTable {
            table: "articles",
            column: "author_id",
            filter: None,
        },
        ReferencingTable {
            table: "posts",
            column: "author_id",
            filter: None,
        },
    ],
    cleanup_on_delete: &[],
    joins: &[],
    hidden_columns: &["password"],
    search_columns: &["name", "email"],
    sort_keys: &[("name", "name"), ("created_at", "created_at")],
    default_sort: ("name", SortOrder::Asc),
    filter_columns: &[],
    view_count_column: None,
};

/// Comments live outside the registry; their routes enforce the moderation
/// workflow. The descriptor exists so list reads share the query builder.
pub static COMMENTS: EntityDescriptor = EntityDescriptor {
    name: "comments",
    table: "comments",
    columns: &[
        ColumnSpec::required("parent_kind", ColumnType::Text),
        ColumnSpec::required("parent_id", ColumnType::BigInt),
        ColumnSpec::required("author_name", ColumnType::Text),
        ColumnSpec::optional("author_email", ColumnType::Text),
        ColumnSpec::required("body", ColumnType::Text),
        ColumnSpec::optional("status", ColumnType::Text),
    ],
    rules: &[("status", ColumnRule::OneOf(&["pending", "approved", "spam"]))],
    unique_columns: &[],
    slug: None,
    attachments: &[],
    dependents: &[],
    restrict_on_delete: &[],
    cleanup_on_delete: &[],
    joins: &[],
    hidden_columns: &[],
    search_columns: &["author_name", "body"],
    sort_keys: &[("created_at", "created_at")],
    default_sort: ("created_at", SortOrder::Desc),
    filter_columns: &["parent_kind", "parent_id", "status"],
    view_count_column: None,
};

pub static ENTITIES: &[&EntityDescriptor] = &[
    &ARTICLES,
    &POSTS,
    &PAGES,
    &CATEGORIES,
    &TAGS,
    &MENUS,
    &BANNERS,
    &LINKS,
    &GALLERIES,
    &USERS,
];

static BY_NAME: Lazy<HashMap<&'static str, &'static EntityDescriptor>> =
    Lazy::new(|| ENTITIES.iter().map(|d| (d.name, *d)).collect());

/// Resolve a URL segment to its descriptor.
pub fn lookup(name: &str) -> Option<&'static EntityDescriptor> {
    BY_NAME.get(name).copied()
}
