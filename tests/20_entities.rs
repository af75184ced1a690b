mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn category_crud_roundtrip() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::api_ready(server).await? {
        eprintln!("skipping: database unavailable");
        return Ok(());
    }
    let client = reqwest::Client::new();
    let name = common::unique("Berita Utama");

    let res = client
        .post(format!("{}/api/categories", server.base_url))
        .json(&json!({ "name": name, "description": "headline" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK, "create failed");
    let created = res.json::<Value>().await?;
    let id = created["id"].as_i64().expect("id");
    // slug falls out of the name
    assert!(created["slug"].as_str().unwrap_or("").starts_with("berita-utama"));

    let res = client
        .get(format!("{}/api/categories/{}", server.base_url, id))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .put(format!("{}/api/categories/{}", server.base_url, id))
        .json(&json!({ "description": "updated" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let updated = res.json::<Value>().await?;
    assert_eq!(updated["description"], "updated");
    assert_eq!(updated["name"], json!(name.clone()), "name untouched");

    // free-text search finds it
    let res = client
        .get(format!("{}/api/categories?q={}", server.base_url, name))
        .send()
        .await?;
    let listed = res.json::<Value>().await?;
    assert!(listed["pagination"]["totalItems"].as_i64().unwrap_or(0) >= 1);

    let res = client
        .delete(format!("{}/api/categories/{}", server.base_url, id))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["success"], json!(true));

    let res = client
        .get(format!("{}/api/categories/{}", server.base_url, id))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn duplicate_unique_values_conflict() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::api_ready(server).await? {
        eprintln!("skipping: database unavailable");
        return Ok(());
    }
    let client = reqwest::Client::new();
    let name = common::unique("Olahraga");

    let res = client
        .post(format!("{}/api/categories", server.base_url))
        .json(&json!({ "name": name }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let id = res.json::<Value>().await?["id"].as_i64().expect("id");

    let res = client
        .post(format!("{}/api/categories", server.base_url))
        .json(&json!({ "name": name }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body = res.json::<Value>().await?;
    assert!(body["error"].as_str().unwrap_or("").contains("already exists"));

    client
        .delete(format!("{}/api/categories/{}", server.base_url, id))
        .send()
        .await?;
    Ok(())
}

#[tokio::test]
async fn missing_required_fields_are_named() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::api_ready(server).await? {
        eprintln!("skipping: database unavailable");
        return Ok(());
    }
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/articles", server.base_url))
        .json(&json!({ "judul": "Tanpa isi" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<Value>().await?;
    let message = body["error"].as_str().unwrap_or("");
    assert!(
        message.contains("missing required fields") && message.contains("content"),
        "unexpected error: {}",
        body
    );
    Ok(())
}

#[tokio::test]
async fn article_lifecycle_with_slugs_joins_and_guards() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::api_ready(server).await? {
        eprintln!("skipping: database unavailable");
        return Ok(());
    }
    let client = reqwest::Client::new();

    let author = client
        .post(format!("{}/api/users", server.base_url))
        .json(&json!({
            "name": "Rina",
            "email": common::unique("rina") + "@example.com",
            "password": "rahasia"
        }))
        .send()
        .await?
        .json::<Value>()
        .await?;
    let author_id = author["id"].as_i64().expect("author id");

    let category = client
        .post(format!("{}/api/categories", server.base_url))
        .json(&json!({ "name": common::unique("Teknologi") }))
        .send()
        .await?
        .json::<Value>()
        .await?;
    let category_id = category["id"].as_i64().expect("category id");

    let judul = common::unique("Panduan Memasak Rendang");
    let first = client
        .post(format!("{}/api/articles", server.base_url))
        .json(&json!({
            "judul": judul,
            "content": "Bumbu dan langkah.",
            "category_id": category_id,
            "author_id": author_id
        }))
        .send()
        .await?
        .json::<Value>()
        .await?;
    let first_id = first["id"].as_i64().expect("article id");
    let slug = first["judul_seo"].as_str().expect("slug").to_string();
    assert!(slug.starts_with("panduan-memasak-rendang"));

    // same title again picks the next free suffix
    let second = client
        .post(format!("{}/api/articles", server.base_url))
        .json(&json!({
            "judul": judul,
            "content": "Versi kedua.",
        }))
        .send()
        .await?
        .json::<Value>()
        .await?;
    let second_id = second["id"].as_i64().expect("second id");
    assert_eq!(
        second["judul_seo"].as_str().unwrap_or(""),
        format!("{}-1", slug)
    );

    // joined names ride along on single reads
    let fetched = client
        .get(format!("{}/api/articles/{}", server.base_url, first_id))
        .send()
        .await?
        .json::<Value>()
        .await?;
    assert_eq!(fetched["author_name"], "Rina");
    assert!(fetched["category_name"].is_string());
    assert!(fetched.get("password").is_none());

    // slug addressing resolves to the same record
    let by_slug = client
        .get(format!("{}/api/articles/slug/{}", server.base_url, slug))
        .send()
        .await?
        .json::<Value>()
        .await?;
    assert_eq!(by_slug["id"].as_i64(), Some(first_id));

    // an empty update is a 400, not a silent no-op
    let res = client
        .put(format!("{}/api/articles/{}", server.base_url, first_id))
        .json(&json!({}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<Value>().await?;
    assert!(body["error"].as_str().unwrap_or("").contains("no fields"));

    // clearing an optional reference with an explicit null
    let cleared = client
        .put(format!("{}/api/articles/{}", server.base_url, first_id))
        .json(&json!({ "category_id": null }))
        .send()
        .await?
        .json::<Value>()
        .await?;
    assert!(cleared["category_id"].is_null());

    // category still referenced by the second article? no - but the author is
    let res = client
        .delete(format!("{}/api/users/{}", server.base_url, author_id))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body = res.json::<Value>().await?;
    assert!(body["error"].as_str().unwrap_or("").contains("referenced"));

    for article_id in [first_id, second_id] {
        let res = client
            .delete(format!("{}/api/articles/{}", server.base_url, article_id))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::OK);
    }
    client
        .delete(format!("{}/api/users/{}", server.base_url, author_id))
        .send()
        .await?;
    client
        .delete(format!("{}/api/categories/{}", server.base_url, category_id))
        .send()
        .await?;
    Ok(())
}

#[tokio::test]
async fn single_reads_bump_the_view_counter() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::api_ready(server).await? {
        eprintln!("skipping: database unavailable");
        return Ok(());
    }
    let client = reqwest::Client::new();

    let page = client
        .post(format!("{}/api/pages", server.base_url))
        .json(&json!({
            "title": common::unique("Tentang Kami"),
            "content": "Profil redaksi."
        }))
        .send()
        .await?
        .json::<Value>()
        .await?;
    let id = page["id"].as_i64().expect("page id");

    client
        .get(format!("{}/api/pages/{}", server.base_url, id))
        .send()
        .await?;
    // the bump runs out of band
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;

    let after = client
        .get(format!("{}/api/pages/{}", server.base_url, id))
        .send()
        .await?
        .json::<Value>()
        .await?;
    assert!(
        after["view_count"].as_i64().unwrap_or(0) >= 1,
        "view count never moved: {}",
        after
    );

    client
        .delete(format!("{}/api/pages/{}", server.base_url, id))
        .send()
        .await?;
    Ok(())
}

#[tokio::test]
async fn password_digests_never_leave_the_api() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::api_ready(server).await? {
        eprintln!("skipping: database unavailable");
        return Ok(());
    }
    let client = reqwest::Client::new();
    let email = common::unique("budi") + "@example.com";

    let created = client
        .post(format!("{}/api/users", server.base_url))
        .json(&json!({ "name": "Budi", "email": email, "password": "sangat-rahasia" }))
        .send()
        .await?
        .json::<Value>()
        .await?;
    let id = created["id"].as_i64().expect("user id");
    assert!(created.get("password").is_none(), "create leaked: {}", created);

    let listed = client
        .get(format!("{}/api/users?q={}", server.base_url, email))
        .send()
        .await?
        .json::<Value>()
        .await?;
    for row in listed["data"].as_array().expect("data array") {
        assert!(row.get("password").is_none(), "list leaked: {}", row);
    }

    client
        .delete(format!("{}/api/users/{}", server.base_url, id))
        .send()
        .await?;
    Ok(())
}

#[tokio::test]
async fn list_pagination_clamps_and_reports_totals() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::api_ready(server).await? {
        eprintln!("skipping: database unavailable");
        return Ok(());
    }
    let client = reqwest::Client::new();

    let res = client
        .get(format!(
            "{}/api/links?pageIndex=1&pageSize=2",
            server.base_url
        ))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert!(body["data"].as_array().expect("data").len() <= 2);
    assert_eq!(body["pagination"]["pageSize"], 2);
    assert_eq!(body["pagination"]["pageIndex"], 1);

    let res = client
        .get(format!("{}/api/links?pageSize=0", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
