mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};

#[tokio::test]
async fn settings_come_back_grouped_and_typed() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::api_ready(server).await? {
        eprintln!("skipping: database unavailable");
        return Ok(());
    }
    let client = reqwest::Client::new();

    let settings = client
        .get(format!("{}/api/settings", server.base_url))
        .send()
        .await?
        .json::<Value>()
        .await?;
    assert!(settings["general"]["site_name"].is_string(), "body: {}", settings);
    assert!(settings["display"]["items_per_page"].is_number());
    assert!(settings["display"]["show_comments"].is_boolean());
    Ok(())
}

#[tokio::test]
async fn scalar_updates_are_reflected_immediately() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::api_ready(server).await? {
        eprintln!("skipping: database unavailable");
        return Ok(());
    }
    let client = reqwest::Client::new();
    let name = common::unique("Kabar");

    let res = client
        .put(format!("{}/api/settings", server.base_url))
        .json(&json!({ "site_name": name }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let updated = res.json::<Value>().await?;
    assert_eq!(updated["general"]["site_name"].as_str(), Some(name.as_str()));

    let fetched = client
        .get(format!("{}/api/settings", server.base_url))
        .send()
        .await?
        .json::<Value>()
        .await?;
    assert_eq!(fetched["general"]["site_name"].as_str(), Some(name.as_str()));
    Ok(())
}

#[tokio::test]
async fn unchanged_values_do_not_count_as_an_update() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::api_ready(server).await? {
        eprintln!("skipping: database unavailable");
        return Ok(());
    }
    let client = reqwest::Client::new();
    let tagline = common::unique("warta hari ini");

    let res = client
        .put(format!("{}/api/settings", server.base_url))
        .json(&json!({ "tagline": tagline }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    // the same value again changes nothing
    let res = client
        .put(format!("{}/api/settings", server.base_url))
        .json(&json!({ "tagline": tagline }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn unknown_and_mistyped_keys_are_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::api_ready(server).await? {
        eprintln!("skipping: database unavailable");
        return Ok(());
    }
    let client = reqwest::Client::new();

    let res = client
        .put(format!("{}/api/settings", server.base_url))
        .json(&json!({ "made_up_key": "x" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<Value>().await?;
    assert!(
        body["error"].as_str().unwrap_or("").contains("unknown setting"),
        "body: {}",
        body
    );

    let res = client
        .put(format!("{}/api/settings", server.base_url))
        .json(&json!({ "items_per_page": "abc" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .put(format!("{}/api/settings", server.base_url))
        .json(&json!({ "show_comments": "maybe" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn typed_values_survive_the_text_store() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::api_ready(server).await? {
        eprintln!("skipping: database unavailable");
        return Ok(());
    }
    let client = reqwest::Client::new();

    let current = client
        .get(format!("{}/api/settings", server.base_url))
        .send()
        .await?
        .json::<Value>()
        .await?;
    let shown = current["display"]["show_comments"]
        .as_bool()
        .expect("boolean setting");

    let res = client
        .put(format!("{}/api/settings", server.base_url))
        .json(&json!({ "show_comments": !shown }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let updated = res.json::<Value>().await?;
    assert_eq!(updated["display"]["show_comments"].as_bool(), Some(!shown));

    // numbers and json come back as numbers and objects, not text
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH)?.subsec_nanos();
    let per_page = 5 + (nanos % 40) as i64;
    let profile = format!("https://example.com/kabar-{}", nanos);
    let res = client
        .put(format!("{}/api/settings", server.base_url))
        .json(&json!({
            "items_per_page": per_page,
            "social_links": { "facebook": profile }
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let updated = res.json::<Value>().await?;
    assert_eq!(updated["display"]["items_per_page"].as_i64(), Some(per_page));
    assert_eq!(
        updated["social"]["social_links"]["facebook"].as_str(),
        Some(profile.as_str())
    );
    Ok(())
}
