mod common;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn register(server: &common::TestServer, email: &str, profile: Value) -> Result<Value> {
    let res = server
        .client
        .post(server.url(&format!("/users/{}", email)))
        .json(&profile)
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::OK, "register failed: {}", res.status());
    Ok(res.json().await?)
}

#[tokio::test]
async fn registering_twice_returns_original_record() -> Result<()> {
    let server = common::spawn().await?;

    let first = register(&server, "a@b.com", json!({ "name": "A", "photo": "a.png" })).await?;
    let second = register(&server, "a@b.com", json!({ "name": "Changed", "role": "Admin" })).await?;

    assert_eq!(first, second);
    assert_eq!(second["role"], "User");
    assert_eq!(second["name"], "A");
    assert_eq!(second["email"], "a@b.com");
    assert!(second["_id"].is_string());
    assert!(second["createdAt"].is_string());

    let users: Value = server.client.get(server.url("/users")).send().await?.json().await?;
    assert_eq!(users.as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn role_lookup() -> Result<()> {
    let server = common::spawn().await?;
    register(&server, "a@b.com", json!({})).await?;

    let known: Value = server
        .client
        .get(server.url("/users/role/a@b.com"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(known, json!({ "role": "User" }));

    let res = server.client.get(server.url("/users/role/ghost@b.com")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?, json!({}));
    Ok(())
}

#[tokio::test]
async fn update_role_statuses() -> Result<()> {
    let server = common::spawn().await?;
    let user = register(&server, "a@b.com", json!({})).await?;
    let id = user["_id"].as_str().context("user id")?;
    let url = server.url(&format!("/update-role/{}", id));

    let empty = server.client.patch(&url).json(&json!({})).send().await?;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let bogus = server.client.patch(&url).json(&json!({ "role": "Root" })).send().await?;
    assert_eq!(bogus.status(), StatusCode::BAD_REQUEST);

    let same = server.client.patch(&url).json(&json!({ "role": "User" })).send().await?;
    assert_eq!(same.status(), StatusCode::NOT_FOUND);

    let promoted = server.client.patch(&url).json(&json!({ "role": "Admin" })).send().await?;
    assert_eq!(promoted.status(), StatusCode::OK);

    let role: Value = server
        .client
        .get(server.url("/users/role/a@b.com"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(role["role"], "Admin");
    Ok(())
}

#[tokio::test]
async fn deleting_unknown_user_is_bad_request() -> Result<()> {
    let server = common::spawn().await?;
    let user = register(&server, "a@b.com", json!({})).await?;
    let url = server.url(&format!("/users/delete/{}", user["_id"].as_str().context("user id")?));

    let res = server.client.delete(&url).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = server.client.delete(&url).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["success"], false);

    let malformed = server.client.delete(server.url("/users/delete/not-an-id")).send().await?;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn registration_without_body_uses_empty_profile() -> Result<()> {
    let server = common::spawn().await?;

    let res = server.client.post(server.url("/users/a@b.com")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let user: Value = res.json().await?;
    assert_eq!(user["email"], "a@b.com");
    assert_eq!(user["role"], "User");

    let malformed = server
        .client
        .post(server.url("/users/b@b.com"))
        .header("content-type", "application/json")
        .body("{\"name\": ")
        .send()
        .await?;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn concurrent_registrations_share_one_record() -> Result<()> {
    let server = common::spawn().await?;

    let registrations = (0..16).map(|i| {
        server
            .client
            .post(server.url("/users/a@b.com"))
            .json(&json!({ "name": format!("A{}", i) }))
            .send()
    });
    let responses = futures::future::try_join_all(registrations).await?;

    let mut ids = Vec::new();
    for res in responses {
        assert_eq!(res.status(), StatusCode::OK);
        let user: Value = res.json().await?;
        ids.push(user["_id"].as_str().context("user id")?.to_string());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);

    let users: Value = server.client.get(server.url("/users")).send().await?.json().await?;
    assert_eq!(users.as_array().map(Vec::len), Some(1));
    Ok(())
}
