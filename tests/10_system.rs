mod common;

use anyhow::Result;
use serde_json::Value;

#[tokio::test]
async fn root_describes_the_service() -> Result<()> {
    let server = common::spawn_app(common::offline_config()?).await?;

    let res = common::client().get(format!("{}/", server.base_url)).send().await?;
    assert_eq!(res.status(), 200);

    let body: Value = res.json().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["name"], "Leadboard API");
    assert!(body["data"]["endpoints"]["leads"].is_string());
    Ok(())
}

#[tokio::test]
async fn health_reports_unreachable_database() -> Result<()> {
    let server = common::spawn_app(common::offline_config()?).await?;

    let res = common::client().get(format!("{}/health", server.base_url)).send().await?;
    assert_eq!(res.status(), 503);

    let body: Value = res.json().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
    assert_eq!(body["data"]["status"], "degraded");
    Ok(())
}

#[tokio::test]
async fn unknown_routes_are_not_found() -> Result<()> {
    let server = common::spawn_app(common::offline_config()?).await?;

    let res = common::client()
        .get(format!("{}/nope", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), 404);
    Ok(())
}
