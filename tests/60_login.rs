// Runs against Postgres via `#[sqlx::test]` (DATABASE_URL).
mod common;

use anyhow::Result;
use serde_json::{json, Value};
use sqlx::PgPool;

use leadboard::auth::{hash_password, Role};
use leadboard::database::models::{Company, NewUser, User};

async fn seed(pool: &PgPool) -> Result<()> {
    let acme = Company::create(pool, "acme", "Acme Roofing", 300).await?;
    User::create(
        pool,
        &NewUser {
            company_id: acme.id,
            email: "rep@acme.test".to_string(),
            password_hash: hash_password("correct horse", 4)?,
            full_name: "Rita Rep".to_string(),
            role: Role::SalesRep,
            crm_user_id: Some("rep-1".to_string()),
        },
    )
    .await?;
    Ok(())
}

async fn login(base_url: &str, company: &str, email: &str, password: &str) -> Result<(u16, Value)> {
    let res = common::client()
        .post(format!("{base_url}/auth/login/{company}"))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await?;
    Ok((res.status().as_u16(), res.json().await?))
}

#[sqlx::test]
async fn every_credential_failure_looks_the_same(pool: PgPool) -> Result<()> {
    seed(&pool).await?;
    let server = common::spawn_app_with_pool(pool).await?;

    let unknown_company = login(&server.base_url, "nope", "rep@acme.test", "correct horse").await?;
    let unknown_user = login(&server.base_url, "acme", "ghost@acme.test", "correct horse").await?;
    let wrong_password = login(&server.base_url, "acme", "rep@acme.test", "wrong horse").await?;

    assert_eq!(unknown_company.0, 401);
    assert_eq!(unknown_company, unknown_user);
    assert_eq!(unknown_user, wrong_password);
    Ok(())
}

#[sqlx::test]
async fn valid_credentials_issue_a_token(pool: PgPool) -> Result<()> {
    seed(&pool).await?;
    let server = common::spawn_app_with_pool(pool).await?;

    let (status, body) = login(&server.base_url, "acme", "rep@acme.test", "correct horse").await?;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert!(body["data"]["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(body["data"]["user"]["role"], "sales_rep");
    Ok(())
}
