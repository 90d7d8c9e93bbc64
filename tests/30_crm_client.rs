mod common;

use anyhow::Result;

use common::{lead_json, FakeCrm, CRM_TOKEN, REVOKED_TOKEN};
use leadboard::crm::{CrmConnector, CrmError, HttpCrmConnector, LeadUpdateInput, TaskFilter};

fn seeded() -> Vec<serde_json::Value> {
    vec![
        lead_json("L1", "new", "2025-03-01T10:00:00Z", Some("rep-1")),
        lead_json("L2", "contacted", "2025-03-02T10:00:00Z", Some("rep-2")),
        lead_json("L3", "appointment_set", "2025-03-03T10:00:00Z", None),
    ]
}

#[tokio::test]
async fn lists_leads_page_by_page() -> Result<()> {
    let crm = FakeCrm::start(seeded()).await?;
    let api = HttpCrmConnector::new(crm.crm_config())?.connect(CRM_TOKEN);

    let first = api.list_leads(2, None).await?;
    assert_eq!(first.nodes.len(), 2);
    assert!(first.page_info.has_next_page);

    let cursor = first.page_info.end_cursor.as_deref();
    let second = api.list_leads(2, cursor).await?;
    assert_eq!(second.nodes.len(), 1);
    assert_eq!(second.nodes[0].id, "L3");
    assert!(!second.page_info.has_next_page);
    assert_eq!(second.nodes[0].address.as_ref().and_then(|a| a.city.as_deref()), Some("Tulsa"));
    Ok(())
}

#[tokio::test]
async fn missing_lead_is_not_found() -> Result<()> {
    let crm = FakeCrm::start(seeded()).await?;
    let api = HttpCrmConnector::new(crm.crm_config())?.connect(CRM_TOKEN);

    let err = api.get_lead("missing").await.unwrap_err();
    assert!(matches!(err, CrmError::NotFound(_)));

    let err = api
        .update_lead("missing", &LeadUpdateInput { status: Some("lost".into()), ..Default::default() })
        .await
        .unwrap_err();
    assert!(matches!(err, CrmError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn rejected_credentials_are_reported() -> Result<()> {
    let crm = FakeCrm::start(seeded()).await?;
    let connector = HttpCrmConnector::new(crm.crm_config())?;

    // GraphQL-level rejection
    let err = connector.connect(REVOKED_TOKEN).list_leads(10, None).await.unwrap_err();
    assert!(matches!(err, CrmError::InvalidCredential));

    // HTTP 401
    let err = connector.connect("wrong").get_lead("L1").await.unwrap_err();
    assert!(matches!(err, CrmError::InvalidCredential));

    let err = connector.connect("wrong").current_user().await.unwrap_err();
    assert!(matches!(err, CrmError::InvalidCredential));
    Ok(())
}

#[tokio::test]
async fn transient_failures_are_retried() -> Result<()> {
    let crm = FakeCrm::start(seeded()).await?;
    crm.fail_with(503, 2);
    let api = HttpCrmConnector::new(crm.crm_config())?.connect(CRM_TOKEN);

    let lead = api.get_lead("L2").await?;
    assert_eq!(lead.status, "contacted");
    assert_eq!(crm.calls(), 3);
    Ok(())
}

#[tokio::test]
async fn retries_give_up_eventually() -> Result<()> {
    let crm = FakeCrm::start(seeded()).await?;
    crm.fail_with(503, 10);
    let api = HttpCrmConnector::new(crm.crm_config())?.connect(CRM_TOKEN);

    let err = api.get_lead("L1").await.unwrap_err();
    assert!(matches!(err, CrmError::Http { status: 503, .. }));
    // one attempt plus max_retries
    assert_eq!(crm.calls(), 3);
    Ok(())
}

#[tokio::test]
async fn mutations_are_never_replayed() -> Result<()> {
    let crm = FakeCrm::start(seeded()).await?;
    crm.fail_with(502, 10);
    let api = HttpCrmConnector::new(crm.crm_config())?.connect(CRM_TOKEN);

    let err = api.add_note("L1", "hello").await.unwrap_err();
    assert!(matches!(err, CrmError::Http { status: 502, .. }));
    assert_eq!(crm.calls(), 1);

    let err = api
        .update_lead("L1", &LeadUpdateInput { status: Some("sold".into()), ..Default::default() })
        .await
        .unwrap_err();
    assert!(matches!(err, CrmError::Http { status: 502, .. }));
    assert_eq!(crm.calls(), 2);
    assert!(crm.state.notes.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn rate_limits_fail_fast() -> Result<()> {
    let crm = FakeCrm::start(seeded()).await?;
    crm.fail_with(429, 10);
    let api = HttpCrmConnector::new(crm.crm_config())?.connect(CRM_TOKEN);

    let err = api.get_lead("L1").await.unwrap_err();
    assert!(matches!(err, CrmError::RateLimited));
    assert_eq!(crm.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn mutations_and_tasks_round_trip() -> Result<()> {
    let crm = FakeCrm::start(seeded()).await?;
    let api = HttpCrmConnector::new(crm.crm_config())?.connect(CRM_TOKEN);

    let updated = api
        .update_lead("L1", &LeadUpdateInput { status: Some("sold".into()), ..Default::default() })
        .await?;
    assert_eq!(updated.status, "sold");
    assert!(updated.updated_at > chrono::Utc::now() - chrono::Duration::days(1));

    let note = api.add_note("L1", "Left a door hanger").await?;
    assert_eq!(note.body, "Left a door hanger");
    assert_eq!(crm.state.notes.lock().unwrap().len(), 1);

    let mine = api
        .list_tasks(&TaskFilter { assignee_id: Some("rep-1".into()), ..Default::default() }, 50)
        .await?;
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, "T-1");
    Ok(())
}

#[tokio::test]
async fn current_user_uses_rest() -> Result<()> {
    let crm = FakeCrm::start(seeded()).await?;
    let api = HttpCrmConnector::new(crm.crm_config())?.connect(CRM_TOKEN);

    let me = api.current_user().await?;
    assert_eq!(me.id, "crm-admin");
    assert_eq!(me.account.as_deref(), Some("acme"));
    assert_eq!(crm.calls(), 0);
    Ok(())
}
