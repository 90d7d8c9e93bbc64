//! HTTP client for the external CRM's GraphQL and REST surfaces.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use super::queries;
use super::types::{Connection, CrmLead, CrmNote, CrmTask, CrmUser, LeadUpdateInput, TaskFilter};
use crate::config::CrmConfig;

#[derive(Debug, Clone, Error)]
pub enum CrmError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited")]
    RateLimited,
    #[error("CRM rejected the credential")]
    InvalidCredential,
    #[error("company has no CRM credential configured")]
    MissingCredential,
    #[error("graphql error: {}", .0.join("; "))]
    GraphQl(Vec<String>),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("not found in CRM: {0}")]
    NotFound(String),
}

impl CrmError {
    /// Returns true if the error is transient and should be retried.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

/// Operations the dashboard performs against the CRM.
#[async_trait]
pub trait CrmApi: Send + Sync {
    async fn list_leads(&self, first: u32, after: Option<&str>) -> Result<Connection<CrmLead>, CrmError>;

    async fn get_lead(&self, id: &str) -> Result<CrmLead, CrmError>;

    async fn update_lead(&self, id: &str, input: &LeadUpdateInput) -> Result<CrmLead, CrmError>;

    async fn add_note(&self, lead_id: &str, body: &str) -> Result<CrmNote, CrmError>;

    async fn list_tasks(&self, filter: &TaskFilter, first: u32) -> Result<Vec<CrmTask>, CrmError>;

    async fn current_user(&self) -> Result<CrmUser, CrmError>;
}

/// Builds a CRM client bound to one company's decrypted credential.
pub trait CrmConnector: Send + Sync {
    fn connect(&self, credential: &str) -> Arc<dyn CrmApi>;
}

/// Connector sharing one connection pool across every company.
#[derive(Debug, Clone)]
pub struct HttpCrmConnector {
    http: Client,
    config: CrmConfig,
}

impl HttpCrmConnector {
    pub fn new(config: CrmConfig) -> Result<Self, CrmError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("leadboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CrmError::Transport(e.to_string()))?;

        Ok(Self { http, config })
    }
}

impl CrmConnector for HttpCrmConnector {
    fn connect(&self, credential: &str) -> Arc<dyn CrmApi> {
        Arc::new(CrmClient {
            http: self.http.clone(),
            credential: credential.to_string(),
            graphql_url: self.config.graphql_url.clone(),
            rest_url: self.config.rest_url.trim_end_matches('/').to_string(),
            max_retries: self.config.max_retries,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorEntry {
    message: String,
    #[serde(default)]
    extensions: Option<Value>,
}

impl GraphQlErrorEntry {
    fn code(&self) -> Option<&str> {
        self.extensions.as_ref()?.get("code")?.as_str()
    }
}

#[derive(Deserialize)]
struct LeadsData {
    leads: Connection<CrmLead>,
}

#[derive(Deserialize)]
struct LeadData {
    lead: Option<CrmLead>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateLeadData {
    update_lead: UpdateLeadPayload,
}

#[derive(Deserialize)]
struct UpdateLeadPayload {
    lead: CrmLead,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateNoteData {
    create_note: CreateNotePayload,
}

#[derive(Deserialize)]
struct CreateNotePayload {
    note: CrmNote,
}

#[derive(Deserialize)]
struct TasksData {
    tasks: Connection<CrmTask>,
}

/// CRM client for a single credential
#[derive(Clone)]
pub struct CrmClient {
    http: Client,
    credential: String,
    graphql_url: String,
    rest_url: String,
    max_retries: usize,
}

impl std::fmt::Debug for CrmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrmClient")
            .field("graphql_url", &self.graphql_url)
            .field("rest_url", &self.rest_url)
            .finish_non_exhaustive()
    }
}

impl CrmClient {
    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(250))
            .with_max_delay(Duration::from_secs(5))
            .with_max_times(self.max_retries)
            .with_jitter()
    }

    fn graphql_payload(operation: &str, query: &str, variables: Value) -> Value {
        json!({
            "operationName": operation,
            "query": query,
            "variables": variables,
        })
    }

    /// Run a read-only GraphQL query, retrying transient failures
    async fn query<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        query: &str,
        variables: Value,
    ) -> Result<T, CrmError> {
        let payload = Self::graphql_payload(operation, query, variables);

        (|| async { self.send_graphql::<T>(&payload).await })
            .retry(self.backoff())
            .when(|e: &CrmError| e.should_retry())
            .notify(|e, dur| {
                warn!(
                    operation,
                    "CRM call failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await
    }

    /// Send a mutation exactly once. A lost response may still have been
    /// applied remotely, so replaying could duplicate the write.
    async fn mutate<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        query: &str,
        variables: Value,
    ) -> Result<T, CrmError> {
        let payload = Self::graphql_payload(operation, query, variables);
        self.send_graphql(&payload).await.inspect_err(|e| {
            warn!(operation, "CRM mutation failed: {}", e);
        })
    }

    async fn send_graphql<T: DeserializeOwned>(&self, payload: &Value) -> Result<T, CrmError> {
        let res = self
            .http
            .post(&self.graphql_url)
            .bearer_auth(&self.credential)
            .json(payload)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let res = check_status(res).await?;
        let body: GraphQlResponse<T> = res
            .json()
            .await
            .map_err(|e| CrmError::Decode(e.to_string()))?;

        if !body.errors.is_empty() {
            if body.errors.iter().any(|e| e.code() == Some("UNAUTHENTICATED")) {
                return Err(CrmError::InvalidCredential);
            }
            if body.errors.iter().any(|e| e.code() == Some("NOT_FOUND")) {
                let messages: Vec<String> = body.errors.into_iter().map(|e| e.message).collect();
                return Err(CrmError::NotFound(messages.join("; ")));
            }
            return Err(CrmError::GraphQl(body.errors.into_iter().map(|e| e.message).collect()));
        }

        body.data
            .ok_or_else(|| CrmError::Decode("response carried neither data nor errors".to_string()))
    }

    async fn get_rest<T: DeserializeOwned>(&self, path: &str) -> Result<T, CrmError> {
        let url = format!("{}{}", self.rest_url, path);
        (|| async {
            let res = self
                .http
                .get(&url)
                .bearer_auth(&self.credential)
                .send()
                .await
                .map_err(map_reqwest_error)?;
            check_status(res)
                .await?
                .json::<T>()
                .await
                .map_err(|e| CrmError::Decode(e.to_string()))
        })
        .retry(self.backoff())
        .when(|e: &CrmError| e.should_retry())
        .await
    }
}

#[async_trait]
impl CrmApi for CrmClient {
    async fn list_leads(&self, first: u32, after: Option<&str>) -> Result<Connection<CrmLead>, CrmError> {
        debug!(first, after = ?after, "Fetching CRM lead page");
        let data: LeadsData = self
            .query("Leads", &queries::leads_query(), json!({ "first": first, "after": after }))
            .await?;
        Ok(data.leads)
    }

    async fn get_lead(&self, id: &str) -> Result<CrmLead, CrmError> {
        let data: LeadData = self
            .query("Lead", &queries::lead_query(), json!({ "id": id }))
            .await?;
        data.lead.ok_or_else(|| CrmError::NotFound(format!("lead {id}")))
    }

    async fn update_lead(&self, id: &str, input: &LeadUpdateInput) -> Result<CrmLead, CrmError> {
        let data: UpdateLeadData = self
            .mutate(
                "UpdateLead",
                &queries::update_lead_mutation(),
                json!({ "id": id, "input": input }),
            )
            .await?;
        Ok(data.update_lead.lead)
    }

    async fn add_note(&self, lead_id: &str, body: &str) -> Result<CrmNote, CrmError> {
        let data: CreateNoteData = self
            .mutate(
                "CreateNote",
                queries::CREATE_NOTE_MUTATION,
                json!({ "leadId": lead_id, "body": body }),
            )
            .await?;
        Ok(data.create_note.note)
    }

    async fn list_tasks(&self, filter: &TaskFilter, first: u32) -> Result<Vec<CrmTask>, CrmError> {
        let data: TasksData = self
            .query("Tasks", &queries::tasks_query(), json!({ "filter": filter, "first": first }))
            .await?;
        Ok(data.tasks.nodes)
    }

    async fn current_user(&self) -> Result<CrmUser, CrmError> {
        self.get_rest(queries::CURRENT_USER_PATH).await
    }
}

async fn check_status(res: reqwest::Response) -> Result<reqwest::Response, CrmError> {
    match res.status() {
        s if s.is_success() => Ok(res),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(CrmError::InvalidCredential),
        StatusCode::NOT_FOUND => Err(CrmError::NotFound(res.url().path().to_string())),
        StatusCode::TOO_MANY_REQUESTS => Err(CrmError::RateLimited),
        s => {
            let status = s.as_u16();
            let body = res.text().await.unwrap_or_default();
            Err(CrmError::Http { status, body })
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> CrmError {
    if e.is_timeout() {
        CrmError::Timeout
    } else {
        CrmError::Transport(e.to_string())
    }
}
