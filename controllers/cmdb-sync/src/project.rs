//! Project-management lookup.
//!
//! Namespaces carry a project-code annotation; the project service maps that
//! code to the business the namespace is filed under in the CMDB.

use crate::error::ControllerError;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Resolves a project code to its business id
#[async_trait::async_trait]
pub trait ProjectLookup: Send + Sync {
    /// `Ok(None)` when the project is unknown or has no business attached
    async fn business_id(&self, project_code: &str) -> Result<Option<i64>, ControllerError>;
}

#[derive(Debug, Deserialize)]
struct ProjectResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<Project>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(rename = "projectID", default)]
    pub project_id: String,
    #[serde(default)]
    pub project_code: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "businessID", default)]
    pub business_id: String,
}

impl Project {
    /// Parsed business id; empty or zero means unassigned
    pub fn business(&self) -> Option<i64> {
        self.business_id.trim().parse::<i64>().ok().filter(|id| *id > 0)
    }
}

/// HTTP client for the project service
#[derive(Debug, Clone)]
pub struct ProjectClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl ProjectClient {
    pub fn new(base_url: String, token: String, timeout: Duration) -> Result<Self, ControllerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ControllerError::ProjectLookup(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    pub fn project_url(&self, project_code: &str) -> String {
        format!(
            "{}/bcsproject/v1/projects/{}",
            self.base_url,
            urlencoding::encode(project_code)
        )
    }

    pub async fn get_project(&self, project_code: &str) -> Result<Option<Project>, ControllerError> {
        let mut request = self.client.get(self.project_url(project_code));
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ControllerError::ProjectLookup(format!("{}: {}", project_code, e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ControllerError::ProjectLookup(format!(
                "{}: HTTP {}",
                project_code,
                response.status()
            )));
        }

        let body: ProjectResponse = response
            .json()
            .await
            .map_err(|e| ControllerError::ProjectLookup(format!("{}: invalid response: {}", project_code, e)))?;
        if body.code != 0 {
            return Err(ControllerError::ProjectLookup(format!(
                "{}: code {}: {}",
                project_code, body.code, body.message
            )));
        }
        Ok(body.data)
    }
}

#[async_trait::async_trait]
impl ProjectLookup for ProjectClient {
    async fn business_id(&self, project_code: &str) -> Result<Option<i64>, ControllerError> {
        let project = self.get_project(project_code).await?;
        let business = project.as_ref().and_then(Project::business);
        debug!("Project {} resolved to business {:?}", project_code, business);
        Ok(business)
    }
}
