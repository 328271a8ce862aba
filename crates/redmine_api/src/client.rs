use crate::config::{RedmineConfig, API_KEY_HEADER};
use crate::error::{RedmineError, Result};
use crate::models::{IssueEnvelope, IssuePage, Project, ProjectPage, RawIssue};
use crate::rate_limiter::RateLimiter;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client as HttpClient, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Filters applied to the issue listing endpoint.
///
/// Redmine only lists open issues unless `status_id` is given; `"*"` selects all statuses.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IssueQuery {
    pub project_id: Option<String>,
    pub status_id: Option<String>,
}

impl IssueQuery {
    pub fn all_statuses() -> Self {
        Self {
            status_id: Some("*".to_string()),
            ..Self::default()
        }
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    fn params(&self, limit: u32, offset: u64) -> Vec<(&'static str, String)> {
        let mut params = vec![("limit", limit.to_string()), ("offset", offset.to_string())];
        if let Some(project_id) = &self.project_id {
            params.push(("project_id", project_id.clone()));
        }
        if let Some(status_id) = &self.status_id {
            params.push(("status_id", status_id.clone()));
        }
        params
    }
}

#[derive(Clone)]
pub struct RedmineClient {
    http: HttpClient,
    config: RedmineConfig,
    limiter: RateLimiter,
}

impl RedmineClient {
    pub fn new(config: RedmineConfig) -> Result<Self> {
        let http = build_http_client(&config)?;
        let limiter = RateLimiter::new(config.cooldown);
        Ok(Self {
            http,
            config,
            limiter,
        })
    }

    pub async fn get_with_query<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.limiter.hit().await;
        debug!(path, params = query.len(), "redmine GET");
        let mut request = self.http.get(self.url_for(path));
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = request.send().await?;
        Self::parse_json(response).await
    }

    fn url_for(&self, path: &str) -> String {
        let mut base = self.config.api_root();
        base.push_str(path.trim_start_matches('/'));
        base
    }

    async fn parse_json<T>(response: Response) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            serde_json::from_str::<T>(&body).map_err(RedmineError::from)
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(RedmineError::Authentication(format!(
                "Access denied ({}) - check the API key and that the REST API is enabled",
                status
            )))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(build_http_error(status, &body))
        }
    }

    /// Fetches one page of issues.
    pub async fn get_issues(&self, query: &IssueQuery, limit: u32, offset: u64) -> Result<IssuePage> {
        let params = query.params(limit, offset);
        self.get_with_query("issues.json", &params).await
    }

    /// Fetches every issue matching `query`, one page of `page_size` at a time, in server order.
    pub async fn get_all_issues(&self, query: &IssueQuery) -> Result<Vec<RawIssue>> {
        let limit = self.config.page_size.max(1);
        let mut offset: u64 = 0;
        let mut issues = Vec::new();

        loop {
            let page = self.get_issues(query, limit, offset).await?;
            let fetched = page.issues.len();
            if fetched == 0 {
                break;
            }
            issues.extend(page.issues);
            debug!(offset, fetched, total = ?page.total_count, "issue page received");

            if fetched < limit as usize {
                break;
            }
            offset += u64::from(limit);
            if matches!(page.total_count, Some(total) if offset >= total) {
                break;
            }
        }

        Ok(issues)
    }

    /// Fetches a single issue including its journal entries.
    pub async fn get_issue(&self, issue_id: i64) -> Result<RawIssue> {
        let path = format!("issues/{}.json", issue_id);
        let envelope: IssueEnvelope = self
            .get_with_query(&path, &[("include", "journals".to_string())])
            .await?;
        Ok(envelope.issue)
    }

    pub async fn get_projects(&self) -> Result<Vec<Project>> {
        let limit = self.config.page_size.max(1);
        let mut offset: u64 = 0;
        let mut projects = Vec::new();

        loop {
            let params = [("limit", limit.to_string()), ("offset", offset.to_string())];
            let page: ProjectPage = self.get_with_query("projects.json", &params).await?;
            let fetched = page.projects.len();
            projects.extend(page.projects);
            offset += u64::from(limit);
            if fetched < limit as usize || !matches!(page.total_count, Some(total) if offset < total) {
                break;
            }
        }

        Ok(projects)
    }

    /// Validates base URL and API key by requesting a single issue.
    pub async fn check_connection(&self) -> Result<()> {
        self.get_issues(&IssueQuery::default(), 1, 0).await.map(|_| ())
    }
}

fn build_http_client(config: &RedmineConfig) -> Result<HttpClient> {
    let mut headers = HeaderMap::new();

    let mut key_value = header_value(config.api_key.trim().to_string())?;
    key_value.set_sensitive(true);
    headers.insert(HeaderName::from_static(API_KEY_HEADER), key_value);
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, header_value(config.user_agent.clone())?);

    HttpClient::builder()
        .default_headers(headers)
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .build()
        .map_err(|err| RedmineError::Other(err.to_string()))
}

fn header_value(value: String) -> Result<HeaderValue> {
    HeaderValue::from_str(&value).map_err(|err| RedmineError::Other(err.to_string()))
}

fn build_http_error(status: StatusCode, body: &str) -> RedmineError {
    let message = extract_error_messages(body).unwrap_or_else(|| body.trim().to_string());
    RedmineError::http(status, message)
}

/// Redmine reports validation problems as `{"errors": ["...", ...]}`.
fn extract_error_messages(body: &str) -> Option<String> {
    let value = serde_json::from_str::<Value>(body).ok()?;
    let messages: Vec<&str> = value
        .get("errors")?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .collect();
    if messages.is_empty() {
        None
    } else {
        Some(messages.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::{extract_error_messages, IssueQuery, RedmineClient};
    use crate::config::RedmineConfig;
    use crate::error::RedmineError;
    use mockito::Matcher;
    use serde_json::json;
    use std::time::Duration;

    fn client_for(server: &mockito::ServerGuard, page_size: u32) -> RedmineClient {
        let config = RedmineConfig::new(server.url(), "secret-key")
            .with_page_size(page_size)
            .with_cooldown(Duration::ZERO);
        RedmineClient::new(config).expect("client should build")
    }

    fn page_query(limit: &str, offset: &str) -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("limit".into(), limit.into()),
            Matcher::UrlEncoded("offset".into(), offset.into()),
        ])
    }

    #[tokio::test]
    async fn get_all_issues_paginates_until_a_short_page() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/issues.json")
            .match_query(page_query("2", "0"))
            .match_header("x-redmine-api-key", "secret-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"issues": [{"id": 1}, {"id": 2}], "total_count": 3}).to_string())
            .create_async()
            .await;
        let second = server
            .mock("GET", "/issues.json")
            .match_query(page_query("2", "2"))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"issues": [{"id": 3}], "total_count": 3}).to_string())
            .create_async()
            .await;

        let client = client_for(&server, 2);
        let issues = client.get_all_issues(&IssueQuery::default()).await.unwrap();

        let ids: Vec<_> = issues.iter().map(|issue| issue.id).collect();
        assert_eq!(ids, vec![Some(1), Some(2), Some(3)]);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn get_all_issues_stops_on_empty_page() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/issues.json")
            .match_query(page_query("1", "0"))
            .with_status(200)
            .with_body(json!({"issues": [{"id": 10}]}).to_string())
            .create_async()
            .await;
        let empty = server
            .mock("GET", "/issues.json")
            .match_query(page_query("1", "1"))
            .with_status(200)
            .with_body(json!({"issues": []}).to_string())
            .create_async()
            .await;

        let client = client_for(&server, 1);
        let issues = client.get_all_issues(&IssueQuery::default()).await.unwrap();

        assert_eq!(issues.len(), 1);
        empty.assert_async().await;
    }

    #[tokio::test]
    async fn status_filter_is_forwarded() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/issues.json")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("status_id".into(), "*".into()),
                Matcher::UrlEncoded("project_id".into(), "web".into()),
            ]))
            .with_status(200)
            .with_body(json!({"issues": []}).to_string())
            .create_async()
            .await;

        let client = client_for(&server, 100);
        let query = IssueQuery::all_statuses().with_project("web");
        let issues = client.get_all_issues(&query).await.unwrap();

        assert!(issues.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn configured_user_agent_is_sent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/issues.json")
            .match_query(Matcher::Any)
            .match_header("user-agent", "redmine-report/9.9")
            .with_status(200)
            .with_body(json!({"issues": [], "total_count": 0}).to_string())
            .create_async()
            .await;

        let config = RedmineConfig::new(server.url(), "secret-key")
            .with_user_agent("redmine-report/9.9")
            .with_cooldown(Duration::ZERO);
        let client = RedmineClient::new(config).expect("client should build");
        client.check_connection().await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_issue_requests_journals_and_unwraps_envelope() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/issues/368.json")
            .match_query(Matcher::UrlEncoded("include".into(), "journals".into()))
            .with_status(200)
            .with_body(
                json!({"issue": {
                    "id": 368,
                    "subject": "Login fails",
                    "journals": [{"notes": "checked", "user": {"name": "B"}}]
                }})
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server, 100);
        let issue = client.get_issue(368).await.unwrap();

        assert_eq!(issue.subject.as_deref(), Some("Login fails"));
        assert_eq!(issue.journals.len(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unauthorized_maps_to_authentication_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/issues.json")
            .match_query(Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let client = client_for(&server, 100);
        let err = client.check_connection().await.unwrap_err();

        assert!(err.is_authentication());
    }

    #[tokio::test]
    async fn server_errors_carry_redmine_messages() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/issues/5.json")
            .match_query(Matcher::Any)
            .with_status(422)
            .with_body(json!({"errors": ["Tracker is invalid", "Subject cannot be blank"]}).to_string())
            .create_async()
            .await;

        let client = client_for(&server, 100);
        let err = client.get_issue(5).await.unwrap_err();

        match err {
            RedmineError::Http { status, message } => {
                assert_eq!(status.as_u16(), 422);
                assert_eq!(message, "Tracker is invalid; Subject cannot be blank");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn get_projects_collects_all_pages() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/projects.json")
            .match_query(page_query("1", "0"))
            .with_status(200)
            .with_body(json!({"projects": [{"id": 1, "name": "Web"}], "total_count": 2}).to_string())
            .create_async()
            .await;
        server
            .mock("GET", "/projects.json")
            .match_query(page_query("1", "1"))
            .with_status(200)
            .with_body(json!({"projects": [{"id": 2, "name": "App"}], "total_count": 2}).to_string())
            .create_async()
            .await;

        let client = client_for(&server, 1);
        let projects = client.get_projects().await.unwrap();

        let names: Vec<_> = projects.iter().filter_map(|p| p.name.as_deref()).collect();
        assert_eq!(names, vec!["Web", "App"]);
    }

    #[test]
    fn error_messages_fall_back_to_none_for_plain_bodies() {
        assert_eq!(extract_error_messages("<html>oops</html>"), None);
        assert_eq!(extract_error_messages(r#"{"errors": []}"#), None);
        assert_eq!(
            extract_error_messages(r#"{"errors": ["Name is too long"]}"#).as_deref(),
            Some("Name is too long")
        );
    }
}
