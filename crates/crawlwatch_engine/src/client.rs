use std::time::Duration;

use crawlwatch_core::{ListingPage, RequestDescriptor, TargetId};
use crawlwatch_logging::{cw_debug, cw_trace};
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;

use crate::types::map_reqwest_error;
use crate::{ApiError, FailureKind, SessionContext};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api/v1";

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Backend operations the synchronization core depends on.
#[async_trait::async_trait]
pub trait DashboardApi: Send + Sync {
    async fn list_targets(&self, descriptor: &RequestDescriptor) -> Result<ListingPage, ApiError>;
    async fn create_target(&self, normalized_url: &str) -> Result<(), ApiError>;
    async fn delete_target(&self, target_id: &TargetId) -> Result<(), ApiError>;
    async fn start_crawl(&self, target_id: &TargetId) -> Result<(), ApiError>;
    async fn stop_crawl(&self, target_id: &TargetId) -> Result<(), ApiError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReqwestDashboardClient {
    base_url: Url,
    http: reqwest::Client,
    session: SessionContext,
}

impl ReqwestDashboardClient {
    pub fn new(settings: &ClientSettings, session: SessionContext) -> Result<Self, ApiError> {
        let base_url = parse_base_url(&settings.base_url)?;
        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            base_url,
            http,
            session,
        })
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        endpoint(&self.base_url, path)
    }

    async fn send(&self, method: Method, url: Url) -> Result<reqwest::Response, ApiError> {
        let label = format!("{method} {}", url.path());
        cw_trace!("-> {}", label);
        let request = self.session.authorize(self.http.request(method, url));
        let response = request.send().await.map_err(map_reqwest_error)?;
        check_status(response, &label, &self.session).await
    }

    async fn send_mutation(&self, method: Method, path: &str) -> Result<(), ApiError> {
        let url = self.endpoint(path)?;
        self.send(method, url).await.map(|_| ())
    }
}

#[async_trait::async_trait]
impl DashboardApi for ReqwestDashboardClient {
    async fn list_targets(&self, descriptor: &RequestDescriptor) -> Result<ListingPage, ApiError> {
        let mut url = self.endpoint("urls")?;
        url.query_pairs_mut()
            .extend_pairs(descriptor.query_pairs().iter().map(|(k, v)| (*k, v.as_str())));
        let response = self.send(Method::GET, url).await?;
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        let page: ListingPage = serde_json::from_slice(&body)
            .map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))?;
        cw_debug!(
            "Listing page {} of {} rows (total {})",
            page.page,
            page.urls.len(),
            page.total_count
        );
        Ok(page)
    }

    async fn create_target(&self, normalized_url: &str) -> Result<(), ApiError> {
        let url = self.endpoint("urls")?;
        let body = serde_json::json!({ "url": normalized_url });
        let request = self
            .session
            .authorize(self.http.post(url))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string());
        let response = request.send().await.map_err(map_reqwest_error)?;
        check_status(response, "POST /urls", &self.session)
            .await
            .map(|_| ())
    }

    async fn delete_target(&self, target_id: &TargetId) -> Result<(), ApiError> {
        self.send_mutation(Method::DELETE, &format!("urls/{target_id}"))
            .await
    }

    async fn start_crawl(&self, target_id: &TargetId) -> Result<(), ApiError> {
        self.send_mutation(Method::POST, &format!("crawl/start/{target_id}"))
            .await
    }

    async fn stop_crawl(&self, target_id: &TargetId) -> Result<(), ApiError> {
        self.send_mutation(Method::POST, &format!("crawl/stop/{target_id}"))
            .await
    }
}

/// The base URL must end in `/` for relative joins to append instead of replace.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, ApiError> {
    let mut raw = raw.trim().to_string();
    if !raw.ends_with('/') {
        raw.push('/');
    }
    Url::parse(&raw).map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))
}

pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url, ApiError> {
    base.join(path.trim_start_matches('/'))
        .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))
}

/// Maps non-success statuses to errors; 401 also flags the session.
pub(crate) async fn check_status(
    response: reqwest::Response,
    label: &str,
    session: &SessionContext,
) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        session.report_auth_expired(label);
        return Err(ApiError::new(FailureKind::Unauthorized, status.to_string()));
    }
    let detail = response
        .bytes()
        .await
        .ok()
        .and_then(|body| serde_json::from_slice::<ErrorBody>(&body).ok())
        .and_then(|body| body.error.or(body.message))
        .unwrap_or_else(|| status.to_string());
    Err(ApiError::new(FailureKind::HttpStatus(status.as_u16()), detail))
}
