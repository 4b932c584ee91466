use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-assigned identity of a crawl target.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TargetId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Status of the latest crawl job. A target without any job has no status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl CrawlStatus {
    /// Queued and running jobs are active; the backend allows one per target.
    pub fn is_active(self) -> bool {
        matches!(self, CrawlStatus::Queued | CrawlStatus::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CrawlStatus::Queued => "queued",
            CrawlStatus::Running => "running",
            CrawlStatus::Completed => "completed",
            CrawlStatus::Failed => "failed",
            CrawlStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    pub target_id: TargetId,
    pub normalized_url: String,
    pub domain: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadingCounts {
    pub h1: Option<i32>,
    pub h2: Option<i32>,
    pub h3: Option<i32>,
    pub h4: Option<i32>,
    pub h5: Option<i32>,
    pub h6: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlMetrics {
    pub html_version: Option<String>,
    pub page_title: Option<String>,
    pub headings: HeadingCounts,
    pub internal_links: Option<i32>,
    pub external_links: Option<i32>,
    pub inaccessible_links: Option<i32>,
    pub has_login_form: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlJob {
    pub job_id: String,
    pub target_id: TargetId,
    pub status: Option<CrawlStatus>,
    pub queued_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub metrics: CrawlMetrics,
    pub error_message: Option<String>,
}

impl CrawlJob {
    pub fn is_active(&self) -> bool {
        self.status.is_some_and(CrawlStatus::is_active)
    }
}

/// One row of the listing endpoint: a target joined with its latest job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlResultRow {
    pub url_id: TargetId,
    pub normalized_url: String,
    pub domain: String,
    #[serde(default)]
    pub url_created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub crawl_id: Option<String>,
    #[serde(default)]
    pub status: Option<CrawlStatus>,
    #[serde(default)]
    pub queued_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub html_version: Option<String>,
    #[serde(default)]
    pub page_title: Option<String>,
    #[serde(default)]
    pub h1_count: Option<i32>,
    #[serde(default)]
    pub h2_count: Option<i32>,
    #[serde(default)]
    pub h3_count: Option<i32>,
    #[serde(default)]
    pub h4_count: Option<i32>,
    #[serde(default)]
    pub h5_count: Option<i32>,
    #[serde(default)]
    pub h6_count: Option<i32>,
    #[serde(default)]
    pub internal_links_count: Option<i32>,
    #[serde(default)]
    pub external_links_count: Option<i32>,
    #[serde(default)]
    pub inaccessible_links_count: Option<i32>,
    #[serde(default)]
    pub has_login_form: Option<bool>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub crawl_created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub crawl_updated_at: Option<DateTime<Utc>>,
}

impl CrawlResultRow {
    pub fn target(&self) -> CrawlTarget {
        CrawlTarget {
            target_id: self.url_id.clone(),
            normalized_url: self.normalized_url.clone(),
            domain: self.domain.clone(),
            created_at: self.url_created_at,
        }
    }

    /// The latest job, if the target was ever crawled.
    pub fn job(&self) -> Option<CrawlJob> {
        let job_id = self.crawl_id.clone()?;
        Some(CrawlJob {
            job_id,
            target_id: self.url_id.clone(),
            status: self.status,
            queued_at: self.queued_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            metrics: CrawlMetrics {
                html_version: self.html_version.clone(),
                page_title: self.page_title.clone(),
                headings: HeadingCounts {
                    h1: self.h1_count,
                    h2: self.h2_count,
                    h3: self.h3_count,
                    h4: self.h4_count,
                    h5: self.h5_count,
                    h6: self.h6_count,
                },
                internal_links: self.internal_links_count,
                external_links: self.external_links_count,
                inaccessible_links: self.inaccessible_links_count,
                has_login_form: self.has_login_form,
            },
            error_message: self.error_message.clone(),
        })
    }
}

pub const DEFAULT_RESPONSE_LIMIT: u32 = 20;

/// One page of the listing endpoint, normalized the way the dashboard reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingPage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub urls: Vec<CrawlResultRow>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_count: u64,
    #[serde(default = "first_page", deserialize_with = "zero_as_first_page")]
    pub page: u32,
    #[serde(default = "default_limit", deserialize_with = "zero_as_default_limit")]
    pub limit: u32,
}

impl ListingPage {
    pub fn total_pages(&self) -> u32 {
        total_pages(self.total_count, self.limit)
    }
}

/// `ceil(total_count / limit)`; a zero limit is treated as the server default.
pub fn total_pages(total_count: u64, limit: u32) -> u32 {
    let limit = if limit == 0 {
        DEFAULT_RESPONSE_LIMIT
    } else {
        limit
    };
    let pages = total_count.div_ceil(u64::from(limit));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

fn first_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    DEFAULT_RESPONSE_LIMIT
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn zero_as_first_page<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<u32>::deserialize(deserializer)?
        .filter(|page| *page > 0)
        .unwrap_or_else(first_page))
}

fn zero_as_default_limit<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<u32>::deserialize(deserializer)?
        .filter(|limit| *limit > 0)
        .unwrap_or_else(default_limit))
}
