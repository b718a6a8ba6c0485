//! HTTP client for the work queue coordinator's RPC surface (spec §6). Kept
//! separate from `crawler-coordinator` deliberately: workers and the
//! coordinator are independent processes that only agree on wire shapes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteWorkItem {
    pub id: Uuid,
    pub url: String,
    pub source: String,
    pub canonical_name: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RemoteWorkBatch {
    pub items: Vec<RemoteWorkItem>,
    pub worker_domains: Vec<String>,
}

#[derive(Debug, Serialize)]
struct RequestWorkBody<'a> {
    worker_id: &'a str,
    batch_size: usize,
    max_articles_per_domain: usize,
}

#[derive(Debug, Serialize)]
struct ReportFailureBody<'a> {
    worker_id: &'a str,
    domain: &'a str,
}

pub struct CoordinatorClient {
    client: reqwest::Client,
    base_url: String,
}

impl CoordinatorClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub async fn request_work(
        &self,
        worker_id: &str,
        batch_size: usize,
        max_articles_per_domain: usize,
    ) -> Result<RemoteWorkBatch, reqwest::Error> {
        self.client
            .post(format!("{}/work/request", self.base_url))
            .json(&RequestWorkBody {
                worker_id,
                batch_size,
                max_articles_per_domain,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    pub async fn report_failure(&self, worker_id: &str, domain: &str) -> Result<(), reqwest::Error> {
        self.client
            .post(format!("{}/work/report-failure", self.base_url))
            .json(&ReportFailureBody { worker_id, domain })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
