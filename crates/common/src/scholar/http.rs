//! Semantic Scholar Graph API client

use super::{PaperRecord, RelationRecord, ScholarClient, PAPER_FIELDS, RELATION_FIELDS};
use crate::config::{ScholarConfig, MAX_BATCH_SIZE, MAX_RELATIONS_PER_PAGE};
use crate::errors::{AppError, Result};
use crate::graph::Direction;
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use tracing::{debug, warn};

/// HTTP client for the Semantic Scholar Graph API
pub struct SemanticScholarClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
    limiter: Option<DefaultDirectRateLimiter>,
}

#[derive(Serialize)]
struct BatchRequest<'a> {
    ids: &'a [String],
}

#[derive(Deserialize)]
struct RelationPage {
    #[serde(default)]
    data: Vec<RawRelation>,
    next: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRelation {
    citing_paper: Option<NeighborRef>,
    cited_paper: Option<NeighborRef>,
    #[serde(default)]
    is_influential: bool,
    #[serde(default)]
    intents: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NeighborRef {
    paper_id: Option<String>,
}

impl RawRelation {
    fn into_record(self, direction: Direction) -> RelationRecord {
        let neighbor = match direction {
            Direction::Citations => self.citing_paper,
            Direction::References => self.cited_paper,
        };
        RelationRecord {
            paper_id: neighbor.and_then(|n| n.paper_id),
            is_influential: self.is_influential,
            intents: self.intents.unwrap_or_default(),
        }
    }
}

impl SemanticScholarClient {
    pub fn new(config: &ScholarConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("citetree/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let limiter = NonZeroU32::new(config.requests_per_second)
            .map(|rate| RateLimiter::direct(Quota::per_second(rate)));

        if config.api_key.is_none() {
            debug!("No API key configured, using the shared unauthenticated pool");
        }

        let base_url = Url::parse(config.api_base.trim_end_matches('/')).map_err(|e| {
            AppError::Configuration {
                message: format!("Invalid API base {}: {}", config.api_base, e),
            }
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Configuration {
                message: format!("API base {} cannot take a path", config.api_base),
            });
        }

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
            limiter,
        })
    }

    /// `{base}/paper/{segments..}` with each segment percent-encoded, so ids
    /// carrying `/`, `?` or `#` stay inside their segment
    fn paper_url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("paper").extend(segments);
        }
        url
    }

    fn fields(fields: &[&str]) -> String {
        fields.join(",")
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("x-api-key", key),
            None => request,
        }
    }

    /// Send a request and decode the JSON body, classifying failures
    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let response = self.authorize(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let url = response.url().path().to_string();
            let body = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                warn!(path = %url, "Rate limited by upstream");
            }
            return Err(AppError::from_status(
                status.as_u16(),
                format!("{} {}", url, body.trim()),
            ));
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl ScholarClient for SemanticScholarClient {
    async fn get_paper(&self, paper_id: &str) -> Result<Option<PaperRecord>> {
        let url = self.paper_url(&[paper_id]);
        let request = self
            .client
            .get(url)
            .query(&[("fields", Self::fields(PAPER_FIELDS))]);

        match self.send_json::<PaperRecord>(request).await {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn get_relations(
        &self,
        paper_id: &str,
        direction: Direction,
        limit: usize,
    ) -> Result<Vec<RelationRecord>> {
        let url = self.paper_url(&[paper_id, direction.as_str()]);
        let fields = Self::fields(RELATION_FIELDS);
        let mut relations = Vec::new();
        let mut offset = 0usize;

        while relations.len() < limit {
            let page_size = (limit - relations.len()).min(MAX_RELATIONS_PER_PAGE);
            let request = self.client.get(url.clone()).query(&[
                ("fields", fields.clone()),
                ("offset", offset.to_string()),
                ("limit", page_size.to_string()),
            ]);

            let page: RelationPage = match self.send_json(request).await {
                Ok(page) => page,
                // A listing cut off mid-way must never read as "no neighbors"
                Err(e) if e.is_transient() && !relations.is_empty() => {
                    return Err(AppError::UpstreamUnavailable {
                        message: format!("{} after {} relations", e, relations.len()),
                    });
                }
                Err(e) => return Err(e),
            };
            let received = page.data.len();
            relations.extend(page.data.into_iter().map(|r| r.into_record(direction)));

            debug!(
                paper_id = %paper_id,
                direction = %direction,
                offset = offset,
                received = received,
                "Fetched relations page"
            );

            match page.next {
                Some(next) if received > 0 && next > offset => offset = next,
                _ => break,
            }
        }

        relations.truncate(limit);
        Ok(relations)
    }

    async fn get_papers(&self, paper_ids: &[String]) -> Result<Vec<Option<PaperRecord>>> {
        if paper_ids.is_empty() {
            return Ok(Vec::new());
        }
        if paper_ids.len() > MAX_BATCH_SIZE {
            return Err(AppError::Validation {
                message: format!(
                    "Batch of {} ids exceeds the upstream maximum of {}",
                    paper_ids.len(),
                    MAX_BATCH_SIZE
                ),
                field: Some("ids".to_string()),
            });
        }

        let url = self.paper_url(&["batch"]);
        let request = self
            .client
            .post(url)
            .query(&[("fields", Self::fields(PAPER_FIELDS))])
            .json(&BatchRequest { ids: paper_ids });

        self.send_json(request).await
    }
}
