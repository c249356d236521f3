//! Elasticsearch client
//!
//! Reads (search, get, mget) retry transport failures and 5xx responses with
//! exponential backoff bounded by `index.max_retry_ms`. Updates are sent once.

use super::{Collection, DocumentIndex, Hit, SearchHits, SearchRequest, SortOrder, UpdateScript};
use crate::config::IndexConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Elasticsearch-backed document index
pub struct ElasticIndex {
    client: reqwest::Client,
    base_url: Url,
    config: IndexConfig,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: HitsEnvelope,
}

#[derive(Deserialize)]
struct HitsEnvelope {
    total: Option<TotalHits>,
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Deserialize)]
struct TotalHits {
    value: u64,
}

#[derive(Deserialize)]
struct RawHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score")]
    score: Option<f64>,
    #[serde(rename = "_source", default)]
    source: Value,
}

#[derive(Deserialize)]
struct GetResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source", default)]
    source: Value,
}

#[derive(Deserialize)]
struct MgetResponse {
    #[serde(default)]
    docs: Vec<GetResponse>,
}

impl ElasticIndex {
    /// Create a new client from configuration
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let base_url = Url::parse(&config.url).map_err(|e| AppError::Configuration {
            message: format!("Invalid index URL '{}': {}", config.url, e),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url,
            config: config.clone(),
        })
    }

    /// `{base}/{segments...}` with every segment percent-encoded, since stored
    /// ids are URLs themselves.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Configuration {
                message: format!("Index URL cannot be a base: {}", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.username {
            Some(user) => builder.basic_auth(user, self.config.password.as_deref()),
            None => builder,
        }
    }

    fn backoff_policy(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(50),
            max_elapsed_time: Some(Duration::from_millis(self.config.max_retry_ms)),
            ..Default::default()
        }
    }

    /// Issue a read, retrying transient failures. A 404 yields `None`.
    async fn read(&self, url: &Url, body: Option<&Value>) -> Result<Option<Value>> {
        retry(self.backoff_policy(), move || async move {
            let builder = match body {
                Some(body) => self.client.post(url.clone()).json(body),
                None => self.client.get(url.clone()),
            };

            let response = self.authorize(builder).send().await.map_err(|e| {
                let err = AppError::Index {
                    message: format!("Request to {} failed: {}", url.path(), e),
                };
                if e.is_connect() || e.is_timeout() {
                    warn!(path = url.path(), error = %e, "Index request failed, retrying");
                    backoff::Error::transient(err)
                } else {
                    backoff::Error::permanent(err)
                }
            })?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                let err = AppError::Index {
                    message: format!("Index error {} on {}: {}", status, url.path(), text),
                };
                return Err(if status.is_server_error() {
                    backoff::Error::transient(err)
                } else {
                    backoff::Error::permanent(err)
                });
            }

            response.json::<Value>().await.map(Some).map_err(|e| {
                backoff::Error::permanent(AppError::Index {
                    message: format!("Failed to parse index response: {}", e),
                })
            })
        })
        .await
    }

    fn search_body(request: &SearchRequest) -> Value {
        let mut body = Map::new();
        body.insert("query".into(), request.query.to_json());
        body.insert("from".into(), json!(request.from));
        body.insert("size".into(), json!(request.size));
        body.insert("track_total_hits".into(), json!(true));
        if !request.sort.is_empty() {
            let sort: Vec<Value> = request
                .sort
                .iter()
                .map(|s| {
                    let order = match s.order {
                        SortOrder::Asc => "asc",
                        SortOrder::Desc => "desc",
                    };
                    json!({ s.field.as_str(): { "order": order } })
                })
                .collect();
            body.insert("sort".into(), Value::Array(sort));
        }
        Value::Object(body)
    }
}

#[async_trait]
impl DocumentIndex for ElasticIndex {
    async fn search(&self, collection: Collection, request: &SearchRequest) -> Result<SearchHits> {
        let index = collection.index_name(&self.config);
        let url = self.url(&[index, "_search"])?;
        let body = Self::search_body(request);

        let start = Instant::now();
        let raw = self.read(&url, Some(&body)).await?.ok_or_else(|| AppError::Index {
            message: format!("Index '{}' does not exist", index),
        })?;

        let response: SearchResponse = serde_json::from_value(raw).map_err(|e| AppError::Index {
            message: format!("Unexpected search response: {}", e),
        })?;

        let hits: Vec<Hit> = response
            .hits
            .hits
            .into_iter()
            .map(|h| Hit {
                id: h.id,
                score: h.score.unwrap_or(0.0),
                source: h.source,
            })
            .collect();
        let total = response.hits.total.map(|t| t.value).unwrap_or(hits.len() as u64);

        debug!(
            index,
            total,
            returned = hits.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Index search complete"
        );

        Ok(SearchHits { total, hits })
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>> {
        let url = self.url(&[collection.index_name(&self.config), "_doc", id])?;
        let Some(raw) = self.read(&url, None).await? else {
            return Ok(None);
        };

        let response: GetResponse = serde_json::from_value(raw)?;
        Ok(response.found.then_some(response.source))
    }

    async fn get_many(&self, collection: Collection, ids: &[String]) -> Result<Vec<Value>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.url(&[collection.index_name(&self.config), "_mget"])?;
        let body = json!({ "ids": ids });
        let Some(raw) = self.read(&url, Some(&body)).await? else {
            return Ok(Vec::new());
        };

        let response: MgetResponse = serde_json::from_value(raw)?;
        Ok(response
            .docs
            .into_iter()
            .filter(|d| d.found)
            .map(|d| d.source)
            .collect())
    }

    async fn update(&self, collection: Collection, id: &str, script: &UpdateScript) -> Result<()> {
        let url = self.url(&[collection.index_name(&self.config), "_update", id])?;
        let response = self
            .authorize(self.client.post(url).json(&script.to_json()))
            .send()
            .await
            .map_err(|e| AppError::Index {
                message: format!("Update of '{}' failed: {}", id, e),
            })?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(AppError::NotFound {
                resource_type: "document".to_string(),
                id: id.to_string(),
            }),
            status => {
                let text = response.text().await.unwrap_or_default();
                Err(AppError::Index {
                    message: format!("Update of '{}' failed with {}: {}", id, status, text),
                })
            }
        }
    }

    async fn ping(&self) -> Result<()> {
        let response = self
            .authorize(self.client.get(self.base_url.clone()))
            .send()
            .await
            .map_err(|e| AppError::Index {
                message: format!("Index ping failed: {}", e),
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::Index {
                message: format!("Index ping returned {}", response.status()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Query;

    fn client() -> ElasticIndex {
        ElasticIndex::new(&crate::config::AppConfig::default().index).unwrap()
    }

    #[test]
    fn test_ids_are_path_encoded() {
        let url = client()
            .url(&["openalex_works", "_doc", "https://openalex.org/W1"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9200/openalex_works/_doc/https:%2F%2Fopenalex.org%2FW1"
        );
    }

    #[test]
    fn test_search_body() {
        let request = SearchRequest::new(Query::MatchAll).size(200).sort_desc("cited_by_count");
        let body = ElasticIndex::search_body(&request);
        assert_eq!(body["size"], 200);
        assert_eq!(body["from"], 0);
        assert_eq!(body["sort"][0]["cited_by_count"]["order"], "desc");
        assert!(body["query"].get("match_all").is_some());
    }

    #[test]
    fn test_invalid_url_is_configuration_error() {
        let mut config = crate::config::AppConfig::default().index;
        config.url = "not a url".into();
        assert!(matches!(
            ElasticIndex::new(&config),
            Err(AppError::Configuration { .. })
        ));
    }
}
