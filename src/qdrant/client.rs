//! HTTP client wrapper for interacting with Qdrant.

use crate::config::Config;
use crate::qdrant::{
    filters::field_equals,
    payload::point_uuid,
    types::{
        ChunkPoint, CountResponse, IndexStats, PointResponse, QdrantError, QueryResponse,
        QueryResponseResult, ScoredPoint, ScrollResponse, StoredPoint,
    },
};
use reqwest::{Client, Method, StatusCode};
use serde_json::{Map, Value, json};

const SCROLL_PAGE_SIZE: usize = 512;

/// Lightweight HTTP client for the document chunk collection.
///
/// Constructed once near process start and shared through the orchestrator;
/// there is no module-level instance.
pub struct QdrantIndex {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) collection: String,
    pub(crate) vector_size: usize,
}

impl QdrantIndex {
    /// Construct a new client for the given endpoint and collection.
    pub fn new(
        url: &str,
        api_key: Option<String>,
        collection: String,
        vector_size: usize,
    ) -> Result<Self, QdrantError> {
        let client = Client::builder().user_agent("semdoc/0.3").build()?;
        let base_url = normalize_base_url(url).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            collection = %collection,
            vector_size,
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key,
            collection,
            vector_size,
        })
    }

    /// Construct a client using the loaded server configuration.
    pub fn from_config(config: &Config) -> Result<Self, QdrantError> {
        Self::new(
            &config.qdrant_url,
            config.qdrant_api_key.clone(),
            config.qdrant_collection_name.clone(),
            config.embedding_dimension,
        )
    }

    /// Ensure the collection exists, creating it on first use.
    ///
    /// Creation is idempotent under races: if another caller creates the
    /// collection between the existence check and the create request, the
    /// conflict is resolved by falling back to the winner's collection.
    pub async fn ensure_collection(&self) -> Result<(), QdrantError> {
        if self.collection_exists().await? {
            return Ok(());
        }

        tracing::debug!(collection = %self.collection, "Creating collection");
        match self.create_collection().await {
            Ok(()) => Ok(()),
            Err(QdrantError::UnexpectedStatus { status, body })
                if status == StatusCode::CONFLICT || body.contains("already exists") =>
            {
                // Another caller won the creation race; their collection is
                // the one we wanted.
                tracing::debug!(
                    collection = %self.collection,
                    "Lost collection-creation race; using existing collection"
                );
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    /// Create the collection with the configured vector size.
    pub async fn create_collection(&self) -> Result<(), QdrantError> {
        let body = json!({
            "vectors": {
                "size": self.vector_size,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{}", self.collection))?
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = %self.collection, "Collection created");
        })
        .await
    }

    /// Upsert prepared chunk entries, returning the number written.
    ///
    /// Every vector is checked against the configured dimension before any
    /// bytes are sent; deterministic point ids make re-ingestion overwrite a
    /// document's prior generation instead of appending to it.
    pub async fn upsert_chunks(&self, points: Vec<ChunkPoint>) -> Result<usize, QdrantError> {
        if points.is_empty() {
            return Ok(0);
        }

        for point in &points {
            if point.vector.len() != self.vector_size {
                return Err(QdrantError::DimensionMismatch {
                    expected: self.vector_size,
                    actual: point.vector.len(),
                });
            }
        }

        let serialized: Vec<Value> = points
            .into_iter()
            .map(|point| {
                json!({
                    "id": point_uuid(&point.chunk_id),
                    "vector": point.vector,
                    "payload": Value::Object(point.payload),
                })
            })
            .collect();

        let point_count = serialized.len();
        let response = self
            .request(
                Method::PUT,
                &format!("collections/{}/points", self.collection),
            )?
            .query(&[("wait", true)])
            .json(&json!({ "points": serialized }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(
                collection = %self.collection,
                points = point_count,
                "Chunks indexed"
            );
        })
        .await?;

        Ok(point_count)
    }

    /// Similarity query, ranked by descending score and truncated to `k`.
    ///
    /// `k` is clamped to the current collection size; an empty collection
    /// returns an empty result set without issuing a query.
    pub async fn query(
        &self,
        vector: Vec<f32>,
        k: usize,
        filter: Option<Value>,
    ) -> Result<Vec<ScoredPoint>, QdrantError> {
        if vector.len() != self.vector_size {
            return Err(QdrantError::DimensionMismatch {
                expected: self.vector_size,
                actual: vector.len(),
            });
        }

        let available = self.count().await?;
        if available == 0 {
            return Ok(Vec::new());
        }
        let limit = k.min(available).max(1);

        let mut body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
        });
        if let Some(filter_value) = filter {
            body.as_object_mut()
                .expect("query body should remain an object")
                .insert("filter".into(), filter_value);
        }

        let response = self
            .request(
                Method::POST,
                &format!("collections/{}/points/query", self.collection),
            )?
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = %self.collection, error = %error, "Qdrant query failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };
        Ok(points
            .into_iter()
            .map(|point| ScoredPoint {
                id: stringify_point_id(point.id),
                score: point.score,
                payload: point.payload,
            })
            .collect())
    }

    /// Fetch a single entry by its logical chunk id.
    pub async fn get(&self, chunk_id: &str) -> Result<Option<StoredPoint>, QdrantError> {
        let response = self
            .request(
                Method::GET,
                &format!(
                    "collections/{}/points/{}",
                    self.collection,
                    point_uuid(chunk_id)
                ),
            )?
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let payload: PointResponse = response.json().await?;
                Ok(Some(StoredPoint {
                    id: stringify_point_id(payload.result.id),
                    vector: payload.result.vector,
                    payload: payload.result.payload.unwrap_or_default(),
                }))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(QdrantError::UnexpectedStatus { status, body })
            }
        }
    }

    /// Fetch every entry whose payload field equals the given value.
    pub async fn get_by_field(
        &self,
        field: &str,
        value: Value,
        with_vectors: bool,
    ) -> Result<Vec<StoredPoint>, QdrantError> {
        let filter = crate::qdrant::build_equality_filter(&field_equals(field, value))
            .unwrap_or_else(|| json!({ "must": [] }));

        let mut offset: Option<Value> = None;
        let mut results = Vec::new();

        loop {
            let mut body = json!({
                "with_payload": true,
                "with_vector": with_vectors,
                "limit": SCROLL_PAGE_SIZE,
                "filter": filter.clone(),
            });
            if let Some(cursor) = offset.clone() {
                body.as_object_mut()
                    .expect("scroll body should remain an object")
                    .insert("offset".into(), cursor);
            }

            let response = self
                .request(
                    Method::POST,
                    &format!("collections/{}/points/scroll", self.collection),
                )?
                .json(&body)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = %self.collection, error = %error, "Failed to scroll points");
                return Err(error);
            }

            let ScrollResponse { result } = response.json().await?;
            for point in result.points {
                if let (Some(id), Some(payload)) = (point.id, point.payload) {
                    results.push(StoredPoint {
                        id: stringify_point_id(id),
                        vector: point.vector,
                        payload,
                    });
                }
            }

            match result.next_page_offset {
                Some(next) if !next.is_null() => offset = Some(next),
                _ => break,
            }
        }

        Ok(results)
    }

    /// Delete every entry whose payload field equals the given value.
    pub async fn delete_where(&self, field: &str, value: Value) -> Result<(), QdrantError> {
        let filter = crate::qdrant::build_equality_filter(&field_equals(field, value))
            .unwrap_or_else(|| json!({ "must": [] }));

        let response = self
            .request(
                Method::POST,
                &format!("collections/{}/points/delete", self.collection),
            )?
            .query(&[("wait", true)])
            .json(&json!({ "filter": filter }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = %self.collection, field, "Matching points deleted");
        })
        .await
    }

    /// Merge a payload patch into a single entry.
    pub async fn update_metadata(
        &self,
        chunk_id: &str,
        patch: Map<String, Value>,
    ) -> Result<(), QdrantError> {
        let response = self
            .request(
                Method::POST,
                &format!("collections/{}/points/payload", self.collection),
            )?
            .query(&[("wait", true)])
            .json(&json!({
                "payload": Value::Object(patch),
                "points": [point_uuid(chunk_id)],
            }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = %self.collection, chunk_id, "Payload updated");
        })
        .await
    }

    /// Exact number of stored points.
    pub async fn count(&self) -> Result<usize, QdrantError> {
        let response = self
            .request(
                Method::POST,
                &format!("collections/{}/points/count", self.collection),
            )?
            .json(&json!({ "exact": true }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(QdrantError::UnexpectedStatus { status, body });
        }

        let payload: CountResponse = response.json().await?;
        Ok(payload.result.count)
    }

    /// Point-count snapshot of the collection.
    pub async fn stats(&self) -> Result<IndexStats, QdrantError> {
        Ok(IndexStats {
            collection: self.collection.clone(),
            points: self.count().await?,
        })
    }

    /// Destroy and recreate an empty collection.
    pub async fn reset(&self) -> Result<(), QdrantError> {
        let response = self
            .request(Method::DELETE, &format!("collections/{}", self.collection))?
            .send()
            .await?;

        // A missing collection is already the desired starting point.
        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = %self.collection, error = %error, "Failed to delete collection");
            return Err(error);
        }

        self.ensure_collection().await?;
        tracing::info!(collection = %self.collection, "Collection reset");
        Ok(())
    }

    async fn collection_exists(&self) -> Result<bool, QdrantError> {
        let response = self
            .request(Method::GET, &format!("collections/{}", self.collection))?
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = %self.collection, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder, QdrantError> {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        Ok(req)
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), QdrantError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Object(map) => map
            .get("uuid")
            .map(|value| match value {
                Value::String(uuid) => uuid.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| Value::Object(map).to_string()),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
