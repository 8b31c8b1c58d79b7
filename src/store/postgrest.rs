//! PostgREST-compatible client for the hosted store.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::Value as JsonValue;
use url::Url;

use super::{Filter, ListQuery, Row, Store, StoreError};

const PG_UNIQUE_VIOLATION: &str = "23505";

/// Store client speaking the PostgREST dialect under `{project}/rest/v1/`.
#[derive(Debug, Clone)]
pub struct PostgrestStore {
    client: Client,
    rest_base: Url,
    api_key: String,
}

impl PostgrestStore {
    /// Builds a client for `project_url`. Every request made through it is
    /// abandoned after `timeout`.
    pub fn new(
        project_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let base = format!("{}/rest/v1/", project_url.trim_end_matches('/'));
        let rest_base = Url::parse(&base)
            .map_err(|err| StoreError::Unavailable(format!("invalid store url '{base}': {err}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;

        Ok(Self {
            client,
            rest_base,
            api_key: api_key.into(),
        })
    }

    fn request(
        &self,
        method: Method,
        relation: &str,
        params: Vec<(String, String)>,
    ) -> Result<RequestBuilder, StoreError> {
        let url = self.rest_base.join(relation).map_err(|err| {
            StoreError::Unavailable(format!("invalid relation '{relation}': {err}"))
        })?;

        Ok(self
            .client
            .request(method, url)
            .query(&params)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "application/json"))
    }

    async fn execute(&self, request: RequestBuilder) -> Result<JsonValue, StoreError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "Store request failed");
            if status == StatusCode::CONFLICT && body.contains(PG_UNIQUE_VIOLATION) {
                return Err(StoreError::UniqueViolation { body });
            }
            return Err(StoreError::Http {
                status: status.as_u16(),
                body,
            });
        }

        match serde_json::from_str::<JsonValue>(&body) {
            Ok(value @ (JsonValue::Object(_) | JsonValue::Array(_))) => Ok(value),
            Ok(other) => Err(StoreError::MalformedResponse(format!(
                "expected object or array, got {other}"
            ))),
            Err(err) => Err(StoreError::MalformedResponse(err.to_string())),
        }
    }

    async fn write(
        &self,
        method: Method,
        table: &str,
        filters: &[Filter],
        body: JsonValue,
    ) -> Result<JsonValue, StoreError> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(filter_params(filters));

        let request = self
            .request(method, table, params)?
            .header("Prefer", "return=representation")
            .json(&body);
        self.execute(request).await
    }
}

fn filter_params(filters: &[Filter]) -> impl Iterator<Item = (String, String)> + '_ {
    filters
        .iter()
        .map(|filter| (filter.column.clone(), filter.to_query_value()))
}

/// Every successful read or representation-returning write answers with a
/// JSON array of rows; anything else is malformed.
fn into_rows(payload: JsonValue) -> Result<Vec<Row>, StoreError> {
    let JsonValue::Array(items) = payload else {
        return Err(StoreError::MalformedResponse(format!(
            "expected an array of rows, got {payload}"
        )));
    };
    items
        .into_iter()
        .map(|item| match item {
            JsonValue::Object(row) => Ok(row),
            other => Err(StoreError::MalformedResponse(format!(
                "expected row object, got {other}"
            ))),
        })
        .collect()
}

#[async_trait]
impl Store for PostgrestStore {
    async fn list_rows(&self, relation: &str, query: &ListQuery) -> Result<Vec<Row>, StoreError> {
        let mut params = vec![
            ("select".to_string(), "*".to_string()),
            ("limit".to_string(), query.limit.to_string()),
            ("offset".to_string(), query.offset.to_string()),
        ];
        params.extend(filter_params(&query.filters));

        let payload = self
            .execute(self.request(Method::GET, relation, params)?)
            .await?;
        into_rows(payload)
    }

    async fn insert_one(&self, table: &str, row: Row) -> Result<Row, StoreError> {
        let payload = self
            .write(Method::POST, table, &[], JsonValue::Object(row))
            .await?;
        into_rows(payload)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::MalformedResponse("insert returned empty payload".into()))
    }

    async fn insert_many(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, StoreError> {
        let body = JsonValue::Array(rows.into_iter().map(JsonValue::Object).collect());
        let payload = self.write(Method::POST, table, &[], body).await?;
        into_rows(payload)
    }

    async fn update_rows(
        &self,
        table: &str,
        filters: &[Filter],
        changes: Row,
    ) -> Result<Vec<Row>, StoreError> {
        let payload = self
            .write(Method::PATCH, table, filters, JsonValue::Object(changes))
            .await?;
        into_rows(payload)
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoreError::Timeout
        } else if err.is_decode() {
            StoreError::MalformedResponse(err.to_string())
        } else {
            StoreError::Unavailable(err.to_string())
        }
    }
}
