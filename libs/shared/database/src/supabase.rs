use anyhow::Result;
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_RANGE, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::error::DatabaseError;

/// Thin PostgREST client. Every call forwards the caller's bearer token so
/// row-level security in the database sees the real user.
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.anon_key)
                .map_err(|e| DatabaseError::InvalidHeader(e.to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| DatabaseError::InvalidHeader(e.to_string()))?,
            );
        }

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(&self, method: Method, path: &str,
                                         auth_token: Option<&str>, body: Option<Value>,
                                         extra_headers: Option<HeaderMap>)
                                         -> Result<T>
    where T: DeserializeOwned {
        let (data, _) = self.send(method, path, auth_token, body, extra_headers).await?;
        Ok(data)
    }

    /// GET with `Prefer: count=exact`, returning the page and the total row count.
    pub async fn request_with_count<T>(&self, path: &str, auth_token: Option<&str>)
                                       -> Result<(Vec<T>, u64)>
    where T: DeserializeOwned {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("count=exact"));

        let (rows, response_headers) = self
            .send::<Vec<T>>(Method::GET, path, auth_token, None, Some(headers))
            .await?;

        let total = response_headers
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range_total)
            .unwrap_or(rows.len() as u64);

        Ok((rows, total))
    }

    /// Insert a row into `table` and return the stored representation.
    pub async fn insert<T>(&self, table: &str, auth_token: &str, body: Value) -> Result<T>
    where T: DeserializeOwned {
        let path = format!("/rest/v1/{}", table);
        let rows: Vec<T> = self.request_with_headers(
            Method::POST,
            &path,
            Some(auth_token),
            Some(body),
            Some(return_representation()),
        ).await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| DatabaseError::Api {
                status: 201,
                message: format!("Insert into {} returned no rows", table),
            }.into())
    }

    /// PATCH the rows matched by `filter` and return the first updated row,
    /// or `None` when nothing matched.
    pub async fn update<T>(&self, table: &str, filter: &str, auth_token: &str, body: Value)
                           -> Result<Option<T>>
    where T: DeserializeOwned {
        let path = format!("/rest/v1/{}?{}", table, filter);
        let rows: Vec<T> = self.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(body),
            Some(return_representation()),
        ).await?;

        Ok(rows.into_iter().next())
    }

    /// DELETE the rows matched by `filter` and return the first removed row.
    pub async fn delete<T>(&self, table: &str, filter: &str, auth_token: &str) -> Result<Option<T>>
    where T: DeserializeOwned {
        let path = format!("/rest/v1/{}?{}", table, filter);
        let rows: Vec<T> = self.request_with_headers(
            Method::DELETE,
            &path,
            Some(auth_token),
            None,
            Some(return_representation()),
        ).await?;

        Ok(rows.into_iter().next())
    }

    /// GET the first row matched by `filter`.
    pub async fn select_one<T>(&self, table: &str, filter: &str, auth_token: &str)
                               -> Result<Option<T>>
    where T: DeserializeOwned {
        let path = format!("/rest/v1/{}?{}&limit=1", table, filter);
        let rows: Vec<T> = self.request(Method::GET, &path, Some(auth_token), None).await?;
        Ok(rows.into_iter().next())
    }

    async fn send<T>(&self, method: Method, path: &str,
                     auth_token: Option<&str>, body: Option<Value>,
                     extra_headers: Option<HeaderMap>)
                     -> Result<(T, HeaderMap)>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);
            return Err(DatabaseError::from_status(status.as_u16(), error_text).into());
        }

        let response_headers = response.headers().clone();
        let data = response.json::<T>().await?;
        Ok((data, response_headers))
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

fn return_representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

/// `Content-Range: 0-19/57` → `57`; `*/0` → `0`; `0-19/*` → `None`.
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.parse().ok()
}
