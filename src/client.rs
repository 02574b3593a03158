use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use log::{debug, trace, error, warn};

use crate::config::ApiConfig;
use crate::error::Error;
use crate::request::{self, Method, RequestDescriptor};
use crate::retry::{RetryPolicy, RetryState};

/// Resilient JSON-over-HTTP client
///
/// Every call gets a per-attempt timeout, retries transient failures
/// with capped exponential backoff and normalizes whatever body the
/// backend returns into `Result<Value, Error>`.
#[derive(Debug, Clone)]
pub struct ApiClient
{   http_client: reqwest::Client
  , config: ApiConfig
  , policy: RetryPolicy
  , default_headers: HeaderMap
}

impl ApiClient
{   pub fn new(
      config: ApiConfig
    , policy: RetryPolicy
    ) -> Result<Self, Error>
    {   debug!("Creating ApiClient for {}", config.base_url);
        let default_headers = header_map(
          config.default_headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
        )?;
        let http_client = reqwest::Client::builder()
          .timeout(config.timeout())
          .build()
          .map_err(|e| {
            error!("Failed to build HTTP client: {}", e);
            Error::InvalidConfiguration(e.to_string())
          })?;
        Ok(ApiClient
        {   http_client
          , config
          , policy
          , default_headers
        })
    }

    pub fn from_config(
      config: &crate::config::AssistConfig
    ) -> Result<Self, Error>
    {   ApiClient::new(
          config.api.clone(),
          RetryPolicy::from(&config.retry)
        )
    }

    pub fn base_url(&self) -> &str
    {   &self.config.base_url
    }

    pub fn policy(&self) -> &RetryPolicy
    {   &self.policy
    }

    /// Perform one logical request, retrying transient failures
    pub async fn request(
      &self
    , descriptor: RequestDescriptor
    ) -> Result<Value, Error>
    {   let url = descriptor.url(&self.config.base_url);
        let headers = self.merged_headers(&descriptor)?;
        let mut retry = RetryState::new(&self.policy);
        let mut last_error = None;

        while let Some(attempt) = retry.next_attempt()
        {   debug!(
              "{} {} (attempt {}/{})",
              descriptor.method, url, attempt, self.policy.max_attempts
            );
            match self.send_once(&descriptor, &url, &headers).await
            {   Ok(value) => return Ok(value)
              , Err(e) if !e.is_retryable() => {
                  error!("{} {} failed: {}", descriptor.method, url, e);
                  return Err(e);
                }
              , Err(e) => {
                  warn!(
                    "{} {} attempt {} failed: {}",
                    descriptor.method, url, attempt, e
                  );
                  if let Some(delay) = retry.delay_before_next()
                  {   debug!("Retrying in {}ms", delay.as_millis());
                      tokio::time::sleep(delay).await;
                  }
                  last_error = Some(e);
                }
            }
        }

        let attempts = retry.attempt();
        let last = last_error
          .unwrap_or_else(|| Error::Other("no attempt made".to_string()));
        error!(
          "{} {} gave up after {} attempts: {}",
          descriptor.method, url, attempts, last
        );
        Err(Error::ExhaustedRetries
        {   attempts
          , last: Box::new(last)
        })
    }

    /// Reachability check: one HEAD request, no retries
    ///
    /// A 405 still means the server answered, so it counts as reachable.
    pub async fn health_check(&self) -> bool
    {   let url = request::join_url(
          &self.config.base_url,
          &self.config.health_path
        );
        let result = self.http_client
          .request(Method::HEAD, &url)
          .timeout(self.config.health_timeout())
          .send()
          .await;
        match result
        {   Ok(response) => {
              let status = response.status();
              trace!("Health check {} -> {}", url, status);
              status.is_success()
                || status.is_redirection()
                || status == StatusCode::METHOD_NOT_ALLOWED
            }
          , Err(e) => {
              warn!("Health check {} failed: {}", url, e);
              false
            }
        }
    }

    async fn send_once(
      &self
    , descriptor: &RequestDescriptor
    , url: &str
    , headers: &HeaderMap
    ) -> Result<Value, Error>
    {   let mut builder = self.http_client
          .request(descriptor.method.clone(), url)
          .headers(headers.clone());
        if let Some(body) = &descriptor.body
        {   trace!("Request body: {}", body);
            builder = builder.body(body.to_string());
        }

        let response = builder.send().await.map_err(Error::from)?;
        let status = response.status();
        trace!("{} {} -> {}", descriptor.method, url, status);

        let text = response.text().await.map_err(Error::from)?;
        normalize_response(status, &text)
    }

    fn merged_headers(
      &self
    , descriptor: &RequestDescriptor
    ) -> Result<HeaderMap, Error>
    {   let mut headers = self.default_headers.clone();
        if descriptor.body.is_some() && !headers.contains_key(CONTENT_TYPE)
        {   headers.insert(
              CONTENT_TYPE,
              HeaderValue::from_static("application/json")
            );
        }
        let overrides = header_map(
          descriptor.headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
        )?;
        for (name, value) in overrides.iter()
        {   headers.insert(name.clone(), value.clone());
        }
        Ok(headers)
    }
}

/// Turn a status and raw body into the success value or a typed error
pub fn normalize_response(
  status: StatusCode
, text: &str
) -> Result<Value, Error>
{   let body = request::parse_body(text);
    if status.is_success()
    {   return Ok(body);
    }
    let message = request::error_message(&body, status);
    let body = if body.is_null() { None } else { Some(body) };
    let status_code = status.as_u16();
    if status.is_server_error()
    {   Err(Error::Server
        {   status: status_code
          , message
          , body
        })
    } else if status.is_client_error()
    {   Err(Error::Client
        {   status: status_code
          , message
          , body
        })
    } else
    {   warn!("Unexpected status {} from backend", status);
        Err(Error::UnexpectedStatus
        {   status: status_code
          , message
          , body
        })
    }
}

fn header_map<'a>(
  pairs: impl Iterator<Item = (&'a str, &'a str)>
) -> Result<HeaderMap, Error>
{   let mut map = HeaderMap::new();
    for (name, value) in pairs
    {   let name = HeaderName::from_bytes(name.as_bytes())
          .map_err(|e| {
            Error::InvalidRequest(format!("header name {}: {}", name, e))
          })?;
        let value = HeaderValue::from_str(value)
          .map_err(|e| {
            Error::InvalidRequest(format!("header value: {}", e))
          })?;
        map.insert(name, value);
    }
    Ok(map)
}
