//! Request descriptors and response normalization

use serde::Serialize;
use serde_json::{json, Value};
use log::trace;

pub use reqwest::Method;

/// One logical request against the backend
/// Built by a caller and consumed once by `ApiClient::request`
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor
{   pub method: Method
  , /// Path relative to the configured base URL
    pub path: String
  , /// JSON body, already serialized to a value
    pub body: Option<Value>
  , /// Extra headers, applied over the defaults
    pub headers: Vec<(String, String)>
}

impl RequestDescriptor
{   pub fn new(method: Method, path: impl Into<String>) -> Self
    {   RequestDescriptor
        {   method
          , path: path.into()
          , body: None
          , headers: vec![]
        }
    }

    pub fn get(path: impl Into<String>) -> Self
    {   RequestDescriptor::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self
    {   RequestDescriptor::new(Method::POST, path)
    }

    /// Attach a JSON body; fails if `body` cannot be serialized
    pub fn json<T: Serialize + ?Sized>(
      mut self
    , body: &T
    ) -> Result<Self, crate::error::Error>
    {   let value = serde_json::to_value(body).map_err(|e| {
          crate::error::Error::Serialize(e.to_string())
        })?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn header(
      mut self
    , name: impl Into<String>
    , value: impl Into<String>
    ) -> Self
    {   self.headers.push((name.into(), value.into()));
        self
    }

    /// Full URL for this request under `base_url`
    pub fn url(&self, base_url: &str) -> String
    {   join_url(base_url, &self.path)
    }
}

/// Join a base URL and a path with exactly one slash between them
pub fn join_url(base_url: &str, path: &str) -> String
{   let base = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty()
    {   base.to_string()
    } else
    {   format!("{}/{}", base, path)
    }
}

/// Parse a response body, tolerating non-JSON payloads
pub fn parse_body(text: &str) -> Value
{   if text.trim().is_empty()
    {   return Value::Null;
    }
    match serde_json::from_str::<Value>(text)
    {   Ok(value) => value
      , Err(e) => {
          trace!("Body is not JSON ({}), wrapping raw text", e);
          json!({ "raw": text })
        }
    }
}

/// Best human-readable message for a rejected response
pub fn error_message(
  body: &Value
, status: reqwest::StatusCode
) -> String
{   if let Some(detail) = body.get("detail")
    {   if let Some(message) = detail_message(detail)
        {   return message;
        }
    }
    for field in ["error", "message"]
    {   if let Some(text) = body.get(field).and_then(Value::as_str)
        {   if !text.is_empty()
            {   return text.to_string();
            }
        }
    }
    match status.canonical_reason()
    {   Some(reason) => reason.to_string()
      , None => format!("HTTP {}", status.as_u16())
    }
}

// `detail` is a string for handled errors and a list of
// `{loc, msg, type}` objects for validation failures
fn detail_message(detail: &Value) -> Option<String>
{   match detail
    {   Value::String(text) if !text.is_empty() => Some(text.clone())
      , Value::Array(items) => {
          let parts: Vec<String> = items
            .iter()
            .filter_map(|item| {
              item.get("msg")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| item.as_str().map(str::to_string))
            })
            .collect();
          if parts.is_empty()
          {   None
          } else
          {   Some(parts.join("; "))
          }
        }
      , Value::Object(_) => detail.get("message")
          .and_then(Value::as_str)
          .map(str::to_string)
      , _ => None
    }
}
