use std::fmt;
use serde_json::Value;

/// Broad classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind
{   /// No response was obtained (connectivity, DNS, timeout)
    Network
  , /// Backend answered with status >= 500
    Server
  , /// Backend rejected the request with status 400-499
    Client
  , /// Every attempt failed with a retryable error
    ExhaustedRetries
  , /// Local storage read or write failed
    Persistence
  , /// Failure raised locally, or a status outside the error families
    Local
}

/// Error type for every auction-assist operation
/// Implements Clone for sending through channels
#[derive(Debug, Clone, PartialEq)]
pub enum Error
{   /// Transport failure, no response received
    Network(String)
  , /// Attempt exceeded the configured timeout
    Timeout
  , /// Backend failure (status >= 500)
    Server
    {   status: u16
      , message: String
      , body: Option<Value>
    }
  , /// Request rejected by the backend (status 400-499)
    Client
    {   status: u16
      , message: String
      , body: Option<Value>
    }
  , /// Non-success status outside 400-599 (informational or redirect)
    UnexpectedStatus
    {   status: u16
      , message: String
      , body: Option<Value>
    }
  , /// Retry budget consumed without success
    ExhaustedRetries
    {   attempts: usize
      , last: Box<Error>
    }
  , /// Local key-value storage failure
    Persistence(String)
  , /// Request body could not be serialized
    Serialize(String)
  , /// Response could not be interpreted
    Parse(String)
  , /// Request rejected locally before any network I/O
    InvalidRequest(String)
  , /// Invalid configuration
    InvalidConfiguration(String)
  , /// Generic error
    Other(String)
}

impl Error
{   pub fn kind(&self) -> ErrorKind
    {   match self
        {   Error::Network(_) | Error::Timeout => ErrorKind::Network
          , Error::Server { .. } => ErrorKind::Server
          , Error::Client { .. } => ErrorKind::Client
          , Error::ExhaustedRetries { .. } => ErrorKind::ExhaustedRetries
          , Error::Persistence(_) => ErrorKind::Persistence
          , _ => ErrorKind::Local
        }
    }

    /// Transient failures that another attempt may resolve
    pub fn is_retryable(&self) -> bool
    {   matches!(self.kind(), ErrorKind::Network | ErrorKind::Server)
    }

    /// HTTP status, when the backend answered
    pub fn status(&self) -> Option<u16>
    {   match self
        {   Error::Server { status, .. }
          | Error::Client { status, .. }
          | Error::UnexpectedStatus { status, .. } => Some(*status)
          , Error::ExhaustedRetries { last, .. } => last.status()
          , _ => None
        }
    }

    /// Raw parsed body of a rejected response
    pub fn body(&self) -> Option<&Value>
    {   match self
        {   Error::Server { body, .. }
          | Error::Client { body, .. }
          | Error::UnexpectedStatus { body, .. } => body.as_ref()
          , Error::ExhaustedRetries { last, .. } => last.body()
          , _ => None
        }
    }

    /// Human-readable message without the variant prefix
    pub fn message(&self) -> String
    {   match self
        {   Error::Server { message, .. }
          | Error::Client { message, .. }
          | Error::UnexpectedStatus { message, .. } => message.clone()
          , _ => self.to_string()
        }
    }
}

impl fmt::Display for Error
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   match self
        {   Error::Network(msg) => {
              write!(f, "Network error: {}", msg)
            }
          , Error::Timeout => {
              write!(f, "Request timed out")
            }
          , Error::Server { status, message, .. } => {
              write!(f, "Server error ({}): {}", status, message)
            }
          , Error::Client { status, message, .. } => {
              write!(f, "Request rejected ({}): {}", status, message)
            }
          , Error::UnexpectedStatus { status, message, .. } => {
              write!(f, "Unexpected status ({}): {}", status, message)
            }
          , Error::ExhaustedRetries { attempts, last } => {
              write!(f,
                "Request failed after {} attempts: {}",
                attempts, last
              )
            }
          , Error::Persistence(msg) => {
              write!(f, "Storage error: {}", msg)
            }
          , Error::Serialize(msg) => {
              write!(f, "Serialize error: {}", msg)
            }
          , Error::Parse(msg) => {
              write!(f, "Parse error: {}", msg)
            }
          , Error::InvalidRequest(msg) => {
              write!(f, "Invalid request: {}", msg)
            }
          , Error::InvalidConfiguration(msg) => {
              write!(f, "Invalid configuration: {}", msg)
            }
          , Error::Other(msg) => {
              write!(f, "Error: {}", msg)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<reqwest::Error> for Error
{   fn from(e: reqwest::Error) -> Self
    {   if e.is_timeout()
        {   Error::Timeout
        } else
        {   Error::Network(e.to_string())
        }
    }
}

impl From<String> for Error
{   fn from(s: String) -> Self
    {   Error::Other(s)
    }
}

impl From<&str> for Error
{   fn from(s: &str) -> Self
    {   Error::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests
{   use super::*;
    use serde_json::json;

    #[test]
    fn classification_follows_status_family()
    {   let server = Error::Server
        {   status: 503
          , message: "Service Unavailable".to_string()
          , body: None
        };
        let client = Error::Client
        {   status: 422
          , message: "Invalid price".to_string()
          , body: Some(json!({"detail": "Invalid price"}))
        };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
        assert!(Error::Timeout.is_retryable());
        assert_eq!(Error::Timeout.kind(), ErrorKind::Network);
        assert_eq!(client.message(), "Invalid price");
        assert_eq!(client.body(), Some(&json!({"detail": "Invalid price"})));
    }

    #[test]
    fn exhausted_reports_attempts_and_last_status()
    {   let err = Error::ExhaustedRetries
        {   attempts: 3
          , last: Box::new(Error::Server
            {   status: 500
              , message: "boom".to_string()
              , body: None
            })
        };
        assert!(!err.is_retryable());
        assert_eq!(err.status(), Some(500));
        assert!(err.to_string().contains("after 3 attempts"));
    }
}
