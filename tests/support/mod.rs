//! In-process HTTP backend for integration tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use auction_assist::config::AssistConfig;

#[derive(Debug, Clone)]
pub struct MockResponse
{   pub status: u16
  , pub body: String
  , pub content_type: &'static str
  , pub delay: Option<Duration>
}

impl MockResponse
{   pub fn json(status: u16, body: serde_json::Value) -> Self
    {   MockResponse
        {   status
          , body: body.to_string()
          , content_type: "application/json"
          , delay: None
        }
    }

    pub fn text(status: u16, body: &str) -> Self
    {   MockResponse
        {   status
          , body: body.to_string()
          , content_type: "text/plain"
          , delay: None
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self
    {   self.delay = Some(delay);
        self
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest
{   pub method: String
  , pub target: String
  , pub headers: Vec<(String, String)>
  , pub body: String
}

impl RecordedRequest
{   pub fn header(&self, name: &str) -> Option<&str>
    {   self.headers
          .iter()
          .find(|(k, _)| k.eq_ignore_ascii_case(name))
          .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> serde_json::Value
    {   serde_json::from_str(&self.body).unwrap()
    }
}

type Routes = HashMap<(String, String), VecDeque<MockResponse>>;

/// Scripted backend: each route replays its queue, repeating the last
pub struct MockServer
{   addr: SocketAddr
  , routes: Arc<Mutex<Routes>>
  , requests: Arc<Mutex<Vec<RecordedRequest>>>
}

impl MockServer
{   pub async fn start() -> Self
    {   let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes: Arc<Mutex<Routes>> = Arc::default();
        let requests: Arc<Mutex<Vec<RecordedRequest>>> = Arc::default();

        let (r, q) = (routes.clone(), requests.clone());
        tokio::spawn(async move {
          while let Ok((stream, _)) = listener.accept().await
          {   tokio::spawn(handle_connection(stream, r.clone(), q.clone()));
          }
        });

        MockServer { addr, routes, requests }
    }

    pub fn url(&self) -> String
    {   format!("http://{}", self.addr)
    }

    /// Queue responses for `method target`, replayed in order
    pub fn route(&self, method: &str, target: &str, responses: Vec<MockResponse>)
    {   self.routes.lock().unwrap().insert(
          (method.to_string(), target.to_string()),
          responses.into_iter().collect()
        );
    }

    pub fn requests(&self) -> Vec<RecordedRequest>
    {   self.requests.lock().unwrap().clone()
    }

    pub fn hits(&self, method: &str, target: &str) -> usize
    {   self.requests()
          .iter()
          .filter(|r| r.method == method && r.target == target)
          .count()
    }

    /// Config pointed at this server with short backoff
    pub fn config(&self) -> AssistConfig
    {   let mut config = AssistConfig::default();
        config.api.base_url = self.url();
        config.api.timeout_ms = 2_000;
        config.retry.initial_backoff_ms = 20;
        config.retry.max_backoff_ms = 40;
        config
    }
}

/// Base URL where nothing listens
pub async fn unused_url() -> String
{   let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

async fn handle_connection(
  mut stream: TcpStream
, routes: Arc<Mutex<Routes>>
, requests: Arc<Mutex<Vec<RecordedRequest>>>
)
{   let request = match read_request(&mut stream).await
    {   Some(request) => request
      , None => return
    };
    let key = (request.method.clone(), request.target.clone());
    requests.lock().unwrap().push(request.clone());

    let response = {
      let mut routes = routes.lock().unwrap();
      let picked = match routes.get_mut(&key)
      {   Some(queue) if queue.len() > 1 => queue.pop_front()
        , Some(queue) => queue.front().cloned()
        , None => None
      };
      picked
    }
    .unwrap_or_else(|| {
      MockResponse::json(404, serde_json::json!({"detail": "Not Found"}))
    });

    if let Some(delay) = response.delay
    {   tokio::time::sleep(delay).await;
    }

    let reason = reqwest::StatusCode::from_u16(response.status)
      .ok()
      .and_then(|s| s.canonical_reason())
      .unwrap_or("Unknown");
    let body = if request.method == "HEAD" { "" } else { response.body.as_str() };
    let raw = format!(
      "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
      response.status, reason, response.content_type, body.len(), body
    );
    let _ = stream.write_all(raw.as_bytes()).await;
    let _ = stream.shutdown().await;
}

async fn read_request(stream: &mut TcpStream) -> Option<RecordedRequest>
{   let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop
    {   let n = stream.read(&mut chunk).await.ok()?;
        if n == 0
        {   return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n")
        {   break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
      .filter_map(|line| line.split_once(':'))
      .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
      .collect();
    let length = headers
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
      .and_then(|(_, v)| v.parse::<usize>().ok())
      .unwrap_or(0);

    while buf.len() < header_end + length
    {   let n = stream.read(&mut chunk).await.ok()?;
        if n == 0
        {   break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let end = (header_end + length).min(buf.len());
    let body = String::from_utf8_lossy(&buf[header_end..end]).to_string();

    Some(RecordedRequest { method, target, headers, body })
}
