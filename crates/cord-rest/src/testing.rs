//! Scripted exchange for unit tests

use crate::error::RestResult;
use crate::exchange::{HttpExchange, HttpRequest, HttpResponse};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{HeaderName, HeaderValue};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

/// Timer wakeups are rounded to the driver's millisecond tick
pub fn assert_near(actual: Duration, expected: Duration) {
    assert!(
        actual >= expected && actual <= expected + Duration::from_millis(5),
        "expected about {expected:?}, got {actual:?}"
    );
}

/// Scripted response builder
#[derive(Debug, Clone)]
pub struct Reply(HttpResponse);

impl Reply {
    pub fn status(status: u16) -> Self {
        Self(HttpResponse::new(status))
    }

    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        self.0.headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_str(value).unwrap(),
        );
        self
    }

    pub fn remaining(self, remaining: u32) -> Self {
        self.header("x-ratelimit-remaining", &remaining.to_string())
    }

    pub fn reset_after(self, secs: &str) -> Self {
        self.header("x-ratelimit-reset-after", secs)
    }

    pub fn body(mut self, body: &str) -> Self {
        self.0.body = body.as_bytes().to_vec();
        self
    }
}

pub fn ok() -> Reply {
    Reply::status(200)
}

pub fn limited(retry_after: &str, global: bool) -> Reply {
    let reply = Reply::status(429).body(&format!(
        r#"{{"message": "You are being rate limited.", "retry_after": {retry_after}, "global": {global}}}"#
    ));
    if global {
        reply.header("x-ratelimit-global", "true")
    } else {
        reply.remaining(0).reset_after(retry_after)
    }
}

/// One exchange as seen by the scripted server
#[derive(Debug, Clone)]
pub struct Exchange {
    pub path: String,
    pub started: Instant,
    pub finished: Instant,
}

/// Answers each path from its script, then with an empty 200
#[derive(Debug, Default)]
pub struct ScriptedExchange {
    latency: Duration,
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    log: Mutex<Vec<Exchange>>,
}

impl ScriptedExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn script(&self, path: &str, reply: Reply) {
        self.scripts
            .lock()
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn log(&self) -> Vec<Exchange> {
        self.log.lock().clone()
    }

    pub fn calls(&self, path: &str) -> usize {
        self.log.lock().iter().filter(|e| e.path == path).count()
    }
}

#[async_trait]
impl HttpExchange for ScriptedExchange {
    async fn execute(&self, request: HttpRequest) -> RestResult<HttpResponse> {
        let started = Instant::now();
        let index = {
            let mut log = self.log.lock();
            log.push(Exchange {
                path: request.path.clone(),
                started,
                finished: started,
            });
            log.len() - 1
        };
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.log.lock()[index].finished = Instant::now();

        let reply = self
            .scripts
            .lock()
            .get_mut(&request.path)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(ok);
        Ok(reply.0)
    }
}
