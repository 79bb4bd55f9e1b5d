//! Deterministic test doubles for the LLM provider and the REST client.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::agent::message::{ChatRequest, ChatResponse};
use crate::agent::provider::LlmProvider;
use crate::api::client::ApiClient;
use crate::error::AgentError;

/// Provider that replays queued replies in order.
///
/// An exhausted queue answers with [`AgentError::ApiRequest`].
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, AgentError>>>,
    requests: Mutex<Vec<ChatRequest>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_results(replies.into_iter().map(|r| Ok(r.into())))
    }

    pub fn with_results(replies: impl IntoIterator<Item = Result<String, AgentError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let next = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match next {
            Some(Ok(content)) => Ok(ChatResponse {
                content,
                ..ChatResponse::default()
            }),
            Some(Err(e)) => Err(e),
            None => Err(AgentError::ApiRequest {
                message: "no scripted reply left".to_string(),
                status: None,
            }),
        }
    }
}

/// REST client that answers from per-pattern queues.
///
/// A request is served by the first route whose pattern is a substring of
/// the target and whose queue is not empty. Unmatched requests get `None`.
#[derive(Default)]
pub struct ScriptedApi {
    routes: Mutex<Vec<(String, VecDeque<Option<String>>)>>,
    log: Mutex<Vec<String>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `reply` for targets containing `pattern`.
    pub fn on(self, pattern: &str, reply: Option<&str>) -> Self {
        {
            let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
            let reply = reply.map(str::to_string);
            if let Some((_, queue)) = routes.iter_mut().find(|(p, _)| p == pattern) {
                queue.push_back(reply);
            } else {
                routes.push((pattern.to_string(), VecDeque::from([reply])));
            }
        }
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ApiClient for ScriptedApi {
    async fn get(&self, target: &str) -> Option<String> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(target.to_string());

        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        routes
            .iter_mut()
            .find(|(pattern, queue)| target.contains(pattern.as_str()) && !queue.is_empty())
            .and_then(|(_, queue)| queue.pop_front())
            .flatten()
    }
}
