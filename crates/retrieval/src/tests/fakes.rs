//! Scripted stand-ins for the LLM and the vector index.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use crate::types::Document;
use crate::vector_index::{SearchMode, VectorIndex};
use geochain_core::{AppError, AppResult};
use geochain_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};

type Reply = Result<String, String>;

/// LLM fake answering from rules, then a queue, then a default reply.
///
/// A rule matches when the rendered user prompt contains its needle.
pub struct ScriptedLlm {
    rules: Vec<(String, Reply)>,
    queue: Mutex<VecDeque<Reply>>,
    default: Reply,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    pub fn replying(reply: &str) -> Self {
        Self {
            rules: Vec::new(),
            queue: Mutex::new(VecDeque::new()),
            default: Ok(reply.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            default: Err(message.to_string()),
            ..Self::replying("")
        }
    }

    pub fn when(mut self, needle: &str, reply: &str) -> Self {
        self.rules.push((needle.to_string(), Ok(reply.to_string())));
        self
    }

    pub fn fail_when(mut self, needle: &str, message: &str) -> Self {
        self.rules.push((needle.to_string(), Err(message.to_string())));
        self
    }

    pub fn then(self, reply: &str) -> Self {
        self.queue.lock().unwrap().push_back(Ok(reply.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.requests.lock().unwrap().push(request.clone());

        let reply = self
            .rules
            .iter()
            .find(|(needle, _)| request.prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .or_else(|| self.queue.lock().unwrap().pop_front())
            .unwrap_or_else(|| self.default.clone());

        match reply {
            Ok(content) => Ok(LlmResponse {
                content,
                model: request.model.clone(),
                usage: LlmUsage::new(10, 10),
                done: true,
            }),
            Err(message) => Err(AppError::Llm(message)),
        }
    }
}

/// Index fake returning fixed results per exact query string.
#[derive(Default)]
pub struct ScriptedIndex {
    results: HashMap<String, Vec<Document>>,
    failures: HashSet<String>,
    fallback: Vec<Document>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(mut self, query: &str, documents: Vec<Document>) -> Self {
        self.results.insert(query.to_string(), documents);
        self
    }

    pub fn with_failure(mut self, query: &str) -> Self {
        self.failures.insert(query.to_string());
        self
    }

    /// Results for any query not scripted explicitly.
    pub fn with_fallback(mut self, documents: Vec<Document>) -> Self {
        self.fallback = documents;
        self
    }

    pub fn calls_for(&self, query: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|q| q.as_str() == query)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl VectorIndex for ScriptedIndex {
    async fn search(&self, query: &str, k: usize, _mode: SearchMode) -> AppResult<Vec<Document>> {
        self.calls.lock().unwrap().push(query.to_string());

        if self.failures.contains(query) {
            return Err(AppError::Retrieval(format!("index unavailable for '{}'", query)));
        }

        let docs = self.results.get(query).unwrap_or(&self.fallback);
        Ok(docs.iter().take(k).cloned().collect())
    }
}
