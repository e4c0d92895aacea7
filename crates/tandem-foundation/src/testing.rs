//! Test doubles for the kernel trait seams.
//!
//! Used by this crate's own tests and by downstream integration tests to
//! drive the pipeline without any network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use tandem_kernel::{EmbeddingProvider, Error, ModelBackend, Result};

enum FakeOutcome {
    Reply(String),
    Fail(String),
}

/// Scripted [`ModelBackend`]: replies with a fixed text or a fixed error,
/// records every prompt it receives, and optionally sleeps to simulate
/// upstream latency.
pub struct FakeModel {
    name: String,
    outcome: FakeOutcome,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeModel {
    /// A model that always replies with `reply`.
    pub fn replying(name: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: FakeOutcome::Reply(reply.into()),
            delay: None,
            prompts: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// A model that always fails with `message`.
    pub fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            outcome: FakeOutcome::Fail(message.into()),
            ..Self::replying(name, "")
        }
    }

    /// Sleep for `delay` inside every call, to exercise concurrency limits.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every prompt received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// The highest number of overlapping calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, prompt: &str) {
        self.prompts.lock().unwrap().push(prompt.to_string());
    }
}

#[async_trait]
impl ModelBackend for FakeModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &str, _temperature: f32, _max_tokens: u32) -> Result<String> {
        self.record(prompt);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match &self.outcome {
            FakeOutcome::Reply(text) => Ok(text.clone()),
            FakeOutcome::Fail(message) => Err(Error::upstream(&self.name, message)),
        }
    }

    async fn complete_stream(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) -> Result<()> + Send),
    ) -> Result<()> {
        // Stream the scripted reply word by word.
        let text = self.complete(prompt, temperature, max_tokens).await?;
        for word in text.split_whitespace() {
            on_chunk(word)?;
            on_chunk(" ")?;
        }
        Ok(())
    }
}

/// Table-driven [`EmbeddingProvider`]: returns the configured vector for a
/// text, and errors for anything unseen.
#[derive(Default)]
pub struct FakeEmbedder {
    vectors: HashMap<String, Vec<f32>>,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.into(), vector);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(Error::BadRequest(
                "embedding text must not be empty".to_string(),
            ));
        }
        self.vectors.get(text).cloned().ok_or_else(|| {
            Error::upstream("fake-embedder", format!("no embedding scripted for '{text}'"))
        })
    }
}
