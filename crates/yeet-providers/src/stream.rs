//! Bookkeeping for one streaming generation.
//!
//! A session moves `Opening -> Streaming -> Closed`, or to `Aborted` from
//! either of the first two. Tokens are forwarded to the caller only while
//! the session is live, and the accumulated text is what gets returned.

use std::fmt;

use tracing::debug;

use yeet_core::ProviderError;

use crate::pricing::Usage;
use crate::traits::{Generation, TokenSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Headers received, no text yet
    Opening,
    /// At least one text fragment delivered
    Streaming,
    /// Body ended normally
    Closed,
    /// Read, parse or protocol failure
    Aborted,
}

pub struct StreamSession<'a> {
    provider: String,
    state: StreamState,
    events: usize,
    text: String,
    usage: Usage,
    on_token: TokenSink<'a>,
}

impl<'a> StreamSession<'a> {
    pub fn new(provider: &str, model: &str, on_token: TokenSink<'a>) -> Self {
        Self {
            provider: provider.to_string(),
            state: StreamState::Opening,
            events: 0,
            text: String::new(),
            usage: Usage::new(model),
            on_token,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Record that a framed event or line arrived.
    pub fn record_event(&mut self) {
        self.events += 1;
    }

    /// Append a fragment and hand it to the caller.
    pub fn push_token(&mut self, fragment: &str) {
        if fragment.is_empty() || self.is_finished() {
            return;
        }
        self.state = StreamState::Streaming;
        self.text.push_str(fragment);
        (self.on_token)(fragment);
    }

    pub fn set_input_tokens(&mut self, tokens: u64) {
        self.usage.input_tokens = tokens;
    }

    pub fn set_output_tokens(&mut self, tokens: u64) {
        self.usage.output_tokens = tokens;
    }

    /// The body could not be read. Before any event this is a transport
    /// failure; afterwards the stream broke off mid-answer.
    pub fn read_failed(&mut self, message: impl fmt::Display) -> ProviderError {
        let message = message.to_string();
        let err = if self.events == 0 {
            ProviderError::transport(self.provider.clone(), message)
        } else {
            ProviderError::StreamRead {
                provider: self.provider.clone(),
                message,
            }
        };
        self.abort(err)
    }

    /// Stop the session with `err`.
    pub fn abort(&mut self, err: ProviderError) -> ProviderError {
        debug!(
            provider = %self.provider,
            events = self.events,
            error = %err,
            "stream aborted"
        );
        self.state = StreamState::Aborted;
        err
    }

    /// Close the session after the body ended.
    pub fn finish(mut self) -> Result<Generation, ProviderError> {
        self.state = StreamState::Closed;
        let text = self.text.trim();
        if text.is_empty() {
            return Err(ProviderError::EmptyResponse {
                provider: self.provider,
            });
        }
        debug!(
            provider = %self.provider,
            events = self.events,
            "stream closed"
        );
        Ok(Generation {
            text: text.to_string(),
            usage: self.usage,
        })
    }

    fn is_finished(&self) -> bool {
        matches!(self.state, StreamState::Closed | StreamState::Aborted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_forwarded_in_order() {
        let mut seen = Vec::new();
        let mut sink = |t: &str| seen.push(t.to_string());
        let mut session = StreamSession::new("anthropic", "claude", &mut sink);
        assert_eq!(session.state(), StreamState::Opening);
        session.record_event();
        session.push_token("feat: ");
        session.push_token("");
        session.push_token("add x\n");
        assert_eq!(session.state(), StreamState::Streaming);
        session.set_input_tokens(10);
        session.set_output_tokens(4);
        let generation = session.finish().unwrap();
        assert_eq!(generation.text, "feat: add x");
        assert_eq!(generation.usage.input_tokens, 10);
        assert_eq!(generation.usage.model, "claude");
        assert_eq!(seen, vec!["feat: ", "add x\n"]);
    }

    #[test]
    fn test_read_failure_before_events_is_transport() {
        let mut sink = |_: &str| {};
        let mut session = StreamSession::new("groq", "m", &mut sink);
        let err = session.read_failed("reset by peer");
        assert!(matches!(err, ProviderError::Transport { .. }));
        assert_eq!(session.state(), StreamState::Aborted);
    }

    #[test]
    fn test_read_failure_after_events_is_stream_read() {
        let mut sink = |_: &str| {};
        let mut session = StreamSession::new("groq", "m", &mut sink);
        session.record_event();
        session.push_token("partial");
        let err = session.read_failed("reset by peer");
        assert!(matches!(err, ProviderError::StreamRead { .. }));
    }

    #[test]
    fn test_no_tokens_after_abort() {
        let mut count = 0;
        let mut sink = |_: &str| count += 1;
        let mut session = StreamSession::new("openai", "m", &mut sink);
        session.push_token("a");
        let _ = session.abort(ProviderError::parse("openai", "bad json"));
        session.push_token("b");
        drop(session);
        assert_eq!(count, 1);
    }

    #[test]
    fn test_blank_stream_is_empty_response() {
        let mut sink = |_: &str| {};
        let mut session = StreamSession::new("ollama", "llama3", &mut sink);
        session.record_event();
        session.push_token("  \n");
        assert!(matches!(
            session.finish(),
            Err(ProviderError::EmptyResponse { .. })
        ));
    }
}
