use std::cell::RefCell;

use shared_types::ChatMessage;

use crate::api::ApiError;
use crate::config::DEFAULT_CHAT_FALLBACK;
use crate::sync::{CancelToken, FailureSource, ObservabilitySink, TrafficBackend};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChatSessionState {
    #[default]
    Idle,
    AwaitingResponse,
}

/// Ticket for the exchange opened by [`ChatSession::begin_submit`].
///
/// The provisional USER entry is already in the transcript; resolving the
/// ticket appends the ASSISTANT side.
#[derive(Debug, PartialEq, Eq)]
pub struct PendingExchange {
    exchange: u64,
    pub message: String,
}

/// AI assistant conversation with at most one request in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSession {
    transcript: Vec<ChatMessage>,
    input: String,
    state: ChatSessionState,
    exchanges: u64,
    fallback: String,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new(DEFAULT_CHAT_FALLBACK)
    }
}

impl ChatSession {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            transcript: Vec::new(),
            input: String::new(),
            state: ChatSessionState::Idle,
            exchanges: 0,
            fallback: fallback.into(),
        }
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn state(&self) -> ChatSessionState {
        self.state
    }

    pub fn is_typing(&self) -> bool {
        self.state == ChatSessionState::AwaitingResponse
    }

    pub fn can_submit(&self) -> bool {
        self.state == ChatSessionState::Idle && !self.input.trim().is_empty()
    }

    /// Echoes the input as a USER message and opens an exchange. Returns
    /// `None` (and changes nothing) for blank input or while awaiting a reply.
    pub fn begin_submit(&mut self) -> Option<PendingExchange> {
        if !self.can_submit() {
            return None;
        }

        let message = std::mem::take(&mut self.input);
        self.transcript.push(ChatMessage::user(message.clone()));
        self.state = ChatSessionState::AwaitingResponse;
        self.exchanges += 1;

        Some(PendingExchange {
            exchange: self.exchanges,
            message,
        })
    }

    /// Appends exactly one ASSISTANT message for the exchange and returns to
    /// idle. Tickets for any other exchange are ignored.
    pub fn resolve(&mut self, pending: PendingExchange, outcome: Result<String, ApiError>) -> bool {
        if self.state != ChatSessionState::AwaitingResponse || pending.exchange != self.exchanges {
            return false;
        }

        let content = match outcome {
            Ok(reply) => reply,
            Err(err) => self.fallback_for(&err),
        };
        self.transcript.push(ChatMessage::assistant(content));
        self.state = ChatSessionState::Idle;
        true
    }

    /// Server-supplied error text if there is one, else the fixed fallback.
    pub fn fallback_for(&self, err: &ApiError) -> String {
        err.server_message()
            .map(str::to_string)
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Sends the exchange's message and records the outcome in `session`.
///
/// No borrow of `session` is held across the request. Failures never reach
/// the caller; they become the assistant's reply.
pub async fn complete_exchange<B: TrafficBackend>(
    session: &RefCell<ChatSession>,
    pending: PendingExchange,
    backend: &B,
    sink: &dyn ObservabilitySink,
    cancel: &CancelToken,
) -> bool {
    let outcome = backend.send_chat(&pending.message).await;
    if cancel.is_cancelled() {
        return false;
    }
    if let Err(err) = &outcome {
        sink.record_failure(&FailureSource::Chat, err);
    }
    session.borrow_mut().resolve(pending, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::{FakeBackend, RecordingSink};
    use futures::executor::{block_on, LocalPool};
    use futures::task::LocalSpawnExt;
    use shared_types::ChatRole;
    use std::rc::Rc;

    fn roles(session: &ChatSession) -> Vec<ChatRole> {
        session.transcript().iter().map(|m| m.role).collect()
    }

    #[test]
    fn blank_input_is_rejected() {
        let mut session = ChatSession::default();
        for blank in ["", "   ", "\n\t "] {
            session.set_input(blank);
            assert!(session.begin_submit().is_none());
        }
        assert!(session.transcript().is_empty());
        assert_eq!(session.state(), ChatSessionState::Idle);
    }

    #[test]
    fn submit_echoes_raw_text_and_clears_input() {
        let mut session = ChatSession::default();
        session.set_input("  Why is North congested? ");

        let pending = session.begin_submit().unwrap();

        assert_eq!(pending.message, "  Why is North congested? ");
        assert_eq!(session.input(), "");
        assert!(session.is_typing());
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.transcript()[0].role, ChatRole::User);
        assert_eq!(session.transcript()[0].content, "  Why is North congested? ");
    }

    #[test]
    fn second_submit_while_awaiting_is_noop() {
        let mut session = ChatSession::default();
        session.set_input("first");
        let _pending = session.begin_submit().unwrap();

        session.set_input("second");
        assert!(!session.can_submit());
        assert!(session.begin_submit().is_none());
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.input(), "second");
    }

    #[test]
    fn resolve_success_appends_reply() {
        let mut session = ChatSession::default();
        session.set_input("hello");
        let pending = session.begin_submit().unwrap();

        assert!(session.resolve(pending, Ok("Hi there".to_string())));
        assert_eq!(roles(&session), vec![ChatRole::User, ChatRole::Assistant]);
        assert_eq!(session.transcript()[1].content, "Hi there");
        assert_eq!(session.state(), ChatSessionState::Idle);
    }

    #[test]
    fn resolve_failure_prefers_server_message() {
        let mut session = ChatSession::default();
        session.set_input("hello");
        let pending = session.begin_submit().unwrap();

        session.resolve(
            pending,
            Err(ApiError::Status {
                status: 429,
                message: Some("rate limited".to_string()),
            }),
        );
        assert_eq!(session.transcript()[1].content, "rate limited");
    }

    #[test]
    fn resolve_failure_without_body_uses_default() {
        let mut session = ChatSession::default();
        session.set_input("hello");
        let pending = session.begin_submit().unwrap();

        session.resolve(
            pending,
            Err(ApiError::Status {
                status: 500,
                message: None,
            }),
        );
        assert_eq!(session.transcript()[1].content, DEFAULT_CHAT_FALLBACK);
        assert_eq!(session.state(), ChatSessionState::Idle);
    }

    #[test]
    fn stale_ticket_is_ignored() {
        let mut session = ChatSession::default();
        session.set_input("one");
        let first = session.begin_submit().unwrap();
        let stale = PendingExchange {
            exchange: first.exchange,
            message: first.message.clone(),
        };
        session.resolve(first, Ok("reply".to_string()));

        assert!(!session.resolve(stale, Ok("again".to_string())));
        assert_eq!(session.transcript().len(), 2);
    }

    #[test]
    fn transcript_alternates_over_many_exchanges() {
        let session = RefCell::new(ChatSession::default());
        let backend = FakeBackend::default();
        backend.push_chat_reply(Ok("a".to_string()));
        backend.push_chat_reply(Err(ApiError::Transport("offline".to_string())));
        backend.push_chat_reply(Ok("c".to_string()));
        let sink = RecordingSink::default();
        let cancel = CancelToken::new();

        for text in ["one", "two", "three"] {
            session.borrow_mut().set_input(text);
            let pending = session.borrow_mut().begin_submit().unwrap();
            assert!(block_on(complete_exchange(&session, pending, &backend, &sink, &cancel)));
        }

        let session = session.borrow();
        assert_eq!(
            roles(&session),
            vec![
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::User,
                ChatRole::Assistant,
            ]
        );
        assert_eq!(session.transcript()[3].content, DEFAULT_CHAT_FALLBACK);
        assert_eq!(sink.failures.borrow().len(), 1);
        assert_eq!(sink.failures.borrow()[0].0, FailureSource::Chat);
    }

    #[test]
    fn only_one_request_in_flight() {
        let session = Rc::new(RefCell::new(ChatSession::default()));
        let backend = Rc::new(FakeBackend::default());
        let release = backend.hold_next_chat();
        let sink = Rc::new(RecordingSink::default());
        let cancel = CancelToken::new();

        session.borrow_mut().set_input("hello");
        let pending = session.borrow_mut().begin_submit().unwrap();

        let mut pool = LocalPool::new();
        {
            let session = session.clone();
            let backend = backend.clone();
            let sink = sink.clone();
            let cancel = cancel.clone();
            pool.spawner()
                .spawn_local(async move {
                    complete_exchange(&session, pending, backend.as_ref(), sink.as_ref(), &cancel)
                        .await;
                })
                .unwrap();
        }
        pool.run_until_stalled();

        session.borrow_mut().set_input("again");
        assert!(session.borrow_mut().begin_submit().is_none());
        assert_eq!(backend.chat_calls.borrow().len(), 1);
        assert_eq!(session.borrow().transcript().len(), 1);

        release.send(Ok("world".to_string())).unwrap();
        pool.run_until_stalled();

        let session = session.borrow();
        assert_eq!(session.transcript().len(), 2);
        assert_eq!(session.transcript()[1].content, "world");
        assert!(session.can_submit());
    }

    #[test]
    fn reply_after_teardown_is_dropped() {
        let session = RefCell::new(ChatSession::default());
        let backend = FakeBackend::default();
        let sink = RecordingSink::default();
        let cancel = CancelToken::new();

        session.borrow_mut().set_input("hello");
        let pending = session.borrow_mut().begin_submit().unwrap();
        cancel.cancel();

        assert!(!block_on(complete_exchange(&session, pending, &backend, &sink, &cancel)));
        assert_eq!(session.borrow().transcript().len(), 1);
    }
}
