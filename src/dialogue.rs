//! Drives one chat session: user text in, knowledge-base answers out.
//!
//! A submission is two steps with the typing pause in between. `begin`
//! records the user message and marks the session as waiting; `complete`
//! looks the input up and appends the answer. Only one submission can be in
//! flight per session, so transcripts never interleave.

use chrono::{FixedOffset, Offset, Timelike, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::conversation::{ConversationState, MessageId};
use crate::error::DialogueError;
use crate::knowledge::KnowledgeBase;
use crate::selection::{ResponseSelector, SeededSelector};
use crate::timing::{Clock, ResponseDelay, SystemClock, TypingDelay};
use crate::topic::{RenderContext, Reply, Topic};

pub const DEFAULT_MIN_LATENCY: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_LATENCY: Duration = Duration::from_millis(2000);

struct Session {
    state: ConversationState,
    open: bool,
    // Bumped on close, so replies started before it are dropped.
    generation: u64,
    selector: Box<dyn ResponseSelector>,
}

/// A submission whose answer has not been appended yet.
#[derive(Debug)]
#[must_use = "a pending reply leaves the session waiting until it is completed"]
pub struct PendingReply {
    generation: u64,
    input: String,
    user_message: MessageId,
}

impl PendingReply {
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn user_message(&self) -> MessageId {
        self.user_message
    }
}

pub struct DialogueController {
    knowledge: Arc<KnowledgeBase>,
    delay: Arc<dyn ResponseDelay>,
    clock: Arc<dyn Clock>,
    utc_offset: FixedOffset,
    display_name: Option<String>,
    session: Mutex<Session>,
    updates: watch::Sender<ConversationState>,
}

impl DialogueController {
    /// A controller with production pacing: real clock, 1–2 s typing delay,
    /// entropy-seeded variant selection. The session starts closed.
    pub fn new(knowledge: Arc<KnowledgeBase>) -> Self {
        let (updates, _) = watch::channel(ConversationState::new());
        Self {
            knowledge,
            delay: Arc::new(TypingDelay::new(DEFAULT_MIN_LATENCY, DEFAULT_MAX_LATENCY, None)),
            clock: Arc::new(SystemClock),
            utc_offset: Utc.fix(),
            display_name: None,
            session: Mutex::new(Session {
                state: ConversationState::new(),
                open: false,
                generation: 0,
                selector: Box::new(SeededSelector::from_entropy()),
            }),
            updates,
        }
    }

    pub fn with_delay(mut self, delay: Arc<dyn ResponseDelay>) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_selector(self, selector: Box<dyn ResponseSelector>) -> Self {
        self.session.lock().selector = selector;
        self
    }

    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    pub fn with_display_name(mut self, name: Option<String>) -> Self {
        self.display_name = name.filter(|n| !n.trim().is_empty());
        self
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge
    }

    /// Receives a fresh snapshot after every change.
    pub fn subscribe(&self) -> watch::Receiver<ConversationState> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> ConversationState {
        self.session.lock().state.clone()
    }

    pub fn is_open(&self) -> bool {
        self.session.lock().open
    }

    /// Opens the widget. An empty transcript is seeded with the greeting.
    pub fn open(&self) {
        let mut session = self.session.lock();
        session.open = true;
        if session.state.is_empty() {
            let reply = self.render(self.knowledge.greeting(), "", session.selector.as_mut());
            let at = self.clock.now();
            session.state.append_bot(reply, at);
            log::info!("Opened chat session with '{}' knowledge base", self.knowledge.name());
        }
        self.publish(&session.state);
    }

    /// Closes the widget and throws its transcript away. A reply still on
    /// its way is discarded when it arrives.
    pub fn close(&self) {
        let mut session = self.session.lock();
        if session.state.is_awaiting_response() {
            log::debug!("Closing chat session with a reply still pending");
        }
        session.open = false;
        session.generation += 1;
        session.state.reset();
        self.publish(&session.state);
    }

    pub fn set_draft(&self, text: &str) -> Result<(), DialogueError> {
        let mut session = self.session.lock();
        if !session.open {
            return Err(DialogueError::SessionClosed);
        }
        session.state.set_pending_input(text);
        self.publish(&session.state);
        Ok(())
    }

    pub fn toggle_minimized(&self) -> Result<bool, DialogueError> {
        let mut session = self.session.lock();
        if !session.open {
            return Err(DialogueError::SessionClosed);
        }
        let minimized = session.state.toggle_minimized();
        self.publish(&session.state);
        Ok(minimized)
    }

    /// Records the user's message and marks the session as waiting.
    pub fn begin(&self, raw_input: &str) -> Result<PendingReply, DialogueError> {
        let input = raw_input.trim();
        let mut session = self.session.lock();
        if !session.open {
            return Err(DialogueError::SessionClosed);
        }
        if input.is_empty() {
            return Err(DialogueError::EmptyInput);
        }
        if session.state.is_awaiting_response() {
            log::warn!("Rejected submission while a reply is pending");
            return Err(DialogueError::ConcurrentSubmission);
        }

        let at = self.clock.now();
        let user_message = session.state.append_user(input, at);
        session.state.set_pending_input("");
        session.state.set_awaiting_response(true);
        self.publish(&session.state);

        Ok(PendingReply {
            generation: session.generation,
            input: input.to_string(),
            user_message,
        })
    }

    /// Appends the answer for `pending`. Returns `None` when the session was
    /// closed in the meantime.
    pub fn complete(&self, pending: PendingReply) -> Option<MessageId> {
        let mut session = self.session.lock();
        if !session.open || session.generation != pending.generation {
            log::debug!("Dropped reply for '{}': session was closed", pending.input);
            return None;
        }

        let topic = self.knowledge.lookup(&pending.input);
        log::debug!("Input '{}' answered by topic '{}'", pending.input, topic.id);
        let reply = self.render(topic, &pending.input, session.selector.as_mut());
        let at = self.clock.now();
        let id = session.state.append_bot(reply, at);
        session.state.set_awaiting_response(false);
        self.publish(&session.state);
        Some(id)
    }

    /// `begin`, the typing pause, then `complete`.
    ///
    /// If this future is dropped during the pause the session stays in the
    /// waiting state; callers that may be cancelled should spawn it.
    pub async fn submit(&self, raw_input: &str) -> Result<(), DialogueError> {
        let pending = self.begin(raw_input)?;
        self.delay.pause().await;
        self.complete(pending);
        Ok(())
    }

    /// Same as submitting the label without its leading glyphs.
    pub async fn select_suggestion(&self, label: &str) -> Result<(), DialogueError> {
        let text = self.knowledge.strip_decoration(label).to_string();
        self.submit(&text).await
    }

    fn render(&self, topic: &Topic, input: &str, selector: &mut dyn ResponseSelector) -> Reply {
        let hour = self.clock.now().with_timezone(&self.utc_offset).hour();
        let ctx = RenderContext {
            name: self
                .display_name
                .as_deref()
                .unwrap_or_else(|| self.knowledge.default_display_name()),
            input,
            salutation: self.knowledge.salutations().for_hour(hour),
        };
        topic.render(&ctx, selector)
    }

    fn publish(&self, state: &ConversationState) {
        self.updates.send_replace(state.clone());
    }
}
