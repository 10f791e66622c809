//! Per-match chat room.
//!
//! A [`ChatSession`] starts unjoined. [`join`](ChatSession::join) announces
//! the user to the room; from then on inbound chat traffic for the match is
//! collected, keystrokes produce typing notifications, and drafts can be
//! sent. Sent lines are not appended locally: the server echoes them back
//! as `chat_message` like any other line.
//!
//! # Typing notifications
//!
//! Every call to [`on_input`](ChatSession::on_input) emits `typing_start`
//! and restarts an idle timer. When the timer runs out without another
//! keystroke a single `typing_stop` is emitted. Sending a message stops
//! typing immediately.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::config::ChatConfig;
use crate::connection::{ConnectionEvent, PushHandle, PushSink};
use crate::error::{LiveMatchError, Result};
use crate::identity::IdentityStore;
use crate::model::{ChatMessage, MatchId};
use crate::protocol::{
    ChatPresence, ClientMessage, OutgoingChatMessage, ServerMessage, TypingIndicator, TypingNotice,
};

/// Idle time after the last keystroke before `typing_stop` is sent.
pub const DEFAULT_TYPING_IDLE: Duration = Duration::from_millis(2000);

/// Membership state of a chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatState {
    Unjoined,
    Joined { username: String, user_id: String },
}

/// What a single push event changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatChange {
    /// A new line, by message id.
    Message(String),
    /// The set of typing users changed.
    Typing,
    Ignored,
    Connection(bool),
    Closed,
}

/// Chat state for one match room.
///
/// Typing indicators are timed by a spawned task, so a session must be
/// driven from within a tokio runtime. Dropping the session leaves the room.
pub struct ChatSession<S: PushSink, I: IdentityStore> {
    sink: S,
    identity: Arc<I>,
    events: broadcast::Receiver<ConnectionEvent>,
    match_id: MatchId,
    state: ChatState,
    draft: String,
    messages: Vec<ChatMessage>,
    seen_messages: HashSet<String>,
    typing: BTreeSet<String>,
    typing_idle: Duration,
    typing_timer: Option<JoinHandle<()>>,
}

impl<I: IdentityStore> ChatSession<PushHandle, I> {
    /// A session on the shared push connection.
    pub fn open(
        push: &PushHandle,
        identity: Arc<I>,
        match_id: impl Into<MatchId>,
        config: &ChatConfig,
    ) -> Self {
        Self::new(
            push.clone(),
            push.subscribe(),
            identity,
            match_id,
            config.typing_idle,
        )
    }
}

impl<S: PushSink, I: IdentityStore> ChatSession<S, I> {
    pub fn new(
        sink: S,
        events: broadcast::Receiver<ConnectionEvent>,
        identity: Arc<I>,
        match_id: impl Into<MatchId>,
        typing_idle: Duration,
    ) -> Self {
        Self {
            sink,
            identity,
            events,
            match_id: match_id.into(),
            state: ChatState::Unjoined,
            draft: String::new(),
            messages: Vec::new(),
            seen_messages: HashSet::new(),
            typing: BTreeSet::new(),
            typing_idle,
            typing_timer: None,
        }
    }

    pub fn match_id(&self) -> &str {
        &self.match_id
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn is_joined(&self) -> bool {
        matches!(self.state, ChatState::Joined { .. })
    }

    /// The name remembered from the last join, for pre-filling the form.
    pub fn remembered_username(&self) -> Option<String> {
        self.identity.username()
    }

    /// The unsent input.
    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Lines received since joining, in arrival order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Users currently typing, sorted by name.
    pub fn typing_users(&self) -> &BTreeSet<String> {
        &self.typing
    }

    /// `"ann, bob is typing..."`, or `None` when nobody is.
    pub fn typing_summary(&self) -> Option<String> {
        if self.typing.is_empty() {
            return None;
        }
        let names: Vec<&str> = self.typing.iter().map(String::as_str).collect();
        Some(format!("{} is typing...", names.join(", ")))
    }

    /// Whether [`send`](Self::send) would currently be accepted.
    pub fn can_send(&self) -> bool {
        self.is_joined() && self.sink.is_connected() && !self.draft.trim().is_empty()
    }

    /// Enter the room as `username`.
    ///
    /// The trimmed name is remembered and the stable user id is fetched (or
    /// created) from the identity store. Joining an already joined session
    /// does nothing.
    pub fn join(&mut self, username: &str) -> Result<()> {
        if self.is_joined() {
            return Ok(());
        }
        let username = username.trim();
        if username.is_empty() {
            return Err(LiveMatchError::EmptyUsername);
        }

        self.identity.save_username(username)?;
        let user_id = self.identity.user_id()?;

        self.sink.emit(ClientMessage::JoinChat(ChatPresence {
            match_id: self.match_id.clone(),
            username: username.to_string(),
            user_id: user_id.clone(),
        }))?;

        debug!(match_id = %self.match_id, username, "joined chat");
        self.state = ChatState::Joined {
            username: username.to_string(),
            user_id,
        };
        Ok(())
    }

    /// Record a keystroke.
    ///
    /// Arms the idle timer with `tokio::spawn`, so this must run inside a
    /// tokio runtime.
    pub fn on_input(&mut self, text: impl Into<String>) {
        self.draft = text.into();

        let Some(notice) = self.typing_notice() else {
            return;
        };
        if let Err(e) = self.sink.emit(ClientMessage::TypingStart(notice.clone())) {
            trace!("typing_start not sent: {e}");
        }
        self.arm_typing_timer(notice);
    }

    fn arm_typing_timer(&mut self, notice: TypingNotice) {
        self.cancel_typing_timer();
        let sink = self.sink.clone();
        let idle = self.typing_idle;
        self.typing_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(idle).await;
            if let Err(e) = sink.emit(ClientMessage::TypingStop(notice)) {
                trace!("typing_stop not sent: {e}");
            }
        }));
    }

    /// Abort the idle timer. True if its `typing_stop` had not gone out yet.
    fn cancel_typing_timer(&mut self) -> bool {
        let Some(timer) = self.typing_timer.take() else {
            return false;
        };
        let pending = !timer.is_finished();
        timer.abort();
        pending
    }

    fn typing_notice(&self) -> Option<TypingNotice> {
        match &self.state {
            ChatState::Joined { username, .. } => Some(TypingNotice {
                match_id: self.match_id.clone(),
                username: username.clone(),
            }),
            ChatState::Unjoined => None,
        }
    }

    /// Send the current draft.
    ///
    /// On success the draft is cleared and typing stops. The line shows up
    /// in [`messages`](Self::messages) once the server echoes it.
    pub fn send(&mut self) -> Result<()> {
        let ChatState::Joined { username, user_id } = &self.state else {
            return Err(LiveMatchError::NotJoined);
        };
        if self.draft.trim().is_empty() {
            return Err(LiveMatchError::EmptyMessage);
        }
        if !self.sink.is_connected() {
            return Err(LiveMatchError::NotConnected);
        }

        self.sink.emit(ClientMessage::SendMessage(OutgoingChatMessage {
            match_id: self.match_id.clone(),
            message: self.draft.clone(),
            username: username.clone(),
            user_id: user_id.clone(),
        }))?;

        self.draft.clear();
        self.cancel_typing_timer();
        if let Some(notice) = self.typing_notice() {
            if let Err(e) = self.sink.emit(ClientMessage::TypingStop(notice)) {
                trace!("typing_stop not sent: {e}");
            }
        }
        Ok(())
    }

    /// Replace the draft with `text` and send it.
    pub fn send_text(&mut self, text: impl Into<String>) -> Result<()> {
        self.draft = text.into();
        self.send()
    }

    /// Fold one push message into the session. Ignored while unjoined.
    pub fn apply(&mut self, message: &ServerMessage) -> ChatChange {
        if !self.is_joined() {
            return ChatChange::Ignored;
        }
        match message {
            ServerMessage::ChatMessage(line) => {
                if line.match_id != self.match_id {
                    return ChatChange::Ignored;
                }
                if !self.seen_messages.insert(line.id.clone()) {
                    trace!(message_id = %line.id, "duplicate chat message dropped");
                    return ChatChange::Ignored;
                }
                self.messages.push(line.clone());
                ChatChange::Message(line.id.clone())
            }
            ServerMessage::TypingIndicator(TypingIndicator {
                username,
                is_typing,
            }) => {
                let changed = if *is_typing {
                    self.typing.insert(username.clone())
                } else {
                    self.typing.remove(username)
                };
                if changed {
                    ChatChange::Typing
                } else {
                    ChatChange::Ignored
                }
            }
            ServerMessage::UserJoined(joined) => {
                debug!(match_id = %self.match_id, username = %joined.username, "user joined chat");
                ChatChange::Ignored
            }
            _ => ChatChange::Ignored,
        }
    }

    /// Apply one connection event. A joined session re-announces itself
    /// after a reconnect.
    pub fn handle(&mut self, event: ConnectionEvent) -> ChatChange {
        match event {
            ConnectionEvent::Message(message) => self.apply(&message),
            ConnectionEvent::Connected => {
                if let ChatState::Joined { username, user_id } = &self.state {
                    let rejoin = ClientMessage::JoinChat(ChatPresence {
                        match_id: self.match_id.clone(),
                        username: username.clone(),
                        user_id: user_id.clone(),
                    });
                    if let Err(e) = self.sink.emit(rejoin) {
                        warn!(match_id = %self.match_id, "chat rejoin failed: {e}");
                    }
                }
                ChatChange::Connection(true)
            }
            ConnectionEvent::Disconnected { .. } => ChatChange::Connection(false),
            ConnectionEvent::Reconnecting { .. } => ChatChange::Ignored,
            ConnectionEvent::Closed => ChatChange::Closed,
        }
    }

    /// Wait for the next push event and apply it.
    pub async fn next_change(&mut self) -> ChatChange {
        loop {
            match self.events.recv().await {
                Ok(event) => return self.handle(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "chat fell behind the push channel");
                }
                Err(broadcast::error::RecvError::Closed) => return ChatChange::Closed,
            }
        }
    }

    /// Leave the room. The session can be joined again afterwards.
    ///
    /// A pending typing indicator is withdrawn first, and the local log is
    /// dropped so a later join starts from the server's view of the room.
    pub fn leave(&mut self) {
        if self.cancel_typing_timer() {
            if let Some(notice) = self.typing_notice() {
                if let Err(e) = self.sink.emit(ClientMessage::TypingStop(notice)) {
                    trace!("typing_stop not sent: {e}");
                }
            }
        }
        let ChatState::Joined { username, user_id } =
            std::mem::replace(&mut self.state, ChatState::Unjoined)
        else {
            return;
        };
        self.typing.clear();
        self.messages.clear();
        self.seen_messages.clear();
        if let Err(e) = self.sink.emit(ClientMessage::LeaveChat(ChatPresence {
            match_id: self.match_id.clone(),
            username,
            user_id,
        })) {
            debug!(match_id = %self.match_id, "leave_chat not delivered: {e}");
        }
    }
}

impl<S: PushSink, I: IdentityStore> Drop for ChatSession<S, I> {
    fn drop(&mut self) {
        self.leave();
    }
}

impl<S: PushSink, I: IdentityStore> std::fmt::Debug for ChatSession<S, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("match_id", &self.match_id)
            .field("state", &self.state)
            .field("messages", &self.messages.len())
            .field("typing", &self.typing)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::identity::MemoryIdentityStore;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Recorder {
        sent: Arc<Mutex<Vec<ClientMessage>>>,
    }

    impl PushSink for Recorder {
        fn emit(&self, message: ClientMessage) -> Result<()> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    fn session() -> (ChatSession<Recorder, MemoryIdentityStore>, Recorder) {
        let sink = Recorder::default();
        let (_tx, rx) = broadcast::channel(8);
        let session = ChatSession::new(
            sink.clone(),
            rx,
            Arc::new(MemoryIdentityStore::new()),
            "7",
            DEFAULT_TYPING_IDLE,
        );
        (session, sink)
    }

    fn typing(name: &str, is_typing: bool) -> ServerMessage {
        ServerMessage::TypingIndicator(TypingIndicator {
            username: name.into(),
            is_typing,
        })
    }

    #[test]
    fn blank_name_is_rejected() {
        let (mut chat, sink) = session();
        assert!(matches!(chat.join("   "), Err(LiveMatchError::EmptyUsername)));
        assert!(!chat.is_joined());
        assert!(sink.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn second_join_is_a_no_op() {
        let (mut chat, sink) = session();
        chat.join(" alice ").unwrap();
        chat.join("bob").unwrap();

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            ClientMessage::JoinChat(p) => {
                assert_eq!(p.username, "alice");
                assert_eq!(p.match_id, "7");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn send_requires_join_and_text() {
        let (mut chat, _sink) = session();
        assert!(matches!(chat.send_text("hi"), Err(LiveMatchError::NotJoined)));
        chat.join("alice").unwrap();
        assert!(matches!(chat.send_text("  "), Err(LiveMatchError::EmptyMessage)));
    }

    #[test]
    fn typing_set_is_idempotent() {
        let (mut chat, _sink) = session();
        chat.join("alice").unwrap();

        assert_eq!(chat.apply(&typing("bob", true)), ChatChange::Typing);
        assert_eq!(chat.apply(&typing("bob", true)), ChatChange::Ignored);
        assert_eq!(chat.apply(&typing("ann", true)), ChatChange::Typing);
        assert_eq!(chat.typing_summary().as_deref(), Some("ann, bob is typing..."));

        assert_eq!(chat.apply(&typing("zed", false)), ChatChange::Ignored);
        assert_eq!(chat.apply(&typing("bob", false)), ChatChange::Typing);
        assert_eq!(chat.typing_users().len(), 1);
    }

    #[test]
    fn inbound_events_are_ignored_until_joined() {
        let (mut chat, _sink) = session();
        assert_eq!(chat.apply(&typing("bob", true)), ChatChange::Ignored);
        assert!(chat.typing_users().is_empty());
    }

    #[test]
    fn drop_leaves_joined_room() {
        let (mut chat, sink) = session();
        chat.join("alice").unwrap();
        drop(chat);

        let sent = sink.sent.lock().unwrap();
        assert!(matches!(sent.last(), Some(ClientMessage::LeaveChat(p)) if p.username == "alice"));
    }

    #[test]
    fn drop_unjoined_emits_nothing() {
        let (chat, sink) = session();
        drop(chat);
        assert!(sink.sent.lock().unwrap().is_empty());
    }
}
