use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use souq_store::ChatStore;
use souq_types::events::SessionEvent;
use souq_types::models::{Message, MessageDraft, MessageKind, UserContext};

/// Lifecycle of an open chat view. `Failed` is recoverable: calling
/// `load_history` again retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Ready,
    Failed(String),
}

struct Recording {
    elapsed: Arc<AtomicU32>,
    ticker: JoinHandle<()>,
}

/// Controller for one open conversation: history, composition input and
/// the simulated voice-recording affordance. Errors from the store never
/// escape this type; loads park the session in `Failed` with a retry
/// path, sends emit a `SendFailed` event and keep the input for resend.
///
/// Multiple sessions over the same store are independent views; one
/// session observes another's writes only on its next `load_history`.
pub struct ChatSession {
    store: Arc<ChatStore>,
    chat_id: String,
    identity: UserContext,
    phase: Phase,
    history: Vec<Message>,
    input: String,
    recording: Option<Recording>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl ChatSession {
    /// Open a session. The returned receiver is the view's side of the
    /// event channel: toasts and the auto-scroll signal come out of it.
    pub fn open(
        store: Arc<ChatStore>,
        chat_id: impl Into<String>,
        identity: UserContext,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Self {
            store,
            chat_id: chat_id.into(),
            identity,
            phase: Phase::Idle,
            history: Vec::new(),
            input: String::new(),
            recording: None,
            events: tx,
        };
        (session, rx)
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Displayed history, always timestamp-ascending.
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Live elapsed seconds while recording, for the view's counter.
    pub fn recording_seconds(&self) -> Option<u32> {
        self.recording
            .as_ref()
            .map(|r| r.elapsed.load(Ordering::Relaxed))
    }

    /// Fetch the chat's history. One load at a time; a call while already
    /// `Loading` is ignored. Success replaces the history and fires one
    /// `HistoryChanged`; failure keeps the old history and parks the
    /// session in `Failed`.
    pub async fn load_history(&mut self) {
        if self.phase == Phase::Loading {
            return;
        }
        self.phase = Phase::Loading;

        match self.store.messages_for_chat(&self.chat_id).await {
            Ok(messages) => {
                self.history = messages;
                self.phase = Phase::Ready;
                self.emit(SessionEvent::HistoryChanged { len: self.history.len() });
            }
            Err(e) => {
                warn!(chat = %self.chat_id, error = %e, "history load failed");
                self.phase = Phase::Failed(e.to_string());
            }
        }
    }

    /// Send the current composition input as a text message.
    pub async fn submit(&mut self) {
        let content = self.input.clone();
        self.send(&content).await;
    }

    /// Send a text message. Whitespace-only content is a silent no-op:
    /// no message is stored and no event fires.
    pub async fn send(&mut self, content: &str) {
        self.send_kind(content, MessageKind::Text, None).await;
    }

    async fn send_kind(
        &mut self,
        content: &str,
        kind: MessageKind,
        duration_secs: Option<u32>,
    ) -> bool {
        if content.trim().is_empty() {
            return false;
        }

        let draft = MessageDraft {
            chat_id: self.chat_id.clone(),
            sender_id: self.identity.user_id.clone(),
            content: content.to_string(),
            kind,
            duration_secs,
        };

        match self.store.append(draft).await {
            Ok(message) => {
                // The appended message carries the newest timestamp, so a
                // plain push keeps the history ascending.
                self.history.push(message);
                self.input.clear();
                self.emit(SessionEvent::HistoryChanged { len: self.history.len() });
                true
            }
            Err(e) => {
                warn!(chat = %self.chat_id, error = %e, "send failed");
                self.emit(SessionEvent::SendFailed { reason: e.to_string() });
                false
            }
        }
    }

    /// Enter the recording sub-state and start the 1 s elapsed ticker.
    /// Only meaningful once history is loaded; ignored while already
    /// recording.
    pub fn start_recording(&mut self) {
        if self.phase != Phase::Ready || self.recording.is_some() {
            return;
        }

        let elapsed = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&elapsed);
        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            // The first tick completes immediately; consume it so the
            // counter starts at zero.
            interval.tick().await;
            loop {
                interval.tick().await;
                counter.fetch_add(1, Ordering::Relaxed);
            }
        });

        debug!(chat = %self.chat_id, "recording started");
        self.recording = Some(Recording { elapsed, ticker });
        self.emit(SessionEvent::RecordingStarted);
    }

    /// Leave the recording sub-state: stop the ticker and send one audio
    /// message whose placeholder content and duration carry the elapsed
    /// seconds. Ignored when not recording.
    pub async fn stop_recording(&mut self) {
        let Some(recording) = self.recording.take() else {
            return;
        };
        recording.ticker.abort();
        let seconds = recording.elapsed.load(Ordering::Relaxed);

        debug!(chat = %self.chat_id, seconds, "recording stopped");
        let sent = self
            .send_kind(
                &format!("Audio message ({seconds}s)"),
                MessageKind::Audio,
                Some(seconds),
            )
            .await;
        if sent {
            self.emit(SessionEvent::VoiceMessageSent { seconds });
        }
    }

    fn emit(&self, event: SessionEvent) {
        // The view may have dropped its receiver; that only means nobody
        // is watching anymore.
        let _ = self.events.send(event);
    }
}

impl Drop for ChatSession {
    /// Tearing down a session must not leak the repeating ticker.
    fn drop(&mut self) {
        if let Some(recording) = &self.recording {
            recording.ticker.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use souq_store::{Flaky, NoDelay};
    use souq_types::ChatError;

    fn open_session() -> (ChatSession, mpsc::UnboundedReceiver<SessionEvent>) {
        let store = Arc::new(ChatStore::new(
            Arc::new(NoDelay),
            UserContext::new("current-user"),
        ));
        ChatSession::open(store, "c1", UserContext::new("current-user"))
    }

    #[tokio::test]
    async fn load_of_unknown_chat_is_ready_and_empty() {
        let (mut session, mut rx) = open_session();
        assert_eq!(*session.phase(), Phase::Idle);

        session.load_history().await;

        assert_eq!(*session.phase(), Phase::Ready);
        assert!(session.history().is_empty());
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::HistoryChanged { len: 0 });
    }

    #[tokio::test]
    async fn send_appends_clears_input_and_signals_once() {
        let (mut session, mut rx) = open_session();
        session.load_history().await;
        let _ = rx.try_recv();

        session.set_input("selling a lamp, interested?");
        session.submit().await;

        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history()[0].sender_id, "current-user");
        assert_eq!(session.input(), "");
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::HistoryChanged { len: 1 });
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn blank_send_is_a_silent_no_op() {
        let (mut session, mut rx) = open_session();
        session.load_history().await;
        let _ = rx.try_recv();

        session.send("").await;
        session.send("   ").await;

        assert!(session.history().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_load_is_retryable() {
        let flaky = Arc::new(Flaky::new(Arc::new(NoDelay), 1));
        let store = Arc::new(ChatStore::new(
            flaky.clone(),
            UserContext::new("current-user"),
        ));
        let (mut session, _rx) =
            ChatSession::open(store, "c1", UserContext::new("current-user"));

        session.load_history().await;
        let Phase::Failed(reason) = session.phase() else {
            panic!("expected failed phase, got {:?}", session.phase());
        };
        assert_eq!(
            reason,
            &ChatError::Unavailable("simulated transport failure".into()).to_string()
        );

        session.load_history().await;
        assert_eq!(*session.phase(), Phase::Ready);
    }

    #[tokio::test]
    async fn failed_send_keeps_input_and_notifies() {
        let flaky = Arc::new(Flaky::new(Arc::new(NoDelay), 0));
        let store = Arc::new(ChatStore::new(
            flaky.clone(),
            UserContext::new("current-user"),
        ));
        let (mut session, mut rx) =
            ChatSession::open(store, "c1", UserContext::new("current-user"));
        session.load_history().await;
        let _ = rx.try_recv();

        session.set_input("please fail");
        flaky.fail_next(1);
        session.submit().await;

        assert_eq!(session.input(), "please fail");
        assert!(session.history().is_empty());
        assert!(matches!(rx.try_recv().unwrap(), SessionEvent::SendFailed { .. }));

        // Resend after the transport recovers.
        session.submit().await;
        assert_eq!(session.input(), "");
        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recording_synthesizes_one_audio_message() {
        let (mut session, mut rx) = open_session();
        session.load_history().await;
        let _ = rx.try_recv();

        session.start_recording();
        assert!(session.is_recording());
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::RecordingStarted);

        // Past the 3 s boundary but short of 4 s, so elapsed is exactly 3.
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(session.recording_seconds(), Some(3));

        session.stop_recording().await;

        assert!(!session.is_recording());
        assert_eq!(session.recording_seconds(), None);
        assert_eq!(session.history().len(), 1);
        let audio = &session.history()[0];
        assert_eq!(audio.kind, MessageKind::Audio);
        assert_eq!(audio.duration_secs, Some(3));
        assert_eq!(audio.content, "Audio message (3s)");

        assert_eq!(rx.try_recv().unwrap(), SessionEvent::HistoryChanged { len: 1 });
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::VoiceMessageSent { seconds: 3 });
    }

    #[tokio::test]
    async fn recording_requires_ready_phase() {
        let (mut session, mut rx) = open_session();

        session.start_recording();
        assert!(!session.is_recording());
        assert!(rx.try_recv().is_err());

        session.stop_recording().await;
        assert!(session.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_a_session_stops_the_ticker() {
        let (mut session, _rx) = open_session();
        session.load_history().await;
        session.start_recording();
        let elapsed = session
            .recording
            .as_ref()
            .map(|r| Arc::clone(&r.elapsed))
            .unwrap();

        drop(session);

        tokio::time::sleep(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;
        assert_eq!(elapsed.load(Ordering::Relaxed), 0);
    }
}
