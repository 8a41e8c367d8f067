use serde::{Deserialize, Serialize};

/// Events a chat session emits toward its view. The view drains these to
/// drive toasts and auto-scroll; the session never renders anything
/// itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SessionEvent {
    /// The displayed history grew or was replaced. Fired exactly once per
    /// successful load or send; the view scrolls to the newest entry.
    HistoryChanged { len: usize },

    /// A send failed. The composition input is left intact so the user
    /// can resend; the view shows a dismissible notification.
    SendFailed { reason: String },

    /// Voice recording started.
    RecordingStarted,

    /// Recording stopped and the synthesized audio message was sent.
    VoiceMessageSent { seconds: u32 },
}
