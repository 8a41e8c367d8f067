use std::sync::Arc;

use tracing::warn;

use souq_store::ChatStore;
use souq_types::models::Conversation;

use crate::session::Phase;

/// Status filter for the conversation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InboxFilter {
    #[default]
    All,
    Unread,
    Archived,
}

/// View-model for the conversation list: loads the index and applies
/// client-side search and status filtering. Filtering never re-fetches;
/// it narrows the last loaded snapshot.
pub struct Inbox {
    store: Arc<ChatStore>,
    phase: Phase,
    conversations: Vec<Conversation>,
}

impl Inbox {
    pub fn new(store: Arc<ChatStore>) -> Self {
        Self {
            store,
            phase: Phase::Idle,
            conversations: Vec::new(),
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// The unfiltered snapshot from the last successful load.
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    /// Fetch the conversation index. Same shape as a session's history
    /// load: `Failed` keeps the old snapshot and is retried by calling
    /// `load` again.
    pub async fn load(&mut self) {
        if self.phase == Phase::Loading {
            return;
        }
        self.phase = Phase::Loading;

        match self.store.conversations().await {
            Ok(conversations) => {
                self.conversations = conversations;
                self.phase = Phase::Ready;
            }
            Err(e) => {
                warn!(error = %e, "conversation load failed");
                self.phase = Phase::Failed(e.to_string());
            }
        }
    }

    /// Case-insensitive substring search over the counterpart name and
    /// the last message content, then the status filter. An empty query
    /// matches everything.
    pub fn visible(&self, search: &str, filter: InboxFilter) -> Vec<&Conversation> {
        let query = search.trim().to_lowercase();
        self.conversations
            .iter()
            .filter(|c| {
                let matches_search = query.is_empty()
                    || c.counterpart().to_lowercase().contains(&query)
                    || c.last_message
                        .as_ref()
                        .is_some_and(|m| m.content.to_lowercase().contains(&query));

                let matches_filter = match filter {
                    InboxFilter::All => true,
                    InboxFilter::Unread => c.unread_count > 0,
                    InboxFilter::Archived => c.archived,
                };

                matches_search && matches_filter
            })
            .collect()
    }
}
