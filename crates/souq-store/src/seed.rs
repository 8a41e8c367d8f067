//! Fixture loading. The seed format is a JSON array of full message
//! records; conversations are never part of the fixture, they are
//! derived by `ChatStore::with_seed`.

use souq_types::ChatError;
use souq_types::models::Message;
use tracing::debug;

pub fn from_json(json: &str) -> Result<Vec<Message>, ChatError> {
    let messages: Vec<Message> = serde_json::from_str(json)
        .map_err(|e| ChatError::Validation(format!("seed fixture: {e}")))?;
    debug!(count = messages.len(), "seed fixture parsed");
    Ok(messages)
}
