pub mod inbox;
pub mod session;

pub use inbox::{Inbox, InboxFilter};
pub use session::{ChatSession, Phase};
