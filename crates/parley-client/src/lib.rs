//! Client side of the parley chat pipeline.
//!
//! - [`StreamConsumer`] parses the framed reply stream.
//! - [`finalize_exchange`] persists the assistant turn and, on a chat's first
//!   exchange, its title.
//! - [`ChatClient`] talks to parley-server and runs the whole send flow.
//! - [`PreferencesContext`] holds model and theme choices explicitly.

pub mod consumer;
pub mod error;
pub mod exchange;
pub mod http;
pub mod preferences;
pub mod store;
pub mod title;

pub use consumer::{Completion, ConsumeError, StreamConsumer, consume};
pub use error::ClientError;
pub use exchange::{ExchangeOutcome, finalize_exchange};
pub use http::{ChatClient, RateLimitStatus, SendOptions};
pub use preferences::{
    MemoryPreferenceStorage, PreferenceStorage, Preferences, PreferencesContext, RemoteSync, Theme,
};
pub use store::{ChatSummary, ConversationStore, NewMessage, StoredMessage};
pub use title::{TITLE_MAX_CHARS, derive_title};
