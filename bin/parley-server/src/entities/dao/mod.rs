pub mod chat;
pub mod preferences;
pub mod usage;

pub use chat::{Chat, ChatMessage};
pub use preferences::UserPreferences;
pub use usage::UsageRecord;
