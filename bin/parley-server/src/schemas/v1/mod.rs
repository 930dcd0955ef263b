//! Request / response bodies for the `/v1` API. All JSON is camelCase.

pub mod chat;
pub mod chats;
pub mod preferences;
pub mod rate_limit;
