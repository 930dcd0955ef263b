//! Types shared by the parley server and its clients.
//!
//! - [`message`]: conversation roles and the chat message shape sent on the wire.
//! - [`grounding`]: the canonical search-grounding metadata attached to
//!   assistant turns.
//! - [`frame`]: the `data: ...` framing used by the streaming chat endpoint.

pub mod frame;
pub mod grounding;
pub mod message;

pub use frame::{DONE_SENTINEL, FRAME_MARKER, Frame, FrameError};
pub use grounding::{GroundingChunk, GroundingMetadata, GroundingSupport, TextSegment, WebSource};
pub use message::{Attachment, Role, WireMessage};

/// Every model identifier accepted by the service starts with this prefix.
pub const SUPPORTED_MODEL_PREFIX: &str = "gemini-";

/// Client-facing message for a model outside the supported family.
pub const UNSUPPORTED_MODEL_MESSAGE: &str = "Only Gemini models are supported";

/// Returns `true` when `model` belongs to the supported (Gemini) family.
///
/// A leading `models/` resource prefix is tolerated.
pub fn is_supported_model(model: &str) -> bool {
    let name = model.strip_prefix("models/").unwrap_or(model);
    name.starts_with(SUPPORTED_MODEL_PREFIX) && name.len() > SUPPORTED_MODEL_PREFIX.len()
}
