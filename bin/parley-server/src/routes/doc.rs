use utoipa::OpenApi;

use crate::routes::{health, v1};

#[derive(OpenApi)]
#[openapi(info(
    title = "parley-server",
    description = "Rate-limited streaming chat API",
    version = "0.1.0",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(v1::api_docs());
    root
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn document_lists_chat_and_rate_limit_paths() {
        let doc = get_docs();
        for path in ["/health", "/v1/chat", "/v1/rate-limit", "/v1/chats/{id}/messages"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
