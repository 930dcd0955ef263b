//! Canonical search-grounding metadata.
//!
//! Providers report citations in more than one shape; the server normalizes
//! all of them into [`GroundingMetadata`] before anything leaves the gateway.

use serde::{Deserialize, Serialize};

/// A web page used as a grounding source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSource {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// One source chunk. Non-web sources carry no reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<WebSource>,
}

/// Substring of the generated response, addressed by byte offsets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSegment {
    #[serde(default)]
    pub start_index: usize,
    #[serde(default)]
    pub end_index: usize,
    #[serde(default)]
    pub text: String,
}

/// Links a response segment to the chunks that support it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingSupport {
    #[serde(default)]
    pub segment: TextSegment,
    #[serde(default)]
    pub grounding_chunk_indices: Vec<usize>,
    #[serde(default)]
    pub confidence_scores: Vec<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
    #[serde(default)]
    pub grounding_supports: Vec<GroundingSupport>,
    #[serde(default)]
    pub web_search_queries: Vec<String>,
    /// Pre-rendered HTML for the search entry point widget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_entry_point: Option<String>,
}

impl GroundingMetadata {
    pub fn is_empty(&self) -> bool {
        self.grounding_chunks.is_empty()
            && self.grounding_supports.is_empty()
            && self.web_search_queries.is_empty()
            && self.search_entry_point.is_none()
    }

    /// `true` when every support references an existing chunk.
    pub fn is_consistent(&self) -> bool {
        let n = self.grounding_chunks.len();
        self.grounding_supports
            .iter()
            .all(|s| s.grounding_chunk_indices.iter().all(|&i| i < n))
    }

    /// Drop chunk references that point past the end of `grounding_chunks`,
    /// together with their confidence scores. Supports left without any
    /// reference are removed.
    pub fn sanitized(mut self) -> Self {
        let n = self.grounding_chunks.len();
        self.grounding_supports.retain_mut(|support| {
            let scored = support.confidence_scores.len() == support.grounding_chunk_indices.len();
            let mut kept_scores = Vec::new();
            let mut kept_indices = Vec::new();
            for (pos, &index) in support.grounding_chunk_indices.iter().enumerate() {
                if index < n {
                    kept_indices.push(index);
                    if scored {
                        kept_scores.push(support.confidence_scores[pos]);
                    }
                }
            }
            support.grounding_chunk_indices = kept_indices;
            if scored {
                support.confidence_scores = kept_scores;
            }
            !support.grounding_chunk_indices.is_empty()
        });
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn web_chunk(uri: &str) -> GroundingChunk {
        GroundingChunk {
            web: Some(WebSource {
                uri: uri.into(),
                title: None,
            }),
        }
    }

    #[test]
    fn sanitized_drops_out_of_range_indices() {
        let metadata = GroundingMetadata {
            grounding_chunks: vec![web_chunk("https://a.example"), web_chunk("https://b.example")],
            grounding_supports: vec![
                GroundingSupport {
                    segment: TextSegment::default(),
                    grounding_chunk_indices: vec![0, 5, 1],
                    confidence_scores: vec![0.9, 0.8, 0.7],
                },
                GroundingSupport {
                    segment: TextSegment::default(),
                    grounding_chunk_indices: vec![7],
                    confidence_scores: vec![],
                },
            ],
            ..Default::default()
        };
        assert!(!metadata.is_consistent());

        let clean = metadata.sanitized();
        assert!(clean.is_consistent());
        assert_eq!(clean.grounding_supports.len(), 1);
        assert_eq!(clean.grounding_supports[0].grounding_chunk_indices, vec![0, 1]);
        assert_eq!(clean.grounding_supports[0].confidence_scores, vec![0.9, 0.7]);
    }

    #[test]
    fn deserializes_with_missing_fields() {
        let metadata: GroundingMetadata =
            serde_json::from_str(r#"{"webSearchQueries":["rust sse"]}"#).unwrap();
        assert_eq!(metadata.web_search_queries, vec!["rust sse".to_string()]);
        assert!(metadata.grounding_chunks.is_empty());
        assert!(!metadata.is_empty());
        assert!(GroundingMetadata::default().is_empty());
    }
}
