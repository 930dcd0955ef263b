//! Gemini response payloads and their normalization into
//! [`GroundingMetadata`].

use parley_types::{GroundingChunk, GroundingMetadata, GroundingSupport, TextSegment, WebSource};
use serde::Deserialize;

use super::request::Content;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub grounding_metadata: Option<ProviderGroundingMetadata>,
    #[serde(default)]
    pub grounding_attributions: Vec<GroundingAttribution>,
}

impl Candidate {
    /// Concatenated text of every part in this candidate.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| p.text.as_deref())
            .collect()
    }

    /// Grounding information carried by this candidate, in whichever shape
    /// the provider used.
    pub fn grounding(&self) -> Option<ProviderGrounding> {
        if let Some(metadata) = &self.grounding_metadata {
            return Some(ProviderGrounding::Metadata(metadata.clone()));
        }
        if !self.grounding_attributions.is_empty() {
            return Some(ProviderGrounding::Attributions(
                self.grounding_attributions.clone(),
            ));
        }
        None
    }
}

// ── Structured grounding metadata ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderGroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<ProviderChunk>,
    #[serde(default)]
    pub grounding_supports: Vec<ProviderSupport>,
    #[serde(default)]
    pub web_search_queries: Vec<String>,
    #[serde(default)]
    pub search_entry_point: Option<SearchEntryPoint>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderChunk {
    #[serde(default)]
    pub web: Option<ProviderWeb>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderWeb {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSupport {
    #[serde(default)]
    pub segment: Option<ProviderSegment>,
    #[serde(default)]
    pub grounding_chunk_indices: Vec<usize>,
    #[serde(default)]
    pub confidence_scores: Vec<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSegment {
    #[serde(default)]
    pub start_index: Option<usize>,
    #[serde(default)]
    pub end_index: Option<usize>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchEntryPoint {
    #[serde(default)]
    pub rendered_content: Option<String>,
}

// ── Legacy grounding attributions ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingAttribution {
    #[serde(default)]
    pub source_id: Option<serde_json::Value>,
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub web: Option<ProviderWeb>,
    #[serde(default)]
    pub confidence_score: Option<f32>,
}

/// The two grounding shapes Gemini may return.
#[derive(Debug, Clone)]
pub enum ProviderGrounding {
    Metadata(ProviderGroundingMetadata),
    Attributions(Vec<GroundingAttribution>),
}

impl ProviderGrounding {
    /// Convert into the canonical shape. Returns `None` when nothing useful
    /// remains.
    pub fn normalize(self) -> Option<GroundingMetadata> {
        let metadata = match self {
            ProviderGrounding::Metadata(m) => from_metadata(m),
            ProviderGrounding::Attributions(a) => from_attributions(a),
        }
        .sanitized();
        (!metadata.is_empty()).then_some(metadata)
    }
}

fn web_source(web: Option<ProviderWeb>) -> Option<WebSource> {
    let web = web?;
    Some(WebSource {
        uri: web.uri?,
        title: web.title,
    })
}

fn from_metadata(m: ProviderGroundingMetadata) -> GroundingMetadata {
    GroundingMetadata {
        grounding_chunks: m
            .grounding_chunks
            .into_iter()
            .map(|c| GroundingChunk {
                web: web_source(c.web),
            })
            .collect(),
        grounding_supports: m
            .grounding_supports
            .into_iter()
            .map(|s| {
                let segment = s.segment.unwrap_or_default();
                GroundingSupport {
                    segment: TextSegment {
                        start_index: segment.start_index.unwrap_or(0),
                        end_index: segment.end_index.unwrap_or(0),
                        text: segment.text.unwrap_or_default(),
                    },
                    grounding_chunk_indices: s.grounding_chunk_indices,
                    confidence_scores: s.confidence_scores,
                }
            })
            .collect(),
        web_search_queries: m.web_search_queries,
        search_entry_point: m.search_entry_point.and_then(|e| e.rendered_content),
    }
}

/// Each attribution becomes one chunk plus one support pointing at it.
fn from_attributions(attributions: Vec<GroundingAttribution>) -> GroundingMetadata {
    let mut metadata = GroundingMetadata::default();
    for (index, attribution) in attributions.into_iter().enumerate() {
        let text: String = attribution
            .content
            .iter()
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| p.text.as_deref())
            .collect();
        metadata.grounding_chunks.push(GroundingChunk {
            web: web_source(attribution.web),
        });
        metadata.grounding_supports.push(GroundingSupport {
            segment: TextSegment {
                start_index: 0,
                end_index: text.len(),
                text,
            },
            grounding_chunk_indices: vec![index],
            confidence_scores: attribution.confidence_score.into_iter().collect(),
        });
    }
    metadata
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn structured_metadata_is_normalized() {
        let raw = serde_json::json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Rust 1.0 shipped in 2015." }] },
                "groundingMetadata": {
                    "groundingChunks": [
                        { "web": { "uri": "https://blog.rust-lang.org", "title": "Rust Blog" } },
                        { "retrievedContext": {} }
                    ],
                    "groundingSupports": [{
                        "segment": { "startIndex": 0, "endIndex": 25, "text": "Rust 1.0 shipped in 2015." },
                        "groundingChunkIndices": [0, 3],
                        "confidenceScores": [0.97, 0.2]
                    }],
                    "webSearchQueries": ["rust 1.0 release"],
                    "searchEntryPoint": { "renderedContent": "<div>chips</div>" }
                }
            }]
        });
        let response: GenerateContentResponse = serde_json::from_value(raw).unwrap();
        let candidate = &response.candidates[0];
        assert_eq!(candidate.text(), "Rust 1.0 shipped in 2015.");

        let metadata = candidate.grounding().and_then(ProviderGrounding::normalize).unwrap();
        assert_eq!(metadata.grounding_chunks.len(), 2);
        assert_eq!(
            metadata.grounding_chunks[0].web.as_ref().map(|w| w.uri.as_str()),
            Some("https://blog.rust-lang.org")
        );
        assert!(metadata.grounding_chunks[1].web.is_none());
        assert_eq!(metadata.grounding_supports[0].grounding_chunk_indices, vec![0]);
        assert_eq!(metadata.grounding_supports[0].confidence_scores, vec![0.97]);
        assert_eq!(metadata.search_entry_point.as_deref(), Some("<div>chips</div>"));
        assert!(metadata.is_consistent());
    }

    #[test]
    fn legacy_attributions_are_normalized() {
        let raw = serde_json::json!({
            "candidates": [{
                "groundingAttributions": [
                    { "sourceId": { "groundingPassage": { "passageId": "p1" } },
                      "content": { "parts": [{ "text": "first source" }] },
                      "confidenceScore": 0.5 },
                    { "web": { "uri": "https://example.com" },
                      "content": { "parts": [{ "text": "second" }] } }
                ]
            }]
        });
        let response: GenerateContentResponse = serde_json::from_value(raw).unwrap();
        let metadata = response.candidates[0]
            .grounding()
            .and_then(ProviderGrounding::normalize)
            .unwrap();

        assert_eq!(metadata.grounding_chunks.len(), 2);
        assert_eq!(metadata.grounding_supports[1].grounding_chunk_indices, vec![1]);
        assert_eq!(metadata.grounding_supports[0].segment.text, "first source");
        assert_eq!(metadata.grounding_supports[0].confidence_scores, vec![0.5]);
        assert!(metadata.grounding_supports[1].confidence_scores.is_empty());
    }

    #[test]
    fn candidate_without_grounding_yields_none() {
        let candidate = Candidate::default();
        assert!(candidate.grounding().is_none());

        let empty = ProviderGrounding::Metadata(ProviderGroundingMetadata::default());
        assert!(empty.normalize().is_none());
    }
}
