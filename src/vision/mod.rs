//! Image analysis
//!
//! Sends a captured image to an annotation service and turns the first label
//! and first text span into the line pair that gets spoken.

mod google;

pub use google::GoogleVision;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::camera::CapturedImage;

/// Spoken when no label was detected (or labels were not requested)
pub const NO_LABELS: &str = "No labels";

/// Spoken when no text was detected (or text was not requested)
pub const NO_TEXT: &str = "No Text";

/// Detected visual content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelAnnotation {
    pub description: String,
    /// Confidence in `[0, 1]`
    #[serde(default)]
    pub score: f32,
}

/// A detected text span
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAnnotation {
    pub description: String,
    #[serde(default)]
    pub bounding_poly: BoundingPoly,
}

/// Region of the image a text span was found in
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingPoly {
    #[serde(default)]
    pub vertices: Vec<Vertex>,
}

/// Pixel coordinate; the service omits zero components
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
}

/// Result of one analysis call; either list may be empty
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisResult {
    /// Labels, most confident first
    pub labels: Vec<LabelAnnotation>,
    /// Text spans, full text first
    pub texts: Vec<TextAnnotation>,
}

impl AnalysisResult {
    /// First label description, if any
    #[must_use]
    pub fn top_label(&self) -> Option<&str> {
        self.labels
            .first()
            .map(|l| l.description.trim())
            .filter(|s| !s.is_empty())
    }

    /// First text description, if any
    #[must_use]
    pub fn top_text(&self) -> Option<&str> {
        self.texts
            .first()
            .map(|t| t.description.trim())
            .filter(|s| !s.is_empty())
    }

    /// Text to speak: top label and top text on separate lines
    #[must_use]
    pub fn spoken_text(&self) -> String {
        format!(
            "{}\n{}",
            self.top_label().unwrap_or(NO_LABELS),
            self.top_text().unwrap_or(NO_TEXT)
        )
    }
}

/// Remote image annotation
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    /// Analyze an image
    ///
    /// A `false` flag leaves the matching list empty without a request.
    ///
    /// # Errors
    ///
    /// Returns `Error::Analysis` on transport, authentication or response
    /// errors
    async fn analyze(
        &self,
        image: &CapturedImage,
        want_labels: bool,
        want_text: bool,
    ) -> Result<AnalysisResult>;

    /// Analyzer name for logging
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(description: &str, score: f32) -> LabelAnnotation {
        LabelAnnotation {
            description: description.to_string(),
            score,
        }
    }

    fn text(description: &str) -> TextAnnotation {
        TextAnnotation {
            description: description.to_string(),
            bounding_poly: BoundingPoly {
                vertices: vec![Vertex { x: 1, y: 2 }, Vertex { x: 30, y: 2 }],
            },
        }
    }

    #[test]
    fn test_empty_result_placeholders() {
        assert_eq!(AnalysisResult::default().spoken_text(), "No labels\nNo Text");
    }

    #[test]
    fn test_first_of_each() {
        let result = AnalysisResult {
            labels: vec![label("cat", 0.9)],
            texts: vec![text("STOP")],
        };
        assert_eq!(result.spoken_text(), "cat\nSTOP");
    }

    #[test]
    fn test_only_first_used() {
        let result = AnalysisResult {
            labels: vec![label("dog", 0.97), label("pet", 0.91)],
            texts: vec![text("EXIT\n"), text("EXIT")],
        };
        assert_eq!(result.spoken_text(), "dog\nEXIT");
    }

    #[test]
    fn test_blank_first_annotation_uses_placeholder() {
        let result = AnalysisResult {
            labels: vec![label("  ", 0.5), label("cat", 0.4)],
            texts: vec![text("\n")],
        };
        assert_eq!(result.top_label(), None);
        assert_eq!(result.spoken_text(), "No labels\nNo Text");
    }

    #[test]
    fn test_partial_placeholders() {
        let labels_only = AnalysisResult {
            labels: vec![label("tree", 0.8)],
            texts: vec![],
        };
        assert_eq!(labels_only.spoken_text(), "tree\nNo Text");

        let text_only = AnalysisResult {
            labels: vec![],
            texts: vec![text("OPEN")],
        };
        assert_eq!(text_only.spoken_text(), "No labels\nOPEN");
    }
}
