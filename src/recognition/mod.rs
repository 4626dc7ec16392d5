//! Handwriting-recognition collaborator: request trait, response decoding and
//! line hierarchy.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Recognition, RecognizedLine, Stroke};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Error)]
pub enum RecognizerError {
    #[error("recognition service error: {0}")]
    Service(String),

    #[error("recognition service returned no lines")]
    Empty,

    #[error("malformed recognition response: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, strokes: &[Stroke]) -> Result<Recognition, RecognizerError>;
}

impl Recognition {
    /// Decodes a service response and links its line hierarchy.
    pub fn from_json(raw: &str) -> Result<Self, RecognizerError> {
        let mut recognition: Recognition = serde_json::from_str(raw)?;
        link_hierarchy(&mut recognition.lines);
        if recognition.text.is_empty() {
            recognition.text = recognition
                .lines
                .iter()
                .map(|line| line.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");
        }
        Ok(recognition)
    }
}

/// Runs the recognizer, turning any failure or empty result into zero lines.
pub async fn recognize_or_empty<R>(recognizer: &R, strokes: &[Stroke]) -> Recognition
where
    R: Recognizer + ?Sized,
{
    if strokes.is_empty() {
        return Recognition::default();
    }

    match recognizer.recognize(strokes).await {
        Ok(recognition) if recognition.is_empty() => {
            log_warn!("recognizer returned no text for {} strokes", strokes.len());
            Recognition::default()
        }
        Ok(recognition) => {
            log_info!(
                "recognized {} lines from {} strokes",
                recognition.lines.len(),
                strokes.len()
            );
            recognition
        }
        Err(err) => {
            log_warn!("recognition failed, reconciling with no lines: {err}");
            Recognition::default()
        }
    }
}

/// Fills `parent` and `children` from indent levels.
///
/// A line's parent is the nearest preceding line with a smaller indent.
pub fn link_hierarchy(lines: &mut [RecognizedLine]) {
    let mut stack: Vec<usize> = Vec::new();
    for line in lines.iter_mut() {
        line.parent = None;
        line.children.clear();
    }

    for index in 0..lines.len() {
        let indent = lines[index].indent_level;
        while let Some(&top) = stack.last() {
            if lines[top].indent_level < indent {
                break;
            }
            stack.pop();
        }
        if let Some(&parent) = stack.last() {
            lines[index].parent = Some(parent);
            lines[parent].children.push(index);
        }
        stack.push(index);
    }
}
