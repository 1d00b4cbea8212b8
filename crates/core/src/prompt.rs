// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! User-authored prompt payloads (text plus optional images).

use serde::{Deserialize, Serialize};

/// An inline image attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptImage {
    pub media_type: String,
    /// Base64-encoded image bytes.
    pub data: String,
}

/// A user prompt: text plus optional images (spec §3 Task, §6 `createTask`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub images: Vec<PromptImage>,
}

impl Prompt {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), images: Vec::new() }
    }

    /// `createTask` validates "non-empty prompt-or-images" (spec §6).
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.images.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_prompt_with_whitespace_text_is_empty() {
        assert!(Prompt::text("   \n").is_empty());
    }

    #[test]
    fn prompt_with_only_images_is_not_empty() {
        let p = Prompt {
            text: String::new(),
            images: vec![PromptImage { media_type: "image/png".into(), data: "AA==".into() }],
        };
        assert!(!p.is_empty());
    }
}
