//! Dedication payload
//!
//! The data a parent page hands to the embedded dedication page. Every leaf
//! is optional: consumers go through [`DedicationPayload::resolve`], which
//! substitutes the configured fallback copy for anything missing.

mod fallback;
mod rotation;

pub use fallback::{FallbackText, ResolvedDedication, ResolvedPhoto};
pub use rotation::MessageRotation;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::utils::error::{IntoDedicationError, Result};

/// Payload delivered once per page load
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedicationPayload {
    /// Free-form copy
    #[serde(rename = "customText", skip_serializing_if = "Option::is_none")]
    pub custom_text: Option<CustomText>,

    /// Couple and relationship start
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic: Option<Basic>,

    /// Carousel photos, in display order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photos: Option<Vec<Photo>>,

    /// Background song
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music: Option<Music>,
}

/// Custom copy shown across the page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomText {
    pub title: Option<String>,
    pub intro: Option<String>,
    pub button: Option<String>,
    pub top_phrase: Option<String>,
    pub phrases: Option<Vec<String>>,
    pub phrase_final: Option<String>,
}

/// Basic facts about the couple
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Basic {
    /// ISO-8601 date-time the relationship started
    #[serde(rename = "startTimestamp")]
    pub start_timestamp: Option<String>,

    #[serde(rename = "coupleName")]
    pub couple_name: Option<String>,
}

/// One carousel photo
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Photo {
    #[serde(rename = "previewUrl")]
    pub preview_url: Option<String>,
    pub caption: Option<String>,
}

/// Background song
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Music {
    pub title: Option<String>,

    /// Video URL or bare video id
    #[serde(rename = "sourceUrl")]
    pub source_url: Option<String>,
}

impl DedicationPayload {
    /// Parse a payload from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).payload_err("Invalid dedication payload")
    }

    /// Read a payload from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Media reference of the background song, if the payload names one
    pub fn music_source(&self) -> Option<&str> {
        self.music
            .as_ref()
            .and_then(|m| m.source_url.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
