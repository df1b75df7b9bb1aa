//! Fallback copy and payload resolution

use serde::{Deserialize, Serialize};

use super::DedicationPayload;

/// Text used whenever the payload leaves a field out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackText {
    pub title: String,
    pub intro: String,
    pub button: String,
    pub couple_name: String,
    pub top_phrase: String,
    pub phrase_final: String,
    pub music_title: String,
    pub phrases: Vec<String>,
}

impl Default for FallbackText {
    fn default() -> Self {
        Self {
            title: "Infinito Particular".to_string(),
            intro: "Nem parece real o tanto que a gente já viveu junto. E o tanto que ainda vem...💕"
                .to_string(),
            button: "Vem comigo? 💖".to_string(),
            couple_name: "Eu e Ela".to_string(),
            top_phrase:
                "Não é sobre prometer perfeição… é sobre escolher a mesma pessoa todos os dias."
                    .to_string(),
            phrase_final: "Nosso amor cresce a cada segundo 💕".to_string(),
            music_title: "Nossa Música".to_string(),
            phrases: vec![
                "Cada dia ao seu lado é um novo capítulo na nossa história de amor.".to_string(),
                "Seu sorriso ilumina meus dias e aquece meu coração.".to_string(),
                "Amo a forma como você transforma o ordinário em extraordinário.".to_string(),
                "Nossa conexão é a prova de que almas gêmeas existem.".to_string(),
                "Você é minha melhor escolha, todos os dias.".to_string(),
            ],
        }
    }
}

/// A photo with both fields present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPhoto {
    pub preview_url: String,
    pub caption: String,
}

/// Payload with every display field filled in
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDedication {
    pub title: String,
    pub intro: String,
    pub button: String,
    pub couple_name: String,
    pub top_phrase: String,
    pub phrases: Vec<String>,
    pub phrase_final: String,
    /// Passed through untouched; formatting is up to the display
    pub start_timestamp: Option<String>,
    /// Photos without a preview URL are dropped
    pub photos: Vec<ResolvedPhoto>,
    pub music_title: String,
}

fn pick(value: Option<&String>, fallback: &str) -> String {
    value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

impl DedicationPayload {
    /// Merge this payload with fallback copy
    ///
    /// Empty strings count as absent. An absent or empty `phrases` list is
    /// replaced by the fallback list as a whole.
    pub fn resolve(&self, fallback: &FallbackText) -> ResolvedDedication {
        let text = self.custom_text.as_ref();
        let basic = self.basic.as_ref();

        let phrases: Vec<String> = text
            .and_then(|t| t.phrases.as_ref())
            .map(|list| {
                list.iter()
                    .map(|p| p.trim())
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|list| !list.is_empty())
            .unwrap_or_else(|| fallback.phrases.clone());

        let photos = self
            .photos
            .iter()
            .flatten()
            .filter_map(|photo| {
                let url = photo.preview_url.as_deref()?.trim();
                if url.is_empty() {
                    return None;
                }
                Some(ResolvedPhoto {
                    preview_url: url.to_string(),
                    caption: photo.caption.clone().unwrap_or_default(),
                })
            })
            .collect();

        ResolvedDedication {
            title: pick(text.and_then(|t| t.title.as_ref()), &fallback.title),
            intro: pick(text.and_then(|t| t.intro.as_ref()), &fallback.intro),
            button: pick(text.and_then(|t| t.button.as_ref()), &fallback.button),
            couple_name: pick(basic.and_then(|b| b.couple_name.as_ref()), &fallback.couple_name),
            top_phrase: pick(text.and_then(|t| t.top_phrase.as_ref()), &fallback.top_phrase),
            phrases,
            phrase_final: pick(text.and_then(|t| t.phrase_final.as_ref()), &fallback.phrase_final),
            start_timestamp: basic.and_then(|b| b.start_timestamp.clone()),
            photos,
            music_title: pick(
                self.music.as_ref().and_then(|m| m.title.as_ref()),
                &fallback.music_title,
            ),
        }
    }
}
