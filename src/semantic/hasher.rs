//! Semantic fingerprinting of scenes
//!
//! A scene at a position is described by three independent fingerprints:
//!
//! - **content**: the scene's own normalized text and its nouns/verbs
//! - **context**: characters, timeline and plot nouns of a bounded window of
//!   preceding scenes
//! - **reader knowledge**: what the reader is assumed to know at that point
//!
//! Changing one axis never perturbs the other two.

use crate::semantic::canonical::{hash_value, sha256_hex};
use crate::semantic::extract::EntityExtractor;
use crate::semantic::normalize::{fingerprint_text, normalize, normalize_name};
use crate::semantic::types::{CacheKey, ReaderKnowledge, Scene, SemanticSignature};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use tracing::debug;

/// Maximum number of nouns kept in a content fingerprint
pub const MAX_NOUN_TOKENS: usize = 50;

/// Maximum number of verbs kept in a content fingerprint
pub const MAX_VERB_TOKENS: usize = 25;

/// Texts longer than this (in characters) are fingerprinted by chunk digests
pub const INLINE_TEXT_LIMIT: usize = 1200;

/// Size of each beginning/middle/end chunk
pub const CHUNK_CHARS: usize = 400;

/// Number of preceding scenes considered for the context fingerprint
pub const DEFAULT_CONTEXT_WINDOW: usize = 5;

const READER_KNOWLEDGE_SENTINEL: &str = "reader-knowledge:unavailable";

/// Builds semantic fingerprints and cache keys
#[derive(Debug, Clone)]
pub struct SemanticHasher {
    extractor: EntityExtractor,
    context_window: usize,
}

impl Default for SemanticHasher {
    fn default() -> Self {
        Self::new(EntityExtractor::default())
    }
}

impl SemanticHasher {
    pub fn new(extractor: EntityExtractor) -> Self {
        Self {
            extractor,
            context_window: DEFAULT_CONTEXT_WINDOW,
        }
    }

    /// Override the number of preceding scenes in the context window
    pub fn with_context_window(mut self, window: usize) -> Self {
        self.context_window = window.max(1);
        self
    }

    pub fn extractor(&self) -> &EntityExtractor {
        &self.extractor
    }

    /// Fingerprint of a scene's own content
    pub fn hash_scene_content(&self, text: &str) -> String {
        let normalized = normalize(text).to_lowercase();
        let entities = self.extractor.extract(&normalized);

        let mut nouns: Vec<String> = entities.nouns.into_iter().take(MAX_NOUN_TOKENS).collect();
        nouns.sort();
        let mut verbs: Vec<String> = entities.verbs.into_iter().take(MAX_VERB_TOKENS).collect();
        verbs.sort();

        let text = fingerprint_text(&normalized);
        let chars: Vec<char> = text.chars().collect();
        let normalized_text = if chars.len() <= INLINE_TEXT_LIMIT {
            Value::String(text)
        } else {
            let middle_start = chars.len() / 2 - CHUNK_CHARS / 2;
            let chunk = |range: std::ops::Range<usize>| {
                sha256_hex(chars[range].iter().collect::<String>())
            };
            json!({
                "chunks": [
                    chunk(0..CHUNK_CHARS),
                    chunk(middle_start..middle_start + CHUNK_CHARS),
                    chunk(chars.len() - CHUNK_CHARS..chars.len()),
                ]
            })
        };

        hash_value(&json!({
            "tokens": nouns,
            "verbs": verbs,
            "normalizedText": normalized_text,
        }))
    }

    /// Fingerprint of the narrative context preceding `target_position`
    pub fn hash_scene_context(&self, previous_scenes: &[Scene], target_position: i64) -> String {
        let window = self.prior_window(previous_scenes, target_position);

        let mut characters = BTreeSet::new();
        let mut timeline = BTreeSet::new();
        for scene in &window {
            characters.extend(self.character_names(scene));
            timeline.extend(self.timeline_markers(scene));
        }

        let name_tokens: BTreeSet<&str> = characters
            .iter()
            .flat_map(|name| name.split_whitespace())
            .collect();

        let mut plot = BTreeSet::new();
        for scene in &window {
            let lowered = normalize(&scene.text).to_lowercase();
            plot.extend(
                self.extractor
                    .extract(&lowered)
                    .nouns
                    .into_iter()
                    .filter(|noun| !characters.contains(noun) && !name_tokens.contains(noun.as_str())),
            );
        }

        let prior_scene_ids: Vec<&str> = window.iter().map(|s| s.id.as_str()).collect();

        hash_value(&json!({
            "characters": characters,
            "timeline": timeline,
            "plot": plot,
            "priorSceneIds": prior_scene_ids,
        }))
    }

    /// Fingerprint of accumulated reader knowledge
    pub fn hash_reader_knowledge(&self, knowledge: &ReaderKnowledge) -> String {
        let characters: BTreeSet<String> = knowledge
            .known_characters
            .iter()
            .map(|name| normalize_name(name))
            .filter(|name| !name.is_empty())
            .collect();

        let mut timeline: Vec<(Option<i64>, String)> = knowledge
            .established_timeline
            .iter()
            .map(|event| (event.when, event.label.trim().to_lowercase()))
            .collect();
        timeline.sort();
        let timeline: Vec<Value> = timeline
            .into_iter()
            .map(|(when, label)| json!({ "label": label, "when": when }))
            .collect();

        hash_value(&json!({
            "characters": characters,
            "timeline": timeline,
            "plotPoints": lower_sorted(knowledge.revealed_plot_points.iter()),
            "settings": lower_sorted(knowledge.established_settings.iter().map(|s| &s.name)),
        }))
    }

    /// Fingerprint of loosely-typed reader knowledge. Never fails.
    ///
    /// Well-formed input hashes exactly like [`Self::hash_reader_knowledge`].
    /// Malformed objects are hashed by their canonical shallow form, and any
    /// other shape falls back to a fixed sentinel.
    pub fn hash_reader_knowledge_value(&self, value: &Value) -> String {
        if value.is_null() {
            return self.hash_reader_knowledge(&ReaderKnowledge::default());
        }

        match serde_json::from_value::<ReaderKnowledge>(value.clone()) {
            Ok(knowledge) => self.hash_reader_knowledge(&knowledge),
            Err(e) => {
                debug!("Malformed reader knowledge, hashing shallow form: {}", e);
                match value {
                    Value::Object(_) => hash_value(&json!({ "shallow": value })),
                    _ => sha256_hex(READER_KNOWLEDGE_SENTINEL),
                }
            }
        }
    }

    /// Compose the three fingerprints with the scene id and position
    pub fn generate_cache_key(
        &self,
        scene: &Scene,
        position: i64,
        previous_scenes: &[Scene],
        reader_knowledge: &ReaderKnowledge,
    ) -> CacheKey {
        CacheKey {
            scene_id: scene.id.clone(),
            position,
            semantic_signature: SemanticSignature {
                scene_fingerprint: self.hash_scene_content(&scene.text),
                context_fingerprint: self.hash_scene_context(previous_scenes, position),
                reader_knowledge_fingerprint: self.hash_reader_knowledge(reader_knowledge),
            },
        }
    }

    /// True when both scenes share a content fingerprint and the same set
    /// of normalized character names
    pub fn are_semantically_equivalent(&self, a: &Scene, b: &Scene) -> bool {
        self.hash_scene_content(&a.text) == self.hash_scene_content(&b.text)
            && self.character_names(a) == self.character_names(b)
    }

    /// Normalized character names, from metadata when present
    pub fn character_names(&self, scene: &Scene) -> BTreeSet<String> {
        let raw = match &scene.characters {
            Some(names) => names.clone(),
            None => self.extractor.extract(&normalize(&scene.text)).people,
        };
        raw.iter()
            .map(|name| normalize_name(name))
            .filter(|name| !name.is_empty())
            .collect()
    }

    fn timeline_markers(&self, scene: &Scene) -> BTreeSet<String> {
        let raw = match &scene.time_markers {
            Some(markers) => markers.clone(),
            None => self.extractor.extract(&normalize(&scene.text)).temporal_markers,
        };
        raw.iter()
            .map(|marker| marker.trim().to_lowercase())
            .filter(|marker| !marker.is_empty())
            .collect()
    }

    /// Scenes before `target_position`, at most `context_window` of them.
    ///
    /// When no scene sits at or after the target, the whole list counts as
    /// prior.
    fn prior_window<'a>(&self, scenes: &'a [Scene], target_position: i64) -> Vec<&'a Scene> {
        let prior: Vec<&Scene> = if scenes.iter().any(|s| s.position >= target_position) {
            scenes.iter().filter(|s| s.position < target_position).collect()
        } else {
            scenes.iter().collect()
        };
        let skip = prior.len().saturating_sub(self.context_window);
        prior.into_iter().skip(skip).collect()
    }
}

fn lower_sorted<'a, I: Iterator<Item = &'a String>>(items: I) -> Vec<String> {
    let mut out: Vec<String> = items.map(|s| s.trim().to_lowercase()).collect();
    out.sort();
    out
}
