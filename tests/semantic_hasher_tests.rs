//! Integration tests for semantic fingerprinting
//!
//! These tests verify:
//! - Determinism of generated keys
//! - Insensitivity to formatting, sensitivity to meaning
//! - Independence of the content, context and reader-knowledge axes
//! - Pluggable analyzers

use continuity_cache::error::{CacheError, Result};
use continuity_cache::semantic::{
    Entities, EntityExtractor, LinguisticAnalyzer, ReaderKnowledge, Scene, SemanticHasher,
    Setting, TimelineEvent,
};
use serde_json::json;
use std::sync::Arc;

fn story() -> Vec<Scene> {
    vec![
        Scene::new("s1", "Alice boarded the train at dawn.", 1),
        Scene::new("s2", "Bob found the letter in the cabin.", 2),
        Scene::new("s3", "Alice and Bob argued about the letter at noon.", 3),
    ]
}

fn knowledge() -> ReaderKnowledge {
    let mut knowledge = ReaderKnowledge::default();
    knowledge.known_characters.insert("Alice".to_string());
    knowledge.known_characters.insert("Bob".to_string());
    knowledge
        .established_timeline
        .push(TimelineEvent::new("train departs", Some(100)));
    knowledge
        .revealed_plot_points
        .push("The letter is forged".to_string());
    knowledge.established_settings.push(Setting::new("Night train"));
    knowledge
}

#[test]
fn test_cache_key_is_deterministic() {
    let hasher = SemanticHasher::default();
    let scenes = story();
    let target = Scene::new("s4", "Carol examined the forged letter at midnight.", 4);

    let first = hasher.generate_cache_key(&target, 4, &scenes, &knowledge());
    let second = hasher.generate_cache_key(&target, 4, &scenes, &knowledge());

    assert_eq!(first, second);
    assert_eq!(first.storage_key(), second.storage_key());
    assert_eq!(first.storage_key().len(), 64);
}

#[test]
fn test_independent_hashers_agree() {
    let scenes = story();
    let target = Scene::new("s4", "Carol examined the letter.", 4);

    let a = SemanticHasher::default().generate_cache_key(&target, 4, &scenes, &knowledge());
    let b = SemanticHasher::default().generate_cache_key(&target, 4, &scenes, &knowledge());
    assert_eq!(a.storage_key(), b.storage_key());
}

#[test]
fn test_formatting_insensitivity() {
    let hasher = SemanticHasher::default();

    assert_eq!(
        hasher.hash_scene_content("Alice walked in."),
        hasher.hash_scene_content("Alice   walked in!!")
    );
    assert_eq!(
        hasher.hash_scene_content("“Stop,” said **Alice**."),
        hasher.hash_scene_content("\"Stop,\"   said Alice.")
    );
    assert_eq!(
        hasher.hash_scene_content("Bob left\n\nat noon ."),
        hasher.hash_scene_content("Bob left at noon.")
    );
}

#[test]
fn test_semantic_sensitivity() {
    let hasher = SemanticHasher::default();

    assert_ne!(
        hasher.hash_scene_content("Alice walked in."),
        hasher.hash_scene_content("Bob walked in.")
    );
    assert_ne!(
        hasher.hash_scene_content("Alice walked in at noon."),
        hasher.hash_scene_content("Alice walked in at midnight.")
    );
}

#[test]
fn test_reader_knowledge_axis_is_independent() {
    let hasher = SemanticHasher::default();
    let scenes = story();
    let target = Scene::new("s4", "Carol examined the letter.", 4);

    let mut changed = knowledge();
    changed
        .revealed_plot_points
        .push("Carol wrote the letter".to_string());

    let before = hasher.generate_cache_key(&target, 4, &scenes, &knowledge());
    let after = hasher.generate_cache_key(&target, 4, &scenes, &changed);

    assert_eq!(
        before.semantic_signature.scene_fingerprint,
        after.semantic_signature.scene_fingerprint
    );
    assert_eq!(
        before.semantic_signature.context_fingerprint,
        after.semantic_signature.context_fingerprint
    );
    assert_ne!(
        before.semantic_signature.reader_knowledge_fingerprint,
        after.semantic_signature.reader_knowledge_fingerprint
    );
    assert_ne!(before.storage_key(), after.storage_key());
}

#[test]
fn test_context_axis_is_independent() {
    let hasher = SemanticHasher::default();
    let target = Scene::new("s4", "Carol examined the letter.", 4);
    let mut edited = story();
    edited[1] = Scene::new("s2", "Bob hid the revolver in the cabin at midnight.", 2);

    let before = hasher.generate_cache_key(&target, 4, &story(), &knowledge());
    let after = hasher.generate_cache_key(&target, 4, &edited, &knowledge());

    assert_eq!(
        before.semantic_signature.scene_fingerprint,
        after.semantic_signature.scene_fingerprint
    );
    assert_ne!(
        before.semantic_signature.context_fingerprint,
        after.semantic_signature.context_fingerprint
    );
    assert_eq!(
        before.semantic_signature.reader_knowledge_fingerprint,
        after.semantic_signature.reader_knowledge_fingerprint
    );
}

#[test]
fn test_scenes_at_or_after_target_are_ignored() {
    let hasher = SemanticHasher::default();
    let mut with_future = story();
    with_future.push(Scene::new("s9", "Dave arrived much later.", 9));

    assert_eq!(
        hasher.hash_scene_context(&story(), 4),
        hasher.hash_scene_context(&with_future, 4)
    );
}

#[test]
fn test_reader_knowledge_value_matches_typed() {
    let hasher = SemanticHasher::default();
    let value = json!({
        "knownCharacters": ["Bob", "Alice"],
        "establishedTimeline": [{"label": "train departs", "when": 100}],
        "revealedPlotPoints": ["The letter is forged"],
        "establishedSettings": [{"name": "Night train"}],
    });

    assert_eq!(
        hasher.hash_reader_knowledge_value(&value),
        hasher.hash_reader_knowledge(&knowledge())
    );
    assert_eq!(
        hasher.hash_reader_knowledge_value(&json!({})),
        hasher.hash_reader_knowledge(&ReaderKnowledge::default())
    );
}

struct UppercaseOnlyAnalyzer;

impl LinguisticAnalyzer for UppercaseOnlyAnalyzer {
    fn name(&self) -> &str {
        "uppercase-only"
    }

    fn analyze(&self, text: &str) -> Result<Entities> {
        if text.is_empty() {
            return Err(CacheError::Other("empty text".to_string()));
        }
        Ok(Entities {
            people: text
                .split_whitespace()
                .filter(|w| w.chars().all(|c| c.is_uppercase()))
                .map(|w| w.to_string())
                .collect(),
            ..Default::default()
        })
    }
}

#[test]
fn test_custom_analyzer_is_used() {
    let custom = SemanticHasher::new(EntityExtractor::with_analyzer(Arc::new(UppercaseOnlyAnalyzer)));
    let lexicon = SemanticHasher::new(EntityExtractor::lexicon());
    let scene = Scene::new("s1", "NASA called Alice.", 1);

    assert!(custom.extractor().has_analyzer());
    assert!(custom.character_names(&scene).contains("nasa"));
    assert_ne!(
        custom.hash_scene_content(&scene.text),
        lexicon.hash_scene_content(&scene.text)
    );
}

#[test]
fn test_heuristic_and_lexicon_both_deterministic() {
    for hasher in [
        SemanticHasher::new(EntityExtractor::heuristic()),
        SemanticHasher::new(EntityExtractor::lexicon()),
    ] {
        let scene = Scene::new("s1", "Alice met Bob at noon.", 3);
        assert_eq!(
            hasher.generate_cache_key(&scene, 3, &[], &ReaderKnowledge::default()),
            hasher.generate_cache_key(&scene, 3, &[], &ReaderKnowledge::default())
        );
    }
}
