//! Inputs and fingerprint types for semantic hashing

use crate::semantic::canonical::{hash_value, sha256_hex};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A narrative scene as supplied by the caller.
///
/// Optional metadata takes precedence over extraction from `text` when
/// present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Scene {
    pub id: String,
    pub text: String,
    pub position: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub characters: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_markers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_markers: Option<Vec<String>>,
}

impl Scene {
    pub fn new(id: impl Into<String>, text: impl Into<String>, position: i64) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            position,
            ..Default::default()
        }
    }

    /// Attach explicit character metadata
    pub fn with_characters<I, S>(mut self, characters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.characters = Some(characters.into_iter().map(Into::into).collect());
        self
    }

    /// Attach explicit timeline metadata
    pub fn with_time_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.time_markers = Some(markers.into_iter().map(Into::into).collect());
        self
    }

    /// Attach explicit location metadata
    pub fn with_location_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.location_markers = Some(markers.into_iter().map(Into::into).collect());
        self
    }
}

/// An event the reader already knows about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub label: String,
    /// Optional ordering key
    #[serde(default)]
    pub when: Option<i64>,
}

impl TimelineEvent {
    pub fn new(label: impl Into<String>, when: Option<i64>) -> Self {
        Self {
            label: label.into(),
            when,
        }
    }
}

/// An established setting or location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub name: String,
}

impl Setting {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Facts the reader is assumed to know at a given narrative point.
///
/// Missing collections deserialize as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReaderKnowledge {
    #[serde(with = "sorted_set")]
    pub known_characters: HashSet<String>,
    pub established_timeline: Vec<TimelineEvent>,
    pub revealed_plot_points: Vec<String>,
    pub established_settings: Vec<Setting>,
}

/// Three independent fingerprints describing a scene at a position
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticSignature {
    pub scene_fingerprint: String,
    pub context_fingerprint: String,
    pub reader_knowledge_fingerprint: String,
}

impl SemanticSignature {
    /// Single digest over all three fingerprints
    pub fn combined(&self) -> String {
        sha256_hex(format!(
            "{}:{}:{}",
            self.scene_fingerprint, self.context_fingerprint, self.reader_knowledge_fingerprint
        ))
    }
}

/// Structured cache key. The storage layer only sees [`CacheKey::storage_key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheKey {
    pub scene_id: String,
    pub position: i64,
    pub semantic_signature: SemanticSignature,
}

impl CacheKey {
    /// Fixed-size storage key: SHA-256 over the canonical JSON form
    pub fn storage_key(&self) -> String {
        let value = serde_json::json!({
            "sceneId": self.scene_id,
            "position": self.position,
            "semanticSignature": {
                "sceneFingerprint": self.semantic_signature.scene_fingerprint,
                "contextFingerprint": self.semantic_signature.context_fingerprint,
                "readerKnowledgeFingerprint": self.semantic_signature.reader_knowledge_fingerprint,
            },
        });
        hash_value(&value)
    }
}

/// Serde helper that writes sets as sorted arrays so serialized payloads
/// are deterministic.
///
/// ```
/// use std::collections::HashSet;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Issue {
///     #[serde(with = "continuity_cache::semantic::sorted_set")]
///     characters: HashSet<String>,
/// }
///
/// let issue = Issue { characters: ["bob".to_string(), "alice".to_string()].into() };
/// assert_eq!(serde_json::to_string(&issue).unwrap(), r#"{"characters":["alice","bob"]}"#);
/// ```
pub mod sorted_set {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::HashSet;
    use std::hash::Hash;

    pub fn serialize<T, S>(set: &HashSet<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize + Ord,
        S: Serializer,
    {
        let mut items: Vec<&T> = set.iter().collect();
        items.sort();
        items.serialize(serializer)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<HashSet<T>, D::Error>
    where
        T: Deserialize<'de> + Eq + Hash,
        D: Deserializer<'de>,
    {
        let items = Vec::<T>::deserialize(deserializer)?;
        Ok(items.into_iter().collect())
    }
}
