//! Analysis Cache Demo
//!
//! Walks a short story through the cache: cold misses, warm hits, a
//! reformatted scene that still hits, and invalidation after an edit.
//!
//! Usage:
//!   cargo run --example cache_demo
//!
//! Environment variables:
//!   CONTINUITY_CACHE_DB_PATH - database file (default: a temporary directory)
//!   RUST_LOG                 - log filter (default: info)

use continuity_cache::{AnalysisCache, CacheConfig, ReaderKnowledge, Scene};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ContinuityAnalysis {
    scene_id: String,
    issues: Vec<String>,
    confidence: f64,
}

/// Stand-in for the expensive model call whose results are cached
async fn analyze(scene: &Scene, previous: &[Scene]) -> ContinuityAnalysis {
    tokio::time::sleep(Duration::from_millis(150)).await;
    let issues = if scene.text.contains("noon") && previous.iter().any(|s| s.text.contains("noon")) {
        vec!["Two scenes claim the same noon".to_string()]
    } else {
        Vec::new()
    };

    ContinuityAnalysis {
        scene_id: scene.id.clone(),
        issues,
        confidence: 0.9,
    }
}

async fn analyze_cached(
    cache: &AnalysisCache,
    scene: &Scene,
    previous: &[Scene],
    knowledge: &ReaderKnowledge,
) -> ContinuityAnalysis {
    if let Some(cached) = cache.get(scene, scene.position, previous, knowledge).await {
        info!("  {} -> cached", scene.id);
        return cached;
    }

    let started = Instant::now();
    let analysis = analyze(scene, previous).await;
    cache
        .set(
            scene,
            scene.position,
            previous,
            knowledge,
            &analysis,
            Some(started.elapsed()),
        )
        .await;
    info!("  {} -> analyzed in {:?}", scene.id, started.elapsed());
    analysis
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,continuity_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("=== Analysis Cache Demo ===");

    let scratch = tempfile::tempdir()?;
    let mut config = CacheConfig::from_env();
    if config.db_path.is_none() {
        config.db_path = Some(scratch.path().join("analysis_cache.db"));
    }
    config.validate()?;
    info!("Database: {:?}", config.resolved_db_path());

    let cache = AnalysisCache::new(config);
    let persistent = cache.init().await;
    info!("Persistent tier active: {}", persistent);

    let mut scenes = vec![
        Scene::new("s1", "Alice boarded the night train at dawn.", 1),
        Scene::new("s2", "Bob found a letter in the dining car.", 2),
        Scene::new("s3", "Alice met Bob at noon.", 3),
    ];
    let mut knowledge = ReaderKnowledge::default();
    knowledge.known_characters.insert("Alice".to_string());

    let warmed = cache.warm_cache(&scenes).await;
    info!("Warmed {} keys", warmed);

    info!("\n--- First pass (cold) ---");
    for i in 0..scenes.len() {
        analyze_cached(&cache, &scenes[i], &scenes[..i], &knowledge).await;
    }

    info!("\n--- Second pass (warm) ---");
    for i in 0..scenes.len() {
        analyze_cached(&cache, &scenes[i], &scenes[..i], &knowledge).await;
    }

    info!("\n--- Reformatted scene ---");
    let reformatted = Scene::new("s3", "Alice   met Bob at noon!!", 3);
    analyze_cached(&cache, &reformatted, &scenes[..2], &knowledge).await;

    info!("\n--- Editing scene s2 ---");
    scenes[1] = Scene::new("s2", "Bob burned the letter at noon.", 2);
    let event = cache.invalidate_scene("s2").await;
    info!("Invalidated: {} ({} entries)", event.reason, event.removed());

    for i in 1..scenes.len() {
        let analysis = analyze_cached(&cache, &scenes[i], &scenes[..i], &knowledge).await;
        if !analysis.issues.is_empty() {
            info!("  issues in {}: {:?}", analysis.scene_id, analysis.issues);
        }
    }

    info!("\n--- Statistics ---");
    info!("{}", cache.stats());

    let removed = cache.cleanup().await;
    info!("Expired entries removed: {}", removed);

    Ok(())
}
