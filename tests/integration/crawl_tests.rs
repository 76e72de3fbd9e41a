//! Integration tests for the crawler
//!
//! These tests use wiremock to serve player pages and run the full
//! queue → pool → extract → persist → index cycle end-to-end.

use crate::common::{fast_settings, player_page};
use courtside::config::{Config, CrawlerConfig, StorageConfig};
use courtside::crawler::{
    run_crawl, CrawlCoordinator, CrawlKind, HttpFetcherFactory, ImageExtractor, PlayerExtractor,
};
use courtside::search::{MemoryIndex, SyncedStore};
use courtside::storage::{PlayerStore, RunStatus};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

fn synced_store(dir: &TempDir, index: MemoryIndex) -> Arc<SyncedStore<MemoryIndex>> {
    let store = PlayerStore::new(&dir.path().join("players.db")).expect("Failed to open store");
    Arc::new(SyncedStore::new(store, index, "player"))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_full_crawl_with_flaky_page() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/players/d/duncati01.html",
        player_page("Tim Duncan", "duncati01.jpg", &["PF", "C"], 19.0),
    )
    .await;
    mount_page(
        &server,
        "/players/b/bryanko01.html",
        player_page("Kobe Bryant", "bryanko01.jpg", &["SG", "SF", "SG"], 25.0),
    )
    .await;

    // First request fails, later ones succeed
    Mock::given(method("GET"))
        .and(path("/players/n/nashst01.html"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/players/n/nashst01.html",
        player_page("Steve Nash", "nashst01.jpg", &["PG"], 14.3),
    )
    .await;

    let urls: Vec<String> = ["d/duncati01", "b/bryanko01", "n/nashst01"]
        .iter()
        .map(|p| format!("{}/players/{}.html", server.uri(), p))
        .collect();

    let dir = TempDir::new().unwrap();
    let index = MemoryIndex::new();
    let store = synced_store(&dir, index.clone());
    let coordinator = CrawlCoordinator::new(store.clone(), fast_settings(2));
    let factory = HttpFetcherFactory::from_config(&Default::default()).unwrap();

    let report = coordinator
        .run(urls, &factory, PlayerExtractor)
        .await
        .expect("Crawl failed");

    assert_eq!(report.submitted, 3);
    assert_eq!(report.persisted, 3);
    assert_eq!(report.failures, 1);
    assert_eq!(report.abandoned, 0);
    assert!(report.is_complete());

    let players = store.all().unwrap();
    assert_eq!(players.len(), 3);

    let kobe = players
        .iter()
        .find(|p| p.record.player_name == "Kobe Bryant")
        .expect("Kobe Bryant not stored");
    assert_eq!(kobe.record.position, "SF, SG");
    assert_eq!(kobe.record.first_nba_season, Some(1996));
    assert_eq!(kobe.record.stats.points, Some(25.0));
    assert_eq!(kobe.record.stats.true_stg_pct, Some(0.55));
    assert_eq!(kobe.record.player_image.as_deref(), Some("bryanko01.jpg"));

    // Every stored row is searchable
    assert_eq!(index.len("player"), 3);
    for player in &players {
        assert!(index.contains("player", player.id));
    }

    let results = store.search("nash", 1, 10).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results.items[0].record.player_name, "Steve Nash");
}

#[tokio::test]
async fn test_page_without_name_is_abandoned() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/players/x/broken.html",
        "<html><body><p>Page moved</p></body></html>".to_string(),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let store = synced_store(&dir, MemoryIndex::new());
    let mut settings = fast_settings(1);
    settings.max_attempts = 2;
    let coordinator = CrawlCoordinator::new(store.clone(), settings);
    let factory = HttpFetcherFactory::from_config(&Default::default()).unwrap();

    let report = coordinator
        .run(
            vec![format!("{}/players/x/broken.html", server.uri())],
            &factory,
            PlayerExtractor,
        )
        .await
        .unwrap();

    assert_eq!(report.failures, 2);
    assert_eq!(report.abandoned, 1);
    assert_eq!(store.count().unwrap(), 0);
}

#[tokio::test]
async fn test_image_backfill_updates_existing_rows() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/players/p/parketo01.html",
        player_page("Tony Parker", "parketo01.jpg", &["PG"], 15.5),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let index = MemoryIndex::new();
    let store = synced_store(&dir, index.clone());
    let (player, _) = store
        .transaction(|session| session.add(courtside::PlayerRecord::named("Tony Parker")))
        .await
        .unwrap();
    assert!(player.record.player_image.is_none());

    let coordinator = CrawlCoordinator::new(store.clone(), fast_settings(1));
    let factory = HttpFetcherFactory::from_config(&Default::default()).unwrap();
    let report = coordinator
        .run(
            vec![format!("{}/players/p/parketo01.html", server.uri())],
            &factory,
            ImageExtractor,
        )
        .await
        .unwrap();

    assert_eq!(report.persisted, 1);
    let stored = store.get(player.id).unwrap().unwrap();
    assert_eq!(stored.record.player_image.as_deref(), Some("parketo01.jpg"));
    assert_eq!(store.count().unwrap(), 1);
    assert!(index.contains("player", player.id));
}

#[tokio::test]
async fn test_run_crawl_records_run() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/players/g/garneke01.html",
        player_page("Kevin Garnett", "garneke01.jpg", &["PF"], 17.8),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("players.db");
    let config = Config {
        crawler: CrawlerConfig {
            workers: Some(2),
            retry_delay_ms: 0,
            ..Default::default()
        },
        storage: StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
        },
        ..Default::default()
    };

    let report = run_crawl(
        &config,
        "0123abcd",
        vec![format!("{}/players/g/garneke01.html", server.uri())],
        CrawlKind::Players,
    )
    .await
    .expect("Crawl failed");
    assert_eq!(report.persisted, 1);
    assert_eq!(report.workers, 2);

    let store = PlayerStore::new(&db_path).unwrap();
    assert_eq!(store.count().unwrap(), 1);

    let run = store.get_run(1).unwrap();
    assert_eq!(run.kind, "players");
    assert_eq!(run.config_hash, "0123abcd");
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.persisted, Some(1));
    assert!(run.finished_at.is_some());
}
