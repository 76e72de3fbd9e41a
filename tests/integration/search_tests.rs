//! Integration tests for the Elasticsearch backend and index sync
//!
//! An Elasticsearch node is stood in for by a wiremock server.

use courtside::search::{ElasticsearchIndex, IndexDocument, SearchError, SearchIndex, SyncedStore};
use courtside::storage::PlayerStore;
use courtside::PlayerRecord;
use serde_json::{json, Map};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn document(id: i64, name: &str) -> IndexDocument {
    let mut fields = Map::new();
    fields.insert("player_name".into(), json!(name));
    fields.insert("position".into(), json!("C"));
    IndexDocument { id, fields }
}

fn hits(ids: &[i64], total: u64) -> serde_json::Value {
    json!({
        "took": 1,
        "hits": {
            "total": { "value": total, "relation": "eq" },
            "hits": ids.iter().map(|id| json!({ "_id": id.to_string(), "_score": 1.0 })).collect::<Vec<_>>()
        }
    })
}

#[tokio::test]
async fn test_upsert_puts_document() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/player/_doc/7"))
        .and(body_json(json!({ "player_name": "Shaquille O'Neal", "position": "C" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "result": "created" })))
        .expect(1)
        .mount(&server)
        .await;

    let index = ElasticsearchIndex::new(Some(&server.uri())).unwrap();
    index
        .upsert("player", &document(7, "Shaquille O'Neal"))
        .await
        .expect("Upsert failed");
}

#[tokio::test]
async fn test_delete_tolerates_missing_document() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/player/_doc/99"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "result": "not_found" })))
        .expect(1)
        .mount(&server)
        .await;

    let index = ElasticsearchIndex::new(Some(&server.uri())).unwrap();
    assert!(index.delete("player", 99).await.is_ok());
}

#[tokio::test]
async fn test_search_sends_multi_match() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/player/_search"))
        .and(body_json(json!({
            "query": { "multi_match": { "query": "guard", "fields": ["*"] } },
            "from": 25,
            "size": 25
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(hits(&[3, 1, 2], 53)))
        .expect(1)
        .mount(&server)
        .await;

    let index = ElasticsearchIndex::new(Some(&server.uri())).unwrap();
    let result = index.search("player", "guard", 25, 25).await.unwrap();

    assert_eq!(result.ids, vec![3, 1, 2]);
    assert_eq!(result.total, 53);
    assert_eq!(result.raw["took"], json!(1));
}

#[tokio::test]
async fn test_search_missing_index_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/player/_search"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let index = ElasticsearchIndex::new(Some(&server.uri())).unwrap();
    let result = index.search("player", "anyone", 0, 10).await.unwrap();
    assert!(result.ids.is_empty());
    assert_eq!(result.total, 0);
}

#[tokio::test]
async fn test_server_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500).set_body_string("cluster red"))
        .mount(&server)
        .await;

    let index = ElasticsearchIndex::new(Some(&server.uri())).unwrap();
    let result = index.upsert("player", &document(1, "A")).await;
    assert!(matches!(result, Err(SearchError::Status { status: 500, .. })));
}

#[tokio::test]
async fn test_store_search_against_elasticsearch() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/player/_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hits(&[3, 1, 2], 3)))
        .mount(&server)
        .await;

    let index = ElasticsearchIndex::new(Some(&server.uri())).unwrap();
    let store = SyncedStore::new(PlayerStore::new_in_memory().unwrap(), index, "player");

    let (ids, outcome) = store
        .transaction(|session| {
            let mut ids = Vec::new();
            for name in ["Hakeem Olajuwon", "Patrick Ewing", "David Robinson"] {
                ids.push(session.add(PlayerRecord::named(name))?.id);
            }
            Ok(ids)
        })
        .await
        .unwrap();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(outcome.upserted, 3);

    let results = store.search("center", 1, 25).await.unwrap();
    let names: Vec<&str> = results
        .items
        .iter()
        .map(|p| p.record.player_name.as_str())
        .collect();
    assert_eq!(names, vec!["David Robinson", "Hakeem Olajuwon", "Patrick Ewing"]);
    assert_eq!(results.total, 3);
}

#[tokio::test]
async fn test_unreachable_cluster_degrades() {
    // Nothing listens on the discard port
    let index = ElasticsearchIndex::new(Some("http://127.0.0.1:9")).unwrap();
    let store = SyncedStore::new(PlayerStore::new_in_memory().unwrap(), index, "player");

    let (player, outcome) = store
        .transaction(|session| session.add(PlayerRecord::named("Yao Ming")))
        .await
        .expect("Commit must succeed without the index");
    assert_eq!(outcome.failed, 1);
    assert!(store.get(player.id).unwrap().is_some());

    let results = store.search("yao", 1, 10).await.unwrap();
    assert!(results.is_empty());
    assert_eq!(results.total, 0);
}
