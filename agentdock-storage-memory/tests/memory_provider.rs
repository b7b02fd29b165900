use agentdock_core::{AgentId, ExtractionMethod, MemoryConnection, ConnectionType, Tier, UserId};
use agentdock_storage::{
    DecayRules, Embedding, HybridSearchOptions, MemoryOps, MemoryPatch, NewMemory, RecallOptions,
    StorageOptions, StorageProvider, VectorOps,
};
use agentdock_storage_memory::MemoryProvider;

fn memory(content: &str, importance: f64) -> NewMemory {
    NewMemory {
        content: content.into(),
        tier: Tier::Episodic,
        importance,
        session_id: None,
        keywords: vec![],
        metadata: Default::default(),
        extraction_method: ExtractionMethod::Manual,
        token_count: None,
        batch_id: None,
        source_message_ids: vec![],
    }
}

// --- KV CRUD ---

#[tokio::test]
async fn kv_set_get_delete_roundtrip() {
    let provider = MemoryProvider::new();
    let opts = StorageOptions::namespace("test");
    provider.set("a", serde_json::json!(1), &opts).await.unwrap();
    assert_eq!(provider.get("a", &opts).await.unwrap(), Some(serde_json::json!(1)));
    assert!(provider.delete("a", &opts).await.unwrap());
    assert_eq!(provider.get("a", &opts).await.unwrap(), None);
}

#[tokio::test]
async fn kv_exists_default_impl_follows_get() {
    let provider = MemoryProvider::new();
    let opts = StorageOptions::namespace("test");
    assert!(!provider.exists("a", &opts).await.unwrap());
    provider.set("a", serde_json::json!(1), &opts).await.unwrap();
    assert!(provider.exists("a", &opts).await.unwrap());
}

#[tokio::test]
async fn kv_batch_get_and_set() {
    let provider = MemoryProvider::new();
    let opts = StorageOptions::namespace("test");
    let items = vec![("a".to_string(), serde_json::json!(1)), ("b".to_string(), serde_json::json!(2))];
    provider.set_many(&items, &opts).await.unwrap();
    let fetched = provider.get_many(&["a".to_string(), "b".to_string(), "missing".to_string()], &opts).await.unwrap();
    assert_eq!(fetched.len(), 2);
}

// --- Namespace isolation ---

#[tokio::test]
async fn namespaces_fully_isolate_keys() {
    let provider = MemoryProvider::new();
    provider.set("shared", serde_json::json!("one"), &StorageOptions::namespace("ns-a")).await.unwrap();
    provider.set("shared", serde_json::json!("two"), &StorageOptions::namespace("ns-b")).await.unwrap();

    assert_eq!(provider.get("shared", &StorageOptions::namespace("ns-a")).await.unwrap(), Some(serde_json::json!("one")));
    assert_eq!(provider.get("shared", &StorageOptions::namespace("ns-b")).await.unwrap(), Some(serde_json::json!("two")));
}

// --- TTL ---

#[tokio::test]
async fn ttl_expired_key_reads_as_absent() {
    let provider = MemoryProvider::new();
    let opts = StorageOptions::namespace("test").with_ttl(-1);
    provider.set("a", serde_json::json!(1), &opts).await.unwrap();
    assert_eq!(provider.get("a", &StorageOptions::namespace("test")).await.unwrap(), None);
}

// --- Memory CRUD and tenancy ---

#[tokio::test]
async fn memory_records_are_scoped_to_their_owner() {
    let provider = MemoryProvider::new();
    let owner = UserId::new("owner");
    let intruder = UserId::new("intruder");
    let agent = AgentId::new("agent-1");

    let id = MemoryOps::store(&provider, &owner, &agent, memory("owner's secret", 0.5)).await.unwrap();
    assert!(provider.get_by_id(&owner, &id).await.unwrap().is_some());
    assert!(provider.get_by_id(&intruder, &id).await.unwrap().is_none());
}

#[tokio::test]
async fn recall_honors_tier_and_importance_filters() {
    let provider = MemoryProvider::new();
    let user = UserId::new("u1");
    let agent = AgentId::new("a1");

    let mut low = memory("low importance working memory", 0.1);
    low.tier = Tier::Working;
    let mut high = memory("high importance semantic fact", 0.9);
    high.tier = Tier::Semantic;
    MemoryOps::store(&provider, &user, &agent, low).await.unwrap();
    MemoryOps::store(&provider, &user, &agent, high).await.unwrap();

    let opts = RecallOptions {
        tiers: vec![Tier::Semantic],
        min_importance: Some(0.5),
        ..Default::default()
    };
    let results = provider.recall(&user, &agent, "", &opts).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].tier, Tier::Semantic);
}

#[tokio::test]
async fn decay_removes_low_resonance_records_from_recall() {
    let provider = MemoryProvider::new();
    let user = UserId::new("u1");
    let agent = AgentId::new("a1");
    let mut low = memory("forgettable", 0.0);
    low.tier = Tier::Working;
    MemoryOps::store(&provider, &user, &agent, low).await.unwrap();

    let outcome = provider
        .apply_decay(&user, &agent, DecayRules { rate: 50.0, importance_weight: 0.0, access_boost: 0.0, floor: 0.01 })
        .await
        .unwrap();
    assert_eq!(outcome.removed, 1);

    let results = provider.recall(&user, &agent, "", &RecallOptions::default()).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn patch_merges_metadata_rather_than_replacing() {
    let provider = MemoryProvider::new();
    let user = UserId::new("u1");
    let agent = AgentId::new("a1");
    let mut m = memory("has metadata", 0.5);
    m.metadata.insert("source".into(), serde_json::json!("chat"));
    let id = MemoryOps::store(&provider, &user, &agent, m).await.unwrap();

    let mut patch_meta = std::collections::HashMap::new();
    patch_meta.insert("reviewed".to_string(), serde_json::json!(true));
    provider
        .update(&user, &agent, &id, MemoryPatch { metadata: Some(patch_meta), ..Default::default() })
        .await
        .unwrap();

    let record = provider.get_by_id(&user, &id).await.unwrap().unwrap();
    assert_eq!(record.metadata.get("source"), Some(&serde_json::json!("chat")));
    assert_eq!(record.metadata.get("reviewed"), Some(&serde_json::json!(true)));
}

// --- Connection graph ---

#[tokio::test]
async fn find_connected_respects_min_strength_filter() {
    let provider = MemoryProvider::new();
    let user = UserId::new("u1");
    let agent = AgentId::new("a1");
    let a = MemoryOps::store(&provider, &user, &agent, memory("a", 0.5)).await.unwrap();
    let b = MemoryOps::store(&provider, &user, &agent, memory("b", 0.5)).await.unwrap();

    provider
        .create_connections(&user, vec![MemoryConnection {
            source_id: a.clone(),
            target_id: b.clone(),
            connection_type: ConnectionType::Related,
            strength: 0.2,
            reason: None,
            created_at: chrono::Utc::now(),
        }])
        .await
        .unwrap();

    let result = provider.find_connected(&user, &a, 2, 0.5).await.unwrap();
    assert!(result.connections.is_empty());

    let result = provider.find_connected(&user, &a, 2, 0.1).await.unwrap();
    assert_eq!(result.connections.len(), 1);
}

// --- Vector / hybrid search ---

#[tokio::test]
async fn search_by_text_finds_keyword_matches() {
    let provider = MemoryProvider::new();
    let user = UserId::new("u1");
    let agent = AgentId::new("a1");
    provider
        .store_with_embedding(&user, &agent, memory("the quick brown fox", 0.5), Embedding { model: "m".into(), vector: vec![1.0, 0.0] })
        .await
        .unwrap();

    let results = VectorOps::search_by_text(&provider, &user, &agent, "quick", &RecallOptions::default()).await.unwrap();
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn hybrid_search_result_count_is_capped_at_limit() {
    let provider = MemoryProvider::new();
    let user = UserId::new("u1");
    let agent = AgentId::new("a1");
    for i in 0..10 {
        provider
            .store_with_embedding(
                &user,
                &agent,
                memory(&format!("memory number {i}"), 0.5),
                Embedding { model: "m".into(), vector: vec![1.0, i as f32] },
            )
            .await
            .unwrap();
    }

    let opts = HybridSearchOptions { limit: 3, ..Default::default() };
    let query = Embedding { model: "m".into(), vector: vec![1.0, 0.0] };
    let results = provider.hybrid_search(&user, &agent, "memory", &query, &opts).await.unwrap();
    assert!(results.len() <= 3);
}

// --- Concurrent access ---

#[tokio::test]
async fn concurrent_writes_to_distinct_keys_all_land() {
    let provider = std::sync::Arc::new(MemoryProvider::new());
    let mut handles = Vec::new();
    for i in 0..20 {
        let provider = provider.clone();
        handles.push(tokio::spawn(async move {
            let opts = StorageOptions::namespace("concurrent");
            provider.set(&format!("key-{i}"), serde_json::json!(i), &opts).await.unwrap();
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let opts = StorageOptions::namespace("concurrent");
    let keys = provider.list("key-", &opts).await.unwrap();
    assert_eq!(keys.len(), 20);
}

// --- Complex values ---

#[tokio::test]
async fn kv_stores_nested_json_values() {
    let provider = MemoryProvider::new();
    let opts = StorageOptions::namespace("test");
    let value = serde_json::json!({
        "nested": {"list": [1, 2, 3], "flag": true},
        "name": "agentdock",
    });
    provider.set("complex", value.clone(), &opts).await.unwrap();
    assert_eq!(provider.get("complex", &opts).await.unwrap(), Some(value));
}
