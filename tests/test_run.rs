mod memory_stream;

use crate::memory_stream::MemoryStreamFactory;
use docudb::bson;
use docudb::bson::Document;
use docudb::engine::{BsonAutoId, LiteEngine, LiteSettings, Order};
use docudb::expression::BsonExpression;
use futures::prelude::*;

fn widget(name: &str, weight: i32) -> Document {
    let mut doc = Document::new();
    doc.insert("name".to_string(), name);
    doc.insert("weight".to_string(), weight);
    doc
}

async fn open_database() -> LiteEngine<MemoryStreamFactory> {
    let settings = LiteSettings {
        data_stream: MemoryStreamFactory::with_data(Default::default()),
        log_stream: MemoryStreamFactory::absent(),
        temp_stream: MemoryStreamFactory::absent(),
        auto_build: false,
        collation: None,
    };

    LiteEngine::new(settings).await.unwrap()
}

#[tokio::test]
async fn full_crud_and_index_round_trip() {
    let mut engine = open_database().await;

    assert!(engine.get_collection_names().is_empty());

    let inserted = engine
        .insert(
            "widgets",
            vec![
                widget("gizmo", 12),
                widget("gadget", 7),
                widget("contraption", 20),
            ],
            BsonAutoId::ObjectId,
        )
        .await
        .unwrap();
    assert_eq!(inserted, 3);
    assert_eq!(engine.get_collection_names(), vec!["widgets".to_string()]);

    engine
        .ensure_index(
            "widgets",
            "weight",
            BsonExpression::create("$.weight").unwrap(),
            false,
        )
        .await
        .unwrap();

    let by_weight = engine
        .get_range_indexed(
            "widgets",
            "weight",
            &bson::Value::from(10),
            &bson::Value::from(25),
            Order::Ascending,
        )
        .map_ok(|doc| doc.get("name").cloned().unwrap())
        .try_collect::<Vec<_>>()
        .await
        .unwrap();
    assert_eq!(
        by_weight,
        vec![bson::Value::from("gizmo"), bson::Value::from("contraption")]
    );

    let mut all_names = engine
        .get_all("widgets")
        .map_ok(|doc| doc.get("name").and_then(|v| v.as_str()).unwrap().to_string())
        .try_collect::<Vec<_>>()
        .await
        .unwrap();
    all_names.sort();
    assert_eq!(all_names, vec!["contraption", "gadget", "gizmo"]);

    engine.drop_index("widgets", "weight").await.unwrap();

    let gadget_id = engine
        .get_by_index("widgets", "_id", &bson::Value::Null)
        .try_next()
        .await
        .unwrap();
    assert!(gadget_id.is_none());

    let any_id = {
        let mut stream = Box::pin(engine.get_all("widgets"));
        let doc = stream.try_next().await.unwrap().unwrap();
        doc.get("_id").cloned().unwrap()
    };

    let mut updated_doc = widget("gizmo-v2", 13);
    updated_doc.insert("_id".to_string(), any_id.clone());
    let updated = engine
        .update("widgets", vec![std::mem::take(&mut updated_doc)])
        .await
        .unwrap();
    assert_eq!(updated, 1);

    let upserted = engine
        .upsert(
            "widgets",
            vec![widget("sprocket", 3)],
            BsonAutoId::ObjectId,
        )
        .await
        .unwrap();
    assert_eq!(upserted, 1);

    let deleted = engine.delete("widgets", &[any_id]).await.unwrap();
    assert_eq!(deleted, 1);

    let dropped = engine.drop_collection("widgets").await.unwrap();
    assert!(dropped);
    assert!(engine.get_collection_names().is_empty());

    engine.soft_close().await.unwrap();
}
