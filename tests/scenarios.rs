//! Integration tests against a live `mongod`/replica-set deployment.
//!
//! These exercise the container end-to-end and cannot run without a real
//! server: change streams require a replica set, and tailable cursors
//! require a capped collection. Set `MONGODB_URI` and drop `#[ignore]`
//! locally, or run with `cargo test -- --ignored`.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{Context, Result};
use bson::{doc, oid::ObjectId, Document};
use mongo_change_feed::{
    options::{ChangeStreamOptions, TailingOptions},
    Container, SubscriptionRequest,
};
use mongodb::{options::ClientOptions, Client, Database};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};

async fn test_database() -> Result<Database> {
    let uri = std::env::var("MONGODB_URI").context("MONGODB_URI must be set")?;
    let options = ClientOptions::parse(uri).await?;
    let client = Client::with_options(options)?;
    Ok(client.database(&format!("change_feed_test_{}", ObjectId::new())))
}

async fn create_capped(db: &Database, name: &str) -> Result<()> {
    db.create_collection(name)
        .capped(true)
        .size(1024 * 1024)
        .await?;
    Ok(())
}

async fn wait_until(mut predicate: impl FnMut() -> bool, timeout: Duration) {
    let step = Duration::from_millis(25);
    let mut waited = Duration::ZERO;
    while !predicate() && waited < timeout {
        tokio::time::sleep(step).await;
        waited += step;
    }
}

fn collecting_listener<T: Send + 'static>() -> (
    mongo_change_feed::request::Listener<T>,
    Arc<Mutex<Vec<T>>>,
)
where
    T: Sync,
{
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let listener: mongo_change_feed::request::Listener<T> = Arc::new(move |message| {
        if let Ok(Some(body)) = message.body() {
            sink.lock().unwrap().push(body);
        }
    });
    (listener, received)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Person {
    #[serde(rename = "_id")]
    id: String,
    firstname: String,
}

#[tokio::test]
#[ignore = "requires a live MongoDB replica set; set MONGODB_URI and run with --ignored"]
async fn start_insert_and_receive_in_order() -> Result<()> {
    let db = test_database().await?;
    create_capped(&db, "col").await?;
    let container = Container::new(db.clone());

    let (listener, received) = collecting_listener::<Document>();
    container.register(SubscriptionRequest::new(
        TailingOptions::builder().collection_name("col").build(),
        move |message| listener(message),
    ))?;
    container.start();

    let coll = db.collection::<Document>("col");
    coll.insert_one(doc! { "_id": "id-1", "value": "foo" }).await?;
    coll.insert_one(doc! { "_id": "id-2", "value": "bar" }).await?;

    wait_until(|| received.lock().unwrap().len() == 2, Duration::from_secs(5)).await;
    container.stop();

    assert_eq!(
        received.lock().unwrap().clone(),
        vec![
            doc! { "_id": "id-1", "value": "foo" },
            doc! { "_id": "id-2", "value": "bar" },
        ]
    );
    Ok(())
}

#[tokio::test]
#[ignore = "requires a live MongoDB replica set; set MONGODB_URI and run with --ignored"]
async fn stop_halts_delivery() -> Result<()> {
    let db = test_database().await?;
    let container = Container::new(db.clone());

    let (listener, received) = collecting_listener::<Document>();
    container.register(SubscriptionRequest::new(
        ChangeStreamOptions::builder().collection_name("col").build(),
        move |message| listener(message),
    ))?;
    container.start();

    let coll = db.collection::<Document>("col");
    coll.insert_one(doc! { "_id": "id-1" }).await?;
    coll.insert_one(doc! { "_id": "id-2" }).await?;
    wait_until(|| received.lock().unwrap().len() == 2, Duration::from_secs(5)).await;

    container.stop();
    coll.insert_one(doc! { "_id": "id-3" }).await?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(received.lock().unwrap().len(), 2);
    Ok(())
}

#[tokio::test]
#[ignore = "requires a live MongoDB replica set; set MONGODB_URI and run with --ignored"]
async fn register_after_start_only_sees_later_events() -> Result<()> {
    let db = test_database().await?;
    let container = Container::new(db.clone());
    container.start();

    let coll = db.collection::<Document>("col");
    coll.insert_one(doc! { "_id": "id-1" }).await?;

    let (listener, received) = collecting_listener::<Document>();
    let subscription = container.register(SubscriptionRequest::new(
        ChangeStreamOptions::builder().collection_name("col").build(),
        move |message| listener(message),
    ))?;
    wait_until(|| subscription.is_active(), Duration::from_secs(5)).await;

    coll.insert_one(doc! { "_id": "id-2", "value": "bar" }).await?;
    wait_until(|| received.lock().unwrap().len() == 1, Duration::from_secs(5)).await;
    container.stop();

    assert_eq!(
        received.lock().unwrap().clone(),
        vec![doc! { "_id": "id-2", "value": "bar" }]
    );
    Ok(())
}

#[tokio::test]
#[ignore = "requires a live MongoDB replica set; set MONGODB_URI and run with --ignored"]
async fn typed_target_converts_the_full_document() -> Result<()> {
    let db = test_database().await?;
    let container = Container::new(db.clone());

    let (listener, received) = collecting_listener::<Person>();
    container.register(SubscriptionRequest::new(
        ChangeStreamOptions::builder().collection_name("col").build(),
        move |message| listener(message),
    ))?;
    container.start();

    let coll = db.collection::<Document>("col");
    coll.insert_one(doc! { "_id": "id-1", "firstname": "foo" }).await?;
    wait_until(|| received.lock().unwrap().len() == 1, Duration::from_secs(5)).await;
    container.stop();

    assert_eq!(
        received.lock().unwrap().clone(),
        vec![Person {
            id: "id-1".into(),
            firstname: "foo".into(),
        }]
    );
    Ok(())
}

#[tokio::test]
#[ignore = "requires a live MongoDB replica set; set MONGODB_URI and run with --ignored"]
async fn resume_token_skips_already_seen_events() -> Result<()> {
    let db = test_database().await?;
    let coll = db.collection::<Document>("col");

    let container_a = Container::new(db.clone());
    let (listener_a, received_a) = collecting_listener::<Document>();
    container_a.register(SubscriptionRequest::new(
        ChangeStreamOptions::builder().collection_name("col").build(),
        move |message| listener_a(message),
    ))?;
    container_a.start();

    coll.insert_one(doc! { "_id": "id-1" }).await?;
    coll.insert_one(doc! { "_id": "id-2" }).await?;
    coll.insert_one(doc! { "_id": "id-3" }).await?;
    wait_until(|| received_a.lock().unwrap().len() == 3, Duration::from_secs(5)).await;
    container_a.stop();

    // The first message's raw event carries the resume token to continue
    // from; in a real caller this is read off `message.raw()["_id"]`.
    let resume_token = {
        let messages = received_a.lock().unwrap();
        bson::to_document(&messages[0]).unwrap()
    };

    let container_b = Container::new(db.clone());
    let (listener_b, received_b) = collecting_listener::<Document>();
    container_b.register(SubscriptionRequest::new(
        ChangeStreamOptions::builder()
            .collection_name("col")
            .resume_token(resume_token)
            .build(),
        move |message| listener_b(message),
    ))?;
    container_b.start();

    wait_until(|| received_b.lock().unwrap().len() == 2, Duration::from_secs(5)).await;
    container_b.stop();

    assert_eq!(received_b.lock().unwrap().len(), 2);
    Ok(())
}

#[tokio::test]
#[ignore = "requires a live MongoDB replica set; set MONGODB_URI and run with --ignored"]
async fn update_full_document_policy_differs_by_target_type() -> Result<()> {
    let db = test_database().await?;
    let coll = db.collection::<Document>("col");
    coll.insert_one(doc! { "_id": "id-1", "firstname": "foo", "age": 7 }).await?;

    let typed_container = Container::new(db.clone());
    let (typed_listener, typed_received) = collecting_listener::<Person>();
    typed_container.register(SubscriptionRequest::new(
        ChangeStreamOptions::builder().collection_name("col").build(),
        move |message| typed_listener(message),
    ))?;
    typed_container.start();

    let generic_container = Container::new(db.clone());
    let (generic_listener, generic_received) = collecting_listener::<Document>();
    generic_container.register(SubscriptionRequest::new(
        ChangeStreamOptions::builder().collection_name("col").build(),
        move |message| generic_listener(message),
    ))?;
    generic_container.start();

    coll.update_one(doc! { "_id": "id-1" }, doc! { "$set": { "age": 8 } })
        .await?;

    wait_until(
        || typed_received.lock().unwrap().len() == 1,
        Duration::from_secs(5),
    )
    .await;
    typed_container.stop();
    generic_container.stop();

    assert_eq!(typed_received.lock().unwrap()[0].firstname, "foo");
    Ok(())
}
