//! Remote subscriber against a master router served on a local port.

use syndex_client::{ClientError, RemoteSubscriber};
use syndex_server::config::{Backend, Config};
use syndex_server::{app, AppState};

async fn spawn_master() -> (String, AppState) {
    let state = AppState::build(Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        backend: Backend::Memory,
        data_dir: std::env::temp_dir(),
    })
    .unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{addr}"), state)
}

#[tokio::test]
async fn test_subscriber_lifecycle() {
    let (url, master) = spawn_master().await;
    let subscriber = RemoteSubscriber::new(&url, "app1").unwrap();

    let changes = subscriber.sync("Order").await.unwrap();
    assert!(changes.ids.is_empty());
    assert_eq!(changes.syndex, 0);

    master
        .coordinator
        .ledger()
        .mark_many("Order", &["o1", "o2"])
        .unwrap();

    let changes = subscriber.sync("Order").await.unwrap();
    assert_eq!(changes.ids, vec!["o1", "o2"]);
    assert_eq!(changes.syndex, 2);
    assert_eq!(subscriber.syndex("Order").await.unwrap(), 2);

    let changes = subscriber.sync("Order").await.unwrap();
    assert!(changes.ids.is_empty());
    assert_eq!(changes.syndex, 2);

    // Checkpoints are local; the master holds none for this subscriber
    assert!(master
        .coordinator
        .list_checkpoints("app1")
        .unwrap()
        .is_empty());

    subscriber.set_syndex("Order", 1).await.unwrap();
    assert_eq!(subscriber.sync("Order").await.unwrap().ids, vec!["o2"]);

    subscriber.flush().await.unwrap();
    assert_eq!(subscriber.syndex("Order").await.unwrap(), 0);
    assert_eq!(
        subscriber.sync("Order").await.unwrap().ids,
        vec!["o1", "o2"]
    );
}

#[tokio::test]
async fn test_subscribers_are_independent() {
    let (url, master) = spawn_master().await;
    let app1 = RemoteSubscriber::new(&url, "app1").unwrap();
    let app2 = RemoteSubscriber::new(&url, "app2").unwrap();

    master.coordinator.ledger().mark("User", "u1").unwrap();
    assert_eq!(app1.sync("User").await.unwrap().ids, vec!["u1"]);

    master.coordinator.ledger().mark("User", "u2").unwrap();
    assert_eq!(app1.sync("User").await.unwrap().ids, vec!["u2"]);
    assert_eq!(app2.sync("User").await.unwrap().ids, vec!["u1", "u2"]);
}

#[tokio::test]
async fn test_checkpoints_survive_restart() {
    let (url, master) = spawn_master().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("subscriber.json");

    master
        .coordinator
        .ledger()
        .mark_many("Order", &["o1", "o2"])
        .unwrap();
    {
        let subscriber = RemoteSubscriber::open(&url, "app1", &path).unwrap();
        subscriber.sync("Order").await.unwrap();
    }
    master.coordinator.ledger().mark("Order", "o3").unwrap();

    let subscriber = RemoteSubscriber::open(&url, "app1", &path).unwrap();
    assert_eq!(subscriber.syndex("Order").await.unwrap(), 2);
    let changes = subscriber.sync("Order").await.unwrap();
    assert_eq!(changes.ids, vec!["o3"]);
    assert_eq!(changes.syndex, 3);
}

#[tokio::test]
async fn test_failed_request_keeps_checkpoint() {
    let (url, master) = spawn_master().await;
    master.coordinator.ledger().mark("Order", "o1").unwrap();

    // Served by the master but outside its routes
    let misrouted = RemoteSubscriber::new(&format!("{url}/nope"), "app1").unwrap();
    match misrouted.sync("Order").await {
        Err(ClientError::Remote { status, .. }) => assert_eq!(status, 404),
        other => panic!("Expected Remote error, got {:?}", other),
    }
    assert_eq!(misrouted.syndex("Order").await.unwrap(), 0);

    // Nothing listening
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    let offline = RemoteSubscriber::new(&dead, "app1").unwrap();
    assert!(matches!(
        offline.sync("Order").await,
        Err(ClientError::Http(_))
    ));
    assert_eq!(offline.syndex("Order").await.unwrap(), 0);
}

#[tokio::test]
async fn test_invalid_type_is_rejected_locally() {
    let (url, _master) = spawn_master().await;
    let subscriber = RemoteSubscriber::new(&url, "app1").unwrap();

    match subscriber.sync("!!").await {
        Err(ClientError::Ledger(e)) => assert_eq!(e.to_string(), "type is required"),
        other => panic!("Expected Ledger error, got {:?}", other),
    }
}
