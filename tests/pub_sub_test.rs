mod common;

use std::{
    sync::Arc,
    time::Duration,
};

use serde_json::json;
use tokio::sync::mpsc::unbounded_channel;
use wampeer::{
    core::types::{
        Dictionary,
        List,
        Value,
    },
    peer::{
        DeliveryQueue,
        EventHandler,
        PublishedEvent,
        ReceivedEvent,
        RpcCall,
    },
};

use crate::common::{
    connect_peer,
    expect_no_frame,
    id,
    setup_test_environment,
    uri,
};

#[tokio::test]
async fn subscribe_and_receive_events() {
    setup_test_environment();

    let (peer, mut router) = connect_peer("realm1", 12345).await;
    let queue = DeliveryQueue::new();
    let (event_tx, mut event_rx) = unbounded_channel();
    let event_handler: EventHandler = Arc::new(move |event| {
        event_tx.send(event).unwrap();
    });

    let (subscription, ()) = tokio::join!(
        peer.subscribe_and_wait(uri("com.chan"), Dictionary::default(), &queue, event_handler),
        async {
            assert_eq!(router.recv_wire().await, json!([32, 2, {}, "com.chan"]));
            router.send_wire(json!([33, 2, 777])).await;
        }
    );
    let subscription = subscription.unwrap();
    assert_eq!(subscription.id().value(), 777);
    assert_eq!(subscription.topic().as_ref(), "com.chan");
    assert!(subscription.live());

    router.send_wire(json!([36, 777, 1, {}, ["hi"]])).await;
    assert_matches::assert_matches!(event_rx.recv().await, Some(event) => {
        pretty_assertions::assert_eq!(event, ReceivedEvent {
            publication: id(1),
            details: Dictionary::default(),
            arguments: List::from_iter([Value::from("hi")]),
            arguments_keyword: Dictionary::default(),
        });
    });
}

#[tokio::test]
async fn non_empty_event_details_are_merged_with_topic() {
    setup_test_environment();

    let (peer, mut router) = connect_peer("realm1", 12345).await;
    let queue = DeliveryQueue::new();
    let (event_tx, mut event_rx) = unbounded_channel();
    let event_handler: EventHandler = Arc::new(move |event| {
        event_tx.send(event).unwrap();
    });

    let (subscription, ()) = tokio::join!(
        peer.subscribe_and_wait(uri("com.chan"), Dictionary::default(), &queue, event_handler),
        async {
            let _ = router.recv_wire().await;
            router.send_wire(json!([33, 2, 777])).await;
        }
    );
    subscription.unwrap();

    router
        .send_wire(json!([36, 777, 1, {"publisher": 11}, ["hi"]]))
        .await;
    assert_matches::assert_matches!(event_rx.recv().await, Some(event) => {
        assert_eq!(
            event.details,
            Dictionary::from_iter([
                ("publisher".to_owned(), Value::Integer(11)),
                ("topic".to_owned(), Value::from("com.chan")),
            ]),
        );
    });
}

#[tokio::test]
async fn events_are_delivered_in_router_order() {
    setup_test_environment();

    let (peer, mut router) = connect_peer("realm1", 12345).await;
    let queue = DeliveryQueue::new();
    let (event_tx, mut event_rx) = unbounded_channel();
    let event_handler: EventHandler = Arc::new(move |event: ReceivedEvent| {
        event_tx.send(event.arguments).unwrap();
    });

    let (subscription, ()) = tokio::join!(
        peer.subscribe_and_wait(uri("com.chan"), Dictionary::default(), &queue, event_handler),
        async {
            let _ = router.recv_wire().await;
            router.send_wire(json!([33, 2, 777])).await;
        }
    );
    subscription.unwrap();

    for publication in 0..10 {
        router
            .send_wire(json!([36, 777, publication + 1, {}, [publication]]))
            .await;
    }
    for publication in 0..10 {
        assert_eq!(
            event_rx.recv().await.unwrap(),
            List::from_iter([Value::Integer(publication)]),
        );
    }
}

#[tokio::test]
async fn unsubscribe_stops_event_delivery() {
    setup_test_environment();

    let (peer, mut router) = connect_peer("realm1", 12345).await;
    let queue = DeliveryQueue::new();
    let (event_tx, mut event_rx) = unbounded_channel();
    let event_handler: EventHandler = Arc::new(move |event| {
        event_tx.send(event).unwrap();
    });

    let (subscription, ()) = tokio::join!(
        peer.subscribe_and_wait(uri("com.chan"), Dictionary::default(), &queue, event_handler),
        async {
            let _ = router.recv_wire().await;
            router.send_wire(json!([33, 2, 777])).await;
        }
    );
    let subscription = subscription.unwrap();

    let (unsubscribed, ()) = tokio::join!(subscription.unsubscribe_and_wait(), async {
        assert_eq!(router.recv_wire().await, json!([34, 3, 777]));
        router.send_wire(json!([35, 3])).await;
    });
    assert_matches::assert_matches!(unsubscribed, Ok(()));
    assert!(!subscription.live());

    // Events for the removed subscription are dropped.
    router.send_wire(json!([36, 777, 1, {}, ["late"]])).await;
    assert!(
        tokio::time::timeout(Duration::from_millis(100), event_rx.recv())
            .await
            .is_err(),
        "expected no event delivery after unsubscribing"
    );

    // Unsubscribing again is a no-op.
    assert_matches::assert_matches!(subscription.unsubscribe_and_wait().await, Ok(()));
    expect_no_frame(&mut router).await;
}

#[tokio::test]
async fn acknowledged_publish_round_trip() {
    setup_test_environment();

    let (peer, mut router) = connect_peer("realm1", 12345).await;

    let (publication, ()) = tokio::join!(
        peer.publish_and_wait(
            uri("com.x"),
            PublishedEvent {
                arguments: List::from_iter([Value::from("a")]),
                ..Default::default()
            },
        ),
        async {
            assert_eq!(
                router.recv_wire().await,
                json!([16, 2, {"acknowledge": true}, "com.x", ["a"]])
            );
            router.send_wire(json!([17, 2, 99])).await;
        }
    );

    assert_matches::assert_matches!(publication, Ok(publication) => {
        assert_eq!(publication.publication.value(), 99);
    });
}

#[tokio::test]
async fn acknowledged_publish_error_reaches_handler() {
    setup_test_environment();

    let (peer, mut router) = connect_peer("realm1", 12345).await;
    let queue = DeliveryQueue::new();
    let (result_tx, mut result_rx) = unbounded_channel();

    peer.publish_with_acknowledgement(
        uri("com.x"),
        PublishedEvent::default(),
        &queue,
        Box::new(move |result| {
            result_tx.send(result).unwrap();
        }),
    )
    .await
    .unwrap();

    assert_eq!(
        router.recv_wire().await,
        json!([16, 2, {"acknowledge": true}, "com.x"])
    );
    router
        .send_wire(json!([8, 16, 2, {}, "wamp.error.not_authorized"]))
        .await;

    assert_matches::assert_matches!(result_rx.recv().await, Some(Err(err)) => {
        assert_eq!(err.reason().as_ref(), "wamp.error.not_authorized");
        assert!(err.details().is_empty());
    });
}

#[tokio::test]
async fn unacknowledged_publish_is_not_tracked() {
    setup_test_environment();

    let (peer, mut router) = connect_peer("realm1", 12345).await;

    peer.publish(
        uri("com.x"),
        PublishedEvent {
            arguments: List::from_iter([Value::from("a")]),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(router.recv_wire().await, json!([16, 2, {}, "com.x", ["a"]]));

    // A stray PUBLISHED for the untracked request is logged and dropped, and the session stays
    // healthy.
    router.send_wire(json!([17, 2, 1])).await;
    let (call, ()) = tokio::join!(
        peer.call_and_wait(uri("com.example.ping"), RpcCall::default()),
        async {
            assert_eq!(
                router.recv_wire().await,
                json!([48, 3, {}, "com.example.ping"])
            );
            router.send_wire(json!([50, 3, {}])).await;
        }
    );
    assert_matches::assert_matches!(call, Ok(_));
}

#[tokio::test]
async fn orphan_events_are_dropped() {
    setup_test_environment();

    let (peer, mut router) = connect_peer("realm1", 12345).await;

    router.send_wire(json!([36, 555, 1, {}, ["hi"]])).await;

    let (call, ()) = tokio::join!(
        peer.call_and_wait(uri("com.example.ping"), RpcCall::default()),
        async {
            assert_eq!(
                router.recv_wire().await,
                json!([48, 2, {}, "com.example.ping"])
            );
            router.send_wire(json!([50, 2, {}])).await;
        }
    );
    assert_matches::assert_matches!(call, Ok(_));
}
