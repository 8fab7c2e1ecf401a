mod common;

use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::json;
use tokio::sync::mpsc::unbounded_channel;
use wampeer::{
    core::{
        error::WampError,
        types::{
            Dictionary,
            List,
            Value,
        },
    },
    peer::{
        DeliveryQueue,
        Invocation,
        InvocationHandler,
        RpcCall,
        RpcResult,
    },
};

use crate::common::{
    connect_peer,
    expect_no_frame,
    setup_test_environment,
    uri,
};

#[tokio::test]
async fn call_round_trip() {
    setup_test_environment();

    let (peer, mut router) = connect_peer("realm1", 12345).await;
    let queue = DeliveryQueue::new();
    let (result_tx, mut result_rx) = unbounded_channel();

    peer.call(
        uri("com.example.add"),
        RpcCall {
            arguments: List::from_iter([Value::Integer(2), Value::Integer(3)]),
            ..Default::default()
        },
        &queue,
        Box::new(move |result| {
            result_tx.send(result).unwrap();
        }),
    )
    .await
    .unwrap();

    assert_eq!(
        router.recv_wire().await,
        json!([48, 2, {}, "com.example.add", [2, 3]])
    );
    router.send_wire(json!([50, 2, {}, [5]])).await;

    assert_matches::assert_matches!(result_rx.recv().await, Some(Ok(result)) => {
        pretty_assertions::assert_eq!(result, RpcResult {
            details: Dictionary::default(),
            arguments: List::from_iter([Value::Integer(5)]),
            arguments_keyword: Dictionary::default(),
        });
    });
}

#[tokio::test]
async fn call_error_carries_reason_and_payload() {
    setup_test_environment();

    let (peer, mut router) = connect_peer("realm1", 12345).await;

    let (call, ()) = tokio::join!(
        peer.call_and_wait(
            uri("com.example.add"),
            RpcCall {
                arguments: List::from_iter([Value::from("two")]),
                ..Default::default()
            },
        ),
        async {
            assert_eq!(
                router.recv_wire().await,
                json!([48, 2, {}, "com.example.add", ["two"]])
            );
            router
                .send_wire(json!([
                    8,
                    48,
                    2,
                    {"message": "integers required"},
                    "wamp.error.invalid_argument",
                    ["two"],
                    {"position": 0}
                ]))
                .await;
        }
    );

    assert_matches::assert_matches!(call, Err(err) => {
        let err = err.downcast::<WampError>().unwrap();
        assert_eq!(err.reason().as_ref(), "wamp.error.invalid_argument");
        assert_eq!(err.message(), "integers required");
        assert_eq!(
            err.details(),
            &Dictionary::from_iter([("message".to_owned(), Value::from("integers required"))]),
        );
        assert_eq!(err.arguments(), &List::from_iter([Value::from("two")]));
        assert_eq!(
            err.arguments_keyword(),
            &Dictionary::from_iter([("position".to_owned(), Value::Integer(0))]),
        );
    });
}

fn summing_handler() -> InvocationHandler {
    Arc::new(|invocation: Invocation| {
        async move {
            let sum = invocation
                .arguments
                .iter()
                .filter_map(|value| match value {
                    Value::Integer(value) => Some(*value),
                    _ => None,
                })
                .sum();
            Ok(Value::Dictionary(Dictionary::from_iter([(
                "sum".to_owned(),
                Value::Integer(sum),
            )])))
        }
        .boxed()
    })
}

#[tokio::test]
async fn invocation_result_map_becomes_keyword_arguments() {
    setup_test_environment();

    let (peer, mut router) = connect_peer("realm1", 12345).await;
    let queue = DeliveryQueue::new();

    let (registration, ()) = tokio::join!(
        peer.register_and_wait(
            uri("com.example.math"),
            Dictionary::default(),
            &queue,
            summing_handler(),
        ),
        async {
            assert_eq!(
                router.recv_wire().await,
                json!([64, 2, {}, "com.example.math"])
            );
            router.send_wire(json!([65, 2, 42])).await;
        }
    );
    let registration = registration.unwrap();
    assert_eq!(registration.id().value(), 42);
    assert!(registration.live());

    router.send_wire(json!([68, 3, 42, {}, [1, 2]])).await;
    assert_eq!(
        router.recv_wire().await,
        json!([70, 3, {}, [], {"sum": 3}])
    );
}

#[tokio::test]
async fn invocation_result_list_and_scalar_shapes() {
    setup_test_environment();

    let (peer, mut router) = connect_peer("realm1", 12345).await;
    let queue = DeliveryQueue::new();

    let echo_arguments: InvocationHandler = Arc::new(|invocation: Invocation| {
        async move {
            if invocation.arguments.is_empty() {
                Ok(Value::Integer(7))
            } else {
                Ok(Value::List(invocation.arguments))
            }
        }
        .boxed()
    });

    let (registration, ()) = tokio::join!(
        peer.register_and_wait(
            uri("com.example.echo"),
            Dictionary::default(),
            &queue,
            echo_arguments,
        ),
        async {
            assert_eq!(
                router.recv_wire().await,
                json!([64, 2, {}, "com.example.echo"])
            );
            router.send_wire(json!([65, 2, 42])).await;
        }
    );
    registration.unwrap();

    // A list result becomes the positional arguments verbatim.
    router.send_wire(json!([68, 3, 42, {}, [1, 2]])).await;
    assert_eq!(router.recv_wire().await, json!([70, 3, {}, [1, 2]]));

    // Any other value is wrapped into a single-element list.
    router.send_wire(json!([68, 4, 42, {}])).await;
    assert_eq!(router.recv_wire().await, json!([70, 4, {}, [7]]));
}

#[tokio::test]
async fn invocation_details_are_merged_with_procedure() {
    setup_test_environment();

    let (peer, mut router) = connect_peer("realm1", 12345).await;
    let queue = DeliveryQueue::new();
    let (invocation_tx, mut invocation_rx) = unbounded_channel();

    let capturing: InvocationHandler = Arc::new(move |invocation: Invocation| {
        let invocation_tx = invocation_tx.clone();
        async move {
            invocation_tx.send(invocation).unwrap();
            Ok(Value::Bool(true))
        }
        .boxed()
    });

    let (registration, ()) = tokio::join!(
        peer.register_and_wait(
            uri("com.example.math"),
            Dictionary::default(),
            &queue,
            capturing,
        ),
        async {
            let _ = router.recv_wire().await;
            router.send_wire(json!([65, 2, 42])).await;
        }
    );
    registration.unwrap();

    // Non-empty invocation details get the registered procedure merged in.
    router
        .send_wire(json!([68, 3, 42, {"caller": 11}, [1]]))
        .await;
    assert_matches::assert_matches!(invocation_rx.recv().await, Some(invocation) => {
        assert_eq!(
            invocation.details,
            Dictionary::from_iter([
                ("caller".to_owned(), Value::Integer(11)),
                ("procedure".to_owned(), Value::from("com.example.math")),
            ]),
        );
    });
    let _ = router.recv_wire().await;

    // Empty details stay empty.
    router.send_wire(json!([68, 4, 42, {}, [1]])).await;
    assert_matches::assert_matches!(invocation_rx.recv().await, Some(invocation) => {
        assert!(invocation.details.is_empty());
    });
}

#[tokio::test]
async fn failed_invocation_reports_error_to_router() {
    setup_test_environment();

    let (peer, mut router) = connect_peer("realm1", 12345).await;
    let queue = DeliveryQueue::new();

    let failing: InvocationHandler = Arc::new(|_| {
        async move {
            Err(WampError::new(
                wampeer::core::uri::Uri::try_from("com.example.error.boom").unwrap(),
                "boom",
            ))
        }
        .boxed()
    });

    let (registration, ()) = tokio::join!(
        peer.register_and_wait(uri("com.example.math"), Dictionary::default(), &queue, failing),
        async {
            let _ = router.recv_wire().await;
            router.send_wire(json!([65, 2, 42])).await;
        }
    );
    registration.unwrap();

    router.send_wire(json!([68, 3, 42, {}, [1, 2]])).await;
    assert_eq!(
        router.recv_wire().await,
        json!([8, 68, 3, {"message": "boom"}, "com.example.error.boom"])
    );
}

#[tokio::test]
async fn unregister_invalidates_registration() {
    setup_test_environment();

    let (peer, mut router) = connect_peer("realm1", 12345).await;
    let queue = DeliveryQueue::new();

    let (registration, ()) = tokio::join!(
        peer.register_and_wait(
            uri("com.example.math"),
            Dictionary::default(),
            &queue,
            summing_handler(),
        ),
        async {
            let _ = router.recv_wire().await;
            router.send_wire(json!([65, 2, 42])).await;
        }
    );
    let registration = registration.unwrap();

    let (unregistered, ()) = tokio::join!(registration.unregister_and_wait(), async {
        assert_eq!(router.recv_wire().await, json!([66, 3, 42]));
        router.send_wire(json!([67, 3])).await;
    });
    assert_matches::assert_matches!(unregistered, Ok(()));
    assert!(!registration.live());

    // Invocations for the removed registration are dropped, and nothing is yielded.
    router.send_wire(json!([68, 4, 42, {}, [1, 2]])).await;
    expect_no_frame(&mut router).await;

    // Unregistering again is a no-op.
    assert_matches::assert_matches!(registration.unregister_and_wait().await, Ok(()));
    expect_no_frame(&mut router).await;
}

#[tokio::test]
async fn orphan_results_are_dropped() {
    setup_test_environment();

    let (peer, mut router) = connect_peer("realm1", 12345).await;

    // A RESULT that matches no outstanding call is logged and dropped.
    router.send_wire(json!([50, 999, {}, [1]])).await;

    // The session is still healthy afterwards.
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
