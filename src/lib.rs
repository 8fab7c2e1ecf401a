//! # wampeer
//!
//! **wampeer** is an asynchronous client implementation of the **Web Application Messaging
//! Protocol** (WAMP) basic profile for Rust.
//!
//! A WAMP peer multiplexes four interaction patterns over a single ordered, bidirectional
//! connection to a router:
//!
//! * calling remote procedures (caller),
//! * registering procedures and answering invocations (callee),
//! * subscribing to topics and receiving events (subscriber),
//! * publishing events, with or without acknowledgement (publisher).
//!
//! The library uses [`tokio`](https://tokio.rs) as its asynchronous runtime and is ready for use
//! on top of WebSocket streams, with JSON and MessagePack serialization negotiated during the
//! handshake.
//!
//! ## What is WAMP?
//!
//! **WAMP** is an open standard, routed protocol that provides two messaging patterns: Publish &
//! Subscribe and routed Remote Procedure Calls. It is intended to connect application components
//! in distributed applications. WAMP uses WebSocket as its default transport, but it can be
//! transmitted via any other protocol that allows for ordered, reliable, bi-directional, and
//! message-oriented communications.
//!
//! The WAMP protocol specification is described [here](https://wamp-proto.org/spec.html).
//!
//! ## Sessions
//!
//! Configure a peer through a [`PeerConfig`][`crate::peer::PeerConfig`] (the realm is required)
//! and construct it with [`new_web_socket_peer`][`crate::peer::new_web_socket_peer`].
//! [`Peer::connect`][`crate::peer::Peer::connect`] dials the router, opens a session in the
//! configured realm, and resolves once the router welcomes the session. Challenge-response
//! authentication is supported by installing a
//! [`ChallengeHandler`][`crate::peer::ChallengeHandler`]; the handler computes the signature,
//! the client only relays it.
//!
//! Completion of every operation is reported through a caller-supplied response handler. Handlers
//! never run inline on the connection's receive path: each one is dispatched onto a caller-chosen
//! [`DeliveryQueue`][`crate::peer::DeliveryQueue`], which runs its jobs strictly in order.
//! Events of one subscription and invocations of one registration are delivered in router order
//! on their queue; separate queues run concurrently. For straight-line code, every operation also
//! has a `*_and_wait` variant that wraps the handler contract into an ordinary async call.
//!
//! ## Calling a procedure
//!
//! ```no_run
//! use wampeer::{
//!     core::{
//!         types::{
//!             List,
//!             Value,
//!         },
//!         uri::Uri,
//!     },
//!     peer::{
//!         PeerConfig,
//!         RpcCall,
//!         new_web_socket_peer,
//!     },
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = PeerConfig::default();
//!     config.realm = "com.example.realm".to_owned();
//!     let peer = new_web_socket_peer(config)?;
//!     peer.connect("ws://localhost:8080").await?;
//!
//!     let result = peer
//!         .call_and_wait(
//!             Uri::try_from("com.example.add")?,
//!             RpcCall {
//!                 arguments: List::from_iter([Value::Integer(2), Value::Integer(3)]),
//!                 ..Default::default()
//!             },
//!         )
//!         .await?;
//!     println!("sum: {:?}", result.arguments);
//!
//!     peer.leave().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Subscribing to a topic
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use wampeer::{
//!     core::{
//!         types::Dictionary,
//!         uri::Uri,
//!     },
//!     peer::{
//!         DeliveryQueue,
//!         PeerConfig,
//!         new_web_socket_peer,
//!     },
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = PeerConfig::default();
//!     config.realm = "com.example.realm".to_owned();
//!     let peer = new_web_socket_peer(config)?;
//!     peer.connect("ws://localhost:8080").await?;
//!
//!     let queue = DeliveryQueue::new();
//!     let subscription = peer
//!         .subscribe_and_wait(
//!             Uri::try_from("com.example.topic")?,
//!             Dictionary::default(),
//!             &queue,
//!             Arc::new(|event| {
//!                 println!("received: {:?}", event.arguments);
//!             }),
//!         )
//!         .await?;
//!
//!     // Events are delivered on the queue until the subscription is removed.
//!
//!     subscription.unsubscribe_and_wait().await?;
//!     Ok(())
//! }
//! ```
pub mod core;
pub mod message;
pub mod peer;
pub mod serializer;
pub mod transport;
