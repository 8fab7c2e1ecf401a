use std::{
    sync::Once,
    time::Duration,
};

use futures_util::{
    SinkExt,
    StreamExt,
};
use wampeer::{
    core::id::Id,
    message::message::Message,
    peer::{
        PeerConfig,
        WebSocketPeer,
        new_web_socket_peer,
    },
    serializer::{
        json::JsonSerializer,
        serializer::{
            Serializer,
            SerializerType,
        },
    },
    transport::{
        direct_transport::{
            DirectTransport,
            direct_transport_pair,
        },
        transport::TransportData,
    },
};

static INIT: Once = Once::new();

pub fn setup_test_environment() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing_core::Level::DEBUG)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .init();
    });
}

pub fn uri(value: &str) -> wampeer::core::uri::Uri {
    wampeer::core::uri::Uri::try_from(value).unwrap()
}

pub fn id(value: u64) -> Id {
    Id::try_from(value).unwrap()
}

/// The router end of a direct connection, scripted frame by frame by tests.
pub struct RouterLink {
    transport: DirectTransport,
    serializer: JsonSerializer,
}

impl RouterLink {
    pub fn new(transport: DirectTransport) -> Self {
        Self {
            transport,
            serializer: JsonSerializer::default(),
        }
    }

    pub async fn recv(&mut self) -> Message {
        match self.transport.next().await {
            Some(Ok(TransportData::Message(bytes))) => self.serializer.deserialize(&bytes).unwrap(),
            _ => panic!("expected a message frame from the peer"),
        }
    }

    pub async fn recv_wire(&mut self) -> serde_json::Value {
        match self.transport.next().await {
            Some(Ok(TransportData::Message(bytes))) => serde_json::from_slice(&bytes).unwrap(),
            _ => panic!("expected a message frame from the peer"),
        }
    }

    pub async fn ping(&mut self, data: Vec<u8>) {
        self.transport
            .send(TransportData::Ping(data))
            .await
            .unwrap();
    }

    pub async fn recv_ping(&mut self) -> Vec<u8> {
        match self.transport.next().await {
            Some(Ok(TransportData::Ping(data))) => data,
            _ => panic!("expected a ping frame from the peer"),
        }
    }

    pub async fn send_wire(&mut self, wire: serde_json::Value) {
        let bytes = serde_json::to_vec(&wire).unwrap();
        self.transport
            .send(TransportData::Message(bytes))
            .await
            .unwrap();
    }
}

/// Asserts that the peer emits nothing for a little while.
pub async fn expect_no_frame(router: &mut RouterLink) {
    assert!(
        tokio::time::timeout(Duration::from_millis(100), router.recv_wire())
            .await
            .is_err(),
        "expected the peer to emit nothing"
    );
}

pub fn test_config(realm: &str) -> PeerConfig {
    let mut config = PeerConfig::default();
    config.name = "test-peer".to_owned();
    config.realm = realm.to_owned();
    config
}

/// Connects a peer over a direct transport and establishes a session with the given ID.
pub async fn establish(peer: &WebSocketPeer, session_id: u64) -> RouterLink {
    let (peer_transport, router_transport) = direct_transport_pair();
    let mut router = RouterLink::new(router_transport);
    let (established, ()) = tokio::join!(
        async {
            peer.direct_connect(Box::new(peer_transport), SerializerType::Json)
                .await
                .unwrap()
        },
        async {
            assert_matches::assert_matches!(router.recv().await, Message::Hello(_));
            router
                .send_wire(serde_json::json!([
                    2,
                    session_id,
                    {"roles": {"dealer": {}, "broker": {}}}
                ]))
                .await;
        }
    );
    assert_eq!(established.session.value(), session_id);
    router
}

/// Creates a peer with the given realm and establishes a session with the given ID.
pub async fn connect_peer(realm: &str, session_id: u64) -> (WebSocketPeer, RouterLink) {
    let peer = new_web_socket_peer(test_config(realm)).unwrap();
    let router = establish(&peer, session_id).await;
    (peer, router)
}
