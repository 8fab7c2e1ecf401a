mod auth;
mod connector;
#[allow(clippy::module_inception)]
mod peer;
mod queue;
mod session;
mod web_socket_peer;

pub use auth::{
    AuthOptions,
    ChallengeHandler,
};
pub use connector::{
    connector::{
        Connection,
        Connector,
        ConnectorFactory,
    },
    web_socket_connector::WebSocketConnectorFactory,
};
pub use peer::{
    Peer,
    PeerConfig,
    WebSocketConfig,
};
pub use queue::DeliveryQueue;
pub use session::{
    CallResponseHandler,
    EstablishedSession,
    EventHandler,
    Invocation,
    InvocationHandler,
    Publication,
    PublishResponseHandler,
    PublishedEvent,
    ReceivedEvent,
    RegisterResponseHandler,
    Registration,
    RpcCall,
    RpcResult,
    SessionEnd,
    SubscribeResponseHandler,
    Subscription,
    UnregisterResponseHandler,
    UnsubscribeResponseHandler,
};
pub use web_socket_peer::{
    WebSocketPeer,
    new_web_socket_peer,
};
