use std::{
    sync::{
        Arc,
        Mutex,
    },
    time::Duration,
};

use anyhow::{
    Error,
    Result,
};
use futures_util::lock::Mutex as AsyncMutex;
use log::{
    error,
    info,
};
use tokio::sync::{
    broadcast,
    mpsc::{
        UnboundedReceiver,
        UnboundedSender,
        unbounded_channel,
    },
    oneshot,
};

use crate::{
    core::{
        close::CloseReason,
        error::WampError,
        hash::{
            HashMap,
            HashSet,
        },
        id::Id,
        roles::PeerRole,
        service::{
            Service,
            ServiceEnd,
        },
        types::Dictionary,
        uri::Uri,
    },
    message::message::Message,
    peer::{
        auth::{
            AuthOptions,
            ChallengeHandler,
        },
        connector::connector::ConnectorFactory,
        queue::DeliveryQueue,
        session::{
            CallResponseHandler,
            Command,
            EstablishedSession,
            EventHandler,
            InvocationHandler,
            Publication,
            PublishResponseHandler,
            PublishedEvent,
            RegisterResponseHandler,
            Registration,
            RpcCall,
            RpcResult,
            Session,
            SessionEnd,
            SessionHooks,
            SubscribeResponseHandler,
            Subscription,
        },
    },
    serializer::serializer::{
        SerializerType,
        new_serializer,
    },
    transport::transport::{
        Transport,
        TransportFactory,
    },
};

const DEFAULT_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION"));

/// Configuration for WebSocket-specific WAMP connections.
#[derive(Debug, Default)]
pub struct WebSocketConfig {
    /// Additional headers to include in the WebSocket handshake request.
    pub headers: HashMap<String, String>,
}

/// Configuration for a [`Peer`].
pub struct PeerConfig {
    /// Name of the peer, mostly for logging.
    pub name: String,
    /// Agent name, communicated to the router in HELLO details.
    pub agent: String,
    /// The realm to open a session in when connecting.
    pub realm: String,
    /// Roles implemented by the peer.
    pub roles: HashSet<PeerRole>,
    /// Allowed serializers.
    ///
    /// The actual serializer is selected when the connection with the router is established.
    pub serializers: HashSet<SerializerType>,
    /// Additional configuration for WebSocket-specific connections.
    pub web_socket: Option<WebSocketConfig>,
    /// Authentication details advertised in HELLO.
    pub auth: AuthOptions,
    /// Handler for authentication challenges.
    ///
    /// A session that is challenged without a handler installed is aborted.
    pub challenge_handler: Option<Arc<dyn ChallengeHandler>>,
    /// Whether to automatically reconnect after an unexplained transport loss.
    ///
    /// Reconnection starts a fresh session; subscriptions and registrations are not replayed.
    /// Only a disconnect that carries neither a close reason nor a transport error triggers it.
    pub reconnect: bool,
    /// How long to wait before an automatic reconnection attempt.
    pub reconnect_delay: Duration,
}

impl PeerConfig {
    fn validate(&self) -> Result<()> {
        if self.serializers.is_empty() {
            return Err(Error::msg("at least one serializer is required"));
        }
        Uri::try_from(self.realm.as_str())
            .map_err(|_| Error::msg(format!("invalid realm URI: {:?}", self.realm)))?;
        Ok(())
    }
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_AGENT.to_owned(),
            agent: DEFAULT_AGENT.to_owned(),
            realm: String::default(),
            roles: HashSet::from_iter([
                PeerRole::Callee,
                PeerRole::Caller,
                PeerRole::Publisher,
                PeerRole::Subscriber,
            ]),
            serializers: HashSet::from_iter([SerializerType::Json, SerializerType::MessagePack]),
            web_socket: None,
            auth: AuthOptions::default(),
            challenge_handler: None,
            reconnect: false,
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

struct PeerState {
    command_tx: UnboundedSender<Command>,
}

/// One session's wiring: the session itself plus the channels feeding it.
struct SessionLink {
    session: Session,
    command_rx: UnboundedReceiver<Command>,
    inbound_rx: UnboundedReceiver<Message>,
    end_rx: broadcast::Receiver<ServiceEnd>,
    drop_rx: broadcast::Receiver<()>,
}

/// Drives sessions over successive connections, owned by a background task.
///
/// One connection maps to one session. When a session ends with an unexplained transport loss and
/// the peer is configured to reconnect, the runner dials the router again after a delay and opens
/// a fresh session.
struct SessionRunner<S> {
    config: Arc<PeerConfig>,
    connector_factory: Arc<dyn ConnectorFactory<S>>,
    transport_factory: Arc<dyn TransportFactory<S>>,
    peer_state: Arc<AsyncMutex<Option<PeerState>>>,
    established_tx: broadcast::Sender<Result<EstablishedSession, WampError>>,
    ended_tx: broadcast::Sender<SessionEnd>,
    session_id_cell: Arc<Mutex<Option<Id>>>,
    drop_tx: broadcast::Sender<()>,
}

impl<S> SessionRunner<S>
where
    S: Send + 'static,
{
    /// Dials the router and wires up a session over the new connection.
    async fn dial(&self, uri: &str) -> Result<SessionLink> {
        let connector = self.connector_factory.new_connector();
        let connection = connector.connect(&self.config, uri).await?;
        info!(
            "WAMP connection established with {uri} for peer {}",
            self.config.name
        );
        let transport = self
            .transport_factory
            .new_transport(connection.stream, connection.serializer);
        self.build_link(transport, connection.serializer).await
    }

    /// Wires up a session over an already-connected transport.
    async fn build_link(
        &self,
        transport: Box<dyn Transport>,
        serializer_type: SerializerType,
    ) -> Result<SessionLink> {
        let realm = Uri::try_from(self.config.realm.as_str())
            .map_err(|_| Error::msg(format!("invalid realm URI: {:?}", self.config.realm)))?;
        let serializer = new_serializer(serializer_type);
        let (service, inbound_rx) = Service::new(self.config.name.clone(), transport, serializer);
        let end_rx = service.end_rx();
        let service_handle = service.start();
        let (command_tx, command_rx) = unbounded_channel();
        let session = Session::new(
            self.config.clone(),
            realm,
            service_handle.message_tx(),
            service_handle.cancel_tx(),
            command_tx.clone(),
            SessionHooks {
                established_tx: self.established_tx.clone(),
                ended_tx: self.ended_tx.clone(),
                session_id_cell: self.session_id_cell.clone(),
            },
        );
        *self.peer_state.lock().await = Some(PeerState { command_tx });
        Ok(SessionLink {
            session,
            command_rx,
            inbound_rx,
            end_rx,
            drop_rx: self.drop_tx.subscribe(),
        })
    }

    async fn run(self, mut link: SessionLink, reconnect_uri: Option<String>) {
        loop {
            let reconnectable = Self::drive(&mut link).await;
            self.peer_state.lock().await.take();
            let Some(uri) = reconnect_uri.as_deref() else {
                break;
            };
            if !(reconnectable && self.config.reconnect) {
                break;
            }
            info!(
                "Peer {} reconnecting to {uri} after {:?}",
                self.config.name, self.config.reconnect_delay
            );
            tokio::time::sleep(self.config.reconnect_delay).await;
            match self.dial(uri).await {
                Ok(new_link) => link = new_link,
                Err(err) => {
                    error!(
                        "Peer {} failed to reconnect to {uri}: {err:#}",
                        self.config.name
                    );
                    break;
                }
            }
        }
    }

    /// Runs one session to completion.
    ///
    /// All session state is mutated only here: user commands and inbound router messages are both
    /// funneled into this single task. Returns whether the session ended in a way that is
    /// eligible for automatic reconnection.
    async fn drive(link: &mut SessionLink) -> bool {
        link.session.start();
        let mut inbound_done = false;
        loop {
            tokio::select! {
                biased;
                message = link.inbound_rx.recv(), if !inbound_done => {
                    match message {
                        Some(message) => link.session.handle_message(message).await,
                        None => inbound_done = true,
                    }
                }
                command = link.command_rx.recv() => {
                    match command {
                        Some(command) => link.session.handle_command(command),
                        // The session itself holds a sender, so this does not happen; treat it
                        // as a failure if it somehow does.
                        None => return link.session.finish(Some("command channel closed".to_owned())),
                    }
                }
                end = link.end_rx.recv() => {
                    // Process frames the service delivered before it ended, so closing
                    // handshakes and final replies are not lost.
                    while let Ok(message) = link.inbound_rx.try_recv() {
                        link.session.handle_message(message).await;
                    }
                    let error = end.map(|end| end.error).unwrap_or(None);
                    return link.session.finish(error);
                }
                _ = link.drop_rx.recv() => {
                    link.session.handle_command(Command::Disconnect);
                    return link.session.finish(None);
                }
            }
        }
    }
}

/// A WAMP peer (a.k.a., client) that connects to a WAMP router, establishes a session in a realm,
/// and interacts with resources in the realm as caller, callee, publisher, and subscriber.
///
/// Completion of every operation is reported through a caller-supplied response handler, invoked
/// on a caller-chosen [`DeliveryQueue`]; the `*_and_wait` variants wrap that contract into
/// ordinary async calls.
pub struct Peer<S> {
    config: Arc<PeerConfig>,
    connector_factory: Arc<dyn ConnectorFactory<S>>,
    transport_factory: Arc<dyn TransportFactory<S>>,

    peer_state: Arc<AsyncMutex<Option<PeerState>>>,
    established_tx: broadcast::Sender<Result<EstablishedSession, WampError>>,
    ended_tx: broadcast::Sender<SessionEnd>,
    session_id_cell: Arc<Mutex<Option<Id>>>,
    drop_tx: broadcast::Sender<()>,
}

impl<S> Peer<S>
where
    S: Send + 'static,
{
    /// Creates a new peer.
    pub fn new(
        config: PeerConfig,
        connector_factory: Box<dyn ConnectorFactory<S>>,
        transport_factory: Box<dyn TransportFactory<S>>,
    ) -> Result<Self> {
        config.validate()?;
        let (established_tx, _) = broadcast::channel(16);
        let (ended_tx, _) = broadcast::channel(16);
        let (drop_tx, _) = broadcast::channel(1);
        Ok(Self {
            config: Arc::new(config),
            connector_factory: Arc::from(connector_factory),
            transport_factory: Arc::from(transport_factory),
            peer_state: Arc::new(AsyncMutex::new(None)),
            established_tx,
            ended_tx,
            session_id_cell: Arc::new(Mutex::new(None)),
            drop_tx,
        })
    }

    /// The receiver channel for session establishment.
    ///
    /// Every successful (re)connection broadcasts one value.
    pub fn established_rx(&self) -> broadcast::Receiver<Result<EstablishedSession, WampError>> {
        self.established_tx.subscribe()
    }

    /// The receiver channel for session termination.
    pub fn session_ended_rx(&self) -> broadcast::Receiver<SessionEnd> {
        self.ended_tx.subscribe()
    }

    /// The session ID issued by the router, while a session is live.
    ///
    /// The presence of a session ID is the definition of being connected to the realm.
    pub fn current_session_id(&self) -> Option<Id> {
        *self
            .session_id_cell
            .lock()
            .unwrap_or_else(|err| err.into_inner())
    }

    fn runner(&self) -> SessionRunner<S> {
        SessionRunner {
            config: self.config.clone(),
            connector_factory: self.connector_factory.clone(),
            transport_factory: self.transport_factory.clone(),
            peer_state: self.peer_state.clone(),
            established_tx: self.established_tx.clone(),
            ended_tx: self.ended_tx.clone(),
            session_id_cell: self.session_id_cell.clone(),
            drop_tx: self.drop_tx.clone(),
        }
    }

    async fn check_not_connected(&self) -> Result<()> {
        if self.peer_state.lock().await.is_some() {
            return Err(Error::msg("peer is already connected"));
        }
        Ok(())
    }

    async fn await_establishment(
        established_rx: &mut broadcast::Receiver<Result<EstablishedSession, WampError>>,
    ) -> Result<EstablishedSession> {
        established_rx
            .recv()
            .await
            .map_err(Error::new)?
            .map_err(Error::new)
    }

    /// Connects to a router and opens a session in the configured realm.
    ///
    /// Resolves once the router welcomes the session, with the session ID and the router's
    /// advertised roles. If the router aborts establishment, the error carries the abort reason.
    pub async fn connect(&self, uri: &str) -> Result<EstablishedSession> {
        self.check_not_connected().await?;
        let mut established_rx = self.established_tx.subscribe();
        let runner = self.runner();
        let link = runner.dial(uri).await?;
        tokio::spawn(runner.run(link, Some(uri.to_owned())));
        Self::await_establishment(&mut established_rx).await
    }

    /// Opens a session over an already-connected transport.
    ///
    /// Useful for in-process connections (see
    /// [`direct_transport_pair`][`crate::transport::direct_transport::direct_transport_pair`])
    /// and tests. Direct connections never reconnect automatically.
    pub async fn direct_connect(
        &self,
        transport: Box<dyn Transport>,
        serializer_type: SerializerType,
    ) -> Result<EstablishedSession> {
        self.check_not_connected().await?;
        let mut established_rx = self.established_tx.subscribe();
        let runner = self.runner();
        let link = runner.build_link(transport, serializer_type).await?;
        tokio::spawn(runner.run(link, None));
        Self::await_establishment(&mut established_rx).await
    }

    async fn send_command(&self, command: Command) -> Result<()> {
        match &*self.peer_state.lock().await {
            Some(peer_state) => peer_state
                .command_tx
                .send(command)
                .map_err(|_| Error::msg("peer is not connected")),
            None => Err(Error::msg("peer is not connected")),
        }
    }

    /// Leaves the realm, closing the session with the default close reason.
    ///
    /// Waits for the session to fully terminate.
    pub async fn leave(&self) -> Result<()> {
        self.leave_with_reason(CloseReason::CloseRealm).await
    }

    /// Leaves the realm, closing the session with the given reason.
    ///
    /// Waits for the session to fully terminate.
    pub async fn leave_with_reason(&self, reason: CloseReason) -> Result<()> {
        let mut ended_rx = self.ended_tx.subscribe();
        self.send_command(Command::Leave { reason }).await?;
        ended_rx.recv().await.map_err(Error::new)?;
        Ok(())
    }

    /// Disconnects from the router without a closing handshake.
    pub async fn disconnect(&self) -> Result<()> {
        match self.peer_state.lock().await.take() {
            Some(peer_state) => {
                peer_state.command_tx.send(Command::Disconnect).ok();
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Calls a procedure.
    ///
    /// The result (or error) is delivered through `handler` on `queue`.
    pub async fn call(
        &self,
        procedure: Uri,
        rpc: RpcCall,
        queue: &DeliveryQueue,
        handler: CallResponseHandler,
    ) -> Result<()> {
        self.send_command(Command::Call {
            procedure,
            rpc,
            queue: queue.clone(),
            handler,
        })
        .await
    }

    /// Calls a procedure and waits for its result.
    pub async fn call_and_wait(&self, procedure: Uri, rpc: RpcCall) -> Result<RpcResult> {
        let (result_tx, result_rx) = oneshot::channel();
        let queue = DeliveryQueue::new();
        self.call(
            procedure,
            rpc,
            &queue,
            Box::new(move |result| {
                result_tx.send(result).ok();
            }),
        )
        .await?;
        result_rx
            .await
            .map_err(|_| Error::msg("call was dropped before it completed"))?
            .map_err(Error::new)
    }

    /// Subscribes to a topic.
    ///
    /// `event_handler` runs on `queue` for every event published to the topic, in the order the
    /// router delivers them. The [`Subscription`] handle (or subscription error) is delivered
    /// through `handler` on the same queue.
    pub async fn subscribe(
        &self,
        topic: Uri,
        options: Dictionary,
        queue: &DeliveryQueue,
        event_handler: EventHandler,
        handler: SubscribeResponseHandler,
    ) -> Result<()> {
        self.send_command(Command::Subscribe {
            topic,
            options,
            queue: queue.clone(),
            event_handler,
            handler,
        })
        .await
    }

    /// Subscribes to a topic and waits for the router's confirmation.
    pub async fn subscribe_and_wait(
        &self,
        topic: Uri,
        options: Dictionary,
        queue: &DeliveryQueue,
        event_handler: EventHandler,
    ) -> Result<Subscription> {
        let (result_tx, result_rx) = oneshot::channel();
        self.subscribe(
            topic,
            options,
            queue,
            event_handler,
            Box::new(move |result| {
                result_tx.send(result).ok();
            }),
        )
        .await?;
        result_rx
            .await
            .map_err(|_| Error::msg("subscribe was dropped before it completed"))?
            .map_err(Error::new)
    }

    /// Registers a procedure.
    ///
    /// `invocation_handler` runs on `queue` for every invocation of the procedure, in the order
    /// the router delivers them; its result is shaped into the YIELD sent back to the router. The
    /// [`Registration`] handle (or registration error) is delivered through `handler` on the same
    /// queue.
    pub async fn register(
        &self,
        procedure: Uri,
        options: Dictionary,
        queue: &DeliveryQueue,
        invocation_handler: InvocationHandler,
        handler: RegisterResponseHandler,
    ) -> Result<()> {
        self.send_command(Command::Register {
            procedure,
            options,
            queue: queue.clone(),
            invocation_handler,
            handler,
        })
        .await
    }

    /// Registers a procedure and waits for the router's confirmation.
    pub async fn register_and_wait(
        &self,
        procedure: Uri,
        options: Dictionary,
        queue: &DeliveryQueue,
        invocation_handler: InvocationHandler,
    ) -> Result<Registration> {
        let (result_tx, result_rx) = oneshot::channel();
        self.register(
            procedure,
            options,
            queue,
            invocation_handler,
            Box::new(move |result| {
                result_tx.send(result).ok();
            }),
        )
        .await?;
        result_rx
            .await
            .map_err(|_| Error::msg("register was dropped before it completed"))?
            .map_err(Error::new)
    }

    /// Publishes an event to a topic without acknowledgement.
    ///
    /// The router sends no reply for unacknowledged publications, so nothing is tracked and no
    /// handler is invoked.
    pub async fn publish(&self, topic: Uri, event: PublishedEvent) -> Result<()> {
        self.send_command(Command::Publish {
            topic,
            event,
            acknowledgement: None,
        })
        .await
    }

    /// Publishes an event to a topic and requests acknowledgement.
    ///
    /// The router's confirmation (or error) is delivered through `handler` on `queue`.
    pub async fn publish_with_acknowledgement(
        &self,
        topic: Uri,
        event: PublishedEvent,
        queue: &DeliveryQueue,
        handler: PublishResponseHandler,
    ) -> Result<()> {
        self.send_command(Command::Publish {
            topic,
            event,
            acknowledgement: Some((queue.clone(), handler)),
        })
        .await
    }

    /// Publishes an event to a topic and waits for the router's acknowledgement.
    pub async fn publish_and_wait(&self, topic: Uri, event: PublishedEvent) -> Result<Publication> {
        let (result_tx, result_rx) = oneshot::channel();
        let queue = DeliveryQueue::new();
        self.publish_with_acknowledgement(
            topic,
            event,
            &queue,
            Box::new(move |result| {
                result_tx.send(result).ok();
            }),
        )
        .await?;
        result_rx
            .await
            .map_err(|_| Error::msg("publish was dropped before it completed"))?
            .map_err(Error::new)
    }
}

impl<S> Drop for Peer<S> {
    fn drop(&mut self) {
        self.drop_tx.send(()).ok();
    }
}
