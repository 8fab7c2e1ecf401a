use std::sync::{
    Arc,
    Mutex,
    atomic::{
        AtomicBool,
        Ordering,
    },
};

use anyhow::{
    Error,
    Result,
};
use futures_util::future::BoxFuture;
use log::{
    debug,
    error,
    info,
    warn,
};
use tokio::sync::{
    broadcast,
    mpsc::UnboundedSender,
    oneshot,
};

use crate::{
    core::{
        close::CloseReason,
        error::{
            WampError,
            message_from_details,
        },
        hash::{
            HashMap,
            HashSet,
        },
        id::{
            Id,
            RequestIdSequence,
        },
        roles::RouterRole,
        types::{
            Dictionary,
            List,
            Value,
        },
        uri::Uri,
    },
    message::{
        common::{
            error_for_invocation,
            goodbye_and_out,
            goodbye_with_close_reason,
            yield_for_value,
        },
        message::{
            AbortMessage,
            AuthenticateMessage,
            CallMessage,
            ChallengeMessage,
            ErrorMessage,
            EventMessage,
            GoodbyeMessage,
            HelloMessage,
            InvocationMessage,
            Message,
            PublishMessage,
            PublishedMessage,
            RegisterMessage,
            RegisteredMessage,
            ResultMessage,
            SubscribeMessage,
            SubscribedMessage,
            UnregisterMessage,
            UnregisteredMessage,
            UnsubscribeMessage,
            UnsubscribedMessage,
            WelcomeMessage,
        },
    },
    peer::{
        auth::ChallengeHandler,
        peer::PeerConfig,
        queue::DeliveryQueue,
    },
};

/// A call to a remote procedure.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RpcCall {
    pub options: Dictionary,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

/// The result of a call to a remote procedure.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RpcResult {
    pub details: Dictionary,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

/// An event to publish to a topic.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishedEvent {
    pub options: Dictionary,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

/// An event received for a subscribed topic.
///
/// When the router attaches details to the event, the subscription's topic is merged in under the
/// `topic` key.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReceivedEvent {
    pub publication: Id,
    pub details: Dictionary,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

/// The router's confirmation of an acknowledged publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub publication: Id,
}

/// An invocation of a registered procedure.
///
/// When the router attaches details to the invocation, the registration's procedure is merged in
/// under the `procedure` key.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub details: Dictionary,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

/// A session successfully established in a realm.
#[derive(Debug, Clone)]
pub struct EstablishedSession {
    /// The session ID issued by the router.
    pub session: Id,
    /// Roles the router advertised in WELCOME.
    pub router_roles: HashSet<RouterRole>,
}

/// The terminal report of a session.
#[derive(Debug, Clone)]
pub struct SessionEnd {
    /// Why the session ended: the close or abort reason URI when one was exchanged, a transport
    /// error description when the connection failed, or "Unknown error." when the connection
    /// simply went away.
    pub reason: String,
}

/// Handler for the response to a call.
pub type CallResponseHandler = Box<dyn FnOnce(Result<RpcResult, WampError>) + Send + 'static>;

/// Handler for the response to a subscribe request.
pub type SubscribeResponseHandler = Box<dyn FnOnce(Result<Subscription, WampError>) + Send + 'static>;

/// Handler for the response to a register request.
pub type RegisterResponseHandler = Box<dyn FnOnce(Result<Registration, WampError>) + Send + 'static>;

/// Handler for the response to an acknowledged publication.
pub type PublishResponseHandler = Box<dyn FnOnce(Result<Publication, WampError>) + Send + 'static>;

/// Handler for the response to an unsubscribe request.
pub type UnsubscribeResponseHandler = Box<dyn FnOnce(Result<(), WampError>) + Send + 'static>;

/// Handler for the response to an unregister request.
pub type UnregisterResponseHandler = Box<dyn FnOnce(Result<(), WampError>) + Send + 'static>;

/// Handler invoked on a subscription's delivery queue for every received event.
pub type EventHandler = Arc<dyn Fn(ReceivedEvent) + Send + Sync + 'static>;

/// Handler invoked on a registration's delivery queue for every invocation.
///
/// The handler returns a future, so slow procedures do not stall the session; its output is
/// shaped into the YIELD payload (see
/// [`yield_for_value`][`crate::message::common::yield_for_value`]), and a failure is reported to
/// the router as an ERROR.
pub type InvocationHandler =
    Arc<dyn Fn(Invocation) -> BoxFuture<'static, Result<Value, WampError>> + Send + Sync + 'static>;

/// A live subscription to a topic.
///
/// The handle observes the session that produced it but does not keep it alive. Once the session
/// confirms removal (or ends), the handle is invalidated and further operations on it are no-ops.
#[derive(Debug)]
pub struct Subscription {
    id: Id,
    topic: Uri,
    live: Arc<AtomicBool>,
    queue: DeliveryQueue,
    command_tx: UnboundedSender<Command>,
}

impl Subscription {
    /// The subscription ID issued by the router.
    pub fn id(&self) -> Id {
        self.id
    }

    /// The subscribed topic.
    pub fn topic(&self) -> &Uri {
        &self.topic
    }

    /// Whether the subscription still delivers events.
    pub fn live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Requests removal of the subscription.
    ///
    /// The response is delivered on the subscription's delivery queue. No-op if the subscription
    /// is no longer live.
    pub fn unsubscribe(&self, handler: UnsubscribeResponseHandler) {
        if !self.live() {
            debug!("Ignoring unsubscribe of dead subscription {}", self.id);
            return;
        }
        self.command_tx
            .send(Command::Unsubscribe {
                subscription: self.id,
                queue: self.queue.clone(),
                handler,
            })
            .ok();
    }

    /// Requests removal of the subscription and waits for the router's acknowledgement.
    pub async fn unsubscribe_and_wait(&self) -> Result<()> {
        if !self.live() {
            return Ok(());
        }
        let (result_tx, result_rx) = oneshot::channel();
        self.unsubscribe(Box::new(move |result| {
            result_tx.send(result).ok();
        }));
        result_rx
            .await
            .map_err(|_| Error::msg("unsubscribe was dropped before it completed"))?
            .map_err(Error::new)
    }
}

/// A live registration of a procedure.
///
/// The handle observes the session that produced it but does not keep it alive. Once the session
/// confirms removal (or ends), the handle is invalidated and further operations on it are no-ops.
#[derive(Debug)]
pub struct Registration {
    id: Id,
    procedure: Uri,
    live: Arc<AtomicBool>,
    queue: DeliveryQueue,
    command_tx: UnboundedSender<Command>,
}

impl Registration {
    /// The registration ID issued by the router.
    pub fn id(&self) -> Id {
        self.id
    }

    /// The registered procedure.
    pub fn procedure(&self) -> &Uri {
        &self.procedure
    }

    /// Whether the registration still receives invocations.
    pub fn live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Requests removal of the registration.
    ///
    /// The response is delivered on the registration's delivery queue. No-op if the registration
    /// is no longer live.
    pub fn unregister(&self, handler: UnregisterResponseHandler) {
        if !self.live() {
            debug!("Ignoring unregister of dead registration {}", self.id);
            return;
        }
        self.command_tx
            .send(Command::Unregister {
                registration: self.id,
                queue: self.queue.clone(),
                handler,
            })
            .ok();
    }

    /// Requests removal of the registration and waits for the router's acknowledgement.
    pub async fn unregister_and_wait(&self) -> Result<()> {
        if !self.live() {
            return Ok(());
        }
        let (result_tx, result_rx) = oneshot::channel();
        self.unregister(Box::new(move |result| {
            result_tx.send(result).ok();
        }));
        result_rx
            .await
            .map_err(|_| Error::msg("unregister was dropped before it completed"))?
            .map_err(Error::new)
    }
}

/// An operation posted to the session task by user-facing API calls.
pub(crate) enum Command {
    Call {
        procedure: Uri,
        rpc: RpcCall,
        queue: DeliveryQueue,
        handler: CallResponseHandler,
    },
    Register {
        procedure: Uri,
        options: Dictionary,
        queue: DeliveryQueue,
        invocation_handler: InvocationHandler,
        handler: RegisterResponseHandler,
    },
    Unregister {
        registration: Id,
        queue: DeliveryQueue,
        handler: UnregisterResponseHandler,
    },
    Subscribe {
        topic: Uri,
        options: Dictionary,
        queue: DeliveryQueue,
        event_handler: EventHandler,
        handler: SubscribeResponseHandler,
    },
    Unsubscribe {
        subscription: Id,
        queue: DeliveryQueue,
        handler: UnsubscribeResponseHandler,
    },
    Publish {
        topic: Uri,
        event: PublishedEvent,
        acknowledgement: Option<(DeliveryQueue, PublishResponseHandler)>,
    },
    Leave {
        reason: CloseReason,
    },
    Disconnect,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Call { .. } => "CALL",
            Self::Register { .. } => "REGISTER",
            Self::Unregister { .. } => "UNREGISTER",
            Self::Subscribe { .. } => "SUBSCRIBE",
            Self::Unsubscribe { .. } => "UNSUBSCRIBE",
            Self::Publish { .. } => "PUBLISH",
            Self::Leave { .. } => "GOODBYE",
            Self::Disconnect => "disconnect",
        }
    }
}

struct PendingCall {
    queue: DeliveryQueue,
    handler: CallResponseHandler,
}

struct PendingRegister {
    procedure: Uri,
    queue: DeliveryQueue,
    invocation_handler: InvocationHandler,
    handler: RegisterResponseHandler,
}

struct PendingUnregister {
    registration: Id,
    queue: DeliveryQueue,
    handler: UnregisterResponseHandler,
}

struct PendingSubscribe {
    topic: Uri,
    queue: DeliveryQueue,
    event_handler: EventHandler,
    handler: SubscribeResponseHandler,
}

struct PendingUnsubscribe {
    subscription: Id,
    queue: DeliveryQueue,
    handler: UnsubscribeResponseHandler,
}

struct PendingPublish {
    queue: DeliveryQueue,
    handler: PublishResponseHandler,
}

struct SubscriptionRecord {
    topic: Uri,
    queue: DeliveryQueue,
    event_handler: EventHandler,
    live: Arc<AtomicBool>,
}

struct RegistrationRecord {
    procedure: Uri,
    queue: DeliveryQueue,
    invocation_handler: InvocationHandler,
    live: Arc<AtomicBool>,
}

#[derive(Debug)]
enum SessionState {
    Disconnected,
    HelloSent,
    Challenged,
    Established {
        session: Id,
        router_roles: HashSet<RouterRole>,
    },
    Closing {
        session: Id,
    },
    Aborted,
}

impl SessionState {
    fn name(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::HelloSent => "hello-sent",
            Self::Challenged => "challenged",
            Self::Established { .. } => "established",
            Self::Closing { .. } => "closing",
            Self::Aborted => "aborted",
        }
    }

    /// The router-issued session ID, present exactly while the session is established or waiting
    /// out the closing handshake.
    fn session_id(&self) -> Option<Id> {
        match self {
            Self::Established { session, .. } => Some(*session),
            Self::Closing { session } => Some(*session),
            _ => None,
        }
    }
}

/// Channels over which the session reports its lifecycle.
pub(crate) struct SessionHooks {
    pub established_tx: broadcast::Sender<Result<EstablishedSession, WampError>>,
    pub ended_tx: broadcast::Sender<SessionEnd>,
    pub session_id_cell: Arc<Mutex<Option<Id>>>,
}

/// The peer end of a WAMP session.
///
/// The session owns all per-session state: the state machine, the request ID sequence, the
/// pending-request tables, and the live subscription and registration tables. All of it is
/// confined to the single task driving the session; user API calls arrive as [`Command`]s and
/// router messages arrive from the connection's service, both over channels into that task.
pub(crate) struct Session {
    name: String,
    agent: String,
    realm: Uri,
    config: Arc<PeerConfig>,
    challenge_handler: Option<Arc<dyn ChallengeHandler>>,

    state: SessionState,
    request_ids: RequestIdSequence,

    pending_calls: HashMap<Id, PendingCall>,
    pending_registers: HashMap<Id, PendingRegister>,
    pending_unregisters: HashMap<Id, PendingUnregister>,
    pending_subscribes: HashMap<Id, PendingSubscribe>,
    pending_unsubscribes: HashMap<Id, PendingUnsubscribe>,
    pending_publishes: HashMap<Id, PendingPublish>,

    subscriptions: HashMap<Id, SubscriptionRecord>,
    registrations: HashMap<Id, RegistrationRecord>,

    service_message_tx: UnboundedSender<Message>,
    service_cancel_tx: broadcast::Sender<()>,
    command_tx: UnboundedSender<Command>,
    hooks: SessionHooks,

    /// The reason the session is going away, captured at the moment the close is decided so that
    /// the transport-end report can carry it.
    close_reason: Option<String>,
    establishment_reported: bool,
}

impl Session {
    pub fn new(
        config: Arc<PeerConfig>,
        realm: Uri,
        service_message_tx: UnboundedSender<Message>,
        service_cancel_tx: broadcast::Sender<()>,
        command_tx: UnboundedSender<Command>,
        hooks: SessionHooks,
    ) -> Self {
        Self {
            name: config.name.clone(),
            agent: config.agent.clone(),
            realm,
            challenge_handler: config.challenge_handler.clone(),
            config,
            state: SessionState::Disconnected,
            request_ids: RequestIdSequence::new(),
            pending_calls: HashMap::default(),
            pending_registers: HashMap::default(),
            pending_unregisters: HashMap::default(),
            pending_subscribes: HashMap::default(),
            pending_unsubscribes: HashMap::default(),
            pending_publishes: HashMap::default(),
            subscriptions: HashMap::default(),
            registrations: HashMap::default(),
            service_message_tx,
            service_cancel_tx,
            command_tx,
            hooks,
            close_reason: None,
            establishment_reported: false,
        }
    }

    /// Opens the session by sending HELLO for the configured realm.
    pub fn start(&mut self) {
        let mut details = Dictionary::default();
        details.insert("agent".to_owned(), Value::String(self.agent.clone()));
        details.insert(
            "roles".to_owned(),
            Value::Dictionary(
                self.config
                    .roles
                    .iter()
                    .map(|role| {
                        (
                            role.key_for_details().to_owned(),
                            Value::Dictionary(Dictionary::default()),
                        )
                    })
                    .collect(),
            ),
        );
        let auth = &self.config.auth;
        if !auth.methods.is_empty() {
            details.insert(
                "authmethods".to_owned(),
                Value::List(auth.methods.iter().cloned().map(Value::String).collect()),
            );
        }
        if let Some(id) = &auth.id {
            details.insert("authid".to_owned(), Value::String(id.clone()));
        }
        if let Some(role) = &auth.role {
            details.insert("authrole".to_owned(), Value::String(role.clone()));
        }
        if !auth.extra.is_empty() {
            details.insert("authextra".to_owned(), Value::Dictionary(auth.extra.clone()));
        }

        info!("Peer {} joining realm {}", self.name, self.realm);
        self.send(Message::Hello(HelloMessage {
            realm: self.realm.clone(),
            details,
        }));
        self.transition(SessionState::HelloSent);
    }

    fn send(&self, message: Message) {
        let message_name = message.message_name();
        if self.service_message_tx.send(message).is_err() {
            warn!(
                "Peer {} failed to send {message_name} message: connection is gone",
                self.name
            );
        }
    }

    fn transition(&mut self, state: SessionState) {
        debug!(
            "Peer {} transitioned from {} to {}",
            self.name,
            self.state.name(),
            state.name()
        );
        self.state = state;
        self.publish_session_id(self.state.session_id());
    }

    fn publish_session_id(&self, session_id: Option<Id>) {
        *self
            .hooks
            .session_id_cell
            .lock()
            .unwrap_or_else(|err| err.into_inner()) = session_id;
    }

    fn disconnect_transport(&self) {
        self.service_cancel_tx.send(()).ok();
    }

    fn report_establishment(&mut self, result: Result<EstablishedSession, WampError>) {
        self.establishment_reported = true;
        self.hooks.established_tx.send(result).ok();
    }

    /// Handles a user-facing API command.
    ///
    /// Every command that correlates to a router reply requires an established session; outside
    /// one, the command is logged and dropped without invoking its handler.
    pub fn handle_command(&mut self, command: Command) {
        if !matches!(self.state, SessionState::Established { .. })
            && !matches!(command, Command::Disconnect)
        {
            warn!(
                "Peer {} dropped a {} request issued on a {} session",
                self.name,
                command.name(),
                self.state.name()
            );
            return;
        }
        match command {
            Command::Call {
                procedure,
                rpc,
                queue,
                handler,
            } => {
                let request = self.request_ids.next();
                self.pending_calls.insert(request, PendingCall { queue, handler });
                self.send(Message::Call(CallMessage {
                    request,
                    options: rpc.options,
                    procedure,
                    arguments: rpc.arguments,
                    arguments_keyword: rpc.arguments_keyword,
                }));
            }
            Command::Register {
                procedure,
                options,
                queue,
                invocation_handler,
                handler,
            } => {
                let request = self.request_ids.next();
                self.pending_registers.insert(
                    request,
                    PendingRegister {
                        procedure: procedure.clone(),
                        queue,
                        invocation_handler,
                        handler,
                    },
                );
                self.send(Message::Register(RegisterMessage {
                    request,
                    options,
                    procedure,
                }));
            }
            Command::Unregister {
                registration,
                queue,
                handler,
            } => {
                let request = self.request_ids.next();
                self.pending_unregisters.insert(
                    request,
                    PendingUnregister {
                        registration,
                        queue,
                        handler,
                    },
                );
                self.send(Message::Unregister(UnregisterMessage {
                    request,
                    registration,
                }));
            }
            Command::Subscribe {
                topic,
                options,
                queue,
                event_handler,
                handler,
            } => {
                let request = self.request_ids.next();
                self.pending_subscribes.insert(
                    request,
                    PendingSubscribe {
                        topic: topic.clone(),
                        queue,
                        event_handler,
                        handler,
                    },
                );
                self.send(Message::Subscribe(SubscribeMessage {
                    request,
                    options,
                    topic,
                }));
            }
            Command::Unsubscribe {
                subscription,
                queue,
                handler,
            } => {
                let request = self.request_ids.next();
                self.pending_unsubscribes.insert(
                    request,
                    PendingUnsubscribe {
                        subscription,
                        queue,
                        handler,
                    },
                );
                self.send(Message::Unsubscribe(UnsubscribeMessage {
                    request,
                    subscription,
                }));
            }
            Command::Publish {
                topic,
                mut event,
                acknowledgement,
            } => {
                let request = self.request_ids.next();
                if let Some((queue, handler)) = acknowledgement {
                    event
                        .options
                        .insert("acknowledge".to_owned(), Value::Bool(true));
                    self.pending_publishes
                        .insert(request, PendingPublish { queue, handler });
                }
                self.send(Message::Publish(PublishMessage {
                    request,
                    options: event.options,
                    topic,
                    arguments: event.arguments,
                    arguments_keyword: event.arguments_keyword,
                }));
            }
            Command::Leave { reason } => {
                let session = match self.state.session_id() {
                    Some(session) => session,
                    None => return,
                };
                self.send(goodbye_with_close_reason(reason));
                self.transition(SessionState::Closing { session });
            }
            Command::Disconnect => {
                self.close_reason
                    .get_or_insert_with(|| "disconnect requested by peer".to_owned());
                self.disconnect_transport();
            }
        }
    }

    /// Routes an inbound router message to the handler for its variant.
    ///
    /// Messages a router never legitimately sends to a client, and messages that do not fit the
    /// current state, are logged and dropped.
    pub async fn handle_message(&mut self, message: Message) {
        debug!(
            "Peer {} received {} message",
            self.name,
            message.message_name()
        );
        match message {
            Message::Welcome(message) => self.handle_welcome(message),
            Message::Abort(message) => self.handle_abort(message),
            Message::Challenge(message) => self.handle_challenge(message).await,
            Message::Goodbye(message) => self.handle_goodbye(message),
            Message::Error(message) => self.handle_error(message),
            Message::Result(message) => self.handle_result(message),
            Message::Subscribed(message) => self.handle_subscribed(message),
            Message::Unsubscribed(message) => self.handle_unsubscribed(message),
            Message::Published(message) => self.handle_published(message),
            Message::Event(message) => self.handle_event(message),
            Message::Registered(message) => self.handle_registered(message),
            Message::Unregistered(message) => self.handle_unregistered(message),
            Message::Invocation(message) => self.handle_invocation(message),
            message => warn!(
                "Peer {} dropped inbound {} message, which routers do not send to clients",
                self.name,
                message.message_name()
            ),
        }
    }

    fn handle_welcome(&mut self, message: WelcomeMessage) {
        match self.state {
            SessionState::HelloSent | SessionState::Challenged => (),
            _ => {
                warn!(
                    "Peer {} dropped WELCOME received on a {} session",
                    self.name,
                    self.state.name()
                );
                return;
            }
        }
        let router_roles = match message.details.get("roles").and_then(Value::dictionary) {
            Some(roles) => roles
                .keys()
                .filter_map(|role| match RouterRole::try_from(role.as_str()) {
                    Ok(role) => Some(role),
                    Err(_) => {
                        debug!("Router advertised unknown role {role}");
                        None
                    }
                })
                .collect(),
            None => HashSet::default(),
        };
        info!(
            "Peer {} established session {} on realm {}",
            self.name, message.session, self.realm
        );
        self.transition(SessionState::Established {
            session: message.session,
            router_roles: router_roles.clone(),
        });
        self.report_establishment(Ok(EstablishedSession {
            session: message.session,
            router_roles,
        }));
    }

    async fn handle_challenge(&mut self, message: ChallengeMessage) {
        if !matches!(self.state, SessionState::HelloSent) {
            warn!(
                "Peer {} dropped CHALLENGE received on a {} session",
                self.name,
                self.state.name()
            );
            return;
        }
        let handler = match &self.challenge_handler {
            Some(handler) => handler.clone(),
            None => {
                error!(
                    "Peer {} received a {} challenge but has no challenge handler",
                    self.name, message.auth_method
                );
                self.abort_establishment("No challenge delegate found.".to_owned());
                return;
            }
        };
        match handler
            .handle_challenge(&message.auth_method, &message.extra)
            .await
        {
            Ok(signature) => {
                self.send(Message::Authenticate(AuthenticateMessage {
                    signature,
                    extra: Dictionary::default(),
                }));
                self.transition(SessionState::Challenged);
            }
            Err(err) => {
                error!(
                    "Peer {} failed to answer a {} challenge: {err:#}",
                    self.name, message.auth_method
                );
                self.abort_establishment(format!("{err:#}"));
            }
        }
    }

    /// Aborts session establishment from the peer's side and tears the connection down.
    fn abort_establishment(&mut self, reason: String) {
        self.send(Message::Abort(AbortMessage {
            details: Dictionary::default(),
            reason: CloseReason::SystemShutdown.uri(),
        }));
        self.report_establishment(Err(WampError::new(
            CloseReason::SystemShutdown.uri(),
            reason.clone(),
        )));
        self.close_reason = Some(reason);
        self.transition(SessionState::Aborted);
        self.disconnect_transport();
    }

    fn handle_abort(&mut self, message: AbortMessage) {
        match self.state {
            SessionState::HelloSent | SessionState::Challenged => {
                let error = WampError::new(
                    message.reason.clone(),
                    message_from_details(&message.details),
                );
                self.report_establishment(Err(error));
            }
            SessionState::Established { .. } | SessionState::Closing { .. } => {
                warn!(
                    "Peer {} session aborted by router: {}",
                    self.name, message.reason
                );
            }
            _ => {
                warn!(
                    "Peer {} dropped ABORT received on a {} session",
                    self.name,
                    self.state.name()
                );
                return;
            }
        }
        self.close_reason = Some(message.reason.to_string());
        self.transition(SessionState::Aborted);
        self.disconnect_transport();
    }

    fn handle_goodbye(&mut self, message: GoodbyeMessage) {
        match self.state {
            SessionState::Established { .. } | SessionState::Closing { .. } => (),
            _ => {
                warn!(
                    "Peer {} dropped GOODBYE received on a {} session",
                    self.name,
                    self.state.name()
                );
                return;
            }
        }
        // A router-initiated GOODBYE is acknowledged; the acknowledgement itself is not.
        if message.reason != CloseReason::GoodbyeAndOut.uri() {
            self.send(goodbye_and_out());
        }
        self.close_reason = Some(message.reason.to_string());
        self.transition(SessionState::Disconnected);
        self.disconnect_transport();
    }

    fn handle_error(&mut self, message: ErrorMessage) {
        let request = message.request;
        let error = WampError::from_reply(
            message.error,
            message.details,
            message.arguments,
            message.arguments_keyword,
        );
        match message.request_type {
            Message::CALL_TAG => match self.pending_calls.remove(&request) {
                Some(PendingCall { queue, handler }) => {
                    queue.dispatch(async move { handler(Err(error)) });
                }
                None => self.orphan_reply("ERROR", "CALL", request),
            },
            Message::REGISTER_TAG => match self.pending_registers.remove(&request) {
                Some(PendingRegister { queue, handler, .. }) => {
                    queue.dispatch(async move { handler(Err(error)) });
                }
                None => self.orphan_reply("ERROR", "REGISTER", request),
            },
            Message::UNREGISTER_TAG => match self.pending_unregisters.remove(&request) {
                Some(PendingUnregister { queue, handler, .. }) => {
                    queue.dispatch(async move { handler(Err(error)) });
                }
                None => self.orphan_reply("ERROR", "UNREGISTER", request),
            },
            Message::SUBSCRIBE_TAG => match self.pending_subscribes.remove(&request) {
                Some(PendingSubscribe { queue, handler, .. }) => {
                    queue.dispatch(async move { handler(Err(error)) });
                }
                None => self.orphan_reply("ERROR", "SUBSCRIBE", request),
            },
            Message::UNSUBSCRIBE_TAG => match self.pending_unsubscribes.remove(&request) {
                Some(PendingUnsubscribe { queue, handler, .. }) => {
                    queue.dispatch(async move { handler(Err(error)) });
                }
                None => self.orphan_reply("ERROR", "UNSUBSCRIBE", request),
            },
            Message::PUBLISH_TAG => match self.pending_publishes.remove(&request) {
                Some(PendingPublish { queue, handler }) => {
                    queue.dispatch(async move { handler(Err(error)) });
                }
                None => self.orphan_reply("ERROR", "PUBLISH", request),
            },
            request_type => error!(
                "Peer {} dropped ERROR with unsupported request type {request_type}",
                self.name
            ),
        }
    }

    fn handle_result(&mut self, message: ResultMessage) {
        match self.pending_calls.remove(&message.call_request) {
            Some(PendingCall { queue, handler }) => {
                let result = RpcResult {
                    details: message.details,
                    arguments: message.arguments,
                    arguments_keyword: message.arguments_keyword,
                };
                queue.dispatch(async move { handler(Ok(result)) });
            }
            None => self.orphan_reply("RESULT", "CALL", message.call_request),
        }
    }

    fn handle_subscribed(&mut self, message: SubscribedMessage) {
        let Some(PendingSubscribe {
            topic,
            queue,
            event_handler,
            handler,
        }) = self.pending_subscribes.remove(&message.subscribe_request)
        else {
            self.orphan_reply("SUBSCRIBED", "SUBSCRIBE", message.subscribe_request);
            return;
        };
        let live = Arc::new(AtomicBool::new(true));
        self.subscriptions.insert(
            message.subscription,
            SubscriptionRecord {
                topic: topic.clone(),
                queue: queue.clone(),
                event_handler,
                live: live.clone(),
            },
        );
        let subscription = Subscription {
            id: message.subscription,
            topic,
            live,
            queue: queue.clone(),
            command_tx: self.command_tx.clone(),
        };
        queue.dispatch(async move { handler(Ok(subscription)) });
    }

    fn handle_unsubscribed(&mut self, message: UnsubscribedMessage) {
        let Some(PendingUnsubscribe {
            subscription,
            queue,
            handler,
        }) = self.pending_unsubscribes.remove(&message.unsubscribe_request)
        else {
            self.orphan_reply("UNSUBSCRIBED", "UNSUBSCRIBE", message.unsubscribe_request);
            return;
        };
        if let Some(record) = self.subscriptions.remove(&subscription) {
            record.live.store(false, Ordering::Release);
        }
        queue.dispatch(async move { handler(Ok(())) });
    }

    fn handle_published(&mut self, message: PublishedMessage) {
        match self.pending_publishes.remove(&message.publish_request) {
            Some(PendingPublish { queue, handler }) => {
                let publication = Publication {
                    publication: message.publication,
                };
                queue.dispatch(async move { handler(Ok(publication)) });
            }
            None => self.orphan_reply("PUBLISHED", "PUBLISH", message.publish_request),
        }
    }

    fn handle_event(&mut self, message: EventMessage) {
        let Some(record) = self.subscriptions.get(&message.subscription) else {
            warn!(
                "Peer {} dropped EVENT for unknown subscription {}",
                self.name, message.subscription
            );
            return;
        };
        let mut details = message.details;
        if !details.is_empty() {
            details.insert(
                "topic".to_owned(),
                Value::String(record.topic.as_ref().to_owned()),
            );
        }
        let event = ReceivedEvent {
            publication: message.publication,
            details,
            arguments: message.arguments,
            arguments_keyword: message.arguments_keyword,
        };
        let handler = record.event_handler.clone();
        record.queue.dispatch(async move { handler(event) });
    }

    fn handle_registered(&mut self, message: RegisteredMessage) {
        let Some(PendingRegister {
            procedure,
            queue,
            invocation_handler,
            handler,
        }) = self.pending_registers.remove(&message.register_request)
        else {
            self.orphan_reply("REGISTERED", "REGISTER", message.register_request);
            return;
        };
        let live = Arc::new(AtomicBool::new(true));
        self.registrations.insert(
            message.registration,
            RegistrationRecord {
                procedure: procedure.clone(),
                queue: queue.clone(),
                invocation_handler,
                live: live.clone(),
            },
        );
        let registration = Registration {
            id: message.registration,
            procedure,
            live,
            queue: queue.clone(),
            command_tx: self.command_tx.clone(),
        };
        queue.dispatch(async move { handler(Ok(registration)) });
    }

    fn handle_unregistered(&mut self, message: UnregisteredMessage) {
        let Some(PendingUnregister {
            registration,
            queue,
            handler,
        }) = self.pending_unregisters.remove(&message.unregister_request)
        else {
            self.orphan_reply("UNREGISTERED", "UNREGISTER", message.unregister_request);
            return;
        };
        if let Some(record) = self.registrations.remove(&registration) {
            record.live.store(false, Ordering::Release);
        }
        queue.dispatch(async move { handler(Ok(())) });
    }

    fn handle_invocation(&mut self, message: InvocationMessage) {
        let Some(record) = self.registrations.get(&message.registration) else {
            warn!(
                "Peer {} dropped INVOCATION for unknown registration {}",
                self.name, message.registration
            );
            return;
        };
        let mut details = message.details;
        if !details.is_empty() {
            details.insert(
                "procedure".to_owned(),
                Value::String(record.procedure.as_ref().to_owned()),
            );
        }
        let invocation = Invocation {
            details,
            arguments: message.arguments,
            arguments_keyword: message.arguments_keyword,
        };
        let handler = record.invocation_handler.clone();
        let request = message.request;
        let message_tx = self.service_message_tx.clone();
        record.queue.dispatch(async move {
            let reply = match handler(invocation).await {
                Ok(value) => yield_for_value(request, value),
                Err(error) => error_for_invocation(request, &error),
            };
            message_tx.send(reply).ok();
        });
    }

    fn orphan_reply(&self, message_name: &str, request_kind: &str, request: Id) {
        warn!(
            "Peer {} dropped {message_name} that matches no outstanding {request_kind} request \
             (request ID {request})",
            self.name
        );
    }

    /// Releases all session state after the transport is gone.
    ///
    /// Every outstanding continuation is completed exactly once with a cancellation error, and
    /// every live handle is invalidated. Returns whether the session is eligible for automatic
    /// reconnection: only an unexplained transport loss (no close reason, no error) qualifies.
    pub fn finish(&mut self, error: Option<String>) -> bool {
        let reconnectable = self.close_reason.is_none() && error.is_none();
        let reason = match self.close_reason.take() {
            Some(reason) => reason,
            None => match error {
                Some(error) => error,
                None => "Unknown error.".to_owned(),
            },
        };
        info!("Peer {} session ended: {reason}", self.name);

        if !self.establishment_reported {
            self.report_establishment(Err(WampError::new(
                Uri::from_known("wamp.error.canceled"),
                reason.clone(),
            )));
        }

        for (_, PendingCall { queue, handler }) in self.pending_calls.drain() {
            let error = WampError::transport_closed();
            queue.dispatch(async move { handler(Err(error)) });
        }
        for (_, PendingRegister { queue, handler, .. }) in self.pending_registers.drain() {
            let error = WampError::transport_closed();
            queue.dispatch(async move { handler(Err(error)) });
        }
        for (_, PendingUnregister { queue, handler, .. }) in self.pending_unregisters.drain() {
            let error = WampError::transport_closed();
            queue.dispatch(async move { handler(Err(error)) });
        }
        for (_, PendingSubscribe { queue, handler, .. }) in self.pending_subscribes.drain() {
            let error = WampError::transport_closed();
            queue.dispatch(async move { handler(Err(error)) });
        }
        for (_, PendingUnsubscribe { queue, handler, .. }) in self.pending_unsubscribes.drain() {
            let error = WampError::transport_closed();
            queue.dispatch(async move { handler(Err(error)) });
        }
        for (_, PendingPublish { queue, handler }) in self.pending_publishes.drain() {
            let error = WampError::transport_closed();
            queue.dispatch(async move { handler(Err(error)) });
        }
        for (_, record) in self.subscriptions.drain() {
            record.live.store(false, Ordering::Release);
        }
        for (_, record) in self.registrations.drain() {
            record.live.store(false, Ordering::Release);
        }

        if !matches!(self.state, SessionState::Aborted) {
            self.transition(SessionState::Disconnected);
        } else {
            self.publish_session_id(None);
        }
        self.hooks.ended_tx.send(SessionEnd { reason }).ok();
        reconnectable
    }
}
