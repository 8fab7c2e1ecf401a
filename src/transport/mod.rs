pub mod direct_transport;
#[allow(clippy::module_inception)]
pub mod transport;
pub mod web_socket_transport;
