#[allow(clippy::module_inception)]
pub mod connector;
pub mod web_socket_connector;
