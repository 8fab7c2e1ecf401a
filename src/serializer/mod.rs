pub mod json;
pub mod message_pack;
#[allow(clippy::module_inception)]
pub mod serializer;
