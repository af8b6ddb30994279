pub mod catalogue;
pub mod chat;
pub mod detection;
pub mod events;
pub mod materials;
pub mod store;
