//! Collaborator traits implemented outside the core crate.

pub mod transport;

pub use transport::PubSubTransport;
