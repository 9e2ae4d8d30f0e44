//! Domain model module declarations.

pub mod client;
pub mod request;
