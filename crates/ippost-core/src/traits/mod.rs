//! Core traits for the public IP poster
//!
//! This module defines the abstract interfaces that collaborators implement.
//!
//! - [`EchoService`]: Report the caller's public address as plain text
//! - [`Transport`]: Publish the cache file to one kind of destination

pub mod echo_service;
pub mod transport;

pub use echo_service::EchoService;
pub use transport::Transport;
