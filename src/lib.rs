#![warn(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod config;
pub mod domain;
pub mod lifecycle;
pub mod pubsub;
pub mod sdk;
pub mod server;
pub mod service;
pub mod store;
