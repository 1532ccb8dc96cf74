//! Asynchronous TTS job lifecycle.
//!
//! One client request becomes one [`Job`] with exactly one [`Segment`].
//! The [`JobService`] façade creates the record and hands it to the
//! [`Executor`]'s worker pool; workers drive the state machine
//! `pending → processing → completed | failed`, writing audio into the
//! [`AudioCache`] before publishing the terminal record to the TTL-backed
//! [`JobStore`]. Clients poll status and fetch segment audio through the
//! façade; records untouched for the TTL window silently disappear.

mod cache;
mod error;
mod executor;
mod model;
mod service;
mod store;

pub use cache::*;
pub use error::*;
pub use executor::*;
pub use model::*;
pub use service::*;
pub use store::*;
