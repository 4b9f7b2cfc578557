//! Concurrency-limiting FIFO task queue for controlling backpressure.
//!
//! A [Funnel] accepts asynchronous calls one at a time and admits at most a
//! fixed number of them to run concurrently, holding the rest in a FIFO
//! backlog. It protects downstream resources (databases, remote services,
//! file handles) from unbounded concurrent access when callers submit work
//! faster than it can safely be processed.
//!
//! Optional policies reject new calls once the backlog is full, put a
//! deadline on each call, and clear the backlog when a call fails. See
//! [Config].

#![deny(missing_docs)]

#[cfg(doctest)]
use doc_comment::doctest;
#[cfg(doctest)]
doctest!("../README.md");

mod call;
mod config;
mod error;
mod event;
mod funnel;

pub use call::{named, AsyncCall, Named};
pub use config::Config;
pub use error::{BoxError, Error};
pub use event::Event;
pub use funnel::{Funnel, FunnelState};
