//! # Arbor Client
//!
//! Client-side core of the arbor bridge: the [`Session`] transport
//! abstraction with a scheme-keyed [`TransportRegistry`], the [`Client`]
//! that assembles requests and decodes responses, adapters between sync
//! and async sessions, and an in-process [`LoopbackSession`] for driving
//! a local bridge with no transport.
//!
//! HTTP and other concrete transports live outside this crate; anything
//! that can move one JSON tree each way can implement [`Session`].

pub mod adapter;
pub mod client;
pub mod error;
pub mod loopback;
pub mod session;

pub use adapter::{AsyncSessionAdapter, BlockingSessionAdapter};
pub use client::Client;
pub use error::{ClientError, ClientResult};
pub use loopback::LoopbackSession;
pub use session::{Session, SyncSession, TransportRegistry};
