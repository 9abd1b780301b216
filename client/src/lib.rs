//! # Mirror Client Library
//!
//! Client half of a replicated scene graph. The server owns the authoritative
//! scenes; this crate mirrors them locally, advances them once per frame and
//! draws the active camera's view.
//!
//! ## Architecture Overview
//!
//! ### Replication
//! A [`session::Session`] drives the connection through
//! `Disconnected → Connecting → AwaitingReady → Active`. The server's `ready`
//! event carries a full snapshot of every scene plus an asset manifest; after
//! it is applied the client acknowledges and starts receiving incremental
//! commands (add/remove scene, game object or component, per-tick deltas,
//! active scene and camera changes). Every command addresses its target by
//! server id and is applied as soon as it is polled.
//!
//! ### Session Identity
//! The session id reported by the transport on connect is pinned for the
//! lifetime of the connection. If the transport later reports a different id
//! the in-memory mirror can no longer be trusted, and the error returned
//! from [`session::Session::poll`] asks the caller to rebuild the client.
//!
//! ### Tick Loop
//! [`game::ClientGame::tick`] runs once per frame callback: timing, input
//! sampling, scene update, render, tick observers. Rendering only happens
//! while a camera is active.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Scenes, active scene and camera, snapshot merging, tick loop.
//!
//! ### Session Module (`session`)
//! Connection state machine and inbound command handling.
//!
//! ### Transport Module (`transport`)
//! `Transport` trait with an in-memory pair and a UDP implementation.
//!
//! ### Rendering Modules (`rendering`, `renderers`)
//! Renderer contract, the strategy selector that picks and switches
//! renderers, and the macroquad renderers.
//!
//! ### Input, Time, Assets, Config
//! Per-frame input with edge detection and axes, clamped frame timing, the
//! asset manifest store and client configuration.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use mirror_client::assets::AssetStore;
//! use mirror_client::config::ClientConfig;
//! use mirror_client::game::ClientGame;
//! use mirror_client::session::Session;
//! use mirror_client::time::SystemClock;
//! use mirror_client::transport::MemoryTransport;
//! use mirror_shared::{CapabilityRegistry, DeviceCaps};
//!
//! let mut game = ClientGame::new(
//!     ClientConfig::default(),
//!     DeviceCaps::default(),
//!     CapabilityRegistry::with_defaults(),
//! );
//! let mut session = Session::new(DeviceCaps::default(), Box::new(AssetStore::new()));
//! let (transport, _server) = MemoryTransport::pair();
//! session.connect(Box::new(transport));
//!
//! let clock = SystemClock::new();
//! loop {
//!     session.poll(&mut game)?;
//!     game.tick(&clock);
//!     session.on_tick(&mut game);
//! }
//! # Ok::<(), mirror_client::error::ClientError>(())
//! ```

pub mod assets;
pub mod config;
pub mod error;
pub mod game;
pub mod input;
pub mod renderers;
pub mod rendering;
pub mod session;
pub mod time;
pub mod transport;
