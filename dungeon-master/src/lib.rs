//! Session runtime for the dungeon combat engine.
//!
//! Hosts any number of concurrent, independent sessions, each tied to one
//! broadcast channel: a per-session tokio task serializes player actions
//! with the scheduler tick, pulls static game data and characters from a
//! [`GameDataProvider`], and fans out state snapshots through an
//! [`UpdateRelay`].
//!
//! ```ignore
//! use dungeon_master::{DungeonMaster, SessionConfig, ActionMessage};
//!
//! let session = DungeonMaster::spawn(
//!     SessionConfig::new("channel-1"),
//!     provider,
//!     relay,
//! )
//! .await?;
//!
//! session.submit(ActionMessage::PlayerJoin { actor: "alice".into() }).await?;
//! session.submit(ActionMessage::Attack {
//!     actor: "alice".into(),
//!     targets: vec!["~M1".into()],
//! })
//! .await?;
//! ```

pub mod provider;
pub mod relay;
pub mod session;

pub use provider::{load_catalog, GameDataProvider, ProviderError, StaticProvider};
pub use relay::{ActionMessage, Audience, RelayError, SessionUpdate, StateSnapshot, UpdateRelay};
pub use session::{DungeonMaster, Query, SessionConfig, SessionError, SessionHandle};
