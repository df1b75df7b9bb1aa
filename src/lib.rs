//! Anniversary dedication page core
//!
//! An embedded page that asks its parent frame for a personalized payload and
//! plays a background soundtrack through a third-party streaming widget.
//!
//! - [`handshake`]: READY_FOR_DATA / DEDICATION_DATA exchange with the parent
//! - [`player`]: bootstrap loader and player adapter around the widget
//! - [`payload`]: payload model, fallback copy, rotating messages
//! - [`page`]: wires the above into one page view
//! - [`sim`]: scheduler-driven widget runtime and parent for tests and the CLI
//! - `web` (wasm32, feature `web`): browser implementations of every seam

pub mod channel;
pub mod handshake;
pub mod page;
pub mod payload;
pub mod player;
pub mod schedule;
pub mod sim;
pub mod utils;

#[cfg(all(target_arch = "wasm32", feature = "web"))]
pub mod web;

pub use page::{DataSource, DedicationPage, PagePhase};
pub use utils::{Config, DedicationError, Result};
