//! Rotating information pages on an SPI color display
//!
//! Background workers poll data sources into a shared key/value [`store`];
//! the compositor snapshots the keys of the selected page, renders it into a
//! frame and pushes the frame to the panel. A UDP control plane advances
//! pages.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────────┐   set/update   ┌───────────┐  snapshot   ┌────────────┐
//!  │ worker::     │ ─────────────► │  Store    │ ──────────► │ Compositor │
//!  │ Scheduler    │                │ (RwLock)  │             │            │
//!  │  system      │                └───────────┘             │  pages::*  │
//!  │  weather     │                                          │  theme     │
//!  │  market ...  │                ┌──────────────┐  current  │  resources │
//!  └──────────────┘   UDP "next" ─►│ PageSelector │ ────────► │            │
//!                     control      └──────────────┘           └─────┬──────┘
//!                                                                   │ Frame
//!                                                                   ▼
//!                                                      infoscreen_display::Panel
//! ```

pub mod config;
pub mod control;
pub mod error;
pub mod logging;
pub mod model;
pub mod pages;
pub mod render;
pub mod resources;
pub mod selector;
pub mod sources;
pub mod store;
pub mod theme;
pub mod worker;

pub use config::AppConfig;
pub use error::{ConfigError, RenderError, SourceError};
pub use selector::PageSelector;
pub use store::Store;
