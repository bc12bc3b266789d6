//! Background audio for the portfolio site: a shuffled session playlist, a
//! circular waveform around the portal, and in-place page swaps that keep the
//! music going.
//!
//! Everything outside `web` is host-agnostic and tested against the
//! in-memory hosts in [`memory`].

pub mod analyzer;
pub mod bio;
pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod memory;
pub mod nav;
pub mod painter;
pub mod player;
pub mod playlist;
pub mod session;
pub mod waveform;

#[cfg(target_arch = "wasm32")]
mod web;

pub use config::PlayerConfig;
pub use engine::PlaybackState;
pub use error::{NavError, PlayerError};
pub use player::{Player, PlayerParts};
