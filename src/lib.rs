//! Client-side session synchronization for a two-team drawing and guessing game.
//!
//! The crate keeps a local view of a remote game session converged with the server,
//! infers game progress ahead of the server, coordinates team changes and exposes
//! optimistic scores, all behind the [`api::SessionApi`] seam.

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod state;
