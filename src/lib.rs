//! trackscroll – scroll and middle-click emulation for trackballs.
//!
//! Holding an auxiliary button while rolling the ball scrolls; clicking it
//! without moving sends a middle click.

pub mod classifier;
pub mod config;
pub mod event;
pub mod logging;
pub mod manager;
