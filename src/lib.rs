//! Records browser interactions as a replayable action list and replays it by
//! re-resolving each target against the live DOM.

pub mod api;
pub mod browser;
pub mod capture;
pub mod config;
pub mod error;
pub mod events;
pub mod identify;
pub mod models;
pub mod recording;
pub mod replay;
pub mod store;
