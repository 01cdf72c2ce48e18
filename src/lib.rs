//! Reactive counter for the Stream Deck.
//!
//! The core ([`relay`], [`dispose`], [`ticker`], [`controller`], [`binding`],
//! [`views`]) knows nothing about Stream Deck; [`actions`] wires it to keys.

pub mod actions;
pub mod binding;
pub mod controller;
pub mod dispose;
pub mod relay;
pub mod render;
pub mod settings;
pub mod ticker;
pub mod topics;
pub mod views;

pub const PLUGIN_ID: &str = "icu.veelume.relaycounter";
