//! unshuffle: a translation-drift guessing game.
//!
//! A game name is pushed through a random chain of machine translations; the
//! garbled result is posted and players reply with guesses at the original.

pub mod bot;
pub mod config;
pub mod game;
pub mod giantbomb;
pub mod language;
pub mod libretranslate;
pub mod party;
pub mod retry;
pub mod route;
pub mod scheduler;
pub mod session;
pub mod shutdown;
pub mod social;
pub mod store;
pub mod text;
pub mod twitter;
