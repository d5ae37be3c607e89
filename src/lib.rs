//! Terminal keyboard tester: draws a keyboard and lights up held keys.

pub mod app;
pub mod error;
pub mod evdev_util;
pub mod input;
pub mod keys;
pub mod layout;
pub mod prefs;
pub mod render;
pub mod sound;
pub mod terminal;
pub mod tracker;

pub use error::{Error, Result};
