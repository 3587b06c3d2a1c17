//! Headless runtime: a host and a playback element driving an external player.

pub mod host;
pub mod process;

pub use host::{HeadlessContainer, HeadlessHost};
pub use process::ProcessElement;
