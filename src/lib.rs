//! Quark keeps plain text and markdown notes in a directory tree, highlights
//! markdown as it is edited and renders notes to HTML.

pub mod config;
pub mod editor;
pub mod error;
pub mod highlight;
pub mod notes;
pub mod paint;
pub mod preview;
pub mod render;
pub mod session;
