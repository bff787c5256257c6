//! Client-side news engine.
//!
//! - [`feed`]: tabbed headline/trending feeds driven by a [`filter::FilterSpec`],
//!   immune to out-of-order responses
//! - [`engagement`]: optimistic like/dislike/bookmark/read state with rollback
//! - [`image`]: always-renderable article images with a bounded fallback chain
//!
//! [`NewsDesk`] wires them to the HTTP backend in [`api`].

pub mod api;
pub mod config;
pub mod desk;
pub mod engagement;
pub mod events;
pub mod feed;
pub mod filter;
pub mod image;
pub mod model;
pub mod session;
pub mod util;

pub use desk::NewsDesk;
