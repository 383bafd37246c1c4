#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod collapse;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod filter;
pub mod idle;
pub mod logging;
pub mod model;
pub mod navigator;
pub mod render;
pub mod sequence;
pub mod tree;
pub mod window;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
pub use collapse::{CollapseId, CollapseReason, GroupId};
pub use engine::{DisplayOutcome, EngineSettings, Row, ThreadEngine, Viewport};
pub use model::{Comment, ElementKey, Post, ThreadElement, ThreadSnapshot};
