pub mod analytics;
pub mod auth;
pub mod bulk;
pub mod clock;
pub mod config;
pub mod debounce;
pub mod demo;
pub mod domain;
pub mod engine;
pub mod error;
pub mod mutation;
pub mod normalize;
pub mod notice;
pub mod query;
pub mod remote;
pub mod store;
pub mod sync;
pub mod validate;

pub use engine::{Engine, RefetchOutcome, RefetchTrigger, TickReport};
pub use error::{AppError, ErrorKind};
