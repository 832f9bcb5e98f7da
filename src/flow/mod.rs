//! The user-facing conversation: events, validation, transitions and texts.

pub mod engine;
pub mod event;
pub mod machine;
pub mod prompts;
pub mod validate;
