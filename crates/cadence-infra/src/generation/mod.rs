//! Content generation providers.

pub mod openai_compat;

pub use openai_compat::{OpenAiCompatConfig, OpenAiCompatGenerator};
