//! Content generation abstractions.
//!
//! - `ContentGenerator`: RPITIT trait for concrete generation providers
//! - `BoxContentGenerator`: object-safe wrapper for dynamic dispatch
//! - `GenerationChain`: ordered providers tried until one succeeds

pub mod box_generator;
pub mod chain;
pub mod generator;

pub use box_generator::BoxContentGenerator;
pub use chain::{GeneratedContent, GenerationChain};
pub use generator::{ContentGenerator, GenerationContext};
