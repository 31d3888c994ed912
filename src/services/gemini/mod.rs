mod api;
pub mod client;
pub mod prompts;

pub use client::{GeminiClient, GeminiModels};
