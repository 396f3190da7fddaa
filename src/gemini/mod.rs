//! Client for the external generation service (Gemini image models).

mod client;
mod types;

pub use client::{GeminiClient, ImageGenerator};
