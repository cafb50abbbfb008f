//! Minimal client for the Gemini `generateContent` REST API.

pub mod client;
pub mod types;

pub use client::{GEMINI_API_BASE_URL, GeminiClient, GeminiClientBuilder};
pub use types::{Content, GenerateContentResponse, Part, Reply};
