//! Safe/Risky judgement of a nutrition label: the model path, the
//! deterministic rule table it falls back to, and the parsing in between.

pub mod client;
pub mod extract;
pub mod model;
pub mod prompt;
pub mod response;
pub mod rules;
pub mod services;

pub use client::{HttpLlmClient, LlmClient};
