pub mod client;
pub mod codec;
pub mod compare;
pub mod error;
pub mod export;
pub mod gemini;
pub mod history;
pub mod prompts;
pub mod services;
pub mod session;

pub use client::{GenerationRequest, JsonRequest, ResponseModalities, VisionClient};
pub use codec::{ImageLoader, ImagePayload};
pub use error::{StudioError, StudioResult};
pub use gemini::{GeminiClient, GeminiConfig};
pub use session::DesignSession;
