use serde_json::Value;

use crate::codec::ImagePayload;
use crate::error::StudioResult;

/// Output parts the image model is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseModalities {
    ImageAndText,
    ImageOnly,
}

impl ResponseModalities {
    pub fn as_wire(self) -> &'static [&'static str] {
        match self {
            Self::ImageAndText => &["IMAGE", "TEXT"],
            Self::ImageOnly => &["IMAGE"],
        }
    }
}

/// One image-generation call: the images go first, in order, then the prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub images: Vec<ImagePayload>,
    pub modalities: ResponseModalities,
}

/// One structured-output call against a single image.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRequest {
    pub prompt: String,
    pub image: ImagePayload,
    pub schema: Value,
}

/// The external vision model. Everything the studio asks of it goes through
/// these two calls; tests substitute a scripted implementation.
pub trait VisionClient {
    fn generate_image(&self, request: &GenerationRequest) -> StudioResult<ImagePayload>;

    fn generate_json(&self, request: &JsonRequest) -> StudioResult<Value>;
}
