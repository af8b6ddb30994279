//! Single-shot calls against the vision model: photo validation, swatch
//! cleaning, floor detection and the two redesign flavours.

use serde::Deserialize;
use serde_json::{json, Value};
use stone_contracts::detection::DetectedObject;
use stone_contracts::events::{emit_best_effort, payload, EventWriter};
use stone_contracts::materials::RoomType;

use crate::client::VisionClient;
use crate::codec::ImagePayload;
use crate::error::{StudioError, StudioResult};
use crate::prompts::{self, RedesignInput, ValidationKind};

pub const VALIDATION_FALLBACK: &str = "Could not validate the image. Please try again.";
pub const ANALYSIS_FAILED: &str =
    "Failed to analyze the image. Please try a different photo or check your API key.";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationVerdict {
    pub is_valid: bool,
    #[serde(default)]
    pub reason: String,
}

impl ValidationVerdict {
    fn fallback() -> Self {
        Self {
            is_valid: false,
            reason: VALIDATION_FALLBACK.to_string(),
        }
    }
}

/// Never fails: a broken call or an unreadable verdict counts as a rejection.
pub fn validate_image(
    client: &dyn VisionClient,
    image: &ImagePayload,
    kind: ValidationKind,
) -> ValidationVerdict {
    let request = prompts::build_validation_request(image, kind);
    client
        .generate_json(&request)
        .ok()
        .and_then(|value| serde_json::from_value::<ValidationVerdict>(value).ok())
        .unwrap_or_else(ValidationVerdict::fallback)
}

/// Returns the original image when the model cannot produce a cleaned one.
pub fn clean_material_image(client: &dyn VisionClient, image: &ImagePayload) -> ImagePayload {
    client
        .generate_image(&prompts::build_clean_request(image))
        .unwrap_or_else(|_| image.clone())
}

#[derive(Debug, Default, Deserialize)]
struct AnalysisResponse {
    #[serde(default)]
    objects: Vec<DetectedObject>,
}

pub fn analyze_room(
    client: &dyn VisionClient,
    image: &ImagePayload,
    room: RoomType,
) -> StudioResult<Vec<DetectedObject>> {
    let request = prompts::build_analysis_request(image, room);
    let value = client.generate_json(&request)?;
    parse_analysis(value)
}

fn parse_analysis(value: Value) -> StudioResult<Vec<DetectedObject>> {
    if !value.is_object() {
        return Err(StudioError::generation("room analysis returned a non-object"));
    }
    let parsed: AnalysisResponse = serde_json::from_value(value)
        .map_err(|err| StudioError::generation(format!("room analysis unreadable: {err}")))?;
    Ok(parsed.objects)
}

/// Validates an uploaded room photo, then detects its floor.
///
/// A rejected photo becomes `Validation` with the model's reason.
pub fn accept_room_photo(
    client: &dyn VisionClient,
    image: &ImagePayload,
    room: RoomType,
    events: Option<&EventWriter>,
) -> StudioResult<Vec<DetectedObject>> {
    let verdict = validate_image(client, image, ValidationKind::Room);
    if !verdict.is_valid {
        emit_best_effort(
            events,
            "validation_rejected",
            payload(&[("kind", json!("room")), ("reason", json!(verdict.reason))]),
        );
        return Err(StudioError::Validation {
            reason: verdict.reason,
        });
    }
    let objects = analyze_room(client, image, room).map_err(|err| {
        emit_best_effort(
            events,
            "analysis_finished",
            payload(&[("room", json!(room.as_str())), ("error", json!(err.to_string()))]),
        );
        StudioError::generation(ANALYSIS_FAILED)
    })?;
    emit_best_effort(
        events,
        "analysis_finished",
        payload(&[
            ("room", json!(room.as_str())),
            ("objects", json!(objects.len())),
        ]),
    );
    Ok(objects)
}

pub fn redesign_object(
    client: &dyn VisionClient,
    input: &RedesignInput<'_>,
) -> StudioResult<ImagePayload> {
    client.generate_image(&prompts::build_redesign_request(input))
}

pub fn refine_design(
    client: &dyn VisionClient,
    preview: &ImagePayload,
    instruction: &str,
) -> StudioResult<ImagePayload> {
    if instruction.trim().is_empty() {
        return Err(StudioError::unavailable("Describe the change you want to make."));
    }
    client.generate_image(&prompts::build_refinement_request(preview, instruction))
}
