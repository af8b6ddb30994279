use serde_json::{json, Value};
use stone_contracts::materials::RoomType;

use crate::client::{GenerationRequest, JsonRequest, ResponseModalities};
use crate::codec::ImagePayload;

const ROLE: &str =
    "You are a world-class AI interior designer specializing in photorealistic material visualization.";

pub const PATTERN_STYLE: &str = "Create a beautiful, harmonious pattern.";

const ROOM_VALIDATION: &str = "Analyze this image. Is it a photo of an indoor room? This can include rooms that are under construction, which may have unfinished walls, exposed elements, or a bare concrete floor. The key requirement is that a main floor surface is clearly visible and occupies a significant portion of the image, making it suitable for visualizing a new flooring material. The lighting should be sufficient to understand the space. The image must not be a close-up of a single texture, an outdoor scene, or have extreme perspective distortion that makes the floor unusable.";

const MATERIAL_VALIDATION: &str = "Analyze this image. Is it a texture swatch of a single material (like a tile, wood plank, or marble)? The image should be mostly flat and front-facing, suitable for use as a texture in an interior design app. Minor reflections, some blur, or subtle lighting variations are acceptable, especially for glossy materials. The image must not contain strong perspective, multiple objects, or be a photo of an entire room.";

const CLEAN_MATERIAL: &str = "You are an expert texture artist. Your task is to prepare this image for use as a 3D texture map. 1. Remove any uneven lighting, flash glares, or dark shadows to make the texture uniformly lit (albedo map style). 2. Crop out any background if it exists, keeping only the material surface. 3. Sharpen details slightly. 4. CRITICAL: Preserve the original color, pattern, and unique characteristics of the material exactly. Do not generate a generic version. Return ONLY the processed image.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    Room,
    Material,
}

impl ValidationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Room => "room",
            Self::Material => "material",
        }
    }
}

impl std::str::FromStr for ValidationKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "room" => Ok(Self::Room),
            "material" => Ok(Self::Material),
            _ => Err(format!("Unknown validation kind '{raw}' (expected room or material).")),
        }
    }
}

/// Inputs of a material redesign: the room photo, what to repaint, how, and
/// with which swatches.
#[derive(Debug, Clone)]
pub struct RedesignInput<'a> {
    pub room: &'a ImagePayload,
    pub target_label: &'a str,
    pub style: &'a str,
    pub references: &'a [ImagePayload],
    pub point_of_view: Option<&'a str>,
}

fn constraints(label: &str) -> String {
    [
        format!("- **Coverage**: The new material must cover the {label} completely and uniformly."),
        "- **Realism**: Preserve all original lighting, shadows (e.g. from furniture, walls), reflections, and geometric perspective. The new floor must look like it was physically installed in the room.".to_string(),
        "- **Perspective**: The texture must align with the room's vanishing points. Tiles or patterns must recede naturally.".to_string(),
    ]
    .join("\n")
}

fn framing(point_of_view: Option<&str>) -> String {
    match point_of_view.map(str::trim).filter(|value| !value.is_empty()) {
        Some(pov) => format!(" Re-render the entire scene {pov}."),
        None => String::new(),
    }
}

pub fn redesign_prompt(
    label: &str,
    style: &str,
    reference_count: usize,
    point_of_view: Option<&str>,
) -> String {
    let task = format!("Your task is to redesign the **{label}** in the first image provided.");
    let mut lines: Vec<String> = vec![ROLE.to_string(), task, String::new()];
    match reference_count {
        0 => {
            lines.push("**INSTRUCTIONS**:".to_string());
            lines.push(format!(
                "1. Redesign the {label} to perfectly match this description: \"{style}\"."
            ));
        }
        1 => {
            lines.push("**INPUTS**:".to_string());
            lines.push("- Image 1: The Room (Target).".to_string());
            lines.push("- Image 2: The Material Swatch (Source).".to_string());
            lines.push(String::new());
            lines.push("**INSTRUCTIONS**:".to_string());
            lines.push(
                "1. Use **ONLY** the texture from Image 2. Do not invent a new style.".to_string(),
            );
            lines.push(format!(
                "2. Apply the texture from Image 2 onto the {label} of Image 1."
            ));
            lines.push(
                "3. **Texture Fidelity**: Maintain the exact color, grain, and pattern of Image 2."
                    .to_string(),
            );
            lines.push(format!("4. {style}"));
        }
        count => {
            lines.push("**INPUTS**:".to_string());
            lines.push("- Image 1: The Room.".to_string());
            lines.push(format!("- Images 2-{}: Material Swatches.", count + 1));
            lines.push(String::new());
            lines.push("**INSTRUCTIONS**:".to_string());
            lines.push(
                "1. Create a sophisticated floor pattern using the provided material swatches."
                    .to_string(),
            );
            lines.push(format!(
                "2. **Pattern Design**: {style} (e.g. checkerboard, borders, geometric mix)."
            ));
            lines.push(format!(
                "3. Distribute the materials aesthetically across the {label}."
            ));
        }
    }
    lines.push(constraints(label));
    let framing = framing(point_of_view);
    if !framing.is_empty() {
        lines.push(framing);
    }
    lines.join("\n")
}

/// Builds the redesign call. The room photo is always image 1, followed by
/// the references in the order given.
pub fn build_redesign_request(input: &RedesignInput<'_>) -> GenerationRequest {
    let mut images = Vec::with_capacity(input.references.len() + 1);
    images.push(input.room.clone());
    images.extend(input.references.iter().cloned());
    GenerationRequest {
        prompt: redesign_prompt(
            input.target_label,
            input.style,
            input.references.len(),
            input.point_of_view,
        ),
        images,
        modalities: ResponseModalities::ImageAndText,
    }
}

pub fn refinement_prompt(instruction: &str) -> String {
    [
        "You are an expert AI Interior Designer.".to_string(),
        "The user has provided an image of a room and a specific instruction to modify it."
            .to_string(),
        String::new(),
        format!("**USER INSTRUCTION**: \"{}\"", instruction.trim()),
        String::new(),
        "**RULES**:".to_string(),
        "1. **Structural Integrity**: Keep the room's geometry, furniture placement, and perspective EXACTLY the same unless the user explicitly asks to move furniture.".to_string(),
        "2. **Lighting & Ambience**: You can change the lighting (day/night/warm/cool) if requested.".to_string(),
        "3. **Materials & Colors**: You can change wall colors, floor textures, or furniture materials if requested.".to_string(),
        "4. **Photorealism**: The output must be highly photorealistic.".to_string(),
        String::new(),
        "Apply the user's instruction to the image.".to_string(),
    ]
    .join("\n")
}

pub fn build_refinement_request(preview: &ImagePayload, instruction: &str) -> GenerationRequest {
    GenerationRequest {
        prompt: refinement_prompt(instruction),
        images: vec![preview.clone()],
        modalities: ResponseModalities::ImageOnly,
    }
}

pub fn build_clean_request(image: &ImagePayload) -> GenerationRequest {
    GenerationRequest {
        prompt: CLEAN_MATERIAL.to_string(),
        images: vec![image.clone()],
        modalities: ResponseModalities::ImageOnly,
    }
}

pub fn validation_prompt(kind: ValidationKind) -> &'static str {
    match kind {
        ValidationKind::Room => ROOM_VALIDATION,
        ValidationKind::Material => MATERIAL_VALIDATION,
    }
}

pub fn validation_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "isValid": {
                "type": "BOOLEAN",
                "description": "Whether the image meets the specified criteria."
            },
            "reason": {
                "type": "STRING",
                "description": "A brief, user-friendly explanation if the image is not valid (e.g., \"No clear floor visible,\" or \"Image is not a flat texture.\"). If valid, return \"OK\"."
            }
        }
    })
}

pub fn build_validation_request(image: &ImagePayload, kind: ValidationKind) -> JsonRequest {
    JsonRequest {
        prompt: validation_prompt(kind).to_string(),
        image: image.clone(),
        schema: validation_schema(),
    }
}

pub fn analysis_prompt(room: RoomType) -> String {
    format!(
        "Analyze this image of a {room}. Identify the floor in the image. Provide a one-word lowercase label \"floor\" and its bounding box coordinates as normalized values from 0 to 1. If no floor is visible, return an empty list of objects."
    )
}

pub fn analysis_schema() -> Value {
    let coordinate = |description: &str| json!({ "type": "NUMBER", "description": description });
    json!({
        "type": "OBJECT",
        "properties": {
            "objects": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "label": {
                            "type": "STRING",
                            "description": "The label for the object, which should always be \"floor\"."
                        },
                        "boundingBox": {
                            "type": "OBJECT",
                            "properties": {
                                "x1": coordinate("Top-left x-coordinate (normalized 0-1)"),
                                "y1": coordinate("Top-left y-coordinate (normalized 0-1)"),
                                "x2": coordinate("Bottom-right x-coordinate (normalized 0-1)"),
                                "y2": coordinate("Bottom-right y-coordinate (normalized 0-1)")
                            }
                        }
                    }
                }
            }
        }
    })
}

pub fn build_analysis_request(image: &ImagePayload, room: RoomType) -> JsonRequest {
    JsonRequest {
        prompt: analysis_prompt(room),
        image: image.clone(),
        schema: analysis_schema(),
    }
}
