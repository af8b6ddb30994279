//! One editing session over an uploaded room photo.
//!
//! Generation is split into `begin_*` (checks availability, builds the
//! request, marks the session busy) and [`DesignSession::complete`] (applies
//! the model's answer). The synchronous [`DesignSession::generate`] and
//! [`DesignSession::refine`] helpers run both halves around a client call;
//! front-ends that dispatch the call elsewhere hold on to the
//! [`PendingGeneration`] ticket and complete it later.

use serde_json::json;
use stone_contracts::detection::{find_floor, DetectedObject};
use stone_contracts::events::{emit_best_effort, payload, EventPayload, EventWriter};
use stone_contracts::materials::{browse, default_materials, Material, MaterialFilter, RoomType};
use stone_contracts::store::StockLibrary;

use crate::client::{GenerationRequest, VisionClient};
use crate::codec::{ImageLoader, ImagePayload};
use crate::compare::CompareSlider;
use crate::error::{StudioError, StudioResult};
use crate::history::{DesignHistory, HistoryIndex, HistoryItem};
use crate::prompts::{self, RedesignInput, PATTERN_STYLE};

pub const NEED_TWO_MATERIALS: &str = "Select at least 2 materials";
pub const NEED_MATERIAL: &str = "Select a material to visualize the design";
pub const NO_FLOOR: &str = "No floor was detected in this photo.";
pub const EMPTY_INSTRUCTION: &str = "Describe the change you want to make.";
pub const DEFAULT_MATERIAL_SAVE: &str = "This design can't be saved as it uses a default material.";
pub const SAVE_FAILED: &str = "Failed to save design.";
pub const NOTHING_TO_SAVE: &str = "Apply one of your own materials before saving a design.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Redesigning,
}

/// What the next generation will use. The two modes never coexist.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionMode {
    Single(Option<Material>),
    Combination(Vec<Material>),
}

impl SelectionMode {
    pub fn is_combination(&self) -> bool {
        matches!(self, Self::Combination(_))
    }

    pub fn single(&self) -> Option<&Material> {
        match self {
            Self::Single(selected) => selected.as_ref(),
            Self::Combination(_) => None,
        }
    }

    pub fn combination(&self) -> &[Material] {
        match self {
            Self::Single(_) => &[],
            Self::Combination(materials) => materials,
        }
    }

    pub fn is_selected(&self, id: &str) -> bool {
        match self {
            Self::Single(selected) => selected.as_ref().is_some_and(|m| m.id == id),
            Self::Combination(materials) => materials.iter().any(|m| m.id == id),
        }
    }
}

/// Label and availability of the generate button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryAction {
    pub label: String,
    pub enabled: bool,
    pub reason: Option<String>,
}

impl PrimaryAction {
    fn enabled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            enabled: true,
            reason: None,
        }
    }

    fn disabled(label: impl Into<String>, reason: Option<&str>) -> Self {
        Self {
            label: label.into(),
            enabled: false,
            reason: reason.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum GenerationKind {
    Material(Material),
    Pattern { count: usize },
    Refinement { instruction: String },
}

impl GenerationKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Material(_) => "material",
            Self::Pattern { .. } => "pattern",
            Self::Refinement { .. } => "refinement",
        }
    }

    fn description(&self) -> String {
        match self {
            Self::Material(material) => format!("Applied {}", material.name),
            Self::Pattern { count } => format!("Pattern with {count} materials"),
            Self::Refinement { instruction } => format!("AI Edit: {instruction}"),
        }
    }

    fn failure_message(&self) -> String {
        match self {
            Self::Material(material) => format!("Failed to apply {}. Please try again.", material.name),
            Self::Pattern { .. } => "Failed to apply combination. Please try again.".to_string(),
            Self::Refinement { .. } => "Failed to refine design. Please try again.".to_string(),
        }
    }
}

/// Ticket for one in-flight generation. Hand it back to
/// [`DesignSession::complete`] together with the model's answer.
#[derive(Debug)]
pub struct PendingGeneration {
    request: GenerationRequest,
    kind: GenerationKind,
    job: u64,
    epoch: u64,
}

impl PendingGeneration {
    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    pub fn description(&self) -> String {
        self.kind.description()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied(HistoryIndex),
    /// The session was reset or restarted while the job was running.
    Discarded,
}

#[derive(Debug)]
pub struct DesignSession {
    room: RoomType,
    original: ImagePayload,
    preview: ImagePayload,
    objects: Vec<DetectedObject>,
    target: Option<DetectedObject>,
    room_materials: Vec<Material>,
    filter: MaterialFilter,
    selection: SelectionMode,
    last_applied: Option<Material>,
    compare: CompareSlider,
    history: DesignHistory,
    error: Option<String>,
    in_flight: Option<u64>,
    next_job: u64,
    epoch: u64,
    events: Option<EventWriter>,
}

impl DesignSession {
    /// Opens a session on an accepted room photo. The floor, when detected,
    /// becomes the redesign target.
    pub fn start(
        original: ImagePayload,
        room: RoomType,
        objects: Vec<DetectedObject>,
        events: Option<EventWriter>,
    ) -> Self {
        let target = find_floor(&objects).cloned();
        let session = Self {
            room,
            preview: original.clone(),
            history: DesignHistory::new(original.clone()),
            original,
            objects,
            target,
            room_materials: default_materials(room),
            filter: MaterialFilter::default(),
            selection: SelectionMode::Single(None),
            last_applied: None,
            compare: CompareSlider::default(),
            error: None,
            in_flight: None,
            next_job: 0,
            epoch: 0,
            events,
        };
        session.emit(
            "session_started",
            payload(&[
                ("room", json!(room.as_str())),
                ("objects", json!(session.objects.len())),
                ("floor_detected", json!(session.target.is_some())),
            ]),
        );
        session
    }

    /// Replaces the photo and drops everything derived from the old one.
    /// A job still running against the old photo will be discarded.
    pub fn start_over(&mut self, original: ImagePayload, room: RoomType, objects: Vec<DetectedObject>) {
        let events = self.events.take();
        let epoch = self.epoch + 1;
        let next_job = self.next_job;
        *self = Self::start(original, room, objects, events);
        self.epoch = epoch;
        self.next_job = next_job;
    }

    pub fn room(&self) -> RoomType {
        self.room
    }

    pub fn original(&self) -> &ImagePayload {
        &self.original
    }

    pub fn preview(&self) -> &ImagePayload {
        &self.preview
    }

    pub fn target(&self) -> Option<&DetectedObject> {
        self.target.as_ref()
    }

    pub fn state(&self) -> SessionState {
        if self.in_flight.is_some() {
            SessionState::Redesigning
        } else {
            SessionState::Idle
        }
    }

    pub fn selection(&self) -> &SelectionMode {
        &self.selection
    }

    pub fn last_applied(&self) -> Option<&Material> {
        self.last_applied.as_ref()
    }

    pub fn compare(&self) -> &CompareSlider {
        &self.compare
    }

    pub fn compare_mut(&mut self) -> &mut CompareSlider {
        &mut self.compare
    }

    pub fn history(&self) -> &DesignHistory {
        &self.history
    }

    pub fn filter(&self) -> &MaterialFilter {
        &self.filter
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// The material grid: user stock first, then this room's built-ins.
    pub fn visible_materials(&self, stock: &[Material]) -> Vec<Material> {
        browse(stock, &self.room_materials, &self.filter)
    }

    /// Looks a material up by id among the user's stock and this room's
    /// built-ins, ignoring the filter.
    pub fn find_material(&self, stock: &[Material], id: &str) -> Option<Material> {
        stock
            .iter()
            .chain(self.room_materials.iter())
            .find(|material| material.id == id)
            .cloned()
    }

    pub fn select_material(&mut self, material: Material) {
        let id = material.id.clone();
        match &mut self.selection {
            SelectionMode::Single(selected) => {
                if selected.as_ref().is_some_and(|current| current.id == id) {
                    *selected = None;
                } else {
                    *selected = Some(material);
                }
            }
            SelectionMode::Combination(materials) => {
                if let Some(index) = materials.iter().position(|m| m.id == id) {
                    materials.remove(index);
                } else {
                    materials.push(material);
                }
            }
        }
        self.emit(
            "material_selected",
            payload(&[
                ("material_id", json!(id)),
                ("selected", json!(self.selection.is_selected(&id))),
                ("combination", json!(self.selection.is_combination())),
            ]),
        );
    }

    /// Entering clears the single selection, leaving clears the set.
    pub fn set_combination_mode(&mut self, on: bool) {
        if self.selection.is_combination() == on {
            return;
        }
        self.selection = if on {
            SelectionMode::Combination(Vec::new())
        } else {
            SelectionMode::Single(None)
        };
        self.emit(
            "combination_mode_changed",
            payload(&[("enabled", json!(on))]),
        );
    }

    /// Patterns are only offered for tiles; any other category leaves
    /// combination mode.
    pub fn set_filter(&mut self, filter: MaterialFilter) {
        let keeps_combination = filter
            .category
            .is_some_and(|category| category.supports_combination());
        self.filter = filter;
        if !keeps_combination {
            self.set_combination_mode(false);
        }
    }

    pub fn primary_action(&self) -> PrimaryAction {
        if self.state() == SessionState::Redesigning {
            return PrimaryAction::disabled("Generating...", None);
        }
        match &self.selection {
            SelectionMode::Combination(materials) if materials.len() < 2 => {
                PrimaryAction::disabled("Generate Pattern", Some(NEED_TWO_MATERIALS))
            }
            SelectionMode::Combination(materials) => {
                PrimaryAction::enabled(format!("Generate Pattern ({})", materials.len()))
            }
            SelectionMode::Single(None) => PrimaryAction::disabled("Visualize", Some(NEED_MATERIAL)),
            SelectionMode::Single(Some(_)) => PrimaryAction::enabled("Visualize"),
        }
    }

    /// Prepares a redesign of the ORIGINAL photo with the current selection.
    ///
    /// Swatch images that cannot be loaded fail the attempt like a model
    /// error would.
    pub fn begin_generation(&mut self, loader: &ImageLoader) -> StudioResult<PendingGeneration> {
        if self.state() == SessionState::Redesigning {
            return Err(StudioError::Busy);
        }
        let action = self.primary_action();
        if !action.enabled {
            let reason = action.reason.unwrap_or_else(|| action.label.clone());
            return Err(StudioError::unavailable(reason));
        }
        let Some(target) = self.target.clone() else {
            return Err(StudioError::unavailable(NO_FLOOR));
        };

        let (kind, style, sources) = match &self.selection {
            SelectionMode::Single(Some(material)) => (
                GenerationKind::Material(material.clone()),
                material.prompt.clone(),
                vec![material.image_url.clone()],
            ),
            SelectionMode::Combination(materials) => (
                GenerationKind::Pattern {
                    count: materials.len(),
                },
                PATTERN_STYLE.to_string(),
                materials.iter().map(|m| m.image_url.clone()).collect(),
            ),
            SelectionMode::Single(None) => return Err(StudioError::unavailable(NEED_MATERIAL)),
        };

        let mut references = Vec::with_capacity(sources.len());
        for source in sources.iter().filter(|source| !source.trim().is_empty()) {
            match loader.load(source) {
                Ok(image) => references.push(image),
                Err(err) => return Err(self.fail(&kind, &err)),
            }
        }

        let request = prompts::build_redesign_request(&RedesignInput {
            room: &self.original,
            target_label: &target.label,
            style: &style,
            references: &references,
            point_of_view: None,
        });
        Ok(self.launch(request, kind))
    }

    /// Prepares an AI edit of the CURRENT preview.
    pub fn begin_refinement(&mut self, instruction: &str) -> StudioResult<PendingGeneration> {
        if self.state() == SessionState::Redesigning {
            return Err(StudioError::Busy);
        }
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(StudioError::unavailable(EMPTY_INSTRUCTION));
        }
        let request = prompts::build_refinement_request(&self.preview, instruction);
        Ok(self.launch(
            request,
            GenerationKind::Refinement {
                instruction: instruction.to_string(),
            },
        ))
    }

    fn launch(&mut self, request: GenerationRequest, kind: GenerationKind) -> PendingGeneration {
        let job = self.next_job;
        self.next_job += 1;
        self.in_flight = Some(job);
        self.error = None;
        self.emit(
            "generation_started",
            payload(&[
                ("kind", json!(kind.as_str())),
                ("description", json!(kind.description())),
                ("images", json!(request.images.len())),
            ]),
        );
        PendingGeneration {
            request,
            kind,
            job,
            epoch: self.epoch,
        }
    }

    /// Applies the model's answer to a pending generation.
    ///
    /// On failure nothing but the error message changes, so the user can
    /// retry with the same selection.
    pub fn complete(
        &mut self,
        pending: PendingGeneration,
        outcome: StudioResult<ImagePayload>,
    ) -> StudioResult<Completion> {
        if self.in_flight == Some(pending.job) {
            self.in_flight = None;
        }
        if pending.epoch != self.epoch {
            self.emit(
                "generation_discarded",
                payload(&[
                    ("kind", json!(pending.kind.as_str())),
                    ("succeeded", json!(outcome.is_ok())),
                ]),
            );
            return Ok(Completion::Discarded);
        }

        let image = match outcome {
            Ok(image) => image,
            Err(err) => return Err(self.fail(&pending.kind, &err)),
        };

        let description = pending.kind.description();
        self.preview = image.clone();
        let index = self.history.push(image, description.clone());
        self.last_applied = match pending.kind {
            GenerationKind::Material(material) => Some(material),
            GenerationKind::Pattern { .. } | GenerationKind::Refinement { .. } => None,
        };
        self.compare.show();
        self.error = None;
        self.emit(
            "generation_succeeded",
            payload(&[
                ("description", json!(description)),
                ("history_index", json!(index.get())),
            ]),
        );
        Ok(Completion::Applied(index))
    }

    fn fail(&mut self, kind: &GenerationKind, err: &StudioError) -> StudioError {
        let message = kind.failure_message();
        self.emit(
            "generation_failed",
            payload(&[
                ("kind", json!(kind.as_str())),
                ("error", json!(err.to_string())),
            ]),
        );
        self.error = Some(message.clone());
        StudioError::generation(message)
    }

    pub fn generate(
        &mut self,
        client: &dyn VisionClient,
        loader: &ImageLoader,
    ) -> StudioResult<Completion> {
        let pending = self.begin_generation(loader)?;
        let outcome = client.generate_image(pending.request());
        self.complete(pending, outcome)
    }

    pub fn refine(&mut self, client: &dyn VisionClient, instruction: &str) -> StudioResult<Completion> {
        let pending = self.begin_refinement(instruction)?;
        let outcome = client.generate_image(pending.request());
        self.complete(pending, outcome)
    }

    /// Back to the original photo with nothing selected. History is kept.
    pub fn reset(&mut self) {
        self.preview = self.original.clone();
        self.last_applied = None;
        self.selection = SelectionMode::Single(None);
        self.compare.hide();
        self.epoch += 1;
        self.emit(
            "session_reset",
            payload(&[("history_len", json!(self.history.len()))]),
        );
    }

    pub fn restore(&mut self, index: HistoryIndex) -> Option<&HistoryItem> {
        let item = self.history.get(index)?.clone();
        self.preview = item.image.clone();
        if item.is_original() {
            self.last_applied = None;
        }
        self.emit(
            "history_restored",
            payload(&[
                ("history_index", json!(index.get())),
                ("description", json!(item.description)),
            ]),
        );
        self.history.get(index)
    }

    pub fn toggle_compare(&mut self) {
        self.compare.toggle();
        self.emit(
            "compare_changed",
            payload(&[
                ("visible", json!(self.compare.is_visible())),
                ("fraction", json!(self.compare.fraction())),
            ]),
        );
    }

    pub fn has_redesigned(&self) -> bool {
        self.preview != self.original
    }

    pub fn can_save_design(&self, stock: &StockLibrary) -> bool {
        self.has_redesigned()
            && self
                .last_applied
                .as_ref()
                .is_some_and(|material| stock.contains(&material.id))
    }

    /// Appends the preview to the applied material's saved designs.
    ///
    /// The in-memory stock keeps the new design even when the write fails.
    pub fn save_design(&mut self, stock: &mut StockLibrary) -> StudioResult<Material> {
        let Some(material) = self.last_applied.clone().filter(|_| self.has_redesigned()) else {
            return Err(StudioError::unavailable(NOTHING_TO_SAVE));
        };
        if !stock.contains(&material.id) {
            self.error = Some(DEFAULT_MATERIAL_SAVE.to_string());
            return Err(StudioError::unavailable(DEFAULT_MATERIAL_SAVE));
        }
        match stock.append_saved_design(&material.id, self.preview.to_data_url()) {
            Ok(Some(updated)) => {
                self.emit(
                    "design_saved",
                    payload(&[
                        ("material_id", json!(updated.id)),
                        ("saved_designs", json!(updated.saved_designs.len())),
                    ]),
                );
                Ok(updated)
            }
            Ok(None) => {
                self.error = Some(DEFAULT_MATERIAL_SAVE.to_string());
                Err(StudioError::unavailable(DEFAULT_MATERIAL_SAVE))
            }
            Err(err) => {
                self.error = Some(SAVE_FAILED.to_string());
                Err(StudioError::persistence(&err))
            }
        }
    }

    fn emit(&self, event_type: &str, data: EventPayload) {
        emit_best_effort(self.events.as_ref(), event_type, data);
    }
}
