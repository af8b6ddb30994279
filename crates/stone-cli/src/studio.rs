use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;

use anyhow::Result;
use serde_json::json;
use stone_contracts::chat::{parse_intent, Intent, CHAT_HELP_COMMANDS};
use stone_contracts::events::{emit_best_effort, payload};
use stone_contracts::materials::{category_structure, MaterialCategory};
use stone_contracts::store::StockLibrary;
use stone_engine::codec::{read_image_file, ImageLoader};
use stone_engine::compare::{CanvasRect, PointerEvent};
use stone_engine::export::{plan_presentation, DocumentSink, ManifestSink, PageSize};
use stone_engine::services::accept_room_photo;
use stone_engine::session::{Completion, DesignSession};
use stone_engine::StudioError;

use crate::{describe_material, AppContext, StudioArgs};

const NEED_SINGLE_APPLIED: &str = "Apply a single material before exporting a presentation.";

pub(crate) fn run_studio(ctx: &AppContext, args: StudioArgs) -> Result<i32> {
    let client = ctx.client()?;
    let loader = ImageLoader::new();
    let original = read_image_file(&args.image)?;

    println!("Validating your image...");
    let objects = match accept_room_photo(&client, &original, args.room, Some(&ctx.events)) {
        Ok(objects) => objects,
        Err(StudioError::Validation { reason }) => {
            println!("This photo can't be used: {reason}");
            return Ok(2);
        }
        Err(err) => return Err(err.into()),
    };

    let mut stock = ctx.stock();
    let mut session = DesignSession::start(original, args.room, objects, Some(ctx.events.clone()));
    if session.target().is_none() {
        println!("No floor was detected; AI edits still work but materials can't be applied.");
    }
    println!(
        "Stone Studio: {} session started. Type /help for commands, or describe an edit.",
        args.room
    );

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let intent = parse_intent(line.trim_end_matches(['\n', '\r']));
        let reply = match intent.action.as_str() {
            "noop" => continue,
            "quit" => break,
            "generate" => {
                println!("Generating...");
                report(session.generate(&client, &loader))
            }
            "refine" => {
                let instruction = intent.instruction.clone().unwrap_or_default();
                println!("Refining...");
                report(session.refine(&client, &instruction))
            }
            "export" => export_presentation(ctx, &session, &loader, &intent),
            _ => apply_command(&mut session, &mut stock, &intent),
        };
        println!("{reply}");
    }
    Ok(0)
}

/// Commands that only touch local session state and the stock library.
fn apply_command(session: &mut DesignSession, stock: &mut StockLibrary, intent: &Intent) -> String {
    match intent.action.as_str() {
        "help" => format!("Commands: {}", CHAT_HELP_COMMANDS.join(" ")),
        "list_materials" => list_materials(session, stock),
        "set_filter" => set_filter(session, intent),
        "select_material" => select_material(session, stock, intent),
        "set_combination_mode" => set_combination_mode(session, intent),
        "list_history" => list_history(session),
        "restore_history" => restore(session, intent),
        "reset" => {
            session.reset();
            "Back to the original photo.".to_string()
        }
        "toggle_compare" => {
            session.toggle_compare();
            compare_line(session)
        }
        "slide" => slide(session, intent),
        "save_design" => save_design(session, stock),
        "status" => status(session, stock),
        _ => format!("Unknown command: {}", intent.raw.trim()),
    }
}

fn report(result: Result<Completion, StudioError>) -> String {
    match result {
        Ok(Completion::Applied(index)) => format!("Done (history #{}).", index.get()),
        Ok(Completion::Discarded) => "The result arrived after a reset and was discarded.".to_string(),
        Err(StudioError::Unavailable { reason }) => reason,
        Err(StudioError::GenerationFailed { message }) => message,
        Err(err) => format!("Error: {err}"),
    }
}

fn list_materials(session: &DesignSession, stock: &StockLibrary) -> String {
    let materials = session.visible_materials(stock.items());
    if materials.is_empty() {
        return "No materials match the current filter.".to_string();
    }
    materials
        .iter()
        .map(|material| {
            let marker = if session.selection().is_selected(&material.id) {
                "*"
            } else {
                " "
            };
            format!("{marker} {}", describe_material(material))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn set_filter(session: &mut DesignSession, intent: &Intent) -> String {
    let values = intent.arg_list("values");
    let Some(raw_category) = values.first() else {
        return "/filter requires a category (Marble, Granite, Tiles or all)".to_string();
    };
    let mut filter = session.filter().clone();
    if raw_category.eq_ignore_ascii_case("all") {
        filter.set_category(None);
    } else {
        let category = match raw_category.parse::<MaterialCategory>() {
            Ok(category) => category,
            Err(err) => return err.to_string(),
        };
        if filter.category != Some(category) {
            filter.set_category(Some(category));
        }
        if let Some(sub) = values.get(1) {
            let known = category_structure(category);
            if !known.iter().any(|name| *name == sub.as_str()) {
                return format!(
                    "{category} has no sub-category '{sub}' (choose from: {})",
                    known.join(", ")
                );
            }
            filter.toggle_sub_category(sub);
        }
    }
    session.set_filter(filter);
    let filter = session.filter();
    let category = filter
        .category
        .map(|category| category.to_string())
        .unwrap_or_else(|| "all".to_string());
    match filter.sub_category.as_deref() {
        Some(sub) => format!("Filter: {category} / {sub}"),
        None => format!("Filter: {category}"),
    }
}

fn select_material(session: &mut DesignSession, stock: &StockLibrary, intent: &Intent) -> String {
    let Some(id) = intent.arg_str("value") else {
        return "/select requires a material id (see /materials)".to_string();
    };
    let Some(material) = session.find_material(stock.items(), id) else {
        return format!("No material with id {id}");
    };
    let name = material.name.clone();
    session.select_material(material);
    let state = if session.selection().is_selected(id) {
        "selected"
    } else {
        "deselected"
    };
    format!("{name} {state}. {}", session.primary_action().label)
}

fn set_combination_mode(session: &mut DesignSession, intent: &Intent) -> String {
    let on = match intent.arg_str("value") {
        Some("on") => true,
        Some("off") => false,
        _ => return "/combo requires on or off".to_string(),
    };
    session.set_combination_mode(on);
    if on {
        "Combination mode on: pick at least 2 materials.".to_string()
    } else {
        "Combination mode off.".to_string()
    }
}

fn list_history(session: &DesignSession) -> String {
    session
        .history()
        .entries()
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let marker = if &item.image == session.preview() { "*" } else { " " };
            format!("{marker} {index}: {}", item.description)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn restore(session: &mut DesignSession, intent: &Intent) -> String {
    let index = intent
        .arg_str("value")
        .and_then(|raw| raw.parse::<usize>().ok())
        .and_then(|position| session.history().index(position));
    match index.and_then(|index| session.restore(index)) {
        Some(item) => format!("Showing: {}", item.description),
        None => "/restore requires a history position (see /history)".to_string(),
    }
}

/// `/slide <x> <canvas-left> <canvas-width>`: one press, move and release.
fn slide(session: &mut DesignSession, intent: &Intent) -> String {
    let values: Vec<f64> = intent
        .arg_list("values")
        .iter()
        .filter_map(|raw| raw.parse::<f64>().ok())
        .collect();
    let [client_x, left, width] = values[..] else {
        return "/slide requires <x> <canvas-left> <canvas-width>".to_string();
    };
    let slider = session.compare_mut();
    if !slider.press() {
        return "Turn compare on first (/compare).".to_string();
    }
    slider.pointer_move(&PointerEvent::Mouse { client_x }, CanvasRect { left, width });
    slider.release();
    compare_line(session)
}

fn compare_line(session: &DesignSession) -> String {
    let compare = session.compare();
    if !compare.is_visible() {
        return "Compare off.".to_string();
    }
    format!(
        "Compare on: original shown on {:.1}% (clip inset right {:.1}%)",
        compare.fraction(),
        compare.clip_inset_right()
    )
}

fn save_design(session: &mut DesignSession, stock: &mut StockLibrary) -> String {
    match session.save_design(stock) {
        Ok(material) => format!(
            "Saved to {} ({} saved design(s))",
            material.name,
            material.saved_designs.len()
        ),
        Err(err) => session
            .error()
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string()),
    }
}

fn export_presentation(
    ctx: &AppContext,
    session: &DesignSession,
    loader: &ImageLoader,
    intent: &Intent,
) -> String {
    let (Some(material), Some(target)) = (session.last_applied(), session.target()) else {
        return NEED_SINGLE_APPLIED.to_string();
    };
    if !session.has_redesigned() {
        return NEED_SINGLE_APPLIED.to_string();
    }
    let out = intent
        .arg_str("path")
        .map(PathBuf::from)
        .unwrap_or_else(|| ctx.data_dir.join("exports"));
    let planned = loader
        .load(&material.image_url)
        .and_then(|swatch| {
            plan_presentation(session.preview(), &swatch, &material.name, target, PageSize::A4_PX)
        })
        .map_err(anyhow::Error::from)
        .and_then(|plan| ManifestSink::new(&out).write(&plan));
    match planned {
        Ok(manifest) => {
            emit_best_effort(
                Some(&ctx.events),
                "export_planned",
                payload(&[
                    ("document", json!("presentation")),
                    ("manifest", json!(manifest.to_string_lossy())),
                ]),
            );
            format!("Presentation planned: {}", manifest.display())
        }
        Err(err) => {
            emit_best_effort(
                Some(&ctx.events),
                "export_failed",
                payload(&[
                    ("document", json!("presentation")),
                    ("error", json!(format!("{err:#}"))),
                ]),
            );
            "Could not generate PDF. An error occurred while loading images.".to_string()
        }
    }
}

fn status(session: &DesignSession, stock: &StockLibrary) -> String {
    let mut lines = Vec::new();
    let action = session.primary_action();
    lines.push(match action.reason.as_deref() {
        Some(reason) => format!("Action: {} (disabled: {reason})", action.label),
        None if action.enabled => format!("Action: {}", action.label),
        None => format!("Action: {} (disabled)", action.label),
    });
    let selection = session.selection();
    if selection.is_combination() {
        let names: Vec<&str> = selection
            .combination()
            .iter()
            .map(|material| material.name.as_str())
            .collect();
        lines.push(format!("Mode: combination [{}]", names.join(", ")));
    } else {
        let name = selection.single().map_or("none", |material| material.name.as_str());
        lines.push(format!("Mode: single [{name}]"));
    }
    let applied = session
        .last_applied()
        .map_or("none", |material| material.name.as_str());
    lines.push(format!("Last applied: {applied}"));
    let entries = session.history().len();
    lines.push(format!(
        "History: {entries} entr{}; save {}",
        if entries == 1 { "y" } else { "ies" },
        if session.can_save_design(stock) { "available" } else { "unavailable" }
    ));
    lines.push(compare_line(session));
    if let Some(error) = session.error() {
        lines.push(format!("Last error: {error}"));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use stone_contracts::detection::{BoundingBox, DetectedObject};
    use stone_contracts::events::EventWriter;
    use stone_contracts::materials::RoomType;
    use stone_contracts::store::CollectionStore;
    use stone_engine::codec::ImagePayload;

    use super::*;

    fn session() -> DesignSession {
        let floor = DetectedObject {
            label: "floor".to_string(),
            bounding_box: BoundingBox::new(0.0, 0.5, 1.0, 1.0),
        };
        DesignSession::start(
            ImagePayload::new("image/png", vec![0]),
            RoomType::Kitchen,
            vec![floor],
            None,
        )
    }

    fn stock(temp: &tempfile::TempDir) -> StockLibrary {
        StockLibrary::load(CollectionStore::open(temp.path()), None)
    }

    fn run(session: &mut DesignSession, stock: &mut StockLibrary, line: &str) -> String {
        apply_command(session, stock, &parse_intent(line))
    }

    #[test]
    fn non_tile_filter_leaves_combination_mode() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut stock = stock(&temp);
        let mut session = session();

        run(&mut session, &mut stock, "/combo on");
        assert!(session.selection().is_combination());
        assert_eq!(run(&mut session, &mut stock, "/filter Tiles"), "Filter: Tiles");
        assert!(session.selection().is_combination());

        assert_eq!(run(&mut session, &mut stock, "/filter Granite"), "Filter: Granite");
        assert!(!session.selection().is_combination());
        Ok(())
    }

    #[test]
    fn unknown_sub_category_leaves_the_filter_alone() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut stock = stock(&temp);
        let mut session = session();

        let reply = run(&mut session, &mut stock, "/filter Marble Pebbles");
        assert!(reply.starts_with("Marble has no sub-category 'Pebbles'"), "{reply}");
        assert_eq!(session.filter().category, None);

        let reply = run(&mut session, &mut stock, "/filter Stone");
        assert_eq!(session.filter().category, None, "{reply}");
        Ok(())
    }

    #[test]
    fn sub_category_toggles_and_all_clears() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut stock = stock(&temp);
        let mut session = session();

        assert_eq!(
            run(&mut session, &mut stock, "/filter Marble \"Onyx Series\""),
            "Filter: Marble / Onyx Series"
        );
        assert_eq!(
            run(&mut session, &mut stock, "/filter Marble \"Onyx Series\""),
            "Filter: Marble"
        );
        assert_eq!(run(&mut session, &mut stock, "/filter all"), "Filter: all");
        assert_eq!(session.filter().category, None);
        assert!(run(&mut session, &mut stock, "/filter").starts_with("/filter requires"));
        Ok(())
    }

    #[test]
    fn slide_needs_compare_and_three_numbers() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut stock = stock(&temp);
        let mut session = session();

        assert_eq!(
            run(&mut session, &mut stock, "/slide 140 40 400"),
            "Turn compare on first (/compare)."
        );
        assert!(run(&mut session, &mut stock, "/slide 140 40").starts_with("/slide requires"));

        run(&mut session, &mut stock, "/compare");
        let reply = run(&mut session, &mut stock, "/slide 140 40 400");
        assert_eq!(reply, "Compare on: original shown on 25.0% (clip inset right 75.0%)");
        assert_eq!(session.compare().fraction(), 25.0);
        assert!(!session.compare().is_dragging());

        run(&mut session, &mut stock, "/slide 9000 40 400");
        assert_eq!(session.compare().fraction(), 100.0);
        Ok(())
    }

    #[test]
    fn restore_parses_history_positions() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut stock = stock(&temp);
        let mut session = session();

        assert_eq!(run(&mut session, &mut stock, "/restore 0"), "Showing: Original Photo");
        for line in ["/restore 3", "/restore first", "/restore"] {
            assert!(
                run(&mut session, &mut stock, line).starts_with("/restore requires"),
                "{line}"
            );
        }
        Ok(())
    }

    #[test]
    fn select_reports_unknown_ids_and_toggles() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut stock = stock(&temp);
        let mut session = session();

        assert_eq!(run(&mut session, &mut stock, "/select nope"), "No material with id nope");

        let Some(first) = session.visible_materials(stock.items()).into_iter().next() else {
            panic!("kitchen has built-in materials");
        };
        let line = format!("/select {}", first.id);
        let reply = run(&mut session, &mut stock, &line);
        assert!(reply.starts_with(&format!("{} selected.", first.name)), "{reply}");
        let reply = run(&mut session, &mut stock, &line);
        assert!(reply.starts_with(&format!("{} deselected.", first.name)), "{reply}");
        Ok(())
    }

    #[test]
    fn export_requires_an_applied_material() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let ctx = AppContext {
            data_dir: temp.path().to_path_buf(),
            events: EventWriter::new(temp.path().join("events.jsonl"), "test"),
            image_model: None,
            analysis_model: None,
        };
        let session = session();

        let reply = export_presentation(&ctx, &session, &ImageLoader::new(), &parse_intent("/export"));
        assert_eq!(reply, NEED_SINGLE_APPLIED);
        assert!(!temp.path().join("exports").exists());
        Ok(())
    }

    #[test]
    fn unknown_commands_echo_the_line() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut stock = stock(&temp);
        let mut session = session();
        assert_eq!(run(&mut session, &mut stock, "/magic now"), "Unknown command: /magic now");
        assert!(run(&mut session, &mut stock, "/status").contains("Mode: single [none]"));
        Ok(())
    }
}
