mod studio;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use stone_contracts::catalogue::{CatalogueProduct, Finish};
use stone_contracts::events::{emit_best_effort, payload, EventWriter};
use stone_contracts::materials::{MaterialCategory, Material, MaterialDraft, RoomType};
use stone_contracts::store::{CatalogueLibrary, CollectionStore, StockLibrary};
use stone_engine::codec::{read_image_file, ImageLoader};
use stone_engine::export::{plan_catalogue, CatalogueLayout, DocumentSink, ManifestSink};
use stone_engine::prompts::ValidationKind;
use stone_engine::services::{analyze_room, clean_material_image, validate_image};
use stone_engine::{GeminiClient, GeminiConfig};

#[derive(Debug, Parser)]
#[command(name = "stone-studio", version, about = "Floor material visualizer")]
struct Cli {
    /// Where user materials, the catalogue and the event log live.
    #[arg(long, global = true, default_value = ".stone-studio")]
    data_dir: PathBuf,
    #[arg(long, global = true)]
    events: Option<PathBuf>,
    #[arg(long, global = true)]
    image_model: Option<String>,
    #[arg(long, global = true)]
    analysis_model: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Validate(ValidateArgs),
    Analyze(AnalyzeArgs),
    Clean(CleanArgs),
    Studio(StudioArgs),
    #[command(subcommand)]
    Stock(StockCommand),
    #[command(subcommand)]
    Catalogue(CatalogueCommand),
}

#[derive(Debug, Args)]
struct ValidateArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long, default_value = "room")]
    kind: ValidationKind,
}

#[derive(Debug, Args)]
struct AnalyzeArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    room: RoomType,
}

#[derive(Debug, Args)]
struct CleanArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Args)]
pub(crate) struct StudioArgs {
    #[arg(long)]
    pub image: PathBuf,
    #[arg(long)]
    pub room: RoomType,
}

#[derive(Debug, Subcommand)]
enum StockCommand {
    List,
    Add(StockAddArgs),
    Delete {
        #[arg(long)]
        id: String,
    },
    /// Drops one saved design (by position) from a material.
    RemoveDesign {
        #[arg(long)]
        id: String,
        #[arg(long)]
        index: usize,
    },
}

#[derive(Debug, Args)]
struct StockAddArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    image: PathBuf,
    #[arg(long, default_value = "")]
    prompt: String,
    #[arg(long)]
    category: Option<MaterialCategory>,
    #[arg(long)]
    sub_category: Option<String>,
    #[arg(long)]
    price: Option<f64>,
    #[arg(long)]
    width: Option<f64>,
    #[arg(long)]
    height: Option<f64>,
    /// Update this existing material instead of creating a new one.
    #[arg(long)]
    edit: Option<String>,
    #[arg(long)]
    skip_validation: bool,
    #[arg(long)]
    no_clean: bool,
}

#[derive(Debug, Subcommand)]
enum CatalogueCommand {
    List,
    Add(CatalogueAddArgs),
    Delete {
        #[arg(long)]
        id: String,
    },
    /// Plans the catalogue for the given products (all when none given).
    Export {
        #[arg(long)]
        out: PathBuf,
        #[arg(long = "id")]
        ids: Vec<String>,
    },
}

#[derive(Debug, Args)]
struct CatalogueAddArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    image: String,
    #[arg(long)]
    color: Option<String>,
    #[arg(long)]
    finish: Option<Finish>,
    #[arg(long)]
    width: Option<f64>,
    #[arg(long)]
    height: Option<f64>,
}

/// Shared per-invocation state: where things live and how to reach the model.
pub(crate) struct AppContext {
    pub data_dir: PathBuf,
    pub events: EventWriter,
    image_model: Option<String>,
    analysis_model: Option<String>,
}

impl AppContext {
    fn new(cli: &Cli) -> Self {
        let events_path = cli
            .events
            .clone()
            .unwrap_or_else(|| cli.data_dir.join("events.jsonl"));
        let session_id = uuid::Uuid::new_v4().to_string();
        Self {
            data_dir: cli.data_dir.clone(),
            events: EventWriter::new(events_path, session_id),
            image_model: cli.image_model.clone(),
            analysis_model: cli.analysis_model.clone(),
        }
    }

    pub fn client(&self) -> Result<GeminiClient> {
        let mut config = GeminiConfig::from_env();
        if let Some(model) = self.image_model.as_deref() {
            config.image_model = model.to_string();
        }
        if let Some(model) = self.analysis_model.as_deref() {
            config.analysis_model = model.to_string();
        }
        Ok(GeminiClient::new(config)?)
    }

    pub fn stock(&self) -> StockLibrary {
        StockLibrary::load(
            CollectionStore::open(&self.data_dir),
            Some(self.events.clone()),
        )
    }

    fn catalogue(&self) -> CatalogueLibrary {
        CatalogueLibrary::load(
            CollectionStore::open(&self.data_dir),
            Some(self.events.clone()),
        )
    }
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("stone-studio error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let ctx = AppContext::new(&cli);
    match cli.command {
        Command::Validate(args) => run_validate(&ctx, args),
        Command::Analyze(args) => run_analyze(&ctx, args),
        Command::Clean(args) => run_clean(&ctx, args),
        Command::Studio(args) => studio::run_studio(&ctx, args),
        Command::Stock(command) => run_stock(&ctx, command),
        Command::Catalogue(command) => run_catalogue(&ctx, command),
    }
}

fn run_validate(ctx: &AppContext, args: ValidateArgs) -> Result<i32> {
    let client = ctx.client()?;
    let image = read_image_file(&args.image)?;
    let verdict = validate_image(&client, &image, args.kind);
    if verdict.is_valid {
        println!("valid");
        return Ok(0);
    }
    emit_best_effort(
        Some(&ctx.events),
        "validation_rejected",
        payload(&[
            ("kind", json!(args.kind.as_str())),
            ("reason", json!(verdict.reason)),
        ]),
    );
    println!("invalid: {}", verdict.reason);
    Ok(2)
}

fn run_analyze(ctx: &AppContext, args: AnalyzeArgs) -> Result<i32> {
    let client = ctx.client()?;
    let image = read_image_file(&args.image)?;
    let objects = analyze_room(&client, &image, args.room)?;
    emit_best_effort(
        Some(&ctx.events),
        "analysis_finished",
        payload(&[
            ("room", json!(args.room.as_str())),
            ("objects", json!(objects.len())),
        ]),
    );
    println!("{}", serde_json::to_string_pretty(&json!({ "objects": objects }))?);
    Ok(0)
}

fn run_clean(ctx: &AppContext, args: CleanArgs) -> Result<i32> {
    let client = ctx.client()?;
    let image = read_image_file(&args.image)?;
    let cleaned = clean_material_image(&client, &image);
    write_file(&args.out, &cleaned.bytes)?;
    if cleaned == image {
        println!("Cleaning unavailable; wrote the original image to {}", args.out.display());
    } else {
        println!("Wrote cleaned texture to {}", args.out.display());
    }
    Ok(0)
}

fn run_stock(ctx: &AppContext, command: StockCommand) -> Result<i32> {
    let mut stock = ctx.stock();
    match command {
        StockCommand::List => {
            if stock.is_empty() {
                println!("No user materials yet.");
            }
            for material in stock.items() {
                println!("{}", describe_material(material));
            }
        }
        StockCommand::Add(args) => {
            let mut image = read_image_file(&args.image)?;
            if !args.skip_validation || !args.no_clean {
                let client = ctx.client()?;
                if !args.skip_validation {
                    let verdict = validate_image(&client, &image, ValidationKind::Material);
                    if !verdict.is_valid {
                        println!("invalid: {}", verdict.reason);
                        return Ok(2);
                    }
                }
                if !args.no_clean {
                    image = clean_material_image(&client, &image);
                }
            }
            let draft = MaterialDraft {
                name: args.name,
                prompt: args.prompt,
                image_url: image.to_data_url(),
                category: args.category,
                sub_category: args.sub_category,
                price: args.price,
                height: args.height,
                width: args.width,
            };
            let material = match args.edit.as_deref() {
                Some(id) => match stock.get(id) {
                    Some(existing) => existing.edited(draft),
                    None => bail!("no user material with id {id}"),
                },
                None => Material::new_user(draft),
            };
            stock.upsert(material.clone())?;
            println!("Saved {}", describe_material(&material));
        }
        StockCommand::Delete { id } => match stock.remove(&id)? {
            Some(material) => println!("Deleted {} ({})", material.name, material.id),
            None => println!("No user material with id {id}"),
        },
        StockCommand::RemoveDesign { id, index } => {
            let Some(design) = stock
                .get(&id)
                .and_then(|material| material.saved_designs.get(index))
                .cloned()
            else {
                bail!("material {id} has no saved design #{index}");
            };
            if let Some(material) = stock.remove_saved_design(&id, &design)? {
                println!(
                    "{} now has {} saved design(s)",
                    material.name,
                    material.saved_designs.len()
                );
            }
        }
    }
    Ok(0)
}

/// No ids selects everything; repeated ids select once.
fn select_for_export(catalogue: &mut CatalogueLibrary, ids: &[String]) -> Result<()> {
    if ids.is_empty() {
        catalogue.select_all();
    }
    for id in ids {
        if !catalogue.select(id) {
            bail!("no product with id {id}");
        }
    }
    Ok(())
}

fn run_catalogue(ctx: &AppContext, command: CatalogueCommand) -> Result<i32> {
    let mut catalogue = ctx.catalogue();
    match command {
        CatalogueCommand::List => {
            if catalogue.products().is_empty() {
                println!("The catalogue is empty.");
            }
            for product in catalogue.products() {
                let details = product.detail_lines().join(", ");
                println!("{}  {}  {}", product.id, product.name, details);
            }
        }
        CatalogueCommand::Add(args) => {
            let mut product = CatalogueProduct::new(args.name, args.image);
            product.color = args.color;
            product.finish = args.finish;
            product.width = args.width;
            product.height = args.height;
            catalogue.upsert(product.clone())?;
            println!("Added {} ({})", product.name, product.id);
        }
        CatalogueCommand::Delete { id } => match catalogue.remove(&id)? {
            Some(product) => println!("Deleted {} ({})", product.name, product.id),
            None => println!("No product with id {id}"),
        },
        CatalogueCommand::Export { out, ids } => {
            select_for_export(&mut catalogue, &ids)?;
            let selected = catalogue.selected_products();
            let plan = plan_catalogue(
                &selected,
                &ImageLoader::new(),
                &CatalogueLayout::default(),
                Some(&ctx.events),
            )?;
            let manifest = ManifestSink::new(&out).write(&plan)?;
            println!(
                "Planned {} page(s) for {} product(s): {}",
                plan.pages.len(),
                selected.len(),
                manifest.display()
            );
        }
    }
    Ok(0)
}

pub(crate) fn describe_material(material: &Material) -> String {
    let mut parts = vec![material.id.clone(), material.name.clone()];
    if let Some(category) = material.category {
        match material.sub_category.as_deref() {
            Some(sub) => parts.push(format!("{category} / {sub}")),
            None => parts.push(category.to_string()),
        }
    }
    if !material.saved_designs.is_empty() {
        parts.push(format!("{} saved design(s)", material.saved_designs.len()));
    }
    parts.join("  ")
}

pub(crate) fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}
