//! Layout planning for the two printable documents: the single-page design
//! presentation and the multi-page product catalogue.
//!
//! A plan is a list of pages of positioned elements plus the PNG assets they
//! reference. Turning a plan into PDF bytes is the job of a [`DocumentSink`].

use std::f64::consts::PI;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::Context;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use serde::Serialize;
use serde_json::json;
use stone_contracts::catalogue::CatalogueProduct;
use stone_contracts::detection::DetectedObject;
use stone_contracts::events::{emit_best_effort, payload, EventWriter};

use crate::codec::{ImageLoader, ImagePayload};
use crate::error::{StudioError, StudioResult};

pub const BRAND: &str = "Stone Studio";
pub const PRESENTATION_FILE: &str = "stone_studio_design_presentation.pdf";
pub const CATALOGUE_FILE: &str = "stone_studio_catalogue.pdf";
pub const IMAGE_NOT_FOUND: &str = "Image not found";

const CAPTION_LINES: [&str; 2] = ["This floor has been visualized with", "the selected material."];
const ARROW_HEAD: f64 = 10.0;
const CAPTION_OFFSET: f64 = 120.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Px,
    Mm,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageSize {
    pub unit: Unit,
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    /// A4 portrait in the 96-dpi pixel unit of browser PDF writers.
    pub const A4_PX: PageSize = PageSize {
        unit: Unit::Px,
        width: 446.46,
        height: 631.4,
    };

    pub const A4_MM: PageSize = PageSize {
        unit: Unit::Mm,
        width: 210.0,
        height: 297.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

pub const WHITE: Rgb = Rgb(255, 255, 255);
const TEXT_MAIN: Rgb = Rgb(17, 24, 39);
const TEXT_SECONDARY: Rgb = Rgb(107, 114, 128);
const DETAIL: Rgb = Rgb(199, 21, 133);
const FOOTER: Rgb = Rgb(150, 150, 150);
const BORDER: Rgb = Rgb(229, 231, 235);
const PLACEHOLDER_FILL: Rgb = Rgb(230, 230, 230);
const PAGE_FILL: Rgb = Rgb(249, 250, 251);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Element {
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        fill: Rgb,
    },
    Image {
        asset: String,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        /// Clip to the circle `(cx, cy, r)` before drawing.
        #[serde(skip_serializing_if = "Option::is_none")]
        clip_circle: Option<(f64, f64, f64)>,
    },
    Circle {
        center: Point,
        radius: f64,
        stroke: Rgb,
        line_width: f64,
    },
    Line {
        from: Point,
        to: Point,
        stroke: Rgb,
        line_width: f64,
    },
    Triangle {
        points: [Point; 3],
        fill: Rgb,
    },
    Text {
        text: String,
        at: Point,
        size: f64,
        bold: bool,
        align: Align,
        color: Rgb,
        /// Draw a dark outline under the fill so the text reads on photos.
        outlined: bool,
    },
    Placeholder {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        fill: Rgb,
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Page {
    pub elements: Vec<Element>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Asset {
    pub name: String,
    pub width: u32,
    pub height: u32,
    #[serde(skip)]
    pub png: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentPlan {
    pub file_name: String,
    pub page: PageSize,
    pub pages: Vec<Page>,
    pub assets: Vec<Asset>,
}

impl DocumentPlan {
    pub fn asset(&self, name: &str) -> Option<&Asset> {
        self.assets.iter().find(|asset| asset.name == name)
    }
}

/// The external compositor that turns a plan into a document.
pub trait DocumentSink {
    fn write(&mut self, plan: &DocumentPlan) -> anyhow::Result<PathBuf>;
}

/// Writes `<stem>.json` plus one PNG per asset into a directory.
#[derive(Debug, Clone)]
pub struct ManifestSink {
    dir: PathBuf,
}

impl ManifestSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DocumentSink for ManifestSink {
    fn write(&mut self, plan: &DocumentPlan) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        for asset in &plan.assets {
            let path = self.dir.join(format!("{}.png", asset.name));
            fs::write(&path, &asset.png)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        let stem = Path::new(&plan.file_name)
            .file_stem()
            .and_then(|value| value.to_str())
            .unwrap_or("document");
        let manifest = self.dir.join(format!("{stem}.json"));
        fs::write(&manifest, serde_json::to_string_pretty(plan)?)
            .with_context(|| format!("failed to write {}", manifest.display()))?;
        Ok(manifest)
    }
}

fn decode(image: &ImagePayload, what: &str) -> StudioResult<DynamicImage> {
    image::load_from_memory(&image.bytes)
        .map_err(|err| StudioError::export(format!("could not decode {what}: {err}")))
}

fn encode_png(image: &DynamicImage) -> StudioResult<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|err| StudioError::export(format!("png encode failed: {err}")))?;
    Ok(out.into_inner())
}

fn asset(name: impl Into<String>, image: &DynamicImage) -> StudioResult<Asset> {
    Ok(Asset {
        name: name.into(),
        width: image.width(),
        height: image.height(),
        png: encode_png(image)?,
    })
}

/// Largest rectangle with the image's aspect that fits the page, centred.
fn fit_inside(page: PageSize, image_width: u32, image_height: u32) -> (f64, f64, f64, f64) {
    let page_ratio = page.width / page.height;
    let image_ratio = f64::from(image_width) / f64::from(image_height.max(1));
    let (width, height) = if image_ratio > page_ratio {
        (page.width, page.width / image_ratio)
    } else {
        (page.height * image_ratio, page.height)
    };
    ((page.width - width) / 2.0, (page.height - height) / 2.0, width, height)
}

/// Crops the centre of `image` to the target aspect and scales it to
/// exactly `width` x `height` pixels.
fn cover(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    let target_ratio = f64::from(width) / f64::from(height.max(1));
    let (iw, ih) = (f64::from(image.width()), f64::from(image.height()));
    let (sw, sh) = if iw / ih.max(1.0) > target_ratio {
        (ih * target_ratio, ih)
    } else {
        (iw, iw / target_ratio)
    };
    let sx = ((iw - sw) / 2.0).max(0.0).round() as u32;
    let sy = ((ih - sh) / 2.0).max(0.0).round() as u32;
    let sw = (sw.round() as u32).clamp(1, image.width().max(1));
    let sh = (sh.round() as u32).clamp(1, image.height().max(1));
    image
        .crop_imm(sx, sy, sw, sh)
        .resize_exact(width.max(1), height.max(1), FilterType::Triangle)
}

fn outlined_text(text: impl Into<String>, at: Point, size: f64, bold: bool) -> Element {
    Element::Text {
        text: text.into(),
        at,
        size,
        bold,
        align: Align::Center,
        color: WHITE,
        outlined: true,
    }
}

/// Plans the one-page presentation: the render, a circular swatch inset,
/// and an arrow from the inset to the floor.
///
/// Both images must decode; there is no partial presentation.
pub fn plan_presentation(
    preview: &ImagePayload,
    swatch: &ImagePayload,
    material_name: &str,
    target: &DetectedObject,
    page: PageSize,
) -> StudioResult<DocumentPlan> {
    let render = decode(preview, "the redesigned image")?;
    let material = decode(swatch, "the material image")?;

    let (img_x, img_y, img_w, img_h) = fit_inside(page, render.width(), render.height());
    let radius = page.width * 0.15;
    let circle = Point::new(page.width * 0.75, page.height * 0.25);

    let (norm_x, norm_y) = target.bounding_box.center();
    let tip = Point::new(norm_x * img_w + img_x, norm_y * img_h + img_y);
    let angle = (tip.y - circle.y).atan2(tip.x - circle.x);
    let shaft_end = Point::new(
        tip.x - angle.cos() * ARROW_HEAD,
        tip.y - angle.sin() * ARROW_HEAD,
    );
    let start_radius = radius + 5.0;
    let spread = PI / 64.0;
    let start = |offset: f64| {
        Point::new(
            circle.x + (angle + offset).cos() * start_radius,
            circle.y + (angle + offset).sin() * start_radius,
        )
    };
    let barb = |offset: f64| {
        Point::new(
            tip.x - ARROW_HEAD * (angle + offset).cos(),
            tip.y - ARROW_HEAD * (angle + offset).sin(),
        )
    };
    let caption = Point::new(
        tip.x - angle.cos() * CAPTION_OFFSET,
        tip.y - angle.sin() * CAPTION_OFFSET,
    );

    let swatch_side = material.width().min(material.height()).max(1);
    let elements = vec![
        Element::Image {
            asset: "render".to_string(),
            x: img_x,
            y: img_y,
            width: img_w,
            height: img_h,
            clip_circle: None,
        },
        Element::Text {
            text: BRAND.to_string(),
            at: Point::new(page.width - 15.0, page.height - 15.0),
            size: 10.0,
            bold: false,
            align: Align::Right,
            color: FOOTER,
            outlined: false,
        },
        Element::Image {
            asset: "swatch".to_string(),
            x: circle.x - radius,
            y: circle.y - radius,
            width: radius * 2.0,
            height: radius * 2.0,
            clip_circle: Some((circle.x, circle.y, radius)),
        },
        Element::Circle {
            center: circle,
            radius,
            stroke: WHITE,
            line_width: 2.0,
        },
        Element::Line {
            from: start(-spread),
            to: shaft_end,
            stroke: WHITE,
            line_width: 1.0,
        },
        Element::Line {
            from: start(spread),
            to: shaft_end,
            stroke: WHITE,
            line_width: 1.0,
        },
        Element::Triangle {
            points: [tip, barb(-PI / 10.0), barb(PI / 10.0)],
            fill: WHITE,
        },
        outlined_text(
            material_name.to_uppercase(),
            Point::new(circle.x, circle.y + radius + 20.0),
            page.width * 0.028,
            true,
        ),
        outlined_text(CAPTION_LINES[0], caption, page.width * 0.022, false),
        outlined_text(
            CAPTION_LINES[1],
            Point::new(caption.x, caption.y + 15.0),
            page.width * 0.022,
            false,
        ),
    ];

    Ok(DocumentPlan {
        file_name: PRESENTATION_FILE.to_string(),
        page,
        pages: vec![Page { elements }],
        assets: vec![
            asset("render", &render)?,
            asset("swatch", &cover(&material, swatch_side, swatch_side))?,
        ],
    })
}

/// Catalogue geometry, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatalogueLayout {
    pub page: PageSize,
    pub margin: f64,
    pub products_per_page: usize,
    pub image_share: f64,
    pub dpi: f64,
}

impl Default for CatalogueLayout {
    fn default() -> Self {
        Self {
            page: PageSize::A4_MM,
            margin: 15.0,
            products_per_page: 2,
            image_share: 0.65,
            dpi: 300.0,
        }
    }
}

impl CatalogueLayout {
    fn content_width(&self) -> f64 {
        self.page.width - self.margin * 2.0
    }

    fn slot_height(&self) -> f64 {
        (self.page.height - self.margin * 2.0) / self.products_per_page.max(1) as f64
    }

    fn image_pixels(&self) -> (u32, u32) {
        let per_mm = self.dpi / 25.4;
        let width = (self.content_width() * per_mm).round().max(1.0) as u32;
        let height = (self.slot_height() * self.image_share * per_mm).round().max(1.0) as u32;
        (width, height)
    }
}

/// Naive word wrap by character budget; the compositor measures real glyphs.
fn wrap_name(name: &str, max_chars: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in name.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > max_chars {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn title_page(layout: &CatalogueLayout) -> Page {
    let page = layout.page;
    Page {
        elements: vec![
            Element::Rect {
                x: 0.0,
                y: 0.0,
                width: page.width,
                height: page.height,
                fill: PAGE_FILL,
            },
            Element::Text {
                text: "Product Catalogue".to_string(),
                at: Point::new(page.width / 2.0, page.height / 2.0 - 10.0),
                size: 32.0,
                bold: true,
                align: Align::Center,
                color: TEXT_MAIN,
                outlined: false,
            },
            Element::Text {
                text: BRAND.to_string(),
                at: Point::new(page.width / 2.0, page.height / 2.0),
                size: 18.0,
                bold: false,
                align: Align::Center,
                color: TEXT_SECONDARY,
                outlined: false,
            },
        ],
    }
}

fn product_text(product: &CatalogueProduct, layout: &CatalogueLayout, top: f64) -> Vec<Element> {
    let mut elements = Vec::new();
    let mut y = top;
    let name_lines = wrap_name(&product.name, (layout.content_width() / 3.0) as usize);
    for (index, line) in name_lines.iter().enumerate() {
        elements.push(Element::Text {
            text: line.clone(),
            at: Point::new(layout.margin, y + index as f64 * 6.0),
            size: 14.0,
            bold: true,
            align: Align::Left,
            color: TEXT_MAIN,
            outlined: false,
        });
    }
    y += name_lines.len() as f64 * 6.0 + 5.0;
    for line in product.detail_lines() {
        elements.push(Element::Text {
            text: line,
            at: Point::new(layout.margin, y),
            size: 11.0,
            bold: false,
            align: Align::Left,
            color: DETAIL,
            outlined: false,
        });
        y += 7.0;
    }
    elements
}

/// Plans the catalogue for `products` in the order given.
///
/// A product whose image cannot be loaded gets a grey placeholder; the rest
/// of the document is unaffected.
pub fn plan_catalogue(
    products: &[CatalogueProduct],
    loader: &ImageLoader,
    layout: &CatalogueLayout,
    events: Option<&EventWriter>,
) -> StudioResult<DocumentPlan> {
    if products.is_empty() {
        return Err(StudioError::unavailable("Select at least one product to export."));
    }
    let per_page = layout.products_per_page.max(1);
    let content_width = layout.content_width();
    let slot_height = layout.slot_height();
    let image_height = slot_height * layout.image_share;
    let (px_width, px_height) = layout.image_pixels();

    let mut pages = vec![title_page(layout)];
    let mut assets = Vec::new();

    for (index, product) in products.iter().enumerate() {
        let on_page = index % per_page;
        if on_page == 0 {
            pages.push(Page::default());
        }
        let top = layout.margin + on_page as f64 * slot_height;
        let mut elements = Vec::new();

        let prepared = loader
            .load(&product.image_url)
            .and_then(|source| decode(&source, &product.name))
            .map(|image| cover(&image, px_width, px_height))
            .and_then(|image| asset(format!("product_{}", index + 1), &image));
        match prepared {
            Ok(prepared) => {
                elements.push(Element::Image {
                    asset: prepared.name.clone(),
                    x: layout.margin,
                    y: top,
                    width: content_width,
                    height: image_height,
                    clip_circle: None,
                });
                assets.push(prepared);
            }
            Err(err) => {
                emit_best_effort(
                    events,
                    "export_failed",
                    payload(&[
                        ("document", json!("catalogue")),
                        ("product_id", json!(product.id)),
                        ("error", json!(err.to_string())),
                    ]),
                );
                elements.push(Element::Placeholder {
                    x: layout.margin,
                    y: top,
                    width: content_width,
                    height: image_height,
                    fill: PLACEHOLDER_FILL,
                    text: IMAGE_NOT_FOUND.to_string(),
                });
            }
        }
        elements.extend(product_text(product, layout, top + image_height + 12.0));

        if on_page < per_page - 1 && index < products.len() - 1 {
            let line_y = top + slot_height - 2.0;
            elements.push(Element::Line {
                from: Point::new(layout.margin, line_y),
                to: Point::new(layout.margin + content_width, line_y),
                stroke: BORDER,
                line_width: 0.2,
            });
        }

        if let Some(page) = pages.last_mut() {
            page.elements.extend(elements);
        }
    }

    emit_best_effort(
        events,
        "export_planned",
        payload(&[
            ("document", json!("catalogue")),
            ("products", json!(products.len())),
            ("pages", json!(pages.len())),
        ]),
    );
    Ok(DocumentPlan {
        file_name: CATALOGUE_FILE.to_string(),
        page: layout.page,
        pages,
        assets,
    })
}

#[cfg(test)]
mod tests {
    use image::{Rgb as Pixel, RgbImage};
    use stone_contracts::catalogue::Finish;
    use stone_contracts::detection::BoundingBox;

    use super::*;

    fn png(width: u32, height: u32) -> anyhow::Result<ImagePayload> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Pixel([120, 90, 60])));
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png)?;
        Ok(ImagePayload::new("image/png", out.into_inner()))
    }

    fn floor() -> DetectedObject {
        DetectedObject {
            label: "floor".to_string(),
            bounding_box: BoundingBox::new(0.0, 0.5, 1.0, 1.0),
        }
    }

    fn small_layout() -> CatalogueLayout {
        CatalogueLayout {
            dpi: 10.0,
            ..CatalogueLayout::default()
        }
    }

    #[test]
    fn presentation_fits_render_and_points_at_floor() -> anyhow::Result<()> {
        let page = PageSize {
            unit: Unit::Px,
            width: 400.0,
            height: 600.0,
        };
        let plan = plan_presentation(&png(40, 20)?, &png(30, 10)?, "Carrara", &floor(), page)?;
        assert_eq!(plan.pages.len(), 1);
        let elements = &plan.pages[0].elements;

        match &elements[0] {
            Element::Image { x, y, width, height, .. } => {
                assert_eq!((*x, *y, *width, *height), (0.0, 200.0, 400.0, 200.0));
            }
            other => panic!("unexpected {other:?}"),
        }
        match &elements[3] {
            Element::Circle { center, radius, .. } => {
                assert_eq!(*center, Point::new(300.0, 150.0));
                assert_eq!(*radius, 60.0);
            }
            other => panic!("unexpected {other:?}"),
        }
        match &elements[6] {
            Element::Triangle { points, .. } => assert_eq!(points[0], Point::new(200.0, 350.0)),
            other => panic!("unexpected {other:?}"),
        }
        let texts: Vec<&str> = elements
            .iter()
            .filter_map(|element| match element {
                Element::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            texts,
            vec![BRAND, "CARRARA", CAPTION_LINES[0], CAPTION_LINES[1]]
        );

        let swatch = plan.asset("swatch").ok_or_else(|| anyhow::anyhow!("swatch"))?;
        assert_eq!((swatch.width, swatch.height), (10, 10));
        assert!(plan.asset("render").is_some_and(|asset| !asset.png.is_empty()));
        Ok(())
    }

    #[test]
    fn presentation_fails_whole_on_bad_image() -> anyhow::Result<()> {
        let broken = ImagePayload::new("image/png", vec![1, 2, 3]);
        let err = plan_presentation(&png(4, 4)?, &broken, "Carrara", &floor(), PageSize::A4_PX);
        assert!(matches!(err, Err(StudioError::Export { .. })));
        Ok(())
    }

    #[test]
    fn catalogue_paginates_and_degrades_missing_images() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events = EventWriter::new(temp.path().join("events.jsonl"), "export");
        let good = png(50, 50)?.to_data_url();

        let mut first = CatalogueProduct::new("Statuario", good.clone());
        first.color = Some("White".to_string());
        first.finish = Some(Finish::Polished);
        let second = CatalogueProduct::new("Missing", "/no/such/file.png");
        let third = CatalogueProduct::new("Black Galaxy", good);

        let plan = plan_catalogue(
            &[first, second, third],
            &ImageLoader::new(),
            &small_layout(),
            Some(&events),
        )?;
        assert_eq!(plan.pages.len(), 3);
        assert_eq!(plan.assets.len(), 2);

        let (w, h) = small_layout().image_pixels();
        assert!(plan.assets.iter().all(|asset| (asset.width, asset.height) == (w, h)));

        let page_one = &plan.pages[1].elements;
        assert!(page_one
            .iter()
            .any(|element| matches!(element, Element::Placeholder { text, .. } if text == IMAGE_NOT_FOUND)));
        let separators = page_one
            .iter()
            .filter(|element| matches!(element, Element::Line { .. }))
            .count();
        assert_eq!(separators, 1);
        assert!(page_one.iter().any(
            |element| matches!(element, Element::Text { text, .. } if text == "Finish: Polished")
        ));
        assert!(!plan.pages[2]
            .elements
            .iter()
            .any(|element| matches!(element, Element::Line { .. })));

        let log = fs::read_to_string(events.path())?;
        assert!(log.contains("\"type\":\"export_failed\""));
        assert!(log.contains("\"type\":\"export_planned\""));
        Ok(())
    }

    #[test]
    fn empty_catalogue_is_unavailable() {
        let err = plan_catalogue(&[], &ImageLoader::new(), &small_layout(), None);
        assert!(matches!(err, Err(StudioError::Unavailable { .. })));
    }

    #[test]
    fn manifest_sink_writes_plan_and_assets() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let plan = plan_presentation(&png(8, 6)?, &png(4, 4)?, "Slate", &floor(), PageSize::A4_PX)?;
        let mut sink = ManifestSink::new(temp.path().join("out"));
        let manifest = sink.write(&plan)?;

        assert!(manifest.ends_with("stone_studio_design_presentation.json"));
        assert!(sink.dir().join("render.png").is_file());
        assert!(sink.dir().join("swatch.png").is_file());
        let parsed: serde_json::Value = serde_json::from_str(&fs::read_to_string(manifest)?)?;
        assert_eq!(parsed["pages"][0]["elements"][0]["kind"], "image");
        assert_eq!(parsed["page"]["unit"], "px");
        Ok(())
    }

    #[test]
    fn names_wrap_on_word_boundaries() {
        assert_eq!(wrap_name("Black Galaxy Premium", 12), vec!["Black Galaxy", "Premium"]);
        assert_eq!(wrap_name("", 10), vec![String::new()]);
    }
}
