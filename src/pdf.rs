use std::collections::BTreeMap;
use std::fmt::Write as _;

use lopdf::content::{Content, Operation};
use lopdf::{
    Dictionary as LoDictionary, Document as LoDocument, Object as LoObject,
    ObjectId as LoObjectId, Stream as LoStream, StringFormat, dictionary,
};

use crate::canvas::{Command, Document};
use crate::error::ClearanceError;
use crate::font::{FontProgramKind, FontRegistry, FontWeight};
use crate::types::{Color, Shading, ShadingStop};

const PDF_VERSION: &str = "1.7";

/// Document information dictionary entries.
#[derive(Debug, Clone, Default)]
pub(crate) struct PdfInfo {
    pub(crate) title: String,
    pub(crate) author: String,
    pub(crate) producer: String,
}

// Glyph id -> text it was drawn for, per weight.
type GlyphMap = BTreeMap<u16, String>;

/// Serializes the canvas document with both faces embedded as Identity-H CID fonts.
pub(crate) fn document_to_pdf(
    document: &Document,
    fonts: &FontRegistry,
    info: &PdfInfo,
) -> Result<Vec<u8>, ClearanceError> {
    fonts.ensure_coverage(document)?;

    let mut doc = LoDocument::with_version(PDF_VERSION);
    let pages_id = doc.new_object_id();
    let regular_id = doc.new_object_id();
    let bold_id = if fonts.has_distinct_bold() {
        doc.new_object_id()
    } else {
        regular_id
    };

    let page_width = document.page_size.width.to_f32();
    let page_height = document.page_size.height.to_f32();
    let mut kids = Vec::with_capacity(document.pages.len());
    let mut regular_glyphs = GlyphMap::new();
    let mut bold_glyphs = GlyphMap::new();

    for page in &document.pages {
        let mut writer = ContentWriter::new(page_height, fonts);
        writer.write_commands(&page.commands);
        merge_glyphs(&mut regular_glyphs, writer.regular_glyphs);
        merge_glyphs(&mut bold_glyphs, writer.bold_glyphs);

        let mut ext_gstates = LoDictionary::new();
        for ((fill, stroke), name) in &writer.ext_gstates {
            let gs_id = doc.add_object(dictionary! {
                "Type" => "ExtGState",
                "ca" => real(*fill as f32 / 1000.0),
                "CA" => real(*stroke as f32 / 1000.0),
            });
            ext_gstates.set(name.as_bytes().to_vec(), gs_id);
        }
        let mut shadings = LoDictionary::new();
        for (idx, shading) in writer.shadings.iter().enumerate() {
            let shading_id = doc.add_object(shading_object(shading, page_height));
            shadings.set(format!("Sh{}", idx + 1).into_bytes(), shading_id);
        }

        let content = Content {
            operations: writer.operations,
        }
        .encode()?;
        let content_id = doc.add_object(LoStream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), real(page_width), real(page_height)],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => regular_id, "F2" => bold_id },
                "ExtGState" => ext_gstates,
                "Shading" => shadings,
            },
        });
        kids.push(LoObject::Reference(page_id));
    }

    if fonts.has_distinct_bold() {
        add_font(&mut doc, regular_id, fonts, FontWeight::Regular, &regular_glyphs);
        add_font(&mut doc, bold_id, fonts, FontWeight::Bold, &bold_glyphs);
    } else {
        merge_glyphs(&mut regular_glyphs, bold_glyphs);
        add_font(&mut doc, regular_id, fonts, FontWeight::Regular, &regular_glyphs);
    }
    tracing::debug!(
        regular_glyphs = regular_glyphs.len(),
        "embedded fonts as Identity-H"
    );

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        LoObject::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => LoObject::string_literal(info.title.as_str()),
        "Author" => LoObject::string_literal(info.author.as_str()),
        "Producer" => LoObject::string_literal(info.producer.as_str()),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

fn merge_glyphs(into: &mut GlyphMap, from: GlyphMap) {
    for (gid, text) in from {
        into.entry(gid).or_insert(text);
    }
}

struct ContentWriter<'a> {
    fonts: &'a FontRegistry,
    page_height: f32,
    operations: Vec<Operation>,
    ext_gstates: BTreeMap<(u16, u16), String>,
    shadings: Vec<Shading>,
    font_weight: FontWeight,
    font_size: f32,
    letter_spacing: f32,
    regular_glyphs: GlyphMap,
    bold_glyphs: GlyphMap,
}

impl<'a> ContentWriter<'a> {
    fn new(page_height: f32, fonts: &'a FontRegistry) -> Self {
        Self {
            fonts,
            page_height,
            operations: Vec::new(),
            ext_gstates: BTreeMap::new(),
            shadings: Vec::new(),
            font_weight: FontWeight::Regular,
            font_size: 12.0,
            letter_spacing: 0.0,
            regular_glyphs: GlyphMap::new(),
            bold_glyphs: GlyphMap::new(),
        }
    }

    fn op(&mut self, operator: &str, operands: Vec<LoObject>) {
        self.operations.push(Operation::new(operator, operands));
    }

    fn y(&self, y: f32) -> LoObject {
        real(self.page_height - y)
    }

    fn write_commands(&mut self, commands: &[Command]) {
        // Text state is not saved by q/Q here, so track it alongside the stack.
        let mut text_stack: Vec<(FontWeight, f32, f32)> = Vec::new();
        for cmd in commands {
            match cmd {
                Command::SaveState => {
                    text_stack.push((self.font_weight, self.font_size, self.letter_spacing));
                    self.op("q", vec![]);
                }
                Command::RestoreState => {
                    if let Some((weight, size, spacing)) = text_stack.pop() {
                        self.font_weight = weight;
                        self.font_size = size;
                        self.letter_spacing = spacing;
                    }
                    self.op("Q", vec![]);
                }
                Command::Rotate { degrees, cx, cy } => {
                    let (sin, cos) = degrees.to_radians().sin_cos();
                    let px = cx.to_f32();
                    let py = self.page_height - cy.to_f32();
                    let e = px - cos * px + sin * py;
                    let f = py - sin * px - cos * py;
                    self.op(
                        "cm",
                        vec![real(cos), real(sin), real(-sin), real(cos), real(e), real(f)],
                    );
                }
                Command::SetFillColor(color) => self.op("rg", rgb(*color)),
                Command::SetStrokeColor(color) => self.op("RG", rgb(*color)),
                Command::SetLineWidth(width) => self.op("w", vec![real(width.to_f32())]),
                Command::SetLineCap(cap) => self.op("J", vec![LoObject::Integer(*cap as i64)]),
                Command::SetLineJoin(join) => self.op("j", vec![LoObject::Integer(*join as i64)]),
                Command::SetOpacity { fill, stroke } => {
                    let key = (alpha_key(*fill), alpha_key(*stroke));
                    let next = self.ext_gstates.len() + 1;
                    let name = self
                        .ext_gstates
                        .entry(key)
                        .or_insert_with(|| format!("GS{next}"))
                        .clone();
                    self.op("gs", vec![LoObject::Name(name.into_bytes())]);
                }
                Command::SetFontWeight(weight) => self.font_weight = *weight,
                Command::SetFontSize(size) => self.font_size = size.to_f32(),
                Command::SetLetterSpacing(spacing) => self.letter_spacing = spacing.to_f32(),
                Command::MoveTo { x, y } => {
                    let y = self.y(y.to_f32());
                    self.op("m", vec![real(x.to_f32()), y]);
                }
                Command::LineTo { x, y } => {
                    let y = self.y(y.to_f32());
                    self.op("l", vec![real(x.to_f32()), y]);
                }
                Command::CurveTo {
                    x1,
                    y1,
                    x2,
                    y2,
                    x,
                    y,
                } => {
                    let operands = vec![
                        real(x1.to_f32()),
                        self.y(y1.to_f32()),
                        real(x2.to_f32()),
                        self.y(y2.to_f32()),
                        real(x.to_f32()),
                        self.y(y.to_f32()),
                    ];
                    self.op("c", operands);
                }
                Command::ClosePath => self.op("h", vec![]),
                Command::Fill => self.op("f", vec![]),
                Command::Stroke => self.op("S", vec![]),
                Command::DrawRect {
                    x,
                    y,
                    width,
                    height,
                } => {
                    let bottom = self.y(y.to_f32() + height.to_f32());
                    self.op(
                        "re",
                        vec![
                            real(x.to_f32()),
                            bottom,
                            real(width.to_f32()),
                            real(height.to_f32()),
                        ],
                    );
                    self.op("f", vec![]);
                }
                Command::ShadingFill(shading) => {
                    self.shadings.push(shading.clone());
                    let name = format!("Sh{}", self.shadings.len());
                    self.op("sh", vec![LoObject::Name(name.into_bytes())]);
                }
                Command::DrawString { x, y, text } => self.draw_string(x.to_f32(), y.to_f32(), text),
            }
        }
    }

    fn draw_string(&mut self, x: f32, baseline: f32, text: &str) {
        let font = match self.font_weight {
            FontWeight::Regular => "F1",
            FontWeight::Bold => "F2",
        };
        // One glyph per char, so the advances match the W array.
        let run = self
            .fonts
            .glyph_run(self.font_weight, text, self.font_size, false);
        let used = match self.font_weight {
            FontWeight::Regular => &mut self.regular_glyphs,
            FontWeight::Bold => &mut self.bold_glyphs,
        };
        let mut codes = Vec::with_capacity(run.len() * 2);
        for (glyph, ch) in run.iter().zip(text.chars()) {
            if glyph.glyph_id != 0 {
                used.entry(glyph.glyph_id).or_insert_with(|| ch.to_string());
            }
            codes.extend_from_slice(&glyph.glyph_id.to_be_bytes());
        }
        let y = self.y(baseline);
        self.op("BT", vec![]);
        self.op("Tf", vec![LoObject::Name(font.into()), real(self.font_size)]);
        self.op("Tc", vec![real(self.letter_spacing)]);
        self.op("Td", vec![real(x), y]);
        self.op(
            "Tj",
            vec![LoObject::String(codes, StringFormat::Hexadecimal)],
        );
        self.op("ET", vec![]);
    }
}

/// Writes the Type0 font at `font_id` over an embedded CIDFont descendant.
fn add_font(
    doc: &mut LoDocument,
    font_id: LoObjectId,
    fonts: &FontRegistry,
    weight: FontWeight,
    glyphs: &GlyphMap,
) {
    let font = fonts.font(weight);
    let base = sanitize_font_name(&font.name);
    let metrics = &font.metrics;

    let mut file_dict = dictionary! { "Length1" => font.data.len() as i64 };
    if font.program_kind == FontProgramKind::OpenTypeCff {
        file_dict.set("Subtype", "OpenType");
    }
    let file_id = doc.add_object(LoStream::new(file_dict, font.data.clone()));

    let mut flags = 32i64;
    if metrics.is_fixed_pitch {
        flags |= 1;
    }
    let font_file_entry = match font.program_kind {
        FontProgramKind::OpenTypeCff => "FontFile3",
        FontProgramKind::TrueType => "FontFile2",
    };
    let mut descriptor = dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => base.clone(),
        "Flags" => flags,
        "FontBBox" => vec![
            metrics.bbox.0.into(),
            metrics.bbox.1.into(),
            metrics.bbox.2.into(),
            metrics.bbox.3.into(),
        ],
        "ItalicAngle" => metrics.italic_angle as i64,
        "Ascent" => metrics.ascent as i64,
        "Descent" => metrics.descent as i64,
        "CapHeight" => metrics.cap_height as i64,
        "StemV" => metrics.stem_v as i64,
    };
    descriptor.set(font_file_entry, file_id);
    let descriptor_id = doc.add_object(descriptor);

    let widths: Vec<LoObject> = glyphs
        .keys()
        .flat_map(|gid| {
            let advance = fonts.glyph_advance(weight, *gid) as i64;
            [
                LoObject::Integer(*gid as i64),
                LoObject::Array(vec![LoObject::Integer(advance)]),
            ]
        })
        .collect();
    let mut cid_font = dictionary! {
        "Type" => "Font",
        "BaseFont" => base.clone(),
        "CIDSystemInfo" => dictionary! {
            "Registry" => LoObject::string_literal("Adobe"),
            "Ordering" => LoObject::string_literal("Identity"),
            "Supplement" => 0,
        },
        "FontDescriptor" => descriptor_id,
        "DW" => metrics.missing_width as i64,
        "W" => widths,
    };
    match font.program_kind {
        FontProgramKind::TrueType => {
            cid_font.set("Subtype", "CIDFontType2");
            cid_font.set("CIDToGIDMap", "Identity");
        }
        FontProgramKind::OpenTypeCff => cid_font.set("Subtype", "CIDFontType0"),
    }
    let cid_font_id = doc.add_object(cid_font);

    let to_unicode_id = doc.add_object(LoStream::new(
        dictionary! {},
        to_unicode_cmap(glyphs).into_bytes(),
    ));
    doc.objects.insert(
        font_id,
        LoObject::Dictionary(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => base,
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![LoObject::Reference(cid_font_id)],
            "ToUnicode" => to_unicode_id,
        }),
    );
}

/// ToUnicode CMap for two-byte glyph codes; astral chars become surrogate pairs.
fn to_unicode_cmap(glyphs: &GlyphMap) -> String {
    let mut out = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );
    let entries: Vec<(&u16, &String)> = glyphs.iter().collect();
    // bfchar blocks hold at most 100 entries.
    for chunk in entries.chunks(100) {
        let _ = writeln!(out, "{} beginbfchar", chunk.len());
        for (gid, text) in chunk {
            let _ = write!(out, "<{gid:04X}> <");
            for unit in text.encode_utf16() {
                let _ = write!(out, "{unit:04X}");
            }
            out.push_str(">\n");
        }
        out.push_str("endbfchar\n");
    }
    out.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    out
}

fn shading_object(shading: &Shading, page_height: f32) -> LoDictionary {
    match shading {
        Shading::Axial {
            x0,
            y0,
            x1,
            y1,
            stops,
        } => dictionary! {
            "ShadingType" => 2,
            "ColorSpace" => "DeviceRGB",
            "Coords" => vec![real(*x0), real(page_height - *y0), real(*x1), real(page_height - *y1)],
            "Function" => stops_function(stops),
            "Extend" => vec![true.into(), true.into()],
        },
    }
}

// Type 2 for a single segment, Type 3 stitching for more.
fn stops_function(stops: &[ShadingStop]) -> LoDictionary {
    let interpolate = |from: Color, to: Color| {
        dictionary! {
            "FunctionType" => 2,
            "Domain" => vec![0.into(), 1.into()],
            "C0" => rgb(from),
            "C1" => rgb(to),
            "N" => 1,
        }
    };
    match stops {
        [] => interpolate(Color::BLACK, Color::BLACK),
        [only] => interpolate(only.color, only.color),
        [first, last] => interpolate(first.color, last.color),
        _ => {
            let functions: Vec<LoObject> = stops
                .windows(2)
                .map(|pair| LoObject::Dictionary(interpolate(pair[0].color, pair[1].color)))
                .collect();
            let bounds: Vec<LoObject> = stops[1..stops.len() - 1]
                .iter()
                .map(|stop| real(stop.offset.clamp(0.0, 1.0)))
                .collect();
            let encode: Vec<LoObject> = (0..functions.len())
                .flat_map(|_| [0.into(), 1.into()])
                .collect();
            dictionary! {
                "FunctionType" => 3,
                "Domain" => vec![0.into(), 1.into()],
                "Functions" => functions,
                "Bounds" => bounds,
                "Encode" => encode,
            }
        }
    }
}

fn rgb(color: Color) -> Vec<LoObject> {
    vec![
        real(color.r.clamp(0.0, 1.0)),
        real(color.g.clamp(0.0, 1.0)),
        real(color.b.clamp(0.0, 1.0)),
    ]
}

fn real(value: f32) -> LoObject {
    LoObject::Real((value * 1000.0).round() / 1000.0)
}

fn alpha_key(alpha: f32) -> u16 {
    ((alpha * 1000.0).round() as i32).clamp(0, 1000) as u16
}

fn sanitize_font_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '-')
        .collect();
    if cleaned.is_empty() {
        "EmbeddedFont".to_string()
    } else {
        cleaned
    }
}
