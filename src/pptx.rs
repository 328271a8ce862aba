//! Serializes report blocks into a one-slide PowerPoint (`.pptx`) document.
//!
//! The package holds the minimum set of Office Open XML parts PowerPoint
//! needs: content types, package relationships, presentation, one slide
//! master with a blank layout, a theme and the slide itself.

use std::io::{Cursor, Write};

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::escape::escape;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::export::ExportError;
use crate::layout::{Alignment, BlockKind, BorderStyle, ReportBlock, PAGE_HEIGHT, PAGE_WIDTH};

const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const NS_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const TEXT_INSET: i64 = 91_440;

/// Document metadata stored in `docProps/core.xml`.
#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub title: String,
    pub created: DateTime<Utc>,
}

/// Renders `blocks` onto one slide and returns the zipped `.pptx` bytes.
pub fn write_presentation(blocks: &[ReportBlock], info: &DocumentInfo) -> Result<Vec<u8>, ExportError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let parts: [(&str, String); 13] = [
        ("[Content_Types].xml", content_types_xml()),
        ("_rels/.rels", package_rels_xml()),
        ("docProps/core.xml", core_props_xml(info)),
        ("docProps/app.xml", app_props_xml()),
        ("ppt/presentation.xml", presentation_xml()),
        ("ppt/_rels/presentation.xml.rels", presentation_rels_xml()),
        ("ppt/slideMasters/slideMaster1.xml", slide_master_xml()),
        (
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            relationships_xml(&[
                ("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml"),
                ("rId2", "theme", "../theme/theme1.xml"),
            ]),
        ),
        ("ppt/slideLayouts/slideLayout1.xml", slide_layout_xml()),
        (
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
            relationships_xml(&[("rId1", "slideMaster", "../slideMasters/slideMaster1.xml")]),
        ),
        ("ppt/theme/theme1.xml", theme_xml()),
        ("ppt/slides/slide1.xml", slide_xml(blocks)),
        (
            "ppt/slides/_rels/slide1.xml.rels",
            relationships_xml(&[("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml")]),
        ),
    ];

    for (name, body) in parts {
        zip.start_file(name, options)?;
        zip.write_all(body.as_bytes())?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

/// Escapes text for XML element content and attribute values. Characters
/// XML 1.0 cannot carry are dropped first.
pub fn escape_xml(text: &str) -> String {
    let allowed: String = text.chars().filter(|c| is_xml_char(*c)).collect();
    escape(&allowed).into_owned()
}

fn is_xml_char(c: char) -> bool {
    match c {
        '\t' | '\n' | '\r' => true,
        '\u{FFFE}' | '\u{FFFF}' => false,
        c => u32::from(c) >= 0x20,
    }
}

fn slide_xml(blocks: &[ReportBlock]) -> String {
    let shapes: String = blocks
        .iter()
        .enumerate()
        .map(|(index, block)| shape_xml(block, index as u32 + 2))
        .collect();

    format!(
        r#"{XML_DECL}<p:sld xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:cSld><p:spTree>{group}{shapes}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#,
        group = group_header_xml(),
    )
}

fn shape_xml(block: &ReportBlock, id: u32) -> String {
    let style = &block.style;
    let (name, non_visual) = match block.kind {
        BlockKind::Text => (format!("TextBox {}", id - 1), r#"<p:cNvSpPr txBox="1"/>"#),
        BlockKind::Shape => (format!("Rectangle {}", id - 1), "<p:cNvSpPr/>"),
    };

    let fill = match style.fill_color {
        Some(color) => format!(r#"<a:solidFill><a:srgbClr val="{}"/></a:solidFill>"#, color.hex()),
        None => "<a:noFill/>".to_string(),
    };
    let line = match (style.border_style, style.border_color) {
        (BorderStyle::None, _) | (_, None) => "<a:ln><a:noFill/></a:ln>".to_string(),
        (BorderStyle::Solid, Some(color)) => format!(
            r#"<a:ln w="12700"><a:solidFill><a:srgbClr val="{}"/></a:solidFill></a:ln>"#,
            color.hex()
        ),
        (BorderStyle::Dashed, Some(color)) => format!(
            r#"<a:ln w="12700"><a:solidFill><a:srgbClr val="{}"/></a:solidFill><a:prstDash val="lgDash"/></a:ln>"#,
            color.hex()
        ),
    };
    let anchor = match block.kind {
        BlockKind::Text => "t",
        BlockKind::Shape => "ctr",
    };
    // Plain labels stay on one line; filled panels wrap inside their box.
    let wrap = if style.fill_color.is_some() { "square" } else { "none" };

    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{name}"/>{non_visual}<p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom>{fill}{line}</p:spPr><p:txBody><a:bodyPr wrap="{wrap}" lIns="{inset}" tIns="{inset}" rIns="{inset}" bIns="{inset}" anchor="{anchor}" rtlCol="0"><a:noAutofit/></a:bodyPr><a:lstStyle/>{paragraphs}</p:txBody></p:sp>"#,
        x = block.position.0,
        y = block.position.1,
        cx = block.size.0.max(0),
        cy = block.size.1.max(0),
        inset = TEXT_INSET,
        paragraphs = paragraphs_xml(block),
    )
}

fn paragraphs_xml(block: &ReportBlock) -> String {
    let style = &block.style;
    let align = match style.alignment {
        Alignment::Left => "l",
        Alignment::Center => "ctr",
        Alignment::Right => "r",
    };
    let size = style.font_size * 100;
    let bold = if style.bold { "1" } else { "0" };
    let run_props = format!(
        r#"lang="ja-JP" altLang="en-US" sz="{size}" b="{bold}" dirty="0"><a:solidFill><a:srgbClr val="{}"/></a:solidFill>"#,
        style.color.hex()
    );

    block
        .content
        .split('\n')
        .map(|line| {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                format!(r#"<a:p><a:pPr algn="{align}"/><a:endParaRPr {run_props}</a:endParaRPr></a:p>"#)
            } else {
                format!(
                    r#"<a:p><a:pPr algn="{align}"/><a:r><a:rPr {run_props}</a:rPr><a:t>{}</a:t></a:r></a:p>"#,
                    escape_xml(line)
                )
            }
        })
        .collect()
}

fn group_header_xml() -> &'static str {
    r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#
}

fn content_types_xml() -> String {
    let overrides = [
        ("/ppt/presentation.xml", "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"),
        ("/ppt/slideMasters/slideMaster1.xml", "application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"),
        ("/ppt/slideLayouts/slideLayout1.xml", "application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"),
        ("/ppt/slides/slide1.xml", "application/vnd.openxmlformats-officedocument.presentationml.slide+xml"),
        ("/ppt/theme/theme1.xml", "application/vnd.openxmlformats-officedocument.theme+xml"),
        ("/docProps/core.xml", "application/vnd.openxmlformats-package.core-properties+xml"),
        ("/docProps/app.xml", "application/vnd.openxmlformats-officedocument.extended-properties+xml"),
    ];
    let overrides: String = overrides
        .iter()
        .map(|(part, content_type)| format!(r#"<Override PartName="{part}" ContentType="{content_type}"/>"#))
        .collect();

    format!(
        r#"{XML_DECL}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/>{overrides}</Types>"#
    )
}

fn package_rels_xml() -> String {
    format!(
        r#"{XML_DECL}<Relationships xmlns="{NS_RELS}"><Relationship Id="rId1" Type="{REL_BASE}/officeDocument" Target="ppt/presentation.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/><Relationship Id="rId3" Type="{REL_BASE}/extended-properties" Target="docProps/app.xml"/></Relationships>"#
    )
}

/// `(id, relationship type suffix, target)` triples.
fn relationships_xml(relationships: &[(&str, &str, &str)]) -> String {
    let body: String = relationships
        .iter()
        .map(|(id, kind, target)| {
            format!(r#"<Relationship Id="{id}" Type="{REL_BASE}/{kind}" Target="{target}"/>"#)
        })
        .collect();
    format!(r#"{XML_DECL}<Relationships xmlns="{NS_RELS}">{body}</Relationships>"#)
}

fn presentation_rels_xml() -> String {
    relationships_xml(&[
        ("rId1", "slideMaster", "slideMasters/slideMaster1.xml"),
        ("rId2", "slide", "slides/slide1.xml"),
        ("rId3", "theme", "theme/theme1.xml"),
    ])
}

fn presentation_xml() -> String {
    format!(
        r#"{XML_DECL}<p:presentation xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}" saveSubsetFonts="1"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst><p:sldId id="256" r:id="rId2"/></p:sldIdLst><p:sldSz cx="{PAGE_WIDTH}" cy="{PAGE_HEIGHT}"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#
    )
}

fn slide_master_xml() -> String {
    format!(
        r#"{XML_DECL}<p:sldMaster xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg><p:spTree>{group}</p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst><p:txStyles><p:titleStyle><a:lvl1pPr><a:defRPr sz="4400"/></a:lvl1pPr></p:titleStyle><p:bodyStyle><a:lvl1pPr><a:defRPr sz="1800"/></a:lvl1pPr></p:bodyStyle><p:otherStyle><a:lvl1pPr><a:defRPr sz="1800"/></a:lvl1pPr></p:otherStyle></p:txStyles></p:sldMaster>"#,
        group = group_header_xml(),
    )
}

fn slide_layout_xml() -> String {
    format!(
        r#"{XML_DECL}<p:sldLayout xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}" type="blank" preserve="1"><p:cSld name="Blank"><p:spTree>{group}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#,
        group = group_header_xml(),
    )
}

fn theme_xml() -> String {
    let colors = [
        ("dk1", r#"<a:sysClr val="windowText" lastClr="000000"/>"#.to_string()),
        ("lt1", r#"<a:sysClr val="window" lastClr="FFFFFF"/>"#.to_string()),
        ("dk2", srgb("44546A")),
        ("lt2", srgb("E7E6E6")),
        ("accent1", srgb("4472C4")),
        ("accent2", srgb("ED7D31")),
        ("accent3", srgb("A5A5A5")),
        ("accent4", srgb("FFC000")),
        ("accent5", srgb("5B9BD5")),
        ("accent6", srgb("70AD47")),
        ("hlink", srgb("0563C1")),
        ("folHlink", srgb("954F72")),
    ];
    let color_scheme: String = colors
        .iter()
        .map(|(name, value)| format!("<a:{name}>{value}</a:{name}>"))
        .collect();
    let fonts = r#"<a:latin typeface="Calibri"/><a:ea typeface="Yu Gothic"/><a:cs typeface=""/>"#;
    let solid = r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#;
    let line = |width: u32| {
        format!(r#"<a:ln w="{width}" cap="flat" cmpd="sng" algn="ctr">{solid}<a:prstDash val="solid"/><a:miter lim="800000"/></a:ln>"#)
    };

    format!(
        r#"{XML_DECL}<a:theme xmlns:a="{NS_A}" name="Report Theme"><a:themeElements><a:clrScheme name="Report">{color_scheme}</a:clrScheme><a:fontScheme name="Report"><a:majorFont>{fonts}</a:majorFont><a:minorFont>{fonts}</a:minorFont></a:fontScheme><a:fmtScheme name="Report"><a:fillStyleLst>{solid}{solid}{solid}</a:fillStyleLst><a:lnStyleLst>{l1}{l2}{l3}</a:lnStyleLst><a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst><a:bgFillStyleLst>{solid}{solid}{solid}</a:bgFillStyleLst></a:fmtScheme></a:themeElements><a:objectDefaults/><a:extraClrSchemeLst/></a:theme>"#,
        l1 = line(6350),
        l2 = line(12700),
        l3 = line(19050),
    )
}

fn srgb(value: &str) -> String {
    format!(r#"<a:srgbClr val="{value}"/>"#)
}

fn core_props_xml(info: &DocumentInfo) -> String {
    let created = info.created.to_rfc3339_opts(SecondsFormat::Secs, true);
    format!(
        r#"{XML_DECL}<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><dc:title>{title}</dc:title><dc:creator>{creator}</dc:creator><dcterms:created xsi:type="dcterms:W3CDTF">{created}</dcterms:created><dcterms:modified xsi:type="dcterms:W3CDTF">{created}</dcterms:modified></cp:coreProperties>"#,
        title = escape_xml(&info.title),
        creator = env!("CARGO_PKG_NAME"),
    )
}

fn app_props_xml() -> String {
    format!(
        r#"{XML_DECL}<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties"><Application>{}</Application><Slides>1</Slides><PresentationFormat>Custom</PresentationFormat></Properties>"#,
        env!("CARGO_PKG_NAME")
    )
}
