//! Word (`.docx`) templates rendered with Tera.
//!
//! A template is an ordinary Word document whose text contains Tera tags:
//! `{{ var }}`, `{% for %}`, `{% if %}`. Two extra forms act on the enclosing
//! element: `{%p ... %}` replaces its whole paragraph and `{%tr ... %}` its
//! whole table row, which is how loops produce one row per item.
//!
//! Word tends to split a tag across several runs (spell check, formatting
//! changes), so the XML is normalised before rendering: markup between the
//! braces of a tag is removed.
//!
//! Values are inserted as XML. Plain strings go through [`DocxContext::insert_plain`]
//! which escapes them; [`RichText`] and [`InlineImage`] produce run markup
//! that closes the current run, emits their own, and reopens a plain run.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::{Cursor, Read, Write};
use std::sync::LazyLock;
use tumorboard_core::error::ExportError;
use zip::write::SimpleFileOptions;

const EMU_PER_INCH: f64 = 914_400.0;
/// Pixel size assumed for images embedded at native size.
const EMU_PER_PIXEL: u64 = 9_525;

const DOCUMENT_PART: &str = "word/document.xml";
const DOCUMENT_RELS: &str = "word/_rels/document.xml.rels";
const CONTENT_TYPES: &str = "[Content_Types].xml";

const REL_HYPERLINK: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
const REL_IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

static TAG_OPEN_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(?:<[^>]*>)+([{%#])").expect("static regex"));
static TAG_CLOSE_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([%}#])(?:<[^>]*>)+\}").expect("static regex"));
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{%.*?%\}|\{\{.*?\}\}").expect("static regex"));
static RUN_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)</w:t>.*?(?:<w:t>|<w:t [^>]*>)").expect("static regex"));
static REL_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"Id="rId(\d+)""#).expect("static regex"));

/// Escape text for inclusion in WordprocessingML.
pub fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

fn xml_unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Escape every string inside a JSON value.
fn escape_value(value: serde_json::Value) -> serde_json::Value {
    use serde_json::Value;
    match value {
        Value::String(s) => Value::String(xml_escape(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(escape_value).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, escape_value(v))).collect()),
        other => other,
    }
}

/// Normalise template XML so every tag is contiguous text.
pub(crate) fn preprocess(xml: &str) -> String {
    let xml = TAG_OPEN_SPLIT.replace_all(xml, "{${1}");
    let xml = TAG_CLOSE_SPLIT.replace_all(&xml, "${1}}");
    let xml = TAG.replace_all(&xml, |caps: &regex::Captures<'_>| {
        let tag = RUN_BREAK.replace_all(&caps[0], "");
        xml_unescape(&tag)
            .replace(['\u{2018}', '\u{2019}'], "'")
            .replace(['\u{201c}', '\u{201d}'], "\"")
    });
    let xml = hoist_block_tags(&xml, "p");
    hoist_block_tags(&xml, "tr")
}

/// Replace the `<w:{elem}>` enclosing each `{%{elem} ... %}` with the bare tag.
fn hoist_block_tags(xml: &str, elem: &str) -> String {
    let marker = format!("{{%{elem} ");
    let open_plain = format!("<w:{elem}>");
    let open_attr = format!("<w:{elem} ");
    let close = format!("</w:{elem}>");

    let mut out = xml.to_string();
    while let Some(tag_start) = out.find(&marker) {
        let Some(tag_end) = out[tag_start..].find("%}").map(|i| tag_start + i + 2) else {
            break;
        };
        let replacement = format!("{{% {} %}}", out[tag_start + marker.len()..tag_end - 2].trim());

        let before = &out[..tag_start];
        let elem_start = before.rfind(&open_plain).max(before.rfind(&open_attr));
        let elem_end = out[tag_end..]
            .find(&close)
            .map(|i| tag_end + i + close.len());

        match (elem_start, elem_end) {
            (Some(start), Some(end)) => out.replace_range(start..end, &replacement),
            _ => out.replace_range(tag_start..tag_end, &replacement),
        }
    }
    out
}

/// Values available to a template.
#[derive(Debug, Default)]
pub struct DocxContext {
    inner: tera::Context,
}

impl DocxContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert data whose strings are plain text.
    pub fn insert_plain<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), ExportError> {
        let value = serde_json::to_value(value)
            .map_err(|e| ExportError::Template(format!("cannot serialize '{key}': {e}")))?;
        self.inner.insert(key, &escape_value(value));
        Ok(())
    }

    /// Insert data that already contains WordprocessingML markup.
    pub fn insert_markup(&mut self, key: &str, value: serde_json::Value) {
        self.inner.insert(key, &value);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }
}

/// A formatted run, optionally a hyperlink.
#[derive(Debug, Clone, PartialEq)]
pub struct RichText {
    text: String,
    color: Option<String>,
    underline: bool,
    url_id: Option<String>,
}

impl RichText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: None,
            underline: false,
            url_id: None,
        }
    }

    /// Hex color, with or without a leading `#`.
    pub fn color(mut self, color: &str) -> Self {
        self.color = Some(color.trim_start_matches('#').to_string());
        self
    }

    pub fn underline(mut self) -> Self {
        self.underline = true;
        self
    }

    /// Link to a relationship created by [`DocxTemplate::build_url_id`].
    pub fn link(mut self, url_id: impl Into<String>) -> Self {
        self.url_id = Some(url_id.into());
        self
    }

    pub fn markup(&self) -> String {
        let mut props = String::new();
        if let Some(color) = &self.color {
            props.push_str(&format!(r#"<w:color w:val="{}"/>"#, xml_escape(color)));
        }
        if self.underline {
            props.push_str(r#"<w:u w:val="single"/>"#);
        }
        let run = format!(
            r#"<w:r><w:rPr>{props}</w:rPr><w:t xml:space="preserve">{}</w:t></w:r>"#,
            xml_escape(&self.text)
        );
        let run = match &self.url_id {
            Some(id) => format!(r#"<w:hyperlink r:id="{id}">{run}</w:hyperlink>"#),
            None => run,
        };
        format!(r#"</w:t></w:r>{run}<w:r><w:t xml:space="preserve">"#)
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::Value::String(self.markup())
    }
}

/// An image placed inline in the text flow.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    rel_id: String,
    doc_pr_id: u32,
    cx: u64,
    cy: u64,
}

impl InlineImage {
    /// Extent in EMU (width, height).
    pub fn extent(&self) -> (u64, u64) {
        (self.cx, self.cy)
    }

    pub fn markup(&self) -> String {
        let (id, cx, cy, rel) = (self.doc_pr_id, self.cx, self.cy, &self.rel_id);
        format!(
            concat!(
                r#"</w:t></w:r><w:r><w:drawing "#,
                r#"xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" "#,
                r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
                r#"xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture" "#,
                r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
                r#"<wp:inline distT="0" distB="0" distL="0" distR="0">"#,
                r#"<wp:extent cx="{cx}" cy="{cy}"/><wp:docPr id="{id}" name="Picture {id}"/>"#,
                r#"<wp:cNvGraphicFramePr><a:graphicFrameLocks noChangeAspect="1"/></wp:cNvGraphicFramePr>"#,
                r#"<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
                r#"<pic:pic><pic:nvPicPr><pic:cNvPr id="{id}" name="image{id}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
                r#"<pic:blipFill><a:blip r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
                r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
                r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic>"#,
                r#"</a:graphicData></a:graphic></wp:inline></w:drawing></w:r>"#,
                r#"<w:r><w:t xml:space="preserve">"#
            ),
            id = id,
            cx = cx,
            cy = cy,
            rel = rel,
        )
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::Value::String(self.markup())
    }
}

/// An opened template plus everything added to it before saving.
pub struct DocxTemplate {
    entries: Vec<(String, Vec<u8>)>,
    new_rels: Vec<String>,
    media: Vec<(String, Vec<u8>)>,
    extensions: BTreeSet<(&'static str, &'static str)>,
    next_rel: u32,
    next_doc_pr: u32,
}

fn template_err(e: impl std::fmt::Display) -> ExportError {
    ExportError::Template(e.to_string())
}

impl DocxTemplate {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ExportError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(template_err)?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i).map_err(template_err)?;
            if file.is_dir() {
                continue;
            }
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data).map_err(template_err)?;
            entries.push((file.name().to_string(), data));
        }

        if !entries.iter().any(|(name, _)| name == DOCUMENT_PART) {
            return Err(ExportError::Template(format!("{DOCUMENT_PART} is missing")));
        }

        let max_rel = entries
            .iter()
            .find(|(name, _)| name == DOCUMENT_RELS)
            .map(|(_, data)| {
                REL_ID
                    .captures_iter(&String::from_utf8_lossy(data))
                    .filter_map(|c| c[1].parse::<u32>().ok())
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0);

        Ok(Self {
            entries,
            new_rels: Vec::new(),
            media: Vec::new(),
            extensions: BTreeSet::new(),
            next_rel: max_rel + 1,
            next_doc_pr: 1000,
        })
    }

    fn add_relationship(&mut self, kind: &str, target: &str, external: bool) -> String {
        let id = format!("rId{}", self.next_rel);
        self.next_rel += 1;
        let mode = if external { r#" TargetMode="External""# } else { "" };
        self.new_rels.push(format!(
            r#"<Relationship Id="{id}" Type="{kind}" Target="{}"{mode}/>"#,
            xml_escape(target)
        ));
        id
    }

    /// Relationship id for an external hyperlink, for use with [`RichText::link`].
    pub fn build_url_id(&mut self, url: &str) -> String {
        self.add_relationship(REL_HYPERLINK, url, true)
    }

    /// Embed an image scaled to `height_inches`, keeping its aspect ratio.
    pub fn add_image(&mut self, bytes: Vec<u8>, height_inches: f64) -> Result<InlineImage, ExportError> {
        let size = imagesize::blob_size(&bytes).map_err(|e| ExportError::Image(e.to_string()))?;
        if size.width == 0 || size.height == 0 {
            return Err(ExportError::Image("image has zero size".into()));
        }
        let cy = (height_inches * EMU_PER_INCH).round() as u64;
        let cx = (cy as f64 * size.width as f64 / size.height as f64).round() as u64;
        self.embed(bytes, cx, cy)
    }

    /// Embed an image at its pixel size.
    pub fn add_image_native(&mut self, bytes: Vec<u8>) -> Result<InlineImage, ExportError> {
        let size = imagesize::blob_size(&bytes).map_err(|e| ExportError::Image(e.to_string()))?;
        self.embed(bytes, size.width as u64 * EMU_PER_PIXEL, size.height as u64 * EMU_PER_PIXEL)
    }

    fn embed(&mut self, bytes: Vec<u8>, cx: u64, cy: u64) -> Result<InlineImage, ExportError> {
        let (ext, mime) = match imagesize::image_type(&bytes) {
            Ok(imagesize::ImageType::Png) => ("png", "image/png"),
            Ok(imagesize::ImageType::Jpeg) => ("jpeg", "image/jpeg"),
            Ok(imagesize::ImageType::Gif) => ("gif", "image/gif"),
            Ok(other) => return Err(ExportError::Image(format!("unsupported image type {other:?}"))),
            Err(e) => return Err(ExportError::Image(e.to_string())),
        };
        let name = format!("tb_image{}.{ext}", self.media.len() + 1);
        let rel_id = self.add_relationship(REL_IMAGE, &format!("media/{name}"), false);
        self.media.push((format!("word/media/{name}"), bytes));
        self.extensions.insert((ext, mime));

        let doc_pr_id = self.next_doc_pr;
        self.next_doc_pr += 1;
        Ok(InlineImage {
            rel_id,
            doc_pr_id,
            cx,
            cy,
        })
    }

    fn is_renderable(name: &str) -> bool {
        name == DOCUMENT_PART
            || (name.starts_with("word/header") || name.starts_with("word/footer")) && name.ends_with(".xml")
    }

    /// Render the document body, headers and footers in place.
    pub fn render(&mut self, context: &DocxContext) -> Result<(), ExportError> {
        for (name, data) in &mut self.entries {
            if !Self::is_renderable(name) {
                continue;
            }
            let xml = std::str::from_utf8(data)
                .map_err(|e| ExportError::Template(format!("{name}: {e}")))?;
            let rendered = tera::Tera::one_off(&preprocess(xml), &context.inner, false)
                .map_err(|e| ExportError::Template(format!("{name}: {}", error_chain(&e))))?;
            *data = rendered.into_bytes();
        }
        Ok(())
    }

    /// The document as `.docx` bytes.
    pub fn save(&self) -> Result<Vec<u8>, ExportError> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        let mut wrote_rels = false;
        for (name, data) in &self.entries {
            let patched;
            let data = match name.as_str() {
                DOCUMENT_RELS => {
                    wrote_rels = true;
                    patched = insert_before(data, "</Relationships>", &self.new_rels.concat());
                    patched.as_bytes()
                }
                CONTENT_TYPES => {
                    patched = self.patch_content_types(data);
                    patched.as_bytes()
                }
                _ => data.as_slice(),
            };
            writer.start_file(name.as_str(), options).map_err(template_err)?;
            writer.write_all(data).map_err(template_err)?;
        }

        if !wrote_rels && !self.new_rels.is_empty() {
            let rels = format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
                self.new_rels.concat()
            );
            writer.start_file(DOCUMENT_RELS, options).map_err(template_err)?;
            writer.write_all(rels.as_bytes()).map_err(template_err)?;
        }

        for (name, data) in &self.media {
            writer.start_file(name.as_str(), options).map_err(template_err)?;
            writer.write_all(data).map_err(template_err)?;
        }

        let cursor = writer.finish().map_err(template_err)?;
        Ok(cursor.into_inner())
    }

    fn patch_content_types(&self, data: &[u8]) -> String {
        let xml = String::from_utf8_lossy(data);
        let missing: String = self
            .extensions
            .iter()
            .filter(|(ext, _)| !xml.contains(&format!(r#"Extension="{ext}""#)))
            .map(|(ext, mime)| format!(r#"<Default Extension="{ext}" ContentType="{mime}"/>"#))
            .collect();
        insert_before(data, "</Types>", &missing)
    }
}

fn insert_before(data: &[u8], closing: &str, addition: &str) -> String {
    let xml = String::from_utf8_lossy(data);
    match xml.rfind(closing) {
        Some(pos) => format!("{}{addition}{}", &xml[..pos], &xml[pos..]),
        None => xml.into_owned(),
    }
}

fn error_chain(e: &tera::Error) -> String {
    let mut message = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

/// A minimal, valid `.docx` whose body is `body_xml` (the children of `<w:body>`).
pub fn scaffold_docx(body_xml: &str) -> Result<Vec<u8>, ExportError> {
    let parts: [(&str, String); 4] = [
        (
            CONTENT_TYPES,
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
                r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
                r#"<Default Extension="xml" ContentType="application/xml"/>"#,
                r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
                r#"</Types>"#
            )
            .to_string(),
        ),
        (
            "_rels/.rels",
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
                r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
                r#"</Relationships>"#
            )
            .to_string(),
        ),
        (
            DOCUMENT_RELS,
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
                r#"</Relationships>"#
            )
            .to_string(),
        ),
        (
            DOCUMENT_PART,
            format!(
                concat!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                    r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" "#,
                    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
                    r#"<w:body>{}<w:sectPr/></w:body></w:document>"#
                ),
                body_xml
            ),
        ),
    ];

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, data) in parts {
        writer.start_file(name, options).map_err(template_err)?;
        writer.write_all(data.as_bytes()).map_err(template_err)?;
    }
    Ok(writer.finish().map_err(template_err)?.into_inner())
}

/// Read one part of a `.docx` as text.
pub fn read_part(docx: &[u8], name: &str) -> Result<String, ExportError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(docx)).map_err(template_err)?;
    let mut file = archive.by_name(name).map_err(template_err)?;
    let mut xml = String::new();
    file.read_to_string(&mut xml).map_err(template_err)?;
    Ok(xml)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn para(text: &str) -> String {
        format!(r#"<w:p><w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#)
    }

    fn tiny_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 10, 10]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn preprocess_joins_split_tags() {
        let xml = r#"<w:r><w:t>{</w:t></w:r><w:r><w:t>{ patient_</w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>id }}</w:t></w:r>"#;
        let out = preprocess(xml);
        assert!(out.contains("{{ patient_id }}"), "{out}");
    }

    #[test]
    fn preprocess_hoists_paragraph_and_row_tags() {
        let xml = format!(
            "{}{}{}",
            para("{%p for x in items %}"),
            para("{{ x }}"),
            para("{%p endfor %}")
        );
        let out = preprocess(&xml);
        assert!(out.starts_with("{% for x in items %}"), "{out}");
        assert!(out.ends_with("{% endfor %}"), "{out}");

        let row = r#"<w:tbl><w:tr w:rsidR="1"><w:tc><w:p><w:r><w:t>{%tr for r in rows %}</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#;
        assert_eq!(preprocess(row), "<w:tbl>{% for r in rows %}</w:tbl>");
    }

    #[test]
    fn preprocess_unescapes_inside_tags() {
        let out = preprocess("<w:t>{% if n &gt; 1 and s == \u{201c}a\u{201d} %}</w:t>");
        assert_eq!(out, "<w:t>{% if n > 1 and s == \"a\" %}</w:t>");
    }

    #[test]
    fn plain_values_are_escaped() {
        let docx = scaffold_docx(&para("{{ dx }}")).unwrap();
        let mut doc = DocxTemplate::from_bytes(&docx).unwrap();
        let mut ctx = DocxContext::new();
        ctx.insert_plain("dx", "NSCLC <stage IIIA> & PD-L1").unwrap();
        doc.render(&ctx).unwrap();

        let xml = read_part(&doc.save().unwrap(), DOCUMENT_PART).unwrap();
        assert!(xml.contains("NSCLC &lt;stage IIIA&gt; &amp; PD-L1"));
    }

    #[test]
    fn null_renders_blank_and_lists_loop() {
        let body = format!(
            "{}{}{}{}",
            para("[{{ missing }}]"),
            para("{%p for t in previous_treatment %}"),
            para("* {{ t }}"),
            para("{%p endfor %}")
        );
        let mut doc = DocxTemplate::from_bytes(&scaffold_docx(&body).unwrap()).unwrap();
        let mut ctx = DocxContext::new();
        ctx.insert_plain("missing", &Option::<String>::None).unwrap();
        ctx.insert_plain("previous_treatment", &vec!["FOLFOX", "Radiation"]).unwrap();
        doc.render(&ctx).unwrap();

        let xml = read_part(&doc.save().unwrap(), DOCUMENT_PART).unwrap();
        assert!(xml.contains("[]"));
        assert!(xml.contains("* FOLFOX") && xml.contains("* Radiation"));
    }

    #[test]
    fn rich_text_hyperlink_adds_relationship() {
        let docx = scaffold_docx(&para("{{ link }}")).unwrap();
        let mut doc = DocxTemplate::from_bytes(&docx).unwrap();
        let url_id = doc.build_url_id("https://clinicaltrials.gov/study/NCT0001?a=1&b=2");
        let rich = RichText::new("Trial A").color("#0000ee").underline().link(&url_id);

        let mut ctx = DocxContext::new();
        ctx.insert_markup("link", rich.to_value());
        doc.render(&ctx).unwrap();
        let saved = doc.save().unwrap();

        let xml = read_part(&saved, DOCUMENT_PART).unwrap();
        assert!(xml.contains(&format!(r#"<w:hyperlink r:id="{url_id}">"#)));
        assert!(xml.contains(r#"<w:color w:val="0000ee"/>"#));
        assert!(xml.contains(r#"<w:u w:val="single"/>"#));

        let rels = read_part(&saved, DOCUMENT_RELS).unwrap();
        assert!(rels.contains(r#"Target="https://clinicaltrials.gov/study/NCT0001?a=1&amp;b=2""#));
        assert!(rels.contains(r#"TargetMode="External""#));
    }

    #[test]
    fn image_is_scaled_and_packaged() {
        let docx = scaffold_docx(&para("{{ img }}")).unwrap();
        let mut doc = DocxTemplate::from_bytes(&docx).unwrap();
        let image = doc.add_image(tiny_png(200, 100), 1.0).unwrap();
        assert_eq!(image.extent(), (1_828_800, 914_400));

        let mut ctx = DocxContext::new();
        ctx.insert_markup("img", image.to_value());
        doc.render(&ctx).unwrap();
        let saved = doc.save().unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(saved.as_slice())).unwrap();
        assert!(archive.by_name("word/media/tb_image1.png").is_ok());
        drop(archive);
        let types = read_part(&saved, CONTENT_TYPES).unwrap();
        assert!(types.contains(r#"<Default Extension="png" ContentType="image/png"/>"#));
        let rels = read_part(&saved, DOCUMENT_RELS).unwrap();
        assert!(rels.contains(r#"Target="media/tb_image1.png""#));
    }

    #[test]
    fn native_image_size_uses_pixels() {
        let mut doc = DocxTemplate::from_bytes(&scaffold_docx("").unwrap()).unwrap();
        let image = doc.add_image_native(tiny_png(96, 48)).unwrap();
        assert_eq!(image.extent(), (914_400, 457_200));
    }

    #[test]
    fn non_image_bytes_rejected() {
        let mut doc = DocxTemplate::from_bytes(&scaffold_docx("").unwrap()).unwrap();
        assert!(matches!(
            doc.add_image(b"not an image".to_vec(), 1.7),
            Err(ExportError::Image(_))
        ));
    }

    #[test]
    fn malformed_templates_are_template_errors() {
        assert!(matches!(
            DocxTemplate::from_bytes(b"PK garbage"),
            Err(ExportError::Template(_))
        ));

        let mut doc = DocxTemplate::from_bytes(&scaffold_docx(&para("{% for %}")).unwrap()).unwrap();
        assert!(matches!(doc.render(&DocxContext::new()), Err(ExportError::Template(_))));
    }

    #[test]
    fn relationship_ids_continue_after_existing() {
        let docx = scaffold_docx("").unwrap();
        let mut doc = DocxTemplate::from_bytes(&docx).unwrap();
        assert_eq!(doc.build_url_id("https://a"), "rId1");
        assert_eq!(doc.build_url_id("https://b"), "rId2");
    }
}
