// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Word watermarker — adds a gold text run to the default header of every
// section. Sections without a default header get a new header part wired in
// through the document relationships and content types.
//
// Edits are made on the serialised XML of the affected parts only; every
// other part of the package is copied through byte for byte.

use std::collections::BTreeMap;

use filigran_core::{RenderFailure, WatermarkSpec};
use tracing::{debug, info, instrument, warn};

use super::package::Package;
use crate::stamp;

const DOCUMENT_PART: &str = "word/document.xml";
const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

const HEADER_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/header";
const HEADER_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml";

const EMPTY_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"></Relationships>"#,
);

/// Header run colour (gold) and size in half-points (24pt).
const RUN_COLOR: &str = "FFD700";
const RUN_HALF_POINTS: u32 = 48;

// ---------------------------------------------------------------------------
// Watermarker
// ---------------------------------------------------------------------------

/// Watermarks OOXML word-processing documents.
///
/// Only `.docx` packages are understood. A legacy binary `.doc` is not a ZIP
/// and fails with [`RenderFailure::Decode`], which the pipeline turns into a
/// passthrough.
#[derive(Debug, Clone, Default)]
pub struct WordWatermarker;

impl WordWatermarker {
    pub fn new() -> Self {
        Self
    }

    /// Add the label to every section's default header and return the
    /// re-packed document.
    ///
    /// Existing default headers get a run appended to their first paragraph;
    /// a header shared by several sections is edited once. If any section has
    /// no default header, one new header part is created and referenced from
    /// each of those sections.
    #[instrument(skip_all, fields(data_len = data.len()))]
    pub fn watermark(&self, data: &[u8], spec: &WatermarkSpec) -> Result<Vec<u8>, RenderFailure> {
        let mut package = Package::from_bytes(data)?;
        let document = package
            .text(DOCUMENT_PART)?
            .ok_or_else(|| RenderFailure::Decode(format!("package has no {}", DOCUMENT_PART)))?;
        let rels = package
            .text(DOCUMENT_RELS_PART)?
            .unwrap_or_else(|| EMPTY_RELS.to_string());

        let run = header_run(&stamp::label(spec, stamp::DATE_FORMAT));
        let targets = header_targets(&rels);
        let sections = find_sections(&document);

        // Existing default headers, each edited once even if shared.
        let mut edited = 0usize;
        let mut seen = Vec::new();
        for rel_id in sections.iter().filter_map(|s| s.default_header.as_deref()) {
            let Some(part_name) = targets.get(rel_id) else {
                warn!(rel_id, "Header relationship not found");
                continue;
            };
            if seen.contains(part_name) {
                continue;
            }
            seen.push(part_name.clone());

            let Some(header) = package.text(part_name)? else {
                warn!(part = %part_name, "Header part missing from package");
                continue;
            };
            let updated = append_to_first_paragraph(&header, &run)
                .ok_or_else(|| RenderFailure::Decode(format!("{} is not a header", part_name)))?;
            package.put(part_name, updated);
            edited += 1;
        }

        let bare = sections.iter().filter(|s| s.default_header.is_none()).count();
        if bare > 0 || sections.is_empty() {
            if !declares_relationship_namespace(&document) {
                return Err(RenderFailure::Unsupported(
                    "document root does not declare the relationships namespace".into(),
                ));
            }
            let part_name = unused_header_name(&package);
            let rel_id = unused_rel_id(&rels);
            let target = part_name.trim_start_matches("word/");

            package.put(&part_name, new_header(&run));
            package.put(DOCUMENT_RELS_PART, add_relationship(&rels, &rel_id, target)?);
            let content_types = package
                .text(CONTENT_TYPES_PART)?
                .ok_or_else(|| RenderFailure::Decode("package has no content types".into()))?;
            package.put(CONTENT_TYPES_PART, add_override(&content_types, &part_name)?);
            package.put(DOCUMENT_PART, reference_header(&document, &sections, &rel_id)?);
            debug!(part = %part_name, sections = bare.max(1), "Header part created");
        }

        let output = package.to_bytes()?;
        info!(
            sections = sections.len(),
            headers_edited = edited,
            headers_created = usize::from(bare > 0 || sections.is_empty()),
            "Word document watermarked"
        );
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// XML helpers
// ---------------------------------------------------------------------------

/// A `<w:sectPr>` element located in document.xml.
#[derive(Debug, Clone, PartialEq)]
struct Section {
    /// Byte offset just past the opening tag's `>`.
    open_end: usize,
    self_closing: bool,
    /// Relationship id of the `w:type="default"` header reference, if any.
    default_header: Option<String>,
}

fn header_run(label: &str) -> String {
    format!(
        concat!(
            r#"<w:r><w:rPr><w:color w:val="{color}"/><w:sz w:val="{size}"/></w:rPr>"#,
            r#"<w:t xml:space="preserve">{text}</w:t></w:r>"#,
        ),
        color = RUN_COLOR,
        size = RUN_HALF_POINTS,
        text = escape_xml(label),
    )
}

fn new_header(run: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<w:hdr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" "#,
            r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
            "<w:p>{run}</w:p></w:hdr>",
        ),
        run = run,
    )
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Find every opening tag named exactly `tag` (not a longer name sharing the
/// prefix). Yields (start, end) where `end` is just past the closing `>`.
fn open_tags<'a>(xml: &'a str, tag: &'a str) -> impl Iterator<Item = (usize, usize)> + 'a {
    let mut cursor = 0;
    std::iter::from_fn(move || {
        while let Some(found) = xml[cursor..].find(tag) {
            let start = cursor + found;
            let after = start + tag.len();
            cursor = after;
            match xml.as_bytes().get(after) {
                Some(b'>') | Some(b'/') | Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => {
                    let end = after + xml[after..].find('>')? + 1;
                    cursor = end;
                    return Some((start, end));
                }
                _ => continue,
            }
        }
        None
    })
}

/// Value of `name="..."` inside a single tag.
fn attribute<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!(" {}=", name);
    let start = tag.find(&needle)? + needle.len();
    let quote = tag[start..].chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let value_start = start + 1;
    let value_len = tag[value_start..].find(quote)?;
    Some(&tag[value_start..value_start + value_len])
}

/// Map of relationship id to package part name for header relationships.
fn header_targets(rels: &str) -> BTreeMap<String, String> {
    open_tags(rels, "<Relationship")
        .filter_map(|(start, end)| {
            let tag = &rels[start..end];
            if attribute(tag, "Type")? != HEADER_REL_TYPE {
                return None;
            }
            if attribute(tag, "TargetMode") == Some("External") {
                return None;
            }
            let id = attribute(tag, "Id")?;
            Some((id.to_string(), part_name_for(attribute(tag, "Target")?)))
        })
        .collect()
}

/// Resolve a relationship target (relative to `word/`) to a part name.
fn part_name_for(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("word/{}", target),
    }
}

fn find_sections(document: &str) -> Vec<Section> {
    open_tags(document, "<w:sectPr")
        .map(|(start, open_end)| {
            let self_closing = document[start..open_end].ends_with("/>");
            let body = if self_closing {
                ""
            } else {
                let close = document[open_end..]
                    .find("</w:sectPr>")
                    .map_or(document.len(), |offset| open_end + offset);
                &document[open_end..close]
            };
            let default_header = open_tags(body, "<w:headerReference")
                .map(|(s, e)| &body[s..e])
                .find(|tag| attribute(tag, "w:type") == Some("default"))
                .and_then(|tag| attribute(tag, "r:id"))
                .map(str::to_string);
            Section {
                open_end,
                self_closing,
                default_header,
            }
        })
        .collect()
}

/// Append `run` to the first paragraph of a header part, creating one if the
/// header has none. `None` if the XML is not a header.
fn append_to_first_paragraph(header: &str, run: &str) -> Option<String> {
    if let Some((start, end)) = open_tags(header, "<w:p").next() {
        let mut updated = String::with_capacity(header.len() + run.len() + 8);
        if header[start..end].ends_with("/>") {
            updated.push_str(&header[..end - 2]);
            updated.push('>');
            updated.push_str(run);
            updated.push_str("</w:p>");
            updated.push_str(&header[end..]);
        } else {
            let close = end + header[end..].find("</w:p>")?;
            updated.push_str(&header[..close]);
            updated.push_str(run);
            updated.push_str(&header[close..]);
        }
        return Some(updated);
    }

    let close = header.rfind("</w:hdr>")?;
    Some(format!("{}<w:p>{}</w:p>{}", &header[..close], run, &header[close..]))
}

// ---------------------------------------------------------------------------
// Package wiring
// ---------------------------------------------------------------------------

fn declares_relationship_namespace(document: &str) -> bool {
    document.contains("xmlns:r=")
}

fn unused_header_name(package: &Package) -> String {
    (1..)
        .map(|n| format!("word/header{}.xml", n))
        .find(|name| !package.contains(name))
        .unwrap_or_else(|| "word/header-filigran.xml".to_string())
}

fn unused_rel_id(rels: &str) -> String {
    (1..)
        .map(|n| format!("rIdFiligran{}", n))
        .find(|id| !rels.contains(&format!("Id=\"{}\"", id)))
        .unwrap_or_else(|| "rIdFiligran".to_string())
}

fn add_relationship(rels: &str, rel_id: &str, target: &str) -> Result<String, RenderFailure> {
    let element = format!(
        r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
        rel_id, HEADER_REL_TYPE, target
    );
    insert_before(rels, "</Relationships>", &element)
        .ok_or_else(|| RenderFailure::Decode("malformed document relationships".into()))
}

fn add_override(content_types: &str, part_name: &str) -> Result<String, RenderFailure> {
    let element = format!(
        r#"<Override PartName="/{}" ContentType="{}"/>"#,
        part_name, HEADER_CONTENT_TYPE
    );
    insert_before(content_types, "</Types>", &element)
        .ok_or_else(|| RenderFailure::Decode("malformed content types".into()))
}

fn insert_before(xml: &str, closing: &str, element: &str) -> Option<String> {
    let at = xml.rfind(closing)?;
    Some(format!("{}{}{}", &xml[..at], element, &xml[at..]))
}

/// Point every section lacking a default header at `rel_id`. A document with
/// no section properties at all gets a trailing `<w:sectPr>` in its body.
fn reference_header(document: &str, sections: &[Section], rel_id: &str) -> Result<String, RenderFailure> {
    let reference = format!(r#"<w:headerReference w:type="default" r:id="{}"/>"#, rel_id);

    if sections.is_empty() {
        return insert_before(document, "</w:body>", &format!("<w:sectPr>{}</w:sectPr>", reference))
            .ok_or_else(|| RenderFailure::Decode("document has no body".into()));
    }

    let mut updated = String::with_capacity(document.len() + sections.len() * reference.len());
    let mut copied = 0;
    for section in sections.iter().filter(|s| s.default_header.is_none()) {
        if section.self_closing {
            updated.push_str(&document[copied..section.open_end - 2]);
            updated.push('>');
            updated.push_str(&reference);
            updated.push_str("</w:sectPr>");
        } else {
            updated.push_str(&document[copied..section.open_end]);
            updated.push_str(&reference);
        }
        copied = section.open_end;
    }
    updated.push_str(&document[copied..]);
    Ok(updated)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
