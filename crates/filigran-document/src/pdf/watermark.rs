// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF watermarker — appends a translucent, 45-degree rotated text stamp to
// every page using the `lopdf` crate. Existing page content is left
// untouched; the stamp is wrapped in its own graphics state.

use filigran_core::{RenderFailure, WatermarkSpec};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use tracing::{debug, info, instrument, warn};

use crate::stamp;

/// Resource names registered on each page. Prefixed to avoid clashing with
/// names the producer already used.
const FONT_RESOURCE: &str = "FiligranF1";
const STATE_RESOURCE: &str = "FiligranGS1";

/// US Letter, used when a page (and its ancestors) declares no MediaBox.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Parent-chain walks give up after this many hops (guards malformed cycles).
const MAX_INHERITANCE_DEPTH: usize = 64;

/// Stamps a text watermark onto each page of a PDF.
#[derive(Debug, Clone)]
pub struct PdfWatermarker {
    font_size: f32,
    opacity: f32,
}

impl Default for PdfWatermarker {
    fn default() -> Self {
        Self {
            font_size: 20.0,
            opacity: 0.4,
        }
    }
}

impl PdfWatermarker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watermark every page of the PDF in `data` and return the re-serialised
    /// document.
    #[instrument(skip_all, fields(data_len = data.len()))]
    pub fn watermark(&self, data: &[u8], spec: &WatermarkSpec) -> Result<Vec<u8>, RenderFailure> {
        let mut doc = Document::load_mem(data)
            .map_err(|err| RenderFailure::Decode(format!("failed to load PDF: {}", err)))?;
        if doc.is_encrypted() {
            return Err(RenderFailure::Unsupported("encrypted PDF".into()));
        }

        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if pages.is_empty() {
            return Err(RenderFailure::Unsupported("PDF has no pages".into()));
        }

        let label = latin1_bytes(&stamp::label(spec, stamp::DATE_FORMAT));
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let state_id = doc.add_object(dictionary! {
            "Type" => "ExtGState",
            "ca" => self.opacity,
            "CA" => self.opacity,
        });

        for page_id in &pages {
            let page_id = *page_id;
            let [x0, y0, x1, y1] = media_box(&doc, page_id);

            materialize_resources(&mut doc, page_id)?;
            register_resource(&mut doc, page_id, b"Font", FONT_RESOURCE, font_id)?;
            register_resource(&mut doc, page_id, b"ExtGState", STATE_RESOURCE, state_id)?;

            let origin = (x0 + (x1 - x0) / 4.0, y0 + (y1 - y0) / 2.0);
            let stamp = self.stamp_content(&label, origin)?;
            append_contents(&mut doc, page_id, stamp)?;
            debug!(?page_id, "Page stamped");
        }

        let mut output = Vec::new();
        doc.save_to(&mut output)
            .map_err(|err| RenderFailure::Encode(format!("failed to save PDF: {}", err)))?;
        info!(pages = pages.len(), output_len = output.len(), "PDF watermarked");
        Ok(output)
    }

    /// Content stream drawing `label` rotated 45 degrees about `origin`.
    fn stamp_content(&self, label: &[u8], origin: (f32, f32)) -> Result<Vec<u8>, RenderFailure> {
        let (cos, sin) = (
            std::f32::consts::FRAC_1_SQRT_2,
            std::f32::consts::FRAC_1_SQRT_2,
        );
        let content = Content {
            operations: vec![
                // Closes the `q` pushed in front of the original content.
                Operation::new("Q", vec![]),
                Operation::new("q", vec![]),
                Operation::new("gs", vec![Object::Name(STATE_RESOURCE.into())]),
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![Object::Name(FONT_RESOURCE.into()), self.font_size.into()],
                ),
                Operation::new("rg", vec![1.0f32.into(), 0.8f32.into(), 0.0f32.into()]),
                Operation::new(
                    "Tm",
                    vec![
                        cos.into(),
                        sin.into(),
                        (-sin).into(),
                        cos.into(),
                        origin.0.into(),
                        origin.1.into(),
                    ],
                ),
                Operation::new("Tj", vec![Object::string_literal(label.to_vec())]),
                Operation::new("ET", vec![]),
                Operation::new("Q", vec![]),
            ],
        };
        content
            .encode()
            .map_err(|err| RenderFailure::Encode(format!("failed to encode stamp: {}", err)))
    }
}

/// The standard fonts only cover WinAnsi; anything outside Latin-1 becomes `?`.
fn latin1_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// Look up `key` on the page, then on its `Parent` chain.
fn inherited(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = Some(page_id);
    for _ in 0..MAX_INHERITANCE_DEPTH {
        let node = doc.get_dictionary(current?).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        current = match node.get(b"Parent") {
            Ok(Object::Reference(parent)) => Some(*parent),
            _ => None,
        };
    }
    None
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let Some(declared) = inherited(doc, page_id, b"MediaBox") else {
        return DEFAULT_MEDIA_BOX;
    };
    let values: Option<Vec<f32>> = resolve(doc, &declared)
        .and_then(|object| object.as_array().ok())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| resolve(doc, item).and_then(|v| v.as_float().ok()))
                .collect()
        });
    match values.as_deref() {
        Some([x0, y0, x1, y1]) => [*x0, *y0, *x1, *y1],
        _ => {
            warn!(?page_id, "Unreadable MediaBox, assuming US Letter");
            DEFAULT_MEDIA_BOX
        }
    }
}

/// Give the page its own `Resources` entry, copying an inherited one if
/// needed, so that registrations land where the page will find them.
fn materialize_resources(doc: &mut Document, page_id: ObjectId) -> Result<(), RenderFailure> {
    let own = doc
        .get_dictionary(page_id)
        .map_err(|err| RenderFailure::Decode(format!("bad page object: {}", err)))?
        .has(b"Resources");
    if own {
        return Ok(());
    }

    let resources = inherited(doc, page_id, b"Resources")
        .unwrap_or_else(|| Object::Dictionary(Dictionary::new()));
    doc.get_dictionary_mut(page_id)
        .map_err(|err| RenderFailure::Decode(format!("bad page object: {}", err)))?
        .set("Resources", resources);
    Ok(())
}

/// Add `name -> target` to the page's `category` resource sub-dictionary.
fn register_resource(
    doc: &mut Document,
    page_id: ObjectId,
    category: &[u8],
    name: &str,
    target: ObjectId,
) -> Result<(), RenderFailure> {
    let bad_resources =
        |err: lopdf::Error| RenderFailure::Decode(format!("bad page resources: {}", err));

    let resources_ref = match doc.get_dictionary(page_id).map_err(bad_resources)?.get(b"Resources") {
        Ok(Object::Reference(id)) => Some(*id),
        _ => None,
    };

    // The category itself may be an indirect object shared between pages.
    let category_ref = {
        let resources = match resources_ref {
            Some(id) => doc.get_dictionary(id),
            None => doc
                .get_dictionary(page_id)
                .and_then(|page| page.get(b"Resources"))
                .and_then(Object::as_dict),
        }
        .map_err(bad_resources)?;
        match resources.get(category) {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        }
    };
    if let Some(id) = category_ref {
        doc.get_dictionary_mut(id)
            .map_err(bad_resources)?
            .set(name, Object::Reference(target));
        return Ok(());
    }

    let resources = match resources_ref {
        Some(id) => doc.get_dictionary_mut(id),
        None => doc
            .get_dictionary_mut(page_id)
            .and_then(|page| page.get_mut(b"Resources"))
            .and_then(Object::as_dict_mut),
    }
    .map_err(bad_resources)?;
    match resources.get_mut(category) {
        Ok(Object::Dictionary(entries)) => entries.set(name, Object::Reference(target)),
        _ => {
            let mut entries = Dictionary::new();
            entries.set(name, Object::Reference(target));
            resources.set(category.to_vec(), entries);
        }
    }
    Ok(())
}

/// Wrap the page's existing content in `q` and append `stamp` after it.
///
/// `/Contents` may be a stream, an array of streams, or a reference to such
/// an array; the result is always a flat array of stream references.
fn append_contents(doc: &mut Document, page_id: ObjectId, stamp: Vec<u8>) -> Result<(), RenderFailure> {
    let bad_page = |err: lopdf::Error| RenderFailure::Decode(format!("bad page object: {}", err));

    let existing = match doc.get_dictionary(page_id).map_err(bad_page)?.get(b"Contents") {
        Ok(Object::Array(streams)) => streams.clone(),
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(streams)) => streams.clone(),
            _ => vec![Object::Reference(*id)],
        },
        _ => Vec::new(),
    };

    let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let stamp_id = doc.add_object(Stream::new(Dictionary::new(), stamp));
    let page = doc.get_dictionary_mut(page_id).map_err(bad_page)?;

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(save_id));
    contents.extend(existing);
    contents.push(Object::Reference(stamp_id));
    page.set("Contents", Object::Array(contents));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn watermark(data: &[u8]) -> Document {
        let output = PdfWatermarker::new()
            .watermark(data, &WatermarkSpec::new("CONFIDENTIAL"))
            .unwrap();
        Document::load_mem(&output).unwrap()
    }

    #[test]
    fn every_page_gets_a_stamp() {
        let doc = watermark(&fixtures::sample_pdf(3));
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 3);

        for page_id in pages.into_values() {
            let text = String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned();
            assert!(text.contains("CONFIDENTIAL"), "page {:?} lacks stamp", page_id);
            assert!(text.contains(FONT_RESOURCE));
        }
    }

    #[test]
    fn inherited_resources_keep_original_font() {
        let doc = watermark(&fixtures::sample_pdf(1));
        let page_id = *doc.get_pages().values().next().unwrap();
        let resources = inherited(&doc, page_id, b"Resources").unwrap();
        let resources = resolve(&doc, &resources).unwrap().as_dict().unwrap();
        let fonts = resolve(&doc, resources.get(b"Font").unwrap())
            .unwrap()
            .as_dict()
            .unwrap();
        assert!(fonts.has(b"F1"));
        assert!(fonts.has(FONT_RESOURCE.as_bytes()));
    }

    #[test]
    fn media_box_is_inherited_from_page_tree() {
        let doc = Document::load_mem(&fixtures::sample_pdf(1)).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();
        assert_eq!(media_box(&doc, page_id), [0.0, 0.0, 595.0, 842.0]);
    }

    #[test]
    fn non_latin_text_is_replaced() {
        assert_eq!(latin1_bytes("Größe 机密"), b"Gr\xf6\xdfe ??".to_vec());
    }

    #[test]
    fn contents_array_behind_a_reference_is_spliced() {
        let mut doc = Document::load_mem(&fixtures::sample_pdf(1)).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();
        let original = doc
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Contents")
            .unwrap()
            .clone();
        let array_id = doc.add_object(Object::Array(vec![original]));
        doc.get_dictionary_mut(page_id)
            .unwrap()
            .set("Contents", Object::Reference(array_id));
        let mut data = Vec::new();
        doc.save_to(&mut data).unwrap();

        let doc = watermark(&data);
        let page_id = *doc.get_pages().values().next().unwrap();
        let contents = doc
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Contents")
            .unwrap()
            .as_array()
            .unwrap();
        assert_eq!(contents.len(), 3);
        assert!(contents.iter().all(|entry| matches!(entry, Object::Reference(_))));

        let text = String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned();
        assert!(text.contains("Page 1"));
        assert!(text.contains("CONFIDENTIAL"));
    }

    #[test]
    fn pdf_without_pages_is_unsupported() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut data = Vec::new();
        doc.save_to(&mut data).unwrap();

        let result = PdfWatermarker::new().watermark(&data, &WatermarkSpec::new("X"));
        assert!(matches!(result, Err(RenderFailure::Unsupported(_))));
    }

    #[test]
    fn truncated_pdf_is_a_decode_failure() {
        let mut data = fixtures::sample_pdf(1);
        data.truncate(20);
        let result = PdfWatermarker::new().watermark(&data, &WatermarkSpec::new("X"));
        assert!(matches!(result, Err(RenderFailure::Decode(_))));
    }
}
