// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OOXML package access — the parts of a .docx held in memory, in their
// original order, so they can be edited and re-zipped.

use std::io::{Cursor, Read, Write};

use filigran_core::RenderFailure;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// One member of the package.
#[derive(Debug, Clone)]
pub struct Part {
    pub name: String,
    pub data: Vec<u8>,
    stored: bool,
}

/// An OOXML package opened from bytes.
#[derive(Debug, Clone, Default)]
pub struct Package {
    parts: Vec<Part>,
}

impl Package {
    pub fn from_bytes(data: &[u8]) -> Result<Self, RenderFailure> {
        let mut archive = ZipArchive::new(Cursor::new(data))
            .map_err(|err| RenderFailure::Decode(format!("not an OOXML package: {}", err)))?;

        let mut parts = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut file = archive
                .by_index(index)
                .map_err(|err| RenderFailure::Decode(format!("bad package member: {}", err)))?;
            if file.is_dir() {
                continue;
            }
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)
                .map_err(|err| RenderFailure::Decode(format!("bad package member: {}", err)))?;
            parts.push(Part {
                name: file.name().to_string(),
                data,
                stored: file.compression() == CompressionMethod::Stored,
            });
        }
        Ok(Self { parts })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parts.iter().any(|part| part.name == name)
    }

    /// A part decoded as UTF-8 text.
    pub fn text(&self, name: &str) -> Result<Option<String>, RenderFailure> {
        match self.parts.iter().find(|part| part.name == name) {
            Some(part) => String::from_utf8(part.data.clone())
                .map(Some)
                .map_err(|_| RenderFailure::Decode(format!("{} is not UTF-8", name))),
            None => Ok(None),
        }
    }

    /// Replace a part's content, or append a new part.
    pub fn put(&mut self, name: &str, data: impl Into<Vec<u8>>) {
        let data = data.into();
        match self.parts.iter_mut().find(|part| part.name == name) {
            Some(part) => part.data = data,
            None => self.parts.push(Part {
                name: name.to_string(),
                data,
                stored: false,
            }),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, RenderFailure> {
        let encode_err = |err: zip::result::ZipError| {
            RenderFailure::Encode(format!("failed to write package: {}", err))
        };

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for part in &self.parts {
            let method = if part.stored {
                CompressionMethod::Stored
            } else {
                CompressionMethod::Deflated
            };
            let options = FileOptions::default().compression_method(method);
            writer.start_file(part.name.as_str(), options).map_err(encode_err)?;
            writer
                .write_all(&part.data)
                .map_err(|err| RenderFailure::Encode(format!("failed to write package: {}", err)))?;
        }
        let cursor = writer.finish().map_err(encode_err)?;
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn parts_survive_a_rewrite_in_order() {
        let original = Package::from_bytes(&fixtures::sample_docx(true)).unwrap();
        let rewritten = Package::from_bytes(&original.to_bytes().unwrap()).unwrap();

        let names = |package: &Package| {
            package.parts.iter().map(|p| p.name.clone()).collect::<Vec<_>>()
        };
        assert_eq!(names(&original), names(&rewritten));
        assert_eq!(names(&original)[0], "[Content_Types].xml");
    }

    #[test]
    fn put_replaces_or_appends() {
        let mut package = Package::default();
        package.put("a.xml", "one");
        package.put("a.xml", "two");
        package.put("b.xml", "three");
        assert_eq!(package.text("a.xml").unwrap().as_deref(), Some("two"));
        assert!(package.contains("b.xml"));
        assert_eq!(package.text("c.xml").unwrap(), None);
    }

    #[test]
    fn non_zip_is_a_decode_failure() {
        assert!(matches!(
            Package::from_bytes(b"\xD0\xCF\x11\xE0 legacy word"),
            Err(RenderFailure::Decode(_))
        ));
    }
}
