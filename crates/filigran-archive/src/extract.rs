// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Archive extraction. ZIP and TAR-family archives are read straight from
// memory; 7z members are staged in a private temporary directory under
// index-based names and read back in listing order.

use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::PathBuf;

use bzip2::read::BzDecoder;
use filigran_core::{ArchiveFormat, FiligranError, Result, WorkItem};
use flate2::read::MultiGzDecoder;
use sevenz_rust::{Archive, Password, SevenZArchiveEntry, SevenZReader};
use tracing::{debug, warn};
use xz2::read::XzDecoder;
use zip::ZipArchive;

use crate::limits::{ArchiveLimits, Budget};

/// Unix file-type bits for a symbolic link.
const S_IFMT: u32 = 0o170_000;
const S_IFLNK: u32 = 0o120_000;

pub fn extract(data: &[u8], format: ArchiveFormat, limits: ArchiveLimits) -> Result<Vec<WorkItem>> {
    let mut budget = Budget::new(limits);
    match format {
        ArchiveFormat::Zip => extract_zip(data, &mut budget),
        ArchiveFormat::Tar => extract_tar(data, &mut budget),
        ArchiveFormat::TarGz => extract_tar(MultiGzDecoder::new(data), &mut budget),
        ArchiveFormat::TarBz2 => extract_tar(BzDecoder::new(data), &mut budget),
        ArchiveFormat::TarXz => extract_tar(XzDecoder::new(data), &mut budget),
        ArchiveFormat::SevenZip => extract_7z(data, &mut budget),
    }
}

fn corrupt(context: &str, err: impl std::fmt::Display) -> FiligranError {
    FiligranError::CorruptArchive(format!("{}: {}", context, err))
}

/// Member path relative to the archive root: forward slashes, no leading
/// `./` or `/`. `None` for names that are empty after normalisation.
pub(crate) fn member_name(raw: &str) -> Option<String> {
    let unified = raw.replace('\\', "/");
    let mut name = unified.as_str();
    loop {
        if let Some(rest) = name.strip_prefix("./") {
            name = rest;
        } else if let Some(rest) = name.strip_prefix('/') {
            name = rest;
        } else {
            break;
        }
    }
    let name = name.trim_end_matches('/');
    (!name.is_empty()).then(|| name.to_string())
}

fn extract_zip(data: &[u8], budget: &mut Budget) -> Result<Vec<WorkItem>> {
    let mut archive = ZipArchive::new(Cursor::new(data)).map_err(|err| corrupt("bad ZIP", err))?;

    let mut items = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .map_err(|err| corrupt("bad ZIP member", err))?;
        if entry.is_dir() {
            continue;
        }
        if entry.unix_mode().is_some_and(|mode| mode & S_IFMT == S_IFLNK) {
            debug!(name = entry.name(), "Skipping symlink");
            continue;
        }
        let Some(name) = member_name(entry.name()) else {
            continue;
        };

        budget.admit()?;
        let size = entry.size();
        let content = budget.read(entry, size)?;
        items.push(WorkItem::new(name, content));
    }
    Ok(items)
}

fn extract_tar<R: Read>(reader: R, budget: &mut Budget) -> Result<Vec<WorkItem>> {
    let mut archive = tar::Archive::new(reader);
    let entries = archive.entries().map_err(|err| corrupt("bad TAR", err))?;

    let mut items = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| corrupt("bad TAR member", err))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let raw = entry
            .path()
            .map_err(|err| corrupt("bad TAR member name", err))?
            .to_string_lossy()
            .into_owned();
        let Some(name) = member_name(&raw) else {
            continue;
        };

        budget.admit()?;
        let size = entry.size();
        let content = budget.read(entry, size)?;
        items.push(WorkItem::new(name, content));
    }
    Ok(items)
}

/// Flag in a 7z entry's attributes marking Unix mode bits in the high word.
const UNIX_EXTENSION: u32 = 0x8000;

fn is_7z_symlink(entry: &SevenZArchiveEntry) -> bool {
    let attributes = entry.windows_attributes();
    entry.has_windows_attributes
        && attributes & UNIX_EXTENSION != 0
        && (attributes >> 16) & S_IFMT == S_IFLNK
}

/// File indices in the order the decoder visits them: entries carrying data,
/// folder by folder, then the entries without data.
fn visit_order(archive: &Archive) -> Vec<usize> {
    let folders = &archive.stream_map.file_folder_index;
    let (mut order, empty): (Vec<usize>, Vec<usize>) = (0..archive.files.len())
        .partition(|&index| folders.get(index).is_some_and(Option::is_some));
    order.extend(empty);
    order
}

fn extract_7z(data: &[u8], budget: &mut Budget) -> Result<Vec<WorkItem>> {
    let mut reader = SevenZReader::new(Cursor::new(data), data.len() as u64, Password::empty())
        .map_err(|err| corrupt("bad 7z", err))?;
    let order = visit_order(reader.archive());

    let staging = tempfile::Builder::new().prefix("filigran-7z-").tempdir()?;
    let mut staged: Vec<(usize, String, PathBuf)> = Vec::new();
    let mut visited = 0usize;
    let mut breach: Option<FiligranError> = None;

    let outcome = reader.for_each_entries(|entry, content| {
        let position = order.get(visited).copied().unwrap_or(visited);
        visited += 1;

        let name = if entry.is_directory() || is_7z_symlink(entry) {
            None
        } else {
            member_name(entry.name())
        };
        let Some(name) = name else {
            debug!(name = entry.name(), "Skipping 7z entry");
            // The next entry of a solid block starts where this one ends.
            io::copy(content, &mut io::sink())?;
            return Ok(true);
        };
        if let Err(err) = budget.admit() {
            breach = Some(err);
            return Err(io::Error::other("archive member limit reached").into());
        }

        let path = staging.path().join(position.to_string());
        let mut file = File::create(&path)?;
        let allowance = budget.remaining().saturating_add(1);
        let written = io::copy(&mut Read::take(content, allowance), &mut file)?;
        if let Err(err) = budget.charge(written) {
            breach = Some(err);
            return Err(io::Error::other("archive size limit reached").into());
        }
        staged.push((position, name, path));
        Ok(true)
    });

    if let Some(err) = breach {
        return Err(err);
    }
    outcome.map_err(|err| corrupt("bad 7z", err))?;

    staged.sort_by_key(|(position, ..)| *position);
    let mut items = Vec::with_capacity(staged.len());
    for (_, name, path) in staged {
        let content = std::fs::read(&path)?;
        items.push(WorkItem::new(name, content));
    }
    if let Err(err) = staging.close() {
        warn!(error = %err, "Failed to remove 7z staging directory");
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use crate::pack;

    fn tar_bytes(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        let mut dir = tar::Header::new_gnu();
        dir.set_entry_type(tar::EntryType::Directory);
        dir.set_size(0);
        dir.set_mode(0o755);
        dir.set_cksum();
        builder.append_data(&mut dir, "docs/", io::empty()).unwrap();

        for (name, data) in members {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn names(items: &[WorkItem]) -> Vec<&str> {
        items.iter().map(|item| item.name.as_str()).collect()
    }

    const MEMBERS: &[(&str, &[u8])] = &[
        ("./docs/b.txt", b"second"),
        ("a.txt", b"first"),
        ("docs/c.bin", b"\x00\x01\x02"),
    ];

    #[test]
    fn plain_tar_keeps_listing_order_and_skips_directories() {
        let items = extract(&tar_bytes(MEMBERS), ArchiveFormat::Tar, ArchiveLimits::default()).unwrap();
        assert_eq!(names(&items), ["docs/b.txt", "a.txt", "docs/c.bin"]);
        assert_eq!(&items[2].content[..], b"\x00\x01\x02");
    }

    #[test]
    fn compressed_tars_decode() {
        let tar = tar_bytes(MEMBERS);

        let mut gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        gz.write_all(&tar).unwrap();
        let gz = gz.finish().unwrap();

        let mut bz = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        bz.write_all(&tar).unwrap();
        let bz = bz.finish().unwrap();

        let mut xz = xz2::write::XzEncoder::new(Vec::new(), 6);
        xz.write_all(&tar).unwrap();
        let xz = xz.finish().unwrap();

        for (data, format) in [
            (gz, ArchiveFormat::TarGz),
            (bz, ArchiveFormat::TarBz2),
            (xz, ArchiveFormat::TarXz),
        ] {
            let items = extract(&data, format, ArchiveLimits::default()).unwrap();
            assert_eq!(names(&items), ["docs/b.txt", "a.txt", "docs/c.bin"], "{:?}", format);
        }
    }

    #[test]
    fn zip_round_trips_through_pack() {
        let originals = vec![
            WorkItem::new("z.txt", &b"last letter"[..]),
            WorkItem::new("folder/a.txt", &b"first letter"[..]),
        ];
        let packed = pack::pack(&originals).unwrap();
        let items = extract(&packed, ArchiveFormat::Zip, ArchiveLimits::default()).unwrap();
        assert_eq!(items, originals);
    }

    #[test]
    fn gzip_of_a_non_tar_is_corrupt() {
        let mut gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        gz.write_all(&[b'x'; 2048]).unwrap();
        let gz = gz.finish().unwrap();
        assert!(matches!(
            extract(&gz, ArchiveFormat::TarGz, ArchiveLimits::default()),
            Err(FiligranError::CorruptArchive(_))
        ));
    }

    #[test]
    fn garbage_is_corrupt_for_zip_and_7z() {
        let garbage = b"this is not an archive at all, just some text".to_vec();
        for format in [ArchiveFormat::Zip, ArchiveFormat::SevenZip] {
            assert!(
                matches!(
                    extract(&garbage, format, ArchiveLimits::default()),
                    Err(FiligranError::CorruptArchive(_))
                ),
                "{:?}",
                format
            );
        }
    }

    #[test]
    fn member_limit_trips() {
        let limits = ArchiveLimits {
            max_entries: 2,
            max_total_bytes: 1 << 20,
        };
        assert!(matches!(
            extract(&tar_bytes(MEMBERS), ArchiveFormat::Tar, limits),
            Err(FiligranError::ArchiveTooLarge(_))
        ));
    }

    #[test]
    fn byte_limit_trips() {
        let limits = ArchiveLimits {
            max_entries: 100,
            max_total_bytes: 8,
        };
        assert!(matches!(
            extract(&tar_bytes(MEMBERS), ArchiveFormat::Tar, limits),
            Err(FiligranError::ArchiveTooLarge(_))
        ));
    }

    enum Entry<'a> {
        File(&'a str, &'a [u8]),
        NoData(&'a str),
        Dir(&'a str),
        Link(&'a str, &'a str),
    }

    fn seven_zip(entries: &[Entry<'_>]) -> Vec<u8> {
        let mut writer = sevenz_rust::SevenZWriter::new(Cursor::new(Vec::new())).unwrap();
        for member in entries {
            let mut entry = SevenZArchiveEntry::new();
            match member {
                Entry::File(name, data) => {
                    entry.name = name.to_string();
                    writer.push_archive_entry(entry, Some(*data)).unwrap();
                }
                Entry::NoData(name) => {
                    entry.name = name.to_string();
                    writer.push_archive_entry::<&[u8]>(entry, None).unwrap();
                }
                Entry::Dir(name) => {
                    entry.name = name.to_string();
                    entry.is_directory = true;
                    writer.push_archive_entry::<&[u8]>(entry, None).unwrap();
                }
                Entry::Link(name, target) => {
                    entry.name = name.to_string();
                    mark_symlink(&mut entry);
                    writer.push_archive_entry(entry, Some(target.as_bytes())).unwrap();
                }
            }
        }
        writer.finish().unwrap().into_inner()
    }

    fn mark_symlink(entry: &mut SevenZArchiveEntry) {
        entry.has_windows_attributes = true;
        entry.windows_attributes = ((S_IFLNK | 0o777) << 16) | UNIX_EXTENSION;
    }

    fn contents(items: &[WorkItem]) -> Vec<(&str, &[u8])> {
        items
            .iter()
            .map(|item| (item.name.as_str(), &item.content[..]))
            .collect()
    }

    #[test]
    fn seven_zip_keeps_listing_order_and_skips_directories() {
        let archive = seven_zip(&[
            Entry::Dir("docs"),
            Entry::File("docs/b.txt", b"second"),
            Entry::File("empty.txt", b""),
            Entry::File("a.txt", b"first"),
        ]);
        let items = extract(&archive, ArchiveFormat::SevenZip, ArchiveLimits::default()).unwrap();
        assert_eq!(
            contents(&items),
            [
                ("docs/b.txt", &b"second"[..]),
                ("empty.txt", &b""[..]),
                ("a.txt", &b"first"[..]),
            ]
        );
    }

    #[test]
    fn seven_zip_entries_without_data_keep_their_place() {
        let archive = seven_zip(&[
            Entry::File("one.txt", b"1"),
            Entry::NoData("blank.txt"),
            Entry::File("two.txt", b"2"),
        ]);
        let items = extract(&archive, ArchiveFormat::SevenZip, ArchiveLimits::default()).unwrap();
        assert_eq!(names(&items), ["one.txt", "blank.txt", "two.txt"]);
        assert!(items[1].is_empty());
    }

    #[test]
    fn seven_zip_symlinks_are_skipped() {
        let archive = seven_zip(&[
            Entry::File("a.txt", b"first"),
            Entry::Link("latest.txt", "a.txt"),
            Entry::File("b.txt", b"second"),
        ]);
        let items = extract(&archive, ArchiveFormat::SevenZip, ArchiveLimits::default()).unwrap();
        assert_eq!(
            contents(&items),
            [("a.txt", &b"first"[..]), ("b.txt", &b"second"[..])]
        );
    }

    #[test]
    fn seven_zip_skipped_entry_in_a_solid_block_is_drained() {
        let mut entries = Vec::new();
        for name in ["a.txt", "latest.txt", "b.txt"] {
            let mut entry = SevenZArchiveEntry::new();
            entry.name = name.to_string();
            entry.has_stream = true;
            if name == "latest.txt" {
                mark_symlink(&mut entry);
            }
            entries.push(entry);
        }
        let readers: Vec<sevenz_rust::SourceReader<&[u8]>> = vec![
            b"first".as_slice().into(),
            b"a.txt".as_slice().into(),
            b"second".as_slice().into(),
        ];

        let mut writer = sevenz_rust::SevenZWriter::new(Cursor::new(Vec::new())).unwrap();
        writer
            .push_archive_entries(entries, sevenz_rust::SeqReader::new(readers))
            .unwrap();
        let archive = writer.finish().unwrap().into_inner();

        let items = extract(&archive, ArchiveFormat::SevenZip, ArchiveLimits::default()).unwrap();
        assert_eq!(
            contents(&items),
            [("a.txt", &b"first"[..]), ("b.txt", &b"second"[..])]
        );
    }

    #[test]
    fn seven_zip_byte_limit_trips() {
        let archive = seven_zip(&[
            Entry::File("a.txt", &[b'a'; 40]),
            Entry::File("b.txt", &[b'b'; 40]),
        ]);
        let limits = ArchiveLimits {
            max_entries: 100,
            max_total_bytes: 50,
        };
        assert!(matches!(
            extract(&archive, ArchiveFormat::SevenZip, limits),
            Err(FiligranError::ArchiveTooLarge(_))
        ));
    }

    #[test]
    fn seven_zip_member_limit_trips() {
        let archive = seven_zip(&[Entry::File("a.txt", b"a"), Entry::File("b.txt", b"b")]);
        let limits = ArchiveLimits {
            max_entries: 1,
            max_total_bytes: 1 << 20,
        };
        assert!(matches!(
            extract(&archive, ArchiveFormat::SevenZip, limits),
            Err(FiligranError::ArchiveTooLarge(_))
        ));
    }

    #[test]
    fn member_names_are_normalised() {
        assert_eq!(member_name("./a/b.txt").as_deref(), Some("a/b.txt"));
        assert_eq!(member_name("/abs.txt").as_deref(), Some("abs.txt"));
        assert_eq!(member_name("win\\path.pdf").as_deref(), Some("win/path.pdf"));
        assert_eq!(member_name("./"), None);
    }
}
