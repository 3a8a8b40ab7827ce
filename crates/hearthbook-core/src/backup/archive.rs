//! Bundle packing and unpacking
//!
//! A backup bundle is a zip archive carrying the store file under a
//! fixed entry name plus, optionally, a dated snapshot of the
//! environment configuration.

use crate::error::{Error, Result};
use chrono::NaiveDate;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Entry name of the store file inside a bundle.
pub const STORE_ENTRY_NAME: &str = "hearthbook.db";

/// Suffix marking the configuration snapshot entry.
pub const CONFIG_ENTRY_SUFFIX: &str = ".backup.env";

/// File extension of backup bundles.
pub const BUNDLE_EXTENSION: &str = ".zip";

/// Contents recovered from a backup bundle.
#[derive(Debug)]
pub struct BundleContents {
    /// Raw bytes of the bundled store file.
    pub store: Vec<u8>,
    /// Configuration snapshot text, when the bundle carries one.
    pub config: Option<String>,
}

/// Pack store bytes and an optional configuration snapshot into a bundle.
///
/// The config entry is named with the given date so a bundle inspected
/// by hand shows when its snapshot was taken.
pub fn pack_bundle(store: &[u8], config: Option<&str>, stamp: NaiveDate) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(6));

    zip.start_file(STORE_ENTRY_NAME, options)?;
    zip.write_all(store)?;

    if let Some(config) = config {
        let entry = format!("{}{}", stamp, CONFIG_ENTRY_SUFFIX);
        zip.start_file(entry.as_str(), options)?;
        zip.write_all(config.as_bytes())?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

/// Unpack a bundle into store bytes and an optional config snapshot.
///
/// The store entry is located by its fixed name; the config entry is the
/// first entry in archive order whose name ends with the snapshot
/// suffix. Entry names are case-sensitive. Unrelated entries are
/// ignored, so hand-built bundles with extra files still restore.
pub fn unpack_bundle(bytes: &[u8]) -> Result<BundleContents> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| Error::MalformedArchive {
            reason: e.to_string(),
        })?;

    let store = {
        let mut entry = match archive.by_name(STORE_ENTRY_NAME) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => return Err(Error::MissingStoreEntry),
            Err(e) => {
                return Err(Error::MalformedArchive {
                    reason: e.to_string(),
                })
            }
        };
        let mut store = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut store)
            .map_err(|e| Error::MalformedArchive {
                reason: format!("store entry is unreadable: {}", e),
            })?;
        store
    };

    let mut config = None;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if !entry.name().ends_with(CONFIG_ENTRY_SUFFIX) {
            continue;
        }
        let name = entry.name().to_string();
        let mut raw = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut raw)
            .map_err(|e| Error::MalformedArchive {
                reason: format!("config entry {} is unreadable: {}", name, e),
            })?;
        let text = String::from_utf8(raw).map_err(|_| Error::MalformedArchive {
            reason: format!("config entry {} is not valid UTF-8", name),
        })?;
        config = Some(text);
        break;
    }

    Ok(BundleContents { store, config })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).expect("valid date")
    }

    fn store_bytes() -> Vec<u8> {
        let mut bytes = b"SQLite format 3\0".to_vec();
        bytes.extend_from_slice(b"pretend page data");
        bytes
    }

    #[test]
    fn test_round_trip_with_config() {
        let bundle = pack_bundle(&store_bytes(), Some("KEY=value\n"), stamp())
            .expect("Failed to pack bundle");
        let contents = unpack_bundle(&bundle).expect("Failed to unpack bundle");
        assert_eq!(contents.store, store_bytes());
        assert_eq!(contents.config.as_deref(), Some("KEY=value\n"));
    }

    #[test]
    fn test_round_trip_without_config() {
        let bundle = pack_bundle(&store_bytes(), None, stamp()).expect("Failed to pack bundle");
        let contents = unpack_bundle(&bundle).expect("Failed to unpack bundle");
        assert_eq!(contents.store, store_bytes());
        assert!(contents.config.is_none());
    }

    #[test]
    fn test_config_entry_is_dated() {
        let bundle = pack_bundle(&store_bytes(), Some("KEY=value\n"), stamp())
            .expect("Failed to pack bundle");
        let archive = ZipArchive::new(Cursor::new(bundle.as_slice())).expect("Failed to open");
        let names: Vec<&str> = archive.file_names().collect();
        assert!(names.contains(&"2026-03-14.backup.env"));
        assert!(names.contains(&STORE_ENTRY_NAME));
    }

    #[test]
    fn test_unpack_rejects_non_archive_bytes() {
        assert!(matches!(
            unpack_bundle(b"this is not an archive"),
            Err(Error::MalformedArchive { .. })
        ));
    }

    #[test]
    fn test_unpack_requires_the_store_entry() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        zip.start_file("notes.txt", options).expect("Failed to start entry");
        zip.write_all(b"no store here").expect("Failed to write entry");
        let bundle = zip.finish().expect("Failed to finish").into_inner();

        assert!(matches!(
            unpack_bundle(&bundle),
            Err(Error::MissingStoreEntry)
        ));
    }

    #[test]
    fn test_store_entry_name_is_case_sensitive() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        zip.start_file("HEARTHBOOK.DB", options).expect("Failed to start entry");
        zip.write_all(&store_bytes()).expect("Failed to write entry");
        let bundle = zip.finish().expect("Failed to finish").into_inner();

        assert!(matches!(
            unpack_bundle(&bundle),
            Err(Error::MissingStoreEntry)
        ));
    }

    #[test]
    fn test_first_config_entry_wins() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        zip.start_file(STORE_ENTRY_NAME, options).expect("Failed to start entry");
        zip.write_all(&store_bytes()).expect("Failed to write entry");
        zip.start_file("2026-01-01.backup.env", options).expect("Failed to start entry");
        zip.write_all(b"FIRST=1\n").expect("Failed to write entry");
        zip.start_file("2026-01-02.backup.env", options).expect("Failed to start entry");
        zip.write_all(b"SECOND=2\n").expect("Failed to write entry");
        let bundle = zip.finish().expect("Failed to finish").into_inner();

        let contents = unpack_bundle(&bundle).expect("Failed to unpack bundle");
        assert_eq!(contents.config.as_deref(), Some("FIRST=1\n"));
    }

    #[test]
    fn test_unrelated_entries_are_ignored() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        zip.start_file("README.txt", options).expect("Failed to start entry");
        zip.write_all(b"about this backup").expect("Failed to write entry");
        zip.start_file(STORE_ENTRY_NAME, options).expect("Failed to start entry");
        zip.write_all(&store_bytes()).expect("Failed to write entry");
        let bundle = zip.finish().expect("Failed to finish").into_inner();

        let contents = unpack_bundle(&bundle).expect("Failed to unpack bundle");
        assert_eq!(contents.store, store_bytes());
        assert!(contents.config.is_none());
    }

    #[test]
    fn test_unpack_rejects_non_utf8_config() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        zip.start_file(STORE_ENTRY_NAME, options).expect("Failed to start entry");
        zip.write_all(&store_bytes()).expect("Failed to write entry");
        zip.start_file("2026-01-01.backup.env", options).expect("Failed to start entry");
        zip.write_all(&[0xff, 0xfe, 0x00, 0x01]).expect("Failed to write entry");
        let bundle = zip.finish().expect("Failed to finish").into_inner();

        assert!(matches!(
            unpack_bundle(&bundle),
            Err(Error::MalformedArchive { .. })
        ));
    }
}
