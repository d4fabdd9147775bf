//! ODS container handling
//!
//! Reading goes through [`TemplateArchive`]. Writing always produces a fresh
//! archive: a stored `mimetype` first, then the template's entries in order,
//! with the document body replaced, chart sub-documents and the manifest
//! rewritten, and the stale binary previews dropped. Untouched entries are
//! raw-copied so their compressed bytes and headers survive unchanged.

use crate::error::ReportError;
use crate::report::xml::{Document, Element};
use crate::util::fs::PartialFile;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

pub const MIMETYPE: &str = "application/vnd.oasis.opendocument.spreadsheet";
pub const CONTENT_XML: &str = "content.xml";
pub const MANIFEST_XML: &str = "META-INF/manifest.xml";

/// Name of the scratch table LibreOffice embeds in chart objects
const LOCAL_TABLE: &str = "local-table";

/// Binary previews that go stale once the data changes
fn is_preview(name: &str) -> bool {
    name.contains("Thumbnails") || name.contains("ObjectReplacement")
}

fn is_directory(name: &str) -> bool {
    name.ends_with('/') || name.ends_with('\\')
}

/// `Object N/content.xml`
fn is_chart_body(name: &str) -> bool {
    name.starts_with("Object") && name.ends_with(CONTENT_XML)
}

/// Entry counts of a written archive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    /// Entries re-encoded from a modified tree
    pub rewritten: usize,
    /// Entries copied byte-for-byte
    pub copied: usize,
    /// Previews, directories and the template's own mimetype
    pub dropped: usize,
    /// Chart scratch tables removed
    pub local_tables_removed: usize,
}

/// An ODS file opened for reading
pub struct TemplateArchive {
    path: PathBuf,
    archive: ZipArchive<BufReader<File>>,
}

impl TemplateArchive {
    pub fn open(path: &Path) -> Result<Self, ReportError> {
        let file = File::open(path)?;
        let archive = ZipArchive::new(BufReader::new(file))?;
        Ok(Self {
            path: path.to_path_buf(),
            archive,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Text of entry `name`, or `None` if the archive has no such entry
    pub fn read_text(&mut self, name: &str) -> Result<Option<String>, ReportError> {
        let mut entry = match self.archive.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut text = String::new();
        entry.read_to_string(&mut text)?;
        Ok(Some(text))
    }

    /// The document body (`content.xml`)
    pub fn document_body(&mut self) -> Result<String, ReportError> {
        self.read_text(CONTENT_XML)?
            .ok_or_else(|| ReportError::MissingDocumentBody(self.path.clone()))
    }

    /// Write a new archive at `dest` with `content_xml` as the document body
    ///
    /// `edit_chart` is called on every chart sub-document after its scratch
    /// table has been removed. An existing `dest` is replaced; on error no
    /// file is left at `dest`.
    pub fn write_to<F>(&mut self, dest: &Path, content_xml: &str, mut edit_chart: F) -> Result<ArchiveStats, ReportError>
    where
        F: FnMut(&str, &mut Document) -> Result<(), ReportError>,
    {
        let (guard, file) = PartialFile::create(dest).map_err(|source| ReportError::DestinationUnwritable {
            path: dest.to_path_buf(),
            source,
        })?;
        let mut zip = ZipWriter::new(BufWriter::new(file));

        let fixed_time = DateTime::default();
        let stored = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .last_modified_time(fixed_time);
        let deflated = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(fixed_time);

        zip.start_file("mimetype", stored)?;
        zip.write_all(MIMETYPE.as_bytes())?;

        let mut stats = ArchiveStats::default();
        for i in 0..self.archive.len() {
            let name = self.archive.by_index_raw(i)?.name().to_string();

            if name == "mimetype" || is_directory(&name) || is_preview(&name) {
                debug!(entry = %name, "dropping entry");
                stats.dropped += 1;
                continue;
            }

            let rewritten = if name == CONTENT_XML {
                content_xml.to_string()
            } else if name == MANIFEST_XML {
                let mut doc = self.parse_entry(i, &name)?;
                let removed = doc.root_mut().remove_all(&|e: &Element| {
                    e.is("manifest:file-entry")
                        && e.attr("manifest:full-path").map_or(false, |p| is_preview(&p))
                });
                debug!(removed, "manifest entries filtered");
                doc.to_xml_string()
            } else if is_chart_body(&name) {
                let mut doc = self.parse_entry(i, &name)?;
                stats.local_tables_removed += doc
                    .root_mut()
                    .remove_all(&|e: &Element| e.matches("table:table", "table:name", LOCAL_TABLE));
                edit_chart(&name, &mut doc)?;
                doc.to_xml_string()
            } else {
                zip.raw_copy_file(self.archive.by_index_raw(i)?)?;
                stats.copied += 1;
                continue;
            };

            zip.start_file(name.as_str(), deflated)?;
            zip.write_all(rewritten.as_bytes())?;
            stats.rewritten += 1;
        }

        let mut out = zip.finish()?;
        out.flush()?;
        drop(out);
        guard.commit();

        debug!(
            dest = %dest.display(),
            rewritten = stats.rewritten,
            copied = stats.copied,
            dropped = stats.dropped,
            "archive written"
        );
        Ok(stats)
    }

    fn parse_entry(&mut self, index: usize, name: &str) -> Result<Document, ReportError> {
        let mut text = String::new();
        self.archive.by_index(index)?.read_to_string(&mut text)?;
        Document::parse(&text, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures;
    use tempfile::TempDir;

    #[test]
    fn test_read_text() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("t.ods");
        fixtures::build_template(&template, fixtures::CONTENT);

        let mut archive = TemplateArchive::open(&template).unwrap();
        assert!(archive.document_body().unwrap().contains("table:name=\"Tests\""));
        assert!(archive.read_text("nope.xml").unwrap().is_none());
    }

    #[test]
    fn test_copy_layout() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("t.ods");
        let dest = dir.path().join("out.ods");
        fixtures::build_template(&template, fixtures::CONTENT);

        let mut archive = TemplateArchive::open(&template).unwrap();
        let body = archive.document_body().unwrap();
        let stats = archive.write_to(&dest, &body, |_, _| Ok(())).unwrap();

        // template mimetype, Object 1/ directory, thumbnail, replacement image
        assert_eq!(stats.dropped, 4);
        assert_eq!(stats.rewritten, 3);
        assert_eq!(stats.copied, 2);
        assert_eq!(stats.local_tables_removed, 1);

        let names = fixtures::entry_names(&dest);
        assert_eq!(names[0], "mimetype");
        assert!(!names.iter().any(|n| is_preview(n) || is_directory(n)));
        assert_eq!(names.iter().filter(|n| *n == "mimetype").count(), 1);
    }

    #[test]
    fn test_mimetype_is_stored_first() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("t.ods");
        let dest = dir.path().join("out.ods");
        fixtures::build_template(&template, fixtures::CONTENT);
        let mut archive = TemplateArchive::open(&template).unwrap();
        archive.write_to(&dest, "<x/>", |_, _| Ok(())).unwrap();

        let mut out = ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        let mut first = out.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), CompressionMethod::Stored);
        let mut text = String::new();
        first.read_to_string(&mut text).unwrap();
        assert_eq!(text, MIMETYPE);

        // the raw zip starts with the local header of the mimetype entry
        let bytes = std::fs::read(&dest).unwrap();
        assert_eq!(&bytes[30..38], b"mimetype");
        assert_eq!(&bytes[38..38 + MIMETYPE.len()], MIMETYPE.as_bytes());
    }

    #[test]
    fn test_manifest_filtered() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("t.ods");
        let dest = dir.path().join("out.ods");
        fixtures::build_template(&template, fixtures::CONTENT);
        let mut archive = TemplateArchive::open(&template).unwrap();
        archive.write_to(&dest, "<x/>", |_, _| Ok(())).unwrap();

        let manifest = fixtures::read_entry(&dest, MANIFEST_XML).unwrap();
        assert!(!manifest.contains("Thumbnails"));
        assert!(!manifest.contains("ObjectReplacement"));
        assert!(manifest.contains("manifest:full-path=\"Object 1/content.xml\""));
    }

    #[test]
    fn test_failed_chart_edit_leaves_no_destination() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("t.ods");
        let dest = dir.path().join("out.ods");
        fixtures::build_template(&template, fixtures::CONTENT);
        std::fs::write(&dest, "previous report").unwrap();

        let mut archive = TemplateArchive::open(&template).unwrap();
        let err = archive
            .write_to(&dest, "<x/>", |name, _| Err(ReportError::xml(name, "boom")))
            .unwrap_err();
        assert!(matches!(err, ReportError::Xml { .. }));
        assert!(!dest.exists());
    }

    #[test]
    fn test_unwritable_destination() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("t.ods");
        fixtures::build_template(&template, fixtures::CONTENT);
        let mut archive = TemplateArchive::open(&template).unwrap();
        let dest = dir.path().join("missing-dir").join("out.ods");
        let err = archive.write_to(&dest, "<x/>", |_, _| Ok(())).unwrap_err();
        assert!(matches!(err, ReportError::DestinationUnwritable { .. }));
    }
}
