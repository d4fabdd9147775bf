//! Template patching
//!
//! Substitutes CSV data into the template's named tables, fills in the device
//! placeholders, and writes the final report archive.

use crate::config::{ReportContext, SeriesTable};
use crate::error::ReportError;
use crate::report::archive::{TemplateArchive, CONTENT_XML};
use crate::report::table::{read_table_csv, table_from_csv};
use crate::report::xml::{Document, Element};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Replace table `table` with the contents of `csv`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSubstitution {
    pub table: String,
    pub csv: PathBuf,
}

/// Everything to change in the template, applied in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchPlan {
    pub substitutions: Vec<TableSubstitution>,
    pub placeholders: Vec<(String, String)>,
}

impl PatchPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: impl Into<String>, csv: impl Into<PathBuf>) -> Self {
        self.substitutions.push(TableSubstitution {
            table: table.into(),
            csv: csv.into(),
        });
        self
    }

    pub fn with_placeholder(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.placeholders.push((key.into(), value.into()));
        self
    }

    /// Standard report tables for a details directory
    ///
    /// `Tests` and `Timeseries` are always substituted. The latency series
    /// tables are included when their CSVs exist, and `Exceedance` when
    /// `include_exceedance` is set and its CSV exists (json+ runs only).
    pub fn for_context(ctx: &ReportContext, include_exceedance: bool) -> Self {
        let mut plan = Self::new().with_table("Tests", ctx.tests_csv());

        for table in SeriesTable::ALL {
            let csv = ctx.series_csv(table);
            if table == SeriesTable::Iops || csv.exists() {
                plan = plan.with_table(table.table_name(), csv);
            } else {
                debug!(table = table.table_name(), csv = %csv.display(), "series CSV absent, table left as is");
            }
        }

        let exceedance = ctx.exceedance_csv();
        if include_exceedance && exceedance.exists() {
            plan = plan.with_table("Exceedance", exceedance);
        }

        plan.placeholders = ctx.device.placeholders();
        plan
    }
}

/// What a patch run changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchSummary {
    pub tables_replaced: Vec<String>,
    /// Substitutions whose target table is not in the template
    pub tables_missing: Vec<String>,
    pub placeholders_replaced: usize,
    pub images_removed: usize,
    pub local_tables_removed: usize,
    pub entries_copied: usize,
    pub entries_dropped: usize,
}

/// Apply `plan` to `template` and write the result to `dest`
///
/// All inputs are read and the new document body is built before `dest` is
/// touched, so a missing body or CSV leaves any existing `dest` alone.
pub fn patch_report(template: &Path, dest: &Path, plan: &PatchPlan) -> Result<PatchSummary, ReportError> {
    let mut archive = TemplateArchive::open(template)?;
    let body = archive.document_body()?;
    let mut doc = Document::parse(&body, CONTENT_XML)?;
    let calcext = doc.declares_prefix("calcext");

    let mut summary = PatchSummary::default();
    for sub in &plan.substitutions {
        let csv = read_table_csv(&sub.table, &sub.csv)?;
        let table = table_from_csv(&sub.table, &csv, calcext);
        let rows = table.children.len().saturating_sub(1);

        let target = |e: &Element| e.matches("table:table", "table:name", &sub.table);
        match doc.root_mut().replace_first(&target, table) {
            Ok(()) => {
                debug!(table = %sub.table, rows, "table replaced");
                summary.tables_replaced.push(sub.table.clone());
            }
            Err(_) => {
                warn!(table = %sub.table, template = %template.display(), "table not found in template");
                summary.tables_missing.push(sub.table.clone());
            }
        }
    }

    for (key, value) in &plan.placeholders {
        summary.placeholders_replaced += doc.root_mut().replace_in_text(key, value);
    }

    summary.images_removed = doc.root_mut().remove_all(&|e: &Element| e.is("draw:image"));

    let stats = archive.write_to(dest, &doc.to_xml_string(), |_, _| Ok(()))?;
    summary.local_tables_removed = stats.local_tables_removed;
    summary.entries_copied = stats.copied;
    summary.entries_dropped = stats.dropped;

    info!(
        dest = %dest.display(),
        tables = summary.tables_replaced.len(),
        missing = summary.tables_missing.len(),
        "report written"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures;
    use std::fs;
    use tempfile::TempDir;

    struct Setup {
        dir: TempDir,
        template: PathBuf,
        dest: PathBuf,
        tests_csv: PathBuf,
    }

    fn setup() -> Setup {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("original.ods");
        fixtures::build_template(&template, fixtures::CONTENT);
        let tests_csv = dir.path().join("tests.csv");
        fs::write(&tests_csv, "Type,IOPS\nRand,1500.5\n").unwrap();
        let dest = dir.path().join("report.ods");
        Setup { dir, template, dest, tests_csv }
    }

    fn plan(s: &Setup) -> PatchPlan {
        PatchPlan::new()
            .with_table("Tests", &s.tests_csv)
            .with_placeholder("_DRIVE", "/dev/nvme0n1")
            .with_placeholder("_TESTCAP", "100")
    }

    #[test]
    fn test_table_round_trip() {
        let s = setup();
        let summary = patch_report(&s.template, &s.dest, &plan(&s)).unwrap();
        assert_eq!(summary.tables_replaced, vec!["Tests".to_string()]);

        let body = fixtures::read_entry(&s.dest, CONTENT_XML).unwrap();
        let doc = Document::parse(&body, CONTENT_XML).unwrap();
        let table = doc
            .root()
            .find(&|e: &Element| e.matches("table:table", "table:name", "Tests"))
            .unwrap();
        assert_eq!(table.attr("table:style-name").as_deref(), Some("ta1"));

        let cells: Vec<&Element> = table
            .child_elements()
            .filter(|e| e.is("table:table-row"))
            .flat_map(|r| r.child_elements())
            .collect();
        assert_eq!(cells.len(), 4);
        assert_eq!(cells[2].attr("office:value-type").as_deref(), Some("string"));
        assert_eq!(cells[3].attr("office:value-type").as_deref(), Some("float"));
        assert_eq!(cells[3].attr("office:value").as_deref(), Some("1500.5"));
        // the fixture declares calcext
        assert_eq!(cells[3].attr("calcext:value-type").as_deref(), Some("float"));
    }

    #[test]
    fn test_placeholders_and_images() {
        let s = setup();
        let summary = patch_report(&s.template, &s.dest, &plan(&s)).unwrap();
        assert_eq!(summary.images_removed, 1);
        assert_eq!(summary.placeholders_replaced, 2);

        let body = fixtures::read_entry(&s.dest, CONTENT_XML).unwrap();
        assert!(body.contains("Drive /dev/nvme0n1, 100 GiB tested"));
        assert!(!body.contains("_DRIVE"));
        assert!(!body.contains("draw:image"));
        assert!(body.contains("<draw:object"));
    }

    #[test]
    fn test_chart_scratch_table_removed() {
        let s = setup();
        let summary = patch_report(&s.template, &s.dest, &plan(&s)).unwrap();
        assert_eq!(summary.local_tables_removed, 1);

        let chart = fixtures::read_entry(&s.dest, "Object 1/content.xml").unwrap();
        assert!(!chart.contains("local-table"));
        assert!(chart.contains("<chart:series"));
    }

    #[test]
    fn test_previews_removed() {
        let s = setup();
        patch_report(&s.template, &s.dest, &plan(&s)).unwrap();
        let names = fixtures::entry_names(&s.dest);
        assert_eq!(names[0], "mimetype");
        assert!(!names.iter().any(|n| n.contains("Thumbnails") || n.contains("ObjectReplacement")));
        assert!(names.contains(&"styles.xml".to_string()));
    }

    #[test]
    fn test_output_is_idempotent() {
        let s = setup();
        let second = s.dir.path().join("again.ods");
        patch_report(&s.template, &s.dest, &plan(&s)).unwrap();
        patch_report(&s.template, &second, &plan(&s)).unwrap();
        assert_eq!(fs::read(&s.dest).unwrap(), fs::read(&second).unwrap());

        // overwriting an existing report gives the same bytes too
        patch_report(&s.template, &s.dest, &plan(&s)).unwrap();
        assert_eq!(fs::read(&s.dest).unwrap(), fs::read(&second).unwrap());
    }

    #[test]
    fn test_missing_table_is_not_fatal() {
        let s = setup();
        let plan = plan(&s).with_table("Nowhere", &s.tests_csv);
        let summary = patch_report(&s.template, &s.dest, &plan).unwrap();
        assert_eq!(summary.tables_missing, vec!["Nowhere".to_string()]);
        assert!(s.dest.exists());
    }

    #[test]
    fn test_missing_csv_is_fatal() {
        let s = setup();
        let plan = plan(&s).with_table("Timeseries", s.dir.path().join("absent.csv"));
        let err = patch_report(&s.template, &s.dest, &plan).unwrap_err();
        assert!(matches!(err, ReportError::TableSource { .. }));
        assert!(!s.dest.exists());
    }

    #[test]
    fn test_missing_body_leaves_no_destination() {
        let s = setup();
        let bare = s.dir.path().join("bare.ods");
        fixtures::build_archive(&bare, &[("styles.xml", "<x/>")]);

        let err = patch_report(&bare, &s.dest, &plan(&s)).unwrap_err();
        assert!(matches!(err, ReportError::MissingDocumentBody(_)));
        assert!(!s.dest.exists());
    }

    #[test]
    fn test_plan_for_context() {
        let dir = TempDir::new().unwrap();
        let mut ctx = ReportContext::default();
        ctx.paths.details_dir = dir.path().to_path_buf();

        let plan = PatchPlan::for_context(&ctx, true);
        let tables: Vec<&str> = plan.substitutions.iter().map(|s| s.table.as_str()).collect();
        assert_eq!(tables, vec!["Tests", "Timeseries"]);
        assert_eq!(plan.placeholders.len(), 6);

        fs::write(ctx.series_csv(SeriesTable::Clat), "").unwrap();
        fs::write(ctx.exceedance_csv(), "").unwrap();
        let plan = PatchPlan::for_context(&ctx, true);
        let tables: Vec<&str> = plan.substitutions.iter().map(|s| s.table.as_str()).collect();
        assert_eq!(tables, vec!["Tests", "Timeseries", "TimeseriesCLAT", "Exceedance"]);

        let plan = PatchPlan::for_context(&ctx, false);
        assert!(!plan.substitutions.iter().any(|s| s.table == "Exceedance"));
    }
}
