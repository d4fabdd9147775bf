//! Adding a second report's dataset to an existing report
//!
//! The appended report's data tables are copied in under suffixed names and
//! every chart gets one more series pointing at the copies, drawn in its own
//! color.

use crate::error::ReportError;
use crate::report::archive::{TemplateArchive, CONTENT_XML};
use crate::report::xml::{Document, Element, Node};
use quick_xml::escape::escape;
use std::path::Path;
use tracing::{debug, info, warn};

/// Tables that make up one dataset
pub const DATASET_TABLES: [&str; 5] = ["Tests", "Timeseries", "TimeseriesCLAT", "TimeseriesSLAT", "Exceedance"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendSummary {
    pub tables_added: Vec<String>,
    pub series_added: usize,
    pub legends_added: usize,
}

/// Merge the dataset of `appended` into `source`, writing `dest`
///
/// `suffix` is appended to the copied table names and used as the new series
/// label; `color` is a six-digit hex color without `#`.
pub fn append_dataset(
    source: &Path,
    appended: &Path,
    suffix: &str,
    color: &str,
    dest: &Path,
) -> Result<AppendSummary, ReportError> {
    let mut archive = TemplateArchive::open(source)?;
    let mut doc = Document::parse(&archive.document_body()?, CONTENT_XML)?;
    let extra = Document::parse(&TemplateArchive::open(appended)?.document_body()?, CONTENT_XML)?;

    let mut summary = AppendSummary::default();
    let spreadsheet = doc
        .root_mut()
        .find_named_mut("office:spreadsheet")
        .ok_or_else(|| ReportError::xml(CONTENT_XML, "no office:spreadsheet element"))?;

    for name in DATASET_TABLES {
        let Some(table) = extra.root().find(&|e: &Element| e.matches("table:table", "table:name", name)) else {
            debug!(table = name, "table not in appended report");
            continue;
        };
        let renamed = format!("{}{}", name, suffix);
        let mut copy = table.clone();
        copy.set_attr("table:name", &renamed);
        spreadsheet.insert_before_child("table:named-expressions", Node::Element(copy));
        summary.tables_added.push(renamed);
    }

    if summary.tables_added.is_empty() {
        warn!(appended = %appended.display(), "appended report has no dataset tables");
    }

    archive.write_to(dest, &doc.to_xml_string(), |entry, chart| {
        let added = add_series(chart.root_mut(), suffix, color);
        if added.series {
            summary.series_added += 1;
        }
        if added.legend {
            summary.legends_added += 1;
        }
        debug!(entry, series = added.series, legend = added.legend, "chart updated");
        Ok(())
    })?;

    info!(
        dest = %dest.display(),
        tables = summary.tables_added.len(),
        series = summary.series_added,
        "dataset appended"
    );
    Ok(summary)
}

struct ChartEdit {
    series: bool,
    legend: bool,
}

/// Clone the chart's first series onto the suffixed tables
fn add_series(root: &mut Element, suffix: &str, color: &str) -> ChartEdit {
    let Some(first) = root.find_named("chart:series").cloned() else {
        return ChartEdit { series: false, legend: false };
    };

    let mut series = first;
    series.visit_mut(&mut |e: &mut Element| {
        for (_, value) in &mut e.attrs {
            *value = rename_sheet_refs(value, suffix);
        }
    });
    series.set_attr("loext:label-string", suffix);

    if let Some(style) = series.attr("chart:style-name").map(|s| s.into_owned()) {
        let new_style = format!("{}{}", style, suffix);
        series.set_attr("chart:style-name", &new_style);
        add_series_style(root, &style, &new_style, color);
    }

    if let Some(parent) = root.find_mut(&|e: &Element| e.child_elements().any(|c| c.is("chart:series"))) {
        insert_after_last(parent, "chart:series", Node::Element(series));
    }

    let legend = root.find_named("chart:legend").is_none() && add_legend(root);
    ChartEdit { series: true, legend }
}

/// Copy automatic style `style` as `new_style` with a different line color
fn add_series_style(root: &mut Element, style: &str, new_style: &str, color: &str) {
    let is_style = |e: &Element| e.matches("style:style", "style:name", style);
    let Some(parent) = root.find_mut(&|e: &Element| e.child_elements().any(is_style)) else {
        warn!(style, "series style not found");
        return;
    };
    let Some(at) = parent
        .children
        .iter()
        .position(|c| matches!(c, Node::Element(e) if is_style(e)))
    else {
        return;
    };
    let Node::Element(original) = &parent.children[at] else {
        return;
    };

    let mut copy = original.clone();
    copy.set_attr("style:name", new_style);
    let stroke = format!("#{}", color);
    match copy.find_named_mut("style:graphic-properties") {
        Some(props) => props.set_attr("svg:stroke-color", &stroke),
        None => copy.children.push(Node::Element(
            Element::new("style:graphic-properties").with_attr("svg:stroke-color", &stroke),
        )),
    }
    parent.children.insert(at + 1, Node::Element(copy));
}

/// Put a default legend after the chart title
fn add_legend(root: &mut Element) -> bool {
    let Some(parent) = root.find_mut(&|e: &Element| e.child_elements().any(|c| c.is("chart:title"))) else {
        return false;
    };
    let legend = Element::new("chart:legend")
        .with_attr("chart:legend-position", "bottom")
        .with_attr("svg:x", "0.000cm")
        .with_attr("svg:y", "0.000cm")
        .with_attr("style:legend-expansion", "wide")
        .with_attr("chart:style-name", "ch3");
    insert_after_last(parent, "chart:title", Node::Element(legend));
    true
}

fn insert_after_last(parent: &mut Element, name: &str, node: Node) {
    let at = parent
        .children
        .iter()
        .rposition(|c| matches!(c, Node::Element(e) if e.is(name)))
        .map_or(parent.children.len(), |i| i + 1);
    parent.children.insert(at, node);
}

/// Point `Name.` and `'Name'.` cell references at the suffixed tables
///
/// `value` is an escaped attribute value.
fn rename_sheet_refs(value: &str, suffix: &str) -> String {
    let suffix = escape(suffix);
    let mut out = value.to_string();
    for name in DATASET_TABLES {
        for tail in [".", "'."] {
            let needle = format!("{}{}", name, tail);
            let mut result = String::with_capacity(out.len());
            let mut last = 0;
            for (pos, _) in out.match_indices(&needle) {
                let at_boundary = out[..pos]
                    .chars()
                    .next_back()
                    .map_or(true, |c| !c.is_alphanumeric() && c != '_');
                if at_boundary {
                    result.push_str(&out[last..pos]);
                    result.push_str(name);
                    result.push_str(&suffix);
                    result.push_str(tail);
                    last = pos + needle.len();
                }
            }
            result.push_str(&out[last..]);
            out = result;
        }
    }
    out
}
