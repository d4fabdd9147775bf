//! CSV to `table:table` conversion

use crate::error::ReportError;
use crate::report::xml::{Element, Node};
use std::fs;
use std::path::Path;

/// Read a CSV destined for table `table`
pub fn read_table_csv(table: &str, path: &Path) -> Result<String, ReportError> {
    fs::read_to_string(path).map_err(|source| ReportError::TableSource {
        table: table.to_string(),
        path: path.to_path_buf(),
        source,
    })
}

/// Build a spreadsheet table from CSV text
///
/// Numeric fields become float cells, everything else string cells.
/// `calcext` adds the LibreOffice `calcext:value-type` attribute, which is only
/// valid when the document declares that namespace.
pub fn table_from_csv(name: &str, csv: &str, calcext: bool) -> Element {
    let mut table = Element::new("table:table")
        .with_attr("table:name", name)
        .with_attr("table:style-name", "ta1")
        .with_child(Node::Element(
            Element::new("table:table-column")
                .with_attr("table:style-name", "co1")
                .with_attr("table:default-cell-style-name", "Default"),
        ));

    for line in csv.lines() {
        let mut row = Element::new("table:table-row").with_attr("table:style-name", "ro1");
        for field in line.trim_end().split(',') {
            row.children.push(Node::Element(cell(field, calcext)));
        }
        table.children.push(Node::Element(row));
    }

    table
}

fn cell(field: &str, calcext: bool) -> Element {
    match field.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => {
            let shown = value.to_string();
            let mut cell = Element::new("table:table-cell")
                .with_attr("office:value-type", "float")
                .with_attr("office:value", &shown);
            if calcext {
                cell.set_attr("calcext:value-type", "float");
            }
            cell.with_child(text_p(&shown))
        }
        _ => {
            let mut cell = Element::new("table:table-cell").with_attr("office:value-type", "string");
            if calcext {
                cell.set_attr("calcext:value-type", "string");
            }
            cell.with_child(text_p(field))
        }
    }
}

fn text_p(content: &str) -> Node {
    let p = Element::new("text:p");
    if content.is_empty() {
        Node::Element(p)
    } else {
        Node::Element(p.with_child(Node::text(content)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(table: &Element) -> Vec<&Element> {
        table
            .child_elements()
            .filter(|e| e.is("table:table-row"))
            .flat_map(|r| r.child_elements())
            .collect()
    }

    #[test]
    fn test_table_structure() {
        let table = table_from_csv("Tests", "Type,IOPS\nRand,1500.5  \n", true);
        assert_eq!(table.attr("table:name").as_deref(), Some("Tests"));
        assert_eq!(table.attr("table:style-name").as_deref(), Some("ta1"));

        let column = table.child_elements().next().unwrap();
        assert!(column.is("table:table-column"));
        assert_eq!(column.attr("table:default-cell-style-name").as_deref(), Some("Default"));

        let rows: Vec<&Element> = table.child_elements().filter(|e| e.is("table:table-row")).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].attr("table:style-name").as_deref(), Some("ro1"));
        assert_eq!(cells(&table).len(), 4);
    }

    #[test]
    fn test_float_and_string_cells() {
        let table = table_from_csv("T", "Rand,1500.5,1e3,NaN,", true);
        let cells = cells(&table);

        assert_eq!(cells[0].attr("office:value-type").as_deref(), Some("string"));
        assert_eq!(cells[1].attr("office:value-type").as_deref(), Some("float"));
        assert_eq!(cells[1].attr("office:value").as_deref(), Some("1500.5"));
        assert_eq!(cells[1].attr("calcext:value-type").as_deref(), Some("float"));
        assert_eq!(cells[2].attr("office:value").as_deref(), Some("1000"));
        // NaN parses but is not a usable number
        assert_eq!(cells[3].attr("office:value-type").as_deref(), Some("string"));
        assert_eq!(cells[4].attr("office:value-type").as_deref(), Some("string"));
    }

    #[test]
    fn test_no_calcext_without_namespace() {
        let table = table_from_csv("T", "1,x", false);
        assert!(cells(&table).iter().all(|c| c.attr("calcext:value-type").is_none()));
    }

    #[test]
    fn test_string_cell_is_escaped() {
        let table = table_from_csv("T", "a<b&c", false);
        let cell = cells(&table)[0];
        let p = cell.find_named("text:p").unwrap();
        assert_eq!(p.children, vec![Node::Text("a&lt;b&amp;c".to_string())]);
    }

    #[test]
    fn test_missing_csv() {
        let err = read_table_csv("Tests", Path::new("/nonexistent/tests.csv")).unwrap_err();
        assert!(matches!(err, ReportError::TableSource { ref table, .. } if table == "Tests"));
    }
}
