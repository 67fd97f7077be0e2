use crate::error::{Result, ScrapeError};
use scraper::{ElementRef, Html, Selector};
use tabula_export::ResultRow;

/// Marker string that only appears once the results table has rendered.
const RESULTS_MARKER: &str = "Total Credit";

/// Rows of the grade grid.
const GRID_ROW: &str = "table.gridtable tr";

/// Theory-subject rows carry this marker in their first cell.
const SUBJECT_MARKER: &str = "[T]";

/// Column index of the grade cell within a subject row.
const GRADE_CELL: usize = 3;

const NAME_ID: &str = "#ctl00_ContentPlaceHolder1_lblNameGrading";
const SGPA_ID: &str = "#ctl00_ContentPlaceHolder1_lblSGPA";
const CGPA_ID: &str = "#ctl00_ContentPlaceHolder1_lblcgpa";
const REMARK_ID: &str = "#ctl00_ContentPlaceHolder1_lblResultNewGrading";

/// Whether the page source shows a rendered results table.
pub fn has_results_marker(html: &str) -> bool {
    html.contains(RESULTS_MARKER)
}

/// Extract a [`ResultRow`] from a rendered result page.
///
/// Subject codes and grades come from the grid rows flagged with the
/// theory marker; name, SGPA, CGPA and the overall remark come from their
/// dedicated labels. All cells are scrubbed of embedded commas/newlines.
pub fn parse_result_page(html: &str, enrollment: &str) -> Result<ResultRow> {
    let document = Html::parse_document(html);

    let row_selector = Selector::parse(GRID_ROW)
        .map_err(|e| ScrapeError::ResultParse(format!("invalid grid selector: {e}")))?;
    let cell_selector = Selector::parse("td")
        .map_err(|e| ScrapeError::ResultParse(format!("invalid cell selector: {e}")))?;

    let mut subjects = Vec::new();
    let mut grades = Vec::new();

    for row in document.select(&row_selector) {
        let cells: Vec<ElementRef> = row.select(&cell_selector).collect();
        if cells.len() <= GRADE_CELL {
            continue;
        }
        let first = cell_text(&cells[0]);
        if !first.contains(SUBJECT_MARKER) {
            continue;
        }
        subjects.push(subject_code(&first));
        grades.push(sanitize_cell(&cell_text(&cells[GRADE_CELL])));
    }

    if subjects.is_empty() {
        return Err(ScrapeError::ResultParse(
            "results marker present but no subject rows found".to_string(),
        ));
    }

    let name = labelled_text(&document, NAME_ID)?;
    let sgpa = labelled_text(&document, SGPA_ID)?;
    let cgpa = labelled_text(&document, CGPA_ID)?;
    let remark = labelled_text(&document, REMARK_ID)?;

    Ok(ResultRow {
        enrollment: enrollment.to_string(),
        name,
        subjects,
        grades,
        sgpa,
        cgpa,
        remark,
    })
}

fn labelled_text(document: &Html, selector: &str) -> Result<String> {
    let sel = Selector::parse(selector)
        .map_err(|e| ScrapeError::ResultParse(format!("invalid selector {selector}: {e}")))?;
    document
        .select(&sel)
        .next()
        .map(|el| sanitize_cell(&el.text().collect::<String>()))
        .ok_or_else(|| ScrapeError::ResultParse(format!("element {selector} missing")))
}

fn cell_text(cell: &ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Strip the theory marker and its surrounding dashes/brackets off a
/// subject cell, leaving the bare subject code.
fn subject_code(cell: &str) -> String {
    cell.trim_matches(|c| matches!(c, '-' | ' ' | '[' | 'T' | ']'))
        .to_string()
}

/// Scrub characters that would corrupt the tabular export.
fn sanitize_cell(raw: &str) -> String {
    raw.replace([',', '\n', '\r'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
