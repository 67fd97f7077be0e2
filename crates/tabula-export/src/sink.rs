//! The accumulating result sink.

use crate::error::{ExportError, Result};
use crate::row::ResultRow;
use rust_xlsxwriter::Workbook;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Fixed columns preceding the per-subject grade columns.
const LEADING_COLUMNS: [&str; 2] = ["Enrollment No.", "Name"];

/// Fixed columns following the per-subject grade columns.
const TRAILING_COLUMNS: [&str; 3] = ["SGPA", "CGPA", "REMARK"];

/// How an appended row related to the recorded schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFit {
    /// Subject columns matched the recorded schema exactly
    Matched,
    /// Row had fewer grades than the schema; missing cells were blank-filled
    Padded {
        /// Number of blank cells appended
        missing: usize,
    },
    /// Row had more grades than the schema; extras were dropped
    Truncated {
        /// Number of grade cells dropped
        extra: usize,
    },
}

/// Paths of the finished export.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    /// The streamed CSV file
    pub csv_path: PathBuf,
    /// The converted spreadsheet
    pub xlsx_path: PathBuf,
    /// Data rows in both artifacts
    pub rows_written: u32,
}

/// Accumulates result rows and produces the export artifact.
///
/// The first [`record_header_if_absent`](Self::record_header_if_absent)
/// call fixes the subject-column schema for the whole job. Rows are
/// streamed to CSV as they arrive and flushed per record, so a partial
/// artifact exists even if the job later aborts. [`finalize`](Self::finalize)
/// converts the accumulated rows to a spreadsheet with a 1-based row index
/// column prepended.
///
/// Schema divergence policy: a row whose subject set differs from the
/// recorded schema is fitted positionally. Grades are left-aligned against
/// the schema columns, missing trailing cells are blank-filled, extras are
/// truncated, and the mismatch is logged. Rows are never dropped and
/// columns never silently shift.
pub struct ResultSink {
    csv_path: PathBuf,
    xlsx_path: PathBuf,
    writer: csv::Writer<File>,
    schema: Option<Vec<String>>,
    rows: Vec<Vec<String>>,
}

impl ResultSink {
    /// Create a sink writing `<file_stem>.csv` / `<file_stem>.xlsx` under `output_dir`.
    pub fn create(output_dir: &Path, file_stem: &str) -> Result<Self> {
        std::fs::create_dir_all(output_dir)?;
        let csv_path = output_dir.join(format!("{file_stem}.csv"));
        let xlsx_path = output_dir.join(format!("{file_stem}.xlsx"));

        let writer = csv::Writer::from_path(&csv_path)?;

        Ok(Self {
            csv_path,
            xlsx_path,
            writer,
            schema: None,
            rows: Vec::new(),
        })
    }

    /// Record the subject-column schema. A no-op after the first call.
    pub fn record_header_if_absent(&mut self, subjects: &[String]) -> Result<()> {
        if self.schema.is_some() {
            return Ok(());
        }

        let header = self.full_header(subjects);
        self.writer.write_record(&header)?;
        self.writer.flush()?;
        self.schema = Some(subjects.to_vec());
        tracing::debug!("Recorded schema with {} subject columns", subjects.len());
        Ok(())
    }

    /// Append one result row, fitting it to the recorded schema.
    pub fn append_row(&mut self, row: &ResultRow) -> Result<SchemaFit> {
        let schema = self.schema.as_ref().ok_or(ExportError::HeaderNotRecorded)?;

        let fit = if row.subjects == *schema {
            SchemaFit::Matched
        } else if row.grades.len() < schema.len() {
            SchemaFit::Padded {
                missing: schema.len() - row.grades.len(),
            }
        } else if row.grades.len() > schema.len() {
            SchemaFit::Truncated {
                extra: row.grades.len() - schema.len(),
            }
        } else {
            // Same width, different subject codes; positions still line up
            SchemaFit::Matched
        };

        if !matches!(fit, SchemaFit::Matched) {
            tracing::warn!(
                "Row for {} diverges from recorded schema ({:?}); fitting positionally",
                row.enrollment,
                fit
            );
        }

        let mut grades = row.grades.clone();
        grades.resize(schema.len(), String::new());

        let mut record = Vec::with_capacity(schema.len() + 5);
        record.push(row.enrollment.clone());
        record.push(row.name.clone());
        record.extend(grades);
        record.push(row.sgpa.clone());
        record.push(row.cgpa.clone());
        record.push(row.remark.clone());

        self.writer.write_record(&record)?;
        // Flush after every record so a partial artifact survives an abort
        self.writer.flush()?;
        self.rows.push(record);
        Ok(fit)
    }

    /// Number of data rows appended so far.
    #[must_use]
    pub fn rows_written(&self) -> u32 {
        u32::try_from(self.rows.len()).unwrap_or(u32::MAX)
    }

    /// Finish the artifact: flush the CSV and convert it to a spreadsheet.
    ///
    /// # Errors
    /// Returns [`ExportError::NoDataWritten`] if no row was ever appended.
    pub fn finalize(mut self) -> Result<ExportArtifact> {
        if self.rows.is_empty() {
            return Err(ExportError::NoDataWritten);
        }
        self.writer.flush()?;

        let schema = self.schema.as_ref().ok_or(ExportError::HeaderNotRecorded)?;
        let header = self.full_header(schema);

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();

        // Index column keeps an empty header cell, matching the CSV-to-sheet
        // conversion the consumers of these artifacts already expect.
        for (col, title) in header.iter().enumerate() {
            worksheet.write_string(0, u16::try_from(col + 1).unwrap_or(u16::MAX), title)?;
        }

        for (i, row) in self.rows.iter().enumerate() {
            let sheet_row = u32::try_from(i + 1).unwrap_or(u32::MAX);
            #[allow(clippy::cast_precision_loss)]
            worksheet.write_number(sheet_row, 0, (i + 1) as f64)?;
            for (col, cell) in row.iter().enumerate() {
                worksheet.write_string(sheet_row, u16::try_from(col + 1).unwrap_or(u16::MAX), cell)?;
            }
        }

        workbook.save(&self.xlsx_path)?;

        let rows_written = self.rows_written();
        tracing::info!(
            "Export finished: {} rows -> {}",
            rows_written,
            self.xlsx_path.display()
        );

        Ok(ExportArtifact {
            csv_path: self.csv_path,
            xlsx_path: self.xlsx_path,
            rows_written,
        })
    }

    fn full_header(&self, subjects: &[String]) -> Vec<String> {
        let mut header = Vec::with_capacity(subjects.len() + 5);
        header.extend(LEADING_COLUMNS.iter().map(ToString::to_string));
        header.extend(subjects.iter().cloned());
        header.extend(TRAILING_COLUMNS.iter().map(ToString::to_string));
        header
    }
}
