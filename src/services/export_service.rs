use std::io::{Cursor, Write};

use docx_rs::{Docx, Paragraph, Run};
use rust_decimal::Decimal;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Error, Result};
use crate::models::answer::{answer_letter, ANSWER_LETTERS};

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const ZIP_CONTENT_TYPE: &str = "application/zip";

/// Everything printed on one variant's exam sheet.
#[derive(Debug, Clone)]
pub struct ExamSheet {
    pub subject_name: String,
    pub test_name: String,
    pub assessment_id: String,
    pub variant: String,
    pub instructions: Option<String>,
    pub notes: Option<String>,
    /// Sorted by position.
    pub items: Vec<SheetItem>,
}

#[derive(Debug, Clone)]
pub struct SheetItem {
    pub position: i32,
    pub text: String,
    pub score: Decimal,
    /// Answer texts in answer-id order.
    pub answers: Vec<String>,
}

impl SheetItem {
    pub fn heading(&self) -> String {
        format!("{}. {} ({} pt.)", self.position, self.text, self.score)
    }

    /// Printable answer lines; only the first five choices get a letter.
    pub fn answer_lines(&self) -> Vec<String> {
        self.answers
            .iter()
            .enumerate()
            .take(ANSWER_LETTERS.len())
            .filter_map(|(idx, text)| answer_letter(idx).map(|l| format!("   ({}) {}", l, text)))
            .collect()
    }
}

pub struct ExportService;

impl ExportService {
    fn text_paragraph(text: &str) -> Paragraph {
        Paragraph::new().add_run(Run::new().add_text(text))
    }

    /// Render a variant as a Word document.
    pub fn render_exam_docx(sheet: &ExamSheet) -> Result<Vec<u8>> {
        let title = Paragraph::new().add_run(
            Run::new()
                .add_text(format!("{} - {}", sheet.subject_name, sheet.test_name))
                .bold()
                .size(40),
        );

        let mut docx = Docx::new()
            .add_paragraph(title)
            .add_paragraph(Self::text_paragraph(&format!(
                "Assessment ID: {}",
                sheet.assessment_id
            )))
            .add_paragraph(Self::text_paragraph(&format!("Variant: {}", sheet.variant)));

        if let Some(instructions) = sheet.instructions.as_deref().filter(|s| !s.trim().is_empty()) {
            docx = docx.add_paragraph(Self::text_paragraph(&format!(
                "Instructions: {}",
                instructions
            )));
        }
        if let Some(notes) = sheet.notes.as_deref().filter(|s| !s.trim().is_empty()) {
            docx = docx.add_paragraph(Self::text_paragraph(&format!("Notes: {}", notes)));
        }
        docx = docx.add_paragraph(Paragraph::new());

        for item in &sheet.items {
            docx = docx.add_paragraph(Self::text_paragraph(&item.heading()));
            for line in item.answer_lines() {
                docx = docx.add_paragraph(Self::text_paragraph(&line));
            }
        }

        let mut buffer = Cursor::new(Vec::new());
        docx.build()
            .pack(&mut buffer)
            .map_err(|e| Error::Document(e.to_string()))?;
        Ok(buffer.into_inner())
    }

    /// Bundle named files into one deflated zip archive.
    pub fn bundle_zip(entries: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, bytes) in entries {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(bytes)?;
        }

        let cursor = writer.finish()?;
        Ok(cursor.into_inner())
    }
}
