//! Text extraction for binary document formats.
//!
//! The loader hands over raw bytes plus a [`Format`] guessed from the file
//! extension; this module returns plain UTF-8 text. A damaged file yields
//! an [`ExtractError`], including when the PDF parser panics on it, and the
//! loader skips it.

use std::io::{Cursor, Read};
use std::path::Path;

use quick_xml::events::Event;
use thiserror::Error;

/// Upper bound on the decompressed size of a single OOXML part.
const MAX_PART_BYTES: u64 = 50 * 1024 * 1024;

const SHARED_STRINGS: &str = "xl/sharedStrings.xml";

/// Document formats the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    PlainText,
    Markdown,
    Pdf,
    Docx,
    Pptx,
    Xlsx,
}

impl Format {
    /// Guess the format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Format> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" | "text" | "csv" | "log" | "json" | "yaml" | "yml" | "toml" | "html"
            | "htm" | "rst" => Some(Format::PlainText),
            "md" | "markdown" => Some(Format::Markdown),
            "pdf" => Some(Format::Pdf),
            "docx" => Some(Format::Docx),
            "pptx" => Some(Format::Pptx),
            "xlsx" => Some(Format::Xlsx),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Format::PlainText => "text/plain",
            Format::Markdown => "text/markdown",
            Format::Pdf => "application/pdf",
            Format::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Format::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            Format::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("file is not valid UTF-8 text")]
    NotUtf8,
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
}

/// Extract plain text from `bytes` in the given format.
pub fn extract_text(bytes: &[u8], format: Format) -> Result<String, ExtractError> {
    match format {
        Format::PlainText | Format::Markdown => {
            String::from_utf8(bytes.to_vec()).map_err(|_| ExtractError::NotUtf8)
        }
        Format::Pdf => extract_pdf(bytes),
        Format::Docx => {
            let mut archive = open_zip(bytes)?;
            let xml = read_part(&mut archive, "word/document.xml")?;
            collect_text_runs(&xml, b"t", b"p")
        }
        Format::Pptx => {
            let mut archive = open_zip(bytes)?;
            let mut pages = Vec::new();
            for name in numbered_parts(&archive, "ppt/slides/slide") {
                let xml = read_part(&mut archive, &name)?;
                let text = collect_text_runs(&xml, b"t", b"p")?;
                if !text.is_empty() {
                    pages.push(text);
                }
            }
            Ok(pages.join("\n\n"))
        }
        Format::Xlsx => {
            let mut archive = open_zip(bytes)?;
            let shared = if archive.file_names().any(|n| n == SHARED_STRINGS) {
                shared_strings(&read_part(&mut archive, SHARED_STRINGS)?)?
            } else {
                Vec::new()
            };
            let mut sheets = Vec::new();
            for name in numbered_parts(&archive, "xl/worksheets/sheet") {
                let xml = read_part(&mut archive, &name)?;
                let text = sheet_rows(&xml, &shared)?;
                if !text.is_empty() {
                    sheets.push(text);
                }
            }
            Ok(sheets.join("\n\n"))
        }
    }
}

/// `pdf-extract` panics on some structurally valid but inconsistent files
/// (e.g. a content stream naming a font the page does not define), so the
/// panic is contained and reported like any other parse failure.
fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(result) => result.map_err(|e| ExtractError::Pdf(e.to_string())),
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown cause".to_string());
            Err(ExtractError::Pdf(format!("pdf parser panicked: {}", detail)))
        }
    }
}

/// Names of `{prefix}{N}.xml` parts, ordered by `N`.
fn numbered_parts(archive: &zip::ZipArchive<Cursor<&[u8]>>, prefix: &str) -> Vec<String> {
    let mut parts: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|n| {
            let num = n.strip_prefix(prefix)?.strip_suffix(".xml")?.parse().ok()?;
            Some((num, n.to_string()))
        })
        .collect();
    parts.sort();
    parts.into_iter().map(|(_, name)| name).collect()
}

fn open_zip(bytes: &[u8]) -> Result<zip::ZipArchive<Cursor<&[u8]>>, ExtractError> {
    zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::Ooxml(e.to_string()))
}

fn read_part(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(MAX_PART_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= MAX_PART_BYTES {
        return Err(ExtractError::Ooxml(format!("{} exceeds size limit", name)));
    }
    Ok(out)
}

/// Concatenate the text of every `<*:text_tag>` element, starting a new
/// line at the end of each `<*:para_tag>`.
fn collect_text_runs(xml: &[u8], text_tag: &[u8], para_tag: &[u8]) -> Result<String, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == text_tag => in_text = true,
            Ok(Event::End(e)) if e.local_name().as_ref() == text_tag => in_text = false,
            Ok(Event::End(e)) if e.local_name().as_ref() == para_tag => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Ok(Event::Text(t)) if in_text => {
                let text = t
                    .unescape()
                    .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(out.trim_end().to_string())
}

/// The workbook's shared string table; rich-text runs are concatenated.
fn shared_strings(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"si" => {
                current = Some(String::new())
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => {
                strings.push(String::new())
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"si" => {
                strings.extend(current.take());
            }
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) if e.local_name().as_ref() == b"t" => in_text = false,
            Ok(Event::Text(t)) if in_text => {
                if let Some(s) = current.as_mut() {
                    let text = t
                        .unescape()
                        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                    s.push_str(&text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// One line per row, cells separated by tabs. Shared-string cells are
/// resolved; other cells keep their stored value.
fn sheet_rows(xml: &[u8], shared: &[String]) -> Result<String, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut lines = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell_is_shared = false;
    let mut value = String::new();
    let mut in_value = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"c" => {
                    cell_is_shared = e
                        .try_get_attribute("t")
                        .map_err(|e| ExtractError::Ooxml(e.to_string()))?
                        .is_some_and(|a| a.value.as_ref() == b"s");
                    value.clear();
                }
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Ok(Event::Text(t)) if in_value => {
                let text = t
                    .unescape()
                    .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                value.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    let text = if cell_is_shared {
                        value
                            .trim()
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| shared.get(i))
                            .cloned()
                            .unwrap_or_default()
                    } else {
                        value.trim().to_string()
                    };
                    if !text.is_empty() {
                        row.push(text);
                    }
                }
                b"row" => {
                    if !row.is_empty() {
                        lines.push(row.join("\t"));
                        row.clear();
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(lines.join("\n"))
}

/// A one-page PDF whose content stream selects font `/F9`, which the page
/// resources never define.
#[cfg(test)]
pub(crate) fn pdf_with_undefined_font() -> Vec<u8> {
    let content = "BT /F9 12 Tf 72 712 Td (Refund policy) Tj ET";
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << >> /Contents 4 0 R >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ),
    ];

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref_at = pdf.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        xref.push_str(&format!("{:010} 00000 n \n", offset));
    }
    xref.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_at
    ));
    pdf.extend_from_slice(xref.as_bytes());
    pdf
}
