/*
 *     Copyright 2025 The Netpulse Authors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use super::{ReportContent, ReportFormat, ReportLine, ReportRenderer};
use netpulse_core::Result;
use std::io::Write;

/// A4 page size in points.
const PAGE_WIDTH: u32 = 595;
const PAGE_HEIGHT: u32 = 842;

/// MARGIN is the left and top margin in points.
const MARGIN: u32 = 50;

/// LEADING is the distance between two baselines in points.
const LEADING: u32 = 12;

/// LINES_PER_PAGE is the number of report lines placed on one page.
pub const LINES_PER_PAGE: usize = 60;

/// Object numbers of the fixed objects, pages follow as page/content pairs.
const CATALOG_ID: usize = 1;
const PAGES_ID: usize = 2;
const REGULAR_FONT_ID: usize = 3;
const BOLD_FONT_ID: usize = 4;
const FIRST_PAGE_ID: usize = 5;

/// PdfRenderer writes a self-contained PDF 1.4 document using the standard
/// Helvetica fonts, so no font is embedded. Characters outside printable ASCII
/// render as `?`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfRenderer;

impl PdfRenderer {
    /// page_stream returns the content stream of one page.
    fn page_stream(lines: &[ReportLine]) -> Result<Vec<u8>> {
        let mut stream = Vec::new();
        let mut y = PAGE_HEIGHT - MARGIN;
        for line in lines {
            let (font, size, text) = match line {
                ReportLine::Title(text) => ("F2", 14, text.as_str()),
                ReportLine::Heading(text) => ("F2", 11, text.as_str()),
                ReportLine::Text(text) => ("F1", 10, text.as_str()),
                ReportLine::Blank => ("F1", 10, ""),
            };

            if !text.is_empty() {
                writeln!(
                    stream,
                    "BT /{} {} Tf {} {} Td ({}) Tj ET",
                    font,
                    size,
                    MARGIN,
                    y,
                    escape(text)
                )?;
            }

            y = y.saturating_sub(LEADING);
        }

        Ok(stream)
    }
}

impl ReportRenderer for PdfRenderer {
    fn format(&self) -> ReportFormat {
        ReportFormat::Pdf
    }

    fn render(&self, content: &ReportContent) -> Result<Vec<u8>> {
        let pages: Vec<&[ReportLine]> = if content.lines().is_empty() {
            vec![&[][..]]
        } else {
            content.lines().chunks(LINES_PER_PAGE).collect()
        };

        let mut objects: Vec<Vec<u8>> = Vec::with_capacity(FIRST_PAGE_ID - 1 + pages.len() * 2);
        let kids = (0..pages.len())
            .map(|index| format!("{} 0 R", FIRST_PAGE_ID + index * 2))
            .collect::<Vec<_>>()
            .join(" ");

        objects.push(format!("<< /Type /Catalog /Pages {} 0 R >>", PAGES_ID).into_bytes());
        objects.push(
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                kids,
                pages.len()
            )
            .into_bytes(),
        );
        objects.push(
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_vec(),
        );
        objects.push(
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>"
                .to_vec(),
        );

        for (index, lines) in pages.iter().enumerate() {
            let content_id = FIRST_PAGE_ID + index * 2 + 1;
            objects.push(
                format!(
                    "<< /Type /Page /Parent {} 0 R /MediaBox [0 0 {} {}] /Resources << /Font << /F1 {} 0 R /F2 {} 0 R >> >> /Contents {} 0 R >>",
                    PAGES_ID, PAGE_WIDTH, PAGE_HEIGHT, REGULAR_FONT_ID, BOLD_FONT_ID, content_id
                )
                .into_bytes(),
            );

            let stream = Self::page_stream(lines)?;
            let mut object = format!("<< /Length {} >>\nstream\n", stream.len()).into_bytes();
            object.extend_from_slice(&stream);
            object.extend_from_slice(b"\nendstream");
            objects.push(object);
        }

        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");

        let mut offsets = Vec::with_capacity(objects.len());
        for (index, object) in objects.iter().enumerate() {
            offsets.push(out.len());
            writeln!(out, "{} 0 obj", index + 1)?;
            out.extend_from_slice(object);
            out.extend_from_slice(b"\nendobj\n");
        }

        let xref = out.len();
        writeln!(out, "xref\n0 {}", objects.len() + 1)?;
        out.extend_from_slice(b"0000000000 65535 f \n");
        for offset in offsets {
            writeln!(out, "{:010} 00000 n ", offset)?;
        }

        write!(
            out,
            "trailer\n<< /Size {} /Root {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            CATALOG_ID,
            xref
        )?;

        Ok(out)
    }
}

/// escape prepares text for a PDF literal string.
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' | '(' | ')' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            ' '..='~' => escaped.push(ch),
            _ => escaped.push('?'),
        }
    }

    escaped
}
