//! PDF Drawing Backend
//! A plotters backend that records vector drawing operations into PDF pages.
//!
//! Layout:
//! 1. `PdfDocument` owns finished pages and serialises them into one file
//! 2. `PdfBackend` borrows the document and draws a single page
//! 3. Presenting the backend (or dropping it) appends the page
//!
//! Coordinates are in PDF points with plotters' top-left origin flipped to
//! PDF's bottom-left origin. Text uses the standard Helvetica fonts, so no
//! font files are needed.

use plotters_backend::text_anchor::{HPos, VPos};
use plotters_backend::{
    BackendColor, BackendCoord, BackendStyle, BackendTextStyle, DrawingBackend, DrawingErrorKind,
    FontStyle, FontTransform,
};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("Page has already been presented")]
    AlreadyPresented,
    #[error("Failed to format page content")]
    Format(#[from] std::fmt::Error),
    #[error("Failed to write PDF: {0}")]
    Io(#[from] std::io::Error),
}

/// Bezier handle length for a quarter circle.
const KAPPA: f64 = 0.552_284_749_8;

/// Fraction of the font size above the baseline.
const ASCENT: f64 = 0.78;

struct PdfPage {
    width: u32,
    height: u32,
    content: String,
    alphas: BTreeSet<u8>,
}

/// A multi-page PDF assembled from plotters drawings.
#[derive(Default)]
pub struct PdfDocument {
    pages: Vec<PdfPage>,
}

impl PdfDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start drawing a new page of `(width, height)` points.
    pub fn page(&mut self, size: (u32, u32)) -> PdfBackend<'_> {
        PdfBackend {
            doc: self,
            size,
            content: String::new(),
            alphas: BTreeSet::new(),
            presented: false,
        }
    }

    #[cfg(test)]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Serialise all pages into PDF bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out: Vec<u8> = Vec::new();
        let mut offsets: Vec<usize> = Vec::new();

        out.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");

        // 1: catalog, 2: page tree, 3/4: fonts, then (page, content) pairs
        let page_ids: Vec<usize> = (0..self.pages.len()).map(|i| 5 + 2 * i).collect();
        let kids = page_ids
            .iter()
            .map(|id| format!("{id} 0 R"))
            .collect::<Vec<_>>()
            .join(" ");

        let mut objects: Vec<Vec<u8>> = vec![
            b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                kids,
                self.pages.len()
            )
            .into_bytes(),
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_vec(),
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>"
                .to_vec(),
        ];

        for (page, &id) in self.pages.iter().zip(&page_ids) {
            let ext_gstate = page
                .alphas
                .iter()
                .map(|a| {
                    let v = f64::from(*a) / 100.0;
                    format!("/GA{a} << /CA {v:.2} /ca {v:.2} >>")
                })
                .collect::<Vec<_>>()
                .join(" ");
            objects.push(
                format!(
                    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
                     /Resources << /Font << /F1 3 0 R /F2 4 0 R >> /ExtGState << {} >> >> \
                     /Contents {} 0 R >>",
                    page.width,
                    page.height,
                    ext_gstate,
                    id + 1
                )
                .into_bytes(),
            );

            let mut stream = format!("<< /Length {} >>\nstream\n", page.content.len()).into_bytes();
            stream.extend_from_slice(page.content.as_bytes());
            stream.extend_from_slice(b"\nendstream");
            objects.push(stream);
        }

        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }

        let xref_offset = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for offset in &offsets {
            out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref_offset
            )
            .as_bytes(),
        );

        out
    }

    pub fn save(&self, path: &Path) -> Result<(), PdfError> {
        fs::write(path, self.to_bytes())?;
        log::info!("saved {:?} ({} pages)", path, self.pages.len());
        Ok(())
    }
}

/// Draws one page of a [`PdfDocument`].
pub struct PdfBackend<'a> {
    doc: &'a mut PdfDocument,
    size: (u32, u32),
    content: String,
    alphas: BTreeSet<u8>,
    presented: bool,
}

type PdfResult = Result<(), DrawingErrorKind<PdfError>>;

fn err(e: impl Into<PdfError>) -> DrawingErrorKind<PdfError> {
    DrawingErrorKind::DrawingError(e.into())
}

/// Approximate Helvetica advance width in ems.
fn char_width(c: char) -> f64 {
    match c {
        'i' | 'j' | 'l' | '\'' | '|' | '.' | ',' | ':' | ';' | '!' => 0.25,
        'f' | 't' | 'r' | 'I' | ' ' | '(' | ')' | '[' | ']' | '-' | '/' => 0.32,
        'm' | 'w' | 'M' | 'W' | '%' | '@' => 0.85,
        '0'..='9' => 0.556,
        'A'..='Z' => 0.68,
        _ => 0.54,
    }
}

/// Escape text for a PDF literal string in WinAnsi encoding.
fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            // Latin-1 maps directly onto WinAnsi
            '\u{a0}'..='\u{ff}' => {
                let _ = write!(out, "\\{:03o}", c as u32);
            }
            '\u{2013}' => out.push_str("\\226"),
            '\u{2014}' => out.push_str("\\227"),
            _ => out.push('?'),
        }
    }
    out
}

impl PdfBackend<'_> {
    fn y(&self, y: i32) -> f64 {
        f64::from(self.size.1) - f64::from(y)
    }

    fn alpha_state(&mut self, color: &BackendColor) -> Option<u8> {
        if color.alpha >= 1.0 {
            return None;
        }
        let level = (color.alpha.clamp(0.0, 1.0) * 100.0).round() as u8;
        self.alphas.insert(level);
        Some(level)
    }

    /// Open a graphics state with colour, alpha and line width set.
    fn begin<S: BackendStyle>(&mut self, style: &S, fill: bool) -> Result<bool, PdfError> {
        let color = style.color();
        if color.alpha <= 0.0 {
            return Ok(false);
        }
        let (r, g, b) = color.rgb;
        let alpha = self.alpha_state(&color);

        self.content.push_str("q ");
        if let Some(level) = alpha {
            write!(self.content, "/GA{level} gs ")?;
        }
        let (r, g, b) = (
            f64::from(r) / 255.0,
            f64::from(g) / 255.0,
            f64::from(b) / 255.0,
        );
        if fill {
            write!(self.content, "{r:.3} {g:.3} {b:.3} rg ")?;
        } else {
            write!(
                self.content,
                "{r:.3} {g:.3} {b:.3} RG {} w 1 J 1 j ",
                style.stroke_width().max(1)
            )?;
        }
        Ok(true)
    }

    fn finish_page(&mut self) -> Result<(), PdfError> {
        if self.presented {
            return Err(PdfError::AlreadyPresented);
        }
        self.presented = true;
        self.doc.pages.push(PdfPage {
            width: self.size.0,
            height: self.size.1,
            content: std::mem::take(&mut self.content),
            alphas: std::mem::take(&mut self.alphas),
        });
        Ok(())
    }
}

impl DrawingBackend for PdfBackend<'_> {
    type ErrorType = PdfError;

    fn get_size(&self) -> (u32, u32) {
        self.size
    }

    fn ensure_prepared(&mut self) -> PdfResult {
        Ok(())
    }

    fn present(&mut self) -> PdfResult {
        if self.presented {
            return Ok(());
        }
        self.finish_page().map_err(err)
    }

    fn draw_pixel(&mut self, point: BackendCoord, color: BackendColor) -> PdfResult {
        let style = color;
        if !self.begin(&style, true).map_err(err)? {
            return Ok(());
        }
        let y = self.y(point.1 + 1);
        writeln!(self.content, "{} {:.2} 1 1 re f Q", point.0, y).map_err(err)
    }

    fn draw_line<S: BackendStyle>(
        &mut self,
        from: BackendCoord,
        to: BackendCoord,
        style: &S,
    ) -> PdfResult {
        if !self.begin(style, false).map_err(err)? {
            return Ok(());
        }
        let (y0, y1) = (self.y(from.1), self.y(to.1));
        writeln!(
            self.content,
            "{} {:.2} m {} {:.2} l S Q",
            from.0, y0, to.0, y1
        )
        .map_err(err)
    }

    fn draw_rect<S: BackendStyle>(
        &mut self,
        upper_left: BackendCoord,
        bottom_right: BackendCoord,
        style: &S,
        fill: bool,
    ) -> PdfResult {
        if !self.begin(style, fill).map_err(err)? {
            return Ok(());
        }
        let x = upper_left.0.min(bottom_right.0);
        let w = (bottom_right.0 - upper_left.0).abs();
        let h = (bottom_right.1 - upper_left.1).abs();
        let y = self.y(upper_left.1.max(bottom_right.1));
        let op = if fill { "f" } else { "S" };
        writeln!(self.content, "{x} {y:.2} {w} {h} re {op} Q").map_err(err)
    }

    fn draw_path<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        path: I,
        style: &S,
    ) -> PdfResult {
        let points: Vec<BackendCoord> = path.into_iter().collect();
        if points.len() < 2 {
            return Ok(());
        }
        if !self.begin(style, false).map_err(err)? {
            return Ok(());
        }
        for (i, p) in points.iter().enumerate() {
            let op = if i == 0 { "m" } else { "l" };
            let y = self.y(p.1);
            write!(self.content, "{} {:.2} {} ", p.0, y, op).map_err(err)?;
        }
        self.content.push_str("S Q\n");
        Ok(())
    }

    fn draw_circle<S: BackendStyle>(
        &mut self,
        center: BackendCoord,
        radius: u32,
        style: &S,
        fill: bool,
    ) -> PdfResult {
        if !self.begin(style, fill).map_err(err)? {
            return Ok(());
        }
        let r = f64::from(radius.max(1));
        let k = r * KAPPA;
        let (cx, cy) = (f64::from(center.0), self.y(center.1));
        write!(
            self.content,
            "{:.2} {:.2} m \
             {:.2} {:.2} {:.2} {:.2} {:.2} {:.2} c \
             {:.2} {:.2} {:.2} {:.2} {:.2} {:.2} c \
             {:.2} {:.2} {:.2} {:.2} {:.2} {:.2} c \
             {:.2} {:.2} {:.2} {:.2} {:.2} {:.2} c ",
            cx + r, cy,
            cx + r, cy + k, cx + k, cy + r, cx, cy + r,
            cx - k, cy + r, cx - r, cy + k, cx - r, cy,
            cx - r, cy - k, cx - k, cy - r, cx, cy - r,
            cx + k, cy - r, cx + r, cy - k, cx + r, cy,
        )
        .map_err(err)?;
        self.content.push_str(if fill { "f Q\n" } else { "S Q\n" });
        Ok(())
    }

    fn fill_polygon<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        vert: I,
        style: &S,
    ) -> PdfResult {
        let points: Vec<BackendCoord> = vert.into_iter().collect();
        if points.len() < 3 {
            return Ok(());
        }
        if !self.begin(style, true).map_err(err)? {
            return Ok(());
        }
        for (i, p) in points.iter().enumerate() {
            let op = if i == 0 { "m" } else { "l" };
            let y = self.y(p.1);
            write!(self.content, "{} {:.2} {} ", p.0, y, op).map_err(err)?;
        }
        self.content.push_str("h f Q\n");
        Ok(())
    }

    fn draw_text<TStyle: BackendTextStyle>(
        &mut self,
        text: &str,
        style: &TStyle,
        pos: BackendCoord,
    ) -> PdfResult {
        let color = style.color();
        if color.alpha <= 0.0 || text.is_empty() {
            return Ok(());
        }
        let size = style.size();
        let (w, h) = self.estimate_text_size(text, style)?;
        let (w, h) = (f64::from(w), f64::from(h));

        // Top-left of the unrotated text box relative to the anchor
        let anchor = style.anchor();
        let dx = match anchor.h_pos {
            HPos::Left => 0.0,
            HPos::Center => -w / 2.0,
            HPos::Right => -w,
        };
        let dy = match anchor.v_pos {
            VPos::Top => 0.0,
            VPos::Center => -h / 2.0,
            VPos::Bottom => -h,
        };
        // Baseline origin in text-local screen coordinates
        let (lx, ly) = (dx, dy + size * ASCENT);

        // Screen-space rotation about the anchor, then PDF text matrix
        let ((sx, sy), matrix) = match style.transform() {
            FontTransform::Rotate90 => ((-ly, lx), "0 -1 1 0"),
            FontTransform::Rotate180 => ((-lx, -ly), "-1 0 0 -1"),
            FontTransform::Rotate270 => ((ly, -lx), "0 1 -1 0"),
            _ => ((lx, ly), "1 0 0 1"),
        };
        let px = f64::from(pos.0) + sx;
        let py = f64::from(self.size.1) - (f64::from(pos.1) + sy);

        let font = match style.style() {
            FontStyle::Bold => "F2",
            _ => "F1",
        };
        let alpha = self.alpha_state(&color);
        let (r, g, b) = color.rgb;

        self.content.push_str("q ");
        if let Some(level) = alpha {
            write!(self.content, "/GA{level} gs ").map_err(err)?;
        }
        writeln!(
            self.content,
            "BT /{font} {size:.1} Tf {:.3} {:.3} {:.3} rg {matrix} {px:.2} {py:.2} Tm ({}) Tj ET Q",
            f64::from(r) / 255.0,
            f64::from(g) / 255.0,
            f64::from(b) / 255.0,
            escape_text(text)
        )
        .map_err(err)
    }

    fn estimate_text_size<TStyle: BackendTextStyle>(
        &self,
        text: &str,
        style: &TStyle,
    ) -> Result<(u32, u32), DrawingErrorKind<Self::ErrorType>> {
        let size = style.size();
        let bold = if matches!(style.style(), FontStyle::Bold) {
            1.05
        } else {
            1.0
        };
        let width: f64 = text.chars().map(char_width).sum::<f64>() * size * bold;
        Ok((width.ceil() as u32, size.ceil() as u32))
    }
}

impl Drop for PdfBackend<'_> {
    fn drop(&mut self) {
        if !self.presented {
            let _ = self.finish_page();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotters::prelude::*;

    fn page_text(doc: &PdfDocument) -> String {
        String::from_utf8_lossy(&doc.to_bytes()).into_owned()
    }

    #[test]
    fn empty_document_is_valid_pdf() {
        let doc = PdfDocument::new();
        let text = page_text(&doc);
        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.contains("/Count 0"));
        assert!(text.trim_end().ends_with("%%EOF"));
    }

    #[test]
    fn pages_are_appended_on_drop() {
        let mut doc = PdfDocument::new();
        {
            let root = doc.page((200, 100)).into_drawing_area();
            root.fill(&WHITE).unwrap();
        }
        {
            let root = doc.page((300, 150)).into_drawing_area();
            root.fill(&RED).unwrap();
            root.present().unwrap();
        }
        assert_eq!(doc.page_count(), 2);
        let text = page_text(&doc);
        assert!(text.contains("/MediaBox [0 0 200 100]"));
        assert!(text.contains("/MediaBox [0 0 300 150]"));
        assert!(text.contains("/Count 2"));
    }

    #[test]
    fn xref_offsets_point_at_objects() {
        let mut doc = PdfDocument::new();
        {
            let root = doc.page((100, 100)).into_drawing_area();
            root.fill(&WHITE).unwrap();
        }
        let bytes = doc.to_bytes();
        let text = String::from_utf8_lossy(&bytes);
        let xref = text.find("xref\n").unwrap();
        let first_entry = text[xref..].lines().nth(3).unwrap();
        let offset: usize = first_entry[..10].parse().unwrap();
        assert!(bytes[offset..].starts_with(b"1 0 obj"));
    }

    #[test]
    fn transparent_fill_registers_graphics_state() {
        let mut doc = PdfDocument::new();
        {
            let root = doc.page((100, 100)).into_drawing_area();
            root.draw(&Circle::new((50, 50), 5, RED.mix(0.5).filled()))
                .unwrap();
        }
        let text = page_text(&doc);
        assert!(text.contains("/GA50 << /CA 0.50 /ca 0.50 >>"));
        assert!(text.contains("/GA50 gs"));
        assert!(text.contains(" c "));
    }

    #[test]
    fn text_is_escaped_and_placed() {
        let mut doc = PdfDocument::new();
        {
            let root = doc.page((200, 100)).into_drawing_area();
            root.draw(&Text::new("r (AW)", (10, 10), ("sans-serif", 12)))
                .unwrap();
        }
        let text = page_text(&doc);
        assert!(text.contains("(r \\(AW\\)) Tj"));
        assert!(text.contains("/F1 12.0 Tf"));
    }

    #[test]
    fn escape_handles_latin1_and_unknown() {
        assert_eq!(escape_text("a\\b"), "a\\\\b");
        assert_eq!(escape_text("\u{e9}"), "\\351");
        assert_eq!(escape_text("\u{3c3}"), "?");
    }

    #[test]
    fn text_width_scales_with_size() {
        let mut doc = PdfDocument::new();
        let backend = doc.page((10, 10));
        let small = backend
            .estimate_text_size("Heart rate", &TextStyle::from(("sans-serif", 10)))
            .unwrap();
        let large = backend
            .estimate_text_size("Heart rate", &TextStyle::from(("sans-serif", 20)))
            .unwrap();
        assert!(large.0 > small.0);
        assert_eq!(large.1, 20);
    }
}
