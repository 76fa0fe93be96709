/// A4 PDF rendering for investor packs
///
/// Layout is computed here as positioned text runs; `printpdf` writes the
/// document with the standard Helvetica and Helvetica-Bold fonts, so nothing
/// is embedded. Line wrapping uses the Adobe font metrics for those fonts.
/// Every page carries the document footer and `Page n of m`.
///
/// The standard fonts only cover WinAnsi (Latin-1 plus typographic
/// punctuation). Other characters are printed as `?` and counted in the
/// render log.

use printpdf::{
    BuiltinFont, Color, Greyscale, IndirectFontRef, Mm, PdfDocument, PdfLayerReference, Pt,
};

use super::{PackDocument, PackError, PackLine};

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 56.0;
const FOOTER_Y: f32 = 32.0;
const CONTENT_BOTTOM: f32 = 64.0;

const TITLE_SIZE: f32 = 20.0;
const SUBTITLE_SIZE: f32 = 11.0;
const HEADING_SIZE: f32 = 14.0;
const BODY_SIZE: f32 = 10.5;
const FOOTER_SIZE: f32 = 8.0;
const LINE_GAP: f32 = 1.35;
const LABEL_COLUMN: f32 = 150.0;

const LAYER: &str = "Content";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Font {
    Regular,
    Bold,
}

// Advance widths of ASCII 32..=126 in 1/1000 em, from the Helvetica and
// Helvetica-Bold AFM files
#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

fn glyph_width(ch: char, font: Font) -> f32 {
    let table = match font {
        Font::Regular => &HELVETICA,
        Font::Bold => &HELVETICA_BOLD,
    };

    match ch {
        ' '..='~' => f32::from(table[ch as usize - 32]),
        '£' | '€' | '–' => 556.0,
        '•' => 350.0,
        '‘' | '’' => 222.0,
        '“' | '”' => 333.0,
        '—' => 1000.0,
        // Latin-1 letters are close to their base letter
        _ => 556.0,
    }
}

fn text_width(text: &str, font: Font, size: f32) -> f32 {
    text.chars().map(|ch| glyph_width(ch, font)).sum::<f32>() * size / 1000.0
}

/// True for characters the WinAnsi standard fonts can draw
fn is_win_ansi(ch: char) -> bool {
    matches!(ch, ' '..='~' | '\u{a0}'..='\u{ff}' | '€' | '‘' | '’' | '“' | '”' | '•' | '–' | '—')
}

/// Replaces characters the standard fonts cannot draw; returns the count
fn to_win_ansi(text: &str) -> (String, usize) {
    let mut replaced = 0;
    let out = text
        .chars()
        .map(|ch| {
            if is_win_ansi(ch) {
                ch
            } else {
                replaced += 1;
                '?'
            }
        })
        .collect();
    (out, replaced)
}

#[derive(Debug, Clone, PartialEq)]
struct TextRun {
    font: Font,
    size: f32,
    x: f32,
    y: f32,
    text: String,
}

/// Flows text runs onto pages top to bottom
struct Layout {
    pages: Vec<Vec<TextRun>>,
    cursor_y: f32,
}

impl Layout {
    fn new() -> Self {
        Self {
            pages: vec![Vec::new()],
            cursor_y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn new_page(&mut self) {
        self.pages.push(Vec::new());
        self.cursor_y = PAGE_HEIGHT - MARGIN;
    }

    /// Moves down by `height`, starting a new page if it would not fit
    fn advance(&mut self, height: f32) {
        if self.cursor_y - height < CONTENT_BOTTOM {
            self.new_page();
        }
        self.cursor_y -= height;
    }

    fn gap(&mut self, height: f32) {
        self.cursor_y -= height;
    }

    fn push(&mut self, font: Font, size: f32, x: f32, text: String) {
        let y = self.cursor_y;
        if let Some(page) = self.pages.last_mut() {
            page.push(TextRun { font, size, x, y, text });
        }
    }

    fn paragraph(&mut self, font: Font, size: f32, x: f32, text: &str) {
        let width = PAGE_WIDTH - MARGIN - x;
        for line in wrap(text, font, size, width) {
            self.advance(size * LINE_GAP);
            self.push(font, size, x, line);
        }
    }

    fn bullet(&mut self, text: &str) {
        let text_x = MARGIN + 12.0;
        let lines = wrap(text, Font::Regular, BODY_SIZE, PAGE_WIDTH - MARGIN - text_x);

        for (i, line) in lines.into_iter().enumerate() {
            self.advance(BODY_SIZE * LINE_GAP);
            if i == 0 {
                self.push(Font::Regular, BODY_SIZE, MARGIN, "•".to_string());
            }
            self.push(Font::Regular, BODY_SIZE, text_x, line);
        }
    }

    /// Label in the left column, wrapped value beside it
    fn field(&mut self, label: &str, value: &str) {
        let value_x = MARGIN + LABEL_COLUMN;
        let lines = wrap(value, Font::Regular, BODY_SIZE, PAGE_WIDTH - MARGIN - value_x);

        for (i, line) in lines.into_iter().enumerate() {
            self.advance(BODY_SIZE * LINE_GAP);
            if i == 0 {
                self.push(Font::Bold, BODY_SIZE, MARGIN, label.to_string());
            }
            self.push(Font::Regular, BODY_SIZE, value_x, line);
        }
    }
}

/// Greedy word wrap; words longer than a line are split
fn wrap(text: &str, font: Font, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();

    for raw_line in text.lines() {
        let mut current = String::new();

        for word in raw_line.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };

            if text_width(&candidate, font, size) <= max_width {
                current = candidate;
                continue;
            }

            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }

            // hard-break a single overlong word
            let mut piece = String::new();
            for ch in word.chars() {
                piece.push(ch);
                if text_width(&piece, font, size) > max_width {
                    piece.pop();
                    lines.push(std::mem::take(&mut piece));
                    piece.push(ch);
                }
            }
            current = piece;
        }

        lines.push(current);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

/// Positions every run; empty trailing pages are dropped
fn lay_out(document: &PackDocument) -> Vec<Vec<TextRun>> {
    let mut layout = Layout::new();

    layout.paragraph(Font::Bold, TITLE_SIZE, MARGIN, &document.title);
    layout.paragraph(Font::Regular, SUBTITLE_SIZE, MARGIN, &document.subtitle);
    layout.gap(6.0);

    if let Some(intro) = &document.intro {
        layout.gap(BODY_SIZE);
        layout.paragraph(Font::Regular, BODY_SIZE, MARGIN, intro);
    }

    for section in &document.sections {
        layout.gap(HEADING_SIZE);
        // keep a heading with at least its first line
        layout.advance(HEADING_SIZE * LINE_GAP + BODY_SIZE * LINE_GAP);
        layout.gap(-(BODY_SIZE * LINE_GAP));
        layout.push(Font::Bold, HEADING_SIZE, MARGIN, section.heading.clone());

        for line in &section.lines {
            match line {
                PackLine::Paragraph(text) => {
                    layout.paragraph(Font::Regular, BODY_SIZE, MARGIN, text);
                    layout.gap(BODY_SIZE * 0.5);
                }
                PackLine::Field { label, value } => layout.field(label, value),
                PackLine::Bullet(text) => layout.bullet(text),
            }
        }
    }

    layout
        .pages
        .into_iter()
        .filter(|runs| !runs.is_empty())
        .collect()
}

fn pt(value: f32) -> Mm {
    Mm::from(Pt(value))
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

impl Fonts {
    fn get(&self, font: Font) -> &IndirectFontRef {
        match font {
            Font::Regular => &self.regular,
            Font::Bold => &self.bold,
        }
    }
}

/// Draws one page's runs and footer; returns how many characters were replaced
fn draw_page(
    layer: &PdfLayerReference,
    fonts: &Fonts,
    runs: &[TextRun],
    footer: &str,
    page: usize,
    total: usize,
) -> usize {
    let mut replaced = 0;

    for run in runs {
        let (text, count) = to_win_ansi(&run.text);
        replaced += count;
        layer.use_text(text, run.size, pt(run.x), pt(run.y), fonts.get(run.font));
    }

    let (footer, count) = to_win_ansi(footer);
    replaced += count;

    let page_label = format!("Page {} of {}", page, total);
    let label_x = PAGE_WIDTH - MARGIN - text_width(&page_label, Font::Regular, FOOTER_SIZE);

    layer.set_fill_color(Color::Greyscale(Greyscale::new(0.6, None)));
    layer.use_text(footer, FOOTER_SIZE, pt(MARGIN), pt(FOOTER_Y), &fonts.regular);
    layer.use_text(page_label, FOOTER_SIZE, pt(label_x), pt(FOOTER_Y), &fonts.regular);
    layer.set_fill_color(Color::Greyscale(Greyscale::new(0.0, None)));

    replaced
}

/// Renders a pack document to PDF bytes
pub fn render(document: &PackDocument) -> Result<Vec<u8>, PackError> {
    let pages = lay_out(document);
    if pages.is_empty() {
        return Err(PackError::Empty);
    }

    let (title, _) = to_win_ansi(&document.title);
    let (doc, first_page, first_layer) =
        PdfDocument::new(title, pt(PAGE_WIDTH), pt(PAGE_HEIGHT), LAYER);

    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| PackError::Pdf(format!("{:?}", e)))?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| PackError::Pdf(format!("{:?}", e)))?,
    };

    let total = pages.len();
    let mut replaced = 0;

    let mut first = Some((first_page, first_layer));
    for (i, runs) in pages.iter().enumerate() {
        let (page, layer) = match first.take() {
            Some(indices) => indices,
            None => doc.add_page(pt(PAGE_WIDTH), pt(PAGE_HEIGHT), LAYER),
        };

        let layer = doc.get_page(page).get_layer(layer);
        replaced += draw_page(&layer, &fonts, runs, &document.footer, i + 1, total);
    }

    if replaced > 0 {
        tracing::debug!(replaced, "Characters outside WinAnsi printed as '?'");
    }

    doc.save_to_bytes()
        .map_err(|e| PackError::Pdf(format!("{:?}", e)))
}
