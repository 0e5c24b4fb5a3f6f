//! Page Content Extractor.
//!
//! Replays one page's content stream and produces a flat, source-ordered list
//! of [`ContentItem`]s: one [`TextRun`] per text-showing operator and one
//! [`ImageBlock`] per painted image XObject large enough to be a diagram.
//!
//! ```text
//! content ops  ->  text-state machine x CTM  ->  TextRun
//!              ->  Do under CTM              ->  RawImage -> RGBA -> data URL -> ImageBlock
//! ```
//!
//! Text and image positions are both mapped through the current
//! transformation matrix, so pages that flip or scale the y axis with `cm`
//! still come out in the same top-is-larger user space.

use super::backend::{get_number_from_value, PageId, PdfBackend, PdfValue, PlainText, TextDecoder};
use crate::images;
use crate::types::{ContentItem, ImageBlock, TextRun};
use crate::PdfError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Two runs whose baselines differ by less than this share a line.
const Y_TOLERANCE: f32 = 1.0;

/// Approximate character width as a fraction of font size when no better
/// metric is available.
const APPROX_CHAR_WIDTH_RATIO: f32 = 0.5;

/// The identity 2x3 matrix: [a, b, c, d, e, f].
pub const IDENTITY_MATRIX: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

// ---------------------------------------------------------------------------
// Internal: PDF text-state machine
// ---------------------------------------------------------------------------

/// Mutable state tracked while walking a page's content stream.
#[derive(Debug, Clone)]
struct TextState {
    /// Current font resource name (the `/F1`-style key).
    font_key: Vec<u8>,
    /// Current font size in text-space units.
    font_size: f32,
    /// Elements [a, b, c, d, tx, ty] of the current text matrix.
    text_matrix: [f32; 6],
    /// Text line matrix -- set by BT and updated by Td/TD/T*/Tm.
    line_matrix: [f32; 6],
    /// Horizontal scaling factor (percent / 100).
    horiz_scale: f32,
    char_spacing: f32,
    word_spacing: f32,
    text_rise: f32,
    leading: f32,
    /// Current transformation matrix, concatenated by `cm` and saved and
    /// restored by `q`/`Q`.
    ctm: [f32; 6],
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font_key: Vec::new(),
            font_size: 0.0,
            text_matrix: IDENTITY_MATRIX,
            line_matrix: IDENTITY_MATRIX,
            horiz_scale: 1.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            text_rise: 0.0,
            leading: 0.0,
            ctm: IDENTITY_MATRIX,
        }
    }
}

impl TextState {
    /// Text space to user space: text matrix x CTM.
    fn rendering_matrix(&self) -> [f32; 6] {
        multiply(&self.text_matrix, &self.ctm)
    }

    /// User-space position of the current glyph origin, rise included.
    fn origin(&self) -> (f32, f32) {
        apply(&self.rendering_matrix(), 0.0, self.text_rise)
    }

    /// Rendered size: `font_size` times the length of the rendering
    /// matrix's y axis.
    fn effective_font_size(&self) -> f32 {
        let [_, _, c, d, _, _] = self.rendering_matrix();
        (self.font_size * (c.powi(2) + d.powi(2)).sqrt()).abs()
    }

    fn advance_x(&mut self, dx: f32) {
        self.text_matrix[4] += dx * self.text_matrix[0];
        self.text_matrix[5] += dx * self.text_matrix[1];
    }

    /// Multiply the text line matrix by a translation (Td / TD / T*).
    fn translate_line(&mut self, tx: f32, ty: f32) {
        let new_tx = self.line_matrix[0] * tx + self.line_matrix[2] * ty + self.line_matrix[4];
        let new_ty = self.line_matrix[1] * tx + self.line_matrix[3] * ty + self.line_matrix[5];
        self.line_matrix[4] = new_tx;
        self.line_matrix[5] = new_ty;
        self.text_matrix = self.line_matrix;
    }

    fn char_advance(&self) -> f32 {
        self.font_size * APPROX_CHAR_WIDTH_RATIO * self.horiz_scale
    }

    /// Advance the text matrix past `text`.
    fn advance_after_show(&mut self, text: &str) {
        let mut total_dx: f32 = 0.0;
        for ch in text.chars() {
            total_dx += self.char_advance() + self.char_spacing;
            if ch == ' ' {
                total_dx += self.word_spacing;
            }
        }
        self.advance_x(total_dx);
    }

    /// Estimated rendered width of `text`, scaled into user space.
    fn estimate_width(&self, text: &str) -> f32 {
        let [a, b, _, _, _, _] = self.rendering_matrix();
        text.chars().count() as f32 * self.char_advance() * (a.powi(2) + b.powi(2)).sqrt()
    }
}

/// `m x n` for PDF's row-vector matrices `[a b c d e f]`.
pub fn multiply(m: &[f32; 6], n: &[f32; 6]) -> [f32; 6] {
    [
        m[0] * n[0] + m[1] * n[2],
        m[0] * n[1] + m[1] * n[3],
        m[2] * n[0] + m[3] * n[2],
        m[2] * n[1] + m[3] * n[3],
        m[4] * n[0] + m[5] * n[2] + n[4],
        m[4] * n[1] + m[5] * n[3] + n[5],
    ]
}

fn apply(m: &[f32; 6], x: f32, y: f32) -> (f32, f32) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

fn matrix(operands: &[PdfValue]) -> Option<[f32; 6]> {
    match numbers(operands)[..] {
        [a, b, c, d, e, f] => Some([a, b, c, d, e, f]),
        _ => None,
    }
}

fn numbers(operands: &[PdfValue]) -> Vec<f32> {
    operands.iter().filter_map(get_number_from_value).collect()
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Walk a single page's content stream and produce its [`ContentItem`]s in
/// instruction order.
///
/// | Operator | Action |
/// |----------|--------|
/// | `q` `Q`  | Save / restore the CTM |
/// | `cm`     | Concatenate a matrix onto the CTM |
/// | `BT`     | Begin text object -- reset matrices |
/// | `Tf`     | Set font and size |
/// | `Tm`     | Set text matrix directly |
/// | `Td` `TD` `T*` `TL` | Move the text position |
/// | `Tc` `Tw` `Tz` `Ts` | Spacing, scaling, rise |
/// | `Tj` `TJ` `'` `"`   | Show text: one run per operator |
/// | `Do`     | Paint an XObject: images become [`ImageBlock`]s |
///
/// The font named by `Tf` is resolved once into a [`TextDecoder`] and used
/// for every string shown until the next `Tf`.
///
/// Failing to read or decode the content stream is an error for this page;
/// a single image that cannot be resolved or decoded is logged and skipped.
pub fn extract_page_items(
    backend: &dyn PdfBackend,
    page_id: PageId,
) -> Result<Vec<ContentItem>, PdfError> {
    let raw_content = backend.page_content(page_id)?;
    let ops = backend.decode_content(&raw_content)?;

    let mut state = TextState::default();
    let mut saved: Vec<[f32; 6]> = Vec::new();
    let mut font: Box<dyn TextDecoder + '_> = Box::new(PlainText);
    let mut items: Vec<ContentItem> = Vec::new();

    for op in &ops {
        match op.operator.as_str() {
            "q" => saved.push(state.ctm),
            "Q" => match saved.pop() {
                Some(ctm) => state.ctm = ctm,
                None => log::debug!("unbalanced Q on page {:?}", page_id),
            },
            "cm" => {
                if let Some(m) = matrix(&op.operands) {
                    state.ctm = multiply(&m, &state.ctm);
                }
            }
            "BT" => {
                state.text_matrix = IDENTITY_MATRIX;
                state.line_matrix = IDENTITY_MATRIX;
            }
            "Tf" => {
                if handle_tf(&op.operands, &mut state) {
                    font = backend.font_decoder(page_id, &state.font_key);
                }
            }
            "Tm" => {
                if let Some(m) = matrix(&op.operands) {
                    state.text_matrix = m;
                    state.line_matrix = m;
                }
            }
            "Td" => {
                if let [tx, ty, ..] = numbers(&op.operands)[..] {
                    state.translate_line(tx, ty);
                }
            }
            "TD" => {
                if let [tx, ty, ..] = numbers(&op.operands)[..] {
                    state.leading = -ty;
                    state.translate_line(tx, ty);
                }
            }
            "T*" => state.translate_line(0.0, -state.leading),
            "TL" => {
                if let Some(v) = op.operands.first().and_then(get_number_from_value) {
                    state.leading = v;
                }
            }
            "Tc" => {
                if let Some(v) = op.operands.first().and_then(get_number_from_value) {
                    state.char_spacing = v;
                }
            }
            "Tw" => {
                if let Some(v) = op.operands.first().and_then(get_number_from_value) {
                    state.word_spacing = v;
                }
            }
            "Tz" => {
                if let Some(v) = op.operands.first().and_then(get_number_from_value) {
                    state.horiz_scale = v / 100.0;
                }
            }
            "Ts" => {
                if let Some(v) = op.operands.first().and_then(get_number_from_value) {
                    state.text_rise = v;
                }
            }
            "Tj" => {
                if let Some(first) = op.operands.first() {
                    emit_show_string(first, &*font, &mut state, &mut items);
                }
            }
            "TJ" => {
                if let Some(PdfValue::Array(arr)) = op.operands.first() {
                    handle_tj_array(arr, &*font, &mut state, &mut items);
                }
            }
            "'" => {
                state.translate_line(0.0, -state.leading);
                if let Some(first) = op.operands.first() {
                    emit_show_string(first, &*font, &mut state, &mut items);
                }
            }
            "\"" => {
                if op.operands.len() >= 3 {
                    if let Some(aw) = get_number_from_value(&op.operands[0]) {
                        state.word_spacing = aw;
                    }
                    if let Some(ac) = get_number_from_value(&op.operands[1]) {
                        state.char_spacing = ac;
                    }
                    state.translate_line(0.0, -state.leading);
                    emit_show_string(&op.operands[2], &*font, &mut state, &mut items);
                }
            }
            "Do" => {
                if let Some(PdfValue::Name(name)) = op.operands.first() {
                    match paint_image(backend, page_id, name, state.ctm) {
                        Ok(Some(block)) => items.push(ContentItem::Image(block)),
                        Ok(None) => {}
                        Err(e) => log::warn!(
                            "skipping image /{} on page {:?}: {}",
                            String::from_utf8_lossy(name),
                            page_id,
                            e
                        ),
                    }
                }
            }
            _ => {}
        }
    }

    mark_line_ends(&mut items);
    Ok(items)
}

/// Page-space bounds `(x, y, width, height)` of an image painted under
/// `matrix`, with `(x, y)` the top-left corner.
///
/// PDF paints image XObjects into the unit square, so the matrix scale is
/// the image's size in user space.
pub fn image_bounds(matrix: [f32; 6]) -> (f32, f32, f32, f32) {
    let [a, _, _, d, e, f] = matrix;
    let x = e.min(e + a);
    let top = f.max(f + d);
    (x, top, a.abs(), d.abs())
}

/// Set `ends_line` on every text run whose successor sits on another
/// baseline, and on the last run of the page.
pub fn mark_line_ends(items: &mut [ContentItem]) {
    let text_indices: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| matches!(item, ContentItem::Text(_)))
        .map(|(i, _)| i)
        .collect();

    for (pos, &i) in text_indices.iter().enumerate() {
        let next_y = text_indices.get(pos + 1).map(|&j| items[j].y());
        if let ContentItem::Text(run) = &mut items[i] {
            run.ends_line = match next_y {
                Some(y) => (y - run.y).abs() >= Y_TOLERANCE,
                None => true,
            };
        }
    }
}

// ---------------------------------------------------------------------------
// Operator handlers
// ---------------------------------------------------------------------------

/// Returns `true` when the operands named a font.
fn handle_tf(operands: &[PdfValue], state: &mut TextState) -> bool {
    if operands.len() < 2 {
        return false;
    }
    let key = match &operands[0] {
        PdfValue::Name(n) => n.clone(),
        PdfValue::Str(s) => s.clone(),
        _ => return false,
    };
    state.font_key = key;
    state.font_size = get_number_from_value(&operands[1]).unwrap_or(0.0);
    true
}

fn decode_string(val: &PdfValue, font: &dyn TextDecoder) -> String {
    match val {
        PdfValue::Str(bytes) => font.decode(bytes),
        _ => String::new(),
    }
}

fn push_run(text: &str, (x, y): (f32, f32), state: &TextState, items: &mut Vec<ContentItem>) {
    if text.trim().is_empty() {
        return;
    }
    items.push(ContentItem::Text(TextRun {
        content: text.to_string(),
        x,
        y,
        width: state.estimate_width(text),
        height: state.effective_font_size(),
        ends_line: false,
    }));
}

/// Shared by `Tj`, `'`, and `"`.
fn emit_show_string(
    operand: &PdfValue,
    font: &dyn TextDecoder,
    state: &mut TextState,
    items: &mut Vec<ContentItem>,
) {
    let text = decode_string(operand, font);
    if text.is_empty() {
        return;
    }
    push_run(&text, state.origin(), state, items);
    state.advance_after_show(&text);
}

/// Process a `TJ` array into a single run. Large negative kerning
/// adjustments become spaces.
fn handle_tj_array(
    arr: &[PdfValue],
    font: &dyn TextDecoder,
    state: &mut TextState,
    items: &mut Vec<ContentItem>,
) {
    let mut buf = String::new();
    let mut run_origin = state.origin();

    for elem in arr {
        match elem {
            PdfValue::Str(_) => {
                let fragment = decode_string(elem, font);
                if buf.is_empty() {
                    run_origin = state.origin();
                }
                buf.push_str(&fragment);
                state.advance_after_show(&fragment);
            }
            val => {
                if let Some(adj) = get_number_from_value(val) {
                    let dx = -adj / 1000.0 * state.font_size * state.horiz_scale;
                    if dx > state.char_advance() * 0.3 && !buf.is_empty() && !buf.ends_with(' ') {
                        buf.push(' ');
                    }
                    state.advance_x(dx);
                }
            }
        }
    }

    push_run(buf.trim_end(), run_origin, state, items);
}

/// Resolve, decode, and place the image painted by `Do /name` under `ctm`.
///
/// The RGBA bitmap lives only inside this function; the returned block
/// carries its PNG data URL.
fn paint_image(
    backend: &dyn PdfBackend,
    page_id: PageId,
    name: &[u8],
    ctm: [f32; 6],
) -> Result<Option<ImageBlock>, PdfError> {
    let Some(raw) = backend.page_image(page_id, name)? else {
        return Ok(None);
    };

    let Some(bitmap) = images::decode_rgba(&raw)? else {
        log::debug!(
            "ignoring image /{} ({}x{}, {:?})",
            raw.name,
            raw.width,
            raw.height,
            images::pixel_format(&raw)
        );
        return Ok(None);
    };

    let (x, y, width, height) = image_bounds(ctm);
    let data_url = images::to_data_url(bitmap)?;

    Ok(Some(ImageBlock {
        data_url,
        x,
        y,
        width,
        height,
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
