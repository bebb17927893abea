//! Invoice layout: turns an `Invoice` into the display list a `Surface`
//! paints. Coordinates are CSS pixels with the origin at the top-left of
//! the document card.
//!
//! Both render modes walk exactly the same geometry. Editable mode only adds
//! affordances (input boxes, placeholders, buttons, focus ring) on top of
//! the content, so the captured extent never depends on the mode.

use crate::canvas::{Canvas, Command, DisplayList, FieldBox};
use crate::font::{FontRegistry, SANS, SANS_BOLD};
use crate::model::{
    AdjustmentKind, BankField, BusinessField, ClientField, Invoice, InvoiceItem, ItemField,
    coerce_amount,
};
use crate::surface::{FieldId, RenderMode};
use crate::theme::Palette;
use crate::types::{Color, Rect};

pub const SURFACE_WIDTH: f32 = 794.0;
const PADDING: f32 = 48.0;
const SECTION_GAP: f32 = 48.0;
const FIELD_ROW: f32 = 30.0;
const WRAP_LINE: f32 = 18.0;
const UPLOADER_W: f32 = 192.0;
const UPLOADER_H: f32 = 96.0;
const GRID_GAP: f32 = 16.0;
const REMOVE_COL: f32 = 24.0;
const DETAILS_MIN_H: f32 = 64.0;
const ADD_BUTTON_H: f32 = 32.0;

pub struct LayoutInput<'a> {
    pub invoice: &'a Invoice,
    pub palette: Palette,
    pub mode: RenderMode,
    pub focus: Option<&'a FieldId>,
    pub fonts: &'a FontRegistry,
}

pub fn layout_invoice(input: &LayoutInput<'_>) -> DisplayList<FieldId> {
    let accent = Color::from_hsl_triple(&input.invoice.color).unwrap_or(input.palette.foreground);
    let mut layout = Layout {
        canvas: Canvas::new(SURFACE_WIDTH),
        input,
        accent,
        content_x: PADDING,
        content_w: SURFACE_WIDTH - PADDING * 2.0,
        y: PADDING,
    };
    layout.header();
    layout.contacts();
    layout.meta_row();
    layout.items();
    layout.totals();
    layout.bank_and_signature();
    let height = (layout.y + PADDING).ceil();
    layout.card_border(height);
    layout.focus_ring();
    let card = layout.palette().card;
    let mut list = layout.canvas.finish(height);
    list.commands.splice(
        0..0,
        [
            Command::SaveState,
            Command::SetFillColor(card),
            Command::FillRoundedRect {
                rect: Rect::new(0.0, 0.0, SURFACE_WIDTH, height),
                radius: 8.0,
            },
            Command::RestoreState,
        ],
    );
    list
}

struct Layout<'a, 'b> {
    canvas: Canvas<FieldId>,
    input: &'a LayoutInput<'b>,
    accent: Color,
    content_x: f32,
    content_w: f32,
    y: f32,
}

impl Layout<'_, '_> {
    fn editable(&self) -> bool {
        self.input.mode == RenderMode::Editable
    }

    fn palette(&self) -> &Palette {
        &self.input.palette
    }

    fn measure(&self, font: &str, size: f32, text: &str) -> f32 {
        self.input.fonts.measure_text_width(font, size, text)
    }

    fn card_border(&mut self, height: f32) {
        let border = self.palette().border;
        self.canvas.set_stroke_color(border);
        self.canvas.set_line_width(1.0);
        self.canvas.stroke_rounded_rect(
            Rect::new(0.5, 0.5, SURFACE_WIDTH - 1.0, height - 1.0),
            8.0,
        );
    }

    fn header(&mut self) {
        let top = self.y;
        let title_rect = Rect::new(self.content_x, top, self.content_w / 2.0, 44.0);
        let title = self.input.invoice.title.clone();
        self.canvas.set_font(SANS_BOLD, 36.0);
        if title.is_empty() {
            self.placeholder(title_rect.x, top + 36.0, "Invoice");
        } else {
            let accent = self.accent;
            self.canvas.set_fill_color(accent);
            self.canvas.draw_string(title_rect.x, top + 36.0, title);
        }
        self.canvas.record_field(FieldId::Title, title_rect);

        let logo = Rect::new(
            self.content_x + self.content_w - UPLOADER_W,
            top,
            UPLOADER_W,
            UPLOADER_H,
        );
        let source = self.input.invoice.logo_url.clone();
        self.uploader(logo, source, FieldId::Logo, "+ Add Logo");
        self.y = top + UPLOADER_H.max(44.0) + SECTION_GAP;
    }

    fn contacts(&mut self) {
        let top = self.y;
        let col_w = (self.content_w - SECTION_GAP) / 2.0;
        let left_x = self.content_x;
        let right_x = self.content_x + col_w + SECTION_GAP;

        self.section_heading(left_x, top, col_w, "From");
        self.section_heading(right_x, top, col_w, "Bill To");

        let rows_top = top + 46.0;
        let mut left_y = rows_top;
        for field in BusinessField::ALL {
            let value = self.input.invoice.from.get(field).to_string();
            let bold = field == BusinessField::Name;
            left_y = self.text_field(
                left_x,
                left_y,
                col_w,
                &value,
                field.placeholder(),
                bold,
                FieldId::Business(field),
            );
        }
        let mut right_y = rows_top;
        for field in ClientField::ALL {
            let value = self.input.invoice.to.get(field).to_string();
            let bold = field == ClientField::Name;
            right_y = self.text_field(
                right_x,
                right_y,
                col_w,
                &value,
                field.placeholder(),
                bold,
                FieldId::Client(field),
            );
        }
        self.y = left_y.max(right_y) + SECTION_GAP;
    }

    fn section_heading(&mut self, x: f32, y: f32, width: f32, label: &str) {
        let muted = self.palette().muted_foreground;
        let border = self.palette().border;
        self.canvas.set_font(SANS_BOLD, 18.0);
        self.canvas.set_fill_color(muted);
        self.canvas.draw_string(x, y + 20.0, label);
        self.canvas.set_stroke_color(border);
        self.canvas.set_line_width(1.0);
        self.canvas.line(x, y + 32.0, x + width, y + 32.0);
    }

    /// One borderless editable line (wrapping when the value is long).
    /// Returns the y where the next row starts.
    #[allow(clippy::too_many_arguments)]
    fn text_field(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        value: &str,
        placeholder: &str,
        bold: bool,
        field: FieldId,
    ) -> f32 {
        let font = if bold { SANS_BOLD } else { SANS };
        let lines = wrap_text(self.input.fonts, font, 16.0, value, width - 8.0);
        let line_count = lines.len().max(1) as f32;
        let height = FIELD_ROW + (line_count - 1.0) * WRAP_LINE;
        self.canvas.set_font(font, 16.0);
        if value.is_empty() {
            self.placeholder(x + 4.0, y + 18.0, placeholder);
        } else {
            let fg = self.palette().foreground;
            self.canvas.set_fill_color(fg);
            for (idx, line) in lines.into_iter().enumerate() {
                self.canvas
                    .draw_string(x + 4.0, y + 18.0 + idx as f32 * WRAP_LINE, line);
            }
        }
        self.canvas
            .record_field(field, Rect::new(x, y, width, height - 6.0));
        y + height
    }

    fn placeholder(&mut self, x: f32, baseline: f32, text: &str) {
        if !self.editable() {
            return;
        }
        let muted = self.palette().muted_foreground;
        self.canvas.save_state();
        self.canvas.set_opacity(0.5);
        self.canvas.set_fill_color(muted);
        self.canvas.draw_string(x, baseline, text);
        self.canvas.restore_state();
    }

    fn meta_row(&mut self) {
        let top = self.y;
        let gap = 32.0;
        let col_w = (self.content_w - gap * 2.0) / 3.0;
        let invoice = self.input.invoice;
        let cells = [
            ("Number", invoice.number.clone(), FieldId::Number),
            ("Date", invoice.date.clone(), FieldId::Date),
            ("Terms", invoice.terms.clone(), FieldId::Terms),
        ];
        for (idx, (label, value, field)) in cells.into_iter().enumerate() {
            let x = self.content_x + idx as f32 * (col_w + gap);
            self.input_box(x, top, col_w, label, &value, field);
        }
        self.y = top + 58.0 + SECTION_GAP;
    }

    fn input_box(&mut self, x: f32, top: f32, width: f32, label: &str, value: &str, field: FieldId) {
        let muted = self.palette().muted_foreground;
        self.canvas.set_font(SANS, 14.0);
        self.canvas.set_fill_color(muted);
        self.canvas.draw_string(x, top + 14.0, label);

        let rect = Rect::new(x, top + 20.0, width, 38.0);
        if self.editable() {
            let input = self.palette().input;
            self.canvas.set_stroke_color(input);
            self.canvas.set_line_width(1.0);
            self.canvas.stroke_rounded_rect(rect, 6.0);
        }
        let fg = self.palette().foreground;
        self.canvas.set_font(SANS, 16.0);
        self.canvas.set_fill_color(fg);
        self.canvas.draw_string(rect.x + 8.0, rect.y + 25.0, value);
        self.canvas.record_field(field, rect);
    }

    fn item_columns(&self) -> [(f32, f32); 5] {
        let fr = (self.content_w - REMOVE_COL - GRID_GAP * 4.0) / 6.0;
        let widths = [fr * 3.0, fr, fr, fr, REMOVE_COL];
        let mut out = [(0.0, 0.0); 5];
        let mut x = self.content_x;
        for (idx, w) in widths.into_iter().enumerate() {
            out[idx] = (x, w);
            x += w + GRID_GAP;
        }
        out
    }

    fn items(&mut self) {
        let cols = self.item_columns();
        let top = self.y;
        let muted = self.palette().muted_foreground;
        let border = self.palette().border;

        self.canvas.set_font(SANS_BOLD, 14.0);
        self.canvas.set_fill_color(muted);
        self.canvas.draw_string(cols[0].0, top + 22.0, "DESCRIPTION");
        for (col, label) in [(1usize, "RATE"), (2, "QTY"), (3, "AMOUNT")] {
            let (x, w) = cols[col];
            self.canvas.draw_string_end(x + w, top + 22.0, label);
        }
        self.canvas.set_stroke_color(border);
        self.canvas.set_line_width(2.0);
        self.canvas
            .line(self.content_x, top + 35.0, self.content_x + self.content_w, top + 35.0);

        let mut y = top + 36.0;
        let invoice = self.input.invoice;
        for item in &invoice.items {
            y = self.item_row(&cols, y, item);
        }

        let button = Rect::new(self.content_x, y + 16.0, 112.0, ADD_BUTTON_H);
        if self.editable() {
            let secondary = self.palette().secondary;
            let fg = self.palette().foreground;
            self.canvas.set_fill_color(secondary);
            self.canvas.fill_rounded_rect(button, 6.0);
            self.canvas.set_font(SANS_BOLD, 14.0);
            self.canvas.set_fill_color(fg);
            self.canvas
                .draw_string(button.x + 12.0, button.y + 21.0, "+ Add Item");
        }
        self.y = button.bottom() + SECTION_GAP;
    }

    fn item_row(&mut self, cols: &[(f32, f32); 5], top: f32, item: &InvoiceItem) -> f32 {
        let fg = self.palette().foreground;
        let muted = self.palette().muted_foreground;
        let border = self.palette().border;
        let (desc_x, desc_w) = cols[0];
        let baseline = top + 16.0 + 18.0;

        self.canvas.set_font(SANS_BOLD, 16.0);
        if item.description.is_empty() {
            self.placeholder(desc_x + 4.0, baseline, "Item Description");
        } else {
            self.canvas.set_fill_color(fg);
            self.canvas
                .draw_string(desc_x + 4.0, baseline, item.description.clone());
        }
        self.canvas.record_field(
            FieldId::Item {
                id: item.id.clone(),
                field: ItemField::Description,
            },
            Rect::new(desc_x, top + 16.0, desc_w, 24.0),
        );

        let details_top = top + 16.0 + 28.0;
        let detail_lines = wrap_text(self.input.fonts, SANS, 14.0, &item.details, desc_w - 8.0);
        let details_h = (detail_lines.len() as f32 * WRAP_LINE + 10.0).max(DETAILS_MIN_H);
        let details_rect = Rect::new(desc_x, details_top, desc_w, details_h);
        if self.editable() {
            let secondary = self.palette().secondary;
            self.canvas.save_state();
            self.canvas.set_opacity(0.5);
            self.canvas.set_fill_color(secondary);
            self.canvas.fill_rounded_rect(details_rect, 6.0);
            self.canvas.restore_state();
        }
        self.canvas.set_font(SANS, 14.0);
        if item.details.is_empty() {
            self.placeholder(desc_x + 4.0, details_top + 17.0, "Additional details...");
        } else {
            self.canvas.set_fill_color(muted);
            for (idx, line) in detail_lines.into_iter().enumerate() {
                self.canvas
                    .draw_string(desc_x + 4.0, details_top + 17.0 + idx as f32 * WRAP_LINE, line);
            }
        }
        self.canvas.record_field(
            FieldId::Item {
                id: item.id.clone(),
                field: ItemField::Details,
            },
            details_rect,
        );

        let numeric = [
            (1usize, format_number(item.rate), Some(ItemField::Rate)),
            (2, format_number(item.quantity), Some(ItemField::Quantity)),
            (3, self.input.invoice.format_amount(item.line_amount()), None),
        ];
        self.canvas.set_font(SANS, 16.0);
        self.canvas.set_fill_color(fg);
        for (col, text, field) in numeric {
            let (x, w) = cols[col];
            self.canvas.draw_string_end(x + w - 4.0, baseline, text);
            if let Some(field) = field {
                self.canvas.record_field(
                    FieldId::Item {
                        id: item.id.clone(),
                        field,
                    },
                    Rect::new(x, top + 16.0, w, 24.0),
                );
            }
        }

        if self.editable() {
            let (x, w) = cols[4];
            let cx = x + w / 2.0;
            let cy = top + 16.0 + 12.0;
            self.canvas.save_state();
            self.canvas.set_opacity(0.5);
            self.canvas.set_stroke_color(muted);
            self.canvas.set_line_width(1.5);
            self.canvas.line(cx - 5.0, cy - 5.0, cx + 5.0, cy + 5.0);
            self.canvas.line(cx - 5.0, cy + 5.0, cx + 5.0, cy - 5.0);
            self.canvas.restore_state();
        }

        let bottom = details_rect.bottom() + 16.0;
        self.canvas.set_stroke_color(border);
        self.canvas.set_line_width(1.0);
        self.canvas
            .line(self.content_x, bottom, self.content_x + self.content_w, bottom);
        bottom + 1.0
    }

    fn totals(&mut self) {
        let invoice = self.input.invoice;
        let totals = invoice.totals();
        let width = self.content_w * 0.4;
        let x = self.content_x + self.content_w - width;
        let right = x + width;
        let mut y = self.y;
        let muted = self.palette().muted_foreground;
        let fg = self.palette().foreground;
        let border = self.palette().border;

        let mut rows: Vec<(String, String)> =
            vec![("Subtotal".to_string(), invoice.format_amount(totals.subtotal))];
        if totals.tax != 0.0 {
            rows.push((
                adjustment_label("Tax", invoice.tax_type, invoice.tax_value),
                invoice.format_amount(totals.tax),
            ));
        }
        if totals.discount != 0.0 {
            rows.push((
                adjustment_label("Discount", invoice.discount_type, invoice.discount_value),
                format!("-{}", invoice.format_amount(totals.discount)),
            ));
        }
        for (label, amount) in rows {
            self.canvas.set_font(SANS, 16.0);
            self.canvas.set_fill_color(muted);
            self.canvas.draw_string(x, y + 18.0, label);
            self.canvas.set_fill_color(fg);
            self.canvas.draw_string_end(right, y + 18.0, amount);
            y += FIELD_ROW;
        }

        self.canvas.set_font(SANS, 16.0);
        self.canvas.set_fill_color(muted);
        self.canvas.draw_string(x, y + 18.0, "Total");
        let accent = self.accent;
        self.canvas.set_font(SANS_BOLD, 18.0);
        self.canvas.set_fill_color(accent);
        self.canvas
            .draw_string_end(right, y + 18.0, invoice.format_amount(totals.total));
        y += FIELD_ROW;

        self.canvas.set_stroke_color(border);
        self.canvas.set_line_width(2.0);
        self.canvas.line(x, y + 6.0, right, y + 6.0);
        y += 18.0;

        self.canvas.set_font(SANS_BOLD, 16.0);
        self.canvas.set_fill_color(fg);
        self.canvas.draw_string(x, y + 18.0, "Balance Due");
        self.canvas
            .draw_string_end(right, y + 18.0, invoice.format_amount(totals.total));
        y += FIELD_ROW;

        self.y = y + 40.0;
    }

    fn bank_and_signature(&mut self) {
        let muted = self.palette().muted_foreground;
        let x = self.content_x;
        let width = self.content_w;

        self.canvas.set_font(SANS_BOLD, 18.0);
        self.canvas.set_fill_color(muted);
        self.canvas.draw_string(x, self.y + 20.0, "Bank Details");
        let mut y = self.y + 36.0;
        for field in BankField::ALL {
            let value = self.input.invoice.bank_details.get(field).to_string();
            y = self.text_field(x, y, width, &value, field.placeholder(), false, FieldId::Bank(field));
        }
        y += SECTION_GAP;

        self.canvas.set_font(SANS_BOLD, 18.0);
        self.canvas.set_fill_color(muted);
        self.canvas.draw_string(x, y + 20.0, "Signature");
        let rect = Rect::new(x, y + 36.0, UPLOADER_W, UPLOADER_H);
        let source = self.input.invoice.signature_url.clone();
        self.uploader(rect, source, FieldId::Signature, "+ Add Signature");
        self.y = rect.bottom();
    }

    fn uploader(&mut self, rect: Rect, source: Option<String>, field: FieldId, prompt: &str) {
        if self.editable() {
            let border = self.palette().border;
            self.canvas.save_state();
            self.canvas.set_stroke_color(border);
            self.canvas.set_line_width(1.0);
            self.canvas.set_dash(vec![4.0, 4.0]);
            self.canvas.stroke_rounded_rect(rect, 8.0);
            self.canvas.restore_state();
        }
        match source.filter(|s| !s.trim().is_empty()) {
            Some(source) => self.canvas.draw_image(rect, source),
            None if self.editable() => {
                let muted = self.palette().muted_foreground;
                self.canvas.set_font(SANS, 14.0);
                self.canvas.set_fill_color(muted);
                let w = self.measure(SANS, 14.0, prompt);
                self.canvas.draw_string(
                    rect.x + (rect.width - w) / 2.0,
                    rect.y + rect.height / 2.0 + 5.0,
                    prompt,
                );
            }
            None => {}
        }
        self.canvas.record_field(field, rect);
    }

    fn focus_ring(&mut self) {
        if !self.editable() {
            return;
        }
        let Some(focus) = self.input.focus else {
            return;
        };
        let Some(rect) = self.field_rect(focus) else {
            return;
        };
        let ring = self.palette().ring;
        self.canvas.save_state();
        self.canvas.set_stroke_color(ring);
        self.canvas.set_line_width(2.0);
        self.canvas.set_dash(Vec::new());
        self.canvas.stroke_rounded_rect(rect.outset(2.0), 4.0);
        // Caret at the start of the field; the precise insertion point is
        // owned by the editing front end.
        self.canvas.set_line_width(1.0);
        self.canvas
            .line(rect.x + 4.0, rect.y + 3.0, rect.x + 4.0, rect.y + rect.height.min(24.0) - 3.0);
        self.canvas.restore_state();
    }

    // The focus ring is painted last, so every field box is recorded by now.
    fn field_rect(&self, field: &FieldId) -> Option<Rect> {
        self.canvas
            .fields()
            .iter()
            .find(|b: &&FieldBox<FieldId>| &b.field == field)
            .map(|b| b.rect)
    }
}

fn adjustment_label(name: &str, kind: AdjustmentKind, value: f64) -> String {
    match kind {
        AdjustmentKind::Percentage => format!("{} ({}%)", name, format_number(value)),
        _ => name.to_string(),
    }
}

/// Plain number as a form input would show it: no trailing zeros.
fn format_number(value: f64) -> String {
    let value = coerce_amount(value);
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let mut s = format!("{:.4}", value);
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
        s
    }
}

/// Greedy word wrap honoring explicit newlines. Words wider than the line
/// are broken by character.
pub fn wrap_text(
    fonts: &FontRegistry,
    font: &str,
    size: f32,
    text: &str,
    max_width: f32,
) -> Vec<String> {
    let mut lines = Vec::new();
    if text.is_empty() {
        return lines;
    }
    for paragraph in text.split('\n') {
        let paragraph = paragraph.trim_end_matches('\r');
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };
            if fonts.measure_text_width(font, size, &candidate) <= max_width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if fonts.measure_text_width(font, size, word) <= max_width {
                current = word.to_string();
                continue;
            }
            for ch in word.chars() {
                current.push(ch);
                if fonts.measure_text_width(font, size, &current) > max_width
                    && current.chars().count() > 1
                {
                    current.pop();
                    lines.push(std::mem::take(&mut current));
                    current.push(ch);
                }
            }
        }
        lines.push(current);
    }
    lines
}
