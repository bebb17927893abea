use crate::assets::{AssetBundle, is_remote_url, parse_data_uri};
use crate::canvas::{Command, DisplayList, TextAnchor};
use crate::compose::fit_within;
use crate::error::LedgerLeafError;
use crate::font::{FontRegistry, detect_direction};
use crate::types::{Color, Rect};
use image::ImageEncoder;
use image::codecs::png::PngEncoder;
use rayon::prelude::*;
use rustybuzz::{Face as HbFace, UnicodeBuffer};
use std::collections::HashMap;
use tiny_skia::{
    FillRule, FilterQuality, Paint, Path, PathBuilder, Pixmap, PixmapPaint, Stroke, StrokeDash,
    Transform,
};
use ttf_parser::{GlyphId, OutlineBuilder};

/// How a surface is turned into pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureOptions {
    /// Full scrollable extent of the surface in CSS pixels.
    pub width: f32,
    pub height: f32,
    /// Device pixels per CSS pixel.
    pub scale: f32,
    pub background: Color,
    pub allow_cross_origin: bool,
}

impl CaptureOptions {
    /// Options covering the full extent of `list`.
    pub fn for_list<F>(
        list: &DisplayList<F>,
        scale: f32,
        background: Color,
        allow_cross_origin: bool,
    ) -> Self {
        Self {
            width: list.width,
            height: list.height,
            scale,
            background,
            allow_cross_origin,
        }
    }

    pub fn pixel_size(&self) -> (u32, u32) {
        (
            to_device_px(self.width, self.scale),
            to_device_px(self.height, self.scale),
        )
    }
}

fn to_device_px(css: f32, scale: f32) -> u32 {
    let px = (css * scale).ceil();
    if px.is_finite() && px > 0.0 {
        px.min(u32::MAX as f32) as u32
    } else {
        0
    }
}

/// A captured surface. Pixels are premultiplied RGBA over an opaque
/// background.
pub struct Bitmap {
    pixmap: Pixmap,
}

impl Bitmap {
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let px = self.pixmap.pixel(x, y)?.demultiply();
        Some([px.red(), px.green(), px.blue(), px.alpha()])
    }

    /// Packed 8-bit RGB rows, alpha dropped.
    pub fn to_rgb8(&self) -> Vec<u8> {
        let src = self.pixmap.data();
        let mut out = vec![0u8; (self.width() as usize) * (self.height() as usize) * 3];
        out.par_chunks_exact_mut(3)
            .zip(src.par_chunks_exact(4))
            .for_each(|(dst, px)| {
                let a = px[3];
                dst[0] = demul_u8(px[0], a);
                dst[1] = demul_u8(px[1], a);
                dst[2] = demul_u8(px[2], a);
            });
        out
    }

    /// PNG bytes (8-bit RGB, not interlaced).
    pub fn encode_png(&self) -> Result<Vec<u8>, LedgerLeafError> {
        let rgb = self.to_rgb8();
        let mut png = Vec::new();
        let encoder = PngEncoder::new(&mut png);
        encoder
            .write_image(
                &rgb,
                self.width(),
                self.height(),
                image::ColorType::Rgb8.into(),
            )
            .map_err(|e| LedgerLeafError::Capture(format!("png encode failed: {e}")))?;
        Ok(png)
    }
}

#[derive(Clone)]
struct RasterState {
    fill_color: Color,
    stroke_color: Color,
    line_width: f32,
    dash_pattern: Vec<f32>,
    opacity: f32,
    font_name: String,
    font_size: f32,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            line_width: 1.0,
            dash_pattern: Vec::new(),
            opacity: 1.0,
            font_name: "Helvetica".to_string(),
            font_size: 12.0,
        }
    }
}

/// Rasterizes a display list over its full extent. Every embedded image is
/// resolved up front; one that cannot be loaded fails the whole capture
/// rather than leaving a hole in the output.
pub fn capture<F>(
    list: &DisplayList<F>,
    options: &CaptureOptions,
    fonts: &FontRegistry,
    assets: &AssetBundle,
) -> Result<Bitmap, LedgerLeafError> {
    let (width_px, height_px) = options.pixel_size();
    if width_px == 0 || height_px == 0 {
        return Err(LedgerLeafError::DegenerateBitmap {
            width: width_px,
            height: height_px,
        });
    }
    if !(options.scale.is_finite() && options.scale > 0.0) {
        return Err(LedgerLeafError::InvalidConfiguration(format!(
            "capture scale must be positive, got {}",
            options.scale
        )));
    }

    let images = resolve_images(list, options.allow_cross_origin, assets)?;

    let mut pixmap = Pixmap::new(width_px, height_px).ok_or_else(|| {
        LedgerLeafError::Capture(format!(
            "could not allocate {}x{} capture buffer",
            width_px, height_px
        ))
    })?;
    pixmap.fill(to_sk_color(options.background, 1.0));

    let transform = Transform::from_scale(options.scale, options.scale);
    render_commands(&mut pixmap, &list.commands, transform, fonts, &images);

    tracing::debug!(
        width = width_px,
        height = height_px,
        commands = list.command_count(),
        images = images.len(),
        "surface captured"
    );
    Ok(Bitmap { pixmap })
}

fn resolve_images<F>(
    list: &DisplayList<F>,
    allow_cross_origin: bool,
    assets: &AssetBundle,
) -> Result<HashMap<String, Pixmap>, LedgerLeafError> {
    let mut images = HashMap::new();
    for source in list.image_sources() {
        if images.contains_key(source) {
            continue;
        }
        let pixmap = load_image_pixmap(source, allow_cross_origin, assets)?;
        images.insert(source.to_string(), pixmap);
    }
    Ok(images)
}

fn render_commands(
    pixmap: &mut Pixmap,
    commands: &[Command],
    transform: Transform,
    fonts: &FontRegistry,
    images: &HashMap<String, Pixmap>,
) {
    let mut state = RasterState::default();
    let mut stack: Vec<RasterState> = Vec::new();

    for command in commands {
        match command {
            Command::SaveState => stack.push(state.clone()),
            Command::RestoreState => {
                if let Some(prev) = stack.pop() {
                    state = prev;
                }
            }
            Command::SetFillColor(color) => state.fill_color = *color,
            Command::SetStrokeColor(color) => state.stroke_color = *color,
            Command::SetLineWidth(width) => state.line_width = width.max(0.0),
            Command::SetDash(pattern) => state.dash_pattern = pattern.clone(),
            Command::SetOpacity(opacity) => state.opacity = opacity.clamp(0.0, 1.0),
            Command::SetFontName(name) => state.font_name = name.clone(),
            Command::SetFontSize(size) => state.font_size = *size,
            Command::FillRect(rect) => {
                if let Some(path) = rect_path(*rect) {
                    fill_path(pixmap, &path, &state, transform);
                }
            }
            Command::FillRoundedRect { rect, radius } => {
                if let Some(path) = rounded_rect_path(*rect, *radius) {
                    fill_path(pixmap, &path, &state, transform);
                }
            }
            Command::StrokeRect(rect) => {
                if let Some(path) = rect_path(*rect) {
                    stroke_path(pixmap, &path, &state, transform);
                }
            }
            Command::StrokeRoundedRect { rect, radius } => {
                if let Some(path) = rounded_rect_path(*rect, *radius) {
                    stroke_path(pixmap, &path, &state, transform);
                }
            }
            Command::Line { x1, y1, x2, y2 } => {
                let mut pb = PathBuilder::new();
                pb.move_to(*x1, *y1);
                pb.line_to(*x2, *y2);
                if let Some(path) = pb.finish() {
                    stroke_path(pixmap, &path, &state, transform);
                }
            }
            Command::DrawString { x, y, text, anchor } => {
                draw_string(pixmap, &state, *x, *y, text, *anchor, transform, fonts);
            }
            Command::DrawImage { rect, source } => {
                if let Some(image) = images.get(source) {
                    draw_image(pixmap, &state, *rect, image, transform);
                }
            }
        }
    }
}

fn fill_path(pixmap: &mut Pixmap, path: &Path, state: &RasterState, transform: Transform) {
    let paint = fill_paint(state.fill_color, state.opacity);
    pixmap.fill_path(path, &paint, FillRule::Winding, transform, None);
}

fn stroke_path(pixmap: &mut Pixmap, path: &Path, state: &RasterState, transform: Transform) {
    if state.line_width <= 0.0 {
        return;
    }
    let paint = fill_paint(state.stroke_color, state.opacity);
    let stroke = build_stroke(state);
    pixmap.stroke_path(path, &paint, &stroke, transform, None);
}

fn rect_path(rect: Rect) -> Option<Path> {
    let rect = tiny_skia::Rect::from_xywh(rect.x, rect.y, rect.width, rect.height)?;
    Some(PathBuilder::from_rect(rect))
}

fn rounded_rect_path(rect: Rect, radius: f32) -> Option<Path> {
    let r = radius.max(0.0).min(rect.width / 2.0).min(rect.height / 2.0);
    if r <= 0.0 {
        return rect_path(rect);
    }
    // Cubic approximation of a quarter circle.
    let k = r * 0.552_284_8;
    let (x0, y0, x1, y1) = (rect.x, rect.y, rect.right(), rect.bottom());
    let mut pb = PathBuilder::new();
    pb.move_to(x0 + r, y0);
    pb.line_to(x1 - r, y0);
    pb.cubic_to(x1 - r + k, y0, x1, y0 + r - k, x1, y0 + r);
    pb.line_to(x1, y1 - r);
    pb.cubic_to(x1, y1 - r + k, x1 - r + k, y1, x1 - r, y1);
    pb.line_to(x0 + r, y1);
    pb.cubic_to(x0 + r - k, y1, x0, y1 - r + k, x0, y1 - r);
    pb.line_to(x0, y0 + r);
    pb.cubic_to(x0, y0 + r - k, x0 + r - k, y0, x0 + r, y0);
    pb.close();
    pb.finish()
}

fn draw_image(
    pixmap: &mut Pixmap,
    state: &RasterState,
    rect: Rect,
    image: &Pixmap,
    transform: Transform,
) {
    if rect.width <= 0.0 || rect.height <= 0.0 || image.width() == 0 || image.height() == 0 {
        return;
    }
    let fit = fit_within(
        rect.width as f64,
        rect.height as f64,
        image.width() as f64,
        image.height() as f64,
    );
    let sx = fit.width as f32 / image.width() as f32;
    let sy = fit.height as f32 / image.height() as f32;
    let local = transform
        .pre_translate(rect.x + fit.x as f32, rect.y + fit.y as f32)
        .pre_scale(sx, sy);
    let paint = PixmapPaint {
        opacity: state.opacity,
        quality: FilterQuality::Bicubic,
        ..PixmapPaint::default()
    };
    pixmap.draw_pixmap(0, 0, image.as_ref(), &paint, local, None);
}

#[allow(clippy::too_many_arguments)]
fn draw_string(
    pixmap: &mut Pixmap,
    state: &RasterState,
    x: f32,
    y: f32,
    text: &str,
    anchor: TextAnchor,
    transform: Transform,
    fonts: &FontRegistry,
) {
    let font_size = state.font_size.max(0.0);
    if font_size <= 0.0 || text.is_empty() {
        return;
    }
    let Some(font_data) = fonts.resolve(&state.font_name) else {
        tracing::trace!(font = %state.font_name, "no font for text run, skipped");
        return;
    };
    let Ok(face) = ttf_parser::Face::parse(font_data.as_slice(), 0) else {
        return;
    };
    let (placements, advance) = layout_text_glyphs(font_data.as_slice(), text, font_size);
    let start_x = match anchor {
        TextAnchor::Start => x,
        TextAnchor::End => x - advance,
    };
    let paint = fill_paint(state.fill_color, state.opacity);
    for placement in placements {
        let mut builder = GlyphPathBuilder::new(
            start_x + placement.offset_x,
            y + placement.offset_y,
            placement.scale,
        );
        if face
            .outline_glyph(GlyphId(placement.glyph_id), &mut builder)
            .is_none()
        {
            continue;
        }
        let Some(path) = builder.finish() else {
            continue;
        };
        pixmap.fill_path(&path, &paint, FillRule::Winding, transform, None);
    }
}

#[derive(Clone, Copy)]
struct GlyphPlacement {
    glyph_id: u16,
    offset_x: f32,
    offset_y: f32,
    scale: f32,
}

/// Shapes `text` and returns glyph origins relative to the pen start plus
/// the total advance.
fn layout_text_glyphs(font_data: &[u8], text: &str, font_size: f32) -> (Vec<GlyphPlacement>, f32) {
    let Some(face) = HbFace::from_slice(font_data, 0) else {
        return (Vec::new(), 0.0);
    };
    let units = face.units_per_em().max(1) as f32;
    let scale = font_size / units;
    let mut buffer = UnicodeBuffer::new();
    buffer.set_direction(detect_direction(text));
    buffer.push_str(text);
    let output = rustybuzz::shape(&face, &[], buffer);

    let mut out = Vec::with_capacity(output.len());
    let mut pen_x = 0.0f32;
    for (info, pos) in output.glyph_infos().iter().zip(output.glyph_positions()) {
        let gid = info.glyph_id as u16;
        if gid != 0 {
            out.push(GlyphPlacement {
                glyph_id: gid,
                offset_x: pen_x + pos.x_offset as f32 * scale,
                // Font units grow upward, surface pixels grow downward.
                offset_y: -(pos.y_offset as f32 * scale),
                scale,
            });
        }
        pen_x += pos.x_advance as f32 * scale;
    }
    (out, pen_x)
}

/// Converts y-up glyph outlines into y-down surface paths.
struct GlyphPathBuilder {
    builder: PathBuilder,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

impl GlyphPathBuilder {
    fn new(origin_x: f32, origin_y: f32, scale: f32) -> Self {
        Self {
            builder: PathBuilder::new(),
            origin_x,
            origin_y,
            scale,
        }
    }

    fn finish(self) -> Option<Path> {
        self.builder.finish()
    }

    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.origin_y - y * self.scale)
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

fn build_stroke(state: &RasterState) -> Stroke {
    let mut stroke = Stroke {
        width: state.line_width.max(0.0),
        ..Stroke::default()
    };
    if !state.dash_pattern.is_empty() {
        let mut pattern: Vec<f32> = state.dash_pattern.iter().map(|p| p.abs()).collect();
        if pattern.len() % 2 == 1 {
            let copy = pattern.clone();
            pattern.extend(copy);
        }
        stroke.dash = StrokeDash::new(pattern, 0.0);
    }
    stroke
}

fn fill_paint(color: Color, opacity: f32) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(to_sk_color(color, opacity));
    paint.anti_alias = true;
    paint
}

fn to_sk_color(color: Color, opacity: f32) -> tiny_skia::Color {
    let r = color.r.clamp(0.0, 1.0);
    let g = color.g.clamp(0.0, 1.0);
    let b = color.b.clamp(0.0, 1.0);
    let a = opacity.clamp(0.0, 1.0);
    tiny_skia::Color::from_rgba(r, g, b, a)
        .unwrap_or_else(|| tiny_skia::Color::from_rgba8(0, 0, 0, 255))
}

fn load_image_pixmap(
    source: &str,
    allow_cross_origin: bool,
    assets: &AssetBundle,
) -> Result<Pixmap, LedgerLeafError> {
    if source.starts_with("data:") {
        let (mime, data) = parse_data_uri(source)
            .ok_or_else(|| LedgerLeafError::Capture("malformed data URL image".to_string()))?;
        return decode_image_to_pixmap(&data, Some(&mime));
    }
    if is_remote_url(source) {
        if !allow_cross_origin {
            return Err(LedgerLeafError::TaintedImage(source.to_string()));
        }
        let data = assets.image(source).ok_or_else(|| {
            LedgerLeafError::TaintedImage(format!("{source} (not preloaded)"))
        })?;
        return decode_image_to_pixmap(data, None);
    }
    Err(LedgerLeafError::Capture(format!(
        "unsupported image source {source:?}; expected a data: or http(s) URL"
    )))
}

fn decode_image_to_pixmap(data: &[u8], mime: Option<&str>) -> Result<Pixmap, LedgerLeafError> {
    let guessed_format = match mime {
        Some(mime) if mime.contains("png") => Some(image::ImageFormat::Png),
        Some(mime) if mime.contains("jpeg") || mime.contains("jpg") => {
            Some(image::ImageFormat::Jpeg)
        }
        _ => image::guess_format(data).ok(),
    };
    let decoded = match guessed_format {
        Some(fmt) => image::load_from_memory_with_format(data, fmt),
        None => image::load_from_memory(data),
    }
    .map_err(|e| LedgerLeafError::Capture(format!("image decode failed: {e}")))?;

    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
        LedgerLeafError::Capture(format!("invalid image size {width}x{height}"))
    })?;
    let src = rgba.as_raw();
    let dst = pixmap.data_mut();
    for (src_px, dst_px) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
        let a = src_px[3];
        dst_px[0] = premul_u8(src_px[0], a);
        dst_px[1] = premul_u8(src_px[1], a);
        dst_px[2] = premul_u8(src_px[2], a);
        dst_px[3] = a;
    }
    Ok(pixmap)
}

fn premul_u8(channel: u8, alpha: u8) -> u8 {
    let prod = (channel as u16) * (alpha as u16) + 127;
    ((prod + (prod >> 8)) >> 8) as u8
}

fn demul_u8(channel: u8, alpha: u8) -> u8 {
    match alpha {
        0 => 0,
        255 => channel,
        a => (((channel as u32) * 255 + (a as u32) / 2) / (a as u32)).min(255) as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{Asset, AssetKind, to_data_url};
    use crate::canvas::Canvas;
    use crate::error::FailureKind;

    fn fonts() -> FontRegistry {
        let mut fonts = FontRegistry::new();
        fonts.set_system_fallback(false);
        fonts
    }

    fn png_data_url(w: u32, h: u32, rgb: [u8; 3]) -> String {
        let img = image::RgbImage::from_pixel(w, h, image::Rgb(rgb));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png)
            .expect("encode png");
        to_data_url("image/png", &out.into_inner())
    }

    fn assert_near(actual: Option<[u8; 4]>, expected: [u8; 4]) {
        let actual = actual.expect("pixel in bounds");
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert!(a.abs_diff(*e) <= 2, "{actual:?} vs {expected:?}");
        }
    }

    fn options(width: f32, height: f32) -> CaptureOptions {
        CaptureOptions {
            width,
            height,
            scale: 2.0,
            background: Color::WHITE,
            allow_cross_origin: true,
        }
    }

    #[test]
    fn capture_covers_full_extent_at_scale() {
        let mut canvas: Canvas<()> = Canvas::new(100.0);
        canvas.set_fill_color(Color::rgb8(255, 0, 0));
        canvas.fill_rect(Rect::new(0.0, 240.0, 100.0, 10.0));
        let list = canvas.finish(250.0);
        let bitmap = capture(&list, &options(100.0, 250.0), &fonts(), &AssetBundle::default())
            .expect("capture");
        assert_eq!((bitmap.width(), bitmap.height()), (200, 500));
        // Content below any viewport fold is still painted.
        assert_eq!(bitmap.pixel(10, 495), Some([255, 0, 0, 255]));
        assert_eq!(bitmap.pixel(10, 10), Some([255, 255, 255, 255]));
    }

    #[test]
    fn background_follows_options() {
        let list: DisplayList<()> = Canvas::new(10.0).finish(10.0);
        let mut opts = options(10.0, 10.0);
        opts.background = Color::rgb8(9, 9, 11);
        let bitmap = capture(&list, &opts, &fonts(), &AssetBundle::default()).expect("capture");
        assert_eq!(bitmap.pixel(5, 5), Some([9, 9, 11, 255]));
        assert_eq!(&bitmap.to_rgb8()[..3], &[9, 9, 11]);
    }

    #[test]
    fn zero_height_is_degenerate() {
        let list: DisplayList<()> = Canvas::new(10.0).finish(0.0);
        let err = capture(&list, &options(10.0, 0.0), &fonts(), &AssetBundle::default())
            .err()
            .expect("degenerate");
        assert!(matches!(err, LedgerLeafError::DegenerateBitmap { height: 0, .. }));
    }

    #[test]
    fn embedded_image_is_contain_fitted() {
        let mut canvas: Canvas<()> = Canvas::new(40.0);
        // 2:1 image in a square box leaves bands above and below.
        canvas.draw_image(Rect::new(0.0, 0.0, 40.0, 40.0), png_data_url(20, 10, [0, 0, 255]));
        let list = canvas.finish(40.0);
        let bitmap = capture(&list, &options(40.0, 40.0), &fonts(), &AssetBundle::default())
            .expect("capture");
        assert_near(bitmap.pixel(40, 40), [0, 0, 255, 255]);
        assert_eq!(bitmap.pixel(40, 5), Some([255, 255, 255, 255]));
        assert_eq!(bitmap.pixel(40, 75), Some([255, 255, 255, 255]));
    }

    #[test]
    fn undecodable_image_fails_capture() {
        let mut canvas: Canvas<()> = Canvas::new(40.0);
        canvas.draw_image(
            Rect::new(0.0, 0.0, 40.0, 40.0),
            "data:image/png;base64,AAAA",
        );
        let list = canvas.finish(40.0);
        let err = capture(&list, &options(40.0, 40.0), &fonts(), &AssetBundle::default())
            .err()
            .expect("decode failure");
        assert_eq!(err.kind(), FailureKind::Capture);
    }

    #[test]
    fn remote_images_need_cross_origin_and_preload() {
        let url = "https://cdn.example.com/logo.png";
        let mut canvas: Canvas<()> = Canvas::new(40.0);
        canvas.draw_image(Rect::new(0.0, 0.0, 40.0, 40.0), url);
        let list = canvas.finish(40.0);

        let mut opts = options(40.0, 40.0);
        let empty = AssetBundle::default();
        let err = capture(&list, &opts, &fonts(), &empty).err().expect("tainted");
        assert!(matches!(err, LedgerLeafError::TaintedImage(_)));

        let mut bundle = AssetBundle::default();
        let data_url = png_data_url(4, 4, [0, 255, 0]);
        let (_, bytes) = parse_data_uri(&data_url).expect("data uri");
        bundle.add(Asset::new(url, AssetKind::Image, bytes));
        let bitmap = capture(&list, &opts, &fonts(), &bundle).expect("preloaded");
        assert_near(bitmap.pixel(40, 40), [0, 255, 0, 255]);

        opts.allow_cross_origin = false;
        let err = capture(&list, &opts, &fonts(), &bundle).err().expect("blocked");
        assert!(matches!(err, LedgerLeafError::TaintedImage(_)));
    }

    #[test]
    fn local_paths_are_never_read() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("logo.png");
        image::RgbImage::from_pixel(4, 4, image::Rgb([0, 0, 0]))
            .save(&path)
            .expect("write png");
        let mut canvas: Canvas<()> = Canvas::new(40.0);
        canvas.draw_image(
            Rect::new(0.0, 0.0, 40.0, 40.0),
            path.to_string_lossy().into_owned(),
        );
        let list = canvas.finish(40.0);
        let err = capture(&list, &options(40.0, 40.0), &fonts(), &AssetBundle::default())
            .err()
            .expect("local path rejected");
        assert_eq!(err.kind(), FailureKind::Capture);
    }

    #[test]
    fn options_for_list_cover_its_extent() {
        let list: DisplayList<()> = Canvas::new(30.0).finish(45.5);
        let opts = CaptureOptions::for_list(&list, 2.0, Color::WHITE, false);
        assert_eq!((opts.width, opts.height), (30.0, 45.5));
        assert_eq!(opts.pixel_size(), (60, 91));
        assert!(!opts.allow_cross_origin);
    }

    #[test]
    fn png_accessor_produces_rgb_png() {
        let list: DisplayList<()> = Canvas::new(3.0).finish(2.0);
        let bitmap = capture(&list, &options(3.0, 2.0), &fonts(), &AssetBundle::default())
            .expect("capture");
        let png = bitmap.encode_png().expect("png");
        let decoded = image::load_from_memory(&png).expect("decode");
        assert_eq!((decoded.width(), decoded.height()), (6, 4));
        assert_eq!(decoded.color(), image::ColorType::Rgb8);
    }

    #[test]
    fn opacity_is_restored_after_state_pop() {
        let mut canvas: Canvas<()> = Canvas::new(10.0);
        canvas.save_state();
        canvas.set_opacity(0.0);
        canvas.restore_state();
        canvas.fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        let list = canvas.finish(10.0);
        let bitmap = capture(&list, &options(10.0, 10.0), &fonts(), &AssetBundle::default())
            .expect("capture");
        assert_eq!(bitmap.pixel(5, 5), Some([0, 0, 0, 255]));
    }

    #[test]
    fn channel_math_round_trips_opaque_pixels() {
        assert_eq!(premul_u8(200, 255), 200);
        assert_eq!(demul_u8(200, 255), 200);
        assert_eq!(demul_u8(64, 128), 128);
        assert_eq!(demul_u8(10, 0), 0);
    }
}
