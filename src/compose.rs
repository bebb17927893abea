//! Page composition: placing a captured bitmap on a fixed-size page.

use crate::error::LedgerLeafError;
use crate::types::Size;

/// Where the bitmap lands on the page, in points from the page's top-left
/// corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Scales a `bitmap_width` x `bitmap_height` image uniformly so it fits the
/// page, centered along whichever axis has slack.
pub fn fit_to_page(
    page: Size,
    bitmap_width: u32,
    bitmap_height: u32,
) -> Result<Placement, LedgerLeafError> {
    if bitmap_width == 0 || bitmap_height == 0 {
        return Err(LedgerLeafError::DegenerateBitmap {
            width: bitmap_width,
            height: bitmap_height,
        });
    }
    let page_width = page.width.to_f64();
    let page_height = page.height.to_f64();
    if !(page_width > 0.0 && page_height > 0.0) {
        return Err(LedgerLeafError::InvalidConfiguration(format!(
            "page size must be positive, got {page_width}x{page_height}"
        )));
    }
    Ok(fit_within(
        page_width,
        page_height,
        bitmap_width as f64,
        bitmap_height as f64,
    ))
}

/// Contain-fit of a `content_width` x `content_height` box inside a frame.
/// Callers guarantee non-zero content dimensions.
pub fn fit_within(
    frame_width: f64,
    frame_height: f64,
    content_width: f64,
    content_height: f64,
) -> Placement {
    let frame_aspect = frame_width / frame_height;
    let content_aspect = content_width / content_height;
    if content_aspect > frame_aspect {
        let height = frame_width / content_aspect;
        Placement {
            x: 0.0,
            y: (frame_height - height) / 2.0,
            width: frame_width,
            height,
        }
    } else {
        let width = frame_height * content_aspect;
        Placement {
            x: (frame_width - width) / 2.0,
            y: 0.0,
            width,
            height: frame_height,
        }
    }
}

/// A page ready for encoding: the page box, where the image goes and the
/// PNG-encoded capture.
#[derive(Debug, Clone)]
pub struct ComposedPage {
    pub page_size: Size,
    pub placement: Placement,
    pub image_width: u32,
    pub image_height: u32,
    pub png: Vec<u8>,
}

impl ComposedPage {
    pub fn new(
        page_size: Size,
        image_width: u32,
        image_height: u32,
        png: Vec<u8>,
    ) -> Result<Self, LedgerLeafError> {
        let placement = fit_to_page(page_size, image_width, image_height)?;
        Ok(Self {
            page_size,
            placement,
            image_width,
            image_height,
            png,
        })
    }
}
