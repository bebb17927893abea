use crate::compose::ComposedPage;
use crate::error::LedgerLeafError;
use lopdf::{
    Document as LoDocument, Object as LoObject, Stream as LoStream, StringFormat, dictionary,
};

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
const IMAGE_NAME: &str = "Im1";
const PRODUCER: &str = concat!("ledgerleaf ", env!("CARGO_PKG_VERSION"));

/// The parts of a PNG needed to embed it without re-encoding.
#[derive(Debug)]
struct PngImage {
    width: u32,
    height: u32,
    idat: Vec<u8>,
}

/// Splits an 8-bit RGB, non-interlaced PNG into its header fields and the
/// concatenated zlib stream of its IDAT chunks.
fn parse_png(data: &[u8]) -> Result<PngImage, LedgerLeafError> {
    if data.len() < PNG_SIGNATURE.len() || data[..8] != PNG_SIGNATURE {
        return Err(LedgerLeafError::Pdf("capture is not a PNG stream".to_string()));
    }
    let mut pos = PNG_SIGNATURE.len();
    let mut header: Option<(u32, u32)> = None;
    let mut idat = Vec::new();
    while pos + 8 <= data.len() {
        let len = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
            as usize;
        let kind = &data[pos + 4..pos + 8];
        let body_start = pos + 8;
        let body_end = body_start
            .checked_add(len)
            .filter(|end| end + 4 <= data.len())
            .ok_or_else(|| LedgerLeafError::Pdf("truncated PNG chunk".to_string()))?;
        let body = &data[body_start..body_end];
        match kind {
            b"IHDR" => {
                if body.len() < 13 {
                    return Err(LedgerLeafError::Pdf("short IHDR chunk".to_string()));
                }
                let width = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
                let height = u32::from_be_bytes([body[4], body[5], body[6], body[7]]);
                let (bit_depth, color_type, interlace) = (body[8], body[9], body[12]);
                if bit_depth != 8 || color_type != 2 || interlace != 0 {
                    return Err(LedgerLeafError::Pdf(format!(
                        "unsupported PNG layout: depth={bit_depth} color={color_type} interlace={interlace}"
                    )));
                }
                header = Some((width, height));
            }
            b"IDAT" => idat.extend_from_slice(body),
            b"IEND" => break,
            _ => {}
        }
        pos = body_end + 4;
    }
    let (width, height) =
        header.ok_or_else(|| LedgerLeafError::Pdf("PNG without IHDR".to_string()))?;
    if idat.is_empty() {
        return Err(LedgerLeafError::Pdf("PNG without image data".to_string()));
    }
    Ok(PngImage {
        width,
        height,
        idat,
    })
}

fn fmt_num(value: f64) -> String {
    let mut s = format!("{:.4}", value);
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    if s == "-0" { "0".to_string() } else { s }
}

/// Writes a one-page PDF whose only content is the composed image.
pub fn composed_page_to_pdf(page: &ComposedPage, title: &str) -> Result<Vec<u8>, LedgerLeafError> {
    let png = parse_png(&page.png)?;
    if png.width != page.image_width || png.height != page.image_height {
        return Err(LedgerLeafError::Pdf(format!(
            "image is {}x{} but page was composed for {}x{}",
            png.width, png.height, page.image_width, page.image_height
        )));
    }

    let page_w = page.page_size.width.to_f64();
    let page_h = page.page_size.height.to_f64();
    let p = page.placement;

    let mut doc = LoDocument::with_version("1.4");
    let pages_id = doc.new_object_id();

    let image = LoStream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => png.width as i64,
            "Height" => png.height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
            "DecodeParms" => dictionary! {
                "Predictor" => 15,
                "Colors" => 3,
                "BitsPerComponent" => 8,
                "Columns" => png.width as i64,
            },
        },
        png.idat,
    )
    .with_compression(false);
    let image_id = doc.add_object(image);

    // Placement is measured from the top edge; PDF user space grows upward.
    let content = format!(
        "q {} 0 0 {} {} {} cm /{} Do Q\n",
        fmt_num(p.width),
        fmt_num(p.height),
        fmt_num(p.x),
        fmt_num(page_h - p.y - p.height),
        IMAGE_NAME
    )
    .into_bytes();
    let content_id = doc.add_object(LoStream::new(dictionary! {}, content));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { IMAGE_NAME => image_id },
        },
        "MediaBox" => vec![
            0.into(),
            0.into(),
            LoObject::Real(page_w as f32),
            LoObject::Real(page_h as f32),
        ],
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
    };
    doc.objects.insert(pages_id, LoObject::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => LoObject::String(title.as_bytes().to_vec(), StringFormat::Literal),
        "Producer" => LoObject::String(PRODUCER.as_bytes().to_vec(), StringFormat::Literal),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    tracing::debug!(bytes = out.len(), "pdf written");
    Ok(out)
}

/// Title recorded in the document info: `Invoice <number>`, or just
/// `Invoice` when the number is blank.
pub fn document_title(invoice_number: &str) -> String {
    let number = invoice_number.trim();
    if number.is_empty() {
        "Invoice".to_string()
    } else {
        format!("Invoice {}", number)
    }
}
