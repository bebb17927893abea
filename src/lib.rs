//! Invoice editing core: a document model, a laid-out surface that can be
//! rasterized, and a guarded pipeline that turns that raster into a
//! single-page PDF for download or preview.

mod assets;
mod canvas;
mod compose;
mod config;
mod controller;
mod drafts;
mod error;
mod font;
mod layout;
mod model;
mod pdf;
mod perf;
mod raster;
mod session;
mod sink;
mod surface;
mod theme;
mod types;

pub use assets::{Asset, AssetBundle, AssetKind, is_remote_url, read_image_data_url, to_data_url};
pub use canvas::{Canvas, Command, DisplayList, FieldBox, TextAnchor};
pub use compose::{ComposedPage, Placement, fit_to_page, fit_within};
pub use config::{ConfigFile, DEFAULT_FAILURE_MESSAGE, GeneratorConfig, GeneratorConfigBuilder};
pub use controller::{
    GenerateRequest, GenerationController, GenerationOutcome, Notice, NoticeLevel, Notifier,
    SkipReason, TracingNotifier,
};
pub use drafts::{DraftStore, SavedInvoice};
pub use error::{FailureKind, LedgerLeafError};
pub use font::{FontRegistry, SANS, SANS_BOLD};
pub use layout::{LayoutInput, SURFACE_WIDTH, layout_invoice, wrap_text};
pub use model::{
    AdjustmentKind, BankDetails, BankField, BusinessField, BusinessInfo, COLORS, ClientField,
    ClientInfo, Currency, Invoice, InvoiceItem, ItemField, TERMS, Totals, coerce_amount,
    compute_subtotal, compute_total, compute_totals, format_currency, parse_quantity, parse_rate,
};
pub use pdf::{composed_page_to_pdf, document_title};
pub use perf::PerfLogger;
pub use raster::{Bitmap, CaptureOptions, capture};
pub use session::EditorSession;
pub use sink::{
    BlobStore, BlobUrl, DirectoryTarget, OutputAction, PREVIEW_DOWNLOAD_NAME, PreviewState,
    SaveTarget, SavedFile, download_filename,
};
pub use surface::{FieldId, RenderMode, Surface, SurfaceMount};
pub use theme::{Palette, Theme};
pub use types::{Color, Pt, Rect, Size};
