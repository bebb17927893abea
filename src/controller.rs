//! The generation controller: the single entry point that turns the mounted
//! surface into a downloaded file or a preview URL.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use crate::assets::{Asset, AssetBundle, AssetKind};
use crate::canvas::DisplayList;
use crate::compose::ComposedPage;
use crate::config::GeneratorConfig;
use crate::error::{FailureKind, LedgerLeafError};
use crate::font::FontRegistry;
use crate::pdf::{composed_page_to_pdf, document_title};
use crate::perf::PerfLogger;
use crate::raster::{CaptureOptions, capture};
use crate::sink::{
    BlobStore, BlobUrl, OutputAction, PREVIEW_DOWNLOAD_NAME, PreviewState, SaveTarget, SavedFile,
    download_filename,
};
use crate::surface::{FieldId, SurfaceMount};
use crate::theme::Theme;
use crate::types::Size;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub action: OutputAction,
    pub theme: Theme,
    pub invoice_number: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another generation was already running.
    Busy,
    NoSurface,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Downloaded(SavedFile),
    Previewed(BlobUrl),
    Skipped(SkipReason),
    Failed { kind: FailureKind, message: String },
}

impl GenerationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            GenerationOutcome::Downloaded(_) | GenerationOutcome::Previewed(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A message meant for the person using the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Routes notices into the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => tracing::info!(notice = %notice.message, "notice"),
            NoticeLevel::Error => tracing::error!(notice = %notice.message, "notice"),
        }
    }
}

/// Clears the busy flag when dropped, whichever way generation ends.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

struct Inner {
    config: GeneratorConfig,
    mount: SurfaceMount,
    target: Arc<dyn SaveTarget>,
    notifier: Arc<dyn Notifier>,
    blobs: BlobStore,
    preview: Mutex<PreviewState>,
    assets: RwLock<Arc<AssetBundle>>,
    generating: AtomicBool,
    runs: AtomicU64,
    perf: Option<PerfLogger>,
}

#[derive(Clone)]
pub struct GenerationController {
    inner: Arc<Inner>,
}

impl GenerationController {
    pub fn new(
        config: GeneratorConfig,
        mount: SurfaceMount,
        target: Arc<dyn SaveTarget>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, LedgerLeafError> {
        let perf = match &config.perf_log {
            Some(path) => Some(PerfLogger::new(path).map_err(|e| {
                LedgerLeafError::InvalidConfiguration(format!(
                    "perf log {}: {e}",
                    path.display()
                ))
            })?),
            None => None,
        };
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                mount,
                target,
                notifier,
                blobs: BlobStore::new(),
                preview: Mutex::new(PreviewState::default()),
                assets: RwLock::new(Arc::new(AssetBundle::default())),
                generating: AtomicBool::new(false),
                runs: AtomicU64::new(0),
                perf,
            }),
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.inner.config
    }

    pub fn mount(&self) -> &SurfaceMount {
        &self.inner.mount
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.inner.blobs
    }

    pub fn is_generating(&self) -> bool {
        self.inner.generating.load(Ordering::Acquire)
    }

    pub fn preview_url(&self) -> Option<BlobUrl> {
        self.inner
            .preview
            .lock()
            .ok()
            .and_then(|preview| preview.url().cloned())
    }

    pub fn is_preview_open(&self) -> bool {
        self.inner
            .preview
            .lock()
            .map(|preview| preview.is_open())
            .unwrap_or(false)
    }

    pub fn preview_bytes(&self) -> Option<Arc<Vec<u8>>> {
        let url = self.preview_url()?;
        self.inner.blobs.get(&url)
    }

    /// Dismisses the preview and releases its URL.
    pub fn close_preview(&self) -> bool {
        match self.inner.preview.lock() {
            Ok(mut preview) => preview.close(&self.inner.blobs),
            Err(_) => false,
        }
    }

    /// Saves the PDF currently in the preview viewer.
    pub fn download_preview(&self) -> Result<SavedFile, LedgerLeafError> {
        let bytes = self
            .preview_bytes()
            .ok_or_else(|| LedgerLeafError::Sink("no preview to download".to_string()))?;
        self.inner.target.save(PREVIEW_DOWNLOAD_NAME, &bytes)
    }

    /// Makes a remote image available to captures. Remote sources that were
    /// never registered fail the capture as tainted.
    pub fn register_remote_image(&self, url: impl Into<String>, bytes: Vec<u8>) {
        if let Ok(mut assets) = self.inner.assets.write() {
            Arc::make_mut(&mut *assets).add(Asset::new(url, AssetKind::Image, bytes));
        }
    }

    fn assets_snapshot(&self) -> Arc<AssetBundle> {
        self.inner
            .assets
            .read()
            .map(|assets| assets.clone())
            .unwrap_or_default()
    }

    /// Runs one generation. Never returns an error: failures are logged,
    /// reported once through the notifier and returned as
    /// [`GenerationOutcome::Failed`].
    pub async fn generate(&self, request: GenerateRequest) -> GenerationOutcome {
        let Some(_busy) = BusyGuard::acquire(&self.inner.generating) else {
            tracing::debug!(action = request.action.as_str(), "generation in flight, request dropped");
            return GenerationOutcome::Skipped(SkipReason::Busy);
        };
        let run = self.inner.runs.fetch_add(1, Ordering::Relaxed) + 1;

        let Some(had_focus) = self.inner.mount.with(|surface| surface.blur()) else {
            tracing::debug!(run, "no surface mounted, nothing to capture");
            return GenerationOutcome::Skipped(SkipReason::NoSurface);
        };
        tracing::debug!(run, action = request.action.as_str(), had_focus, "generation started");

        let settle_started = Instant::now();
        tokio::time::sleep(self.inner.config.settle_delay).await;
        let frame = self
            .inner
            .mount
            .with(|surface| (surface.flush(), surface.fonts().clone()));
        if let Some(perf) = &self.inner.perf {
            perf.log_span_ms("settle", run, settle_started.elapsed().as_secs_f64() * 1000.0);
        }
        let Some((list, fonts)) = frame else {
            tracing::debug!(run, "surface detached while settling");
            return GenerationOutcome::Skipped(SkipReason::NoSurface);
        };

        let outcome = match self.run_pipeline(run, &request, list, fonts).await {
            Ok(outcome) => outcome,
            Err(err) => self.fail(run, err),
        };
        if let Some(perf) = &self.inner.perf {
            perf.flush();
        }
        outcome
    }

    async fn run_pipeline(
        &self,
        run: u64,
        request: &GenerateRequest,
        list: Arc<DisplayList<FieldId>>,
        fonts: Arc<FontRegistry>,
    ) -> Result<GenerationOutcome, LedgerLeafError> {
        let config = &self.inner.config;
        let options = CaptureOptions::for_list(
            &list,
            config.capture_scale,
            config.background(request.theme),
            config.allow_cross_origin,
        );
        let assets = self.assets_snapshot();
        let page_size = config.page_size;
        let title = document_title(&request.invoice_number);
        let perf = self.inner.perf.clone();

        let pdf = tokio::task::spawn_blocking(move || {
            render_pdf(
                run,
                &list,
                &options,
                &fonts,
                &assets,
                page_size,
                &title,
                perf.as_ref(),
            )
        })
        .await
        .map_err(|e| LedgerLeafError::Capture(format!("render task failed: {e}")))??;

        let sink_started = Instant::now();
        let outcome = match request.action {
            OutputAction::Download => {
                let filename = download_filename(&request.invoice_number);
                let saved = self.inner.target.save(&filename, &pdf)?;
                GenerationOutcome::Downloaded(saved)
            }
            OutputAction::Preview => {
                let url = self.inner.blobs.create(pdf)?;
                let mut preview = self
                    .inner
                    .preview
                    .lock()
                    .map_err(|_| LedgerLeafError::Sink("preview state poisoned".to_string()))?;
                preview.present(&self.inner.blobs, url.clone());
                tracing::info!(run, url = %url, "preview ready");
                GenerationOutcome::Previewed(url)
            }
        };
        if let Some(perf) = &self.inner.perf {
            perf.log_span_ms("sink", run, sink_started.elapsed().as_secs_f64() * 1000.0);
        }
        Ok(outcome)
    }

    fn fail(&self, run: u64, err: LedgerLeafError) -> GenerationOutcome {
        let kind = err.kind();
        if kind == FailureKind::MissingSurface {
            tracing::debug!(run, "surface vanished during generation");
            return GenerationOutcome::Skipped(SkipReason::NoSurface);
        }
        tracing::error!(run, kind = kind.as_str(), error = %err, "pdf generation failed");
        self.inner
            .notifier
            .notify(Notice::error(self.inner.config.failure_message.clone()));
        GenerationOutcome::Failed {
            kind,
            message: err.to_string(),
        }
    }
}

fn timed<R>(perf: Option<&PerfLogger>, name: &str, run: u64, f: impl FnOnce() -> R) -> R {
    match perf {
        Some(perf) => perf.time(name, run, f),
        None => f(),
    }
}

#[allow(clippy::too_many_arguments)]
fn render_pdf(
    run: u64,
    list: &DisplayList<FieldId>,
    options: &CaptureOptions,
    fonts: &FontRegistry,
    assets: &AssetBundle,
    page_size: Size,
    title: &str,
    perf: Option<&PerfLogger>,
) -> Result<Vec<u8>, LedgerLeafError> {
    let bitmap = timed(perf, "capture", run, || capture(list, options, fonts, assets))?;
    let page = timed(perf, "compose", run, || {
        let png = bitmap.encode_png()?;
        ComposedPage::new(page_size, bitmap.width(), bitmap.height(), png)
    })?;
    let pdf = timed(perf, "encode", run, || composed_page_to_pdf(&page, title))?;
    if let Some(perf) = perf {
        perf.log_counts(
            "generate",
            run,
            &[
                ("width_px", bitmap.width() as u64),
                ("height_px", bitmap.height() as u64),
                ("png_bytes", page.png.len() as u64),
                ("pdf_bytes", pdf.len() as u64),
            ],
        );
    }
    tracing::debug!(
        run,
        width = bitmap.width(),
        height = bitmap.height(),
        pdf_bytes = pdf.len(),
        "page rendered"
    );
    Ok(pdf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Invoice;
    use crate::surface::Surface;
    use lopdf::{Document as LoDocument, Object as LoObject};
    use std::path::PathBuf;
    use std::time::Duration;

    #[derive(Default)]
    struct MemoryTarget {
        files: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl MemoryTarget {
        fn files(&self) -> Vec<(String, Vec<u8>)> {
            self.files.lock().expect("files").clone()
        }
    }

    impl SaveTarget for MemoryTarget {
        fn save(&self, filename: &str, bytes: &[u8]) -> Result<SavedFile, LedgerLeafError> {
            self.files
                .lock()
                .expect("files")
                .push((filename.to_string(), bytes.to_vec()));
            Ok(SavedFile {
                filename: filename.to_string(),
                location: PathBuf::from(filename),
                bytes: bytes.len(),
            })
        }
    }

    struct FailingTarget;

    impl SaveTarget for FailingTarget {
        fn save(&self, _filename: &str, _bytes: &[u8]) -> Result<SavedFile, LedgerLeafError> {
            Err(LedgerLeafError::Sink("save denied".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        notices: Mutex<Vec<Notice>>,
    }

    impl RecordingNotifier {
        fn notices(&self) -> Vec<Notice> {
            self.notices.lock().expect("notices").clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notice: Notice) {
            self.notices.lock().expect("notices").push(notice);
        }
    }

    struct Harness {
        controller: GenerationController,
        mount: SurfaceMount,
        target: Arc<MemoryTarget>,
        notifier: Arc<RecordingNotifier>,
    }

    fn config() -> GeneratorConfig {
        GeneratorConfig::builder()
            .capture_scale(1.0)
            .settle_delay(Duration::from_millis(5))
            .system_fonts(false)
            .build()
            .expect("config")
    }

    fn harness_with(config: GeneratorConfig, invoice: Option<Invoice>) -> Harness {
        let mount = SurfaceMount::new();
        if let Some(invoice) = invoice {
            let fonts = config.load_fonts().expect("fonts");
            mount.attach(Surface::new(invoice, Arc::new(fonts)));
        }
        let target = Arc::new(MemoryTarget::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let controller =
            GenerationController::new(config, mount.clone(), target.clone(), notifier.clone())
                .expect("controller");
        Harness {
            controller,
            mount,
            target,
            notifier,
        }
    }

    fn harness(invoice: Invoice) -> Harness {
        harness_with(config(), Some(invoice))
    }

    fn request(action: OutputAction, number: &str) -> GenerateRequest {
        GenerateRequest {
            action,
            theme: Theme::Light,
            invoice_number: number.to_string(),
        }
    }

    #[tokio::test]
    async fn empty_invoice_downloads_single_a4_page() {
        let h = harness(Invoice::default());
        let outcome = h
            .controller
            .generate(request(OutputAction::Download, ""))
            .await;
        let GenerationOutcome::Downloaded(saved) = outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert_eq!(saved.filename, "invoice-download.pdf");
        assert!(!h.controller.is_generating());
        assert!(h.notifier.notices().is_empty());

        let files = h.target.files();
        assert_eq!(files.len(), 1);
        let doc = LoDocument::load_mem(&files[0].1).expect("pdf");
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);
        let page = doc
            .get_object(pages[&1])
            .and_then(LoObject::as_dict)
            .expect("page");
        let media_box = page
            .get(b"MediaBox")
            .and_then(LoObject::as_array)
            .expect("media box");
        assert!((media_box[2].as_float().expect("w") - 595.28).abs() < 0.01);
        assert!((media_box[3].as_float().expect("h") - 841.89).abs() < 0.01);
    }

    #[tokio::test]
    async fn download_name_uses_invoice_number() {
        let h = harness(Invoice::default());
        let outcome = h
            .controller
            .generate(request(OutputAction::Download, "INV-9"))
            .await;
        assert!(outcome.is_success());
        assert_eq!(h.target.files()[0].0, "invoice-INV-9.pdf");
    }

    #[tokio::test]
    async fn second_trigger_while_busy_is_dropped() {
        let h = harness(Invoice::default());
        let controller = h.controller.clone();
        let first = tokio::spawn(async move {
            controller
                .generate(request(OutputAction::Download, "1"))
                .await
        });
        while !h.controller.is_generating() {
            tokio::task::yield_now().await;
        }
        let second = h
            .controller
            .generate(request(OutputAction::Download, "2"))
            .await;
        assert_eq!(second, GenerationOutcome::Skipped(SkipReason::Busy));
        assert!(h.controller.is_generating());

        let first = first.await.expect("join");
        assert!(first.is_success());
        assert!(!h.controller.is_generating());
        assert_eq!(h.target.files().len(), 1);
    }

    #[tokio::test]
    async fn missing_surface_is_a_silent_no_op() {
        let h = harness_with(config(), None);
        let outcome = h
            .controller
            .generate(request(OutputAction::Preview, ""))
            .await;
        assert_eq!(outcome, GenerationOutcome::Skipped(SkipReason::NoSurface));
        assert!(!h.controller.is_generating());
        assert!(h.notifier.notices().is_empty());
        assert!(h.controller.blobs().is_empty());
    }

    #[tokio::test]
    async fn capture_failure_reports_once_and_emits_nothing() {
        let mut invoice = Invoice::default();
        invoice.logo_url = Some("data:image/png;base64,AAAA".to_string());
        let h = harness(invoice);
        let outcome = h
            .controller
            .generate(request(OutputAction::Preview, ""))
            .await;
        assert!(matches!(
            outcome,
            GenerationOutcome::Failed {
                kind: FailureKind::Capture,
                ..
            }
        ));
        assert!(!h.controller.is_generating());
        assert!(h.target.files().is_empty());
        assert!(h.controller.blobs().is_empty());
        assert!(h.controller.preview_url().is_none());
        let notices = h.notifier.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0], Notice::error(crate::config::DEFAULT_FAILURE_MESSAGE));

        // The controller is usable again after a failure.
        h.mount.with(|surface| {
            let mut invoice = surface.invoice().clone();
            invoice.logo_url = None;
            surface.set_invoice(invoice);
        });
        let retry = h
            .controller
            .generate(request(OutputAction::Preview, ""))
            .await;
        assert!(retry.is_success());
    }

    #[tokio::test]
    async fn sink_failure_is_contained() {
        let mount = SurfaceMount::new();
        let config = config();
        let fonts = config.load_fonts().expect("fonts");
        mount.attach(Surface::new(Invoice::default(), Arc::new(fonts)));
        let notifier = Arc::new(RecordingNotifier::default());
        let controller = GenerationController::new(
            config,
            mount,
            Arc::new(FailingTarget),
            notifier.clone(),
        )
        .expect("controller");
        let outcome = controller
            .generate(request(OutputAction::Download, "1"))
            .await;
        assert!(matches!(
            outcome,
            GenerationOutcome::Failed {
                kind: FailureKind::Sink,
                ..
            }
        ));
        assert!(!controller.is_generating());
        assert_eq!(notifier.notices().len(), 1);
    }

    #[tokio::test]
    async fn repeated_previews_revoke_the_previous_url() {
        let h = harness(Invoice::default());
        let GenerationOutcome::Previewed(first) = h
            .controller
            .generate(request(OutputAction::Preview, ""))
            .await
        else {
            panic!("first preview failed");
        };
        assert!(h.controller.is_preview_open());
        let GenerationOutcome::Previewed(second) = h
            .controller
            .generate(request(OutputAction::Preview, ""))
            .await
        else {
            panic!("second preview failed");
        };
        assert_ne!(first, second);
        assert!(h.controller.blobs().get(&first).is_none());
        assert_eq!(h.controller.preview_url(), Some(second.clone()));
        assert_eq!(h.controller.blobs().len(), 1);

        let saved = h.controller.download_preview().expect("download preview");
        assert_eq!(saved.filename, PREVIEW_DOWNLOAD_NAME);

        assert!(h.controller.close_preview());
        assert!(!h.controller.is_preview_open());
        assert!(h.controller.blobs().is_empty());
        assert!(h.controller.download_preview().is_err());
    }

    #[tokio::test]
    async fn generation_blurs_the_focused_field() {
        let h = harness(Invoice::default());
        h.mount.with(|surface| surface.focus(FieldId::Number));
        let outcome = h
            .controller
            .generate(request(OutputAction::Preview, ""))
            .await;
        assert!(outcome.is_success());
        assert_eq!(h.mount.with(|surface| surface.focused().cloned()), Some(None));
    }

    #[tokio::test]
    async fn remote_images_require_registration() {
        let mut invoice = Invoice::default();
        let url = "https://cdn.example.com/sig.png";
        invoice.signature_url = Some(url.to_string());
        let h = harness(invoice);
        let outcome = h
            .controller
            .generate(request(OutputAction::Preview, ""))
            .await;
        assert!(matches!(outcome, GenerationOutcome::Failed { .. }));

        let img = image::RgbImage::from_pixel(3, 2, image::Rgb([0, 0, 0]));
        let mut png = std::io::Cursor::new(Vec::new());
        img.write_to(&mut png, image::ImageFormat::Png).expect("png");
        h.controller.register_remote_image(url, png.into_inner());
        let outcome = h
            .controller
            .generate(request(OutputAction::Preview, ""))
            .await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn perf_log_records_pipeline_stages() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = dir.path().join("perf.jsonl");
        let config = GeneratorConfig::builder()
            .capture_scale(1.0)
            .settle_delay(Duration::ZERO)
            .system_fonts(false)
            .perf_log(&log)
            .build()
            .expect("config");
        let h = harness_with(config, Some(Invoice::default()));
        assert!(
            h.controller
                .generate(request(OutputAction::Preview, ""))
                .await
                .is_success()
        );
        let text = std::fs::read_to_string(&log).expect("perf log");
        for stage in ["settle", "capture", "compose", "encode", "sink"] {
            assert!(
                text.contains(&format!("\"name\":\"{stage}\"")),
                "missing {stage} in {text}"
            );
        }
    }
}
