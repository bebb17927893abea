//! The editor shell: owns the working invoice and keeps the mounted surface
//! in step with every edit.

use std::path::Path;
use std::sync::Arc;

use crate::assets::read_image_data_url;
use crate::config::GeneratorConfig;
use crate::controller::{
    GenerateRequest, GenerationController, GenerationOutcome, Notice, Notifier,
};
use crate::drafts::DraftStore;
use crate::error::LedgerLeafError;
use crate::model::{
    AdjustmentKind, BankField, BusinessField, ClientField, Currency, Invoice, ItemField,
    coerce_amount,
};
use crate::sink::{OutputAction, SaveTarget};
use crate::surface::{FieldId, RenderMode, Surface, SurfaceMount};
use crate::theme::Theme;

pub struct EditorSession {
    invoice: Invoice,
    theme: Theme,
    mode: RenderMode,
    drafts: Option<DraftStore>,
    mount: SurfaceMount,
    controller: GenerationController,
    notifier: Arc<dyn Notifier>,
}

impl EditorSession {
    /// Mounts a surface for `invoice` and wires a controller to it.
    pub fn new(
        config: GeneratorConfig,
        invoice: Invoice,
        target: Arc<dyn SaveTarget>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, LedgerLeafError> {
        let fonts = Arc::new(config.load_fonts()?);
        let mount = SurfaceMount::new();
        mount.attach(Surface::new(invoice.clone(), fonts));
        let controller =
            GenerationController::new(config, mount.clone(), target, notifier.clone())?;
        Ok(Self {
            invoice,
            theme: Theme::default(),
            mode: RenderMode::default(),
            drafts: None,
            mount,
            controller,
            notifier,
        })
    }

    pub fn with_drafts(mut self, drafts: DraftStore) -> Self {
        self.drafts = Some(drafts);
        self
    }

    pub fn invoice(&self) -> &Invoice {
        &self.invoice
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn drafts(&self) -> Option<&DraftStore> {
        self.drafts.as_ref()
    }

    pub fn controller(&self) -> &GenerationController {
        &self.controller
    }

    pub fn mount(&self) -> &SurfaceMount {
        &self.mount
    }

    fn edit(&mut self, f: impl FnOnce(&mut Invoice)) {
        f(&mut self.invoice);
        self.push_invoice();
    }

    fn push_invoice(&self) {
        let invoice = self.invoice.clone();
        self.mount.with(move |surface| surface.set_invoice(invoice));
    }

    /// Replaces the whole working invoice, e.g. after loading a file.
    pub fn replace_invoice(&mut self, invoice: Invoice) {
        self.edit(|current| *current = invoice);
    }

    pub fn set_title(&mut self, title: &str) {
        self.edit(|invoice| invoice.title = title.to_string());
    }

    pub fn set_number(&mut self, number: &str) {
        self.edit(|invoice| invoice.number = number.to_string());
    }

    pub fn set_date(&mut self, date: &str) {
        self.edit(|invoice| invoice.date = date.to_string());
    }

    pub fn set_terms(&mut self, terms: &str) {
        self.edit(|invoice| invoice.terms = terms.to_string());
    }

    pub fn set_color(&mut self, color: &str) {
        self.edit(|invoice| invoice.color = color.to_string());
    }

    pub fn set_business(&mut self, field: BusinessField, value: &str) {
        self.edit(|invoice| invoice.from.set(field, value));
    }

    pub fn set_client(&mut self, field: ClientField, value: &str) {
        self.edit(|invoice| invoice.to.set(field, value));
    }

    pub fn set_bank(&mut self, field: BankField, value: &str) {
        self.edit(|invoice| invoice.bank_details.set(field, value));
    }

    /// Appends a blank line item and returns its id.
    pub fn add_item(&mut self) -> String {
        let id = self.invoice.add_item().id.clone();
        self.push_invoice();
        id
    }

    pub fn update_item(&mut self, id: &str, field: ItemField, raw: &str) -> bool {
        let Some(item) = self.invoice.item_mut(id) else {
            return false;
        };
        item.set(field, raw);
        self.push_invoice();
        true
    }

    pub fn remove_item(&mut self, id: &str) -> bool {
        let removed = self.invoice.remove_item(id);
        if removed {
            self.push_invoice();
        }
        removed
    }

    /// Catalog currencies are looked up by code; unknown codes are kept with
    /// the code standing in for name and symbol.
    pub fn set_currency(&mut self, code: &str) {
        let currency = Currency::by_code(code).unwrap_or_else(|| Currency {
            code: code.to_string(),
            name: code.to_string(),
            symbol: code.to_string(),
            flag: String::new(),
        });
        self.edit(|invoice| invoice.currency = currency);
    }

    pub fn set_tax(&mut self, kind: AdjustmentKind, value: f64) {
        self.edit(|invoice| {
            invoice.tax_type = kind;
            invoice.tax_value = coerce_amount(value);
        });
    }

    pub fn set_discount(&mut self, kind: AdjustmentKind, value: f64) {
        self.edit(|invoice| {
            invoice.discount_type = kind;
            invoice.discount_value = coerce_amount(value);
        });
    }

    pub async fn attach_logo(&mut self, path: impl AsRef<Path>) -> Result<(), LedgerLeafError> {
        let url = read_image_data_url(path).await?;
        self.edit(|invoice| invoice.logo_url = Some(url));
        Ok(())
    }

    pub fn clear_logo(&mut self) {
        self.edit(|invoice| invoice.logo_url = None);
    }

    pub async fn attach_signature(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<(), LedgerLeafError> {
        let url = read_image_data_url(path).await?;
        self.edit(|invoice| invoice.signature_url = Some(url));
        Ok(())
    }

    pub fn clear_signature(&mut self) {
        self.edit(|invoice| invoice.signature_url = None);
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        self.mount.with(|surface| surface.set_theme(theme));
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.set_theme(self.theme.toggled());
        self.theme
    }

    pub fn set_mode(&mut self, mode: RenderMode) {
        self.mode = mode;
        self.mount.with(|surface| surface.set_mode(mode));
    }

    pub fn focus(&mut self, field: FieldId) {
        self.mount.with(|surface| surface.focus(field));
    }

    pub async fn generate(&self, action: OutputAction) -> GenerationOutcome {
        self.controller
            .generate(GenerateRequest {
                action,
                theme: self.theme,
                invoice_number: self.invoice.number.clone(),
            })
            .await
    }

    /// Snapshots the working invoice into the drafts store.
    pub fn save_draft(&mut self) -> Result<String, LedgerLeafError> {
        let drafts = self
            .drafts
            .as_mut()
            .ok_or_else(|| LedgerLeafError::Draft("no drafts store configured".to_string()))?;
        let id = drafts.save(&self.invoice).id.clone();
        self.notifier.notify(Notice::info("Invoice saved as draft"));
        Ok(id)
    }

    /// Makes the draft with `id` the working invoice.
    pub fn load_draft(&mut self, id: &str) -> Result<(), LedgerLeafError> {
        let invoice = self
            .drafts
            .as_ref()
            .and_then(|drafts| drafts.get(id))
            .map(|draft| draft.invoice.clone())
            .ok_or_else(|| LedgerLeafError::Draft(format!("no draft with id {id}")))?;
        self.replace_invoice(invoice);
        Ok(())
    }

    pub fn delete_draft(&mut self, id: &str) -> bool {
        self.drafts
            .as_mut()
            .map(|drafts| drafts.delete(id))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::NoticeLevel;
    use crate::sink::DirectoryTarget;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingNotifier {
        notices: Mutex<Vec<Notice>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notice: Notice) {
            self.notices.lock().expect("notices").push(notice);
        }
    }

    fn session(dir: &Path) -> (EditorSession, Arc<RecordingNotifier>) {
        let config = GeneratorConfig::builder()
            .capture_scale(1.0)
            .settle_delay(Duration::from_millis(1))
            .system_fonts(false)
            .build()
            .expect("config");
        let notifier = Arc::new(RecordingNotifier::default());
        let session = EditorSession::new(
            config,
            Invoice::default(),
            Arc::new(DirectoryTarget::new(dir.join("out"))),
            notifier.clone(),
        )
        .expect("session")
        .with_drafts(DraftStore::open(dir.join("drafts.json")));
        (session, notifier)
    }

    fn surface_invoice(session: &EditorSession) -> Invoice {
        session
            .mount()
            .with(|surface| surface.invoice().clone())
            .expect("mounted")
    }

    #[test]
    fn edits_reach_the_surface() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (mut session, _) = session(dir.path());
        session.set_number("INV-3");
        session.set_client(ClientField::Name, "Acme");
        let id = session.add_item();
        assert!(session.update_item(&id, ItemField::Rate, "12.5"));
        assert!(session.update_item(&id, ItemField::Quantity, "2"));
        assert!(!session.update_item("missing", ItemField::Rate, "1"));

        let mirrored = surface_invoice(&session);
        assert_eq!(mirrored, *session.invoice());
        assert_eq!(mirrored.totals().subtotal, 25.0);

        assert!(session.remove_item(&id));
        assert!(surface_invoice(&session).items.is_empty());
    }

    #[test]
    fn currency_and_adjustments() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (mut session, _) = session(dir.path());
        session.set_currency("usd");
        assert_eq!(session.invoice().currency.code, "USD");
        session.set_currency("XYZ");
        assert_eq!(session.invoice().currency.symbol, "XYZ");

        let id = session.add_item();
        session.update_item(&id, ItemField::Rate, "100");
        session.set_tax(AdjustmentKind::Percentage, 10.0);
        session.set_discount(AdjustmentKind::Fixed, f64::NAN);
        let totals = session.invoice().totals();
        assert_eq!(totals.total, 110.0);
        assert_eq!(session.invoice().discount_value, 0.0);
    }

    #[test]
    fn theme_and_mode_follow_the_session() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (mut session, _) = session(dir.path());
        assert_eq!(session.toggle_theme(), Theme::Dark);
        session.set_mode(RenderMode::Flattened);
        let (theme, mode) = session
            .mount()
            .with(|surface| (surface.theme(), surface.mode()))
            .expect("mounted");
        assert_eq!(theme, Theme::Dark);
        assert_eq!(mode, RenderMode::Flattened);
    }

    #[test]
    fn drafts_round_trip_through_the_session() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (mut session, notifier) = session(dir.path());
        session.set_client(ClientField::Name, "Acme");
        let id = session.save_draft().expect("save");
        {
            let notices = notifier.notices.lock().expect("notices");
            assert_eq!(notices.len(), 1);
            assert_eq!(notices[0].level, NoticeLevel::Info);
        }

        session.set_client(ClientField::Name, "Other");
        session.load_draft(&id).expect("load");
        assert_eq!(session.invoice().to.name, "Acme");
        assert_eq!(surface_invoice(&session).to.name, "Acme");

        assert!(session.delete_draft(&id));
        assert!(session.load_draft(&id).is_err());
        assert_eq!(session.drafts().map(DraftStore::len), Some(0));
    }

    #[tokio::test]
    async fn logo_from_file_becomes_data_url() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (mut session, _) = session(dir.path());
        let path = dir.path().join("logo.png");
        image::RgbImage::from_pixel(4, 4, image::Rgb([10, 20, 30]))
            .save(&path)
            .expect("write png");
        session.attach_logo(&path).await.expect("attach");
        let logo = session.invoice().logo_url.clone().expect("logo");
        assert!(logo.starts_with("data:image/png;base64,"));

        assert!(session.attach_signature(dir.path().join("missing.png")).await.is_err());
        assert!(session.invoice().signature_url.is_none());

        session.clear_logo();
        assert!(surface_invoice(&session).logo_url.is_none());
    }

    #[tokio::test]
    async fn generate_downloads_with_invoice_number() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (mut session, _) = session(dir.path());
        session.set_number("INV-77");
        session.focus(FieldId::Number);
        let outcome = session.generate(OutputAction::Download).await;
        let GenerationOutcome::Downloaded(saved) = outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert_eq!(saved.filename, "invoice-INV-77.pdf");
        assert!(dir.path().join("out").join("invoice-INV-77.pdf").exists());
    }
}
