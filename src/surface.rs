//! The Renderable Surface: a live, paintable view of an invoice that can be
//! mounted and unmounted by the application shell and read by the capture
//! pipeline.

use std::sync::{Arc, Mutex};

use crate::canvas::DisplayList;
use crate::font::FontRegistry;
use crate::layout::{LayoutInput, SURFACE_WIDTH, layout_invoice};
use crate::model::{BankField, BusinessField, ClientField, Invoice, ItemField};
use crate::theme::Theme;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    #[default]
    Editable,
    Flattened,
}

/// Identifies one editable region of the surface.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldId {
    Title,
    Number,
    Date,
    Terms,
    Business(BusinessField),
    Client(ClientField),
    Bank(BankField),
    Item { id: String, field: ItemField },
    Logo,
    Signature,
}

pub struct Surface {
    invoice: Invoice,
    theme: Theme,
    mode: RenderMode,
    focus: Option<FieldId>,
    fonts: Arc<FontRegistry>,
    painted: Option<Arc<DisplayList<FieldId>>>,
    dirty: bool,
}

impl Surface {
    pub fn new(invoice: Invoice, fonts: Arc<FontRegistry>) -> Self {
        Self {
            invoice,
            theme: Theme::default(),
            mode: RenderMode::default(),
            focus: None,
            fonts,
            painted: None,
            dirty: true,
        }
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

    pub fn fonts(&self) -> &Arc<FontRegistry> {
        &self.fonts
    }

    pub fn set_invoice(&mut self, invoice: Invoice) {
        self.invoice = invoice;
        // A focused item that no longer exists cannot keep focus.
        let stale = matches!(
            &self.focus,
            Some(FieldId::Item { id, .. }) if self.invoice.item(id).is_none()
        );
        if stale {
            self.focus = None;
        }
        self.dirty = true;
    }

    pub fn set_theme(&mut self, theme: Theme) {
        if self.theme != theme {
            self.theme = theme;
            self.dirty = true;
        }
    }

    pub fn set_mode(&mut self, mode: RenderMode) {
        if self.mode != mode {
            self.mode = mode;
            self.dirty = true;
        }
    }

    pub fn focus(&mut self, field: FieldId) {
        if self.focus.as_ref() != Some(&field) {
            self.focus = Some(field);
            self.dirty = true;
        }
    }

    /// Drops input focus. Returns whether anything was focused.
    pub fn blur(&mut self) -> bool {
        let had_focus = self.focus.take().is_some();
        if had_focus {
            self.dirty = true;
        }
        had_focus
    }

    pub fn focused(&self) -> Option<&FieldId> {
        self.focus.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Last painted frame, which may be stale if changes are pending.
    pub fn painted(&self) -> Option<Arc<DisplayList<FieldId>>> {
        self.painted.clone()
    }

    fn paint(&mut self) -> Arc<DisplayList<FieldId>> {
        let list = layout_invoice(&LayoutInput {
            invoice: &self.invoice,
            palette: self.theme.palette(),
            mode: self.mode,
            focus: self.focus.as_ref(),
            fonts: &self.fonts,
        });
        let list = Arc::new(list);
        self.painted = Some(list.clone());
        self.dirty = false;
        tracing::trace!(
            height = list.height,
            commands = list.command_count(),
            "surface painted"
        );
        list
    }

    /// Paints any pending changes and returns the frame now on screen. Once
    /// this returns, everything applied before the call is reflected.
    pub fn flush(&mut self) -> Arc<DisplayList<FieldId>> {
        if !self.dirty {
            if let Some(list) = &self.painted {
                return list.clone();
            }
        }
        self.paint()
    }

    pub fn scroll_width(&mut self) -> f32 {
        self.flush().width.max(SURFACE_WIDTH)
    }

    pub fn scroll_height(&mut self) -> f32 {
        self.flush().height
    }
}

/// Shared slot the shell mounts its surface into. Cloning yields another
/// handle to the same slot.
#[derive(Clone, Default)]
pub struct SurfaceMount {
    slot: Arc<Mutex<Option<Surface>>>,
}

impl SurfaceMount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, surface: Surface) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(surface);
        }
    }

    pub fn detach(&self) -> Option<Surface> {
        self.slot.lock().ok().and_then(|mut slot| slot.take())
    }

    pub fn is_mounted(&self) -> bool {
        self.slot.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    /// Runs `f` against the mounted surface, or returns `None` when nothing
    /// is mounted.
    pub fn with<R>(&self, f: impl FnOnce(&mut Surface) -> R) -> Option<R> {
        let mut slot = self.slot.lock().ok()?;
        slot.as_mut().map(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface() -> Surface {
        let mut fonts = FontRegistry::new();
        fonts.set_system_fallback(false);
        Surface::new(Invoice::default(), Arc::new(fonts))
    }

    #[test]
    fn flush_reuses_clean_frame() {
        let mut surface = surface();
        assert!(surface.is_dirty());
        let first = surface.flush();
        assert!(!surface.is_dirty());
        let second = surface.flush();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn blur_marks_dirty_only_when_focused() {
        let mut surface = surface();
        surface.flush();
        assert!(!surface.blur());
        assert!(!surface.is_dirty());
        surface.focus(FieldId::Number);
        assert_eq!(surface.focused(), Some(&FieldId::Number));
        assert!(surface.blur());
        assert!(surface.is_dirty());
        assert!(surface.focused().is_none());
    }

    #[test]
    fn mode_switch_keeps_extent() {
        let mut surface = surface();
        let mut invoice = Invoice::default();
        invoice.add_item();
        surface.set_invoice(invoice);
        let editable = surface.scroll_height();
        surface.set_mode(RenderMode::Flattened);
        assert!(surface.is_dirty());
        assert_eq!(surface.scroll_height(), editable);
        assert_eq!(surface.scroll_width(), SURFACE_WIDTH);
    }

    #[test]
    fn removed_item_loses_focus() {
        let mut surface = surface();
        let mut invoice = Invoice::default();
        let id = invoice.add_item().id.clone();
        surface.set_invoice(invoice.clone());
        surface.focus(FieldId::Item {
            id: id.clone(),
            field: ItemField::Rate,
        });
        invoice.remove_item(&id);
        surface.set_invoice(invoice);
        assert!(surface.focused().is_none());
    }

    #[test]
    fn mount_attach_and_detach() {
        let mount = SurfaceMount::new();
        assert!(!mount.is_mounted());
        assert!(mount.with(|s| s.flush()).is_none());
        mount.attach(surface());
        let other = mount.clone();
        assert!(other.is_mounted());
        assert!(other.with(|s| s.scroll_height()).unwrap_or(0.0) > 0.0);
        assert!(mount.detach().is_some());
        assert!(!other.is_mounted());
    }
}
