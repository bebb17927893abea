use crate::error::LedgerLeafError;
use rustybuzz::{Direction as HbDirection, Face as HbFace, UnicodeBuffer};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

/// Logical family names used by the invoice layout.
pub const SANS: &str = "Sans";
pub const SANS_BOLD: &str = "Sans-Bold";

// Average advance of a proportional sans face, in em, used when no font
// program can be resolved.
const FALLBACK_ADVANCE_EM: f32 = 0.55;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct TextWidthKey {
    font: String,
    size_milli: i64,
    text: String,
}

#[derive(Debug)]
struct TextWidthCache {
    map: HashMap<TextWidthKey, f32>,
    order: VecDeque<TextWidthKey>,
    max_entries: usize,
}

impl TextWidthCache {
    fn new(max_entries: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            max_entries,
        }
    }

    fn get(&self, key: &TextWidthKey) -> Option<f32> {
        self.map.get(key).copied()
    }

    fn insert(&mut self, key: TextWidthKey, value: f32) {
        if self.map.contains_key(&key) {
            return;
        }
        self.map.insert(key.clone(), value);
        self.order.push_back(key);
        while self.map.len() > self.max_entries {
            if let Some(old) = self.order.pop_front() {
                self.map.remove(&old);
            } else {
                break;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegisteredFont {
    pub name: String,
    pub data: Arc<Vec<u8>>,
    pub source: Option<PathBuf>,
}

#[derive(Debug)]
pub struct FontRegistry {
    fonts: Vec<RegisteredFont>,
    lookup: HashMap<String, usize>,
    system_fallback: bool,
    text_width_cache: Mutex<TextWidthCache>,
}

impl Default for FontRegistry {
    fn default() -> Self {
        FontRegistry::new()
    }
}

impl FontRegistry {
    pub fn new() -> Self {
        Self {
            fonts: Vec::new(),
            lookup: HashMap::new(),
            system_fallback: true,
            text_width_cache: Mutex::new(TextWidthCache::new(4096)),
        }
    }

    pub fn set_system_fallback(&mut self, enabled: bool) {
        self.system_fallback = enabled;
    }

    pub fn register_file(
        &mut self,
        name: &str,
        path: impl AsRef<Path>,
    ) -> Result<(), LedgerLeafError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|err| {
            LedgerLeafError::InvalidConfiguration(format!(
                "font file {} unreadable: {}",
                path.display(),
                err
            ))
        })?;
        self.register(name, data, Some(path.to_path_buf()))
    }

    pub fn register_bytes(&mut self, name: &str, data: Vec<u8>) -> Result<(), LedgerLeafError> {
        self.register(name, data, None)
    }

    fn register(
        &mut self,
        name: &str,
        data: Vec<u8>,
        source: Option<PathBuf>,
    ) -> Result<(), LedgerLeafError> {
        if ttf_parser::Face::parse(&data, 0).is_err() {
            return Err(LedgerLeafError::InvalidConfiguration(format!(
                "font '{}' is not a TrueType/OpenType program",
                name
            )));
        }
        let key = normalize_font_family(name);
        let font = RegisteredFont {
            name: name.to_string(),
            data: Arc::new(data),
            source,
        };
        match self.lookup.get(&key) {
            Some(&idx) => self.fonts[idx] = font,
            None => {
                self.lookup.insert(key, self.fonts.len());
                self.fonts.push(font);
            }
        }
        if let Ok(mut cache) = self.text_width_cache.lock() {
            let max_entries = cache.max_entries;
            *cache = TextWidthCache::new(max_entries);
        }
        Ok(())
    }

    pub fn registered(&self) -> impl Iterator<Item = &RegisteredFont> {
        self.fonts.iter()
    }

    /// Font program for `name`: registered fonts first, then the system
    /// font directories when fallback is enabled.
    pub fn resolve(&self, name: &str) -> Option<Arc<Vec<u8>>> {
        if let Some(&idx) = self.lookup.get(&normalize_font_family(name)) {
            return Some(self.fonts[idx].data.clone());
        }
        if !self.system_fallback {
            return None;
        }
        resolve_system_font_bytes(name)
    }

    pub fn measure_text_width(&self, name: &str, font_size: f32, text: &str) -> f32 {
        if text.is_empty() || font_size <= 0.0 {
            return 0.0;
        }
        let key = TextWidthKey {
            font: normalize_font_family(name),
            size_milli: (font_size * 1000.0).round() as i64,
            text: text.to_string(),
        };
        if let Ok(cache) = self.text_width_cache.lock() {
            if let Some(width) = cache.get(&key) {
                return width;
            }
        }
        let width = match self.resolve(name) {
            Some(data) => shaped_width(&data, font_size, text)
                .unwrap_or_else(|| fallback_width(font_size, text)),
            None => fallback_width(font_size, text),
        };
        if let Ok(mut cache) = self.text_width_cache.lock() {
            cache.insert(key, width);
        }
        width
    }
}

fn fallback_width(font_size: f32, text: &str) -> f32 {
    text.chars().count() as f32 * font_size * FALLBACK_ADVANCE_EM
}

fn shaped_width(font_data: &[u8], font_size: f32, text: &str) -> Option<f32> {
    let face = HbFace::from_slice(font_data, 0)?;
    let units = face.units_per_em().max(1) as f32;
    let mut buffer = UnicodeBuffer::new();
    buffer.set_direction(detect_direction(text));
    buffer.push_str(text);
    let output = rustybuzz::shape(&face, &[], buffer);
    let positions = output.glyph_positions();
    if positions.is_empty() {
        return None;
    }
    let advance: i32 = positions.iter().map(|p| p.x_advance).sum();
    Some(advance as f32 / units * font_size)
}

pub(crate) fn detect_direction(text: &str) -> HbDirection {
    for ch in text.chars() {
        let cp = ch as u32;
        if (0x0590..=0x08FF).contains(&cp) || (0xFB1D..=0xFEFC).contains(&cp) {
            return HbDirection::RightToLeft;
        }
        if ch.is_alphabetic() {
            return HbDirection::LeftToRight;
        }
    }
    HbDirection::LeftToRight
}

static SYSTEM_FONT_CACHE: OnceLock<Mutex<HashMap<String, Option<Arc<Vec<u8>>>>>> = OnceLock::new();

fn resolve_system_font_bytes(font_name: &str) -> Option<Arc<Vec<u8>>> {
    let key = normalize_font_family(font_name);
    if key.is_empty() {
        return None;
    }
    let cache = SYSTEM_FONT_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    if let Ok(guard) = cache.lock() {
        if let Some(entry) = guard.get(&key) {
            return entry.clone();
        }
    }

    let loaded = load_system_font(font_name);
    if loaded.is_none() {
        tracing::debug!(font = font_name, "no system font program found");
    }
    if let Ok(mut guard) = cache.lock() {
        guard.insert(key, loaded.clone());
    }
    loaded
}

fn load_system_font(font_name: &str) -> Option<Arc<Vec<u8>>> {
    let candidates = system_font_file_candidates(font_name);
    for dir in system_font_dirs() {
        for file_name in &candidates {
            let Ok(bytes) = std::fs::read(dir.join(file_name)) else {
                continue;
            };
            if ttf_parser::Face::parse(&bytes, 0).is_ok() {
                return Some(Arc::new(bytes));
            }
        }
    }
    None
}

fn system_font_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    #[cfg(target_os = "windows")]
    {
        dirs.push(PathBuf::from(r"C:\Windows\Fonts"));
        if let Ok(windir) = std::env::var("WINDIR") {
            dirs.push(PathBuf::from(windir).join("Fonts"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/System/Library/Fonts/Supplemental"));
        dirs.push(PathBuf::from("/Library/Fonts"));
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        for dir in [
            "/usr/share/fonts/truetype/dejavu",
            "/usr/share/fonts/truetype/liberation",
            "/usr/share/fonts/truetype/liberation2",
            "/usr/share/fonts/truetype/msttcorefonts",
            "/usr/share/fonts/liberation-sans",
            "/usr/share/fonts/dejavu",
            "/usr/share/fonts/TTF",
            "/usr/share/fonts",
        ] {
            dirs.push(PathBuf::from(dir));
        }
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }

    dirs
}

fn system_font_file_candidates(font_name: &str) -> Vec<String> {
    let normalized = normalize_font_family(font_name);
    let bold = normalized.ends_with("-bold") || normalized.ends_with("bold");
    let names: &[&str] = if bold {
        &[
            "arialbd.ttf",
            "Arial Bold.ttf",
            "LiberationSans-Bold.ttf",
            "DejaVuSans-Bold.ttf",
            "Helvetica.ttc",
        ]
    } else {
        &[
            "arial.ttf",
            "Arial.ttf",
            "LiberationSans-Regular.ttf",
            "DejaVuSans.ttf",
            "Helvetica.ttc",
        ]
    };
    names.iter().map(|n| n.to_string()).collect()
}

fn normalize_font_family(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace(' ', "")
}
