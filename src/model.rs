//! Invoice document model and derived totals.
//!
//! The model is a plain value: every mutation goes through the owning
//! session, and totals are recomputed from the items on every read.

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

pub const TERMS: [&str; 4] = ["On Receipt", "Net 15", "Net 30", "Net 60"];

pub const COLORS: [&str; 8] = [
    "240 5.9% 10%",
    "221.2 83.2% 53.3%",
    "0 84.2% 60.2%",
    "142.1 76.2% 36.3%",
    "24.6 95% 53.1%",
    "47.9 95.8% 53.1%",
    "271.2 83.2% 53.3%",
    "240 3.8% 46.1%",
];

const CURRENCY_TABLE: [(&str, &str, &str, &str); 8] = [
    ("USD", "United States Dollar", "$", "🇺🇸"),
    ("EUR", "Euro", "€", "🇪🇺"),
    ("GBP", "British Pound", "£", "🇬🇧"),
    ("KES", "Kenyan Shilling", "KSh", "🇰🇪"),
    ("JPY", "Japanese Yen", "¥", "🇯🇵"),
    ("CAD", "Canadian Dollar", "C$", "🇨🇦"),
    ("AUD", "Australian Dollar", "A$", "🇦🇺"),
    ("INR", "Indian Rupee", "₹", "🇮🇳"),
];

const DEFAULT_CURRENCY_CODE: &str = "KES";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub code: String,
    pub name: String,
    pub symbol: String,
    pub flag: String,
}

impl Currency {
    pub fn catalog() -> Vec<Currency> {
        CURRENCY_TABLE
            .iter()
            .map(|(code, name, symbol, flag)| Currency {
                code: code.to_string(),
                name: name.to_string(),
                symbol: symbol.to_string(),
                flag: flag.to_string(),
            })
            .collect()
    }

    pub fn by_code(code: &str) -> Option<Currency> {
        let code = code.trim();
        Currency::catalog()
            .into_iter()
            .find(|c| c.code.eq_ignore_ascii_case(code))
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::by_code(DEFAULT_CURRENCY_CODE).unwrap_or(Currency {
            code: DEFAULT_CURRENCY_CODE.to_string(),
            name: "Kenyan Shilling".to_string(),
            symbol: "KSh".to_string(),
            flag: String::new(),
        })
    }
}

/// How a tax or discount value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum AdjustmentKind {
    #[default]
    None,
    Percentage,
    Fixed,
}

impl AdjustmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentKind::None => "none",
            AdjustmentKind::Percentage => "percentage",
            AdjustmentKind::Fixed => "fixed",
        }
    }

    pub fn parse(raw: &str) -> AdjustmentKind {
        match raw.trim().to_ascii_lowercase().as_str() {
            "percentage" | "percent" | "%" => AdjustmentKind::Percentage,
            "fixed" | "flat" => AdjustmentKind::Fixed,
            _ => AdjustmentKind::None,
        }
    }
}

impl From<String> for AdjustmentKind {
    fn from(value: String) -> Self {
        AdjustmentKind::parse(&value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BusinessInfo {
    pub name: String,
    pub email: String,
    pub address: String,
    pub phone: String,
    pub business_number: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusinessField {
    Name,
    Email,
    Address,
    Phone,
    BusinessNumber,
}

impl BusinessField {
    pub const ALL: [BusinessField; 5] = [
        BusinessField::Name,
        BusinessField::Email,
        BusinessField::Address,
        BusinessField::Phone,
        BusinessField::BusinessNumber,
    ];

    pub fn placeholder(&self) -> &'static str {
        match self {
            BusinessField::Name => "Business Name",
            BusinessField::Email => "Email",
            BusinessField::Address => "Address",
            BusinessField::Phone => "Phone",
            BusinessField::BusinessNumber => "Business Number",
        }
    }
}

impl BusinessInfo {
    pub fn get(&self, field: BusinessField) -> &str {
        match field {
            BusinessField::Name => &self.name,
            BusinessField::Email => &self.email,
            BusinessField::Address => &self.address,
            BusinessField::Phone => &self.phone,
            BusinessField::BusinessNumber => &self.business_number,
        }
    }

    pub fn set(&mut self, field: BusinessField, value: impl Into<String>) {
        let slot = match field {
            BusinessField::Name => &mut self.name,
            BusinessField::Email => &mut self.email,
            BusinessField::Address => &mut self.address,
            BusinessField::Phone => &mut self.phone,
            BusinessField::BusinessNumber => &mut self.business_number,
        };
        *slot = value.into();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientInfo {
    pub name: String,
    pub email: String,
    pub address: String,
    pub phone: String,
    pub mobile: String,
    pub fax: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientField {
    Name,
    Email,
    Address,
    Phone,
    Mobile,
    Fax,
}

impl ClientField {
    pub const ALL: [ClientField; 6] = [
        ClientField::Name,
        ClientField::Email,
        ClientField::Address,
        ClientField::Phone,
        ClientField::Mobile,
        ClientField::Fax,
    ];

    pub fn placeholder(&self) -> &'static str {
        match self {
            ClientField::Name => "Client Name",
            ClientField::Email => "Email",
            ClientField::Address => "Address",
            ClientField::Phone => "Phone",
            ClientField::Mobile => "Mobile",
            ClientField::Fax => "Fax",
        }
    }
}

impl ClientInfo {
    pub fn get(&self, field: ClientField) -> &str {
        match field {
            ClientField::Name => &self.name,
            ClientField::Email => &self.email,
            ClientField::Address => &self.address,
            ClientField::Phone => &self.phone,
            ClientField::Mobile => &self.mobile,
            ClientField::Fax => &self.fax,
        }
    }

    pub fn set(&mut self, field: ClientField, value: impl Into<String>) {
        let slot = match field {
            ClientField::Name => &mut self.name,
            ClientField::Email => &mut self.email,
            ClientField::Address => &mut self.address,
            ClientField::Phone => &mut self.phone,
            ClientField::Mobile => &mut self.mobile,
            ClientField::Fax => &mut self.fax,
        };
        *slot = value.into();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BankDetails {
    pub bank_name: String,
    pub bank_city: String,
    pub branch: String,
    pub card_name: String,
    pub card_number: String,
    pub swift_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BankField {
    BankName,
    BankCity,
    Branch,
    CardName,
    CardNumber,
    SwiftCode,
}

impl BankField {
    pub const ALL: [BankField; 6] = [
        BankField::BankName,
        BankField::BankCity,
        BankField::Branch,
        BankField::CardName,
        BankField::CardNumber,
        BankField::SwiftCode,
    ];

    pub fn placeholder(&self) -> &'static str {
        match self {
            BankField::BankName => "Bank Name",
            BankField::BankCity => "Bank City",
            BankField::Branch => "Branch",
            BankField::CardName => "Name On Card",
            BankField::CardNumber => "Card No.",
            BankField::SwiftCode => "Bank Swift Code",
        }
    }
}

impl BankDetails {
    pub fn get(&self, field: BankField) -> &str {
        match field {
            BankField::BankName => &self.bank_name,
            BankField::BankCity => &self.bank_city,
            BankField::Branch => &self.branch,
            BankField::CardName => &self.card_name,
            BankField::CardNumber => &self.card_number,
            BankField::SwiftCode => &self.swift_code,
        }
    }

    pub fn set(&mut self, field: BankField, value: impl Into<String>) {
        let slot = match field {
            BankField::BankName => &mut self.bank_name,
            BankField::BankCity => &mut self.bank_city,
            BankField::Branch => &mut self.branch,
            BankField::CardName => &mut self.card_name,
            BankField::CardNumber => &mut self.card_number,
            BankField::SwiftCode => &mut self.swift_code,
        };
        *slot = value.into();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub details: String,
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub quantity: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemField {
    Description,
    Details,
    Quantity,
    Rate,
}

impl InvoiceItem {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            description: String::new(),
            details: String::new(),
            quantity: 1.0,
            rate: 0.0,
        }
    }

    /// Applies raw form input. Numeric columns never reject input; anything
    /// unparseable becomes zero.
    pub fn set(&mut self, field: ItemField, raw: &str) {
        match field {
            ItemField::Description => self.description = raw.to_string(),
            ItemField::Details => self.details = raw.to_string(),
            ItemField::Quantity => self.quantity = parse_quantity(raw),
            ItemField::Rate => self.rate = parse_rate(raw),
        }
    }

    pub fn line_amount(&self) -> f64 {
        coerce_amount(coerce_amount(self.quantity) * coerce_amount(self.rate))
    }
}

impl Default for InvoiceItem {
    fn default() -> Self {
        InvoiceItem::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Invoice {
    pub title: String,
    pub logo_url: Option<String>,
    pub from: BusinessInfo,
    pub to: ClientInfo,
    pub number: String,
    pub date: String,
    pub terms: String,
    pub items: Vec<InvoiceItem>,
    pub signature_url: Option<String>,
    pub color: String,
    pub tax_type: AdjustmentKind,
    #[serde(deserialize_with = "lenient_amount")]
    pub tax_value: f64,
    pub discount_type: AdjustmentKind,
    #[serde(deserialize_with = "lenient_amount")]
    pub discount_value: f64,
    pub currency: Currency,
    pub bank_details: BankDetails,
}

impl Default for Invoice {
    fn default() -> Self {
        Self {
            title: "INVOICE".to_string(),
            logo_url: None,
            from: BusinessInfo::default(),
            to: ClientInfo::default(),
            number: String::new(),
            date: chrono::Local::now().format("%Y-%m-%d").to_string(),
            terms: TERMS[0].to_string(),
            items: Vec::new(),
            signature_url: None,
            color: COLORS[0].to_string(),
            tax_type: AdjustmentKind::None,
            tax_value: 0.0,
            discount_type: AdjustmentKind::None,
            discount_value: 0.0,
            currency: Currency::default(),
            bank_details: BankDetails::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Totals {
    pub subtotal: f64,
    /// Amount added by tax; zero when no tax applies.
    pub tax: f64,
    /// Amount removed by the discount; zero when no discount applies.
    pub discount: f64,
    pub total: f64,
}

impl Invoice {
    pub fn subtotal(&self) -> f64 {
        compute_subtotal(&self.items)
    }

    pub fn total(&self) -> f64 {
        self.totals().total
    }

    pub fn totals(&self) -> Totals {
        compute_totals(
            self.subtotal(),
            self.tax_type,
            self.tax_value,
            self.discount_type,
            self.discount_value,
        )
    }

    pub fn item(&self, id: &str) -> Option<&InvoiceItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn item_mut(&mut self, id: &str) -> Option<&mut InvoiceItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    pub fn add_item(&mut self) -> &InvoiceItem {
        let mut item = InvoiceItem::new();
        while self.item(&item.id).is_some() {
            item.id = uuid::Uuid::new_v4().to_string();
        }
        self.items.push(item);
        &self.items[self.items.len() - 1]
    }

    pub fn remove_item(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }

    pub fn format_amount(&self, amount: f64) -> String {
        format_currency(amount, &self.currency)
    }
}

pub fn compute_subtotal(items: &[InvoiceItem]) -> f64 {
    items.iter().map(InvoiceItem::line_amount).sum()
}

pub fn compute_total(
    subtotal: f64,
    tax_type: AdjustmentKind,
    tax_value: f64,
    discount_type: AdjustmentKind,
    discount_value: f64,
) -> f64 {
    compute_totals(subtotal, tax_type, tax_value, discount_type, discount_value).total
}

/// Tax is applied to the subtotal first, then the discount is taken from the
/// tax-inclusive running total. Either step only applies when its kind is not
/// `None` and its value is strictly positive. The result is not clamped.
pub fn compute_totals(
    subtotal: f64,
    tax_type: AdjustmentKind,
    tax_value: f64,
    discount_type: AdjustmentKind,
    discount_value: f64,
) -> Totals {
    let subtotal = coerce_amount(subtotal);
    let tax_value = coerce_amount(tax_value);
    let discount_value = coerce_amount(discount_value);

    let mut running = subtotal;
    let tax = if tax_value > 0.0 {
        match tax_type {
            AdjustmentKind::Percentage => subtotal * (tax_value / 100.0),
            AdjustmentKind::Fixed => tax_value,
            AdjustmentKind::None => 0.0,
        }
    } else {
        0.0
    };
    running += tax;

    let discount = if discount_value > 0.0 {
        match discount_type {
            AdjustmentKind::Percentage => running * (discount_value / 100.0),
            AdjustmentKind::Fixed => discount_value,
            AdjustmentKind::None => 0.0,
        }
    } else {
        0.0
    };
    running -= discount;

    Totals {
        subtotal,
        tax,
        discount,
        total: running,
    }
}

pub fn coerce_amount(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Leading decimal number of `raw`, or zero.
pub fn parse_rate(raw: &str) -> f64 {
    let prefix = numeric_prefix(raw.trim(), true);
    prefix.parse::<f64>().map(coerce_amount).unwrap_or(0.0)
}

/// Leading integer of `raw`, or zero. `"2.5"` reads as `2`.
pub fn parse_quantity(raw: &str) -> f64 {
    let prefix = numeric_prefix(raw.trim(), false);
    prefix
        .parse::<i64>()
        .map(|v| v as f64)
        .or_else(|_| prefix.parse::<f64>().map(coerce_amount))
        .unwrap_or(0.0)
}

fn numeric_prefix(raw: &str, allow_fraction: bool) -> &str {
    let bytes = raw.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut has_digits = end > digits_start;
    if allow_fraction && end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > frac_start || has_digits {
            has_digits |= frac_end > frac_start;
            end = frac_end;
        }
    }
    if !has_digits {
        return "";
    }
    if allow_fraction && end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    raw[..end].trim_end_matches('.')
}

pub fn format_currency(amount: f64, currency: &Currency) -> String {
    format!("{}{:.2}", currency.symbol, coerce_amount(amount))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Number(f64),
    Text(String),
    Other(IgnoredAny),
}

fn lenient_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<RawNumber>::deserialize(deserializer)? {
        Some(RawNumber::Number(v)) => coerce_amount(v),
        Some(RawNumber::Text(text)) => parse_rate(&text),
        Some(RawNumber::Other(_)) | None => 0.0,
    })
}

fn lenient_quantity<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<RawNumber>::deserialize(deserializer)? {
        Some(RawNumber::Number(v)) => coerce_amount(v),
        Some(RawNumber::Text(text)) => parse_quantity(&text),
        Some(RawNumber::Other(_)) | None => 0.0,
    })
}
