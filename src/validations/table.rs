use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

// Must survive being embedded in a bank transfer reference.
static TABLE_NUMBER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]+$").expect("valid table number pattern"));

#[derive(Debug)]
pub struct TableNumber(String);

impl TableNumber {
    pub fn parse(s: String) -> std::result::Result<TableNumber, String> {
        let s = s.trim().to_string();
        if s.graphemes(true).count() > 50 || !TABLE_NUMBER_REGEX.is_match(&s) {
            Err(format!("{} is not a valid table number.", s))
        } else {
            Ok(Self(s))
        }
    }
}

impl AsRef<str> for TableNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<TableNumber> for String {
    fn from(number: TableNumber) -> Self {
        number.0
    }
}

pub fn validate_capacity(capacity: i32) -> Result<i32, String> {
    if (1..=100).contains(&capacity) {
        Ok(capacity)
    } else {
        Err(format!("{} is not a valid capacity.", capacity))
    }
}

pub fn validate_quantity(quantity: i32) -> Result<i32, String> {
    if (1..=100).contains(&quantity) {
        Ok(quantity)
    } else {
        Err(format!("{} is not a valid quantity.", quantity))
    }
}

pub fn validate_price(price: Option<i64>) -> Result<Option<i64>, String> {
    match price {
        Some(p) if p <= 0 => Err(format!("{} is not a valid price.", p)),
        other => Ok(other),
    }
}
