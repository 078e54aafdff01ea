use anyhow::{bail, ensure};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const REGION: &str = "Telangana";
pub const DEFAULT_QUANTITY: u32 = 50;
pub const MAX_IMAGE_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Crop {
    Paddy,
    Tomato,
    Cotton,
    Chili,
    Turmeric,
}

impl Crop {
    pub const ALL: [Crop; 5] = [
        Crop::Paddy,
        Crop::Tomato,
        Crop::Cotton,
        Crop::Chili,
        Crop::Turmeric,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Crop::Paddy => "Paddy",
            Crop::Tomato => "Tomato",
            Crop::Cotton => "Cotton",
            Crop::Chili => "Chili",
            Crop::Turmeric => "Turmeric",
        }
    }

    pub fn telugu_name(self) -> &'static str {
        match self {
            Crop::Paddy => "వరి",
            Crop::Tomato => "టమోటా",
            Crop::Cotton => "ప్రత్తి",
            Crop::Chili => "మిర్చి",
            Crop::Turmeric => "పసుపు",
        }
    }

    /// Form label, e.g. `Tomato (టమోటా)`.
    pub fn label(self) -> String {
        format!("{} ({})", self.name(), self.telugu_name())
    }
}

impl fmt::Display for Crop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Crop {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let s = s.trim();
        Crop::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s) || c.telugu_name() == s)
            .ok_or_else(|| anyhow::anyhow!("unsupported crop: {s:?}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Location {
    Warangal,
    Nizamabad,
    Khammam,
    Karimnagar,
    Mahabubnagar,
}

impl Location {
    pub const ALL: [Location; 5] = [
        Location::Warangal,
        Location::Nizamabad,
        Location::Khammam,
        Location::Karimnagar,
        Location::Mahabubnagar,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Location::Warangal => "Warangal",
            Location::Nizamabad => "Nizamabad",
            Location::Khammam => "Khammam",
            Location::Karimnagar => "Karimnagar",
            Location::Mahabubnagar => "Mahabubnagar",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Location {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let s = s.trim();
        Location::ALL
            .into_iter()
            .find(|l| l.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| anyhow::anyhow!("unsupported location: {s:?}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Unit {
    Quintal,
    Bag,
    Kilogram,
}

impl Unit {
    pub const ALL: [Unit; 3] = [Unit::Quintal, Unit::Bag, Unit::Kilogram];

    /// Label shown in the form selector.
    pub fn label(self) -> &'static str {
        match self {
            Unit::Quintal => "Quintals",
            Unit::Bag => "Bags",
            Unit::Kilogram => "KG",
        }
    }

    /// Per-unit suffix used next to prices.
    pub fn short(self) -> &'static str {
        match self {
            Unit::Quintal => "quintal",
            Unit::Bag => "bag",
            Unit::Kilogram => "kg",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Unit {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let s = s.trim();
        for unit in Unit::ALL {
            let variant = format!("{unit:?}");
            let names: [&str; 3] = [unit.label(), unit.short(), &variant];
            if names.iter().any(|n| n.eq_ignore_ascii_case(s)) {
                return Ok(unit);
            }
        }
        match s.to_ascii_lowercase().as_str() {
            "quintals" => Ok(Unit::Quintal),
            "bags" => Ok(Unit::Bag),
            "kilograms" | "kgs" => Ok(Unit::Kilogram),
            _ => bail!("unsupported unit: {s:?}"),
        }
    }
}

impl TryFrom<String> for Unit {
    type Error = anyhow::Error;

    fn try_from(value: String) -> anyhow::Result<Self> {
        value.parse()
    }
}

impl From<Unit> for String {
    fn from(value: Unit) -> Self {
        value.short().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMediaType {
    Jpeg,
    Png,
}

impl ImageMediaType {
    pub fn mime(self) -> &'static str {
        match self {
            ImageMediaType::Jpeg => "image/jpeg",
            ImageMediaType::Png => "image/png",
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(ImageMediaType::Jpeg),
            "image/png" => Some(ImageMediaType::Png),
            _ => None,
        }
    }

    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageMediaType::Jpeg)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageMediaType::Png)
        } else {
            None
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    media_type: ImageMediaType,
    bytes: Vec<u8>,
}

impl ImagePayload {
    /// Accepts JPEG/PNG bytes. A missing or unrecognised declared type falls back to sniffing.
    pub fn new(declared_mime: Option<&str>, bytes: Vec<u8>) -> anyhow::Result<Self> {
        ensure!(!bytes.is_empty(), "image payload is empty");
        ensure!(
            bytes.len() <= MAX_IMAGE_BYTES,
            "image payload too large: {} bytes (max {MAX_IMAGE_BYTES})",
            bytes.len()
        );

        let media_type = declared_mime
            .and_then(ImageMediaType::from_mime)
            .or_else(|| ImageMediaType::sniff(&bytes));
        let Some(media_type) = media_type else {
            bail!("image must be JPEG or PNG");
        };

        Ok(Self { media_type, bytes })
    }

    pub fn media_type(&self) -> ImageMediaType {
        self.media_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// One farmer submission. Fields are fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketQuery {
    crop: Crop,
    quantity: u32,
    unit: Unit,
    location: Location,
    image: Option<ImagePayload>,
}

impl MarketQuery {
    pub fn new(
        crop: Crop,
        quantity: u32,
        unit: Unit,
        location: Location,
        image: Option<ImagePayload>,
    ) -> anyhow::Result<Self> {
        ensure!(quantity > 0, "quantity must be positive");
        Ok(Self {
            crop,
            quantity,
            unit,
            location,
            image,
        })
    }

    pub fn crop(&self) -> Crop {
        self.crop
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn image(&self) -> Option<&ImagePayload> {
        self.image.as_ref()
    }

    /// Reads a typed chat line such as `Price for 10 KG of Tomato in Warangal` or
    /// `50kg tomato warangal`. Crop and location are required; quantity defaults to
    /// [`DEFAULT_QUANTITY`] and unit to quintals. Words that name nothing are skipped.
    pub fn from_chat(text: &str, image: Option<ImagePayload>) -> anyhow::Result<Self> {
        let mut crop = None;
        let mut location = None;
        let mut quantity = None;
        let mut unit = None;

        let is_separator = |c: char| {
            c.is_whitespace() || matches!(c, ',' | '.' | '?' | '!' | ':' | ';' | '(' | ')')
        };
        for token in text.split(is_separator).filter(|t| !t.is_empty()) {
            let digits = token.len() - token.trim_start_matches(|c: char| c.is_ascii_digit()).len();
            if digits > 0 {
                let (number, rest) = token.split_at(digits);
                if quantity.is_none() {
                    let n: u32 = number
                        .parse()
                        .map_err(|_| anyhow::anyhow!("quantity is too large: {number}"))?;
                    quantity = Some(n);
                }
                if !rest.is_empty() && unit.is_none() {
                    unit = rest.parse::<Unit>().ok();
                }
                continue;
            }
            if crop.is_none() {
                if let Ok(c) = token.parse::<Crop>() {
                    crop = Some(c);
                    continue;
                }
            }
            if location.is_none() {
                if let Ok(l) = token.parse::<Location>() {
                    location = Some(l);
                    continue;
                }
            }
            if unit.is_none() {
                unit = token.parse::<Unit>().ok();
            }
        }

        let Some(crop) = crop else {
            bail!("no known crop in {text:?}");
        };
        let Some(location) = location else {
            bail!("no known location in {text:?}");
        };
        Self::new(
            crop,
            quantity.unwrap_or(DEFAULT_QUANTITY),
            unit.unwrap_or(Unit::Quintal),
            location,
            image,
        )
    }

    /// The chat line recorded for the user, e.g. `Price for 10 KG of Tomato in Warangal`.
    pub fn summary(&self) -> String {
        format!(
            "Price for {} {} of {} in {}",
            self.quantity, self.unit, self.crop, self.location
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_form_values() {
        assert_eq!("tomato".parse::<Crop>().unwrap(), Crop::Tomato);
        assert_eq!("పసుపు".parse::<Crop>().unwrap(), Crop::Turmeric);
        assert_eq!(" Khammam ".parse::<Location>().unwrap(), Location::Khammam);
        assert_eq!("KG".parse::<Unit>().unwrap(), Unit::Kilogram);
        assert_eq!("Quintals".parse::<Unit>().unwrap(), Unit::Quintal);
        assert_eq!("bag".parse::<Unit>().unwrap(), Unit::Bag);
        assert!("Potato".parse::<Crop>().is_err());
        assert!("Hyderabad".parse::<Location>().is_err());
        assert!("tonne".parse::<Unit>().is_err());
    }

    #[test]
    fn rejects_zero_quantity() {
        let res = MarketQuery::new(Crop::Paddy, 0, Unit::Quintal, Location::Warangal, None);
        assert!(res.is_err());
    }

    #[test]
    fn image_type_is_sniffed_when_not_declared() {
        let png = b"\x89PNG\r\n\x1a\nrest".to_vec();
        let image = ImagePayload::new(None, png).unwrap();
        assert_eq!(image.media_type(), ImageMediaType::Png);

        let jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00];
        let image = ImagePayload::new(Some("application/octet-stream"), jpeg).unwrap();
        assert_eq!(image.media_type(), ImageMediaType::Jpeg);
    }

    #[test]
    fn rejects_unknown_or_empty_images() {
        assert!(ImagePayload::new(Some("image/png"), Vec::new()).is_err());
        assert!(ImagePayload::new(None, b"GIF89a".to_vec()).is_err());
        assert!(ImagePayload::new(Some("image/gif"), b"GIF89a".to_vec()).is_err());
    }

    #[test]
    fn summary_uses_form_labels() {
        let q = MarketQuery::new(Crop::Tomato, 10, Unit::Kilogram, Location::Warangal, None)
            .unwrap();
        assert_eq!(q.summary(), "Price for 10 KG of Tomato in Warangal");
    }

    #[test]
    fn chat_line_round_trips_through_summary() {
        let query =
            MarketQuery::new(Crop::Chili, 12, Unit::Bag, Location::Karimnagar, None).unwrap();
        let parsed = MarketQuery::from_chat(&query.summary(), None).unwrap();
        assert_eq!(parsed, query);
    }

    #[test]
    fn chat_line_accepts_loose_wording() {
        let query = MarketQuery::from_chat("price for 10kg tomato, warangal?", None).unwrap();
        assert_eq!(query.crop(), Crop::Tomato);
        assert_eq!(query.quantity(), 10);
        assert_eq!(query.unit(), Unit::Kilogram);
        assert_eq!(query.location(), Location::Warangal);

        let query = MarketQuery::from_chat("పసుపు Nizamabad", None).unwrap();
        assert_eq!(query.crop(), Crop::Turmeric);
        assert_eq!(query.quantity(), DEFAULT_QUANTITY);
        assert_eq!(query.unit(), Unit::Quintal);
    }

    #[test]
    fn chat_line_needs_crop_and_location() {
        assert!(MarketQuery::from_chat("Price for 50kg Potato in Hyderabad", None).is_err());
        assert!(MarketQuery::from_chat("Tomato please", None).is_err());
        assert!(MarketQuery::from_chat("Warangal", None).is_err());
        assert!(MarketQuery::from_chat("", None).is_err());
        assert!(MarketQuery::from_chat("0 kg tomato warangal", None).is_err());
        assert!(MarketQuery::from_chat("99999999999 kg tomato warangal", None).is_err());
    }
}
