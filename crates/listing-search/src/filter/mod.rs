//! Canonical search request and its validation.
//!
//! Inbound parameters arrive as loosely typed strings ([`RawSearchParams`]) and are
//! turned into a [`FilterCriteria`] plus a [`PageRequest`]. Malformed numbers, ids
//! and flags are reported per field; a malformed bounding box or sort degrades to
//! its default instead.
use std::{fmt, str::FromStr};

use tracing::debug;
use uuid::Uuid;

use crate::config::EngineConfig;

/// A single rejected request parameter.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every rejected parameter of one request.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn field(&self, field: &str) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.field == field)
    }

    /// `Ok(value)` when nothing was rejected.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for e in &self.errors {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", e.field, e.message)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Blank values count as absent.
pub(crate) fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

/// Parses an optional parameter, recording a field error when it is present but malformed.
pub(crate) fn parse_optional<T: FromStr>(
    raw: Option<&str>,
    field: &'static str,
    expected: &str,
    errors: &mut ValidationErrors,
) -> Option<T> {
    let value = non_blank(raw)?;
    match value.parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            errors.push(field, format!("expected {expected}, got '{value}'"));
            None
        }
    }
}

/// Like [`parse_optional`] but absence is an error too.
pub(crate) fn parse_required<T: FromStr>(
    raw: Option<&str>,
    field: &'static str,
    expected: &str,
    errors: &mut ValidationErrors,
) -> Option<T> {
    if non_blank(raw).is_none() {
        errors.push(field, "is required");
        return None;
    }
    parse_optional(raw, field, expected, errors)
}

/// Axis-aligned rectangle in WGS84 degrees.
///
/// Containment is literal: `west <= lon <= east` and `south <= lat <= north`.
/// A box whose west edge lies east of its east edge contains nothing.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        (self.west..=self.east).contains(&lon) && (self.south..=self.north).contains(&lat)
    }

    /// `west,south,east,north`. Anything but four finite numbers yields `None`.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        let parts: Vec<f64> = raw
            .split(',')
            .map(|p| p.trim().parse::<f64>().ok().filter(|v| v.is_finite()))
            .collect::<Option<_>>()?;
        match parts.as_slice() {
            [w, s, e, n] => Some(Self::new(*w, *s, *e, *n)),
            _ => None,
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    Price,
    CreatedAt,
}

impl SortField {
    /// Name used in the `sort` request parameter.
    pub fn param_name(self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::CreatedAt => "createdAt",
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn is_descending(self) -> bool {
        self == Self::Desc
    }
}

/// The only fields a caller may sort by.
const SORTABLE_FIELDS: [(&str, SortField); 2] = [
    ("price", SortField::Price),
    ("createdAt", SortField::CreatedAt),
];

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            direction: SortDirection::Desc,
        }
    }
}

impl SortSpec {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// Parses `field[,direction]`, falling back per part to `createdAt` and `desc`.
    /// Parts after the direction are ignored.
    pub fn parse(raw: &str) -> Self {
        let mut parts = raw.split(',').map(str::trim);
        let field_raw = parts.next().unwrap_or_default();
        let direction_raw = parts.next().unwrap_or("desc");

        let field = SORTABLE_FIELDS
            .iter()
            .find(|(name, _)| *name == field_raw)
            .map(|(_, field)| *field);
        let direction = if direction_raw.eq_ignore_ascii_case("asc") {
            Some(SortDirection::Asc)
        } else if direction_raw.eq_ignore_ascii_case("desc") {
            Some(SortDirection::Desc)
        } else {
            None
        };

        if field.is_none() || direction.is_none() {
            debug!(sort = raw, "Unsupported sort, falling back to defaults");
        }

        let default = Self::default();
        Self {
            field: field.unwrap_or(default.field),
            direction: direction.unwrap_or(default.direction),
        }
    }
}

/// Validated search filters.
///
/// Every dimension is optional and independent. `Default` searches available
/// listings only, newest first.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCriteria {
    /// Trimmed, never blank
    pub text: Option<String>,
    pub min_price_cents: Option<i64>,
    pub max_price_cents: Option<i64>,
    pub product_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    /// `None` matches both available and unavailable listings
    pub available: Option<bool>,
    pub bbox: Option<BoundingBox>,
    pub sort: SortSpec,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            text: None,
            min_price_cents: None,
            max_price_cents: None,
            product_id: None,
            category_id: None,
            available: Some(true),
            bbox: None,
            sort: SortSpec::default(),
        }
    }
}

impl FilterCriteria {
    pub fn with_text(mut self, text: impl AsRef<str>) -> Self {
        self.text = non_blank(Some(text.as_ref())).map(ToString::to_string);
        self
    }

    pub fn with_price_range(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.min_price_cents = min;
        self.max_price_cents = max;
        self
    }

    pub fn with_product(mut self, product_id: Uuid) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn with_category(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_available(mut self, available: Option<bool>) -> Self {
        self.available = available;
        self
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = sort;
        self
    }

    pub fn has_text(&self) -> bool {
        self.text.is_some()
    }
}

/// Zero-based page index and page size.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub size: usize,
}

impl PageRequest {
    /// Clamps `size` into `1..=config.max_page_size`.
    pub fn new(page: usize, size: usize, config: &EngineConfig) -> Self {
        Self {
            page,
            size: size.clamp(1, config.max_page_size.max(1)),
        }
    }

    pub fn first(config: &EngineConfig) -> Self {
        Self::new(0, config.default_page_size, config)
    }

    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.size)
    }
}

/// Search parameters exactly as received, before validation.
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize),
    serde(rename_all = "camelCase", default)
)]
#[derive(Debug, Clone, Default)]
pub struct RawSearchParams {
    pub q: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub product_id: Option<String>,
    pub category_id: Option<String>,
    pub available: Option<String>,
    pub bbox: Option<String>,
    pub page: Option<String>,
    pub size: Option<String>,
    pub sort: Option<String>,
}

impl RawSearchParams {
    /// Validates every parameter and reports all rejected ones together.
    pub fn validate(
        &self,
        config: &EngineConfig,
    ) -> Result<(FilterCriteria, PageRequest), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let min_price_cents =
            parse_optional::<i64>(self.min_price.as_deref(), "minPrice", "an integer", &mut errors);
        let max_price_cents =
            parse_optional::<i64>(self.max_price.as_deref(), "maxPrice", "an integer", &mut errors);
        let product_id =
            parse_optional::<Uuid>(self.product_id.as_deref(), "productId", "a UUID", &mut errors);
        let category_id =
            parse_optional::<Uuid>(self.category_id.as_deref(), "categoryId", "a UUID", &mut errors);

        let available = match non_blank(self.available.as_deref()) {
            None => Some(true),
            Some(v) if v.eq_ignore_ascii_case("true") => Some(true),
            Some(v) if v.eq_ignore_ascii_case("false") => Some(false),
            Some(v) if v.eq_ignore_ascii_case("any") || v.eq_ignore_ascii_case("all") => None,
            Some(v) => {
                errors.push(
                    "available",
                    format!("expected one of true, false, any, got '{v}'"),
                );
                None
            }
        };

        let bbox = non_blank(self.bbox.as_deref()).and_then(|raw| {
            let parsed = BoundingBox::parse_lenient(raw);
            if parsed.is_none() {
                debug!(bbox = raw, "Malformed bbox, searching without it");
            }
            parsed
        });

        let sort = non_blank(self.sort.as_deref())
            .map(SortSpec::parse)
            .unwrap_or_default();

        let page = parse_optional::<i64>(self.page.as_deref(), "page", "an integer", &mut errors)
            .map_or(0, |p| usize::try_from(p).unwrap_or(0));
        let size = parse_optional::<i64>(self.size.as_deref(), "size", "an integer", &mut errors)
            .map_or(config.default_page_size, |s| {
                usize::try_from(s).unwrap_or(0)
            });

        let criteria = FilterCriteria {
            min_price_cents,
            max_price_cents,
            product_id,
            category_id,
            available,
            bbox,
            sort,
            ..FilterCriteria::default()
        }
        .with_text(self.q.as_deref().unwrap_or_default());

        errors.into_result((criteria, PageRequest::new(page, size, config)))
    }
}
