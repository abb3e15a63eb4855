// src/core.rs
//
// =============================================================================
// CNCMARKET: CORE SCHEMA AUTHORITY (v 0.3 )
// =============================================================================
//
// The data contracts between this client and the catalog backend.
//
// Design Principles:
// 1. Newtype Pattern: product ids are never confused with user ids.
// 2. Wire Fidelity: camelCase JSON, SCREAMING_SNAKE_CASE enums.
// 3. Tolerance: the backend sends nulls for unset fields; we default them.
//    Unknown classification values read as "unset" rather than failing.

use crate::serde_helpers::{lenient_enum, nullable, opt_timestamp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// 1. IDENTIFIERS (The "Newtype" Pattern)
// ============================================================================

/// Stable, unique identifier of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub i64);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a marketplace account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// 2. CLASSIFICATIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentType {
    PostProcessor,
    MachineSchema,
    Interpreter,
    DigitalMachineKit,
}

impl ContentType {
    pub const ALL: [ContentType; 4] = [
        ContentType::PostProcessor,
        ContentType::MachineSchema,
        ContentType::Interpreter,
        ContentType::DigitalMachineKit,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ContentType::PostProcessor => "Post Processor",
            ContentType::MachineSchema => "Machine Schema",
            ContentType::Interpreter => "Interpreter",
            ContentType::DigitalMachineKit => "Digital Machine Kit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentCategory {
    CncMachines,
    Robots,
}

impl ContentCategory {
    pub const ALL: [ContentCategory; 2] = [ContentCategory::CncMachines, ContentCategory::Robots];

    pub fn label(&self) -> &'static str {
        match self {
            ContentCategory::CncMachines => "CNC Machines",
            ContentCategory::Robots => "Robots",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MachineType {
    Milling,
    Turning,
    MillTurn,
    WireEdm,
    Laser,
    Plasma,
    Waterjet,
    Grinding,
    Robot,
    Other,
}

impl MachineType {
    pub const ALL: [MachineType; 10] = [
        MachineType::Milling,
        MachineType::Turning,
        MachineType::MillTurn,
        MachineType::WireEdm,
        MachineType::Laser,
        MachineType::Plasma,
        MachineType::Waterjet,
        MachineType::Grinding,
        MachineType::Robot,
        MachineType::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MachineType::Milling => "Milling",
            MachineType::Turning => "Turning",
            MachineType::MillTurn => "Mill-Turn",
            MachineType::WireEdm => "Wire EDM",
            MachineType::Laser => "Laser",
            MachineType::Plasma => "Plasma",
            MachineType::Waterjet => "Waterjet",
            MachineType::Grinding => "Grinding",
            MachineType::Robot => "Robot",
            MachineType::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublicationStatus {
    Draft,
    PendingReview,
    Published,
    Rejected,
}

impl PublicationStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PublicationStatus::Draft => "Draft",
            PublicationStatus::PendingReview => "Pending Review",
            PublicationStatus::Published => "Published",
            PublicationStatus::Rejected => "Rejected",
        }
    }

    /// Wire value, as used in the `?status=` query of the moderation endpoint.
    pub fn as_wire(&self) -> &'static str {
        match self {
            PublicationStatus::Draft => "DRAFT",
            PublicationStatus::PendingReview => "PENDING_REVIEW",
            PublicationStatus::Published => "PUBLISHED",
            PublicationStatus::Rejected => "REJECTED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExperienceStatus {
    NotTested,
    VerifiedOnEquipment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    Public,
    Dealer,
    Dealers,
    Vendor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    User,
    Dealer,
    Vendor,
    Admin,
}

/// Parses a wire enum from loose user input: `wire-edm`, `Wire EDM` and
/// `WIRE_EDM` all name the same variant.
pub fn parse_wire<T: serde::de::DeserializeOwned>(input: &str) -> Result<T, String> {
    let normalized = input.trim().to_uppercase().replace(['-', ' '], "_");
    serde_json::from_value(serde_json::Value::String(normalized))
        .map_err(|_| format!("unknown value '{}'", input))
}

/// Turns a wire enum like `WIRE_EDM` into `Wire EDM`.
/// Short all-caps words (three letters or fewer) stay uppercase; values that
/// are already human-readable pass through.
pub fn format_enum(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let is_wire = value.chars().all(|c| c.is_ascii_uppercase() || c == '_');
    if !value.contains('_') && !is_wire {
        return value.to_string();
    }
    value
        .split('_')
        .map(|word| {
            if !word.is_empty() && word.len() <= 3 && word.chars().all(|c| c.is_ascii_uppercase()) {
                word.to_string()
            } else {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// 3. THE CATALOG ENTRY
// ============================================================================

/// One listed product. Immutable once fetched; the loader only reorders
/// the collection around it, never its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_enum")]
    pub content_type: Option<ContentType>,
    #[serde(default, deserialize_with = "lenient_enum")]
    pub category: Option<ContentCategory>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable")]
    pub kit_contents: String,
    #[serde(default, deserialize_with = "nullable")]
    pub min_software_version: String,

    // Machine
    #[serde(default, deserialize_with = "nullable")]
    pub machine_manufacturer: String,
    #[serde(default, deserialize_with = "nullable")]
    pub machine_series: String,
    #[serde(default, deserialize_with = "nullable")]
    pub machine_model: String,
    #[serde(default, deserialize_with = "lenient_enum")]
    pub machine_type: Option<MachineType>,
    #[serde(default)]
    pub number_of_axes: Option<u32>,

    // Controller
    #[serde(default, deserialize_with = "nullable")]
    pub controller_manufacturer: String,
    #[serde(default, deserialize_with = "nullable")]
    pub controller_series: String,
    #[serde(default, deserialize_with = "nullable")]
    pub controller_model: String,

    // Commercial
    #[serde(default)]
    pub price_eur: Option<f64>,
    #[serde(default, deserialize_with = "nullable")]
    pub product_owner: String,
    #[serde(default, deserialize_with = "nullable")]
    pub author_name: String,
    #[serde(default)]
    pub trial_days: Option<u32>,
    #[serde(default, deserialize_with = "nullable")]
    pub supported_codes: String,
    #[serde(default, deserialize_with = "nullable")]
    pub sample_output_code: String,
    #[serde(default, deserialize_with = "nullable")]
    pub image_url: String,

    // Lifecycle
    #[serde(default, deserialize_with = "lenient_enum")]
    pub publication_status: Option<PublicationStatus>,
    #[serde(default, deserialize_with = "lenient_enum")]
    pub experience_status: Option<ExperienceStatus>,
    #[serde(default, deserialize_with = "lenient_enum")]
    pub visibility: Option<Visibility>,
    #[serde(default, deserialize_with = "nullable")]
    pub download_count: u64,

    #[serde(default, deserialize_with = "opt_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "opt_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "opt_timestamp")]
    pub published_at: Option<DateTime<Utc>>,
}

impl Product {
    /// A bare entry; the rest of the attributes default. Handy for fixtures.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id: ProductId(id),
            name: name.into(),
            content_type: None,
            category: None,
            description: String::new(),
            kit_contents: String::new(),
            min_software_version: String::new(),
            machine_manufacturer: String::new(),
            machine_series: String::new(),
            machine_model: String::new(),
            machine_type: None,
            number_of_axes: None,
            controller_manufacturer: String::new(),
            controller_series: String::new(),
            controller_model: String::new(),
            price_eur: None,
            product_owner: String::new(),
            author_name: String::new(),
            trial_days: None,
            supported_codes: String::new(),
            sample_output_code: String::new(),
            image_url: String::new(),
            publication_status: None,
            experience_status: None,
            visibility: None,
            download_count: 0,
            created_at: None,
            updated_at: None,
            published_at: None,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.experience_status == Some(ExperienceStatus::VerifiedOnEquipment)
    }

    /// "Fanuc 31i" style one-liner; empty parts are skipped.
    pub fn controller_line(&self) -> String {
        [
            self.controller_manufacturer.as_str(),
            self.controller_series.as_str(),
            self.controller_model.as_str(),
        ]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
    }

    /// Case-insensitive substring match on name, machine manufacturer and
    /// owner. A blank query matches everything.
    pub fn matches_query(&self, query: &str) -> bool {
        let q = query.trim().to_lowercase();
        q.is_empty()
            || self.name.to_lowercase().contains(&q)
            || self.machine_manufacturer.to_lowercase().contains(&q)
            || self.product_owner.to_lowercase().contains(&q)
    }

    pub fn price_label(&self) -> String {
        match self.price_eur {
            Some(p) if p > 0.0 => format!("€{:.2}", p),
            _ => "Free".into(),
        }
    }
}

// ============================================================================
// 4. SEARCH (Criteria, Request, Page)
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortKey {
    /// "Recent" in the browser.
    #[serde(rename = "createdAt")]
    CreatedAt,
    /// "Popular" in the browser.
    #[default]
    #[serde(rename = "downloadCount")]
    DownloadCount,
}

impl SortKey {
    pub fn label(&self) -> &'static str {
        match self {
            SortKey::CreatedAt => "Recent",
            SortKey::DownloadCount => "Popular",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            SortKey::CreatedAt => SortKey::DownloadCount,
            SortKey::DownloadCount => SortKey::CreatedAt,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Equality constraints plus ordering. Any change invalidates the page cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ContentCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<MachineType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_axes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_owner: Option<String>,

    #[serde(rename = "sortBy", default)]
    pub sort: SortKey,
    #[serde(rename = "sortDir", default)]
    pub direction: SortDirection,
}

impl FilterCriteria {
    /// Number of equality constraints in effect (free-text query excluded).
    pub fn active_filter_count(&self) -> usize {
        [
            self.category.is_some(),
            self.content_type.is_some(),
            self.machine_type.is_some(),
            self.machine_manufacturer.is_some(),
            self.controller_manufacturer.is_some(),
            self.number_of_axes.is_some(),
            self.content_owner.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }

    /// Drops every constraint but keeps the ordering.
    pub fn cleared(&self) -> Self {
        Self {
            sort: self.sort,
            direction: self.direction,
            ..Self::default()
        }
    }

    /// Empty strings mean "no constraint" (the browser's select boxes send "").
    pub fn normalized(mut self) -> Self {
        fn blank(v: &mut Option<String>) {
            if v.as_deref().map(str::trim).is_some_and(str::is_empty) {
                *v = None;
            }
        }
        blank(&mut self.query);
        blank(&mut self.machine_manufacturer);
        blank(&mut self.controller_manufacturer);
        blank(&mut self.content_owner);
        self
    }
}

/// Body of `POST /products/search`.
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest<'a> {
    #[serde(flatten)]
    pub criteria: &'a FilterCriteria,
    pub page: usize,
    pub size: usize,
}

/// One page of search results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    #[serde(default, deserialize_with = "nullable")]
    pub content: Vec<Product>,
    #[serde(default, deserialize_with = "nullable")]
    pub total_elements: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub total_pages: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub number: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub size: u64,
}

/// Distinct values the backend offers for each filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    #[serde(default, deserialize_with = "nullable")]
    pub machine_manufacturers: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub controller_manufacturers: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub content_owners: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub number_of_axes: Vec<u32>,
    #[serde(default, deserialize_with = "nullable")]
    pub content_types: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub machine_types: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub categories: Vec<String>,
}

// ============================================================================
// 5. ACCOUNTS & LICENSES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub user_id: UserId,
    pub username: String,
    pub role: UserRole,
    pub token: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn is_dealer(&self) -> bool {
        self.role == UserRole::Dealer
    }

    pub fn is_vendor(&self) -> bool {
        self.role == UserRole::Vendor
    }

    /// Dealers, vendors and admins may author content.
    pub fn can_author(&self) -> bool {
        self.is_dealer() || self.is_vendor() || self.is_admin()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct License {
    pub id: i64,
    pub user_id: UserId,
    pub product_id: ProductId,
    #[serde(default, deserialize_with = "nullable")]
    pub product_name: String,
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    pub license_type: String,
    #[serde(default, deserialize_with = "opt_timestamp")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "opt_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

// ============================================================================
// 6. AUTHORING PAYLOAD (Dealer side)
// ============================================================================

/// Partial product sent on create/update. Loaded from YAML by `publish`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ContentCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kit_contents: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_software_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_series: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<MachineType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_axes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_series: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_eur: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_codes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_output_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_status: Option<PublicationStatus>,
}

impl ProductDraft {
    /// Rejects drafts the backend would bounce anyway.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".into());
        }
        if self.content_type.is_none() {
            return Err("contentType is required".into());
        }
        if let Some(price) = self.price_eur {
            if price < 0.0 {
                return Err(format!("priceEur must not be negative (got {})", price));
            }
        }
        Ok(())
    }
}

// ============================================================================
// 7. MODERATION (Admin side)
// ============================================================================

/// Products in one status tab (`None` = all), narrowed by a free-text query.
pub fn review_queue<'a>(
    products: &'a [Product],
    status: Option<PublicationStatus>,
    query: Option<&str>,
) -> Vec<&'a Product> {
    products
        .iter()
        .filter(|p| status.is_none() || p.publication_status == status)
        .filter(|p| query.map_or(true, |q| p.matches_query(q)))
        .collect()
}

/// Per-status tallies shown above the review queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub all: usize,
    pub pending_review: usize,
    pub published: usize,
    pub draft: usize,
    pub rejected: usize,
}

impl StatusCounts {
    pub fn tally(products: &[Product]) -> Self {
        let mut counts = StatusCounts {
            all: products.len(),
            ..Default::default()
        };
        for p in products {
            match p.publication_status {
                Some(PublicationStatus::PendingReview) => counts.pending_review += 1,
                Some(PublicationStatus::Published) => counts.published += 1,
                Some(PublicationStatus::Draft) => counts.draft += 1,
                Some(PublicationStatus::Rejected) => counts.rejected += 1,
                None => {}
            }
        }
        counts
    }
}

impl fmt::Display for StatusCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "All {} | Pending {} | Published {} | Drafts {} | Rejected {}",
            self.all, self.pending_review, self.published, self.draft, self.rejected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_enum_keeps_short_acronyms() {
        assert_eq!(format_enum("WIRE_EDM"), "Wire EDM");
        assert_eq!(format_enum("MILLING"), "Milling");
        assert_eq!(format_enum("CNC_MACHINES"), "CNC Machines");
        assert_eq!(format_enum("Heidenhain"), "Heidenhain");
        assert_eq!(format_enum(""), "");
    }

    #[test]
    fn parse_wire_accepts_loose_spelling() {
        assert_eq!(parse_wire::<MachineType>("wire-edm"), Ok(MachineType::WireEdm));
        assert_eq!(parse_wire::<ContentType>("Post Processor"), Ok(ContentType::PostProcessor));
        assert_eq!(parse_wire::<PublicationStatus>("published"), Ok(PublicationStatus::Published));
        assert!(parse_wire::<ContentCategory>("boats").is_err());
    }

    #[test]
    fn product_tolerates_nulls_and_naive_timestamps() {
        let json = r#"{
            "id": 7,
            "name": "Haas VF-2 post",
            "contentType": "POST_PROCESSOR",
            "machineType": "MILL_TURN",
            "description": null,
            "downloadCount": null,
            "priceEur": 149.0,
            "createdAt": "2024-05-02T09:30:00",
            "publishedAt": null
        }"#;
        let p: Product = serde_json::from_str(json).unwrap();
        assert_eq!(p.id, ProductId(7));
        assert_eq!(p.content_type, Some(ContentType::PostProcessor));
        assert_eq!(p.machine_type, Some(MachineType::MillTurn));
        assert_eq!(p.description, "");
        assert_eq!(p.download_count, 0);
        assert!(p.created_at.is_some());
        assert!(p.published_at.is_none());
        assert_eq!(p.price_label(), "€149.00");
    }

    #[test]
    fn search_request_flattens_criteria_in_camel_case() {
        let criteria = FilterCriteria {
            content_type: Some(ContentType::Interpreter),
            number_of_axes: Some(5),
            sort: SortKey::CreatedAt,
            ..Default::default()
        };
        let body = serde_json::to_value(SearchRequest {
            criteria: &criteria,
            page: 2,
            size: 24,
        })
        .unwrap();
        assert_eq!(body["contentType"], "INTERPRETER");
        assert_eq!(body["numberOfAxes"], 5);
        assert_eq!(body["sortBy"], "createdAt");
        assert_eq!(body["sortDir"], "desc");
        assert_eq!(body["page"], 2);
        assert!(body.get("category").is_none());
    }

    #[test]
    fn filter_count_ignores_query_and_sort() {
        let criteria = FilterCriteria {
            query: Some("fanuc".into()),
            category: Some(ContentCategory::Robots),
            content_owner: Some("acme".into()),
            sort: SortKey::CreatedAt,
            ..Default::default()
        };
        assert_eq!(criteria.active_filter_count(), 2);

        let cleared = criteria.cleared();
        assert_eq!(cleared.active_filter_count(), 0);
        assert_eq!(cleared.sort, SortKey::CreatedAt);
    }

    #[test]
    fn blank_strings_are_not_constraints() {
        let criteria = FilterCriteria {
            machine_manufacturer: Some("  ".into()),
            content_owner: Some("acme".into()),
            ..Default::default()
        }
        .normalized();
        assert_eq!(criteria.machine_manufacturer, None);
        assert_eq!(criteria.active_filter_count(), 1);
    }

    #[test]
    fn draft_validation() {
        let mut draft = ProductDraft {
            name: "Okuma LB3000 post".into(),
            ..Default::default()
        };
        assert!(draft.validate().is_err());
        draft.content_type = Some(ContentType::PostProcessor);
        assert!(draft.validate().is_ok());
        draft.price_eur = Some(-1.0);
        assert!(draft.validate().is_err());
    }

    #[test]
    fn page_with_unknown_classifications_still_decodes() {
        let json = r#"{
            "content": [
                {"id": 1, "name": "Haas VF-2 post", "machineType": "MILLING"},
                {"id": 2, "name": "Sinker kit", "machineType": "EDM_SINKER", "category": "CNC_MACHINES"},
                {"id": 3, "name": "Toolpath template", "contentType": "CAM_TEMPLATE",
                 "publicationStatus": "ARCHIVED", "experienceStatus": "IN_FIELD_TEST",
                 "visibility": "PARTNERS"}
            ],
            "totalElements": 3,
            "totalPages": 1,
            "number": 0,
            "size": 24
        }"#;
        let page: SearchPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.content.len(), 3);
        assert_eq!(page.content[0].machine_type, Some(MachineType::Milling));
        assert_eq!(page.content[1].machine_type, None);
        assert_eq!(page.content[1].category, Some(ContentCategory::CncMachines));

        let p = &page.content[2];
        assert_eq!(p.content_type, None);
        assert_eq!(p.publication_status, None);
        assert_eq!(p.experience_status, None);
        assert_eq!(p.visibility, None);
        assert_eq!(p.name, "Toolpath template");
    }

    fn moderation_fixture() -> Vec<Product> {
        let mut items = Vec::new();
        for (id, name, maker, owner, status) in [
            (1, "Haas VF-2 post", "Haas", "Camline", Some(PublicationStatus::PendingReview)),
            (2, "DMU 50 kinematics", "DMG Mori", "Camline", Some(PublicationStatus::Published)),
            (3, "Okuma schema", "Okuma", "Okuma", Some(PublicationStatus::PendingReview)),
            (4, "Robot cell kit", "KUKA", "Haas Partners", Some(PublicationStatus::Draft)),
            (5, "Old post", "Fanuc", "Acme", Some(PublicationStatus::Rejected)),
            (6, "Unclassified", "Mazak", "Acme", None),
        ] {
            let mut p = Product::new(id, name);
            p.machine_manufacturer = maker.into();
            p.product_owner = owner.into();
            p.publication_status = status;
            items.push(p);
        }
        items
    }

    #[test]
    fn review_queue_filters_by_status_and_query() {
        let items = moderation_fixture();
        let ids = |v: Vec<&Product>| v.iter().map(|p| p.id.0).collect::<Vec<_>>();

        assert_eq!(ids(review_queue(&items, None, None)), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(
            ids(review_queue(&items, Some(PublicationStatus::PendingReview), None)),
            vec![1, 3]
        );
        // Matches manufacturer "Haas" and owner "Haas Partners".
        assert_eq!(ids(review_queue(&items, None, Some("haas"))), vec![1, 4]);
        assert_eq!(
            ids(review_queue(&items, Some(PublicationStatus::PendingReview), Some("OKUMA"))),
            vec![3]
        );
        assert_eq!(ids(review_queue(&items, None, Some("  "))).len(), 6);
    }

    #[test]
    fn status_counts_tally_each_tab() {
        let counts = StatusCounts::tally(&moderation_fixture());
        assert_eq!(
            counts,
            StatusCounts {
                all: 6,
                pending_review: 2,
                published: 1,
                draft: 1,
                rejected: 1,
            }
        );
        assert_eq!(
            counts.to_string(),
            "All 6 | Pending 2 | Published 1 | Drafts 1 | Rejected 1"
        );
    }
}
