//! # Domain Types
//!
//! Core domain types cached and queued by the offline layer.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  REFERENCE DATA (Entity Cache)                                          │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Property     │   │  GhanaRegion    │   │   EcoFeature    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (key)       │   │  id (key)       │   │  id (key)       │       │
//! │  │  city, region   │   │  name           │   │  name           │       │
//! │  │  listing_type   │   │  capital        │   │  category       │       │
//! │  │  green_score?   │   └─────────────────┘   └─────────────────┘       │
//! │  │  eco_features?  │                                                    │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! │  MUTATIONS (Offline Action Queue)                                       │
//! │  ┌─────────────────┐   ┌─────────────────────────────────────┐         │
//! │  │ NewOfflineAction│──►│ OfflineAction                        │         │
//! │  │  action_type    │   │  id (store-assigned), retry_count    │         │
//! │  │  payload        │   │  created_at, last_error              │         │
//! │  │  endpoint       │   │  last_attempt_at                     │         │
//! │  └─────────────────┘   └─────────────────────────────────────┘         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

// =============================================================================
// Listing Type
// =============================================================================

/// Whether a property is offered for sale or for rent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ListingType {
    Sale,
    Rent,
}

impl std::fmt::Display for ListingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListingType::Sale => write!(f, "sale"),
            ListingType::Rent => write!(f, "rent"),
        }
    }
}

// =============================================================================
// Property
// =============================================================================

/// A property listing as served by the marketplace API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Property {
    /// Natural key.
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    /// City or town, matched by the `location` filter.
    pub city: String,

    /// Region name (e.g. "Greater Accra").
    pub region: String,

    pub listing_type: ListingType,

    /// Asking price (or monthly rent) in Ghana cedis.
    pub price_ghs: f64,

    #[serde(default)]
    pub bedrooms: Option<u32>,

    /// Sustainability rating 0-100, when the listing has been assessed.
    #[serde(default)]
    pub green_score: Option<u32>,

    /// Names of eco features present (e.g. "Solar", "LED Lighting").
    #[serde(default)]
    pub eco_features: Option<Vec<String>>,

    #[serde(default)]
    pub image_url: Option<String>,

    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub updated_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Region
// =============================================================================

/// One of Ghana's administrative regions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GhanaRegion {
    pub id: String,
    pub name: String,
    pub capital: String,
    /// Number of active listings in the region, when the API reports it.
    #[serde(default)]
    pub property_count: Option<u32>,
}

// =============================================================================
// Eco Feature
// =============================================================================

/// An entry of the eco-feature catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EcoFeature {
    pub id: String,
    pub name: String,
    /// Grouping shown in the UI: "energy", "water", "materials", ...
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Contribution of this feature to a listing's green score.
    #[serde(default)]
    pub score_weight: Option<u32>,
}

// =============================================================================
// Offline Actions
// =============================================================================

/// Kinds of mutations that can be queued while offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    SendInquiry,
    SaveSearch,
    SaveProperty,
    RemoveSavedProperty,
    ScheduleViewing,
    AcceptQuote,
}

impl ActionType {
    /// Returns the persisted (and wire) name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::SendInquiry => "send_inquiry",
            ActionType::SaveSearch => "save_search",
            ActionType::SaveProperty => "save_property",
            ActionType::RemoveSavedProperty => "remove_saved_property",
            ActionType::ScheduleViewing => "schedule_viewing",
            ActionType::AcceptQuote => "accept_quote",
        }
    }

    /// HTTP method used when replaying this action.
    pub fn http_method(&self) -> &'static str {
        match self {
            ActionType::RemoveSavedProperty => "DELETE",
            _ => "POST",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionType {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "send_inquiry" => Ok(ActionType::SendInquiry),
            "save_search" => Ok(ActionType::SaveSearch),
            "save_property" => Ok(ActionType::SaveProperty),
            "remove_saved_property" => Ok(ActionType::RemoveSavedProperty),
            "schedule_viewing" => Ok(ActionType::ScheduleViewing),
            "accept_quote" => Ok(ActionType::AcceptQuote),
            other => Err(crate::error::CoreError::UnknownActionType(other.to_string())),
        }
    }
}

/// A mutation as submitted by a caller, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewOfflineAction {
    pub action_type: ActionType,
    /// Request body, replayed verbatim.
    #[ts(type = "unknown")]
    pub payload: Value,
    /// API path relative to the configured base URL (e.g. "/inquiries").
    pub endpoint: String,
}

impl NewOfflineAction {
    pub fn new(action_type: ActionType, endpoint: impl Into<String>, payload: Value) -> Self {
        NewOfflineAction {
            action_type,
            payload,
            endpoint: endpoint.into(),
        }
    }
}

/// A queued mutation awaiting confirmed replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OfflineAction {
    /// Store-assigned, monotonically increasing.
    #[ts(type = "number")]
    pub id: i64,
    pub action_type: ActionType,
    #[ts(type = "unknown")]
    pub payload: Value,
    pub endpoint: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    /// Number of failed replay attempts.
    pub retry_count: u32,
    /// Error of the most recent failed attempt.
    pub last_error: Option<String>,
    #[ts(as = "Option<String>")]
    pub last_attempt_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Storage Stats
// =============================================================================

/// Row counts per table, computed on demand for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StorageStats {
    pub properties: u64,
    pub regions: u64,
    pub features: u64,
    pub actions: u64,
    pub search_results: u64,
}

// =============================================================================
// Unit Tests
// =============================================================================
