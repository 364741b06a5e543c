//! # Offline Search Filters
//!
//! The predicate used to answer searches from the cached listings when the
//! network is unavailable.
//!
//! ## Matching Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Filter            │ Keeps a property when...                           │
//! │  ──────────────────┼─────────────────────────────────────────────────   │
//! │  location          │ city contains it (case-insensitive)                │
//! │  region            │ region == value                                    │
//! │  listing_type      │ listing_type == value                              │
//! │  green_score_min   │ green_score is set and >= value                    │
//! │  eco_features      │ eco_features is set and ⊇ value                    │
//! │                                                                         │
//! │  All present filters must hold (AND). No filters → everything.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::types::{ListingType, Property};

/// Filters accepted by the offline search and used in search cache keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SearchFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing_type: Option<ListingType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub green_score_min: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eco_features: Option<Vec<String>>,
}

impl SearchFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn listing_type(mut self, listing_type: ListingType) -> Self {
        self.listing_type = Some(listing_type);
        self
    }

    pub fn green_score_min(mut self, min: u32) -> Self {
        self.green_score_min = Some(min);
        self
    }

    pub fn eco_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.eco_features = Some(features.into_iter().map(Into::into).collect());
        self
    }

    /// Returns true when no filter is set.
    pub fn is_empty(&self) -> bool {
        self.location.is_none()
            && self.region.is_none()
            && self.listing_type.is_none()
            && self.green_score_min.is_none()
            && self.eco_features.is_none()
    }

    /// Rejects values the marketplace would never produce.
    pub fn validate(&self) -> CoreResult<()> {
        if let Some(min) = self.green_score_min {
            if min > 100 {
                return Err(CoreError::InvalidFilter {
                    field: "green_score_min".to_string(),
                    reason: format!("must be between 0 and 100, got {}", min),
                });
            }
        }
        Ok(())
    }

    /// Evaluates every present filter against a property.
    pub fn matches(&self, property: &Property) -> bool {
        if let Some(location) = &self.location {
            let needle = location.to_lowercase();
            if !property.city.to_lowercase().contains(&needle) {
                return false;
            }
        }

        if let Some(region) = &self.region {
            if &property.region != region {
                return false;
            }
        }

        if let Some(listing_type) = self.listing_type {
            if property.listing_type != listing_type {
                return false;
            }
        }

        if let Some(min) = self.green_score_min {
            match property.green_score {
                Some(score) if score >= min => {}
                _ => return false,
            }
        }

        if let Some(wanted) = &self.eco_features {
            match &property.eco_features {
                Some(present) => {
                    if !wanted.iter().all(|w| present.contains(w)) {
                        return false;
                    }
                }
                None => return false,
            }
        }

        true
    }

    /// Filters a slice of properties, preserving order.
    pub fn apply<'a, I>(&self, properties: I) -> Vec<Property>
    where
        I: IntoIterator<Item = &'a Property>,
    {
        properties
            .into_iter()
            .filter(|p| self.matches(p))
            .cloned()
            .collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn property(
        id: &str,
        city: &str,
        region: &str,
        listing_type: ListingType,
        green_score: Option<u32>,
        eco_features: Option<&[&str]>,
    ) -> Property {
        Property {
            id: id.to_string(),
            title: format!("Listing {}", id),
            description: None,
            city: city.to_string(),
            region: region.to_string(),
            listing_type,
            price_ghs: 1000.0,
            bedrooms: Some(2),
            green_score,
            eco_features: eco_features.map(|f| f.iter().map(|s| s.to_string()).collect()),
            image_url: None,
            updated_at: None,
        }
    }

    fn catalog() -> Vec<Property> {
        vec![
            property("1", "Accra", "Greater Accra", ListingType::Sale, Some(72), Some(&["Solar", "LED Lighting"])),
            property("2", "East Legon, Accra", "Greater Accra", ListingType::Rent, Some(55), Some(&["LED Lighting"])),
            property("3", "Kumasi", "Ashanti", ListingType::Sale, None, None),
            property("4", "Takoradi", "Western", ListingType::Rent, Some(90), None),
            property("5", "Cape Coast", "Central", ListingType::Sale, Some(65), Some(&["Solar"])),
        ]
    }

    fn ids(found: &[Property]) -> Vec<&str> {
        found.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_empty_filters_match_everything() {
        let all = catalog();
        let filters = SearchFilters::new();
        assert!(filters.is_empty());
        assert_eq!(filters.apply(&all).len(), all.len());
    }

    #[test]
    fn test_location_is_case_insensitive_substring() {
        let found = SearchFilters::new().location("accra").apply(&catalog());
        assert_eq!(ids(&found), vec!["1", "2"]);
    }

    #[test]
    fn test_region_and_listing_type_are_exact() {
        let found = SearchFilters::new().region("Greater").apply(&catalog());
        assert!(found.is_empty());

        let found = SearchFilters::new()
            .listing_type(ListingType::Sale)
            .apply(&catalog());
        assert_eq!(ids(&found), vec!["1", "3", "5"]);
    }

    #[test]
    fn test_green_score_min_skips_unscored() {
        let found = SearchFilters::new().green_score_min(60).apply(&catalog());
        assert_eq!(ids(&found), vec!["1", "4", "5"]);
    }

    #[test]
    fn test_eco_features_requires_superset() {
        let found = SearchFilters::new()
            .eco_features(["Solar", "LED Lighting"])
            .apply(&catalog());
        assert_eq!(ids(&found), vec!["1"]);

        let found = SearchFilters::new().eco_features(["Solar"]).apply(&catalog());
        assert_eq!(ids(&found), vec!["1", "5"]);
    }

    #[test]
    fn test_filters_combine_as_intersection() {
        let found = SearchFilters::new()
            .listing_type(ListingType::Sale)
            .location("accra")
            .apply(&catalog());
        assert_eq!(ids(&found), vec!["1"]);

        let found = SearchFilters::new()
            .green_score_min(70)
            .eco_features(["Solar"])
            .apply(&catalog());
        assert_eq!(ids(&found), vec!["1"]);
    }

    #[test]
    fn test_validate_green_score_range() {
        assert!(SearchFilters::new().green_score_min(100).validate().is_ok());
        assert!(SearchFilters::new().green_score_min(101).validate().is_err());
    }

    #[test]
    fn test_deserialize_from_ui_shape() {
        let filters: SearchFilters =
            serde_json::from_str(r#"{"listing_type":"sale","green_score_min":70}"#).unwrap();
        assert_eq!(filters.listing_type, Some(ListingType::Sale));
        assert_eq!(filters.green_score_min, Some(70));
        assert!(filters.location.is_none());
    }
}
