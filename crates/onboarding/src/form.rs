//! Form fields collected across the wizard steps.

use serde::{Deserialize, Serialize};

/// Everything the user has entered so far. Serialized as the submission
/// payload, so field names follow the backend's camelCase convention.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormData {
    pub country: String,
    pub selected_number: String,
    pub business_type: String,
    pub business_search: Option<BusinessInfo>,
}

/// The business picked (or typed) on the search step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl BusinessInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = non_empty(address.into());
        self
    }

    #[must_use]
    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = non_empty(website.into());
        self
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// A partial set of fields to merge into [`FormData`]. Unset fields are left
/// alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormUpdate {
    pub country: Option<String>,
    pub selected_number: Option<String>,
    pub business_type: Option<String>,
    /// `Some(None)` clears the business selection.
    #[serde(deserialize_with = "double_option")]
    pub business_search: Option<Option<BusinessInfo>>,
}

/// Distinguishes an explicit `null` (clear) from a missing key (keep).
fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<BusinessInfo>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<BusinessInfo>::deserialize(deserializer).map(Some)
}

impl FormUpdate {
    #[must_use]
    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    #[must_use]
    pub fn selected_number(mut self, number: impl Into<String>) -> Self {
        self.selected_number = Some(number.into());
        self
    }

    #[must_use]
    pub fn business_type(mut self, business_type: impl Into<String>) -> Self {
        self.business_type = Some(business_type.into());
        self
    }

    #[must_use]
    pub fn business_search(mut self, business: BusinessInfo) -> Self {
        self.business_search = Some(Some(business));
        self
    }

    #[must_use]
    pub fn clear_business_search(mut self) -> Self {
        self.business_search = Some(None);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl FormData {
    /// Overwrite the fields present in `update`.
    pub fn merge(&mut self, update: FormUpdate) {
        if let Some(country) = update.country {
            self.country = country;
        }
        if let Some(number) = update.selected_number {
            self.selected_number = number;
        }
        if let Some(business_type) = update.business_type {
            self.business_type = business_type;
        }
        if let Some(business) = update.business_search {
            self.business_search = business;
        }
    }

    pub fn business_name(&self) -> Option<&str> {
        self.business_search.as_ref().map(|b| b.name.as_str())
    }
}
