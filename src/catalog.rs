//! Static journey tables: categories, fields, banner copy.
//!
//! The scorer and gate take these tables as arguments instead of reading
//! globals, so tests can swap in alternate weightings.

use serde::Serialize;
use std::collections::HashSet;

use crate::errors::AppError;
use crate::models::{CategoryKey, EmploymentStatus, ProfileField};
use crate::value_mapper::format_currency;

/// A weighted group of profile fields presented together in one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryConfig {
    pub key: CategoryKey,
    pub label: &'static str,
    pub fields: Vec<ProfileField>,
    pub weight: u32,
}

/// Ordered set of categories. The order is the canonical traversal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTable {
    categories: Vec<CategoryConfig>,
}

impl CategoryTable {
    /// Builds a table, rejecting it unless every profile field belongs to
    /// exactly one category and the weights sum to 100.
    pub fn new(categories: Vec<CategoryConfig>) -> Result<Self, AppError> {
        let mut seen_keys = HashSet::new();
        let mut seen_fields = HashSet::new();

        for category in &categories {
            if !seen_keys.insert(category.key) {
                return Err(AppError::BadRequest(format!(
                    "Category '{}' appears more than once",
                    category.key
                )));
            }
            for field in &category.fields {
                if !seen_fields.insert(*field) {
                    return Err(AppError::BadRequest(format!(
                        "Field '{}' is owned by more than one category",
                        field
                    )));
                }
            }
        }

        if let Some(orphan) = ProfileField::ALL
            .into_iter()
            .find(|field| !seen_fields.contains(field))
        {
            return Err(AppError::BadRequest(format!(
                "Field '{}' does not belong to any category",
                orphan
            )));
        }

        let total: u32 = categories.iter().map(|c| c.weight).sum();
        if total != 100 {
            return Err(AppError::BadRequest(format!(
                "Category weights must sum to 100, got {}",
                total
            )));
        }

        Ok(Self { categories })
    }

    /// The production table: shopping 25, food 20, travel 25, bills 10,
    /// rent & insurance 20.
    pub fn standard() -> Self {
        use ProfileField::*;

        Self {
            categories: vec![
                CategoryConfig {
                    key: CategoryKey::Shopping,
                    label: "Shopping",
                    fields: vec![
                        AmazonSpends,
                        FlipkartSpends,
                        OtherOnlineSpends,
                        OtherOfflineSpends,
                    ],
                    weight: 25,
                },
                CategoryConfig {
                    key: CategoryKey::Food,
                    label: "Food & Dining",
                    fields: vec![OnlineFoodOrdering, DiningOrGoingOut, GrocerySpendsOnline, Fuel],
                    weight: 20,
                },
                CategoryConfig {
                    key: CategoryKey::Travel,
                    label: "Travel",
                    fields: vec![
                        FlightsAnnual,
                        HotelsAnnual,
                        DomesticLoungeUsageQuarterly,
                        InternationalLoungeUsageQuarterly,
                    ],
                    weight: 25,
                },
                CategoryConfig {
                    key: CategoryKey::Bills,
                    label: "Bills",
                    fields: vec![MobilePhoneBills, ElectricityBills, WaterBills],
                    weight: 10,
                },
                CategoryConfig {
                    key: CategoryKey::RentInsurance,
                    label: "Rent & Insurance",
                    fields: vec![
                        Rent,
                        InsuranceHealthAnnual,
                        InsuranceCarOrBikeAnnual,
                        SchoolFees,
                    ],
                    weight: 20,
                },
            ],
        }
    }

    pub fn categories(&self) -> &[CategoryConfig] {
        &self.categories
    }

    pub fn get(&self, key: CategoryKey) -> Option<&CategoryConfig> {
        self.categories.iter().find(|c| c.key == key)
    }

    pub fn default_order(&self) -> Vec<CategoryKey> {
        self.categories.iter().map(|c| c.key).collect()
    }

    /// The canonical order starting at `key`, as offered by "start with this
    /// category".
    pub fn order_starting_at(&self, key: CategoryKey) -> Vec<CategoryKey> {
        self.categories
            .iter()
            .skip_while(|c| c.key != key)
            .map(|c| c.key)
            .collect()
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::standard()
    }
}

// ============ Fields ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldUnit {
    Rupees,
    Visits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldConfig {
    pub field: ProfileField,
    pub label: &'static str,
    /// Upper bound of the input slider.
    pub max: u64,
    pub unit: FieldUnit,
}

impl FieldConfig {
    /// Renders a stored value in the field's unit.
    pub fn display(&self, value: u64) -> String {
        match self.unit {
            FieldUnit::Rupees => format_currency(value),
            FieldUnit::Visits => format!("{} visits", value),
        }
    }
}

pub const DEFAULT_FIELD_MAX: u64 = 200_000;

pub fn field_config(field: ProfileField) -> FieldConfig {
    use ProfileField::*;

    let (label, max, unit) = match field {
        AmazonSpends => ("Amazon (monthly)", DEFAULT_FIELD_MAX, FieldUnit::Rupees),
        FlipkartSpends => ("Flipkart (monthly)", DEFAULT_FIELD_MAX, FieldUnit::Rupees),
        OtherOnlineSpends => ("Other Online (monthly)", DEFAULT_FIELD_MAX, FieldUnit::Rupees),
        OtherOfflineSpends => ("Offline Retail (monthly)", DEFAULT_FIELD_MAX, FieldUnit::Rupees),
        GrocerySpendsOnline => ("Groceries (monthly)", DEFAULT_FIELD_MAX, FieldUnit::Rupees),
        OnlineFoodOrdering => ("Food Delivery (monthly)", DEFAULT_FIELD_MAX, FieldUnit::Rupees),
        Fuel => ("Fuel (monthly)", DEFAULT_FIELD_MAX, FieldUnit::Rupees),
        DiningOrGoingOut => ("Dining Out (monthly)", DEFAULT_FIELD_MAX, FieldUnit::Rupees),
        FlightsAnnual => ("Flights (annual)", 500_000, FieldUnit::Rupees),
        HotelsAnnual => ("Hotels (annual)", 500_000, FieldUnit::Rupees),
        DomesticLoungeUsageQuarterly => ("Domestic Lounges / quarter", 20, FieldUnit::Visits),
        InternationalLoungeUsageQuarterly => {
            ("International Lounges / quarter", 20, FieldUnit::Visits)
        }
        MobilePhoneBills => ("Mobile Bills (monthly)", DEFAULT_FIELD_MAX, FieldUnit::Rupees),
        ElectricityBills => ("Electricity (monthly)", DEFAULT_FIELD_MAX, FieldUnit::Rupees),
        WaterBills => ("Water (monthly)", DEFAULT_FIELD_MAX, FieldUnit::Rupees),
        InsuranceHealthAnnual => ("Health Insurance (annual)", DEFAULT_FIELD_MAX, FieldUnit::Rupees),
        InsuranceCarOrBikeAnnual => {
            ("Motor Insurance (annual)", DEFAULT_FIELD_MAX, FieldUnit::Rupees)
        }
        Rent => ("Rent (monthly)", DEFAULT_FIELD_MAX, FieldUnit::Rupees),
        SchoolFees => ("School Fees (annual)", 300_000, FieldUnit::Rupees),
    };

    FieldConfig {
        field,
        label,
        max,
        unit,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoungeChoice {
    pub label: &'static str,
    pub value: u64,
}

/// Discrete answers offered for lounge visit counts.
pub const LOUNGE_CHOICES: [LoungeChoice; 4] = [
    LoungeChoice { label: "0", value: 0 },
    LoungeChoice { label: "1–2", value: 2 },
    LoungeChoice { label: "3–5", value: 5 },
    LoungeChoice { label: "6+", value: 8 },
];

// ============ Banner copy ============

/// Shown after a category's recommendations land.
pub fn update_banner(category: CategoryKey) -> &'static str {
    match category {
        CategoryKey::Shopping => "Shopping patterns analyzed. Cashback cards prioritized.",
        CategoryKey::Food => "Dining habits added. Food reward cards unlocked.",
        CategoryKey::Travel => "Travel profile complete. Premium travel cards now available.",
        CategoryKey::Bills => "Bill payments added. Utility cashback cards included.",
        CategoryKey::RentInsurance => "Major expenses added. Premium card eligibility expanded.",
    }
}

/// Invites the user into `next`, the following category in their order.
pub fn nudge_banner(next: CategoryKey) -> &'static str {
    match next {
        CategoryKey::Shopping => "Add Shopping to prioritize cashback cards.",
        CategoryKey::Food => "Add Food & Dining to unlock restaurant rewards.",
        CategoryKey::Travel => "Add Travel to access premium cards with lounge benefits.",
        CategoryKey::Bills => "Add Bills to capture recurring cashback opportunities.",
        CategoryKey::RentInsurance => "Add Rent & Insurance to unlock premium card benefits.",
    }
}

// ============ Catalog view ============

#[derive(Debug, Clone, Serialize)]
pub struct EmploymentOption {
    pub label: &'static str,
    pub value: EmploymentStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldView {
    #[serde(flatten)]
    pub config: FieldConfig,
    /// Slider maximum as shown next to the slider, e.g. `₹2.0L`.
    pub max_label: String,
}

impl From<FieldConfig> for FieldView {
    fn from(config: FieldConfig) -> Self {
        Self {
            max_label: config.display(config.max),
            config,
        }
    }
}

/// Everything a presentation layer needs to render the questionnaire.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogView {
    pub categories: Vec<CategoryConfig>,
    pub fields: Vec<FieldView>,
    pub employment_options: Vec<EmploymentOption>,
    pub lounge_choices: Vec<LoungeChoice>,
}

impl CatalogView {
    pub fn from_table(table: &CategoryTable) -> Self {
        Self {
            categories: table.categories().to_vec(),
            fields: ProfileField::ALL
                .into_iter()
                .map(|field| FieldView::from(field_config(field)))
                .collect(),
            employment_options: EmploymentStatus::ALL
                .into_iter()
                .map(|value| EmploymentOption {
                    label: value.label(),
                    value,
                })
                .collect(),
            lounge_choices: LOUNGE_CHOICES.to_vec(),
        }
    }
}
