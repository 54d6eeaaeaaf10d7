use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::errors::AppError;

// ============ Profile ============

/// The accumulating spend answers sent to the recommendation service.
///
/// Field names are the upstream wire names. Monthly amounts and annual
/// amounts share the same rupee unit; lounge fields are visit counts per
/// quarter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Monthly Amazon spend.
    pub amazon_spends: u64,
    /// Monthly Flipkart spend.
    pub flipkart_spends: u64,
    /// Monthly spend on other online merchants.
    pub other_online_spends: u64,
    /// Monthly offline retail spend.
    pub other_offline_spends: u64,
    /// Monthly online grocery spend.
    pub grocery_spends_online: u64,
    /// Monthly food delivery spend.
    pub online_food_ordering: u64,
    /// Monthly fuel spend. Collected with food and dining.
    pub fuel: u64,
    /// Monthly dining out spend.
    pub dining_or_going_out: u64,
    /// Annual flight spend.
    pub flights_annual: u64,
    /// Annual hotel spend.
    pub hotels_annual: u64,
    /// Domestic lounge visits per quarter, one of 0/2/5/8.
    pub domestic_lounge_usage_quarterly: u64,
    /// International lounge visits per quarter, one of 0/2/5/8.
    pub international_lounge_usage_quarterly: u64,
    /// Monthly mobile bill.
    pub mobile_phone_bills: u64,
    /// Monthly electricity bill.
    pub electricity_bills: u64,
    /// Monthly water bill.
    pub water_bills: u64,
    /// Annual health insurance premium.
    pub insurance_health_annual: u64,
    /// Annual motor insurance premium.
    pub insurance_car_or_bike_annual: u64,
    /// Monthly rent.
    pub rent: u64,
    /// Annual school fees.
    pub school_fees: u64,
}

/// Names one field of a [`Profile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    AmazonSpends,
    FlipkartSpends,
    OtherOnlineSpends,
    OtherOfflineSpends,
    GrocerySpendsOnline,
    OnlineFoodOrdering,
    Fuel,
    DiningOrGoingOut,
    FlightsAnnual,
    HotelsAnnual,
    DomesticLoungeUsageQuarterly,
    InternationalLoungeUsageQuarterly,
    MobilePhoneBills,
    ElectricityBills,
    WaterBills,
    InsuranceHealthAnnual,
    InsuranceCarOrBikeAnnual,
    Rent,
    SchoolFees,
}

impl ProfileField {
    /// Every field, in wire order.
    pub const ALL: [ProfileField; 19] = [
        ProfileField::AmazonSpends,
        ProfileField::FlipkartSpends,
        ProfileField::OtherOnlineSpends,
        ProfileField::OtherOfflineSpends,
        ProfileField::GrocerySpendsOnline,
        ProfileField::OnlineFoodOrdering,
        ProfileField::Fuel,
        ProfileField::DiningOrGoingOut,
        ProfileField::FlightsAnnual,
        ProfileField::HotelsAnnual,
        ProfileField::DomesticLoungeUsageQuarterly,
        ProfileField::InternationalLoungeUsageQuarterly,
        ProfileField::MobilePhoneBills,
        ProfileField::ElectricityBills,
        ProfileField::WaterBills,
        ProfileField::InsuranceHealthAnnual,
        ProfileField::InsuranceCarOrBikeAnnual,
        ProfileField::Rent,
        ProfileField::SchoolFees,
    ];

    /// Upstream wire name, identical to the serialized form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AmazonSpends => "amazon_spends",
            Self::FlipkartSpends => "flipkart_spends",
            Self::OtherOnlineSpends => "other_online_spends",
            Self::OtherOfflineSpends => "other_offline_spends",
            Self::GrocerySpendsOnline => "grocery_spends_online",
            Self::OnlineFoodOrdering => "online_food_ordering",
            Self::Fuel => "fuel",
            Self::DiningOrGoingOut => "dining_or_going_out",
            Self::FlightsAnnual => "flights_annual",
            Self::HotelsAnnual => "hotels_annual",
            Self::DomesticLoungeUsageQuarterly => "domestic_lounge_usage_quarterly",
            Self::InternationalLoungeUsageQuarterly => "international_lounge_usage_quarterly",
            Self::MobilePhoneBills => "mobile_phone_bills",
            Self::ElectricityBills => "electricity_bills",
            Self::WaterBills => "water_bills",
            Self::InsuranceHealthAnnual => "insurance_health_annual",
            Self::InsuranceCarOrBikeAnnual => "insurance_car_or_bike_annual",
            Self::Rent => "rent",
            Self::SchoolFees => "school_fees",
        }
    }

    /// Lounge fields only accept the discrete lounge choices.
    pub fn is_lounge(self) -> bool {
        matches!(
            self,
            Self::DomesticLoungeUsageQuarterly | Self::InternationalLoungeUsageQuarterly
        )
    }
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileField {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProfileField::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown profile field '{}'", s)))
    }
}

impl Profile {
    /// Current value of `field`; unanswered fields read as 0.
    pub fn get(&self, field: ProfileField) -> u64 {
        match field {
            ProfileField::AmazonSpends => self.amazon_spends,
            ProfileField::FlipkartSpends => self.flipkart_spends,
            ProfileField::OtherOnlineSpends => self.other_online_spends,
            ProfileField::OtherOfflineSpends => self.other_offline_spends,
            ProfileField::GrocerySpendsOnline => self.grocery_spends_online,
            ProfileField::OnlineFoodOrdering => self.online_food_ordering,
            ProfileField::Fuel => self.fuel,
            ProfileField::DiningOrGoingOut => self.dining_or_going_out,
            ProfileField::FlightsAnnual => self.flights_annual,
            ProfileField::HotelsAnnual => self.hotels_annual,
            ProfileField::DomesticLoungeUsageQuarterly => self.domestic_lounge_usage_quarterly,
            ProfileField::InternationalLoungeUsageQuarterly => {
                self.international_lounge_usage_quarterly
            }
            ProfileField::MobilePhoneBills => self.mobile_phone_bills,
            ProfileField::ElectricityBills => self.electricity_bills,
            ProfileField::WaterBills => self.water_bills,
            ProfileField::InsuranceHealthAnnual => self.insurance_health_annual,
            ProfileField::InsuranceCarOrBikeAnnual => self.insurance_car_or_bike_annual,
            ProfileField::Rent => self.rent,
            ProfileField::SchoolFees => self.school_fees,
        }
    }

    pub(crate) fn slot_mut(&mut self, field: ProfileField) -> &mut u64 {
        match field {
            ProfileField::AmazonSpends => &mut self.amazon_spends,
            ProfileField::FlipkartSpends => &mut self.flipkart_spends,
            ProfileField::OtherOnlineSpends => &mut self.other_online_spends,
            ProfileField::OtherOfflineSpends => &mut self.other_offline_spends,
            ProfileField::GrocerySpendsOnline => &mut self.grocery_spends_online,
            ProfileField::OnlineFoodOrdering => &mut self.online_food_ordering,
            ProfileField::Fuel => &mut self.fuel,
            ProfileField::DiningOrGoingOut => &mut self.dining_or_going_out,
            ProfileField::FlightsAnnual => &mut self.flights_annual,
            ProfileField::HotelsAnnual => &mut self.hotels_annual,
            ProfileField::DomesticLoungeUsageQuarterly => {
                &mut self.domestic_lounge_usage_quarterly
            }
            ProfileField::InternationalLoungeUsageQuarterly => {
                &mut self.international_lounge_usage_quarterly
            }
            ProfileField::MobilePhoneBills => &mut self.mobile_phone_bills,
            ProfileField::ElectricityBills => &mut self.electricity_bills,
            ProfileField::WaterBills => &mut self.water_bills,
            ProfileField::InsuranceHealthAnnual => &mut self.insurance_health_annual,
            ProfileField::InsuranceCarOrBikeAnnual => &mut self.insurance_car_or_bike_annual,
            ProfileField::Rent => &mut self.rent,
            ProfileField::SchoolFees => &mut self.school_fees,
        }
    }
}

// ============ Categories ============

/// One of the five questionnaire categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKey {
    Shopping,
    /// Food delivery, dining out and fuel.
    Food,
    Travel,
    /// Mobile, electricity and water bills.
    Bills,
    /// Rent, insurance premiums and school fees.
    RentInsurance,
}

impl CategoryKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Shopping => "shopping",
            Self::Food => "food",
            Self::Travel => "travel",
            Self::Bills => "bills",
            Self::RentInsurance => "rent_insurance",
        }
    }
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============ Eligibility ============

/// Employment status as understood by the partner eligibility service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentStatus {
    Salaried,
    SelfEmployed,
    Student,
    Other,
}

impl EmploymentStatus {
    pub const ALL: [EmploymentStatus; 4] = [
        EmploymentStatus::Salaried,
        EmploymentStatus::SelfEmployed,
        EmploymentStatus::Student,
        EmploymentStatus::Other,
    ];

    /// Human-readable label for pickers.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Salaried => "Salaried",
            Self::SelfEmployed => "Self-employed",
            Self::Student => "Student",
            Self::Other => "Other",
        }
    }
}

/// Supplementary qualification data. Every field is optional; partial
/// eligibility is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Eligibility {
    /// Monthly in-hand income in rupees.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inhand_income: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emp_status: Option<EmploymentStatus>,
    /// Six-digit postal code; validated on every update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pincode: Option<String>,
    /// Opaque partner token. Accepted on input but never echoed back.
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

impl Eligibility {
    /// Merges `update` into `self`, ignoring absent and empty values so a
    /// partial submission never clears what is already known.
    pub fn merge(&mut self, update: Eligibility) {
        if let Some(income) = update.inhand_income.filter(|income| *income > 0) {
            self.inhand_income = Some(income);
        }
        if let Some(status) = update.emp_status {
            self.emp_status = Some(status);
        }
        if let Some(pincode) = non_blank(update.pincode) {
            self.pincode = Some(pincode);
        }
        if let Some(token) = non_blank(update.token) {
            self.token = Some(token);
        }
    }

    /// Income is known and non-zero.
    pub fn has_income(&self) -> bool {
        self.inhand_income.is_some_and(|income| income > 0)
    }

    /// Pincode is known and not blank.
    pub fn has_pincode(&self) -> bool {
        self.pincode
            .as_deref()
            .is_some_and(|pincode| !pincode.trim().is_empty())
    }

    /// Income, employment status and pincode are all known.
    pub fn is_complete(&self) -> bool {
        self.has_income() && self.emp_status.is_some() && self.has_pincode()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

static PINCODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[1-9][0-9]{5}$").expect("pincode pattern is valid"));

/// Six-digit Indian postal code with a non-zero leading digit.
pub fn is_valid_pincode(pincode: &str) -> bool {
    PINCODE_REGEX.is_match(pincode.trim())
}

// ============ Recommendations ============

/// Where a card's savings figures came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SavingsSource {
    /// Reported by the scoring service.
    #[default]
    Upstream,
    /// Estimated locally because the service omitted savings.
    Synthetic,
    /// Part of the deterministic fallback list.
    Sample,
}

/// Canonical recommendation shape, independent of the upstream format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardResult {
    /// Upstream identifier, or `card-N` by position when absent.
    pub id: String,
    /// Display name, or `Card N` by position when absent.
    pub name: String,
    /// Estimated monthly savings in rupees.
    pub monthly_savings: f64,
    /// Estimated annual savings in rupees; twelve months when not reported.
    pub annual_savings: f64,
    /// Short badges such as "Cashback". Never empty.
    pub tags: Vec<String>,
    /// Headline benefits. Never empty.
    pub key_perks: Vec<String>,
    /// Whether the user is likely to qualify. Defaults to true.
    pub eligible: bool,
    /// 1-based rank across all cards.
    pub overall_rank: u32,
    /// 1-based rank among eligible cards; absent on ineligible ones.
    pub eligible_rank: Option<u32>,
    /// Card art URL when the service provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    /// Provenance of the savings figures. Internal only.
    #[serde(skip)]
    pub savings_source: SavingsSource,
}

impl CardResult {
    /// Savings were estimated locally rather than reported.
    pub fn is_synthetic(&self) -> bool {
        self.savings_source == SavingsSource::Synthetic
    }
}

/// Results split into the unfiltered list and the eligible-only view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSets {
    pub overall: Vec<CardResult>,
    pub eligible: Vec<CardResult>,
}

impl ResultSets {
    /// Partitions a canonical list. `overall` keeps the list order; `eligible`
    /// keeps the relative order of eligible cards. Eligible cards without an
    /// eligible rank get their 1-based position in the subset and ineligible
    /// cards never carry one.
    pub fn partition(cards: Vec<CardResult>) -> Self {
        let mut position = 0u32;
        let overall: Vec<CardResult> = cards
            .into_iter()
            .map(|mut card| {
                if card.eligible {
                    position += 1;
                    card.eligible_rank.get_or_insert(position);
                } else {
                    card.eligible_rank = None;
                }
                card
            })
            .collect();

        let eligible = overall.iter().filter(|card| card.eligible).cloned().collect();

        Self { overall, eligible }
    }

    /// No cards at all, eligible or not.
    pub fn is_empty(&self) -> bool {
        self.overall.is_empty()
    }
}

// ============ Journey ============

/// Top-level step of a journey.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JourneyStep {
    /// Choosing which categories to answer, and in what order.
    #[default]
    CategoryPick,
    /// Answering the categories one at a time.
    CategoryInputs,
}

/// Which result list is in front.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultTab {
    Eligible,
    #[default]
    All,
}

/// Copy shown above the results after a completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Banners {
    /// Acknowledges the category that was just completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<String>,
    /// Invites the user into the next category; absent at the last one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nudge: Option<String>,
}

/// Which eligibility field the gate is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityRequirement {
    Income,
    Pincode,
}

/// A completion parked until eligibility is submitted or declined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEligibility {
    /// The category whose completion is waiting on the collection step.
    pub category: CategoryKey,
    /// The field the gate asked for.
    pub requirement: EligibilityRequirement,
}

/// "2 of 5" style progress through the chosen categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// 1-based position of the current category.
    pub position: usize,
    pub total: usize,
}

/// Read model handed to presentation collaborators.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneySnapshot {
    pub id: uuid::Uuid,
    pub step: JourneyStep,
    /// Resolved category order; empty until categories are selected.
    pub order: Vec<CategoryKey>,
    /// Index into `order` of the category being answered.
    pub cursor: usize,
    /// `order[cursor]` while answering categories.
    pub current_category: Option<CategoryKey>,
    pub progress: Option<Progress>,
    pub profile: Profile,
    /// Known eligibility answers; the partner token is never included.
    pub eligibility: Eligibility,
    pub pending_eligibility: Option<PendingEligibility>,
    /// Latest applied recommendations.
    pub results: ResultSets,
    /// Profile completeness, 0 to 100.
    pub accuracy: u32,
    pub banners: Banners,
    pub active_tab: ResultTab,
    pub started_at: DateTime<Utc>,
    /// Last time any intent changed the journey.
    pub updated_at: DateTime<Utc>,
}
