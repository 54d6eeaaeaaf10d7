//! Reconciles the recommendation service's response shapes into
//! [`CardResult`]s.
//!
//! Shapes are handled by an ordered chain of adapters. Each adapter either
//! recognises the body and returns canonical cards or returns `None` so the
//! next one can try. Supporting a new upstream shape means adding an adapter.

use rand::Rng;
use serde_json::Value;

use crate::models::{CardResult, SavingsSource};

pub const DEFAULT_TAG: &str = "Recommended";
pub const DEFAULT_PERK: &str = "Cashback rewards";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// `{ "cards": [...] }`, already canonical.
    Cards,
    /// `{ "savings": [...] }`, keyed with assorted aliases.
    Savings,
}

impl ResponseShape {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cards => "cards",
            Self::Savings => "savings",
        }
    }
}

/// One recognisable response shape.
pub trait ResponseAdapter: Send + Sync {
    fn shape(&self) -> ResponseShape;

    fn adapt(&self, body: &Value, estimator: SavingsEstimator) -> Option<Vec<CardResult>>;
}

// ============ Synthetic estimates ============

/// Fills in monthly savings when the service omits them, so the results
/// sheet has non-zero numbers. Estimated cards are flagged
/// [`SavingsSource::Synthetic`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SavingsEstimator {
    #[default]
    Synthetic,
    /// Leave missing savings at zero; used for deterministic runs.
    Disabled,
}

impl SavingsEstimator {
    pub fn from_flag(enabled: bool) -> Self {
        if enabled {
            Self::Synthetic
        } else {
            Self::Disabled
        }
    }

    pub fn estimate_monthly(self, card_name: &str) -> Option<f64> {
        match self {
            Self::Synthetic => Some(synthetic_monthly_estimate(
                card_name,
                &mut rand::thread_rng(),
            )),
            Self::Disabled => None,
        }
    }
}

/// Random monthly savings in a range picked by keywords in the card name.
pub fn synthetic_monthly_estimate<R: Rng + ?Sized>(card_name: &str, rng: &mut R) -> f64 {
    let name = card_name.to_lowercase();
    let amount: u32 = if name.contains("amazon") {
        rng.gen_range(500..2500)
    } else if name.contains("cashback") {
        rng.gen_range(300..1800)
    } else if name.contains("travel") {
        rng.gen_range(800..3800)
    } else {
        rng.gen_range(200..1200)
    };
    f64::from(amount)
}

// ============ Alias resolution ============

struct KeyAliases {
    id: &'static [&'static str],
    name: &'static [&'static str],
    tags: &'static [&'static str],
    perks: &'static [&'static str],
    monthly: &'static [&'static str],
    annual: &'static [&'static str],
    overall_rank: &'static [&'static str],
    eligible_rank: &'static [&'static str],
}

const CANONICAL_KEYS: KeyAliases = KeyAliases {
    id: &["id"],
    name: &["name"],
    tags: &["tags"],
    perks: &["keyPerks"],
    monthly: &["monthlySavings"],
    annual: &["annualSavings"],
    overall_rank: &["overallRank"],
    eligible_rank: &["eligibleRank"],
};

const SAVINGS_ALIASES: KeyAliases = KeyAliases {
    id: &["id", "cardId", "card_id"],
    name: &["cardName", "name", "card_name"],
    tags: &["tags", "cardTags", "card_tags"],
    perks: &["perks", "keyPerks", "cardPerks", "card_perks"],
    monthly: &[
        "monthlySavings",
        "savings",
        "monthly_savings",
        "monthly_saving",
        "monthly_saving_amount",
    ],
    annual: &[
        "annualSavings",
        "annual_savings",
        "annual_saving",
        "annual_saving_amount",
    ],
    overall_rank: &["overallRank", "overall_rank"],
    eligible_rank: &["eligibleRank", "eligible_rank"],
};

/// Positive number from a JSON number or numeric string. Zero counts as
/// absent so the next alias gets a chance.
fn positive_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    (number.is_finite() && number > 0.0).then_some(number)
}

fn first_number(entry: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|key| entry.get(*key).and_then(positive_number))
}

fn first_rank(entry: &Value, keys: &[&str]) -> Option<u32> {
    first_number(entry, keys)
        .map(|n| n.round() as u32)
        .filter(|rank| *rank > 0)
}

fn first_text(entry: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        entry
            .get(*key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    })
}

fn first_id(entry: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match entry.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// A list given either as a JSON array or a single comma-joined string.
fn first_list(entry: &Value, keys: &[&str]) -> Option<Vec<String>> {
    keys.iter().find_map(|key| {
        let items: Vec<String> = match entry.get(*key)? {
            Value::Array(values) => values
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            Value::String(joined) => split_list(joined),
            _ => return None,
        };
        (!items.is_empty()).then_some(items)
    })
}

pub fn split_list(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Anything other than an explicit `false` means eligible.
fn is_eligible(entry: &Value) -> bool {
    entry.get("eligible").and_then(Value::as_bool) != Some(false)
}

fn normalize_entries(
    entries: &[Value],
    aliases: &KeyAliases,
    estimator: SavingsEstimator,
) -> Vec<CardResult> {
    let mut eligible_position = 0u32;

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let position = index as u32 + 1;
            if !entry.is_object() {
                tracing::warn!(
                    "Recommendation entry {} is not an object; using defaults",
                    position
                );
            }
            let eligible = is_eligible(entry);
            if eligible {
                eligible_position += 1;
            }

            let name =
                first_text(entry, aliases.name).unwrap_or_else(|| format!("Card {}", position));

            let mut savings_source = SavingsSource::Upstream;
            let mut monthly_savings = first_number(entry, aliases.monthly).unwrap_or(0.0);
            let mut annual_savings =
                first_number(entry, aliases.annual).unwrap_or(monthly_savings * 12.0);

            if monthly_savings == 0.0 {
                if let Some(estimate) = estimator.estimate_monthly(&name) {
                    tracing::debug!("Synthesized monthly savings {} for '{}'", estimate, name);
                    monthly_savings = estimate;
                    annual_savings = estimate * 12.0;
                    savings_source = SavingsSource::Synthetic;
                }
            }

            CardResult {
                id: first_id(entry, aliases.id).unwrap_or_else(|| format!("card-{}", position)),
                name,
                monthly_savings,
                annual_savings,
                tags: first_list(entry, aliases.tags)
                    .unwrap_or_else(|| vec![DEFAULT_TAG.to_string()]),
                key_perks: first_list(entry, aliases.perks)
                    .unwrap_or_else(|| vec![DEFAULT_PERK.to_string()]),
                eligible,
                overall_rank: first_rank(entry, aliases.overall_rank).unwrap_or(position),
                eligible_rank: if eligible {
                    Some(first_rank(entry, aliases.eligible_rank).unwrap_or(eligible_position))
                } else {
                    None
                },
                logo: first_text(entry, &["logo"]),
                savings_source,
            }
        })
        .collect()
}

// ============ Adapters ============

/// Canonical `cards` array, used as-is apart from filling absent defaults.
#[derive(Debug, Default)]
pub struct CardsAdapter;

impl ResponseAdapter for CardsAdapter {
    fn shape(&self) -> ResponseShape {
        ResponseShape::Cards
    }

    fn adapt(&self, body: &Value, _estimator: SavingsEstimator) -> Option<Vec<CardResult>> {
        let entries = body.get("cards")?.as_array()?;
        Some(normalize_entries(
            entries,
            &CANONICAL_KEYS,
            SavingsEstimator::Disabled,
        ))
    }
}

/// `savings` array from the alternate upstream family.
#[derive(Debug, Default)]
pub struct SavingsAdapter;

impl ResponseAdapter for SavingsAdapter {
    fn shape(&self) -> ResponseShape {
        ResponseShape::Savings
    }

    fn adapt(&self, body: &Value, estimator: SavingsEstimator) -> Option<Vec<CardResult>> {
        let entries = body.get("savings")?.as_array()?;
        Some(normalize_entries(entries, &SAVINGS_ALIASES, estimator))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedResponse {
    pub shape: ResponseShape,
    pub cards: Vec<CardResult>,
}

pub struct ResponseNormalizer {
    adapters: Vec<Box<dyn ResponseAdapter>>,
    estimator: SavingsEstimator,
}

impl ResponseNormalizer {
    /// Cards first, then savings.
    pub fn standard(estimator: SavingsEstimator) -> Self {
        Self {
            adapters: vec![Box::new(CardsAdapter), Box::new(SavingsAdapter)],
            estimator,
        }
    }

    /// Appends an adapter after the existing ones.
    pub fn with_adapter(mut self, adapter: Box<dyn ResponseAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// First adapter that recognises `body` wins; `None` if none do.
    pub fn normalize(&self, body: &Value) -> Option<NormalizedResponse> {
        self.adapters.iter().find_map(|adapter| {
            adapter
                .adapt(body, self.estimator)
                .map(|cards| NormalizedResponse {
                    shape: adapter.shape(),
                    cards,
                })
        })
    }
}

impl Default for ResponseNormalizer {
    fn default() -> Self {
        Self::standard(SavingsEstimator::default())
    }
}

// ============ Fallback ============

#[allow(clippy::too_many_arguments)]
fn sample_card(
    id: &str,
    name: &str,
    monthly_savings: f64,
    tags: [&str; 2],
    eligible: bool,
    overall_rank: u32,
    eligible_rank: Option<u32>,
    key_perks: [&str; 2],
) -> CardResult {
    CardResult {
        id: id.to_string(),
        name: name.to_string(),
        monthly_savings,
        annual_savings: monthly_savings * 12.0,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        key_perks: key_perks.iter().map(|p| p.to_string()).collect(),
        eligible,
        overall_rank,
        eligible_rank,
        logo: None,
        savings_source: SavingsSource::Sample,
    }
}

/// Deterministic sample set served whenever the service is unreachable or
/// answers with an unknown shape.
pub fn fallback_cards() -> Vec<CardResult> {
    vec![
        sample_card(
            "1",
            "HDFC Millennia",
            2500.0,
            ["Cashback", "Online"],
            true,
            1,
            Some(1),
            ["5% cashback on online", "1% on offline"],
        ),
        sample_card(
            "2",
            "SBI Cashback",
            2200.0,
            ["Cashback", "Fuel"],
            true,
            2,
            Some(2),
            ["5% on online", "2% on fuel"],
        ),
        sample_card(
            "3",
            "ICICI Amazon Pay",
            1800.0,
            ["Amazon", "Cashback"],
            false,
            3,
            None,
            ["5% on Amazon", "2% on other"],
        ),
        sample_card(
            "4",
            "Axis Ace",
            1500.0,
            ["Cashback", "Bills"],
            true,
            4,
            Some(3),
            ["2% on all", "5% on bills"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn deterministic() -> ResponseNormalizer {
        ResponseNormalizer::standard(SavingsEstimator::Disabled)
    }

    #[test]
    fn test_savings_shape_with_comma_tags() {
        let body = json!({
            "savings": [{ "cardName": "Amazon Pay", "monthlySavings": 500, "tags": "Cashback,Online" }]
        });

        let normalized = deterministic().normalize(&body).unwrap();
        assert_eq!(normalized.shape, ResponseShape::Savings);

        let card = &normalized.cards[0];
        assert_eq!(card.name, "Amazon Pay");
        assert_eq!(card.tags, vec!["Cashback", "Online"]);
        assert_eq!(card.annual_savings, 6000.0);
        assert_eq!(card.overall_rank, 1);
        assert_eq!(card.eligible_rank, Some(1));
        assert_eq!(card.key_perks, vec![DEFAULT_PERK]);
        assert_eq!(card.id, "card-1");
        assert_eq!(card.savings_source, SavingsSource::Upstream);
    }

    #[test]
    fn test_savings_aliases_and_defaults() {
        let body = json!({
            "savings": [
                {
                    "card_name": "Travel One",
                    "monthly_saving_amount": "1200",
                    "annual_saving": 15000,
                    "card_perks": ["Lounge access", "  ", "Air miles"],
                    "overall_rank": 4,
                    "eligible_rank": 2
                },
                { "eligible": false, "savings": 300, "cardTags": "" }
            ]
        });

        let cards = deterministic().normalize(&body).unwrap().cards;

        assert_eq!(cards[0].name, "Travel One");
        assert_eq!(cards[0].monthly_savings, 1200.0);
        assert_eq!(cards[0].annual_savings, 15000.0);
        assert_eq!(cards[0].key_perks, vec!["Lounge access", "Air miles"]);
        assert_eq!(cards[0].tags, vec![DEFAULT_TAG]);
        assert_eq!(cards[0].overall_rank, 4);
        assert_eq!(cards[0].eligible_rank, Some(2));

        assert_eq!(cards[1].name, "Card 2");
        assert!(!cards[1].eligible);
        assert_eq!(cards[1].eligible_rank, None);
        assert_eq!(cards[1].overall_rank, 2);
        assert_eq!(cards[1].annual_savings, 3600.0);
    }

    #[test]
    fn test_eligible_rank_counts_only_eligible_entries() {
        let body = json!({
            "savings": [
                { "name": "A", "monthlySavings": 10 },
                { "name": "B", "monthlySavings": 10, "eligible": false },
                { "name": "C", "monthlySavings": 10, "eligible": "false" }
            ]
        });

        let cards = deterministic().normalize(&body).unwrap().cards;
        assert_eq!(cards[0].eligible_rank, Some(1));
        assert_eq!(cards[1].eligible_rank, None);
        // Only a boolean false marks a card ineligible.
        assert!(cards[2].eligible);
        assert_eq!(cards[2].eligible_rank, Some(2));
        assert_eq!(cards[2].overall_rank, 3);
    }

    #[test]
    fn test_non_object_entry_keeps_its_position() {
        let body = json!({
            "savings": [
                { "name": "A", "monthlySavings": 10 },
                7,
                { "name": "C", "monthlySavings": 10 }
            ]
        });

        let cards = deterministic().normalize(&body).unwrap().cards;
        assert_eq!(cards.len(), 3);
        assert_eq!(cards[1].name, "Card 2");
        assert_eq!(cards[1].id, "card-2");
        assert_eq!(cards[1].overall_rank, 2);
        assert_eq!(cards[2].name, "C");
        assert_eq!(cards[2].id, "card-3");
        assert_eq!(cards[2].overall_rank, 3);
    }

    #[test]
    fn test_missing_savings_synthesized_and_flagged() {
        let body = json!({ "savings": [{ "cardName": "Amazon Pay ICICI" }] });

        let cards = ResponseNormalizer::standard(SavingsEstimator::Synthetic)
            .normalize(&body)
            .unwrap()
            .cards;

        let card = &cards[0];
        assert!(card.is_synthetic());
        assert!((500.0..2500.0).contains(&card.monthly_savings));
        assert_eq!(card.annual_savings, card.monthly_savings * 12.0);
    }

    #[test]
    fn test_disabled_estimator_keeps_zero() {
        let body = json!({ "savings": [{ "cardName": "Plain Card", "annualSavings": 900 }] });

        let card = deterministic().normalize(&body).unwrap().cards.remove(0);
        assert_eq!(card.monthly_savings, 0.0);
        assert_eq!(card.annual_savings, 900.0);
        assert!(!card.is_synthetic());
    }

    #[test]
    fn test_synthetic_ranges_by_keyword() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let amazon = synthetic_monthly_estimate("AMAZON pay", &mut rng);
            assert!((500.0..2500.0).contains(&amazon));
            let cashback = synthetic_monthly_estimate("Super Cashback", &mut rng);
            assert!((300.0..1800.0).contains(&cashback));
            let travel = synthetic_monthly_estimate("Travel Elite", &mut rng);
            assert!((800.0..3800.0).contains(&travel));
            let other = synthetic_monthly_estimate("Regalia", &mut rng);
            assert!((200.0..1200.0).contains(&other));
        }
    }

    #[test]
    fn test_cards_shape_takes_priority() {
        let body = json!({
            "cards": [{
                "id": 17,
                "name": "Canonical",
                "monthlySavings": 100,
                "tags": ["Fuel"],
                "keyPerks": ["Perk"],
                "eligible": true,
                "overallRank": 1,
                "eligibleRank": 1
            }],
            "savings": [{ "cardName": "Ignored" }]
        });

        let normalized = ResponseNormalizer::standard(SavingsEstimator::Synthetic)
            .normalize(&body)
            .unwrap();
        assert_eq!(normalized.shape, ResponseShape::Cards);
        assert_eq!(normalized.cards.len(), 1);
        assert_eq!(normalized.cards[0].id, "17");
        assert_eq!(normalized.cards[0].annual_savings, 1200.0);
    }

    #[test]
    fn test_cards_shape_never_synthesizes() {
        let body = json!({ "cards": [{ "id": "x", "name": "Amazon Zero" }] });

        let card = ResponseNormalizer::standard(SavingsEstimator::Synthetic)
            .normalize(&body)
            .unwrap()
            .cards
            .remove(0);
        assert_eq!(card.monthly_savings, 0.0);
        assert_eq!(card.savings_source, SavingsSource::Upstream);
    }

    #[test]
    fn test_unknown_shape_is_none() {
        assert!(deterministic().normalize(&json!({ "data": [] })).is_none());
        assert!(deterministic().normalize(&json!({ "cards": "nope" })).is_none());
        assert!(deterministic().normalize(&json!([1, 2, 3])).is_none());
    }

    #[test]
    fn test_extra_adapter_runs_after_builtins() {
        struct ResultsAdapter;

        impl ResponseAdapter for ResultsAdapter {
            fn shape(&self) -> ResponseShape {
                ResponseShape::Cards
            }

            fn adapt(&self, body: &Value, _estimator: SavingsEstimator) -> Option<Vec<CardResult>> {
                body.get("results")?;
                Some(fallback_cards())
            }
        }

        let normalizer = deterministic().with_adapter(Box::new(ResultsAdapter));
        let normalized = normalizer.normalize(&json!({ "results": [] })).unwrap();
        assert_eq!(normalized.cards.len(), 4);
    }

    #[test]
    fn test_fallback_cards() {
        let cards = fallback_cards();
        let ids: Vec<&str> = cards.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);

        let icici = cards.iter().find(|c| c.name == "ICICI Amazon Pay").unwrap();
        assert!(!icici.eligible);
        assert_eq!(icici.eligible_rank, None);
        assert!(cards.iter().all(|c| c.savings_source == SavingsSource::Sample));
        assert_eq!(cards[3].eligible_rank, Some(3));
        assert_eq!(cards[0].annual_savings, 30000.0);
    }
}
