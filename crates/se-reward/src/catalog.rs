//! Reward catalog — static definitions of everything a session can grant
//!
//! The catalog holds two tables:
//!
//! - **Entries**: obtainable rewards (ad bonuses and wheel prizes), each with
//!   a kind-specific payload, a selection weight and an eligibility predicate
//! - **Offers**: ad-watch offers, each pointing at the fixed reward entry it
//!   grants after its declared watch duration
//!
//! A catalog is validated once on construction and is immutable afterwards.
//! Changing rewards means building a new catalog.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, RewardError, RewardResult};

// ═══════════════════════════════════════════════════════════════════════════════
// USER STATS
// ═══════════════════════════════════════════════════════════════════════════════

/// Snapshot of the caller's statistics
///
/// Owned by the dashboard layer; the engine only reads it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub level: u32,
    pub spins_remaining: u32,
    pub streak: u32,
    pub total_spins: u64,
    pub total_earnings: f64,
    pub xp: u64,
}

impl UserStats {
    /// Stats for a user at the given level with some spins left
    pub fn new(level: u32, spins_remaining: u32) -> Self {
        Self {
            level,
            spins_remaining,
            ..Self::default()
        }
    }

    pub fn with_streak(mut self, streak: u32) -> Self {
        self.streak = streak;
        self
    }

    pub fn with_total_spins(mut self, total_spins: u64) -> Self {
        self.total_spins = total_spins;
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ELIGIBILITY
// ═══════════════════════════════════════════════════════════════════════════════

/// Rule over [`UserStats`] gating whether a reward may be granted
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "rule", content = "value", rename_all = "snake_case")]
pub enum Eligibility {
    #[default]
    Always,
    MinLevel(u32),
    MinStreak(u32),
    MinTotalSpins(u64),
    /// Every nested rule must pass
    All(Vec<Eligibility>),
}

impl Eligibility {
    pub fn allows(&self, stats: &UserStats) -> bool {
        match self {
            Self::Always => true,
            Self::MinLevel(level) => stats.level >= *level,
            Self::MinStreak(streak) => stats.streak >= *streak,
            Self::MinTotalSpins(spins) => stats.total_spins >= *spins,
            Self::All(rules) => rules.iter().all(|rule| rule.allows(stats)),
        }
    }

    /// Human-readable requirement, used in `NotEligible` messages
    pub fn describe(&self) -> String {
        match self {
            Self::Always => "always available".to_string(),
            Self::MinLevel(level) => format!("level {} required", level),
            Self::MinStreak(streak) => format!("{}-day streak required", streak),
            Self::MinTotalSpins(spins) => format!("{} total spins required", spins),
            Self::All(rules) => rules
                .iter()
                .map(Self::describe)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRIES
// ═══════════════════════════════════════════════════════════════════════════════

/// Reward kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    ExtraSpins,
    XpMultiplier,
    InstantCash,
    PremiumSpin,
    WheelPrize,
}

impl RewardKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ExtraSpins => "Extra Spins",
            Self::XpMultiplier => "XP Multiplier",
            Self::InstantCash => "Instant Cash",
            Self::PremiumSpin => "Premium Spin",
            Self::WheelPrize => "Wheel Prize",
        }
    }
}

/// Product rarity granted by a premium spin
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

/// Kind-specific reward payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RewardPayload {
    ExtraSpins { amount: u32 },
    /// Multiplies XP on the next `spins` spins, within `duration_minutes`
    XpMultiplier {
        multiplier: f64,
        duration_minutes: u32,
        spins: u32,
    },
    InstantCash { amount: f64, xp: u32 },
    /// Guaranteed product of at least this rarity
    PremiumSpin { rarity: Rarity },
    WheelPrize {
        category: String,
        #[serde(default)]
        icon: Option<String>,
    },
}

impl RewardPayload {
    pub fn kind(&self) -> RewardKind {
        match self {
            Self::ExtraSpins { .. } => RewardKind::ExtraSpins,
            Self::XpMultiplier { .. } => RewardKind::XpMultiplier,
            Self::InstantCash { .. } => RewardKind::InstantCash,
            Self::PremiumSpin { .. } => RewardKind::PremiumSpin,
            Self::WheelPrize { .. } => RewardKind::WheelPrize,
        }
    }
}

fn default_weight() -> f64 {
    1.0
}

/// A single obtainable reward
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardCatalogEntry {
    /// Unique id
    pub id: String,
    /// What the reward grants
    pub payload: RewardPayload,
    /// Selection weight (wheel prizes only)
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Who may receive it
    #[serde(default)]
    pub eligibility: Eligibility,
}

impl RewardCatalogEntry {
    pub fn new(id: impl Into<String>, payload: RewardPayload) -> Self {
        Self {
            id: id.into(),
            payload,
            weight: default_weight(),
            eligibility: Eligibility::Always,
        }
    }

    /// Wheel prize for a product category
    pub fn wheel_prize(id: impl Into<String>, category: impl Into<String>, weight: f64) -> Self {
        Self::new(
            id,
            RewardPayload::WheelPrize {
                category: category.into(),
                icon: None,
            },
        )
        .with_weight(weight)
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_eligibility(mut self, eligibility: Eligibility) -> Self {
        self.eligibility = eligibility;
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        if let RewardPayload::WheelPrize { icon: slot, .. } = &mut self.payload {
            *slot = Some(icon.into());
        }
        self
    }

    pub fn kind(&self) -> RewardKind {
        self.payload.kind()
    }

    pub fn is_eligible(&self, stats: &UserStats) -> bool {
        self.eligibility.allows(stats)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// AD OFFERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Ad-watch offer: watch for `duration_ms`, receive `reward_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdOffer {
    pub id: String,
    pub title: String,
    pub duration_ms: u64,
    pub reward_id: String,
}

impl AdOffer {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        duration_ms: u64,
        reward_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            duration_ms,
            reward_id: reward_id.into(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CATALOG
// ═══════════════════════════════════════════════════════════════════════════════

/// Validated, immutable reward catalog
#[derive(Debug, Clone)]
pub struct RewardCatalog {
    entries: Vec<RewardCatalogEntry>,
    offers: Vec<AdOffer>,
    /// Indices into `entries` of the wheel prizes, in declaration order
    wheel: Vec<usize>,
}

impl RewardCatalog {
    /// Validate and build a catalog
    pub fn new(
        entries: Vec<RewardCatalogEntry>,
        offers: Vec<AdOffer>,
    ) -> Result<Self, CatalogError> {
        let mut ids = HashSet::new();
        for entry in &entries {
            if !ids.insert(entry.id.as_str()) {
                return Err(CatalogError::DuplicateId(entry.id.clone()));
            }
            if !entry.weight.is_finite() || entry.weight < 0.0 {
                return Err(CatalogError::InvalidWeight {
                    id: entry.id.clone(),
                    weight: entry.weight,
                });
            }
        }

        let mut offer_ids = HashSet::new();
        for offer in &offers {
            if !offer_ids.insert(offer.id.as_str()) {
                return Err(CatalogError::DuplicateId(offer.id.clone()));
            }
            if offer.duration_ms == 0 {
                return Err(CatalogError::ZeroDuration(offer.id.clone()));
            }
            let reward = entries
                .iter()
                .find(|e| e.id == offer.reward_id)
                .ok_or_else(|| CatalogError::UnknownReward {
                    offer: offer.id.clone(),
                    reward: offer.reward_id.clone(),
                })?;
            if reward.kind() == RewardKind::WheelPrize {
                return Err(CatalogError::WheelPrizeOffer {
                    offer: offer.id.clone(),
                    reward: offer.reward_id.clone(),
                });
            }
        }

        let wheel: Vec<usize> = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.kind() == RewardKind::WheelPrize)
            .map(|(i, _)| i)
            .collect();
        if wheel.is_empty() {
            return Err(CatalogError::NoWheelPrizes);
        }
        let total: f64 = wheel.iter().map(|&i| entries[i].weight).sum();
        if !total.is_finite() {
            return Err(CatalogError::TotalWeightOverflow);
        }
        if total <= 0.0 {
            return Err(CatalogError::ZeroTotalWeight);
        }

        log::debug!(
            "Reward catalog built: {} entries, {} offers, {} wheel segments",
            entries.len(),
            offers.len(),
            wheel.len()
        );

        Ok(Self {
            entries,
            offers,
            wheel,
        })
    }

    /// The dashboard's built-in offers and wheel
    pub fn standard() -> Self {
        let entries = vec![
            RewardCatalogEntry::new("bonus-spins", RewardPayload::ExtraSpins { amount: 3 }),
            RewardCatalogEntry::new(
                "double-xp",
                RewardPayload::XpMultiplier {
                    multiplier: 2.0,
                    duration_minutes: 30,
                    spins: 5,
                },
            ),
            RewardCatalogEntry::new(
                "instant-cash",
                RewardPayload::InstantCash {
                    amount: 0.25,
                    xp: 100,
                },
            )
            .with_eligibility(Eligibility::MinLevel(3)),
            RewardCatalogEntry::new(
                "premium-spin",
                RewardPayload::PremiumSpin {
                    rarity: Rarity::Rare,
                },
            )
            .with_eligibility(Eligibility::MinLevel(5)),
            RewardCatalogEntry::wheel_prize("tech", "Tech", 1.0).with_icon("💻"),
            RewardCatalogEntry::wheel_prize("beauty", "Beauty", 1.0).with_icon("💄"),
            RewardCatalogEntry::wheel_prize("fitness", "Fitness", 1.0).with_icon("💪"),
            RewardCatalogEntry::wheel_prize("food", "Food", 1.0).with_icon("🍕"),
            RewardCatalogEntry::wheel_prize("gaming", "Gaming", 1.0).with_icon("🎮"),
            RewardCatalogEntry::wheel_prize("home", "Home", 1.0).with_icon("🏠"),
            RewardCatalogEntry::wheel_prize("fashion", "Fashion", 1.0).with_icon("👗"),
            RewardCatalogEntry::wheel_prize("travel", "Travel", 1.0).with_icon("✈️"),
        ];
        let offers = vec![
            AdOffer::new("bonus-spins", "Bonus Spins", 15_000, "bonus-spins"),
            AdOffer::new("double-xp", "Double XP", 20_000, "double-xp"),
            AdOffer::new("instant-cash", "Instant Cash", 30_000, "instant-cash"),
            AdOffer::new("premium-spin", "Premium Spin", 25_000, "premium-spin"),
        ];

        match Self::new(entries, offers) {
            Ok(catalog) => catalog,
            Err(e) => unreachable!("built-in catalog is valid: {}", e),
        }
    }

    /// Entries of `kind` that `stats` may receive, in declaration order
    pub fn eligible_entries(&self, kind: RewardKind, stats: &UserStats) -> Vec<&RewardCatalogEntry> {
        self.entries
            .iter()
            .filter(|e| e.kind() == kind && e.is_eligible(stats))
            .collect()
    }

    /// Look up an entry by id
    pub fn entry(&self, id: &str) -> RewardResult<&RewardCatalogEntry> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| RewardError::NotFound(format!("reward {}", id)))
    }

    /// Look up an ad offer by id
    pub fn offer(&self, id: &str) -> RewardResult<&AdOffer> {
        self.offers
            .iter()
            .find(|o| o.id == id)
            .ok_or_else(|| RewardError::NotFound(format!("offer {}", id)))
    }

    /// The reward an offer grants
    pub fn offer_reward(&self, offer: &AdOffer) -> RewardResult<&RewardCatalogEntry> {
        self.entry(&offer.reward_id)
    }

    /// Whether `stats` may watch the given offer
    pub fn offer_available(&self, offer: &AdOffer, stats: &UserStats) -> bool {
        self.offer_reward(offer)
            .map(|reward| reward.is_eligible(stats))
            .unwrap_or(false)
    }

    pub fn entries(&self) -> &[RewardCatalogEntry] {
        &self.entries
    }

    pub fn offers(&self) -> &[AdOffer] {
        &self.offers
    }

    /// Wheel prizes in segment order
    pub fn wheel_prizes(&self) -> impl Iterator<Item = &RewardCatalogEntry> {
        self.wheel.iter().map(move |&i| &self.entries[i])
    }

    /// Number of wheel segments (one per wheel prize)
    pub fn segment_count(&self) -> usize {
        self.wheel.len()
    }

    /// Segment index of a wheel prize
    pub fn segment_index_of(&self, id: &str) -> Option<usize> {
        self.wheel_prizes().position(|e| e.id == id)
    }
}

impl Default for RewardCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(level: u32) -> UserStats {
        UserStats::new(level, 1)
    }

    #[test]
    fn test_standard_catalog_shape() {
        let catalog = RewardCatalog::standard();
        assert_eq!(catalog.offers().len(), 4);
        assert_eq!(catalog.segment_count(), 8);
        assert_eq!(catalog.segment_index_of("tech"), Some(0));
        assert_eq!(catalog.segment_index_of("travel"), Some(7));
        assert_eq!(catalog.segment_index_of("bonus-spins"), None);
    }

    #[test]
    fn test_double_xp_covers_next_five_spins() {
        let catalog = RewardCatalog::standard();
        let offer = catalog.offer("double-xp").unwrap();
        assert_eq!(
            catalog.offer_reward(offer).unwrap().payload,
            RewardPayload::XpMultiplier {
                multiplier: 2.0,
                duration_minutes: 30,
                spins: 5,
            }
        );
    }

    #[test]
    fn test_eligible_entries_filters_and_keeps_order() {
        let catalog = RewardCatalog::standard();

        let low: Vec<_> = catalog
            .eligible_entries(RewardKind::InstantCash, &level(1))
            .into_iter()
            .map(|e| e.id.as_str())
            .collect();
        assert!(low.is_empty());

        let high: Vec<_> = catalog
            .eligible_entries(RewardKind::InstantCash, &level(3))
            .into_iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(high, vec!["instant-cash"]);

        let wheel: Vec<_> = catalog
            .eligible_entries(RewardKind::WheelPrize, &level(1))
            .into_iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(wheel.first(), Some(&"tech"));
        assert_eq!(wheel.len(), 8);
    }

    #[test]
    fn test_entry_not_found() {
        let catalog = RewardCatalog::standard();
        assert!(catalog.entry("tech").is_ok());
        assert!(matches!(catalog.entry("nope"), Err(RewardError::NotFound(_))));
        assert!(matches!(catalog.offer("nope"), Err(RewardError::NotFound(_))));
    }

    #[test]
    fn test_offer_availability_follows_reward_eligibility() {
        let catalog = RewardCatalog::standard();
        let premium = catalog.offer("premium-spin").unwrap();
        assert!(!catalog.offer_available(premium, &level(4)));
        assert!(catalog.offer_available(premium, &level(5)));
    }

    #[test]
    fn test_eligibility_rules() {
        let stats = UserStats::new(4, 0).with_streak(7).with_total_spins(100);
        assert!(Eligibility::Always.allows(&stats));
        assert!(Eligibility::MinLevel(4).allows(&stats));
        assert!(!Eligibility::MinLevel(5).allows(&stats));
        assert!(Eligibility::MinStreak(7).allows(&stats));
        assert!(!Eligibility::MinTotalSpins(101).allows(&stats));
        let combined = Eligibility::All(vec![Eligibility::MinLevel(3), Eligibility::MinStreak(8)]);
        assert!(!combined.allows(&stats));
        assert_eq!(combined.describe(), "level 3 required, 8-day streak required");
    }

    #[test]
    fn test_validation_rejects_bad_catalogs() {
        let prize = || RewardCatalogEntry::wheel_prize("tech", "Tech", 1.0);
        let spins = || RewardCatalogEntry::new("spins", RewardPayload::ExtraSpins { amount: 3 });

        assert_eq!(
            RewardCatalog::new(vec![prize(), prize()], vec![]).unwrap_err(),
            CatalogError::DuplicateId("tech".into())
        );
        assert_eq!(
            RewardCatalog::new(vec![spins()], vec![]).unwrap_err(),
            CatalogError::NoWheelPrizes
        );
        assert_eq!(
            RewardCatalog::new(vec![prize().with_weight(0.0)], vec![]).unwrap_err(),
            CatalogError::ZeroTotalWeight
        );
        assert_eq!(
            RewardCatalog::new(
                vec![
                    RewardCatalogEntry::wheel_prize("a", "A", 1e308),
                    RewardCatalogEntry::wheel_prize("b", "B", 1e308),
                ],
                vec![]
            )
            .unwrap_err(),
            CatalogError::TotalWeightOverflow
        );
        assert!(matches!(
            RewardCatalog::new(vec![prize().with_weight(-1.0)], vec![]),
            Err(CatalogError::InvalidWeight { .. })
        ));
        assert!(matches!(
            RewardCatalog::new(vec![prize().with_weight(f64::NAN)], vec![]),
            Err(CatalogError::InvalidWeight { .. })
        ));
        assert!(matches!(
            RewardCatalog::new(
                vec![prize(), spins()],
                vec![AdOffer::new("ad", "Ad", 1000, "missing")]
            ),
            Err(CatalogError::UnknownReward { .. })
        ));
        assert!(matches!(
            RewardCatalog::new(vec![prize()], vec![AdOffer::new("ad", "Ad", 1000, "tech")]),
            Err(CatalogError::WheelPrizeOffer { .. })
        ));
        assert_eq!(
            RewardCatalog::new(
                vec![prize(), spins()],
                vec![AdOffer::new("ad", "Ad", 0, "spins")]
            )
            .unwrap_err(),
            CatalogError::ZeroDuration("ad".into())
        );
    }

    #[test]
    fn test_payload_serde_shape() {
        let entry = RewardCatalogEntry::new(
            "cash",
            RewardPayload::InstantCash {
                amount: 0.25,
                xp: 100,
            },
        )
        .with_eligibility(Eligibility::MinLevel(3));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["payload"]["type"], "instant_cash");
        assert_eq!(json["eligibility"]["rule"], "min_level");
        assert_eq!(json["eligibility"]["value"], 3);
    }
}
