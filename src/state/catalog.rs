//! Static card reference data, loaded once and shared read-only.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use crate::state::room::Element;

/// Broad category of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CardKind {
    /// Fielded on the board; cannot be played from hand.
    Character,
    /// Persistent helper card.
    Support,
    /// One-shot card.
    Event,
}

/// Named effect resolved immediately when a support or event is played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CardEffect {
    /// Restore hero life, capped at the starting total.
    HealHero {
        /// Life restored.
        amount: u32,
    },
    /// Raise the hp of every friendly unit.
    BuffBoard {
        /// Hp added to each unit.
        amount: u32,
    },
    /// Damage the first opposing unit, or the opposing hero when the board is empty.
    Strike {
        /// Damage dealt.
        amount: u32,
    },
}

/// Catalog entry for a single card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CardDefinition {
    /// Stable identifier referenced by decks, hands and boards.
    pub code: String,
    /// Display name.
    pub name: String,
    pub kind: CardKind,
    #[serde(default)]
    pub element: Option<Element>,
    #[serde(default)]
    pub attack: u32,
    #[serde(default)]
    pub hp: u32,
    #[serde(default)]
    pub cost: u32,
    /// Art reference served by the front-end.
    #[serde(default)]
    pub art: Option<String>,
    #[serde(default)]
    pub effect: Option<CardEffect>,
}

/// Immutable lookup table of every known card, in definition order.
#[derive(Debug, Clone)]
pub struct CardCatalog {
    cards: IndexMap<String, CardDefinition>,
}

impl CardCatalog {
    /// Build a catalog, dropping duplicate codes and characters without an element.
    pub fn new(definitions: impl IntoIterator<Item = CardDefinition>) -> Self {
        let mut cards = IndexMap::new();
        for card in definitions {
            if card.kind == CardKind::Character && card.element.is_none() {
                warn!(code = %card.code, "character without element ignored");
                continue;
            }
            if cards.contains_key(&card.code) {
                warn!(code = %card.code, "duplicate card code ignored");
                continue;
            }
            cards.insert(card.code.clone(), card);
        }
        Self { cards }
    }

    /// Catalog shipped with the binary.
    pub fn builtin() -> Self {
        Self::new(builtin_cards())
    }

    /// Look up a card by its code.
    pub fn get(&self, code: &str) -> Option<&CardDefinition> {
        self.cards.get(code)
    }

    /// Whether `code` names a character.
    pub fn is_character(&self, code: &str) -> bool {
        self.get(code)
            .is_some_and(|card| card.kind == CardKind::Character)
    }

    /// Every card in definition order.
    pub fn all(&self) -> impl Iterator<Item = &CardDefinition> {
        self.cards.values()
    }

    pub fn characters(&self) -> impl Iterator<Item = &CardDefinition> {
        self.of_kind(CardKind::Character)
    }

    pub fn supports(&self) -> impl Iterator<Item = &CardDefinition> {
        self.of_kind(CardKind::Support)
    }

    pub fn events(&self) -> impl Iterator<Item = &CardDefinition> {
        self.of_kind(CardKind::Event)
    }

    /// Supports and events: everything that can sit in a draw pile.
    pub fn playables(&self) -> impl Iterator<Item = &CardDefinition> {
        self.cards
            .values()
            .filter(|card| card.kind != CardKind::Character)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    fn of_kind(&self, kind: CardKind) -> impl Iterator<Item = &CardDefinition> {
        self.cards.values().filter(move |card| card.kind == kind)
    }
}

impl Default for CardCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn character(code: &str, name: &str, element: Element, attack: u32, hp: u32) -> CardDefinition {
    CardDefinition {
        code: code.into(),
        name: name.into(),
        kind: CardKind::Character,
        element: Some(element),
        attack,
        hp,
        cost: 0,
        art: Some(format!("cards/{}.webp", code.to_ascii_lowercase())),
        effect: None,
    }
}

fn playable(
    code: &str,
    name: &str,
    kind: CardKind,
    cost: u32,
    effect: Option<CardEffect>,
) -> CardDefinition {
    CardDefinition {
        code: code.into(),
        name: name.into(),
        kind,
        element: None,
        attack: 0,
        hp: 0,
        cost,
        art: Some(format!("cards/{}.webp", code.to_ascii_lowercase())),
        effect,
    }
}

/// Built-in card set covering every rollable element.
fn builtin_cards() -> Vec<CardDefinition> {
    vec![
        character("CH-EMBER", "Ember Duelist", Element::Pyro, 4, 10),
        character("CH-BLAZE", "Blaze Hound", Element::Pyro, 5, 8),
        character("CH-TIDE", "Tidecaller", Element::Hydro, 3, 11),
        character("CH-VOLT", "Volt Lancer", Element::Electro, 4, 9),
        character("CH-SPARK", "Spark Tinker", Element::Electro, 3, 10),
        character("CH-FROST", "Frost Warden", Element::Cryo, 3, 12),
        character("CH-GALE", "Gale Dancer", Element::Anemo, 3, 10),
        character("CH-STONE", "Stone Sentinel", Element::Geo, 2, 14),
        character("CH-BLOOM", "Bloom Sage", Element::Dendro, 3, 10),
        playable(
            "SP-FIELD-MEDIC",
            "Field Medic",
            CardKind::Support,
            2,
            Some(CardEffect::HealHero { amount: 4 }),
        ),
        playable(
            "SP-WAR-BANNER",
            "War Banner",
            CardKind::Support,
            2,
            Some(CardEffect::BuffBoard { amount: 2 }),
        ),
        playable("SP-WATCHTOWER", "Watchtower", CardKind::Support, 1, None),
        playable("SP-SUPPLY-CART", "Supply Cart", CardKind::Support, 1, None),
        playable(
            "EV-FIREBALL",
            "Fireball",
            CardKind::Event,
            3,
            Some(CardEffect::Strike { amount: 3 }),
        ),
        playable(
            "EV-AMBUSH",
            "Ambush",
            CardKind::Event,
            2,
            Some(CardEffect::Strike { amount: 2 }),
        ),
        playable(
            "EV-MENDING-RAIN",
            "Mending Rain",
            CardKind::Event,
            3,
            Some(CardEffect::HealHero { amount: 6 }),
        ),
        playable(
            "EV-RALLY",
            "Rally",
            CardKind::Event,
            1,
            Some(CardEffect::BuffBoard { amount: 1 }),
        ),
    ]
}
