//! Turns a saved deck (or nothing) into a starting board and a draw pile.

use std::collections::HashSet;

use rand::{
    Rng,
    seq::{IndexedRandom, SliceRandom},
};
use tracing::debug;

use crate::{
    dao::models::DeckEntity,
    state::{
        catalog::{CardCatalog, CardDefinition, CardKind},
        room::{MAX_BOARD_UNITS, Unit},
    },
};

/// Maximum number of supports/events a deck may hold.
pub const MAX_DECK_CARDS: usize = 20;

/// Starting material for one seat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loadout {
    pub board: Vec<Unit>,
    /// Shuffled draw pile, consumed from the front.
    pub pile: Vec<String>,
}

impl Unit {
    /// Field a fresh copy of a character card. Returns `None` for non-characters.
    pub fn from_card(card: &CardDefinition) -> Option<Self> {
        if card.kind != CardKind::Character {
            return None;
        }
        Some(Self {
            code: card.code.clone(),
            element: card.element?,
            attack: card.attack,
            hp: i32::try_from(card.hp).unwrap_or(i32::MAX),
            gauge: 0,
        })
    }
}

/// Resolve the starting board and pile for a seat.
///
/// The saved deck is used when its three characters are distinct and known to
/// the catalog. Anything else falls back to a random loadout drawn from the
/// whole catalog.
pub fn resolve_loadout<R: Rng + ?Sized>(
    catalog: &CardCatalog,
    deck: Option<&DeckEntity>,
    rng: &mut R,
) -> Loadout {
    let mut loadout = match deck.and_then(|deck| from_deck(catalog, deck)) {
        Some(loadout) => loadout,
        None => random_loadout(catalog, rng),
    };
    loadout.pile.shuffle(rng);
    loadout
}

fn from_deck(catalog: &CardCatalog, deck: &DeckEntity) -> Option<Loadout> {
    if deck.characters.len() != MAX_BOARD_UNITS {
        debug!(user = %deck.user_id, "saved deck has wrong character count");
        return None;
    }
    let distinct: HashSet<&str> = deck.characters.iter().map(String::as_str).collect();
    if distinct.len() != MAX_BOARD_UNITS {
        debug!(user = %deck.user_id, "saved deck repeats a character");
        return None;
    }

    let board = deck
        .characters
        .iter()
        .map(|code| catalog.get(code).and_then(Unit::from_card))
        .collect::<Option<Vec<_>>>()?;

    let pile = deck
        .cards
        .iter()
        .filter(|code| {
            catalog
                .get(code)
                .is_some_and(|card| card.kind != CardKind::Character)
        })
        .take(MAX_DECK_CARDS)
        .cloned()
        .collect();

    Some(Loadout { board, pile })
}

fn random_loadout<R: Rng + ?Sized>(catalog: &CardCatalog, rng: &mut R) -> Loadout {
    let characters: Vec<&CardDefinition> = catalog.characters().collect();
    let board = characters
        .choose_multiple(rng, MAX_BOARD_UNITS)
        .filter_map(|card| Unit::from_card(card))
        .collect();

    let playables: Vec<&CardDefinition> = catalog.playables().collect();
    let pile = (0..MAX_DECK_CARDS)
        .filter_map(|_| playables.choose(rng).map(|card| card.code.clone()))
        .collect();

    Loadout { board, pile }
}
