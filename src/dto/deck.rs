use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::{
    dao::models::DeckEntity,
    dto::{format_system_time, validation::validate_card_code},
    state::loadout::MAX_DECK_CARDS,
};

/// Deck submitted by `PUT /decks/me`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SaveDeckRequest {
    /// Exactly three distinct character codes.
    pub characters: Vec<String>,
    /// Support and event codes forming the draw pile.
    #[serde(default)]
    pub cards: Vec<String>,
}

impl Validate for SaveDeckRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        for code in &self.characters {
            if let Err(e) = validate_card_code(code) {
                errors.add("characters", e);
            }
        }
        for code in &self.cards {
            if let Err(e) = validate_card_code(code) {
                errors.add("cards", e);
            }
        }
        if self.cards.len() > MAX_DECK_CARDS {
            let mut err = validator::ValidationError::new("length");
            err.message = Some(format!("at most {MAX_DECK_CARDS} cards are allowed").into());
            errors.add("cards", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Saved deck as returned to its owner.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeckResponse {
    pub user_id: String,
    pub characters: Vec<String>,
    pub cards: Vec<String>,
    pub updated_at: String,
}

impl From<DeckEntity> for DeckResponse {
    fn from(deck: DeckEntity) -> Self {
        Self {
            user_id: deck.user_id,
            characters: deck.characters,
            cards: deck.cards,
            updated_at: format_system_time(deck.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_pile_fails_validation() {
        let request = SaveDeckRequest {
            characters: vec!["CH-EMBER".into()],
            cards: vec!["EV-RALLY".into(); MAX_DECK_CARDS + 1],
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("cards"));
    }

    #[test]
    fn blank_codes_fail_validation() {
        let request = SaveDeckRequest {
            characters: vec!["".into()],
            cards: Vec::new(),
        };
        assert!(request.validate().is_err());
    }
}
