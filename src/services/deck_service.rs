use std::{collections::HashSet, time::SystemTime};

use tracing::info;

use crate::{
    dao::models::DeckEntity,
    dto::deck::{DeckResponse, SaveDeckRequest},
    error::ServiceError,
    state::{SharedState, catalog::CardCatalog, room::MAX_BOARD_UNITS},
};

/// Fetch the caller's saved deck.
pub async fn get_deck(state: &SharedState, user_id: &str) -> Result<DeckResponse, ServiceError> {
    let store = state.room_store().await?;
    store
        .find_deck(user_id.to_owned())
        .await?
        .map(DeckResponse::from)
        .ok_or_else(|| ServiceError::NotFound(format!("no saved deck for `{user_id}`")))
}

/// Check the deck against the catalog and upsert it for the caller.
pub async fn save_deck(
    state: &SharedState,
    user_id: &str,
    request: SaveDeckRequest,
) -> Result<DeckResponse, ServiceError> {
    check_against_catalog(state.catalog(), &request)?;

    let deck = DeckEntity {
        user_id: user_id.to_owned(),
        characters: request.characters,
        cards: request.cards,
        updated_at: SystemTime::now(),
    };
    let store = state.room_store().await?;
    store.save_deck(deck.clone()).await?;
    info!(user = %user_id, cards = deck.cards.len(), "deck saved");
    Ok(deck.into())
}

fn check_against_catalog(
    catalog: &CardCatalog,
    request: &SaveDeckRequest,
) -> Result<(), ServiceError> {
    let distinct: HashSet<&str> = request.characters.iter().map(String::as_str).collect();
    if request.characters.len() != MAX_BOARD_UNITS || distinct.len() != MAX_BOARD_UNITS {
        return Err(ServiceError::InvalidInput(format!(
            "a deck needs exactly {MAX_BOARD_UNITS} distinct characters"
        )));
    }
    if let Some(code) = request
        .characters
        .iter()
        .find(|code| !catalog.is_character(code))
    {
        return Err(ServiceError::InvalidInput(format!(
            "`{code}` is not a known character"
        )));
    }
    if let Some(code) = request
        .cards
        .iter()
        .find(|code| catalog.get(code).is_none() || catalog.is_character(code))
    {
        return Err(ServiceError::InvalidInput(format!(
            "`{code}` is not a known support or event card"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState};

    fn request(characters: &[&str], cards: &[&str]) -> SaveDeckRequest {
        SaveDeckRequest {
            characters: characters.iter().map(|c| c.to_string()).collect(),
            cards: cards.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn catalog_check_rejects_bad_decks() {
        let catalog = CardCatalog::builtin();
        let valid = request(&["CH-EMBER", "CH-TIDE", "CH-VOLT"], &["EV-RALLY"]);
        assert!(check_against_catalog(&catalog, &valid).is_ok());

        let repeated = request(&["CH-EMBER", "CH-EMBER", "CH-VOLT"], &[]);
        let unknown = request(&["CH-EMBER", "CH-TIDE", "CH-NOPE"], &[]);
        let character_in_pile = request(&["CH-EMBER", "CH-TIDE", "CH-VOLT"], &["CH-GALE"]);
        let short = request(&["CH-EMBER", "CH-TIDE"], &[]);
        for bad in [repeated, unknown, character_in_pile, short] {
            assert!(matches!(
                check_against_catalog(&catalog, &bad),
                Err(ServiceError::InvalidInput(_))
            ));
        }
    }

    #[tokio::test]
    async fn saved_deck_can_be_read_back() {
        let state = AppState::new(AppConfig::default());
        assert!(matches!(
            get_deck(&state, "u1").await,
            Err(ServiceError::NotFound(_))
        ));

        let saved = save_deck(
            &state,
            "u1",
            request(&["CH-GALE", "CH-BLOOM", "CH-FROST"], &["SP-FIELD-MEDIC"]),
        )
        .await
        .unwrap();
        assert_eq!(saved.user_id, "u1");

        let loaded = get_deck(&state, "u1").await.unwrap();
        assert_eq!(loaded.characters, ["CH-GALE", "CH-BLOOM", "CH-FROST"]);
        assert_eq!(loaded.cards, ["SP-FIELD-MEDIC"]);
    }
}
