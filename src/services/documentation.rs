use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the duel backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::action::handle_action,
        crate::routes::catalog::list_cards,
        crate::routes::deck::get_my_deck,
        crate::routes::deck::put_my_deck,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::action::ActionRequest,
            crate::dto::action::ActionResponse,
            crate::dto::action::UserView,
            crate::dto::room::RoomView,
            crate::dto::room::SeatsView,
            crate::dto::room::SeatView,
            crate::dto::room::UnitView,
            crate::dto::room::PlayerView,
            crate::dto::room::CoinView,
            crate::dto::room::TurnView,
            crate::dto::deck::SaveDeckRequest,
            crate::dto::deck::DeckResponse,
            crate::state::StorageStatus,
            crate::state::catalog::CardDefinition,
            crate::state::catalog::CardKind,
            crate::state::catalog::CardEffect,
            crate::state::room::Element,
            crate::state::room::Side,
            crate::state::room::Mode,
            crate::state::state_machine::CombatMode,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "game", description = "Room actions"),
        (name = "cards", description = "Card catalog and saved decks"),
    )
)]
pub struct ApiDoc;
