use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dao::models::RoomRecord,
    dto::format_system_time,
    state::room::{Element, Mode, PlayerIdentity, Room, Side, Unit, dice_total},
};

/// Public view of a seated player.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerView {
    pub id: String,
    pub name: String,
    pub avatar: Option<String>,
}

impl From<&PlayerIdentity> for PlayerView {
    fn from(player: &PlayerIdentity) -> Self {
        Self {
            id: player.id.clone(),
            name: player.name.clone(),
            avatar: player.avatar.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnitView {
    pub code: String,
    pub element: Element,
    pub attack: u32,
    pub hp: i32,
    pub gauge: u8,
}

impl From<&Unit> for UnitView {
    fn from(unit: &Unit) -> Self {
        Self {
            code: unit.code.clone(),
            element: unit.element,
            attack: unit.attack,
            hp: unit.hp,
            gauge: unit.gauge,
        }
    }
}

/// Everything a client may know about one seat.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SeatView {
    pub player: Option<PlayerView>,
    pub ready: bool,
    pub hero: u32,
    pub board: Vec<UnitView>,
    #[schema(value_type = Object)]
    pub dice: BTreeMap<Element, u32>,
    pub dice_count: u32,
    /// Card codes in hand; only populated for the caller's own seat.
    pub hand: Option<Vec<String>>,
    pub hand_count: usize,
    pub deck_count: usize,
    pub ended_phase: bool,
    pub coin_ack: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SeatsView {
    pub a: SeatView,
    pub b: SeatView,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CoinView {
    pub decided: bool,
    pub winner: Option<Side>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TurnView {
    pub phase_number: u32,
    pub turn: Option<Side>,
    pub phase_actor: Option<Side>,
    pub phase_end_order: Vec<Side>,
}

/// Seat-scoped projection of a room returned to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub id: String,
    pub version: u64,
    pub updated_at: String,
    pub mode: Mode,
    /// Seat held by the caller, `null` for spectators.
    pub you: Option<Side>,
    pub coin: CoinView,
    pub turn: TurnView,
    pub seats: SeatsView,
}

impl RoomView {
    /// Project `record` for `viewer_id`. Hands other than the viewer's own are
    /// reduced to counts.
    pub fn project(record: &RoomRecord, viewer_id: &str) -> Self {
        let room = &record.state_json;
        let you = room.side_of(viewer_id);
        Self {
            id: record.id.to_string(),
            version: record.version,
            updated_at: format_system_time(record.updated_at),
            mode: room.mode,
            you,
            coin: CoinView {
                decided: room.coin.decided,
                winner: room.coin.winner,
            },
            turn: TurnView {
                phase_number: room.turn_state.phase_number,
                turn: room.turn_state.turn,
                phase_actor: room.turn_state.phase_actor,
                phase_end_order: room.turn_state.phase_end_order.clone(),
            },
            seats: SeatsView {
                a: seat_view(room, Side::A, you == Some(Side::A)),
                b: seat_view(room, Side::B, you == Some(Side::B)),
            },
        }
    }
}

fn seat_view(room: &Room, side: Side, own: bool) -> SeatView {
    SeatView {
        player: room.players[side].as_ref().map(PlayerView::from),
        ready: room.ready[side],
        hero: room.hero[side],
        board: room.board[side].iter().map(UnitView::from).collect(),
        dice: room.dice[side].clone(),
        dice_count: dice_total(&room.dice[side]),
        hand: own.then(|| room.hand[side].clone()),
        hand_count: room.hand[side].len(),
        deck_count: room.deck[side].len(),
        ended_phase: room.turn_state.ended_phase[side],
        coin_ack: room.coin.ack[side],
    }
}
