//! Room aggregate: the single versioned blob that describes one match.

use std::{
    collections::BTreeMap,
    fmt,
    ops::{Index, IndexMut},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Maximum number of units a side may field at once.
pub const MAX_BOARD_UNITS: usize = 3;
/// Life total each hero starts the match with.
pub const STARTING_HERO_HP: u32 = 30;
/// Gauge value at which a unit may unleash its ultimate.
pub const MAX_GAUGE: u8 = 3;
/// Cards dealt to each hand when the match starts.
pub const OPENING_HAND: usize = 5;
/// Cards drawn by each side when a phase cycle completes.
pub const PHASE_DRAW: usize = 2;
/// Dice rolled for each side when the match starts.
pub const STARTING_DICE: usize = 10;

const ROOM_CODE_MIN_LEN: usize = 3;
const ROOM_CODE_MAX_LEN: usize = 16;

/// One of the two seats at the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Host seat.
    A,
    /// Guest seat.
    B,
}

impl Side {
    /// Both seats in table order.
    pub const ALL: [Side; 2] = [Side::A, Side::B];

    /// The seat across the table.
    pub fn opponent(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => f.write_str("a"),
            Side::B => f.write_str("b"),
        }
    }
}

/// Per-seat pair of values, indexable by [`Side`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seats<T> {
    /// Value for seat A.
    pub a: T,
    /// Value for seat B.
    pub b: T,
}

impl<T> Seats<T> {
    /// Build a pair from explicit values.
    pub fn new(a: T, b: T) -> Self {
        Self { a, b }
    }

    /// True when `predicate` holds for both seats.
    pub fn both(&self, predicate: impl Fn(&T) -> bool) -> bool {
        predicate(&self.a) && predicate(&self.b)
    }
}

impl<T> Index<Side> for Seats<T> {
    type Output = T;

    fn index(&self, side: Side) -> &T {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }
}

impl<T> IndexMut<Side> for Seats<T> {
    fn index_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::A => &mut self.a,
            Side::B => &mut self.b,
        }
    }
}

/// Elemental affinity shared by units and dice.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
pub enum Element {
    Pyro,
    Hydro,
    Electro,
    Cryo,
    Anemo,
    Geo,
    Dendro,
    /// Wildcard face; pays for any element.
    Infinite,
}

impl Element {
    /// Faces that can come up on a starting roll, in canonical payment order.
    pub const ROLLABLE: [Element; 7] = [
        Element::Pyro,
        Element::Hydro,
        Element::Electro,
        Element::Cryo,
        Element::Anemo,
        Element::Geo,
        Element::Dendro,
    ];

    /// Whether this face substitutes for any other.
    pub fn is_wildcard(self) -> bool {
        matches!(self, Element::Infinite)
    }
}

/// Available dice per element. Absent keys mean zero.
pub type DicePool = BTreeMap<Element, u32>;

/// Total number of dice in a pool regardless of element.
pub fn dice_total(pool: &DicePool) -> u32 {
    pool.values().sum()
}

/// Reasons a raw string is not a valid room code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomCodeError {
    /// Code is shorter or longer than allowed.
    #[error("room code must be {min}-{max} characters (got {len})")]
    Length {
        /// Minimum accepted length.
        min: usize,
        /// Maximum accepted length.
        max: usize,
        /// Length that was provided.
        len: usize,
    },
    /// Code contains something other than ASCII letters and digits.
    #[error("room code must be alphanumeric")]
    Charset,
}

/// Case-normalised alphanumeric room identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Validate and uppercase a raw code supplied by a client.
    pub fn parse(raw: &str) -> Result<Self, RoomCodeError> {
        let trimmed = raw.trim();
        let len = trimmed.chars().count();
        if !(ROOM_CODE_MIN_LEN..=ROOM_CODE_MAX_LEN).contains(&len) {
            return Err(RoomCodeError::Length {
                min: ROOM_CODE_MIN_LEN,
                max: ROOM_CODE_MAX_LEN,
                len,
            });
        }
        if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(RoomCodeError::Charset);
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Borrow the normalised code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = RoomCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(value: RoomCode) -> Self {
        value.0
    }
}

/// Externally authenticated user occupying (or asking for) a seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerIdentity {
    /// Stable user id issued by the identity provider.
    pub id: String,
    /// Display name shown to the opponent.
    pub name: String,
    /// Avatar reference, if the provider supplied one.
    pub avatar: Option<String>,
}

/// Coarse lifecycle of a room. Only ever moves lobby -> play.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Seats are being filled and readied.
    #[default]
    Lobby,
    /// Match in progress.
    Play,
}

/// One-shot record of the opening coin flip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinState {
    /// True until both seats have acknowledged the flip.
    pub decided: bool,
    /// Seat that won the flip and acts first.
    pub winner: Option<Side>,
    /// Per-seat acknowledgement of the flip overlay.
    pub ack: Seats<bool>,
}

/// Who may act, and how far the phase cycle has progressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnState {
    pub phase_number: u32,
    pub turn: Option<Side>,
    pub phase_actor: Option<Side>,
    pub ended_phase: Seats<bool>,
    /// Seats in the order they ended the current phase.
    pub phase_end_order: Vec<Side>,
}

impl Default for TurnState {
    fn default() -> Self {
        Self {
            phase_number: 1,
            turn: None,
            phase_actor: None,
            ended_phase: Seats::default(),
            phase_end_order: Vec::new(),
        }
    }
}

/// A character fielded on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    /// Catalog code of the character.
    pub code: String,
    pub element: Element,
    pub attack: u32,
    /// Current hit points; the unit leaves the board at zero or below.
    pub hp: i32,
    /// Ultimate charge, `0..=MAX_GAUGE`.
    pub gauge: u8,
}

/// Aggregate root of a match, persisted as `state_json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomCode,
    pub mode: Mode,
    pub players: Seats<Option<PlayerIdentity>>,
    pub ready: Seats<bool>,
    pub coin: CoinState,
    pub turn_state: TurnState,
    pub hero: Seats<u32>,
    pub board: Seats<Vec<Unit>>,
    pub hand: Seats<Vec<String>>,
    pub deck: Seats<Vec<String>>,
    pub dice: Seats<DicePool>,
}

impl Room {
    /// Fresh lobby with both seats empty.
    pub fn new(id: RoomCode) -> Self {
        Self {
            id,
            mode: Mode::Lobby,
            players: Seats::default(),
            ready: Seats::default(),
            coin: CoinState::default(),
            turn_state: TurnState::default(),
            hero: Seats::new(STARTING_HERO_HP, STARTING_HERO_HP),
            board: Seats::default(),
            hand: Seats::default(),
            deck: Seats::default(),
            dice: Seats::default(),
        }
    }

    /// Seat occupied by `user_id`, if any.
    pub fn side_of(&self, user_id: &str) -> Option<Side> {
        Side::ALL.into_iter().find(|side| {
            self.players[*side]
                .as_ref()
                .is_some_and(|player| player.id == user_id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_code_is_uppercased_and_trimmed() {
        let code = RoomCode::parse("  abc123 ").unwrap();
        assert_eq!(code.as_str(), "ABC123");
    }

    #[test]
    fn room_code_rejects_bad_input() {
        assert!(matches!(
            RoomCode::parse("ab"),
            Err(RoomCodeError::Length { len: 2, .. })
        ));
        assert_eq!(RoomCode::parse("abc-12"), Err(RoomCodeError::Charset));
        assert!(RoomCode::parse(&"x".repeat(17)).is_err());
    }

    #[test]
    fn room_code_round_trips_through_json() {
        let code: RoomCode = serde_json::from_str("\"room42\"").unwrap();
        assert_eq!(code.as_str(), "ROOM42");
        assert!(serde_json::from_str::<RoomCode>("\"no way\"").is_err());
    }

    #[test]
    fn seats_index_by_side() {
        let mut seats = Seats::new(1, 2);
        seats[Side::B] += 5;
        assert_eq!(seats[Side::A], 1);
        assert_eq!(seats[Side::B], 7);
        assert_eq!(Side::A.opponent(), Side::B);
    }

    #[test]
    fn new_room_starts_in_lobby() {
        let room = Room::new(RoomCode::parse("ABC123").unwrap());
        assert_eq!(room.mode, Mode::Lobby);
        assert_eq!(room.turn_state.phase_number, 1);
        assert_eq!(room.hero, Seats::new(STARTING_HERO_HP, STARTING_HERO_HP));
        assert!(room.side_of("anyone").is_none());
    }
}
