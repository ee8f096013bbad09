use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::{
    dao::models::DeckEntity,
    state::{
        catalog::{CardCatalog, CardEffect, CardKind},
        loadout::resolve_loadout,
        room::{
            CoinState, DicePool, Element, MAX_GAUGE, Mode, OPENING_HAND, PHASE_DRAW,
            PlayerIdentity, Room, STARTING_DICE, STARTING_HERO_HP, Seats, Side, TurnState,
        },
    },
};

/// Attack flavour chosen by the acting player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CombatMode {
    /// One die of any element.
    Basic,
    /// Three dice aligned with the attacker.
    Skill,
    /// Five aligned dice, requires a full gauge.
    Ult,
}

impl CombatMode {
    fn cost(self, element: Element) -> DiceCost {
        match self {
            CombatMode::Basic => DiceCost::Any(1),
            CombatMode::Skill => DiceCost::Aligned { element, count: 3 },
            CombatMode::Ult => DiceCost::Aligned { element, count: 5 },
        }
    }

    fn damage(self, attack: u32) -> u32 {
        match self {
            CombatMode::Basic => attack,
            CombatMode::Skill => attack + 1,
            CombatMode::Ult => attack + 3,
        }
    }
}

/// Every action a client may submit against a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomAction {
    /// Identity echo; never touches a room.
    Hello,
    CreateRoom,
    JoinRoom,
    GetState,
    Ready,
    AckCoin,
    EndTurn,
    EndPhase,
    PlayCard { hand_index: usize },
    DiscardForInfinite { hand_index: usize },
    Combat {
        attacker: usize,
        /// Defaults to the first opposing unit.
        target: Option<usize>,
        mode: CombatMode,
    },
}

impl RoomAction {
    /// Wire name of the action, used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            RoomAction::Hello => "hello",
            RoomAction::CreateRoom => "createRoom",
            RoomAction::JoinRoom => "joinRoom",
            RoomAction::GetState => "getState",
            RoomAction::Ready => "ready",
            RoomAction::AckCoin => "ackCoin",
            RoomAction::EndTurn => "endTurn",
            RoomAction::EndPhase => "endPhase",
            RoomAction::PlayCard { .. } => "playCard",
            RoomAction::DiscardForInfinite { .. } => "discardForInfinite",
            RoomAction::Combat { .. } => "combat",
        }
    }

    /// Whether referencing an unknown room code with this action creates it.
    pub fn creates_room(&self) -> bool {
        matches!(
            self,
            RoomAction::CreateRoom | RoomAction::JoinRoom | RoomAction::GetState
        )
    }
}

/// Rejections produced by room transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("user `{0}` is not seated in this room")]
    NotInRoom(String),
    #[error("room is full")]
    RoomFull,
    #[error("illegal action: {0}")]
    IllegalAction(String),
    #[error("insufficient dice: {needed} needed, {available} available")]
    InsufficientResource {
        /// Element the cost was aligned to, `None` for any-element costs.
        element: Option<Element>,
        needed: u32,
        available: u32,
    },
}

/// House rules toggled from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchRules {
    /// Allow the explicit `endTurn` action.
    pub end_turn_enabled: bool,
    /// Give both seats the same opening roll.
    pub mirror_starting_dice: bool,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            end_turn_enabled: true,
            mirror_starting_dice: false,
        }
    }
}

/// Read-only inputs a transition may consult.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    pub catalog: &'a CardCatalog,
    pub rules: &'a MatchRules,
    /// Saved decks keyed by user id, prefetched for `ready`.
    pub decks: &'a HashMap<String, DeckEntity>,
}

/// Dice price of an attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiceCost {
    Any(u32),
    Aligned { element: Element, count: u32 },
}

impl DiceCost {
    fn count(self) -> u32 {
        match self {
            DiceCost::Any(count) | DiceCost::Aligned { count, .. } => count,
        }
    }

    fn element(self) -> Option<Element> {
        match self {
            DiceCost::Any(_) => None,
            DiceCost::Aligned { element, .. } => Some(element),
        }
    }

    /// Faces consumed in order; wildcards always last.
    fn payment_order(self) -> Vec<Element> {
        match self {
            DiceCost::Any(_) => Element::ROLLABLE
                .into_iter()
                .chain([Element::Infinite])
                .collect(),
            DiceCost::Aligned { element, .. } if element.is_wildcard() => vec![Element::Infinite],
            DiceCost::Aligned { element, .. } => vec![element, Element::Infinite],
        }
    }
}

/// Work out which dice pay `cost` without touching the pool.
fn plan_payment(pool: &DicePool, cost: DiceCost) -> Result<Vec<(Element, u32)>, MatchError> {
    let mut remaining = cost.count();
    let mut available = 0;
    let mut payment = Vec::new();
    for element in cost.payment_order() {
        let have = pool.get(&element).copied().unwrap_or(0);
        available += have;
        let take = have.min(remaining);
        if take > 0 {
            payment.push((element, take));
            remaining -= take;
        }
    }
    if remaining > 0 {
        return Err(MatchError::InsufficientResource {
            element: cost.element(),
            needed: cost.count(),
            available,
        });
    }
    Ok(payment)
}

fn spend(pool: &mut DicePool, payment: &[(Element, u32)]) {
    for &(element, count) in payment {
        if let Some(have) = pool.get_mut(&element) {
            *have = have.saturating_sub(count);
            if *have == 0 {
                pool.remove(&element);
            }
        }
    }
}

/// Opening roll: uniform faces over the rollable elements.
pub fn roll_dice<R: Rng + ?Sized>(rng: &mut R) -> DicePool {
    let mut pool = DicePool::new();
    for _ in 0..STARTING_DICE {
        let face = Element::ROLLABLE[rng.random_range(0..Element::ROLLABLE.len())];
        *pool.entry(face).or_default() += 1;
    }
    pool
}

impl Room {
    /// Apply `action` on behalf of `user`.
    ///
    /// On error the room may be partially modified; callers work on a copy and
    /// discard it.
    pub fn apply<R: Rng + ?Sized>(
        &mut self,
        user: &PlayerIdentity,
        action: &RoomAction,
        ctx: &MatchContext<'_>,
        rng: &mut R,
    ) -> Result<(), MatchError> {
        match *action {
            RoomAction::Hello | RoomAction::GetState => Ok(()),
            RoomAction::CreateRoom => {
                self.create(user);
                Ok(())
            }
            RoomAction::JoinRoom => self.join(user).map(|_| ()),
            RoomAction::Ready => self.mark_ready(user, ctx, rng),
            RoomAction::AckCoin => self.ack_coin(user),
            RoomAction::EndTurn => self.end_turn(user, ctx.rules),
            RoomAction::EndPhase => self.end_phase(user),
            RoomAction::PlayCard { hand_index } => self.play_card(user, hand_index, ctx.catalog),
            RoomAction::DiscardForInfinite { hand_index } => {
                self.discard_for_infinite(user, hand_index)
            }
            RoomAction::Combat {
                attacker,
                target,
                mode,
            } => self.combat(user, attacker, target, mode),
        }
    }

    /// Seat B can be claimed by a newcomer while its occupant has not readied up.
    pub fn seat_b_claimable(&self) -> bool {
        self.mode == Mode::Lobby && !self.ready[Side::B]
    }

    fn seat_of(&self, user: &PlayerIdentity) -> Result<Side, MatchError> {
        self.side_of(&user.id)
            .ok_or_else(|| MatchError::NotInRoom(user.id.clone()))
    }

    fn require_play(&self, action: &str) -> Result<(), MatchError> {
        if self.mode == Mode::Play {
            Ok(())
        } else {
            Err(MatchError::IllegalAction(format!(
                "{action} is not allowed before the match starts"
            )))
        }
    }

    /// Seat of the caller when they are the phase actor. `None` means the
    /// action arrived out of turn and is ignored.
    fn acting_side(&self, user: &PlayerIdentity, action: &str) -> Result<Option<Side>, MatchError> {
        let side = self.seat_of(user)?;
        self.require_play(action)?;
        if self.turn_state.phase_actor != Some(side) {
            debug!(room = %self.id, %side, action, "out of turn action ignored");
            return Ok(None);
        }
        Ok(Some(side))
    }

    fn pass_control(&mut self, to: Side) {
        self.turn_state.turn = Some(to);
        self.turn_state.phase_actor = Some(to);
    }

    fn create(&mut self, user: &PlayerIdentity) {
        if self.players.both(Option::is_none) {
            self.players[Side::A] = Some(user.clone());
        }
    }

    fn join(&mut self, user: &PlayerIdentity) -> Result<Side, MatchError> {
        if let Some(side) = self.side_of(&user.id) {
            self.players[side] = Some(user.clone());
            return Ok(side);
        }
        if let Some(side) = Side::ALL
            .into_iter()
            .find(|side| self.players[*side].is_none())
        {
            self.players[side] = Some(user.clone());
            return Ok(side);
        }
        if self.seat_b_claimable() {
            let previous = self.players[Side::B].as_ref().map(|p| p.id.clone());
            info!(room = %self.id, user = %user.id, ?previous, "seat b taken over");
            self.players[Side::B] = Some(user.clone());
            return Ok(Side::B);
        }
        Err(MatchError::RoomFull)
    }

    fn mark_ready<R: Rng + ?Sized>(
        &mut self,
        user: &PlayerIdentity,
        ctx: &MatchContext<'_>,
        rng: &mut R,
    ) -> Result<(), MatchError> {
        let side = self.join(user)?;
        self.ready[side] = true;
        if self.mode == Mode::Lobby && self.ready.both(|ready| *ready) {
            self.start_game(ctx, rng);
        }
        Ok(())
    }

    fn start_game<R: Rng + ?Sized>(&mut self, ctx: &MatchContext<'_>, rng: &mut R) {
        for side in Side::ALL {
            let deck = self.players[side]
                .as_ref()
                .and_then(|player| ctx.decks.get(&player.id));
            let mut loadout = resolve_loadout(ctx.catalog, deck, rng);
            let opening = loadout.pile.len().min(OPENING_HAND);
            self.hand[side] = loadout.pile.drain(..opening).collect();
            self.board[side] = loadout.board;
            self.deck[side] = loadout.pile;
        }

        let first_roll = roll_dice(rng);
        self.dice = if ctx.rules.mirror_starting_dice {
            Seats::new(first_roll.clone(), first_roll)
        } else {
            Seats::new(first_roll, roll_dice(rng))
        };

        let starter = if rng.random_bool(0.5) { Side::A } else { Side::B };
        self.coin = CoinState {
            decided: true,
            winner: Some(starter),
            ack: Seats::default(),
        };
        self.turn_state = TurnState {
            phase_number: 1,
            turn: Some(starter),
            phase_actor: Some(starter),
            ..TurnState::default()
        };
        self.hero = Seats::new(STARTING_HERO_HP, STARTING_HERO_HP);
        self.mode = Mode::Play;
        info!(room = %self.id, %starter, "match started");
    }

    fn ack_coin(&mut self, user: &PlayerIdentity) -> Result<(), MatchError> {
        let side = self.seat_of(user)?;
        if !self.coin.decided {
            return Ok(());
        }
        self.coin.ack[side] = true;
        if self.coin.ack.both(|ack| *ack) {
            self.coin.decided = false;
        }
        Ok(())
    }

    fn end_turn(&mut self, user: &PlayerIdentity, rules: &MatchRules) -> Result<(), MatchError> {
        let side = self.seat_of(user)?;
        if !rules.end_turn_enabled {
            return Err(MatchError::IllegalAction(
                "endTurn is disabled, turns advance through combat".into(),
            ));
        }
        self.require_play("endTurn")?;
        if self.turn_state.turn != Some(side) {
            debug!(room = %self.id, %side, "endTurn out of turn ignored");
            return Ok(());
        }
        self.pass_control(side.opponent());
        Ok(())
    }

    fn end_phase(&mut self, user: &PlayerIdentity) -> Result<(), MatchError> {
        let Some(side) = self.acting_side(user, "endPhase")? else {
            return Ok(());
        };
        if self.turn_state.ended_phase[side] {
            return Ok(());
        }

        self.turn_state.ended_phase[side] = true;
        self.turn_state.phase_end_order.push(side);

        let other = side.opponent();
        if !self.turn_state.ended_phase[other] {
            self.pass_control(other);
            return Ok(());
        }

        let next = self
            .turn_state
            .phase_end_order
            .first()
            .copied()
            .unwrap_or(side);
        self.turn_state.phase_number += 1;
        self.turn_state.ended_phase = Seats::default();
        self.turn_state.phase_end_order.clear();
        self.pass_control(next);
        for side in Side::ALL {
            self.draw(side, PHASE_DRAW);
        }
        info!(
            room = %self.id,
            phase = self.turn_state.phase_number,
            starter = %next,
            "phase completed"
        );
        Ok(())
    }

    fn draw(&mut self, side: Side, count: usize) {
        let count = count.min(self.deck[side].len());
        let drawn: Vec<String> = self.deck[side].drain(..count).collect();
        self.hand[side].extend(drawn);
    }

    fn play_card(
        &mut self,
        user: &PlayerIdentity,
        hand_index: usize,
        catalog: &CardCatalog,
    ) -> Result<(), MatchError> {
        let Some(side) = self.acting_side(user, "playCard")? else {
            return Ok(());
        };
        if hand_index >= self.hand[side].len() {
            return Ok(());
        }

        let code = self.hand[side].remove(hand_index);
        match catalog.get(&code) {
            Some(card) if card.kind == CardKind::Character => {
                debug!(room = %self.id, %side, %code, "character card discarded");
            }
            Some(card) => {
                if let Some(effect) = card.effect {
                    self.resolve_effect(side, effect);
                }
            }
            None => debug!(room = %self.id, %side, %code, "unknown card discarded"),
        }
        Ok(())
    }

    fn resolve_effect(&mut self, side: Side, effect: CardEffect) {
        match effect {
            CardEffect::HealHero { amount } => {
                self.hero[side] = self.hero[side].saturating_add(amount).min(STARTING_HERO_HP);
            }
            CardEffect::BuffBoard { amount } => {
                let amount = i32::try_from(amount).unwrap_or(i32::MAX);
                for unit in &mut self.board[side] {
                    unit.hp = unit.hp.saturating_add(amount);
                }
            }
            CardEffect::Strike { amount } => self.deal_damage(side.opponent(), 0, amount),
        }
    }

    fn discard_for_infinite(
        &mut self,
        user: &PlayerIdentity,
        hand_index: usize,
    ) -> Result<(), MatchError> {
        let Some(side) = self.acting_side(user, "discardForInfinite")? else {
            return Ok(());
        };
        if hand_index >= self.hand[side].len() {
            return Ok(());
        }
        self.hand[side].remove(hand_index);
        *self.dice[side].entry(Element::Infinite).or_default() += 1;
        Ok(())
    }

    fn combat(
        &mut self,
        user: &PlayerIdentity,
        attacker: usize,
        target: Option<usize>,
        mode: CombatMode,
    ) -> Result<(), MatchError> {
        let Some(side) = self.acting_side(user, "combat")? else {
            return Ok(());
        };
        let defender = side.opponent();

        let (element, attack, gauge) = match self.board[side].get(attacker) {
            Some(unit) => (unit.element, unit.attack, unit.gauge),
            None => {
                return Err(MatchError::IllegalAction(format!(
                    "no unit at attacker index {attacker}"
                )));
            }
        };
        if mode == CombatMode::Ult && gauge < MAX_GAUGE {
            return Err(MatchError::IllegalAction(format!(
                "ult requires a full gauge ({gauge}/{MAX_GAUGE})"
            )));
        }
        let target = target.unwrap_or(0);
        let defenders = self.board[defender].len();
        if defenders > 0 && target >= defenders {
            return Err(MatchError::IllegalAction(format!(
                "no unit at target index {target}"
            )));
        }

        let payment = plan_payment(&self.dice[side], mode.cost(element))?;
        spend(&mut self.dice[side], &payment);

        let unit = &mut self.board[side][attacker];
        unit.gauge = match mode {
            CombatMode::Ult => 0,
            CombatMode::Basic | CombatMode::Skill => (unit.gauge + 1).min(MAX_GAUGE),
        };

        self.deal_damage(defender, target, mode.damage(attack));
        self.pass_control(defender);
        Ok(())
    }

    fn deal_damage(&mut self, defender: Side, target: usize, amount: u32) {
        let board = &mut self.board[defender];
        if board.is_empty() {
            self.hero[defender] = self.hero[defender].saturating_sub(amount);
            return;
        }
        let Some(unit) = board.get_mut(target) else {
            return;
        };
        unit.hp = unit
            .hp
            .saturating_sub(i32::try_from(amount).unwrap_or(i32::MAX));
        if unit.hp <= 0 {
            let fallen = board.remove(target);
            info!(room = %self.id, side = %defender, code = %fallen.code, "unit defeated");
        }
    }
}
