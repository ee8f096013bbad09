use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    dto::{room::RoomView, validation::validate_room_code},
    error::ServiceError,
    state::state_machine::{CombatMode, RoomAction},
};

/// Body of the single action endpoint, accepted as JSON or form fields.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    /// One of `hello`, `createRoom`, `joinRoom`, `getState`, `ready`, `ackCoin`,
    /// `endTurn`, `endPhase`, `playCard`, `discardForInfinite`, `combat`.
    pub action: String,
    /// Room code. When omitted it is read from the `Referer` header.
    #[serde(default)]
    pub room_id: Option<String>,
    /// Hand slot for `playCard` and `discardForInfinite`.
    #[serde(default, alias = "index")]
    pub hand_index: Option<usize>,
    /// Board slot of the attacking unit for `combat`.
    #[serde(default, alias = "attacker")]
    pub attacker_index: Option<usize>,
    /// Board slot of the defending unit for `combat`; defaults to the first.
    #[serde(default, alias = "target")]
    pub target_index: Option<usize>,
    /// Attack flavour for `combat`; defaults to `basic`.
    #[serde(default)]
    pub mode: Option<CombatMode>,
}

impl Validate for ActionRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.action.trim().is_empty() {
            let mut err = ValidationError::new("required");
            err.message = Some("action is required".into());
            errors.add("action", err);
        }

        // Blank codes are treated as absent and resolved from the referer.
        if let Some(code) = self.room_id.as_deref().filter(|code| !code.trim().is_empty()) {
            if let Err(err) = validate_room_code(code) {
                errors.add("roomId", err);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl ActionRequest {
    /// Room code supplied in the body, ignoring blanks.
    pub fn room_id(&self) -> Option<&str> {
        self.room_id
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }

    /// Map the loosely-typed body onto a closed [`RoomAction`].
    pub fn to_action(&self) -> Result<RoomAction, ServiceError> {
        let action = match self.action.trim() {
            "hello" => RoomAction::Hello,
            "createRoom" => RoomAction::CreateRoom,
            "joinRoom" => RoomAction::JoinRoom,
            "getState" => RoomAction::GetState,
            "ready" => RoomAction::Ready,
            "ackCoin" => RoomAction::AckCoin,
            "endTurn" => RoomAction::EndTurn,
            "endPhase" => RoomAction::EndPhase,
            "playCard" => RoomAction::PlayCard {
                hand_index: self.require(self.hand_index, "handIndex")?,
            },
            "discardForInfinite" => RoomAction::DiscardForInfinite {
                hand_index: self.require(self.hand_index, "handIndex")?,
            },
            "combat" => RoomAction::Combat {
                attacker: self.require(self.attacker_index, "attackerIndex")?,
                target: self.target_index,
                mode: self.mode.unwrap_or(CombatMode::Basic),
            },
            other => {
                return Err(ServiceError::InvalidInput(format!(
                    "unknown action `{other}`"
                )));
            }
        };
        Ok(action)
    }

    fn require(&self, value: Option<usize>, field: &str) -> Result<usize, ServiceError> {
        value.ok_or_else(|| {
            ServiceError::InvalidInput(format!("`{field}` is required for `{}`", self.action))
        })
    }
}

/// Identity echoed back by `hello`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserView {
    pub id: String,
    pub name: String,
    pub avatar: Option<String>,
}

/// Successful action outcome.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<RoomView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserView>,
}

impl ActionResponse {
    pub fn with_state(state: RoomView) -> Self {
        Self {
            ok: true,
            state: Some(state),
            user: None,
        }
    }

    pub fn with_user(user: UserView) -> Self {
        Self {
            ok: true,
            state: None,
            user: Some(user),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(action: &str) -> ActionRequest {
        ActionRequest {
            action: action.into(),
            ..ActionRequest::default()
        }
    }

    #[test]
    fn simple_actions_map_directly() {
        assert_eq!(request("hello").to_action().unwrap(), RoomAction::Hello);
        assert_eq!(request("ready").to_action().unwrap(), RoomAction::Ready);
        assert_eq!(request(" endPhase ").to_action().unwrap(), RoomAction::EndPhase);
    }

    #[test]
    fn combat_defaults_to_basic_and_first_target() {
        let mut req = request("combat");
        req.attacker_index = Some(1);
        assert_eq!(
            req.to_action().unwrap(),
            RoomAction::Combat {
                attacker: 1,
                target: None,
                mode: CombatMode::Basic,
            }
        );
    }

    #[test]
    fn missing_index_is_invalid_input() {
        assert!(matches!(
            request("playCard").to_action(),
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            request("combat").to_action(),
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[test]
    fn unknown_action_is_invalid_input() {
        assert!(matches!(
            request("gacha").to_action(),
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[test]
    fn validation_flags_blank_action_and_bad_room() {
        let mut req = request("");
        req.room_id = Some("x!".into());
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("action"));
        assert!(fields.contains_key("roomId"));

        let mut blank_room = request("getState");
        blank_room.room_id = Some("  ".into());
        assert!(blank_room.validate().is_ok());
        assert_eq!(blank_room.room_id(), None);
    }

    #[test]
    fn aliases_are_accepted() {
        let req: ActionRequest = serde_json::from_str(
            r#"{"action":"combat","roomId":"abc","attacker":0,"target":2,"mode":"skill"}"#,
        )
        .unwrap();
        assert_eq!(
            req.to_action().unwrap(),
            RoomAction::Combat {
                attacker: 0,
                target: Some(2),
                mode: CombatMode::Skill,
            }
        );
    }
}
