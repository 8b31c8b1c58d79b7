//! Append-only audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{ActionType, ActorType, ModelError, PipelineState};

/// Table receiving audit rows.
pub const TRANSACTIONS_TABLE: &str = "transactions";

/// Principal performing an operation, as recorded in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub kind: ActorType,
    pub label: Option<String>,
}

impl Actor {
    pub fn new(kind: ActorType, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: Some(label.into()),
        }
    }
}

/// Stored audit record. Rows read back are held to the same `state_moved`
/// shape that [`TransactionBuilder::build`] enforces on write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "TransactionRow")]
pub struct Transaction {
    pub id: i64,
    pub content_id: Uuid,
    pub action: ActionType,
    #[serde(default)]
    pub from_state: Option<PipelineState>,
    #[serde(default)]
    pub to_state: Option<PipelineState>,
    pub actor: ActorType,
    #[serde(default)]
    pub actor_user_id: Option<Uuid>,
    #[serde(default)]
    pub actor_label: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub details: Map<String, JsonValue>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct TransactionRow {
    id: i64,
    content_id: Uuid,
    action: ActionType,
    #[serde(default)]
    from_state: Option<PipelineState>,
    #[serde(default)]
    to_state: Option<PipelineState>,
    actor: ActorType,
    #[serde(default)]
    actor_user_id: Option<Uuid>,
    #[serde(default)]
    actor_label: Option<String>,
    #[serde(default)]
    details: Map<String, JsonValue>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = ModelError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        if row.action == ActionType::StateMoved
            && (row.from_state.is_none() || row.to_state.is_none())
        {
            return Err(ModelError::StateMovedWithoutStates);
        }

        Ok(Transaction {
            id: row.id,
            content_id: row.content_id,
            action: row.action,
            from_state: row.from_state,
            to_state: row.to_state,
            actor: row.actor,
            actor_user_id: row.actor_user_id,
            actor_label: row.actor_label,
            details: row.details,
            created_at: row.created_at,
        })
    }
}

/// Audit row ready to be appended. Only obtainable through
/// [`TransactionBuilder::build`], which enforces the `state_moved` shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTransaction {
    content_id: Uuid,
    action: ActionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    from_state: Option<PipelineState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    to_state: Option<PipelineState>,
    actor: ActorType,
    #[serde(skip_serializing_if = "Option::is_none")]
    actor_label: Option<String>,
    details: Map<String, JsonValue>,
}

impl NewTransaction {
    pub fn builder(content_id: Uuid, action: ActionType, actor: &Actor) -> TransactionBuilder {
        TransactionBuilder {
            content_id,
            action,
            from_state: None,
            to_state: None,
            actor: actor.kind,
            actor_label: actor.label.clone(),
            details: Map::new(),
        }
    }

    /// Shorthand for a `state_moved` row, which always carries both ends.
    pub fn state_moved(
        content_id: Uuid,
        actor: &Actor,
        from: PipelineState,
        to: PipelineState,
        details: Map<String, JsonValue>,
    ) -> Self {
        Self {
            content_id,
            action: ActionType::StateMoved,
            from_state: Some(from),
            to_state: Some(to),
            actor: actor.kind,
            actor_label: actor.label.clone(),
            details,
        }
    }

    pub fn content_id(&self) -> Uuid {
        self.content_id
    }

    pub fn action(&self) -> ActionType {
        self.action
    }
}

#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    content_id: Uuid,
    action: ActionType,
    from_state: Option<PipelineState>,
    to_state: Option<PipelineState>,
    actor: ActorType,
    actor_label: Option<String>,
    details: Map<String, JsonValue>,
}

impl TransactionBuilder {
    pub fn from_state(mut self, state: PipelineState) -> Self {
        self.from_state = Some(state);
        self
    }

    pub fn to_state(mut self, state: PipelineState) -> Self {
        self.to_state = Some(state);
        self
    }

    pub fn detail(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn details(mut self, details: Map<String, JsonValue>) -> Self {
        self.details.extend(details);
        self
    }

    pub fn build(self) -> Result<NewTransaction, ModelError> {
        if self.action == ActionType::StateMoved
            && (self.from_state.is_none() || self.to_state.is_none())
        {
            return Err(ModelError::StateMovedWithoutStates);
        }

        Ok(NewTransaction {
            content_id: self.content_id,
            action: self.action,
            from_state: self.from_state,
            to_state: self.to_state,
            actor: self.actor,
            actor_label: self.actor_label,
            details: self.details,
        })
    }
}
