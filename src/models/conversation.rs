use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub room_id: Uuid,
    pub landlord_id: Uuid,
    pub tenant_id: Uuid,
    pub status: ConversationStatus,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "chat_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Pending,
    Approved,
    Refused,
}

impl ConversationStatus {
    /// Requests only ever leave `pending`; a decision is never reversed.
    pub fn can_transition_to(self, target: ConversationStatus) -> bool {
        matches!(
            (self, target),
            (ConversationStatus::Pending, ConversationStatus::Approved)
                | (ConversationStatus::Pending, ConversationStatus::Refused)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConversationStatus::Pending => "pending",
            ConversationStatus::Approved => "approved",
            ConversationStatus::Refused => "refused",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantProfile {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub location: String,
    pub image_url: Option<String>,
}

/// A conversation as the dashboard shows it. `participant_details` is
/// always `[landlord, tenant]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationWithDetails {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub participant_details: Vec<ParticipantProfile>,
    pub room_details: RoomSummary,
}

impl ConversationWithDetails {
    pub fn tenant(&self) -> Option<&ParticipantProfile> {
        self.participant_details.get(1)
    }
}

/// Flat row produced by the conversation listing join.
#[derive(Debug, Clone, FromRow)]
pub struct ConversationRow {
    pub id: Uuid,
    pub room_id: Uuid,
    pub landlord_id: Uuid,
    pub tenant_id: Uuid,
    pub status: ConversationStatus,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub landlord_name: Option<String>,
    pub landlord_email: String,
    pub landlord_image_url: Option<String>,
    pub tenant_name: Option<String>,
    pub tenant_email: String,
    pub tenant_image_url: Option<String>,
    pub room_title: String,
    pub room_description: String,
    pub room_price: f64,
    pub room_address: String,
    pub room_image_url: Option<String>,
}

impl From<ConversationRow> for ConversationWithDetails {
    fn from(row: ConversationRow) -> Self {
        ConversationWithDetails {
            participant_details: vec![
                ParticipantProfile {
                    id: row.landlord_id,
                    name: row.landlord_name,
                    email: row.landlord_email,
                    image_url: row.landlord_image_url,
                },
                ParticipantProfile {
                    id: row.tenant_id,
                    name: row.tenant_name,
                    email: row.tenant_email,
                    image_url: row.tenant_image_url,
                },
            ],
            room_details: RoomSummary {
                title: row.room_title,
                description: row.room_description,
                price: row.room_price,
                location: row.room_address,
                image_url: row.room_image_url,
            },
            conversation: Conversation {
                id: row.id,
                room_id: row.room_id,
                landlord_id: row.landlord_id,
                tenant_id: row.tenant_id,
                status: row.status,
                last_message_at: row.last_message_at,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
        }
    }
}

/// Criteria for the request listings.
#[derive(Debug, Clone, Default)]
pub struct ConversationFilter {
    pub status: Option<ConversationStatus>,
    pub room_ids: Option<Vec<Uuid>>,
    pub text: Option<String>,
}

impl ConversationFilter {
    pub fn with_status(status: ConversationStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn matches(&self, chat: &ConversationWithDetails) -> bool {
        if let Some(status) = self.status {
            if chat.conversation.status != status {
                return false;
            }
        }
        if let Some(room_ids) = &self.room_ids {
            if !room_ids.is_empty() && !room_ids.contains(&chat.conversation.room_id) {
                return false;
            }
        }
        match self.text.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                let tenant_hit = chat.tenant().is_some_and(|t| {
                    t.email.to_lowercase().contains(&needle)
                        || t
                            .name
                            .as_deref()
                            .is_some_and(|n| n.to_lowercase().contains(&needle))
                });
                tenant_hit || chat.room_details.title.to_lowercase().contains(&needle)
            }
            _ => true,
        }
    }
}

/// Parses the comma separated room id list the dashboard sends.
pub fn parse_room_ids(raw: Option<&str>) -> Result<Option<Vec<Uuid>>, uuid::Error> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    raw.split(',')
        .map(|part| Uuid::parse_str(part.trim()))
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}
