use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use super::mailer::{Mail, Mailer};
use crate::{
    error::{AppError, AppResult},
    models::{ConversationFilter, ConversationRow, ConversationStatus, ConversationWithDetails},
};

const DETAILS_SELECT: &str = r#"
    SELECT c.id, c.room_id, c.landlord_id, c.tenant_id, c.status, c.last_message_at,
           c.created_at, c.updated_at,
           l.name AS landlord_name, l.email AS landlord_email, l.image_url AS landlord_image_url,
           t.name AS tenant_name, t.email AS tenant_email, t.image_url AS tenant_image_url,
           r.title AS room_title, r.description AS room_description, r.price AS room_price,
           r.address AS room_address,
           (SELECT m.url FROM room_media m
            WHERE m.room_id = r.id AND m.kind = 'image'
            ORDER BY m.created_at LIMIT 1) AS room_image_url
    FROM chats c
    JOIN users l ON l.id = c.landlord_id
    JOIN users t ON t.id = c.tenant_id
    JOIN rooms r ON r.id = c.room_id
"#;

/// What a status change request amounts to for the current record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPlan {
    Apply,
    AlreadyDone,
}

pub fn plan_transition(
    chat: &ConversationWithDetails,
    target: ConversationStatus,
    participant_email: &str,
) -> AppResult<TransitionPlan> {
    if target == ConversationStatus::Pending {
        return Err(AppError::BadRequest(
            "status must be approved or refused".to_string(),
        ));
    }

    let tenant_email = chat.tenant().map(|t| t.email.as_str()).unwrap_or_default();
    if !tenant_email.eq_ignore_ascii_case(participant_email.trim()) {
        return Err(AppError::NotParticipant);
    }

    let current = chat.conversation.status;
    if current == target {
        return Ok(TransitionPlan::AlreadyDone);
    }
    if !current.can_transition_to(target) {
        return Err(AppError::InvalidTransition {
            from: current.as_str().to_string(),
            to: target.as_str().to_string(),
        });
    }
    Ok(TransitionPlan::Apply)
}

pub struct RequestService {
    db: PgPool,
    mailer: Arc<dyn Mailer>,
}

impl RequestService {
    pub fn new(db: PgPool, mailer: Arc<dyn Mailer>) -> Self {
        Self { db, mailer }
    }

    pub async fn list(
        &self,
        landlord_id: Uuid,
        filter: &ConversationFilter,
    ) -> AppResult<Vec<ConversationWithDetails>> {
        let sql = format!(
            r#"{}
            WHERE c.landlord_id = $1
              AND ($2::chat_status IS NULL OR c.status = $2)
              AND ($3::uuid[] IS NULL OR cardinality($3) = 0 OR c.room_id = ANY($3))
            ORDER BY COALESCE(c.last_message_at, c.created_at) DESC
            "#,
            DETAILS_SELECT
        );

        let rows: Vec<ConversationRow> = sqlx::query_as(&sql)
            .bind(landlord_id)
            .bind(filter.status)
            .bind(filter.room_ids.as_deref())
            .fetch_all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(ConversationWithDetails::from)
            .filter(|chat| filter.matches(chat))
            .collect())
    }

    pub async fn get(&self, chat_id: Uuid, landlord_id: Uuid) -> AppResult<ConversationWithDetails> {
        let sql = format!("{} WHERE c.id = $1 AND c.landlord_id = $2", DETAILS_SELECT);
        let row: ConversationRow = sqlx::query_as(&sql)
            .bind(chat_id)
            .bind(landlord_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AppError::ConversationNotFound)?;
        Ok(row.into())
    }

    /// Moves a pending request to `target`. Repeating a decision already
    /// taken returns the record unchanged; any other change is a conflict.
    pub async fn transition(
        &self,
        chat_id: Uuid,
        landlord_id: Uuid,
        target: ConversationStatus,
        participant_email: &str,
    ) -> AppResult<ConversationWithDetails> {
        let chat = self.get(chat_id, landlord_id).await?;
        if plan_transition(&chat, target, participant_email)? == TransitionPlan::AlreadyDone {
            return Ok(chat);
        }

        let updated = sqlx::query(
            "UPDATE chats SET status = $1, updated_at = NOW() WHERE id = $2 AND status = 'pending'",
        )
        .bind(target)
        .bind(chat_id)
        .execute(&self.db)
        .await?;

        let chat = self.get(chat_id, landlord_id).await?;
        if updated.rows_affected() == 0 {
            // Lost a race with another decision; judge against what won.
            plan_transition(&chat, target, participant_email)?;
            return Ok(chat);
        }

        tracing::info!(chat_id = %chat_id, status = target.as_str(), "request decided");

        if target == ConversationStatus::Approved {
            let mail = Mail::RequestApproved {
                to: participant_email.trim().to_string(),
                room_title: chat.room_details.title.clone(),
            };
            if let Err(e) = self.mailer.send(mail).await {
                tracing::warn!(chat_id = %chat_id, error = %e, "approval email not sent");
            }
        }

        Ok(chat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::conversation::fixtures::chat;
    use crate::services::{
        mailer::recording::RecordingMailer,
        test_db::{self, TENANT_EMAIL},
    };

    #[test]
    fn pending_request_can_be_decided() {
        let c = chat(ConversationStatus::Pending, Uuid::new_v4(), "Ana", "Room A");
        assert_eq!(
            plan_transition(&c, ConversationStatus::Approved, "ana@mail.com").unwrap(),
            TransitionPlan::Apply
        );
        assert_eq!(
            plan_transition(&c, ConversationStatus::Refused, " ANA@mail.com ").unwrap(),
            TransitionPlan::Apply
        );
    }

    #[test]
    fn repeating_a_decision_is_idempotent() {
        let c = chat(ConversationStatus::Approved, Uuid::new_v4(), "Ana", "Room A");
        assert_eq!(
            plan_transition(&c, ConversationStatus::Approved, "ana@mail.com").unwrap(),
            TransitionPlan::AlreadyDone
        );
    }

    #[test]
    fn decisions_are_never_reversed() {
        let c = chat(ConversationStatus::Refused, Uuid::new_v4(), "Ana", "Room A");
        let err = plan_transition(&c, ConversationStatus::Approved, "ana@mail.com").unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
        assert_eq!(err.to_string(), "Cannot move conversation from refused to approved");
    }

    #[test]
    fn email_must_belong_to_the_tenant() {
        let c = chat(ConversationStatus::Pending, Uuid::new_v4(), "Ana", "Room A");
        assert!(matches!(
            plan_transition(&c, ConversationStatus::Approved, "landlord@uniroom.app"),
            Err(AppError::NotParticipant)
        ));
    }

    #[test]
    fn pending_is_not_a_target() {
        let c = chat(ConversationStatus::Pending, Uuid::new_v4(), "Ana", "Room A");
        assert!(matches!(
            plan_transition(&c, ConversationStatus::Pending, "ana@mail.com"),
            Err(AppError::BadRequest(_))
        ));
    }

    async fn stored_status(pool: &PgPool, chat_id: Uuid) -> ConversationStatus {
        let (status,): (ConversationStatus,) = sqlx::query_as("SELECT status FROM chats WHERE id = $1")
            .bind(chat_id)
            .fetch_one(pool)
            .await
            .unwrap();
        status
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn approving_a_refused_request_leaves_it_refused(pool: PgPool) {
        let seeded = test_db::seed_chat(&pool, ConversationStatus::Refused).await;
        let mailer = Arc::new(RecordingMailer::default());
        let service = RequestService::new(pool.clone(), mailer.clone());

        let err = service
            .transition(
                seeded.chat.id,
                seeded.landlord_id,
                ConversationStatus::Approved,
                TENANT_EMAIL,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidTransition { .. }));
        assert_eq!(stored_status(&pool, seeded.chat.id).await, ConversationStatus::Refused);
        assert!(mailer.sent().await.is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn approval_is_applied_once_and_mailed_once(pool: PgPool) {
        let seeded = test_db::seed_chat(&pool, ConversationStatus::Pending).await;
        let mailer = Arc::new(RecordingMailer::default());
        let service = RequestService::new(pool.clone(), mailer.clone());

        for _ in 0..2 {
            let chat = service
                .transition(
                    seeded.chat.id,
                    seeded.landlord_id,
                    ConversationStatus::Approved,
                    TENANT_EMAIL,
                )
                .await
                .unwrap();
            assert_eq!(chat.conversation.status, ConversationStatus::Approved);
        }

        assert_eq!(stored_status(&pool, seeded.chat.id).await, ConversationStatus::Approved);
        assert_eq!(mailer.sent().await.len(), 1);
    }
}
