//! Scheduling service - the call boundary used by the API layer and external collaborators.
//!
//! The service owns the storage handle it was constructed with and checks what the acting
//! role may do before delegating to `core`. The identity provider is trusted: the service
//! never re-authenticates, it only dispatches on the `(user_id, role)` pair.

use crate::{
    core::{archive, availability, booking, enrollment, users},
    entities::{
        Role, availability as slot, booking as booking_entity, class_metadata,
        student_enrollment,
    },
    errors::{Error, Result},
    identity::Actor,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sea_orm::DatabaseConnection;
use tracing::warn;

/// Role-checked entry point to the scheduling core.
#[derive(Clone)]
pub struct SchedulingService {
    db: DatabaseConnection,
}

impl SchedulingService {
    /// Creates a service over an injected database handle.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The underlying storage handle.
    #[must_use]
    pub const fn database(&self) -> &DatabaseConnection {
        &self.db
    }

    fn forbidden(actor: Actor, action: &'static str) -> Error {
        warn!(user_id = actor.user_id, role = ?actor.role, action, "Forbidden");
        Error::Forbidden {
            user_id: actor.user_id,
            role: actor.role,
            action,
        }
    }

    async fn ensure_active(&self, actor: Actor, action: &'static str) -> Result<()> {
        let user = users::get_user(&self.db, actor.user_id).await?;
        if user.is_active {
            Ok(())
        } else {
            Err(Self::forbidden(actor, action))
        }
    }

    /// Teacher profile id of a TEACHER actor.
    async fn own_teacher_id(&self, actor: Actor) -> Result<i64> {
        Ok(users::teacher_profile_for_user(&self.db, actor.user_id)
            .await?
            .id)
    }

    /// Publishes a slot. Teachers publish for themselves; admins for anyone.
    pub async fn publish_availability(
        &self,
        actor: Actor,
        teacher_id: i64,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<slot::Model> {
        const ACTION: &str = "publish availability";
        self.ensure_active(actor, ACTION).await?;
        match actor.role {
            Role::Admin => {}
            Role::Teacher => {
                if self.own_teacher_id(actor).await? != teacher_id {
                    return Err(Self::forbidden(actor, ACTION));
                }
            }
            Role::User => return Err(Self::forbidden(actor, ACTION)),
        }
        availability::publish(&self.db, teacher_id, date, start_time, end_time).await
    }

    /// Withdraws a free slot. Teachers withdraw their own slots; admins any slot.
    pub async fn withdraw_availability(&self, actor: Actor, availability_id: i64) -> Result<()> {
        const ACTION: &str = "withdraw availability";
        self.ensure_active(actor, ACTION).await?;
        match actor.role {
            Role::Admin => {}
            Role::Teacher => {
                let slot = availability::get_slot(&self.db, availability_id).await?;
                if self.own_teacher_id(actor).await? != slot.teacher_id {
                    return Err(Self::forbidden(actor, ACTION));
                }
            }
            Role::User => return Err(Self::forbidden(actor, ACTION)),
        }
        availability::withdraw(&self.db, availability_id).await
    }

    /// Free slots of a teacher from a date on. Open to every role.
    pub async fn free_slots(&self, teacher_id: i64, from: NaiveDate) -> Result<Vec<slot::Model>> {
        availability::free_slots(&self.db, teacher_id, from).await
    }

    /// Books a slot. Students book for themselves; admins on behalf of any student.
    pub async fn create_booking(
        &self,
        actor: Actor,
        student_id: i64,
        availability_id: i64,
        package_id: i64,
        scheduled_at: DateTime<Utc>,
        duration: i32,
    ) -> Result<booking_entity::Model> {
        const ACTION: &str = "create a booking";
        self.ensure_active(actor, ACTION).await?;
        let allowed = match actor.role {
            Role::Admin => true,
            Role::User => actor.user_id == student_id,
            Role::Teacher => false,
        };
        if !allowed {
            return Err(Self::forbidden(actor, ACTION));
        }
        booking::create_booking(
            &self.db,
            student_id,
            availability_id,
            package_id,
            scheduled_at,
            duration,
        )
        .await
    }

    /// Payment-success hook. Only the ADMIN role (payment processor) may confirm.
    pub async fn confirm_booking(
        &self,
        actor: Actor,
        booking_id: i64,
    ) -> Result<booking_entity::Model> {
        self.require_admin(actor, "confirm a booking").await?;
        booking::confirm_booking(&self.db, booking_id).await
    }

    /// Payment-failure hook. Only the ADMIN role (payment processor) may report it.
    pub async fn record_payment_failure(
        &self,
        actor: Actor,
        booking_id: i64,
    ) -> Result<booking_entity::Model> {
        self.require_admin(actor, "record a payment failure").await?;
        booking::record_payment_failure(&self.db, booking_id).await
    }

    /// Cancels a booking. Allowed for admins, the booking's student and its teacher.
    pub async fn cancel_booking(
        &self,
        actor: Actor,
        booking_id: i64,
        reason: &str,
    ) -> Result<booking_entity::Model> {
        const ACTION: &str = "cancel this booking";
        self.ensure_active(actor, ACTION).await?;
        let existing = booking::get_booking(&self.db, booking_id).await?;
        let allowed = match actor.role {
            Role::Admin => true,
            Role::User => existing.user_id == actor.user_id,
            Role::Teacher => self.own_teacher_id(actor).await? == existing.teacher_id,
        };
        if !allowed {
            return Err(Self::forbidden(actor, ACTION));
        }
        booking::cancel_booking(&self.db, booking_id, reason).await
    }

    /// Completes a booking after its class ended. ADMIN only (the scheduler acts as admin).
    pub async fn complete_booking(
        &self,
        actor: Actor,
        booking_id: i64,
    ) -> Result<class_metadata::Model> {
        self.require_admin(actor, "complete a booking").await?;
        booking::complete_booking(&self.db, booking_id).await
    }

    /// A student's usable enrollment for a package. Students see their own; admins any.
    pub async fn find_active_enrollment(
        &self,
        actor: Actor,
        student_id: i64,
        package_id: i64,
    ) -> Result<Option<student_enrollment::Model>> {
        const ACTION: &str = "view enrollments";
        let allowed = match actor.role {
            Role::Admin => true,
            Role::User => actor.user_id == student_id,
            Role::Teacher => false,
        };
        if !allowed {
            return Err(Self::forbidden(actor, ACTION));
        }
        let Some(profile) = users::student_profile_for_user(&self.db, student_id).await? else {
            return Ok(None);
        };
        enrollment::find_active_for(&self.db, profile.id, package_id).await
    }

    /// Class history visible to the actor: a student's attended classes or a teacher's
    /// given classes. Admins have no personal history.
    pub async fn my_history(&self, actor: Actor) -> Result<Vec<class_metadata::Model>> {
        match actor.role {
            Role::User => archive::history_for_student(&self.db, actor.user_id).await,
            Role::Teacher => {
                let teacher_id = self.own_teacher_id(actor).await?;
                archive::history_for_teacher(&self.db, teacher_id).await
            }
            Role::Admin => Ok(Vec::new()),
        }
    }

    async fn require_admin(&self, actor: Actor, action: &'static str) -> Result<()> {
        self.ensure_active(actor, action).await?;
        if actor.role == Role::Admin {
            Ok(())
        } else {
            Err(Self::forbidden(actor, action))
        }
    }
}
