//! User registration and profile lookups.
//!
//! Every TEACHER user owns exactly one teacher profile and every USER user exactly one
//! student profile; both are created in the same transaction as the user row.

use crate::{
    entities::{
        Role, StudentProfile, TeacherProfile, User, student_profile, teacher_profile, user,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{Set, TransactionTrait, prelude::*};
use tracing::info;

/// Registers a user and creates the profile matching its role.
///
/// Returns the user together with the id of the created profile (`None` for admins).
pub async fn register_user(
    db: &DatabaseConnection,
    username: &str,
    email: &str,
    first_name: &str,
    last_name: &str,
    role: Role,
) -> Result<(user::Model, Option<i64>)> {
    let username = username.trim();
    if username.is_empty() {
        return Err(Error::validation("Username cannot be empty"));
    }

    let txn = db.begin().await?;

    let taken = User::find()
        .filter(user::Column::Username.eq(username))
        .one(&txn)
        .await?;
    if taken.is_some() {
        return Err(Error::validation(format!("Username '{username}' is taken")));
    }

    let now = Utc::now();
    let user = user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(email.trim().to_string()),
        first_name: Set(first_name.to_string()),
        last_name: Set(last_name.to_string()),
        role: Set(role),
        is_active: Set(true),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let profile_id = match role {
        Role::Teacher => {
            let profile = teacher_profile::ActiveModel {
                user_id: Set(user.id),
                bio: Set(None),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            Some(profile.id)
        }
        Role::User => {
            let profile = student_profile::ActiveModel {
                user_id: Set(user.id),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            Some(profile.id)
        }
        Role::Admin => None,
    };

    txn.commit().await?;
    info!(user_id = user.id, ?role, "Registered user '{}'", user.username);
    Ok((user, profile_id))
}

/// Finds a user by id.
pub async fn get_user<C>(db: &C, user_id: i64) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(Error::UserNotFound { id: user_id })
}

/// Marks a user inactive. History is kept; the user can no longer act.
pub async fn deactivate_user(db: &DatabaseConnection, user_id: i64) -> Result<user::Model> {
    let user = get_user(db, user_id).await?;
    let mut active: user::ActiveModel = user.into();
    active.is_active = Set(false);
    let user = active.update(db).await?;
    info!(user_id, "Deactivated user");
    Ok(user)
}

/// Teacher profile owned by `user_id`.
pub async fn teacher_profile_for_user<C>(db: &C, user_id: i64) -> Result<teacher_profile::Model>
where
    C: ConnectionTrait,
{
    TeacherProfile::find()
        .filter(teacher_profile::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or(Error::ProfileNotFound {
            kind: "teacher",
            user_id,
        })
}

/// Student profile owned by `user_id`, if the user is a student.
pub async fn student_profile_for_user<C>(
    db: &C,
    user_id: i64,
) -> Result<Option<student_profile::Model>>
where
    C: ConnectionTrait,
{
    StudentProfile::find()
        .filter(student_profile::Column::UserId.eq(user_id))
        .one(db)
        .await
        .map_err(Into::into)
}
