//! User profile repository.
//!
//! # Responsibility
//! - Register owners and persist their editable profile fields.
//!
//! # Invariants
//! - Emails are stored normalized; lookups normalize their input too.
//! - Registration never overwrites an existing user.

use crate::db::ensure_schema_ready;
use crate::model::user::{normalize_email, ProfileUpdate, UserProfile};
use crate::repo::item_store::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};

/// Repository interface for user profiles.
pub trait UserRepository {
    fn register_user(&self, profile: &UserProfile) -> RepoResult<()>;
    fn get_user(&self, email: &str) -> RepoResult<Option<UserProfile>>;
    /// Applies `update` and returns the stored profile.
    fn update_profile(&self, email: &str, update: &ProfileUpdate) -> RepoResult<UserProfile>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn register_user(&self, profile: &UserProfile) -> RepoResult<()> {
        let mut profile = profile.clone();
        profile.email = normalize_email(&profile.email);
        profile.validate()?;

        if self.get_user(&profile.email)?.is_some() {
            return Err(RepoError::DuplicateUser(profile.email));
        }

        self.conn.execute(
            "INSERT INTO users (email, name, about_me, bio, profile_pic)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                profile.email.as_str(),
                profile.name.trim(),
                profile.about_me.as_str(),
                profile.bio.as_str(),
                profile.profile_pic.as_deref(),
            ],
        )?;
        Ok(())
    }

    fn get_user(&self, email: &str) -> RepoResult<Option<UserProfile>> {
        let profile = self
            .conn
            .query_row(
                "SELECT email, name, about_me, bio, profile_pic
                 FROM users
                 WHERE email = ?1;",
                [normalize_email(email)],
                |row| {
                    Ok(UserProfile {
                        email: row.get(0)?,
                        name: row.get(1)?,
                        about_me: row.get(2)?,
                        bio: row.get(3)?,
                        profile_pic: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }

    fn update_profile(&self, email: &str, update: &ProfileUpdate) -> RepoResult<UserProfile> {
        let current = self
            .get_user(email)?
            .ok_or_else(|| RepoError::UserNotFound(normalize_email(email)))?;
        let next = update.apply_to(&current)?;

        self.conn.execute(
            "UPDATE users
             SET
                name = ?2,
                about_me = ?3,
                bio = ?4,
                profile_pic = ?5,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE email = ?1;",
            params![
                next.email.as_str(),
                next.name.as_str(),
                next.about_me.as_str(),
                next.bio.as_str(),
                next.profile_pic.as_deref(),
            ],
        )?;
        Ok(next)
    }
}
