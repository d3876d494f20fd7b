use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The level of access a user has. The hierarchy is cumulative: every
/// submitter privilege is held by curators, every curator privilege by
/// admins.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Basic,
    Submitter,
    Curator,
    Admin,
}

super::text_enum!(UserRole, {
    UserRole::Basic => "basic",
    UserRole::Submitter => "submitter",
    UserRole::Curator => "curator",
    UserRole::Admin => "admin",
});

impl UserRole {
    /// Submitters and above may submit happenings and scrape urls.
    pub fn is_submitter(&self) -> bool {
        *self >= Self::Submitter
    }

    /// Curators and above may moderate happenings and flags.
    pub fn is_curator(&self) -> bool {
        *self >= Self::Curator
    }

    pub fn is_admin(&self) -> bool {
        *self == Self::Admin
    }
}

#[derive(Debug, Clone, Default, sqlx::FromRow, serde::Serialize)]
pub struct UserProfile {
    /// The unique identifier for the user.
    pub id: Uuid,
    /// The email the user signs in with.
    pub email: String,
    /// The hashed password of the user. (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// The role of the user.
    pub role: UserRole,
    /// The time the user was created.
    pub created_at: DateTime<Utc>,
    /// The time the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Uses argon2 to verify the password hash against the provided password.
    pub fn verify_password(&self, password: &str) -> bool {
        let hash = match PasswordHash::new(&self.password_hash) {
            Ok(hash) => hash,
            Err(err) => {
                tracing::error!("failed to parse password hash: {}", err);
                return false;
            }
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok()
    }

    /// Generates a new password hash using argon2.
    pub fn hash_password(password: &str) -> String {
        let salt = SaltString::generate(&mut OsRng);

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .expect("failed to hash password")
            .to_string()
    }
}
