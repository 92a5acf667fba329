//! User profile model.
//!
//! # Responsibility
//! - Define the owner record that scopes every tool and material.
//! - Validate profile fields before registration or update.
//!
//! # Invariants
//! - `email` is the stable scoping key and is stored lower-cased.
//! - `name` is never blank after trim.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// Profile record for one owner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub about_me: String,
    #[serde(default)]
    pub bio: String,
    /// Picture reference (URL or asset path), opaque to core.
    #[serde(default)]
    pub profile_pic: Option<String>,
}

impl UserProfile {
    pub fn new(email: impl AsRef<str>, name: impl Into<String>) -> Self {
        Self {
            email: normalize_email(email.as_ref()),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ProfileValidationError> {
        validate_name(&self.name)?;
        validate_email(&self.email)
    }
}

/// Editable profile fields. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub about_me: Option<String>,
    pub bio: Option<String>,
    pub profile_pic: Option<Option<String>>,
}

impl ProfileUpdate {
    /// Applies the update onto a copy of `profile` and validates the result.
    pub fn apply_to(&self, profile: &UserProfile) -> Result<UserProfile, ProfileValidationError> {
        let mut next = profile.clone();
        if let Some(name) = self.name.as_ref() {
            next.name = name.trim().to_string();
        }
        if let Some(about_me) = self.about_me.as_ref() {
            next.about_me = about_me.clone();
        }
        if let Some(bio) = self.bio.as_ref() {
            next.bio = bio.clone();
        }
        if let Some(profile_pic) = self.profile_pic.as_ref() {
            next.profile_pic = profile_pic.clone();
        }
        next.validate()?;
        Ok(next)
    }
}

/// Lower-cases and trims an email so it can be used as a lookup key.
pub fn normalize_email(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

fn validate_name(name: &str) -> Result<(), ProfileValidationError> {
    if name.trim().is_empty() {
        return Err(ProfileValidationError::NameRequired);
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ProfileValidationError> {
    if email.is_empty() {
        return Err(ProfileValidationError::EmailRequired);
    }
    if !EMAIL_RE.is_match(email) {
        return Err(ProfileValidationError::InvalidEmail(email.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileValidationError {
    NameRequired,
    EmailRequired,
    InvalidEmail(String),
}

impl Display for ProfileValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NameRequired => write!(f, "name is required"),
            Self::EmailRequired => write!(f, "email is required"),
            Self::InvalidEmail(value) => write!(f, "email is invalid: `{value}`"),
        }
    }
}

impl Error for ProfileValidationError {}
