//! Read-only views over stored profiles and matching preferences.
//!
//! Profile editing lives in a separate surface; this core only reads the
//! hashes it finds. Missing or unparseable fields degrade to "unset", which
//! the compatibility rules treat conservatively (an unset gender satisfies
//! only an `Any` filter).

use crate::Uid;
use crate::store::{Store, StoreError, keys};
use std::collections::HashMap;

/// Profile gender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "male" | "m" => Some(Self::Male),
            "female" | "f" => Some(Self::Female),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        }
    }
}

/// A user profile as shown on match. All fields optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    pub nickname: Option<String>,
    pub gender: Option<Gender>,
    pub country: Option<String>,
}

impl Profile {
    pub fn from_hash(hash: &HashMap<String, String>) -> Self {
        Self {
            nickname: hash.get("nickname").cloned().filter(|v| !v.is_empty()),
            gender: hash.get("gender").and_then(|raw| Gender::parse(raw)),
            country: hash.get("country").cloned().filter(|v| !v.is_empty()),
        }
    }

    /// The anonymous card shown to the partner: nickname, gender, country.
    pub fn card(&self) -> String {
        let nickname = self.nickname.as_deref().unwrap_or("Anonymous");
        let gender = self.gender.map(Gender::label).unwrap_or("not set");
        let country = self.country.as_deref().unwrap_or("not set");
        format!("👤 {nickname}\nGender: {gender}\nCountry: {country}")
    }
}

/// Gender preference filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenderFilter {
    #[default]
    Any,
    Male,
    Female,
}

impl GenderFilter {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "male" | "m" => Self::Male,
            "female" | "f" => Self::Female,
            _ => Self::Any,
        }
    }

    /// Whether a candidate's gender satisfies this filter. An unset gender
    /// satisfies only `Any`.
    pub fn accepts(self, gender: Option<Gender>) -> bool {
        match self {
            Self::Any => true,
            Self::Male => gender == Some(Gender::Male),
            Self::Female => gender == Some(Gender::Female),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Male => "male",
            Self::Female => "female",
        }
    }
}

/// Matching preferences. Defaults to `Any`/`Any` when unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preferences {
    pub gender_filter: GenderFilter,
    /// `None` means any country.
    pub country_filter: Option<String>,
}

impl Preferences {
    pub fn from_hash(hash: &HashMap<String, String>) -> Self {
        let country_filter = hash
            .get("country_filter")
            .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("any"))
            .cloned();
        Self {
            gender_filter: hash
                .get("gender_filter")
                .map(|raw| GenderFilter::parse(raw))
                .unwrap_or_default(),
            country_filter,
        }
    }

    /// Whether a candidate's country satisfies this filter.
    pub fn accepts_country(&self, country: Option<&str>) -> bool {
        match &self.country_filter {
            None => true,
            Some(wanted) => country.is_some_and(|c| c.eq_ignore_ascii_case(wanted)),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Gender filter: {}\nCountry filter: {}",
            self.gender_filter.label(),
            self.country_filter.as_deref().unwrap_or("any")
        )
    }
}

/// Read-only accessor over the stored profile and preference hashes.
#[derive(Clone)]
pub struct ProfileStore {
    store: Store,
}

impl ProfileStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn profile(&self, uid: Uid) -> Result<Profile, StoreError> {
        let hash = self.store.hgetall(&keys::profile(uid)).await?;
        Ok(Profile::from_hash(&hash))
    }

    pub async fn preferences(&self, uid: Uid) -> Result<Preferences, StoreError> {
        let hash = self.store.hgetall(&keys::preferences(uid)).await?;
        Ok(Preferences::from_hash(&hash))
    }
}
