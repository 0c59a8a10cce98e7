//! Single-row CMS sections shown on the public site.
//!
//! Each section has a row type (what is stored and served), a patch type
//! (what an admin may change; absent fields are left alone) and a literal
//! default payload served while the table is still empty.

use chrono::{Datelike, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::FieldErrors;
use crate::schema::{cms_about, cms_contact, cms_footer, cms_get_in_touch, cms_hero, cms_logo, cms_membership};
use crate::validation::is_valid_email;

pub trait Section: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static {
    /// Path segment under `/api/cms/` and the key used by the in-memory store.
    const NAME: &'static str;

    /// Responses for this section must not be cached by the browser.
    const NO_STORE: bool = false;

    type Patch: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    fn defaults() -> Value;

    fn validate(_patch: &Self::Patch) -> Result<(), FieldErrors> {
        Ok(())
    }
}

fn reject_blank(errors: &mut FieldErrors, field: &str, value: Option<&String>) {
    if value.is_some_and(|v| v.trim().is_empty()) {
        errors.add(field, format!("{} cannot be empty", field));
    }
}

fn check_email(errors: &mut FieldErrors, value: Option<&String>) {
    if let Some(email) = value.map(|e| e.trim()).filter(|e| !e.is_empty()) {
        if !is_valid_email(email) {
            errors.add("email", "Invalid email format");
        }
    }
}

// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = cms_about)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(default)]
pub struct About {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub button_text: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, AsChangeset)]
#[diesel(table_name = cms_about)]
#[serde(deny_unknown_fields)]
pub struct AboutPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button_text: Option<String>,
}

impl Section for About {
    const NAME: &'static str = "about";
    type Patch = AboutPatch;

    fn defaults() -> Value {
        json!({
            "id": "default",
            "title": "About Us",
            "description": "The Mercedes-Benz W205CI Club is more than a club...",
            "button_text": "Learn More",
        })
    }

    fn validate(patch: &AboutPatch) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        reject_blank(&mut errors, "title", patch.title.as_ref());
        errors.into_result()
    }
}

// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = cms_contact)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(default)]
pub struct ContactDetails {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub phone: String,
    pub email: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, AsChangeset)]
#[diesel(table_name = cms_contact)]
#[serde(deny_unknown_fields)]
pub struct ContactDetailsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Section for ContactDetails {
    const NAME: &'static str = "contact";
    type Patch = ContactDetailsPatch;

    fn defaults() -> Value {
        json!({
            "id": "default",
            "title": "Get in Touch",
            "description": "Our friendly team would love to hear from you. Send us a message anytime.",
            "phone": "+62 XXX XXXX XXXX",
            "email": "info@mbw205ci.com",
        })
    }

    fn validate(patch: &ContactDetailsPatch) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        reject_blank(&mut errors, "title", patch.title.as_ref());
        check_email(&mut errors, patch.email.as_ref());
        errors.into_result()
    }
}

// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = cms_hero)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(default)]
pub struct Hero {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub button_text: String,
    pub background_image_url: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, AsChangeset)]
#[diesel(table_name = cms_hero)]
#[serde(deny_unknown_fields)]
pub struct HeroPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_image_url: Option<String>,
}

impl Section for Hero {
    const NAME: &'static str = "hero";
    const NO_STORE: bool = true;
    type Patch = HeroPatch;

    fn defaults() -> Value {
        json!({
            "id": "default",
            "title": "Your Journey with MBW205CI Starts Here",
            "description": "Register now to become part of an exclusive community of Mercedes Benz W205 owners in Indonesia. More than a club, MBW205CI is a family built on passion, solidarity, and premium lifestyle.",
            "button_text": "Continue Registration →",
            "background_image_url": "",
        })
    }

    /// The hero banner is never saved without its headline and copy.
    fn validate(patch: &HeroPatch) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("title", patch.title.as_deref(), "Title is required");
        errors.require("description", patch.description.as_deref(), "Description is required");
        errors.into_result()
    }
}

// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = cms_footer)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(default)]
pub struct Footer {
    pub id: i32,
    pub company_name: String,
    pub description: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub copyright_year: i32,
    pub copyright_text: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, AsChangeset)]
#[diesel(table_name = cms_footer)]
#[serde(deny_unknown_fields)]
pub struct FooterPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright_text: Option<String>,
}

impl Section for Footer {
    const NAME: &'static str = "footer";
    type Patch = FooterPatch;

    fn defaults() -> Value {
        json!({
            "id": "default",
            "company_name": "Mercedes-Benz W205CI Club Indonesia",
            "description": "Your Ultimate Community for W205CI Enthusiasts",
            "phone": "+62 123 456 7890",
            "email": "contact@mbw205ci.id",
            "address": "Indonesia",
            "copyright_year": Utc::now().year(),
            "copyright_text": "Mercedes-Benz W205CI Club Indonesia. All rights reserved.",
        })
    }

    fn validate(patch: &FooterPatch) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        reject_blank(&mut errors, "company_name", patch.company_name.as_ref());
        check_email(&mut errors, patch.email.as_ref());
        if patch.copyright_year.is_some_and(|y| !(1900..=9999).contains(&y)) {
            errors.add("copyright_year", "Copyright year is out of range");
        }
        errors.into_result()
    }
}

// ---------------------------------------------------------------------------

/// Stored as `logo_*` columns, served as `text`, `subtext` and `image_url`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = cms_logo)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(default)]
pub struct Logo {
    pub id: i32,
    #[serde(rename = "text")]
    pub logo_text: String,
    #[serde(rename = "subtext")]
    pub logo_subtext: String,
    #[serde(rename = "image_url")]
    pub logo_image_url: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, AsChangeset)]
#[diesel(table_name = cms_logo)]
#[serde(deny_unknown_fields)]
pub struct LogoPatch {
    #[serde(rename = "text", skip_serializing_if = "Option::is_none")]
    pub logo_text: Option<String>,
    #[serde(rename = "subtext", skip_serializing_if = "Option::is_none")]
    pub logo_subtext: Option<String>,
    #[serde(rename = "image_url", skip_serializing_if = "Option::is_none")]
    pub logo_image_url: Option<String>,
}

impl Section for Logo {
    const NAME: &'static str = "logo";
    type Patch = LogoPatch;

    fn defaults() -> Value {
        json!({
            "id": "default",
            "text": "MBW205 Indonesia",
            "subtext": "Club Indonesia",
            "image_url": "/logo.png",
        })
    }
}

// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MembershipStat {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = cms_membership)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(default)]
pub struct Membership {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub stats: Value,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Default for Membership {
    fn default() -> Self {
        Self {
            id: 0,
            title: String::new(),
            description: String::new(),
            stats: Value::Array(Vec::new()),
            created_at: NaiveDateTime::default(),
            updated_at: NaiveDateTime::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, AsChangeset)]
#[diesel(table_name = cms_membership)]
#[serde(deny_unknown_fields)]
pub struct MembershipPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<Value>,
}

impl Section for Membership {
    const NAME: &'static str = "membership";
    type Patch = MembershipPatch;

    fn defaults() -> Value {
        json!({
            "id": "default",
            "title": "Join the Brotherhood",
            "description": "Be part of an exclusive circle of W205CI enthusiasts",
            "stats": [
                { "label": "Member Club", "value": "120+" },
                { "label": "Events Club", "value": "64+" },
                { "label": "Partner W205CI", "value": "20+" },
            ],
        })
    }

    fn validate(patch: &MembershipPatch) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        reject_blank(&mut errors, "title", patch.title.as_ref());
        if let Some(stats) = &patch.stats {
            if serde_json::from_value::<Vec<MembershipStat>>(stats.clone()).is_err() {
                errors.add("stats", "Stats must be a list of {label, value} pairs");
            }
        }
        errors.into_result()
    }
}

// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = cms_get_in_touch)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(default)]
pub struct GetInTouch {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub button_text: String,
    pub button_url: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, AsChangeset)]
#[diesel(table_name = cms_get_in_touch)]
#[serde(deny_unknown_fields)]
pub struct GetInTouchPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button_url: Option<String>,
}

impl Section for GetInTouch {
    const NAME: &'static str = "get-in-touch";
    type Patch = GetInTouchPatch;

    fn defaults() -> Value {
        json!({
            "id": "default",
            "title": "Get In Touch",
            "description": "Have a question about the club or upcoming events? Reach out and our team will get back to you.",
            "button_text": "Contact Us",
            "button_url": "#contact",
        })
    }

    fn validate(patch: &GetInTouchPatch) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        reject_blank(&mut errors, "title", patch.title.as_ref());
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_default_sentinel<T: Section>() {
        let defaults = T::defaults();
        assert_eq!(defaults["id"], "default", "{} defaults lack the sentinel id", T::NAME);
        for stamp in ["created_at", "updated_at"] {
            assert!(defaults.get(stamp).is_none(), "{} defaults carry {}", T::NAME, stamp);
        }
    }

    #[test]
    fn section_defaults_share_one_shape() {
        assert_default_sentinel::<About>();
        assert_default_sentinel::<ContactDetails>();
        assert_default_sentinel::<Hero>();
        assert_default_sentinel::<Footer>();
        assert_default_sentinel::<Logo>();
        assert_default_sentinel::<Membership>();
        assert_default_sentinel::<GetInTouch>();
    }

    #[test]
    fn footer_default_uses_current_year() {
        assert_eq!(Footer::defaults()["copyright_year"], json!(Utc::now().year()));
    }

    #[test]
    fn logo_serializes_with_public_field_names() {
        let logo = Logo {
            logo_text: "MBW205".into(),
            ..Logo::default()
        };
        let value = serde_json::to_value(&logo).unwrap();
        assert_eq!(value["text"], "MBW205");
        assert!(value.get("logo_text").is_none());
    }

    #[test]
    fn hero_requires_title_and_description() {
        let patch = HeroPatch {
            title: Some("New headline".into()),
            ..HeroPatch::default()
        };
        let errors = Hero::validate(&patch).unwrap_err();
        assert!(errors.get("description").is_some());
    }

    #[test]
    fn membership_stats_must_be_label_value_pairs() {
        let good = MembershipPatch {
            stats: Some(json!([{ "label": "Members", "value": "150+" }])),
            ..MembershipPatch::default()
        };
        assert!(Membership::validate(&good).is_ok());

        let bad = MembershipPatch {
            stats: Some(json!({ "members": 150 })),
            ..MembershipPatch::default()
        };
        assert!(Membership::validate(&bad).is_err());
    }

    #[test]
    fn patches_reject_unknown_keys() {
        let parsed = serde_json::from_value::<AboutPatch>(json!({ "title": "x", "subtitle": "y" }));
        assert!(parsed.is_err());
    }
}
