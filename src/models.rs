use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

use chrono::NaiveDateTime;
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};

use crate::errors::FieldErrors;
use crate::schema::{
    admin_sessions, admin_users, cms_benefits, cms_social_media, contact_messages, event_registrations, events,
    gallery, members,
};
use crate::validation::{is_valid_email, is_valid_license_plate, is_valid_phone, non_blank, normalize_email};

// ---------------------------------------------------------------------------
// Admin accounts and sessions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = admin_users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AdminAccount {
    pub id: i32,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: Option<String>,
    pub is_active: bool,
    pub last_login: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = admin_users)]
pub struct NewAdminAccount {
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub is_active: bool,
}

/// The part of an account that is safe to hand back to the browser.
#[derive(Debug, Clone, Serialize)]
pub struct AdminProfile {
    pub id: i32,
    pub email: String,
    pub name: Option<String>,
}

impl From<&AdminAccount> for AdminProfile {
    fn from(account: &AdminAccount) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            name: account.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = admin_sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Session {
    pub id: i32,
    pub admin_id: i32,
    pub session_token: String,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

impl Session {
    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = admin_sessions)]
pub struct NewSession {
    pub admin_id: i32,
    pub session_token: String,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Pending,
    Approved,
    Rejected,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Pending => "pending",
            MemberStatus::Approved => "approved",
            MemberStatus::Rejected => "rejected",
        }
    }

    /// Approval and rejection are both final.
    pub fn can_transition_to(&self, next: MemberStatus) -> bool {
        *self == MemberStatus::Pending && next != MemberStatus::Pending
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MemberStatus::Pending),
            "approved" => Ok(MemberStatus::Approved),
            "rejected" => Ok(MemberStatus::Rejected),
            other => Err(format!("unknown member status '{}'", other)),
        }
    }
}

impl ToSql<Text, Pg> for MemberStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for MemberStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let raw = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        Ok(raw.parse()?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = members)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Member {
    pub id: i32,
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub city: String,
    pub car_variant: String,
    pub year_car: String,
    pub license_plate: String,
    pub photo_url: Option<String>,
    pub status: MemberStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = members)]
pub struct NewMember {
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub city: String,
    pub car_variant: String,
    pub year_car: String,
    pub license_plate: String,
    pub photo_url: Option<String>,
    pub status: MemberStatus,
}

impl NewMember {
    /// Builds a pending member from the registration form's text fields.
    pub fn from_form(fields: &HashMap<String, String>) -> Result<Self, FieldErrors> {
        let get = |key: &str| non_blank(fields.get(key).map(String::as_str));
        let mut errors = FieldErrors::new();

        let full_name = get("full_name");
        let email = get("email");
        let phone_number = get("phone_number");
        let city = get("city");
        let car_variant = get("car_variant");
        let year_car = get("year_car");
        let license_plate = get("license_plate");

        errors.require("full_name", full_name.as_deref(), "Full name is required");
        errors.require("email", email.as_deref(), "Email is required");
        errors.require("phone_number", phone_number.as_deref(), "Phone number is required");
        errors.require("city", city.as_deref(), "City is required");
        errors.require("car_variant", car_variant.as_deref(), "Car variant is required");
        errors.require("year_car", year_car.as_deref(), "Car year is required");
        errors.require("license_plate", license_plate.as_deref(), "License plate is required");

        if let Some(email) = email.as_deref() {
            if !is_valid_email(email) {
                errors.add("email", "Invalid email format");
            }
        }
        if let Some(phone) = phone_number.as_deref() {
            if !is_valid_phone(phone) {
                errors.add("phone_number", "Invalid phone number format");
            }
        }
        if let Some(plate) = license_plate.as_deref() {
            if !is_valid_license_plate(plate) {
                errors.add("license_plate", "License plate must be at most 20 characters");
            }
        }
        if let Some(year) = year_car.as_deref() {
            if year.parse::<u16>().is_err() {
                errors.add("year_car", "Car year must be a number");
            }
        }

        errors.into_result()?;

        // every field was checked above
        let take = |v: Option<String>| v.unwrap_or_default();
        Ok(Self {
            full_name: take(full_name),
            email: normalize_email(&take(email)),
            phone_number: take(phone_number),
            city: take(city),
            car_variant: take(car_variant),
            year_car: take(year_car),
            license_plate: take(license_plate),
            photo_url: None,
            status: MemberStatus::Pending,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemberFilter {
    pub status: Option<MemberStatus>,
    pub search: Option<String>,
    pub created_from: Option<NaiveDateTime>,
    /// Exclusive upper bound.
    pub created_before: Option<NaiveDateTime>,
    pub include_deleted: bool,
}

impl MemberFilter {
    pub fn matches(&self, member: &Member) -> bool {
        if !self.include_deleted && member.deleted_at.is_some() {
            return false;
        }
        if self.status.is_some_and(|s| s != member.status) {
            return false;
        }
        if self.created_from.is_some_and(|from| member.created_at < from) {
            return false;
        }
        if self.created_before.is_some_and(|until| member.created_at >= until) {
            return false;
        }
        match self.search.as_deref() {
            Some(term) => {
                let term = term.to_lowercase();
                [&member.full_name, &member.email, &member.license_plate]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&term))
            }
            None => true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberStats {
    pub total_members: i64,
    pub pending_approvals: i64,
    pub approved_members: i64,
    pub recent: Vec<Member>,
}

// ---------------------------------------------------------------------------
// Events and registrations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Event {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub header_image: Option<String>,
    pub event_time: Option<String>,
    pub location: Option<String>,
    pub status: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize, Insertable)]
#[diesel(table_name = events)]
#[serde(deny_unknown_fields)]
pub struct NewEvent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    pub header_image: Option<String>,
    pub event_time: Option<String>,
    pub location: Option<String>,
    pub status: Option<String>,
}

impl NewEvent {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("title", Some(&self.title), "Title is required");
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, AsChangeset)]
#[diesel(table_name = events)]
#[serde(deny_unknown_fields)]
pub struct EventPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl EventPatch {
    pub fn header_image(url: impl Into<String>) -> Self {
        Self {
            header_image: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            errors.add("title", "Title cannot be empty");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = event_registrations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EventRegistration {
    pub id: i32,
    pub event_id: i32,
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub message: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize, Insertable)]
#[diesel(table_name = event_registrations)]
#[serde(deny_unknown_fields)]
pub struct NewEventRegistration {
    #[serde(default)]
    pub event_id: i32,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
    pub message: Option<String>,
}

impl NewEventRegistration {
    /// Validates and normalizes in place.
    pub fn validate(&mut self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.event_id <= 0 {
            errors.add("event_id", "Event is required");
        }
        errors.require("full_name", Some(&self.full_name), "Full name is required");
        errors.require("email", Some(&self.email), "Email is required");
        errors.require("phone_number", Some(&self.phone_number), "Phone number is required");
        if !self.email.trim().is_empty() && !is_valid_email(self.email.trim()) {
            errors.add("email", "Invalid email format");
        }
        errors.into_result()?;

        self.full_name = self.full_name.trim().to_string();
        self.email = normalize_email(&self.email);
        self.phone_number = self.phone_number.trim().to_string();
        self.message = non_blank(self.message.as_deref());
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventRegistrationView {
    #[serde(flatten)]
    pub registration: EventRegistration,
    pub event_title: Option<String>,
}

// ---------------------------------------------------------------------------
// Contact messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = contact_messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ContactMessage {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub message: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize, Insertable)]
#[diesel(table_name = contact_messages)]
pub struct NewContactMessage {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
}

impl NewContactMessage {
    pub fn validate(&mut self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("first_name", Some(&self.first_name), "First name is required");
        errors.require("last_name", Some(&self.last_name), "Last name is required");
        errors.require("message", Some(&self.message), "Message is required");
        if self.email.trim().is_empty() {
            errors.add("email", "Email is required");
        } else if !is_valid_email(self.email.trim()) {
            errors.add("email", "Invalid email format");
        }
        errors.into_result()?;

        self.first_name = self.first_name.trim().to_string();
        self.last_name = self.last_name.trim().to_string();
        self.email = normalize_email(&self.email);
        self.message = self.message.trim().to_string();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// List sections: benefits, social media, gallery
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = cms_benefits)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Benefit {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub icon_type: String,
    pub sort_order: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize, Insertable)]
#[diesel(table_name = cms_benefits)]
#[serde(deny_unknown_fields)]
pub struct NewBenefit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon_type: String,
    pub sort_order: Option<i32>,
}

impl NewBenefit {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("title", Some(&self.title), "Title is required");
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, AsChangeset)]
#[diesel(table_name = cms_benefits)]
#[serde(deny_unknown_fields)]
pub struct BenefitPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = cms_social_media)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SocialLink {
    pub id: i32,
    pub platform: String,
    pub url: String,
    pub icon_type: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Body of the social media upsert; `platform` is the natural key.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SocialLinkInput {
    pub id: Option<serde_json::Value>,
    pub platform: Option<String>,
    pub url: Option<String>,
    pub icon_type: Option<String>,
    pub created_at: Option<serde_json::Value>,
    pub updated_at: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = cms_social_media)]
pub struct NewSocialLink {
    pub platform: String,
    pub url: String,
    pub icon_type: String,
}

impl SocialLinkInput {
    pub fn into_new(self) -> Result<NewSocialLink, FieldErrors> {
        let platform = non_blank(self.platform.as_deref()).map(|p| p.to_lowercase());
        let url = non_blank(self.url.as_deref());

        let mut errors = FieldErrors::new();
        errors.require("platform", platform.as_deref(), "Platform is required");
        errors.require("url", url.as_deref(), "URL is required");
        errors.into_result()?;

        let platform = platform.unwrap_or_default();
        let icon_type = non_blank(self.icon_type.as_deref()).unwrap_or_else(|| platform.clone());
        Ok(NewSocialLink {
            platform,
            url: url.unwrap_or_default(),
            icon_type,
        })
    }
}

/// Edit of an existing link, addressed by id. Renaming the platform is allowed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, AsChangeset)]
#[diesel(table_name = cms_social_media)]
#[serde(deny_unknown_fields)]
pub struct SocialLinkPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_type: Option<String>,
}

impl SocialLinkPatch {
    /// Trims every field and lower-cases the platform. Fields that are sent
    /// must not be blank.
    pub fn normalize(&mut self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if let Some(platform) = self.platform.as_mut() {
            *platform = platform.trim().to_lowercase();
            if platform.is_empty() {
                errors.add("platform", "Platform cannot be empty");
            }
        }
        if let Some(url) = self.url.as_mut() {
            *url = url.trim().to_string();
            if url.is_empty() {
                errors.add("url", "URL cannot be empty");
            }
        }
        self.icon_type = non_blank(self.icon_type.as_deref());
        errors.into_result()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = gallery)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct GalleryItem {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub sort_order: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// `sort_order` is assigned by the store.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewGalleryItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
}

impl NewGalleryItem {
    pub fn validate(&mut self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("image_url", Some(&self.image_url), "Image URL is required");
        errors.into_result()?;

        self.image_url = self.image_url.trim().to_string();
        if self.title.trim().is_empty() {
            self.title = "Untitled".to_string();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, AsChangeset)]
#[diesel(table_name = gallery)]
#[serde(deny_unknown_fields)]
pub struct GalleryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i32>,
}
