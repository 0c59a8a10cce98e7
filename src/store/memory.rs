use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use serde_json::{json, Value};

use super::{
    AuthStore, ContentStore, EventStore, InboxStore, MemberStore, SchemaStore, SectionStore, StoreError, StoreResult,
};
use crate::models::{
    AdminAccount, Benefit, BenefitPatch, ContactMessage, Event, EventPatch, EventRegistration, EventRegistrationView,
    GalleryItem, GalleryPatch, Member, MemberFilter, MemberStats, MemberStatus, NewAdminAccount, NewBenefit,
    NewContactMessage, NewEvent, NewEventRegistration, NewGalleryItem, NewMember, NewSession, NewSocialLink, Session,
    SocialLink, SocialLinkPatch,
};
use crate::sections::Section;
use crate::validation::normalize_email;

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

fn codec_error(err: serde_json::Error) -> StoreError {
    StoreError::Backend(format!("section row codec: {}", err))
}

fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn duplicate(constraint: &str, column: &str, value: &str) -> StoreError {
    StoreError::UniqueViolation {
        constraint: Some(constraint.to_string()),
        detail: format!("Key ({})=({}) already exists.", column, value),
    }
}

#[derive(Default)]
struct Tables {
    last_id: i32,
    accounts: Vec<AdminAccount>,
    sessions: Vec<Session>,
    members: Vec<Member>,
    events: Vec<Event>,
    registrations: Vec<EventRegistration>,
    messages: Vec<ContactMessage>,
    benefits: Vec<Benefit>,
    social: Vec<SocialLink>,
    gallery: Vec<GalleryItem>,
    sections: HashMap<&'static str, Value>,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }
}

/// Process-local store used by the test suite and by `STORAGE_BACKEND=memory`.
/// Honors the same uniqueness, ordering and state rules as the Postgres store.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails the way an unreachable database would.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn with<T>(&self, op: impl FnOnce(&mut Tables) -> StoreResult<T>) -> StoreResult<T> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("memory store is offline".to_string()));
        }
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))?;
        op(&mut tables)
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<AdminAccount>> {
        let email = normalize_email(email);
        self.with(|t| Ok(t.accounts.iter().find(|a| a.email.to_lowercase() == email).cloned()))
    }

    async fn find_account(&self, id: i32) -> StoreResult<Option<AdminAccount>> {
        self.with(|t| Ok(t.accounts.iter().find(|a| a.id == id).cloned()))
    }

    async fn create_account(&self, account: NewAdminAccount) -> StoreResult<AdminAccount> {
        self.with(|t| {
            if t.accounts.iter().any(|a| a.email.eq_ignore_ascii_case(&account.email)) {
                return Err(duplicate("admin_users_email_key", "email", &account.email));
            }
            let created = AdminAccount {
                id: t.next_id(),
                email: account.email,
                password_hash: account.password_hash,
                name: account.name,
                is_active: account.is_active,
                last_login: None,
                created_at: now(),
            };
            t.accounts.push(created.clone());
            Ok(created)
        })
    }

    async fn record_login(&self, id: i32) -> StoreResult<()> {
        self.with(|t| {
            if let Some(account) = t.accounts.iter_mut().find(|a| a.id == id) {
                account.last_login = Some(now());
            }
            Ok(())
        })
    }

    async fn insert_session(&self, session: NewSession) -> StoreResult<Session> {
        self.with(|t| {
            if !t.accounts.iter().any(|a| a.id == session.admin_id) {
                return Err(StoreError::MissingReference(format!(
                    "Key (admin_id)=({}) is not present in table \"admin_users\".",
                    session.admin_id
                )));
            }
            if t.sessions.iter().any(|s| s.session_token == session.session_token) {
                return Err(duplicate("admin_sessions_session_token_key", "session_token", "..."));
            }
            let created = Session {
                id: t.next_id(),
                admin_id: session.admin_id,
                session_token: session.session_token,
                expires_at: session.expires_at,
                created_at: now(),
            };
            t.sessions.push(created.clone());
            Ok(created)
        })
    }

    async fn find_session(&self, token: &str) -> StoreResult<Option<Session>> {
        self.with(|t| Ok(t.sessions.iter().find(|s| s.session_token == token).cloned()))
    }

    async fn delete_session(&self, token: &str) -> StoreResult<bool> {
        self.with(|t| {
            let before = t.sessions.len();
            t.sessions.retain(|s| s.session_token != token);
            Ok(t.sessions.len() < before)
        })
    }
}

#[async_trait]
impl MemberStore for MemoryStore {
    async fn insert_member(&self, member: NewMember) -> StoreResult<Member> {
        self.with(|t| {
            if t.members.iter().any(|m| m.email == member.email) {
                return Err(duplicate("members_email_key", "email", &member.email));
            }
            if t.members.iter().any(|m| m.license_plate == member.license_plate) {
                return Err(duplicate("members_license_plate_key", "license_plate", &member.license_plate));
            }
            let stamp = now();
            let created = Member {
                id: t.next_id(),
                full_name: member.full_name,
                email: member.email,
                phone_number: member.phone_number,
                city: member.city,
                car_variant: member.car_variant,
                year_car: member.year_car,
                license_plate: member.license_plate,
                photo_url: member.photo_url,
                status: member.status,
                created_at: stamp,
                updated_at: stamp,
                deleted_at: None,
            };
            t.members.push(created.clone());
            Ok(created)
        })
    }

    async fn list_members(&self, filter: &MemberFilter) -> StoreResult<Vec<Member>> {
        self.with(|t| {
            let mut found: Vec<Member> = t.members.iter().filter(|m| filter.matches(m)).cloned().collect();
            found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(found)
        })
    }

    async fn decide_member(&self, id: i32, status: MemberStatus) -> StoreResult<Member> {
        self.with(|t| {
            let member = t.members.iter_mut().find(|m| m.id == id).ok_or(StoreError::NotFound)?;
            if !member.status.can_transition_to(status) {
                return Err(StoreError::InvalidState(format!("Member is already {}", member.status)));
            }
            member.status = status;
            member.updated_at = now();
            Ok(member.clone())
        })
    }

    async fn set_member_deleted(&self, id: i32, deleted: bool) -> StoreResult<Member> {
        self.with(|t| {
            let member = t.members.iter_mut().find(|m| m.id == id).ok_or(StoreError::NotFound)?;
            let stamp = now();
            member.deleted_at = deleted.then_some(stamp);
            member.updated_at = stamp;
            Ok(member.clone())
        })
    }

    async fn member_stats(&self, recent: i64) -> StoreResult<MemberStats> {
        self.with(|t| {
            let mut active: Vec<&Member> = t.members.iter().filter(|m| m.deleted_at.is_none()).collect();
            let count = |status: MemberStatus| active.iter().filter(|m| m.status == status).count() as i64;
            let pending_approvals = count(MemberStatus::Pending);
            let approved_members = count(MemberStatus::Approved);

            active.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(MemberStats {
                total_members: active.len() as i64,
                pending_approvals,
                approved_members,
                recent: active.into_iter().take(recent.max(0) as usize).cloned().collect(),
            })
        })
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn list_benefits(&self) -> StoreResult<Vec<Benefit>> {
        self.with(|t| {
            let mut rows = t.benefits.clone();
            rows.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(b.created_at.cmp(&a.created_at)));
            Ok(rows)
        })
    }

    async fn insert_benefit(&self, benefit: NewBenefit) -> StoreResult<Benefit> {
        self.with(|t| {
            let sort_order = benefit
                .sort_order
                .unwrap_or_else(|| t.benefits.iter().map(|b| b.sort_order).max().unwrap_or(0) + 1);
            let stamp = now();
            let created = Benefit {
                id: t.next_id(),
                title: benefit.title,
                description: benefit.description,
                icon_type: benefit.icon_type,
                sort_order,
                created_at: stamp,
                updated_at: stamp,
            };
            t.benefits.push(created.clone());
            Ok(created)
        })
    }

    async fn update_benefit(&self, id: i32, patch: BenefitPatch) -> StoreResult<Benefit> {
        self.with(|t| {
            let row = t.benefits.iter_mut().find(|b| b.id == id).ok_or(StoreError::NotFound)?;
            set(&mut row.title, patch.title);
            set(&mut row.description, patch.description);
            set(&mut row.icon_type, patch.icon_type);
            set(&mut row.sort_order, patch.sort_order);
            row.updated_at = now();
            Ok(row.clone())
        })
    }

    async fn delete_benefit(&self, id: i32) -> StoreResult<()> {
        self.with(|t| {
            let before = t.benefits.len();
            t.benefits.retain(|b| b.id != id);
            if t.benefits.len() == before {
                Err(StoreError::NotFound)
            } else {
                Ok(())
            }
        })
    }

    async fn list_social_links(&self) -> StoreResult<Vec<SocialLink>> {
        self.with(|t| {
            let mut rows = t.social.clone();
            rows.sort_by(|a, b| a.platform.cmp(&b.platform));
            Ok(rows)
        })
    }

    async fn upsert_social_link(&self, link: NewSocialLink) -> StoreResult<SocialLink> {
        self.with(|t| {
            let stamp = now();
            if let Some(row) = t.social.iter_mut().find(|s| s.platform == link.platform) {
                row.url = link.url;
                row.icon_type = link.icon_type;
                row.updated_at = stamp;
                return Ok(row.clone());
            }
            let created = SocialLink {
                id: t.next_id(),
                platform: link.platform,
                url: link.url,
                icon_type: link.icon_type,
                created_at: stamp,
                updated_at: stamp,
            };
            t.social.push(created.clone());
            Ok(created)
        })
    }

    async fn update_social_link(&self, id: i32, patch: SocialLinkPatch) -> StoreResult<SocialLink> {
        self.with(|t| {
            if let Some(platform) = &patch.platform {
                if t.social.iter().any(|s| s.id != id && &s.platform == platform) {
                    return Err(duplicate("cms_social_media_platform_key", "platform", platform));
                }
            }
            let row = t.social.iter_mut().find(|s| s.id == id).ok_or(StoreError::NotFound)?;
            set(&mut row.platform, patch.platform);
            set(&mut row.url, patch.url);
            set(&mut row.icon_type, patch.icon_type);
            row.updated_at = now();
            Ok(row.clone())
        })
    }

    async fn delete_social_link(&self, id: i32) -> StoreResult<()> {
        self.with(|t| {
            let before = t.social.len();
            t.social.retain(|s| s.id != id);
            if t.social.len() == before {
                Err(StoreError::NotFound)
            } else {
                Ok(())
            }
        })
    }

    async fn list_gallery(&self) -> StoreResult<Vec<GalleryItem>> {
        self.with(|t| {
            let mut rows = t.gallery.clone();
            rows.sort_by(|a, b| {
                b.sort_order
                    .cmp(&a.sort_order)
                    .then(b.created_at.cmp(&a.created_at))
                    .then(b.id.cmp(&a.id))
            });
            Ok(rows)
        })
    }

    async fn insert_gallery_item(&self, item: NewGalleryItem) -> StoreResult<GalleryItem> {
        self.with(|t| {
            let sort_order = t.gallery.iter().map(|g| g.sort_order).max().unwrap_or(0) + 1;
            let stamp = now();
            let created = GalleryItem {
                id: t.next_id(),
                title: item.title,
                description: item.description,
                image_url: item.image_url,
                sort_order,
                created_at: stamp,
                updated_at: stamp,
            };
            t.gallery.push(created.clone());
            Ok(created)
        })
    }

    async fn update_gallery_item(&self, id: i32, patch: GalleryPatch) -> StoreResult<GalleryItem> {
        self.with(|t| {
            let row = t.gallery.iter_mut().find(|g| g.id == id).ok_or(StoreError::NotFound)?;
            set(&mut row.title, patch.title);
            set(&mut row.description, patch.description);
            set(&mut row.image_url, patch.image_url);
            set(&mut row.sort_order, patch.sort_order);
            row.updated_at = now();
            Ok(row.clone())
        })
    }

    async fn delete_gallery_item(&self, id: i32) -> StoreResult<()> {
        self.with(|t| {
            let before = t.gallery.len();
            t.gallery.retain(|g| g.id != id);
            if t.gallery.len() == before {
                Err(StoreError::NotFound)
            } else {
                Ok(())
            }
        })
    }

    async fn delete_gallery_items(&self, ids: &[i32]) -> StoreResult<usize> {
        self.with(|t| {
            let before = t.gallery.len();
            t.gallery.retain(|g| !ids.contains(&g.id));
            Ok(before - t.gallery.len())
        })
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn list_events(&self) -> StoreResult<Vec<Event>> {
        self.with(|t| {
            let mut rows = t.events.clone();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(rows)
        })
    }

    async fn find_event(&self, id: i32) -> StoreResult<Option<Event>> {
        self.with(|t| Ok(t.events.iter().find(|e| e.id == id).cloned()))
    }

    async fn insert_event(&self, event: NewEvent) -> StoreResult<Event> {
        self.with(|t| {
            let stamp = now();
            let created = Event {
                id: t.next_id(),
                title: event.title,
                description: event.description,
                icon: event.icon,
                header_image: event.header_image,
                event_time: event.event_time,
                location: event.location,
                status: event.status,
                created_at: stamp,
                updated_at: stamp,
            };
            t.events.push(created.clone());
            Ok(created)
        })
    }

    async fn update_event(&self, id: i32, patch: EventPatch) -> StoreResult<Event> {
        self.with(|t| {
            let row = t.events.iter_mut().find(|e| e.id == id).ok_or(StoreError::NotFound)?;
            set(&mut row.title, patch.title);
            set(&mut row.description, patch.description);
            set(&mut row.icon, patch.icon);
            set(&mut row.header_image, patch.header_image.map(Some));
            set(&mut row.event_time, patch.event_time.map(Some));
            set(&mut row.location, patch.location.map(Some));
            set(&mut row.status, patch.status.map(Some));
            row.updated_at = now();
            Ok(row.clone())
        })
    }

    async fn delete_event(&self, id: i32) -> StoreResult<()> {
        self.with(|t| {
            let before = t.events.len();
            t.events.retain(|e| e.id != id);
            if t.events.len() == before {
                return Err(StoreError::NotFound);
            }
            t.registrations.retain(|r| r.event_id != id);
            Ok(())
        })
    }

    async fn count_events(&self) -> StoreResult<i64> {
        self.with(|t| Ok(t.events.len() as i64))
    }

    async fn insert_registration(&self, registration: NewEventRegistration) -> StoreResult<EventRegistration> {
        self.with(|t| {
            if !t.events.iter().any(|e| e.id == registration.event_id) {
                return Err(StoreError::MissingReference(format!(
                    "Key (event_id)=({}) is not present in table \"events\".",
                    registration.event_id
                )));
            }
            let created = EventRegistration {
                id: t.next_id(),
                event_id: registration.event_id,
                full_name: registration.full_name,
                email: registration.email,
                phone_number: registration.phone_number,
                message: registration.message,
                created_at: now(),
            };
            t.registrations.push(created.clone());
            Ok(created)
        })
    }

    async fn list_registrations(&self) -> StoreResult<Vec<EventRegistrationView>> {
        self.with(|t| {
            let mut rows: Vec<EventRegistrationView> = t
                .registrations
                .iter()
                .map(|r| EventRegistrationView {
                    registration: r.clone(),
                    event_title: t.events.iter().find(|e| e.id == r.event_id).map(|e| e.title.clone()),
                })
                .collect();
            rows.sort_by(|a, b| {
                b.registration
                    .created_at
                    .cmp(&a.registration.created_at)
                    .then(b.registration.id.cmp(&a.registration.id))
            });
            Ok(rows)
        })
    }
}

#[async_trait]
impl InboxStore for MemoryStore {
    async fn insert_contact_message(&self, message: NewContactMessage) -> StoreResult<ContactMessage> {
        self.with(|t| {
            let created = ContactMessage {
                id: t.next_id(),
                first_name: message.first_name,
                last_name: message.last_name,
                email: message.email,
                message: message.message,
                created_at: now(),
            };
            t.messages.push(created.clone());
            Ok(created)
        })
    }

    async fn list_contact_messages(&self) -> StoreResult<Vec<ContactMessage>> {
        self.with(|t| {
            let mut rows = t.messages.clone();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(rows)
        })
    }
}

#[async_trait]
impl SchemaStore for MemoryStore {
    async fn apply_schema(&self, _sql: String) -> StoreResult<()> {
        self.with(|_| Ok(()))
    }

    async fn missing_tables(&self, _expected: &[&'static str]) -> StoreResult<Vec<String>> {
        self.with(|_| Ok(Vec::new()))
    }
}

/// Section rows live as JSON objects keyed by section name; a patch is merged
/// key by key, so absent fields keep their stored value.
#[async_trait]
impl<T: Section> SectionStore<T> for MemoryStore {
    async fn fetch(&self) -> StoreResult<Option<T>> {
        self.with(|t| {
            t.sections
                .get(T::NAME)
                .map(|row| serde_json::from_value(row.clone()))
                .transpose()
                .map_err(codec_error)
        })
    }

    async fn upsert(&self, patch: T::Patch) -> StoreResult<T> {
        let changes = serde_json::to_value(&patch).map_err(codec_error)?;
        self.with(|t| {
            let stamp = json!(now());
            if !t.sections.contains_key(T::NAME) {
                let mut row = serde_json::to_value(T::default()).map_err(codec_error)?;
                let id = t.next_id();
                if let Some(fields) = row.as_object_mut() {
                    fields.insert("id".to_string(), json!(id));
                    fields.insert("created_at".to_string(), stamp.clone());
                }
                t.sections.insert(T::NAME, row);
            }

            let row = t.sections.get_mut(T::NAME).ok_or(StoreError::NotFound)?;
            if let (Some(fields), Value::Object(changes)) = (row.as_object_mut(), changes) {
                fields.extend(changes);
                fields.insert("updated_at".to_string(), stamp);
            }
            serde_json::from_value(row.clone()).map_err(codec_error)
        })
    }
}
