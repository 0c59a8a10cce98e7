//! Storage seam. Handlers only see these traits; the process picks one
//! backend at startup (`pg::PgStore` or `memory::MemoryStore`) and hands it
//! out as `web::Data<dyn Trait>`.

use async_trait::async_trait;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

use crate::models::{
    AdminAccount, Benefit, BenefitPatch, ContactMessage, Event, EventPatch, EventRegistration, EventRegistrationView,
    GalleryItem, GalleryPatch, Member, MemberFilter, MemberStats, MemberStatus, NewAdminAccount, NewBenefit,
    NewContactMessage, NewEvent, NewEventRegistration, NewGalleryItem, NewMember, NewSession, NewSocialLink, Session,
    SocialLink, SocialLinkPatch,
};
use crate::sections::{About, ContactDetails, Footer, GetInTouch, Hero, Logo, Membership, Section};

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {detail}")]
    UniqueViolation { constraint: Option<String>, detail: String },
    #[error("referenced record does not exist: {0}")]
    MissingReference(String),
    #[error("record not found")]
    NotFound,
    #[error("{0}")]
    InvalidState(String),
    #[error("connection pool error: {0}")]
    Pool(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// True when a uniqueness violation is about `column`. The constraint name
    /// wins; otherwise the `Key (...)` part of the detail is inspected so the
    /// offending value itself is never matched.
    pub fn violates(&self, column: &str) -> bool {
        let StoreError::UniqueViolation { constraint, detail } = self else {
            return false;
        };
        let subject = match constraint {
            Some(name) => name.to_lowercase(),
            None => detail
                .split_once('(')
                .and_then(|(_, rest)| rest.split_once(')'))
                .map(|(key, _)| key.to_lowercase())
                .unwrap_or_else(|| detail.to_lowercase()),
        };
        subject.contains(column)
    }
}

impl From<DieselError> for StoreError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => StoreError::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => StoreError::UniqueViolation {
                constraint: info.constraint_name().map(str::to_owned),
                detail: info.details().unwrap_or_else(|| info.message()).to_owned(),
            },
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                StoreError::MissingReference(info.details().unwrap_or_else(|| info.message()).to_owned())
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for StoreError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        StoreError::Pool(err.to_string())
    }
}

#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Case-insensitive lookup; callers pass the address as typed.
    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<AdminAccount>>;
    async fn find_account(&self, id: i32) -> StoreResult<Option<AdminAccount>>;
    async fn create_account(&self, account: NewAdminAccount) -> StoreResult<AdminAccount>;
    async fn record_login(&self, id: i32) -> StoreResult<()>;

    async fn insert_session(&self, session: NewSession) -> StoreResult<Session>;
    async fn find_session(&self, token: &str) -> StoreResult<Option<Session>>;
    /// Returns whether a row was removed.
    async fn delete_session(&self, token: &str) -> StoreResult<bool>;
}

#[async_trait]
pub trait MemberStore: Send + Sync {
    async fn insert_member(&self, member: NewMember) -> StoreResult<Member>;
    async fn list_members(&self, filter: &MemberFilter) -> StoreResult<Vec<Member>>;
    /// Moves a pending member to `status`. Fails with `InvalidState` when the
    /// member has already been decided.
    async fn decide_member(&self, id: i32, status: MemberStatus) -> StoreResult<Member>;
    /// Soft delete (`deleted = true`) or restore.
    async fn set_member_deleted(&self, id: i32, deleted: bool) -> StoreResult<Member>;
    async fn member_stats(&self, recent: i64) -> StoreResult<MemberStats>;
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn list_benefits(&self) -> StoreResult<Vec<Benefit>>;
    async fn insert_benefit(&self, benefit: NewBenefit) -> StoreResult<Benefit>;
    async fn update_benefit(&self, id: i32, patch: BenefitPatch) -> StoreResult<Benefit>;
    async fn delete_benefit(&self, id: i32) -> StoreResult<()>;

    async fn list_social_links(&self) -> StoreResult<Vec<SocialLink>>;
    async fn upsert_social_link(&self, link: NewSocialLink) -> StoreResult<SocialLink>;
    async fn update_social_link(&self, id: i32, patch: SocialLinkPatch) -> StoreResult<SocialLink>;
    async fn delete_social_link(&self, id: i32) -> StoreResult<()>;

    async fn list_gallery(&self) -> StoreResult<Vec<GalleryItem>>;
    /// Appends the item after the current highest `sort_order`.
    async fn insert_gallery_item(&self, item: NewGalleryItem) -> StoreResult<GalleryItem>;
    async fn update_gallery_item(&self, id: i32, patch: GalleryPatch) -> StoreResult<GalleryItem>;
    async fn delete_gallery_item(&self, id: i32) -> StoreResult<()>;
    async fn delete_gallery_items(&self, ids: &[i32]) -> StoreResult<usize>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn list_events(&self) -> StoreResult<Vec<Event>>;
    async fn find_event(&self, id: i32) -> StoreResult<Option<Event>>;
    async fn insert_event(&self, event: NewEvent) -> StoreResult<Event>;
    async fn update_event(&self, id: i32, patch: EventPatch) -> StoreResult<Event>;
    async fn delete_event(&self, id: i32) -> StoreResult<()>;
    async fn count_events(&self) -> StoreResult<i64>;

    async fn insert_registration(&self, registration: NewEventRegistration) -> StoreResult<EventRegistration>;
    async fn list_registrations(&self) -> StoreResult<Vec<EventRegistrationView>>;
}

#[async_trait]
pub trait InboxStore: Send + Sync {
    async fn insert_contact_message(&self, message: NewContactMessage) -> StoreResult<ContactMessage>;
    async fn list_contact_messages(&self) -> StoreResult<Vec<ContactMessage>>;
}

#[async_trait]
pub trait SectionStore<T: Section>: Send + Sync {
    async fn fetch(&self) -> StoreResult<Option<T>>;
    /// Creates the row if needed and applies `patch`, atomically.
    async fn upsert(&self, patch: T::Patch) -> StoreResult<T>;
}

#[async_trait]
pub trait SchemaStore: Send + Sync {
    /// Runs `sql` inside one transaction; nothing is kept on failure.
    async fn apply_schema(&self, sql: String) -> StoreResult<()>;
    /// Names from `expected` that do not exist in the backing store.
    async fn missing_tables(&self, expected: &[&'static str]) -> StoreResult<Vec<String>>;
}

/// Everything the HTTP layer needs from one backend.
pub trait Store:
    AuthStore
    + MemberStore
    + ContentStore
    + EventStore
    + InboxStore
    + SchemaStore
    + SectionStore<About>
    + SectionStore<ContactDetails>
    + SectionStore<Hero>
    + SectionStore<Footer>
    + SectionStore<Logo>
    + SectionStore<Membership>
    + SectionStore<GetInTouch>
    + 'static
{
}

impl<S> Store for S where
    S: AuthStore
        + MemberStore
        + ContentStore
        + EventStore
        + InboxStore
        + SchemaStore
        + SectionStore<About>
        + SectionStore<ContactDetails>
        + SectionStore<Hero>
        + SectionStore<Footer>
        + SectionStore<Logo>
        + SectionStore<Membership>
        + SectionStore<GetInTouch>
        + 'static
{
}
