use actix_web::web;
use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel::upsert::excluded;
use log::error;

use super::{
    AuthStore, ContentStore, EventStore, InboxStore, MemberStore, SchemaStore, SectionStore, StoreError, StoreResult,
};
use crate::config::DbPool;
use crate::migrations;
use crate::models::{
    AdminAccount, Benefit, BenefitPatch, ContactMessage, Event, EventPatch, EventRegistration, EventRegistrationView,
    GalleryItem, GalleryPatch, Member, MemberFilter, MemberStats, MemberStatus, NewAdminAccount, NewBenefit,
    NewContactMessage, NewEvent, NewEventRegistration, NewGalleryItem, NewMember, NewSession, NewSocialLink, Session,
    SocialLink, SocialLinkPatch,
};
use crate::schema::{
    admin_sessions, admin_users, cms_benefits, cms_social_media, contact_messages, event_registrations, events,
    gallery, members,
};
use crate::sections::{About, ContactDetails, Footer, GetInTouch, Hero, Logo, Membership, Section};
use crate::validation::normalize_email;

diesel::define_sql_function!(fn lower(x: Text) -> Text);

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// Escapes `%`, `_` and the escape character itself for use inside ILIKE.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Postgres-backed store. Every call checks a connection out of the pool and
/// runs on actix's blocking thread pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn run<T, F>(&self, op: F) -> StoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        web::block(move || {
            let mut conn = pool.get()?;
            op(&mut conn)
        })
        .await
        .map_err(|e| {
            error!("Blocking database task failed: {}", e);
            StoreError::Backend(e.to_string())
        })?
    }
}

fn affected_or_not_found(rows: usize) -> StoreResult<()> {
    if rows == 0 {
        Err(StoreError::NotFound)
    } else {
        Ok(())
    }
}

#[async_trait]
impl AuthStore for PgStore {
    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<AdminAccount>> {
        let email = normalize_email(email);
        self.run(move |conn| {
            Ok(admin_users::table
                .filter(lower(admin_users::email).eq(email))
                .select(AdminAccount::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn find_account(&self, id: i32) -> StoreResult<Option<AdminAccount>> {
        self.run(move |conn| {
            Ok(admin_users::table
                .find(id)
                .select(AdminAccount::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn create_account(&self, account: NewAdminAccount) -> StoreResult<AdminAccount> {
        self.run(move |conn| {
            Ok(diesel::insert_into(admin_users::table)
                .values(&account)
                .returning(AdminAccount::as_returning())
                .get_result(conn)?)
        })
        .await
    }

    async fn record_login(&self, id: i32) -> StoreResult<()> {
        self.run(move |conn| {
            diesel::update(admin_users::table.find(id))
                .set(admin_users::last_login.eq(Some(now())))
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn insert_session(&self, session: NewSession) -> StoreResult<Session> {
        self.run(move |conn| {
            Ok(diesel::insert_into(admin_sessions::table)
                .values(&session)
                .returning(Session::as_returning())
                .get_result(conn)?)
        })
        .await
    }

    async fn find_session(&self, token: &str) -> StoreResult<Option<Session>> {
        let token = token.to_owned();
        self.run(move |conn| {
            Ok(admin_sessions::table
                .filter(admin_sessions::session_token.eq(token))
                .select(Session::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn delete_session(&self, token: &str) -> StoreResult<bool> {
        let token = token.to_owned();
        self.run(move |conn| {
            let removed = diesel::delete(admin_sessions::table.filter(admin_sessions::session_token.eq(token)))
                .execute(conn)?;
            Ok(removed > 0)
        })
        .await
    }
}

#[async_trait]
impl MemberStore for PgStore {
    async fn insert_member(&self, member: NewMember) -> StoreResult<Member> {
        self.run(move |conn| {
            Ok(diesel::insert_into(members::table)
                .values(&member)
                .returning(Member::as_returning())
                .get_result(conn)?)
        })
        .await
    }

    async fn list_members(&self, filter: &MemberFilter) -> StoreResult<Vec<Member>> {
        let filter = filter.clone();
        self.run(move |conn| {
            let mut query = members::table.into_boxed();

            if !filter.include_deleted {
                query = query.filter(members::deleted_at.is_null());
            }
            if let Some(status) = filter.status {
                query = query.filter(members::status.eq(status));
            }
            if let Some(term) = filter.search.as_deref() {
                let pattern = format!("%{}%", escape_like(term));
                query = query.filter(
                    members::full_name
                        .ilike(pattern.clone())
                        .or(members::email.ilike(pattern.clone()))
                        .or(members::license_plate.ilike(pattern)),
                );
            }
            if let Some(from) = filter.created_from {
                query = query.filter(members::created_at.ge(from));
            }
            if let Some(before) = filter.created_before {
                query = query.filter(members::created_at.lt(before));
            }

            Ok(query
                .order(members::created_at.desc())
                .select(Member::as_select())
                .load(conn)?)
        })
        .await
    }

    async fn decide_member(&self, id: i32, status: MemberStatus) -> StoreResult<Member> {
        self.run(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let current = members::table
                    .find(id)
                    .select(Member::as_select())
                    .for_update()
                    .first(conn)
                    .optional()?
                    .ok_or(StoreError::NotFound)?;

                if !current.status.can_transition_to(status) {
                    return Err(StoreError::InvalidState(format!("Member is already {}", current.status)));
                }

                Ok(diesel::update(members::table.find(id))
                    .set((members::status.eq(status), members::updated_at.eq(now())))
                    .returning(Member::as_returning())
                    .get_result(conn)?)
            })
        })
        .await
    }

    async fn set_member_deleted(&self, id: i32, deleted: bool) -> StoreResult<Member> {
        self.run(move |conn| {
            let stamp = now();
            let deleted_at = deleted.then_some(stamp);
            Ok(diesel::update(members::table.find(id))
                .set((members::deleted_at.eq(deleted_at), members::updated_at.eq(stamp)))
                .returning(Member::as_returning())
                .get_result(conn)?)
        })
        .await
    }

    async fn member_stats(&self, recent: i64) -> StoreResult<MemberStats> {
        self.run(move |conn| {
            let active = || members::table.filter(members::deleted_at.is_null());

            let total_members = active().count().get_result::<i64>(conn)?;
            let pending_approvals = active()
                .filter(members::status.eq(MemberStatus::Pending))
                .count()
                .get_result::<i64>(conn)?;
            let approved_members = active()
                .filter(members::status.eq(MemberStatus::Approved))
                .count()
                .get_result::<i64>(conn)?;
            let recent = active()
                .order(members::created_at.desc())
                .limit(recent)
                .select(Member::as_select())
                .load(conn)?;

            Ok(MemberStats {
                total_members,
                pending_approvals,
                approved_members,
                recent,
            })
        })
        .await
    }
}

#[async_trait]
impl ContentStore for PgStore {
    async fn list_benefits(&self) -> StoreResult<Vec<Benefit>> {
        self.run(|conn| {
            Ok(cms_benefits::table
                .order((cms_benefits::sort_order.asc(), cms_benefits::created_at.desc()))
                .select(Benefit::as_select())
                .load(conn)?)
        })
        .await
    }

    async fn insert_benefit(&self, mut benefit: NewBenefit) -> StoreResult<Benefit> {
        self.run(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                if benefit.sort_order.is_none() {
                    conn.batch_execute("LOCK TABLE cms_benefits IN SHARE ROW EXCLUSIVE MODE")?;
                    let highest: Option<i32> = cms_benefits::table
                        .select(diesel::dsl::max(cms_benefits::sort_order))
                        .first(conn)?;
                    benefit.sort_order = Some(highest.unwrap_or(0) + 1);
                }
                Ok(diesel::insert_into(cms_benefits::table)
                    .values(&benefit)
                    .returning(Benefit::as_returning())
                    .get_result(conn)?)
            })
        })
        .await
    }

    async fn update_benefit(&self, id: i32, patch: BenefitPatch) -> StoreResult<Benefit> {
        self.run(move |conn| {
            Ok(diesel::update(cms_benefits::table.find(id))
                .set((&patch, cms_benefits::updated_at.eq(now())))
                .returning(Benefit::as_returning())
                .get_result(conn)?)
        })
        .await
    }

    async fn delete_benefit(&self, id: i32) -> StoreResult<()> {
        self.run(move |conn| affected_or_not_found(diesel::delete(cms_benefits::table.find(id)).execute(conn)?))
            .await
    }

    async fn list_social_links(&self) -> StoreResult<Vec<SocialLink>> {
        self.run(|conn| {
            Ok(cms_social_media::table
                .order(cms_social_media::platform.asc())
                .select(SocialLink::as_select())
                .load(conn)?)
        })
        .await
    }

    async fn upsert_social_link(&self, link: NewSocialLink) -> StoreResult<SocialLink> {
        self.run(move |conn| {
            Ok(diesel::insert_into(cms_social_media::table)
                .values(&link)
                .on_conflict(cms_social_media::platform)
                .do_update()
                .set((
                    cms_social_media::url.eq(excluded(cms_social_media::url)),
                    cms_social_media::icon_type.eq(excluded(cms_social_media::icon_type)),
                    cms_social_media::updated_at.eq(now()),
                ))
                .returning(SocialLink::as_returning())
                .get_result(conn)?)
        })
        .await
    }

    async fn update_social_link(&self, id: i32, patch: SocialLinkPatch) -> StoreResult<SocialLink> {
        self.run(move |conn| {
            Ok(diesel::update(cms_social_media::table.find(id))
                .set((&patch, cms_social_media::updated_at.eq(now())))
                .returning(SocialLink::as_returning())
                .get_result(conn)?)
        })
        .await
    }

    async fn delete_social_link(&self, id: i32) -> StoreResult<()> {
        self.run(move |conn| affected_or_not_found(diesel::delete(cms_social_media::table.find(id)).execute(conn)?))
            .await
    }

    async fn list_gallery(&self) -> StoreResult<Vec<GalleryItem>> {
        self.run(|conn| {
            Ok(gallery::table
                .order((gallery::sort_order.desc(), gallery::created_at.desc()))
                .select(GalleryItem::as_select())
                .load(conn)?)
        })
        .await
    }

    async fn insert_gallery_item(&self, item: NewGalleryItem) -> StoreResult<GalleryItem> {
        self.run(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                conn.batch_execute("LOCK TABLE gallery IN SHARE ROW EXCLUSIVE MODE")?;
                let highest: Option<i32> = gallery::table.select(diesel::dsl::max(gallery::sort_order)).first(conn)?;

                Ok(diesel::insert_into(gallery::table)
                    .values((
                        gallery::title.eq(&item.title),
                        gallery::description.eq(&item.description),
                        gallery::image_url.eq(&item.image_url),
                        gallery::sort_order.eq(highest.unwrap_or(0) + 1),
                    ))
                    .returning(GalleryItem::as_returning())
                    .get_result(conn)?)
            })
        })
        .await
    }

    async fn update_gallery_item(&self, id: i32, patch: GalleryPatch) -> StoreResult<GalleryItem> {
        self.run(move |conn| {
            Ok(diesel::update(gallery::table.find(id))
                .set((&patch, gallery::updated_at.eq(now())))
                .returning(GalleryItem::as_returning())
                .get_result(conn)?)
        })
        .await
    }

    async fn delete_gallery_item(&self, id: i32) -> StoreResult<()> {
        self.run(move |conn| affected_or_not_found(diesel::delete(gallery::table.find(id)).execute(conn)?))
            .await
    }

    async fn delete_gallery_items(&self, ids: &[i32]) -> StoreResult<usize> {
        let ids = ids.to_vec();
        self.run(move |conn| Ok(diesel::delete(gallery::table.filter(gallery::id.eq_any(ids))).execute(conn)?))
            .await
    }
}

#[async_trait]
impl EventStore for PgStore {
    async fn list_events(&self) -> StoreResult<Vec<Event>> {
        self.run(|conn| {
            Ok(events::table
                .order(events::created_at.desc())
                .select(Event::as_select())
                .load(conn)?)
        })
        .await
    }

    async fn find_event(&self, id: i32) -> StoreResult<Option<Event>> {
        self.run(move |conn| Ok(events::table.find(id).select(Event::as_select()).first(conn).optional()?))
            .await
    }

    async fn insert_event(&self, event: NewEvent) -> StoreResult<Event> {
        self.run(move |conn| {
            Ok(diesel::insert_into(events::table)
                .values(&event)
                .returning(Event::as_returning())
                .get_result(conn)?)
        })
        .await
    }

    async fn update_event(&self, id: i32, patch: EventPatch) -> StoreResult<Event> {
        self.run(move |conn| {
            Ok(diesel::update(events::table.find(id))
                .set((&patch, events::updated_at.eq(now())))
                .returning(Event::as_returning())
                .get_result(conn)?)
        })
        .await
    }

    async fn delete_event(&self, id: i32) -> StoreResult<()> {
        self.run(move |conn| affected_or_not_found(diesel::delete(events::table.find(id)).execute(conn)?))
            .await
    }

    async fn count_events(&self) -> StoreResult<i64> {
        self.run(|conn| Ok(events::table.count().get_result(conn)?)).await
    }

    async fn insert_registration(&self, registration: NewEventRegistration) -> StoreResult<EventRegistration> {
        self.run(move |conn| {
            Ok(diesel::insert_into(event_registrations::table)
                .values(&registration)
                .returning(EventRegistration::as_returning())
                .get_result(conn)?)
        })
        .await
    }

    async fn list_registrations(&self) -> StoreResult<Vec<EventRegistrationView>> {
        self.run(|conn| {
            let rows: Vec<(EventRegistration, Option<String>)> = event_registrations::table
                .left_join(events::table)
                .order(event_registrations::created_at.desc())
                .select((EventRegistration::as_select(), events::title.nullable()))
                .load(conn)?;

            Ok(rows
                .into_iter()
                .map(|(registration, event_title)| EventRegistrationView {
                    registration,
                    event_title,
                })
                .collect())
        })
        .await
    }
}

#[async_trait]
impl InboxStore for PgStore {
    async fn insert_contact_message(&self, message: NewContactMessage) -> StoreResult<ContactMessage> {
        self.run(move |conn| {
            Ok(diesel::insert_into(contact_messages::table)
                .values(&message)
                .returning(ContactMessage::as_returning())
                .get_result(conn)?)
        })
        .await
    }

    async fn list_contact_messages(&self) -> StoreResult<Vec<ContactMessage>> {
        self.run(|conn| {
            Ok(contact_messages::table
                .order(contact_messages::created_at.desc())
                .select(ContactMessage::as_select())
                .load(conn)?)
        })
        .await
    }
}

#[async_trait]
impl SchemaStore for PgStore {
    async fn apply_schema(&self, sql: String) -> StoreResult<()> {
        self.run(move |conn| Ok(migrations::apply_schema(conn, &sql)?)).await
    }

    async fn missing_tables(&self, expected: &[&'static str]) -> StoreResult<Vec<String>> {
        let expected = expected.to_vec();
        self.run(move |conn| {
            migrations::probe(conn)?;
            Ok(migrations::missing_tables(conn, &expected)?)
        })
        .await
    }
}

/// Singleton sections share one shape: ensure the row exists (the unique
/// `singleton` column makes the insert a no-op after the first call), then
/// apply the changeset, all inside one transaction.
macro_rules! pg_section_store {
    ($section:ty, $table:ident) => {
        #[async_trait]
        impl SectionStore<$section> for PgStore {
            async fn fetch(&self) -> StoreResult<Option<$section>> {
                use crate::schema::$table;
                self.run(|conn| {
                    Ok($table::table
                        .select(<$section>::as_select())
                        .first(conn)
                        .optional()?)
                })
                .await
            }

            async fn upsert(&self, patch: <$section as Section>::Patch) -> StoreResult<$section> {
                use crate::schema::$table;
                self.run(move |conn| {
                    conn.transaction::<_, StoreError, _>(|conn| {
                        diesel::insert_into($table::table)
                            .values($table::singleton.eq(true))
                            .on_conflict($table::singleton)
                            .do_nothing()
                            .execute(conn)?;

                        Ok(diesel::update($table::table)
                            .set((&patch, $table::updated_at.eq(now())))
                            .returning(<$section>::as_returning())
                            .get_result(conn)?)
                    })
                })
                .await
            }
        }
    };
}

pg_section_store!(About, cms_about);
pg_section_store!(ContactDetails, cms_contact);
pg_section_store!(Hero, cms_hero);
pg_section_store!(Footer, cms_footer);
pg_section_store!(Logo, cms_logo);
pg_section_store!(Membership, cms_membership);
pg_section_store!(GetInTouch, cms_get_in_touch);

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("B 1234"), "B 1234");
    }
}
