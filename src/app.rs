//! Wires one storage backend, the auth service and the upload root into the
//! actix application.

use std::sync::Arc;

use actix_web::web;

use crate::config::AppConfig;
use crate::routes::{self, auth, content, events, files, gallery, maintenance, members, sections};
use crate::sections::{About, ContactDetails, Footer, GetInTouch, Hero, Logo, Membership};
use crate::services::AuthService;
use crate::store::{AuthStore, ContentStore, EventStore, InboxStore, MemberStore, SchemaStore, SectionStore, Store};
use crate::uploads::UploadDir;

/// Shared handles, built once and cloned into every worker.
#[derive(Clone)]
pub struct AppState {
    config: web::Data<AppConfig>,
    auth: web::Data<AuthService>,
    uploads: web::Data<UploadDir>,
    members: web::Data<dyn MemberStore>,
    content: web::Data<dyn ContentStore>,
    events: web::Data<dyn EventStore>,
    inbox: web::Data<dyn InboxStore>,
    schema: web::Data<dyn SchemaStore>,
    about: web::Data<dyn SectionStore<About>>,
    contact: web::Data<dyn SectionStore<ContactDetails>>,
    hero: web::Data<dyn SectionStore<Hero>>,
    footer: web::Data<dyn SectionStore<Footer>>,
    logo: web::Data<dyn SectionStore<Logo>>,
    membership: web::Data<dyn SectionStore<Membership>>,
    get_in_touch: web::Data<dyn SectionStore<GetInTouch>>,
}

impl AppState {
    pub fn new<S: Store>(store: Arc<S>, config: AppConfig) -> Self {
        let auth_store: Arc<dyn AuthStore> = store.clone();
        let members: Arc<dyn MemberStore> = store.clone();
        let content: Arc<dyn ContentStore> = store.clone();
        let events: Arc<dyn EventStore> = store.clone();
        let inbox: Arc<dyn InboxStore> = store.clone();
        let schema: Arc<dyn SchemaStore> = store.clone();
        let about: Arc<dyn SectionStore<About>> = store.clone();
        let contact: Arc<dyn SectionStore<ContactDetails>> = store.clone();
        let hero: Arc<dyn SectionStore<Hero>> = store.clone();
        let footer: Arc<dyn SectionStore<Footer>> = store.clone();
        let logo: Arc<dyn SectionStore<Logo>> = store.clone();
        let membership: Arc<dyn SectionStore<Membership>> = store.clone();
        let get_in_touch: Arc<dyn SectionStore<GetInTouch>> = store;

        Self {
            auth: web::Data::new(AuthService::new(auth_store, &config)),
            uploads: web::Data::new(UploadDir::new(config.upload_dir.clone())),
            config: web::Data::new(config),
            members: web::Data::from(members),
            content: web::Data::from(content),
            events: web::Data::from(events),
            inbox: web::Data::from(inbox),
            schema: web::Data::from(schema),
            about: web::Data::from(about),
            contact: web::Data::from(contact),
            hero: web::Data::from(hero),
            footer: web::Data::from(footer),
            logo: web::Data::from(logo),
            membership: web::Data::from(membership),
            get_in_touch: web::Data::from(get_in_touch),
        }
    }

    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.config.clone())
            .app_data(self.auth.clone())
            .app_data(self.uploads.clone())
            .app_data(self.members.clone())
            .app_data(self.content.clone())
            .app_data(self.events.clone())
            .app_data(self.inbox.clone())
            .app_data(self.schema.clone())
            .app_data(self.about.clone())
            .app_data(self.contact.clone())
            .app_data(self.hero.clone())
            .app_data(self.footer.clone())
            .app_data(self.logo.clone())
            .app_data(self.membership.clone())
            .app_data(self.get_in_touch.clone())
            .app_data(web::JsonConfig::default().error_handler(routes::json_error))
            .app_data(web::QueryConfig::default().error_handler(routes::query_error))
            .app_data(web::PathConfig::default().error_handler(routes::path_error))
            .service(api_scope())
            .service(files::serve);
    }
}

fn api_scope() -> actix_web::Scope {
    web::scope("/api")
        .service(maintenance::health_check)
        .service(maintenance::migrate)
        // auth
        .service(auth::login)
        .service(auth::logout)
        .service(auth::session_status)
        // members
        .service(members::register)
        .service(members::list)
        .service(members::update)
        .service(members::stats)
        // singleton sections
        .service(sections::resource::<About>())
        .service(sections::resource::<ContactDetails>())
        .service(sections::resource::<Hero>())
        .service(sections::resource::<Footer>())
        .service(sections::resource::<Logo>())
        .service(sections::resource::<Membership>())
        .service(sections::resource::<GetInTouch>())
        // list sections
        .service(content::list_benefits)
        .service(content::create_benefit)
        .service(content::update_benefit)
        .service(content::delete_benefit)
        .service(content::list_social)
        .service(content::upsert_social)
        .service(content::delete_social)
        .service(gallery::upload)
        .service(gallery::check)
        .service(gallery::cleanup)
        .service(gallery::list)
        .service(gallery::create)
        .service(gallery::update)
        .service(gallery::remove)
        // events; fixed paths before `{id}`
        .service(events::public_list)
        .service(events::registrations)
        .service(events::upload)
        .service(events::register)
        .service(events::list)
        .service(events::create)
        .service(events::update)
        .service(events::remove)
        .service(events::detail)
        // inbox and generic uploads
        .service(content::submit_contact)
        .service(content::list_contact)
        .service(files::upload)
}
