// Mirrors migrations/schema.sql.

diesel::table! {
    admin_users (id) {
        id -> Int4,
        email -> Varchar,
        password_hash -> Varchar,
        name -> Nullable<Varchar>,
        is_active -> Bool,
        last_login -> Nullable<Timestamp>,
        created_at -> Timestamp,
    }
}

diesel::table! {
    admin_sessions (id) {
        id -> Int4,
        admin_id -> Int4,
        session_token -> Varchar,
        expires_at -> Timestamp,
        created_at -> Timestamp,
    }
}

diesel::table! {
    members (id) {
        id -> Int4,
        full_name -> Varchar,
        email -> Varchar,
        phone_number -> Varchar,
        city -> Varchar,
        car_variant -> Varchar,
        year_car -> Varchar,
        license_plate -> Varchar,
        photo_url -> Nullable<Varchar>,
        status -> Varchar,
        created_at -> Timestamp,
        updated_at -> Timestamp,
        deleted_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    events (id) {
        id -> Int4,
        title -> Varchar,
        description -> Text,
        icon -> Varchar,
        header_image -> Nullable<Varchar>,
        event_time -> Nullable<Varchar>,
        location -> Nullable<Varchar>,
        status -> Nullable<Varchar>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    event_registrations (id) {
        id -> Int4,
        event_id -> Int4,
        full_name -> Varchar,
        email -> Varchar,
        phone_number -> Varchar,
        message -> Nullable<Text>,
        created_at -> Timestamp,
    }
}

diesel::table! {
    contact_messages (id) {
        id -> Int4,
        first_name -> Varchar,
        last_name -> Varchar,
        email -> Varchar,
        message -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    cms_benefits (id) {
        id -> Int4,
        title -> Varchar,
        description -> Text,
        icon_type -> Varchar,
        sort_order -> Int4,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    cms_social_media (id) {
        id -> Int4,
        platform -> Varchar,
        url -> Varchar,
        icon_type -> Varchar,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    gallery (id) {
        id -> Int4,
        title -> Varchar,
        description -> Text,
        image_url -> Varchar,
        sort_order -> Int4,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    cms_about (id) {
        id -> Int4,
        singleton -> Bool,
        title -> Varchar,
        description -> Text,
        button_text -> Varchar,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    cms_contact (id) {
        id -> Int4,
        singleton -> Bool,
        title -> Varchar,
        description -> Text,
        phone -> Varchar,
        email -> Varchar,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    cms_hero (id) {
        id -> Int4,
        singleton -> Bool,
        title -> Varchar,
        description -> Text,
        button_text -> Varchar,
        background_image_url -> Varchar,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    cms_footer (id) {
        id -> Int4,
        singleton -> Bool,
        company_name -> Varchar,
        description -> Text,
        phone -> Varchar,
        email -> Varchar,
        address -> Varchar,
        copyright_year -> Int4,
        copyright_text -> Varchar,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    cms_logo (id) {
        id -> Int4,
        singleton -> Bool,
        logo_text -> Varchar,
        logo_subtext -> Varchar,
        logo_image_url -> Varchar,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    cms_membership (id) {
        id -> Int4,
        singleton -> Bool,
        title -> Varchar,
        description -> Text,
        stats -> Jsonb,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    cms_get_in_touch (id) {
        id -> Int4,
        singleton -> Bool,
        title -> Varchar,
        description -> Text,
        button_text -> Varchar,
        button_url -> Varchar,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::joinable!(admin_sessions -> admin_users (admin_id));
diesel::joinable!(event_registrations -> events (event_id));

diesel::allow_tables_to_appear_in_same_query!(
    admin_users,
    admin_sessions,
    members,
    events,
    event_registrations,
    contact_messages,
    cms_benefits,
    cms_social_media,
    gallery,
    cms_about,
    cms_contact,
    cms_hero,
    cms_footer,
    cms_logo,
    cms_membership,
    cms_get_in_touch,
);
