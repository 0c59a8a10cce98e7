use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_types::Text;
use log::{error, info};

use crate::models::{AdminAccount, NewAdminAccount};
use crate::schema::admin_users;

/// The bundled schema, applied at startup and by the maintenance endpoint.
pub const SCHEMA_SQL: &str = include_str!("../migrations/schema.sql");

/// Tables the site cannot run without.
pub const EXPECTED_TABLES: &[&str] = &[
    "admin_users",
    "admin_sessions",
    "members",
    "events",
    "event_registrations",
    "contact_messages",
    "gallery",
    "cms_about",
    "cms_benefits",
    "cms_social_media",
    "cms_contact",
    "cms_membership",
    "cms_logo",
    "cms_hero",
    "cms_footer",
    "cms_get_in_touch",
];

#[derive(QueryableByName)]
struct TableName {
    #[diesel(sql_type = Text)]
    table_name: String,
}

/// Runs the whole script in one transaction.
pub fn apply_schema(conn: &mut PgConnection, sql: &str) -> QueryResult<()> {
    info!("Applying schema ({} bytes)", sql.len());
    conn.transaction(|conn| conn.batch_execute(sql)).map_err(|e| {
        error!("Schema application rolled back: {}", e);
        e
    })
}

pub fn probe(conn: &mut PgConnection) -> QueryResult<()> {
    diesel::sql_query("SELECT 1").execute(conn).map(|_| ())
}

pub fn missing_tables(conn: &mut PgConnection, expected: &[&str]) -> QueryResult<Vec<String>> {
    let present: Vec<TableName> = diesel::sql_query(
        "SELECT table_name::text AS table_name FROM information_schema.tables WHERE table_schema = current_schema()",
    )
    .load(conn)?;

    Ok(expected
        .iter()
        .filter(|name| !present.iter().any(|t| t.table_name == **name))
        .map(|name| name.to_string())
        .collect())
}

/// Out-of-band admin provisioning. An existing account with the same email
/// gets the new password and name and is reactivated.
pub fn upsert_admin(conn: &mut PgConnection, account: &NewAdminAccount) -> QueryResult<AdminAccount> {
    diesel::insert_into(admin_users::table)
        .values(account)
        .on_conflict(admin_users::email)
        .do_update()
        .set((
            admin_users::password_hash.eq(&account.password_hash),
            admin_users::name.eq(&account.name),
            admin_users::is_active.eq(true),
        ))
        .returning(AdminAccount::as_returning())
        .get_result(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_schema_creates_every_expected_table() {
        for table in EXPECTED_TABLES {
            let statement = format!("CREATE TABLE IF NOT EXISTS {} (", table);
            assert!(SCHEMA_SQL.contains(&statement), "schema.sql does not create {table}");
        }
    }
}
