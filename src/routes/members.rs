use actix_web::{get, patch, post, web, HttpRequest, HttpResponse};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use log::info;
use serde::Deserialize;
use serde_json::json;

use crate::errors::{ApiError, FieldErrors};
use crate::middleware::AdminSession;
use crate::models::{MemberFilter, MemberStatus, NewMember};
use crate::routes::not_found;
use crate::store::{EventStore, MemberStore, StoreError};
use crate::uploads::{ImagePolicy, MultipartForm, UploadDir};
use crate::validation::non_blank;

const RECENT_REGISTRATIONS: i64 = 5;

fn registration_error(err: StoreError) -> ApiError {
    if !matches!(err, StoreError::UniqueViolation { .. }) {
        return err.into();
    }
    let errors = if err.violates("email") {
        FieldErrors::single("email", "This email is already registered")
    } else if err.violates("license_plate") {
        FieldErrors::single("license_plate", "This license plate is already registered")
    } else {
        FieldErrors::single("submit", "This data is already registered")
    };
    ApiError::ConflictError(errors)
}

/// Public membership application (multipart, optional `photo`).
#[post("/register")]
pub async fn register(
    req: HttpRequest,
    payload: web::Payload,
    members: web::Data<dyn MemberStore>,
    uploads: web::Data<UploadDir>,
) -> Result<HttpResponse, ApiError> {
    let form = MultipartForm::read(&req, payload).await?;
    let mut member = NewMember::from_form(form.fields())?;

    // an empty photo part means "no photo"
    let photo = match form.file("photo").filter(|f| !f.is_empty()) {
        Some(file) => {
            let file = ImagePolicy::Photo.check(Some(file)).map_err(|e| match e {
                ApiError::BadRequest(msg) => ApiError::field("photo", &msg),
                other => other,
            })?;
            Some(uploads.save(Some("members"), &file.file_name, &file.bytes).await?)
        }
        None => None,
    };
    member.photo_url = photo.as_ref().map(|p| p.url.clone());

    match members.insert_member(member).await {
        Ok(created) => {
            info!("New membership application {} ({})", created.id, created.license_plate);
            Ok(HttpResponse::Created().json(json!({
                "success": true,
                "message": "Registration successful",
                "data": created,
            })))
        }
        Err(err) => {
            if let Some(stored) = &photo {
                uploads.discard(stored).await;
            }
            Err(registration_error(err))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberQuery {
    pub status: Option<String>,
    pub search: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub include_deleted: Option<String>,
}

/// Accepts `YYYY-MM-DD` (a whole calendar day) or an RFC 3339 instant.
fn parse_bound(raw: &str, upper: bool) -> Option<NaiveDateTime> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let day = if upper { date.succ_opt()? } else { date };
        return day.and_hms_opt(0, 0, 0);
    }
    let instant = DateTime::parse_from_rfc3339(raw).ok()?.naive_utc();
    Some(if upper { instant + Duration::microseconds(1) } else { instant })
}

impl MemberQuery {
    pub fn into_filter(self) -> Result<MemberFilter, ApiError> {
        let mut errors = FieldErrors::new();

        let status = match non_blank(self.status.as_deref()).as_deref() {
            None | Some("all") => None,
            Some(raw) => raw.parse::<MemberStatus>().map_err(|_| errors.add("status", "Invalid status filter")).ok(),
        };

        let mut bound = |field: &str, raw: Option<String>, upper: bool| match non_blank(raw.as_deref()) {
            None => None,
            Some(raw) => {
                let parsed = parse_bound(&raw, upper);
                if parsed.is_none() {
                    errors.add(field, "Invalid date");
                }
                parsed
            }
        };
        let created_from = bound("startDate", self.start_date, false);
        let created_before = bound("endDate", self.end_date, true);

        errors.into_result()?;

        Ok(MemberFilter {
            status,
            search: non_blank(self.search.as_deref()),
            created_from,
            created_before,
            include_deleted: matches!(self.include_deleted.as_deref(), Some("true") | Some("1")),
        })
    }
}

#[get("/admin/members")]
pub async fn list(
    _admin: AdminSession,
    members: web::Data<dyn MemberStore>,
    query: web::Query<MemberQuery>,
) -> Result<HttpResponse, ApiError> {
    let filter = query.into_inner().into_filter()?;
    let rows = members.list_members(&filter).await?;
    Ok(HttpResponse::Ok().json(json!({ "data": rows })))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemberUpdate {
    #[serde(rename = "memberId")]
    pub member_id: Option<i32>,
    pub status: Option<String>,
    pub action: Option<String>,
}

/// Approve/reject a pending member, or soft delete/restore any member.
#[patch("/admin/members")]
pub async fn update(
    admin: AdminSession,
    members: web::Data<dyn MemberStore>,
    body: web::Json<MemberUpdate>,
) -> Result<HttpResponse, ApiError> {
    let MemberUpdate { member_id, status, action } = body.into_inner();
    let id = member_id.ok_or_else(|| ApiError::field("memberId", "Member ID is required"))?;

    let member = match action.as_deref() {
        Some("delete") => members.set_member_deleted(id, true).await.map_err(not_found("Member"))?,
        Some("restore") => members.set_member_deleted(id, false).await.map_err(not_found("Member"))?,
        Some(other) => return Err(ApiError::field("action", &format!("Unknown action '{}'", other))),
        None => {
            let status = match status.as_deref() {
                Some("approved") => MemberStatus::Approved,
                Some("rejected") => MemberStatus::Rejected,
                _ => return Err(ApiError::field("status", "Invalid status")),
            };
            members.decide_member(id, status).await.map_err(not_found("Member"))?
        }
    };

    info!(
        "Admin {} updated member {} (status {}, deleted {})",
        admin.admin_id,
        member.id,
        member.status,
        member.deleted_at.is_some()
    );
    Ok(HttpResponse::Ok().json(json!({ "data": member })))
}

#[get("/admin/stats")]
pub async fn stats(
    _admin: AdminSession,
    members: web::Data<dyn MemberStore>,
    events: web::Data<dyn EventStore>,
) -> Result<HttpResponse, ApiError> {
    let stats = members.member_stats(RECENT_REGISTRATIONS).await?;
    let total_events = events.count_events().await?;

    let recent: Vec<_> = stats
        .recent
        .iter()
        .map(|m| {
            json!({
                "id": m.id,
                "name": m.full_name,
                "email": m.email,
                "status": m.status,
                "registeredAt": m.created_at,
            })
        })
        .collect();

    Ok(HttpResponse::Ok().json(json!({
        "totalMembers": stats.total_members,
        "pendingApprovals": stats.pending_approvals,
        "approvedMembers": stats.approved_members,
        "totalEvents": total_events,
        "recentRegistrations": recent,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_date_covers_the_whole_day() {
        let filter = MemberQuery {
            start_date: Some("2024-03-01".into()),
            end_date: Some("2024-03-31".into()),
            ..MemberQuery::default()
        }
        .into_filter()
        .unwrap();

        let from = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let before = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(filter.created_from, Some(from));
        assert_eq!(filter.created_before, Some(before));
    }

    #[test]
    fn status_all_means_no_filter() {
        let filter = MemberQuery {
            status: Some("all".into()),
            include_deleted: Some("true".into()),
            ..MemberQuery::default()
        }
        .into_filter()
        .unwrap();
        assert!(filter.status.is_none());
        assert!(filter.include_deleted);
    }

    #[test]
    fn bad_filters_are_reported_per_field() {
        let err = MemberQuery {
            status: Some("banned".into()),
            start_date: Some("yesterday".into()),
            ..MemberQuery::default()
        }
        .into_filter()
        .unwrap_err();
        let ApiError::ValidationError(errors) = err else {
            panic!("expected a validation error");
        };
        assert!(errors.get("status").is_some());
        assert!(errors.get("startDate").is_some());
    }

    #[test]
    fn duplicate_plates_are_keyed_to_the_plate() {
        let err = registration_error(StoreError::UniqueViolation {
            constraint: Some("members_license_plate_key".into()),
            detail: String::new(),
        });
        let ApiError::ConflictError(errors) = err else {
            panic!("expected a conflict");
        };
        assert_eq!(errors.get("license_plate"), Some("This license plate is already registered"));
    }
}
