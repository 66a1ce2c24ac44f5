use axum::{
    extract::State,
    Json,
};
use serde::Deserialize;

use crate::auth::extractor::ROLE_ADMIN;
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::extract::ApiQuery;
use crate::models::audit::AuditLogRow;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct AuditLogQuery {
    pub limit: Option<i64>,
}

fn resolve_limit(limit: Option<i64>) -> Result<i64, AppError> {
    match limit {
        None => Ok(DEFAULT_LIMIT),
        Some(n) if (1..=MAX_LIMIT).contains(&n) => Ok(n),
        Some(_) => Err(AppError::UnprocessableEntity(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        ))),
    }
}

/// GET /api/audit-logs
pub async fn handle_list_audit_logs(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(params): ApiQuery<AuditLogQuery>,
) -> Result<Json<Vec<AuditLogRow>>, AppError> {
    user.require_role(&[ROLE_ADMIN])?;
    let limit = resolve_limit(params.limit)?;

    let rows = sqlx::query_as::<_, AuditLogRow>(
        "SELECT * FROM audit_logs ORDER BY created_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_defaults_and_bounds() {
        assert_eq!(resolve_limit(None).unwrap(), 50);
        assert_eq!(resolve_limit(Some(200)).unwrap(), 200);
        assert!(resolve_limit(Some(0)).is_err());
        assert!(resolve_limit(Some(201)).is_err());
    }
}
