use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::accounts::{get_user, insert_user, NewUser};
use crate::auth::password::hash_password_async;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::mailer::templates;
use crate::models::employee::{EmployeeDetail, EmployeeRow};
use crate::models::user::Role;
use crate::pagination::PageParams;
use crate::queue::{TaskKind, TaskQueue};
use crate::validation;

const DETAIL_SELECT: &str = r#"
    SELECT e.id, e.user_id, u.email, u.full_name, u.role, u.is_active,
           e.employee_code, e.department, e.designation, e.phone,
           e.date_joined, e.manager_id, e.created_at, e.updated_at
    FROM employees e
    JOIN users u ON u.id = e.user_id
"#;

#[derive(Debug, Deserialize)]
pub struct EmployeeCreate {
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub role: Option<String>,
    pub employee_code: String,
    pub department: String,
    pub designation: String,
    pub phone: Option<String>,
    /// Defaults to today.
    pub date_joined: Option<NaiveDate>,
    pub manager_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EmployeeUpdate {
    pub full_name: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
    #[serde(default, deserialize_with = "validation::double_option")]
    pub phone: Option<Option<String>>,
    pub date_joined: Option<NaiveDate>,
    #[serde(default, deserialize_with = "validation::double_option")]
    pub manager_id: Option<Option<Uuid>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EmployeeQuery {
    pub department: Option<String>,
    /// Case-insensitive match on name, e-mail or employee code.
    pub q: Option<String>,
}

/// Wraps a free-text search term for `ILIKE`, escaping the wildcard characters.
pub fn like_pattern(term: &str) -> Option<String> {
    let term = term.trim();
    if term.is_empty() {
        return None;
    }
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Some(format!("%{escaped}%"))
}

fn clean_phone(phone: Option<&str>) -> Result<Option<String>, AppError> {
    match phone.map(str::trim) {
        None | Some("") => Ok(None),
        Some(p) => {
            validation::max_len("phone", p, 32)?;
            if !p
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'))
            {
                return Err(AppError::Validation(
                    "phone may only contain digits, spaces and + - ( )".to_string(),
                ));
            }
            Ok(Some(p.to_string()))
        }
    }
}

pub async fn get_employee(pool: &PgPool, id: Uuid) -> Result<EmployeeDetail, AppError> {
    sqlx::query_as::<_, EmployeeDetail>(&format!("{DETAIL_SELECT} WHERE e.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Employee {id} not found")))
}

pub async fn find_by_user(pool: &PgPool, user_id: Uuid) -> Result<Option<EmployeeDetail>, AppError> {
    Ok(
        sqlx::query_as::<_, EmployeeDetail>(&format!("{DETAIL_SELECT} WHERE e.user_id = $1"))
            .bind(user_id)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn list_employees(
    pool: &PgPool,
    query: &EmployeeQuery,
    page: &PageParams,
) -> Result<(Vec<EmployeeDetail>, i64), AppError> {
    let department = query.department.as_deref().map(str::trim).filter(|d| !d.is_empty());
    let pattern = query.q.as_deref().and_then(like_pattern);

    let filter = r#"
        WHERE ($1::text IS NULL OR e.department = $1)
          AND ($2::text IS NULL
               OR u.full_name ILIKE $2 OR u.email ILIKE $2 OR e.employee_code ILIKE $2)
    "#;

    let total: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM employees e JOIN users u ON u.id = e.user_id {filter}"
    ))
    .bind(department)
    .bind(pattern.as_deref())
    .fetch_one(pool)
    .await?;

    let items = sqlx::query_as::<_, EmployeeDetail>(&format!(
        "{DETAIL_SELECT} {filter} ORDER BY u.full_name LIMIT $3 OFFSET $4"
    ))
    .bind(department)
    .bind(pattern.as_deref())
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    Ok((items, total))
}

/// Roles an HR user may hand out. Only admins create other admins or HR staff.
pub fn check_grantable_role(caller: &AuthUser, role: Role) -> Result<(), AppError> {
    match role {
        Role::Admin | Role::Hr if !caller.is_admin() => Err(AppError::Forbidden),
        _ => Ok(()),
    }
}

/// Creates the login account and the profile in one transaction, then queues
/// the welcome e-mail.
pub async fn create_employee(
    pool: &PgPool,
    queue: &dyn TaskQueue,
    caller: &AuthUser,
    req: EmployeeCreate,
) -> Result<EmployeeDetail, AppError> {
    // Step 1: Validate
    let email = validation::email("email", &req.email)?;
    let full_name = validation::required("full_name", &req.full_name, 120)?;
    validation::password("password", &req.password)?;
    let role = match req.role.as_deref() {
        Some(r) => validation::parse_enum::<Role>("role", r)?,
        None => Role::Employee,
    };
    check_grantable_role(caller, role)?;
    let employee_code = validation::required("employee_code", &req.employee_code, 32)?;
    let department = validation::required("department", &req.department, 100)?;
    let designation = validation::required("designation", &req.designation, 100)?;
    let phone = clean_phone(req.phone.as_deref())?;
    let date_joined = req.date_joined.unwrap_or_else(|| Utc::now().date_naive());

    // Step 2: Hash off the async runtime
    let password_hash = hash_password_async(req.password).await?;

    // Step 3: Account + profile
    let mut tx = pool.begin().await?;
    if let Some(manager_id) = req.manager_id {
        get_user(&mut *tx, manager_id).await?;
    }
    let user = insert_user(
        &mut *tx,
        NewUser {
            email: &email,
            full_name: &full_name,
            role,
            password_hash: &password_hash,
        },
    )
    .await?;

    let profile = sqlx::query_as::<_, EmployeeRow>(
        r#"
        INSERT INTO employees
            (id, user_id, employee_code, department, designation, phone, date_joined, manager_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.id)
    .bind(&employee_code)
    .bind(&department)
    .bind(&designation)
    .bind(phone)
    .bind(date_joined)
    .bind(req.manager_id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    info!("Employee {} ({}) onboarded as {}", profile.id, user.email, role);

    // Step 4: Welcome e-mail. The account exists either way.
    let email = templates::welcome(&user.email, &user.full_name, role.as_str());
    if let Err(e) = queue.enqueue(TaskKind::SendEmail { email }).await {
        warn!("Failed to queue welcome e-mail for {}: {e}", user.email);
    }

    get_employee(pool, profile.id).await
}

pub async fn update_employee(
    pool: &PgPool,
    existing: EmployeeDetail,
    req: EmployeeUpdate,
) -> Result<EmployeeDetail, AppError> {
    let full_name = match req.full_name.as_deref() {
        Some(n) => validation::required("full_name", n, 120)?,
        None => existing.full_name,
    };
    let department = match req.department.as_deref() {
        Some(d) => validation::required("department", d, 100)?,
        None => existing.department,
    };
    let designation = match req.designation.as_deref() {
        Some(d) => validation::required("designation", d, 100)?,
        None => existing.designation,
    };
    let phone = match req.phone {
        Some(p) => clean_phone(p.as_deref())?,
        None => existing.phone,
    };
    let date_joined = req.date_joined.unwrap_or(existing.date_joined);
    let manager_id = req.manager_id.unwrap_or(existing.manager_id);
    if manager_id == Some(existing.user_id) {
        return Err(AppError::Validation(
            "An employee cannot be their own manager".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;
    if let Some(manager_id) = manager_id {
        get_user(&mut *tx, manager_id).await?;
    }
    sqlx::query("UPDATE users SET full_name = $1, updated_at = NOW() WHERE id = $2")
        .bind(&full_name)
        .bind(existing.user_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        r#"
        UPDATE employees
        SET department = $1, designation = $2, phone = $3, date_joined = $4,
            manager_id = $5, updated_at = NOW()
        WHERE id = $6
        "#,
    )
    .bind(department)
    .bind(designation)
    .bind(phone)
    .bind(date_joined)
    .bind(manager_id)
    .bind(existing.id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    get_employee(pool, existing.id).await
}

/// Offboarding deactivates the login; the profile stays for history.
pub async fn deactivate_employee(pool: &PgPool, existing: &EmployeeDetail) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
        .bind(existing.user_id)
        .execute(pool)
        .await?;
    info!("Employee {} deactivated", existing.id);
    Ok(())
}

/// Only the phone number is self-service.
pub async fn update_own_phone(
    pool: &PgPool,
    user_id: Uuid,
    phone: Option<&str>,
) -> Result<Option<EmployeeDetail>, AppError> {
    let phone = clean_phone(phone)?;
    let updated = sqlx::query("UPDATE employees SET phone = $1, updated_at = NOW() WHERE user_id = $2")
        .bind(phone)
        .bind(user_id)
        .execute(pool)
        .await?
        .rows_affected();
    if updated == 0 {
        return Err(AppError::NotFound(
            "No employee profile is linked to this account".to_string(),
        ));
    }
    find_by_user(pool, user_id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" ann "), Some("%ann%".to_string()));
        assert_eq!(like_pattern("50%_off"), Some("%50\\%\\_off%".to_string()));
        assert_eq!(like_pattern("   "), None);
    }

    #[test]
    fn test_clean_phone() {
        assert_eq!(clean_phone(None).unwrap(), None);
        assert_eq!(clean_phone(Some("  ")).unwrap(), None);
        assert_eq!(
            clean_phone(Some(" +1 (555) 010-2030 ")).unwrap(),
            Some("+1 (555) 010-2030".to_string())
        );
        assert!(matches!(
            clean_phone(Some("call me")),
            Err(AppError::Validation(_))
        ));
    }

    fn caller(role: Role) -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn test_hr_cannot_grant_privileged_roles() {
        let hr = caller(Role::Hr);
        assert!(matches!(check_grantable_role(&hr, Role::Admin), Err(AppError::Forbidden)));
        assert!(matches!(check_grantable_role(&hr, Role::Hr), Err(AppError::Forbidden)));
        assert!(check_grantable_role(&hr, Role::Pm).is_ok());
        assert!(check_grantable_role(&hr, Role::Employee).is_ok());

        let admin = caller(Role::Admin);
        assert!(check_grantable_role(&admin, Role::Admin).is_ok());
        assert!(check_grantable_role(&admin, Role::Hr).is_ok());
    }

    #[test]
    fn test_update_distinguishes_null_manager() {
        let update: EmployeeUpdate = serde_json::from_str(r#"{"manager_id": null}"#).unwrap();
        assert_eq!(update.manager_id, Some(None));
        assert!(update.phone.is_none());
    }

    #[test]
    fn test_create_requires_password() {
        let parsed = serde_json::from_value::<EmployeeCreate>(serde_json::json!({
            "email": "a@b.co",
            "full_name": "A",
            "employee_code": "E-1",
            "department": "Eng",
            "designation": "Dev"
        }));
        assert!(parsed.is_err());
    }
}
