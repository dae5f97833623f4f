use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EmployeeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub employee_code: String,
    pub department: String,
    pub designation: String,
    pub phone: Option<String>,
    pub date_joined: NaiveDate,
    pub manager_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Employee profile joined with its login account.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EmployeeDetail {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub is_active: bool,
    pub employee_code: String,
    pub department: String,
    pub designation: String,
    pub phone: Option<String>,
    pub date_joined: NaiveDate,
    pub manager_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
