// Admin surface: user accounts, S3 backups and the system dashboard.

pub mod backups;
pub mod handlers;
pub mod users;
