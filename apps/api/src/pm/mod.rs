// Product Manager surface: projects, their members and tasks, the PM
// dashboard. Reports live in crate::reports and share the ownership check.

pub mod handlers;
pub mod members;
pub mod projects;
pub mod tasks;
