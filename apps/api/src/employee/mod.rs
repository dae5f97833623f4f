// Self-service surface under /api/v1/me: any signed-in user acting on their
// own profile, tasks and work updates.

pub mod handlers;
pub mod updates;
