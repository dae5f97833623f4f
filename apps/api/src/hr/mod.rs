// HR surface: employee profiles and their login accounts, company policies,
// the LLM policy drafter and the HR dashboard.

pub mod employees;
pub mod handlers;
pub mod policies;
pub mod prompts;
