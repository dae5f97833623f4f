// Daily Project Progress Report.
// Linear pipeline: load activity → compute metrics → LLM summary →
// LLM classification → persist (one row per project per day) → optional e-mail.
// All LLM calls go through llm_client.

pub mod handlers;
pub mod metrics;
pub mod pipeline;
pub mod prompts;
