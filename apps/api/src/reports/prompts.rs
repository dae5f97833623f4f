// Report pipeline prompt templates.

/// System prompt for the narrative summary step.
pub const SUMMARY_SYSTEM: &str = "You are a project coordinator writing the daily \
    progress report a product manager reads at the end of the day. \
    Write in plain prose, 120 to 200 words, no headings, no bullet lists, no markdown. \
    Lead with what moved forward, then what is stuck, then what needs attention tomorrow.";

/// Summary prompt. Replace: {grounding_instruction}, {project_json}, {metrics_json},
/// {tasks_block}, {updates_block}
pub const SUMMARY_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

PROJECT:
{project_json}

METRICS FOR THE LAST 24 HOURS:
{metrics_json}

OPEN AND RECENTLY COMPLETED TASKS:
{tasks_block}

WORK UPDATES POSTED BY THE TEAM (oldest first):
{updates_block}

Write today's progress summary for this project."#;

/// Role line for the classification step. JSON-only rules are appended at call time.
pub const CLASSIFY_ROLE: &str = "You are a delivery risk analyst reviewing one day \
    of activity on a software project.";

/// Classification prompt. Replace: {summary}, {metrics_json}, {updates_block}
pub const CLASSIFY_PROMPT_TEMPLATE: &str = r#"Classify the day's activity on this project.

SUMMARY:
{summary}

METRICS:
{metrics_json}

WORK UPDATES:
{updates_block}

Return a JSON object with EXACTLY this shape:
{
  "health": "on_track" | "at_risk" | "off_track",
  "blockers": ["short sentence naming something that stops work right now"],
  "risks": ["short sentence naming something that may delay delivery"],
  "highlights": ["short sentence naming a concrete accomplishment"]
}

RULES:
1. Only list blockers, risks and highlights that the updates or metrics support.
2. Each list holds at most 5 items of at most 25 words; use [] when there is nothing.
3. "off_track" means the due date is unlikely to hold without intervention."#;

/// Used instead of calling the LLM when nothing happened in the window.
pub const NO_ACTIVITY_SUMMARY: &str = "No work updates were posted and no tasks were \
    completed in the last 24 hours.";
