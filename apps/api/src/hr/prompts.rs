// HR prompt templates.

pub const DRAFT_POLICY_SYSTEM: &str = "You are an HR policy writer for a mid-sized \
    software company. You write clear, neutral workplace policies that employees \
    can follow without legal training.";

/// Replace: {topic}, {key_points}
pub const DRAFT_POLICY_PROMPT_TEMPLATE: &str = r#"Draft a workplace policy.

TOPIC:
{topic}

POINTS THE POLICY MUST COVER:
{key_points}

Structure the content as short numbered sections: Purpose, Scope, Policy, Responsibilities.
Use plain sentences. Do not invent legal citations, dollar amounts or dates that were not given.

Return JSON with exactly these fields:
{
  "title": "<policy title, at most 12 words>",
  "content": "<full policy text>"
}"#;
