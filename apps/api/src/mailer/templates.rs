use chrono::NaiveDate;

use super::Email;
use crate::models::report::ReportRow;

pub fn welcome(to: &str, full_name: &str, role: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: "Welcome to Sync'em".to_string(),
        body: format!(
            "Hi {full_name},\n\n\
             An account has been created for you on Sync'em with the {role} role.\n\
             Sign in with this e-mail address and the password shared by your HR team, \
             then change it from your profile page.\n\n\
             — Sync'em"
        ),
    }
}

pub fn task_assigned(
    to: &str,
    assignee_name: &str,
    task_title: &str,
    project_name: &str,
    priority: &str,
    due_date: Option<NaiveDate>,
) -> Email {
    let due = due_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "no due date".to_string());
    Email {
        to: to.to_string(),
        subject: format!("[{project_name}] New task: {task_title}"),
        body: format!(
            "Hi {assignee_name},\n\n\
             You have been assigned a task on {project_name}.\n\n\
             Task:     {task_title}\n\
             Priority: {priority}\n\
             Due:      {due}\n\n\
             — Sync'em"
        ),
    }
}

pub fn daily_report(to: &str, project_name: &str, report: &ReportRow) -> Email {
    let mut body = format!(
        "Daily progress report for {project_name} ({date})\n\
         Health: {health}\n\n\
         {summary}\n",
        date = report.report_date,
        health = report.health.replace('_', " "),
        summary = report.summary,
    );

    for (title, items) in [
        ("Highlights", &report.highlights),
        ("Blockers", &report.blockers),
        ("Risks", &report.risks),
    ] {
        if items.is_empty() {
            continue;
        }
        body.push_str(&format!("\n{title}:\n"));
        for item in items {
            body.push_str(&format!("  - {item}\n"));
        }
    }

    if let Some(metrics) = report.metrics.as_object() {
        body.push_str("\nMetrics:\n");
        for key in [
            "total_tasks",
            "completion_rate",
            "completed_in_window",
            "overdue_tasks",
            "updates_in_window",
            "hours_logged",
        ] {
            if let Some(value) = metrics.get(key) {
                body.push_str(&format!("  {}: {}\n", key.replace('_', " "), value));
            }
        }
    }

    body.push_str("\n— Sync'em");

    Email {
        to: to.to_string(),
        subject: format!(
            "[{project_name}] Daily report {} — {}",
            report.report_date,
            report.health.replace('_', " ")
        ),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_task_assigned_without_due_date() {
        let email = task_assigned("dev@x.co", "Dev", "Fix login", "Portal", "high", None);
        assert_eq!(email.subject, "[Portal] New task: Fix login");
        assert!(email.body.contains("no due date"));
        assert!(email.body.contains("high"));
    }

    #[test]
    fn test_daily_report_lists_sections_and_skips_empty() {
        let report = ReportRow {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            report_date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            summary: "Steady progress.".into(),
            health: "at_risk".into(),
            metrics: serde_json::json!({"total_tasks": 5, "overdue_tasks": 1}),
            blockers: vec!["Waiting on API keys".into()],
            risks: vec![],
            highlights: vec!["Shipped login".into()],
            generated_by: None,
            created_at: Utc::now(),
        };
        let email = daily_report("pm@x.co", "Portal", &report);
        assert!(email.subject.contains("2024-03-04"));
        assert!(email.subject.contains("at risk"));
        assert!(email.body.contains("Blockers:\n  - Waiting on API keys"));
        assert!(!email.body.contains("Risks:"));
        assert!(email.body.contains("total tasks: 5"));
    }
}
