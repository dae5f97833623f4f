//! Pure metric computation over one project's tasks and work updates.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::project::{ProjectMember, TaskRow, TaskStatus, WorkUpdateDetail};
use crate::models::report::ReportHealth;

/// Overdue tasks at or above this count make a project off track.
const OFF_TRACK_OVERDUE: usize = 3;

/// Half-open reporting window `(start, end]`.
#[derive(Debug, Clone, Copy)]
pub struct ReportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at > self.start && at <= self.end
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetrics {
    pub total_tasks: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub blocked: usize,
    pub done: usize,
    /// done / total, rounded to two decimals. 0 when there are no tasks.
    pub completion_rate: f64,
    pub completed_in_window: usize,
    pub overdue_tasks: usize,
    pub updates_in_window: usize,
    pub hours_logged: f64,
    pub active_contributors: usize,
    /// Members who posted no update in the window.
    pub silent_members: Vec<String>,
}

impl ProjectMetrics {
    pub fn open_tasks(&self) -> usize {
        self.total_tasks - self.done
    }

    pub fn has_activity(&self) -> bool {
        self.updates_in_window > 0 || self.completed_in_window > 0
    }
}

pub fn compute_metrics(
    tasks: &[TaskRow],
    members: &[ProjectMember],
    updates: &[WorkUpdateDetail],
    window: ReportWindow,
) -> ProjectMetrics {
    let mut metrics = ProjectMetrics {
        total_tasks: tasks.len(),
        ..Default::default()
    };
    let today = window.end.date_naive();

    for task in tasks {
        match task.status.parse::<TaskStatus>() {
            Ok(TaskStatus::Todo) => metrics.todo += 1,
            Ok(TaskStatus::InProgress) => metrics.in_progress += 1,
            Ok(TaskStatus::Blocked) => metrics.blocked += 1,
            Ok(TaskStatus::Done) => metrics.done += 1,
            Err(_) => {}
        }
        if task.is_overdue(today) {
            metrics.overdue_tasks += 1;
        }
        if task.is_done() && task.completed_at.is_some_and(|at| window.contains(at)) {
            metrics.completed_in_window += 1;
        }
    }

    if metrics.total_tasks > 0 {
        let rate = metrics.done as f64 / metrics.total_tasks as f64;
        metrics.completion_rate = (rate * 100.0).round() / 100.0;
    }

    let in_window: Vec<&WorkUpdateDetail> = updates
        .iter()
        .filter(|u| window.contains(u.created_at))
        .collect();
    metrics.updates_in_window = in_window.len();
    metrics.hours_logged = in_window.iter().filter_map(|u| u.hours_spent).sum();

    let contributors: HashSet<_> = in_window.iter().map(|u| u.user_id).collect();
    metrics.active_contributors = contributors.len();
    metrics.silent_members = members
        .iter()
        .filter(|m| !contributors.contains(&m.user_id))
        .map(|m| m.full_name.clone())
        .collect();

    metrics
}

/// Health judged from numbers alone.
pub fn derive_health(metrics: &ProjectMetrics) -> ReportHealth {
    let open = metrics.open_tasks();
    let mostly_blocked = open > 0 && metrics.blocked * 2 >= open && metrics.blocked > 0;

    if metrics.overdue_tasks >= OFF_TRACK_OVERDUE || mostly_blocked {
        ReportHealth::OffTrack
    } else if metrics.overdue_tasks > 0 || metrics.blocked > 0 {
        ReportHealth::AtRisk
    } else {
        ReportHealth::OnTrack
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::project::TaskPriority;
    use chrono::{Duration, NaiveDate, TimeZone};
    use uuid::Uuid;

    fn window() -> ReportWindow {
        let end = Utc.with_ymd_and_hms(2024, 5, 10, 18, 0, 0).unwrap();
        ReportWindow {
            start: end - Duration::hours(24),
            end,
        }
    }

    fn task(status: TaskStatus) -> TaskRow {
        TaskRow {
            id: Uuid::new_v4(),
            project_id: Uuid::nil(),
            title: "task".into(),
            description: String::new(),
            assignee_id: None,
            status: status.as_str().into(),
            priority: TaskPriority::Medium.as_str().into(),
            due_date: None,
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn member(name: &str) -> ProjectMember {
        ProjectMember {
            user_id: Uuid::new_v4(),
            email: format!("{name}@x.co"),
            full_name: name.into(),
            role: "employee".into(),
            added_at: Utc::now(),
        }
    }

    fn update(user_id: Uuid, at: DateTime<Utc>, hours: Option<f64>) -> WorkUpdateDetail {
        WorkUpdateDetail {
            id: Uuid::new_v4(),
            user_id,
            author_name: "someone".into(),
            task_id: None,
            task_title: None,
            content: "worked".into(),
            hours_spent: hours,
            created_at: at,
        }
    }

    #[test]
    fn test_empty_project() {
        let metrics = compute_metrics(&[], &[], &[], window());
        assert_eq!(metrics.total_tasks, 0);
        assert_eq!(metrics.completion_rate, 0.0);
        assert!(!metrics.has_activity());
        assert_eq!(derive_health(&metrics), ReportHealth::OnTrack);
    }

    #[test]
    fn test_status_counts_and_completion_rate() {
        let tasks = vec![
            task(TaskStatus::Todo),
            task(TaskStatus::InProgress),
            task(TaskStatus::Done),
        ];
        let metrics = compute_metrics(&tasks, &[], &[], window());
        assert_eq!((metrics.todo, metrics.in_progress, metrics.done), (1, 1, 1));
        assert_eq!(metrics.completion_rate, 0.33);
        assert_eq!(metrics.open_tasks(), 2);
    }

    #[test]
    fn test_completed_in_window_respects_bounds() {
        let w = window();
        let mut inside = task(TaskStatus::Done);
        inside.completed_at = Some(w.end - Duration::hours(1));
        let mut at_start = task(TaskStatus::Done);
        at_start.completed_at = Some(w.start);
        let mut at_end = task(TaskStatus::Done);
        at_end.completed_at = Some(w.end);

        let metrics = compute_metrics(&[inside, at_start, at_end], &[], &[], w);
        assert_eq!(metrics.completed_in_window, 2);
        assert!(metrics.has_activity());
    }

    #[test]
    fn test_overdue_uses_window_end_date() {
        let mut late = task(TaskStatus::InProgress);
        late.due_date = NaiveDate::from_ymd_opt(2024, 5, 9);
        let mut due_today = task(TaskStatus::Todo);
        due_today.due_date = NaiveDate::from_ymd_opt(2024, 5, 10);
        let metrics = compute_metrics(&[late, due_today], &[], &[], window());
        assert_eq!(metrics.overdue_tasks, 1);
        assert_eq!(derive_health(&metrics), ReportHealth::AtRisk);
    }

    #[test]
    fn test_updates_hours_and_contributors() {
        let w = window();
        let alice = member("alice");
        let bob = member("bob");
        let updates = vec![
            update(alice.user_id, w.end - Duration::hours(2), Some(3.5)),
            update(alice.user_id, w.end - Duration::hours(1), None),
            update(bob.user_id, w.start - Duration::hours(1), Some(8.0)),
        ];
        let metrics = compute_metrics(&[], &[alice, bob], &updates, w);
        assert_eq!(metrics.updates_in_window, 2);
        assert_eq!(metrics.hours_logged, 3.5);
        assert_eq!(metrics.active_contributors, 1);
        assert_eq!(metrics.silent_members, vec!["bob".to_string()]);
    }

    #[test]
    fn test_health_thresholds() {
        let mut metrics = ProjectMetrics {
            total_tasks: 4,
            todo: 2,
            blocked: 1,
            done: 1,
            ..Default::default()
        };
        // 1 blocked of 3 open
        assert_eq!(derive_health(&metrics), ReportHealth::AtRisk);

        metrics.blocked = 2;
        metrics.todo = 1;
        // 2 blocked of 3 open
        assert_eq!(derive_health(&metrics), ReportHealth::OffTrack);

        metrics.blocked = 0;
        metrics.todo = 3;
        metrics.overdue_tasks = 3;
        assert_eq!(derive_health(&metrics), ReportHealth::OffTrack);
    }
}
