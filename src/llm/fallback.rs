//! Local template generation used when no AI provider is configured, a
//! provider call fails, or structured output cannot be parsed. Deterministic
//! and dependency-free so it can never itself fail.

use super::{GenerationContext, GenerationResult, StructuredTaskResult, TaskData, TaskType};

/// Template activity description: `Worked on <project>: <input>` when a
/// project is known, `Worked on: <input>` otherwise.
pub fn activity(user_input: &str, context: Option<&GenerationContext>) -> GenerationResult {
    let description = match context.and_then(|c| c.project_name.as_deref()) {
        Some(project) => format!("Worked on {project}: {user_input}"),
        None => format!("Worked on: {user_input}"),
    };

    GenerationResult {
        success: true,
        description: Some(description),
        model_used: Some("fallback".to_string()),
        provider: Some("local".to_string()),
        token_usage: None,
        is_fallback: true,
        error: None,
        fallback_description: None,
    }
}

/// Template backlog item wrapped in a successful result.
pub fn task(
    user_input: &str,
    context: Option<&GenerationContext>,
    task_type: TaskType,
) -> StructuredTaskResult {
    StructuredTaskResult {
        success: true,
        task_data: Some(task_data(user_input, context, task_type)),
        model_used: Some("fallback".to_string()),
        provider: Some("local".to_string()),
        task_type,
        is_fallback: true,
        error: None,
        fallback_task: None,
    }
}

/// Template backlog item. Priority is derived from the task type; everything
/// else is a fixed placeholder the user is expected to review.
pub fn task_data(
    user_input: &str,
    context: Option<&GenerationContext>,
    task_type: TaskType,
) -> TaskData {
    let priority = match task_type {
        TaskType::BugFix => "High",
        TaskType::Feature | TaskType::Improvement => "Medium",
        TaskType::TechnicalDebt | TaskType::Research => "Low",
    };

    let component = context
        .and_then(|c| c.project_name.clone())
        .unwrap_or_else(|| "General".to_string());

    TaskData {
        title: format!("{}: {}", task_type.title_case(), user_input),
        description: format!(
            "Task: {user_input}\n\nThis task was generated using fallback mode. \
             Please review and enhance the description with more details."
        ),
        acceptance_criteria: vec![
            "Task is completed successfully".to_string(),
            "Code is reviewed and tested".to_string(),
            "Documentation is updated if needed".to_string(),
        ],
        story_points: "3".to_string(),
        priority: priority.to_string(),
        labels: vec![task_type.label().to_string(), "fallback".to_string()],
        component,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_with_project(name: &str) -> GenerationContext {
        GenerationContext {
            project_name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn activity_without_project() {
        let r = activity("fix bug", None);
        assert!(r.success);
        assert!(r.is_fallback);
        assert_eq!(r.description.as_deref(), Some("Worked on: fix bug"));
        assert_eq!(r.provider.as_deref(), Some("local"));
        assert_eq!(r.model_used.as_deref(), Some("fallback"));
        assert!(r.token_usage.is_none());
    }

    #[test]
    fn activity_with_project() {
        let ctx = ctx_with_project("Alpha");
        let r = activity("fix bug", Some(&ctx));
        assert_eq!(r.description.as_deref(), Some("Worked on Alpha: fix bug"));
    }

    #[test]
    fn task_priority_follows_type() {
        assert_eq!(task_data("x", None, TaskType::BugFix).priority, "High");
        assert_eq!(task_data("x", None, TaskType::Feature).priority, "Medium");
        assert_eq!(task_data("x", None, TaskType::Improvement).priority, "Medium");
        assert_eq!(task_data("x", None, TaskType::TechnicalDebt).priority, "Low");
        assert_eq!(task_data("x", None, TaskType::Research).priority, "Low");
    }

    #[test]
    fn task_title_uses_title_case_type() {
        let t = task_data("fix login bug", None, TaskType::BugFix);
        assert_eq!(t.title, "Bug Fix: fix login bug");

        let t = task_data("audit queries", None, TaskType::TechnicalDebt);
        assert_eq!(t.title, "Technical Debt: audit queries");
    }

    #[test]
    fn task_labels_and_component() {
        let t = task_data("x", None, TaskType::BugFix);
        assert_eq!(t.labels, vec!["bug-fix".to_string(), "fallback".to_string()]);
        assert_eq!(t.component, "General");
        assert_eq!(t.story_points, "3");
        assert_eq!(t.acceptance_criteria.len(), 3);

        let ctx = ctx_with_project("Billing");
        let t = task_data("x", Some(&ctx), TaskType::Feature);
        assert_eq!(t.component, "Billing");
    }

    #[test]
    fn task_result_is_successful_fallback() {
        let r = task("x", None, TaskType::Research);
        assert!(r.success);
        assert!(r.is_fallback);
        assert!(r.error.is_none());
        assert!(r.task_data.is_some());
        assert!(r.fallback_task.is_none());
    }
}
