//! Structured backlog-item prompt assembly. Combines a base instruction with
//! role guidance, task-type guidance, caller context, and two worked examples
//! for few-shot steering. Pure string construction, no IO.

use super::{GenerationContext, TaskData, TaskType};

/// Base instruction shared by every structured request. Defines the JSON
/// shape providers must emit.
const JIRA_TASK_PROMPT: &str = r#"You are an expert product manager and technical writer who specializes in creating clear, actionable task descriptions for project management tools like Jira, Azure DevOps, and Taiga.

Your task is to transform brief user inputs into professional, detailed task descriptions that follow agile/scrum best practices.

TASK DESCRIPTION STRUCTURE:
1. **Clear Title**: Concise, action-oriented title (max 60 characters)
2. **Description**: Detailed explanation with context
3. **Acceptance Criteria**: Specific, testable requirements
4. **Technical Notes**: Implementation details when applicable
5. **Priority/Impact**: Business value and urgency context

WRITING GUIDELINES:
- Use action verbs (implement, fix, create, update, optimize)
- Be specific about what needs to be done
- Include user story format when applicable: "As a [user], I want [goal] so that [benefit]"
- Mention dependencies, risks, or blockers if relevant
- Use professional, clear language
- Include technical specifications when needed
- Consider accessibility, security, and performance implications

RESPONSE FORMAT:
Return a JSON structure with the following fields:
{
    "title": "Clear, actionable title",
    "description": "Detailed task description",
    "acceptance_criteria": ["Criterion 1", "Criterion 2", "Criterion 3"],
    "story_points": "Estimated complexity (1-13 fibonacci scale)",
    "priority": "High/Medium/Low",
    "labels": ["tag1", "tag2", "tag3"],
    "component": "System component affected"
}"#;

/// Role-specific guidance block. Keys are exact lowercase role identifiers,
/// not free-text position names.
fn position_guidance(position: &str) -> Option<&'static str> {
    match position {
        "backend" => Some(
            "BACKEND DEVELOPER FOCUS:\n\
             - Emphasize API design, database schemas, server architecture\n\
             - Include performance considerations, scalability, security\n\
             - Mention testing strategies (unit tests, integration tests)\n\
             - Consider data validation, error handling, logging\n\
             - Reference relevant frameworks, libraries, or services\n\
             - Include database migration needs if applicable",
        ),
        "frontend" => Some(
            "FRONTEND DEVELOPER FOCUS:\n\
             - Emphasize user interface, user experience, accessibility\n\
             - Include responsive design considerations\n\
             - Mention browser compatibility requirements\n\
             - Consider state management, component reusability\n\
             - Reference design systems, style guides\n\
             - Include testing strategies (unit tests, e2e tests)\n\
             - Consider performance optimization (bundle size, loading times)",
        ),
        "fullstack" => Some(
            "FULLSTACK DEVELOPER FOCUS:\n\
             - Balance frontend and backend considerations\n\
             - Emphasize end-to-end implementation\n\
             - Include integration between frontend and backend\n\
             - Consider data flow and API contracts\n\
             - Mention deployment and DevOps considerations",
        ),
        "qa" => Some(
            "QA ENGINEER FOCUS:\n\
             - Emphasize testing strategies and test cases\n\
             - Include quality metrics and acceptance criteria\n\
             - Consider test automation and CI/CD integration\n\
             - Mention performance testing, security testing\n\
             - Include regression testing considerations\n\
             - Reference testing tools and frameworks",
        ),
        "devops" => Some(
            "DEVOPS ENGINEER FOCUS:\n\
             - Emphasize infrastructure, deployment, monitoring\n\
             - Include scalability and reliability considerations\n\
             - Mention CI/CD pipeline improvements\n\
             - Consider security, compliance, backup strategies\n\
             - Include performance monitoring and alerting\n\
             - Reference cloud services, containerization",
        ),
        "product_manager" => Some(
            "PRODUCT MANAGER FOCUS:\n\
             - Emphasize business value and user impact\n\
             - Include market research, competitive analysis\n\
             - Mention success metrics and KPIs\n\
             - Consider user feedback and stakeholder requirements\n\
             - Include rollout strategy and feature flags\n\
             - Reference user analytics and A/B testing",
        ),
        "designer" => Some(
            "UX/UI DESIGNER FOCUS:\n\
             - Emphasize user research, personas, user journeys\n\
             - Include design systems, style guides, accessibility\n\
             - Mention usability testing and user feedback\n\
             - Consider responsive design and device compatibility\n\
             - Include design tools, prototyping, collaboration\n\
             - Reference design patterns and best practices",
        ),
        _ => None,
    }
}

fn task_type_guidance(task_type: TaskType) -> &'static str {
    match task_type {
        TaskType::BugFix => {
            "BUG FIX TASK:\n\
             - Clearly describe the current behavior vs expected behavior\n\
             - Include steps to reproduce the issue\n\
             - Mention affected users or systems\n\
             - Include error messages, logs, or screenshots\n\
             - Consider root cause analysis and prevention\n\
             - Include testing strategy to verify the fix"
        }
        TaskType::Feature => {
            "NEW FEATURE TASK:\n\
             - Describe the feature from user perspective\n\
             - Include business justification and expected impact\n\
             - Consider edge cases and error scenarios\n\
             - Mention integration with existing features\n\
             - Include design and technical specifications\n\
             - Consider rollout strategy and feature toggles"
        }
        TaskType::Improvement => {
            "IMPROVEMENT/ENHANCEMENT TASK:\n\
             - Describe current limitations or pain points\n\
             - Explain the proposed improvement and benefits\n\
             - Include performance metrics if applicable\n\
             - Consider backward compatibility\n\
             - Mention migration strategy if needed\n\
             - Include success criteria and measurements"
        }
        TaskType::TechnicalDebt => {
            "TECHNICAL DEBT TASK:\n\
             - Explain the current technical issue or limitation\n\
             - Describe the impact on development velocity or system performance\n\
             - Include refactoring strategy and approach\n\
             - Consider testing strategy to ensure no regressions\n\
             - Mention long-term benefits and maintainability\n\
             - Include migration plan if needed"
        }
        TaskType::Research => {
            "RESEARCH/SPIKE TASK:\n\
             - Define the research question or hypothesis\n\
             - Include success criteria and deliverables\n\
             - Mention timebox and scope limitations\n\
             - Consider different approaches or alternatives\n\
             - Include documentation and knowledge sharing plan\n\
             - Define next steps based on research outcomes"
        }
    }
}

struct Example {
    user_input: &'static str,
    position: &'static str,
    task_type: &'static str,
    expected: TaskData,
}

/// Two worked transformations included in every prompt for few-shot
/// steering.
fn examples() -> Vec<Example> {
    vec![
        Example {
            user_input: "fix login bug",
            position: "backend",
            task_type: "bug_fix",
            expected: TaskData {
                title: "Fix authentication failure on login endpoint".to_string(),
                description: "Users are experiencing login failures when attempting to authenticate through the /api/auth/login endpoint. The issue appears to be related to session management and affects approximately 15% of login attempts.\n\nAs a user, I want to be able to log in successfully so that I can access my account and use the application features.\n\nCurrent behavior: Login requests return 500 error intermittently\nExpected behavior: All valid login attempts should succeed with proper session creation".to_string(),
                acceptance_criteria: vec![
                    "All valid login attempts succeed with 2xx response".to_string(),
                    "Session is properly created and stored".to_string(),
                    "Error logging is implemented for failed attempts".to_string(),
                    "Unit tests cover the login flow".to_string(),
                    "Integration tests verify end-to-end authentication".to_string(),
                ],
                story_points: "5".to_string(),
                priority: "High".to_string(),
                labels: vec![
                    "bug".to_string(),
                    "authentication".to_string(),
                    "backend".to_string(),
                    "critical".to_string(),
                ],
                component: "Authentication Service".to_string(),
            },
        },
        Example {
            user_input: "create user dashboard",
            position: "frontend",
            task_type: "feature",
            expected: TaskData {
                title: "Implement user dashboard with activity overview".to_string(),
                description: "Create a comprehensive user dashboard that provides users with an overview of their recent activities, statistics, and quick access to key features.\n\nAs a user, I want to see a personalized dashboard when I log in so that I can quickly understand my current status and access important features.\n\nThe dashboard should be responsive, accessible, and provide a great user experience across all devices.".to_string(),
                acceptance_criteria: vec![
                    "Dashboard loads within 2 seconds".to_string(),
                    "Displays user's recent activities (last 10 items)".to_string(),
                    "Shows key statistics (total activities, hours logged, etc.)".to_string(),
                    "Includes quick action buttons for common tasks".to_string(),
                    "Responsive design works on mobile and desktop".to_string(),
                    "Meets WCAG 2.1 AA accessibility standards".to_string(),
                ],
                story_points: "8".to_string(),
                priority: "Medium".to_string(),
                labels: vec![
                    "feature".to_string(),
                    "dashboard".to_string(),
                    "frontend".to_string(),
                    "ui".to_string(),
                ],
                component: "User Interface".to_string(),
            },
        },
    ]
}

/// Assemble the full prompt for one structured request. `position` is the
/// lowercased role identifier; free-text position names that do not match a
/// known role simply get no role block.
pub fn build_task_prompt(
    user_input: &str,
    position: &str,
    task_type: TaskType,
    context: Option<&GenerationContext>,
) -> String {
    let mut parts: Vec<String> = vec![JIRA_TASK_PROMPT.to_string()];

    if let Some(guidance) = position_guidance(position) {
        parts.push(guidance.to_string());
    }
    parts.push(task_type_guidance(task_type).to_string());

    if let Some(ctx) = context {
        let mut info: Vec<String> = Vec::new();
        if let Some(project) = &ctx.project_name {
            info.push(format!("Project: {project}"));
        }
        if let Some(sprint) = &ctx.sprint {
            info.push(format!("Sprint: {sprint}"));
        }
        if let Some(epic) = &ctx.epic {
            info.push(format!("Epic: {epic}"));
        }
        if let Some(tickets) = &ctx.related_tickets {
            info.push(format!("Related tickets: {tickets}"));
        }
        if !info.is_empty() {
            parts.push(format!("CONTEXT:\n{}", info.join("\n")));
        }
    }

    parts.push("\nEXAMPLES:".to_string());
    for example in examples() {
        // Examples are fixed data; serialization of a plain struct cannot fail
        let rendered = serde_json::to_string_pretty(&example.expected)
            .unwrap_or_else(|_| "{}".to_string());
        parts.push(format!(
            "\nInput: \"{}\" (Position: {}, Type: {})\nOutput: {}\n",
            example.user_input, example.position, example.task_type, rendered
        ));
    }

    parts.push("\nNow, transform this user input into a professional task description:".to_string());
    parts.push(format!("User input: {user_input}"));
    if !position.is_empty() {
        parts.push(format!("Position: {position}"));
    }
    parts.push(format!("Task type: {}", task_type.as_str()));
    parts.push("\nGenerate the task description following the JSON format above:".to_string());

    parts.join("\n\n")
}
