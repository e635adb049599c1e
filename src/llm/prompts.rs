//! Plain-text activity prompt assembly. Pure string construction, no IO.

use super::GenerationContext;

/// Build the provider-agnostic prompt for an activity description. Sections
/// are joined with blank lines; the closing instruction block picks up an
/// extra role-specific bullet when the user's position is recognized.
pub fn build_activity_prompt(
    base_instruction: &str,
    user_input: &str,
    context: Option<&GenerationContext>,
) -> String {
    let mut parts: Vec<String> = vec![base_instruction.to_string()];

    if let Some(ctx) = context {
        if let Some(position) = &ctx.user_position {
            parts.push(format!("User Role: {position}"));
        }
        if let Some(project) = &ctx.project_name {
            parts.push(format!("Project: {project}"));
        }
        if let Some(date) = &ctx.date {
            parts.push(format!("Date: {date}"));
        }
        if let Some(hours) = ctx.estimated_hours {
            parts.push(format!("Estimated hours: {hours}"));
        }
    }

    parts.push(format!("User input: {user_input}"));

    let mut instructions: Vec<&str> = vec![
        "\nGenerate a clear, professional activity description that:",
        "- Is specific and actionable",
        "- Uses professional language",
        "- Includes relevant technical details if applicable",
        "- Is suitable for project management tracking",
        "- Is concise but informative",
    ];

    if let Some(line) = context
        .and_then(|c| c.user_position.as_deref())
        .and_then(role_instruction)
    {
        instructions.push(line);
    }

    parts.push(instructions.join("\n"));
    parts.join("\n\n")
}

/// Extra instruction bullet for a recognized role. Matching is on substrings
/// of the lowercased position name, first hit wins in this order.
pub(crate) fn role_instruction(position: &str) -> Option<&'static str> {
    let p = position.to_lowercase();
    if p.contains("backend") || p.contains("be") {
        Some("- Focuses on backend/server-side work (APIs, databases, services)")
    } else if p.contains("frontend") || p.contains("fe") {
        Some("- Focuses on frontend/client-side work (UI, UX, components)")
    } else if p.contains("devops") {
        Some("- Focuses on infrastructure, deployment, and operations")
    } else if p.contains("qa") || p.contains("quality") {
        Some("- Focuses on testing, quality assurance, and bug reporting")
    } else if p.contains("design") || p.contains("ui") {
        Some("- Focuses on design, user experience, and visual elements")
    } else if p.contains("mobile") {
        Some("- Focuses on mobile development and platform-specific features")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "Generate a professional daily activity description based on the following information:";

    #[test]
    fn minimal_prompt_has_input_and_instructions() {
        let prompt = build_activity_prompt(BASE, "fixed the login bug", None);
        assert!(prompt.starts_with(BASE));
        assert!(prompt.contains("User input: fixed the login bug"));
        assert!(prompt.contains("- Is specific and actionable"));
        assert!(!prompt.contains("User Role:"));
        assert!(!prompt.contains("Project:"));
    }

    #[test]
    fn context_lines_appear_in_order() {
        let ctx = GenerationContext {
            user_position: Some("Backend Developer".to_string()),
            project_name: Some("Alpha".to_string()),
            date: Some("2025-03-14".to_string()),
            estimated_hours: Some(4.5),
            ..Default::default()
        };
        let prompt = build_activity_prompt(BASE, "wrote migrations", Some(&ctx));

        let role_at = prompt.find("User Role: Backend Developer").unwrap();
        let project_at = prompt.find("Project: Alpha").unwrap();
        let date_at = prompt.find("Date: 2025-03-14").unwrap();
        let hours_at = prompt.find("Estimated hours: 4.5").unwrap();
        let input_at = prompt.find("User input: wrote migrations").unwrap();
        assert!(role_at < project_at);
        assert!(project_at < date_at);
        assert!(date_at < hours_at);
        assert!(hours_at < input_at);
    }

    #[test]
    fn backend_role_adds_backend_bullet() {
        let ctx = GenerationContext {
            user_position: Some("Backend Developer".to_string()),
            ..Default::default()
        };
        let prompt = build_activity_prompt(BASE, "x", Some(&ctx));
        assert!(prompt.contains("- Focuses on backend/server-side work (APIs, databases, services)"));
    }

    #[test]
    fn designer_role_adds_design_bullet() {
        let ctx = GenerationContext {
            user_position: Some("UX Designer".to_string()),
            ..Default::default()
        };
        let prompt = build_activity_prompt(BASE, "x", Some(&ctx));
        assert!(prompt.contains("- Focuses on design, user experience, and visual elements"));
    }

    #[test]
    fn unrecognized_role_adds_no_bullet() {
        assert_eq!(role_instruction("Astronaut"), None);
        let ctx = GenerationContext {
            user_position: Some("Astronaut".to_string()),
            ..Default::default()
        };
        let prompt = build_activity_prompt(BASE, "x", Some(&ctx));
        assert!(prompt.ends_with("- Is concise but informative"));
    }

    #[test]
    fn role_matching_precedence() {
        // "be" substring catches short backend spellings before anything else
        assert_eq!(
            role_instruction("BE Engineer"),
            Some("- Focuses on backend/server-side work (APIs, databases, services)")
        );
        assert_eq!(
            role_instruction("QA Analyst"),
            Some("- Focuses on testing, quality assurance, and bug reporting")
        );
        assert_eq!(
            role_instruction("Mobile Developer"),
            Some("- Focuses on mobile development and platform-specific features")
        );
        assert_eq!(
            role_instruction("DevOps Engineer"),
            Some("- Focuses on infrastructure, deployment, and operations")
        );
        assert_eq!(
            role_instruction("Frontend Developer"),
            Some("- Focuses on frontend/client-side work (UI, UX, components)")
        );
    }

    #[test]
    fn prompt_is_deterministic() {
        let ctx = GenerationContext {
            user_position: Some("DevOps Engineer".to_string()),
            project_name: Some("Infra".to_string()),
            ..Default::default()
        };
        let a = build_activity_prompt(BASE, "rotated certs", Some(&ctx));
        let b = build_activity_prompt(BASE, "rotated certs", Some(&ctx));
        assert_eq!(a, b);
    }
}
