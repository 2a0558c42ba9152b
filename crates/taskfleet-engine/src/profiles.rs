use std::collections::HashMap;
use taskfleet_core::AgentRole;

/// Persona and home hub of one worker role.
#[derive(Debug, Clone)]
pub struct RoleProfile {
    /// The role this profile describes.
    pub role: AgentRole,
    /// Display name the bootstrap agent gets.
    pub agent_name: String,
    /// Hub where this role's subtasks are executed.
    pub home_hub: String,
    /// System prompt for the role's reasoning calls.
    pub persona: String,
}

const ENVELOPE_GUIDE: &str = r#"Always answer with a single JSON object:
{"thinking": "...", "saying": "...", "doing": "...", "toAgent": null,
 "output": {"kind": "...", ...}, "needsHelp": null, "helpTopic": null}
Keep "saying" under 15 words. Put your actual work product in "output"."#;

fn persona(role_line: &str, output_line: &str) -> String {
    format!("{role_line}\n{output_line}\n\n{ENVELOPE_GUIDE}")
}

/// The default fleet: one agent per role, each with a persona and a home
/// hub matching the default [`HubRegistry::seed`] layout.
///
/// [`HubRegistry::seed`]: taskfleet_world::HubRegistry::seed
pub fn default_profiles() -> HashMap<AgentRole, RoleProfile> {
    let profiles = [
        RoleProfile {
            role: AgentRole::Planner,
            agent_name: "Nora".into(),
            home_hub: "planning_desk".into(),
            persona: persona(
                "You are Nora, the planner of a small software team.",
                "You break a request into an ordered list of steps, one per teammate role.",
            ),
        },
        RoleProfile {
            role: AgentRole::Designer,
            agent_name: "Iris".into(),
            home_hub: "design_studio".into(),
            persona: persona(
                "You are Iris, the designer of a small software team.",
                r#"Your "output" is {"kind": "design", "spec": "..."}."#,
            ),
        },
        RoleProfile {
            role: AgentRole::Coder,
            agent_name: "Felix".into(),
            home_hub: "build_bay".into(),
            persona: persona(
                "You are Felix, the coder of a small software team.",
                r#"Your "output" is {"kind": "code", "files": [{"path": "...", "content": "..."}]}."#,
            ),
        },
        RoleProfile {
            role: AgentRole::Tester,
            agent_name: "Tess".into(),
            home_hub: "test_bench".into(),
            persona: persona(
                "You are Tess, the tester of a small software team.",
                r#"Your "output" is {"kind": "text", "content": "..."} describing what you verified."#,
            ),
        },
        RoleProfile {
            role: AgentRole::Reviewer,
            agent_name: "Rhea".into(),
            home_hub: "review_corner".into(),
            persona: persona(
                "You are Rhea, the reviewer of a small software team.",
                r#"Your "output" is {"kind": "review", "verdict": "...", "notes": "..."}."#,
            ),
        },
    ];
    profiles.into_iter().map(|p| (p.role, p)).collect()
}

/// Prompt sent to the planner to decompose a task.
///
/// The reply must contain a JSON array of `{role, description}` steps;
/// anything else fails the task.
pub fn plan_prompt(task_prompt: &str) -> String {
    format!(
        r#"Break the following request into an ordered list of steps.
Each step is done by exactly one teammate: designer, coder, tester, or reviewer.
Answer with a JSON array only, for example:
[{{"role": "designer", "description": "..."}}, {{"role": "coder", "description": "..."}}]

Request: {task_prompt}"#
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_every_role_has_a_profile() {
        let profiles = default_profiles();
        for role in AgentRole::ALL {
            let profile = profiles.get(&role).unwrap();
            assert_eq!(profile.role, role);
            assert!(!profile.home_hub.is_empty());
            assert!(profile.persona.contains("JSON"));
        }
    }

    #[test]
    fn test_plan_prompt_embeds_request() {
        let prompt = plan_prompt("build a landing page");
        assert!(prompt.contains("build a landing page"));
        assert!(prompt.contains("JSON array"));
    }
}
