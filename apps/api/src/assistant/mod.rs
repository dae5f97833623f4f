// LLM chat assistant shared by every role. The persona, and with it the
// system prompt and the workspace data the model sees, follows the caller's role.

pub mod context;
pub mod handlers;
pub mod prompts;
pub mod sessions;

use crate::models::text_enum;
use crate::models::user::Role;

text_enum!(
    Persona {
        Operations => "operations",
        Hr => "hr",
        Project => "project",
        Workplace => "workplace",
    }
);

impl Persona {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Admin => Persona::Operations,
            Role::Hr => Persona::Hr,
            Role::Pm => Persona::Project,
            Role::Employee => Persona::Workplace,
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            Persona::Operations => prompts::OPERATIONS_SYSTEM,
            Persona::Hr => prompts::HR_SYSTEM,
            Persona::Project => prompts::PROJECT_SYSTEM,
            Persona::Workplace => prompts::WORKPLACE_SYSTEM,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_role_has_its_own_persona() {
        let personas: Vec<Persona> = [Role::Admin, Role::Hr, Role::Pm, Role::Employee]
            .into_iter()
            .map(Persona::for_role)
            .collect();
        assert_eq!(
            personas,
            vec![Persona::Operations, Persona::Hr, Persona::Project, Persona::Workplace]
        );
        for p in &personas {
            assert!(!p.system_prompt().is_empty());
        }
    }
}
