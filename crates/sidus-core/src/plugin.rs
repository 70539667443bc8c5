//! Plugins: bundles of registrations applied to an agent.
//!
//! A plugin typically registers a connector component and the skills that
//! use it. [`register_task_skills`] helps plugins assemble a task's skill
//! sequence from a mix of already-registered names and new skills.

use sidus_types::error::ConfigError;

use crate::inject::Executable;
use crate::runtime::Agent;

/// A bundle of registrations.
pub trait AgentPlugin {
    /// Name used in log output.
    fn name(&self) -> &str;

    /// Register components, skills, tasks and handlers on `agent`.
    fn apply(&self, agent: &mut Agent) -> Result<(), ConfigError>;
}

/// An entry in a task's skill sequence.
pub enum SkillRef {
    /// A skill that is, or will be, registered under this name.
    Name(String),
    /// A skill to register unless one with the same name already exists.
    Skill(Executable),
}

impl From<&str> for SkillRef {
    fn from(name: &str) -> Self {
        SkillRef::Name(name.to_string())
    }
}

impl From<String> for SkillRef {
    fn from(name: String) -> Self {
        SkillRef::Name(name)
    }
}

impl From<Executable> for SkillRef {
    fn from(skill: Executable) -> Self {
        SkillRef::Skill(skill)
    }
}

/// Resolve `skills` to registered names, registering new skills on the way.
///
/// Names pass through unchecked; unknown names surface when the agent is
/// built. A skill whose name is already registered is not registered again.
pub fn register_task_skills<I>(agent: &mut Agent, skills: I) -> Result<Vec<String>, ConfigError>
where
    I: IntoIterator<Item = SkillRef>,
{
    let mut names = Vec::new();
    for skill in skills {
        let name = match skill {
            SkillRef::Name(name) => name,
            SkillRef::Skill(executable) => match executable.name() {
                Some(name) if agent.context_mut()?.has_skill(name) => name.to_string(),
                _ => agent.add_skill(executable)?,
            },
        };
        names.push(name);
    }
    Ok(names)
}
