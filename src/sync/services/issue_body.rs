//! Rendering of issue bodies from board tasks.

use minijinja::{Environment, context};

use super::{SyncError, SyncResult};
use crate::sync::domain::{BoardTask, IssueDraft, IssueState, Observation};

/// Template that renders the task description verbatim.
pub const DEFAULT_ISSUE_BODY_TEMPLATE: &str =
    "{% if description %}{{ description }}{% endif %}";

/// Issue body template with `title`, `description`, `task_id` and `team_id`
/// in scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueBodyTemplate {
    source: String,
}

impl Default for IssueBodyTemplate {
    fn default() -> Self {
        Self {
            source: DEFAULT_ISSUE_BODY_TEMPLATE.to_owned(),
        }
    }
}

impl IssueBodyTemplate {
    /// Compiles a template.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Template`] when the source does not parse.
    pub fn new(source: impl Into<String>) -> SyncResult<Self> {
        let text: String = source.into();
        Environment::new()
            .template_from_str(&text)
            .map_err(|err| SyncError::Template(err.to_string()))?;
        Ok(Self { source: text })
    }

    /// Builds the issue payload mirroring `task`.
    ///
    /// A completed task maps to a closed issue.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Template`] when rendering fails and
    /// [`SyncError::Validation`] for a blank title.
    pub fn draft_for(&self, task: &BoardTask) -> SyncResult<IssueDraft> {
        let env = Environment::new();
        let body = env
            .render_str(
                &self.source,
                context! {
                    title => task.title(),
                    description => task.description(),
                    task_id => task.id().value(),
                    team_id => task.team_id().value(),
                },
            )
            .map_err(|err| SyncError::Template(err.to_string()))?;
        Ok(IssueDraft::new(task.title())?
            .with_body(body)
            .with_state(IssueState::from_completed(task.is_completed())))
    }

    /// Observes the local side of a mapping as the issue it would produce.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::draft_for`] failures.
    pub fn observe(&self, task: &BoardTask) -> SyncResult<(IssueDraft, Observation)> {
        let draft = self.draft_for(task)?;
        let observation = Observation::of(&draft.content(), task.updated_at());
        Ok((draft, observation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::domain::{TaskId, TeamId};
    use chrono::Utc;

    fn task() -> BoardTask {
        BoardTask::new(
            TaskId::new(42).expect("task"),
            TeamId::new(7).expect("team"),
            "Fix login",
            Utc::now(),
        )
    }

    #[test]
    fn default_template_mirrors_task_content() {
        let described = task().with_description("Steps to reproduce");
        let draft = IssueBodyTemplate::default()
            .draft_for(&described)
            .expect("draft");

        assert_eq!(draft.body(), Some("Steps to reproduce"));
        assert_eq!(draft.content(), described.content());
    }

    #[test]
    fn missing_description_renders_no_body() {
        let draft = IssueBodyTemplate::default()
            .draft_for(&task().completed())
            .expect("draft");

        assert_eq!(draft.body(), None);
        assert_eq!(draft.state(), IssueState::Closed);
    }

    #[test]
    fn custom_template_sees_task_fields() {
        let template =
            IssueBodyTemplate::new("{{ description }}\n\nBoard task #{{ task_id }}").expect("template");
        let draft = template
            .draft_for(&task().with_description("Details"))
            .expect("draft");

        assert_eq!(draft.body(), Some("Details\n\nBoard task #42"));
    }

    #[test]
    fn malformed_template_is_rejected() {
        assert!(matches!(
            IssueBodyTemplate::new("{% if %}"),
            Err(SyncError::Template(_))
        ));
    }
}
