//! Drill-down context: application, findings context, finding, data path.
//!
//! Each level owns the level below it, so leaving a level drops everything
//! beneath it. The session bumps the generations of the dropped scopes so
//! their in-flight fetches are discarded on arrival.

use veracode_api::{
    AnnotationAction, AnnotationResponse, Application, DataPath, Finding, Sandbox, ScanType,
    StaticFlawInfo,
};

use super::filters::{FindingFilters, TextInput};
use super::list::PagedList;
use super::request::FindingCounts;
use super::scope::ScopeState;

/// Where findings are listed: the policy scope or one sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindingsContext {
    Policy,
    Sandbox { guid: String, name: String },
}

impl FindingsContext {
    /// Value of the `context` parameter
    #[must_use]
    pub fn guid(&self) -> Option<&str> {
        match self {
            FindingsContext::Policy => None,
            FindingsContext::Sandbox { guid, .. } => Some(guid),
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            FindingsContext::Policy => "Policy",
            FindingsContext::Sandbox { name, .. } => name,
        }
    }
}

/// Selected application and what was opened beneath it.
#[derive(Debug, Clone)]
pub struct ApplicationLevel {
    /// Snapshot taken at selection time
    pub application: Application,
    pub sandboxes: ScopeState<Vec<Sandbox>>,
    /// Row 0 is the policy context, rows 1.. are sandboxes
    pub context_row: usize,
    pub findings: Option<FindingsLevel>,
}

impl ApplicationLevel {
    #[must_use]
    pub fn new(application: Application) -> Self {
        Self {
            application,
            sandboxes: ScopeState::Idle,
            context_row: 0,
            findings: None,
        }
    }

    /// Number of selectable context rows
    #[must_use]
    pub fn context_count(&self) -> usize {
        1 + self.sandboxes.loaded().map_or(0, Vec::len)
    }

    pub fn move_context(&mut self, delta: isize) {
        let last = self.context_count() - 1;
        self.context_row = self.context_row.saturating_add_signed(delta).min(last);
    }

    /// Context under the selection cursor
    #[must_use]
    pub fn selected_context(&self) -> FindingsContext {
        match self.context_row.checked_sub(1) {
            None => FindingsContext::Policy,
            Some(index) => self
                .sandboxes
                .loaded()
                .and_then(|sandboxes| sandboxes.get(index))
                .map_or(FindingsContext::Policy, |sandbox| FindingsContext::Sandbox {
                    guid: sandbox.guid.clone(),
                    name: sandbox.name.clone(),
                }),
        }
    }
}

/// Findings listing of one context.
#[derive(Debug, Clone)]
pub struct FindingsLevel {
    pub context: FindingsContext,
    pub list: PagedList<FindingFilters, Finding>,
    /// Unfiltered totals per scan type
    pub counts: ScopeState<FindingCounts>,
    pub finding: Option<FindingLevel>,
}

impl FindingsLevel {
    #[must_use]
    pub fn new(context: FindingsContext, page_size: u32) -> Self {
        Self {
            context,
            list: PagedList::new(page_size),
            counts: ScopeState::Idle,
            finding: None,
        }
    }
}

/// Selected finding with its data paths and annotation form.
#[derive(Debug, Clone)]
pub struct FindingLevel {
    /// Snapshot taken at selection time
    pub finding: Finding,
    pub data_paths: ScopeState<StaticFlawInfo>,
    pub path_index: usize,
    pub showing_paths: bool,
    pub annotation_form: Option<AnnotationForm>,
    pub annotation: ScopeState<AnnotationResponse>,
}

impl FindingLevel {
    #[must_use]
    pub fn new(finding: Finding) -> Self {
        Self {
            finding,
            data_paths: ScopeState::Idle,
            path_index: 0,
            showing_paths: false,
            annotation_form: None,
            annotation: ScopeState::Idle,
        }
    }

    #[must_use]
    pub fn has_data_paths(&self) -> bool {
        self.finding.scan_type == ScanType::Static
    }

    #[must_use]
    pub fn path_count(&self) -> usize {
        self.data_paths.loaded().map_or(0, |info| info.data_paths.len())
    }

    #[must_use]
    pub fn current_path(&self) -> Option<&DataPath> {
        self.data_paths
            .loaded()
            .and_then(|info| info.data_paths.get(self.path_index))
    }

    /// Step through data paths; out of range is a no-op returning `false`.
    pub fn step_path(&mut self, delta: isize) -> bool {
        let count = self.path_count();
        match self.path_index.checked_add_signed(delta) {
            Some(target) if target < count && target != self.path_index => {
                self.path_index = target;
                true
            }
            _ => false,
        }
    }
}

/// Annotation being composed for the selected finding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationForm {
    action_index: usize,
    pub comment: TextInput,
}

impl AnnotationForm {
    #[must_use]
    pub fn action(&self) -> AnnotationAction {
        AnnotationAction::ALL[self.action_index % AnnotationAction::ALL.len()]
    }

    /// Cycle through the annotation actions, wrapping at both ends.
    pub fn cycle_action(&mut self, delta: isize) {
        let len = AnnotationAction::ALL.len() as isize;
        let next = (self.action_index as isize + delta).rem_euclid(len);
        self.action_index = next as usize;
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    fn static_finding() -> Finding {
        serde_json::from_value(serde_json::json!({
            "issue_id": 7,
            "scan_type": "STATIC",
            "finding_details": {"severity": 4}
        }))
        .expect("finding decodes")
    }

    #[test]
    fn test_context_rows() {
        let mut level = ApplicationLevel::new(Application::default());
        level.move_context(5);
        assert_eq!(level.context_row, 0);
        assert_eq!(level.selected_context(), FindingsContext::Policy);

        level.sandboxes = ScopeState::Loaded(vec![Sandbox {
            guid: "sb-1".into(),
            name: "feature-x".into(),
            ..Sandbox::default()
        }]);
        level.move_context(5);
        assert_eq!(level.context_row, 1);
        let context = level.selected_context();
        assert_eq!(context.guid(), Some("sb-1"));
        assert_eq!(context.label(), "feature-x");
    }

    #[test]
    fn test_path_navigation_is_bounded() {
        let mut level = FindingLevel::new(static_finding());
        assert!(level.has_data_paths());
        assert!(!level.step_path(1));

        level.data_paths = ScopeState::Loaded(StaticFlawInfo {
            issue_summary: None,
            data_paths: vec![DataPath::default(), DataPath::default()],
        });
        assert!(!level.step_path(-1));
        assert!(level.step_path(1));
        assert!(!level.step_path(1));
        assert_eq!(level.path_index, 1);
        assert!(level.current_path().is_some());
    }

    #[test]
    fn test_annotation_action_cycles() {
        let mut form = AnnotationForm::default();
        assert_eq!(form.action(), AnnotationAction::Comment);
        form.cycle_action(-1);
        assert_eq!(form.action(), AnnotationAction::AcceptRisk);
        form.cycle_action(2);
        assert_eq!(form.action(), AnnotationAction::FalsePositive);
    }
}
