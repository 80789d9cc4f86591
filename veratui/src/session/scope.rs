//! Fetch scopes, their sub-states and generation tickets.

use std::fmt;

/// Independent area of the session that loads its own data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Paged, filtered application listing
    ApplicationList,
    /// Selected application and its sandboxes
    ApplicationDetail,
    /// Findings of the selected policy or sandbox context
    FindingsList,
    /// Per scan type totals of the selected context
    FindingCounts,
    /// Selected finding
    FindingDetail,
    /// Static data paths of the selected finding
    DataPathView,
    /// Identity of the API principal shown in the header
    Principal,
    /// Result of the last annotation submission
    Annotation,
}

impl Scope {
    pub const ALL: [Scope; 8] = [
        Scope::ApplicationList,
        Scope::ApplicationDetail,
        Scope::FindingsList,
        Scope::FindingCounts,
        Scope::FindingDetail,
        Scope::DataPathView,
        Scope::Principal,
        Scope::Annotation,
    ];

    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Scope::ApplicationList => 0,
            Scope::ApplicationDetail => 1,
            Scope::FindingsList => 2,
            Scope::FindingCounts => 3,
            Scope::FindingDetail => 4,
            Scope::DataPathView => 5,
            Scope::Principal => 6,
            Scope::Annotation => 7,
        }
    }

    /// Scopes whose data depends on the selection made in `self`
    #[must_use]
    pub fn dependents(self) -> &'static [Scope] {
        match self {
            Scope::ApplicationList => &[
                Scope::ApplicationDetail,
                Scope::FindingsList,
                Scope::FindingCounts,
                Scope::FindingDetail,
                Scope::DataPathView,
                Scope::Annotation,
            ],
            Scope::ApplicationDetail => &[
                Scope::FindingsList,
                Scope::FindingCounts,
                Scope::FindingDetail,
                Scope::DataPathView,
                Scope::Annotation,
            ],
            Scope::FindingsList => &[Scope::FindingDetail, Scope::DataPathView, Scope::Annotation],
            Scope::FindingDetail => &[Scope::DataPathView],
            Scope::FindingCounts
            | Scope::DataPathView
            | Scope::Principal
            | Scope::Annotation => &[],
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scope::ApplicationList => "application list",
            Scope::ApplicationDetail => "application detail",
            Scope::FindingsList => "findings list",
            Scope::FindingCounts => "finding counts",
            Scope::FindingDetail => "finding detail",
            Scope::DataPathView => "data paths",
            Scope::Principal => "principal",
            Scope::Annotation => "annotation",
        };
        f.write_str(name)
    }
}

/// Stamp carried by every issued fetch and its completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub scope: Scope,
    pub generation: u64,
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.scope, self.generation)
    }
}

/// Per-scope, monotonically increasing request generations.
///
/// Only the ticket of the most recent `issue` or `invalidate` for a scope is
/// current; completions carrying any older ticket are stale.
#[derive(Debug, Clone, Default)]
pub struct Generations {
    counters: [u64; Scope::ALL.len()],
}

impl Generations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bump the scope's generation and return the ticket for a new fetch.
    pub fn issue(&mut self, scope: Scope) -> Ticket {
        let counter = &mut self.counters[scope.index()];
        *counter += 1;
        Ticket {
            scope,
            generation: *counter,
        }
    }

    /// Bump the generation without issuing, orphaning any in-flight fetch.
    pub fn invalidate(&mut self, scope: Scope) {
        self.counters[scope.index()] += 1;
    }

    /// Invalidate every scope that depends on `scope`.
    pub fn invalidate_dependents(&mut self, scope: Scope) {
        for dependent in scope.dependents() {
            self.invalidate(*dependent);
        }
    }

    #[must_use]
    pub fn current(&self, scope: Scope) -> u64 {
        self.counters[scope.index()]
    }

    #[must_use]
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.current(ticket.scope) == ticket.generation
    }
}

/// Load state of one scope.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ScopeState<T> {
    #[default]
    Idle,
    Loading,
    Loaded(T),
    /// Failure message shown to the operator
    Error(String),
}

impl<T> ScopeState<T> {
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, ScopeState::Idle)
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, ScopeState::Loading)
    }

    #[must_use]
    pub fn loaded(&self) -> Option<&T> {
        match self {
            ScopeState::Loaded(data) => Some(data),
            _ => None,
        }
    }

    pub fn loaded_mut(&mut self) -> Option<&mut T> {
        match self {
            ScopeState::Loaded(data) => Some(data),
            _ => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            ScopeState::Error(message) => Some(message),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_indices_are_unique() {
        for (i, scope) in Scope::ALL.iter().enumerate() {
            assert_eq!(scope.index(), i);
        }
    }

    #[test]
    fn test_newer_ticket_supersedes_older() {
        let mut generations = Generations::new();
        let first = generations.issue(Scope::ApplicationList);
        let second = generations.issue(Scope::ApplicationList);

        assert!(second.generation > first.generation);
        assert!(!generations.is_current(first));
        assert!(generations.is_current(second));
    }

    #[test]
    fn test_scopes_count_independently() {
        let mut generations = Generations::new();
        let apps = generations.issue(Scope::ApplicationList);
        let findings = generations.issue(Scope::FindingsList);
        generations.issue(Scope::FindingsList);

        assert!(generations.is_current(apps));
        assert!(!generations.is_current(findings));
    }

    #[test]
    fn test_invalidate_orphans_in_flight_ticket() {
        let mut generations = Generations::new();
        let ticket = generations.issue(Scope::DataPathView);
        generations.invalidate(Scope::DataPathView);
        assert!(!generations.is_current(ticket));
    }

    #[test]
    fn test_invalidate_dependents_leaves_parent_alone() {
        let mut generations = Generations::new();
        let list = generations.issue(Scope::FindingsList);
        let paths = generations.issue(Scope::DataPathView);
        let principal = generations.issue(Scope::Principal);

        generations.invalidate_dependents(Scope::ApplicationDetail);
        assert!(!generations.is_current(list));
        assert!(!generations.is_current(paths));
        assert!(generations.is_current(principal));
    }

    #[test]
    fn test_scope_state_accessors() {
        let loaded: ScopeState<u8> = ScopeState::Loaded(3);
        assert_eq!(loaded.loaded(), Some(&3));
        assert!(ScopeState::<u8>::Loading.is_loading());
        assert_eq!(ScopeState::<u8>::Error("boom".into()).error(), Some("boom"));
        assert!(ScopeState::<u8>::default().is_idle());
    }

    #[test]
    fn test_dependents_never_include_self() {
        for scope in Scope::ALL {
            assert!(!scope.dependents().contains(&scope));
        }
    }
}
