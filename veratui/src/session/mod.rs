//! Navigation and session state.
//!
//! [`Session`] is owned by the event loop and is the only place browsing
//! state lives. User input arrives as [`Intent`]s, work leaves through an
//! outbox of [`FetchRequest`]s and results come back as [`Completion`]s.
//! Nothing here performs I/O, so every transition can be driven directly
//! from tests.
//!
//! Each fetch is stamped with a per-scope generation. A completion is only
//! applied while its ticket is still the newest for that scope; anything
//! older is dropped, so results land in issue order rather than completion
//! order.

pub mod drilldown;
pub mod filters;
pub mod list;
pub mod request;
pub mod scope;

use log::{debug, info, warn};
use std::collections::HashMap;
use veracode_api::app::{APPLICATION_SCAN_TYPE_OPTIONS, SCAN_STATUS_OPTIONS};
use veracode_api::findings::MAX_SEVERITY;
use veracode_api::validation::{DATE_FORMAT, MAX_PAGE_SIZE};
use veracode_api::{AnnotationData, Application, PolicyFilter, Sandbox, VeracodeError};

pub use drilldown::{AnnotationForm, ApplicationLevel, FindingLevel, FindingsContext, FindingsLevel};
pub use filters::{
    ApplicationFilter, ApplicationFilters, FINDING_SCAN_TYPE_OPTIONS, FindingFilter,
    FindingFilters, PageCursor, TextInput,
};
pub use list::{PagedList, ResultPage, sort_by_modified};
pub use request::{Completion, FetchOutcome, FetchRequest, FindingCounts, Identity, describe_error};
pub use scope::{Generations, Scope, ScopeState, Ticket};

/// Control with keyboard focus on the application list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Table,
    Name,
    ScanStatus,
    ScanType,
    ModifiedAfter,
}

impl Focus {
    const ORDER: [Focus; 5] = [
        Focus::Name,
        Focus::ScanStatus,
        Focus::ScanType,
        Focus::ModifiedAfter,
        Focus::Table,
    ];

    fn step(self, delta: isize) -> Focus {
        let len = Self::ORDER.len() as isize;
        let position = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0) as isize;
        Self::ORDER[(position + delta).rem_euclid(len) as usize]
    }

    #[must_use]
    pub fn is_text_entry(self) -> bool {
        matches!(self, Focus::Name | Focus::ModifiedAfter)
    }
}

/// What the terminal currently shows, derived from the drill-down depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    ApplicationList,
    ApplicationDetail,
    FindingsList,
    FindingDetail,
    DataPaths,
    AnnotationForm,
}

/// Transient status line message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

impl Notice {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Notice::Info(text) | Notice::Error(text) => text,
        }
    }
}

/// Operator action, already decoupled from the key that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Quit,
    Back,
    Refresh,
    Focus(Focus),
    FocusNext,
    FocusPrevious,
    MoveSelection(isize),
    NextPage,
    PreviousPage,
    Open,
    Input(char),
    DeleteChar,
    Submit,
    /// Step the focused drop-down or the annotation action
    CycleOption(isize),
    CycleFindingScanType,
    CycleSeverity,
    CyclePolicy,
    ShowDataPaths,
    StepDataPath(isize),
    Annotate,
}

/// Browsing state of one operator session.
#[derive(Debug)]
pub struct Session {
    page_size: u32,
    generations: Generations,
    outbox: Vec<FetchRequest>,
    focus: Focus,
    name_input: TextInput,
    date_input: TextInput,
    notice: Option<Notice>,
    applications: PagedList<ApplicationFilters, Application>,
    identity: ScopeState<Identity>,
    sandbox_cache: HashMap<String, Vec<Sandbox>>,
    drill: Option<ApplicationLevel>,
    quit: bool,
}

impl Session {
    /// New session; nothing is fetched until [`Session::start`].
    #[must_use]
    pub fn new(page_size: u32) -> Self {
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        Self {
            page_size,
            generations: Generations::new(),
            outbox: Vec::new(),
            focus: Focus::Table,
            name_input: TextInput::default(),
            date_input: TextInput::default(),
            notice: None,
            applications: PagedList::new(page_size),
            identity: ScopeState::Idle,
            sandbox_cache: HashMap::new(),
            drill: None,
            quit: false,
        }
    }

    /// Issue the initial identity and application list fetches.
    pub fn start(&mut self) {
        let ticket = self.generations.issue(Scope::Principal);
        self.identity = ScopeState::Loading;
        self.outbox.push(FetchRequest::Principal { ticket });
        self.fetch_applications();
    }

    /// Take every fetch issued since the last call, in issue order.
    pub fn drain_requests(&mut self) -> Vec<FetchRequest> {
        std::mem::take(&mut self.outbox)
    }

    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    #[must_use]
    pub fn should_quit(&self) -> bool {
        self.quit
    }

    #[must_use]
    pub fn focus(&self) -> Focus {
        self.focus
    }

    #[must_use]
    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    #[must_use]
    pub fn name_input(&self) -> &TextInput {
        &self.name_input
    }

    #[must_use]
    pub fn date_input(&self) -> &TextInput {
        &self.date_input
    }

    #[must_use]
    pub fn applications(&self) -> &PagedList<ApplicationFilters, Application> {
        &self.applications
    }

    #[must_use]
    pub fn identity(&self) -> &ScopeState<Identity> {
        &self.identity
    }

    #[must_use]
    pub fn application_level(&self) -> Option<&ApplicationLevel> {
        self.drill.as_ref()
    }

    #[must_use]
    pub fn findings_level(&self) -> Option<&FindingsLevel> {
        self.drill.as_ref()?.findings.as_ref()
    }

    #[must_use]
    pub fn finding_level(&self) -> Option<&FindingLevel> {
        self.findings_level()?.finding.as_ref()
    }

    #[must_use]
    pub fn generations(&self) -> &Generations {
        &self.generations
    }

    #[must_use]
    pub fn screen(&self) -> Screen {
        let Some(application) = &self.drill else {
            return Screen::ApplicationList;
        };
        let Some(findings) = &application.findings else {
            return Screen::ApplicationDetail;
        };
        let Some(finding) = &findings.finding else {
            return Screen::FindingsList;
        };
        if finding.annotation_form.is_some() {
            Screen::AnnotationForm
        } else if finding.showing_paths {
            Screen::DataPaths
        } else {
            Screen::FindingDetail
        }
    }

    /// Whether printable keys should go to a text buffer.
    #[must_use]
    pub fn is_text_entry(&self) -> bool {
        match self.screen() {
            Screen::AnnotationForm => true,
            Screen::ApplicationList => self.focus.is_text_entry(),
            _ => false,
        }
    }

    /// Dispatch one operator intent.
    pub fn handle(&mut self, intent: Intent) {
        match intent {
            Intent::Quit => self.quit = true,
            Intent::Back => self.back(),
            Intent::Refresh => self.refresh(),
            Intent::Focus(focus) => self.move_focus(focus),
            Intent::FocusNext => self.move_focus(self.focus.step(1)),
            Intent::FocusPrevious => self.move_focus(self.focus.step(-1)),
            Intent::MoveSelection(delta) => self.move_selection(delta),
            Intent::NextPage => {
                self.next_page();
            }
            Intent::PreviousPage => {
                self.previous_page();
            }
            Intent::Open => self.open_selected(),
            Intent::Input(c) => self.input(c),
            Intent::DeleteChar => self.delete_char(),
            Intent::Submit => self.submit(),
            Intent::CycleOption(delta) => self.cycle_option(delta),
            Intent::CycleFindingScanType => self.cycle_finding_scan_type(),
            Intent::CycleSeverity => self.cycle_severity(),
            Intent::CyclePolicy => self.cycle_policy(),
            Intent::ShowDataPaths => self.show_data_paths(),
            Intent::StepDataPath(delta) => {
                self.step_data_path(delta);
            }
            Intent::Annotate => self.open_annotation_form(),
        }
    }

    // Application list

    fn fetch_applications(&mut self) {
        let ticket = self.generations.issue(Scope::ApplicationList);
        let query = self.applications.filters.to_query(&self.applications.cursor);
        debug!(
            "Issuing application list fetch {ticket} for page {}",
            self.applications.cursor.page_index()
        );
        self.applications.state = ScopeState::Loading;
        self.outbox.push(FetchRequest::Applications { ticket, query });
    }

    /// Change an application filter.
    ///
    /// A real change resets the cursor to the first page and refetches;
    /// setting a filter to its current value does nothing. Returns whether
    /// a fetch was issued.
    pub fn set_application_filter(&mut self, change: ApplicationFilter) -> bool {
        if !self.applications.filters.apply(change) {
            return false;
        }
        self.applications.cursor.reset();
        self.fetch_applications();
        true
    }

    /// Validate and apply the modified-after text.
    ///
    /// Invalid text leaves the filter and the entry untouched, keeps focus on
    /// the field and issues nothing.
    pub fn commit_modified_after(&mut self) -> bool {
        match filters::parse_modified_after(self.date_input.text()) {
            Ok(date) => {
                if matches!(self.notice, Some(Notice::Error(_))) {
                    self.notice = None;
                }
                self.set_application_filter(ApplicationFilter::ModifiedAfter(date))
            }
            Err(err) => {
                debug!("Rejected modified-after entry: {err}");
                self.focus = Focus::ModifiedAfter;
                self.notice = Some(Notice::Error(err.to_string()));
                false
            }
        }
    }

    fn move_focus(&mut self, target: Focus) {
        if self.screen() != Screen::ApplicationList || target == self.focus {
            return;
        }
        if self.focus == Focus::Name {
            let name = self.name_input.text().to_string();
            self.set_application_filter(ApplicationFilter::Name(name));
        }
        if self.focus == Focus::ModifiedAfter {
            self.commit_modified_after();
            if self.focus == Focus::ModifiedAfter && matches!(self.notice, Some(Notice::Error(_))) {
                return;
            }
        }
        self.focus = target;
    }

    fn cycle_option(&mut self, delta: isize) {
        match self.screen() {
            Screen::ApplicationList => {
                let filters = &self.applications.filters;
                let change = match self.focus {
                    Focus::ScanStatus => ApplicationFilter::ScanStatus(cycle_choice(
                        SCAN_STATUS_OPTIONS,
                        filters.scan_status.as_deref(),
                        delta,
                    )),
                    Focus::ScanType => ApplicationFilter::ScanType(cycle_choice(
                        APPLICATION_SCAN_TYPE_OPTIONS,
                        filters.scan_type.as_deref(),
                        delta,
                    )),
                    _ => return,
                };
                self.set_application_filter(change);
            }
            Screen::AnnotationForm => {
                if let Some(form) = self.annotation_form_mut() {
                    form.cycle_action(delta);
                }
            }
            _ => {}
        }
    }

    fn input(&mut self, c: char) {
        match self.screen() {
            Screen::AnnotationForm => {
                if let Some(form) = self.annotation_form_mut() {
                    form.comment.push(c);
                }
            }
            Screen::ApplicationList => match self.focus {
                Focus::Name => self.name_input.push(c),
                Focus::ModifiedAfter => self.date_input.push(c),
                _ => {}
            },
            _ => {}
        }
    }

    fn delete_char(&mut self) {
        match self.screen() {
            Screen::AnnotationForm => {
                if let Some(form) = self.annotation_form_mut() {
                    form.comment.pop();
                }
            }
            Screen::ApplicationList => match self.focus {
                Focus::Name => self.name_input.pop(),
                Focus::ModifiedAfter => self.date_input.pop(),
                _ => {}
            },
            _ => {}
        }
    }

    fn submit(&mut self) {
        match self.screen() {
            Screen::AnnotationForm => self.submit_annotation(),
            Screen::ApplicationList => match self.focus {
                Focus::Name => {
                    let name = self.name_input.text().to_string();
                    self.set_application_filter(ApplicationFilter::Name(name));
                    self.focus = Focus::Table;
                }
                Focus::ModifiedAfter => {
                    self.commit_modified_after();
                    if !matches!(self.notice, Some(Notice::Error(_))) {
                        self.focus = Focus::Table;
                    }
                }
                Focus::ScanStatus | Focus::ScanType => self.focus = Focus::Table,
                Focus::Table => self.open_selected(),
            },
            _ => self.open_selected(),
        }
    }

    /// Advance the visible listing one page.
    ///
    /// Only valid while the listing is loaded and a next page exists; any
    /// other request is a no-op returning `false`.
    pub fn next_page(&mut self) -> bool {
        self.turn_page(true)
    }

    /// Go back one page; a no-op on the first page or while not loaded.
    pub fn previous_page(&mut self) -> bool {
        self.turn_page(false)
    }

    fn turn_page(&mut self, forward: bool) -> bool {
        match self.screen() {
            Screen::ApplicationList => {
                let Some(total_pages) = self.applications.total_pages() else {
                    return false;
                };
                let cursor = &mut self.applications.cursor;
                let moved = if forward {
                    cursor.advance(total_pages)
                } else {
                    cursor.retreat()
                };
                if moved {
                    self.fetch_applications();
                }
                moved
            }
            Screen::FindingsList => {
                let Some(findings) = self.drill.as_mut().and_then(|a| a.findings.as_mut()) else {
                    return false;
                };
                let Some(total_pages) = findings.list.total_pages() else {
                    return false;
                };
                let moved = if forward {
                    findings.list.cursor.advance(total_pages)
                } else {
                    findings.list.cursor.retreat()
                };
                if moved {
                    self.fetch_findings();
                }
                moved
            }
            _ => false,
        }
    }

    fn move_selection(&mut self, delta: isize) {
        match self.screen() {
            Screen::ApplicationList => {
                if self.focus == Focus::Table {
                    self.applications.move_selection(delta);
                }
            }
            Screen::ApplicationDetail => {
                if let Some(level) = self.drill.as_mut() {
                    level.move_context(delta);
                }
            }
            Screen::FindingsList => {
                if let Some(findings) = self.drill.as_mut().and_then(|a| a.findings.as_mut()) {
                    findings.list.move_selection(delta);
                }
            }
            Screen::DataPaths => {
                self.step_data_path(delta);
            }
            Screen::FindingDetail | Screen::AnnotationForm => {}
        }
    }

    fn open_selected(&mut self) {
        match self.screen() {
            Screen::ApplicationList => {
                if self.focus == Focus::Table {
                    self.open_application();
                }
            }
            Screen::ApplicationDetail => self.open_context(),
            Screen::FindingsList => self.open_finding(),
            Screen::FindingDetail => self.show_data_paths(),
            Screen::DataPaths | Screen::AnnotationForm => {}
        }
    }

    // Application detail

    /// Snapshot the selected application and show its detail.
    ///
    /// Sandboxes are fetched on the first visit of an application and
    /// served from memory afterwards.
    pub fn open_application(&mut self) {
        let Some(application) = self.applications.selected_item().cloned() else {
            return;
        };
        self.notice = None;
        self.generations.invalidate_dependents(Scope::ApplicationList);

        let guid = application.guid.clone();
        let mut level = ApplicationLevel::new(application);
        if let Some(cached) = self.sandbox_cache.get(&guid) {
            debug!("Using cached sandboxes for application {guid}");
            level.sandboxes = ScopeState::Loaded(cached.clone());
        } else {
            let ticket = self.generations.issue(Scope::ApplicationDetail);
            level.sandboxes = ScopeState::Loading;
            self.outbox.push(FetchRequest::Sandboxes {
                ticket,
                application_guid: guid,
            });
        }
        info!("Opened application {}", level.application.name());
        self.drill = Some(level);
    }

    fn fetch_sandboxes(&mut self) {
        let Some(level) = self.drill.as_mut() else {
            return;
        };
        let ticket = self.generations.issue(Scope::ApplicationDetail);
        level.sandboxes = ScopeState::Loading;
        self.outbox.push(FetchRequest::Sandboxes {
            ticket,
            application_guid: level.application.guid.clone(),
        });
    }

    // Findings

    /// List findings of the context under the cursor with default filters.
    pub fn open_context(&mut self) {
        let Some(level) = self.drill.as_mut() else {
            return;
        };
        let context = level.selected_context();
        self.generations.invalidate_dependents(Scope::ApplicationDetail);
        debug!("Opening findings for context {}", context.label());
        level.findings = Some(FindingsLevel::new(context, self.page_size));
        self.notice = None;
        self.fetch_findings();
        self.fetch_finding_counts();
    }

    fn fetch_finding_counts(&mut self) {
        let Some(level) = self.drill.as_mut() else {
            return;
        };
        let Some(findings) = level.findings.as_mut() else {
            return;
        };
        let ticket = self.generations.issue(Scope::FindingCounts);
        findings.counts = ScopeState::Loading;
        self.outbox.push(FetchRequest::FindingCounts {
            ticket,
            application_guid: level.application.guid.clone(),
            context: findings.context.guid().map(str::to_string),
        });
    }

    fn fetch_findings(&mut self) {
        let Some(level) = self.drill.as_mut() else {
            return;
        };
        let Some(findings) = level.findings.as_mut() else {
            return;
        };
        let ticket = self.generations.issue(Scope::FindingsList);
        let query = findings
            .list
            .filters
            .to_query(findings.context.guid(), &findings.list.cursor);
        findings.list.state = ScopeState::Loading;
        self.outbox.push(FetchRequest::Findings {
            ticket,
            application_guid: level.application.guid.clone(),
            query,
        });
    }

    /// Change a findings filter; same reset-and-refetch rule as the
    /// application filters. Returns whether a fetch was issued.
    pub fn set_finding_filter(&mut self, change: FindingFilter) -> bool {
        let Some(findings) = self.drill.as_mut().and_then(|a| a.findings.as_mut()) else {
            return false;
        };
        if !findings.list.filters.apply(change) {
            return false;
        }
        findings.list.cursor.reset();
        self.generations.invalidate_dependents(Scope::FindingsList);
        findings.finding = None;
        self.fetch_findings();
        true
    }

    fn cycle_finding_scan_type(&mut self) {
        let Some(findings) = self.findings_level() else {
            return;
        };
        let current = &findings.list.filters.scan_type;
        let position = FINDING_SCAN_TYPE_OPTIONS
            .iter()
            .position(|option| option == current)
            .map_or(0, |p| p + 1);
        let next = FINDING_SCAN_TYPE_OPTIONS[position % FINDING_SCAN_TYPE_OPTIONS.len()].clone();
        self.set_finding_filter(FindingFilter::ScanType(next));
    }

    fn cycle_severity(&mut self) {
        let Some(findings) = self.findings_level() else {
            return;
        };
        let next = (findings.list.filters.severity + 1) % (MAX_SEVERITY + 1);
        self.set_finding_filter(FindingFilter::Severity(next));
    }

    fn cycle_policy(&mut self) {
        let Some(findings) = self.findings_level() else {
            return;
        };
        let current = findings.list.filters.policy;
        let position = PolicyFilter::OPTIONS
            .iter()
            .position(|option| *option == current)
            .unwrap_or(0);
        let next = PolicyFilter::OPTIONS[(position + 1) % PolicyFilter::OPTIONS.len()];
        self.set_finding_filter(FindingFilter::Policy(next));
    }

    /// Snapshot the selected finding and show its detail.
    pub fn open_finding(&mut self) {
        let Some(findings) = self.drill.as_mut().and_then(|a| a.findings.as_mut()) else {
            return;
        };
        let Some(finding) = findings.list.selected_item().cloned() else {
            return;
        };
        self.generations.invalidate_dependents(Scope::FindingsList);
        self.generations.invalidate(Scope::FindingDetail);
        debug!("Opened finding {}", finding.issue_id);
        findings.finding = Some(FindingLevel::new(finding));
        self.notice = None;
    }

    // Data paths

    /// Show the data paths of a static finding, fetching them once.
    pub fn show_data_paths(&mut self) {
        let Some(level) = self.drill.as_mut() else {
            return;
        };
        let guid = level.application.guid.clone();
        let Some(finding) = level
            .findings
            .as_mut()
            .and_then(|findings| findings.finding.as_mut())
        else {
            return;
        };
        if !finding.has_data_paths() {
            self.notice = Some(Notice::Info(
                "Data paths are only available for static findings".to_string(),
            ));
            return;
        }
        finding.showing_paths = true;
        if finding.data_paths.loaded().is_some() || finding.data_paths.is_loading() {
            return;
        }
        let ticket = self.generations.issue(Scope::DataPathView);
        finding.data_paths = ScopeState::Loading;
        finding.path_index = 0;
        self.outbox.push(FetchRequest::StaticFlawInfo {
            ticket,
            application_guid: guid,
            issue_id: finding.finding.issue_id,
        });
    }

    fn fetch_data_paths(&mut self) {
        let Some(finding) = self.finding_level_mut() else {
            return;
        };
        finding.data_paths = ScopeState::Idle;
        self.show_data_paths();
    }

    /// Move to another data path; out of range is a no-op.
    pub fn step_data_path(&mut self, delta: isize) -> bool {
        self.finding_level_mut()
            .filter(|finding| finding.showing_paths)
            .is_some_and(|finding| finding.step_path(delta))
    }

    // Annotations

    fn open_annotation_form(&mut self) {
        if let Some(finding) = self.finding_level_mut() {
            if finding.annotation.is_loading() {
                return;
            }
            finding.annotation_form = Some(AnnotationForm::default());
            finding.annotation = ScopeState::Idle;
        }
    }

    /// Submit the annotation form for the selected finding.
    ///
    /// The form stays open until the platform accepts the annotation, so a
    /// rejected submission can be corrected and sent again.
    pub fn submit_annotation(&mut self) {
        let Some(level) = self.drill.as_mut() else {
            return;
        };
        let guid = level.application.guid.clone();
        let Some(findings) = level.findings.as_mut() else {
            return;
        };
        let context = findings.context.guid().map(str::to_string);
        let Some(finding) = findings.finding.as_mut() else {
            return;
        };
        if finding.annotation.is_loading() {
            return;
        }
        let Some(form) = finding.annotation_form.as_ref() else {
            return;
        };
        let annotation = AnnotationData::new(
            &[finding.finding.issue_id],
            form.action(),
            form.comment.text().trim(),
        );
        let ticket = self.generations.issue(Scope::Annotation);
        finding.annotation = ScopeState::Loading;
        info!(
            "Submitting {} annotation for issue {}",
            form.action(),
            finding.finding.issue_id
        );
        self.outbox.push(FetchRequest::CreateAnnotation {
            ticket,
            application_guid: guid,
            annotation,
            context,
        });
    }

    fn annotation_form_mut(&mut self) -> Option<&mut AnnotationForm> {
        self.finding_level_mut()?.annotation_form.as_mut()
    }

    fn finding_level_mut(&mut self) -> Option<&mut FindingLevel> {
        self.drill.as_mut()?.findings.as_mut()?.finding.as_mut()
    }

    // Navigation

    /// Pop one drill-down level, or leave a filter, or quit from the list.
    pub fn back(&mut self) {
        self.notice = None;
        match self.screen() {
            Screen::ApplicationList => match self.focus {
                Focus::Table => self.quit = true,
                Focus::ModifiedAfter => {
                    let applied = self
                        .applications
                        .filters
                        .modified_after
                        .map(|d| d.format(DATE_FORMAT).to_string())
                        .unwrap_or_default();
                    self.date_input.set(applied);
                    self.focus = Focus::Table;
                }
                Focus::Name | Focus::ScanStatus | Focus::ScanType => self.focus = Focus::Table,
            },
            Screen::ApplicationDetail => {
                self.generations.invalidate(Scope::ApplicationDetail);
                self.generations.invalidate_dependents(Scope::ApplicationDetail);
                self.drill = None;
            }
            Screen::FindingsList => {
                self.generations.invalidate(Scope::FindingsList);
                self.generations.invalidate_dependents(Scope::FindingsList);
                self.generations.invalidate(Scope::FindingCounts);
                if let Some(level) = self.drill.as_mut() {
                    level.findings = None;
                }
            }
            Screen::FindingDetail => {
                self.generations.invalidate(Scope::FindingDetail);
                self.generations.invalidate_dependents(Scope::FindingDetail);
                self.generations.invalidate(Scope::Annotation);
                if let Some(findings) = self.drill.as_mut().and_then(|a| a.findings.as_mut()) {
                    findings.finding = None;
                }
            }
            Screen::DataPaths => {
                if let Some(finding) = self.finding_level_mut() {
                    finding.showing_paths = false;
                }
            }
            Screen::AnnotationForm => {
                if let Some(finding) = self.finding_level_mut() {
                    finding.annotation_form = None;
                }
            }
        }
    }

    /// Re-issue the fetch behind the current screen.
    pub fn refresh(&mut self) {
        self.notice = None;
        match self.screen() {
            Screen::ApplicationList => self.fetch_applications(),
            Screen::ApplicationDetail => self.fetch_sandboxes(),
            Screen::FindingsList => {
                self.fetch_findings();
                self.fetch_finding_counts();
            }
            Screen::FindingDetail => self.fetch_findings(),
            Screen::DataPaths => self.fetch_data_paths(),
            Screen::AnnotationForm => {}
        }
    }

    // Completions

    /// Apply a finished fetch.
    ///
    /// Returns `false` when the completion was stale and has been dropped.
    pub fn apply(&mut self, completion: Completion) -> bool {
        let Completion { ticket, result } = completion;
        if !self.generations.is_current(ticket) {
            debug!("Discarding stale completion {ticket}");
            return false;
        }

        match (ticket.scope, result) {
            (scope, Err(err)) => self.fail(scope, &err),
            (Scope::ApplicationList, Ok(FetchOutcome::Applications(resource))) => {
                let mut page = ResultPage::from(resource);
                sort_by_modified(&mut page.items);
                debug!(
                    "Loaded {} applications ({} total)",
                    page.items.len(),
                    page.total_items
                );
                self.applications.load(page);
            }
            (Scope::ApplicationDetail, Ok(FetchOutcome::Sandboxes(sandboxes))) => {
                let Some(level) = self.drill.as_mut() else {
                    return false;
                };
                self.sandbox_cache
                    .insert(level.application.guid.clone(), sandboxes.clone());
                level.sandboxes = ScopeState::Loaded(sandboxes);
                level.context_row = 0;
            }
            (Scope::FindingsList, Ok(FetchOutcome::Findings(resource))) => {
                let Some(findings) = self.drill.as_mut().and_then(|a| a.findings.as_mut()) else {
                    return false;
                };
                findings.list.load(ResultPage::from(resource));
            }
            (Scope::FindingCounts, Ok(FetchOutcome::FindingCounts(counts))) => {
                let Some(findings) = self.drill.as_mut().and_then(|a| a.findings.as_mut()) else {
                    return false;
                };
                findings.counts = ScopeState::Loaded(counts);
            }
            (Scope::DataPathView, Ok(FetchOutcome::StaticFlawInfo(info))) => {
                let Some(finding) = self.finding_level_mut() else {
                    return false;
                };
                finding.data_paths = ScopeState::Loaded(info);
                finding.path_index = 0;
            }
            (Scope::Principal, Ok(FetchOutcome::Identity(identity))) => {
                self.identity = ScopeState::Loaded(identity);
            }
            (Scope::Annotation, Ok(FetchOutcome::Annotation(response))) => {
                let Some(finding) = self.finding_level_mut() else {
                    return false;
                };
                finding.annotation = ScopeState::Loaded(response);
                finding.annotation_form = None;
                self.notice = Some(Notice::Info("Annotation created".to_string()));
                self.fetch_findings();
            }
            (scope, Ok(_)) => {
                warn!("Ignoring completion {ticket} with a payload that does not match {scope}");
                return false;
            }
        }
        true
    }

    fn fail(&mut self, scope: Scope, err: &VeracodeError) {
        warn!("Fetch for {scope} failed: {err}");
        let message = describe_error(err);
        match scope {
            Scope::ApplicationList => self.applications.state = ScopeState::Error(message),
            Scope::ApplicationDetail => {
                if let Some(level) = self.drill.as_mut() {
                    level.sandboxes = ScopeState::Error(message);
                }
            }
            Scope::FindingsList => {
                if let Some(findings) = self.drill.as_mut().and_then(|a| a.findings.as_mut()) {
                    findings.list.state = ScopeState::Error(message);
                }
            }
            Scope::FindingCounts => {
                if let Some(findings) = self.drill.as_mut().and_then(|a| a.findings.as_mut()) {
                    findings.counts = ScopeState::Error(message);
                }
            }
            Scope::DataPathView => {
                if let Some(finding) = self.finding_level_mut() {
                    finding.data_paths = ScopeState::Error(message);
                }
            }
            Scope::Principal => self.identity = ScopeState::Error(message),
            Scope::Annotation => {
                self.notice = Some(Notice::Error(message.clone()));
                if let Some(finding) = self.finding_level_mut() {
                    finding.annotation = ScopeState::Error(message);
                }
            }
            Scope::FindingDetail => {}
        }
    }
}

/// Next drop-down value; position 0 is "All" (no filter).
fn cycle_choice(options: &[&str], current: Option<&str>, delta: isize) -> Option<String> {
    let len = options.len() as isize + 1;
    let position = current
        .and_then(|value| options.iter().position(|option| *option == value))
        .map_or(0, |p| p as isize + 1);
    match (position + delta).rem_euclid(len) {
        0 => None,
        next => Some(options[next as usize - 1].to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use veracode_api::{PageMetadata, PagedResource};

    fn app(guid: &str) -> Application {
        Application {
            guid: guid.to_string(),
            ..Application::default()
        }
    }

    fn apps_page(guids: &[&str], total_pages: u32) -> FetchOutcome {
        FetchOutcome::Applications(PagedResource::new(
            guids.iter().map(|g| app(g)).collect(),
            PageMetadata {
                number: 0,
                size: 100,
                total_elements: guids.len() as u64,
                total_pages,
            },
        ))
    }

    fn ticket_of(request: &FetchRequest) -> Ticket {
        request.ticket()
    }

    fn started() -> Session {
        let mut session = Session::new(100);
        session.start();
        let requests = session.drain_requests();
        assert_eq!(requests.len(), 2);
        let apps = requests
            .iter()
            .find(|r| matches!(r, FetchRequest::Applications { .. }))
            .map(ticket_of)
            .expect("application fetch issued");
        assert!(session.apply(Completion::new(apps, Ok(apps_page(&["a1", "a2"], 1)))));
        session
    }

    #[test]
    fn test_start_issues_identity_and_list() {
        let mut session = Session::new(100);
        session.start();
        let requests = session.drain_requests();
        assert!(matches!(requests[0], FetchRequest::Principal { .. }));
        assert!(matches!(requests[1], FetchRequest::Applications { .. }));
        assert!(session.applications().state.is_loading());
        assert!(session.drain_requests().is_empty());
    }

    #[test]
    fn test_cycle_choice_wraps_through_all() {
        let options = ["A", "B"];
        assert_eq!(cycle_choice(&options, None, 1), Some("A".to_string()));
        assert_eq!(cycle_choice(&options, Some("B"), 1), None);
        assert_eq!(cycle_choice(&options, None, -1), Some("B".to_string()));
    }

    #[test]
    fn test_focus_order() {
        assert_eq!(Focus::Table.step(1), Focus::Name);
        assert_eq!(Focus::Name.step(-1), Focus::Table);
    }

    #[test]
    fn test_dropdown_cycle_refetches() {
        let mut session = started();
        session.handle(Intent::Focus(Focus::ScanStatus));
        session.handle(Intent::CycleOption(1));
        assert_eq!(
            session.applications().filters.scan_status.as_deref(),
            Some("PUBLISHED")
        );
        let requests = session.drain_requests();
        assert_eq!(requests.len(), 1);
    }

    #[test]
    fn test_back_from_list_table_quits() {
        let mut session = started();
        session.handle(Intent::Focus(Focus::Name));
        session.handle(Intent::Back);
        assert!(!session.should_quit());
        session.handle(Intent::Back);
        assert!(session.should_quit());
    }

    #[test]
    fn test_escape_restores_applied_date_text() {
        let mut session = started();
        session.handle(Intent::Focus(Focus::ModifiedAfter));
        for c in "2025-1".chars() {
            session.handle(Intent::Input(c));
        }
        session.handle(Intent::Back);
        assert_eq!(session.date_input().text(), "");
        assert_eq!(session.focus(), Focus::Table);
        assert!(session.drain_requests().is_empty());
    }

    #[test]
    fn test_open_application_uses_sandbox_cache() {
        let mut session = started();
        session.handle(Intent::Open);
        let requests = session.drain_requests();
        let ticket = match &requests[..] {
            [FetchRequest::Sandboxes { ticket, application_guid }] => {
                assert_eq!(application_guid, "a1");
                *ticket
            }
            other => panic!("unexpected requests: {other:?}"),
        };
        session.apply(Completion::new(ticket, Ok(FetchOutcome::Sandboxes(vec![]))));
        assert_eq!(session.screen(), Screen::ApplicationDetail);

        session.handle(Intent::Back);
        session.handle(Intent::Open);
        assert!(session.drain_requests().is_empty());
        assert!(
            session
                .application_level()
                .expect("detail open")
                .sandboxes
                .loaded()
                .is_some()
        );
    }

    #[test]
    fn test_error_then_refresh_recovers() {
        let mut session = Session::new(100);
        session.start();
        let ticket = session
            .drain_requests()
            .iter()
            .find(|r| r.ticket().scope == Scope::ApplicationList)
            .map(FetchRequest::ticket)
            .expect("list fetch");
        let err = VeracodeError::Configuration("boom".to_string());
        assert!(session.apply(Completion::new(ticket, Err(err))));
        assert_eq!(
            session.applications().state.error(),
            Some("Error: Invalid configuration: boom")
        );
        assert!(session.drain_requests().is_empty());

        session.handle(Intent::Refresh);
        assert_eq!(session.drain_requests().len(), 1);
        assert!(session.applications().state.is_loading());
    }

    #[test]
    fn test_mismatched_payload_is_ignored() {
        let mut session = Session::new(100);
        session.start();
        let principal = session.drain_requests()[0].ticket();
        assert!(!session.apply(Completion::new(principal, Ok(apps_page(&[], 0)))));
        assert!(session.identity().is_loading());
    }
}
