//! View-model derived from the session.
//!
//! Everything the terminal draws is computed here as plain strings, so the
//! renderer stays a thin layout layer and the wording can be tested without
//! a terminal.

use chrono::{DateTime, Utc};
use veracode_api::validation::DATE_FORMAT;
use veracode_api::{Application, DataPath, Finding, FindingDetails, Severity};

use crate::session::{
    ApplicationLevel, FindingLevel, FindingsLevel, Focus, Identity, Notice, PageCursor,
    ResultPage, Screen, ScopeState, Session,
};

/// Application names longer than this are cut and suffixed with "...".
pub const NAME_COLUMN_WIDTH: usize = 40;

const NOT_AVAILABLE: &str = "N/A";
const ALL: &str = "All";

/// Colour hint for the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Normal,
    Loading,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub text: String,
    pub tone: Tone,
}

impl StatusLine {
    fn new(text: impl Into<String>, tone: Tone) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }
}

/// A labelled filter control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterField {
    /// Title including the focus key, e.g. " Name (n) "
    pub title: &'static str,
    pub value: String,
    pub focused: bool,
    pub editing: bool,
}

/// Colour hint for one table cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellTone {
    #[default]
    Plain,
    Severity(Severity),
    PolicyPass,
    PolicyFail,
    PolicyNeutral,
}

impl CellTone {
    /// Tone of a policy compliance status such as `PASSED` or `DID_NOT_PASS`.
    #[must_use]
    pub fn policy(status: Option<&str>) -> Self {
        match status {
            Some("PASSED") => CellTone::PolicyPass,
            Some("DID_NOT_PASS") => CellTone::PolicyFail,
            _ => CellTone::PolicyNeutral,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableView {
    pub title: String,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
    /// Per-cell tones, parallel to `rows`; missing entries are plain
    pub tones: Vec<Vec<CellTone>>,
    pub selected: Option<usize>,
    /// Shown instead of the rows while loading, failed or empty
    pub placeholder: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailView {
    pub title: String,
    pub fields: Vec<(&'static str, String)>,
    pub table: Option<TableView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationView {
    pub finding: String,
    pub action: String,
    pub comment: String,
    /// Submission progress or the rejection message
    pub state: Option<StatusLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Applications {
        filters: Vec<FilterField>,
        table: TableView,
    },
    Application(DetailView),
    Findings {
        filters: Vec<FilterField>,
        table: TableView,
    },
    Finding(DetailView),
    DataPaths(DetailView),
    Annotation(AnnotationView),
}

/// Complete content of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewModel {
    pub header: String,
    pub body: Body,
    pub status: StatusLine,
    pub help: &'static str,
}

/// Build the frame content for the current session state.
#[must_use]
pub fn build(session: &Session, now: DateTime<Utc>) -> ViewModel {
    let screen = session.screen();
    let (body, status) = match session.application_level() {
        None => application_list(session),
        Some(level) => match &level.findings {
            None => application_detail(level),
            Some(findings) => match &findings.finding {
                None => findings_list(findings),
                Some(finding) => match screen {
                    Screen::DataPaths => data_paths(finding),
                    Screen::AnnotationForm => annotation(finding),
                    _ => finding_detail(finding),
                },
            },
        },
    };

    let status = match session.notice() {
        Some(Notice::Error(text)) => StatusLine::new(format!(" {text}"), Tone::Error),
        Some(Notice::Info(text)) => StatusLine::new(format!(" {text}"), Tone::Info),
        None => status,
    };

    ViewModel {
        header: header_line(session.identity(), now),
        body,
        status,
        help: help_text(screen),
    }
}

/// Title line with the calling identity and key expiry.
#[must_use]
pub fn header_line(identity: &ScopeState<Identity>, now: DateTime<Utc>) -> String {
    let mut header = String::from("Veracode TUI");
    match identity {
        ScopeState::Loaded(identity) => {
            header.push_str(" • ");
            header.push_str(&identity.principal.display_name());
            if let Some(org) = identity.principal.organization_name.as_deref() {
                header.push_str(&format!(" ({org})"));
            }
            if let Some(days) = identity
                .credentials
                .as_ref()
                .and_then(|c| c.days_until_expiry(now))
            {
                if days < 0 {
                    header.push_str(" • API key expired");
                } else {
                    header.push_str(&format!(" • API key expires in {days} days"));
                }
            }
        }
        ScopeState::Loading => header.push_str(" • identifying..."),
        ScopeState::Idle | ScopeState::Error(_) => {}
    }
    header
}

/// Cut names longer than [`NAME_COLUMN_WIDTH`] characters.
#[must_use]
pub fn truncate_name(name: &str) -> String {
    match name.char_indices().nth(NAME_COLUMN_WIDTH) {
        Some((cut, _)) => format!("{}...", &name[..cut]),
        None => name.to_string(),
    }
}

#[must_use]
pub fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map_or_else(
        || NOT_AVAILABLE.to_string(),
        |d| d.format(DATE_FORMAT).to_string(),
    )
}

/// " Showing N applications", with the page position when there is more
/// than one page.
#[must_use]
pub fn application_summary(page: &ResultPage<Application>, cursor: &PageCursor) -> String {
    let mut text = format!(" Showing {} applications", page.items.len());
    if page.total_pages > 1 {
        text.push_str(&format!(
            " • Page {}/{} (Total: {})",
            cursor.page_index() + 1,
            page.total_pages,
            page.total_items
        ));
    }
    text
}

fn application_row(app: &Application) -> Vec<String> {
    vec![
        truncate_name(app.name()),
        format_date(app.created),
        format_date(app.modified),
        format_date(app.last_completed_scan_date),
        app.policy_compliance_status()
            .unwrap_or(NOT_AVAILABLE)
            .to_string(),
        app.scan_status().unwrap_or(NOT_AVAILABLE).to_string(),
    ]
}

fn application_tones(app: &Application) -> Vec<CellTone> {
    let mut tones = vec![CellTone::Plain; 6];
    tones[4] = CellTone::policy(app.policy_compliance_status());
    tones
}

fn application_list(session: &Session) -> (Body, StatusLine) {
    let list = session.applications();
    let filters = &list.filters;
    let focus = session.focus();
    let text_or_applied = |focused: bool, typed: &str, applied: String| {
        if focused { typed.to_string() } else { applied }
    };

    let fields = vec![
        FilterField {
            title: " Name (n) ",
            value: text_or_applied(
                focus == Focus::Name,
                session.name_input().text(),
                filters.name.clone(),
            ),
            focused: focus == Focus::Name,
            editing: focus == Focus::Name,
        },
        FilterField {
            title: " Scan Status (s) ",
            value: choice_label(filters.scan_status.as_deref()),
            focused: focus == Focus::ScanStatus,
            editing: false,
        },
        FilterField {
            title: " Scan Type (t) ",
            value: choice_label(filters.scan_type.as_deref()),
            focused: focus == Focus::ScanType,
            editing: false,
        },
        FilterField {
            title: " Modified After (m) ",
            value: text_or_applied(
                focus == Focus::ModifiedAfter,
                session.date_input().text(),
                filters
                    .modified_after
                    .map(|d| d.format(DATE_FORMAT).to_string())
                    .unwrap_or_default(),
            ),
            focused: focus == Focus::ModifiedAfter,
            editing: focus == Focus::ModifiedAfter,
        },
    ];

    let mut table = TableView {
        title: " Applications (a) ".to_string(),
        headers: vec![
            "Application Name",
            "Created",
            "Last Modified",
            "Last Scan",
            "Policy Status",
            "Scan Status",
        ],
        rows: Vec::new(),
        selected: None,
        placeholder: None,
        tones: Vec::new(),
    };

    let status = match &list.state {
        ScopeState::Idle => StatusLine::new("", Tone::Normal),
        ScopeState::Loading => {
            table.placeholder = Some("Loading applications...".to_string());
            StatusLine::new(" Loading applications...", Tone::Loading)
        }
        ScopeState::Error(message) => {
            table.placeholder = Some(message.clone());
            StatusLine::new(format!(" {message}"), Tone::Error)
        }
        ScopeState::Loaded(page) => {
            table.rows = page.items.iter().map(application_row).collect();
            table.tones = page.items.iter().map(application_tones).collect();
            if page.is_empty() {
                let text = if filters.is_active() {
                    "No applications match the current filters"
                } else {
                    "No applications found"
                };
                table.placeholder = Some(text.to_string());
            } else if focus == Focus::Table {
                table.selected = Some(list.selected_index());
            }
            StatusLine::new(application_summary(page, &list.cursor), Tone::Normal)
        }
    };

    (Body::Applications { filters: fields, table }, status)
}

fn choice_label(current: Option<&str>) -> String {
    current.unwrap_or(ALL).to_string()
}

fn application_detail(level: &ApplicationLevel) -> (Body, StatusLine) {
    let app = &level.application;
    let fields = vec![
        ("Name", app.name().to_string()),
        ("GUID", app.guid.clone()),
        (
            "Business Unit",
            app.business_unit_name().unwrap_or(NOT_AVAILABLE).to_string(),
        ),
        (
            "Policy Status",
            app.policy_compliance_status()
                .unwrap_or(NOT_AVAILABLE)
                .to_string(),
        ),
        ("Last Scan", format_date(app.last_completed_scan_date)),
        ("Last Modified", format_date(app.modified)),
    ];

    let mut rows = vec![vec!["Policy".to_string(), String::new(), String::new()]];
    let status = match &level.sandboxes {
        ScopeState::Loaded(sandboxes) => {
            rows.extend(sandboxes.iter().map(|sandbox| {
                vec![
                    format!("Sandbox: {}", sandbox.name),
                    sandbox.owner_username.clone().unwrap_or_default(),
                    format_date(sandbox.modified),
                ]
            }));
            StatusLine::new(format!(" {} sandboxes", sandboxes.len()), Tone::Normal)
        }
        ScopeState::Loading => StatusLine::new(" Loading sandboxes...", Tone::Loading),
        ScopeState::Error(message) => StatusLine::new(format!(" {message}"), Tone::Error),
        ScopeState::Idle => StatusLine::new("", Tone::Normal),
    };

    let table = TableView {
        title: " Findings context ".to_string(),
        headers: vec!["Context", "Owner", "Modified"],
        rows,
        selected: Some(level.context_row),
        placeholder: None,
        tones: Vec::new(),
    };

    let detail = DetailView {
        title: format!(" {} ", app.name()),
        fields,
        table: Some(table),
    };
    (Body::Application(detail), status)
}

fn severity_text(severity: Option<Severity>) -> String {
    severity.map_or_else(|| NOT_AVAILABLE.to_string(), |s| format!("{} ({})", s, s.0))
}

fn finding_row(finding: &Finding) -> Vec<String> {
    vec![
        finding.issue_id.to_string(),
        severity_text(finding.severity()),
        finding
            .details
            .cwe()
            .map(|cwe| format!("CWE-{}", cwe.id))
            .unwrap_or_default(),
        finding.title().to_string(),
        finding.status().unwrap_or(NOT_AVAILABLE).to_string(),
        if finding.violates_policy { "Yes" } else { "No" }.to_string(),
    ]
}

fn finding_tones(finding: &Finding) -> Vec<CellTone> {
    let mut tones = vec![CellTone::Plain; 6];
    if let Some(severity) = finding.severity() {
        tones[1] = CellTone::Severity(severity);
    }
    if finding.violates_policy {
        tones[5] = CellTone::PolicyFail;
    }
    tones
}

/// Findings table title, with the per scan type totals once they are known.
#[must_use]
pub fn findings_title(level: &FindingsLevel) -> String {
    match level.counts.loaded() {
        Some(counts) => format!(" Findings • {} • {} ", level.context.label(), counts.label()),
        None => format!(" Findings • {} ", level.context.label()),
    }
}

fn findings_list(level: &FindingsLevel) -> (Body, StatusLine) {
    let filters = &level.list.filters;
    let fields = vec![
        FilterField {
            title: " Scan Type (t) ",
            value: filters.scan_type.to_string(),
            focused: false,
            editing: false,
        },
        FilterField {
            title: " Severity (v) ",
            value: if filters.severity == 0 {
                ALL.to_string()
            } else {
                Severity(filters.severity).to_string()
            },
            focused: false,
            editing: false,
        },
        FilterField {
            title: " Policy (p) ",
            value: filters.policy.label().to_string(),
            focused: false,
            editing: false,
        },
    ];

    let mut table = TableView {
        title: findings_title(level),
        headers: vec!["ID", "Severity", "CWE", "Title", "Status", "Violates Policy"],
        rows: Vec::new(),
        selected: None,
        placeholder: None,
        tones: Vec::new(),
    };

    let status = match &level.list.state {
        ScopeState::Idle => StatusLine::new("", Tone::Normal),
        ScopeState::Loading => {
            table.placeholder = Some("Loading findings...".to_string());
            StatusLine::new(" Loading findings...", Tone::Loading)
        }
        ScopeState::Error(message) => {
            table.placeholder = Some(message.clone());
            StatusLine::new(format!(" {message}"), Tone::Error)
        }
        ScopeState::Loaded(page) => {
            table.rows = page.items.iter().map(finding_row).collect();
            table.tones = page.items.iter().map(finding_tones).collect();
            if page.is_empty() {
                table.placeholder = Some("No findings match the current filters".to_string());
            } else {
                table.selected = Some(level.list.selected_index());
            }
            let mut text = format!(" Showing {} findings", page.items.len());
            if page.total_pages > 1 {
                text.push_str(&format!(
                    " • Page {}/{} (Total: {})",
                    level.list.cursor.page_index() + 1,
                    page.total_pages,
                    page.total_items
                ));
            }
            StatusLine::new(text, Tone::Normal)
        }
    };

    (Body::Findings { filters: fields, table }, status)
}

fn optional(value: Option<&str>) -> String {
    value.unwrap_or(NOT_AVAILABLE).to_string()
}

/// Label/value pairs describing a finding.
#[must_use]
pub fn finding_fields(finding: &Finding) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("Issue ID", finding.issue_id.to_string()),
        ("Scan Type", finding.scan_type.to_string()),
        ("Severity", severity_text(finding.severity())),
        ("Status", optional(finding.status())),
        ("Resolution", optional(finding.resolution_status())),
        (
            "Violates Policy",
            if finding.violates_policy { "Yes" } else { "No" }.to_string(),
        ),
    ];
    if let Some(cwe) = finding.details.cwe() {
        fields.push(("CWE", format!("CWE-{}: {}", cwe.id, cwe.name)));
    }
    if let Some(location) = finding.details.location() {
        fields.push(("Location", location));
    }
    match &finding.details {
        FindingDetails::Static(details) => {
            fields.push(("Module", optional(details.module.as_deref())));
            fields.push(("Procedure", optional(details.procedure.as_deref())));
        }
        FindingDetails::Dynamic(details) => {
            fields.push((
                "Parameter",
                optional(details.vulnerable_parameter.as_deref()),
            ));
        }
        FindingDetails::Sca(details) => {
            fields.push(("Component", optional(details.component_filename.as_deref())));
            fields.push(("Version", optional(details.version.as_deref())));
            if let Some(cve) = details.cve.as_ref().and_then(|c| c.name.as_deref()) {
                fields.push(("CVE", cve.to_string()));
            }
        }
        FindingDetails::Manual(_) | FindingDetails::None => {}
    }
    if let Some(status) = &finding.finding_status {
        fields.push(("First Found", format_date(status.first_found_date)));
        fields.push(("Last Seen", format_date(status.last_seen_date)));
    }
    if !finding.description.is_empty() {
        fields.push(("Description", finding.description.clone()));
    }
    fields
}

fn finding_detail(level: &FindingLevel) -> (Body, StatusLine) {
    let finding = &level.finding;
    let annotations = (!finding.annotations.is_empty()).then(|| TableView {
        title: " Annotations ".to_string(),
        headers: vec!["Action", "User", "Created", "Comment"],
        rows: finding
            .annotations
            .iter()
            .map(|a| {
                vec![
                    optional(a.action.as_deref()),
                    optional(a.user_name.as_deref()),
                    format_date(a.created),
                    a.comment.clone().unwrap_or_default(),
                ]
            })
            .collect(),
        selected: None,
        placeholder: None,
        tones: Vec::new(),
    });

    let status = match &level.annotation {
        ScopeState::Loading => StatusLine::new(" Submitting annotation...", Tone::Loading),
        ScopeState::Error(message) => StatusLine::new(format!(" {message}"), Tone::Error),
        _ => StatusLine::new(format!(" Finding {}", finding.issue_id), Tone::Normal),
    };

    let detail = DetailView {
        title: format!(" {} ", finding.title()),
        fields: finding_fields(finding),
        table: annotations,
    };
    (Body::Finding(detail), status)
}

/// Frames of one data path, innermost call last.
fn data_path_table(path: &DataPath) -> TableView {
    TableView {
        title: " Calls ".to_string(),
        headers: vec!["#", "Function", "File", "Line"],
        rows: path
            .calls
            .iter()
            .map(|call| {
                vec![
                    call.data_path.to_string(),
                    optional(call.function_name.as_deref()),
                    optional(call.file_path.as_deref().or(call.file_name.as_deref())),
                    call.line_number.map(|l| l.to_string()).unwrap_or_default(),
                ]
            })
            .collect(),
        selected: None,
        placeholder: path
            .calls
            .is_empty()
            .then(|| "No call frames recorded".to_string()),
        tones: Vec::new(),
    }
}

fn data_paths(level: &FindingLevel) -> (Body, StatusLine) {
    let title = format!(" Data paths • Finding {} ", level.finding.issue_id);
    let (fields, table, status) = match &level.data_paths {
        ScopeState::Loading | ScopeState::Idle => (
            Vec::new(),
            None,
            StatusLine::new(" Loading data paths...", Tone::Loading),
        ),
        ScopeState::Error(message) => (
            Vec::new(),
            None,
            StatusLine::new(format!(" {message}"), Tone::Error),
        ),
        ScopeState::Loaded(_) => match level.current_path() {
            None => (
                Vec::new(),
                None,
                StatusLine::new(" No data paths available for this finding", Tone::Info),
            ),
            Some(path) => {
                let fields = vec![
                    (
                        "Path",
                        format!("{}/{}", level.path_index + 1, level.path_count()),
                    ),
                    ("Module", optional(path.module_name.as_deref())),
                    ("Function", optional(path.function_name.as_deref())),
                    ("File", optional(path.local_path.as_deref())),
                    (
                        "Line",
                        path.line_number
                            .map_or_else(|| NOT_AVAILABLE.to_string(), |l| l.to_string()),
                    ),
                    ("Steps", path.steps.to_string()),
                ];
                let status = StatusLine::new(
                    format!(
                        " Data path {} of {}",
                        level.path_index + 1,
                        level.path_count()
                    ),
                    Tone::Normal,
                );
                (fields, Some(data_path_table(path)), status)
            }
        },
    };
    (Body::DataPaths(DetailView { title, fields, table }), status)
}

fn annotation(level: &FindingLevel) -> (Body, StatusLine) {
    let (action, comment) = level
        .annotation_form
        .as_ref()
        .map(|form| (form.action().label().to_string(), form.comment.text().to_string()))
        .unwrap_or_default();
    let view = AnnotationView {
        finding: format!("{} • {}", level.finding.issue_id, level.finding.title()),
        action,
        comment,
        state: match &level.annotation {
            ScopeState::Loading => Some(StatusLine::new("Submitting...", Tone::Loading)),
            ScopeState::Error(message) => Some(StatusLine::new(message.clone(), Tone::Error)),
            ScopeState::Idle | ScopeState::Loaded(_) => None,
        },
    };
    let status = if level.annotation.is_loading() {
        StatusLine::new(" Submitting annotation...", Tone::Loading)
    } else {
        StatusLine::new(" Compose annotation", Tone::Normal)
    };
    (Body::Annotation(view), status)
}

fn help_text(screen: Screen) -> &'static str {
    match screen {
        Screen::ApplicationList => {
            "n/s/t/m/a focus • Tab next • ←/→ change • PgUp/PgDn page • Enter open • r refresh • q quit"
        }
        Screen::ApplicationDetail => "↑/↓ select context • Enter findings • r refresh • Esc back",
        Screen::FindingsList => {
            "t scan type • v severity • p policy • PgUp/PgDn page • Enter open • r refresh • Esc back"
        }
        Screen::FindingDetail => "d data paths • c annotate • r refresh • Esc back",
        Screen::DataPaths => "←/→ previous/next path • r refresh • Esc back",
        Screen::AnnotationForm => "←/→ action • type comment • Enter submit • Esc cancel",
    }
}
