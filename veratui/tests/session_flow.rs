//! Session behaviour driven end to end through intents and completions.
#![allow(clippy::expect_used, clippy::panic)]

use chrono::{DateTime, NaiveDate, Utc};
use proptest::prelude::*;
use veracode_api::{
    AnnotationAction, AnnotationResponse, Application, DataPath, Finding, PageMetadata,
    PagedResource, ScanType, Sandbox, StaticFlawInfo,
};
use veratui::session::{
    ApplicationFilter, Completion, FetchOutcome, FetchRequest, FindingCounts, Focus, Intent,
    Notice, Scope, Screen, ScopeState, Session, Ticket, sort_by_modified,
};

fn app(guid: &str, modified: Option<&str>) -> Application {
    Application {
        guid: guid.to_string(),
        modified: modified.map(|m| {
            DateTime::parse_from_rfc3339(m)
                .expect("timestamp")
                .with_timezone(&Utc)
        }),
        ..Application::default()
    }
}

fn page_meta(len: usize, total_pages: u32) -> PageMetadata {
    PageMetadata {
        number: 0,
        size: 100,
        total_elements: len as u64 * u64::from(total_pages.max(1)),
        total_pages,
    }
}

fn apps(items: Vec<Application>, total_pages: u32) -> FetchOutcome {
    let meta = page_meta(items.len(), total_pages);
    FetchOutcome::Applications(PagedResource::new(items, meta))
}

fn findings(items: Vec<Finding>, total_pages: u32) -> FetchOutcome {
    let meta = page_meta(items.len(), total_pages);
    FetchOutcome::Findings(PagedResource::new(items, meta))
}

fn finding(issue_id: u64, scan_type: &str) -> Finding {
    serde_json::from_value(serde_json::json!({
        "issue_id": issue_id,
        "scan_type": scan_type,
        "description": "Improper neutralization",
        "finding_details": {"severity": 4, "cwe": {"id": 89, "name": "SQL Injection"}}
    }))
    .expect("finding decodes")
}

/// Take the single request issued since the last drain.
fn single(session: &mut Session) -> FetchRequest {
    let mut requests = session.drain_requests();
    assert_eq!(requests.len(), 1, "expected one request, got {requests:?}");
    requests.remove(0)
}

fn ticket_for(requests: &[FetchRequest], scope: Scope) -> Ticket {
    requests
        .iter()
        .map(FetchRequest::ticket)
        .find(|ticket| ticket.scope == scope)
        .expect("request for scope")
}

fn visible_guids(session: &Session) -> Vec<String> {
    session
        .applications()
        .page()
        .map(|page| page.items.iter().map(|a| a.guid.clone()).collect())
        .unwrap_or_default()
}

/// Started session with the first application page loaded.
fn loaded(items: Vec<Application>, total_pages: u32) -> Session {
    let mut session = Session::new(100);
    session.start();
    let requests = session.drain_requests();
    let ticket = ticket_for(&requests, Scope::ApplicationList);
    assert!(session.apply(Completion::new(ticket, Ok(apps(items, total_pages)))));
    session
}

/// Application opened, sandboxes loaded and the findings of `sandbox` listed.
fn in_sandbox_findings(items: Vec<Finding>) -> Session {
    let mut session = loaded(vec![app("app-1", None)], 1);
    session.handle(Intent::Open);
    let request = single(&mut session);
    let sandbox = Sandbox {
        guid: "sb-1".to_string(),
        name: "feature".to_string(),
        ..Sandbox::default()
    };
    assert!(session.apply(Completion::new(
        request.ticket(),
        Ok(FetchOutcome::Sandboxes(vec![sandbox]))
    )));
    session.handle(Intent::MoveSelection(1));
    session.handle(Intent::Open);
    let requests = session.drain_requests();
    assert_eq!(requests.len(), 2, "findings and counts, got {requests:?}");
    let ticket = ticket_for(&requests, Scope::FindingsList);
    assert!(session.apply(Completion::new(ticket, Ok(findings(items, 1)))));
    assert_eq!(session.screen(), Screen::FindingsList);
    session
}

fn counts(static_count: u64, dynamic_count: u64, sca_count: u64) -> FetchOutcome {
    FetchOutcome::FindingCounts(FindingCounts {
        static_count,
        dynamic_count,
        sca_count,
    })
}

#[test]
fn test_list_is_sorted_by_modified_descending() {
    let session = loaded(
        vec![
            app("A", Some("2024-01-01T00:00:00Z")),
            app("B", None),
            app("C", Some("2024-06-01T00:00:00Z")),
        ],
        1,
    );
    assert_eq!(visible_guids(&session), vec!["C", "A", "B"]);
}

#[test]
fn test_issue_order_wins_over_completion_order() {
    let mut session = Session::new(100);
    session.start();
    let first = ticket_for(&session.drain_requests(), Scope::ApplicationList);

    assert!(session.set_application_filter(ApplicationFilter::Name("pay".to_string())));
    let second = single(&mut session).ticket();

    assert!(session.apply(Completion::new(second, Ok(apps(vec![app("new", None)], 1)))));
    assert!(!session.apply(Completion::new(first, Ok(apps(vec![app("old", None)], 1)))));
    assert_eq!(visible_guids(&session), vec!["new"]);
}

#[test]
fn test_superseded_completion_arriving_first_is_dropped() {
    let mut session = Session::new(100);
    session.start();
    let first = ticket_for(&session.drain_requests(), Scope::ApplicationList);
    session.handle(Intent::Refresh);
    let second = single(&mut session).ticket();

    assert!(!session.apply(Completion::new(first, Ok(apps(vec![app("old", None)], 1)))));
    assert!(session.applications().state.is_loading());
    assert!(session.apply(Completion::new(second, Ok(apps(vec![app("new", None)], 1)))));
    assert_eq!(visible_guids(&session), vec!["new"]);
}

#[test]
fn test_filter_change_resets_to_first_page() {
    let mut session = loaded(vec![app("p0", None)], 5);

    for expected_page in 1..=3 {
        assert!(session.next_page());
        let request = single(&mut session);
        match &request {
            FetchRequest::Applications { query, .. } => {
                assert_eq!(query.page, Some(expected_page));
            }
            other => panic!("unexpected request: {other:?}"),
        }
        assert!(session.apply(Completion::new(
            request.ticket(),
            Ok(apps(vec![app("p", None)], 5))
        )));
    }
    assert_eq!(session.applications().cursor.page_index(), 3);

    session.handle(Intent::Focus(Focus::ScanType));
    session.handle(Intent::CycleOption(1));
    match single(&mut session) {
        FetchRequest::Applications { query, .. } => {
            assert_eq!(query.page.unwrap_or(0), 0);
            assert_eq!(query.scan_type.as_deref(), Some("STATIC"));
            let params = query.to_query_params();
            assert!(!params.iter().any(|(key, _)| key == "page"));
        }
        other => panic!("unexpected request: {other:?}"),
    }
    assert_eq!(session.applications().cursor.page_index(), 0);
    assert!(session.applications().state.is_loading());
}

#[test]
fn test_same_filter_value_is_a_no_op() {
    let mut session = loaded(vec![app("a", None)], 1);
    assert!(!session.set_application_filter(ApplicationFilter::Name(String::new())));
    assert!(!session.set_application_filter(ApplicationFilter::ScanStatus(None)));
    assert!(session.drain_requests().is_empty());
}

#[test]
fn test_paging_outside_bounds_is_a_no_op() {
    let mut session = loaded(vec![app("a", None)], 2);
    assert!(!session.previous_page());
    assert!(session.drain_requests().is_empty());

    assert!(session.next_page());
    let request = single(&mut session);
    // Still loading: no paging until the page lands
    assert!(!session.next_page());
    assert!(session.drain_requests().is_empty());

    assert!(session.apply(Completion::new(
        request.ticket(),
        Ok(apps(vec![app("b", None)], 2))
    )));
    assert!(!session.next_page());
    assert!(session.drain_requests().is_empty());
    assert_eq!(session.applications().cursor.page_index(), 1);
    assert!(session.applications().state.error().is_none());
}

#[test]
fn test_invalid_date_keeps_text_and_focus() {
    let mut session = loaded(vec![app("a", None)], 1);
    session.handle(Intent::Focus(Focus::ModifiedAfter));
    for c in "2025-13-45".chars() {
        session.handle(Intent::Input(c));
    }
    session.handle(Intent::Submit);

    assert!(session.applications().filters.modified_after.is_none());
    assert!(session.drain_requests().is_empty());
    assert_eq!(session.focus(), Focus::ModifiedAfter);
    assert_eq!(session.date_input().text(), "2025-13-45");
    assert_eq!(
        session.notice(),
        Some(&Notice::Error(
            "Invalid date format. Please use yyyy-MM-dd (e.g., 2025-12-17)".to_string()
        ))
    );

    // Leaving the field is refused as well
    session.handle(Intent::FocusNext);
    assert_eq!(session.focus(), Focus::ModifiedAfter);
    assert!(session.drain_requests().is_empty());

    for _ in 0..10 {
        session.handle(Intent::DeleteChar);
    }
    for c in "2025-12-17".chars() {
        session.handle(Intent::Input(c));
    }
    session.handle(Intent::Submit);

    assert_eq!(
        session.applications().filters.modified_after,
        NaiveDate::from_ymd_opt(2025, 12, 17)
    );
    match single(&mut session) {
        FetchRequest::Applications { query, .. } => {
            assert_eq!(query.modified_after.as_deref(), Some("2025-12-17"));
        }
        other => panic!("unexpected request: {other:?}"),
    }
    assert_eq!(session.focus(), Focus::Table);
    assert!(session.notice().is_none());
}

#[test]
fn test_snapshot_survives_list_refresh() {
    let mut session = loaded(vec![app("app-1", None)], 1);
    session.handle(Intent::Open);
    session.drain_requests();
    assert_eq!(
        session.application_level().expect("detail").application.guid,
        "app-1"
    );

    // Reloading the list underneath leaves the opened snapshot alone
    let ticket = Ticket {
        scope: Scope::ApplicationList,
        generation: session.generations().current(Scope::ApplicationList),
    };
    assert!(session.apply(Completion::new(ticket, Ok(apps(vec![app("other", None)], 1)))));
    assert_eq!(visible_guids(&session), vec!["other"]);
    assert_eq!(
        session.application_level().expect("detail").application.guid,
        "app-1"
    );
}

#[test]
fn test_leaving_application_drops_sandbox_completion() {
    let mut session = loaded(vec![app("app-1", None)], 1);
    session.handle(Intent::Open);
    let request = single(&mut session);
    session.handle(Intent::Back);
    assert_eq!(session.screen(), Screen::ApplicationList);

    assert!(!session.apply(Completion::new(
        request.ticket(),
        Ok(FetchOutcome::Sandboxes(Vec::new()))
    )));
    assert!(session.application_level().is_none());
}

#[test]
fn test_sandbox_context_is_sent_and_back_drops_findings() {
    let mut session = loaded(vec![app("app-1", None)], 1);
    session.handle(Intent::Open);
    let request = single(&mut session);
    let sandbox = Sandbox {
        guid: "sb-1".to_string(),
        name: "feature".to_string(),
        ..Sandbox::default()
    };
    session.apply(Completion::new(
        request.ticket(),
        Ok(FetchOutcome::Sandboxes(vec![sandbox])),
    ));
    session.handle(Intent::MoveSelection(1));
    session.handle(Intent::Open);

    let requests = session.drain_requests();
    assert_eq!(requests.len(), 2, "findings and counts, got {requests:?}");
    match requests
        .iter()
        .find(|r| r.ticket().scope == Scope::FindingCounts)
        .expect("counts request")
    {
        FetchRequest::FindingCounts {
            application_guid,
            context,
            ..
        } => {
            assert_eq!(application_guid, "app-1");
            assert_eq!(context.as_deref(), Some("sb-1"));
        }
        other => panic!("unexpected request: {other:?}"),
    }
    let request = requests
        .into_iter()
        .find(|r| r.ticket().scope == Scope::FindingsList)
        .expect("findings request");
    match &request {
        FetchRequest::Findings {
            application_guid,
            query,
            ..
        } => {
            assert_eq!(application_guid, "app-1");
            assert_eq!(query.context.as_deref(), Some("sb-1"));
            assert_eq!(query.scan_types, vec![ScanType::Static]);
            assert_eq!(query.severity, None);
            assert_eq!(query.violates_policy, None);
            assert!(query.include_annotations);
        }
        other => panic!("unexpected request: {other:?}"),
    }

    session.handle(Intent::Back);
    assert_eq!(session.screen(), Screen::ApplicationDetail);
    assert!(!session.apply(Completion::new(
        request.ticket(),
        Ok(findings(vec![finding(1, "STATIC")], 1))
    )));
    assert!(session.findings_level().is_none());
}

#[test]
fn test_finding_filters_refetch_from_first_page() {
    let mut session = in_sandbox_findings(vec![finding(1, "STATIC")]);

    session.handle(Intent::CycleSeverity);
    match single(&mut session) {
        FetchRequest::Findings { query, .. } => {
            assert_eq!(query.severity, Some(1));
            assert_eq!(query.page.unwrap_or(0), 0);
        }
        other => panic!("unexpected request: {other:?}"),
    }

    session.handle(Intent::CycleFindingScanType);
    session.drain_requests();
    session.handle(Intent::CycleFindingScanType);
    match single(&mut session) {
        FetchRequest::Findings { query, .. } => {
            assert_eq!(query.scan_types, vec![ScanType::Sca]);
            assert!(!query.include_annotations);
        }
        other => panic!("unexpected request: {other:?}"),
    }

    session.handle(Intent::CyclePolicy);
    match single(&mut session) {
        FetchRequest::Findings { query, .. } => {
            assert_eq!(query.violates_policy, Some(true));
        }
        other => panic!("unexpected request: {other:?}"),
    }
}

#[test]
fn test_data_paths_are_fetched_without_context_and_bounded() {
    let mut session = in_sandbox_findings(vec![finding(42, "STATIC")]);
    session.handle(Intent::Open);
    assert_eq!(session.screen(), Screen::FindingDetail);
    assert!(session.drain_requests().is_empty());

    session.handle(Intent::ShowDataPaths);
    let request = single(&mut session);
    match &request {
        FetchRequest::StaticFlawInfo {
            application_guid,
            issue_id,
            ..
        } => {
            assert_eq!(application_guid, "app-1");
            assert_eq!(*issue_id, 42);
        }
        other => panic!("unexpected request: {other:?}"),
    }
    assert_eq!(session.screen(), Screen::DataPaths);

    assert!(!session.step_data_path(1));
    let info = StaticFlawInfo {
        issue_summary: None,
        data_paths: vec![DataPath::default(), DataPath::default()],
    };
    assert!(session.apply(Completion::new(
        request.ticket(),
        Ok(FetchOutcome::StaticFlawInfo(info))
    )));

    assert!(!session.step_data_path(-1));
    assert!(session.step_data_path(1));
    assert!(!session.step_data_path(1));
    assert_eq!(session.finding_level().expect("finding").path_index, 1);

    // Reopening uses the loaded paths
    session.handle(Intent::Back);
    session.handle(Intent::ShowDataPaths);
    assert!(session.drain_requests().is_empty());
}

#[test]
fn test_data_paths_need_a_static_finding() {
    let mut session = in_sandbox_findings(vec![finding(7, "DYNAMIC")]);
    session.handle(Intent::Open);
    session.handle(Intent::ShowDataPaths);
    assert!(session.drain_requests().is_empty());
    assert_eq!(session.screen(), Screen::FindingDetail);
    assert!(matches!(session.notice(), Some(Notice::Info(_))));
}

#[test]
fn test_annotation_submission_refreshes_findings() {
    let mut session = in_sandbox_findings(vec![finding(42, "STATIC")]);
    session.handle(Intent::Open);
    session.handle(Intent::Annotate);
    assert_eq!(session.screen(), Screen::AnnotationForm);
    assert!(session.is_text_entry());

    session.handle(Intent::CycleOption(1));
    for c in "not reachable".chars() {
        session.handle(Intent::Input(c));
    }
    session.handle(Intent::Submit);

    let request = single(&mut session);
    match &request {
        FetchRequest::CreateAnnotation {
            application_guid,
            annotation,
            context,
            ..
        } => {
            assert_eq!(application_guid, "app-1");
            assert_eq!(annotation.issue_list, "42");
            assert_eq!(annotation.action, AnnotationAction::FalsePositive);
            assert_eq!(annotation.comment, "not reachable");
            assert_eq!(context.as_deref(), Some("sb-1"));
        }
        other => panic!("unexpected request: {other:?}"),
    }
    // The form stays up until the platform accepts it
    assert_eq!(session.screen(), Screen::AnnotationForm);
    session.handle(Intent::Submit);
    assert!(session.drain_requests().is_empty());

    assert!(session.apply(Completion::new(
        request.ticket(),
        Ok(FetchOutcome::Annotation(AnnotationResponse::default()))
    )));
    assert_eq!(session.screen(), Screen::FindingDetail);
    assert_eq!(
        session.notice(),
        Some(&Notice::Info("Annotation created".to_string()))
    );
    assert!(matches!(
        single(&mut session),
        FetchRequest::Findings { .. }
    ));
}

#[test]
fn test_rejected_annotation_keeps_the_form() {
    let mut session = in_sandbox_findings(vec![finding(42, "STATIC")]);
    session.handle(Intent::Open);
    session.handle(Intent::Annotate);
    session.handle(Intent::CycleOption(1));
    for c in "long justification text".chars() {
        session.handle(Intent::Input(c));
    }
    session.handle(Intent::Submit);
    let request = single(&mut session);

    let err: veracode_api::VeracodeError = veracode_api::HttpError::new(
        400,
        "400 Bad Request",
        br#"{"_embedded":{"api_errors":[{"code":"BAD_REQUEST","detail":"Comment required for FP"}]}}"#
            .to_vec(),
    )
    .into();
    assert!(session.apply(Completion::new(request.ticket(), Err(err))));

    assert_eq!(session.screen(), Screen::AnnotationForm);
    assert_eq!(
        session.notice(),
        Some(&Notice::Error(
            "Error: HTTP 400: Comment required for FP".to_string()
        ))
    );
    let level = session.finding_level().expect("finding");
    let form = level.annotation_form.as_ref().expect("form kept");
    assert_eq!(form.action(), AnnotationAction::FalsePositive);
    assert_eq!(form.comment.text(), "long justification text");
    assert!(level.annotation.error().is_some());

    // The same form can be sent again
    session.handle(Intent::Submit);
    match single(&mut session) {
        FetchRequest::CreateAnnotation { annotation, .. } => {
            assert_eq!(annotation.action, AnnotationAction::FalsePositive);
            assert_eq!(annotation.comment, "long justification text");
        }
        other => panic!("unexpected request: {other:?}"),
    }
}

#[test]
fn test_signed_short_date_is_rejected() {
    let mut session = loaded(vec![app("a", None)], 1);
    session.handle(Intent::Focus(Focus::ModifiedAfter));
    for c in "+2025-1-01".chars() {
        session.handle(Intent::Input(c));
    }
    session.handle(Intent::Submit);

    assert!(session.applications().filters.modified_after.is_none());
    assert!(session.drain_requests().is_empty());
    assert_eq!(session.focus(), Focus::ModifiedAfter);
    assert!(matches!(session.notice(), Some(Notice::Error(_))));
}

#[test]
fn test_finding_counts_load_with_the_context() {
    let mut session = loaded(vec![app("app-1", None)], 1);
    session.handle(Intent::Open);
    let request = single(&mut session);
    assert!(session.apply(Completion::new(
        request.ticket(),
        Ok(FetchOutcome::Sandboxes(Vec::new()))
    )));
    session.handle(Intent::Open);
    let requests = session.drain_requests();
    match &requests[..] {
        [
            FetchRequest::Findings { .. },
            FetchRequest::FindingCounts {
                context: None,
                ..
            },
        ] => {}
        other => panic!("unexpected requests: {other:?}"),
    }
    let counts_ticket = ticket_for(&requests, Scope::FindingCounts);
    assert!(
        session
            .findings_level()
            .expect("findings")
            .counts
            .is_loading()
    );

    assert!(session.apply(Completion::new(counts_ticket, Ok(counts(12, 3, 0)))));
    assert_eq!(
        session.findings_level().expect("findings").counts,
        ScopeState::Loaded(FindingCounts {
            static_count: 12,
            dynamic_count: 3,
            sca_count: 0,
        })
    );

    // Filter changes keep the unfiltered totals
    session.handle(Intent::CycleSeverity);
    assert!(matches!(
        single(&mut session),
        FetchRequest::Findings { .. }
    ));
    assert!(session.findings_level().expect("findings").counts.loaded().is_some());
}

#[test]
fn test_stale_finding_counts_are_dropped() {
    let mut session = loaded(vec![app("app-1", None)], 1);
    session.handle(Intent::Open);
    let request = single(&mut session);
    assert!(session.apply(Completion::new(
        request.ticket(),
        Ok(FetchOutcome::Sandboxes(Vec::new()))
    )));

    session.handle(Intent::Open);
    let first = ticket_for(&session.drain_requests(), Scope::FindingCounts);

    // Leaving the listing drops its totals
    session.handle(Intent::Back);
    assert!(!session.apply(Completion::new(first, Ok(counts(1, 1, 1)))));
    assert!(session.findings_level().is_none());

    // A reopened listing only takes its own totals
    session.handle(Intent::Open);
    let second = ticket_for(&session.drain_requests(), Scope::FindingCounts);
    assert!(!session.apply(Completion::new(first, Ok(counts(1, 1, 1)))));
    assert!(session.findings_level().expect("findings").counts.is_loading());

    // Refresh supersedes the outstanding totals
    session.handle(Intent::Refresh);
    let third = ticket_for(&session.drain_requests(), Scope::FindingCounts);
    assert!(!session.apply(Completion::new(second, Ok(counts(2, 2, 2)))));
    assert!(session.apply(Completion::new(third, Ok(counts(5, 0, 4)))));
    assert_eq!(
        session
            .findings_level()
            .expect("findings")
            .counts
            .loaded()
            .map(|c| c.sca_count),
        Some(4)
    );
}

#[test]
fn test_failed_fetch_surfaces_message_without_retry() {
    let mut session = Session::new(100);
    session.start();
    let ticket = ticket_for(&session.drain_requests(), Scope::ApplicationList);
    let err: veracode_api::VeracodeError = veracode_api::HttpError::new(
        404,
        "404 Not Found",
        br#"{"message":"not found"}"#.to_vec(),
    )
    .into();
    assert!(session.apply(Completion::new(ticket, Err(err))));

    assert_eq!(
        session.applications().state.error(),
        Some(r#"Error: HTTP 404: {"message":"not found"}"#)
    );
    assert!(session.drain_requests().is_empty());
}

proptest! {
    #[test]
    fn prop_sort_orders_known_before_unknown(
        stamps in proptest::collection::vec(proptest::option::of(0i64..2_000_000_000), 0..40)
    ) {
        let mut items: Vec<Application> = stamps
            .iter()
            .enumerate()
            .map(|(i, stamp)| Application {
                guid: i.to_string(),
                modified: stamp.and_then(|s| DateTime::from_timestamp(s, 0)),
                ..Application::default()
            })
            .collect();
        sort_by_modified(&mut items);

        let first_unknown = items.iter().position(|a| a.modified.is_none()).unwrap_or(items.len());
        prop_assert!(items[first_unknown..].iter().all(|a| a.modified.is_none()));
        prop_assert!(items[..first_unknown].windows(2).all(|w| w[0].modified >= w[1].modified));

        let unknown: Vec<usize> = items[first_unknown..]
            .iter()
            .map(|a| a.guid.parse().expect("index"))
            .collect();
        prop_assert!(unknown.windows(2).all(|w| w[0] < w[1]));
    }
}
