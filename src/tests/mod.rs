use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::api::{Ack, ApiError};
use crate::controller::{ControllerError, Gateway, ListController};
use crate::form::{FormState, StudentDraft};
use crate::model::{Grade, GradeSections, RecordId, Section, Student};
use crate::notify::RecordingNotify;
use crate::query::{self, ListQuery, Page};
use crate::render::ListView;

#[derive(Debug, Default)]
struct GatewayLog {
    list_queries: Vec<Vec<(String, String)>>,
    created: Vec<serde_json::Value>,
    updated: Vec<serde_json::Value>,
    deleted: Vec<RecordId>,
    bulk_deleted: Vec<Vec<RecordId>>,
}

/// Scripted transport stub: outcomes are queued up front and popped
/// per call, while the shared log records what the controller sent.
struct ScriptedGateway {
    log: Rc<RefCell<GatewayLog>>,
    list_outcomes: VecDeque<Result<Page<Student>, ApiError>>,
    mutation_outcomes: VecDeque<Result<Ack, ApiError>>,
}

impl ScriptedGateway {
    fn new() -> (Self, Rc<RefCell<GatewayLog>>) {
        let log = Rc::new(RefCell::new(GatewayLog::default()));
        (
            Self {
                log: log.clone(),
                list_outcomes: VecDeque::new(),
                mutation_outcomes: VecDeque::new(),
            },
            log,
        )
    }

    fn push_list(&mut self, outcome: Result<Page<Student>, ApiError>) {
        self.list_outcomes.push_back(outcome);
    }

    fn push_mutation(&mut self, outcome: Result<Ack, ApiError>) {
        self.mutation_outcomes.push_back(outcome);
    }

    fn next_mutation(&mut self) -> Result<Ack, ApiError> {
        self.mutation_outcomes
            .pop_front()
            .unwrap_or(Ok(Ack::default()))
    }
}

impl Gateway<Student> for ScriptedGateway {
    async fn list(&mut self, query: &ListQuery) -> Result<Page<Student>, ApiError> {
        self.log.borrow_mut().list_queries.push(query.to_pairs());
        self.list_outcomes
            .pop_front()
            .unwrap_or_else(|| Ok(Page::empty(query.page())))
    }

    async fn create(&mut self, payload: &serde_json::Value) -> Result<Ack, ApiError> {
        self.log.borrow_mut().created.push(payload.clone());
        self.next_mutation()
    }

    async fn update(&mut self, payload: &serde_json::Value) -> Result<Ack, ApiError> {
        self.log.borrow_mut().updated.push(payload.clone());
        self.next_mutation()
    }

    async fn delete_one(&mut self, id: RecordId) -> Result<Ack, ApiError> {
        self.log.borrow_mut().deleted.push(id);
        self.next_mutation()
    }

    async fn delete_bulk(&mut self, ids: &[RecordId]) -> Result<Ack, ApiError> {
        self.log.borrow_mut().bulk_deleted.push(ids.to_vec());
        self.next_mutation()
    }
}

/// Captures every rendered page through a shared handle, since the
/// controller owns the view.
#[derive(Clone, Default)]
struct RecordingView {
    pages: Rc<RefCell<Vec<Page<Student>>>>,
}

impl ListView<Student> for RecordingView {
    fn render(&mut self, page: &Page<Student>) {
        self.pages.borrow_mut().push(page.clone());
    }
}

fn student(id: i64, name: &str) -> Student {
    Student {
        id: RecordId(id),
        name: name.to_string(),
        email: format!("{}@school.ph", name.to_lowercase().replace(' ', ".")),
        grade_level: "7".to_string(),
        section: "7-A".to_string(),
        rfid: Some(format!("04A{id}")),
        fingerprint_id: Some(id.to_string()),
    }
}

fn page_of(items: Vec<Student>, current_page: u32, total_count: u64, limit: u32) -> Page<Student> {
    Page {
        items,
        current_page,
        total_pages: query::total_pages(total_count, limit),
        total_count,
    }
}

fn grade_sections() -> GradeSections {
    GradeSections {
        grades: vec![Grade {
            id: "7".into(),
            name: Some("Grade 7".into()),
        }],
        sections: vec![Section {
            id: "7-A".into(),
            grade_id: "7".into(),
            name: None,
        }],
    }
}

fn controller(
    gateway: ScriptedGateway,
    limit: u32,
) -> (
    ListController<Student, ScriptedGateway, RecordingView, RecordingNotify>,
    Rc<RefCell<Vec<Page<Student>>>>,
) {
    let view = RecordingView::default();
    let pages = view.pages.clone();
    (
        ListController::new(gateway, view, RecordingNotify::default(), limit),
        pages,
    )
}

#[tokio::test]
async fn exhausted_fetch_degrades_to_empty_page_with_notification() {
    let (mut gw, _log) = ScriptedGateway::new();
    gw.push_list(Err(ApiError::FetchFailed {
        attempts: 4,
        message: "request timed out".to_string(),
    }));
    let (mut ctl, pages) = controller(gw, 10);

    ctl.refresh().await;

    let pages = pages.borrow();
    assert_eq!(pages.len(), 1);
    assert!(pages[0].is_empty());
    assert_eq!(pages[0].total_pages, 0);
    assert_eq!(ctl.records().len(), 0);
    let errors = &ctl.notify_mut().errors;
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("failed to fetch students"));
}

#[tokio::test]
async fn search_restarts_pagination_at_page_one() {
    let (mut gw, log) = ScriptedGateway::new();
    gw.push_list(Ok(page_of(vec![student(1, "Ana")], 3, 25, 10)));
    gw.push_list(Ok(page_of(vec![student(2, "Ben")], 1, 1, 10)));
    let (mut ctl, _pages) = controller(gw, 10);

    ctl.set_page(3);
    ctl.refresh().await;
    ctl.search("ben").await;

    let log = log.borrow();
    assert_eq!(log.list_queries.len(), 2);
    let last = &log.list_queries[1];
    assert!(last.contains(&("page".to_string(), "1".to_string())));
    assert!(last.contains(&("query".to_string(), "ben".to_string())));
}

#[tokio::test]
async fn create_success_resets_form_and_refetches() {
    let (mut gw, log) = ScriptedGateway::new();
    gw.push_mutation(Ok(Ack::default()));
    gw.push_list(Ok(page_of(vec![student(9, "Ana Reyes")], 1, 1, 10)));
    let (mut ctl, pages) = controller(gw, 10);

    let ctx = grade_sections();
    let mut form: FormState<StudentDraft> = FormState::default();
    *form.draft_mut() = StudentDraft {
        name: "Ana Reyes".into(),
        email: "ana@school.ph".into(),
        grade_level: "7".into(),
        section: "7-A".into(),
        rfid: Some("04A9".into()),
        fingerprint_id: Some("9".into()),
    };

    assert!(ctl.submit(&mut form, &ctx).await);

    let log = log.borrow();
    assert_eq!(log.created.len(), 1);
    assert!(log.created[0].get("id").is_none());
    assert_eq!(log.list_queries.len(), 1);
    assert_eq!(pages.borrow().len(), 1);
    assert!(form.draft().name.is_empty());
    assert_eq!(ctl.notify_mut().successes.len(), 1);
    assert!(ctl.notify_mut().successes[0].contains("Ana Reyes"));
}

#[tokio::test]
async fn validation_failure_never_reaches_the_gateway() {
    let (gw, log) = ScriptedGateway::new();
    let (mut ctl, pages) = controller(gw, 10);

    let ctx = grade_sections();
    let mut form: FormState<StudentDraft> = FormState::default();
    form.draft_mut().name = "Only A Name".into();

    assert!(!ctl.submit(&mut form, &ctx).await);

    let log = log.borrow();
    assert!(log.created.is_empty());
    assert!(log.list_queries.is_empty());
    assert!(pages.borrow().is_empty());
    assert_eq!(ctl.notify_mut().errors.len(), 1);
}

#[tokio::test]
async fn server_rejection_keeps_draft_for_retry() {
    let (mut gw, log) = ScriptedGateway::new();
    gw.push_list(Ok(page_of(vec![student(2, "Ben Cruz")], 1, 1, 10)));
    gw.push_mutation(Err(ApiError::RequestFailed {
        message: "email already registered".to_string(),
    }));
    let (mut ctl, _pages) = controller(gw, 10);

    ctl.refresh().await;
    let ctx = grade_sections();
    let mut form: FormState<StudentDraft> = FormState::default();
    ctl.begin_edit(&mut form, RecordId(2)).unwrap();
    form.draft_mut().email = "taken@school.ph".into();

    assert!(!ctl.submit(&mut form, &ctx).await);

    assert_eq!(log.borrow().updated.len(), 1);
    assert!(!form.is_submitting());
    assert_eq!(form.draft().email, "taken@school.ph");
    assert_eq!(form.draft().name, "Ben Cruz");
    assert_eq!(ctl.notify_mut().errors, vec!["email already registered"]);
}

#[tokio::test]
async fn edit_payload_carries_the_record_id() {
    let (mut gw, log) = ScriptedGateway::new();
    gw.push_list(Ok(page_of(vec![student(7, "Ana")], 1, 1, 10)));
    gw.push_mutation(Ok(Ack::default()));
    gw.push_list(Ok(page_of(vec![student(7, "Ana Maria")], 1, 1, 10)));
    let (mut ctl, _pages) = controller(gw, 10);

    ctl.refresh().await;
    let ctx = grade_sections();
    let mut form: FormState<StudentDraft> = FormState::default();
    ctl.begin_edit(&mut form, RecordId(7)).unwrap();
    form.draft_mut().name = "Ana Maria".into();

    assert!(ctl.submit(&mut form, &ctx).await);

    let log = log.borrow();
    assert_eq!(log.updated.len(), 1);
    assert_eq!(log.updated[0]["id"], serde_json::json!(7));
    assert_eq!(log.updated[0]["name"], serde_json::json!("Ana Maria"));
}

#[tokio::test]
async fn stale_edit_id_is_surfaced_not_submitted() {
    let (mut gw, _log) = ScriptedGateway::new();
    gw.push_list(Ok(page_of(vec![student(1, "Ana")], 1, 1, 10)));
    let (mut ctl, _pages) = controller(gw, 10);

    ctl.refresh().await;
    let mut form: FormState<StudentDraft> = FormState::default();
    let err = ctl.begin_edit(&mut form, RecordId(42)).unwrap_err();
    assert_eq!(
        err,
        ControllerError::NotFound {
            kind: "student",
            id: RecordId(42)
        }
    );
}

#[tokio::test]
async fn failed_delete_leaves_the_row_in_place() {
    let (mut gw, log) = ScriptedGateway::new();
    gw.push_list(Ok(page_of(
        vec![student(1, "Ana"), student(2, "Ben")],
        1,
        2,
        10,
    )));
    gw.push_mutation(Err(ApiError::RequestFailed {
        message: "machine is offline".to_string(),
    }));
    let (mut ctl, pages) = controller(gw, 10);

    ctl.refresh().await;
    assert!(!ctl.delete_one(RecordId(2)).await);

    // no local removal and no re-fetch happened
    assert_eq!(ctl.records().len(), 2);
    assert_eq!(log.borrow().list_queries.len(), 1);
    assert_eq!(pages.borrow().len(), 1);
    assert_eq!(ctl.notify_mut().errors.len(), 1);
}

#[tokio::test]
async fn bulk_delete_sends_one_call_and_clamps_the_page() {
    let limit = 2;
    let (mut gw, log) = ScriptedGateway::new();
    // page 2 of 2 holds the last row; deleting it shrinks the set to
    // one page, so the follow-up fetch must land on page 1
    gw.push_list(Ok(page_of(vec![student(3, "Cara")], 2, 3, limit)));
    gw.push_mutation(Ok(Ack::default()));
    gw.push_list(Ok(page_of(vec![], 2, 2, limit)));
    gw.push_list(Ok(page_of(
        vec![student(1, "Ana"), student(2, "Ben")],
        1,
        2,
        limit,
    )));
    let (mut ctl, pages) = controller(gw, limit);

    ctl.set_page(2);
    ctl.refresh().await;
    assert!(ctl.selection_mut().toggle(RecordId(3)));
    assert!(ctl.bulk_delete().await);

    let log = log.borrow();
    assert_eq!(log.bulk_deleted, vec![vec![RecordId(3)]]);
    assert_eq!(ctl.query().page(), 1);
    let pages = pages.borrow();
    let last = pages.last().unwrap();
    assert_eq!(last.current_page, 1);
    assert_eq!(last.items.len(), 2);
}

#[tokio::test]
async fn selection_does_not_survive_a_render() {
    let (mut gw, _log) = ScriptedGateway::new();
    gw.push_list(Ok(page_of(
        vec![student(1, "Ana"), student(2, "Ben")],
        1,
        2,
        10,
    )));
    gw.push_list(Ok(page_of(
        vec![student(1, "Ana"), student(2, "Ben")],
        1,
        2,
        10,
    )));
    let (mut ctl, _pages) = controller(gw, 10);

    ctl.refresh().await;
    assert!(ctl.selection_mut().toggle(RecordId(1)));
    assert_eq!(ctl.selection_mut().count(), 1);

    ctl.refresh().await;
    assert_eq!(ctl.selection_mut().count(), 0);
}

#[tokio::test]
async fn off_page_ids_cannot_be_selected() {
    let (mut gw, _log) = ScriptedGateway::new();
    gw.push_list(Ok(page_of(vec![student(1, "Ana")], 1, 1, 10)));
    let (mut ctl, _pages) = controller(gw, 10);

    ctl.refresh().await;
    assert!(!ctl.selection_mut().toggle(RecordId(99)));
    assert_eq!(ctl.selection_mut().count(), 0);
}

#[tokio::test]
async fn next_page_stops_at_the_upper_bound() {
    let (mut gw, log) = ScriptedGateway::new();
    gw.push_list(Ok(page_of(vec![student(1, "Ana")], 2, 11, 10)));
    let (mut ctl, _pages) = controller(gw, 10);

    ctl.set_page(2);
    ctl.refresh().await;
    assert_eq!(ctl.total_pages(), 2);

    // already on the last page
    ctl.next_page().await;
    assert_eq!(log.borrow().list_queries.len(), 1);
    assert_eq!(ctl.query().page(), 2);
}

#[tokio::test]
async fn prev_page_is_a_noop_on_page_one() {
    let (mut gw, log) = ScriptedGateway::new();
    gw.push_list(Ok(page_of(vec![student(1, "Ana")], 1, 1, 10)));
    let (mut ctl, _pages) = controller(gw, 10);

    ctl.refresh().await;
    ctl.prev_page().await;

    assert_eq!(log.borrow().list_queries.len(), 1);
    assert_eq!(ctl.query().page(), 1);
}

#[tokio::test]
async fn filter_values_round_trip_through_the_query() {
    let (mut gw, log) = ScriptedGateway::new();
    gw.push_list(Ok(page_of(vec![], 1, 0, 10)));
    let (mut ctl, _pages) = controller(gw, 10);

    ctl.set_filter("status", "Late").await;

    let log = log.borrow();
    let pairs = &log.list_queries[0];
    assert!(pairs.contains(&("status".to_string(), "Late".to_string())));
    assert!(pairs.contains(&("page".to_string(), "1".to_string())));
    assert!(pairs.contains(&("limit".to_string(), "10".to_string())));
}
