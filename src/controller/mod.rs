use thiserror::Error;

use crate::api::{Ack, ApiClient, ApiError};
use crate::form::{Draftable, FormDraft, FormMode, FormState};
use crate::model::{Keyed, ListRecord, RecordId};
use crate::notify::Notify;
use crate::query::{ListQuery, Page};
use crate::render::ListView;
use crate::selection::Selection;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ControllerError {
    /// The referenced row is gone from the in-memory list, e.g. an
    /// edit click raced a refresh.
    #[error("{kind} {id} is no longer in the current list")]
    NotFound { kind: &'static str, id: RecordId },
}

/// Transport seam for the controller. `ApiClient` is the production
/// implementation; tests script outcomes instead of hitting the wire.
#[allow(async_fn_in_trait)]
pub trait Gateway<R: ListRecord> {
    async fn list(&mut self, query: &ListQuery) -> Result<Page<R>, ApiError>;
    async fn create(&mut self, payload: &serde_json::Value) -> Result<Ack, ApiError>;
    async fn update(&mut self, payload: &serde_json::Value) -> Result<Ack, ApiError>;
    async fn delete_one(&mut self, id: RecordId) -> Result<Ack, ApiError>;
    async fn delete_bulk(&mut self, ids: &[RecordId]) -> Result<Ack, ApiError>;
}

impl<R: ListRecord> Gateway<R> for ApiClient {
    async fn list(&mut self, query: &ListQuery) -> Result<Page<R>, ApiError> {
        ApiClient::list::<R>(self, query).await
    }

    async fn create(&mut self, payload: &serde_json::Value) -> Result<Ack, ApiError> {
        ApiClient::create::<R>(self, payload).await
    }

    async fn update(&mut self, payload: &serde_json::Value) -> Result<Ack, ApiError> {
        ApiClient::update::<R>(self, payload).await
    }

    async fn delete_one(&mut self, id: RecordId) -> Result<Ack, ApiError> {
        ApiClient::delete_one::<R>(self, id).await
    }

    async fn delete_bulk(&mut self, ids: &[RecordId]) -> Result<Ack, ApiError> {
        ApiClient::delete_bulk::<R>(self, ids).await
    }
}

/// The one reusable piece of the whole dashboard: a paginated list
/// with filter state, per-page selection and CRUD wiring, instantiated
/// once per resource kind. Each instance owns its own query state,
/// last-fetched records and selection; nothing is shared across kinds.
pub struct ListController<R: ListRecord, G: Gateway<R>, V: ListView<R>, N: Notify> {
    gateway: G,
    view: V,
    notify: N,
    query: ListQuery,
    records: Vec<R>,
    total_pages: u32,
    total_count: u64,
    is_loading: bool,
    fetch_seq: u64,
    render_gen: u64,
    selection: Selection,
    selection_gen: u64,
}

impl<R: ListRecord, G: Gateway<R>, V: ListView<R>, N: Notify> ListController<R, G, V, N> {
    pub fn new(gateway: G, view: V, notify: N, limit: u32) -> Self {
        Self {
            gateway,
            view,
            notify,
            query: ListQuery::with_limit(limit),
            records: Vec::new(),
            total_pages: 0,
            total_count: 0,
            is_loading: false,
            fetch_seq: 0,
            render_gen: 0,
            selection: Selection::default(),
            selection_gen: 0,
        }
    }

    pub fn query(&self) -> &ListQuery {
        &self.query
    }

    /// Direct query access for callers that stage several filter
    /// changes before a single `refresh`.
    pub fn query_mut(&mut self) -> &mut ListQuery {
        &mut self.query
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn notify_mut(&mut self) -> &mut N {
        &mut self.notify
    }

    fn apply(&mut self, page: Page<R>) {
        self.records = page.items.clone();
        self.total_pages = page.total_pages;
        self.total_count = page.total_count;
        self.render_gen += 1;
        self.view.render(&page);
    }

    fn apply_failure(&mut self, error: ApiError) {
        // the view must always end up in a renderable state, so a
        // failed fetch degrades to the canonical empty page
        self.records.clear();
        self.total_pages = 0;
        self.total_count = 0;
        self.render_gen += 1;
        self.view.render(&Page::empty(self.query.page()));
        self.notify
            .error(&format!("failed to fetch {}: {error}", R::KIND.plural()));
    }

    /// Fetches and renders the current page. A second trigger while a
    /// fetch is outstanding is dropped, not queued. When the result
    /// set shrank below the current page, the query clamps to the new
    /// last valid page and one follow-up fetch repaints it.
    pub async fn refresh(&mut self) {
        if self.is_loading {
            return;
        }
        self.is_loading = true;
        self.fetch_seq += 1;
        let seq = self.fetch_seq;

        let outcome = self.gateway.list(&self.query).await;
        // stale completions must never overwrite newer state
        if seq == self.fetch_seq {
            match outcome {
                Ok(page) if page.total_pages > 0 && self.query.page() > page.total_pages => {
                    self.query.clamp(page.total_pages);
                    match self.gateway.list(&self.query).await {
                        Ok(clamped) => self.apply(clamped),
                        Err(e) => self.apply_failure(e),
                    }
                }
                Ok(page) => self.apply(page),
                Err(e) => self.apply_failure(e),
            }
        }
        self.is_loading = false;
    }

    pub async fn search(&mut self, query: &str) {
        self.query.set_query(query);
        self.refresh().await;
    }

    pub async fn set_filter(&mut self, key: &str, value: &str) {
        self.query.set_field(key, value);
        self.refresh().await;
    }

    pub fn set_page(&mut self, page: u32) {
        self.query.set_page(page);
    }

    /// No-op at the upper bound or while a fetch is in flight.
    pub async fn next_page(&mut self) {
        if self.is_loading {
            return;
        }
        if self.query.next_page(self.total_pages) {
            self.refresh().await;
        }
    }

    pub async fn prev_page(&mut self) {
        if self.is_loading {
            return;
        }
        if self.query.prev_page() {
            self.refresh().await;
        }
    }
}

impl<R: Keyed, G: Gateway<R>, V: ListView<R>, N: Notify> ListController<R, G, V, N> {
    pub fn find(&self, id: RecordId) -> Option<&R> {
        self.records.iter().find(|r| r.id() == id)
    }

    /// Selection for the page rendered last. Re-seeded (and therefore
    /// cleared) the first time it is touched after any render.
    pub fn selection_mut(&mut self) -> &mut Selection {
        if self.selection_gen != self.render_gen {
            let visible = self.records.iter().map(|r| r.id()).collect();
            self.selection.sync(visible);
            self.selection_gen = self.render_gen;
        }
        &mut self.selection
    }

    /// Deletes one row after the out-of-band confirm. The row is never
    /// removed locally before the server confirms.
    pub async fn delete_one(&mut self, id: RecordId) -> bool {
        let label = match self.find(id) {
            Some(record) => record.label().to_string(),
            None => {
                self.notify.error(&format!(
                    "{} {id} is no longer in the current list",
                    R::KIND.singular()
                ));
                return false;
            }
        };
        match self.gateway.delete_one(id).await {
            Ok(_) => {
                self.notify.success(&format!(
                    "{} {label} deleted successfully",
                    R::KIND.singular()
                ));
                self.refresh().await;
                true
            }
            Err(e) => {
                self.notify
                    .error(&format!("failed to delete {} {label}: {e}", R::KIND.singular()));
                false
            }
        }
    }

    /// One mutation call carrying the full selected id list. Success
    /// re-fetches the current page; `refresh` clamps it if the result
    /// set shrank underneath it.
    pub async fn bulk_delete(&mut self) -> bool {
        let ids = self.selection_mut().selected();
        if ids.is_empty() {
            return false;
        }
        match self.gateway.delete_bulk(&ids).await {
            Ok(_) => {
                self.notify.success(&format!(
                    "deleted {} {} successfully",
                    ids.len(),
                    R::KIND.plural()
                ));
                self.refresh().await;
                true
            }
            Err(e) => {
                self.notify
                    .error(&format!("failed to delete selected {}: {e}", R::KIND.plural()));
                false
            }
        }
    }
}

impl<R: Draftable, G: Gateway<R>, V: ListView<R>, N: Notify> ListController<R, G, V, N> {
    /// Moves the form into edit mode, prefilled from the last-fetched
    /// in-memory record. No fresh fetch happens here; a stale id is an
    /// error surfaced to the caller.
    pub fn begin_edit(
        &self,
        form: &mut FormState<R::Draft>,
        id: RecordId,
    ) -> Result<(), ControllerError> {
        let record = self.find(id).ok_or(ControllerError::NotFound {
            kind: R::KIND.singular(),
            id,
        })?;
        form.begin_edit(id, record.to_draft());
        Ok(())
    }

    /// Validates, submits and settles the form. A validation failure
    /// makes no network call; a server failure leaves the draft intact
    /// for retry; success resets to Create and re-fetches the list.
    pub async fn submit(
        &mut self,
        form: &mut FormState<R::Draft>,
        ctx: &<R::Draft as FormDraft>::Context,
    ) -> bool {
        let mode = form.mode();
        let payload = match form.begin_submit(ctx) {
            Ok(payload) => payload,
            Err(e) => {
                self.notify.error(&e.to_string());
                return false;
            }
        };

        let label = payload
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or(R::KIND.singular())
            .to_string();
        let (outcome, verb) = match mode {
            FormMode::Create => (self.gateway.create(&payload).await, "registered"),
            FormMode::Edit(_) => (self.gateway.update(&payload).await, "updated"),
        };

        match outcome {
            Ok(_) => {
                form.finish_submit(true);
                self.notify
                    .success(&format!("{} {label} {verb} successfully", R::KIND.singular()));
                self.refresh().await;
                true
            }
            Err(e) => {
                form.finish_submit(false);
                let message = match e {
                    ApiError::RequestFailed { message } => message,
                    other => other.to_string(),
                };
                self.notify.error(&message);
                false
            }
        }
    }
}
