//! Request queue and dispatcher.
//!
//! Requests are classified once, at enqueue time, and dispatched in FIFO
//! order under a single rule: a structural request only goes out when
//! nothing else is in flight, and reads/writes only go out while no
//! structural request is in flight.
//!
//! When a structural request settles, its confirmed effects are replayed
//! through the coordinate transformer over the window and every request
//! still waiting, all under the same lock that released the in-flight slot.
//! Observers hear about the change after that, then the caller is resolved.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use log::{debug, trace, warn};
use parking_lot::Mutex;
use smol::channel::{Receiver, Sender};

use sheetwire_core::LogicalWindow;
use sheetwire_protocol::{
    ChangeKind, DeleteRange, Dimension, InsertSpec, Request, RequestKind, Response,
    StructuralChange,
};

use crate::error::PipelineError;
use crate::events::{self, StructuralChangeObserver};
use crate::executor::GridExecutor;
use crate::transform;

type Reply = Sender<Result<Response, PipelineError>>;

struct PendingRequest {
    id: u64,
    kind: RequestKind,
    request: Request,
    /// Set for window extensions; `request` is built from it at dispatch.
    extension: Option<Extension>,
    reply: Reply,
}

/// Target window stops for [`RequestQueue::enqueue_extension`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Extension {
    pub row_stop: Option<u32>,
    pub col_stop: Option<u32>,
}

impl Extension {
    /// Insertions at the window's current stops up to the targets.
    fn request(&self, window: &LogicalWindow) -> Request {
        Request {
            insert_rows: growth(window.row_stop, self.row_stop),
            insert_columns: growth(window.col_stop, self.col_stop),
            ..Request::default()
        }
    }

    /// Move the window stop to the target once its insertion is confirmed.
    fn grow(&self, window: &mut LogicalWindow, change: &StructuralChange) {
        if change.change != ChangeKind::Inserted {
            return;
        }
        let (stop, target) = match change.dimension {
            Dimension::Rows => (&mut window.row_stop, self.row_stop),
            Dimension::Columns => (&mut window.col_stop, self.col_stop),
        };
        if let (Some(current), Some(target)) = (*stop, target) {
            if target > current {
                *stop = Some(target);
            }
        }
    }
}

struct QueueState {
    pending: VecDeque<PendingRequest>,
    structural_in_flight: usize,
    other_in_flight: usize,
    window: LogicalWindow,
    next_id: u64,
}

impl QueueState {
    fn can_send(&self, kind: RequestKind, max_in_flight: Option<usize>) -> bool {
        match kind {
            RequestKind::Structural => self.structural_in_flight == 0 && self.other_in_flight == 0,
            RequestKind::Write | RequestKind::Read => {
                self.structural_in_flight == 0
                    && max_in_flight.map_or(true, |cap| self.other_in_flight < cap)
            }
        }
    }

    fn release(&mut self, kind: RequestKind) {
        match kind {
            RequestKind::Structural => self.structural_in_flight -= 1,
            RequestKind::Write | RequestKind::Read => self.other_in_flight -= 1,
        }
    }

    fn apply(&mut self, change: &StructuralChange) {
        trace!("apply {} to window and {} queued requests", change, self.pending.len());
        transform::apply_to_window(change, &mut self.window);
        for pending in self.pending.iter_mut() {
            transform::apply_to_request(change, &mut pending.request);
        }
    }
}

/// Serializes requests against one grid executor and keeps queued requests
/// and the client window consistent across structural changes.
pub struct RequestQueue {
    state: Mutex<QueueState>,
    executor: Arc<dyn GridExecutor>,
    observers: Mutex<Vec<Arc<dyn StructuralChangeObserver>>>,
    max_in_flight: Option<usize>,
}

impl RequestQueue {
    /// `max_in_flight` caps concurrent reads/writes. `None` means unlimited.
    pub fn new(
        executor: Arc<dyn GridExecutor>,
        window: LogicalWindow,
        max_in_flight: Option<usize>,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                structural_in_flight: 0,
                other_in_flight: 0,
                window,
                next_id: 1,
            }),
            executor,
            observers: Mutex::new(Vec::new()),
            max_in_flight,
        })
    }

    /// Queue a request and wait for the executor's response.
    ///
    /// The request is validated, queued and possibly dispatched before this
    /// returns; the future only waits for the outcome. Submission order is
    /// therefore call order, whether or not the future is polled.
    pub fn enqueue(
        self: &Arc<Self>,
        request: Request,
    ) -> impl Future<Output = Result<Response, PipelineError>> + Send + 'static {
        let submitted = match request.validate() {
            Ok(()) => Ok(self.submit(request.kind(), request, None)),
            Err(err) => Err(PipelineError::from(err)),
        };
        wait(submitted)
    }

    /// Queue a structural request that grows the window to `extension`.
    ///
    /// The insertion is worked out from the window as it stands when the
    /// request reaches the head of the queue, so earlier structural changes
    /// are already accounted for. Resolves without contacting the executor
    /// when no target exceeds the window by then.
    pub(crate) fn enqueue_extension(
        self: &Arc<Self>,
        extension: Extension,
    ) -> impl Future<Output = Result<Response, PipelineError>> + Send + 'static {
        let submitted = Ok(self.submit(RequestKind::Structural, Request::default(), Some(extension)));
        wait(submitted)
    }

    /// Current logical window.
    pub fn window(&self) -> LogicalWindow {
        self.state.lock().window
    }

    pub fn subscribe(&self, observer: Arc<dyn StructuralChangeObserver>) {
        self.observers.lock().push(observer);
    }

    /// Snapshot of queued (not yet dispatched) requests, in order. Window
    /// extensions show up empty until they are dispatched.
    pub fn pending_requests(&self) -> Vec<Request> {
        self.state.lock().pending.iter().map(|p| p.request.clone()).collect()
    }

    /// `(structural, read/write)` requests currently in flight.
    pub fn in_flight(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.structural_in_flight, state.other_in_flight)
    }

    fn submit(
        self: &Arc<Self>,
        kind: RequestKind,
        request: Request,
        extension: Option<Extension>,
    ) -> Receiver<Result<Response, PipelineError>> {
        let (reply, receiver) = smol::channel::bounded(1);
        {
            let mut state = self.state.lock();
            let id = state.next_id;
            state.next_id += 1;
            debug!("enqueue #{} ({}), {} already queued", id, kind, state.pending.len());
            state.pending.push_back(PendingRequest { id, kind, request, extension, reply });
        }
        self.dispatch();
        receiver
    }

    /// Send every head of the queue the policy currently allows.
    fn dispatch(self: &Arc<Self>) {
        let (ready, settled) = {
            let mut state = self.state.lock();
            let mut ready = Vec::new();
            let mut settled = Vec::new();
            while let Some(kind) = state.pending.front().map(|p| p.kind) {
                if !state.can_send(kind, self.max_in_flight) {
                    break;
                }
                let Some(mut pending) = state.pending.pop_front() else {
                    break;
                };
                if let Some(extension) = pending.extension {
                    pending.request = extension.request(&state.window);
                    if !pending.request.is_structural() {
                        debug!("extension #{} already within the window", pending.id);
                        settled.push(pending.reply);
                        continue;
                    }
                }
                match kind {
                    RequestKind::Structural => state.structural_in_flight += 1,
                    RequestKind::Write | RequestKind::Read => state.other_in_flight += 1,
                }
                ready.push(pending);
            }
            (ready, settled)
        };

        for reply in settled {
            let _ = reply.try_send(Ok(Response::default()));
        }

        for pending in ready {
            let queue = Arc::clone(self);
            smol::spawn(async move { queue.run(pending).await }).detach();
        }
    }

    async fn run(self: Arc<Self>, pending: PendingRequest) {
        let PendingRequest { id, kind, request, extension, reply } = pending;
        let planned = PlannedChanges::from_request(&request);

        debug!("dispatch #{} ({})", id, kind);
        let result = self.executor.execute(request).await;

        let changes = match &result {
            Ok(response) => {
                debug!("settle #{} ({})", id, kind);
                planned.confirmed(response)
            }
            Err(err) => {
                warn!("request #{} ({}) failed: {}", id, kind, err);
                Vec::new()
            }
        };
        self.settle(kind, &changes, extension);

        let observers: Vec<_> = self.observers.lock().clone();
        for change in &changes {
            for observer in &observers {
                events::notify(observer.as_ref(), change);
            }
        }

        // The caller may have stopped waiting
        let _ = reply.try_send(result.map_err(PipelineError::from));
        self.dispatch();
    }

    fn settle(&self, kind: RequestKind, changes: &[StructuralChange], extension: Option<Extension>) {
        let mut state = self.state.lock();
        state.release(kind);
        for change in changes {
            state.apply(change);
            if let Some(extension) = &extension {
                extension.grow(&mut state.window, change);
            }
        }
    }
}

async fn wait(
    submitted: Result<Receiver<Result<Response, PipelineError>>, PipelineError>,
) -> Result<Response, PipelineError> {
    let receiver = submitted?;
    match receiver.recv().await {
        Ok(result) => result,
        Err(_) => Err(PipelineError::Disconnected),
    }
}

fn growth(current: Option<u32>, target: Option<u32>) -> Option<InsertSpec> {
    match (current, target) {
        (Some(stop), Some(target)) if target > stop => Some(InsertSpec::new(stop, target - stop)),
        _ => None,
    }
}

/// Structural effects a request will have if the executor confirms them.
///
/// Captured at dispatch, when the request's coordinates match the space the
/// queued requests are in.
#[derive(Debug, Default)]
struct PlannedChanges {
    delete_rows: Vec<StructuralChange>,
    delete_columns: Vec<StructuralChange>,
    insert_rows: Option<StructuralChange>,
    insert_columns: Option<StructuralChange>,
}

impl PlannedChanges {
    fn from_request(request: &Request) -> Self {
        let deletes = |dimension: Dimension, ranges: &[DeleteRange]| -> Vec<StructuralChange> {
            ranges
                .iter()
                .filter(|range| !range.is_empty())
                .map(|range| StructuralChange::deleted(dimension, range.start, range.len()))
                .collect()
        };
        Self {
            delete_rows: deletes(Dimension::Rows, &request.delete_rows),
            delete_columns: deletes(Dimension::Columns, &request.delete_columns),
            insert_rows: request
                .insert_rows
                .map(|spec| StructuralChange::inserted(Dimension::Rows, spec.position, spec.count())),
            insert_columns: request
                .insert_columns
                .map(|spec| StructuralChange::inserted(Dimension::Columns, spec.position, spec.count())),
        }
    }

    /// Deletions first, highest position first, then insertions.
    fn confirmed(self, response: &Response) -> Vec<StructuralChange> {
        let mut changes = Vec::new();
        if response.deleted_rows {
            changes.extend(self.delete_rows);
        }
        if response.deleted_columns {
            changes.extend(self.delete_columns);
        }
        if response.inserted_rows {
            changes.extend(self.insert_rows);
        }
        if response.inserted_columns {
            changes.extend(self.insert_columns);
        }
        changes.retain(|change| change.count > 0);
        changes
    }
}
