//! Per-request completion hook.
//!
//! The hook is armed when a request arrives and fires exactly once, when the
//! guard is dropped: after the response body has been handed to the
//! connection, after the client aborted mid-body, or when the request future
//! was cancelled before any response existed. Ownership of the guard is the
//! one-shot: `fire` takes the armed state out and later calls are no-ops.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use http_body::{Body as HttpBody, Frame, SizeHint};
use tokio::runtime::Handle;

use crate::metric::{RequestView, ResponseOutcome, ResponseView, StartMarker};
use crate::state::ProcessMetricState;

use super::RequestInstrumentor;

/// Arrival data for one request plus its error-count guard.
#[derive(Debug)]
pub struct RequestRecord {
    started: StartMarker,
    error_counted: AtomicBool,
}

impl RequestRecord {
    pub fn new(started: StartMarker) -> Self {
        Self {
            started,
            error_counted: AtomicBool::new(false),
        }
    }

    pub fn started(&self) -> StartMarker {
        self.started
    }

    /// Count the request as an error if its status is 400 or above.
    /// Returns true only for the call that actually incremented.
    pub fn count_error_once(&self, response: &ResponseView, state: &ProcessMetricState) -> bool {
        if !response.is_error() {
            return false;
        }
        if self.error_counted.swap(true, Ordering::AcqRel) {
            return false;
        }
        state.record_error();
        true
    }
}

struct Armed {
    instrumentor: RequestInstrumentor,
    runtime: Handle,
    record: Arc<RequestRecord>,
    request: Arc<RequestView>,
    status: Option<StatusCode>,
    headers: HeaderMap,
}

pub(crate) struct CompletionGuard {
    armed: Option<Armed>,
    end_reached: bool,
}

impl CompletionGuard {
    pub(crate) fn arm(
        instrumentor: RequestInstrumentor,
        record: Arc<RequestRecord>,
        request: RequestView,
    ) -> Self {
        let armed = match Handle::try_current() {
            Ok(runtime) => Some(Armed {
                instrumentor,
                runtime,
                record,
                request: Arc::new(request),
                status: None,
                headers: HeaderMap::new(),
            }),
            Err(e) => {
                tracing::warn!(error = %e, "no tokio runtime on request path; metrics skipped");
                None
            }
        };
        Self { armed, end_reached: false }
    }

    /// Move the guard into the response body so it fires when the body is done.
    pub(crate) fn attach(mut self, response: Response) -> Response {
        let (parts, body) = response.into_parts();
        if let Some(armed) = self.armed.as_mut() {
            armed.status = Some(parts.status);
            armed.headers = parts.headers.clone();
        }
        if HttpBody::is_end_stream(&body) {
            self.end_reached = true;
        }
        Response::from_parts(parts, Body::new(CompletionBody { inner: body, guard: self }))
    }

    fn fire(&mut self) {
        let Some(armed) = self.armed.take() else { return };
        let outcome = if self.end_reached {
            ResponseOutcome::Completed
        } else {
            ResponseOutcome::Aborted
        };
        let response = ResponseView {
            status: armed.status,
            headers: armed.headers,
            outcome,
            finished: Instant::now(),
        };
        armed
            .instrumentor
            .spawn_completion(&armed.runtime, armed.record, armed.request, response);
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.fire();
    }
}

/// Response body wrapper that tracks whether the stream reached its end.
struct CompletionBody {
    inner: Body,
    guard: CompletionGuard,
}

impl HttpBody for CompletionBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(None) => this.guard.end_reached = true,
            // Sized bodies may never be polled past their last frame.
            Poll::Ready(Some(Ok(_))) if this.inner.is_end_stream() => {
                this.guard.end_reached = true
            }
            _ => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
