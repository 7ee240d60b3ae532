/// Identifies a snapshot request in a deterministic, stable way.
///
/// Ids are handed out in increasing order; only the most recent one is
/// current, so a result for an older id is stale by construction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

/// Tracks which request is current.
#[derive(Debug, Clone, Default)]
pub struct RequestTracker {
    next: u64,
    in_flight: Option<RequestId>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request, superseding any request still in flight.
    pub fn begin(&mut self) -> (RequestId, Option<RequestId>) {
        let id = RequestId(self.next);
        self.next += 1;
        let superseded = self.in_flight.replace(id);
        (id, superseded)
    }

    pub fn in_flight(&self) -> Option<RequestId> {
        self.in_flight
    }

    pub fn is_current(&self, id: RequestId) -> bool {
        self.in_flight == Some(id)
    }

    /// Mark `id` finished. Returns `false` for a superseded or unknown id.
    pub fn finish(&mut self, id: RequestId) -> bool {
        if self.is_current(id) {
            self.in_flight = None;
            true
        } else {
            false
        }
    }

    /// Forget the in-flight request so its result will be ignored.
    pub fn cancel(&mut self) -> Option<RequestId> {
        self.in_flight.take()
    }
}
