//! Requests tools send to a server, and the answers routed back to them.
//!
//! The engine does not do any I/O. Tools queue a [`ServerRequest`]; the host
//! sends it, and hands the answer to
//! [`Editor::server_response`](crate::editor::Editor::server_response), which
//! passes it to the active tool. Tools ignore answers to requests they no
//! longer wait for, which is how cancelling works.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct ServerRequest {
    pub id: RequestId,
    /// What is asked for, e.g. `"auto_annotate"`
    pub kind: String,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerResponse {
    pub id: RequestId,
    pub payload: Value,
}

/// Outgoing requests waiting for the host to pick them up.
#[derive(Debug, Default)]
pub struct ServerRequests {
    pending: Vec<ServerRequest>,
    next_id: u64,
}

impl ServerRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, kind: &str, payload: Value) -> RequestId {
        self.next_id += 1;
        let id = RequestId(self.next_id);
        log::debug!("Queued '{}' request {}", kind, id.0);
        self.pending.push(ServerRequest {
            id,
            kind: kind.to_string(),
            payload,
        });
        id
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take every queued request, oldest first.
    pub fn take(&mut self) -> Vec<ServerRequest> {
        std::mem::take(&mut self.pending)
    }
}
