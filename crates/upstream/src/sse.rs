//! Line-oriented SSE parsing state machine and event routing.

use tracing::debug;

use crate::frame::decode_payload;
use crate::proto::{ClientActionKind, ResponseEvent, ResponseEventKind};

/// Accumulated result of draining one SSE stream.
#[derive(Debug, Clone, Default)]
pub struct DriveOutput {
    pub text: String,
    pub conversation_id: Option<String>,
    pub task_id: Option<String>,
    pub events: Vec<ResponseEvent>,
}

/// Drives the line-oriented state machine described in the Upstream
/// Driver's contract: accumulate `data:` payloads until a blank line,
/// decode, route by event kind.
#[derive(Default)]
pub struct SseAccumulator {
    current_chunk: String,
    output: DriveOutput,
}

impl SseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line (without its trailing newline). Returns `true` once
    /// the `[DONE]` sentinel has been observed — the caller should stop
    /// reading from the underlying stream.
    pub fn feed_line(&mut self, line: &str) -> bool {
        if let Some(rest) = line.strip_prefix("data:") {
            let payload = rest.trim();
            if payload.is_empty() {
                return false;
            }
            if payload == "[DONE]" {
                return true;
            }
            self.current_chunk.push_str(payload);
            return false;
        }

        if line.trim().is_empty() && !self.current_chunk.is_empty() {
            let chunk = std::mem::take(&mut self.current_chunk);
            self.process_chunk(&chunk);
        }
        false
    }

    fn process_chunk(&mut self, chunk: &str) {
        let Some(bytes) = decode_payload(chunk) else {
            debug!("skipping SSE chunk that is not hex or base64");
            return;
        };
        let event = match <ResponseEvent as prost::Message>::decode(bytes.as_slice()) {
            Ok(event) => event,
            Err(err) => {
                debug!(%err, "skipping chunk with unparseable protobuf framing");
                return;
            }
        };
        self.route(event);
    }

    fn route(&mut self, event: ResponseEvent) {
        match &event.kind {
            Some(ResponseEventKind::Init(init)) => {
                self.output.conversation_id = Some(init.conversation_id.clone());
                self.output.task_id = Some(init.task_id.clone());
            }
            Some(ResponseEventKind::ClientActions(actions)) => {
                for action in &actions.actions {
                    match &action.kind {
                        Some(ClientActionKind::AppendToMessageContent(a)) => {
                            if let Some(text) = a
                                .message
                                .as_ref()
                                .and_then(|m| m.agent_output.as_ref())
                                .map(|o| o.text.as_str())
                            {
                                self.output.text.push_str(text);
                            }
                        }
                        Some(ClientActionKind::AddMessagesToTask(a)) => {
                            if !a.task_id.is_empty() {
                                self.output.task_id = Some(a.task_id.clone());
                            }
                            for message in &a.messages {
                                if let Some(text) = message.agent_output.as_ref().map(|o| o.text.as_str()) {
                                    self.output.text.push_str(text);
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            Some(ResponseEventKind::Finished(_)) | None => {}
        }
        self.output.events.push(event);
    }

    pub fn finish(self) -> DriveOutput {
        self.output
    }
}
