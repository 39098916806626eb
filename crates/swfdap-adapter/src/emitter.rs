//! Outbound event channel.

use tokio::sync::mpsc;
use tracing::debug;

use swfdap_core::ContextId;
use swfdap_protocol::{
    Breakpoint, BreakpointEventBody, Event, ExitedEventBody, OutputEventBody, Source,
    StopReason, StoppedEventBody, TerminatedEventBody, ThreadEventBody,
};

/// Sends protocol events towards the transport. Cloned freely; a closed
/// receiver only drops events.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventEmitter {
    pub fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { tx }
    }

    /// An emitter together with the receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn send(&self, event: Event) {
        let name = event.event.clone();
        if self.tx.send(event).is_err() {
            debug!(event = %name, "event dropped: transport closed");
        }
    }

    pub fn initialized(&self) {
        self.send(Event::bare("initialized"));
    }

    /// Console output.
    pub fn output(&self, text: impl Into<String>) {
        self.send_output(None, text.into(), None);
    }

    /// Output on the stderr category.
    pub fn error_output(&self, text: impl Into<String>) {
        self.send_output(Some("stderr"), text.into(), None);
    }

    /// Output attributed to a source line.
    pub fn output_at(&self, category: Option<&str>, text: impl Into<String>, at: Option<(Source, u32)>) {
        self.send_output(category, text.into(), at);
    }

    fn send_output(&self, category: Option<&str>, output: String, at: Option<(Source, u32)>) {
        let (source, line, column) = match at {
            Some((source, line)) => (Some(source), Some(i64::from(line)), Some(0)),
            None => (None, None, None),
        };
        self.send(Event::new(
            "output",
            Some(OutputEventBody {
                category: category.map(str::to_string),
                output,
                source,
                line,
                column,
            }),
        ));
    }

    pub fn stopped(&self, context: ContextId, reason: StopReason, description: Option<String>, text: Option<String>) {
        self.send(Event::new(
            "stopped",
            Some(StoppedEventBody {
                reason,
                description,
                thread_id: Some(i64::from(context)),
                all_threads_stopped: None,
                text,
            }),
        ));
    }

    pub fn thread(&self, reason: &str, context: ContextId) {
        self.send(Event::new(
            "thread",
            Some(ThreadEventBody {
                reason: reason.to_string(),
                thread_id: i64::from(context),
            }),
        ));
    }

    pub fn breakpoint_changed(&self, breakpoint: Breakpoint) {
        self.send(Event::new(
            "breakpoint",
            Some(BreakpointEventBody {
                reason: "changed".to_string(),
                breakpoint,
            }),
        ));
    }

    pub fn exited(&self, exit_code: i32) {
        self.send(Event::new(
            "exited",
            Some(ExitedEventBody {
                exit_code: i64::from(exit_code),
            }),
        ));
    }

    pub fn terminated(&self) {
        self.send(Event::new("terminated", Some(TerminatedEventBody::default())));
    }
}
