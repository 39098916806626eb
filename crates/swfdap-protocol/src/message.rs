//! Coded error messages sent in failed responses.

use crate::protocol::Message;

/// The command is not implemented by the adapter.
pub const UNRECOGNIZED_REQUEST: i64 = 1014;
/// A handler failed while processing a known command.
pub const REQUEST_FAILED: i64 = 1104;
/// `source` requests are not supported.
pub const SOURCE_NOT_SUPPORTED: i64 = 1020;
/// `setVariable` received a value it could not interpret.
pub const INVALID_VARIABLE_VALUE: i64 = 2001;
/// Launch or attach failed.
pub const LAUNCH_FAILED: i64 = 10001;

pub fn unrecognized_request(command: &str) -> Message {
    Message::new(UNRECOGNIZED_REQUEST, "unrecognized request: {_request}")
        .with_variable("_request", command)
}

pub fn request_failed(command: &str, exception: &str) -> Message {
    Message::new(
        REQUEST_FAILED,
        "error while processing request '{_request}'\n{_exception}",
    )
    .with_variable("_request", command)
    .with_variable("_exception", exception)
}

pub fn source_not_supported() -> Message {
    Message::new(SOURCE_NOT_SUPPORTED, "Source not supported")
}

pub fn invalid_variable_value(value: &str) -> Message {
    Message::new(INVALID_VARIABLE_VALUE, "Invalid value: {value}").with_variable("value", value)
}

/// A launch or attach failure; `text` is shown verbatim.
pub fn launch_failed(text: impl Into<String>) -> Message {
    Message::new(LAUNCH_FAILED, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_request_renders_command() {
        let msg = unrecognized_request("goto");
        assert_eq!(msg.id, 1014);
        assert_eq!(msg.render(), "unrecognized request: goto");
    }

    #[test]
    fn request_failed_renders_both_placeholders() {
        let msg = request_failed("stackTrace", "session disconnected");
        assert_eq!(
            msg.render(),
            "error while processing request 'stackTrace'\nsession disconnected"
        );
    }

    #[test]
    fn launch_failed_keeps_text() {
        let msg = launch_failed("Error launching SWF debug session.\nboom");
        assert_eq!(msg.id, LAUNCH_FAILED);
        assert_eq!(msg.render(), "Error launching SWF debug session.\nboom");
        assert_eq!(msg.show_user, Some(true));
    }

    #[test]
    fn invalid_variable_value_code() {
        let msg = invalid_variable_value("{oops");
        assert_eq!(msg.id, 2001);
        assert_eq!(msg.render(), "Invalid value: {oops");
    }
}
