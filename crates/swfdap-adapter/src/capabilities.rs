//! Capabilities announced in the `initialize` response.

use swfdap_protocol::Capabilities;

pub fn adapter_capabilities() -> Capabilities {
    Capabilities {
        supports_configuration_done_request: Some(true),
        supports_conditional_breakpoints: Some(true),
        supports_hit_conditional_breakpoints: Some(false),
        supports_evaluate_for_hovers: Some(true),
        supports_step_back: Some(false),
        supports_set_variable: Some(true),
        supports_terminate_request: Some(false),
        supports_log_points: Some(true),
        supports_exception_info_request: Some(true),
    }
}
