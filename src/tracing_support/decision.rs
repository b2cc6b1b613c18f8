//! The per-call trace decision.

/// Decides whether a call should be traced.
///
/// A call is traced only when its command is enabled, and then only if it
/// either continues an existing trace or root spans are allowed. Without an
/// explicit opt-in, calls issued outside any trace never create root spans.
///
/// ```rust
/// use cachetrace::tracing_support::should_trace;
///
/// assert!(should_trace(true, true, false));
/// assert!(!should_trace(false, true, false));
/// assert!(should_trace(false, true, true));
/// assert!(!should_trace(true, false, true));
/// ```
#[inline]
pub fn should_trace(has_parent: bool, command_enabled: bool, allow_root: bool) -> bool {
    command_enabled && (allow_root || has_parent)
}
