//! Process-wide tracing span.

use tracing::Span;
use tracing::span::Entered;

use crate::init::build_sha;

/// Keeps the `hanamirip` span entered so every record carries the run mode and build.
pub struct GlobalContextGuard {
    mode: String,
    _entered: Entered<'static>,
}

impl GlobalContextGuard {
    /// Enter the process span for `mode` (for example `fetch`).
    #[must_use]
    pub fn new(mode: impl Into<String>) -> Self {
        let mode = mode.into();
        // Leaked once per process so the guard can borrow it for 'static.
        let span: &'static Span = Box::leak(Box::new(tracing::info_span!(
            "hanamirip",
            mode = %mode,
            build = %build_sha()
        )));
        Self {
            mode,
            _entered: span.enter(),
        }
    }

    /// Run mode recorded on the span.
    #[must_use]
    pub fn mode(&self) -> &str {
        &self.mode
    }
}
