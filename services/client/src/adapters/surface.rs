//! services/client/src/adapters/surface.rs
//!
//! The terminal implementation of the `NotificationSurface` port. Alerts ring
//! the terminal bell and print a single highlighted line.

use std::io::Write;

use notification_core::ports::{NotificationSurface, PortError, PortResult};
use tracing::debug;

/// Prints host alerts to stdout when permitted.
pub struct ConsoleSurface {
    enabled: bool,
}

impl ConsoleSurface {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl NotificationSurface for ConsoleSurface {
    fn is_permitted(&self) -> bool {
        self.enabled
    }

    fn notify(&self, title: &str, content: &str) -> PortResult<()> {
        debug!("Showing alert '{}'", title);
        let mut out = std::io::stdout().lock();
        writeln!(out, "\x07\n🔔 {}: {}", title, content)
            .and_then(|_| out.flush())
            .map_err(|e| PortError::Transport(format!("alert could not be shown: {}", e)))
    }
}
