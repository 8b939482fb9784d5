//! [`SignalRoute`] – forwards process interrupts to the running loop.
//!
//! `ctrlc` accepts one handler per process, but loops come and go. The
//! global route installs that handler once and forwards each interrupt to
//! whichever [`StopHandle`] is currently registered. Registration returns a
//! [`SignalGuard`]; dropping it releases the route, so a finished loop never
//! receives a later interrupt.

use std::sync::OnceLock;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::control_loop::StopHandle;

#[derive(Default)]
struct RouteTable {
    next_id: u64,
    current: Option<(u64, StopHandle)>,
}

/// Interrupt router. Use [`SignalRoute::global`] in programs; standalone
/// instances exist for tests.
#[derive(Default)]
pub struct SignalRoute {
    table: Mutex<RouteTable>,
}

static GLOBAL: OnceLock<SignalRoute> = OnceLock::new();
static HANDLER: OnceLock<bool> = OnceLock::new();

impl SignalRoute {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide route, installing the `ctrlc` handler on first use.
    ///
    /// If another handler was installed first the route still works for
    /// [`trigger`][Self::trigger] but Ctrl-C will not reach it.
    pub fn global() -> &'static SignalRoute {
        let route = GLOBAL.get_or_init(SignalRoute::new);
        HANDLER.get_or_init(|| match ctrlc::set_handler(|| {
            if let Some(route) = GLOBAL.get() {
                route.trigger();
            }
        }) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "failed to install Ctrl-C handler; interrupts will not stop the loop");
                false
            }
        });
        route
    }

    /// Route interrupts to `handle` until the returned guard is dropped.
    ///
    /// A newer registration replaces an older one.
    pub fn register(&self, handle: StopHandle) -> SignalGuard<'_> {
        let mut table = self.table.lock();
        table.next_id += 1;
        let id = table.next_id;
        if table.current.replace((id, handle)).is_some() {
            warn!("signal route taken over by a new loop");
        }
        debug!(id, "signal route registered");
        SignalGuard { route: self, id }
    }

    /// Deliver an interrupt. Returns `false` when no loop holds the route.
    pub fn trigger(&self) -> bool {
        match &self.table.lock().current {
            Some((_, handle)) => {
                info!("interrupt received, stopping control loop");
                handle.stop();
                true
            }
            None => false,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.table.lock().current.is_some()
    }

    fn release(&self, id: u64) {
        let mut table = self.table.lock();
        if matches!(table.current, Some((current, _)) if current == id) {
            table.current = None;
            debug!(id, "signal route released");
        }
    }
}

/// Keeps a loop registered on a [`SignalRoute`].
#[must_use = "the route is released when the guard is dropped"]
pub struct SignalGuard<'a> {
    route: &'a SignalRoute,
    id: u64,
}

impl Drop for SignalGuard<'_> {
    fn drop(&mut self) {
        self.route.release(self.id);
    }
}
