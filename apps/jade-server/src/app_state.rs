use std::sync::Arc;

use jade_core::Gatekeeper;
use jade_events::Bus;
use jade_kernel::Kernel;

use crate::rephrase::Rephraser;

/// Actor names carried into the audit trail, matching the deployment's two
/// fixed principals.
pub const OPERATOR_ACTOR: &str = "manual_operator";
pub const QUERY_ACTOR: &str = "internal_user";

#[derive(Clone)]
pub(crate) struct AppState {
    gatekeeper: Arc<Gatekeeper<Kernel>>,
    kernel: Kernel,
    bus: Bus,
    rephraser: Option<Arc<Rephraser>>,
}

impl AppState {
    pub fn new(
        gatekeeper: Arc<Gatekeeper<Kernel>>,
        kernel: Kernel,
        bus: Bus,
        rephraser: Option<Arc<Rephraser>>,
    ) -> Self {
        Self {
            gatekeeper,
            kernel,
            bus,
            rephraser,
        }
    }

    pub fn gatekeeper(&self) -> &Gatekeeper<Kernel> {
        &self.gatekeeper
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn bus(&self) -> Bus {
        self.bus.clone()
    }

    pub fn rephraser(&self) -> Option<Arc<Rephraser>> {
        self.rephraser.clone()
    }
}
