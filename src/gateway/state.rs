//! Shared gateway state.

use std::sync::Arc;

use crate::flow::{AdminService, TransferOrchestrator};
use crate::ledger::LedgerStore;

pub struct AppState {
    pub orchestrator: Arc<TransferOrchestrator>,
    pub admin: Arc<AdminService>,
    pub ledger: Arc<dyn LedgerStore>,
}
