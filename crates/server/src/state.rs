use std::sync::Arc;

use loggerwatch_monitor::MonitorService;
use loggerwatch_rules::AlarmRegistry;

/// Shared handler state. The monitor reads the same registry the API
/// mutates.
pub struct AppState {
    pub registry: Arc<AlarmRegistry>,
    pub monitor: Arc<MonitorService>,
}
