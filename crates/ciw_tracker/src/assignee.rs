use ciw_core::config::AssigneeConfig;
use ciw_core::error::AppError;

/// Looks up who a service's issues are assigned to.
pub trait AssigneeResolver {
    fn resolve_assignee(&self, service: &str) -> Result<Option<String>, AppError>;
}

/// Resolves from the watch config: per-service entry, then the default, then nobody.
#[derive(Debug, Clone)]
pub struct ConfigAssigneeResolver {
    config: AssigneeConfig,
}

impl ConfigAssigneeResolver {
    pub fn new(config: AssigneeConfig) -> Self {
        Self { config }
    }
}

impl AssigneeResolver for ConfigAssigneeResolver {
    fn resolve_assignee(&self, service: &str) -> Result<Option<String>, AppError> {
        let picked = self
            .config
            .by_service
            .get(service)
            .or(self.config.default_assignee.as_ref())
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());
        Ok(picked)
    }
}
