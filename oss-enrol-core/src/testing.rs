//! Shared fixtures for unit tests.

use crate::config::SyncConfig;
use crate::context::RunContext;
use crate::db::Database;
use crate::directory::StaticDirectory;

/// Search base used by every fixture group.
pub const CONTEXT: &str = "ou=groups,dc=schule,dc=local";

pub fn test_config() -> SyncConfig {
    let mut config = SyncConfig::default();
    config.directory.contexts = vec![CONTEXT.to_string()];
    config
}

pub fn context<'a>(config: &'a SyncConfig, db: &'a Database, dir: &'a mut StaticDirectory) -> RunContext<'a> {
    RunContext::prepare("test", config, db, dir).expect("prepare run context")
}
