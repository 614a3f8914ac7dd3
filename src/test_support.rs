//! Config and component fixtures shared by binary tests

use crate::server::config::{AppConfig, TokenEntry};
use crate::server::{build_components, AppComponents};
use std::path::Path;
use tempfile::TempDir;
use termgate_core::AuthStore;

pub const ALICE_TOKEN: &str = "termgate_alice_test_token";
pub const BOB_TOKEN: &str = "termgate_bob_test_token";

/// Dev root with two projects and a separate logs dir
pub struct Fixture {
    pub dev_root: TempDir,
    pub logs: TempDir,
    pub config: AppConfig,
}

impl Fixture {
    pub fn new() -> Self {
        let dev_root = tempfile::tempdir().unwrap();
        std::fs::create_dir(dev_root.path().join("alpha")).unwrap();
        std::fs::create_dir_all(dev_root.path().join("beta/.git")).unwrap();
        std::fs::create_dir(dev_root.path().join(".hidden")).unwrap();
        let logs = tempfile::tempdir().unwrap();

        let mut config = AppConfig::default();
        config.projects.dev_root = path_string(dev_root.path());
        config.logs.dir = path_string(logs.path());
        config.auth.tokens = vec![token_entry("alice", ALICE_TOKEN), token_entry("bob", BOB_TOKEN)];
        config.terminal.enabled = true;
        config.terminal.shell = "/bin/sh".to_string();

        Self {
            dev_root,
            logs,
            config,
        }
    }

    pub fn components(&self) -> AppComponents {
        build_components(&self.config).unwrap()
    }
}

fn token_entry(user: &str, raw: &str) -> TokenEntry {
    TokenEntry {
        user: user.to_string(),
        token_sha256: AuthStore::token_digest(raw),
        label: "test".to_string(),
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
