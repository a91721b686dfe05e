//! HTTP server wiring for Triage.
//!
//! Owns runtime configuration and assembles the API router around a
//! SQLite-backed [`DefectTracker`].

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::Router;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use triage_core::{DefectTracker, store::DefectStore};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `TRIAGE_*` environment variables.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("defects.db") }

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:       default_host(),
      port:       default_port(),
      store_path: default_store_path(),
    }
  }
}

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  /// The store path with a leading `~/` expanded against `$HOME`.
  pub fn resolved_store_path(&self) -> PathBuf {
    expand_tilde(&self.store_path, std::env::var("HOME").ok().as_deref())
  }
}

/// Expand a leading `~/` to `home`. Paths are returned unchanged when there
/// is no prefix or no home directory.
pub fn expand_tilde(path: &Path, home: Option<&str>) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Some(home) = home
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the served application: the API router with request tracing.
pub fn app<S>(tracker: Arc<DefectTracker<S>>) -> Router
where
  S: DefectStore + 'static,
{
  triage_api::api_router(tracker).layer(TraceLayer::new_for_http())
}
