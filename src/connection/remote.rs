use std::collections::VecDeque;

use crate::connection::{Connection, ConnectionSettings};
use crate::errors::Result;

enum PendingOp {
    WriteFile { path: String, bytes: Vec<u8> },
    RemoveFile { path: String },
    CreateFolder { path: String },
    RemoveFolder { path: String },
}

/// A remote object-store connection. Mutating calls are queued and only
/// actually dispatched on [`Connection::process_updates`], matching
/// spec.md §5: "synchronous-with-internal-waits", never suspending the
/// caller. The actual network transport is out of scope (spec.md §1); what
/// is specified is the queuing/draining contract this type implements.
pub struct RemoteConnection {
    host: String,
    working_dir: String,
    known_sessions: Vec<i64>,
    queue: VecDeque<PendingOp>,
    dispatched: Vec<String>,
}

impl RemoteConnection {
    #[must_use]
    pub fn new() -> Self {
        Self {
            host: String::new(),
            working_dir: String::new(),
            known_sessions: Vec::new(),
            queue: VecDeque::new(),
            dispatched: Vec::new(),
        }
    }

    fn resolve(&self, path: &str, is_relative: bool) -> String {
        if is_relative {
            format!("{}/{}", self.working_dir.trim_end_matches('/'), path)
        } else {
            path.to_string()
        }
    }

    /// Paths that have actually been "uploaded" (dispatched via
    /// `process_updates`). Exposed for tests driving the queue drain.
    #[must_use]
    pub fn dispatched_paths(&self) -> &[String] {
        &self.dispatched
    }
}

impl Default for RemoteConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection for RemoteConnection {
    fn initialize(&mut self, settings: &ConnectionSettings) -> Result<bool> {
        self.host = settings.host.clone().unwrap_or_default();
        self.working_dir = settings.working_dir.clone();
        Ok(true)
    }

    fn shutdown(&mut self) {
        self.queue.clear();
    }

    fn max_session_nr(&self) -> Result<i64> {
        Ok(self.known_sessions.iter().copied().max().unwrap_or(-1))
    }

    fn create_folder(&mut self, path: &str, is_relative: bool, _may_exist: bool) -> Result<bool> {
        let full = self.resolve(path, is_relative);
        if let Some(suffix) = full.rsplit('/').next().and_then(|s| s.strip_prefix("Session_")) {
            if let Ok(n) = suffix.parse::<i64>() {
                self.known_sessions.push(n);
            }
        }
        self.queue.push_back(PendingOp::CreateFolder { path: full });
        Ok(true)
    }

    fn remove_folder(&mut self, path: &str, is_relative: bool) -> Result<bool> {
        let full = self.resolve(path, is_relative);
        self.queue.push_back(PendingOp::RemoveFolder { path: full });
        Ok(true)
    }

    fn write_file(&mut self, bytes: &[u8], path: &str, is_relative: bool, _binary: bool) -> Result<bool> {
        let full = self.resolve(path, is_relative);
        self.queue.push_back(PendingOp::WriteFile {
            path: full,
            bytes: bytes.to_vec(),
        });
        Ok(true)
    }

    fn remove_file(&mut self, path: &str, is_relative: bool) -> Result<bool> {
        let full = self.resolve(path, is_relative);
        self.queue.push_back(PendingOp::RemoveFile { path: full });
        Ok(true)
    }

    fn process_updates(&mut self) -> Result<bool> {
        while let Some(op) = self.queue.pop_front() {
            match op {
                PendingOp::WriteFile { path, .. } | PendingOp::CreateFolder { path } => self.dispatched.push(path),
                PendingOp::RemoveFile { path } | PendingOp::RemoveFolder { path } => {
                    self.dispatched.retain(|p| p != &path);
                }
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_queued_until_process_updates_drains_them() {
        let mut conn = RemoteConnection::new();
        conn.initialize(&ConnectionSettings {
            host: Some("store.example".into()),
            working_dir: "bucket".into(),
        })
        .unwrap();
        conn.write_file(b"x", "a.usd", true, true).unwrap();
        assert!(conn.dispatched_paths().is_empty());
        conn.process_updates().unwrap();
        assert_eq!(conn.dispatched_paths(), ["bucket/a.usd"]);
    }
}
