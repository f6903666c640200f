//! In-memory reference implementations of the collaborator seams.
//!
//! Used by the test suites across the workspace and by the dev wiring of the
//! server binary. Each double records the calls it receives and supports
//! simple failure injection so both the required and best-effort failure
//! policies can be exercised.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lockdown_models::FindingIdentifier;

use crate::cloud::{CommandStatus, ComputeControl, IdentityControl, RemoteExecutor};
use crate::notify::{FindingsFeed, Notifier};
use crate::params::ParamStore;

// ── MemoryParamStore ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryParamStore {
    entries: Mutex<HashMap<String, String>>,
    fail: AtomicBool,
}

impl MemoryParamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a key, e.g. the quarantine group id or a pre-existing lock.
    pub fn seed(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    /// Make every subsequent call fail, simulating an unreachable store.
    pub fn fail_all(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    fn check(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("parameter store unreachable");
        }
        Ok(())
    }
}

#[async_trait]
impl ParamStore for MemoryParamStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check()?;
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.check()?;
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        self.check()?;
        let mut entries = self.entries.lock().unwrap();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.check()?;
        Ok(self.entries.lock().unwrap().remove(key).is_some())
    }
}

// ── MemoryCompute ────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryCompute {
    names: Mutex<HashMap<String, String>>,
    roles: Mutex<HashMap<String, String>>,
    pub group_assignments: Mutex<Vec<(String, Vec<String>)>>,
    pub stopped: Mutex<Vec<String>>,
    pub detached: Mutex<Vec<String>>,
    fail_isolation: AtomicBool,
    fail_stop: AtomicBool,
    fail_detach: AtomicBool,
}

impl MemoryCompute {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(self, instance_id: &str, name: &str) -> Self {
        self.names
            .lock()
            .unwrap()
            .insert(instance_id.to_string(), name.to_string());
        self
    }

    pub fn with_role(self, instance_id: &str, role: &str) -> Self {
        self.roles
            .lock()
            .unwrap()
            .insert(instance_id.to_string(), role.to_string());
        self
    }

    pub fn fail_isolation(&self, fail: bool) {
        self.fail_isolation.store(fail, Ordering::SeqCst);
    }

    pub fn fail_stop(&self, fail: bool) {
        self.fail_stop.store(fail, Ordering::SeqCst);
    }

    pub fn fail_detach(&self, fail: bool) {
        self.fail_detach.store(fail, Ordering::SeqCst);
    }

    pub fn stopped_instances(&self) -> Vec<String> {
        self.stopped.lock().unwrap().clone()
    }
}

#[async_trait]
impl ComputeControl for MemoryCompute {
    async fn set_security_groups(
        &self,
        instance_id: &str,
        _region: &str,
        group_ids: &[String],
    ) -> Result<()> {
        if self.fail_isolation.load(Ordering::SeqCst) {
            bail!("group reassignment rejected for {instance_id}");
        }
        self.group_assignments
            .lock()
            .unwrap()
            .push((instance_id.to_string(), group_ids.to_vec()));
        Ok(())
    }

    async fn stop_instance(&self, instance_id: &str, _region: &str) -> Result<()> {
        if self.fail_stop.load(Ordering::SeqCst) {
            bail!("stop rejected for {instance_id}");
        }
        self.stopped.lock().unwrap().push(instance_id.to_string());
        Ok(())
    }

    async fn instance_name(&self, instance_id: &str, _region: &str) -> Result<Option<String>> {
        Ok(self.names.lock().unwrap().get(instance_id).cloned())
    }

    async fn instance_role(&self, instance_id: &str, _region: &str) -> Result<Option<String>> {
        Ok(self.roles.lock().unwrap().get(instance_id).cloned())
    }

    async fn detach_instance_profile(&self, instance_id: &str, _region: &str) -> Result<()> {
        if self.fail_detach.load(Ordering::SeqCst) {
            bail!("profile detachment rejected for {instance_id}");
        }
        self.detached.lock().unwrap().push(instance_id.to_string());
        Ok(())
    }
}

// ── MemoryExecutor ───────────────────────────────────────────────────

/// Remote-command agent double. Commands stay `InProgress` for
/// `polls_until_terminal` status queries, then report the configured
/// terminal status.
pub struct MemoryExecutor {
    terminal: Mutex<CommandStatus>,
    polls_until_terminal: AtomicUsize,
    pub dispatched: Mutex<Vec<(String, String)>>,
    sessions: Mutex<Vec<String>>,
    pub terminated: Mutex<Vec<String>>,
    fail_dispatch: AtomicBool,
    fail_terminate: AtomicBool,
    next_command: AtomicUsize,
}

impl Default for MemoryExecutor {
    fn default() -> Self {
        Self {
            terminal: Mutex::new(CommandStatus::Succeeded),
            polls_until_terminal: AtomicUsize::new(0),
            dispatched: Mutex::new(Vec::new()),
            sessions: Mutex::new(Vec::new()),
            terminated: Mutex::new(Vec::new()),
            fail_dispatch: AtomicBool::new(false),
            fail_terminate: AtomicBool::new(false),
            next_command: AtomicUsize::new(1),
        }
    }
}

impl MemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_terminal_status(&self, status: CommandStatus) {
        *self.terminal.lock().unwrap() = status;
    }

    pub fn set_polls_until_terminal(&self, polls: usize) {
        self.polls_until_terminal.store(polls, Ordering::SeqCst);
    }

    pub fn fail_dispatch(&self, fail: bool) {
        self.fail_dispatch.store(fail, Ordering::SeqCst);
    }

    pub fn fail_terminate(&self, fail: bool) {
        self.fail_terminate.store(fail, Ordering::SeqCst);
    }

    pub fn with_sessions(self, sessions: &[&str]) -> Self {
        *self.sessions.lock().unwrap() = sessions.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn dispatched_scripts(&self) -> Vec<String> {
        self.dispatched
            .lock()
            .unwrap()
            .iter()
            .map(|(_, script)| script.clone())
            .collect()
    }
}

#[async_trait]
impl RemoteExecutor for MemoryExecutor {
    async fn send_command(&self, instance_id: &str, _region: &str, script: &str) -> Result<String> {
        if self.fail_dispatch.load(Ordering::SeqCst) {
            bail!("remote agent unreachable for {instance_id}");
        }
        self.dispatched
            .lock()
            .unwrap()
            .push((instance_id.to_string(), script.to_string()));
        let id = self.next_command.fetch_add(1, Ordering::SeqCst);
        Ok(format!("cmd-{id}"))
    }

    async fn command_status(&self, _command_id: &str, _instance_id: &str) -> Result<CommandStatus> {
        let remaining = self.polls_until_terminal.load(Ordering::SeqCst);
        if remaining > 0 {
            self.polls_until_terminal.store(remaining - 1, Ordering::SeqCst);
            return Ok(CommandStatus::InProgress);
        }
        Ok(self.terminal.lock().unwrap().clone())
    }

    async fn list_sessions(&self, _instance_id: &str) -> Result<Vec<String>> {
        Ok(self.sessions.lock().unwrap().clone())
    }

    async fn terminate_session(&self, session_id: &str) -> Result<()> {
        if self.fail_terminate.load(Ordering::SeqCst) {
            bail!("termination rejected for {session_id}");
        }
        self.terminated.lock().unwrap().push(session_id.to_string());
        Ok(())
    }
}

// ── MemoryIdentity ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryIdentity {
    pub denied: Mutex<Vec<(String, DateTime<Utc>)>>,
    fail: AtomicBool,
}

impl MemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_all(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn denied_roles(&self) -> Vec<String> {
        self.denied
            .lock()
            .unwrap()
            .iter()
            .map(|(role, _)| role.clone())
            .collect()
    }
}

#[async_trait]
impl IdentityControl for MemoryIdentity {
    async fn attach_deny_policy(&self, role: &str, cutoff: DateTime<Utc>) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("policy attachment rejected for {role}");
        }
        self.denied.lock().unwrap().push((role.to_string(), cutoff));
        Ok(())
    }
}

// ── MemoryNotifier / MemoryFindingsFeed ──────────────────────────────

#[derive(Default)]
pub struct MemoryNotifier {
    published: Mutex<Vec<(String, String)>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn publish(&self, subject: &str, message: &str) -> Result<()> {
        self.published
            .lock()
            .unwrap()
            .push((subject.to_string(), message.to_string()));
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FeedUpdate {
    pub identifiers: Vec<FindingIdentifier>,
    pub comment: String,
    pub status_id: u8,
}

#[derive(Default)]
pub struct MemoryFindingsFeed {
    updates: Mutex<Vec<FeedUpdate>>,
    fail: AtomicBool,
}

impl MemoryFindingsFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_all(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn updates(&self) -> Vec<FeedUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl FindingsFeed for MemoryFindingsFeed {
    async fn update_findings(
        &self,
        identifiers: &[FindingIdentifier],
        comment: &str,
        status_id: u8,
    ) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("findings feed unreachable");
        }
        self.updates.lock().unwrap().push(FeedUpdate {
            identifiers: identifiers.to_vec(),
            comment: comment.to_string(),
            status_id,
        });
        Ok(())
    }
}
