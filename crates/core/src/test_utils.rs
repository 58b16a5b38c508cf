//! Shared test utilities for steward crates.
//!
//! Scripted stand-ins for the process adapter and the package tool. Both
//! answer from per-command queues: each call pops the next response, and the
//! last response repeats once the queue is down to one entry.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::acquisition::AcquisitionStrategy;
use crate::config::InstallScope;
use crate::exec::{CommandRunner, Invocation};
use crate::outcome::NO_APPLICATIONS_FOUND;
use crate::package::{InstallOptions, PackageTool};
use crate::probe::ToolHandle;
use crate::{Error, Result};

#[derive(Debug, Default)]
struct Script {
    responses: HashMap<String, VecDeque<Invocation>>,
    calls: Vec<String>,
}

impl Script {
    fn push(&mut self, key: String, invocation: Invocation) {
        self.responses.entry(key).or_default().push_back(invocation);
    }

    fn next(&mut self, key: &str) -> Option<Invocation> {
        self.calls.push(key.to_string());
        let queue = self.responses.get_mut(key)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

/// [`CommandRunner`] answering from a script keyed by the full command line.
///
/// Keys are `"<program> <arg> <arg>..."`. Unscripted commands fail as if the
/// program could not be spawned.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    script: Mutex<Script>,
}

impl ScriptedRunner {
    /// An empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for a command line.
    pub fn respond(&self, command_line: &str, invocation: Invocation) {
        lock(&self.script).push(command_line.to_string(), invocation);
    }

    /// Every command line run so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        lock(&self.script).calls.clone()
    }

    /// Number of calls whose command line starts with `prefix`.
    #[must_use]
    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &Path, args: &[String]) -> Result<Invocation> {
        let key = std::iter::once(program.display().to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        lock(&self.script)
            .next(&key)
            .ok_or_else(|| Error::process(program.display().to_string(), "not scripted"))
    }
}

/// [`PackageTool`] answering from a script keyed by operation.
///
/// Keys: `list`, `install`, `install@<version>`, `uninstall`, `upgrade`,
/// `source reset`, `source update`. A pinned install falls back to the
/// `install` queue when no version-specific script exists. Unscripted
/// operations fail with a process error.
#[derive(Debug, Default)]
pub struct ScriptedTool {
    script: Mutex<Script>,
}

impl ScriptedTool {
    /// An empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for an operation.
    pub fn respond(&self, operation: &str, invocation: Invocation) {
        lock(&self.script).push(operation.to_string(), invocation);
    }

    /// Queue a successful listing showing `id` at `version`.
    pub fn lists_version(&self, id: &str, version: &str) {
        self.respond("list", Invocation::new(0, listing(id, version), ""));
    }

    /// Queue a "no results" listing.
    pub fn lists_absent(&self) {
        self.respond(
            "list",
            Invocation::new(
                NO_APPLICATIONS_FOUND,
                "No installed package found matching input criteria.",
                "",
            ),
        );
    }

    /// Queue a response with only an exit code.
    pub fn exits(&self, operation: &str, code: i32) {
        self.respond(operation, Invocation::new(code, "", ""));
    }

    /// Every operation called so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        lock(&self.script).calls.clone()
    }

    /// Calls other than `list`, i.e. remediation actions.
    #[must_use]
    pub fn actions(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c != "list")
            .collect()
    }

    fn answer(&self, key: &str) -> Result<Invocation> {
        lock(&self.script)
            .next(key)
            .ok_or_else(|| Error::process("scripted-tool", format!("{key} not scripted")))
    }
}

#[async_trait]
impl PackageTool for ScriptedTool {
    async fn list(&self, _id: &str) -> Result<Invocation> {
        self.answer("list")
    }

    async fn upgrade(&self, _id: &str, _silent: bool) -> Result<Invocation> {
        self.answer("upgrade")
    }

    async fn install(
        &self,
        _id: &str,
        version: Option<&str>,
        _options: &InstallOptions,
    ) -> Result<Invocation> {
        let Some(version) = version else {
            return self.answer("install");
        };
        let key = format!("install@{version}");
        let scripted = lock(&self.script).responses.contains_key(&key);
        if scripted {
            self.answer(&key)
        } else {
            let mut script = lock(&self.script);
            script.calls.push(key);
            let queue = script.responses.get_mut("install");
            match queue {
                Some(q) if q.len() > 1 => q.pop_front(),
                Some(q) => q.front().cloned(),
                None => None,
            }
            .ok_or_else(|| Error::process("scripted-tool", "install not scripted"))
        }
    }

    async fn uninstall(&self, _id: &str, _silent: bool) -> Result<Invocation> {
        self.answer("uninstall")
    }

    async fn source_reset(&self) -> Result<Invocation> {
        self.answer("source reset")
    }

    async fn source_update(&self) -> Result<Invocation> {
        self.answer("source update")
    }
}

/// Shared record of which strategies were attempted, in order.
#[derive(Debug, Clone, Default)]
pub struct StrategyLog(Arc<Mutex<Vec<&'static str>>>);

impl StrategyLog {
    /// Names of attempted strategies.
    #[must_use]
    pub fn attempts(&self) -> Vec<&'static str> {
        lock(&self.0).clone()
    }

    fn record(&self, name: &'static str) {
        lock(&self.0).push(name);
    }
}

/// [`AcquisitionStrategy`] with a fixed verdict and an optional side effect.
#[derive(Debug)]
pub struct ScriptedStrategy {
    name: &'static str,
    reports: bool,
    log: StrategyLog,
    repairs: Option<(Arc<ScriptedRunner>, String, String)>,
}

impl ScriptedStrategy {
    /// A strategy named `name` that reports `reports` and changes nothing.
    #[must_use]
    pub fn new(name: &'static str, reports: bool, log: &StrategyLog) -> Self {
        Self {
            name,
            reports,
            log: log.clone(),
            repairs: None,
        }
    }

    /// On attempt, script `command_line` on `runner` to succeed printing
    /// `output`, as if the strategy had installed the tool.
    #[must_use]
    pub fn repairs(
        mut self,
        runner: &Arc<ScriptedRunner>,
        command_line: &str,
        output: &str,
    ) -> Self {
        self.repairs = Some((
            Arc::clone(runner),
            command_line.to_string(),
            output.to_string(),
        ));
        self
    }
}

#[async_trait]
impl AcquisitionStrategy for ScriptedStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn attempt(&self) -> bool {
        self.log.record(self.name);
        if let Some((runner, command_line, output)) = &self.repairs {
            runner.respond(command_line, Invocation::new(0, output.as_str(), ""));
        }
        self.reports
    }
}

/// A listing table with one row for `id` at `version`.
#[must_use]
pub fn listing(id: &str, version: &str) -> String {
    format!(
        "Name          Id                  Version    Source\n\
         ---------------------------------------------------\n\
         Some App      {id:<19} {version:<10} winget\n"
    )
}

/// A tool handle without probing, for tests.
#[must_use]
pub fn handle(path: &str, version: &str) -> ToolHandle {
    ToolHandle::new(path, version)
}

/// Default install options for tests.
#[must_use]
pub fn install_options() -> InstallOptions {
    InstallOptions {
        scope: Some(InstallScope::Machine),
        silent: true,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
