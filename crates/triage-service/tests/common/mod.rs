//! Shared harness for service tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use triage_core::{DispatchConfig, TriageConfig};
use triage_errorsource::ErrorSource;
use triage_service::{TriageService, WorkerPool};
use triage_test_utils::{test_config, ScriptedRunner, ScriptedTool, StaticErrorSource};

pub struct Harness {
    pub tmp: TempDir,
    pub config: TriageConfig,
    pub tool: Arc<ScriptedTool>,
    pub runner: Arc<ScriptedRunner>,
    pub service: TriageService,
}

pub struct HarnessBuilder {
    tool: ScriptedTool,
    runner: ScriptedRunner,
    source: Arc<dyn ErrorSource>,
    dispatch: DispatchConfig,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            tool: ScriptedTool::new(),
            runner: ScriptedRunner::new(),
            source: Arc::new(StaticErrorSource::new()),
            dispatch: DispatchConfig::default(),
        }
    }

    pub fn tool(mut self, tool: ScriptedTool) -> Self {
        self.tool = tool;
        self
    }

    pub fn runner(mut self, runner: ScriptedRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn source(mut self, source: Arc<dyn ErrorSource>) -> Self {
        self.source = source;
        self
    }

    pub fn dispatch(mut self, max_concurrent: usize, max_pending: usize) -> Self {
        self.dispatch = DispatchConfig {
            max_concurrent,
            max_pending,
        };
        self
    }

    /// Existing working copy in a temp dir, shared checkout, no worktrees
    pub fn build(self) -> Harness {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = test_config().with_dispatch(self.dispatch);
        config.repository.codebase_dir = tmp.path().join("codebase");
        config.repository.worktree_dir = tmp.path().join("runs");
        config.repository.isolate_runs = false;
        std::fs::create_dir_all(config.repository.codebase_dir.join(".git")).unwrap();

        let tool = Arc::new(self.tool);
        let runner = Arc::new(self.runner);
        let service = TriageService::assemble(&config, runner.clone(), tool.clone(), self.source);
        Harness {
            tmp,
            config,
            tool,
            runner,
            service,
        }
    }
}

/// Wait until `n` pipelines have finished or five seconds pass
pub async fn wait_for_completed(pool: &WorkerPool, n: usize) {
    for _ in 0..500 {
        if pool.stats().completed >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("pipelines did not finish: {:?}", pool.stats());
}
