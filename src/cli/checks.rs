// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Checks command - run a stage's checks around an event

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar};
use miette::Result;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use super::{into_report, load_config, load_stage_map, GlobalOpts};
use crate::checks::{Check, CheckError, CheckObserver, CheckResult, CheckRunner, EventPhase};
use crate::errors::StagehandError;
use crate::kube::{KubectlProvider, KubernetesProvider, Providers};
use crate::utils::{add_spinner, format_duration, print_header, print_info, status_mark};

/// Run the checks command
pub async fn run(opts: GlobalOpts, stage: String, phase: EventPhase, event: String) -> Result<()> {
    let config = load_config(&opts).map_err(into_report)?;
    let stages = load_stage_map(&config).map_err(into_report)?;

    let observer = Arc::new(SpinnerObserver::new());
    let runner = CheckRunner::new(Arc::new(config), stages, Providers::new(kubernetes(&opts)))
        .with_observer(observer.clone());

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling running checks");
                cancel.cancel();
            }
        })
    };

    print_header(&format!("Checks {} '{}' on stage '{}'", phase, event, stage));

    let outcome = match phase {
        EventPhase::Before => runner.run_pre_checks(&stage, &event, &cancel).await,
        EventPhase::After => runner.run_post_checks(&stage, &event, &cancel).await,
    };
    interrupt.abort();
    observer.clear();

    match outcome {
        Ok(results) if results.is_empty() => {
            print_info(&format!("No checks declared {} '{}'", phase, event));
            Ok(())
        }
        Ok(results) => {
            print_results(&results);
            println!();
            println!("{}", format!("All {} checks passed", results.len()).green().bold());
            Ok(())
        }
        Err(StagehandError::Checks(failed)) => {
            print_results(&failed.results);
            println!();
            Err(into_report(StagehandError::Checks(failed)))
        }
        Err(e) => Err(into_report(e)),
    }
}

fn kubernetes(opts: &GlobalOpts) -> Arc<dyn KubernetesProvider> {
    let provider = match opts.kubectl {
        Some(ref kubectl) => KubectlProvider::with_binary(kubectl),
        None => KubectlProvider::new().unwrap_or_else(|e| {
            // HTTP checks still work; cluster checks will report the missing binary
            tracing::warn!(error = %e, "kubectl not found on PATH");
            KubectlProvider::with_binary("kubectl")
        }),
    };

    match opts.kube_context {
        Some(ref context) => Arc::new(provider.with_context(context)),
        None => Arc::new(provider),
    }
}

fn print_results(results: &[CheckResult]) {
    for result in results {
        println!("  {}", result_line(result));
        if let Some(ref error) = result.error {
            println!("      {}", error.to_string().dimmed());
        }
    }
}

fn result_line(result: &CheckResult) -> String {
    let attempts = if result.attempts == 1 {
        "1 attempt".to_string()
    } else {
        format!("{} attempts", result.attempts)
    };
    format!(
        "{} {:<10} {} ({}, {})",
        status_mark(result.is_success()),
        result.check_type.to_string(),
        result.id.bold(),
        attempts,
        format_duration(result.duration)
    )
}

/// Shows one spinner per running check
///
/// Checks sharing a type and id (a state key declared in two groups of one
/// batch) each get their own spinner, queued under the shared label.
struct SpinnerObserver {
    group: MultiProgress,
    spinners: Mutex<HashMap<String, VecDeque<ProgressBar>>>,
}

impl SpinnerObserver {
    fn new() -> Self {
        Self::with_group(MultiProgress::new())
    }

    fn with_group(group: MultiProgress) -> Self {
        Self {
            group,
            spinners: Mutex::new(HashMap::new()),
        }
    }

    fn key(check_type: impl std::fmt::Display, id: &str) -> String {
        format!("{} {}", check_type, id)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<ProgressBar>>> {
        match self.spinners.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn start(&self, key: String) {
        let pb = add_spinner(&self.group, &key);
        self.lock().entry(key).or_default().push_back(pb);
    }

    fn update(&self, key: &str, message: String) {
        if let Some(pb) = self.lock().get(key).and_then(|queue| queue.front()) {
            pb.set_message(message);
        }
    }

    fn finish(&self, key: &str) {
        let mut spinners = self.lock();
        let Some(queue) = spinners.get_mut(key) else {
            return;
        };
        if let Some(pb) = queue.pop_front() {
            pb.finish_and_clear();
        }
        if queue.is_empty() {
            spinners.remove(key);
        }
    }

    fn clear(&self) {
        for (_, queue) in self.lock().drain() {
            for pb in queue {
                pb.finish_and_clear();
            }
        }
    }
}

impl CheckObserver for SpinnerObserver {
    fn on_start(&self, check: &dyn Check, _stage: &str, _event: &str) {
        self.start(Self::key(check.check_type(), &check.id()));
    }

    fn on_retry(&self, check: &dyn Check, attempt: u32, error: &CheckError) {
        let key = Self::key(check.check_type(), &check.id());
        let message = format!("{} (attempt {} failed: {})", key, attempt, error);
        self.update(&key, message);
    }

    fn on_complete(&self, result: &CheckResult) {
        self.finish(&Self::key(result.check_type, &result.id));
    }
}
