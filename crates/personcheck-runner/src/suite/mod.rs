//! Scenario suite: the persons API checks, fed by configured fixtures
//!
//! Scenarios are independent. With `jobs > 1` they run on scoped threads
//! sharing the context; reports always come back in scenario order.

mod scenarios;

use std::collections::BTreeSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};

use personcheck_core::plan::{self, ScenarioPlan};
use personcheck_core::{
    CheckFailure, Config, DryRunPlan, ScenarioReport, SchemaDocument, SuiteReport, TestCases,
};
use serde_json::Value;

use crate::checker::CheckOptions;
use crate::context::HarnessContext;
use crate::probe::{QueryParameterProbe, probe_cases};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SuiteError {
    #[error("Unknown scenario: {name} (known: {known})")]
    UnknownScenario { name: String, known: String },
}

/// One named group of checks.
pub struct Scenario {
    pub name: &'static str,
    /// Schemas validated against (besides the error object)
    pub schemas: &'static [&'static str],
    /// `query_params` endpoint keys probed
    pub probes: &'static [&'static str],
    /// `Err(reason)` when fixtures are missing
    ready: fn(&TestCases) -> Result<(), String>,
    run: fn(&mut Recorder<'_>),
}

impl Scenario {
    /// Why the scenario would be skipped under `test_cases`, if it would.
    #[must_use]
    pub fn skip_reason(&self, test_cases: &TestCases) -> Option<String> {
        (self.ready)(test_cases).err()
    }

    fn execute(&self, ctx: &HarnessContext) -> ScenarioReport {
        if let Some(reason) = self.skip_reason(ctx.test_cases()) {
            tracing::warn!(scenario = self.name, %reason, "scenario skipped");
            return ScenarioReport::skipped(self.name, reason);
        }

        tracing::info!(scenario = self.name, "scenario started");
        let mut recorder = Recorder::new(ctx);
        let outcome = catch_unwind(AssertUnwindSafe(|| (self.run)(&mut recorder)));
        let Recorder {
            checks, failures, ..
        } = recorder;

        match outcome {
            Ok(()) => {
                tracing::info!(
                    scenario = self.name,
                    checks,
                    failures = failures.len(),
                    "scenario finished"
                );
                ScenarioReport::completed(self.name, checks, failures)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(scenario = self.name, %message, "scenario panicked");
                ScenarioReport::aborted(
                    self.name,
                    checks,
                    failures,
                    format!("scenario panicked: {message}"),
                )
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Counts checks and collects failures while a scenario runs.
struct Recorder<'a> {
    ctx: &'a HarnessContext,
    checks: usize,
    failures: Vec<CheckFailure>,
}

impl<'a> Recorder<'a> {
    fn new(ctx: &'a HarnessContext) -> Self {
        Self {
            ctx,
            checks: 0,
            failures: Vec::new(),
        }
    }

    /// Run one endpoint check; returns the decoded body when it was JSON.
    fn check(
        &mut self,
        path: &str,
        schema_name: &str,
        expected_status: u16,
        options: &CheckOptions,
    ) -> Option<Value> {
        let inspection = self
            .ctx
            .checker()
            .inspect(path, schema_name, expected_status, options);
        self.checks += 1;
        self.failures.extend(inspection.failures);
        inspection.body
    }

    /// Probe the parameters configured under `query_params.<endpoint>`.
    fn probe(&mut self, endpoint: &str, path: &str, schema_name: &str, osu_id: &str) {
        let specs = self.ctx.param_specs(endpoint);
        self.checks += probe_cases(&specs).len();
        self.failures.extend(
            QueryParameterProbe::new(self.ctx).probe(path, schema_name, None, &specs, osu_id),
        );
    }
}

/// The built-in persons API scenarios.
pub struct Suite {
    scenarios: Vec<Scenario>,
}

impl Default for Suite {
    fn default() -> Self {
        Self::persons()
    }
}

impl Suite {
    #[must_use]
    pub fn persons() -> Self {
        Self {
            scenarios: scenarios::all(),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.scenarios.iter().map(|s| s.name)
    }

    /// Scenarios named in `only`, in suite order; all when `only` is empty.
    ///
    /// # Errors
    ///
    /// Returns [`SuiteError::UnknownScenario`] for a name not in the suite.
    pub fn select(&self, only: &[String]) -> Result<Vec<&Scenario>, SuiteError> {
        if let Some(name) = only.iter().find(|n| !self.names().any(|known| known == n.as_str())) {
            return Err(SuiteError::UnknownScenario {
                name: name.clone(),
                known: self.names().collect::<Vec<_>>().join(", "),
            });
        }
        Ok(self
            .scenarios
            .iter()
            .filter(|s| only.is_empty() || only.iter().any(|n| n == s.name))
            .collect())
    }

    /// Every schema the selected scenarios validate against, sorted and
    /// deduplicated, so the catalog can be built before any request.
    ///
    /// # Errors
    ///
    /// Returns [`SuiteError::UnknownScenario`] for a name not in the suite.
    pub fn required_schemas(&self, only: &[String]) -> Result<Vec<&'static str>, SuiteError> {
        let names: BTreeSet<&'static str> = self
            .select(only)?
            .into_iter()
            .flat_map(|s| s.schemas.iter().copied())
            .collect();
        Ok(names.into_iter().collect())
    }

    /// What a run would do, without sending any request.
    ///
    /// # Errors
    ///
    /// Returns [`SuiteError::UnknownScenario`] for a name not in the suite.
    pub fn plan(
        &self,
        config: &Config,
        doc: &SchemaDocument,
        only: &[String],
    ) -> Result<DryRunPlan, SuiteError> {
        let scenarios = self
            .select(only)?
            .into_iter()
            .map(|s| ScenarioPlan {
                name: s.name.to_string(),
                schemas: s.schemas.iter().map(ToString::to_string).collect(),
                query_params: s
                    .probes
                    .iter()
                    .flat_map(|endpoint| {
                        config
                            .param_specs(endpoint)
                            .into_iter()
                            .map(move |spec| format!("{endpoint}.{}", spec.name))
                    })
                    .collect(),
                skip_reason: s.skip_reason(&config.test_cases),
            })
            .collect();

        let mut validations = plan::validate_config(config);
        validations.extend(plan::validate_schemas(doc, self.required_schemas(only)?));

        Ok(DryRunPlan {
            base_url: config.base_url(),
            scenarios,
            validations,
        })
    }

    /// Run the selected scenarios on up to `jobs` threads.
    ///
    /// # Errors
    ///
    /// Returns [`SuiteError::UnknownScenario`] for a name not in the suite.
    pub fn run(
        &self,
        ctx: &HarnessContext,
        jobs: usize,
        only: &[String],
    ) -> Result<SuiteReport, SuiteError> {
        let selected = self.select(only)?;
        let reports = if jobs <= 1 || selected.len() <= 1 {
            selected.iter().map(|s| s.execute(ctx)).collect()
        } else {
            run_parallel(&selected, ctx, jobs)
        };
        Ok(SuiteReport::new(ctx.base_url(), reports))
    }
}

fn run_parallel(selected: &[&Scenario], ctx: &HarnessContext, jobs: usize) -> Vec<ScenarioReport> {
    let next = AtomicUsize::new(0);
    let mut slots: Vec<Option<ScenarioReport>> = vec![None; selected.len()];

    std::thread::scope(|scope| {
        let next = &next;
        let workers: Vec<_> = (0..jobs.min(selected.len()))
            .map(|_| {
                scope.spawn(move || {
                    let mut done = Vec::new();
                    loop {
                        let i = next.fetch_add(1, Ordering::Relaxed);
                        let Some(scenario) = selected.get(i) else {
                            break;
                        };
                        done.push((i, scenario.execute(ctx)));
                    }
                    done
                })
            })
            .collect();
        for worker in workers {
            if let Ok(done) = worker.join() {
                for (i, report) in done {
                    slots[i] = Some(report);
                }
            }
        }
    });

    slots
        .into_iter()
        .zip(selected)
        .map(|(slot, scenario)| {
            slot.unwrap_or_else(|| {
                ScenarioReport::aborted(scenario.name, 0, Vec::new(), "worker thread died")
            })
        })
        .collect()
}
