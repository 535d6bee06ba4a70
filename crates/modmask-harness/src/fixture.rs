//! The test fixture
//!
//! [`Harness`] owns the robot, the receiving end of the event queue and the
//! verifier. Every robot action is followed by [`Harness::settle`], which
//! waits out the robot delay and then feeds whatever arrived to the
//! verifier. Expectations and observations therefore happen on one task in
//! a fixed order, and the verifier needs no locking.

use std::time::Duration;

use anyhow::Result;
use modmask_config::{HarnessConfig, ScenarioKind, ScenarioSelection, SurfaceConfig};
use modmask_core::{ButtonBudget, ModifierKey, Modifiers, MismatchVerifier, NormalizedEvent};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::report::{RunReport, ScenarioOutcome, ScenarioReport, SkipReason};
use crate::robot::{InputRobot, RobotKey};

/// A step finished with a non-empty mismatch log.
#[derive(Debug, Clone, Error)]
#[error("mismatch while {step}: {}", .failures.join("; "))]
pub struct StepFailure {
    pub step: String,
    pub failures: Vec<String>,
}

pub struct Harness<R: InputRobot> {
    pub(crate) robot: R,
    events: UnboundedReceiver<NormalizedEvent>,
    pub(crate) verifier: MismatchVerifier,
    config: HarnessConfig,
    surface: SurfaceConfig,
    /// Current robot delay; switches between the short and long delay
    delay: Duration,
    excluded: Vec<ModifierKey>,
}

impl<R: InputRobot> Harness<R> {
    pub fn new(
        robot: R,
        events: UnboundedReceiver<NormalizedEvent>,
        config: &HarnessConfig,
        surface: SurfaceConfig,
    ) -> Self {
        let reported = robot.button_count().min(config.button_count);
        let budget = ButtonBudget::for_layout(robot.layout(), reported);
        tracing::debug!(
            "Testing {} buttons on layout {}",
            budget.count(),
            robot.layout()
        );

        Self {
            robot,
            events,
            verifier: MismatchVerifier::new(budget),
            config: config.clone(),
            surface,
            delay: config.short_delay,
            excluded: Vec::new(),
        }
    }

    /// Skip scenarios that hold any of `modifiers`.
    pub fn with_excluded_modifiers(mut self, modifiers: Vec<ModifierKey>) -> Self {
        self.excluded = modifiers;
        self
    }

    pub fn budget(&self) -> ButtonBudget {
        self.verifier.buttons()
    }

    pub fn robot(&self) -> &R {
        &self.robot
    }

    /// Wait out the robot delay, then check everything delivered so far.
    pub(crate) async fn settle(&mut self) {
        tokio::time::sleep(self.delay).await;
        while let Ok(event) = self.events.try_recv() {
            self.verifier.observe(&event);
        }
    }

    /// Run `action` against an expectation and check the result.
    pub(crate) async fn step<F>(&mut self, expected: Modifiers, step: &str, action: F) -> Result<()>
    where
        F: FnOnce(&mut R) -> Result<()>,
    {
        self.verifier.set_expectation(expected);
        action(&mut self.robot)?;
        self.settle().await;
        self.check_failures(step)?;
        Ok(())
    }

    /// Run `action` under the expectation and log left by the previous step.
    ///
    /// Nothing is re-seeded, so the step passes without new deliveries as
    /// long as what was delivered so far matched.
    pub(crate) async fn continue_step<F>(&mut self, step: &str, action: F) -> Result<()>
    where
        F: FnOnce(&mut R) -> Result<()>,
    {
        action(&mut self.robot)?;
        self.settle().await;
        self.check_failures(step)?;
        Ok(())
    }

    /// Fail `step` if the mismatch log is not empty.
    pub fn check_failures(&self, step: &str) -> Result<(), StepFailure> {
        if self.verifier.is_clean() {
            tracing::debug!("{}: PASSED", step);
            return Ok(());
        }

        let failures = self.verifier.failure_messages();
        tracing::debug!("{}: FAILED", step);
        for failure in &failures {
            tracing::debug!("    {}", failure);
        }
        Err(StepFailure {
            step: step.to_string(),
            failures,
        })
    }

    /// Run an action with checking disabled, restoring the previous gate.
    pub(crate) async fn unchecked<F>(&mut self, action: F) -> Result<()>
    where
        F: FnOnce(&mut R) -> Result<()>,
    {
        let previous = self.verifier.check_enabled();
        self.verifier.set_check_enabled(false);
        let result = action(&mut self.robot);
        self.settle().await;
        self.verifier.set_check_enabled(previous);
        result
    }

    pub async fn key_press(&mut self, key: ModifierKey) -> Result<()> {
        self.unchecked(|robot| robot.key_press(RobotKey::Modifier(key))).await
    }

    pub async fn key_release(&mut self, key: ModifierKey) -> Result<()> {
        self.unchecked(|robot| robot.key_release(RobotKey::Modifier(key))).await
    }

    /// Release every modifier key and every budgeted button.
    pub async fn release_modifiers(&mut self) -> Result<()> {
        for key in ModifierKey::ALL {
            self.key_release(key).await?;
        }
        for button in self.budget().buttons() {
            self.unchecked(|robot| robot.mouse_release(button)).await?;
        }
        Ok(())
    }

    /// Tap Escape to dismiss anything the focus click opened.
    pub async fn escape(&mut self) -> Result<()> {
        self.unchecked(|robot| robot.key_press(RobotKey::Escape)).await?;
        self.unchecked(|robot| robot.key_release(RobotKey::Escape)).await
    }

    pub async fn setup(&mut self) -> Result<()> {
        tracing::info!("Resetting input state");
        self.verifier.set_check_enabled(false);
        self.release_modifiers().await?;
        self.escape().await
    }

    /// Put the pointer on the surface with nothing held.
    pub async fn before_each(&mut self) -> Result<()> {
        self.verifier.set_check_enabled(false);
        self.delay = self.config.short_delay;

        self.release_modifiers().await?;
        self.escape().await?;

        let (x, y) = self.surface.center();
        self.unchecked(|robot| robot.mouse_move(x, y)).await?;
        self.unchecked(|robot| robot.mouse_press(1)).await?;
        self.unchecked(|robot| robot.mouse_release(1)).await?;

        self.verifier.set_check_enabled(true);
        self.delay = self.config.long_delay;
        Ok(())
    }

    pub async fn after_each(&mut self) {
        self.verifier.set_check_enabled(false);
        tokio::time::sleep(self.config.settle).await;
        self.settle().await;
    }

    pub async fn teardown(&mut self) -> Result<()> {
        self.delay = self.config.short_delay;
        self.setup().await
    }

    fn skip_reason(&self, modifier: Option<ModifierKey>) -> Option<SkipReason> {
        let key = modifier?;
        if !self.robot.layout().supports(key) {
            return Some(SkipReason::UnsupportedByLayout {
                layout: self.robot.layout().to_string(),
            });
        }
        if self.excluded.contains(&key) {
            return Some(SkipReason::Excluded);
        }
        None
    }

    /// Run one scenario with an optional held modifier.
    ///
    /// Mismatches become a [`ScenarioOutcome::Failed`]; robot errors are
    /// returned after the held keys have been released.
    pub async fn run_scenario(
        &mut self,
        kind: ScenarioKind,
        modifier: Option<ModifierKey>,
    ) -> Result<ScenarioReport> {
        let report = |outcome| ScenarioReport {
            scenario: kind,
            modifier,
            outcome,
        };

        if let Some(reason) = self.skip_reason(modifier) {
            let name = modifier.map_or("no modifier", ModifierKey::name);
            match &reason {
                SkipReason::UnsupportedByLayout { .. } => {
                    tracing::warn!("{} ({}): skipped, {}", kind, name, reason)
                }
                SkipReason::Excluded => tracing::info!("{} ({}): skipped, {}", kind, name, reason),
            }
            return Ok(report(ScenarioOutcome::Skipped { reason }));
        }

        tracing::info!(
            "Running {} ({})",
            kind,
            modifier.map_or("no modifier", ModifierKey::name)
        );

        self.before_each().await?;

        let mut result = match modifier {
            Some(key) => self.key_press(key).await,
            None => Ok(()),
        };
        if result.is_ok() {
            let held = modifier.map_or(Modifiers::empty(), ModifierKey::flag);
            result = self.scenario_body(kind, held).await;
        }
        if let Some(key) = modifier {
            let released = self.key_release(key).await;
            if result.is_ok() {
                result = released;
            }
        }

        let outcome = match result {
            Ok(()) => ScenarioOutcome::Passed,
            Err(e) => {
                // Buttons may still be down after an aborted sequence
                self.release_modifiers().await?;
                match e.downcast::<StepFailure>() {
                    Ok(failure) => ScenarioOutcome::Failed {
                        step: failure.step,
                        failures: failure.failures,
                    },
                    Err(e) => {
                        self.after_each().await;
                        return Err(e);
                    }
                }
            }
        };

        self.after_each().await;

        match &outcome {
            ScenarioOutcome::Failed { step, .. } => {
                tracing::warn!("{}: FAILED while {}", kind, step)
            }
            _ => tracing::info!("{}: PASSED", kind),
        }

        Ok(report(outcome))
    }

    /// Run every enabled scenario with each of its modifier variants.
    ///
    /// Teardown runs even when a scenario aborts with a robot error.
    pub async fn run(&mut self, selection: &ScenarioSelection) -> Result<RunReport> {
        let mut report = RunReport::new(&self.robot.layout().to_string());

        self.setup().await?;
        if let Err(e) = self.run_selection(selection, &mut report).await {
            if let Err(cleanup) = self.teardown().await {
                tracing::warn!("Teardown after error failed: {:#}", cleanup);
            }
            return Err(e);
        }
        self.teardown().await?;

        if report.executed() == 0 {
            tracing::warn!("No scenario ran; {} skipped", report.skipped());
        }

        tracing::info!(
            "{} passed, {} failed, {} skipped",
            report.passed(),
            report.failed(),
            report.skipped()
        );
        Ok(report)
    }

    async fn run_selection(
        &mut self,
        selection: &ScenarioSelection,
        report: &mut RunReport,
    ) -> Result<()> {
        for kind in &selection.enabled {
            for modifier in selection.modifiers_for(*kind) {
                report.push(self.run_scenario(*kind, modifier).await?);
            }
        }
        Ok(())
    }
}
