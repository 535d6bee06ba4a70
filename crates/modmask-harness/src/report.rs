//! Run results

use std::fmt;

use anyhow::Result;
use modmask_config::ScenarioKind;
use modmask_core::ModifierKey;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SkipReason {
    /// The native encoding has no bit for the held modifier
    UnsupportedByLayout { layout: String },
    /// The operator excluded the modifier, usually because the desktop
    /// environment intercepts it
    Excluded,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnsupportedByLayout { layout } => {
                write!(f, "environment limitation: {} cannot report this modifier", layout)
            }
            SkipReason::Excluded => f.write_str("excluded by operator"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ScenarioOutcome {
    Passed,
    /// The first step whose mismatch log was not empty
    Failed { step: String, failures: Vec<String> },
    Skipped { reason: SkipReason },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioReport {
    pub scenario: ScenarioKind,
    pub modifier: Option<ModifierKey>,
    #[serde(flatten)]
    pub outcome: ScenarioOutcome,
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let modifier = self.modifier.map_or("no modifier", ModifierKey::name);
        write!(f, "{} ({}): ", self.scenario, modifier)?;

        match &self.outcome {
            ScenarioOutcome::Passed => f.write_str("PASSED"),
            ScenarioOutcome::Skipped { reason } => write!(f, "SKIPPED, {}", reason),
            ScenarioOutcome::Failed { step, failures } => {
                write!(f, "FAILED while {}", step)?;
                for failure in failures {
                    write!(f, "\n    {}", failure)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub layout: String,
    pub scenarios: Vec<ScenarioReport>,
}

impl RunReport {
    pub fn new(layout: &str) -> Self {
        Self {
            layout: layout.to_string(),
            scenarios: Vec::new(),
        }
    }

    pub fn push(&mut self, report: ScenarioReport) {
        self.scenarios.push(report);
    }

    fn count(&self, predicate: impl Fn(&ScenarioOutcome) -> bool) -> usize {
        self.scenarios.iter().filter(|r| predicate(&r.outcome)).count()
    }

    pub fn passed(&self) -> usize {
        self.count(|o| matches!(o, ScenarioOutcome::Passed))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ScenarioOutcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ScenarioOutcome::Skipped { .. }))
    }

    /// Scenarios that actually drove the robot.
    pub fn executed(&self) -> usize {
        self.passed() + self.failed()
    }

    /// At least one scenario ran and none failed. Skips do not fail a run,
    /// but a run made only of skips tested nothing.
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.executed() > 0
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for scenario in &self.scenarios {
            writeln!(f, "{}", scenario)?;
        }
        write!(
            f,
            "{} passed, {} failed, {} skipped (layout {})",
            self.passed(),
            self.failed(),
            self.skipped(),
            self.layout
        )
    }
}
