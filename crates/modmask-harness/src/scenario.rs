//! Button sequences
//!
//! Each body runs after [`Harness::before_each`] with the scenario's modifier
//! key already down; `held` is that key's normalized bit (or empty). The
//! expected mask for a release still includes the button being released.
//!
//! The drag in click-and-drag is checked against the log of the press before
//! it: drag events must match, but a stack that delivers none still passes.

use anyhow::Result;
use modmask_config::ScenarioKind;
use modmask_core::Modifiers;

use crate::fixture::Harness;
use crate::robot::InputRobot;

fn button(n: u8) -> Result<Modifiers> {
    Ok(Modifiers::button(n)?)
}

impl<R: InputRobot> Harness<R> {
    pub(crate) async fn scenario_body(&mut self, kind: ScenarioKind, held: Modifiers) -> Result<()> {
        match kind {
            ScenarioKind::SingleButtonPressRelease => self.single_button_press_release(held).await,
            ScenarioKind::HoldOnePressAnother => self.hold_one_press_another(held).await,
            ScenarioKind::PressAllInSequence => self.press_all_in_sequence(held).await,
            ScenarioKind::ClickAndDrag => self.click_and_drag(held).await,
        }
    }

    async fn single_button_press_release(&mut self, held: Modifiers) -> Result<()> {
        for n in self.budget().buttons() {
            let expected = held | button(n)?;
            self.step(expected, &format!("pressing button {}", n), |robot| {
                robot.mouse_press(n)
            })
            .await?;
            self.step(expected, &format!("releasing button {}", n), |robot| {
                robot.mouse_release(n)
            })
            .await?;
        }
        Ok(())
    }

    async fn hold_one_press_another(&mut self, held: Modifiers) -> Result<()> {
        let buttons = self.budget().buttons();

        for n in buttons.clone() {
            let first = held | button(n)?;
            self.step(first, &format!("pressing button {}", n), |robot| {
                robot.mouse_press(n)
            })
            .await?;

            for m in buttons.clone().filter(|&m| m != n) {
                let both = first | button(m)?;
                self.step(both, &format!("pressing additional button {}", m), |robot| {
                    robot.mouse_press(m)
                })
                .await?;
                self.step(both, &format!("releasing additional button {}", m), |robot| {
                    robot.mouse_release(m)
                })
                .await?;
            }

            self.step(first, &format!("releasing button {}", n), |robot| {
                robot.mouse_release(n)
            })
            .await?;
        }
        Ok(())
    }

    async fn press_all_in_sequence(&mut self, held: Modifiers) -> Result<()> {
        let buttons = self.budget().buttons();
        let mut expected = held;

        for n in buttons.clone() {
            expected |= button(n)?;
            self.step(expected, &format!("pressing button {}", n), |robot| {
                robot.mouse_press(n)
            })
            .await?;
        }

        for n in buttons.rev() {
            self.step(expected, &format!("releasing button {}", n), |robot| {
                robot.mouse_release(n)
            })
            .await?;
            expected -= button(n)?;
        }
        Ok(())
    }

    async fn click_and_drag(&mut self, held: Modifiers) -> Result<()> {
        for n in self.budget().buttons() {
            let expected = held | button(n)?;
            let (x, y) = self.robot.position();

            self.step(expected, &format!("pressing button {}", n), |robot| {
                robot.mouse_press(n)
            })
            .await?;
            self.continue_step(&format!("dragging with button {}", n), |robot| {
                robot.mouse_move(x + 1, y + 1)
            })
            .await?;
            self.step(expected, &format!("releasing button {}", n), |robot| {
                robot.mouse_release(n)
            })
            .await?;

            self.unchecked(|robot| robot.mouse_move(x, y)).await?;
        }
        Ok(())
    }
}
