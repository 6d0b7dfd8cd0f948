//! Command policy boundary.
//!
//! The command stream asks a [`CommandPolicy`] for one [`JointCommand`] per
//! divider fire. The inference engine itself lives outside this crate and
//! plugs in through [`InferenceModel`]; [`ObservationPolicy`] does the work
//! around it:
//!
//! ```text
//! RobotState ──to_observation(last_action)──▶ model.infer ──▶ first 6 × action_scale
//!      ▲                                                            │
//!      └────────────── last_action ◀── clamp(JointLimits) ◀─────────┘
//! ```
//!
//! Clamping is a courtesy for well-behaved policies, not a safety interlock.

use crate::core::state::RobotState;
use crate::core::types::{JointCommand, NUM_JOINTS};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Source of joint commands, called once per fire on the command thread
pub trait CommandPolicy: Send {
    fn next_command(&mut self) -> Result<JointCommand>;
}

impl<F> CommandPolicy for F
where
    F: FnMut() -> Result<JointCommand> + Send,
{
    fn next_command(&mut self) -> Result<JointCommand> {
        self()
    }
}

/// Observation → raw action mapping (e.g. an ONNX session)
pub trait InferenceModel: Send {
    fn infer(&mut self, observation: &[f32]) -> Result<Vec<f32>>;
}

impl<F> InferenceModel for F
where
    F: FnMut(&[f32]) -> Result<Vec<f32>> + Send,
{
    fn infer(&mut self, observation: &[f32]) -> Result<Vec<f32>> {
        self(observation)
    }
}

/// Model that ignores the observation and always returns the same action
#[derive(Debug, Clone)]
pub struct ConstantModel {
    action: Vec<f32>,
}

impl ConstantModel {
    pub fn new(action: Vec<f32>) -> Self {
        Self { action }
    }
}

impl InferenceModel for ConstantModel {
    fn infer(&mut self, _observation: &[f32]) -> Result<Vec<f32>> {
        Ok(self.action.clone())
    }
}

/// Per-joint angle bounds
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct JointLimits {
    pub min: [f32; NUM_JOINTS],
    pub max: [f32; NUM_JOINTS],
}

impl JointLimits {
    /// Create limits, rejecting any joint with `min > max` or NaN bounds
    pub fn new(min: [f32; NUM_JOINTS], max: [f32; NUM_JOINTS]) -> Result<Self> {
        for i in 0..NUM_JOINTS {
            // Written so NaN also fails
            if !(min[i] <= max[i]) {
                return Err(Error::InvalidParameter(format!(
                    "joint {} limits inverted: min {} > max {}",
                    i, min[i], max[i]
                )));
            }
        }
        Ok(Self { min, max })
    }

    /// Clamp each angle into its joint's range; extra angles are left alone
    pub fn clamp(&self, cmd: &mut JointCommand) {
        for (i, angle) in cmd.joint_angles.iter_mut().take(NUM_JOINTS).enumerate() {
            *angle = angle.clamp(self.min[i], self.max[i]);
        }
    }
}

/// Policy that runs a model on the latest robot observation
pub struct ObservationPolicy<M> {
    state: Arc<RobotState>,
    model: M,
    action_scale: f32,
    limits: Option<JointLimits>,
    last_action: [f32; NUM_JOINTS],
}

impl<M: InferenceModel> ObservationPolicy<M> {
    pub fn new(state: Arc<RobotState>, model: M) -> Self {
        Self {
            state,
            model,
            action_scale: 1.0,
            limits: None,
            last_action: [0.0; NUM_JOINTS],
        }
    }

    /// Multiply raw model outputs by `scale`
    pub fn with_action_scale(mut self, scale: f32) -> Self {
        self.action_scale = scale;
        self
    }

    /// Clamp commands into `limits`
    pub fn with_limits(mut self, limits: JointLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Action sent on the previous step (zeros before the first)
    pub fn last_action(&self) -> [f32; NUM_JOINTS] {
        self.last_action
    }
}

impl<M: InferenceModel> CommandPolicy for ObservationPolicy<M> {
    fn next_command(&mut self) -> Result<JointCommand> {
        if !self.state.has_data() {
            return Err(Error::NoState);
        }

        let obs = self.state.to_observation(Some(&self.last_action));
        let output = self.model.infer(&obs)?;
        if output.len() < NUM_JOINTS {
            return Err(Error::Policy(format!(
                "model produced {} outputs, need at least {}",
                output.len(),
                NUM_JOINTS
            )));
        }

        let mut cmd = JointCommand::new(
            output[..NUM_JOINTS]
                .iter()
                .map(|v| v * self.action_scale)
                .collect(),
        );
        if let Some(limits) = &self.limits {
            limits.clamp(&mut cmd);
        }

        self.last_action.copy_from_slice(&cmd.joint_angles);
        log::trace!("Target joint angles: {:?}", cmd.joint_angles);
        Ok(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ImuSample, OBSERVATION_BASE_LEN, TelemetryPacket};
    use approx::assert_relative_eq;
    use std::time::Instant;

    fn state_with_data() -> Arc<RobotState> {
        let state = Arc::new(RobotState::new());
        state.update(
            &TelemetryPacket::new([0.25; NUM_JOINTS], ImuSample::default()),
            Instant::now(),
        );
        state
    }

    #[test]
    fn test_closure_policy() {
        let mut calls = 0;
        let mut policy = move || -> Result<JointCommand> {
            calls += 1;
            Ok(JointCommand::from([calls as f32; NUM_JOINTS]))
        };
        assert_eq!(policy.next_command().unwrap().joint_angles[0], 1.0);
        assert_eq!(policy.next_command().unwrap().joint_angles[0], 2.0);
    }

    #[test]
    fn test_no_state_yet() {
        let mut policy = ObservationPolicy::new(
            Arc::new(RobotState::new()),
            ConstantModel::new(vec![0.0; NUM_JOINTS]),
        );
        assert!(matches!(policy.next_command(), Err(Error::NoState)));
    }

    #[test]
    fn test_scale_and_trim() {
        let model = |obs: &[f32]| -> Result<Vec<f32>> {
            Ok(vec![obs.len() as f32, 1.0, 2.0, 3.0, 4.0, 5.0, 99.0])
        };
        let mut policy = ObservationPolicy::new(state_with_data(), model).with_action_scale(0.5);

        // Observation is 21 state values + 6 last-action values
        let cmd = policy.next_command().unwrap();
        assert_eq!(cmd.joint_angles.len(), NUM_JOINTS);
        assert_relative_eq!(cmd.joint_angles[0], 13.5);
        assert_relative_eq!(cmd.joint_angles[5], 2.5);
        assert_eq!(policy.last_action(), [13.5, 0.5, 1.0, 1.5, 2.0, 2.5]);
    }

    #[test]
    fn test_last_action_fed_back() {
        let model = |obs: &[f32]| -> Result<Vec<f32>> {
            Ok(obs[OBSERVATION_BASE_LEN..].iter().map(|v| v + 1.0).collect())
        };
        let mut policy = ObservationPolicy::new(state_with_data(), model);

        assert_eq!(policy.next_command().unwrap().joint_angles, vec![1.0; NUM_JOINTS]);
        assert_eq!(policy.next_command().unwrap().joint_angles, vec![2.0; NUM_JOINTS]);
        assert_eq!(policy.last_action(), [2.0; NUM_JOINTS]);
    }

    #[test]
    fn test_short_model_output() {
        let mut policy =
            ObservationPolicy::new(state_with_data(), ConstantModel::new(vec![1.0; 3]));
        assert!(matches!(policy.next_command(), Err(Error::Policy(_))));
        assert_eq!(policy.last_action(), [0.0; NUM_JOINTS]);
    }

    #[test]
    fn test_model_error_propagates() {
        let model = |_: &[f32]| -> Result<Vec<f32>> { Err(Error::Policy("session lost".into())) };
        let mut policy = ObservationPolicy::new(state_with_data(), model);
        assert!(matches!(policy.next_command(), Err(Error::Policy(_))));
    }

    #[test]
    fn test_limits_clamp() {
        let limits = JointLimits::new([-1.0; NUM_JOINTS], [1.0; NUM_JOINTS]).unwrap();
        let mut policy = ObservationPolicy::new(
            state_with_data(),
            ConstantModel::new(vec![-5.0, -0.5, 0.0, 0.5, 5.0, f32::INFINITY]),
        )
        .with_limits(limits);

        let cmd = policy.next_command().unwrap();
        assert_eq!(cmd.joint_angles, vec![-1.0, -0.5, 0.0, 0.5, 1.0, 1.0]);
        assert_eq!(policy.last_action(), [-1.0, -0.5, 0.0, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn test_inverted_limits_rejected() {
        let mut max = [1.0; NUM_JOINTS];
        max[3] = -2.0;
        assert!(JointLimits::new([-1.0; NUM_JOINTS], max).is_err());

        let mut min = [-1.0; NUM_JOINTS];
        min[0] = f32::NAN;
        assert!(JointLimits::new(min, [1.0; NUM_JOINTS]).is_err());
    }
}
