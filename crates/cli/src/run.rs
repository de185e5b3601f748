use anyhow::Result;
use rvtx_config::{RunAssertion, RunManifest, StopReason};
use rvtx_core::{Bounded, Sequence, Transmitter};
use rvtx_sim::{ProtocolViolation, TxDevice, WriteRecord};
use serde::Serialize;
use tracing::{info, warn};

pub const RESULT_SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pass,
    Fail,
}

#[derive(Debug, Serialize, Clone)]
pub struct AssertionResult {
    pub assertion: RunAssertion,
    pub passed: bool,
}

#[derive(Debug, Serialize, Clone)]
pub struct RunReport {
    pub result_schema_version: String,
    pub status: Status,
    pub stop_reason: StopReason,
    pub steps_sent: u64,
    pub tx_register: u32,
    pub polls: u64,
    pub output: Vec<u8>,
    pub violations: Vec<ProtocolViolation>,
    pub assertions: Vec<AssertionResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub writes: Vec<WriteRecord>,
    pub config: RunManifest,
}

/// Drive the sequence through the transmitter into a modelled device and
/// check the manifest's assertions against what the device saw.
pub fn execute(manifest: &RunManifest, keep_writes: bool) -> Result<RunReport> {
    manifest.validate()?;
    let layout = manifest.layout()?;
    let mut device = TxDevice::new(layout, manifest.device.ack_latency);

    info!(
        "Starting run: tx register {:#x}, {} steps",
        layout.tx_register(),
        manifest.limits.steps
    );

    let mut seq = Sequence::new();
    let outcome = {
        let port = device.map(layout.tx_register())?;
        let mut tx = Transmitter::with_wait(port, Bounded::new(manifest.limits.poll_limit));
        seq.drive(&mut tx, manifest.limits.steps)
    };

    let (stop_reason, steps_sent) = match outcome {
        Ok(sent) => (StopReason::Steps, sent),
        Err(timeout) => {
            warn!("Run stalled: {}", timeout);
            (StopReason::PollTimeout, device.output().len().saturating_sub(1) as u64)
        }
    };

    let output = device.output().to_vec();
    let assertions: Vec<AssertionResult> = manifest
        .assertions
        .iter()
        .map(|a| AssertionResult {
            assertion: a.clone(),
            passed: evaluate(a, &output, &stop_reason),
        })
        .collect();

    let clean = device.violations().is_empty() && stop_reason != StopReason::PollTimeout;
    let expects_stop = manifest
        .assertions
        .iter()
        .any(|a| matches!(a, RunAssertion::ExpectedStopReason(_)));
    let passed = assertions.iter().all(|a| a.passed)
        && device.violations().is_empty()
        && (clean || expects_stop);

    Ok(RunReport {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        status: if passed { Status::Pass } else { Status::Fail },
        stop_reason,
        steps_sent,
        tx_register: layout.tx_register(),
        polls: device.reads(),
        output,
        violations: device.violations().to_vec(),
        assertions,
        writes: if keep_writes {
            device.writes().to_vec()
        } else {
            Vec::new()
        },
        config: manifest.clone(),
    })
}

fn evaluate(assertion: &RunAssertion, output: &[u8], stop: &StopReason) -> bool {
    match assertion {
        RunAssertion::OutputStartsWith(a) => output.starts_with(&a.output_starts_with),
        RunAssertion::MaxValue(a) => output.iter().all(|&b| b <= a.max_value),
        RunAssertion::ExpectedStopReason(a) => &a.expected_stop_reason == stop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvtx_config::{MaxValueAssertion, OutputPrefixAssertion, StopReasonAssertion};

    fn manifest(steps: u64, latency: Option<u32>) -> RunManifest {
        let mut m = RunManifest::default();
        m.limits.steps = steps;
        m.limits.poll_limit = 8;
        m.device.ack_latency = latency;
        m
    }

    #[test]
    fn test_execute_first_cycle() {
        let mut m = manifest(12, Some(0));
        m.assertions = vec![
            RunAssertion::OutputStartsWith(OutputPrefixAssertion {
                output_starts_with: vec![1, 2, 3, 5, 8, 13, 21, 34, 55, 89, 144, 233],
            }),
            RunAssertion::MaxValue(MaxValueAssertion { max_value: 233 }),
        ];
        let report = execute(&m, true).unwrap();
        assert_eq!(report.status, Status::Pass);
        assert_eq!(report.stop_reason, StopReason::Steps);
        assert_eq!(report.steps_sent, 12);
        assert_eq!(report.polls, 12);
        assert_eq!(report.writes.len(), 24);
    }

    #[test]
    fn test_execute_failed_assertion() {
        let mut m = manifest(3, Some(1));
        m.assertions = vec![RunAssertion::OutputStartsWith(OutputPrefixAssertion {
            output_starts_with: vec![0],
        })];
        let report = execute(&m, false).unwrap();
        assert_eq!(report.status, Status::Fail);
        assert_eq!(report.output, vec![1, 2, 3]);
        assert!(report.writes.is_empty());
    }

    #[test]
    fn test_execute_silent_device_fails() {
        let report = execute(&manifest(5, None), false).unwrap();
        assert_eq!(report.status, Status::Fail);
        assert_eq!(report.stop_reason, StopReason::PollTimeout);
        assert_eq!(report.steps_sent, 0);
        assert_eq!(report.polls, 8);
    }

    #[test]
    fn test_execute_expected_stall_passes() {
        let mut m = manifest(5, None);
        m.assertions = vec![RunAssertion::ExpectedStopReason(StopReasonAssertion {
            expected_stop_reason: StopReason::PollTimeout,
        })];
        let report = execute(&m, false).unwrap();
        assert_eq!(report.status, Status::Pass);
    }
}
