//! Scripted stand-in for the `ots` binary.
//!
//! Behaves like the real client at the file level: `stamp <file>` writes
//! `<file>.ots`, `verify` and `info` return canned output. Every invocation is
//! recorded so tests can inspect the paths the adapter used.

use super::{AnchorError, ToolOutput, ToolRunner};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Magic prefix of a serialized OpenTimestamps proof.
const OTS_MAGIC: &[u8] = b"\x00OpenTimestamps\x00\x00Proof\x00";

/// What a scripted `ots stamp` does.
#[derive(Debug, Clone)]
pub enum StampOutcome {
    /// Write these exact bytes as the proof.
    Proof(Vec<u8>),
    /// Write a different proof on every call.
    UniqueProofs,
    /// Exit non-zero without writing a proof.
    Fail { exit_code: i32, stderr: String },
    /// Exit cleanly but write nothing.
    Silent,
    /// Behave as if the binary were not installed.
    Unavailable,
}

pub struct ScriptedToolRunner {
    stamp: StampOutcome,
    verify_output: ToolOutput,
    info_output: ToolOutput,
    stamp_count: AtomicUsize,
    calls: Mutex<Vec<Vec<String>>>,
    verified_proofs: Mutex<Vec<Vec<u8>>>,
}

impl ScriptedToolRunner {
    pub fn new(stamp: StampOutcome) -> Self {
        Self {
            stamp,
            verify_output: ToolOutput {
                exit_code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            },
            info_output: ToolOutput {
                exit_code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            },
            stamp_count: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            verified_proofs: Mutex::new(Vec::new()),
        }
    }

    /// Stamps always produce `proof`.
    pub fn stamping(proof: impl Into<Vec<u8>>) -> Self {
        Self::new(StampOutcome::Proof(proof.into()))
    }

    pub fn unique_proofs() -> Self {
        Self::new(StampOutcome::UniqueProofs)
    }

    pub fn failing(exit_code: i32, stderr: &str) -> Self {
        Self::new(StampOutcome::Fail {
            exit_code,
            stderr: stderr.to_string(),
        })
    }

    pub fn unavailable() -> Self {
        Self::new(StampOutcome::Unavailable)
    }

    pub fn with_verify_output(mut self, exit_code: i32, stdout: &str, stderr: &str) -> Self {
        self.verify_output = ToolOutput {
            exit_code: Some(exit_code),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        };
        self
    }

    pub fn with_info_output(mut self, stdout: &str) -> Self {
        self.info_output.stdout = stdout.to_string();
        self
    }

    /// Every argument vector seen so far.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Every file path handed to the tool, including derived `.ots` paths.
    pub fn touched_paths(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        for call in self.calls() {
            if let Some(path) = call.get(1) {
                paths.push(PathBuf::from(path));
                paths.push(PathBuf::from(format!("{}.ots", path)));
            }
        }
        paths
    }

    /// Proof bytes found on disk at each `verify` invocation.
    pub fn verified_proofs(&self) -> Vec<Vec<u8>> {
        self.verified_proofs
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    fn record(&self, args: &[String]) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(args.to_vec());
        }
    }

    async fn stamp(&self, target: &str) -> Result<ToolOutput, AnchorError> {
        let call = self.stamp_count.fetch_add(1, Ordering::SeqCst);
        let proof_path = format!("{}.ots", target);

        let proof = match &self.stamp {
            StampOutcome::Proof(bytes) => bytes.clone(),
            StampOutcome::UniqueProofs => {
                let mut bytes = OTS_MAGIC.to_vec();
                bytes.extend_from_slice(&(call as u64).to_be_bytes());
                bytes
            }
            StampOutcome::Fail { exit_code, stderr } => {
                return Ok(ToolOutput {
                    exit_code: Some(*exit_code),
                    stdout: String::new(),
                    stderr: stderr.clone(),
                })
            }
            StampOutcome::Silent => return Ok(ToolOutput {
                exit_code: Some(0),
                ..ToolOutput::default()
            }),
            StampOutcome::Unavailable => {
                return Err(AnchorError::ToolUnavailable(
                    "ots: No such file or directory".to_string(),
                ))
            }
        };

        tokio::fs::write(&proof_path, proof).await?;
        Ok(ToolOutput {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: "Submitting to remote calendar https://a.pool.opentimestamps.org\n"
                .to_string(),
        })
    }
}

#[async_trait]
impl ToolRunner for ScriptedToolRunner {
    async fn run(&self, _program: &str, args: &[String]) -> Result<ToolOutput, AnchorError> {
        self.record(args);

        match (args.first().map(String::as_str), args.get(1)) {
            (Some("stamp"), Some(target)) => self.stamp(target).await,
            (Some("verify"), Some(proof_path)) => {
                if matches!(self.stamp, StampOutcome::Unavailable) {
                    return Err(AnchorError::ToolUnavailable(
                        "ots: No such file or directory".to_string(),
                    ));
                }
                let proof = tokio::fs::read(proof_path).await?;
                if let Ok(mut seen) = self.verified_proofs.lock() {
                    seen.push(proof);
                }
                Ok(self.verify_output.clone())
            }
            (Some("info"), Some(_)) => Ok(self.info_output.clone()),
            _ => Ok(ToolOutput {
                exit_code: Some(2),
                stdout: String::new(),
                stderr: "usage: ots [-h] {stamp,upgrade,verify,info} ...".to_string(),
            }),
        }
    }
}
