// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Recording executor for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{RemoteError, Result};
use crate::event::RemoteEvent;
use crate::executor::RemoteExecutor;
use crate::target::SshTarget;

#[derive(Debug, Clone)]
pub enum Scripted {
	Output(String),
	Fail { exit_code: Option<i32>, output: String },
	ConnectFailure,
}

/// A call seen by [`ScriptedExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
	pub host: String,
	pub command: String,
}

/// Pops a scripted response per call, falling back to empty output.
///
/// Responses can be keyed on a command substring with [`on`](Self::on);
/// those are matched before the FIFO queue.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
	queue: Mutex<VecDeque<Scripted>>,
	rules: Mutex<Vec<(String, Scripted)>>,
	calls: Mutex<Vec<RecordedCall>>,
	stream_lines: Mutex<Vec<RemoteEvent>>,
}

impl ScriptedExecutor {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&self, response: Scripted) -> &Self {
		self.queue.lock().unwrap().push_back(response);
		self
	}

	pub fn push_output(&self, output: impl Into<String>) -> &Self {
		self.push(Scripted::Output(output.into()))
	}

	/// Always answer commands containing `needle` with `response`.
	pub fn on(&self, needle: impl Into<String>, response: Scripted) -> &Self {
		self.rules.lock().unwrap().push((needle.into(), response));
		self
	}

	/// Events sent by `run_streaming` before it answers.
	pub fn stream(&self, events: Vec<RemoteEvent>) -> &Self {
		*self.stream_lines.lock().unwrap() = events;
		self
	}

	pub fn calls(&self) -> Vec<RecordedCall> {
		self.calls.lock().unwrap().clone()
	}

	pub fn commands(&self) -> Vec<String> {
		self.calls().into_iter().map(|c| c.command).collect()
	}

	fn answer(&self, target: &SshTarget, command: &str) -> Result<String> {
		self.calls.lock().unwrap().push(RecordedCall {
			host: target.host.clone(),
			command: command.to_string(),
		});

		let ruled = self
			.rules
			.lock()
			.unwrap()
			.iter()
			.find(|(needle, _)| command.contains(needle.as_str()))
			.map(|(_, response)| response.clone());
		let response = ruled.unwrap_or_else(|| {
			self
				.queue
				.lock()
				.unwrap()
				.pop_front()
				.unwrap_or(Scripted::Output(String::new()))
		});

		match response {
			Scripted::Output(out) => Ok(out),
			Scripted::Fail { exit_code, output } => Err(RemoteError::CommandFailed { exit_code, output }),
			Scripted::ConnectFailure => Err(RemoteError::Connect {
				host: target.host.clone(),
				reason: "connection refused".to_string(),
			}),
		}
	}
}

#[async_trait]
impl RemoteExecutor for ScriptedExecutor {
	async fn run(&self, target: &SshTarget, command: &str) -> Result<String> {
		self.answer(target, command)
	}

	async fn run_streaming(
		&self,
		target: &SshTarget,
		command: &str,
		events: mpsc::Sender<RemoteEvent>,
	) -> Result<String> {
		let lines = self.stream_lines.lock().unwrap().clone();
		for event in lines {
			let _ = events.send(event).await;
		}
		self.answer(target, command)
	}
}
