// Copyright 2025 itscheems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};

/// Bounded hand-off between the poll loop and the worker threads
///
/// Properties:
/// - One producer (the poll loop), many consumers (workers)
/// - Bounded capacity for backpressure
/// - Explicit failure when full: the poller rolls back what it could not
///   hand off, so those candidates are offered again on the next poll
pub struct DispatchQueue<T> {
	sender: Sender<T>,
	receiver: Receiver<T>,
}

impl<T> DispatchQueue<T> {
	pub fn new(capacity: usize) -> Self {
		let (sender, receiver) = bounded(capacity);
		Self { sender, receiver }
	}

	/// Split the queue into its sender and receiver ends
	///
	/// Both ends can be cloned; every worker holds a receiver.
	pub fn split(self) -> (DispatchSender<T>, DispatchReceiver<T>) {
		(
			DispatchSender {
				sender: self.sender,
			},
			DispatchReceiver {
				receiver: self.receiver,
			},
		)
	}
}

pub struct DispatchSender<T> {
	sender: Sender<T>,
}

impl<T> Clone for DispatchSender<T> {
	fn clone(&self) -> Self {
		Self {
			sender: self.sender.clone(),
		}
	}
}

impl<T> DispatchSender<T> {
	/// Hand an item to the workers without blocking
	pub fn try_dispatch(&self, item: T) -> Result<(), DispatchError> {
		self.sender.try_send(item).map_err(|e| match e {
			TrySendError::Full(_) => DispatchError::Full,
			TrySendError::Disconnected(_) => DispatchError::Disconnected,
		})
	}

	/// Items waiting for a worker
	pub fn len(&self) -> usize {
		self.sender.len()
	}

	pub fn is_empty(&self) -> bool {
		self.sender.is_empty()
	}
}

pub struct DispatchReceiver<T> {
	receiver: Receiver<T>,
}

impl<T> Clone for DispatchReceiver<T> {
	fn clone(&self) -> Self {
		Self {
			receiver: self.receiver.clone(),
		}
	}
}

impl<T> DispatchReceiver<T> {
	/// Wait up to `timeout` for the next item
	///
	/// `Empty` means the timeout elapsed; workers use it to check for
	/// shutdown between items.
	pub fn recv_timeout(&self, timeout: Duration) -> Result<T, DispatchError> {
		self.receiver.recv_timeout(timeout).map_err(|e| match e {
			RecvTimeoutError::Timeout => DispatchError::Empty,
			RecvTimeoutError::Disconnected => DispatchError::Disconnected,
		})
	}

	pub fn try_recv(&self) -> Result<T, DispatchError> {
		self.recv_timeout(Duration::ZERO)
	}
}

/// Errors that can occur when interacting with the dispatch queue
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DispatchError {
	#[error("Dispatch queue is full")]
	Full,
	#[error("Dispatch queue is empty")]
	Empty,
	#[error("Dispatch queue disconnected")]
	Disconnected,
}
