// Copyright 2025 eraflo
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

use std::sync::{Mutex, PoisonError};

/// A synchronous, multi-subscriber notification source.
///
/// `emit` pushes the value into every live subscriber's queue before returning.
/// No batching happens on this side: a value emitted twice is delivered twice,
/// and consumers are expected to deduplicate.
#[derive(Debug)]
pub struct Signal<T: Clone + Send + 'static> {
    subscribers: Mutex<Vec<flume::Sender<T>>>,
}

impl<T: Clone + Send + 'static> Signal<T> {
    /// Creates a signal with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Registers a new subscriber.
    ///
    /// The connection lives exactly as long as the returned [`Subscription`].
    pub fn subscribe(&self) -> Subscription<T> {
        let (sender, receiver) = flume::unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        Subscription { receiver }
    }

    /// Delivers `value` to every connected subscriber.
    ///
    /// Subscribers whose [`Subscription`] has been dropped are removed.
    pub fn emit(&self, value: T) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|sender| sender.send(value.clone()).is_ok());
        log::trace!("Signal emitted to {} subscriber(s).", subscribers.len());
    }

    /// Returns the number of subscribers that are still connected.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|sender| !sender.is_disconnected());
        subscribers.len()
    }
}

impl<T: Clone + Send + 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The receiving half of a [`Signal`] connection.
///
/// Dropping the subscription disconnects it.
#[derive(Debug)]
pub struct Subscription<T> {
    receiver: flume::Receiver<T>,
}

impl<T> Subscription<T> {
    /// Takes every value emitted since the last drain, in emission order.
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }

    /// Returns `true` if at least one value is waiting.
    pub fn has_pending(&self) -> bool {
        !self.receiver.is_empty()
    }

    /// Returns `false` once the emitting [`Signal`] has been dropped.
    pub fn is_connected(&self) -> bool {
        !self.receiver.is_disconnected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn emit_reaches_every_subscriber() {
        let signal = Signal::<u32>::new();
        let a = signal.subscribe();
        let b = signal.subscribe();

        signal.emit(7);
        signal.emit(9);

        assert_eq!(a.drain(), vec![7, 9]);
        assert_eq!(b.drain(), vec![7, 9]);
        assert!(!a.has_pending());
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let signal = Signal::<u32>::new();
        let kept = signal.subscribe();
        let dropped = signal.subscribe();
        assert_eq!(signal.subscriber_count(), 2);

        drop(dropped);
        assert_eq!(signal.subscriber_count(), 1);

        signal.emit(1);
        assert_eq!(kept.drain(), vec![1]);
    }

    #[test]
    fn dropping_signal_disconnects_subscribers() {
        let signal = Signal::<()>::new();
        let sub = signal.subscribe();
        assert!(sub.is_connected());
        drop(signal);
        assert!(!sub.is_connected());
        assert!(sub.drain().is_empty());
    }

    #[test]
    fn emit_from_other_thread() {
        let signal = std::sync::Arc::new(Signal::<u64>::new());
        let sub = signal.subscribe();
        let emitter = signal.clone();
        thread::spawn(move || {
            for i in 0..10 {
                emitter.emit(i);
            }
        })
        .join()
        .unwrap();
        assert_eq!(sub.drain(), (0..10).collect::<Vec<_>>());
    }
}
