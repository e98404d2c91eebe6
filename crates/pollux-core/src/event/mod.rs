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

//! Primitives for change notification between loosely coupled objects.
//!
//! A [`Signal`] is owned by the emitter (e.g. a light) and fans values out to any
//! number of [`Subscription`]s. Each subscription owns the receiving end of a
//! `flume` channel, so dropping it is all it takes to unsubscribe; the signal
//! prunes disconnected subscribers lazily on the next emission.

mod signal;

pub use self::signal::{Signal, Subscription};
