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

//! Generic resource caches.
//!
//! - [`Collection`]: the mutex-protected key to element map.
//! - [`Cache`]: create/add/find/remove/merge over a collection, driven by
//!   producer, initialiser, cleaner and merger strategies.
//! - [`CacheView`]: a scoped set of keys created through a shared cache and
//!   removed from it when the view goes away.

mod cache;
mod collection;
mod view;

pub use self::cache::{default_merger, Cache, Cleaner, Initialiser, Merger, Producer};
pub use self::collection::{Collection, CollectionLock};
pub use self::view::CacheView;
