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

//! # Pollux Data
//!
//! Data-side structures of the lighting core: the generic resource caches, the
//! scene model and the packed light buffer.

#![warn(missing_docs)]

pub mod cache;
pub mod engine;
pub mod light_buffer;
pub mod light_cache;
pub mod scene;

pub use engine::{Engine, SamplerCache};
pub use light_buffer::{LightBuffer, Partition};
pub use light_cache::{LightCache, LightInit};
