// Copyright 2026 Muvon Un Limited
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

/// Nearest-neighbor candidates fetched per requested result. The hybrid
/// filter pass rejects candidates after the vector search, so the pool has
/// to be larger than the final result.
pub const CANDIDATE_MULTIPLIER: usize = 5;

/// Floor for the candidate pool regardless of `top_k`.
pub const MIN_CANDIDATE_POOL: usize = 30;

/// Maximum documents fetched for the currently viewed job when pinning.
pub const PINNED_DOC_LIMIT: usize = 6;

/// Maximum conversation turns folded into the retrieval query.
pub const MAX_HISTORY_TURNS: usize = 4;

/// Character cap on the folded conversation history.
pub const MAX_HISTORY_CHARS: usize = 800;
