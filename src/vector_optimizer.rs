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

use lancedb::DistanceType;

/// Parameters for vector index optimization
pub struct IndexParams {
    pub should_create_index: bool,
    pub num_partitions: u32,
    pub num_sub_vectors: u32,
    pub num_bits: usize,
    pub distance_type: DistanceType,
}

/// Vector index optimizer for LanceDB
pub struct VectorOptimizer;

impl VectorOptimizer {
    /// Calculate optimal index parameters based on dataset size
    pub fn calculate_index_params(row_count: usize, vector_dim: usize) -> IndexParams {
        // Don't create index for small datasets (< 1000 rows)
        if row_count < 1000 {
            return IndexParams {
                should_create_index: false,
                num_partitions: 0,
                num_sub_vectors: 0,
                num_bits: 0,
                distance_type: DistanceType::Cosine,
            };
        }

        // Calculate optimal partitions (sqrt of row count, min 2, max 256)
        let num_partitions = ((row_count as f64).sqrt() as u32).clamp(2, 256);

        // Calculate sub-vectors (vector_dim / 8, min 1, max 96)
        let num_sub_vectors = ((vector_dim / 8) as u32).clamp(1, 96);

        IndexParams {
            should_create_index: true,
            num_partitions,
            num_sub_vectors,
            num_bits: 8, // Standard 8-bit quantization
            distance_type: DistanceType::Cosine,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_dataset_skips_index() {
        let params = VectorOptimizer::calculate_index_params(500, 384);
        assert!(!params.should_create_index);
    }

    #[test]
    fn test_large_dataset_gets_index() {
        let params = VectorOptimizer::calculate_index_params(10_000, 384);
        assert!(params.should_create_index);
        assert_eq!(params.num_partitions, 100);
        assert_eq!(params.num_sub_vectors, 48);
        assert_eq!(params.num_bits, 8);
    }
}
