use itertools::Itertools;

use crate::{
    comment::NormalizedComment,
    error::{AppError, AppResult},
};

use super::types::Batch;

/// Splits `items` into batches of `size`, keeping order. The last batch may be shorter.
pub fn batch(items: Vec<NormalizedComment>, size: usize) -> AppResult<Vec<Batch>> {
    if size == 0 {
        return Err(AppError::InvalidConfiguration(
            "batch size must be positive".to_string(),
        ));
    }

    let chunks = items.into_iter().chunks(size);
    let batches = chunks
        .into_iter()
        .map(|chunk| Batch::new(chunk.collect()))
        .collect();
    Ok(batches)
}
