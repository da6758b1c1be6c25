use super::{selection::ResolvedVariable, InfoshareError};

/// Infoshare only renders tables of up to this many cells.
pub const CELL_BUDGET: u64 = 50_000;

/// Oversized requests are split along this variable.  Rows of an Infoshare table
/// are time periods, so every chunk keeps the same header rows.
pub const SPLIT_VARIABLE: &str = "Time";

/// Number of cells the selection produces.
pub fn cell_count(resolved: &[ResolvedVariable]) -> u64 {
    resolved
        .iter()
        .fold(1u64, |acc, v| acc.saturating_mul(v.options.len() as u64))
}

/// Split a selection into sub-selections that each fit in `budget` cells.
///
/// Only the `split_on` variable is split, into contiguous slices of its options.
/// Every other variable is repeated as is in each chunk.  A selection that already
/// fits comes back as a single chunk.
pub fn plan_chunks(
    resolved: &[ResolvedVariable],
    budget: u64,
    split_on: &str,
) -> Result<Vec<Vec<ResolvedVariable>>, InfoshareError> {
    if cell_count(resolved) <= budget {
        return Ok(vec![resolved.to_vec()]);
    }
    let position = resolved
        .iter()
        .position(|v| v.title == split_on)
        .ok_or_else(|| InfoshareError::MissingSplitVariable(split_on.to_string()))?;

    let other_cells = resolved
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != position)
        .fold(1u64, |acc, (_, v)| acc.saturating_mul(v.options.len() as u64));
    let chunk_size = budget / other_cells;
    if chunk_size == 0 {
        return Err(InfoshareError::ChunkTooLarge {
            split_on: split_on.to_string(),
            cells: other_cells,
            budget,
        });
    }

    let chunks = resolved[position]
        .options
        .chunks(chunk_size as usize)
        .map(|slice| {
            let mut chunk = resolved.to_vec();
            chunk[position].options = slice.to_vec();
            chunk
        })
        .collect();
    Ok(chunks)
}
