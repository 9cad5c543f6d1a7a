// Round-robin partitioning of the file list across workers

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PartitionError {
    #[error("cannot partition into zero chunks")]
    ZeroChunks,
}

/// Split `items` into `chunk_count` chunks: chunk `i` gets items
/// `i, i + W, i + 2W, ...`, keeping their original relative order.
///
/// Files of one composer sit next to each other in the scan, so dealing them
/// out round-robin spreads every composer across all workers. Chunk sizes
/// differ by at most one.
pub fn partition_round_robin<T>(items: Vec<T>, chunk_count: usize) -> Result<Vec<Vec<T>>, PartitionError> {
    if chunk_count == 0 {
        return Err(PartitionError::ZeroChunks);
    }

    let per_chunk = items.len().div_ceil(chunk_count);
    let mut chunks: Vec<Vec<T>> = (0..chunk_count).map(|_| Vec::with_capacity(per_chunk)).collect();
    for (i, item) in items.into_iter().enumerate() {
        chunks[i % chunk_count].push(item);
    }

    Ok(chunks)
}
