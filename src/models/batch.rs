use crate::error::ConfigError;

/// 一个批次：积压表中连续的一段待发布行
///
/// 只是调度和保存进度的单位，不会被持久化。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// 批次编号（从 1 开始）
    pub number: usize,
    /// 行号，保持原始顺序
    pub rows: Vec<usize>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// 把行号切分为固定大小的批次
///
/// 批次连续且保持顺序，最后一批可能更小。
pub fn partition(rows: &[usize], batch_size: usize) -> Result<Vec<Batch>, ConfigError> {
    if batch_size == 0 {
        return Err(ConfigError::InvalidBatchSize(batch_size));
    }

    Ok(rows
        .chunks(batch_size)
        .enumerate()
        .map(|(i, chunk)| Batch {
            number: i + 1,
            rows: chunk.to_vec(),
        })
        .collect())
}
