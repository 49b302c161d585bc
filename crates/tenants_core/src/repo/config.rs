use serde::Deserialize;

const DEFAULT_MAX_PARAMS: usize = 32_000;
const DEFAULT_ID_CHUNK_SIZE: usize = 1_000;

/// Statement sizing limits for bulk writes and batch lookups.
///
/// Deserializable so hosts can load it next to their own settings; missing
/// fields keep their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RepoOptions {
    /// Upper bound on bound parameters in one `insert_many` statement.
    pub max_params: usize,
    /// Ids per `IN (...)` statement in `find_all_by_ids`.
    pub id_chunk_size: usize,
}

impl Default for RepoOptions {
    fn default() -> Self {
        Self {
            max_params: DEFAULT_MAX_PARAMS,
            id_chunk_size: DEFAULT_ID_CHUNK_SIZE,
        }
    }
}

impl RepoOptions {
    /// Rows per `insert_many` statement for `columns` bound columns.
    pub fn insert_chunk_len(&self, columns: usize) -> usize {
        (self.max_params / columns.max(1)).max(1)
    }

    pub fn id_chunk_len(&self) -> usize {
        self.id_chunk_size.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::RepoOptions;

    #[test]
    fn defaults_match_parameter_ceiling() {
        let options = RepoOptions::default();
        assert_eq!(options.max_params, 32_000);
        assert_eq!(options.insert_chunk_len(7), 4_571);
        assert_eq!(options.id_chunk_len(), 1_000);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let options: RepoOptions = serde_json::from_str(r#"{"max_params": 10}"#).unwrap();
        assert_eq!(options.max_params, 10);
        assert_eq!(options.id_chunk_size, 1_000);
        assert_eq!(options.insert_chunk_len(20), 1);
    }
}
