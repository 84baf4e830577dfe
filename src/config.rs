use serde::Deserialize;

use crate::error::Result;

#[derive(Debug, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
}

/// Process-level wiring for the page cache. The core types keep taking raw
/// parameters in their constructors; Config is how a deployment feeds them.
#[derive(Debug, PartialEq, Deserialize)]
pub struct Config {
    pub log_level: LogLevel,
    /// Number of frames in the buffer pool.
    pub pool_size: usize,
    /// K value for the LRU-K replacer.
    pub replacer_k: usize,
    /// Entries per page table bucket.
    pub bucket_size: usize,
}

impl Config {
    pub fn new(file: &str) -> Result<Config> {
        let mut cfg = config::Config::builder()
            .set_default("log_level", "debug")?
            .set_default("pool_size", 64i64)?
            .set_default("replacer_k", 2i64)?
            .set_default("bucket_size", 32i64)?;
        if !file.is_empty() {
            cfg = cfg.add_source(config::File::with_name(file))
        }
        cfg = cfg.add_source(config::Environment::with_prefix("PAGEBOX"));
        Ok(cfg.build()?.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() -> Result<()> {
        let cfg = Config::new("")?;
        assert_eq!(LogLevel::Debug, cfg.log_level);
        assert_eq!(64, cfg.pool_size);
        assert_eq!(2, cfg.replacer_k);
        assert_eq!(32, cfg.bucket_size);
        Ok(())
    }
}
