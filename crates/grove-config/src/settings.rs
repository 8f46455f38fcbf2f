use crate::{ConfigError, ConfigFile};

/// Typed view of the `core.*` settings the engine consults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Whether the executable bit in the work tree is meaningful.
    pub filemode: bool,
    pub bare: bool,
    /// zlib level for packs, -1 meaning the library default.
    pub compression: i32,
    /// zlib level for loose objects.
    pub loose_compression: i32,
    /// How long ref updates wait for a contended lock.
    pub refs_lock_timeout_ms: u64,
    pub delta_window: usize,
    pub delta_depth: usize,
    pub object_cache_size: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            filemode: cfg!(unix),
            bare: false,
            compression: -1,
            loose_compression: 1,
            refs_lock_timeout_ms: 100,
            delta_window: 10,
            delta_depth: 50,
            object_cache_size: 1024,
        }
    }
}

impl CoreConfig {
    pub fn from_config(config: &ConfigFile) -> Result<Self, ConfigError> {
        let d = Self::default();
        let compression = level(config.get_int("core.compression")?).unwrap_or(d.compression);
        Ok(Self {
            filemode: config.get_bool("core.filemode")?.unwrap_or(d.filemode),
            bare: config.get_bool("core.bare")?.unwrap_or(d.bare),
            compression,
            loose_compression: level(config.get_int("core.loosecompression")?)
                .unwrap_or(if compression >= 0 { compression } else { d.loose_compression }),
            refs_lock_timeout_ms: non_negative(config.get_int("core.filesreflocktimeout")?)
                .unwrap_or(d.refs_lock_timeout_ms),
            delta_window: non_negative(config.get_int("pack.window")?)
                .map_or(d.delta_window, |v| v as usize),
            delta_depth: non_negative(config.get_int("pack.depth")?)
                .map_or(d.delta_depth, |v| v as usize),
            object_cache_size: non_negative(config.get_int("core.objectcachesize")?)
                .map_or(d.object_cache_size, |v| v as usize),
        })
    }

    /// Pack zlib level as an unsigned level, resolving the default.
    pub fn pack_level(&self) -> u32 {
        u32::try_from(self.compression).unwrap_or(6)
    }

    pub fn loose_level(&self) -> u32 {
        u32::try_from(self.loose_compression).unwrap_or(1)
    }
}

fn level(v: Option<i64>) -> Option<i32> {
    v.map(|v| v.clamp(-1, 9) as i32)
}

fn non_negative(v: Option<i64>) -> Option<u64> {
    v.and_then(|v| u64::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_absent() {
        let core = CoreConfig::from_config(&ConfigFile::new()).unwrap();
        assert_eq!(core, CoreConfig::default());
        assert_eq!(core.pack_level(), 6);
    }

    #[test]
    fn reads_overrides() {
        let file = ConfigFile::parse(
            b"[core]\n\tfilemode = false\n\tcompression = 9\n\tfilesRefLockTimeout = 250\n[pack]\n\twindow = 4\n",
        )
        .unwrap();
        let core = CoreConfig::from_config(&file).unwrap();
        assert!(!core.filemode);
        assert_eq!(core.pack_level(), 9);
        assert_eq!(core.loose_level(), 9);
        assert_eq!(core.refs_lock_timeout_ms, 250);
        assert_eq!(core.delta_window, 4);
    }

    #[test]
    fn bad_boolean_is_an_error() {
        let file = ConfigFile::parse(b"[core]\n\tbare = perhaps\n").unwrap();
        assert!(matches!(
            CoreConfig::from_config(&file),
            Err(ConfigError::InvalidBool { .. })
        ));
    }
}
