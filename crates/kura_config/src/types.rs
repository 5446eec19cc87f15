//! Configuration types deserialized from `kura.toml`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

/// Prefix shared by every file the cache derives from its root directory.
pub const FILE_PREFIX: &str = "cb.";

/// Name of the default cache root under the user's home directory.
const DEFAULT_ROOT_NAME: &str = ".kura_binaries";

/// The top-level cache configuration parsed from `kura.toml`.
///
/// Every field has a default, so an empty file (or no file at all) yields a
/// usable configuration: per-file storage next to each source, no automatic
/// compilation, buffered reads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Storage backend used for every lookup.
    pub backend: BackendKind,
    /// Directory under which backend files are created.
    pub root: PathBuf,
    /// Whether a cache miss invokes the compiler and stores its output.
    pub auto_compile: bool,
    /// Whether file backends memory-map artifacts instead of copying them.
    pub use_mmap: bool,
    /// External compiler invoked on misses and by explicit compile requests.
    pub compiler: Option<CompilerConfig>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            root: default_root(),
            auto_compile: false,
            use_mmap: false,
            compiler: None,
        }
    }
}

impl CacheConfig {
    /// Directory holding the escaped per-source files of the hashed backend.
    pub fn files_dir(&self) -> PathBuf {
        self.prefixed("files")
    }

    /// Database file of the key-value backend.
    pub fn db_path(&self) -> PathBuf {
        self.prefixed("db")
    }

    /// Index snapshot file of the append-log backend.
    pub fn index_path(&self) -> PathBuf {
        self.prefixed("ff_index")
    }

    /// Data file of the append-log backend.
    pub fn data_path(&self) -> PathBuf {
        self.prefixed("ff_data")
    }

    fn prefixed(&self, name: &str) -> PathBuf {
        self.root.join(format!("{FILE_PREFIX}{name}"))
    }
}

/// Returns `~/.kura_binaries`, or a relative `.kura_binaries` when no home
/// directory can be determined.
pub fn default_root() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(DEFAULT_ROOT_NAME))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT_NAME))
}

/// Storage backend selection.
///
/// Names are matched case-insensitively, and the legacy short names (`fs`,
/// `fs2`, `fsgz`, `fs2gz`, `dbm`, `flatfile`) are accepted as aliases. The
/// configuration file, environment and command line share one parser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum BackendKind {
    /// One cache file next to each source file.
    #[default]
    Direct,
    /// One escaped cache file per source in a dedicated directory.
    Hashed,
    /// [`BackendKind::Direct`] with gzip-compressed artifacts.
    DirectGzip,
    /// [`BackendKind::Hashed`] with gzip-compressed artifacts.
    HashedGzip,
    /// An embedded key-value database file.
    KeyValue,
    /// An append-only data file with an in-memory offset index.
    AppendLog,
    /// Caching disabled: every lookup misses and every write is dropped.
    Null,
}

impl BackendKind {
    /// All backend kinds, in declaration order.
    pub const ALL: [BackendKind; 7] = [
        BackendKind::Direct,
        BackendKind::Hashed,
        BackendKind::DirectGzip,
        BackendKind::HashedGzip,
        BackendKind::KeyValue,
        BackendKind::AppendLog,
        BackendKind::Null,
    ];

    /// Canonical configuration name of this backend.
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Direct => "direct",
            BackendKind::Hashed => "hashed",
            BackendKind::DirectGzip => "direct+gzip",
            BackendKind::HashedGzip => "hashed+gzip",
            BackendKind::KeyValue => "keyvalue",
            BackendKind::AppendLog => "appendlog",
            BackendKind::Null => "null",
        }
    }

    /// Returns `true` for backends that store one file per artifact and can
    /// therefore serve memory-mapped reads.
    pub fn is_file_backed(self) -> bool {
        matches!(
            self,
            BackendKind::Direct
                | BackendKind::Hashed
                | BackendKind::DirectGzip
                | BackendKind::HashedGzip
        )
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for BackendKind {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" | "fs" => Ok(BackendKind::Direct),
            "hashed" | "fs2" => Ok(BackendKind::Hashed),
            "direct+gzip" | "fsgz" => Ok(BackendKind::DirectGzip),
            "hashed+gzip" | "fs2gz" => Ok(BackendKind::HashedGzip),
            "keyvalue" | "dbm" => Ok(BackendKind::KeyValue),
            "appendlog" | "flatfile" => Ok(BackendKind::AppendLog),
            "null" => Ok(BackendKind::Null),
            _ => Err(ConfigError::UnknownBackend(s.to_string())),
        }
    }
}

/// External compiler invocation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CompilerConfig {
    /// Program followed by its leading arguments. The source path is
    /// appended as the final argument. Accepts a whitespace-separated
    /// string or a list.
    #[serde(deserialize_with = "deserialize_command")]
    pub command: Vec<String>,
}

/// Deserializes a command from either a single string or a list of strings.
fn deserialize_command<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct CommandLine;

    impl<'de> Visitor<'de> for CommandLine {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a command string or a list of arguments")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(v.split_whitespace().map(str::to_string).collect())
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut args = Vec::new();
            while let Some(arg) = seq.next_element::<String>()? {
                args.push(arg);
            }
            Ok(args)
        }
    }

    deserializer.deserialize_any(CommandLine)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        backend: BackendKind,
    }

    fn parse_backend(name: &str) -> BackendKind {
        let w: Wrapper = toml::from_str(&format!("backend = \"{name}\"")).unwrap();
        w.backend
    }

    #[test]
    fn backend_kind_canonical_names() {
        for kind in BackendKind::ALL {
            assert_eq!(parse_backend(kind.as_str()), kind);
            assert_eq!(kind.as_str().parse::<BackendKind>().unwrap(), kind);
        }
    }

    #[test]
    fn backend_kind_legacy_aliases() {
        assert_eq!(parse_backend("fs"), BackendKind::Direct);
        assert_eq!(parse_backend("fs2"), BackendKind::Hashed);
        assert_eq!(parse_backend("fsgz"), BackendKind::DirectGzip);
        assert_eq!(parse_backend("fs2gz"), BackendKind::HashedGzip);
        assert_eq!(parse_backend("dbm"), BackendKind::KeyValue);
        assert_eq!(parse_backend("flatfile"), BackendKind::AppendLog);
        assert_eq!("FLATFILE".parse::<BackendKind>().unwrap(), BackendKind::AppendLog);
    }

    #[test]
    fn backend_kind_case_matches_env_and_file() {
        assert_eq!(parse_backend("FLATFILE"), BackendKind::AppendLog);
        assert_eq!(parse_backend("Hashed+Gzip"), BackendKind::HashedGzip);
        assert_eq!("Hashed+Gzip".parse::<BackendKind>().unwrap(), BackendKind::HashedGzip);
    }

    #[test]
    fn backend_kind_unknown_rejected_in_file() {
        let err = toml::from_str::<Wrapper>("backend = \"sqlite\"").err().unwrap();
        assert!(err.to_string().contains("sqlite"));
    }

    #[test]
    fn backend_kind_unknown_rejected() {
        let err = "sqlite".parse::<BackendKind>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBackend(ref s) if s == "sqlite"));
    }

    #[test]
    fn file_backed_kinds() {
        assert!(BackendKind::Direct.is_file_backed());
        assert!(BackendKind::HashedGzip.is_file_backed());
        assert!(!BackendKind::KeyValue.is_file_backed());
        assert!(!BackendKind::AppendLog.is_file_backed());
        assert!(!BackendKind::Null.is_file_backed());
    }

    #[test]
    fn derived_paths_use_prefix() {
        let config = CacheConfig {
            root: PathBuf::from("/var/cache/kura"),
            ..CacheConfig::default()
        };
        assert_eq!(config.files_dir(), PathBuf::from("/var/cache/kura/cb.files"));
        assert_eq!(config.db_path(), PathBuf::from("/var/cache/kura/cb.db"));
        assert_eq!(config.index_path(), PathBuf::from("/var/cache/kura/cb.ff_index"));
        assert_eq!(config.data_path(), PathBuf::from("/var/cache/kura/cb.ff_data"));
    }

    #[test]
    fn default_root_is_named_directory() {
        assert!(default_root().ends_with(DEFAULT_ROOT_NAME));
    }

    #[test]
    fn compiler_command_from_string() {
        let c: CompilerConfig = toml::from_str(r#"command = "kcc --emit bin""#).unwrap();
        assert_eq!(c.command, vec!["kcc", "--emit", "bin"]);
    }

    #[test]
    fn compiler_command_from_list() {
        let c: CompilerConfig =
            toml::from_str(r#"command = ["kcc", "--out dir"]"#).unwrap();
        assert_eq!(c.command, vec!["kcc", "--out dir"]);
    }
}
