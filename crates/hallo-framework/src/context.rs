//! Load context handed to persistence hooks.
//!
//! Every module gets one [`LoadContext`] per load. It carries the module's
//! config section (an empty JSON object when absent) and the directory where
//! persistent functions keep their state.
//!
//! ```rust,ignore
//! #[derive(Default, Serialize, Deserialize)]
//! struct Scores { by_user: BTreeMap<String, u32> }
//!
//! impl PersistentFunction for ScoreKeeper {
//!     fn load(ctx: &LoadContext) -> Result<Self, FunctionError> {
//!         let scores = ctx.read_state::<Scores>("ScoreKeeper")?.unwrap_or_default();
//!         Ok(Self::new(scores))
//!     }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::FunctionError;

/// Context passed to load and save hooks of persistent functions.
#[derive(Clone, Debug)]
pub struct LoadContext {
    module: String,
    config: Arc<Value>,
    data_dir: Option<PathBuf>,
}

impl LoadContext {
    pub fn new(module: impl Into<String>, config: Arc<Value>, data_dir: Option<PathBuf>) -> Self {
        Self {
            module: module.into(),
            config,
            data_dir,
        }
    }

    /// A context with no config and no data directory.
    pub fn detached(module: impl Into<String>) -> Self {
        Self::new(module, Arc::new(Value::Object(Default::default())), None)
    }

    /// Name of the module being loaded.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Raw config section of the module.
    pub fn config(&self) -> &Value {
        &self.config
    }

    /// Deserialises the module config section into `T`.
    ///
    /// Use `#[serde(default)]` on `T` to make every field optional.
    pub fn get_config<T>(&self) -> serde_json::Result<T>
    where
        T: DeserializeOwned,
    {
        T::deserialize(self.config.as_ref())
    }

    /// Directory persistent state is kept in, if one is configured.
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Path of the state file for `key`: `<data_dir>/<module>/<key>.json`.
    pub fn state_path(&self, key: &str) -> Option<PathBuf> {
        self.data_dir
            .as_ref()
            .map(|dir| dir.join(&self.module).join(format!("{key}.json")))
    }

    /// Reads the state saved under `key`.
    ///
    /// Returns `Ok(None)` when there is no data directory or nothing has been
    /// saved yet, so load hooks can fall back to a default instance.
    pub fn read_state<T>(&self, key: &str) -> Result<Option<T>, FunctionError>
    where
        T: DeserializeOwned,
    {
        let Some(path) = self.state_path(key) else {
            return Ok(None);
        };
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(FunctionError::Io { path, source }),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Writes `value` as the state for `key`, creating directories as needed.
    ///
    /// Without a data directory this is a no-op.
    pub fn write_state<T>(&self, key: &str, value: &T) -> Result<(), FunctionError>
    where
        T: Serialize + ?Sized,
    {
        let Some(path) = self.state_path(key) else {
            debug!(module = %self.module, key, "No data directory, state not written");
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| FunctionError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_vec_pretty(value)?;
        std::fs::write(&path, json).map_err(|source| FunctionError::Io { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct GreetConfig {
        greeting: String,
        shout: bool,
    }

    #[test]
    fn test_get_config() {
        let ctx = LoadContext::new(
            "greet",
            Arc::new(serde_json::json!({ "greeting": "hi" })),
            None,
        );
        let cfg: GreetConfig = ctx.get_config().unwrap();
        assert_eq!(cfg.greeting, "hi");
        assert!(!cfg.shout);
    }

    #[test]
    fn test_state_without_data_dir() {
        let ctx = LoadContext::detached("greet");
        assert!(ctx.state_path("Greet").is_none());
        ctx.write_state("Greet", &42u32).unwrap();
        assert_eq!(ctx.read_state::<u32>("Greet").unwrap(), None);
    }

    #[test]
    fn test_state_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = LoadContext::new(
            "greet",
            Arc::new(Value::Null),
            Some(dir.path().to_path_buf()),
        );
        assert_eq!(ctx.read_state::<Vec<String>>("Greet").unwrap(), None);

        ctx.write_state("Greet", &vec!["alice", "bob"]).unwrap();
        assert_eq!(
            ctx.state_path("Greet").unwrap(),
            dir.path().join("greet").join("Greet.json")
        );
        assert_eq!(
            ctx.read_state::<Vec<String>>("Greet").unwrap(),
            Some(vec!["alice".to_string(), "bob".to_string()])
        );
    }

    #[test]
    fn test_corrupt_state_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = LoadContext::new("greet", Arc::new(Value::Null), Some(dir.path().into()));
        let path = ctx.state_path("Greet").unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"not json").unwrap();
        assert!(matches!(
            ctx.read_state::<u32>("Greet"),
            Err(FunctionError::Json(_))
        ));
    }
}
