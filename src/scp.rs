use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{Result, SslError};

/// Ordered "key path" script table. Each non-empty line names one
/// utterance and the file backing it; '#' starts a comment. Iteration
/// preserves file order, lookups go through a key index.
#[derive(Debug, Clone)]
pub struct ScriptTable {
    entries: Vec<(String, PathBuf)>,
    index: HashMap<String, usize>,
}

impl ScriptTable {
    pub fn parse<R: BufRead>(reader: R, origin: &str) -> Result<Self> {
        let mut entries: Vec<(String, PathBuf)> = Vec::new();
        let mut index = HashMap::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.splitn(2, '#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some(key), Some(path)) => {
                    if index.insert(key.to_string(), entries.len()).is_some() {
                        return Err(SslError::config(format!(
                            "{origin}:{}: duplicate key {key:?}",
                            lineno + 1
                        )));
                    }
                    entries.push((key.to_string(), PathBuf::from(path)));
                }
                _ => {
                    return Err(SslError::config(format!(
                        "{origin}:{}: expected \"key path\", received {line:?}",
                        lineno + 1
                    )));
                }
            }
        }
        Ok(Self { entries, index })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|err| {
            SslError::config(format!("cannot open script file {}: {err}", path.display()))
        })?;
        Self::parse(BufReader::new(file), &path.display().to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries
            .iter()
            .map(|(key, path)| (key.as_str(), path.as_path()))
    }

    pub fn get(&self, key: &str) -> Option<&Path> {
        self.index
            .get(key)
            .map(|&slot| self.entries[slot].1.as_path())
    }
}
