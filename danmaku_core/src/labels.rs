use std::collections::HashMap;
use std::{fs, path::Path};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Key consulted when a lookup has no exact match.
pub const DEFAULT_KEY: &str = "_default";

/// Read-only display labels keyed case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "HashMap<String, String>", into = "HashMap<String, String>")]
pub struct LabelTable {
    entries: HashMap<String, String>,
}

impl From<HashMap<String, String>> for LabelTable {
    fn from(map: HashMap<String, String>) -> Self {
        let mut table = LabelTable::default();
        table.extend(map);
        table
    }
}

impl From<LabelTable> for HashMap<String, String> {
    fn from(table: LabelTable) -> Self {
        table.entries
    }
}

impl LabelTable {
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let mut table = LabelTable::default();
        table.extend(
            pairs
                .iter()
                .map(|(key, label)| (key.to_string(), label.to_string())),
        );
        table
    }

    pub fn extend<I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, label) in pairs {
            self.entries.insert(key.to_ascii_lowercase(), label);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Exact match, then [`DEFAULT_KEY`], then the key itself.
    pub fn lookup<'a>(&'a self, key: &'a str) -> &'a str {
        self.get(key)
            .or_else(|| self.get(DEFAULT_KEY))
            .unwrap_or(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelTables {
    #[serde(default)]
    pub ai_types: LabelTable,
    #[serde(default)]
    pub voices: LabelTable,
}

static BUILTIN: Lazy<LabelTables> = Lazy::new(|| LabelTables {
    ai_types: LabelTable::from_pairs(&[
        (DEFAULT_KEY, "Unknown"),
        ("assault", "Scav"),
        ("cursedAssault", "Cursed Scav"),
        ("marksman", "Sniper"),
        ("pmcBot", "Raider"),
        ("exUsec", "Rogue"),
        ("arenaFighter", "Fighter"),
        ("sectantPriest", "Cultist Priest"),
        ("sectantWarrior", "Cultist"),
        ("bossBully", "Reshala"),
        ("bossGluhar", "Glukhar"),
        ("bossKilla", "Killa"),
        ("bossKojaniy", "Shturman"),
        ("bossSanitar", "Sanitar"),
        ("bossTagilla", "Tagilla"),
        ("bossKnight", "Knight"),
        ("followerBigPipe", "Big Pipe"),
        ("followerBirdEye", "Birdeye"),
        ("bossZryachiy", "Zryachiy"),
        ("bossBoar", "Kaban"),
        ("bossKolontay", "Kollontay"),
        ("bossPartisan", "Partisan"),
    ]),
    voices: LabelTable::from_pairs(&[
        (DEFAULT_KEY, "Operator"),
        ("Bear_1", "BEAR"),
        ("Bear_2", "BEAR"),
        ("Usec_1", "USEC"),
        ("Usec_2", "USEC"),
        ("Scav_1", "Scav"),
        ("Scav_2", "Scav"),
        ("BossKilla", "Killa"),
        ("BossTagilla", "Tagilla"),
    ]),
});

impl LabelTables {
    pub fn builtin() -> &'static LabelTables {
        &BUILTIN
    }

    /// Built-in tables with the file's entries layered on top.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read label tables: {}", path.display()))?;
        let overrides: LabelTables = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse label tables: {}", path.display()))?;

        let mut tables = LabelTables::builtin().clone();
        tables.ai_types.extend(overrides.ai_types.entries);
        tables.voices.extend(overrides.voices.entries);
        Ok(tables)
    }

    pub fn role_label<'a>(&'a self, role: &'a str) -> &'a str {
        self.ai_types.lookup(role)
    }

    pub fn voice_label<'a>(&'a self, voice: &'a str) -> &'a str {
        self.voices.lookup(voice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn builtin_lookup_is_case_insensitive_with_default() {
        let tables = LabelTables::builtin();
        assert_eq!(tables.role_label("bossKilla"), "Killa");
        assert_eq!(tables.role_label("BOSSKILLA"), "Killa");
        assert_eq!(tables.role_label("notARealBoss"), "Unknown");
        assert_eq!(tables.voice_label("usec_1"), "USEC");
        assert_eq!(tables.voice_label("Mystery"), "Operator");
    }

    #[test]
    fn table_without_default_echoes_key() {
        let table = LabelTable::from_pairs(&[("assault", "Scav")]);
        assert_eq!(table.lookup("Assault"), "Scav");
        assert_eq!(table.lookup("raider"), "raider");
    }

    #[test]
    fn file_overrides_layer_on_builtins() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("labels.json");
        fs::write(
            &path,
            r#"{ "ai_types": { "BOSSKILLA": "Killa (boss)", "_default": "Bot" } }"#,
        )?;

        let tables = LabelTables::from_json_file(&path)?;
        assert_eq!(tables.role_label("bossKilla"), "Killa (boss)");
        assert_eq!(tables.role_label("assault"), "Scav");
        assert_eq!(tables.role_label("whoever"), "Bot");
        assert_eq!(tables.voice_label("Bear_1"), "BEAR");
        Ok(())
    }

    #[test]
    fn missing_file_reports_path() {
        let err = LabelTables::from_json_file(Path::new("/nonexistent/labels.json")).unwrap_err();
        assert!(err.to_string().contains("labels.json"));
    }
}
