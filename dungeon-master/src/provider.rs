//! The persistence/catalog collaborator contract.
//!
//! A [`GameDataProvider`] supplies the static tables (items, jobs,
//! monsters, abilities) loaded once at session start, plus per-character
//! persisted records fetched at join time. How the data is stored, cached,
//! or synced back is the collaborator's business.

use async_trait::async_trait;
use dungeon_core::catalog::{AbilityDef, Catalog, ItemDef, JobDef, MonsterDef};
use dungeon_core::state::CharacterRecord;
use std::collections::HashMap;
use thiserror::Error;

/// Errors from the persistence collaborator.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("character {0} not found")]
    CharacterNotFound(String),

    #[error("game data unavailable: {0}")]
    Unavailable(String),
}

/// Read access to static game data and persisted characters.
#[async_trait]
pub trait GameDataProvider: Send + Sync {
    async fn item_table(&self) -> Result<HashMap<String, ItemDef>, ProviderError>;
    async fn job_table(&self) -> Result<HashMap<String, JobDef>, ProviderError>;
    async fn monster_table(&self) -> Result<HashMap<String, MonsterDef>, ProviderError>;
    async fn ability_table(&self) -> Result<HashMap<String, AbilityDef>, ProviderError>;

    /// Fetch a character's persisted record. The session expands it into a
    /// full combatant before admitting the player to the encounter table.
    async fn character(&self, id: &str) -> Result<CharacterRecord, ProviderError>;
}

/// Load all four static tables into a catalog.
pub async fn load_catalog(provider: &dyn GameDataProvider) -> Result<Catalog, ProviderError> {
    let items = provider.item_table().await?;
    let jobs = provider.job_table().await?;
    let monsters = provider.monster_table().await?;
    let abilities = provider.ability_table().await?;
    tracing::info!(
        items = items.len(),
        jobs = jobs.len(),
        monsters = monsters.len(),
        abilities = abilities.len(),
        "all tables loaded"
    );
    Ok(Catalog::new(items, jobs, monsters, abilities))
}

/// An in-memory provider over a fixed catalog and character set. Useful for
/// tests and for deployments that ship their game data with the binary.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    pub catalog: Catalog,
    pub characters: HashMap<String, CharacterRecord>,
}

impl StaticProvider {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            characters: HashMap::new(),
        }
    }

    pub fn with_character(mut self, record: CharacterRecord) -> Self {
        self.characters.insert(record.name.clone(), record);
        self
    }
}

#[async_trait]
impl GameDataProvider for StaticProvider {
    async fn item_table(&self) -> Result<HashMap<String, ItemDef>, ProviderError> {
        Ok(self.catalog.items.clone())
    }

    async fn job_table(&self) -> Result<HashMap<String, JobDef>, ProviderError> {
        Ok(self.catalog.jobs.clone())
    }

    async fn monster_table(&self) -> Result<HashMap<String, MonsterDef>, ProviderError> {
        Ok(self.catalog.monsters.clone())
    }

    async fn ability_table(&self) -> Result<HashMap<String, AbilityDef>, ProviderError> {
        Ok(self.catalog.abilities.clone())
    }

    async fn character(&self, id: &str) -> Result<CharacterRecord, ProviderError> {
        self.characters
            .get(id)
            .cloned()
            .ok_or_else(|| ProviderError::CharacterNotFound(id.to_string()))
    }
}
