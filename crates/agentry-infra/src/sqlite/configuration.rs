//! SQLite configuration repository implementation.
//!
//! Implements `ConfigurationRepository` from `agentry-core` using sqlx with
//! split read/write pools. Tool servers and model settings live in JSON columns.

use agentry_core::repository::configuration::ConfigurationRepository;
use agentry_types::agent::{AgentConfiguration, ModelSettings, ToolServerConfig};
use agentry_types::error::RepositoryError;
use sqlx::Row;

use super::pool::DatabasePool;
use super::{format_datetime, is_unique_violation, parse_datetime};

/// SQLite-backed implementation of `ConfigurationRepository`.
#[derive(Clone)]
pub struct SqliteConfigurationRepository {
    pool: DatabasePool,
}

impl SqliteConfigurationRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to `AgentConfiguration`.
struct ConfigurationRow {
    config_id: String,
    name: String,
    tool_servers: String,
    system_prompt: Option<String>,
    model_settings: Option<String>,
    created_at: String,
    updated_at: String,
    active: bool,
}

impl ConfigurationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            config_id: row.try_get("config_id")?,
            name: row.try_get("name")?,
            tool_servers: row.try_get("tool_servers")?,
            system_prompt: row.try_get("system_prompt")?,
            model_settings: row.try_get("model_settings")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            active: row.try_get("active")?,
        })
    }

    fn into_configuration(self) -> Result<AgentConfiguration, RepositoryError> {
        let tool_servers: Vec<ToolServerConfig> = serde_json::from_str(&self.tool_servers)
            .map_err(|e| RepositoryError::Query(format!("invalid tool_servers JSON: {e}")))?;

        let model_settings: Option<ModelSettings> = self
            .model_settings
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| RepositoryError::Query(format!("invalid model_settings JSON: {e}")))?;

        Ok(AgentConfiguration {
            config_id: self.config_id,
            name: self.name,
            tool_servers,
            system_prompt: self.system_prompt,
            model_settings,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            active: self.active,
        })
    }
}

fn encode_json(config: &AgentConfiguration) -> Result<(String, Option<String>), RepositoryError> {
    let tool_servers = serde_json::to_string(&config.tool_servers)
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let model_settings = config
        .model_settings
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    Ok((tool_servers, model_settings))
}

impl ConfigurationRepository for SqliteConfigurationRepository {
    async fn create(&self, config: &AgentConfiguration) -> Result<String, RepositoryError> {
        let (tool_servers, model_settings) = encode_json(config)?;

        let result = sqlx::query(
            "INSERT INTO agent_configurations (config_id, name, tool_servers, system_prompt, model_settings, created_at, updated_at, active)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&config.config_id)
        .bind(&config.name)
        .bind(&tool_servers)
        .bind(&config.system_prompt)
        .bind(&model_settings)
        .bind(format_datetime(&config.created_at))
        .bind(format_datetime(&config.updated_at))
        .bind(config.active)
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(config.config_id.clone()),
            Err(e) if is_unique_violation(&e) => Err(RepositoryError::Conflict(format!(
                "configuration '{}' already exists",
                config.config_id
            ))),
            Err(e) => Err(RepositoryError::Query(e.to_string())),
        }
    }

    async fn get(&self, config_id: &str) -> Result<Option<AgentConfiguration>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM agent_configurations WHERE config_id = ?")
            .bind(config_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let config_row = ConfigurationRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(config_row.into_configuration()?))
            }
            None => Ok(None),
        }
    }

    async fn update(&self, config: &AgentConfiguration) -> Result<bool, RepositoryError> {
        let (tool_servers, model_settings) = encode_json(config)?;

        let result = sqlx::query(
            "UPDATE agent_configurations SET name = ?, tool_servers = ?, system_prompt = ?, model_settings = ?, updated_at = ?, active = ?
             WHERE config_id = ?",
        )
        .bind(&config.name)
        .bind(&tool_servers)
        .bind(&config.system_prompt)
        .bind(&model_settings)
        .bind(format_datetime(&config.updated_at))
        .bind(config.active)
        .bind(&config.config_id)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, config_id: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE agent_configurations SET active = 0, updated_at = ? WHERE config_id = ?",
        )
        .bind(format_datetime(&chrono::Utc::now()))
        .bind(config_id)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn purge(&self, config_id: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM agent_configurations WHERE config_id = ?")
            .bind(config_id)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, active_only: bool) -> Result<Vec<AgentConfiguration>, RepositoryError> {
        let sql = if active_only {
            "SELECT * FROM agent_configurations WHERE active = 1 ORDER BY created_at DESC, rowid DESC"
        } else {
            "SELECT * FROM agent_configurations ORDER BY created_at DESC, rowid DESC"
        };

        let rows = sqlx::query(sql)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut configs = Vec::with_capacity(rows.len());
        for row in &rows {
            let config_row = ConfigurationRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            configs.push(config_row.into_configuration()?);
        }

        Ok(configs)
    }

    async fn exists(&self, config_id: &str) -> Result<bool, RepositoryError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM agent_configurations WHERE config_id = ?")
                .bind(config_id)
                .fetch_optional(&self.pool.reader)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(row.is_some())
    }
}
