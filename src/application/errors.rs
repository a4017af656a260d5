//! Application layer errors

use thiserror::Error;

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Command execution errors
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Command not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Permission denied")]
    PermissionDenied,
}

impl From<BotError> for CommandError {
    fn from(err: BotError) -> Self {
        match err {
            BotError::Command(inner) => inner,
            other => CommandError::ExecutionFailed(other.to_string()),
        }
    }
}

impl From<StorageError> for CommandError {
    fn from(err: StorageError) -> Self {
        CommandError::ExecutionFailed(err.to_string())
    }
}

impl From<RegistryError> for CommandError {
    fn from(err: RegistryError) -> Self {
        CommandError::ExecutionFailed(err.to_string())
    }
}

impl From<ConfigError> for CommandError {
    fn from(err: ConfigError) -> Self {
        CommandError::ExecutionFailed(err.to_string())
    }
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Failed to write config: {0}")]
    Write(String),
}

/// Command registry and unit errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Syntax error in {unit}: {message}")]
    Syntax { unit: String, message: String },

    #[error("Malformed command in {unit}: {message}")]
    Malformed { unit: String, message: String },

    #[error("Duplicate command name: \"{0}\" already exists")]
    DuplicateName(String),

    #[error("Command name \"{name}\" is already used as an alias by command \"{owner}\"")]
    NameTakenByAlias { name: String, owner: String },

    #[error("Alias \"{0}\" conflicts with existing command name")]
    AliasConflictsWithName(String),

    #[error("Alias \"{alias}\" already used by command \"{owner}\"")]
    DuplicateAlias { alias: String, owner: String },

    #[error("Command {0} not found")]
    CommandNotFound(String),

    #[error("Unit {0} not found")]
    UnitNotFound(String),

    #[error("Unit {0} already exists")]
    UnitExists(String),

    #[error("Invalid unit identifier: {0}")]
    InvalidUnit(String),

    #[error("Command {0} is protected")]
    Protected(String),

    #[error("Command {0} is already disabled")]
    AlreadyDisabled(String),

    #[error("Command {0} is not disabled")]
    NotDisabled(String),

    #[error("Unit storage error: {0}")]
    Io(String),

    #[error("Failed to persist config: {0}")]
    Config(String),
}

impl From<std::io::Error> for RegistryError {
    fn from(err: std::io::Error) -> Self {
        RegistryError::Io(err.to_string())
    }
}

impl From<ConfigError> for RegistryError {
    fn from(err: ConfigError) -> Self {
        RegistryError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_becomes_execution_failure() {
        let err: CommandError = ConfigError::Write("disk full".to_string()).into();
        assert!(matches!(err, CommandError::ExecutionFailed(ref m) if m == "Failed to write config: disk full"));
    }

    #[test]
    fn test_command_error_passes_through_bot_error() {
        let err: CommandError = BotError::Command(CommandError::PermissionDenied).into();
        assert!(matches!(err, CommandError::PermissionDenied));
    }
}
