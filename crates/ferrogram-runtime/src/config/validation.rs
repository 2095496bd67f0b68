//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{BotConfig, FerrogramConfig, PollingConfig, WebhookConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &FerrogramConfig) -> ConfigResult<()> {
    validate_bot_config(&config.bot)?;
    validate_polling_config(&config.polling)?;
    validate_webhook_config(&config.webhook)?;
    Ok(())
}

/// Validates API access settings.
///
/// A missing token is not an error here: polling reports it when started.
fn validate_bot_config(bot: &BotConfig) -> ConfigResult<()> {
    validate_url(&bot.api_base_url)?;

    if bot.api_timeout_ms == 0 {
        return Err(ConfigError::validation("API timeout must be greater than 0"));
    }

    if let Some(token) = &bot.token
        && token.trim().is_empty()
    {
        return Err(ConfigError::missing_field("bot.token"));
    }

    Ok(())
}

fn validate_polling_config(polling: &PollingConfig) -> ConfigResult<()> {
    if polling.timeout_secs == 0 {
        return Err(ConfigError::validation(
            "Polling timeout must be greater than 0",
        ));
    }

    if polling.retry_wait_ms == 0 {
        return Err(ConfigError::validation(
            "Retry wait must be greater than 0",
        ));
    }

    if let Some(kind) = polling.allowed_updates.iter().find(|kind| kind.is_service_event()) {
        return Err(ConfigError::validation(format!(
            "allowed_updates only takes top-level kinds, got service event '{kind}'"
        )));
    }

    Ok(())
}

fn validate_webhook_config(webhook: &WebhookConfig) -> ConfigResult<()> {
    if webhook.port == 0 {
        return Err(ConfigError::validation("Webhook port must be greater than 0"));
    }

    validate_path(&webhook.path)
}

/// Validates a URL.
fn validate_url(url: &str) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::missing_field("bot.api_base_url"));
    }

    let valid_schemes = ["http://", "https://"];
    if !valid_schemes.iter().any(|s| url.starts_with(s)) {
        return Err(ConfigError::invalid_url(
            url,
            format!("URL must start with one of: {valid_schemes:?}"),
        ));
    }

    Ok(())
}

/// Validates a path.
fn validate_path(path: &str) -> ConfigResult<()> {
    if !path.starts_with('/') {
        return Err(ConfigError::validation(format!(
            "Path must start with '/': {path}"
        )));
    }

    Ok(())
}
