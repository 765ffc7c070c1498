use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::{error, info, warn};
use reqwest::Client;
use tokio::time::{interval, MissedTickBehavior};

/// Default gap between ticks: every five minutes
const DEFAULT_INTERVAL_SECS: u64 = 300;
const REQUEST_TIMEOUT_SECS: u64 = 60;
const CRON_PATH: &str = "/api/cron/process-messages";

#[derive(Debug, Clone, PartialEq)]
struct TriggerConfig {
    target_url: String,
    cron_secret: String,
    interval: Duration,
}

impl TriggerConfig {
    fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let base_url = get("APP_BASE_URL").context("APP_BASE_URL must be set")?;
        let cron_secret = get("CRON_SECRET").context("CRON_SECRET must be set")?;

        let interval_secs = match get("CRON_INTERVAL_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("CRON_INTERVAL_SECS is not a number: {}", raw))?,
            None => DEFAULT_INTERVAL_SECS,
        };
        if interval_secs == 0 {
            bail!("CRON_INTERVAL_SECS must be greater than zero");
        }

        Ok(Self {
            target_url: format!("{}{}", base_url.trim_end_matches('/'), CRON_PATH),
            cron_secret,
            interval: Duration::from_secs(interval_secs),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting Unveil cron trigger");

    let config = TriggerConfig::from_env()?;
    let client = Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()?;

    info!(
        "Triggering {} every {}s",
        config.target_url,
        config.interval.as_secs()
    );

    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // A failed tick is logged and the next one tries again
                match trigger_once(&client, &config.target_url, &config.cron_secret).await {
                    Ok(summary) => info!("Cron tick completed: {}", summary),
                    Err(e) => error!("Cron tick failed: {:#}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down cron trigger");
                break;
            }
        }
    }

    Ok(())
}

/// Calls the cron route once and returns the processing summary it relays
async fn trigger_once(
    client: &Client,
    target_url: &str,
    cron_secret: &str,
) -> Result<serde_json::Value> {
    let response = client
        .get(target_url)
        .bearer_auth(cron_secret)
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", target_url))?;

    let status = response.status();
    let body: serde_json::Value = response
        .json()
        .await
        .context("Cron route returned a non-JSON body")?;

    if !status.is_success() {
        bail!("Cron route responded with {}: {}", status, body);
    }

    if let Some(errors) = body.get("errors").and_then(|e| e.as_array()) {
        if !errors.is_empty() {
            warn!("{} scheduled messages failed this tick", errors.len());
        }
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_config_defaults_interval() {
        let config = TriggerConfig::from_lookup(lookup(&[
            ("APP_BASE_URL", "https://unveil.test/"),
            ("CRON_SECRET", "s3cret"),
        ]))
        .unwrap();

        assert_eq!(
            config.target_url,
            "https://unveil.test/api/cron/process-messages"
        );
        assert_eq!(config.cron_secret, "s3cret");
        assert_eq!(config.interval, Duration::from_secs(300));
    }

    #[test]
    fn test_config_rejects_missing_and_invalid_values() {
        assert!(TriggerConfig::from_lookup(lookup(&[("CRON_SECRET", "s3cret")])).is_err());
        assert!(TriggerConfig::from_lookup(lookup(&[("APP_BASE_URL", "https://unveil.test")])).is_err());
        assert!(TriggerConfig::from_lookup(lookup(&[
            ("APP_BASE_URL", "https://unveil.test"),
            ("CRON_SECRET", "s3cret"),
            ("CRON_INTERVAL_SECS", "soon"),
        ]))
        .is_err());
        assert!(TriggerConfig::from_lookup(lookup(&[
            ("APP_BASE_URL", "https://unveil.test"),
            ("CRON_SECRET", "s3cret"),
            ("CRON_INTERVAL_SECS", "0"),
        ]))
        .is_err());
    }

    #[tokio::test]
    async fn test_trigger_once_returns_summary() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/cron/process-messages")
            .match_header("authorization", "Bearer s3cret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success":true,"processed":2,"sent":5,"failed":0,"errors":[]}"#)
            .create_async()
            .await;

        let url = format!("{}/api/cron/process-messages", server.url());
        let summary = trigger_once(&Client::new(), &url, "s3cret").await.unwrap();

        assert_eq!(summary["processed"], 2);
        assert_eq!(summary["sent"], 5);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_trigger_once_fails_on_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/cron/process-messages")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"Unauthorized"}"#)
            .create_async()
            .await;

        let url = format!("{}/api/cron/process-messages", server.url());
        let err = trigger_once(&Client::new(), &url, "wrong")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_trigger_once_fails_when_unreachable() {
        let result = trigger_once(
            &Client::new(),
            "http://127.0.0.1:9/api/cron/process-messages",
            "s3cret",
        )
        .await;

        assert!(result.is_err());
    }
}
