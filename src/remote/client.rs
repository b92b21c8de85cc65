use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::{RemoteError, SnapshotService};
use crate::config::RemoteConfig;

#[derive(Serialize)]
struct CreateRequest<'a> {
    records: [NewRecord<'a>; 1],
}

#[derive(Serialize)]
struct NewRecord<'a> {
    fields: SnapshotFields<'a>,
}

#[derive(Serialize)]
struct SnapshotFields<'a> {
    #[serde(rename = "cardID")]
    card_id: &'a str,
    json: &'a str,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    records: Vec<ListedRecord>,
}

#[derive(Deserialize)]
struct ListedRecord {
    #[serde(default)]
    fields: ListedFields,
}

#[derive(Default, Deserialize)]
struct ListedFields {
    json: Option<String>,
}

/// REST client for a table-store base holding one snapshot per record.
#[cfg_attr(test, derive(Debug))]
pub struct TableStoreClient {
    client: Client,
    table_url: Url,
    token: String,
}

impl TableStoreClient {
    pub fn from_config(config: &RemoteConfig) -> Result<Self, RemoteError> {
        if !config.is_configured() {
            return Err(RemoteError::MissingConfig("base id and table name are required"));
        }
        let token = config
            .resolved_token()
            .ok_or(RemoteError::MissingConfig("no access token"))?;
        let mut table_url = Url::parse(&config.base_url)
            .map_err(|_| RemoteError::MissingConfig("base url is not a valid URL"))?;
        table_url
            .path_segments_mut()
            .map_err(|_| RemoteError::MissingConfig("base url cannot carry a path"))?
            .pop_if_empty()
            .push(config.base_id.trim())
            .push(config.table.trim());
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            client,
            table_url,
            token,
        })
    }

    pub fn table_url(&self) -> &Url {
        &self.table_url
    }
}

impl SnapshotService for TableStoreClient {
    fn publish(&self, name: &str, json: &str) -> Result<(), RemoteError> {
        let body = CreateRequest {
            records: [NewRecord {
                fields: SnapshotFields {
                    card_id: name,
                    json,
                },
            }],
        };
        let resp = self
            .client
            .post(self.table_url.clone())
            .bearer_auth(&self.token)
            .json(&body)
            .send()?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().unwrap_or_default();
            tracing::error!(status, body = %body, "snapshot publish rejected");
            return Err(RemoteError::Http { status, body });
        }
        tracing::info!(name, "published snapshot");
        Ok(())
    }

    fn fetch_latest(&self) -> Result<String, RemoteError> {
        let resp = self
            .client
            .get(self.table_url.clone())
            .bearer_auth(&self.token)
            .query(&[
                ("maxRecords", "1"),
                ("sort[0][field]", "createdTime"),
                ("sort[0][direction]", "desc"),
            ])
            .send()?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().unwrap_or_default();
            tracing::error!(status, body = %body, "snapshot fetch rejected");
            return Err(RemoteError::Http { status, body });
        }
        let listing: ListResponse = resp.json()?;
        let latest = listing
            .records
            .into_iter()
            .next()
            .ok_or(RemoteError::NoRecords)?;
        latest
            .fields
            .json
            .filter(|raw| !raw.is_empty())
            .ok_or(RemoteError::MissingJson)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn config() -> RemoteConfig {
        RemoteConfig {
            base_id: "appXYZ".into(),
            table: "Daily Snapshots".into(),
            token: Some("pat-test".into()),
            ..RemoteConfig::default()
        }
    }

    #[test]
    fn table_url_escapes_table_name() -> anyhow::Result<()> {
        let client = TableStoreClient::from_config(&config())?;
        assert_eq!(
            client.table_url().as_str(),
            "https://api.airtable.com/v0/appXYZ/Daily%20Snapshots"
        );
        Ok(())
    }

    #[test]
    fn missing_base_is_a_config_error() {
        let mut cfg = config();
        cfg.base_id.clear();
        assert_matches!(
            TableStoreClient::from_config(&cfg),
            Err(RemoteError::MissingConfig(_))
        );
    }

    #[test]
    fn publish_body_matches_table_fields() -> anyhow::Result<()> {
        let body = CreateRequest {
            records: [NewRecord {
                fields: SnapshotFields {
                    card_id: "2025-06-10 07:05:07",
                    json: "{}",
                },
            }],
        };
        assert_eq!(
            serde_json::to_string(&body)?,
            r#"{"records":[{"fields":{"cardID":"2025-06-10 07:05:07","json":"{}"}}]}"#
        );
        Ok(())
    }
}
