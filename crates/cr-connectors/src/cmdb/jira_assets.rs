//! Jira Assets (Insight) CMDB connector.
//!
//! Talks to the Insight REST API (`/rest/insight/1.0` on Server/Data Center,
//! or the Assets gateway URL on Cloud). The configured base URL must already
//! include that prefix.

use crate::http::{HttpClient, RateLimitConfig};
use crate::traits::{
    AttributeSlot, CatalogPage, CatalogQuery, CmdbConnector, Connector, ConnectorConfig,
    ConnectorError, ConnectorHealth, ConnectorResult, ObjectEntry,
};
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

/// Longest value accepted inside an AQL string literal.
const MAX_AQL_VALUE_LENGTH: usize = 255;

/// Escapes a value for use inside a double-quoted AQL string literal.
///
/// Backslashes and double quotes are escaped; control characters and
/// oversized values are rejected.
///
/// ```
/// use cr_connectors::cmdb::escape_aql_value;
///
/// assert_eq!(escape_aql_value(r#"db "primary""#).unwrap(), r#"db \"primary\""#);
/// ```
pub fn escape_aql_value(value: &str) -> ConnectorResult<String> {
    if value.len() > MAX_AQL_VALUE_LENGTH {
        return Err(ConnectorError::InvalidInput(format!(
            "AQL value exceeds {} bytes",
            MAX_AQL_VALUE_LENGTH
        )));
    }
    if value.chars().any(|c| c.is_control()) {
        return Err(ConnectorError::InvalidInput(
            "AQL value contains control characters".to_string(),
        ));
    }

    let mut escaped = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        if c == '"' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    Ok(escaped)
}

/// Jira Assets specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraAssetsConfig {
    /// Base connector configuration.
    #[serde(flatten)]
    pub connector: ConnectorConfig,
    /// Requests per minute allowed towards the API. `None` disables limiting.
    #[serde(default)]
    pub requests_per_minute: Option<u32>,
}

/// Jira Assets connector.
pub struct JiraAssetsConnector {
    config: JiraAssetsConfig,
    client: HttpClient,
}

/// Request body of the paginated navigation-list search.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NavlistRequest<'a> {
    object_type_id: &'a str,
    attributes_to_display: AttributesToDisplay<'a>,
    page: u32,
    asc: u8,
    results_per_page: u32,
    include_attributes: bool,
    object_schema_id: &'a str,
    ql_query: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AttributesToDisplay<'a> {
    attributes_to_display_ids: &'a [String],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateObjectRequest {
    attributes: Vec<AttributeSlot>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateObjectRequest<'a> {
    object_type_id: &'a str,
    attributes: Vec<AttributeSlot>,
}

#[derive(Debug, Deserialize)]
struct AqlResponse {
    #[serde(default)]
    values: Option<Vec<ObjectEntry>>,
}

impl JiraAssetsConnector {
    /// Creates a new Jira Assets connector.
    pub fn new(config: JiraAssetsConfig) -> ConnectorResult<Self> {
        let rate_limit = config.requests_per_minute.map(|rpm| RateLimitConfig {
            max_requests: rpm,
            period: std::time::Duration::from_secs(60),
            burst_size: rpm.clamp(1, 20),
        });

        let client = HttpClient::with_rate_limit(config.connector.clone(), rate_limit)?;

        info!(
            base_url = %config.connector.base_url,
            "Jira Assets connector initialized"
        );

        Ok(Self { config, client })
    }

    /// Builds the navigation-list request for a page of a catalog query.
    fn navlist_request<'a>(query: &'a CatalogQuery, page: u32) -> NavlistRequest<'a> {
        NavlistRequest {
            object_type_id: &query.object_type_id,
            attributes_to_display: AttributesToDisplay {
                attributes_to_display_ids: &query.display_attribute_ids,
            },
            page,
            asc: 1,
            results_per_page: query.results_per_page,
            include_attributes: false,
            object_schema_id: &query.schema_id,
            ql_query: format!(
                "objectType = \"{}\"",
                query.object_type_name.replace('"', "\\\"")
            ),
        }
    }
}

#[async_trait]
impl Connector for JiraAssetsConnector {
    fn name(&self) -> &str {
        &self.config.connector.name
    }

    fn connector_type(&self) -> &str {
        "cmdb"
    }

    async fn health_check(&self) -> ConnectorResult<ConnectorHealth> {
        match self.client.get_json::<Value>("/objectschema/list").await {
            Ok(_) => Ok(ConnectorHealth::Healthy),
            Err(ConnectorError::RetriesExhausted { last_error, .. }) => match *last_error {
                ConnectorError::AuthenticationFailed(_) => Ok(ConnectorHealth::Unhealthy(
                    "Authentication failed".to_string(),
                )),
                ConnectorError::ConnectionFailed(e) => Ok(ConnectorHealth::Unhealthy(format!(
                    "Connection failed: {}",
                    e
                ))),
                other => Ok(ConnectorHealth::Degraded(other.to_string())),
            },
            Err(e) => Ok(ConnectorHealth::Degraded(e.to_string())),
        }
    }
}

#[async_trait]
impl CmdbConnector for JiraAssetsConnector {
    #[instrument(skip(self, query), fields(object_type = %query.object_type_name))]
    async fn search_page(&self, query: &CatalogQuery, page: u32) -> ConnectorResult<CatalogPage> {
        let request = Self::navlist_request(query, page);
        let result: Option<CatalogPage> = self.client.post_json("/object/navlist/aql", &request).await?;
        let result = result.ok_or_else(|| {
            ConnectorError::InvalidResponse("empty navlist response".to_string())
        })?;
        debug!(
            page,
            total_pages = result.page_size,
            entries = result.object_entries.len(),
            "Fetched catalog page"
        );
        Ok(result)
    }

    #[instrument(skip(self))]
    async fn get_attributes(&self, object_id: &str) -> ConnectorResult<Vec<AttributeSlot>> {
        let slots: Option<Vec<AttributeSlot>> = self
            .client
            .get_json(&format!("/object/{}/attributes", object_id))
            .await?;
        Ok(slots.unwrap_or_default())
    }

    #[instrument(skip(self, attributes), fields(slots = attributes.len()))]
    async fn update_attributes(
        &self,
        object_id: &str,
        attributes: Vec<AttributeSlot>,
    ) -> ConnectorResult<()> {
        let request = UpdateObjectRequest { attributes };
        let _: Value = self
            .client
            .put_json(&format!("/object/{}", object_id), &request)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, attributes))]
    async fn create_object(
        &self,
        object_type_id: &str,
        attributes: Vec<AttributeSlot>,
    ) -> ConnectorResult<ObjectEntry> {
        let request = CreateObjectRequest {
            object_type_id,
            attributes,
        };
        let created: Option<ObjectEntry> = self.client.post_json("/object/create", &request).await?;
        let created = created.ok_or_else(|| {
            ConnectorError::InvalidResponse("object create returned no body".to_string())
        })?;
        info!(object_id = %created.id, "Created catalog object");
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn aql_search(
        &self,
        ql_query: &str,
        start_at: u32,
        max_results: u32,
    ) -> ConnectorResult<Vec<ObjectEntry>> {
        let body = serde_json::json!({ "qlQuery": ql_query });
        let response: Option<AqlResponse> = self
            .client
            .call(
                Method::POST,
                "/object/aql",
                Some(&body),
                &[
                    ("startAt", start_at.to_string()),
                    ("maxResults", max_results.to_string()),
                ],
            )
            .await?;
        Ok(response.and_then(|r| r.values).unwrap_or_default())
    }
}
