//! Asset catalog (CMDB) connectors.

mod jira_assets;
mod mock;

pub use jira_assets::{escape_aql_value, JiraAssetsConfig, JiraAssetsConnector};
pub use mock::{MockCmdbConnector, MockObject};
