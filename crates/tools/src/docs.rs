//! `get_docs`: site-scoped web search over a small set of library docs.

use std::time::Duration;

use async_trait::async_trait;
use gamedex_core::config::SearchConfig;
use gamedex_core::tooling::{ToolDescriptor, NO_DOCUMENTATION_FOUND};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::html::html_to_text;
use crate::registry::Tool;
use crate::{parse_args, ToolError, ToolResult};

pub const TOOL_NAME: &str = "get_docs";
pub const FETCH_TIMEOUT_TEXT: &str = "Timeout error";

const USER_AGENT: &str = "gamedex-docs/0.1";

pub const SUPPORTED_LIBRARIES: [(&str, &str); 3] = [
    ("langchain", "python.langchain.com/docs"),
    ("llama-index", "docs.llamaindex.ai/en/stable"),
    ("openai", "platform.openai.com/docs"),
];

pub fn library_site(library: &str) -> Option<&'static str> {
    SUPPORTED_LIBRARIES.iter().find(|(name, _)| *name == library).map(|(_, site)| *site)
}

pub struct DocsTool {
    client: Client,
    endpoint: String,
    api_key: Option<SecretString>,
    results_per_query: u32,
}

#[derive(Debug, Deserialize)]
struct DocsInput {
    query: String,
    library: String,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    q: &'a str,
    num: u32,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    link: String,
}

impl DocsTool {
    pub fn from_config(config: &SearchConfig) -> ToolResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|error| ToolError::Upstream(error.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            results_per_query: config.results_per_query,
        })
    }

    async fn search(&self, query: &str) -> ToolResult<Vec<SearchHit>> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| ToolError::NotConfigured("search.api_key is not set".to_string()))?;

        let result = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", api_key.expose_secret())
            .json(&SearchRequest { q: query, num: self.results_per_query })
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(error) if error.is_timeout() => {
                warn!(event_name = "docs.search.timeout", query, "web search timed out");
                return Ok(Vec::new());
            }
            Err(error) => return Err(ToolError::Upstream(format!("web search failed: {error}"))),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Upstream(format!("web search returned {status}")));
        }

        let decoded: SearchResponse = response
            .json()
            .await
            .map_err(|error| ToolError::Upstream(format!("web search response: {error}")))?;
        Ok(decoded.organic)
    }

    async fn fetch_page(&self, url: &str) -> ToolResult<String> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(error) if error.is_timeout() => return Ok(FETCH_TIMEOUT_TEXT.to_string()),
            Err(error) => return Err(ToolError::Upstream(format!("fetching {url} failed: {error}"))),
        };

        match response.text().await {
            Ok(body) => Ok(html_to_text(&body)),
            Err(error) if error.is_timeout() => Ok(FETCH_TIMEOUT_TEXT.to_string()),
            Err(error) => Err(ToolError::Upstream(format!("reading {url} failed: {error}"))),
        }
    }
}

#[async_trait]
impl Tool for DocsTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: TOOL_NAME.to_string(),
            description: "Search the latest docs for a given query and library. Supports langchain, openai, and llama-index.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The query to search for (e.g. \"Chroma DB\")"
                    },
                    "library": {
                        "type": "string",
                        "description": "The library to search in (e.g. \"langchain\")",
                        "enum": SUPPORTED_LIBRARIES.iter().map(|(name, _)| *name).collect::<Vec<_>>()
                    }
                },
                "required": ["query", "library"]
            }),
        }
    }

    async fn call(&self, args: Value) -> ToolResult<String> {
        let input: DocsInput = parse_args(TOOL_NAME, args)?;
        let site = library_site(&input.library).ok_or_else(|| {
            ToolError::Unsupported(format!("Library {} not supported by this tool", input.library))
        })?;

        let hits = self.search(&site_query(site, &input.query)).await?;
        debug!(event_name = "docs.search.completed", library = %input.library, hits = hits.len());
        if hits.is_empty() {
            return Ok(NO_DOCUMENTATION_FOUND.to_string());
        }

        let mut pages = Vec::with_capacity(hits.len());
        for hit in &hits {
            pages.push(self.fetch_page(&hit.link).await?);
        }
        Ok(pages.join("\n\n"))
    }
}

fn site_query(site: &str, query: &str) -> String {
    format!("site:{site} {query}")
}

#[cfg(test)]
mod tests {
    use gamedex_core::config::SearchConfig;
    use serde_json::json;

    use super::{library_site, site_query, DocsTool, SearchResponse};
    use crate::registry::Tool;
    use crate::ToolError;

    fn unconfigured_tool() -> DocsTool {
        DocsTool::from_config(&SearchConfig {
            api_key: None,
            endpoint: "http://127.0.0.1:9/search".to_string(),
            results_per_query: 2,
            timeout_secs: 1,
        })
        .expect("client builds")
    }

    #[test]
    fn known_libraries_map_to_doc_sites() {
        assert_eq!(library_site("langchain"), Some("python.langchain.com/docs"));
        assert_eq!(library_site("llama-index"), Some("docs.llamaindex.ai/en/stable"));
        assert_eq!(library_site("openai"), Some("platform.openai.com/docs"));
        assert_eq!(library_site("pandas"), None);
    }

    #[test]
    fn search_query_is_site_scoped() {
        assert_eq!(
            site_query("platform.openai.com/docs", "Streaming API"),
            "site:platform.openai.com/docs Streaming API"
        );
    }

    #[test]
    fn search_response_without_organic_results_is_empty() {
        let decoded: SearchResponse =
            serde_json::from_value(json!({"searchParameters": {"q": "x"}})).expect("decode");
        assert!(decoded.organic.is_empty());
    }

    #[tokio::test]
    async fn unsupported_library_is_rejected_before_searching() {
        let error = unconfigured_tool()
            .call(json!({"query": "DataFrame", "library": "pandas"}))
            .await
            .expect_err("pandas is unsupported");

        assert_eq!(
            error,
            ToolError::Unsupported("Library pandas not supported by this tool".to_string())
        );
    }

    #[tokio::test]
    async fn missing_search_key_is_reported() {
        let error = unconfigured_tool()
            .call(json!({"query": "Chroma DB", "library": "langchain"}))
            .await
            .expect_err("no api key");
        assert!(matches!(error, ToolError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn missing_arguments_are_invalid_input() {
        let error = unconfigured_tool().call(json!({"query": "x"})).await.expect_err("no library");
        assert!(error.is_caller_error());
    }

    #[test]
    fn descriptor_lists_supported_libraries() {
        let descriptor = unconfigured_tool().descriptor();
        assert_eq!(
            descriptor.input_schema["properties"]["library"]["enum"],
            json!(["langchain", "llama-index", "openai"])
        );
    }
}
