//! `search_game_info`: structured game lookup against the IGDB v4 API.
//!
//! IGDB authenticates through Twitch client credentials. The access token is
//! fetched on first use and cached until IGDB rejects it.

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use gamedex_core::config::IgdbConfig;
use gamedex_core::tooling::ToolDescriptor;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::registry::Tool;
use crate::{parse_args, ToolError, ToolResult};

pub const TOOL_NAME: &str = "search_game_info";
pub const NO_GAME_FOUND: &str = "No game found.";

const GAME_FIELDS: &str = "name,storyline,first_release_date,genres.name,rating,involved_companies.company.name,similar_games.name";
const SIMILAR_GAMES_SHOWN: usize = 3;

pub struct GameInfoTool {
    client: Client,
    client_id: String,
    client_secret: SecretString,
    token_url: String,
    api_url: String,
    token: Mutex<Option<SecretString>>,
}

#[derive(Debug, Deserialize)]
struct GameInfoInput {
    game_name: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct IgdbGame {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub storyline: Option<String>,
    #[serde(default)]
    pub first_release_date: Option<i64>,
    #[serde(default)]
    pub genres: Vec<Named>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub involved_companies: Vec<InvolvedCompany>,
    #[serde(default)]
    pub similar_games: Vec<Named>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Named {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct InvolvedCompany {
    pub company: Named,
}

impl GameInfoTool {
    pub fn from_config(config: &IgdbConfig) -> ToolResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| ToolError::Upstream(error.to_string()))?;

        Ok(Self {
            client,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            token_url: config.token_url.clone(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> ToolResult<SecretString> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let response = self
            .client
            .post(&self.token_url)
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .map_err(|error| ToolError::Upstream(format!("token request failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Upstream(format!("token endpoint returned {status}")));
        }

        let decoded: TokenResponse = response
            .json()
            .await
            .map_err(|error| ToolError::Upstream(format!("token response: {error}")))?;

        info!(event_name = "igdb.token.acquired", "fetched igdb access token");
        let token = SecretString::from(decoded.access_token);
        *cached = Some(token.clone());
        Ok(token)
    }

    async fn search(&self, game_name: &str) -> ToolResult<Vec<IgdbGame>> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(format!("{}/games", self.api_url))
            .header("Client-ID", &self.client_id)
            .bearer_auth(token.expose_secret())
            .body(search_body(game_name))
            .send()
            .await
            .map_err(|error| ToolError::Upstream(format!("igdb request failed: {error}")))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            *self.token.lock().await = None;
            return Err(ToolError::Upstream("igdb rejected the access token".to_string()));
        }
        if !status.is_success() {
            return Err(ToolError::Upstream(format!("igdb returned {status}")));
        }

        response
            .json()
            .await
            .map_err(|error| ToolError::Upstream(format!("igdb response: {error}")))
    }
}

#[async_trait]
impl Tool for GameInfoTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: TOOL_NAME.to_string(),
            description: "Get information about a video game from IGDB.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "game_name": {
                        "type": "string",
                        "description": "The name of the game to search for."
                    }
                },
                "required": ["game_name"]
            }),
        }
    }

    async fn call(&self, args: Value) -> ToolResult<String> {
        let input: GameInfoInput = parse_args(TOOL_NAME, args)?;
        let games = self.search(&input.game_name).await?;
        debug!(event_name = "igdb.search.completed", game_name = %input.game_name, hits = games.len());

        Ok(games.first().map(format_game_summary).unwrap_or_else(|| NO_GAME_FOUND.to_string()))
    }
}

pub fn search_body(game_name: &str) -> String {
    let escaped = game_name.replace('\\', "\\\\").replace('"', "\\\"");
    format!("search \"{escaped}\"; fields {GAME_FIELDS}; limit 1;")
}

pub fn format_game_summary(game: &IgdbGame) -> String {
    let released = game
        .first_release_date
        .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "N/A".to_string());

    let mut parts = vec![
        format!("🎮 **{}**", game.name.as_deref().unwrap_or("Unknown")),
        format!("📅 Released: {released}"),
    ];

    if !game.genres.is_empty() {
        parts.push(format!("🎭 Genres: {}", join_names(game.genres.iter())));
    }
    if !game.involved_companies.is_empty() {
        let companies = join_names(game.involved_companies.iter().map(|entry| &entry.company));
        parts.push(format!("🏢 Developers: {companies}"));
    }
    if let Some(rating) = game.rating.filter(|rating| *rating > 0.0) {
        parts.push(format!("⭐ Rating: {rating:.1}"));
    }
    if let Some(storyline) = game.storyline.as_deref().filter(|text| !text.trim().is_empty()) {
        parts.push(format!("\n📝 Storyline: {storyline}"));
    }
    if !game.similar_games.is_empty() {
        let similar = join_names(game.similar_games.iter().take(SIMILAR_GAMES_SHOWN));
        parts.push(format!("\n🔗 Similar Games: {similar}"));
    }

    parts.join("\n")
}

fn join_names<'a>(names: impl Iterator<Item = &'a Named>) -> String {
    names.map(|named| named.name.as_str()).collect::<Vec<_>>().join(", ")
}
