use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Title, narration script and search terms for one video.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPackage {
    pub title: String,
    pub script: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self) -> anyhow::Result<ContentPackage>;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    topic: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(api_key: String, model: String, topic: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            topic,
        }
    }

    fn prompt(&self) -> String {
        let subject = match &self.topic {
            Some(t) => format!("about \"{}\"", t),
            None => "about a surprising, little-known fact".to_string(),
        };
        format!(
            "Write a vertical short-form video {subject}. The narration must take about 35 seconds \
             to read aloud and be made of short, complete sentences. Reply with a JSON object with \
             the keys: \"title\" (under 90 characters), \"script\" (the narration text), \
             \"keyPoints\" (up to 5 short stock-photo search terms, most important first), \
             \"description\" (one or two sentences) and \"tags\" (up to 10 keywords)."
        )
    }
}

#[async_trait]
impl ContentGenerator for OpenAiGenerator {
    async fn generate(&self) -> anyhow::Result<ContentPackage> {
        info!("Requesting script from {}", self.model);
        let body = json!({
            "model": self.model,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": "You write scripts for short narrated videos." },
                { "role": "user", "content": self.prompt() },
            ],
        });
        let res: ChatResponse = self
            .client
            .post(OPENAI_CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = res
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("completion has no message content")?;
        debug!("Raw completion: {}", content);
        parse_content_package(&content)
    }
}

/// Parses the generator's JSON reply. Markdown code fences around the object
/// are tolerated. Missing description and tags are filled from the script and
/// key points.
pub fn parse_content_package(raw: &str) -> anyhow::Result<ContentPackage> {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        text = rest.strip_suffix("```").unwrap_or(rest).trim();
    }
    let mut package: ContentPackage =
        serde_json::from_str(text).context("generator reply is not a valid content package")?;

    package.title = package.title.trim().to_string();
    package.script = package.script.trim().to_string();
    if package.script.is_empty() {
        anyhow::bail!("generator returned an empty script");
    }
    if package.title.is_empty() {
        anyhow::bail!("generator returned an empty title");
    }
    package.key_points = package
        .key_points
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
    if package.description.trim().is_empty() {
        package.description = package.script.clone();
    }
    if package.tags.is_empty() {
        package.tags = package.key_points.clone();
    }
    Ok(package)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let pkg = parse_content_package(
            r#"{"title":" Octopus facts ","script":"Octopuses have three hearts.","keyPoints":["octopus"," ","ocean"],"description":"Hearts.","tags":["sea"]}"#,
        )
        .unwrap();
        assert_eq!(pkg.title, "Octopus facts");
        assert_eq!(pkg.key_points, vec!["octopus", "ocean"]);
        assert_eq!(pkg.tags, vec!["sea"]);
    }

    #[test]
    fn tolerates_code_fences_and_fills_defaults() {
        let raw = "```json\n{\"title\":\"T\",\"script\":\"S one. S two.\",\"keyPoints\":[\"a\"]}\n```";
        let pkg = parse_content_package(raw).unwrap();
        assert_eq!(pkg.description, "S one. S two.");
        assert_eq!(pkg.tags, vec!["a"]);
    }

    #[test]
    fn rejects_empty_script() {
        assert!(parse_content_package(r#"{"title":"T","script":"   "}"#).is_err());
        assert!(parse_content_package("not json").is_err());
    }
}
