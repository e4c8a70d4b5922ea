//! Thin HTTP client against the daemon's `/api/*` surface (spec.md §6.1),
//! used by every CLI subcommand except `start`.

use serde_json::Value;

pub struct DaemonClient {
    base_url: String,
    http: reqwest::Client,
}

impl DaemonClient {
    #[must_use]
    pub fn new(port: u16) -> Self {
        Self {
            base_url: format!("http://127.0.0.1:{port}"),
            http: reqwest::Client::new(),
        }
    }

    pub async fn health(&self) -> anyhow::Result<Value> {
        self.get("/api/health").await
    }

    pub async fn index(&self) -> anyhow::Result<Value> {
        self.post_empty("/api/index").await
    }

    pub async fn search(&self, query: &str, search_type: Option<&str>, limit: i64) -> anyhow::Result<Value> {
        let mut url = format!("{}/api/search?q={}&limit={}", self.base_url, urlencode(query), limit);
        if let Some(search_type) = search_type {
            url.push_str(&format!("&search_type={search_type}"));
        }
        self.get_url(&url).await
    }

    pub async fn remember(&self, observation: &str, r#type: &str, tags: Vec<String>) -> anyhow::Result<Value> {
        let body = serde_json::json!({ "observation": observation, "type": r#type, "tags": tags });
        self.post("/api/search/memories/bulk", &body).await
    }

    pub async fn sessions(&self, limit: i64) -> anyhow::Result<Value> {
        self.get_url(&format!("{}/api/activity/sessions?limit={}", self.base_url, limit)).await
    }

    pub async fn backup_export(&self) -> anyhow::Result<Value> {
        self.post_empty("/api/backup/export").await
    }

    pub async fn backup_import(&self, sql: &str) -> anyhow::Result<()> {
        let body = serde_json::json!({ "sql": sql });
        let response = self.http.post(format!("{}/api/backup/import", self.base_url)).json(&body).send().await?;
        response.error_for_status()?;
        Ok(())
    }

    async fn get(&self, path: &str) -> anyhow::Result<Value> {
        self.get_url(&format!("{}{path}", self.base_url)).await
    }

    async fn get_url(&self, url: &str) -> anyhow::Result<Value> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    async fn post(&self, path: &str, body: &Value) -> anyhow::Result<Value> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn post_empty(&self, path: &str) -> anyhow::Result<Value> {
        let response = self.http.post(format!("{}{path}", self.base_url)).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}

fn urlencode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urlencode_leaves_unreserved_characters_alone() {
        assert_eq!(urlencode("abc-123_xyz.~"), "abc-123_xyz.~");
    }

    #[test]
    fn urlencode_percent_encodes_spaces_and_punctuation() {
        assert_eq!(urlencode("how does auth work?"), "how%20does%20auth%20work%3F");
    }

    #[test]
    fn new_client_targets_localhost_on_the_given_port() {
        let client = DaemonClient::new(5151);
        assert_eq!(client.base_url, "http://127.0.0.1:5151");
    }
}
