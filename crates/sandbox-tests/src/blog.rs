//! Minimal blog engine used as the application under test

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use sandbox_lib::{HookCallback, HostServices, HttpRequest, SqliteConnection};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS posts (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    title        TEXT NOT NULL,
    body         TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    publish_at   TEXT,
    published    INTEGER NOT NULL DEFAULT 0
);
";

/// Hooks the blog fires
pub mod hooks {
    pub const POST_TITLE: &str = "post_title";
    pub const POST_CREATED: &str = "post_created";
    pub const POST_PUBLISHED: &str = "post_published";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub publish_at: Option<DateTime<Utc>>,
    pub published: bool,
}

/// One entry of a remote JSON feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub title: String,
    #[serde(default)]
    pub body: String,
}

/// Create the blog tables
pub fn install(storage: &SqliteConnection) -> Result<()> {
    storage.execute_batch(SCHEMA)?;
    Ok(())
}

pub struct Blog<'a, H: HostServices<Storage = SqliteConnection>> {
    host: &'a H,
}

impl<'a, H: HostServices<Storage = SqliteConnection>> Blog<'a, H> {
    pub fn new(host: &'a H) -> Self {
        Self { host }
    }

    /// Register the blog's own filters
    pub fn register_default_filters(&self) {
        self.host.hooks().add_filter(
            hooks::POST_TITLE,
            HookCallback::new("trim_title", |args| {
                Ok(json!(args[0].as_str().unwrap_or_default().trim()))
            }),
            10,
        );
    }

    pub fn site_name(&self) -> Result<String> {
        let name = self.host.functions().call("get_option", &[json!("blogname")])?;
        Ok(name.as_str().unwrap_or_default().to_string())
    }

    /// Insert a post, filtering its title and announcing it to subscribers
    pub fn create_post(&self, title: &str, body: &str) -> Result<i64> {
        let title = self
            .host
            .hooks()
            .apply_filters(hooks::POST_TITLE, json!(title), &[])?;
        let title = title.as_str().context("post_title filter must return a string")?;
        if title.is_empty() {
            bail!("Post title must not be empty");
        }

        let now = self.host.clock().now();
        let conn = self.host.storage().inner();
        conn.execute(
            "INSERT INTO posts (title, body, created_at) VALUES (?1, ?2, ?3)",
            params![title, body, now.to_rfc3339()],
        )?;
        let id = conn.last_insert_rowid();

        self.host.hooks().do_action(hooks::POST_CREATED, &[json!(id)])?;
        self.host
            .functions()
            .call("notify_subscribers", &[json!(id), json!(title)])?;
        Ok(id)
    }

    pub fn post(&self, id: i64) -> Result<Option<Post>> {
        let row = self
            .host
            .storage()
            .inner()
            .query_row(
                "SELECT id, title, body, created_at, publish_at, published FROM posts WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, bool>(5)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id, title, body, created_at, publish_at, published)| {
            Ok(Post {
                id,
                title,
                body,
                created_at: parse_time(&created_at)?,
                publish_at: publish_at.as_deref().map(parse_time).transpose()?,
                published,
            })
        })
        .transpose()
    }

    pub fn count(&self) -> Result<i64> {
        Ok(self
            .host
            .storage()
            .inner()
            .query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?)
    }

    pub fn schedule(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let updated = self.host.storage().inner().execute(
            "UPDATE posts SET publish_at = ?1 WHERE id = ?2",
            params![at.to_rfc3339(), id],
        )?;
        if updated == 0 {
            bail!("No post with id {id}");
        }
        Ok(())
    }

    /// Publish every scheduled post whose time has come
    pub fn publish_due(&self) -> Result<Vec<i64>> {
        let now = self.host.clock().now();
        let conn = self.host.storage().inner();

        let due: Vec<(i64, String)> = {
            let mut stmt = conn.prepare(
                "SELECT id, publish_at FROM posts WHERE published = 0 AND publish_at IS NOT NULL ORDER BY id",
            )?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let mut published = Vec::new();
        for (id, publish_at) in due {
            if parse_time(&publish_at)? <= now {
                conn.execute("UPDATE posts SET published = 1 WHERE id = ?1", params![id])?;
                self.host.hooks().do_action(hooks::POST_PUBLISHED, &[json!(id)])?;
                published.push(id);
            }
        }
        Ok(published)
    }

    /// Fetch a JSON feed and create one post per item
    pub fn import_feed(&self, url: &str) -> Result<Vec<i64>> {
        let response = self
            .host
            .http()
            .send(&HttpRequest::get(url).with_header("accept", "application/json"))?;
        if !response.is_success() {
            bail!("Feed {url} answered {}", response.status);
        }

        let items: Vec<FeedItem> = serde_json::from_value(response.json_body()?)
            .with_context(|| format!("Feed {url} is not a list of posts"))?;
        items
            .iter()
            .map(|item| self.create_post(&item.title, &item.body))
            .collect()
    }
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid stored timestamp '{raw}'"))?
        .with_timezone(&Utc))
}

/// Shape of a subscriber notification, as the live implementation logs it
pub fn notification(id: i64, title: &str) -> Value {
    json!({ "post": id, "title": title })
}
