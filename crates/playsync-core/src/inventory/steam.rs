//! Steam Web API owned-games client.
//!
//! Fetches the owned-games list, optionally counts unlocked achievements per
//! game, and flattens each game into a [`LocalRecord`] with these fields:
//! `Game Name`, `AppID`, `Playtime Hours`, `Playtime Minutes`, `Last Played`,
//! `Banner`, `Icon`, `Logo`, and `Achievements Unlocked`/`Achievements Total`
//! when the game has achievement stats.

use async_trait::async_trait;
use chrono::{Local, TimeZone};
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::SteamConfig;
use crate::inventory::InventorySource;
use crate::models::LocalRecord;
use crate::sync::Pacer;
use crate::util::compact_text;
use crate::{Error, Result};

const STEAM_CDN: &str = "https://steamcdn-a.akamaihd.net";
const UNKNOWN_GAME: &str = "Unknown Game";

#[derive(Debug, Clone, Deserialize)]
struct OwnedGamesEnvelope {
    #[serde(default)]
    response: OwnedGamesResponse,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct OwnedGamesResponse {
    #[serde(default)]
    games: Vec<OwnedGame>,
}

/// One entry of `IPlayerService/GetOwnedGames`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OwnedGame {
    pub appid: u64,
    #[serde(default)]
    pub name: Option<String>,
    /// Total playtime in minutes
    #[serde(default)]
    pub playtime_forever: u64,
    /// Unix seconds; zero when never played
    #[serde(default)]
    pub rtime_last_played: Option<i64>,
    #[serde(default)]
    pub img_icon_url: Option<String>,
    #[serde(default)]
    pub img_logo_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AchievementCounts {
    pub unlocked: usize,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
struct AchievementsEnvelope {
    playerstats: PlayerStats,
}

#[derive(Debug, Deserialize)]
struct PlayerStats {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    achievements: Option<Vec<Achievement>>,
}

#[derive(Debug, Deserialize)]
struct Achievement {
    #[serde(default)]
    achieved: u8,
}

#[derive(Debug, Clone)]
pub struct SteamClient {
    config: SteamConfig,
    client: reqwest::Client,
}

impl SteamClient {
    pub fn new(config: SteamConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|error| Error::Config(format!("failed to build HTTP client: {error}")))?;
        Ok(Self { config, client })
    }

    /// Owned games exactly as Steam reports them, free-to-play titles included.
    pub async fn owned_games(&self) -> Result<Vec<OwnedGame>> {
        let url = format!(
            "{}/IPlayerService/GetOwnedGames/v1/",
            self.config.api_url
        );
        let request = self.client.get(url).query(&[
            ("key", self.config.api_key.as_str()),
            ("steamid", self.config.user_id.as_str()),
            ("include_appinfo", "true"),
            ("include_played_free_games", "true"),
        ]);
        let envelope: OwnedGamesEnvelope = read_json(send(request).await?).await?;
        tracing::info!(games = envelope.response.games.len(), "Fetched owned games");
        Ok(envelope.response.games)
    }

    /// Achievement counts for one game, or `None` when it has no stats.
    pub async fn achievements(&self, app_id: u64) -> Result<Option<AchievementCounts>> {
        let url = format!(
            "{}/ISteamUserStats/GetPlayerAchievements/v1/",
            self.config.api_url
        );
        let app_id = app_id.to_string();
        let request = self.client.get(url).query(&[
            ("appid", app_id.as_str()),
            ("key", self.config.api_key.as_str()),
            ("steamid", self.config.user_id.as_str()),
        ]);
        let envelope: AchievementsEnvelope = read_json(send(request).await?).await?;
        Ok(achievement_counts(&envelope.playerstats))
    }

    /// Fetch, enrich and convert every owned game, longest played first.
    pub async fn fetch_records(&self) -> Result<Vec<LocalRecord>> {
        let mut games = self.owned_games().await?;
        sort_by_playtime(&mut games);

        let mut pacer = Pacer::new(self.config.achievement_delay);
        let mut records = Vec::with_capacity(games.len());
        for game in &games {
            let achievements = if self.config.include_achievements {
                pacer.wait().await;
                match self.achievements(game.appid).await {
                    Ok(counts) => counts,
                    Err(error) => {
                        tracing::debug!(app_id = game.appid, error = %error, "No achievement data");
                        None
                    }
                }
            } else {
                None
            };
            records.push(game_record(game, achievements, &Local));
        }
        Ok(records)
    }
}

#[async_trait]
impl InventorySource for SteamClient {
    async fn fetch(&self) -> Result<Vec<LocalRecord>> {
        self.fetch_records().await
    }
}

async fn send(request: reqwest::RequestBuilder) -> Result<Response> {
    // Request URLs carry the API key.
    let response = request.send().await.map_err(|error| Error::from(error.without_url()))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        compact_text(&body)
    };
    Err(Error::api(status.as_u16(), message))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response
        .text()
        .await
        .map_err(|error| Error::from(error.without_url()))?;
    serde_json::from_str(&body)
        .map_err(|error| Error::Decode(format!("{error}; body: {}", compact_text(&body))))
}

fn achievement_counts(stats: &PlayerStats) -> Option<AchievementCounts> {
    if !stats.success {
        return None;
    }
    let achievements = stats.achievements.as_ref()?;
    Some(AchievementCounts {
        unlocked: achievements
            .iter()
            .filter(|achievement| achievement.achieved == 1)
            .count(),
        total: achievements.len(),
    })
}

/// Longest total playtime first; ties keep Steam's order.
pub fn sort_by_playtime(games: &mut [OwnedGame]) {
    games.sort_by(|left, right| right.playtime_forever.cmp(&left.playtime_forever));
}

/// Hours rounded to one decimal place.
#[allow(clippy::cast_precision_loss)]
fn playtime_hours(minutes: u64) -> f64 {
    (minutes as f64 / 60.0 * 10.0).round() / 10.0
}

/// Last-played time rendered in `timezone` without an offset.
fn last_played<Tz: TimeZone>(seconds: Option<i64>, timezone: &Tz) -> Option<String> {
    let seconds = seconds.filter(|seconds| *seconds > 0)?;
    timezone
        .timestamp_opt(seconds, 0)
        .single()
        .map(|timestamp| timestamp.naive_local().format("%Y-%m-%dT%H:%M:%S").to_string())
}

fn image_url(app_id: u64, hash: Option<&str>) -> Option<String> {
    hash.map(str::trim)
        .filter(|hash| !hash.is_empty())
        .map(|hash| format!("{STEAM_CDN}/steamcommunity/public/images/apps/{app_id}/{hash}.jpg"))
}

pub fn banner_url(app_id: u64) -> String {
    format!("{STEAM_CDN}/steam/apps/{app_id}/header.jpg")
}

/// Flatten one game into a record, rendering times in `timezone`.
pub fn game_record<Tz: TimeZone>(
    game: &OwnedGame,
    achievements: Option<AchievementCounts>,
    timezone: &Tz,
) -> LocalRecord {
    let name = game
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(UNKNOWN_GAME);

    let mut record = LocalRecord::new()
        .with("Game Name", name)
        .with("AppID", game.appid)
        .with("Playtime Hours", playtime_hours(game.playtime_forever))
        .with("Playtime Minutes", game.playtime_forever)
        .with("Last Played", last_played(game.rtime_last_played, timezone))
        .with("Banner", banner_url(game.appid))
        .with("Icon", image_url(game.appid, game.img_icon_url.as_deref()))
        .with("Logo", image_url(game.appid, game.img_logo_url.as_deref()));

    if let Some(counts) = achievements {
        record.insert("Achievements Unlocked", counts.unlocked as u64);
        record.insert("Achievements Total", counts.total as u64);
    }
    record
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::models::FieldValue;
    use pretty_assertions::assert_eq;

    fn owned(appid: u64, name: &str, minutes: u64) -> OwnedGame {
        OwnedGame {
            appid,
            name: Some(name.to_string()),
            playtime_forever: minutes,
            rtime_last_played: None,
            img_icon_url: None,
            img_logo_url: None,
        }
    }

    #[test]
    fn game_record_flattens_steam_fields() {
        let game = OwnedGame {
            rtime_last_played: Some(1_704_103_200),
            img_icon_url: Some("abc123".to_string()),
            img_logo_url: Some(String::new()),
            ..owned(620, "Portal 2", 1278)
        };
        let record = game_record(
            &game,
            Some(AchievementCounts {
                unlocked: 51,
                total: 51,
            }),
            &Utc,
        );

        let expected = LocalRecord::new()
            .with("Game Name", "Portal 2")
            .with("AppID", 620_u64)
            .with("Playtime Hours", 21.3)
            .with("Playtime Minutes", 1278_u64)
            .with("Last Played", "2024-01-01T10:00:00")
            .with("Banner", "https://steamcdn-a.akamaihd.net/steam/apps/620/header.jpg")
            .with(
                "Icon",
                "https://steamcdn-a.akamaihd.net/steamcommunity/public/images/apps/620/abc123.jpg",
            )
            .with("Logo", FieldValue::Null)
            .with("Achievements Unlocked", 51_u64)
            .with("Achievements Total", 51_u64);
        assert_eq!(record, expected);
    }

    #[test]
    fn unplayed_games_have_no_last_played_or_achievements() {
        let game = OwnedGame {
            rtime_last_played: Some(0),
            name: None,
            ..owned(400, "", 0)
        };
        let record = game_record(&game, None, &Utc);

        assert_eq!(record.get("Game Name"), Some(&FieldValue::from("Unknown Game")));
        assert_eq!(record.get("Last Played"), Some(&FieldValue::Null));
        assert_eq!(record.get("Playtime Hours"), Some(&FieldValue::from(0.0)));
        assert!(!record.contains("Achievements Total"));
    }

    #[test]
    fn sorts_longest_played_first_and_keeps_ties_stable() {
        let mut games = vec![
            owned(1, "a", 10),
            owned(2, "b", 500),
            owned(3, "c", 10),
        ];
        sort_by_playtime(&mut games);
        let order = games.iter().map(|game| game.appid).collect::<Vec<_>>();
        assert_eq!(order, vec![2, 1, 3]);
    }

    #[test]
    fn achievement_counts_require_success_and_list() {
        let stats: AchievementsEnvelope = serde_json::from_str(
            r#"{ "playerstats": { "success": true, "achievements": [
                { "apiname": "a", "achieved": 1 },
                { "apiname": "b", "achieved": 0 },
                { "apiname": "c", "achieved": 1 }
            ] } }"#,
        )
        .unwrap();
        assert_eq!(
            achievement_counts(&stats.playerstats),
            Some(AchievementCounts {
                unlocked: 2,
                total: 3
            })
        );

        let no_stats: AchievementsEnvelope =
            serde_json::from_str(r#"{ "playerstats": { "success": true } }"#).unwrap();
        assert_eq!(achievement_counts(&no_stats.playerstats), None);

        let failed: AchievementsEnvelope = serde_json::from_str(
            r#"{ "playerstats": { "success": false, "error": "Requested app has no stats" } }"#,
        )
        .unwrap();
        assert_eq!(achievement_counts(&failed.playerstats), None);
    }

    #[test]
    fn playtime_hours_round_to_one_decimal() {
        assert_eq!(playtime_hours(90), 1.5);
        assert_eq!(playtime_hours(1278), 21.3);
        assert_eq!(playtime_hours(1), 0.0);
    }

    /// Answer each request by the first route whose path prefix matches.
    async fn spawn_steam_server(routes: Vec<(&'static str, &'static str, &'static str)>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test server");
        let address = listener.local_addr().expect("local address");

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request_buffer = [0_u8; 4096];
                let read = socket.read(&mut request_buffer).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&request_buffer[..read]).to_string();
                let path = request.split_whitespace().nth(1).unwrap_or_default().to_string();

                let (status_line, body) = routes
                    .iter()
                    .find(|(prefix, _, _)| path.starts_with(prefix))
                    .map_or(("404 Not Found", ""), |(_, status, body)| (*status, *body));
                let response = format!(
                    "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });

        format!("http://{address}")
    }

    fn config(api_url: String, include_achievements: bool) -> SteamConfig {
        SteamConfig {
            api_key: "steam-key".to_string(),
            user_id: "76561198000000000".to_string(),
            api_url,
            timeout: Duration::from_secs(5),
            include_achievements,
            achievement_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn fetch_records_sorts_and_tolerates_achievement_failures() {
        let url = spawn_steam_server(vec![
            (
                "/IPlayerService/GetOwnedGames/v1/",
                "200 OK",
                r#"{ "response": { "game_count": 2, "games": [
                    { "appid": 10, "name": "Counter-Strike", "playtime_forever": 30 },
                    { "appid": 620, "name": "Portal 2", "playtime_forever": 1278 }
                ] } }"#,
            ),
            (
                "/ISteamUserStats/GetPlayerAchievements/v1/?appid=620",
                "200 OK",
                r#"{ "playerstats": { "success": true, "achievements": [{ "achieved": 1 }] } }"#,
            ),
            (
                "/ISteamUserStats/GetPlayerAchievements/v1/",
                "400 Bad Request",
                r#"{ "playerstats": { "error": "Requested app has no stats", "success": false } }"#,
            ),
        ])
        .await;
        let client = SteamClient::new(config(url, true)).unwrap();

        let records = client.fetch().await.unwrap();
        let names = records
            .iter()
            .map(|record| record.get("Game Name").map(FieldValue::to_text))
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![Some("Portal 2".to_string()), Some("Counter-Strike".to_string())]
        );
        assert_eq!(records[0].get("Achievements Total"), Some(&FieldValue::from(1_u64)));
        assert!(!records[1].contains("Achievements Total"));
    }

    #[tokio::test]
    async fn owned_games_errors_do_not_leak_api_key() {
        let url = spawn_steam_server(vec![(
            "/IPlayerService/GetOwnedGames/v1/",
            "403 Forbidden",
            "<html><body>Access is denied</body></html>",
        )])
        .await;
        let client = SteamClient::new(config(url, false)).unwrap();

        let err = client.owned_games().await.unwrap_err();
        assert_eq!(err.status_code(), Some(403));
        assert!(!err.to_string().contains("steam-key"));

        let unreachable = SteamClient::new(config("http://127.0.0.1:1".to_string(), false)).unwrap();
        let err = unreachable.owned_games().await.unwrap_err();
        assert!(err.is_transient());
        assert!(!err.to_string().contains("steam-key"));
    }

    #[tokio::test]
    #[ignore = "requires STEAM_API_KEY and STEAM_USER_ID for a live account"]
    async fn live_owned_games() {
        let _ = dotenvy::dotenv();
        let client = SteamClient::new(SteamConfig::from_env().expect("steam config")).unwrap();
        let games = client.owned_games().await.unwrap();
        assert!(!games.is_empty());
    }
}
