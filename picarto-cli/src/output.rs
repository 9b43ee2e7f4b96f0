use crate::error::Result;
use chrono::Local;
#[cfg(feature = "colored-output")]
use colored::*;
use picarto_watch::{ArtistNotification, MonitorEvent};
use serde::Serialize;

/// JSON shape of a `check` result.
#[derive(Debug, Serialize)]
struct CheckReport<'a> {
    artist: &'a str,
    online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    observed_at: Option<String>,
}

pub struct OutputManager {
    colored: bool,
    json: bool,
}

impl OutputManager {
    pub fn new(colored: bool, json: bool) -> Self {
        Self { colored, json }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    pub fn format_check_started(&self, artist: &str) -> String {
        format!("Checking if {} is online...", artist)
    }

    pub fn format_check_result(
        &self,
        artist: &str,
        notification: Option<&ArtistNotification>,
    ) -> Result<String> {
        if self.json {
            let report = CheckReport {
                artist,
                online: notification.is_some(),
                observed_at: notification.map(|n| n.observed_at.to_rfc3339()),
            };
            return Ok(serde_json::to_string(&report)?);
        }

        Ok(match notification {
            Some(_) => format!("{} is online!", self.colorize(artist, &Color::Green, true)),
            None => format!("{} is not online :(", self.colorize(artist, &Color::Yellow, false)),
        })
    }

    pub fn format_notification(&self, notification: &ArtistNotification) -> Result<String> {
        if self.json {
            return Ok(serde_json::to_string(notification)?);
        }
        Ok(format!(
            "[{}] {} is online!",
            self.colorize(
                &notification
                    .observed_at
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
                &Color::Cyan,
                false
            ),
            self.colorize(&notification.name, &Color::Green, true)
        ))
    }

    pub fn format_event(&self, event: &MonitorEvent) -> Result<String> {
        if self.json {
            return Ok(serde_json::to_string(event)?);
        }
        let color = if event.is_failure() {
            Color::Red
        } else {
            Color::Blue
        };
        Ok(self.colorize(&event.description(), &color, false))
    }

    fn colorize(&self, text: &str, color: &Color, bold: bool) -> String {
        #[cfg(feature = "colored-output")]
        {
            if self.colored {
                let colored_text = match color {
                    Color::Green => text.green(),
                    Color::Yellow => text.yellow(),
                    Color::Blue => text.blue(),
                    Color::Cyan => text.cyan(),
                    Color::Red => text.red(),
                };
                if bold {
                    colored_text.bold().to_string()
                } else {
                    colored_text.to_string()
                }
            } else {
                text.to_string()
            }
        }

        #[cfg(not(feature = "colored-output"))]
        {
            let _ = (color, bold, self.colored);
            text.to_string()
        }
    }
}

enum Color {
    Green,
    Yellow,
    Blue,
    Cyan,
    Red,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_pretty() {
        let output = OutputManager::new(false, false);
        let notification = ArtistNotification::now("alice");
        assert_eq!(
            output
                .format_check_result("alice", Some(&notification))
                .unwrap(),
            "alice is online!"
        );
        assert_eq!(
            output.format_check_result("alice", None).unwrap(),
            "alice is not online :("
        );
    }

    #[test]
    fn test_check_result_json() {
        let output = OutputManager::new(false, true);
        let line = output.format_check_result("bob", None).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["artist"], "bob");
        assert_eq!(value["online"], false);
        assert!(value.get("observed_at").is_none());
    }

    #[test]
    fn test_notification_json_line() {
        let output = OutputManager::new(false, true);
        let line = output
            .format_notification(&ArtistNotification::now("carol"))
            .unwrap();
        assert!(!line.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["name"], "carol");
    }

    #[test]
    fn test_notification_pretty_mentions_artist() {
        let output = OutputManager::new(false, false);
        let line = output
            .format_notification(&ArtistNotification::now("carol"))
            .unwrap();
        assert!(line.ends_with("carol is online!"));
    }
}
