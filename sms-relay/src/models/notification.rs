use serde::{Deserialize, Serialize};

pub const DEFAULT_TITLE: &str = "New Notification";
pub const DEFAULT_GROUP: &str = "Default";

/// Bark interruption level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Level {
    #[default]
    Active,
    TimeSensitive,
    Passive,
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Active => write!(f, "active"),
            Level::TimeSensitive => write!(f, "timeSensitive"),
            Level::Passive => write!(f, "passive"),
        }
    }
}

/// Optional fields layered on top of a notification body.
///
/// ```
/// use sms_relay::models::{Decorations, Level};
///
/// let decorations = Decorations::new()
///     .title("Door opened")
///     .group("Home")
///     .level(Level::TimeSensitive);
/// assert_eq!(decorations.level, Some(Level::TimeSensitive));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decorations {
    pub title: Option<String>,
    pub group: Option<String>,
    pub level: Option<Level>,
    /// Text copied to the clipboard when the notification is tapped.
    pub copy: Option<String>,
}

impl Decorations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Notifications sharing a group are stacked together on the device.
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn copy(mut self, text: impl Into<String>) -> Self {
        self.copy = Some(text.into());
        self
    }
}

/// A fully resolved notification, ready to be form-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub body: String,
    pub title: String,
    pub group: String,
    pub level: Level,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copy: Option<String>,
}

impl NotificationRequest {
    /// Merge `decorations` over the defaults. Empty strings count as absent.
    pub fn new(body: impl Into<String>, decorations: &Decorations) -> Self {
        Self {
            body: body.into(),
            title: present(&decorations.title).unwrap_or(DEFAULT_TITLE).to_string(),
            group: present(&decorations.group).unwrap_or(DEFAULT_GROUP).to_string(),
            level: decorations.level.unwrap_or_default(),
            copy: present(&decorations.copy).map(str::to_string),
        }
    }

    pub fn to_form(&self) -> Result<String, serde_urlencoded::ser::Error> {
        serde_urlencoded::to_string(self)
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn decode_form(form: &str) -> HashMap<String, String> {
        serde_urlencoded::from_str(form).unwrap()
    }

    #[test]
    fn omitted_decorations_take_defaults() {
        let request = NotificationRequest::new("hello", &Decorations::new());

        assert_eq!(request.title, "New Notification");
        assert_eq!(request.group, "Default");
        assert_eq!(request.level, Level::Active);
        assert_eq!(request.copy, None);
    }

    #[test]
    fn empty_strings_fall_back_to_defaults() {
        let decorations = Decorations::new().title("").group("").copy("");
        let request = NotificationRequest::new("hello", &decorations);

        assert_eq!(request.title, DEFAULT_TITLE);
        assert_eq!(request.group, DEFAULT_GROUP);
        assert_eq!(request.copy, None);
    }

    #[test]
    fn supplied_decorations_override_defaults() {
        let decorations = Decorations::new()
            .title("Alarm")
            .group("Home")
            .level(Level::Passive)
            .copy("1234");
        let request = NotificationRequest::new("hello", &decorations);

        assert_eq!(request.title, "Alarm");
        assert_eq!(request.group, "Home");
        assert_eq!(request.level, Level::Passive);
        assert_eq!(request.copy.as_deref(), Some("1234"));
    }

    #[test]
    fn form_encoding_uses_bark_field_names() {
        let body = "Line one\nLine two & more = 100%";
        let request =
            NotificationRequest::new(body, &Decorations::new().level(Level::TimeSensitive));
        let form = request.to_form().unwrap();

        assert!(form.contains("level=timeSensitive"));
        assert!(!form.contains("copy="));

        let fields = decode_form(&form);
        assert_eq!(fields["body"], body);
        assert_eq!(fields["title"], "New Notification");
        assert_eq!(fields["group"], "Default");
    }

    #[test]
    fn level_display_matches_wire_value() {
        assert_eq!(Level::Active.to_string(), "active");
        assert_eq!(Level::TimeSensitive.to_string(), "timeSensitive");
        assert_eq!(Level::Passive.to_string(), "passive");
    }
}
