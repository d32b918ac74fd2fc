use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

/// Social platforms with a built-in dataset mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Facebook,
    TikTok,
    Reddit,
    LinkedIn,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
            Platform::TikTok => "tiktok",
            Platform::Reddit => "reddit",
            Platform::LinkedIn => "linkedin",
        }
    }

    /// Infers the platform from a URL's host.
    ///
    /// Returns `None` for unrecognized hosts and for strings that do not
    /// parse as absolute URLs; callers fall back to an explicit platform
    /// parameter in that case.
    pub fn detect(url: &str) -> Option<Platform> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?.to_ascii_lowercase();
        let is = |domain: &str| host == domain || host.ends_with(&format!(".{domain}"));

        if is("instagram.com") {
            Some(Platform::Instagram)
        } else if is("facebook.com") || is("fb.com") {
            Some(Platform::Facebook)
        } else if is("tiktok.com") {
            Some(Platform::TikTok)
        } else if is("reddit.com") {
            Some(Platform::Reddit)
        } else if is("linkedin.com") {
            Some(Platform::LinkedIn)
        } else {
            None
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "instagram" => Ok(Platform::Instagram),
            "facebook" => Ok(Platform::Facebook),
            "tiktok" => Ok(Platform::TikTok),
            "reddit" => Ok(Platform::Reddit),
            "linkedin" => Ok(Platform::LinkedIn),
            other => Err(format!("Unknown platform: {other}")),
        }
    }
}

/// Built-in dataset registry: dataset key to Bright Data dataset id.
pub const DEFAULT_DATASET_IDS: &[(&str, &str)] = &[
    ("instagram_posts", "gd_lk5ns7kz21pck8jpis"),
    ("instagram_profiles", "gd_l1vikfch901nx3by4"),
    ("facebook_posts", "gd_lyclm20il4r5helnj"),
    ("facebook_profiles", "gd_lkaxegm826bjpoo9m5"),
    ("tiktok_posts", "gd_lu702nij2f790tmv9h"),
    ("tiktok_profiles", "gd_l1villgoiiidt09ci"),
    ("reddit_posts", "gd_lvz8ah06191smkebj4"),
    ("reddit_comments", "gd_lvzdpsdlw09j6t702"),
    ("linkedin_profiles", "gd_l1viktl72bvl7bjuj0"),
    ("linkedin_posts", "gd_lyy3tktm25m4avu764"),
    ("linkedin_companies", "gd_l1vikfnt1wgvvqz95w"),
];

/// Looks up the built-in dataset id for a dataset key.
pub fn default_dataset_id(key: &str) -> Option<&'static str> {
    DEFAULT_DATASET_IDS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, id)| *id)
}

/// Resolves a dataset key to a dataset id.
///
/// Precedence: configured override, then the built-in registry, then the
/// key itself (so raw `gd_*` ids pass straight through).
pub fn resolve_dataset_id<'a>(overrides: &'a HashMap<String, String>, key: &'a str) -> &'a str {
    if let Some(id) = overrides.get(key) {
        return id.as_str();
    }
    default_dataset_id(key).unwrap_or(key)
}
