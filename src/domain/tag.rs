use git2::Oid;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::git::{Repository, TagInfo};

/// Structured payload stored in the body of a release tag.
///
/// Serialized as TOML key/values so that the same parser can read tags
/// created by earlier releases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TagPayload {
    version: String,
    #[serde(rename = "buildNumber", skip_serializing_if = "Option::is_none")]
    build_number: Option<u64>,
}

/// The parsed body of an annotated release tag.
///
/// `Legacy` covers free-text or otherwise unparseable tag bodies; it is an
/// explicit variant rather than a swallowed parse error, and always reads as
/// version `"0"` with build number `0`.
#[derive(Debug, Clone, PartialEq)]
pub enum TagMessage {
    Structured {
        version: String,
        build_number: Option<u64>,
    },
    Legacy,
}

impl TagMessage {
    /// Parse a tag body. Never fails: anything that is not a structured
    /// release message is `Legacy`.
    pub fn parse(body: &str) -> TagMessage {
        match toml::from_str::<TagPayload>(body) {
            Ok(payload) => TagMessage::Structured {
                version: payload.version,
                build_number: payload.build_number,
            },
            Err(_) => TagMessage::Legacy,
        }
    }

    /// Serialize the message for storage as a tag body
    pub fn encode(&self) -> String {
        let payload = match self {
            TagMessage::Structured {
                version,
                build_number,
            } => TagPayload {
                version: version.clone(),
                build_number: *build_number,
            },
            TagMessage::Legacy => TagPayload {
                version: "0".to_string(),
                build_number: None,
            },
        };
        // A two-field struct with string/int values always serializes
        toml::to_string(&payload).unwrap_or_default()
    }
}

/// A structured, round-trippable release tag.
///
/// Before materialization the target is `None`; once saved (or parsed from an
/// existing tag) it points at the tagged commit.
#[derive(Debug, Clone)]
pub struct AnnotatedReleaseTag {
    name: String,
    message: TagMessage,
    target: Option<Oid>,
}

impl AnnotatedReleaseTag {
    /// Build an in-memory tag that has not been persisted yet.
    ///
    /// The build number is written into the message only when build numbers
    /// are in use for this release.
    pub fn create(
        name: impl Into<String>,
        version: impl Into<String>,
        build_number: u64,
        use_build_number: bool,
    ) -> Self {
        let name = name.into();
        assert!(!name.trim().is_empty(), "tag name must not be blank");
        AnnotatedReleaseTag {
            name,
            message: TagMessage::Structured {
                version: version.into(),
                build_number: use_build_number.then_some(build_number),
            },
            target: None,
        }
    }

    /// Parse an existing tag. Legacy or malformed bodies fall back to the
    /// `Legacy` message rather than failing.
    pub fn from_existing(info: &TagInfo) -> Self {
        assert!(!info.name.trim().is_empty(), "tag name must not be blank");
        AnnotatedReleaseTag {
            name: info.name.clone(),
            message: TagMessage::parse(&info.message),
            target: Some(info.target),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> &TagMessage {
        &self.message
    }

    /// The version recorded in the tag body; `"0"` for legacy tags
    pub fn version(&self) -> &str {
        match &self.message {
            TagMessage::Structured { version, .. } => version,
            TagMessage::Legacy => "0",
        }
    }

    /// The build number recorded in the tag body; `0` when absent
    pub fn build_number(&self) -> u64 {
        match &self.message {
            TagMessage::Structured { build_number, .. } => build_number.unwrap_or(0),
            TagMessage::Legacy => 0,
        }
    }

    /// The tagged commit, once known
    pub fn target(&self) -> Option<Oid> {
        self.target
    }

    /// Create the physical annotated tag at the repository's current HEAD.
    ///
    /// Callers must pre-check for name collisions; this does not.
    pub fn save_at_head(&mut self, repo: &dyn Repository) -> Result<Oid> {
        let oid = repo.create_annotated_tag(&self.name, &self.message.encode())?;
        self.target = Some(oid);
        Ok(oid)
    }
}

// Two tags are the same tag iff their names are equal, whatever the bodies say.
impl PartialEq for AnnotatedReleaseTag {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for AnnotatedReleaseTag {}
