//! Scratch namespace layout.
//!
//! Every upload owns the prefix `<Key>-<UploadId>/` in both the scratch and
//! the overflow bucket:
//!
//! ```text
//! <Key>-<UploadId>/init                 init marker (session liveness)
//! <Key>-<UploadId>/parts/<PartNumber>   uploaded parts
//! <Key>-<UploadId>/pass1/<n>            first reduction level
//! <Key>-<UploadId>/pass2/<n>            second reduction level
//! <Key>-<UploadId>/overflow/<n>         survivors migrated to the overflow bucket
//! <Key>-<UploadId>/final                merged survivors
//! ```
//!
//! Part numbers are not zero-padded, so lexical listing order differs from
//! numeric order once part numbers reach two digits.

use std::fmt;

use mpustack_model::UploadSession;

/// Level tag of an intermediate compose node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LevelTag {
    /// Output of the first reduction pass.
    Pass1,
    /// Output of the second reduction pass.
    Pass2,
    /// Survivors rewritten into the overflow bucket.
    Overflow,
}

impl LevelTag {
    /// Path segment used for this level.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass1 => "pass1",
            Self::Pass2 => "pass2",
            Self::Overflow => "overflow",
        }
    }
}

impl fmt::Display for LevelTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key builder for one upload's scratch objects.
///
/// # Examples
///
/// ```
/// use mpustack_core::keys::{LevelTag, ScratchLayout};
///
/// let layout = ScratchLayout::new("photos/cat.jpg", "u1");
/// assert_eq!(layout.prefix(), "photos/cat.jpg-u1/");
/// assert_eq!(layout.init_marker(), "photos/cat.jpg-u1/init");
/// assert_eq!(layout.part(3), "photos/cat.jpg-u1/parts/3");
/// assert_eq!(layout.node(LevelTag::Pass2, 1), "photos/cat.jpg-u1/pass2/1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchLayout {
    prefix: String,
}

impl ScratchLayout {
    /// Build the layout for `key` and `upload_id`.
    #[must_use]
    pub fn new(key: &str, upload_id: &str) -> Self {
        Self {
            prefix: format!("{key}-{upload_id}/"),
        }
    }

    /// Build the layout for a session.
    #[must_use]
    pub fn for_session(session: &UploadSession) -> Self {
        Self::new(&session.key, &session.upload_id)
    }

    /// The prefix shared by every scratch object of the upload.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key of the init marker.
    #[must_use]
    pub fn init_marker(&self) -> String {
        format!("{}init", self.prefix)
    }

    /// Prefix under which parts are stored.
    #[must_use]
    pub fn parts_prefix(&self) -> String {
        format!("{}parts/", self.prefix)
    }

    /// Key of an uploaded part.
    #[must_use]
    pub fn part(&self, part_number: u32) -> String {
        format!("{}parts/{part_number}", self.prefix)
    }

    /// Key of the `sequence`-th (1-based) node of a level.
    #[must_use]
    pub fn node(&self, level: LevelTag, sequence: usize) -> String {
        format!("{}{level}/{sequence}", self.prefix)
    }

    /// Keys of nodes `1..=count` of a level, in sequence order.
    #[must_use]
    pub fn nodes(&self, level: LevelTag, count: usize) -> Vec<String> {
        (1..=count).map(|seq| self.node(level, seq)).collect()
    }

    /// Key of the merged object in the overflow bucket.
    #[must_use]
    pub fn final_object(&self) -> String {
        format!("{}final", self.prefix)
    }

    /// Parse a part number out of a key under [`parts_prefix`](Self::parts_prefix).
    #[must_use]
    pub fn parse_part_number(&self, key: &str) -> Option<u32> {
        key.strip_prefix(&self.parts_prefix())?.parse().ok()
    }
}
