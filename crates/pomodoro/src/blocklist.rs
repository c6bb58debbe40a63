//! Block template generation
//!
//! The block is a self-contained chunk of hosts-file text. It is generated
//! byte-for-byte identically from the same site list, so the patcher can find
//! and remove it again with a plain substring search.

use std::fmt;

/// First line of the inserted block
pub const BEGIN_MARKER: &str = "### Pomodoro CLI - Begin Blocked sites ###";

/// Last line of the inserted block
pub const END_MARKER: &str = "### Pomodoro CLI - End Blocked sites ###";

/// Address every blocked name resolves to
pub const LOOPBACK: &str = "127.0.0.1";

/// Generated hosts-file block for a list of sites
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTemplate {
    text: String,
}

impl BlockTemplate {
    /// Build the block for the given sites, in order.
    ///
    /// Callers filter out empty entries first (see [`normalize`]); an empty
    /// list still yields a valid, marker-only block.
    pub fn build<S: AsRef<str>>(sites: &[S]) -> Self {
        let mut text = String::new();
        text.push('\n');
        text.push_str(BEGIN_MARKER);
        text.push('\n');
        for site in sites {
            let site = site.as_ref();
            text.push_str(&format!("{LOOPBACK} {site}\n{LOOPBACK} www.{site}\n"));
        }
        text.push_str(END_MARKER);
        text.push('\n');
        Self { text }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }
}

impl fmt::Display for BlockTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Split a comma-separated site list, trimming and dropping empty entries
pub fn parse(list: &str) -> Vec<String> {
    normalize(list.split(','))
}

/// Trim entries and drop the empty or whitespace-only ones
pub fn normalize<I, S>(sites: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    sites
        .into_iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Whether the list asks for any blocking at all.
///
/// `[]` and `[""]` both mean "no blocking requested".
pub fn has_sites<S: AsRef<str>>(sites: &[S]) -> bool {
    sites.iter().any(|s| !s.as_ref().trim().is_empty())
}
