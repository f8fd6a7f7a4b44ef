//! Typed results of the protocol commands the crate relies on.

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;

use crate::identifiers::TargetId;

// ============================================================================
// Target
// ============================================================================

/// One entry of `Target.getTargets`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    /// Target ID.
    pub target_id: TargetId,
    /// Target type (`page`, `iframe`, `service_worker`, ...).
    #[serde(rename = "type")]
    pub target_type: String,
    /// Title.
    #[serde(default)]
    pub title: String,
    /// Current URL.
    #[serde(default)]
    pub url: String,
    /// Whether some client is already attached.
    #[serde(default)]
    pub attached: bool,
}

impl TargetInfo {
    /// Returns `true` for page targets.
    #[inline]
    #[must_use]
    pub fn is_page(&self) -> bool {
        self.target_type == "page"
    }
}

// ============================================================================
// Navigation History
// ============================================================================

/// Result of `Page.getNavigationHistory`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationHistory {
    /// Index of the current entry.
    pub current_index: i64,
    /// All entries, oldest first.
    #[serde(default)]
    pub entries: Vec<NavigationEntry>,
}

/// One history entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationEntry {
    /// Entry ID.
    pub id: i64,
    /// Entry URL.
    pub url: String,
}

impl NavigationHistory {
    /// Returns the entry immediately before the current one.
    #[must_use]
    pub fn previous(&self) -> Option<&NavigationEntry> {
        let index = usize::try_from(self.current_index.checked_sub(1)?).ok()?;
        self.entries.get(index)
    }
}

// ============================================================================
// Browser Version
// ============================================================================

/// Result of `Browser.getVersion`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserVersion {
    /// Protocol version.
    #[serde(default)]
    pub protocol_version: String,
    /// Product, e.g. `HeadlessChrome/120.0.6099.71` or `Firefox/115.0`.
    #[serde(default)]
    pub product: String,
    /// Browser revision.
    #[serde(default)]
    pub revision: String,
    /// User agent.
    #[serde(default)]
    pub user_agent: String,
    /// JavaScript engine version.
    #[serde(default)]
    pub js_version: String,
}

// ============================================================================
// Resource Tree
// ============================================================================

/// Frame node of `Page.getResourceTree`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameResourceTree {
    /// Frame description.
    pub frame: FrameDescriptor,
    /// Child frames.
    #[serde(default)]
    pub child_frames: Vec<FrameResourceTree>,
    /// Resources loaded by this frame.
    #[serde(default)]
    pub resources: Vec<FrameResource>,
}

/// Frame description inside the resource tree.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameDescriptor {
    /// Frame ID.
    pub id: String,
    /// Document URL.
    #[serde(default)]
    pub url: String,
    /// Document MIME type.
    #[serde(default)]
    pub mime_type: String,
}

/// Resource inside the resource tree.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameResource {
    /// Resource URL.
    pub url: String,
    /// Resource type (`Script`, `Stylesheet`, ...).
    #[serde(rename = "type")]
    pub resource_type: String,
    /// MIME type.
    #[serde(default)]
    pub mime_type: String,
}

// ============================================================================
// Tests
// ============================================================================
