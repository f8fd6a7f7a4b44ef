//! Resource enumeration over the frame tree.

use serde_json::json;

use crate::error::Result;
use crate::protocol::FrameResourceTree;
use crate::session::Session;

/// One resource loaded by the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    /// Resource URL.
    pub url: String,
    /// Resource type, `Document` for frame documents.
    pub resource_type: String,
    /// MIME type.
    pub mime_type: String,
    /// Frame that loaded the resource.
    pub frame_id: String,
}

/// Lists resources of the page and its frames.
#[derive(Debug, Clone)]
pub struct Resources {
    session: Session,
}

impl Resources {
    pub(crate) fn new(session: Session) -> Self {
        Self { session }
    }

    /// Returns every frame document and resource, depth-first.
    ///
    /// # Errors
    ///
    /// Returns the protocol error, or a parse error for a malformed tree.
    pub async fn list(&self) -> Result<Vec<ResourceInfo>> {
        let result = self.session.send("Page.getResourceTree", json!({})).await?;
        let tree: FrameResourceTree =
            serde_json::from_value(result.get("frameTree").cloned().unwrap_or_default())?;

        let mut out = Vec::new();
        flatten(&tree, &mut out);
        Ok(out)
    }
}

fn flatten(tree: &FrameResourceTree, out: &mut Vec<ResourceInfo>) {
    out.push(ResourceInfo {
        url: tree.frame.url.clone(),
        resource_type: "Document".to_string(),
        mime_type: tree.frame.mime_type.clone(),
        frame_id: tree.frame.id.clone(),
    });

    out.extend(tree.resources.iter().map(|resource| ResourceInfo {
        url: resource.url.clone(),
        resource_type: resource.resource_type.clone(),
        mime_type: resource.mime_type.clone(),
        frame_id: tree.frame.id.clone(),
    }));

    for child in &tree.child_frames {
        flatten(child, out);
    }
}
