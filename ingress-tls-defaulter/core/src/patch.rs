use crate::ChangeSet;
use json_patch::{jsonptr::PointerBuf, AddOperation, Patch, PatchOperation, ReplaceOperation};
use k8s_openapi::api::networking::v1::IngressSpec;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{trace, warn};

/// A single operation against one sub-tree of the Ingress.
///
/// Each variant replaces its sub-tree wholesale; the policy only ever fills
/// in fields, so positional array patches are never needed.
#[derive(Clone, Debug, PartialEq)]
pub enum PatchEntry {
    Spec(IngressSpec),
    Annotations(BTreeMap<String, String>),
    /// Annotations for an Ingress that had no annotation map. `replace`
    /// requires its target to exist, so this is encoded as `add`.
    NewAnnotations(BTreeMap<String, String>),
}

#[derive(Debug, Error)]
#[error("failed to serialize {path}: {source}")]
pub struct EncodeError {
    path: &'static str,
    #[source]
    source: serde_json::Error,
}

/// Collects patch entries in order and encodes them as a JSON Patch.
#[derive(Clone, Debug, Default)]
pub struct PatchBuilder {
    entries: Vec<PatchEntry>,
}

// === impl PatchEntry ===

impl PatchEntry {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Spec(_) => "/spec",
            Self::Annotations(_) | Self::NewAnnotations(_) => "/metadata/annotations",
        }
    }

    fn tokens(&self) -> &'static [&'static str] {
        match self {
            Self::Spec(_) => &["spec"],
            Self::Annotations(_) | Self::NewAnnotations(_) => &["metadata", "annotations"],
        }
    }

    pub fn encode(&self) -> Result<PatchOperation, EncodeError> {
        let value = match self {
            Self::Spec(spec) => serde_json::to_value(spec),
            Self::Annotations(annotations) | Self::NewAnnotations(annotations) => {
                serde_json::to_value(annotations)
            }
        }
        .map_err(|source| EncodeError {
            path: self.path(),
            source,
        })?;

        let path = PointerBuf::from_tokens(self.tokens().iter().copied());
        Ok(match self {
            Self::NewAnnotations(_) => PatchOperation::Add(AddOperation { path, value }),
            Self::Spec(_) | Self::Annotations(_) => {
                PatchOperation::Replace(ReplaceOperation { path, value })
            }
        })
    }
}

// === impl PatchBuilder ===

impl PatchBuilder {
    /// Adds an entry for each sub-tree the policy modified.
    pub fn from_changes(changes: &ChangeSet) -> Self {
        let mut builder = Self::default();
        if changes.spec_changed {
            let spec = changes.ingress.spec.clone().unwrap_or_default();
            builder.push(PatchEntry::Spec(spec));
        }
        if changes.annotations_changed {
            let annotations = changes
                .ingress
                .metadata
                .annotations
                .clone()
                .unwrap_or_default();
            builder.push(if changes.annotations_created {
                PatchEntry::NewAnnotations(annotations)
            } else {
                PatchEntry::Annotations(annotations)
            });
        }
        builder
    }

    pub fn push(&mut self, entry: PatchEntry) -> &mut Self {
        self.entries.push(entry);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encodes every entry. An entry that cannot be serialized is logged and
    /// left out; the remaining entries are still returned.
    pub fn build(self) -> Patch {
        let ops = self
            .entries
            .iter()
            .filter_map(|entry| match entry.encode() {
                Ok(op) => Some(op),
                Err(error) => {
                    warn!(%error, "Could not serialize patch entry");
                    None
                }
            })
            .collect::<Vec<_>>();
        trace!(?ops);
        Patch(ops)
    }
}
