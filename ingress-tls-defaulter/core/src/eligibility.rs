use crate::{AdmissionRequest, SkipKind, CLUSTER_ISSUER_ANNOTATION};
use k8s_openapi::{api::networking::v1::Ingress, Resource};
use kube::core::{admission::Operation, DynamicObject};
use tracing::{info, warn};

/// Whether an admission request should be mutated.
#[derive(Debug)]
pub enum Eligibility {
    Eligible(Ingress),
    Skip(SkipReason),
}

/// Why a request passes through without a patch.
#[derive(Debug)]
pub enum SkipReason {
    Kind { kind: String, operation: Operation },
    Operation { kind: String, operation: Operation },
    MissingObject,
    Malformed(serde_json::Error),
    IssuerOverride { name: String, issuer: String },
}

// === impl Eligibility ===

impl Eligibility {
    /// Applies the filter rules in order, stopping at the first that fails.
    pub fn of(req: &AdmissionRequest) -> Self {
        let kind = &req.kind.kind;
        if kind != Ingress::KIND {
            return Self::Skip(SkipReason::Kind {
                kind: kind.clone(),
                operation: req.operation.clone(),
            });
        }

        if !matches!(req.operation, Operation::Create) {
            return Self::Skip(SkipReason::Operation {
                kind: kind.clone(),
                operation: req.operation.clone(),
            });
        }

        let ingress = match req.object.as_ref().map(parse_ingress) {
            Some(Ok(ingress)) => ingress,
            Some(Err(error)) => return Self::Skip(SkipReason::Malformed(error)),
            None => return Self::Skip(SkipReason::MissingObject),
        };

        let issuer = ingress
            .metadata
            .annotations
            .as_ref()
            .and_then(|annotations| annotations.get(CLUSTER_ISSUER_ANNOTATION));
        if let Some(issuer) = issuer {
            return Self::Skip(SkipReason::IssuerOverride {
                name: ingress.metadata.name.clone().unwrap_or_default(),
                issuer: issuer.clone(),
            });
        }

        Self::Eligible(ingress)
    }
}

fn parse_ingress(obj: &DynamicObject) -> serde_json::Result<Ingress> {
    serde_json::to_value(obj).and_then(serde_json::from_value)
}

// === impl SkipReason ===

impl SkipReason {
    pub fn kind(&self) -> SkipKind {
        match self {
            Self::Kind { .. } => SkipKind::Kind,
            Self::Operation { .. } => SkipKind::Operation,
            Self::MissingObject | Self::Malformed(_) => SkipKind::Malformed,
            Self::IssuerOverride { .. } => SkipKind::IssuerOverride,
        }
    }

    pub(crate) fn log(&self) {
        match self {
            Self::Kind { kind, operation } | Self::Operation { kind, operation } => {
                info!(%kind, ?operation, "Skipping admission request");
            }
            Self::MissingObject => {
                warn!("Admission request missing object, skipping");
            }
            Self::Malformed(error) => {
                warn!(%error, "Failed to parse Ingress from admission request, skipping");
            }
            Self::IssuerOverride { name, issuer } => {
                info!(%name, %issuer, "Issuer already specified, skipping automatic setup");
            }
        }
    }
}
