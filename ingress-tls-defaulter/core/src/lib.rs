#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Defaults TLS and DNS settings on newly created Ingresses.
//!
//! Each admission request flows through three stages: the [`Eligibility`]
//! filter decides whether the request is ours to mutate, [`apply_policy`]
//! computes the mutated Ingress, and the [`PatchBuilder`] encodes the edits
//! as a JSON Patch. The process never denies a request.

mod config;
mod eligibility;
mod patch;
mod policy;

pub use self::{
    config::PolicyConfig,
    eligibility::{Eligibility, SkipReason},
    patch::{EncodeError, PatchBuilder, PatchEntry},
    policy::{apply_policy, ChangeSet},
};
pub use k8s_openapi::api::networking::v1::{Ingress, IngressRule, IngressSpec, IngressTLS};
pub use kube::core::{admission::Operation, DynamicObject};

use tracing::{debug, info, warn};

pub type AdmissionRequest = kube::core::admission::AdmissionRequest<DynamicObject>;
pub type AdmissionResponse = kube::core::admission::AdmissionResponse;
pub type AdmissionReview = kube::core::admission::AdmissionReview<DynamicObject>;

/// Annotation read by cert-manager to pick the `ClusterIssuer` for an Ingress.
pub const CLUSTER_ISSUER_ANNOTATION: &str = "cert-manager.io/cluster-issuer";

/// Appended to the Ingress name to form the default TLS secret name.
pub const TLS_SECRET_SUFFIX: &str = "-tls";

/// The result of running a single admission request through the policy.
#[derive(Clone, Debug)]
pub struct Mutation {
    pub response: AdmissionResponse,
    pub patch: Option<json_patch::Patch>,
    pub outcome: Outcome,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The request was not eligible for mutation.
    Skipped(SkipKind),
    /// The Ingress already satisfied the policy.
    Unchanged,
    /// A patch with the given number of operations was attached.
    Patched(usize),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SkipKind {
    Kind,
    Operation,
    Malformed,
    IssuerOverride,
}

/// Runs an admission request through the policy, producing a response that
/// always allows the request.
pub fn mutate(req: &AdmissionRequest, config: &PolicyConfig) -> Mutation {
    let response = AdmissionResponse::from(req);

    let ingress = match Eligibility::of(req) {
        Eligibility::Eligible(ingress) => ingress,
        Eligibility::Skip(reason) => {
            reason.log();
            return Mutation {
                response,
                patch: None,
                outcome: Outcome::Skipped(reason.kind()),
            };
        }
    };

    let changes = apply_policy(ingress, config);
    debug!(
        spec_changed = changes.spec_changed,
        annotations_changed = changes.annotations_changed,
        "Applied policy"
    );

    let patch = PatchBuilder::from_changes(&changes).build();
    if patch.0.is_empty() {
        return Mutation {
            response,
            patch: None,
            outcome: Outcome::Unchanged,
        };
    }

    let count = patch.0.len();
    match response.clone().with_patch(patch.clone()) {
        Ok(response) => {
            info!(
                name = %changes.name(),
                patches = count,
                "Applying patches in response"
            );
            Mutation {
                response,
                patch: Some(patch),
                outcome: Outcome::Patched(count),
            }
        }
        Err(error) => {
            warn!(%error, "Could not serialize patch");
            Mutation {
                response,
                patch: None,
                outcome: Outcome::Unchanged,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    pub(crate) fn request(kind: &str, operation: &str, object: Value) -> AdmissionRequest {
        let review: AdmissionReview = serde_json::from_value(json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
                "kind": { "group": "networking.k8s.io", "version": "v1", "kind": kind },
                "resource": { "group": "networking.k8s.io", "version": "v1", "resource": "ingresses" },
                "name": "web",
                "namespace": "default",
                "operation": operation,
                "userInfo": { "username": "admin" },
                "object": object,
                "dryRun": false,
            }
        }))
        .expect("review must parse");
        review.try_into().expect("review must contain a request")
    }

    pub(crate) fn ingress(annotations: Value, spec: Value) -> Value {
        json!({
            "apiVersion": "networking.k8s.io/v1",
            "kind": "Ingress",
            "metadata": {
                "name": "web",
                "namespace": "default",
                "annotations": annotations,
            },
            "spec": spec,
        })
    }

    fn config() -> PolicyConfig {
        PolicyConfig::new("example.com", "letsencrypt-prod")
    }

    fn response_json(mutation: &Mutation) -> Value {
        serde_json::to_value(&mutation.response).expect("response must serialize")
    }

    #[test]
    fn skips_other_kinds() {
        let req = request(
            "Service",
            "CREATE",
            json!({ "apiVersion": "v1", "kind": "Service", "metadata": { "name": "web" } }),
        );
        let mutation = mutate(&req, &config());
        assert_eq!(mutation.outcome, Outcome::Skipped(SkipKind::Kind));
        assert!(mutation.patch.is_none());

        let rsp = response_json(&mutation);
        assert_eq!(rsp["uid"], "705ab4f5-6393-11e8-b7cc-42010a800002");
        assert_eq!(rsp["allowed"], true);
        assert!(rsp.get("patch").is_none());
        assert!(rsp.get("patchType").is_none());
    }

    #[test]
    fn skips_updates() {
        let obj = ingress(json!({}), json!({ "rules": [{ "host": "foo" }] }));
        let mutation = mutate(&request("Ingress", "UPDATE", obj), &config());
        assert_eq!(mutation.outcome, Outcome::Skipped(SkipKind::Operation));
        assert_eq!(response_json(&mutation)["allowed"], true);
    }

    #[test]
    fn skips_malformed_ingress() {
        let obj = ingress(json!({}), json!({ "rules": "not-a-list" }));
        let mutation = mutate(&request("Ingress", "CREATE", obj), &config());
        assert_eq!(mutation.outcome, Outcome::Skipped(SkipKind::Malformed));

        let rsp = response_json(&mutation);
        assert_eq!(rsp["uid"], "705ab4f5-6393-11e8-b7cc-42010a800002");
        assert_eq!(rsp["allowed"], true);
        assert!(rsp.get("patch").is_none());
    }

    #[test]
    fn skips_explicit_issuer() {
        let obj = ingress(
            json!({ "cert-manager.io/cluster-issuer": "internal-ca" }),
            json!({ "rules": [{ "host": "foo" }] }),
        );
        let mutation = mutate(&request("Ingress", "CREATE", obj), &config());
        assert_eq!(mutation.outcome, Outcome::Skipped(SkipKind::IssuerOverride));
        assert!(response_json(&mutation).get("patch").is_none());
    }

    #[test]
    fn patches_eligible_ingress() {
        let obj = ingress(
            json!({ "team": "web" }),
            json!({ "rules": [{ "host": "foo" }, { "host": "bar.example.com" }] }),
        );
        let mutation = mutate(&request("Ingress", "CREATE", obj), &config());
        assert_eq!(mutation.outcome, Outcome::Patched(2));

        let rsp = response_json(&mutation);
        assert_eq!(rsp["uid"], "705ab4f5-6393-11e8-b7cc-42010a800002");
        assert_eq!(rsp["allowed"], true);
        assert_eq!(rsp["patchType"], "JSONPatch");
        assert!(rsp.get("patch").is_some());

        let patch = serde_json::to_value(mutation.patch.expect("patch must be set"))
            .expect("patch must serialize");
        assert_eq!(
            patch,
            json!([
                {
                    "op": "replace",
                    "path": "/spec",
                    "value": {
                        "rules": [{ "host": "foo.example.com" }, { "host": "bar.example.com" }],
                        "tls": [{
                            "hosts": ["foo.example.com", "bar.example.com"],
                            "secretName": "web-tls",
                        }],
                    },
                },
                {
                    "op": "replace",
                    "path": "/metadata/annotations",
                    "value": {
                        "cert-manager.io/cluster-issuer": "letsencrypt-prod",
                        "team": "web",
                    },
                },
            ])
        );
    }

    #[test]
    fn unconfigured_policy_never_patches() {
        let obj = ingress(json!({}), json!({ "rules": [{ "host": "foo" }] }));
        let mutation = mutate(&request("Ingress", "CREATE", obj), &PolicyConfig::default());
        assert_eq!(mutation.outcome, Outcome::Unchanged);
        assert!(mutation.patch.is_none());
        assert!(response_json(&mutation).get("patch").is_none());
    }
}
