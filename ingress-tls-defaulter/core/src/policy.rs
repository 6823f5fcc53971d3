use crate::{PolicyConfig, CLUSTER_ISSUER_ANNOTATION, TLS_SECRET_SUFFIX};
use k8s_openapi::api::networking::v1::{Ingress, IngressSpec, IngressTLS};
use std::collections::BTreeMap;

/// An Ingress after the policy has been applied, along with which of its
/// sub-trees were modified.
#[derive(Clone, Debug)]
pub struct ChangeSet {
    pub ingress: Ingress,
    pub spec_changed: bool,
    pub annotations_changed: bool,
    /// The Ingress had no annotation map before the policy created one.
    pub annotations_created: bool,
}

// === impl ChangeSet ===

impl ChangeSet {
    pub fn name(&self) -> &str {
        self.ingress.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        !self.spec_changed && !self.annotations_changed
    }
}

/// Applies the defaulting rules to an Ingress.
///
/// Unqualified rule hosts are suffixed with the configured DNS domain, the
/// configured cluster issuer is annotated, and an Ingress without any TLS
/// configuration gets a single TLS entry covering all of its rule hosts.
/// Host suffixing runs first so that the TLS entry covers the qualified names.
///
/// When neither a DNS suffix nor an issuer is configured the Ingress is
/// returned untouched. The default TLS entry is skipped in that case too, even
/// though it depends on neither setting: an unconfigured defaulter never adds
/// TLS to an Ingress that lacks it.
pub fn apply_policy(mut ingress: Ingress, config: &PolicyConfig) -> ChangeSet {
    if config.is_disabled() {
        return ChangeSet {
            ingress,
            spec_changed: false,
            annotations_changed: false,
            annotations_created: false,
        };
    }

    let mut spec_changed = false;
    if let Some(suffix) = config.dns_suffix() {
        spec_changed |= qualify_hosts(&mut ingress, suffix);
    }

    let had_annotations = ingress.metadata.annotations.is_some();
    let annotations_changed = config
        .cluster_issuer()
        .map(|issuer| set_issuer(&mut ingress, issuer))
        .unwrap_or(false);

    spec_changed |= default_tls(&mut ingress);

    ChangeSet {
        ingress,
        spec_changed,
        annotations_changed,
        annotations_created: annotations_changed && !had_annotations,
    }
}

fn qualify_hosts(ingress: &mut Ingress, suffix: &str) -> bool {
    let hosts = ingress
        .spec
        .iter_mut()
        .flat_map(|spec| spec.rules.iter_mut().flatten())
        .filter_map(|rule| rule.host.as_mut());

    let mut changed = false;
    for host in hosts {
        if host.is_empty() || host.contains('.') {
            continue;
        }
        host.push('.');
        host.push_str(suffix);
        changed = true;
    }
    changed
}

fn set_issuer(ingress: &mut Ingress, issuer: &str) -> bool {
    let previous = ingress
        .metadata
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(CLUSTER_ISSUER_ANNOTATION.to_string(), issuer.to_string());
    previous.as_deref() != Some(issuer)
}

fn default_tls(ingress: &mut Ingress) -> bool {
    let has_tls = ingress
        .spec
        .as_ref()
        .and_then(|spec| spec.tls.as_ref())
        .is_some_and(|tls| !tls.is_empty());
    if has_tls {
        return false;
    }

    // An Ingress without rules still gets an entry with no hosts.
    let secret_name = format!(
        "{}{TLS_SECRET_SUFFIX}",
        ingress.metadata.name.as_deref().unwrap_or_default()
    );
    let spec = ingress.spec.get_or_insert_with(IngressSpec::default);
    let hosts = rule_hosts(spec);
    spec.tls = Some(vec![IngressTLS {
        hosts: Some(hosts),
        secret_name: Some(secret_name),
    }]);
    true
}

/// Returns the non-empty rule hosts in the order they are declared.
pub(crate) fn rule_hosts(spec: &IngressSpec) -> Vec<String> {
    spec.rules
        .iter()
        .flatten()
        .filter_map(|rule| rule.host.as_deref())
        .filter(|host| !host.is_empty())
        .map(ToString::to_string)
        .collect()
}
