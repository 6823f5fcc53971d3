/// Process-wide policy parameters, fixed at startup.
///
/// Empty strings are treated the same as unset values so that an empty
/// environment variable disables the corresponding rule.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PolicyConfig {
    dns_suffix: Option<String>,
    cluster_issuer: Option<String>,
}

impl PolicyConfig {
    pub fn new(dns_suffix: impl Into<String>, cluster_issuer: impl Into<String>) -> Self {
        Self {
            dns_suffix: non_empty(dns_suffix.into()),
            cluster_issuer: non_empty(cluster_issuer.into()),
        }
    }

    /// The domain appended to unqualified rule hosts.
    pub fn dns_suffix(&self) -> Option<&str> {
        self.dns_suffix.as_deref()
    }

    /// The cert-manager `ClusterIssuer` annotated onto new Ingresses.
    pub fn cluster_issuer(&self) -> Option<&str> {
        self.cluster_issuer.as_deref()
    }

    /// True when neither parameter is set; the policy is then a no-op.
    pub fn is_disabled(&self) -> bool {
        self.dns_suffix.is_none() && self.cluster_issuer.is_none()
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
