use ingress_tls_defaulter_core::{Outcome, SkipKind};
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

#[derive(Clone, Debug)]
pub struct AdmissionMetrics {
    reviews: Family<OutcomeLabels, Counter>,
    patch_operations: Counter,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct OutcomeLabels {
    outcome: &'static str,
}

// === impl AdmissionMetrics ===

impl AdmissionMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let reviews = Family::<OutcomeLabels, Counter>::default();
        reg.register(
            "admission_reviews",
            "Total number of admission reviews handled, by outcome",
            reviews.clone(),
        );

        let patch_operations = Counter::default();
        reg.register(
            "patch_operations",
            "Total number of JSON patch operations returned",
            patch_operations.clone(),
        );

        Self {
            reviews,
            patch_operations,
        }
    }

    pub(crate) fn observe(&self, outcome: Outcome) {
        let outcome = match outcome {
            Outcome::Patched(ops) => {
                self.patch_operations.inc_by(ops as u64);
                "patched"
            }
            Outcome::Unchanged => "unchanged",
            Outcome::Skipped(SkipKind::Kind) => "skipped_kind",
            Outcome::Skipped(SkipKind::Operation) => "skipped_operation",
            Outcome::Skipped(SkipKind::Malformed) => "skipped_malformed",
            Outcome::Skipped(SkipKind::IssuerOverride) => "skipped_issuer_override",
        };
        self.reviews.get_or_create(&OutcomeLabels { outcome }).inc();
    }
}
