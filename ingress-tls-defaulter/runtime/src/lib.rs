#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use ingress_tls_defaulter_core as core;

mod admission;
mod args;
mod metrics;

pub use self::{admission::Admission, args::Args, metrics::AdmissionMetrics};
