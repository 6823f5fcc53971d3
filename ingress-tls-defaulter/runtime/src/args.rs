use crate::{admission::Admission, core::PolicyConfig, metrics::AdmissionMetrics};
use anyhow::{bail, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[clap(
    name = "ingress-tls-defaulter",
    about = "Defaults TLS and DNS settings on new Ingresses"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "ingress_tls_defaulter=info,warn",
        env = "INGRESS_TLS_DEFAULTER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    server: kubert::ServerArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Domain appended to Ingress rule hosts that contain no dots.
    #[clap(long, env = "INGRESS_DOMAIN", default_value = "")]
    ingress_domain: String,

    /// cert-manager ClusterIssuer annotated onto new Ingresses.
    #[clap(long, env = "CLUSTER_ISSUER", default_value = "")]
    cluster_issuer: String,

    #[clap(long, default_value = "/mutate")]
    webhook_path: String,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            server,
            ingress_domain,
            cluster_issuer,
            webhook_path,
        } = self;

        let config = Arc::new(PolicyConfig::new(ingress_domain, cluster_issuer));

        let mut prom = <Registry>::default();
        let metrics =
            AdmissionMetrics::register(prom.sub_registry_with_prefix("ingress_tls_defaulter"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .with_server(server)
            .build()
            .await?;

        if config.is_disabled() {
            warn!("Neither an ingress domain nor a cluster issuer is configured; Ingresses will not be modified");
        }
        info!(
            ingress_domain = config.dns_suffix().unwrap_or_default(),
            cluster_issuer = config.cluster_issuer().unwrap_or_default(),
            path = %webhook_path,
            "Serving admission reviews"
        );

        let runtime = runtime.spawn_server(Admission::new(config, webhook_path, metrics));

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
