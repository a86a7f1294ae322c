//! Gardener extension provisioning the gVisor container runtime
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use gvisor_core::ImageVector;
use gvisor_extension::{
    charts::StaticChartRendererFactory,
    controller,
    webhook::{self, GVisorEnsurer, Mutator},
    Actuator, KubeManagedResources,
};
use kube::Client;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
use config::{LogFormat, Options};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,kube=warn".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let opts = Options::parse();
    init_tracing(opts.log_format);
    if opts.disable_controller && opts.disable_webhook {
        bail!("both the controller and the webhook are disabled");
    }

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install rustls crypto provider"))?;

    let images = ImageVector::load(opts.imagevector_overwrite.as_deref()).context("loading image vector")?;
    let ensurer = GVisorEnsurer::new(&images).context("resolving installation image")?;
    info!(image = %ensurer.image(), "starting gVisor runtime extension");

    let controller = async {
        if opts.disable_controller {
            return std::future::pending().await;
        }
        let client = Client::try_default().await.context("creating kubernetes client")?;
        let actuator = Actuator::new(KubeManagedResources::new(client.clone()), StaticChartRendererFactory);
        controller::run(client, actuator, opts.controller_config()).await;
        anyhow::Ok(())
    };

    let webhook = async {
        if opts.disable_webhook {
            return std::future::pending().await;
        }
        let router = webhook::router(Arc::new(Mutator::new(ensurer)));
        webhook::serve(router, opts.webhook_addr(), opts.webhook_tls())
            .await
            .context("serving webhook")
    };

    tokio::select! {
        res = controller => res?,
        res = webhook => res?,
    }
    info!("shutting down");
    Ok(())
}
