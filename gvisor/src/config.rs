use gvisor_core::imagevector::OVERWRITE_ENV;
use gvisor_extension::{controller, webhook::TlsFiles};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
};

/// Output format of the logs
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Command line of the extension
#[derive(clap::Parser, Debug)]
#[command(name = "gardener-extension-runtime-gvisor", version, about)]
pub struct Options {
    /// Number of ContainerRuntimes reconciled concurrently
    #[arg(long, env = "MAX_CONCURRENT_RECONCILES", default_value_t = 5)]
    pub max_concurrent_reconciles: u16,

    /// Reconcile on spec changes without waiting for the operation annotation
    #[arg(long, env = "IGNORE_OPERATION_ANNOTATION")]
    pub ignore_operation_annotation: bool,

    /// Address the webhook server listens on
    #[arg(long, env = "WEBHOOK_BIND_ADDRESS", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub webhook_bind_address: IpAddr,

    /// Port the webhook server listens on
    #[arg(long, env = "WEBHOOK_PORT", default_value_t = 10250)]
    pub webhook_port: u16,

    /// Directory holding tls.crt and tls.key of the webhook server
    #[arg(long, env = "WEBHOOK_CERT_DIR")]
    pub webhook_cert_dir: Option<PathBuf>,

    /// Image vector file whose entries replace the embedded ones
    #[arg(long, env = OVERWRITE_ENV)]
    pub imagevector_overwrite: Option<PathBuf>,

    /// Do not run the ContainerRuntime controller
    #[arg(long)]
    pub disable_controller: bool,

    /// Do not run the OperatingSystemConfig webhook
    #[arg(long)]
    pub disable_webhook: bool,

    /// Output format of the logs
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t)]
    pub log_format: LogFormat,
}

impl Options {
    pub fn controller_config(&self) -> controller::Config {
        controller::Config {
            max_concurrent_reconciles: self.max_concurrent_reconciles,
            ignore_operation_annotation: self.ignore_operation_annotation,
        }
    }

    pub fn webhook_addr(&self) -> SocketAddr {
        SocketAddr::new(self.webhook_bind_address, self.webhook_port)
    }

    /// The serving certificate, if the cert dir holds one
    pub fn webhook_tls(&self) -> Option<TlsFiles> {
        let dir = self.webhook_cert_dir.as_ref()?;
        let tls = TlsFiles {
            cert: dir.join("tls.crt"),
            key: dir.join("tls.key"),
        };
        (tls.cert.is_file() && tls.key.is_file()).then_some(tls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn defaults() {
        let opts = Options::try_parse_from(["gardener-extension-runtime-gvisor"]).unwrap();
        assert_eq!(opts.max_concurrent_reconciles, 5);
        assert!(!opts.ignore_operation_annotation);
        assert_eq!(opts.webhook_addr(), "0.0.0.0:10250".parse().unwrap());
        assert_eq!(opts.log_format, LogFormat::Text);
        assert!(opts.webhook_tls().is_none());
    }

    #[test]
    fn flags() {
        let opts = Options::try_parse_from([
            "gardener-extension-runtime-gvisor",
            "--max-concurrent-reconciles=2",
            "--ignore-operation-annotation",
            "--webhook-bind-address=127.0.0.1",
            "--webhook-port=9443",
            "--log-format=json",
            "--disable-controller",
        ])
        .unwrap();
        let config = opts.controller_config();
        assert_eq!(config.max_concurrent_reconciles, 2);
        assert!(config.ignore_operation_annotation);
        assert_eq!(opts.webhook_addr(), "127.0.0.1:9443".parse().unwrap());
        assert_eq!(opts.log_format, LogFormat::Json);
        assert!(opts.disable_controller);
        assert!(!opts.disable_webhook);
    }

    #[test]
    fn tls_requires_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let cert_dir = dir.path().to_str().unwrap().to_owned();
        let parse = || {
            Options::try_parse_from(["gardener-extension-runtime-gvisor", "--webhook-cert-dir", &cert_dir]).unwrap()
        };
        std::fs::write(dir.path().join("tls.crt"), "cert").unwrap();
        assert!(parse().webhook_tls().is_none());

        std::fs::write(dir.path().join("tls.key"), "key").unwrap();
        let tls = parse().webhook_tls().unwrap();
        assert_eq!(tls.cert, dir.path().join("tls.crt"));
        assert_eq!(tls.key, dir.path().join("tls.key"));
    }
}
