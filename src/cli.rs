use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "kubedeck",
    version,
    about = "An interactive Kubernetes dashboard with a remote SSH bridge."
)]
pub struct CliArgs {
    /// Write debug output to debug.log
    #[arg(short, long)]
    pub debug: bool,

    /// Serve the dashboard over SSH on this address instead of attaching
    /// to the local terminal
    #[arg(long, num_args = 0..=1, default_missing_value = "0.0.0.0:2022")]
    pub listen: Option<SocketAddr>,

    /// SSH host key file (an ephemeral key is generated when omitted)
    #[arg(long)]
    pub keyfile: Option<PathBuf>,

    /// Use in-cluster service-account credentials
    #[arg(long)]
    pub cluster: bool,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long, default_value = "info")]
    pub log_filter: String,
}

#[cfg(test)]
mod tests {
    use super::CliArgs;
    use clap::Parser;

    #[test]
    fn bare_listen_flag_uses_default_address() {
        let args = CliArgs::parse_from(["kubedeck", "--listen"]);
        assert_eq!(
            args.listen.map(|addr| addr.to_string()),
            Some("0.0.0.0:2022".to_string())
        );
    }

    #[test]
    fn listen_accepts_explicit_address() {
        let args = CliArgs::parse_from(["kubedeck", "--listen", "127.0.0.1:2222"]);
        assert_eq!(
            args.listen.map(|addr| addr.to_string()),
            Some("127.0.0.1:2222".to_string())
        );
    }

    #[test]
    fn dashboard_mode_is_the_default() {
        let args = CliArgs::parse_from(["kubedeck"]);
        assert!(args.listen.is_none());
        assert!(!args.debug);
        assert!(!args.cluster);
    }
}
