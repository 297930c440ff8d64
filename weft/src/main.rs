use std::io::{self, Read, Write};
use std::net::IpAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use clap::{ArgAction, Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use weft::client::{split_host_port, DEFAULT_PORT};
use weft::{
    CipherSuite, Config, ConfigBuilder, Connection, DhParameters, Error, Identity,
    ProtocolVersion, Result, TlsClient, TlsServer,
};

/// TLS 1.2 and TLS 1.3 client and server.
#[derive(Parser)]
#[command(name = "weft")]
#[command(version, about, long_about = None)]
struct Cli {
    /// More logging (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to a server, send standard input, print the reply.
    Client {
        /// host[:port] to connect to (default port 443).
        #[arg(long)]
        connect: String,
        /// Server name to send; defaults to the host unless it is an address.
        #[arg(long)]
        server_name: Option<String>,
        #[command(flatten)]
        tls: TlsArgs,
    },
    /// Accept connections and echo what each client sends.
    Server {
        /// Address to listen on, e.g. 0.0.0.0:4433.
        #[arg(long)]
        address: String,
        /// PEM file holding the certificate chain and the private key.
        #[arg(long)]
        certificate: String,
        /// PEM file with DH parameters for DHE suites.
        #[arg(long, alias = "dhParameters")]
        dh_parameters: Option<String>,
        #[command(flatten)]
        tls: TlsArgs,
    },
}

#[derive(Args)]
struct TlsArgs {
    /// Only use this TLS version ("1.2" or "1.3").
    #[arg(long, alias = "TLSVersion", value_parser = parse_version)]
    tls_version: Option<ProtocolVersion>,
    /// Only use this cipher suite (IANA name, e.g. TLS_AES_128_GCM_SHA256).
    #[arg(long, alias = "cipherSuite", value_parser = parse_cipher_suite)]
    cipher_suite: Option<CipherSuite>,
}

fn parse_version(s: &str) -> std::result::Result<ProtocolVersion, String> {
    let lower = s.to_ascii_lowercase();
    let number = lower
        .strip_prefix("tlsv")
        .or_else(|| lower.strip_prefix("tls"))
        .unwrap_or(&lower);
    match number {
        "1.2" => Ok(ProtocolVersion::Tls12),
        "1.3" => Ok(ProtocolVersion::Tls13),
        _ => Err(format!("unsupported TLS version '{}' (use 1.2 or 1.3)", s)),
    }
}

fn parse_cipher_suite(s: &str) -> std::result::Result<CipherSuite, String> {
    CipherSuite::from_name(s).ok_or_else(|| format!("unknown cipher suite '{}'", s))
}

impl TlsArgs {
    fn apply(&self, mut builder: ConfigBuilder) -> ConfigBuilder {
        let version = self.tls_version.or_else(|| {
            let suite = self.cipher_suite?.descriptor()?;
            Some(if suite.is_tls13() {
                ProtocolVersion::Tls13
            } else {
                ProtocolVersion::Tls12
            })
        });
        if let Some(version) = version {
            builder = builder.with_protocol_versions(&[version]);
        }
        if let Some(suite) = self.cipher_suite {
            builder = builder.with_cipher_suites(&[suite]);
        }
        builder
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run_client(connect: &str, server_name: Option<String>, tls: &TlsArgs) -> Result<()> {
    let (host, port) = split_host_port(connect, DEFAULT_PORT)?;
    let server_name = server_name.or_else(|| host.parse::<IpAddr>().is_err().then(|| host.clone()));

    let mut builder = tls.apply(Config::builder(weft::default_provider()));
    if let Some(name) = &server_name {
        builder = builder.with_server_name(name.as_str());
    }
    let config = Arc::new(builder.build()?);

    let mut client = TlsClient::connect((host.as_str(), port), config)?;
    let connection = client.connection();
    eprintln!(
        "Connected to {}:{} using {} with {}",
        host,
        port,
        connection.protocol_version().map_or("?", |v| v.name()),
        connection.cipher_suite().map_or("?", |s| s.name()),
    );

    let mut request = Vec::new();
    io::stdin().read_to_end(&mut request)?;
    if !request.is_empty() {
        client.write_all(&request)?;
    }
    // The server answers our close_notify with its own once it has
    // echoed everything.
    client.close()?;

    let mut stdout = io::stdout().lock();
    let mut buf = [0u8; 16384];
    loop {
        let n = client.read(&mut buf)?;
        if n == 0 {
            break;
        }
        stdout.write_all(&buf[..n])?;
        stdout.flush()?;
    }
    Ok(())
}

fn run_server(
    address: &str,
    certificate: &str,
    dh_parameters: Option<&str>,
    tls: &TlsArgs,
) -> Result<()> {
    let mut builder = tls
        .apply(Config::builder(weft::default_provider()))
        .with_identity(Identity::from_pem_file(certificate)?);
    if let Some(path) = dh_parameters {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", path, e)))?;
        builder = builder.with_dh_parameters(DhParameters::from_pem(&text)?);
    }
    let server = TlsServer::bind(address, Arc::new(builder.build()?))?;
    eprintln!("Listening on {}", server.local_addr()?);

    loop {
        match server.accept() {
            Ok((connection, peer)) => {
                thread::spawn(move || match echo(connection) {
                    Ok(bytes) => tracing::info!(%peer, bytes, "connection closed"),
                    Err(e) => tracing::warn!(%peer, error = %e, "connection failed"),
                });
            },
            Err(e) => tracing::warn!(error = %e, "handshake failed"),
        }
    }
}

fn echo<T: weft::weft_core::Transport>(mut connection: Connection<T>) -> Result<usize> {
    let mut total = 0;
    let mut buf = [0u8; 16384];
    loop {
        let n = connection.read_application_data(&mut buf)?;
        if n == 0 {
            break;
        }
        connection.write_application_data(&buf[..n])?;
        total += n;
    }
    connection.close()?;
    Ok(total)
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        },
    };
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Client {
            connect,
            server_name,
            tls,
        } => run_client(&connect, server_name, &tls),
        Commands::Server {
            address,
            certificate,
            dh_parameters,
            tls,
        } => run_server(&address, &certificate, dh_parameters.as_deref(), &tls),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("1.2"), Ok(ProtocolVersion::Tls12));
        assert_eq!(parse_version("TLSv1.3"), Ok(ProtocolVersion::Tls13));
        assert!(parse_version("1.1").is_err());
    }

    #[test]
    fn test_camel_case_aliases() {
        let cli = Cli::try_parse_from([
            "weft",
            "client",
            "--connect",
            "localhost:4433",
            "--TLSVersion",
            "1.2",
            "--cipherSuite",
            "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
        ])
        .unwrap();
        let Commands::Client { tls, .. } = cli.command else {
            panic!("client expected");
        };
        assert_eq!(tls.tls_version, Some(ProtocolVersion::Tls12));
        assert_eq!(tls.cipher_suite, Some(CipherSuite::EcdheRsaWithAes128GcmSha256));
    }

    #[test]
    fn test_server_requires_certificate() {
        assert!(Cli::try_parse_from(["weft", "server", "--address", "0.0.0.0:4433"]).is_err());
    }

    #[test]
    fn test_suite_implies_version() {
        let tls = TlsArgs {
            tls_version: None,
            cipher_suite: Some(CipherSuite::Tls13ChaCha20Poly1305Sha256),
        };
        let config = tls.apply(Config::builder(weft::default_provider())).build().unwrap();
        assert_eq!(config.protocol_versions, vec![ProtocolVersion::Tls13]);
        assert_eq!(config.cipher_suites, vec![CipherSuite::Tls13ChaCha20Poly1305Sha256]);
    }
}
