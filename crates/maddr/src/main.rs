use clap::{Parser, Subcommand};
use xstack_multiaddr::{global_registry, Multiaddr};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Multiaddr(#[from] xstack_multiaddr::Error),

    #[error("invalid hex input: {0}")]
    Hex(#[from] hex::FromHexError),
}

#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "Encode, decode and inspect self-describing network addresses"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Use verbose output
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the binary form of a multiaddr as hex.
    Encode { addr: String },
    /// Print the text form of a hex encoded multiaddr.
    Decode { hex: String },
    /// List the segments of a multiaddr.
    Inspect { addr: String },
    /// List the registered protocols.
    Protocols,
}

fn execute(command: &Command) -> Result<Vec<String>, CliError> {
    match command {
        Command::Encode { addr } => {
            let addr = Multiaddr::parse(addr)?;

            Ok(vec![hex::encode(addr.to_vec())])
        }
        Command::Decode { hex: input } => {
            let buf = hex::decode(input.trim())?;

            Ok(vec![Multiaddr::from_bytes(&buf)?.to_string()])
        }
        Command::Inspect { addr } => {
            let addr = Multiaddr::parse(addr)?;

            let mut lines = addr
                .iter()
                .map(|segment| {
                    if segment.protocol().kind().has_value() {
                        format!(
                            "{} {} {}",
                            segment.code(),
                            segment.name(),
                            segment.value_text()
                        )
                    } else {
                        format!("{} {}", segment.code(), segment.name())
                    }
                })
                .collect::<Vec<_>>();

            if let Ok(peer_id) = addr.peer_id() {
                lines.push(format!("peer_id {}", peer_id));
            }

            Ok(lines)
        }
        Command::Protocols => Ok(global_registry()
            .protocols()
            .iter()
            .map(|protocol| {
                format!("{} {} {}", protocol.code(), protocol.name(), protocol.kind())
            })
            .collect()),
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Trace
    } else {
        log::LevelFilter::Info
    };

    pretty_env_logger::formatted_timed_builder()
        .filter_level(level)
        .init();

    match execute(&cli.command) {
        Ok(lines) => {
            for line in lines {
                println!("{}", line);
            }
        }
        Err(err) => {
            log::error!("{:?} failed: {}", cli.command, err);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode() {
        let lines = execute(&Command::Encode {
            addr: "/ip4/127.0.0.1/udp/1234".to_owned(),
        })
        .unwrap();

        assert_eq!(lines, ["047f000001910204d2"]);
    }

    #[test]
    fn decode() {
        let lines = execute(&Command::Decode {
            hex: "047F0000010610e1\n".to_owned(),
        })
        .unwrap();

        assert_eq!(lines, ["/ip4/127.0.0.1/tcp/4321"]);

        assert!(matches!(
            execute(&Command::Decode {
                hex: "04zz".to_owned()
            }),
            Err(CliError::Hex(_))
        ));

        assert!(matches!(
            execute(&Command::Decode {
                hex: "7f".to_owned()
            }),
            Err(CliError::Multiaddr(_))
        ));
    }

    #[test]
    fn inspect() {
        let lines = execute(&Command::Inspect {
            addr: "/ip4/10.1.10.10/tcp/29087/ws/ipfs/QmVcSqVEsvm5RR9mBLjwpb2XjFVn5bPdPL69mL8PH45pPC"
                .to_owned(),
        })
        .unwrap();

        assert_eq!(
            lines,
            [
                "4 ip4 10.1.10.10",
                "6 tcp 29087",
                "477 ws",
                "421 ipfs QmVcSqVEsvm5RR9mBLjwpb2XjFVn5bPdPL69mL8PH45pPC",
                "peer_id QmVcSqVEsvm5RR9mBLjwpb2XjFVn5bPdPL69mL8PH45pPC",
            ]
        );

        assert!(execute(&Command::Inspect {
            addr: "tcp/80".to_owned()
        })
        .is_err());
    }

    #[test]
    fn protocols() {
        let lines = execute(&Command::Protocols).unwrap();

        assert_eq!(lines[0], "4 ip4 fixed(4)");
        assert!(lines.contains(&"6 tcp fixed(2)".to_owned()));
        assert!(lines.contains(&"421 ipfs length-prefixed".to_owned()));
        assert!(lines.contains(&"421 p2p length-prefixed".to_owned()));
        assert!(lines.contains(&"477 ws none".to_owned()));
    }

    #[test]
    fn cli_args() {
        let cli = Cli::try_parse_from(["maddr", "-v", "encode", "/tcp/80"]).unwrap();

        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Encode { addr } if addr == "/tcp/80"));

        assert!(Cli::try_parse_from(["maddr"]).is_err());
    }
}
