use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use xraypanel::app::Panel;
use xraypanel::model::Snapshot;
use xraypanel::nginx::JsonRecordStore;

#[derive(Parser)]
#[command(name = "xraypanel", version, about = "Xray / nginx configuration generator")]
struct Cli {
    /// 面板配置文件
    #[arg(short, long, default_value = "xraypanel.yaml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 生成 Xray 配置
    Xray {
        #[arg(long)]
        snapshot: PathBuf,
        /// 默认写到 xray.config_path；传 `-` 输出到 stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// nginx 反代文件
    Nginx {
        #[command(subcommand)]
        action: NginxAction,
    },
    /// 列出 geosite / geoip 可用条目
    Geodata,
    /// 绑定入站与域名并写回快照
    Bind {
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        inbound: String,
        /// 省略则解除绑定
        #[arg(long)]
        domain: Option<String>,
    },
}

#[derive(Subcommand)]
enum NginxAction {
    /// 为所有绑定域名的入站生成文件
    Sync {
        #[arg(long)]
        snapshot: PathBuf,
    },
    /// 删除某个入站生成的文件
    Cleanup {
        #[arg(long)]
        inbound: String,
    },
    /// 面板自身的反代文件
    Panel {
        #[arg(long)]
        domain: String,
        #[arg(long)]
        cert: String,
        #[arg(long)]
        key: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, found) = xraypanel::config::load_or_default(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if !found {
        // subscriber 装好之后才能输出
        warn!(path = cli.config.as_str(), "config file not found, using defaults");
    }

    let panel = Panel::new(config);

    match cli.command {
        Command::Xray { snapshot, output } => {
            let snapshot = Snapshot::load(&snapshot)?;
            if output.as_deref() == Some(std::path::Path::new("-")) {
                let document = panel.generate_xray(&snapshot)?;
                println!("{}", document.to_json_pretty()?);
            } else {
                let path = panel.write_xray_config(&snapshot, output)?;
                info!(path = %path.display(), "done");
            }
        }
        Command::Nginx { action } => {
            let mut store = JsonRecordStore::open(&panel.config().nginx.records_path)?;
            match action {
                NginxAction::Sync { snapshot } => {
                    let snapshot = Snapshot::load(&snapshot)?;
                    let report = panel.sync_nginx(&snapshot, &mut store);
                    for path in &report.written {
                        println!("written {}", path.display());
                    }
                    for failure in &report.failures {
                        warn!(
                            domain = failure.domain.as_str(),
                            kind = failure.error.kind().as_str(),
                            error = %failure.error,
                            "domain skipped"
                        );
                    }
                    if !report.is_success() {
                        anyhow::bail!("{} domain(s) failed", report.failures.len());
                    }
                }
                NginxAction::Cleanup { inbound } => {
                    let report = panel.cleanup_inbound(&inbound, &mut store)?;
                    for path in &report.removed {
                        println!("removed {}", path.display());
                    }
                    for path in &report.skipped {
                        println!("kept {}", path.display());
                    }
                }
                NginxAction::Panel { domain, cert, key } => {
                    let path = panel.generate_panel_nginx(&domain, &cert, &key)?;
                    println!("written {}", path.display());
                }
            }
        }
        Command::Geodata => {
            let info = panel.geodata_info();
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Bind {
            snapshot: path,
            inbound,
            domain,
        } => {
            let mut snapshot = Snapshot::load(&path)?;
            let domain = match domain {
                Some(id) => Some(
                    snapshot
                        .find_domain(&id)
                        .cloned()
                        .with_context(|| format!("domain '{}' not found", id))?,
                ),
                None => None,
            };
            let target = snapshot
                .find_inbound_mut(&inbound)
                .with_context(|| format!("inbound '{}' not found", inbound))?;
            let outcome = panel.bind_domain(target, domain.as_ref())?;
            snapshot.save(&path)?;
            println!("{}", outcome.actual_domain().unwrap_or("-"));
        }
    }

    Ok(())
}
