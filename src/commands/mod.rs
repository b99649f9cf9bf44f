//! Command dispatch.
//!
//! # Data Flow
//! ```text
//! argv → clap → Command
//!     → run(): mutating? take the instance lock (context.rs)
//!     → handler drives one component (certificate, modules, domains, migration)
//!     → Outcome { stdout, warnings, exit code } or CommandError (error.rs)
//! ```
//!
//! # Design Decisions
//! - Every verb is a variant; dispatch is an exhaustive match
//! - Read-only verbs never wait for the lock
//! - A missing management tool is a warning with exit code 0

pub mod context;
pub mod error;

use clap::{Subcommand, ValueEnum};

use crate::lifecycle::{restart_if_running, RestartOutcome};
use crate::migration::MigrationError;

pub use context::Context;
pub use error::{exit, CommandError, Outcome};

/// Administrative verbs.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Switch authentication to the directory server (one-time)
    Setup,
    /// Enable the service at boot, start it and publish the web front-end
    Enable,
    /// Stop the service, disable it at boot and withdraw the web front-end
    Disable,
    /// Export the store and re-tag it for the new hostname (phase 1)
    PreChangeHostname {
        #[arg(long)]
        old: String,
        #[arg(long)]
        new: String,
    },
    /// Restart cold under the new hostname and restore the store (phase 2)
    ChangeHostname {
        #[arg(long)]
        old: String,
        #[arg(long)]
        new: String,
    },
    /// Add a served domain
    ChangeDomainname {
        #[arg(long)]
        domainname: String,
    },
    /// Enable, disable or query an optional module
    Module {
        #[arg(value_enum)]
        action: ModuleAction,
        name: String,
    },
    /// Switch to or away from the managed certificate of a domain
    Certificate {
        #[arg(value_enum)]
        action: CertificateAction,
        #[arg(long)]
        domain: Option<String>,
    },
    /// Print the hostname migration state as JSON
    MigrationStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModuleAction {
    Enable,
    Disable,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CertificateAction {
    Add,
    Drop,
}

impl Command {
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Command::MigrationStatus
                | Command::Module {
                    action: ModuleAction::Status,
                    ..
                }
        )
    }
}

/// Execute `command` against the instance described by `ctx`.
pub async fn run(ctx: &Context, command: &Command) -> Result<Outcome, CommandError> {
    let _lock = if command.is_mutating() {
        Some(ctx.lock().await?)
    } else {
        None
    };

    match command {
        Command::Setup => setup(ctx).await,
        Command::Enable => enable(ctx).await,
        Command::Disable => disable(ctx).await,
        Command::PreChangeHostname { old, new } => pre_change_hostname(ctx, old, new).await,
        Command::ChangeHostname { old, new } => change_hostname(ctx, old, new).await,
        Command::ChangeDomainname { domainname } => change_domainname(ctx, domainname).await,
        Command::Module { action, name } => module(ctx, *action, name).await,
        Command::Certificate { action, domain } => certificate(ctx, *action, domain.as_deref()).await,
        Command::MigrationStatus => migration_status(ctx),
    }
}

async fn setup(ctx: &Context) -> Result<Outcome, CommandError> {
    let auth = &ctx.config.auth;
    let changed = ctx.store().update(|doc| {
        Ok::<_, CommandError>(doc.set_auth(&auth.method, &auth.servers, &auth.base)?)
    }).await?;
    tracing::info!(method = %auth.method, changed, "Authentication configured");

    let restart = if changed {
        restart_if_running(ctx.service.as_ref()).await
    } else {
        RestartOutcome::NotRunning
    };
    Ok(Outcome::done().restart(ctx.service.name(), &restart))
}

async fn enable(ctx: &Context) -> Result<Outcome, CommandError> {
    ctx.service.set_enabled(true).await?;
    if !ctx.service.is_running().await {
        ctx.service.start().await?;
        tracing::info!(service = ctx.service.name(), "Service started");
    }
    let web = ctx
        .frontend
        .set_enabled(true)
        .await
        .map_err(CommandError::Frontend)?;
    Ok(Outcome::done().restart(&ctx.config.frontend.unit, &web))
}

async fn disable(ctx: &Context) -> Result<Outcome, CommandError> {
    ctx.service.stop().await?;
    ctx.service.set_enabled(false).await?;
    tracing::info!(service = ctx.service.name(), "Service stopped and disabled");
    let web = ctx
        .frontend
        .set_enabled(false)
        .await
        .map_err(CommandError::Frontend)?;
    Ok(Outcome::done().restart(&ctx.config.frontend.unit, &web))
}

async fn pre_change_hostname(ctx: &Context, old: &str, new: &str) -> Result<Outcome, CommandError> {
    match ctx.migrator().prepare(old, new).await {
        Ok(report) => Ok(Outcome::done().with_output(serde_json::to_string_pretty(&report)?)),
        Err(MigrationError::ToolMissing) => Ok(tool_missing(ctx)),
        Err(e) => Err(e.into()),
    }
}

async fn change_hostname(ctx: &Context, old: &str, new: &str) -> Result<Outcome, CommandError> {
    let report = match ctx.migrator().apply(old, new).await {
        Ok(report) => report,
        Err(MigrationError::ToolMissing) => return Ok(tool_missing(ctx)),
        Err(e) => return Err(e.into()),
    };

    let mut outcome = Outcome::done().with_output(serde_json::to_string_pretty(&report)?);
    if report.snapshot_missing {
        outcome = outcome.warn(
            format!(
                "no migrated snapshot at {}; {} runs with an empty store",
                ctx.config.migration.migrated_path.display(),
                ctx.service.name()
            ),
            exit::SNAPSHOT_MISSING,
        );
    }
    Ok(outcome)
}

async fn change_domainname(ctx: &Context, domain: &str) -> Result<Outcome, CommandError> {
    let registration = ctx.registrar().add_domain(domain).await?;
    let outcome = Outcome::done();
    Ok(if registration.duplicate {
        outcome.warn(
            format!("{domain} was already listed in hosts; a duplicate entry was appended"),
            exit::SUCCESS,
        )
    } else {
        outcome
    })
}

async fn module(ctx: &Context, action: ModuleAction, name: &str) -> Result<Outcome, CommandError> {
    let modules = ctx.modules();
    let report = match action {
        ModuleAction::Status => {
            let status = modules.status(name)?;
            return Ok(Outcome::done().with_output(status.to_string()));
        }
        ModuleAction::Enable => modules.enable(name).await?,
        ModuleAction::Disable => modules.disable(name).await?,
    };
    Ok(Outcome::done()
        .with_output(report.status.to_string())
        .restart(ctx.service.name(), &report.restart))
}

async fn certificate(
    ctx: &Context,
    action: CertificateAction,
    domain: Option<&str>,
) -> Result<Outcome, CommandError> {
    let manager = ctx.certificates();
    let report = match action {
        CertificateAction::Add => manager.add(domain).await?,
        CertificateAction::Drop => manager.drop(domain).await?,
    };
    Ok(Outcome::done()
        .with_output(report.cert_file.display().to_string())
        .restart(ctx.service.name(), &report.restart))
}

fn migration_status(ctx: &Context) -> Result<Outcome, CommandError> {
    let status = ctx.migrator().status();
    Ok(Outcome::done().with_output(serde_json::to_string_pretty(&status)?))
}

fn tool_missing(ctx: &Context) -> Outcome {
    let path = ctx.config.service.ctl_path.display();
    tracing::warn!(tool = %path, "Management tool not installed, skipping");
    Outcome::done().warn(format!("{path} not found; operation skipped"), exit::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(subcommand)]
        command: Command,
    }

    fn parse(args: &[&str]) -> Command {
        Cli::try_parse_from(std::iter::once("ejabberd-admin").chain(args.iter().copied()))
            .unwrap()
            .command
    }

    #[test]
    fn verbs_parse() {
        assert_eq!(
            parse(&["pre-change-hostname", "--old", "a.org", "--new", "b.org"]),
            Command::PreChangeHostname {
                old: "a.org".into(),
                new: "b.org".into()
            }
        );
        assert_eq!(
            parse(&["change-domainname", "--domainname", "c.org"]),
            Command::ChangeDomainname {
                domainname: "c.org".into()
            }
        );
        assert_eq!(
            parse(&["module", "status", "mod_mam"]),
            Command::Module {
                action: ModuleAction::Status,
                name: "mod_mam".into()
            }
        );
        assert_eq!(
            parse(&["certificate", "drop"]),
            Command::Certificate {
                action: CertificateAction::Drop,
                domain: None
            }
        );
        assert_eq!(parse(&["migration-status"]), Command::MigrationStatus);
    }

    #[test]
    fn read_only_verbs_skip_the_lock() {
        assert!(!parse(&["migration-status"]).is_mutating());
        assert!(!parse(&["module", "status", "mod_mam"]).is_mutating());
        assert!(parse(&["module", "enable", "mod_mam"]).is_mutating());
        assert!(parse(&["setup"]).is_mutating());
    }
}
