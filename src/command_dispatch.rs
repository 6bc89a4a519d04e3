//! Purpose: Hold top-level CLI command dispatch for `ddmsence-site`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Only `serve` starts a runtime; other commands are synchronous.
//! Invariants: `render` of an unknown path prints the 404 page and exits with the NotFound code.

use super::*;

use clap::CommandFactory;
use ddmsence_site::serve::{self, CheckReport};
use ddmsence_site::site::handlers::SiteState;
use ddmsence_site::site::routes::{self, NOT_FOUND, ROOT_REDIRECT};

pub(super) fn dispatch_command(
    command: Command,
    config_path: Option<PathBuf>,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "ddmsence-site", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Routes => {
            let pages = routes::pages();
            emit_json(json!({
                "redirects": [{ "path": "/", "location": ROOT_REDIRECT }],
                "pages": pages,
            }));
            Ok(RunOutcome::ok())
        }
        Command::Render { path, site } => {
            let config = site.resolve(config_path.as_ref())?;
            let state = serve::build_state(&config)?;
            let (html, exit_code) = render_path(&state, &path)?;
            print!("{html}");
            Ok(RunOutcome::with_code(exit_code))
        }
        Command::Serve { subcommand, site } => {
            let config = site.resolve(config_path.as_ref())?;
            match subcommand {
                Some(ServeSubcommand::Check { json }) => {
                    let report = serve::check(&config)?;
                    if json {
                        let value = serde_json::to_value(&report).map_err(|err| {
                            Error::new(ErrorKind::Internal)
                                .with_message("failed to encode check report")
                                .with_source(err)
                        })?;
                        emit_json(value);
                    } else {
                        emit_check_human(&report);
                    }
                    Ok(RunOutcome::ok())
                }
                None => {
                    let runtime = tokio::runtime::Builder::new_multi_thread()
                        .enable_all()
                        .build()
                        .map_err(|err| {
                            Error::new(ErrorKind::Internal)
                                .with_message("failed to start runtime")
                                .with_source(err)
                        })?;
                    runtime.block_on(serve::serve(config))?;
                    Ok(RunOutcome::ok())
                }
            }
        }
    }
}

fn render_path(state: &SiteState, path: &str) -> Result<(String, i32), Error> {
    let lookup = if path == "/" { ROOT_REDIRECT } else { path };
    match routes::find(lookup) {
        Some(page) => Ok((state.render(page, lookup)?, 0)),
        None => Ok((
            state.render(&NOT_FOUND, path)?,
            to_exit_code(ErrorKind::NotFound),
        )),
    }
}

fn emit_check_human(report: &CheckReport) {
    println!("ddmsence-site config OK");
    println!("  Bind:       {}", report.bind);
    println!("  Base URL:   {}", report.base_url);
    println!("  Templates:  {} ({} rendered)", report.templates, report.rendered.len());
    println!("  Dev mode:   {}", if report.dev { "on" } else { "off" });
    println!("  Static dir: {}", report.static_dir);
    for mount in &report.mounts {
        let state = if mount.present { "ok" } else { "missing" };
        println!("    {:<12} {:<8} {}", mount.mount.prefix, state, mount.path);
    }
}
