//! `status`: proxy state plus linked-account counts.

use std::fmt::Write;

use serde::Serialize;
use tabled::Tabled;

use proxydeck_core::{AuthStatus, ConnectionKind, Provider, ProxyStatus};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;
use crate::session::Session;

#[derive(Debug, Serialize)]
struct StatusView {
    proxy: ProxyStatus,
    accounts: Vec<AccountView>,
}

#[derive(Debug, Serialize)]
struct AccountView {
    provider: Provider,
    kind: ConnectionKind,
    accounts: u32,
}

#[derive(Tabled)]
struct AccountRow {
    #[tabled(rename = "Provider")]
    provider: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Accounts")]
    accounts: String,
}

fn account_views(auth: &AuthStatus) -> Vec<AccountView> {
    Provider::ALL
        .iter()
        .map(|&provider| AccountView {
            provider,
            kind: provider.connection_kind(),
            accounts: auth.count(provider),
        })
        .collect()
}

fn detail(view: &StatusView, color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Proxy:    {}",
        output::running_label(view.proxy.running, color)
    );
    if let Some(ref endpoint) = view.proxy.endpoint {
        let _ = writeln!(out, "Endpoint: {endpoint}");
    }
    if !view.proxy.running {
        let _ = write!(out, "\nStart it with: proxydeck proxy start");
        return out;
    }

    let rows: Vec<AccountRow> = view
        .accounts
        .iter()
        .map(|a| AccountRow {
            provider: a.provider.display_name().into(),
            kind: a.kind.to_string(),
            accounts: if a.accounts == 0 {
                "-".into()
            } else {
                a.accounts.to_string()
            },
        })
        .collect();
    let _ = writeln!(out);
    let _ = write!(
        out,
        "{}",
        tabled::Table::new(rows).with(tabled::settings::Style::rounded())
    );
    out
}

pub async fn handle(session: &mut Session, global: &GlobalOpts) -> Result<(), CliError> {
    let proxy = session.controller.sync().await?;
    let accounts = if proxy.running {
        account_views(&session.controller.auth_status())
    } else {
        Vec::new()
    };
    let view = StatusView { proxy, accounts };
    let color = session.color();

    let out = output::render_single(
        &global.output,
        &view,
        |v| detail(v, color),
        |v| output::running_label(v.proxy.running, false),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
