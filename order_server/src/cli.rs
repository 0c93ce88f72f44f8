use std::{env, env::VarError};

/// The server deliberately has no CLI. Any argument prints the help text plus the current (non-secret)
/// configuration and exits.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        const README: &str = include_str!("./cli-help.txt");
        println!("\n{README}\n");
        display_envs();
    }
    has_cli_args
}

fn display_envs() {
    // Explicit allowlist so a secret can never end up on stdout by accident.
    const DISPLAY_ENVS: [&str; 10] = [
        "RUST_LOG",
        "OMS_HOST",
        "OMS_PORT",
        "OMS_DATABASE_URL",
        "OMS_DISPATCH_INTERVAL",
        "OMS_DISPATCH_BATCH_SIZE",
        "OMS_STALE_AFTER_MINUTES",
        "OMS_SIGNATURE_CHECKS",
        "OMS_INVENTORY_SYNC",
        "OMS_STOREFRONT_SHOP",
    ];

    println!("Current environment values (secrets excluded):");
    for name in DISPLAY_ENVS {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val}");
    }
}
