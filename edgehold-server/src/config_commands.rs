use anyhow::Result;
use colored::Colorize;

use edgehold_types::AppConfig;

fn mask_token(token: Option<&str>) -> String {
    match token {
        None => "(none)".to_string(),
        Some(t) if t.len() <= 8 => "****".to_string(),
        Some(t) => format!("{}****", t.chars().take(4).collect::<String>()),
    }
}

pub fn show_config(config: &AppConfig, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    let edge = &config.edge;
    println!("{}", "Edge:".cyan().bold());
    println!("  Cluster ID: {}", edge.cluster_id);
    println!("  Node: {}", edge.node_name);
    println!("  Data dir: {}", edge.data_dir.display());
    println!("  Central API: {}", edge.api_server_url);
    println!("  Proxy listen: {}", edge.proxy_listen_addr);
    println!("  Fallback server: {}", edge.fallback_server);
    println!("  Local API: {}", edge.http_listen_addr);
    println!("  Bearer token: {}", mask_token(edge.bearer_token.as_deref()));

    let central = &config.central;
    println!("{}", "Central:".cyan().bold());
    println!("  API server: {}", central.api_server_url);
    println!("  Listen: {}", central.listen_addr);
    println!("  Conflict retries: {}", central.conflict_retries);
    println!("  Bearer token: {}", mask_token(central.bearer_token.as_deref()));

    println!("{}", "Logging:".cyan().bold());
    println!("  Level: {}", config.log.level);
    match &config.log.log_dir {
        Some(dir) => println!("  Directory: {}", dir.display()),
        None => println!("  Directory: {}", "(stdout only)".dimmed()),
    }
    Ok(())
}
