/*
 * Copyright 2026 StrataDB Authors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 * http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use clap::Parser;
use stratadb_server::cli::Cli;
use stratadb_server::server::{run, ServerConfig};

fn resolve_auth_password(cli: &Cli) -> Result<String, Box<dyn std::error::Error>> {
    if let Some(path) = &cli.auth_password_file {
        let content = std::fs::read_to_string(path)?;
        let pw = content.trim_end().to_string();
        if pw.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("empty password in --auth-password-file '{path}'"),
            )
            .into());
        }
        return Ok(pw);
    }
    if let Some(env_name) = &cli.auth_password_env {
        let pw = std::env::var(env_name).map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("env var '{env_name}' not set for --auth-password-env"),
            )
        })?;
        if pw.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("env var '{env_name}' is empty"),
            )
            .into());
        }
        return Ok(pw);
    }
    Ok(cli.auth_password.clone())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let auth_password = resolve_auth_password(&cli)?;

    let config = ServerConfig {
        host: cli.host,
        port: cli.port,
        max_connections: cli.max_connections,
        auth_user: cli.auth_user,
        auth_password,
        node_id: cli.node_id,
        table_spaces: cli.table_spaces,
    };

    run(config).await?;
    Ok(())
}
