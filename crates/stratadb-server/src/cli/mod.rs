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

#[derive(Debug, Clone, Parser)]
#[command(name = "stratadb", about = "StrataDB distributed SQL server")]
pub struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    #[arg(short, long, default_value_t = 7000)]
    pub port: u16,

    #[arg(long, default_value_t = 256)]
    pub max_connections: usize,

    #[arg(long, default_value = "stratadb")]
    pub auth_user: String,

    #[arg(long, default_value = "stratadb")]
    pub auth_password: String,

    #[arg(long)]
    pub auth_password_env: Option<String>,

    #[arg(long)]
    pub auth_password_file: Option<String>,

    #[arg(long, default_value = "node-0")]
    pub node_id: String,

    /// Table spaces to serve; repeat the flag for more than one.
    #[arg(long = "table-space", default_value = "default")]
    pub table_spaces: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::Parser;

    #[test]
    fn cli_parses_listen_settings() {
        let cli = Cli::parse_from(["stratadb", "--host", "0.0.0.0", "--port", "7100"]);
        assert_eq!(cli.host, "0.0.0.0");
        assert_eq!(cli.port, 7100);
    }

    #[test]
    fn cli_accepts_repeated_table_spaces() {
        let cli = Cli::parse_from([
            "stratadb",
            "--table-space",
            "ts1",
            "--table-space",
            "ts2",
        ]);
        assert_eq!(cli.table_spaces, vec!["ts1".to_string(), "ts2".to_string()]);
    }

    #[test]
    fn cli_defaults_to_a_single_default_table_space() {
        let cli = Cli::parse_from(["stratadb"]);
        assert_eq!(cli.table_spaces, vec!["default".to_string()]);
    }
}
