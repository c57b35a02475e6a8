// src/server/mycnf.rs
// my.cnf rendering, sized for fast throwaway test instances

use std::path::Path;

/// Per-instance values substituted into the config
#[derive(Debug, Clone, Copy)]
pub struct MycnfParams<'a> {
    pub data_dir: &'a Path,
    pub socket: &'a Path,
    pub port: u16,
}

/// Render the `[mysqld]` section for one instance
pub fn render_mycnf(params: &MycnfParams<'_>) -> String {
    format!(
        r#"
[mysqld]
bind-address                    = 127.0.0.1
datadir                         = {data_dir}
explicit_defaults_for_timestamp = 1
innodb-buffer-pool-size         = 5M
innodb-log-file-size            = 4M
innodb-read-io-threads          = 2
key_buffer_size                 = 16K
max-binlog-size                 = 256K
max-delayed-threads             = 5
max_allowed_packet              = 256K
net_buffer_length               = 2K
port                            = {port}
socket                          = {socket}
sort_buffer_size                = 32K
sql_mode                        = ''
thread_cache_size               = 2
thread_stack                    = 128K
user                            = root
"#,
        data_dir = params.data_dir.display(),
        port = params.port,
        socket = params.socket.display(),
    )
}
