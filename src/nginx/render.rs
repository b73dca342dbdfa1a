/// nginx server block 渲染
///
/// 纯字符串拼接，不接触文件系统；输出不含受管标记，由写入方统一加上。
use crate::model::{Domain, Inbound, Transport};

const INDENT: &str = "    ";

struct Block {
    out: String,
}

impl Block {
    fn new() -> Self {
        Self { out: String::new() }
    }

    fn line(&mut self, depth: usize, text: &str) -> &mut Self {
        for _ in 0..depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
        self
    }

    fn blank(&mut self) -> &mut Self {
        self.out.push('\n');
        self
    }
}

fn redirect_block(b: &mut Block, server_name: &str) {
    b.line(0, "server {")
        .line(1, "listen 80;")
        .line(1, "listen [::]:80;")
        .line(1, &format!("server_name {};", server_name))
        .line(1, "return 301 https://$host$request_uri;")
        .line(0, "}")
        .blank();
}

fn https_head(b: &mut Block, server_name: &str, cert_path: &str, key_path: &str) {
    b.line(0, "server {")
        .line(1, "listen 443 ssl http2;")
        .line(1, "listen [::]:443 ssl http2;")
        .line(1, &format!("server_name {};", server_name))
        .blank()
        .line(1, &format!("ssl_certificate {};", cert_path))
        .line(1, &format!("ssl_certificate_key {};", key_path))
        .line(1, "ssl_protocols TLSv1.2 TLSv1.3;")
        .line(1, "ssl_ciphers HIGH:!aNULL:!MD5;")
        .line(1, "ssl_prefer_server_ciphers on;")
        .line(1, "ssl_session_cache shared:SSL:10m;")
        .line(1, "ssl_session_timeout 10m;")
        .blank();
}

fn stanza_comment(label: &str, inbound: &Inbound) -> String {
    match inbound.actual_domain.as_deref() {
        Some(actual) if !actual.is_empty() => {
            format!("# {}: {} (subdomain: {})", label, inbound.tag, actual)
        }
        _ => format!("# {}: {}", label, inbound.tag),
    }
}

fn grpc_headers(b: &mut Block) {
    b.line(2, "grpc_set_header Host $host;")
        .line(2, "grpc_set_header X-Real-IP $remote_addr;")
        .line(2, "grpc_set_header X-Forwarded-For $proxy_add_x_forwarded_for;");
}

/// 单个入站的 location；不支持反代的传输返回 false
fn location(b: &mut Block, inbound: &Inbound) -> bool {
    match inbound.transport {
        Transport::Grpc => {
            b.line(1, &stanza_comment("gRPC", inbound))
                .line(1, &format!("location /{} {{", inbound.service_name))
                .line(2, "if ($content_type !~ \"application/grpc\") {")
                .line(3, "return 404;")
                .line(2, "}")
                .line(2, &format!("grpc_pass grpc://127.0.0.1:{};", inbound.port));
            grpc_headers(b);
        }
        Transport::Xhttp => {
            b.line(1, &stanza_comment("XHTTP", inbound))
                .line(1, &format!("location {} {{", inbound.path))
                .line(2, &format!("grpc_pass grpc://127.0.0.1:{};", inbound.port));
            grpc_headers(b);
            b.line(2, "client_body_buffer_size 1m;")
                .line(2, "client_max_body_size 0;")
                .line(2, "grpc_read_timeout 1h;")
                .line(2, "grpc_send_timeout 1h;");
        }
        Transport::Ws => {
            b.line(1, &stanza_comment("WebSocket", inbound))
                .line(1, &format!("location {} {{", inbound.path))
                .line(2, "proxy_redirect off;")
                .line(2, &format!("proxy_pass http://127.0.0.1:{};", inbound.port))
                .line(2, "proxy_http_version 1.1;")
                .line(2, "proxy_set_header Upgrade $http_upgrade;")
                .line(2, "proxy_set_header Connection \"upgrade\";")
                .line(2, "proxy_set_header Host $host;")
                .line(2, "proxy_set_header X-Real-IP $remote_addr;")
                .line(2, "proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;");
        }
        Transport::Other(_) => return false,
    }
    b.line(1, "}").blank();
    true
}

/// 渲染一个有效域名的完整文件内容
///
/// 证书取自 `domain`；每个入站按传输方式生成一个 location，最后是静态站点兜底。
pub fn render_domain_file(server_name: &str, domain: &Domain, inbounds: &[&Inbound]) -> String {
    let mut b = Block::new();
    redirect_block(&mut b, server_name);
    https_head(&mut b, server_name, &domain.cert_path, &domain.key_path);

    for inbound in inbounds {
        if !location(&mut b, inbound) {
            tracing::warn!(
                inbound = inbound.tag.as_str(),
                transport = %inbound.transport,
                "transport cannot be reverse proxied, location skipped"
            );
        }
    }

    b.line(1, "location / {")
        .line(2, "root /var/www/html;")
        .line(2, "index index.html;")
        .line(2, "try_files $uri $uri/ =404;")
        .line(1, "}")
        .line(0, "}");
    b.out
}

/// 取监听地址中的端口：`:8082` / `0.0.0.0:8082` / `8082`
pub fn listen_port(listen: &str) -> &str {
    listen.rsplit(':').next().unwrap_or(listen)
}

/// 面板自身的反代文件内容
pub fn render_panel_file(server_name: &str, cert_path: &str, key_path: &str, listen: &str) -> String {
    let mut b = Block::new();
    redirect_block(&mut b, server_name);
    https_head(&mut b, server_name, cert_path, key_path);

    b.line(
        1,
        "add_header Strict-Transport-Security \"max-age=31536000; includeSubDomains\" always;",
    )
    .line(1, "add_header X-Frame-Options \"SAMEORIGIN\" always;")
    .line(1, "add_header X-Content-Type-Options \"nosniff\" always;")
    .line(1, "add_header X-XSS-Protection \"1; mode=block\" always;")
    .blank()
    .line(1, "location / {")
    .line(2, &format!("proxy_pass http://127.0.0.1:{};", listen_port(listen)))
    .line(2, "proxy_set_header Host $host;")
    .line(2, "proxy_set_header X-Real-IP $remote_addr;")
    .line(2, "proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;")
    .line(2, "proxy_set_header X-Forwarded-Proto $scheme;")
    .blank()
    .line(2, "# WebSocket support")
    .line(2, "proxy_http_version 1.1;")
    .line(2, "proxy_set_header Upgrade $http_upgrade;")
    .line(2, "proxy_set_header Connection \"upgrade\";")
    .line(1, "}")
    .line(0, "}");
    b.out
}
