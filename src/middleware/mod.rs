use actix_web::guard;
use std::net::SocketAddr;

/// Client IPs allowed on the admin API, parsed from `ADMIN_ACCEPT_IP`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedIps {
    Any,
    List(Vec<String>),
}

impl AllowedIps {
    /// `*` allows everyone; an empty value allows no one.
    pub fn parse(raw: &str) -> Self {
        if raw.trim() == "*" {
            return Self::Any;
        }
        Self::List(
            raw.split(',')
                .map(|ip| ip.trim().to_string())
                .filter(|ip| !ip.is_empty())
                .collect(),
        )
    }

    pub fn permits(&self, ip: &str) -> bool {
        match self {
            Self::Any => true,
            Self::List(ips) => ips.iter().any(|allowed| allowed == ip),
        }
    }

    pub fn denies_everyone(&self) -> bool {
        matches!(self, Self::List(ips) if ips.is_empty())
    }
}

/// The real client IP, considering reverse proxies: the first entry of
/// `X-Forwarded-For`, else the socket peer.
pub fn client_ip(forwarded_for: Option<&str>, peer_addr: Option<SocketAddr>) -> Option<String> {
    forwarded_for
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| peer_addr.map(|addr| addr.ip().to_string()))
}

/// Guard for the admin scope. Non-matching requests fall through to 404.
pub fn admin_ip_guard(allowed: AllowedIps) -> impl guard::Guard {
    guard::fn_guard(move |ctx| {
        if let AllowedIps::Any = allowed {
            return true;
        }

        let forwarded_for = ctx.head().headers().get("X-Forwarded-For").and_then(|v| v.to_str().ok());
        let request_ip = match client_ip(forwarded_for, ctx.head().peer_addr) {
            Some(ip) => ip,
            None => {
                log::warn!("Could not determine peer IP address for admin request.");
                return false;
            }
        };

        let is_allowed = allowed.permits(&request_ip);
        if !is_allowed {
            log::warn!("Blocked admin request from unauthorized IP: {}", request_ip);
        }
        is_allowed
    })
}
