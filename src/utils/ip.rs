//! 客户端地址提取
//!
//! 限流按网络层地址计数：
//! - 默认使用 TCP 连接的对端 IP（无法伪造）
//! - 仅当对端属于配置的可信代理时，才采用 X-Forwarded-For / X-Real-IP

use std::net::{IpAddr, SocketAddr};

use actix_web::http::header::HeaderMap;
use tracing::debug;

/// 检查 IP 是否在可信代理列表中（支持单 IP 与 CIDR）
pub fn is_trusted_proxy(ip: &IpAddr, trusted_proxies: &[String]) -> bool {
    for proxy in trusted_proxies {
        if proxy.contains('/') {
            if ip_in_cidr(ip, proxy) {
                return true;
            }
        } else if let Ok(proxy_addr) = proxy.parse::<IpAddr>()
            && *ip == proxy_addr
        {
            return true;
        }
    }
    false
}

/// CIDR 检查
pub fn ip_in_cidr(ip: &IpAddr, cidr: &str) -> bool {
    let Some((network, prefix_len)) = cidr.split_once('/') else {
        return false;
    };

    let Ok(prefix_len): Result<u8, _> = prefix_len.parse() else {
        return false;
    };

    let Ok(network_addr) = network.parse::<IpAddr>() else {
        return false;
    };

    match (ip, network_addr) {
        (IpAddr::V4(ip), IpAddr::V4(net)) => {
            if prefix_len > 32 {
                return false;
            }
            let mask = u32::MAX.checked_shl(32 - prefix_len as u32).unwrap_or(0);
            let ip_bits = u32::from_be_bytes(ip.octets());
            let net_bits = u32::from_be_bytes(net.octets());
            (ip_bits & mask) == (net_bits & mask)
        }
        (IpAddr::V6(ip), IpAddr::V6(net)) => {
            if prefix_len > 128 {
                return false;
            }
            let mask = u128::MAX.checked_shl(128 - prefix_len as u32).unwrap_or(0);
            let ip_bits = u128::from_be_bytes(ip.octets());
            let net_bits = u128::from_be_bytes(net.octets());
            (ip_bits & mask) == (net_bits & mask)
        }
        _ => false, // IPv4 vs IPv6 不匹配
    }
}

/// 计算限流用的客户端标识
///
/// 返回 `None` 表示无法确定客户端身份，调用方必须拒绝请求。
pub fn client_identity(
    peer_addr: Option<SocketAddr>,
    headers: &HeaderMap,
    trusted_proxies: &[String],
) -> Option<String> {
    let peer_ip = peer_addr?.ip();

    if !trusted_proxies.is_empty() && is_trusted_proxy(&peer_ip, trusted_proxies) {
        if let Some(real_ip) = forwarded_ip(headers) {
            debug!("Trusted proxy {} forwarded client {}", peer_ip, real_ip);
            return Some(real_ip.to_string());
        }
        debug!("Trusted proxy {} sent no forwarding header", peer_ip);
    }

    Some(peer_ip.to_string())
}

/// 从请求头提取转发的 IP，只接受能解析为 IP 的值
fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse().ok())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.trim().parse().ok())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::{HeaderName, HeaderValue};

    fn headers_with(name: &'static str, value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
        headers
    }

    #[test]
    fn test_ip_in_cidr_ipv4() {
        let ip: IpAddr = "192.168.1.100".parse().unwrap();
        assert!(ip_in_cidr(&ip, "192.168.1.0/24"));
        assert!(ip_in_cidr(&ip, "192.168.0.0/16"));
        assert!(!ip_in_cidr(&ip, "192.168.2.0/24"));
        assert!(!ip_in_cidr(&ip, "10.0.0.0/8"));
    }

    #[test]
    fn test_ip_in_cidr_ipv6() {
        let ip: IpAddr = "2001:db8::1".parse().unwrap();
        assert!(ip_in_cidr(&ip, "2001:db8::/32"));
        assert!(!ip_in_cidr(&ip, "2001:db9::/32"));
    }

    #[test]
    fn test_peer_ip_without_port() {
        let peer: SocketAddr = "203.0.113.1:54321".parse().unwrap();
        let id = client_identity(Some(peer), &HeaderMap::new(), &[]);
        assert_eq!(id.as_deref(), Some("203.0.113.1"));
    }

    #[test]
    fn test_missing_peer_is_unknown() {
        assert!(client_identity(None, &HeaderMap::new(), &[]).is_none());
    }

    #[test]
    fn test_forwarded_header_ignored_for_untrusted_peer() {
        let peer: SocketAddr = "203.0.113.1:80".parse().unwrap();
        let headers = headers_with("x-forwarded-for", "198.51.100.7");
        let id = client_identity(Some(peer), &headers, &["10.0.0.0/8".to_string()]);
        assert_eq!(id.as_deref(), Some("203.0.113.1"));
    }

    #[test]
    fn test_forwarded_header_used_for_trusted_peer() {
        let peer: SocketAddr = "10.1.2.3:80".parse().unwrap();
        let headers = headers_with("x-forwarded-for", "198.51.100.7, 10.1.2.3");
        let id = client_identity(Some(peer), &headers, &["10.0.0.0/8".to_string()]);
        assert_eq!(id.as_deref(), Some("198.51.100.7"));
    }

    #[test]
    fn test_garbage_forwarded_header_falls_back_to_peer() {
        let peer: SocketAddr = "10.1.2.3:80".parse().unwrap();
        let headers = headers_with("x-forwarded-for", "not-an-ip");
        let id = client_identity(Some(peer), &headers, &["10.1.2.3".to_string()]);
        assert_eq!(id.as_deref(), Some("10.1.2.3"));
    }
}
