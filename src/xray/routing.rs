use serde::Serialize;
use tracing::debug;

use super::inbounds::API_TAG;
use crate::common::split_csv;
use crate::model::{RoutingRule, RuleType};

/// Xray `routing` 段
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingConfig {
    #[serde(rename = "domainStrategy")]
    pub domain_strategy: String,
    #[serde(rename = "domainMatcher")]
    pub domain_matcher: String,
    pub rules: Vec<RoutingDirective>,
}

/// 单条 `field` 路由规则；只会填充一个条件字段
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingDirective {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub domain: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ip: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub protocol: Vec<String>,
    #[serde(rename = "inboundTag", skip_serializing_if = "Vec::is_empty")]
    pub inbound_tag: Vec<String>,
    #[serde(rename = "outboundTag")]
    pub outbound_tag: String,
}

impl RoutingDirective {
    fn field(outbound_tag: &str) -> Self {
        Self {
            kind: "field".to_string(),
            domain: Vec::new(),
            ip: Vec::new(),
            protocol: Vec::new(),
            inbound_tag: Vec::new(),
            outbound_tag: outbound_tag.to_string(),
        }
    }
}

/// 编译路由规则
///
/// 管理 API 规则永远在第一位；其余按 priority 升序，
/// 同优先级保持输入顺序（稳定排序）。禁用的规则和条件为空的规则被丢弃。
pub fn compile_rules(rules: &[RoutingRule]) -> RoutingConfig {
    let mut directives = Vec::with_capacity(rules.len() + 1);

    let mut api = RoutingDirective::field(API_TAG);
    api.inbound_tag.push(API_TAG.to_string());
    directives.push(api);

    let mut sorted: Vec<&RoutingRule> = rules.iter().filter(|r| r.enabled).collect();
    // Vec::sort_by_key 是稳定排序
    sorted.sort_by_key(|r| r.priority);

    for rule in sorted {
        match compile_rule(rule) {
            Some(d) => directives.push(d),
            None => debug!(
                rule = rule.name.as_str(),
                kind = %rule.kind,
                "routing rule has no condition values, dropped"
            ),
        }
    }

    RoutingConfig {
        domain_strategy: "IPIfNonMatch".to_string(),
        domain_matcher: "hybrid".to_string(),
        rules: directives,
    }
}

/// 按规则类型翻译唯一的条件字段；条件为空返回 None
pub fn compile_rule(rule: &RoutingRule) -> Option<RoutingDirective> {
    let mut d = RoutingDirective::field(&rule.outbound_tag);
    match rule.kind {
        RuleType::Inbound => {
            let tag = rule.inbound_tag.trim();
            if tag.is_empty() {
                return None;
            }
            d.inbound_tag.push(tag.to_string());
        }
        RuleType::Domain => d.domain = split_csv(&rule.domains),
        RuleType::Ip => d.ip = split_csv(&rule.ips),
        RuleType::GeoSite => d.domain = prefixed("geosite:", &rule.geosite_tags),
        RuleType::GeoIp => d.ip = prefixed("geoip:", &rule.geoip_codes),
        RuleType::Protocol => d.protocol = split_csv(&rule.protocols),
    }

    let empty = d.domain.is_empty()
        && d.ip.is_empty()
        && d.protocol.is_empty()
        && d.inbound_tag.is_empty();
    (!empty).then_some(d)
}

fn prefixed(prefix: &str, csv: &str) -> Vec<String> {
    split_csv(csv)
        .into_iter()
        .map(|v| format!("{}{}", prefix, v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str, kind: RuleType, value: &str, priority: i32) -> RoutingRule {
        RoutingRule::new(name, kind, "direct")
            .with_value(value)
            .with_priority(priority)
    }

    fn names(cfg: &RoutingConfig) -> Vec<String> {
        cfg.rules[1..]
            .iter()
            .map(|d| d.domain.join(","))
            .collect()
    }

    #[test]
    fn api_rule_is_first() {
        let cfg = compile_rules(&[]);
        assert_eq!(cfg.rules.len(), 1);
        assert_eq!(cfg.rules[0].inbound_tag, vec!["api"]);
        assert_eq!(cfg.rules[0].outbound_tag, "api");
        assert_eq!(cfg.domain_strategy, "IPIfNonMatch");
        assert_eq!(cfg.domain_matcher, "hybrid");
    }

    #[test]
    fn priority_sort_is_stable() {
        let rules = vec![
            rule("A", RuleType::Domain, "a.com", 50),
            rule("B", RuleType::Domain, "b.com", 10),
            rule("C", RuleType::Domain, "c.com", 50),
        ];
        let cfg = compile_rules(&rules);
        assert_eq!(names(&cfg), vec!["b.com", "a.com", "c.com"]);
    }

    #[test]
    fn stable_across_many_equal_priorities() {
        let rules: Vec<RoutingRule> = (0..40)
            .map(|i| rule(&i.to_string(), RuleType::Domain, &format!("d{}.com", i), i % 3))
            .collect();
        let cfg = compile_rules(&rules);
        let mut expected = Vec::new();
        for p in 0..3 {
            for i in (0..40).filter(|i| i % 3 == p) {
                expected.push(format!("d{}.com", i));
            }
        }
        assert_eq!(names(&cfg), expected);
    }

    #[test]
    fn geosite_and_geoip_prefixes() {
        let site = compile_rule(&rule("s", RuleType::GeoSite, "cn, geolocation-cn", 1)).unwrap();
        assert_eq!(site.domain, vec!["geosite:cn", "geosite:geolocation-cn"]);
        assert!(site.ip.is_empty());

        let ip = compile_rule(&rule("i", RuleType::GeoIp, "cn,private", 1)).unwrap();
        assert_eq!(ip.ip, vec!["geoip:cn", "geoip:private"]);
        assert!(ip.domain.is_empty());
    }

    #[test]
    fn pass_through_types() {
        let inbound = compile_rule(&rule("in", RuleType::Inbound, "ws-in", 1)).unwrap();
        assert_eq!(inbound.inbound_tag, vec!["ws-in"]);

        let proto = compile_rule(&rule("p", RuleType::Protocol, "bittorrent", 1)).unwrap();
        assert_eq!(proto.protocol, vec!["bittorrent"]);

        let ips = compile_rule(&rule("ip", RuleType::Ip, "10.0.0.0/8, 1.1.1.1", 1)).unwrap();
        assert_eq!(ips.ip, vec!["10.0.0.0/8", "1.1.1.1"]);
    }

    #[test]
    fn empty_and_disabled_rules_dropped() {
        let mut disabled = rule("off", RuleType::Domain, "x.com", 1);
        disabled.enabled = false;
        let rules = vec![
            rule("empty", RuleType::Domain, " , ,", 1),
            rule("no-inbound", RuleType::Inbound, "", 2),
            disabled,
            // geosite 规则只填了 domains 字段
            {
                let mut r = RoutingRule::new("mismatch", RuleType::GeoSite, "direct");
                r.domains = "z.com".into();
                r.with_priority(3)
            },
            rule("kept", RuleType::Domain, "y.com", 4),
        ];
        let cfg = compile_rules(&rules);
        assert_eq!(cfg.rules.len(), 2);
        assert_eq!(cfg.rules[1].domain, vec!["y.com"]);
    }

    #[test]
    fn serialized_shape_omits_empty_conditions() {
        let cfg = compile_rules(&[rule("g", RuleType::GeoIp, "cn", 1)]);
        let v = serde_json::to_value(&cfg.rules[1]).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"type": "field", "ip": ["geoip:cn"], "outboundTag": "direct"})
        );
    }
}
