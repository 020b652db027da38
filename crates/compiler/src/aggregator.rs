//! fluentd configuration.
//!
//! Each tag gets one `<match>` with copy semantics: every record is
//! duplicated to all of the tag's stores rather than routed to the first
//! that matches.

use logpipe_core::{OutputSpec, SinkType};

use crate::routing::{Route, RoutingSpec};

/// Port the aggregator accepts forwarded records on.
pub const FORWARD_PORT: u16 = 8777;

/// Environment variables of the aggregator process holding the search endpoint.
pub const SEARCH_HOST_ENV: &str = "ES_HOST";
pub const SEARCH_PORT_ENV: &str = "ES_PORT";
pub const SEARCH_SCHEME_ENV: &str = "ES_SCHEME";

pub fn render(spec: &RoutingSpec) -> String {
    let mut directives = vec![source(), timestamp_check()];
    directives.extend(spec.routes.iter().map(route));
    directives.join("\n")
}

fn source() -> String {
    format!("<source>\n  @type forward\n  port {FORWARD_PORT}\n  bind 0.0.0.0\n</source>\n")
}

fn timestamp_check() -> String {
    "<filter **>\n  @type elasticsearch_timestamp_check\n</filter>\n".to_string()
}

fn route(route: &Route) -> String {
    let stores: String = route.outputs.iter().map(store).collect();
    format!("<match {}**>\n  @type copy\n{stores}</match>\n", route.tag)
}

fn store(output: &OutputSpec) -> String {
    let params = match output.sink {
        SinkType::SearchEngine => vec![
            format!("@type {}", output.sink.plugin()),
            env_param("host", SEARCH_HOST_ENV),
            env_param("port", SEARCH_PORT_ENV),
            env_param("scheme", SEARCH_SCHEME_ENV),
            "logstash_format true".to_string(),
            format!("logstash_prefix {}", output.index_pattern),
            "flush_interval 1s".to_string(),
        ],
        SinkType::Stdout => vec![format!("@type {}", output.sink.plugin())],
    };
    let body: String = params.iter().map(|line| format!("    {line}\n")).collect();
    format!("  <store>\n{body}  </store>\n")
}

fn env_param(key: &str, var: &str) -> String {
    format!("{key} \"#{{ENV['{var}']}}\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_env_param_uses_ruby_interpolation() {
        assert_eq!(env_param("host", "ES_HOST"), "host \"#{ENV['ES_HOST']}\"");
    }

    #[test]
    fn test_stdout_store_is_a_stub() {
        assert_eq!(
            store(&OutputSpec::stdout()),
            "  <store>\n    @type stdout\n  </store>\n"
        );
    }

    #[test]
    fn test_route_fans_out_to_every_output() {
        let rendered = route(&Route {
            tag: "shop".into(),
            paths: Vec::new(),
            parsers: Vec::new(),
            outputs: vec![OutputSpec::search_engine("shop-*"), OutputSpec::stdout()],
        });

        assert!(rendered.starts_with("<match shop**>\n  @type copy\n"));
        assert_eq!(rendered.matches("<store>").count(), 2);
        assert!(rendered.contains("    logstash_prefix shop-*\n"));
    }

    #[test]
    fn test_empty_routing_keeps_source_and_filter() {
        let spec = RoutingSpec {
            log_level: "info".into(),
            log_file: String::new(),
            include_k8s_metadata: false,
            parsers: Vec::new(),
            routes: Vec::new(),
        };
        let rendered = render(&spec);

        assert!(rendered.contains("port 8777"));
        assert!(rendered.contains("<filter **>"));
        assert!(!rendered.contains("<match"));
    }
}
