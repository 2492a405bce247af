//! Scenario files.
//!
//! One directive per line, whitespace separated, keyword case-insensitive:
//!
//! ```text
//! parameter stop 5000
//! node 0 1 end-system simple-sender 1
//! node 1 1 end-system simple-receiver
//! link 0.0 1.0 1000000 10 0.0 0.0 up
//! traceroute 100 0 1
//! downlink 2000 0.0 1.0
//! dumppacketstats 4000 all
//! ```

use super::event::EventKind;
use super::parameters::{GlobalParameters, SEED, STOP_TIME};
use crate::error::ConfigError;
use crate::network::{Endpoint, NodeId};
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub line: usize,
    pub id: NodeId,
    pub interfaces: usize,
    pub control: String,
    pub application: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkSpec {
    pub line: usize,
    pub a: Endpoint,
    pub b: Endpoint,
    pub bandwidth_bps: u64,
    pub latency_ms: u64,
    pub error_rate: f64,
    pub jitter: f64,
    pub up: bool,
}

/// An administrative event to be queued before the run starts.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledAction {
    pub line: usize,
    pub time: u64,
    pub kind: EventKind,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenarioConfig {
    pub parameters: GlobalParameters,
    pub nodes: Vec<NodeSpec>,
    pub links: Vec<LinkSpec>,
    pub actions: Vec<ScheduledAction>,
}

impl ScenarioConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for (index, raw) in text.lines().enumerate() {
            let content = raw.split('#').next().unwrap_or_default();
            let tokens: Vec<&str> = content.split_whitespace().collect();
            if tokens.len() <= 1 {
                continue;
            }
            let line = Line {
                number: index + 1,
                directive: tokens[0].to_lowercase(),
                tokens,
            };
            config.apply(&line)?;
        }
        Ok(config)
    }

    fn apply(&mut self, line: &Line<'_>) -> Result<(), ConfigError> {
        match line.directive.as_str() {
            "parameter" => {
                let name = line.field(1, "name")?;
                let value = line.field(2, "value")?;
                if name == STOP_TIME || name == SEED {
                    line.value::<u64>(2, name_field(name))?;
                }
                self.parameters.put(name, value);
            }
            "node" => {
                let spec = NodeSpec {
                    line: line.number,
                    id: NodeId::new(line.value(1, "node id")?),
                    interfaces: line.value(2, "interface count")?,
                    control: line.field(3, "control algorithm")?.to_string(),
                    application: line.field(4, "application algorithm")?.to_string(),
                    args: line.tokens.iter().skip(5).map(|s| s.to_string()).collect(),
                };
                self.nodes.push(spec);
            }
            "link" => {
                let spec = LinkSpec {
                    line: line.number,
                    a: line.endpoint(1)?,
                    b: line.endpoint(2)?,
                    bandwidth_bps: line.value(3, "bandwidth")?,
                    latency_ms: line.value(4, "latency")?,
                    error_rate: line.value(5, "error rate")?,
                    jitter: line.value(6, "jitter")?,
                    up: match line.tokens.get(7).map(|s| s.to_lowercase()) {
                        None => true,
                        Some(state) if state == "up" => true,
                        Some(state) if state == "down" => false,
                        Some(state) => {
                            return Err(line.invalid(format!(
                                "link state must be up or down, got `{}`",
                                state
                            )));
                        }
                    },
                };
                if spec.bandwidth_bps == 0 {
                    return Err(line.invalid("bandwidth must be positive".into()));
                }
                if !(0.0..=1.0).contains(&spec.error_rate) {
                    return Err(line.invalid(format!(
                        "error rate {} is outside [0, 1]",
                        spec.error_rate
                    )));
                }
                if spec.jitter < 0.0 {
                    return Err(line.invalid(format!("jitter {} is negative", spec.jitter)));
                }
                self.links.push(spec);
            }
            "traceroute" => {
                let src: u32 = line.value(2, "source node")?;
                let dst: u32 = line.value(3, "destination node")?;
                self.schedule(line, EventKind::Traceroute, vec![src.to_string(), dst.to_string()])?;
            }
            "uplink" | "downlink" => {
                let a = line.endpoint(2)?;
                let b = line.endpoint(3)?;
                let kind = if line.directive == "uplink" {
                    EventKind::LinkUp
                } else {
                    EventKind::LinkDown
                };
                let args = vec![
                    a.node.to_string(),
                    a.interface.to_string(),
                    b.node.to_string(),
                    b.interface.to_string(),
                ];
                self.schedule(line, kind, args)?;
            }
            "dumproutes" | "dumpcontrolstate" | "dumpappstate" | "dumppacketstats" => {
                let target = line.field(2, "target")?;
                if !target.eq_ignore_ascii_case("all") {
                    line.value::<u32>(2, "target node")?;
                }
                let kind = match line.directive.as_str() {
                    "dumproutes" => EventKind::DumpRoutes,
                    "dumpcontrolstate" => EventKind::DumpControlState,
                    "dumpappstate" => EventKind::DumpAppState,
                    _ => EventKind::DumpPacketStats,
                };
                self.schedule(line, kind, vec![target.to_lowercase()])?;
            }
            _ => {
                return Err(ConfigError::UnknownDirective {
                    line: line.number,
                    directive: line.tokens[0].to_string(),
                });
            }
        }
        Ok(())
    }

    fn schedule(
        &mut self,
        line: &Line<'_>,
        kind: EventKind,
        args: Vec<String>,
    ) -> Result<(), ConfigError> {
        self.actions.push(ScheduledAction {
            line: line.number,
            time: line.value(1, "time")?,
            kind,
            args,
        });
        Ok(())
    }

    pub fn stop_time(&self) -> u64 {
        self.parameters.stop_time()
    }

    pub fn seed(&self) -> u64 {
        self.parameters.seed()
    }
}

fn name_field(name: &str) -> &'static str {
    if name == STOP_TIME { "stop time" } else { "seed" }
}

struct Line<'a> {
    number: usize,
    directive: String,
    tokens: Vec<&'a str>,
}

impl<'a> Line<'a> {
    fn field(&self, index: usize, field: &'static str) -> Result<&'a str, ConfigError> {
        self.tokens
            .get(index)
            .copied()
            .ok_or_else(|| ConfigError::MissingField {
                line: self.number,
                directive: self.directive.clone(),
                field,
            })
    }

    fn value<T: FromStr>(&self, index: usize, field: &'static str) -> Result<T, ConfigError> {
        let value = self.field(index, field)?;
        value.parse().map_err(|_| ConfigError::InvalidNumber {
            line: self.number,
            field,
            value: value.to_string(),
        })
    }

    fn endpoint(&self, index: usize) -> Result<Endpoint, ConfigError> {
        let value = self.field(index, "endpoint")?;
        let invalid = || ConfigError::InvalidEndpoint {
            line: self.number,
            value: value.to_string(),
        };
        let (node, interface) = value.split_once('.').ok_or_else(invalid)?;
        let node = node.parse().map_err(|_| invalid())?;
        let interface = interface.parse().map_err(|_| invalid())?;
        Ok(Endpoint::new(node, interface))
    }

    fn invalid(&self, message: String) -> ConfigError {
        ConfigError::InvalidValue {
            line: self.number,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = "\
# two hosts and a switch
parameter stop 5000
Parameter seed 7
node 0 1 end-system simple-sender 2
node 1 2 cnss.examples.FloodingSwControl empty
node 2 1 end-system simple-receiver
link 0.0 1.0 1000000 10 0.0 0.0
LINK 1.1 2.0 2000000 5 0.01 0.1 down   # starts down
traceroute 100 0 2
uplink 200 1.1 2.0
downlink 300 2.0 1.1
dumppacketstats 400 all
DumpRoutes 400 1
";

    #[test]
    fn test_parse_scenario() {
        let config = ScenarioConfig::parse(SCENARIO).unwrap();
        assert_eq!(config.stop_time(), 5000);
        assert_eq!(config.seed(), 7);

        assert_eq!(config.nodes.len(), 3);
        assert_eq!(config.nodes[0].args, vec!["2".to_string()]);
        assert_eq!(config.nodes[1].control, "cnss.examples.FloodingSwControl");
        assert_eq!(config.nodes[1].interfaces, 2);
        assert!(config.nodes[2].args.is_empty());

        assert_eq!(config.links.len(), 2);
        assert!(config.links[0].up);
        assert!(!config.links[1].up);
        assert_eq!(config.links[1].a, Endpoint::new(1, 1));
        assert_eq!(config.links[1].error_rate, 0.01);

        let kinds: Vec<_> = config.actions.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::Traceroute,
                EventKind::LinkUp,
                EventKind::LinkDown,
                EventKind::DumpPacketStats,
                EventKind::DumpRoutes
            ]
        );
        assert_eq!(config.actions[0].args, vec!["0", "2"]);
        assert_eq!(config.actions[2].args, vec!["2", "0", "1", "1"]);
        assert_eq!(config.actions[4].time, 400);
    }

    #[test]
    fn test_blank_and_single_token_lines_ignored() {
        let config = ScenarioConfig::parse("\n   \nlonely\n# only a comment\n").unwrap();
        assert_eq!(config, ScenarioConfig::default());
    }

    #[test]
    fn test_unknown_directive() {
        let err = ScenarioConfig::parse("parameter stop 10\nrouter 1 2\n").unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownDirective {
                line: 2,
                directive: "router".into()
            }
        );
    }

    #[test]
    fn test_missing_and_bad_fields() {
        assert!(matches!(
            ScenarioConfig::parse("node 1 2 end-system"),
            Err(ConfigError::MissingField { line: 1, field: "application algorithm", .. })
        ));
        assert!(matches!(
            ScenarioConfig::parse("node x 1 a b"),
            Err(ConfigError::InvalidNumber { field: "node id", .. })
        ));
        assert!(matches!(
            ScenarioConfig::parse("\nlink 0-0 1.0 1 1 0 0"),
            Err(ConfigError::InvalidEndpoint { line: 2, .. })
        ));
        assert!(matches!(
            ScenarioConfig::parse("parameter stop soon"),
            Err(ConfigError::InvalidNumber { field: "stop time", .. })
        ));
        assert!(matches!(
            ScenarioConfig::parse("dumproutes 10 some"),
            Err(ConfigError::InvalidNumber { field: "target node", .. })
        ));
    }

    #[test]
    fn test_link_validation() {
        assert!(matches!(
            ScenarioConfig::parse("link 0.0 1.0 0 1 0 0"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            ScenarioConfig::parse("link 0.0 1.0 10 1 1.5 0"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            ScenarioConfig::parse("link 0.0 1.0 10 1 0 -0.5"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            ScenarioConfig::parse("link 0.0 1.0 10 1 0 0 sideways"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = ScenarioConfig::from_path("/definitely/not/here.cfg").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
