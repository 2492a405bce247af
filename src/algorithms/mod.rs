pub mod apps;
pub mod end_system;
pub mod flooding;
pub mod naive;

use crate::error::{SimError, SimResult};
use crate::network::{Interface, Packet};
use crate::node::NodeContext;
use std::collections::HashMap;

/// Control plane of a node: routing, forwarding and control packets.
///
/// Every callback runs synchronously inside the owning node's processing
/// step; `ctx.now()` is the current virtual time.
pub trait ControlAlgorithm {
    fn name(&self) -> &str;

    /// Called once at time 0. Returns the clock tick period in ms, 0 for none.
    fn initialise(&mut self, ctx: &mut NodeContext<'_>) -> SimResult<u64>;

    fn on_clock_tick(&mut self, _ctx: &mut NodeContext<'_>) -> SimResult<()> {
        Ok(())
    }

    fn on_timeout(&mut self, _ctx: &mut NodeContext<'_>) -> SimResult<()> {
        Ok(())
    }

    fn on_link_up(&mut self, _ctx: &mut NodeContext<'_>, _interface: usize) -> SimResult<()> {
        Ok(())
    }

    fn on_link_down(&mut self, _ctx: &mut NodeContext<'_>, _interface: usize) -> SimResult<()> {
        Ok(())
    }

    /// A control packet addressed to this node arrived on `interface`.
    fn on_receive(
        &mut self,
        _ctx: &mut NodeContext<'_>,
        _packet: Packet,
        _interface: Interface,
    ) -> SimResult<()> {
        Ok(())
    }

    /// Pick the outgoing interface for a packet in transit, or one sent
    /// locally (`interface` is then `Interface::Local`).
    fn forward_packet(
        &mut self,
        ctx: &mut NodeContext<'_>,
        packet: Packet,
        interface: Interface,
    ) -> SimResult<()>;

    fn show_routing_table(&self, _now: u64) {}

    fn show_control_state(&self, _now: u64) {}
}

/// Application plane of a node: produces and consumes data packets.
pub trait ApplicationAlgorithm {
    fn name(&self) -> &str;

    /// Called once at time 0 with the node's arguments. Returns the clock
    /// tick period in ms, 0 for none.
    fn initialise(&mut self, ctx: &mut NodeContext<'_>, args: &[String]) -> SimResult<u64>;

    fn on_clock_tick(&mut self, _ctx: &mut NodeContext<'_>) -> SimResult<()> {
        Ok(())
    }

    fn on_timeout(&mut self, _ctx: &mut NodeContext<'_>) -> SimResult<()> {
        Ok(())
    }

    fn on_receive(&mut self, _ctx: &mut NodeContext<'_>, _packet: Packet) -> SimResult<()> {
        Ok(())
    }

    fn show_state(&self, _now: u64) {}
}

type ControlFactory = Box<dyn Fn() -> Box<dyn ControlAlgorithm>>;
type ApplicationFactory = Box<dyn Fn() -> Box<dyn ApplicationAlgorithm>>;

/// Name-keyed factories for both algorithm planes.
///
/// Lookups ignore case and any dotted package prefix, so
/// `cnss.examples.FloodingSwControl` and `floodingswcontrol` name the same
/// algorithm.
pub struct AlgorithmRegistry {
    control: HashMap<String, ControlFactory>,
    application: HashMap<String, ApplicationFactory>,
}

impl AlgorithmRegistry {
    /// A registry with nothing in it.
    pub fn empty() -> Self {
        Self {
            control: HashMap::new(),
            application: HashMap::new(),
        }
    }

    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_builtin();
        registry
    }

    fn register_builtin(&mut self) {
        self.register_control("end-system", || Box::new(end_system::EndSystemControl::new()));
        self.register_control("endsystemcontrol", || Box::new(end_system::EndSystemControl::new()));
        self.register_control("flooding-switch", || Box::new(flooding::FloodingSwControl::new()));
        self.register_control("floodingswcontrol", || Box::new(flooding::FloodingSwControl::new()));

        self.register_application("empty", || Box::new(apps::EmptyApp::new()));
        self.register_application("emptyapp", || Box::new(apps::EmptyApp::new()));
        self.register_application("simple-sender", || Box::new(apps::SimpleSender::new()));
        self.register_application("simplesender", || Box::new(apps::SimpleSender::new()));
        self.register_application("simple-receiver", || Box::new(apps::SimpleReceiver::new()));
        self.register_application("simplereceiver", || Box::new(apps::SimpleReceiver::new()));
        self.register_application("bulk-sender", || Box::new(apps::SimpleBulkSender::new()));
        self.register_application("simplebulksender", || Box::new(apps::SimpleBulkSender::new()));
        self.register_application("naive-sw-sender", || Box::new(naive::StopAndWaitSender::new()));
        self.register_application("simplenaifswsender", || {
            Box::new(naive::StopAndWaitSender::new())
        });
        self.register_application("naive-sw-receiver", || {
            Box::new(naive::StopAndWaitReceiver::new())
        });
        self.register_application("simplenaifswreceiver", || {
            Box::new(naive::StopAndWaitReceiver::new())
        });
        self.register_application("naive-tcp-sender", || Box::new(naive::WindowSender::new()));
        self.register_application("simplenaiftcpsender", || Box::new(naive::WindowSender::new()));
        self.register_application("naive-tcp-receiver", || Box::new(naive::WindowReceiver::new()));
        self.register_application("simplenaiftcpreceiver", || {
            Box::new(naive::WindowReceiver::new())
        });
    }

    pub fn register_control<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn ControlAlgorithm> + 'static,
    {
        self.control.insert(normalize(name), Box::new(factory));
    }

    pub fn register_application<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn ApplicationAlgorithm> + 'static,
    {
        self.application.insert(normalize(name), Box::new(factory));
    }

    pub fn create_control(&self, name: &str) -> SimResult<Box<dyn ControlAlgorithm>> {
        self.control
            .get(&normalize(name))
            .map(|factory| factory())
            .ok_or_else(|| SimError::UnknownControlAlgorithm(name.to_string()))
    }

    pub fn create_application(&self, name: &str) -> SimResult<Box<dyn ApplicationAlgorithm>> {
        self.application
            .get(&normalize(name))
            .map(|factory| factory())
            .ok_or_else(|| SimError::UnknownApplicationAlgorithm(name.to_string()))
    }

    pub fn control_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.control.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn application_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.application.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for AlgorithmRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase and drop everything up to the last `.`.
pub fn normalize(name: &str) -> String {
    let short = name.rsplit('.').next().unwrap_or(name);
    short.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("cnss.examples.FloodingSwControl"), "floodingswcontrol");
        assert_eq!(normalize("Empty"), "empty");
        assert_eq!(normalize("flooding-switch"), "flooding-switch");
    }

    #[test]
    fn test_builtin_lookup() {
        let registry = AlgorithmRegistry::new();
        assert_eq!(registry.create_control("end-system").unwrap().name(), "end system");
        assert_eq!(
            registry.create_control("cnss.examples.FloodingSwControl").unwrap().name(),
            "flooding switch"
        );
        assert_eq!(registry.create_application("EMPTY").unwrap().name(), "empty app");
        assert_eq!(
            registry.create_application("cnss.examples.SimpleNaifTCPSender").unwrap().name(),
            "naive window sender"
        );
        assert_eq!(
            registry.create_application("naive-sw-receiver").unwrap().name(),
            "naive stop-and-wait receiver"
        );
    }

    #[test]
    fn test_unknown_names() {
        let registry = AlgorithmRegistry::new();
        assert_eq!(
            registry.create_control("ospf").err(),
            Some(SimError::UnknownControlAlgorithm("ospf".into()))
        );
        assert!(matches!(
            registry.create_application("nope"),
            Err(SimError::UnknownApplicationAlgorithm(_))
        ));
    }

    #[test]
    fn test_empty_registry_and_listing() {
        let mut registry = AlgorithmRegistry::empty();
        assert!(registry.control_names().is_empty());
        registry.register_application("Mine", || Box::new(apps::EmptyApp::new()));
        assert_eq!(registry.application_names(), vec!["mine".to_string()]);
        assert!(AlgorithmRegistry::new().control_names().contains(&"end-system".to_string()));
    }
}
