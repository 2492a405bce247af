//! Error types for the simulator.
//!
//! Every variant is fatal: configuration problems stop the run before it
//! starts, invariant violations and algorithm misuse stop it on the spot.
//! Packet loss is modeled behaviour and never shows up here.

use crate::network::{Interface, NodeId};
use crate::node::Plane;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("line {line}: unknown directive `{directive}`")]
    UnknownDirective { line: usize, directive: String },

    #[error("line {line}: `{directive}` is missing {field}")]
    MissingField {
        line: usize,
        directive: String,
        field: &'static str,
    },

    #[error("line {line}: cannot parse {field} from `{value}`")]
    InvalidNumber {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("line {line}: `{value}` is not a <node>.<interface> endpoint")]
    InvalidEndpoint { line: usize, value: String },

    #[error("line {line}: {message}")]
    InvalidValue { line: usize, message: String },

    #[error("cannot read {path}: {message}")]
    Io { path: String, message: String },
}

#[derive(Debug, Error, PartialEq)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unknown control algorithm `{0}`")]
    UnknownControlAlgorithm(String),

    #[error("unknown application algorithm `{0}`")]
    UnknownApplicationAlgorithm(String),

    #[error("node {0} is defined twice")]
    DuplicateNode(NodeId),

    #[error("node {0} does not exist")]
    UnknownNode(NodeId),

    #[error("node {node} has no interface {interface} (it has {count})")]
    BadEndpoint {
        node: NodeId,
        interface: usize,
        count: usize,
    },

    #[error("interface {node}.{interface} is already attached to a link")]
    InterfaceInUse { node: NodeId, interface: usize },

    #[error("no link joins {a_node}.{a_interface} and {b_node}.{b_interface}")]
    NoSuchLink {
        a_node: NodeId,
        a_interface: usize,
        b_node: NodeId,
        b_interface: usize,
    },

    #[error("node {node}: {plane} timeout must be >= 1ms, got {ms}")]
    InvalidTimeout { node: NodeId, plane: Plane, ms: u64 },

    #[error("node {node}: interface {interface} is not usable here")]
    InvalidInterface { node: NodeId, interface: Interface },

    #[error("node {node}: can only send locally originated data packets (origin {origin})")]
    ForeignDataPacket { node: NodeId, origin: NodeId },

    #[error("node {node}: send(DataPacket) called with a {kind} packet")]
    NotDataPacket { node: NodeId, kind: String },

    #[error("node {node}: algorithm error: {message}")]
    Algorithm { node: NodeId, message: String },

    #[error("link {link}: transmit finished with non-empty output queues")]
    TransmitQueueNotEmpty { link: String },

    #[error("node {node} at {now}: event out of order: {event}")]
    EventOutOfOrder {
        node: NodeId,
        now: u64,
        event: String,
    },

    #[error("at {now}: new event is not in the future: {event}")]
    EventInPast { now: u64, event: String },

    #[error("event addressed to unknown node: {0}")]
    UnroutableEvent(String),

    #[error("malformed event {event}: {reason}")]
    MalformedEvent { event: String, reason: String },

    #[error("simulation ended with {0} events still queued")]
    QueueNotDrained(usize),
}

pub type SimResult<T> = Result<T, SimError>;
