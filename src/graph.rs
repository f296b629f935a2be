//! Voice Signal Graph
//!
//! The node graph behind one voice. Modules live in a slot map and are
//! joined by cables. [`Graph::compile`] sorts them topologically and
//! resolves every input into a route over a flat buffer of output slots,
//! so a tick never searches the cable list. Inputs with several incoming
//! cables are summed, which is how sources are mixed into a filter or
//! panner.

use crate::param::ParamChange;
use crate::port::{GraphModule, ParamId, PortId, PortSpec, PortValues};
use slotmap::{DefaultKey, SlotMap};
use std::collections::{HashMap, VecDeque};
use tracing::trace;

/// Unique identifier for a node in the graph
pub type NodeId = DefaultKey;

/// Reference to a specific port on a specific node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub node: NodeId,
    pub port: PortId,
}

/// A cable connecting two ports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cable {
    pub from: PortRef,
    pub to: PortRef,
}

struct Node {
    module: Box<dyn GraphModule>,
    name: String,
}

/// Error types for graph operations
#[derive(Debug, Clone, PartialEq)]
pub enum GraphError {
    InvalidNode,
    InvalidPort(String),
    CycleDetected { nodes: Vec<NodeId> },
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphError::InvalidNode => write!(f, "Invalid node"),
            GraphError::InvalidPort(name) => write!(f, "Invalid port: {}", name),
            GraphError::CycleDetected { nodes } => {
                write!(f, "Cycle detected involving {} nodes", nodes.len())
            }
        }
    }
}

impl std::error::Error for GraphError {}

/// Handle returned by [`Graph::add`] for naming ports when wiring
#[derive(Clone)]
pub struct NodeHandle {
    id: NodeId,
    spec: PortSpec,
}

impl NodeHandle {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Reference an output port by name
    pub fn out(&self, name: &str) -> Result<PortRef, GraphError> {
        self.port(name, self.spec.output_by_name(name).map(|p| p.id))
    }

    /// Reference an input port by name
    pub fn in_(&self, name: &str) -> Result<PortRef, GraphError> {
        self.port(name, self.spec.input_by_name(name).map(|p| p.id))
    }

    fn port(&self, name: &str, id: Option<PortId>) -> Result<PortRef, GraphError> {
        let port = id.ok_or_else(|| GraphError::InvalidPort(name.to_string()))?;
        Ok(PortRef {
            node: self.id,
            port,
        })
    }
}

/// Where an input takes its value from during a tick
#[derive(Debug)]
enum Route {
    /// Sum of the given output slots
    Cables(Vec<usize>),
    /// Copy of a sibling input, or the fallback when the sibling is unset
    Normalled { sibling: PortId, fallback: f64 },
    Constant(f64),
}

#[derive(Debug)]
struct Step {
    node: NodeId,
    inputs: Vec<(PortId, Route)>,
    outputs: Vec<(PortId, usize)>,
}

/// Compiled execution plan
#[derive(Debug, Default)]
struct Plan {
    steps: Vec<Step>,
    slots: Vec<f64>,
    left: Option<usize>,
    right: Option<usize>,
}

/// A graph of modules and the cables between them
pub struct Graph {
    nodes: SlotMap<NodeId, Node>,
    cables: Vec<Cable>,
    output_node: Option<NodeId>,
    sample_rate: f64,
    plan: Option<Plan>,
    inputs: PortValues,
    outputs: PortValues,
}

impl Graph {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            nodes: SlotMap::new(),
            cables: Vec::new(),
            output_node: None,
            sample_rate,
            plan: None,
            inputs: PortValues::new(),
            outputs: PortValues::new(),
        }
    }

    /// Add a module; the graph must be compiled again before it sounds
    pub fn add<M: GraphModule + 'static>(
        &mut self,
        name: impl Into<String>,
        mut module: M,
    ) -> NodeHandle {
        module.set_sample_rate(self.sample_rate);
        let spec = module.port_spec().clone();
        let id = self.nodes.insert(Node {
            module: Box::new(module),
            name: name.into(),
        });
        self.plan = None;
        NodeHandle { id, spec }
    }

    /// Connect an output port to an input port
    pub fn connect(&mut self, from: PortRef, to: PortRef) -> Result<(), GraphError> {
        self.check_port(from, |spec, id| spec.output_by_id(id).is_some())?;
        self.check_port(to, |spec, id| spec.input_by_id(id).is_some())?;

        self.cables.push(Cable { from, to });
        self.plan = None;
        Ok(())
    }

    /// Ports 0 and 1 of this node become the graph's left and right output
    pub fn set_output(&mut self, node: NodeId) {
        self.output_node = Some(node);
        self.plan = None;
    }

    fn check_port(
        &self,
        port: PortRef,
        exists: impl Fn(&PortSpec, PortId) -> bool,
    ) -> Result<(), GraphError> {
        let node = self.nodes.get(port.node).ok_or(GraphError::InvalidNode)?;
        if exists(node.module.port_spec(), port.port) {
            Ok(())
        } else {
            Err(GraphError::InvalidPort(format!("{}.{}", node.name, port.port)))
        }
    }

    /// Schedule a parameter change on a module
    pub fn automate(
        &mut self,
        node: NodeId,
        param: ParamId,
        change: ParamChange,
    ) -> Result<(), GraphError> {
        let node = self.nodes.get_mut(node).ok_or(GraphError::InvalidNode)?;
        node.module.automate(param, change);
        Ok(())
    }

    pub fn get_param(&self, node: NodeId, param: ParamId) -> Option<f64> {
        self.nodes.get(node).and_then(|n| n.module.get_param(param))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn cable_count(&self) -> usize {
        self.cables.len()
    }

    pub fn is_compiled(&self) -> bool {
        self.plan.is_some()
    }

    /// Sort the nodes and resolve every input to its sources
    pub fn compile(&mut self) -> Result<(), GraphError> {
        let order = self.topological_sort()?;

        let mut slots: HashMap<PortRef, usize> = HashMap::new();
        for &id in &order {
            for output in &self.nodes[id].module.port_spec().outputs {
                let next = slots.len();
                slots.insert(PortRef { node: id, port: output.id }, next);
            }
        }

        let mut steps = Vec::with_capacity(order.len());
        for &id in &order {
            let spec = self.nodes[id].module.port_spec();
            let inputs = spec
                .inputs
                .iter()
                .map(|input| {
                    let to = PortRef { node: id, port: input.id };
                    let feeding: Vec<usize> = self
                        .cables
                        .iter()
                        .filter(|cable| cable.to == to)
                        .filter_map(|cable| slots.get(&cable.from).copied())
                        .collect();
                    let route = if !feeding.is_empty() {
                        Route::Cables(feeding)
                    } else if let Some(sibling) = input.normalled_to {
                        Route::Normalled {
                            sibling,
                            fallback: input.default,
                        }
                    } else {
                        Route::Constant(input.default)
                    };
                    (input.id, route)
                })
                .collect();
            let outputs = spec
                .outputs
                .iter()
                .filter_map(|output| {
                    let slot = slots.get(&PortRef { node: id, port: output.id })?;
                    Some((output.id, *slot))
                })
                .collect();
            steps.push(Step {
                node: id,
                inputs,
                outputs,
            });
        }

        let slot_of = |port| {
            self.output_node
                .and_then(|node| slots.get(&PortRef { node, port }).copied())
        };
        let plan = Plan {
            left: slot_of(0),
            right: slot_of(1),
            slots: vec![0.0; slots.len()],
            steps,
        };

        trace!(
            order = ?order
                .iter()
                .map(|&id| self.nodes[id].module.type_id())
                .collect::<Vec<_>>(),
            "graph compiled"
        );
        self.plan = Some(plan);
        Ok(())
    }

    fn topological_sort(&self) -> Result<Vec<NodeId>, GraphError> {
        let mut in_degree: HashMap<NodeId, usize> = self.nodes.keys().map(|k| (k, 0)).collect();
        let mut successors: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for cable in &self.cables {
            *in_degree.entry(cable.to.node).or_insert(0) += 1;
            successors
                .entry(cable.from.node)
                .or_default()
                .push(cable.to.node);
        }

        // Kahn's algorithm, seeded in insertion order so plans are stable
        let mut ready: VecDeque<NodeId> = self
            .nodes
            .keys()
            .filter(|id| in_degree.get(id) == Some(&0))
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(node) = ready.pop_front() {
            order.push(node);
            for next in successors.get(&node).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(next) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(*next);
                    }
                }
            }
        }

        if order.len() == self.nodes.len() {
            Ok(order)
        } else {
            let nodes = in_degree
                .into_iter()
                .filter(|&(_, degree)| degree > 0)
                .map(|(id, _)| id)
                .collect();
            Err(GraphError::CycleDetected { nodes })
        }
    }

    /// Process one sample and return the stereo output. An uncompiled
    /// graph is silent.
    pub fn tick(&mut self) -> (f64, f64) {
        let Self {
            nodes,
            plan,
            inputs,
            outputs,
            ..
        } = self;
        let Some(plan) = plan.as_mut() else {
            return (0.0, 0.0);
        };

        for step in &plan.steps {
            inputs.clear();
            for (port, route) in &step.inputs {
                let value = match route {
                    Route::Cables(feeding) => feeding.iter().map(|&s| plan.slots[s]).sum::<f64>(),
                    Route::Normalled { sibling, fallback } => inputs.get_or(*sibling, *fallback),
                    Route::Constant(value) => *value,
                };
                inputs.set(*port, value);
            }

            outputs.clear();
            if let Some(node) = nodes.get_mut(step.node) {
                node.module.tick(inputs, outputs);
            }
            for &(port, slot) in &step.outputs {
                if let Some(value) = outputs.get(port) {
                    plan.slots[slot] = value;
                }
            }
        }

        let left = plan.left.map_or(0.0, |s| plan.slots[s]);
        let right = plan.right.map_or(left, |s| plan.slots[s]);
        (left, right)
    }

    /// Stop every module and drop all nodes and cables.
    ///
    /// Returns the number of nodes that were removed.
    pub fn clear(&mut self) -> usize {
        let count = self.nodes.len();
        for (_, node) in &mut self.nodes {
            node.module.stop();
        }
        self.nodes.clear();
        self.cables.clear();
        self.output_node = None;
        self.plan = None;
        count
    }
}
