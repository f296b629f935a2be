//! Ports and the node interface
//!
//! Every node of a voice graph implements [`GraphModule`]: it declares its
//! ports once in a [`PortSpec`] and is then ticked one sample at a time with
//! the values on its inputs.

use crate::param::ParamChange;

/// Port number, unique among a module's inputs (or among its outputs)
pub type PortId = u32;

/// Automatable parameter number, unique within a module
pub type ParamId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// Audio-rate signal, nominally within ±1
    Audio,
    /// Modulation in physical units (Hz offset for filter cutoff)
    Modulation,
}

#[derive(Debug, Clone)]
pub struct PortDef {
    pub id: PortId,
    /// Name used when wiring ("in", "fm", "left")
    pub name: &'static str,
    pub kind: SignalKind,
    /// Value seen on an unpatched input
    pub default: f64,
    /// For inputs: sibling input whose value is used when unpatched
    pub normalled_to: Option<PortId>,
}

impl PortDef {
    pub fn new(id: PortId, name: &'static str, kind: SignalKind) -> Self {
        Self {
            id,
            name,
            kind,
            default: 0.0,
            normalled_to: None,
        }
    }

    pub fn with_default(mut self, default: f64) -> Self {
        self.default = default;
        self
    }

    pub fn normalled_to(mut self, sibling: PortId) -> Self {
        self.normalled_to = Some(sibling);
        self
    }
}

/// Inputs and outputs of a module
#[derive(Debug, Clone, Default)]
pub struct PortSpec {
    pub inputs: Vec<PortDef>,
    pub outputs: Vec<PortDef>,
}

impl PortSpec {
    pub fn input_by_name(&self, name: &str) -> Option<&PortDef> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output_by_name(&self, name: &str) -> Option<&PortDef> {
        self.outputs.iter().find(|p| p.name == name)
    }

    pub fn input_by_id(&self, id: PortId) -> Option<&PortDef> {
        self.inputs.iter().find(|p| p.id == id)
    }

    pub fn output_by_id(&self, id: PortId) -> Option<&PortDef> {
        self.outputs.iter().find(|p| p.id == id)
    }
}

/// Per-sample port values.
///
/// Modules have a handful of ports, so a linear scan over a reused vector
/// beats hashing and never allocates once warmed up.
#[derive(Debug, Clone, Default)]
pub struct PortValues {
    entries: Vec<(PortId, f64)>,
}

impl PortValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: PortId) -> Option<f64> {
        self.entries
            .iter()
            .find(|(port, _)| *port == id)
            .map(|&(_, value)| value)
    }

    pub fn get_or(&self, id: PortId, default: f64) -> f64 {
        self.get(id).unwrap_or(default)
    }

    pub fn set(&mut self, id: PortId, value: f64) {
        match self.entries.iter_mut().find(|(port, _)| *port == id) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((id, value)),
        }
    }

    /// Keeps the capacity
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// A node of a voice graph
pub trait GraphModule: Send {
    fn port_spec(&self) -> &PortSpec;

    /// Process one sample
    fn tick(&mut self, inputs: &PortValues, outputs: &mut PortValues);

    fn set_sample_rate(&mut self, sample_rate: f64);

    /// Current value of an automatable parameter
    fn get_param(&self, _id: ParamId) -> Option<f64> {
        None
    }

    /// Schedule a change on an automatable parameter
    fn automate(&mut self, _id: ParamId, _change: ParamChange) {}

    /// Release anything the module holds outside the graph (open streams).
    /// Called once, right before the node is dropped.
    fn stop(&mut self) {}

    /// Short module name for logs
    fn type_id(&self) -> &'static str {
        "unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_spec_lookup() {
        let spec = PortSpec {
            inputs: vec![
                PortDef::new(0, "left", SignalKind::Audio),
                PortDef::new(1, "right", SignalKind::Audio).normalled_to(0),
            ],
            outputs: vec![PortDef::new(10, "out", SignalKind::Audio)],
        };

        assert_eq!(spec.input_by_name("right").map(|p| p.id), Some(1));
        assert_eq!(spec.input_by_id(1).and_then(|p| p.normalled_to), Some(0));
        assert_eq!(spec.output_by_name("out").map(|p| p.id), Some(10));
        assert!(spec.output_by_id(0).is_none());
    }

    #[test]
    fn test_port_values_overwrite() {
        let mut values = PortValues::new();
        values.set(3, 0.4);
        values.set(3, 0.1);
        values.set(0, -1.0);
        assert_eq!(values.get(3), Some(0.1));
        assert_eq!(values.get_or(7, 0.5), 0.5);

        values.clear();
        assert!(values.get(0).is_none());
    }
}
