//! Skill-plan graph construction and reweighting.

use std::collections::HashMap;
use std::fmt;

use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use sidus_types::config::PlanWeights;
use sidus_types::error::PlanError;

use super::shortest::shortest_path;

/// A node in a skill plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Slot {
    In,
    Out,
    /// The `repeat`-th use of skill `name` (zero-based).
    Skill { name: String, repeat: usize },
}

impl Slot {
    pub fn skill(name: impl Into<String>, repeat: usize) -> Self {
        Slot::Skill {
            name: name.into(),
            repeat,
        }
    }

    /// Skill name for skill slots, `None` for the terminals.
    pub fn skill_name(&self) -> Option<&str> {
        match self {
            Slot::Skill { name, .. } => Some(name),
            Slot::In | Slot::Out => None,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::In => f.write_str("in"),
            Slot::Out => f.write_str("out"),
            Slot::Skill { name, repeat } => write!(f, "{name}#{repeat}"),
        }
    }
}

/// The compiled skill plan of one task.
///
/// Every skill known to the agent gets one slot per repeat level, and every
/// pair of slots (terminals included) is joined by an edge. Edges along the
/// declared sequence carry the cheap weight, all others the detour weight,
/// so the cheapest path from `in` to `out` is exactly the declared sequence
/// until weights are changed.
#[derive(Debug, Clone)]
pub struct SkillPlan {
    graph: UnGraph<Slot, u32>,
    slots: HashMap<Slot, NodeIndex>,
    input: NodeIndex,
    output: NodeIndex,
    depth: usize,
    cheap: u32,
    detour: u32,
}

impl SkillPlan {
    /// Compile a plan for `sequence` over the agent-wide skill list.
    pub fn compile(
        all_skills: &[String],
        sequence: &[String],
        weights: PlanWeights,
    ) -> Result<Self, PlanError> {
        if sequence.is_empty() {
            return Err(PlanError::EmptySequence);
        }
        if let Some(unknown) = sequence.iter().find(|s| !all_skills.contains(s)) {
            return Err(PlanError::UnknownSkill(unknown.clone()));
        }

        // Repeat level of each occurrence, in sequence order.
        let mut seen: HashMap<&str, usize> = HashMap::new();
        let mut declared = Vec::with_capacity(sequence.len() + 2);
        declared.push(Slot::In);
        for name in sequence {
            let repeat = seen.entry(name.as_str()).or_insert(0);
            declared.push(Slot::skill(name.clone(), *repeat));
            *repeat += 1;
        }
        declared.push(Slot::Out);
        let depth = seen.values().copied().max().unwrap_or(1);

        // The declared chain must stay cheaper than any single detour edge.
        let cheap = weights.cheap_weight.max(1);
        let chain_cost = cheap.saturating_mul(declared.len() as u32 - 1);
        let detour = weights.detour_weight.max(chain_cost.saturating_add(1));

        let mut graph = UnGraph::<Slot, u32>::with_capacity(
            all_skills.len() * depth + 2,
            (all_skills.len() * depth + 2).pow(2) / 2,
        );
        let mut slots = HashMap::new();
        let input = graph.add_node(Slot::In);
        slots.insert(Slot::In, input);
        for name in all_skills {
            for repeat in 0..depth {
                let slot = Slot::skill(name.clone(), repeat);
                let index = graph.add_node(slot.clone());
                slots.insert(slot, index);
            }
        }
        let output = graph.add_node(Slot::Out);
        slots.insert(Slot::Out, output);

        let count = graph.node_count();
        for a in 0..count {
            for b in (a + 1)..count {
                graph.add_edge(NodeIndex::new(a), NodeIndex::new(b), detour);
            }
        }

        let mut plan = Self {
            graph,
            slots,
            input,
            output,
            depth,
            cheap,
            detour,
        };
        for pair in declared.windows(2) {
            plan.set_skill_weight(&pair[0], &pair[1], cheap)?;
        }
        Ok(plan)
    }

    /// Maximum number of times any one skill appears in the sequence.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn cheap_weight(&self) -> u32 {
        self.cheap
    }

    /// Effective detour weight after scaling for the sequence length.
    pub fn detour_weight(&self) -> u32 {
        self.detour
    }

    /// Slots on the current cheapest path, terminals excluded.
    pub fn active_slots(&self) -> Result<Vec<Slot>, PlanError> {
        let (path, _) =
            shortest_path(&self.graph, self.input, self.output).ok_or(PlanError::NoPath)?;
        Ok(path
            .into_iter()
            .filter(|&i| i != self.input && i != self.output)
            .map(|i| self.graph[i].clone())
            .collect())
    }

    /// Skill names to run, in order.
    pub fn active_nodes(&self) -> Result<Vec<String>, PlanError> {
        Ok(self
            .active_slots()?
            .into_iter()
            .filter_map(|slot| match slot {
                Slot::Skill { name, .. } => Some(name),
                Slot::In | Slot::Out => None,
            })
            .collect())
    }

    /// Total weight of the current cheapest path.
    pub fn active_cost(&self) -> Result<u64, PlanError> {
        shortest_path(&self.graph, self.input, self.output)
            .map(|(_, cost)| cost)
            .ok_or(PlanError::NoPath)
    }

    pub fn skill_weight(&self, from: &Slot, to: &Slot) -> Result<u32, PlanError> {
        let edge = self.edge(from, to)?;
        Ok(self.graph[edge])
    }

    /// Set the weight of the edge between two slots.
    ///
    /// Raising an edge on the active path above the detour weight makes the
    /// planner route around it, which may skip every remaining skill.
    pub fn set_skill_weight(&mut self, from: &Slot, to: &Slot, weight: u32) -> Result<(), PlanError> {
        if weight == 0 {
            return Err(PlanError::InvalidWeight(weight));
        }
        let edge = self.edge(from, to)?;
        self.graph[edge] = weight;
        tracing::debug!(%from, %to, weight, "skill plan edge reweighted");
        Ok(())
    }

    /// Drop one occurrence of a skill from the active path, keeping the rest
    /// of the sequence in order.
    ///
    /// Both edges touching the slot on the active path become detours and
    /// the edge joining its neighbours becomes cheap.
    pub fn exclude_skill(&mut self, name: &str, repeat: usize) -> Result<(), PlanError> {
        let target = Slot::skill(name, repeat);
        let target_index = self.node(&target)?;
        let (path, _) =
            shortest_path(&self.graph, self.input, self.output).ok_or(PlanError::NoPath)?;
        let position = path
            .iter()
            .position(|&i| i == target_index)
            .ok_or_else(|| PlanError::UnknownSlot(target.to_string()))?;

        let before = self.graph[path[position - 1]].clone();
        let after = self.graph[path[position + 1]].clone();
        // All three edges must exist before any weight changes.
        let into = self.edge(&before, &target)?;
        let out_of = self.edge(&target, &after)?;
        let bypass = self.edge(&before, &after)?;
        self.graph[into] = self.detour;
        self.graph[out_of] = self.detour;
        self.graph[bypass] = self.cheap;
        tracing::debug!(slot = %target, "skill excluded from plan");
        Ok(())
    }

    /// Remove the edge between two slots entirely.
    ///
    /// Planning fails with [`PlanError::NoPath`] once `in` and `out` are
    /// disconnected.
    pub fn block_edge(&mut self, from: &Slot, to: &Slot) -> Result<(), PlanError> {
        let edge = self.edge(from, to)?;
        self.graph.remove_edge(edge);
        tracing::debug!(%from, %to, "skill plan edge blocked");
        Ok(())
    }

    fn node(&self, slot: &Slot) -> Result<NodeIndex, PlanError> {
        self.slots
            .get(slot)
            .copied()
            .ok_or_else(|| PlanError::UnknownSlot(slot.to_string()))
    }

    fn edge(&self, from: &Slot, to: &Slot) -> Result<EdgeIndex, PlanError> {
        let a = self.node(from)?;
        let b = self.node(to)?;
        self.graph.find_edge(a, b).ok_or_else(|| PlanError::NoEdge {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
