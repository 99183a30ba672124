//! The pipeline's stage graph.
//!
//! The five stages form a directed acyclic graph, not a linear sequence:
//! `metadata` and `destination` have no dependency on each other and run
//! concurrently, `resize` waits on `metadata` only, `upload` waits on both
//! `resize` and `destination`, and `cleanup` waits on `upload`. The table
//! here is the single source of truth; the orchestrator in
//! [`crate::pipeline`] follows it and labels errors with the stage that
//! produced them.

/// A named pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Metadata,
    Destination,
    Resize,
    Upload,
    Cleanup,
}

impl Stage {
    /// All stages, in declaration order
    pub const ALL: [Stage; 5] = [
        Stage::Metadata,
        Stage::Destination,
        Stage::Resize,
        Stage::Upload,
        Stage::Cleanup,
    ];

    /// Stages that must complete successfully before this one may start
    pub fn dependencies(self) -> &'static [Stage] {
        match self {
            Stage::Metadata => &[],
            Stage::Destination => &[],
            Stage::Resize => &[Stage::Metadata],
            Stage::Upload => &[Stage::Resize, Stage::Destination],
            Stage::Cleanup => &[Stage::Upload],
        }
    }

    /// Whether this stage may start given the set of completed stages
    pub fn is_ready(self, completed: &[Stage]) -> bool {
        self.dependencies().iter().all(|d| completed.contains(d))
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Metadata => "metadata",
            Stage::Destination => "destination",
            Stage::Resize => "resize",
            Stage::Upload => "upload",
            Stage::Cleanup => "cleanup",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Topological layering of the stage graph: each wave contains the stages
/// whose dependencies are all satisfied by earlier waves.
pub fn execution_waves() -> Vec<Vec<Stage>> {
    let mut waves = Vec::new();
    let mut completed: Vec<Stage> = Vec::new();

    while completed.len() < Stage::ALL.len() {
        let wave: Vec<Stage> = Stage::ALL
            .iter()
            .copied()
            .filter(|s| !completed.contains(s) && s.is_ready(&completed))
            .collect();
        // The table is a DAG by construction; an empty wave would mean a cycle.
        debug_assert!(!wave.is_empty());
        completed.extend(&wave);
        waves.push(wave);
    }

    waves
}
