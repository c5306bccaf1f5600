//! Model orchestrator: freezing, event storage, partitions and likelihood sums.

use pwa_cache::{Event, StatusTable, StorageLayout};
use pwa_core::errors::{ErrorInfo, PwaError};
use pwa_core::{protocol_error, Complex64, FourMomentum, ParameterId, ParameterStore, ParameterValue};
use pwa_data::{DataPartition, DataSet};
use pwa_tree::{DecayTree, Evaluator, ParticleId};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::EvalConfig;

/// Result of summing the log intensity over one partition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartitionSum {
    /// Partition position.
    pub partition: usize,
    /// Events in the partition.
    pub events: usize,
    /// Events left out for a non-finite log intensity.
    pub excluded: usize,
    /// Sum of `ln |A|²` over the included events.
    pub sum: f64,
}

/// Result of a full pass over every partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassSummary {
    /// Per-partition sums, in partition order.
    pub partitions: Vec<PartitionSum>,
    /// Sum over all partitions.
    pub total: f64,
    /// Excluded events over all partitions.
    pub excluded: usize,
}

/// A frozen decay tree together with its parameters, dataset and partitions.
///
/// Topology is immutable once the model exists. Parameter updates go through
/// the model so the change flags reach every partition's status table before
/// the next evaluation.
#[derive(Debug, Clone)]
pub struct Model {
    tree: DecayTree,
    params: ParameterStore,
    config: EvalConfig,
    data: DataSet,
    partitions: Vec<DataPartition>,
    status: Vec<StatusTable>,
    scratch: StatusTable,
}

impl Model {
    /// Freezes `tree` below `initial_state` and prepares empty event storage.
    pub fn prepare(
        mut tree: DecayTree,
        params: ParameterStore,
        initial_state: ParticleId,
        config: EvalConfig,
    ) -> Result<Self, PwaError> {
        config.validate()?;
        let layout = tree.freeze(initial_state)?;
        let scratch = StatusTable::new(tree.accessors(), tree.values())?;
        let mut data = DataSet::new(tree.final_state().len());
        data.allocate(&layout);
        info!(
            final_state = tree.final_state().len(),
            cells = layout.total_cells(),
            parameters = params.len(),
            "model prepared"
        );
        Ok(Self {
            tree,
            params,
            config,
            data,
            partitions: Vec::new(),
            status: Vec::new(),
            scratch,
        })
    }

    /// Frozen decay tree.
    pub fn tree(&self) -> &DecayTree {
        &self.tree
    }

    /// Fit parameters.
    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    /// Evaluation settings.
    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Events.
    pub fn data(&self) -> &DataSet {
        &self.data
    }

    /// Current partitions.
    pub fn partitions(&self) -> &[DataPartition] {
        &self.partitions
    }

    /// Storage layout shared by every event.
    pub fn layout(&self) -> Result<&StorageLayout, PwaError> {
        self.tree.layout()
    }

    /// Appends an event with storage sized from the frozen layout.
    pub fn add_event(&mut self, momenta: Vec<FourMomentum>) -> Result<usize, PwaError> {
        self.data.push(momenta)
    }

    /// Replaces the momenta of an existing event, invalidating its cache.
    pub fn set_event_momenta(&mut self, position: usize, momenta: Vec<FourMomentum>) -> Result<(), PwaError> {
        self.data.event_mut(position)?.set_momenta(momenta)
    }

    /// Splits the current dataset according to the configured strategy and
    /// gives every partition a fresh status table.
    pub fn create_partitions(&mut self) -> Result<&[DataPartition], PwaError> {
        let partitions = DataPartition::from_strategy(self.config.partitioning, self.data.len())?;
        self.set_partitions(partitions)?;
        Ok(&self.partitions)
    }

    /// Installs caller-built partitions, which must cover every event once.
    pub fn set_partitions(&mut self, partitions: Vec<DataPartition>) -> Result<(), PwaError> {
        self.data.split_mut(&partitions)?;
        let mut status = Vec::with_capacity(partitions.len());
        for _ in &partitions {
            status.push(StatusTable::new(self.tree.accessors(), self.tree.values())?);
        }
        self.partitions = partitions;
        self.status = status;
        Ok(())
    }

    /// Sets a parameter value; cached values depending on it are recomputed
    /// on the next evaluation.
    pub fn set_parameter(&mut self, id: ParameterId, value: ParameterValue) -> Result<(), PwaError> {
        self.params.set(id, value)
    }

    /// Fixes a parameter for the run.
    pub fn fix_parameter(&mut self, id: ParameterId) -> Result<(), PwaError> {
        self.params.fix(id)
    }

    /// Makes a parameter adjustable again.
    pub fn release_parameter(&mut self, id: ParameterId) -> Result<(), PwaError> {
        self.params.release(id)
    }

    /// Total amplitude of the event at `position`.
    pub fn amplitude(&mut self, position: usize) -> Result<Complex64, PwaError> {
        self.apply_changes()?;
        let event = self.data.event_mut(position)?;
        Evaluator::new(&self.tree, &self.params, &self.scratch).amplitude(event)
    }

    /// `ln |A|²` of the event at `position`.
    pub fn log_intensity(&mut self, position: usize) -> Result<f64, PwaError> {
        Ok(self.amplitude(position)?.norm_sqr().ln())
    }

    /// Nominal kinematic range of the mass squared of two final-state positions.
    pub fn mass_range(&self, positions: [usize; 2]) -> Result<(f64, f64), PwaError> {
        self.tree.mass_range(&self.params, positions)
    }

    /// Sums `ln |A|²` over one partition.
    pub fn sum_over_partition(&mut self, partition: usize) -> Result<PartitionSum, PwaError> {
        self.ensure_partitioned()?;
        if partition >= self.partitions.len() {
            return Err(PwaError::Data(
                ErrorInfo::new("unknown-partition", "partition does not exist")
                    .with_context("partition", partition)
                    .with_context("partitions", self.partitions.len()),
            ));
        }
        self.apply_changes()?;
        let table = &mut self.status[partition];
        table.reset_for_partition_pass(self.tree.values(), &self.params)?;
        let mut groups = self.data.split_mut(&self.partitions)?;
        let events = std::mem::take(&mut groups[partition]);
        let ev = Evaluator::new(&self.tree, &self.params, &self.status[partition]);
        let sum = sum_partition(&ev, partition, events, self.config.exclude_non_finite)?;
        log_partition(&sum);
        Ok(sum)
    }

    /// Sums `ln |A|²` over all partitions, evaluating them concurrently.
    ///
    /// Every status table is reset before the pass; change flags are cleared
    /// once it completes.
    pub fn sum_of_log_intensity(&mut self) -> Result<PassSummary, PwaError> {
        self.ensure_partitioned()?;
        self.apply_changes()?;
        for table in &mut self.status {
            table.reset_for_partition_pass(self.tree.values(), &self.params)?;
        }
        let groups = self.data.split_mut(&self.partitions)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.concurrency.max(1))
            .build()
            .map_err(|err| PwaError::Config(ErrorInfo::new("thread-pool", err.to_string())))?;

        let tree = &self.tree;
        let params = &self.params;
        let exclude = self.config.exclude_non_finite;
        let results: Result<Vec<PartitionSum>, PwaError> = pool.install(|| {
            groups
                .into_par_iter()
                .zip(self.status.par_iter())
                .enumerate()
                .map(|(partition, (events, status))| {
                    let ev = Evaluator::new(tree, params, status);
                    sum_partition(&ev, partition, events, exclude)
                })
                .collect()
        });
        let partitions = results?;
        for sum in &partitions {
            log_partition(sum);
        }
        let summary = PassSummary {
            total: partitions.iter().map(|sum| sum.sum).sum(),
            excluded: partitions.iter().map(|sum| sum.excluded).sum(),
            partitions,
        };
        info!(
            partitions = summary.partitions.len(),
            events = self.data.len(),
            excluded = summary.excluded,
            total = summary.total,
            "likelihood pass completed"
        );
        self.params.mark_unchanged();
        Ok(summary)
    }

    /// Propagates parameter change flags into every status table.
    fn apply_changes(&mut self) -> Result<(), PwaError> {
        if self.params.changed().is_empty() {
            return Ok(());
        }
        let values = self.tree.values();
        for table in self.status.iter_mut().chain(std::iter::once(&mut self.scratch)) {
            table.invalidate_changed(values, &self.params)?;
        }
        self.params.mark_unchanged();
        Ok(())
    }

    fn ensure_partitioned(&self) -> Result<(), PwaError> {
        if self.partitions.is_empty() && !self.data.is_empty() {
            return Err(protocol_error("no-partitions", "create partitions before summing over them"));
        }
        Ok(())
    }
}

fn sum_partition(
    ev: &Evaluator<'_>,
    partition: usize,
    events: Vec<&mut Event>,
    exclude_non_finite: bool,
) -> Result<PartitionSum, PwaError> {
    let mut result = PartitionSum {
        partition,
        events: events.len(),
        excluded: 0,
        sum: 0.0,
    };
    for event in events {
        let value = ev.log_intensity(event)?;
        if exclude_non_finite && !value.is_finite() {
            result.excluded += 1;
            continue;
        }
        result.sum += value;
    }
    Ok(result)
}

fn log_partition(sum: &PartitionSum) {
    if sum.excluded > 0 {
        warn!(
            partition = sum.partition,
            excluded = sum.excluded,
            events = sum.events,
            "events with non-finite intensity excluded"
        );
    }
    info!(partition = sum.partition, events = sum.events, sum = sum.sum, "partition evaluated");
}
