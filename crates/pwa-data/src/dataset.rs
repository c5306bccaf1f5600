//! Owned collection of events.

use pwa_cache::{Event, StorageLayout};
use pwa_core::errors::{ErrorInfo, PwaError};
use pwa_core::FourMomentum;

use crate::partition::DataPartition;

/// Events recorded for one final state.
#[derive(Debug, Clone)]
pub struct DataSet {
    final_state_size: usize,
    events: Vec<Event>,
    layout: Option<StorageLayout>,
}

impl DataSet {
    /// Creates an empty dataset for events with `final_state_size` momenta.
    pub fn new(final_state_size: usize) -> Self {
        Self {
            final_state_size,
            events: Vec::new(),
            layout: None,
        }
    }

    /// Number of momenta per event.
    pub fn final_state_size(&self) -> usize {
        self.final_state_size
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the dataset holds no event.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Appends an event; its storage is allocated when a layout is known.
    pub fn push(&mut self, momenta: Vec<FourMomentum>) -> Result<usize, PwaError> {
        if momenta.len() != self.final_state_size {
            return Err(PwaError::Data(
                ErrorInfo::new("wrong-momentum-count", "momentum count does not match the final state")
                    .with_context("expected", self.final_state_size)
                    .with_context("found", momenta.len()),
            ));
        }
        let mut event = Event::new(momenta);
        if let Some(layout) = &self.layout {
            event.allocate(layout);
        }
        self.events.push(event);
        Ok(self.events.len() - 1)
    }

    /// Allocates storage of every event, present and future, from a frozen layout.
    pub fn allocate(&mut self, layout: &StorageLayout) {
        for event in &mut self.events {
            event.allocate(layout);
        }
        self.layout = Some(layout.clone());
    }

    /// Whether a storage layout was installed.
    pub fn is_allocated(&self) -> bool {
        self.layout.is_some()
    }

    /// Event at `position`.
    pub fn event(&self, position: usize) -> Result<&Event, PwaError> {
        self.events.get(position).ok_or_else(|| missing_event(position, self.len()))
    }

    /// Mutable event at `position`.
    pub fn event_mut(&mut self, position: usize) -> Result<&mut Event, PwaError> {
        let len = self.len();
        self.events
            .get_mut(position)
            .ok_or_else(|| missing_event(position, len))
    }

    /// Iterates over all events.
    pub fn events(&self) -> impl Iterator<Item = &Event> + '_ {
        self.events.iter()
    }

    /// Splits the events into one exclusive group per partition.
    ///
    /// Fails unless the partitions cover every event exactly once.
    pub fn split_mut(&mut self, partitions: &[DataPartition]) -> Result<Vec<Vec<&mut Event>>, PwaError> {
        let mut owner: Vec<Option<usize>> = vec![None; self.events.len()];
        for (group, partition) in partitions.iter().enumerate() {
            for position in partition.positions() {
                let slot = owner.get_mut(position).ok_or_else(|| {
                    PwaError::Data(
                        ErrorInfo::new("partition-out-of-range", "partition exceeds the dataset")
                            .with_context("partition", partition.index())
                            .with_context("position", position),
                    )
                })?;
                if slot.replace(group).is_some() {
                    return Err(PwaError::Data(
                        ErrorInfo::new("overlapping-partitions", "event is covered twice")
                            .with_context("position", position),
                    ));
                }
            }
        }
        let mut groups: Vec<Vec<&mut Event>> = partitions
            .iter()
            .map(|partition| Vec::with_capacity(partition.len()))
            .collect();
        for (position, event) in self.events.iter_mut().enumerate() {
            let group = owner[position].ok_or_else(|| {
                PwaError::Data(
                    ErrorInfo::new("uncovered-event", "event is not covered by any partition")
                        .with_context("position", position)
                        .with_hint("recreate partitions after adding events"),
                )
            })?;
            groups[group].push(event);
        }
        Ok(groups)
    }
}

fn missing_event(position: usize, len: usize) -> PwaError {
    PwaError::Data(
        ErrorInfo::new("unknown-event", "event does not exist")
            .with_context("position", position)
            .with_context("events", len),
    )
}
